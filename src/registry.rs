//! Per-configuration client registry.
//!
//! The registry hands out exactly one shared [`Client`] per distinct
//! configuration, keyed by a fingerprint of the configuration's fields.
//! Entries live for the registry's lifetime; dropping a handle never tears
//! down the underlying connection for other holders.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::{Client, ErrorPolicy};
use crate::connection::Config;
use crate::sink::{FileSink, LogSink};

/// A shared handle to a registry-owned client.
pub type SharedClient = Arc<Mutex<Client>>;

/// Stable fingerprint of a configuration: FNV-1a over its canonical JSON
/// form. Field-for-field equal configurations always land on the same
/// client slot; any differing field lands elsewhere.
pub fn fingerprint(config: &Config) -> u64 {
    // Serializing a plain field struct cannot fail.
    let bytes = serde_json::to_vec(config).unwrap_or_default();
    fnv1a(&bytes)
}

/// FNV-1a, 64-bit.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Deduplicating cache of clients.
pub struct Registry {
    clients: Mutex<HashMap<u64, SharedClient>>,
    sink: Arc<dyn LogSink>,
    policy: ErrorPolicy,
}

impl Registry {
    /// A registry whose clients log to the default file sink and return
    /// errors strictly.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(FileSink::default()), ErrorPolicy::default())
    }

    /// A registry with a custom sink and error policy, shared by every
    /// client it creates.
    pub fn with_sink(sink: Arc<dyn LogSink>, policy: ErrorPolicy) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            sink,
            policy,
        }
    }

    /// Get the client for `config`, creating and caching it on first use.
    ///
    /// Creation never fails: a client whose eager connect attempt failed is
    /// cached and handed out disconnected, and will retry when first used.
    /// Entries are never evicted.
    ///
    /// The map lock is held while a missing client is constructed, eager
    /// connect included, so a slow first connection to one host stalls
    /// concurrent `get` calls for every configuration until it resolves.
    /// Lookups of already-cached entries only take the lock briefly.
    pub fn get(&self, config: &Config) -> SharedClient {
        let key = fingerprint(config);
        let mut clients = self.clients.lock();
        let client = clients.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(Client::new(
                config.clone(),
                Arc::clone(&self.sink),
                self.policy,
            )))
        });
        Arc::clone(client)
    }

    /// Number of distinct configurations seen so far.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
