//! High-level client: one configuration, one connection, reconnect on use.

use std::sync::Arc;

use crate::connection::{Config, Connection, QueryResult};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::sink::{FileSink, LogSink};
use crate::types::{Param, ToParam, Value};

/// How operation failures reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Errors propagate as `Err`.
    #[default]
    Strict,
    /// Errors are written to the sink and the operation returns its empty
    /// value (`0`, `None`, an empty vec). Matches deployments that treat
    /// database failures as log lines rather than control flow.
    LogAndContinue,
}

/// A single-connection database client.
///
/// Every statement and transaction operation starts by checking the
/// connection and reconnecting if needed, so a dropped connection costs one
/// retry rather than a failed call. A reconnect opens a brand-new session;
/// the server rolls back whatever transaction the old session left open.
///
/// `Client` is deliberately not `Clone`. A copy would either alias the
/// underlying socket or silently open a second connection; callers that
/// need sharing go through [`Registry`](crate::registry::Registry), which
/// hands out one locked instance per configuration.
pub struct Client {
    config: Config,
    conn: Option<Connection>,
    sink: Arc<dyn LogSink>,
    policy: ErrorPolicy,
}

impl Client {
    /// Build a client and eagerly attempt the first connection.
    ///
    /// A failed attempt is logged to the sink, not returned; the client
    /// starts disconnected and retries on first use.
    pub fn new(config: Config, sink: Arc<dyn LogSink>, policy: ErrorPolicy) -> Self {
        let mut client = Self {
            config,
            conn: None,
            sink,
            policy,
        };
        if let Err(e) = client.connect() {
            client.sink.log(&format!("Connection failed: {e}"));
        }
        client
    }

    /// Build a standalone client with the default file sink and strict
    /// error reporting.
    pub fn with_config(config: Config) -> Self {
        Self::new(config, Arc::new(FileSink::default()), ErrorPolicy::Strict)
    }

    // ─── Connection Lifecycle ─────────────────────────────────

    /// Open a fresh connection, discarding any existing one first.
    pub fn connect(&mut self) -> Result<()> {
        self.conn = None;
        let conn = Connection::connect(&self.config)?;
        log::debug!(
            "connected to {}:{}/{} as {} (server {}, thread {})",
            self.config.host,
            self.config.port,
            self.config.database,
            self.config.user,
            conn.server_version(),
            conn.connection_id(),
        );
        self.conn = Some(conn);
        Ok(())
    }

    /// Whether a live, unbroken connection handle exists.
    pub fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::is_ready)
    }

    /// Drop the connection handle. Safe when already disconnected.
    pub fn close(&mut self) {
        self.conn = None;
    }

    /// Round-trip liveness check. Always strict: a caller asking for a
    /// ping wants to see the failure.
    pub fn ping(&mut self) -> Result<()> {
        self.ensure_connected()?.ping()
    }

    fn ensure_connected(&mut self) -> Result<&mut Connection> {
        if !self.is_connected() {
            self.connect()?;
        }
        self.conn.as_mut().ok_or(Error::ConnectionClosed)
    }

    /// Route a finished operation through the error policy.
    fn finish<T: Default>(&self, result: Result<T>) -> Result<T> {
        match (self.policy, result) {
            (ErrorPolicy::LogAndContinue, Err(e)) => {
                self.sink.log(&e.to_string());
                Ok(T::default())
            }
            (_, result) => result,
        }
    }

    /// Bind, prepare, and execute in one round.
    fn run(&mut self, sql: &str, args: &[&dyn ToParam]) -> Result<QueryResult> {
        let params: Vec<Param> = args.iter().map(|a| a.to_param()).collect();
        log::debug!("executing: {sql} | params: {params:?}");
        self.ensure_connected()?.exec_prepared(sql, &params)
    }

    // ─── Statement Operations ─────────────────────────────────

    /// Run a write statement; returns the affected-row count.
    pub fn execute(&mut self, sql: &str, args: &[&dyn ToParam]) -> Result<u64> {
        let result = self.run(sql, args).map(|r| r.affected_rows);
        self.finish(result)
    }

    /// Run an insert; returns the generated key.
    ///
    /// Without `sequence` the key is the insert's own generated id. With
    /// `sequence`, the key is read back from the named sequence instead,
    /// for schemas that draw keys from sequence objects rather than an
    /// auto-increment column.
    pub fn insert(
        &mut self,
        sql: &str,
        args: &[&dyn ToParam],
        sequence: Option<&str>,
    ) -> Result<u64> {
        let result = self.insert_inner(sql, args, sequence);
        self.finish(result)
    }

    fn insert_inner(
        &mut self,
        sql: &str,
        args: &[&dyn ToParam],
        sequence: Option<&str>,
    ) -> Result<u64> {
        let result = self.run(sql, args)?;
        let Some(name) = sequence else {
            return Ok(result.last_insert_id);
        };
        let follow = format!("SELECT LASTVAL({name})");
        let mut rows = self.ensure_connected()?.exec_prepared(&follow, &[])?.rows;
        let value = rows
            .drain(..)
            .next()
            .and_then(|row| row.into_values().into_iter().next())
            .ok_or_else(|| Error::TypeConversion(format!("sequence {name} returned no value")))?;
        value
            .as_u64()
            .ok_or_else(|| Error::TypeConversion(format!("sequence {name} is not an integer")))
    }

    /// Run a query; returns every row in result order.
    pub fn fetch_table(&mut self, sql: &str, args: &[&dyn ToParam]) -> Result<Vec<Row>> {
        let result = self.run(sql, args).map(|r| r.rows);
        self.finish(result)
    }

    /// Run a query; returns the first row, or `None` on an empty result.
    pub fn fetch_row(&mut self, sql: &str, args: &[&dyn ToParam]) -> Result<Option<Row>> {
        let result = self.run(sql, args).map(|r| r.rows.into_iter().next());
        self.finish(result)
    }

    /// Run a query; returns the first column of every row, in row order.
    pub fn fetch_column(&mut self, sql: &str, args: &[&dyn ToParam]) -> Result<Vec<Value>> {
        let result = self.run(sql, args).map(|r| {
            r.rows
                .into_iter()
                .filter_map(|row| row.into_values().into_iter().next())
                .collect()
        });
        self.finish(result)
    }

    /// Run a query; returns the first cell of the first row.
    ///
    /// `Ok(None)` means the query produced no rows. A present but NULL
    /// cell comes back as `Some(Value::Null)`, so the two are
    /// distinguishable; callers that want the looser notion where NULL,
    /// `""`, `"0"` and `0` all count as absent can test the returned value
    /// with [`Value::is_empty_equivalent`].
    pub fn fetch_cell(&mut self, sql: &str, args: &[&dyn ToParam]) -> Result<Option<Value>> {
        let result = self.run(sql, args).map(|r| {
            r.rows
                .into_iter()
                .next()
                .and_then(|row| row.into_values().into_iter().next())
        });
        self.finish(result)
    }

    // ─── Transaction Control ──────────────────────────────────

    /// Start a transaction.
    pub fn begin_transaction(&mut self) -> Result<()> {
        let result = self.ensure_connected().and_then(Connection::begin);
        self.finish(result)
    }

    /// Commit the active transaction.
    pub fn commit(&mut self) -> Result<()> {
        let result = self.ensure_connected().and_then(Connection::commit);
        self.finish(result)
    }

    /// Roll back the active transaction.
    pub fn rollback(&mut self) -> Result<()> {
        let result = self.ensure_connected().and_then(Connection::rollback);
        self.finish(result)
    }

    /// Whether the server reports an open transaction on this connection.
    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::in_transaction)
    }

    // ─── State Accessors ──────────────────────────────────────

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Server version of the live connection, if any.
    pub fn server_version(&self) -> Option<&str> {
        self.conn.as_ref().map(Connection::server_version)
    }

    /// Server-side thread id of the live connection, if any.
    pub fn connection_id(&self) -> Option<u32> {
        self.conn.as_ref().map(Connection::connection_id)
    }
}
