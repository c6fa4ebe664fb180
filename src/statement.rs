//! Server-side prepared statement handles.

use crate::codec::ColumnDesc;

/// A statement prepared with COM_STMT_PREPARE.
///
/// The handle only carries the server-assigned id and the metadata needed
/// to bind and decode; it holds no connection reference. Closing goes
/// through `Connection::close_statement`, and the client layer treats
/// statements as transient: prepare, execute once, close.
#[derive(Debug)]
pub struct Statement {
    id: u32,
    param_count: usize,
    columns: Vec<ColumnDesc>,
}

impl Statement {
    pub(crate) fn new(id: u32, param_count: usize, columns: Vec<ColumnDesc>) -> Self {
        Self {
            id,
            param_count,
            columns,
        }
    }

    /// The server-assigned statement id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Number of `?` placeholders the statement takes.
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Result column metadata as reported at prepare time.
    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }
}
