//! Error types for the driver and the client layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(std::io::Error),

    /// The peer sent bytes that do not form a valid protocol frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The authentication exchange itself could not be carried out,
    /// e.g. the server demanded a plugin this driver does not speak.
    #[error("authentication error: {0}")]
    Auth(String),

    /// An ERR packet received while running a statement. `state` is the
    /// five-character SQLSTATE, e.g. `42S02` for an unknown table.
    #[error("server error {code} ({state}): {message}")]
    Server {
        code: u16,
        state: String,
        message: String,
    },

    /// An ERR packet received in response to COM_STMT_PREPARE. Kept apart
    /// from [`Error::Server`] so callers can tell a statement that never
    /// compiled from one that compiled and then failed.
    #[error("prepare failed {code} ({state}): {message}")]
    Prepare {
        code: u16,
        state: String,
        message: String,
    },

    /// The server closed the connection, or an operation was attempted on
    /// a connection already known to be broken.
    #[error("connection closed")]
    ConnectionClosed,

    /// A value could not be converted to the requested Rust type.
    #[error("type conversion error: {0}")]
    TypeConversion(String),

    /// The number of bound arguments does not match the number of `?`
    /// placeholders in the prepared statement. Checked before anything is
    /// sent to the server.
    #[error("parameter count mismatch: statement takes {expected}, got {got}")]
    ParamMismatch { expected: usize, got: usize },

    /// A protocol feature this driver deliberately does not implement,
    /// e.g. LOCAL INFILE or pre-4.1 servers.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        // A clean EOF from the server means it hung up on us.
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::Io(e)
        }
    }
}

impl Error {
    /// True for errors raised by the server about a statement, as opposed
    /// to transport or driver failures.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Server { .. } | Error::Prepare { .. })
    }

    /// The MySQL error code, when the server reported one.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Error::Server { code, .. } | Error::Prepare { code, .. } => Some(*code),
            _ => None,
        }
    }
}
