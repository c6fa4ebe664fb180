//! MySQL client/server protocol definitions.
//!
//! Reference: https://dev.mysql.com/doc/dev/mysql-server/latest/PAGE_PROTOCOL.html

/// Command bytes sent as the first payload byte of a client command packet.
pub mod command {
    pub const COM_QUIT: u8 = 0x01;
    pub const COM_INIT_DB: u8 = 0x02;
    pub const COM_QUERY: u8 = 0x03;
    pub const COM_PING: u8 = 0x0e;
    pub const COM_STMT_PREPARE: u8 = 0x16;
    pub const COM_STMT_EXECUTE: u8 = 0x17;
    pub const COM_STMT_CLOSE: u8 = 0x19;
}

/// Capability flags exchanged during the handshake.
pub mod capability {
    pub const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;
    pub const CLIENT_FOUND_ROWS: u32 = 0x0000_0002;
    pub const CLIENT_LONG_FLAG: u32 = 0x0000_0004;
    pub const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;
    pub const CLIENT_LOCAL_FILES: u32 = 0x0000_0080;
    pub const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
    pub const CLIENT_SSL: u32 = 0x0000_0800;
    pub const CLIENT_TRANSACTIONS: u32 = 0x0000_2000;
    pub const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;
    pub const CLIENT_MULTI_STATEMENTS: u32 = 0x0001_0000;
    pub const CLIENT_MULTI_RESULTS: u32 = 0x0002_0000;
    pub const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;
    pub const CLIENT_CONNECT_ATTRS: u32 = 0x0010_0000;
    pub const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 0x0020_0000;
    pub const CLIENT_DEPRECATE_EOF: u32 = 0x0100_0000;
}

/// Server status bits carried by OK and EOF packets.
pub mod status {
    pub const SERVER_STATUS_IN_TRANS: u16 = 0x0001;
    pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;
    pub const SERVER_MORE_RESULTS_EXISTS: u16 = 0x0008;
    pub const SERVER_STATUS_CURSOR_EXISTS: u16 = 0x0040;
    pub const SERVER_STATUS_LAST_ROW_SENT: u16 = 0x0080;
}

/// Column definition flags.
pub mod column_flags {
    pub const NOT_NULL_FLAG: u16 = 0x0001;
    pub const PRI_KEY_FLAG: u16 = 0x0002;
    pub const UNSIGNED_FLAG: u16 = 0x0020;
    pub const BINARY_FLAG: u16 = 0x0080;
    pub const AUTO_INCREMENT_FLAG: u16 = 0x0200;
}

/// First payload byte of the generic response packets.
pub mod marker {
    pub const OK: u8 = 0x00;
    pub const AUTH_MORE_DATA: u8 = 0x01;
    pub const LOCAL_INFILE: u8 = 0xfb;
    /// Same byte as `LOCAL_INFILE`; inside a text-protocol row it marks a
    /// NULL cell instead of an infile request.
    pub const NULL_VALUE: u8 = 0xfb;
    pub const EOF: u8 = 0xfe;
    pub const ERR: u8 = 0xff;
}

/// `caching_sha2_password` sub-status bytes inside an AuthMoreData packet.
pub mod sha2 {
    pub const FAST_AUTH_OK: u8 = 0x03;
    pub const FULL_AUTH_REQUIRED: u8 = 0x04;
}

/// The character set number used for `binary` columns; such columns carry
/// raw bytes rather than text.
pub const BINARY_CHARSET: u16 = 63;

/// Column type bytes from ColumnDefinition41 packets and
/// COM_STMT_EXECUTE parameter slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0a,
    Time = 0x0b,
    DateTime = 0x0c,
    Year = 0x0d,
    VarChar = 0x0f,
    Bit = 0x10,
    Json = 0xf5,
    NewDecimal = 0xf6,
    Enum = 0xf7,
    Set = 0xf8,
    TinyBlob = 0xf9,
    MediumBlob = 0xfa,
    LongBlob = 0xfb,
    Blob = 0xfc,
    VarString = 0xfd,
    String = 0xfe,
    Geometry = 0xff,
    Unknown = 0x1f,
}

impl From<u8> for ColumnType {
    fn from(b: u8) -> Self {
        match b {
            0x00 => ColumnType::Decimal,
            0x01 => ColumnType::Tiny,
            0x02 => ColumnType::Short,
            0x03 => ColumnType::Long,
            0x04 => ColumnType::Float,
            0x05 => ColumnType::Double,
            0x06 => ColumnType::Null,
            0x07 => ColumnType::Timestamp,
            0x08 => ColumnType::LongLong,
            0x09 => ColumnType::Int24,
            0x0a => ColumnType::Date,
            0x0b => ColumnType::Time,
            0x0c => ColumnType::DateTime,
            0x0d => ColumnType::Year,
            0x0f => ColumnType::VarChar,
            0x10 => ColumnType::Bit,
            0xf5 => ColumnType::Json,
            0xf6 => ColumnType::NewDecimal,
            0xf7 => ColumnType::Enum,
            0xf8 => ColumnType::Set,
            0xf9 => ColumnType::TinyBlob,
            0xfa => ColumnType::MediumBlob,
            0xfb => ColumnType::LongBlob,
            0xfc => ColumnType::Blob,
            0xfd => ColumnType::VarString,
            0xfe => ColumnType::String,
            0xff => ColumnType::Geometry,
            _ => ColumnType::Unknown,
        }
    }
}

/// Authentication plugins advertised by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPlugin {
    /// `mysql_native_password`: SHA-1 based challenge/response.
    NativePassword,
    /// `caching_sha2_password`: SHA-256 based, default since MySQL 8.0.
    CachingSha2,
    /// Anything else; rejected during the handshake.
    Unsupported,
}

impl AuthPlugin {
    pub fn from_name(name: &str) -> Self {
        match name {
            "mysql_native_password" => AuthPlugin::NativePassword,
            "caching_sha2_password" => AuthPlugin::CachingSha2,
            _ => AuthPlugin::Unsupported,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthPlugin::NativePassword => "mysql_native_password",
            AuthPlugin::CachingSha2 => "caching_sha2_password",
            AuthPlugin::Unsupported => "",
        }
    }
}

/// Map a configured character set name to the collation id sent in the
/// handshake byte. The session character set is authoritative either way:
/// the connection always issues `SET NAMES` right after authenticating.
pub fn collation_for_charset(charset: &str) -> u8 {
    match charset {
        "utf8" | "utf8mb3" => 33,  // utf8_general_ci
        "utf8mb4" => 45,           // utf8mb4_general_ci
        "latin1" => 8,             // latin1_swedish_ci
        "ascii" => 11,             // ascii_general_ci
        "binary" => 63,
        _ => 33,
    }
}
