//! Binary codec for the MySQL client/server protocol.
//!
//! Encoding appends packet payloads to a caller-provided buffer; the
//! 4-byte packet framing (3-byte length + sequence id) is applied by the
//! connection when it writes to the socket. Decoding operates on one
//! complete reassembled payload at a time.

use crate::error::{Error, Result};
use crate::protocol::*;
use crate::types::{Param, Value};

/// Largest payload a single packet frame can carry. Payloads of exactly
/// this size are followed by a continuation packet.
pub const MAX_PAYLOAD: usize = 0xff_ffff;

/// A decoded packet frame header.
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    pub length: usize,
    pub seq: u8,
}

pub fn decode_packet_header(buf: [u8; 4]) -> PacketHeader {
    PacketHeader {
        length: u32::from_le_bytes([buf[0], buf[1], buf[2], 0]) as usize,
        seq: buf[3],
    }
}

pub fn encode_packet_header(length: usize, seq: u8) -> [u8; 4] {
    let len = (length as u32).to_le_bytes();
    [len[0], len[1], len[2], seq]
}

// ─── Encoding (Client → Server) ────────────────────────────────

pub fn encode_com_query(buf: &mut Vec<u8>, sql: &str) {
    buf.push(command::COM_QUERY);
    buf.extend_from_slice(sql.as_bytes());
}

pub fn encode_com_init_db(buf: &mut Vec<u8>, database: &str) {
    buf.push(command::COM_INIT_DB);
    buf.extend_from_slice(database.as_bytes());
}

pub fn encode_com_stmt_prepare(buf: &mut Vec<u8>, sql: &str) {
    buf.push(command::COM_STMT_PREPARE);
    buf.extend_from_slice(sql.as_bytes());
}

pub fn encode_com_stmt_close(buf: &mut Vec<u8>, statement_id: u32) {
    buf.push(command::COM_STMT_CLOSE);
    put_u32_le(buf, statement_id);
}

/// Encode a COM_STMT_EXECUTE packet: statement id, cursor flags, the NULL
/// bitmap, one type slot per parameter and then the non-NULL values.
pub fn encode_com_stmt_execute(buf: &mut Vec<u8>, statement_id: u32, params: &[Param]) {
    buf.push(command::COM_STMT_EXECUTE);
    put_u32_le(buf, statement_id);
    buf.push(0x00); // CURSOR_TYPE_NO_CURSOR
    put_u32_le(buf, 1); // iteration count, always 1

    if params.is_empty() {
        return;
    }

    let mut bitmap = vec![0u8; (params.len() + 7) / 8];
    for (i, p) in params.iter().enumerate() {
        if matches!(p, Param::Null) {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    buf.extend_from_slice(&bitmap);
    buf.push(0x01); // new-params-bound flag

    for p in params {
        let (type_byte, flag) = match p {
            Param::Null => (ColumnType::Null as u8, 0x00),
            Param::Int(_) => (ColumnType::LongLong as u8, 0x00),
            Param::UInt(_) => (ColumnType::LongLong as u8, 0x80),
            Param::Text(_) => (ColumnType::VarString as u8, 0x00),
            Param::Bytes(_) => (ColumnType::Blob as u8, 0x00),
        };
        buf.push(type_byte);
        buf.push(flag);
    }
    for p in params {
        match p {
            Param::Null => {}
            Param::Int(v) => put_u64_le(buf, *v as u64),
            Param::UInt(v) => put_u64_le(buf, *v),
            Param::Text(s) => put_lenenc_bytes(buf, s.as_bytes()),
            Param::Bytes(b) => put_lenenc_bytes(buf, b),
        }
    }
}

/// Encode a HandshakeResponse41 packet.
pub fn encode_handshake_response(
    buf: &mut Vec<u8>,
    capabilities: u32,
    collation: u8,
    user: &str,
    auth_response: &[u8],
    database: &str,
    plugin: &str,
) {
    put_u32_le(buf, capabilities);
    put_u32_le(buf, 0x0100_0000); // max packet size: 16 MiB
    buf.push(collation);
    buf.extend_from_slice(&[0u8; 23]);
    put_cstring(buf, user);
    buf.push(auth_response.len() as u8);
    buf.extend_from_slice(auth_response);
    if capabilities & capability::CLIENT_CONNECT_WITH_DB != 0 {
        put_cstring(buf, database);
    }
    if capabilities & capability::CLIENT_PLUGIN_AUTH != 0 {
        put_cstring(buf, plugin);
    }
}

// ─── Decoding (Server → Client) ────────────────────────────────

/// The server greeting (HandshakeV10).
#[derive(Debug, Clone)]
pub struct Handshake {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    /// The auth challenge, both halves joined with trailing NULs stripped.
    pub scramble: Vec<u8>,
    pub capabilities: u32,
    pub collation: u8,
    pub status: u16,
    pub auth_plugin: String,
}

pub fn parse_handshake(body: &[u8]) -> Result<Handshake> {
    need(body, 0, 1)?;
    let protocol_version = body[0];
    if protocol_version != 10 {
        return Err(Error::Unsupported(format!(
            "handshake protocol version {protocol_version}, only version 10 is supported"
        )));
    }
    let mut pos = 1;

    let (server_version, consumed) = read_cstring(body, pos);
    let server_version = server_version.to_string();
    pos += consumed;

    need(body, pos, 4 + 8 + 1 + 2)?;
    let connection_id = read_u32_le(body, pos);
    pos += 4;
    let mut scramble = body[pos..pos + 8].to_vec();
    pos += 8 + 1; // first challenge half, then one filler byte
    let mut capabilities = read_u16_le(body, pos) as u32;
    pos += 2;

    let mut collation = 0;
    let mut status = 0;
    let mut auth_plugin = String::new();
    if pos < body.len() {
        need(body, pos, 1 + 2 + 2 + 1 + 10)?;
        collation = body[pos];
        pos += 1;
        status = read_u16_le(body, pos);
        pos += 2;
        capabilities |= (read_u16_le(body, pos) as u32) << 16;
        pos += 2;
        let auth_data_len = body[pos] as usize;
        pos += 1 + 10; // length byte, then reserved

        if capabilities & capability::CLIENT_SECURE_CONNECTION != 0 {
            let second_half = auth_data_len.saturating_sub(8).max(13);
            let end = (pos + second_half).min(body.len());
            need(body, pos, end - pos)?;
            scramble.extend_from_slice(&body[pos..end]);
            pos = end;
        }
        if capabilities & capability::CLIENT_PLUGIN_AUTH != 0 {
            let (plugin, _) = read_cstring(body, pos);
            auth_plugin = plugin.to_string();
        }
    }
    while scramble.last() == Some(&0) {
        scramble.pop();
    }

    Ok(Handshake {
        protocol_version,
        server_version,
        connection_id,
        scramble,
        capabilities,
        collation,
        status,
        auth_plugin,
    })
}

/// A decoded OK packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status: u16,
    pub warnings: u16,
}

pub fn parse_ok(body: &[u8]) -> Result<OkPacket> {
    if body.first() != Some(&marker::OK) {
        return Err(Error::Protocol("expected OK packet".to_string()));
    }
    let mut pos = 1;
    let (affected_rows, consumed) = read_lenenc_int(body, pos)?;
    pos += consumed;
    let (last_insert_id, consumed) = read_lenenc_int(body, pos)?;
    pos += consumed;

    let mut status = 0;
    let mut warnings = 0;
    if pos + 2 <= body.len() {
        status = read_u16_le(body, pos);
        pos += 2;
    }
    if pos + 2 <= body.len() {
        warnings = read_u16_le(body, pos);
    }
    Ok(OkPacket {
        affected_rows,
        last_insert_id,
        status,
        warnings,
    })
}

/// A decoded ERR packet.
#[derive(Debug, Clone)]
pub struct ErrPacket {
    pub code: u16,
    pub state: String,
    pub message: String,
}

impl ErrPacket {
    pub fn into_server_error(self) -> Error {
        Error::Server {
            code: self.code,
            state: self.state,
            message: self.message,
        }
    }

    pub fn into_prepare_error(self) -> Error {
        Error::Prepare {
            code: self.code,
            state: self.state,
            message: self.message,
        }
    }
}

pub fn parse_err(body: &[u8]) -> Result<ErrPacket> {
    if body.first() != Some(&marker::ERR) {
        return Err(Error::Protocol("expected ERR packet".to_string()));
    }
    need(body, 1, 2)?;
    let code = read_u16_le(body, 1);
    let mut pos = 3;

    // The '#' marker and five-byte SQLSTATE are only sent by 4.1+ servers.
    let mut state = String::from("HY000");
    if body.get(pos) == Some(&b'#') && pos + 6 <= body.len() {
        state = String::from_utf8_lossy(&body[pos + 1..pos + 6]).into_owned();
        pos += 6;
    }
    let message = String::from_utf8_lossy(&body[pos..]).into_owned();
    Ok(ErrPacket { code, state, message })
}

/// A decoded EOF packet (protocol 4.1, without CLIENT_DEPRECATE_EOF).
#[derive(Debug, Clone, Copy, Default)]
pub struct EofPacket {
    pub warnings: u16,
    pub status: u16,
}

/// EOF packets share the 0xfe marker with 8-byte length-encoded integers;
/// the payload length keeps them apart.
pub fn is_eof(body: &[u8]) -> bool {
    body.first() == Some(&marker::EOF) && body.len() < 9
}

pub fn parse_eof(body: &[u8]) -> Result<EofPacket> {
    if !is_eof(body) {
        return Err(Error::Protocol("expected EOF packet".to_string()));
    }
    let mut packet = EofPacket::default();
    if body.len() >= 5 {
        packet.warnings = read_u16_le(body, 1);
        packet.status = read_u16_le(body, 3);
    }
    Ok(packet)
}

/// A column descriptor from a ColumnDefinition41 packet.
#[derive(Debug, Clone)]
pub struct ColumnDesc {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    pub column_length: u32,
    pub col_type: ColumnType,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDesc {
    pub fn is_unsigned(&self) -> bool {
        self.flags & column_flags::UNSIGNED_FLAG != 0
    }

    /// Binary-collated columns carry raw bytes rather than text.
    pub fn is_binary(&self) -> bool {
        self.charset == BINARY_CHARSET
    }
}

pub fn parse_column_definition(body: &[u8]) -> Result<ColumnDesc> {
    let mut pos = 0;
    let (_catalog, consumed) = read_lenenc_bytes(body, pos)?; // always "def"
    pos += consumed;
    let (schema, consumed) = read_lenenc_bytes(body, pos)?;
    pos += consumed;
    let (table, consumed) = read_lenenc_bytes(body, pos)?;
    pos += consumed;
    let (org_table, consumed) = read_lenenc_bytes(body, pos)?;
    pos += consumed;
    let (name, consumed) = read_lenenc_bytes(body, pos)?;
    pos += consumed;
    let (org_name, consumed) = read_lenenc_bytes(body, pos)?;
    pos += consumed;
    let (_fixed_len, consumed) = read_lenenc_int(body, pos)?; // always 0x0c
    pos += consumed;

    need(body, pos, 10)?;
    let charset = read_u16_le(body, pos);
    let column_length = read_u32_le(body, pos + 2);
    let col_type = ColumnType::from(body[pos + 6]);
    let flags = read_u16_le(body, pos + 7);
    let decimals = body[pos + 9];

    Ok(ColumnDesc {
        schema: String::from_utf8_lossy(schema).into_owned(),
        table: String::from_utf8_lossy(table).into_owned(),
        org_table: String::from_utf8_lossy(org_table).into_owned(),
        name: String::from_utf8_lossy(name).into_owned(),
        org_name: String::from_utf8_lossy(org_name).into_owned(),
        charset,
        column_length,
        col_type,
        flags,
        decimals,
    })
}

/// The first packet of a COM_STMT_PREPARE response.
#[derive(Debug, Clone, Copy)]
pub struct PrepareOk {
    pub statement_id: u32,
    pub num_columns: u16,
    pub num_params: u16,
    pub warnings: u16,
}

pub fn parse_prepare_ok(body: &[u8]) -> Result<PrepareOk> {
    need(body, 0, 12)?;
    if body[0] != marker::OK {
        return Err(Error::Protocol("expected prepare OK packet".to_string()));
    }
    Ok(PrepareOk {
        statement_id: read_u32_le(body, 1),
        num_columns: read_u16_le(body, 5),
        num_params: read_u16_le(body, 7),
        warnings: read_u16_le(body, 10),
    })
}

/// Parse one text-protocol row. NULL columns arrive as a lone 0xfb byte,
/// everything else as length-encoded bytes.
pub fn parse_text_row(body: &[u8], columns: &[ColumnDesc]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(columns.len());
    let mut pos = 0;
    for col in columns {
        if body.get(pos) == Some(&marker::NULL_VALUE) {
            values.push(Value::Null);
            pos += 1;
            continue;
        }
        let (data, consumed) = read_lenenc_bytes(body, pos)?;
        pos += consumed;
        values.push(Value::from_text(
            col.col_type,
            col.is_unsigned(),
            col.is_binary(),
            data,
        )?);
    }
    Ok(values)
}

/// Parse one binary-protocol row: a 0x00 header, a NULL bitmap with a
/// two-bit offset, then the non-NULL values in column order.
pub fn parse_binary_row(body: &[u8], columns: &[ColumnDesc]) -> Result<Vec<Value>> {
    if body.first() != Some(&0x00) {
        return Err(Error::Protocol("expected binary row packet".to_string()));
    }
    let bitmap_len = (columns.len() + 9) / 8;
    need(body, 1, bitmap_len)?;
    let bitmap = &body[1..1 + bitmap_len];

    let mut values = Vec::with_capacity(columns.len());
    let mut pos = 1 + bitmap_len;
    for (i, col) in columns.iter().enumerate() {
        let bit = i + 2;
        if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
            values.push(Value::Null);
            continue;
        }
        let (value, consumed) = Value::from_binary(
            col.col_type,
            col.is_unsigned(),
            col.is_binary(),
            body,
            pos,
        )?;
        pos += consumed;
        values.push(value);
    }
    Ok(values)
}

// ─── Helper Functions ──────────────────────────────────────────

pub fn put_u16_le(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn put_u24_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes()[..3]);
}

pub fn put_u32_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn put_u64_le(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn put_cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

pub fn put_lenenc_int(buf: &mut Vec<u8>, value: u64) {
    if value < 0xfb {
        buf.push(value as u8);
    } else if value <= 0xffff {
        buf.push(0xfc);
        put_u16_le(buf, value as u16);
    } else if value <= 0xff_ffff {
        buf.push(0xfd);
        put_u24_le(buf, value as u32);
    } else {
        buf.push(0xfe);
        put_u64_le(buf, value);
    }
}

pub fn put_lenenc_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    put_lenenc_int(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

pub fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub fn read_u24_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], 0])
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

pub fn read_u64_le(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
        buf[offset + 4],
        buf[offset + 5],
        buf[offset + 6],
        buf[offset + 7],
    ])
}

/// Read a NUL-terminated string from `buf[offset..]`. Returns the string
/// and bytes consumed (including the terminator).
pub fn read_cstring(buf: &[u8], offset: usize) -> (&str, usize) {
    let start = offset;
    let mut end = start;
    while end < buf.len() && buf[end] != 0 {
        end += 1;
    }
    let s = std::str::from_utf8(&buf[start..end]).unwrap_or("");
    (s, end - start + 1)
}

/// Read a length-encoded integer. Returns the value and bytes consumed.
pub fn read_lenenc_int(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    need(buf, offset, 1)?;
    match buf[offset] {
        v @ 0..=0xfa => Ok((v as u64, 1)),
        0xfc => {
            need(buf, offset + 1, 2)?;
            Ok((read_u16_le(buf, offset + 1) as u64, 3))
        }
        0xfd => {
            need(buf, offset + 1, 3)?;
            Ok((read_u24_le(buf, offset + 1) as u64, 4))
        }
        0xfe => {
            need(buf, offset + 1, 8)?;
            Ok((read_u64_le(buf, offset + 1), 9))
        }
        other => Err(Error::Protocol(format!(
            "invalid length-encoded integer marker 0x{other:02x}"
        ))),
    }
}

/// Read length-encoded bytes. Returns the slice and bytes consumed.
pub fn read_lenenc_bytes(buf: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let (len, head) = read_lenenc_int(buf, offset)?;
    let len = len as usize;
    need(buf, offset + head, len)?;
    Ok((&buf[offset + head..offset + head + len], head + len))
}

fn need(buf: &[u8], offset: usize, bytes: usize) -> Result<()> {
    if offset + bytes > buf.len() {
        return Err(Error::Protocol(format!(
            "truncated packet: need {bytes} bytes at offset {offset}, have {}",
            buf.len().saturating_sub(offset)
        )));
    }
    Ok(())
}
