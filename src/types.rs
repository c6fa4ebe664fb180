//! MySQL value and parameter types.

use crate::codec::read_lenenc_bytes;
use crate::error::{Error, Result};
use crate::protocol::ColumnType;

/// A value read from a result set column.
///
/// Integers and floats keep their native width and signedness; no value is
/// silently stringified on the way out of the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for the values a loosely-typed caller would treat as "empty":
    /// NULL, numeric zero, the empty string, the string `"0"`, and empty
    /// byte strings. Exists so code ported from languages that conflate
    /// these can keep its old behavior on purpose rather than by accident.
    pub fn is_empty_equivalent(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Int(v) => *v == 0,
            Value::UInt(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Text(s) => s.is_empty() || s == "0",
            Value::Bytes(b) => b.is_empty(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::UInt(v) => Some(*v),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Parse a text-protocol column value based on its column type.
    pub fn from_text(
        col_type: ColumnType,
        unsigned: bool,
        binary: bool,
        data: &[u8],
    ) -> Result<Self> {
        match col_type {
            ColumnType::Tiny
            | ColumnType::Short
            | ColumnType::Long
            | ColumnType::Int24
            | ColumnType::LongLong
            | ColumnType::Year => {
                let s = text_str(data);
                if unsigned {
                    Ok(Value::UInt(s.parse().map_err(|_| {
                        Error::TypeConversion(format!("invalid unsigned integer: {s:?}"))
                    })?))
                } else {
                    Ok(Value::Int(s.parse().map_err(|_| {
                        Error::TypeConversion(format!("invalid integer: {s:?}"))
                    })?))
                }
            }
            ColumnType::Float | ColumnType::Double => {
                let s = text_str(data);
                Ok(Value::Float(s.parse().map_err(|_| {
                    Error::TypeConversion(format!("invalid float: {s:?}"))
                })?))
            }
            ColumnType::Null => Ok(Value::Null),
            // DECIMAL stays textual so no precision is lost.
            ColumnType::Decimal | ColumnType::NewDecimal => Ok(Value::Text(text_str(data))),
            ColumnType::Bit | ColumnType::Geometry => Ok(Value::Bytes(data.to_vec())),
            _ if binary => Ok(Value::Bytes(data.to_vec())),
            _ => Ok(Value::Text(text_str(data))),
        }
    }

    /// Parse one binary-protocol column value starting at `buf[pos]`.
    /// Returns the value and the number of bytes consumed.
    pub fn from_binary(
        col_type: ColumnType,
        unsigned: bool,
        binary: bool,
        buf: &[u8],
        pos: usize,
    ) -> Result<(Self, usize)> {
        match col_type {
            ColumnType::Tiny => {
                let b = *buf.get(pos).ok_or_else(short_row)?;
                let v = if unsigned {
                    Value::UInt(b as u64)
                } else {
                    Value::Int(b as i8 as i64)
                };
                Ok((v, 1))
            }
            ColumnType::Short | ColumnType::Year => {
                let raw = fixed::<2>(buf, pos)?;
                let v = if unsigned {
                    Value::UInt(u16::from_le_bytes(raw) as u64)
                } else {
                    Value::Int(i16::from_le_bytes(raw) as i64)
                };
                Ok((v, 2))
            }
            ColumnType::Long | ColumnType::Int24 => {
                let raw = fixed::<4>(buf, pos)?;
                let v = if unsigned {
                    Value::UInt(u32::from_le_bytes(raw) as u64)
                } else {
                    Value::Int(i32::from_le_bytes(raw) as i64)
                };
                Ok((v, 4))
            }
            ColumnType::LongLong => {
                let raw = fixed::<8>(buf, pos)?;
                let v = if unsigned {
                    Value::UInt(u64::from_le_bytes(raw))
                } else {
                    Value::Int(i64::from_le_bytes(raw))
                };
                Ok((v, 8))
            }
            ColumnType::Float => {
                let raw = fixed::<4>(buf, pos)?;
                Ok((Value::Float(f32::from_le_bytes(raw) as f64), 4))
            }
            ColumnType::Double => {
                let raw = fixed::<8>(buf, pos)?;
                Ok((Value::Float(f64::from_le_bytes(raw)), 8))
            }
            ColumnType::Date | ColumnType::DateTime | ColumnType::Timestamp => {
                decode_binary_datetime(col_type, buf, pos)
            }
            ColumnType::Time => decode_binary_time(buf, pos),
            ColumnType::Null => Ok((Value::Null, 0)),
            _ => {
                // Everything else is length-prefixed: strings, blobs,
                // DECIMAL, BIT, JSON, ENUM, SET.
                let (data, consumed) = read_lenenc_bytes(buf, pos)?;
                let v = match col_type {
                    ColumnType::Decimal | ColumnType::NewDecimal => Value::Text(text_str(data)),
                    ColumnType::Bit | ColumnType::Geometry => Value::Bytes(data.to_vec()),
                    _ if binary => Value::Bytes(data.to_vec()),
                    _ => Value::Text(text_str(data)),
                };
                Ok((v, consumed))
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

fn text_str(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn short_row() -> Error {
    Error::Protocol("binary row shorter than its column types require".to_string())
}

fn fixed<const N: usize>(buf: &[u8], pos: usize) -> Result<[u8; N]> {
    buf.get(pos..pos + N)
        .and_then(|s| <[u8; N]>::try_from(s).ok())
        .ok_or_else(short_row)
}

/// Binary DATE/DATETIME/TIMESTAMP: a length byte (0, 4, 7 or 11) followed
/// by little-endian year/month/day[/hour/min/sec[/micros]] fields. Rendered
/// to the same strings the text protocol produces.
fn decode_binary_datetime(col_type: ColumnType, buf: &[u8], pos: usize) -> Result<(Value, usize)> {
    let len = *buf.get(pos).ok_or_else(short_row)? as usize;
    let body = buf.get(pos + 1..pos + 1 + len).ok_or_else(short_row)?;

    let (mut year, mut month, mut day) = (0u16, 0u8, 0u8);
    let (mut hour, mut minute, mut second) = (0u8, 0u8, 0u8);
    let mut micros = 0u32;
    if len >= 4 {
        year = u16::from_le_bytes([body[0], body[1]]);
        month = body[2];
        day = body[3];
    }
    if len >= 7 {
        hour = body[4];
        minute = body[5];
        second = body[6];
    }
    if len >= 11 {
        micros = u32::from_le_bytes([body[7], body[8], body[9], body[10]]);
    }

    let mut s = format!("{year:04}-{month:02}-{day:02}");
    if col_type != ColumnType::Date {
        s.push_str(&format!(" {hour:02}:{minute:02}:{second:02}"));
        if micros > 0 {
            s.push_str(&format!(".{micros:06}"));
        }
    }
    Ok((Value::Text(s), 1 + len))
}

/// Binary TIME: a length byte (0, 8 or 12) followed by sign, days and
/// hour/min/sec[/micros]. MySQL TIME is a duration, so hours may exceed 23.
fn decode_binary_time(buf: &[u8], pos: usize) -> Result<(Value, usize)> {
    let len = *buf.get(pos).ok_or_else(short_row)? as usize;
    let body = buf.get(pos + 1..pos + 1 + len).ok_or_else(short_row)?;

    if len == 0 {
        return Ok((Value::Text("00:00:00".to_string()), 1));
    }
    if len < 8 {
        return Err(short_row());
    }
    let negative = body[0] != 0;
    let days = u32::from_le_bytes([body[1], body[2], body[3], body[4]]) as u64;
    let (hour, minute, second) = (body[5], body[6], body[7]);
    let micros = if len >= 12 {
        u32::from_le_bytes([body[8], body[9], body[10], body[11]])
    } else {
        0
    };

    let hours = days * 24 + hour as u64;
    let sign = if negative { "-" } else { "" };
    let mut s = format!("{sign}{hours:02}:{minute:02}:{second:02}");
    if micros > 0 {
        s.push_str(&format!(".{micros:06}"));
    }
    Ok((Value::Text(s), 1 + len))
}

// ─── Parameters ────────────────────────────────────────────────

/// A statement parameter as it goes over the wire.
///
/// The binding policy is deliberately narrow: signed and unsigned integers
/// bind as native 8-byte integers, NULL binds as NULL, and everything else
/// binds as a string. Floats use their shortest round-trip decimal form and
/// booleans bind as `"1"` / `"0"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Null,
    Int(i64),
    UInt(u64),
    Text(String),
    Bytes(Vec<u8>),
}

/// Convenience trait for passing Rust values as statement parameters.
pub trait ToParam {
    fn to_param(&self) -> Param;
}

macro_rules! to_param_int {
    ($($t:ty),*) => {
        $(impl ToParam for $t {
            fn to_param(&self) -> Param {
                Param::Int(*self as i64)
            }
        })*
    };
}

to_param_int!(i8, i16, i32, i64, isize, u8, u16, u32);

impl ToParam for u64 {
    fn to_param(&self) -> Param {
        Param::UInt(*self)
    }
}
impl ToParam for usize {
    fn to_param(&self) -> Param {
        Param::UInt(*self as u64)
    }
}
impl ToParam for f32 {
    fn to_param(&self) -> Param {
        Param::Text(self.to_string())
    }
}
impl ToParam for f64 {
    fn to_param(&self) -> Param {
        Param::Text(self.to_string())
    }
}
impl ToParam for bool {
    fn to_param(&self) -> Param {
        Param::Text(if *self { "1" } else { "0" }.to_string())
    }
}
impl ToParam for &str {
    fn to_param(&self) -> Param {
        Param::Text(self.to_string())
    }
}
impl ToParam for String {
    fn to_param(&self) -> Param {
        Param::Text(self.clone())
    }
}
impl ToParam for &[u8] {
    fn to_param(&self) -> Param {
        Param::Bytes(self.to_vec())
    }
}
impl ToParam for Vec<u8> {
    fn to_param(&self) -> Param {
        Param::Bytes(self.clone())
    }
}
impl<T: ToParam> ToParam for Option<T> {
    fn to_param(&self) -> Param {
        match self {
            Some(v) => v.to_param(),
            None => Param::Null,
        }
    }
}
impl ToParam for Param {
    fn to_param(&self) -> Param {
        self.clone()
    }
}
impl ToParam for Value {
    fn to_param(&self) -> Param {
        match self {
            Value::Null => Param::Null,
            Value::Int(v) => Param::Int(*v),
            Value::UInt(v) => Param::UInt(*v),
            Value::Float(v) => Param::Text(v.to_string()),
            Value::Text(s) => Param::Text(s.clone()),
            Value::Bytes(b) => Param::Bytes(b.clone()),
        }
    }
}
