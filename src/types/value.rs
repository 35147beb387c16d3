//! Typed scalar values and their fixed-width record encoding
//!
//! Every stored field is one of four attribute types. Records hold raw bytes;
//! `Value::decode` turns a field's bytes into a typed value and `Value::encode`
//! goes the other way. All comparisons go through `Value::compare`, which
//! refuses to order values of incompatible types.
//!
//! # Encoding
//!
//! ```text
//! Int    i32 little-endian, 4 bytes
//! Float  f32 little-endian, 4 bytes
//! Date   days from 0001-01-01 (CE) as i32 little-endian, 4 bytes
//! Char   UTF-8 bytes, zero padded to the declared field length
//! ```

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width in bytes of every fixed-size attribute type
pub const FIXED_WIDTH: usize = 4;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Attribute types a field can be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    /// Fixed-length character string
    Char,
    /// 32-bit signed integer
    Int,
    /// 32-bit floating point
    Float,
    /// Calendar date
    Date,
}

impl AttrType {
    /// Returns the type name used in messages and `DESC` output
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrType::Char => "char",
            AttrType::Int => "int",
            AttrType::Float => "float",
            AttrType::Date => "date",
        }
    }

    /// Integer and float are the only types AVG accepts
    pub fn is_numeric(&self) -> bool {
        matches!(self, AttrType::Int | AttrType::Float)
    }

    /// Byte width for types whose width does not depend on the declaration
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            AttrType::Char => None,
            _ => Some(FIXED_WIDTH),
        }
    }

    /// Stable one-byte tag used in on-disk index headers
    pub fn tag(&self) -> u8 {
        match self {
            AttrType::Char => 1,
            AttrType::Int => 2,
            AttrType::Float => 3,
            AttrType::Date => 4,
        }
    }

    /// Inverse of [`AttrType::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(AttrType::Char),
            2 => Some(AttrType::Int),
            3 => Some(AttrType::Float),
            4 => Some(AttrType::Date),
            _ => None,
        }
    }

    /// Two types can be ordered against each other
    pub fn comparable_with(&self, other: AttrType) -> bool {
        *self == other || (self.is_numeric() && other.is_numeric())
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Errors raised while comparing, converting or decoding values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("cannot compare {left} with {right}")]
    TypeMismatch {
        left: &'static str,
        right: &'static str,
    },

    #[error("field expects {expected} bytes, got {actual}")]
    WrongWidth { expected: usize, actual: usize },

    #[error("string of {len} bytes does not fit in char({max})")]
    TooLong { len: usize, max: usize },

    #[error("stored string is not valid UTF-8")]
    InvalidEncoding,

    #[error("invalid date literal: {0}")]
    InvalidDate(String),

    #[error("day number {0} is outside the supported date range")]
    InvalidDays(i32),
}

/// A typed, immutable scalar
///
/// Deserializes untagged so statement scripts can write `1`, `2.5` or `"abc"`.
/// Date literals are written as `"YYYY-MM-DD"` strings and converted when bound
/// against a date column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i32),
    Float(f32),
    Chars(String),
    Date(NaiveDate),
}

impl Value {
    /// Attribute type this value belongs to
    pub fn attr_type(&self) -> AttrType {
        match self {
            Value::Int(_) => AttrType::Int,
            Value::Float(_) => AttrType::Float,
            Value::Chars(_) => AttrType::Char,
            Value::Date(_) => AttrType::Date,
        }
    }

    /// Three-way comparison.
    ///
    /// Integers and floats compare numerically with each other. Any other pair
    /// of differing types is a `TypeMismatch`.
    pub fn compare(&self, other: &Value) -> Result<Ordering, ValueError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Chars(a), Value::Chars(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
            (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Ok(compare_floats(x, y)),
                _ => Err(ValueError::TypeMismatch {
                    left: a.attr_type().type_name(),
                    right: b.attr_type().type_name(),
                }),
            },
        }
    }

    /// Numeric view of integers and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::Float(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Converts a literal so it can be stored in, or compared against, a field of `target` type.
    ///
    /// Strings become dates when the target is a date column; integers widen to
    /// floats for float columns. Everything else must already match.
    pub fn coerce_to(&self, target: AttrType) -> Result<Value, ValueError> {
        match (self, target) {
            (v, t) if v.attr_type() == t => Ok(v.clone()),
            (Value::Int(v), AttrType::Float) => Ok(Value::Float(*v as f32)),
            (Value::Chars(s), AttrType::Date) => parse_date(s).map(Value::Date),
            (v, t) => Err(ValueError::TypeMismatch {
                left: v.attr_type().type_name(),
                right: t.type_name(),
            }),
        }
    }

    /// Encodes into exactly `width` bytes
    pub fn encode(&self, width: usize) -> Result<Vec<u8>, ValueError> {
        let bytes = match self {
            Value::Int(v) => v.to_le_bytes().to_vec(),
            Value::Float(v) => v.to_le_bytes().to_vec(),
            Value::Date(d) => d.num_days_from_ce().to_le_bytes().to_vec(),
            Value::Chars(s) => {
                if s.len() > width {
                    return Err(ValueError::TooLong {
                        len: s.len(),
                        max: width,
                    });
                }
                let mut out = s.as_bytes().to_vec();
                out.resize(width, 0);
                return Ok(out);
            }
        };
        if bytes.len() != width {
            return Err(ValueError::WrongWidth {
                expected: width,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    /// Decodes a field's raw bytes
    pub fn decode(attr_type: AttrType, bytes: &[u8]) -> Result<Value, ValueError> {
        match attr_type {
            AttrType::Int => Ok(Value::Int(i32::from_le_bytes(fixed(bytes)?))),
            AttrType::Float => Ok(Value::Float(f32::from_le_bytes(fixed(bytes)?))),
            AttrType::Date => {
                let days = i32::from_le_bytes(fixed(bytes)?);
                NaiveDate::from_num_days_from_ce_opt(days)
                    .map(Value::Date)
                    .ok_or(ValueError::InvalidDays(days))
            }
            AttrType::Char => {
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                std::str::from_utf8(&bytes[..end])
                    .map(|s| Value::Chars(s.to_string()))
                    .map_err(|_| ValueError::InvalidEncoding)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Chars(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Chars(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

/// Parses a `YYYY-MM-DD` date literal
pub fn parse_date(s: &str) -> Result<NaiveDate, ValueError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| ValueError::InvalidDate(s.to_string()))
}

/// Rounds half away from zero at two decimal places
pub fn round_to_cents(v: f32) -> f32 {
    (100.0 * v).round() / 100.0
}

/// Renders a float with at most two decimals, dropping trailing zeros
pub fn format_float(v: f32) -> String {
    let text = format!("{:.2}", v);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn compare_floats(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

fn fixed(bytes: &[u8]) -> Result<[u8; FIXED_WIDTH], ValueError> {
    bytes.try_into().map_err(|_| ValueError::WrongWidth {
        expected: FIXED_WIDTH,
        actual: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_compare_same_types() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)).unwrap(), Ordering::Less);
        assert_eq!(
            Value::from("b").compare(&Value::from("a")).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            date(2021, 1, 1).compare(&date(2021, 1, 1)).unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn test_compare_int_with_float() {
        assert_eq!(
            Value::Int(2).compare(&Value::Float(1.5)).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            Value::Float(3.0).compare(&Value::Int(3)).unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn test_compare_incompatible_fails() {
        let err = Value::Int(1).compare(&Value::from("1")).unwrap_err();
        assert!(matches!(err, ValueError::TypeMismatch { .. }));
        assert!(date(2020, 5, 5).compare(&Value::Int(5)).is_err());
    }

    #[test]
    fn test_char_encoding_pads_and_strips() {
        let bytes = Value::from("ab").encode(4).unwrap();
        assert_eq!(bytes, vec![b'a', b'b', 0, 0]);
        assert_eq!(Value::decode(AttrType::Char, &bytes).unwrap(), Value::from("ab"));
    }

    #[test]
    fn test_char_too_long_rejected() {
        let err = Value::from("abcdef").encode(4).unwrap_err();
        assert_eq!(err, ValueError::TooLong { len: 6, max: 4 });
    }

    #[test]
    fn test_date_encoding() {
        let d = date(2021, 10, 16);
        let bytes = d.encode(FIXED_WIDTH).unwrap();
        assert_eq!(Value::decode(AttrType::Date, &bytes).unwrap(), d);
    }

    #[test]
    fn test_decode_wrong_width() {
        let err = Value::decode(AttrType::Int, &[1, 2]).unwrap_err();
        assert_eq!(err, ValueError::WrongWidth { expected: 4, actual: 2 });
    }

    #[test]
    fn test_coerce_date_literal() {
        let v = Value::from("2021-1-5").coerce_to(AttrType::Date).unwrap();
        assert_eq!(v, date(2021, 1, 5));
        assert!(Value::from("2021-02-30").coerce_to(AttrType::Date).is_err());
    }

    #[test]
    fn test_coerce_int_to_float() {
        assert_eq!(Value::Int(3).coerce_to(AttrType::Float).unwrap(), Value::Float(3.0));
        assert!(Value::Float(3.0).coerce_to(AttrType::Int).is_err());
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(round_to_cents(0.125), 0.13);
        assert_eq!(round_to_cents(-0.125), -0.13);
        assert_eq!(round_to_cents(1.0 / 3.0), 0.33);
        // 2.675 is stored just below the half cent; scaling in f32 lands on it
        assert_eq!(round_to_cents(2.675), 2.68);
    }

    #[test]
    fn test_float_display() {
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Float(2.0).to_string(), "2");
        assert_eq!(Value::Float(3.14159).to_string(), "3.14");
        assert_eq!(date(2021, 3, 9).to_string(), "2021-03-09");
    }

    #[test]
    fn test_untagged_deserialize() {
        let values: Vec<Value> = serde_json::from_str(r#"[1, 2.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![Value::Int(1), Value::Float(2.5), Value::from("x")]
        );
    }
}
