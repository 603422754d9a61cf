pub mod field;
pub mod schema;

pub use field::{Constant, FieldValue, Tuple};
pub use schema::Schema;

use crate::common::Result;
use crate::errinput;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column type: the read side of the field codec. Knows how to deserialize
/// a [`FieldValue`] out of raw page bytes and how to build one from a
/// constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Int,
    VarChar,
    FixedChar(u16),
}

static TYPE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(INT|VARCHAR|CHAR)(?:\((\d+)\))?$").unwrap());

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::VarChar => write!(f, "VARCHAR"),
            FieldType::FixedChar(len) => write!(f, "CHAR({len})"),
        }
    }
}

impl FieldType {
    /// Parses a serialized type string, e.g. `INT`, `VARCHAR(30)`, `CHAR(20)`.
    /// The length bound of a VARCHAR is declarative only; the stored form is
    /// self-describing.
    pub fn parse(text: &str) -> Result<FieldType> {
        let Some(caps) = TYPE_PATTERN.captures(text) else {
            return errinput!("unknown column type '{text}'");
        };
        let arg = caps.get(2).map(|m| m.as_str().parse::<u16>());
        match (&caps[1], arg) {
            ("INT", None) => Ok(FieldType::Int),
            ("VARCHAR", _) => Ok(FieldType::VarChar),
            ("CHAR", Some(Ok(len))) => Ok(FieldType::FixedChar(len)),
            _ => errinput!("unknown column type '{text}'"),
        }
    }

    /// Deserializes a field of this type from `buf` at `offset`.
    pub fn read(&self, buf: &[u8], offset: usize) -> FieldValue {
        match self {
            FieldType::Int => {
                let value = i32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
                FieldValue::Int(value)
            }
            FieldType::VarChar => {
                let logical =
                    u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap()) as usize;
                let physical = u16::from_le_bytes(buf[offset + 2..offset + 4].try_into().unwrap());
                let bytes = &buf[offset + 4..offset + 4 + logical];
                FieldValue::VarChar {
                    value: String::from_utf8_lossy(bytes).into_owned(),
                    physical,
                }
            }
            FieldType::FixedChar(len) => {
                let bytes = &buf[offset..offset + *len as usize];
                let value = String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .to_string();
                FieldValue::FixedChar {
                    len: *len,
                    value,
                }
            }
        }
    }

    /// Builds a field of this type from a constant, erroring on a type
    /// mismatch (e.g. a string literal in an INT column).
    pub fn from_constant(&self, constant: &Constant) -> Result<FieldValue> {
        match (self, constant) {
            (FieldType::Int, Constant::Num(n)) => Ok(FieldValue::Int(*n)),
            (FieldType::VarChar, Constant::Str(s)) => Ok(FieldValue::varchar(s.clone())),
            (FieldType::FixedChar(len), Constant::Str(s)) => {
                Ok(FieldValue::fixed_char(*len, s.clone()))
            }
            (field_type, constant) => {
                errinput!("cannot store {constant} in a column of type {field_type}")
            }
        }
    }
}
