use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A literal value: what predicates compare and what expression evaluation
/// produces. Values of different kinds never compare equal and have no
/// partial order between them; sorting falls back on a total order that
/// ranks numbers before strings.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
pub enum Constant {
    Num(i32),
    Str(String),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Num(a), Constant::Num(b)) => a == b,
            (Constant::Str(a), Constant::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Constant {
    fn partial_cmp(&self, other: &Constant) -> Option<Ordering> {
        match (self, other) {
            (Constant::Num(a), Constant::Num(b)) => a.partial_cmp(b),
            (Constant::Str(a), Constant::Str(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Constant {
    /// Total order used by the external sort.
    pub fn total_cmp(&self, other: &Constant) -> Ordering {
        match (self, other) {
            (Constant::Num(a), Constant::Num(b)) => a.cmp(b),
            (Constant::Str(a), Constant::Str(b)) => a.cmp(b),
            (Constant::Num(_), Constant::Str(_)) => Ordering::Less,
            (Constant::Str(_), Constant::Num(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Num(n) => n.fmt(f),
            Constant::Str(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<i32> for Constant {
    fn from(v: i32) -> Self {
        Constant::Num(v)
    }
}

impl From<&str> for Constant {
    fn from(v: &str) -> Self {
        Constant::Str(v.to_owned())
    }
}

impl From<String> for Constant {
    fn from(v: String) -> Self {
        Constant::Str(v)
    }
}

/// A materialized column value: the write side of the field codec. Each
/// variant knows its serialized length and how to write itself into a page.
///
/// On-disk encodings:
/// - `Int`: 4 little-endian bytes.
/// - `VarChar`: `logical_len (2) | physical_size (2) | logical_len bytes`;
///   a reader advances by `physical_size + 4`.
/// - `FixedChar(len)`: exactly `len` bytes, zero-padded, unterminated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i32),
    VarChar { value: String, physical: u16 },
    FixedChar { len: u16, value: String },
}

impl FieldValue {
    pub fn varchar(value: impl Into<String>) -> FieldValue {
        let value = value.into();
        let physical = value.len() as u16;
        FieldValue::VarChar { value, physical }
    }

    pub fn fixed_char(len: u16, value: impl Into<String>) -> FieldValue {
        FieldValue::FixedChar {
            len,
            value: value.into(),
        }
    }

    /// Serialized length in bytes.
    pub fn length(&self) -> u32 {
        match self {
            FieldValue::Int(_) => 4,
            FieldValue::VarChar { physical, .. } => *physical as u32 + 4,
            FieldValue::FixedChar { len, .. } => *len as u32,
        }
    }

    /// Writes the field into `buf` at `offset`.
    pub fn write(&self, buf: &mut [u8], offset: usize) {
        match self {
            FieldValue::Int(value) => {
                buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
            }
            FieldValue::VarChar { value, physical } => {
                let logical = value.len() as u16;
                buf[offset..offset + 2].copy_from_slice(&logical.to_le_bytes());
                buf[offset + 2..offset + 4].copy_from_slice(&physical.to_le_bytes());
                buf[offset + 4..offset + 4 + value.len()].copy_from_slice(value.as_bytes());
            }
            FieldValue::FixedChar { len, value } => {
                let len = *len as usize;
                let bytes = value.as_bytes();
                let copied = bytes.len().min(len);
                buf[offset..offset + copied].copy_from_slice(&bytes[..copied]);
                buf[offset + copied..offset + len].fill(0);
            }
        }
    }

    pub fn to_constant(&self) -> Constant {
        match self {
            FieldValue::Int(value) => Constant::Num(*value),
            FieldValue::VarChar { value, .. } => Constant::Str(value.clone()),
            FieldValue::FixedChar { value, .. } => Constant::Str(value.clone()),
        }
    }
}

// Compares stored content; physical sizes and pad widths don't participate.
impl PartialEq for FieldValue {
    fn eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            (FieldValue::VarChar { value: a, .. }, FieldValue::VarChar { value: b, .. }) => a == b,
            (
                FieldValue::FixedChar { value: a, .. },
                FieldValue::FixedChar { value: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(value) => value.fmt(f),
            FieldValue::VarChar { value, .. } | FieldValue::FixedChar { value, .. } => {
                f.write_str(value)
            }
        }
    }
}

/// An ordered list of field values, identified after insertion by
/// (page number, slot index).
#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    pub fields: Vec<FieldValue>,
    pub record_size: u32,
}

impl Tuple {
    pub fn new(fields: Vec<FieldValue>) -> Tuple {
        let record_size = fields.iter().map(FieldValue::length).sum();
        Tuple {
            fields,
            record_size,
        }
    }

    /// Replaces field `index`, keeping `record_size` consistent.
    pub fn set(&mut self, index: usize, field: FieldValue) {
        self.fields[index] = field;
        self.record_size = self.fields.iter().map(FieldValue::length).sum();
    }

    pub fn constant(&self, index: usize) -> Constant {
        self.fields[index].to_constant()
    }
}

impl From<Vec<FieldValue>> for Tuple {
    fn from(fields: Vec<FieldValue>) -> Tuple {
        Tuple::new(fields)
    }
}
