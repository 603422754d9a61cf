use crate::common::Result;
use crate::types::{Constant, Schema, Tuple};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A reference to a column, optionally qualified by its table:
/// `citizen.age` or just `age`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub table: Option<String>,
    pub name: String,
}

impl FieldRef {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> FieldRef {
        FieldRef {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    pub fn bare(name: impl Into<String>) -> FieldRef {
        FieldRef {
            table: None,
            name: name.into(),
        }
    }

    /// Position of the referenced column within `schema`.
    pub fn resolve(&self, schema: &Schema) -> Result<usize> {
        schema
            .index_of(self.table.as_deref(), &self.name)
            .ok_or_else(|| {
                crate::common::Error::InvalidInput(format!("unknown field {self}"))
            })
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A leaf of the expression tree: a literal constant or a column reference
/// evaluated against the current tuple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TableValue {
    Constant(Constant),
    Field(FieldRef),
}

impl TableValue {
    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Result<Constant> {
        match self {
            TableValue::Constant(constant) => Ok(constant.clone()),
            TableValue::Field(field) => Ok(tuple.constant(field.resolve(schema)?)),
        }
    }
}

impl From<Constant> for TableValue {
    fn from(constant: Constant) -> TableValue {
        TableValue::Constant(constant)
    }
}

impl From<FieldRef> for TableValue {
    fn from(field: FieldRef) -> TableValue {
        TableValue::Field(field)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermOperand {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

/// A single comparison between two table values.
///
/// Values of different kinds are never ordered: every comparison except
/// `!=` evaluates to false between a number and a string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub op: TermOperand,
    pub lhs: TableValue,
    pub rhs: TableValue,
}

impl Term {
    pub fn new(op: TermOperand, lhs: impl Into<TableValue>, rhs: impl Into<TableValue>) -> Term {
        Term {
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Result<bool> {
        let lhs = self.lhs.evaluate(tuple, schema)?;
        let rhs = self.rhs.evaluate(tuple, schema)?;
        let ordering = lhs.partial_cmp(&rhs);
        Ok(match self.op {
            TermOperand::Equal => lhs == rhs,
            TermOperand::NotEqual => lhs != rhs,
            TermOperand::Greater => ordering == Some(Ordering::Greater),
            TermOperand::GreaterEqual => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
            TermOperand::Less => ordering == Some(Ordering::Less),
            TermOperand::LessEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        })
    }
}

/// A boolean combination of terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Term(Term),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn and(lhs: Predicate, rhs: Predicate) -> Predicate {
        Predicate::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Predicate, rhs: Predicate) -> Predicate {
        Predicate::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Result<bool> {
        match self {
            Predicate::Term(term) => term.evaluate(tuple, schema),
            Predicate::And(lhs, rhs) => {
                Ok(lhs.evaluate(tuple, schema)? && rhs.evaluate(tuple, schema)?)
            }
            Predicate::Or(lhs, rhs) => {
                Ok(lhs.evaluate(tuple, schema)? || rhs.evaluate(tuple, schema)?)
            }
        }
    }
}

impl From<Term> for Predicate {
    fn from(term: Term) -> Predicate {
        Predicate::Term(term)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// An ORDER BY key: the column to sort on and the direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: FieldRef,
    pub order: SortOrder,
}

/// A tuple comparator bound to a concrete schema, generated from a
/// [`SortKey`] once the input schema is known.
#[derive(Clone, Debug)]
pub struct SortComparator {
    index: usize,
    order: SortOrder,
}

impl SortComparator {
    pub fn generate(key: &SortKey, schema: &Schema) -> Result<SortComparator> {
        Ok(SortComparator {
            index: key.field.resolve(schema)?,
            order: key.order,
        })
    }

    pub fn key_of(&self, tuple: &Tuple) -> Constant {
        tuple.constant(self.index)
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn compare(&self, lhs: &Tuple, rhs: &Tuple) -> Ordering {
        let ordering = self.key_of(lhs).total_cmp(&self.key_of(rhs));
        match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}
