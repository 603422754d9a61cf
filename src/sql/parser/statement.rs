use crate::query::{FieldRef, Predicate, SortKey, TableValue};
use crate::types::{Constant, FieldType};

/// A parsed SQL statement, ready for the executor.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    CreateTable(CreateTableStmt),
    Insert(InsertStmt),
    Select(SelectStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateTableStmt {
    pub table: String,
    pub columns: Vec<(String, FieldType)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InsertStmt {
    pub table: String,
    /// Explicit column order, when the statement names one.
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Vec<Constant>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectStmt {
    /// Projected columns; empty with `star` set for `SELECT *`.
    pub fields: Vec<FieldRef>,
    pub star: bool,
    /// The FROM table followed by any JOINed tables, in appearance order.
    pub tables: Vec<String>,
    /// WHERE combined (by AND) with any JOIN ... ON conditions.
    pub predicate: Option<Predicate>,
    pub order_by: Option<SortKey>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateStmt {
    pub table: String,
    /// SET assignments: target column and the value expression, which may
    /// reference columns of the current tuple.
    pub assignments: Vec<(FieldRef, TableValue)>,
    pub predicate: Option<Predicate>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteStmt {
    pub table: String,
    pub predicate: Option<Predicate>,
}
