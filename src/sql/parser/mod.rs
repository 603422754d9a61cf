//! Turns raw SQL text into the tagged statement values the executor
//! consumes.
mod lexer;
mod parser;
pub mod statement;

pub use lexer::{Keyword, Lexer, Token};
pub use parser::Parser;
pub use statement::{
    CreateTableStmt, DeleteStmt, InsertStmt, SelectStmt, Statement, UpdateStmt,
};
