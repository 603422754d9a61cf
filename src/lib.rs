#![crate_type = "lib"]
#![crate_name = "heapdb"]

pub mod common;
pub mod config;
pub mod query;
pub mod sql;
pub mod storage;
pub mod types;
