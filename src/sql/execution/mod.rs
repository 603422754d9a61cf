//! The volcano iterator pipeline: every operator speaks the same
//! `get_first` / `next` / `get` contract and tuples flow lazily from the
//! leaves (table scans) to the root.
mod merge_sort;
mod modify;
mod product_scan;
mod project_scan;
mod select_scan;
mod table_scan;
mod temp_table;

#[cfg(test)]
mod tests;

pub use merge_sort::create_sorted_temp_table;
pub use modify::{ModifyTableScan, ProductModifyScan, SelectModifyScan};
pub use product_scan::ProductScan;
pub use project_scan::ProjectScan;
pub use select_scan::SelectScan;
pub use table_scan::TableScan;
pub use temp_table::{next_temp_name, TableScanTemp, TempTableScan};

use crate::common::Result;
use crate::sql::parser::UpdateStmt;
use crate::types::{Schema, Tuple};

/// Uniform cursor contract for all pipeline operators.
///
/// `get_first` positions before the first tuple and must be called exactly
/// once before any `next`; `get` is only defined while the last `next`
/// returned true.
pub trait Scan {
    fn get_first(&mut self) -> Result<bool>;
    fn next(&mut self) -> Result<bool>;
    fn get(&mut self) -> Result<Tuple>;
    fn schema(&self) -> &Schema;
}

/// A scan that can also mutate the tuple under its cursor.
pub trait ModifyScan: Scan {
    /// Applies the statement's SET list to the current tuple, rewriting in
    /// place when the new record fits and relocating it otherwise.
    fn update(&mut self, stmt: &UpdateStmt) -> Result<()>;
    /// Marks the current tuple's slot free and gives its bytes back to the
    /// directory's accounting. The data region is not compacted.
    fn delete_tuple(&mut self) -> Result<bool>;
}
