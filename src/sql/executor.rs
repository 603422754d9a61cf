use crate::common::Result;
use crate::errinput;
use crate::sql::catalog::Catalog;
use crate::sql::execution::{
    create_sorted_temp_table, ModifyScan, ModifyTableScan, ProductScan, ProjectScan, Scan,
    SelectModifyScan, SelectScan, TableScan,
};
use crate::sql::parser::{
    CreateTableStmt, DeleteStmt, InsertStmt, Parser, SelectStmt, Statement, UpdateStmt,
};
use crate::storage::heap;
use crate::storage::resource::ResourceManagerHandle;
use crate::types::{Constant, Schema, Tuple};
use log::{debug, info};
use std::sync::Arc;

/// How many run files one merge pass folds together.
const SORT_MERGE_FANIN: usize = 8;

/// Outcome of one executed statement.
#[derive(Debug)]
pub enum ExecutionResult {
    CreateTable { name: String },
    Insert { count: u64 },
    Select { columns: Vec<String>, rows: Vec<Tuple> },
    Update { count: u64 },
    Delete { count: u64 },
}

/// Builds and drains operator trees for parsed statements.
///
/// Query plans are assembled in a fixed shape: table scans at the leaves, a
/// left-deep chain of products across the FROM tables, a selection, a
/// projection, and finally an external sort when ORDER BY asks for one.
pub struct Executor {
    rm: ResourceManagerHandle,
    catalog: Catalog,
}

impl Executor {
    pub fn new(rm: &ResourceManagerHandle) -> Result<Executor> {
        Ok(Executor {
            rm: Arc::clone(rm),
            catalog: Catalog::open(rm)?,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Parses and executes a single SQL statement.
    pub fn execute_sql(&self, sql: &str) -> Result<ExecutionResult> {
        self.execute(Parser::parse(sql)?)
    }

    pub fn execute(&self, statement: Statement) -> Result<ExecutionResult> {
        match statement {
            Statement::CreateTable(stmt) => self.execute_create_table(stmt),
            Statement::Insert(stmt) => self.execute_insert(stmt),
            Statement::Select(stmt) => self.execute_select(stmt),
            Statement::Update(stmt) => self.execute_update(stmt),
            Statement::Delete(stmt) => self.execute_delete(stmt),
        }
    }

    fn execute_create_table(&self, stmt: CreateTableStmt) -> Result<ExecutionResult> {
        if self.catalog.table_exists(&stmt.table)? {
            return errinput!("table {} already exists", stmt.table);
        }

        let mut schema = Schema::new();
        for (name, field_type) in &stmt.columns {
            schema.add_field(&stmt.table, name, *field_type);
        }

        heap::create_heap_file(&self.rm, &stmt.table)?;
        self.catalog.register_table(&schema)?;
        info!("created table {}", stmt.table);
        Ok(ExecutionResult::CreateTable { name: stmt.table })
    }

    fn execute_insert(&self, stmt: InsertStmt) -> Result<ExecutionResult> {
        let schema = self.schema_of(&stmt.table)?;

        let mut tuples = Vec::with_capacity(stmt.rows.len());
        for row in &stmt.rows {
            let ordered = match &stmt.columns {
                None => row.clone(),
                Some(columns) => reorder_row(&schema, columns, row)?,
            };
            tuples.push(schema.tuple_from_constants(&ordered)?);
        }

        let count = tuples.len() as u64;
        heap::insert_tuples(&self.rm, &stmt.table, tuples)?;
        debug!("inserted {} tuples into {}", count, stmt.table);
        Ok(ExecutionResult::Insert { count })
    }

    fn execute_select(&self, stmt: SelectStmt) -> Result<ExecutionResult> {
        let schemas = self.catalog.schemas_for(&stmt.tables)?;

        // table scans, folded left-deep into a cartesian product chain
        let mut scan: Option<Box<dyn Scan>> = None;
        for table in &stmt.tables {
            let Some(schema) = schemas.get(table) else {
                return errinput!("table {table} does not exist");
            };
            let table_scan = Box::new(TableScan::new(table, &self.rm, schema.clone()));
            scan = Some(match scan {
                None => table_scan,
                Some(left) => Box::new(ProductScan::new(left, table_scan)),
            });
        }
        let Some(mut scan) = scan else {
            return errinput!("statement names no tables");
        };

        if let Some(predicate) = stmt.predicate {
            scan = Box::new(SelectScan::new(scan, predicate));
        }
        if !stmt.star {
            scan = Box::new(ProjectScan::new(scan, &stmt.fields)?);
        }
        if let Some(key) = &stmt.order_by {
            let page_budget = self.rm.read()?.block_size();
            let sorted =
                create_sorted_temp_table(page_budget, SORT_MERGE_FANIN, scan.as_mut(), key, &self.rm)?;
            scan = sorted;
        }

        let columns = scan.schema().labels();
        let mut rows = Vec::new();
        scan.get_first()?;
        while scan.next()? {
            rows.push(scan.get()?);
        }
        Ok(ExecutionResult::Select { columns, rows })
    }

    fn execute_update(&self, stmt: UpdateStmt) -> Result<ExecutionResult> {
        let schema = self.schema_of(&stmt.table)?;

        let mut scan: Box<dyn ModifyScan> =
            Box::new(ModifyTableScan::new(&stmt.table, &self.rm, schema)?);
        if let Some(predicate) = stmt.predicate.clone() {
            scan = Box::new(SelectModifyScan::new(scan, predicate));
        }

        let mut count = 0;
        scan.get_first()?;
        while scan.next()? {
            scan.update(&stmt)?;
            count += 1;
        }
        debug!("updated {} tuples in {}", count, stmt.table);
        Ok(ExecutionResult::Update { count })
    }

    fn execute_delete(&self, stmt: DeleteStmt) -> Result<ExecutionResult> {
        let schema = self.schema_of(&stmt.table)?;

        let mut scan: Box<dyn ModifyScan> =
            Box::new(ModifyTableScan::new(&stmt.table, &self.rm, schema)?);
        if let Some(predicate) = stmt.predicate {
            scan = Box::new(SelectModifyScan::new(scan, predicate));
        }

        let mut count = 0;
        scan.get_first()?;
        while scan.next()? {
            if scan.delete_tuple()? {
                count += 1;
            }
        }
        debug!("deleted {} tuples from {}", count, stmt.table);
        Ok(ExecutionResult::Delete { count })
    }

    fn schema_of(&self, table: &str) -> Result<Schema> {
        let mut schemas = self.catalog.schemas_for(&[table.to_string()])?;
        match schemas.remove(table) {
            Some(schema) => Ok(schema),
            None => errinput!("table {table} does not exist"),
        }
    }
}

/// Rearranges a VALUES row given in explicit column order into schema
/// order.
fn reorder_row(
    schema: &Schema,
    columns: &[String],
    row: &[Constant],
) -> Result<Vec<Constant>> {
    if columns.len() != row.len() {
        return errinput!(
            "row has {} values but {} columns were named",
            row.len(),
            columns.len()
        );
    }
    let mut ordered = Vec::with_capacity(schema.field_count());
    for i in 0..schema.field_count() {
        let field = schema.field_at(i);
        let Some(position) = columns.iter().position(|column| column == field) else {
            return errinput!("column {field} is missing from the column list");
        };
        ordered.push(row[position].clone());
    }
    Ok(ordered)
}
