use crate::common::Result;
use crate::query::{FieldRef, Predicate, Term, TermOperand};
use crate::sql::execution::{Scan, SelectScan, TableScan};
use crate::storage::heap;
use crate::storage::resource::ResourceManagerHandle;
use crate::types::{Constant, FieldType, Schema, Tuple};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the system table holding one row per (table, column).
pub const SCHEMA_TABLE: &str = "schema";

const TABLE_NAME: &str = "table_name";
const FIELD_NAME: &str = "field_name";
const FIELD_TYPE: &str = "field_type";
const FIELD_ORDER: &str = "field_order";

/// The schema of the schema table itself: it is stored as ordinary tuples
/// in an ordinary heap file.
pub fn schema_table_schema() -> Schema {
    let mut schema = Schema::new();
    schema.add_field(SCHEMA_TABLE, TABLE_NAME, FieldType::VarChar);
    schema.add_field(SCHEMA_TABLE, FIELD_NAME, FieldType::VarChar);
    schema.add_field(SCHEMA_TABLE, FIELD_TYPE, FieldType::VarChar);
    schema.add_field(SCHEMA_TABLE, FIELD_ORDER, FieldType::Int);
    schema
}

/// The self-describing system catalog, constructed at database open. The
/// backing heap file is created on the first open of a fresh database.
pub struct Catalog {
    rm: ResourceManagerHandle,
}

impl Catalog {
    pub fn open(rm: &ResourceManagerHandle) -> Result<Catalog> {
        if !rm.read()?.file_manager.file_exists(SCHEMA_TABLE) {
            heap::create_heap_file(rm, SCHEMA_TABLE)?;
        }
        Ok(Catalog {
            rm: Arc::clone(rm),
        })
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        Ok(!self
            .schemas_for(&[table_name.to_string()])?
            .is_empty())
    }

    /// Reconstructs the schema of each named table: scan the schema table
    /// with an OR-disjunction over the names, order the matches by column
    /// position, and re-parse each serialized type string.
    pub fn schemas_for(&self, table_names: &[String]) -> Result<HashMap<String, Schema>> {
        if table_names.is_empty() {
            return Ok(HashMap::new());
        }

        let name_matches = |name: &String| {
            Predicate::Term(Term::new(
                TermOperand::Equal,
                FieldRef::new(SCHEMA_TABLE, TABLE_NAME),
                Constant::from(name.clone()),
            ))
        };
        let predicate = table_names[1..]
            .iter()
            .fold(name_matches(&table_names[0]), |acc, name| {
                Predicate::or(acc, name_matches(name))
            });

        let table_scan = Box::new(TableScan::new(SCHEMA_TABLE, &self.rm, schema_table_schema()));
        let mut scan = SelectScan::new(table_scan, predicate);

        let mut rows: Vec<Tuple> = Vec::new();
        scan.get_first()?;
        while scan.next()? {
            rows.push(scan.get()?);
        }
        rows.sort_by_key(|row| match row.constant(3) {
            Constant::Num(order) => order,
            Constant::Str(_) => i32::MAX,
        });

        let mut schemas: HashMap<String, Schema> = HashMap::new();
        for row in rows {
            let (Constant::Str(table), Constant::Str(field), Constant::Str(type_text)) =
                (row.constant(0), row.constant(1), row.constant(2))
            else {
                continue;
            };
            let field_type = FieldType::parse(&type_text)?;
            schemas
                .entry(table.clone())
                .or_default()
                .add_field(&table, &field, field_type);
        }
        Ok(schemas)
    }

    /// Records a new table: one schema row per column, keyed by position.
    pub fn register_table(&self, schema: &Schema) -> Result<()> {
        let system = schema_table_schema();
        let mut rows = Vec::with_capacity(schema.field_count());
        for i in 0..schema.field_count() {
            rows.push(system.tuple_from_constants(&[
                Constant::from(schema.table_at(i).to_string()),
                Constant::from(schema.field_at(i).to_string()),
                Constant::from(schema.field_type_at(i).to_string()),
                Constant::Num(i as i32),
            ])?);
        }
        heap::insert_tuples(&self.rm, SCHEMA_TABLE, rows)
    }
}
