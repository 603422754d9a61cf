use crate::common::Result;
use crate::errinput;
use crate::query::FieldRef;
use crate::sql::execution::Scan;
use crate::types::{Schema, Tuple};

/// Narrows an inner scan to the requested columns, in the requested order.
///
/// The column list is resolved against the inner schema up front; asking
/// for a field the input does not produce is an error.
pub struct ProjectScan {
    scan: Box<dyn Scan>,
    map_to_inner: Vec<usize>,
    schema: Schema,
}

impl ProjectScan {
    pub fn new(scan: Box<dyn Scan>, fields: &[FieldRef]) -> Result<ProjectScan> {
        let inner = scan.schema();
        let mut map_to_inner = Vec::with_capacity(fields.len());
        let mut schema = Schema::new();
        for field in fields {
            let Some(index) = inner.index_of(field.table.as_deref(), &field.name) else {
                return errinput!("field {field} not found in input");
            };
            map_to_inner.push(index);
            schema.add_field(
                inner.table_at(index),
                inner.field_at(index),
                inner.field_type_at(index),
            );
        }
        Ok(ProjectScan {
            scan,
            map_to_inner,
            schema,
        })
    }
}

impl Scan for ProjectScan {
    fn get_first(&mut self) -> Result<bool> {
        self.scan.get_first()
    }

    fn next(&mut self) -> Result<bool> {
        self.scan.next()
    }

    fn get(&mut self) -> Result<Tuple> {
        let inner = self.scan.get()?;
        let fields = self
            .map_to_inner
            .iter()
            .map(|index| inner.fields[*index].clone())
            .collect();
        Ok(Tuple::new(fields))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
