use crate::common::Result;
use crate::errinput;
use crate::types::{Constant, FieldType, FieldValue, Tuple};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The shape of a scan's output: parallel vectors of owning table name and
/// field name, plus a field-name → type map used to decode stored tuples.
///
/// Schemas are cheap value types; operators clone and recombine them freely
/// (a product concatenates two, a projection selects from one).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Schema {
    tables: Vec<String>,
    fields: Vec<String>,
    types: HashMap<String, FieldType>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema::default()
    }

    pub fn add_field(&mut self, table: &str, field: &str, field_type: FieldType) {
        self.tables.push(table.to_string());
        self.fields.push(field.to_string());
        self.types.insert(field.to_string(), field_type);
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn table_at(&self, index: usize) -> &str {
        &self.tables[index]
    }

    pub fn field_at(&self, index: usize) -> &str {
        &self.fields[index]
    }

    pub fn field_type_at(&self, index: usize) -> FieldType {
        self.types[&self.fields[index]]
    }

    /// Position of the first field matching `name`, optionally qualified by
    /// its owning table.
    pub fn index_of(&self, table: Option<&str>, name: &str) -> Option<usize> {
        (0..self.fields.len()).find(|i| {
            self.fields[*i] == name && table.map_or(true, |t| self.tables[*i] == t)
        })
    }

    /// Qualified column labels, e.g. `citizen.age`.
    pub fn labels(&self) -> Vec<String> {
        (0..self.field_count())
            .map(|i| format!("{}.{}", self.tables[i], self.fields[i]))
            .collect()
    }

    /// Deserializes one stored tuple starting at `offset`, reading each
    /// field in schema order.
    pub fn read_tuple(&self, buf: &[u8], offset: u32) -> Tuple {
        let mut fields = Vec::with_capacity(self.field_count());
        let mut cursor = offset as usize;
        for i in 0..self.field_count() {
            let field = self.field_type_at(i).read(buf, cursor);
            cursor += field.length() as usize;
            fields.push(field);
        }
        Tuple::new(fields)
    }

    /// Builds a tuple from one literal per field, in schema order.
    pub fn tuple_from_constants(&self, values: &[Constant]) -> Result<Tuple> {
        if values.len() != self.field_count() {
            return errinput!(
                "expected {} values, got {}",
                self.field_count(),
                values.len()
            );
        }
        let fields = values
            .iter()
            .enumerate()
            .map(|(i, value)| self.field_type_at(i).from_constant(value))
            .collect::<Result<Vec<FieldValue>>>()?;
        Ok(Tuple::new(fields))
    }
}
