use crate::common::Result;
use crate::sql::execution::Scan;
use crate::types::{Schema, Tuple};

/// Nested-loop cartesian product. The right input is rewound once for every
/// left tuple; the output schema concatenates left then right.
pub struct ProductScan {
    left: Box<dyn Scan>,
    right: Box<dyn Scan>,
    schema: Schema,
}

impl ProductScan {
    pub fn new(left: Box<dyn Scan>, right: Box<dyn Scan>) -> ProductScan {
        let schema = concat_schemas(left.schema(), right.schema());
        ProductScan {
            left,
            right,
            schema,
        }
    }
}

pub(crate) fn concat_schemas(left: &Schema, right: &Schema) -> Schema {
    let mut schema = Schema::new();
    for i in 0..left.field_count() {
        schema.add_field(left.table_at(i), left.field_at(i), left.field_type_at(i));
    }
    for i in 0..right.field_count() {
        schema.add_field(right.table_at(i), right.field_at(i), right.field_type_at(i));
    }
    schema
}

impl Scan for ProductScan {
    fn get_first(&mut self) -> Result<bool> {
        Ok(self.left.get_first()? && self.left.next()? && self.right.get_first()?)
    }

    fn next(&mut self) -> Result<bool> {
        if self.right.next()? {
            return Ok(true);
        }
        self.right.get_first()?;
        Ok(self.left.next()? && self.right.next()?)
    }

    fn get(&mut self) -> Result<Tuple> {
        let mut fields = self.left.get()?.fields;
        fields.extend(self.right.get()?.fields);
        Ok(Tuple::new(fields))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
