use crate::common::Result;
use crate::query::Predicate;
use crate::sql::execution::Scan;
use crate::types::{Schema, Tuple};

/// Filters an inner scan, emitting only tuples the predicate accepts.
pub struct SelectScan {
    scan: Box<dyn Scan>,
    predicate: Predicate,
}

impl SelectScan {
    pub fn new(scan: Box<dyn Scan>, predicate: Predicate) -> SelectScan {
        SelectScan { scan, predicate }
    }
}

impl Scan for SelectScan {
    fn get_first(&mut self) -> Result<bool> {
        self.scan.get_first()
    }

    fn next(&mut self) -> Result<bool> {
        while self.scan.next()? {
            let tuple = self.scan.get()?;
            if self.predicate.evaluate(&tuple, self.scan.schema())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn get(&mut self) -> Result<Tuple> {
        self.scan.get()
    }

    fn schema(&self) -> &Schema {
        self.scan.schema()
    }
}
