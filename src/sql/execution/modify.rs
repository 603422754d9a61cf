use crate::common::Result;
use crate::query::Predicate;
use crate::sql::execution::product_scan::concat_schemas;
use crate::sql::execution::{ModifyScan, Scan};
use crate::sql::parser::UpdateStmt;
use crate::storage::heap::HeapFileIterator;
use crate::storage::page::{
    entry_at, put_entry, put_slot, slot_at, TuplePageHeader,
};
use crate::storage::resource::ResourceManagerHandle;
use crate::types::{Schema, Tuple};

/// A table scan that can delete and update the tuple under its cursor.
///
/// Navigation runs through a [`HeapFileIterator`] so the governing
/// directory entry is always at hand for free-space accounting. A second,
/// independent iterator absorbs relocated tuples during grow-updates
/// without disturbing the cursor.
pub struct ModifyTableScan {
    schema: Schema,
    iter: HeapFileIterator,
    push_iter: HeapFileIterator,
    current_slot: i64,
}

impl ModifyTableScan {
    pub fn new(
        filename: &str,
        rm: &ResourceManagerHandle,
        schema: Schema,
    ) -> Result<ModifyTableScan> {
        Ok(ModifyTableScan {
            schema,
            iter: HeapFileIterator::new(filename, rm)?,
            push_iter: HeapFileIterator::new(filename, rm)?,
            current_slot: -1,
        })
    }

    fn current_offset(&self) -> Option<u32> {
        let page = self.iter.tuple_page()?;
        let slot = page.with(|buf| slot_at(buf, self.current_slot as u32));
        slot.is_occupied().then(|| slot.offset())
    }

    /// Gives `record_size` bytes back to the directory entry governing the
    /// current page.
    fn credit_free_space(&self, record_size: u32) {
        let index = self.iter.entry_index();
        self.iter.dir_page().with_mut(|buf| {
            let mut entry = entry_at(buf, index);
            entry.free_space += record_size;
            put_entry(buf, index, &entry);
        });
    }

    /// Clears the occupancy bit of the current slot.
    fn free_current_slot(&self) {
        let page = self.iter.tuple_page().expect("no current tuple");
        page.with_mut(|buf| {
            let mut slot = slot_at(buf, self.current_slot as u32);
            slot.set_occupied(false);
            put_slot(buf, self.current_slot as u32, slot);
        });
    }
}

impl Scan for ModifyTableScan {
    fn get_first(&mut self) -> Result<bool> {
        self.iter.rewind_to_first_dir()?;
        self.current_slot = -1;
        Ok(true)
    }

    fn next(&mut self) -> Result<bool> {
        loop {
            if let Some(page) = self.iter.tuple_page() {
                let found = page.with(|buf| {
                    let slot_count = TuplePageHeader::read_from(buf).slot_count as i64;
                    let mut next_slot = self.current_slot + 1;
                    while next_slot < slot_count && !slot_at(buf, next_slot as u32).is_occupied()
                    {
                        next_slot += 1;
                    }
                    (next_slot < slot_count).then_some(next_slot)
                });
                if let Some(slot) = found {
                    self.current_slot = slot;
                    return Ok(true);
                }
            }
            self.current_slot = -1;
            if self.iter.next_page_in_dir()? {
                continue;
            }
            if !self.iter.next_dir()? {
                return Ok(false);
            }
        }
    }

    fn get(&mut self) -> Result<Tuple> {
        let offset = self.current_offset().expect("no current tuple");
        let page = self.iter.tuple_page().expect("no current tuple");
        Ok(page.with(|buf| self.schema.read_tuple(buf, offset)))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl ModifyScan for ModifyTableScan {
    fn update(&mut self, stmt: &UpdateStmt) -> Result<()> {
        let old = self.get()?;
        let old_size = old.record_size;

        let mut updated = old.clone();
        for (target, value) in &stmt.assignments {
            let replacement = value.evaluate(&old, &self.schema)?;
            let index = target.resolve(&self.schema)?;
            let field = self.schema.field_type_at(index).from_constant(&replacement)?;
            updated.set(index, field);
        }

        if updated.record_size > old_size {
            // no room in place: retire this slot and reinsert elsewhere
            self.free_current_slot();
            self.credit_free_space(old_size);
            return self.push_iter.insert_tuple(&updated);
        }

        let offset = self.current_offset().expect("no current tuple");
        let page = self.iter.tuple_page().expect("no current tuple");
        page.with_mut(|buf| {
            let mut cursor = offset as usize;
            for field in &updated.fields {
                field.write(buf, cursor);
                cursor += field.length() as usize;
            }
        });
        Ok(())
    }

    fn delete_tuple(&mut self) -> Result<bool> {
        if self.iter.tuple_page().is_none() {
            return Ok(false);
        }
        let Some(_offset) = self.current_offset() else {
            return Ok(false);
        };
        let record_size = self.get()?.record_size;

        self.credit_free_space(record_size);
        self.free_current_slot();
        Ok(true)
    }
}

/// Filters an inner modify scan by a predicate; mutations pass through to
/// whatever tuple the cursor rests on.
pub struct SelectModifyScan {
    scan: Box<dyn ModifyScan>,
    predicate: Predicate,
}

impl SelectModifyScan {
    pub fn new(scan: Box<dyn ModifyScan>, predicate: Predicate) -> SelectModifyScan {
        SelectModifyScan { scan, predicate }
    }
}

impl Scan for SelectModifyScan {
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

impl ModifyScan for SelectModifyScan {
    fn update(&mut self, stmt: &UpdateStmt) -> Result<()> {
        self.scan.update(stmt)
    }

    fn delete_tuple(&mut self) -> Result<bool> {
        self.scan.delete_tuple()
    }
}

/// Cartesian product whose left input is updatable; `update` and
/// `delete_tuple` apply to the left tuple only.
pub struct ProductModifyScan {
    left: Box<dyn ModifyScan>,
    right: Box<dyn Scan>,
    schema: Schema,
}

impl ProductModifyScan {
    pub fn new(left: Box<dyn ModifyScan>, right: Box<dyn Scan>) -> ProductModifyScan {
        let schema = concat_schemas(left.schema(), right.schema());
        ProductModifyScan {
            left,
            right,
            schema,
        }
    }
}

impl Scan for ProductModifyScan {
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

impl ModifyScan for ProductModifyScan {
    fn update(&mut self, stmt: &UpdateStmt) -> Result<()> {
        self.left.update(stmt)
    }

    fn delete_tuple(&mut self) -> Result<bool> {
        self.left.delete_tuple()
    }
}
