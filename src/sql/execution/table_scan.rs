use crate::common::Result;
use crate::sql::execution::Scan;
use crate::storage::page::{slot_at, PageId, PageType, TuplePageHeader};
use crate::storage::resource::{PinnedPage, ResourceManagerHandle};
use crate::types::{Schema, Tuple};
use std::sync::Arc;

/// Sequential scan over every occupied slot of a heap file, in physical
/// order: page number first, then slot index. Directory pages are skipped
/// by inspecting each page's type tag.
pub struct TableScan {
    rm: ResourceManagerHandle,
    filename: String,
    schema: Schema,
    page_no: u64,
    current: Option<PinnedPage>,
    current_slot: i64,
}

impl TableScan {
    pub fn new(filename: &str, rm: &ResourceManagerHandle, schema: Schema) -> TableScan {
        TableScan {
            rm: Arc::clone(rm),
            filename: filename.to_string(),
            schema,
            page_no: 0,
            current: None,
            current_slot: -1,
        }
    }

    fn pin(&self, page_no: u64) -> Result<Option<PinnedPage>> {
        PinnedPage::pin(&self.rm, PageId::new(&self.filename, page_no))
    }

    /// Advances to the next tuple page, releasing the current pin first.
    /// A pin that fails marks the end of the file.
    fn find_next_page(&mut self) -> Result<bool> {
        self.current = None;
        loop {
            self.page_no += 1;
            let Some(page) = self.pin(self.page_no)? else {
                return Ok(false);
            };
            self.current_slot = -1;
            if page.with(PageType::of) == PageType::Tuple {
                self.current = Some(page);
                return Ok(true);
            }
        }
    }
}

impl Scan for TableScan {
    fn get_first(&mut self) -> Result<bool> {
        self.page_no = 0;
        self.current_slot = -1;
        self.current = self.pin(0)?;
        Ok(self.current.is_some())
    }

    fn next(&mut self) -> Result<bool> {
        if self.current.is_none() {
            return Ok(false);
        }
        loop {
            let page = self.current.as_ref().unwrap();
            let advanced = page.with(|buf| {
                if PageType::of(buf) != PageType::Tuple {
                    return None;
                }
                let slot_count = TuplePageHeader::read_from(buf).slot_count as i64;
                let mut next_slot = self.current_slot + 1;
                while next_slot < slot_count && !slot_at(buf, next_slot as u32).is_occupied() {
                    next_slot += 1;
                }
                (next_slot < slot_count).then_some(next_slot)
            });
            match advanced {
                Some(slot) => {
                    self.current_slot = slot;
                    return Ok(true);
                }
                None => {
                    if !self.find_next_page()? {
                        return Ok(false);
                    }
                }
            }
        }
    }

    fn get(&mut self) -> Result<Tuple> {
        let page = self.current.as_ref().expect("no current tuple");
        Ok(page.with(|buf| {
            let offset = slot_at(buf, self.current_slot as u32).offset();
            self.schema.read_tuple(buf, offset)
        }))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
