use crate::common::constants::{INVALID_ENTRY_INDEX, NO_PAGE, TUPLE_PAGE_NOT_PINNED_MSG};
use crate::common::{Error, Result};
use crate::storage::heap::create_heap_file;
use crate::storage::page::{
    compact, entry_at, entry_capacity, max_tuple_space, put_entry, put_slot, slot_at,
    DirectoryHeader, PageEntry, PageId, Slot, TuplePageHeader, DIRECTORY_HEADER_SIZE,
    PAGE_ENTRY_SIZE, SLOT_SIZE, TUPLE_PAGE_HEADER_SIZE,
};
use crate::storage::resource::{PinnedPage, ResourceManagerHandle};
use crate::types::Tuple;
use log::debug;
use std::sync::Arc;

/// Stateful cursor over a heap file's directory chain and tuple pages.
///
/// Exactly one directory frame is pinned at all times; at most one tuple
/// page frame is pinned alongside it. Dropping the iterator releases both
/// through their guards. Opening an absent file formats it first.
///
/// Directory pages chain forward through `next_page` and carry directory
/// indices 1, 2, ... Each entry of a directory points at the tuple page
/// immediately following it: entry `i` of a directory at page `p` governs
/// page `p + 1 + i`.
pub struct HeapFileIterator {
    filename: String,
    rm: ResourceManagerHandle,
    dir_page: PinnedPage,
    tuple_page: Option<PinnedPage>,
    entry_index: u32,
}

impl HeapFileIterator {
    pub fn new(filename: &str, rm: &ResourceManagerHandle) -> Result<HeapFileIterator> {
        if !rm.read()?.file_manager.file_exists(filename) {
            create_heap_file(rm, filename)?;
        }
        let dir_page = PinnedPage::pin(rm, PageId::new(filename, 0))?
            .ok_or(Error::BufferPoolExhausted)?;
        Ok(HeapFileIterator {
            filename: filename.to_string(),
            rm: Arc::clone(rm),
            dir_page,
            tuple_page: None,
            entry_index: INVALID_ENTRY_INDEX,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn dir_page(&self) -> &PinnedPage {
        &self.dir_page
    }

    pub fn tuple_page(&self) -> Option<&PinnedPage> {
        self.tuple_page.as_ref()
    }

    pub fn entry_index(&self) -> u32 {
        self.entry_index
    }

    fn block_size(&self) -> usize {
        self.rm.read().unwrap().block_size()
    }

    fn pin_required(&self, page_no: u64) -> Result<PinnedPage> {
        PinnedPage::pin(&self.rm, PageId::new(&self.filename, page_no))?
            .ok_or(Error::BufferPoolExhausted)
    }

    fn append(&self, n_blocks: u64) -> Result<u64> {
        self.rm.write()?.file_manager.append(&self.filename, n_blocks)
    }

    fn dir_header(&self) -> DirectoryHeader {
        self.dir_page.with(DirectoryHeader::read_from)
    }

    /// Repositions on directory 0, releasing any tuple page. Idempotent.
    pub fn rewind_to_first_dir(&mut self) -> Result<()> {
        self.tuple_page = None;
        self.entry_index = INVALID_ENTRY_INDEX;
        if self.dir_page.page_id().page_no != 0 {
            self.dir_page = self.pin_required(0)?;
        }
        Ok(())
    }

    /// Advances along the directory chain. Returns `false` at the end of
    /// the chain, releasing the tuple page either way.
    pub fn next_dir(&mut self) -> Result<bool> {
        self.tuple_page = None;
        let next = self.dir_header().next_page;
        if next == NO_PAGE {
            return Ok(false);
        }
        self.dir_page = self.pin_required(next)?;
        self.entry_index = INVALID_ENTRY_INDEX;
        Ok(true)
    }

    /// Moves the tuple-page cursor to the next entry of the current
    /// directory, or to entry 0 when no tuple page is pinned yet. Returns
    /// `false` past the last entry.
    pub fn next_page_in_dir(&mut self) -> Result<bool> {
        let entry_count = self.dir_header().entry_count;
        let next_index = match self.tuple_page {
            None => 0,
            Some(_) => self.entry_index + 1,
        };
        if next_index as u64 >= entry_count {
            self.tuple_page = None;
            return Ok(false);
        }
        let entry = self.dir_page.with(|buf| entry_at(buf, next_index));
        // release before repinning; the cursor never holds a third frame
        self.tuple_page = None;
        self.tuple_page = Some(self.pin_required(entry.page_number)?);
        self.entry_index = next_index;
        Ok(true)
    }

    /// Whether the current directory block has room for one more entry.
    pub fn can_store_page_entry(&self) -> bool {
        let used = DIRECTORY_HEADER_SIZE
            + self.dir_header().entry_count as usize * PAGE_ENTRY_SIZE;
        self.block_size() - used >= PAGE_ENTRY_SIZE
    }

    /// Doubles the directory chain: with the last directory at index `k`,
    /// appends directories `k+1..=2k`, each followed by a full complement of
    /// freshly formatted tuple pages. Leaves the cursor on the new last
    /// directory.
    pub fn extend(&mut self) -> Result<()> {
        self.tuple_page = None;

        loop {
            let next = self.dir_header().next_page;
            if next == NO_PAGE {
                break;
            }
            self.dir_page = self.pin_required(next)?;
        }

        let block_size = self.block_size();
        let entries = entry_capacity(block_size) as u64;
        let last_index = self.dir_header().dir_index;
        debug!(
            "extending heap file {}: directories {}..={}",
            self.filename,
            last_index + 1,
            last_index * 2
        );

        for dir_index in (last_index + 1)..=(last_index * 2) {
            let new_dir_no = self.append(1)?;

            // Link the previous directory while its frame is still pinned;
            // the guard's drop performs the write-back.
            self.dir_page.with_mut(|buf| {
                let mut header = DirectoryHeader::read_from(buf);
                header.next_page = new_dir_no;
                header.write_to(buf);
            });
            let prev_no = self.dir_page.page_id().page_no;

            self.dir_page = self.pin_required(new_dir_no)?;
            let last_tuple_page = self.append(entries)?;

            self.dir_page.with_mut(|buf| {
                DirectoryHeader::new(NO_PAGE, prev_no, entries, dir_index, &self.filename)
                    .write_to(buf);
                for i in 0..entries {
                    let entry = PageEntry {
                        page_number: new_dir_no + 1 + i,
                        free_space: max_tuple_space(block_size),
                    };
                    put_entry(buf, i as u32, &entry);
                }
            });

            for page_no in (new_dir_no + 1)..=last_tuple_page {
                let page = self.pin_required(page_no)?;
                page.with_mut(|buf| TuplePageHeader::empty(block_size).write_to(buf));
            }
        }
        Ok(())
    }

    /// Walks directory entries from the current directory onward until one
    /// records at least `required` free bytes, pinning the corresponding
    /// tuple page. Extends the file and rescans if the whole chain is
    /// exhausted; the recursion is bounded by the file's geometric growth.
    pub fn find_space(&mut self, required: u32) -> Result<bool> {
        loop {
            let entry_count = self.dir_header().entry_count;
            let chosen = self.dir_page.with(|buf| {
                (0..entry_count as u32)
                    .map(|i| (i, entry_at(buf, i)))
                    .find(|(_, entry)| entry.free_space >= required)
            });
            if let Some((index, entry)) = chosen {
                self.tuple_page = None;
                self.tuple_page = Some(self.pin_required(entry.page_number)?);
                self.entry_index = index;
                return Ok(true);
            }
            if !self.next_dir()? {
                break;
            }
        }

        let saved = self.dir_page.page_id().page_no;
        self.extend()?;
        self.dir_page = self.pin_required(saved)?;
        self.entry_index = INVALID_ENTRY_INDEX;
        self.find_space(required)
    }

    /// Inserts one tuple: finds a page with room for the record and a
    /// possible new slot, then writes it there.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        if !self.find_space(tuple.record_size + SLOT_SIZE as u32)? {
            return Err(Error::CreationError);
        }
        self.insert_into_current_page(tuple)
    }

    /// Writes a tuple into the page the cursor rests on: reuses a free slot
    /// when one exists, claims bytes at the low end of the tuple region,
    /// writes each field in order, and charges the directory entry. The
    /// caller must have established that the record and a possible new slot
    /// fit.
    pub fn insert_into_current_page(&mut self, tuple: &Tuple) -> Result<()> {
        let slot_size = SLOT_SIZE as u32;
        let new_slot = {
            let page = self.tuple_page.as_ref().expect(TUPLE_PAGE_NOT_PINNED_MSG);
            page.with_mut(|buf| {
                let mut header = TuplePageHeader::read_from(buf);
                let (slot_index, new_slot) = match (0..header.slot_count)
                    .find(|i| !slot_at(buf, *i).is_occupied())
                {
                    Some(free) => (free, false),
                    None => (header.slot_count, true),
                };

                // deletions leave holes; when the contiguous region at the
                // low end is too small for a record the accounting promised
                // room for, squeeze the holes out first
                let slots_end = (TUPLE_PAGE_HEADER_SIZE
                    + (header.slot_count as usize + usize::from(new_slot)) * SLOT_SIZE)
                    as u32;
                if header.last_occupied_offset < slots_end + tuple.record_size {
                    compact(buf);
                    header = TuplePageHeader::read_from(buf);
                }
                if new_slot {
                    header.slot_count += 1;
                }

                let offset = header.last_occupied_offset - tuple.record_size;
                header.last_occupied_offset = offset;
                header.write_to(buf);

                let mut slot = Slot::default();
                slot.set_occupied(true);
                slot.set_offset(offset);
                put_slot(buf, slot_index, slot);

                let mut cursor = offset as usize;
                for field in &tuple.fields {
                    field.write(buf, cursor);
                    cursor += field.length() as usize;
                }
                new_slot
            })
        };

        let entry_index = self.entry_index;
        let spent = tuple.record_size + if new_slot { slot_size } else { 0 };
        self.dir_page.with_mut(|buf| {
            let mut entry = entry_at(buf, entry_index);
            entry.free_space -= spent;
            put_entry(buf, entry_index, &entry);
        });
        Ok(())
    }

    /// Inserts a batch, smallest records first to reduce space waste.
    pub fn insert_tuples(&mut self, mut tuples: Vec<Tuple>) -> Result<()> {
        tuples.sort_by_key(|tuple| tuple.record_size);
        for tuple in &tuples {
            self.insert_tuple(tuple)?;
        }
        Ok(())
    }
}
