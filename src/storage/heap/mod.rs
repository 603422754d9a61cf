pub mod iterator;

#[cfg(test)]
mod tests;

pub use iterator::HeapFileIterator;

use crate::common::{Error, Result};
use crate::storage::page::{
    entry_capacity, max_tuple_space, put_entry, DirectoryHeader, PageEntry, PageId,
    TuplePageHeader,
};
use crate::storage::resource::{PinnedPage, ResourceManagerHandle};
use crate::types::Tuple;
use crate::common::constants::NO_PAGE;

/// Formats a new heap file: one directory page followed by `E` empty tuple
/// pages, where `E` is however many page entries one directory block holds.
pub fn create_heap_file(rm: &ResourceManagerHandle, filename: &str) -> Result<()> {
    let block_size = rm.read()?.block_size();
    let entries = entry_capacity(block_size) as u64;
    {
        let mut guard = rm.write()?;
        guard.file_manager.create_file_if_not_exists(filename)?;
        guard.file_manager.append(filename, 1 + entries)?;
    }

    let directory = PinnedPage::pin(rm, PageId::new(filename, 0))?
        .ok_or(Error::BufferPoolExhausted)?;
    directory.with_mut(|buf| {
        DirectoryHeader::new(NO_PAGE, NO_PAGE, entries, 1, filename).write_to(buf);
        for i in 0..entries {
            let entry = PageEntry {
                page_number: i + 1,
                free_space: max_tuple_space(block_size),
            };
            put_entry(buf, i as u32, &entry);
        }
    });
    drop(directory);

    for page_no in 1..=entries {
        let page = PinnedPage::pin(rm, PageId::new(filename, page_no))?
            .ok_or(Error::BufferPoolExhausted)?;
        page.with_mut(|buf| TuplePageHeader::empty(block_size).write_to(buf));
    }
    Ok(())
}

/// Inserts a batch of tuples into the named heap file through a fresh
/// cursor.
pub fn insert_tuples(
    rm: &ResourceManagerHandle,
    filename: &str,
    tuples: Vec<Tuple>,
) -> Result<()> {
    let mut iter = HeapFileIterator::new(filename, rm)?;
    iter.rewind_to_first_dir()?;
    iter.insert_tuples(tuples)
}
