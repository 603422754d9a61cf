use crate::common::Result;
use crate::query::{SortComparator, SortKey, SortOrder};
use crate::sql::execution::{next_temp_name, Scan, TableScan, TableScanTemp};
use crate::storage::heap::HeapFileIterator;
use crate::storage::page::{entry_at, SLOT_SIZE};
use crate::storage::resource::ResourceManagerHandle;
use crate::types::{Constant, Schema, Tuple};
use log::debug;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Writes a run file front to back. Unlike the general insertion path,
/// which happily fills holes in earlier pages, a run writer never moves
/// backward, so a table scan replays its tuples exactly in write order.
struct RunWriter {
    iter: HeapFileIterator,
}

impl RunWriter {
    fn create(name: &str, rm: &ResourceManagerHandle) -> Result<RunWriter> {
        let mut iter = HeapFileIterator::new(name, rm)?;
        iter.next_page_in_dir()?;
        Ok(RunWriter { iter })
    }

    fn insert(&mut self, tuple: &Tuple) -> Result<()> {
        let required = tuple.record_size + SLOT_SIZE as u32;
        loop {
            let index = self.iter.entry_index();
            let free = self
                .iter
                .dir_page()
                .with(|buf| entry_at(buf, index).free_space);
            if free >= required {
                return self.iter.insert_into_current_page(tuple);
            }
            if self.iter.next_page_in_dir()? {
                continue;
            }
            if self.iter.next_dir()? {
                self.iter.next_page_in_dir()?;
                continue;
            }
            // out of pages entirely; grow the file and step into the first
            // page of the freshly appended directory
            self.iter.extend()?;
            self.iter.next_page_in_dir()?;
        }
    }
}

/// Sorts an input scan into a temp table and returns a table scan over it.
///
/// Run generation is replacement selection: an in-memory buffer bounded by
/// `page_budget` bytes keeps its tuples ordered, and each step emits the
/// smallest buffered tuple whose key is not below the last one written.
/// When no such tuple remains the current run closes and a new one starts,
/// so runs average longer than the buffer itself. Runs are then merged
/// `merge_fanin` at a time through a heap until one remains.
pub fn create_sorted_temp_table(
    page_budget: usize,
    merge_fanin: usize,
    input: &mut dyn Scan,
    key: &SortKey,
    rm: &ResourceManagerHandle,
) -> Result<Box<dyn Scan>> {
    let schema = input.schema().clone();
    let comparator = SortComparator::generate(key, &schema)?;

    let mut runs: Vec<String> = Vec::new();
    let mut run_writer = new_run(&mut runs, rm)?;
    let mut buffer = RunBuffer::new(comparator.clone());
    let mut buffered_bytes = 0usize;
    let mut last_written: Option<Tuple> = None;

    input.get_first()?;
    while input.next()? {
        let tuple = input.get()?;
        buffered_bytes += tuple.record_size as usize;
        buffer.insert(tuple);

        while buffered_bytes > page_budget {
            match buffer.pop_at_least(last_written.as_ref()) {
                Some(tuple) => {
                    buffered_bytes -= tuple.record_size as usize;
                    run_writer.insert(&tuple)?;
                    last_written = Some(tuple);
                }
                None => {
                    // every buffered key sorts below the last one written;
                    // close this run and start the next
                    run_writer = new_run(&mut runs, rm)?;
                    last_written = None;
                }
            }
        }
    }

    // flush the tail of the buffer in key order
    if !buffer.is_empty() {
        if let (Some(last), Some(first)) = (&last_written, buffer.first()) {
            if comparator.compare(first, last) == Ordering::Less {
                run_writer = new_run(&mut runs, rm)?;
            }
        }
        for tuple in buffer.drain() {
            run_writer.insert(&tuple)?;
        }
    }
    drop(run_writer);
    debug!("sort produced {} initial runs", runs.len());

    // K-way merge until a single run remains
    while runs.len() > 1 {
        let mut merged_runs = Vec::new();
        for batch in runs.chunks(merge_fanin) {
            let out_name = next_temp_name("temp_sort");
            let mut out = RunWriter::create(&out_name, rm)?;
            merge_batch(batch, &mut out, &comparator, rm, &schema)?;
            drop(out);
            merged_runs.push(out_name);
        }
        for old_run in &runs {
            rm.write()?.file_manager.delete_file(old_run)?;
        }
        runs = merged_runs;
    }

    Ok(Box::new(TableScanTemp::new(&runs[0], rm, schema)))
}

fn new_run(runs: &mut Vec<String>, rm: &ResourceManagerHandle) -> Result<RunWriter> {
    let name = next_temp_name("temp_sort");
    let writer = RunWriter::create(&name, rm)?;
    runs.push(name);
    Ok(writer)
}

fn merge_batch(
    batch: &[String],
    out: &mut RunWriter,
    comparator: &SortComparator,
    rm: &ResourceManagerHandle,
    schema: &Schema,
) -> Result<()> {
    let mut scans: Vec<TableScan> = Vec::with_capacity(batch.len());
    let mut heap: BinaryHeap<MergeEntry> = BinaryHeap::new();
    for (run, name) in batch.iter().enumerate() {
        let mut scan = TableScan::new(name, rm, schema.clone());
        scan.get_first()?;
        if scan.next()? {
            let tuple = scan.get()?;
            heap.push(MergeEntry::new(comparator, tuple, run));
        }
        scans.push(scan);
    }

    while let Some(entry) = heap.pop() {
        out.insert(&entry.tuple)?;
        let scan = &mut scans[entry.run];
        if scan.next()? {
            let tuple = scan.get()?;
            heap.push(MergeEntry::new(comparator, tuple, entry.run));
        }
    }
    Ok(())
}

/// One head-of-run tuple inside the merge heap. `BinaryHeap` is a max-heap,
/// so the ordering is inverted; ties break on run index to keep the merge
/// deterministic.
struct MergeEntry {
    key: Constant,
    order: SortOrder,
    tuple: Tuple,
    run: usize,
}

impl MergeEntry {
    fn new(comparator: &SortComparator, tuple: Tuple, run: usize) -> MergeEntry {
        MergeEntry {
            key: comparator.key_of(&tuple),
            order: comparator.order(),
            tuple,
            run,
        }
    }

    fn directed_cmp(&self, other: &MergeEntry) -> Ordering {
        let ordering = self.key.total_cmp(&other.key);
        let ordering = match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };
        ordering.then(self.run.cmp(&other.run))
    }
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &MergeEntry) -> bool {
        self.directed_cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &MergeEntry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &MergeEntry) -> Ordering {
        self.directed_cmp(other).reverse()
    }
}

/// The replacement-selection buffer: tuples held in key order.
struct RunBuffer {
    comparator: SortComparator,
    tuples: Vec<Tuple>,
}

impl RunBuffer {
    fn new(comparator: SortComparator) -> RunBuffer {
        RunBuffer {
            comparator,
            tuples: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    fn first(&self) -> Option<&Tuple> {
        self.tuples.first()
    }

    fn insert(&mut self, tuple: Tuple) {
        let at = self
            .tuples
            .partition_point(|t| self.comparator.compare(t, &tuple) != Ordering::Greater);
        self.tuples.insert(at, tuple);
    }

    /// Removes and returns the smallest tuple whose key is not below
    /// `floor`; with no floor, the smallest overall.
    fn pop_at_least(&mut self, floor: Option<&Tuple>) -> Option<Tuple> {
        let at = match floor {
            None => 0,
            Some(floor) => self
                .tuples
                .partition_point(|t| self.comparator.compare(t, floor) == Ordering::Less),
        };
        if at >= self.tuples.len() {
            return None;
        }
        Some(self.tuples.remove(at))
    }

    fn drain(&mut self) -> Vec<Tuple> {
        std::mem::take(&mut self.tuples)
    }
}
