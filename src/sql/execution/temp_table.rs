use crate::common::Result;
use crate::sql::execution::{Scan, TableScan};
use crate::storage::heap::HeapFileIterator;
use crate::storage::resource::ResourceManagerHandle;
use crate::types::{Schema, Tuple};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique file name for materialized intermediate results.
pub fn next_temp_name(prefix: &str) -> String {
    format!("{}_{}", prefix, NEXT_TEMP_ID.fetch_add(1, Ordering::SeqCst))
}

/// Materializes an inner scan into a temp heap file on the first
/// `get_first`, then serves all reads from a table scan over that file.
/// The backing file is deleted when the scan drops.
pub struct TempTableScan {
    scan: Box<dyn Scan>,
    materialized: Option<TableScan>,
    rm: ResourceManagerHandle,
    file_name: String,
}

impl TempTableScan {
    pub fn new(scan: Box<dyn Scan>, rm: &ResourceManagerHandle) -> TempTableScan {
        TempTableScan {
            scan,
            materialized: None,
            rm: Arc::clone(rm),
            file_name: String::new(),
        }
    }
}

impl Scan for TempTableScan {
    fn get_first(&mut self) -> Result<bool> {
        if let Some(materialized) = &mut self.materialized {
            return materialized.get_first();
        }

        self.file_name = next_temp_name("temp");
        let mut iter = HeapFileIterator::new(&self.file_name, &self.rm)?;
        self.scan.get_first()?;
        while self.scan.next()? {
            let tuple = self.scan.get()?;
            iter.insert_tuple(&tuple)?;
        }
        drop(iter);

        let mut scan = TableScan::new(&self.file_name, &self.rm, self.scan.schema().clone());
        let positioned = scan.get_first()?;
        self.materialized = Some(scan);
        Ok(positioned)
    }

    fn next(&mut self) -> Result<bool> {
        self.materialized
            .as_mut()
            .expect("get_first must run before next")
            .next()
    }

    fn get(&mut self) -> Result<Tuple> {
        self.materialized
            .as_mut()
            .expect("get_first must run before get")
            .get()
    }

    fn schema(&self) -> &Schema {
        self.scan.schema()
    }
}

impl Drop for TempTableScan {
    fn drop(&mut self) {
        if self.file_name.is_empty() {
            return;
        }
        self.materialized = None;
        if let Ok(mut guard) = self.rm.write() {
            let _ = guard.file_manager.delete_file(&self.file_name);
        }
    }
}

/// A table scan over a temp file that owns the file: dropping the scan
/// deletes it. The external sort hands its final run back through this.
pub struct TableScanTemp {
    inner: TableScan,
    rm: ResourceManagerHandle,
    file_name: String,
}

impl TableScanTemp {
    pub fn new(file_name: &str, rm: &ResourceManagerHandle, schema: Schema) -> TableScanTemp {
        TableScanTemp {
            inner: TableScan::new(file_name, rm, schema),
            rm: Arc::clone(rm),
            file_name: file_name.to_string(),
        }
    }
}

impl Scan for TableScanTemp {
    fn get_first(&mut self) -> Result<bool> {
        self.inner.get_first()
    }

    fn next(&mut self) -> Result<bool> {
        self.inner.next()
    }

    fn get(&mut self) -> Result<Tuple> {
        self.inner.get()
    }

    fn schema(&self) -> &Schema {
        self.inner.schema()
    }
}

impl Drop for TableScanTemp {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.rm.write() {
            let _ = guard.file_manager.delete_file(&self.file_name);
        }
    }
}
