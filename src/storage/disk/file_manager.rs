use crate::common::{Error, Result};
use crate::storage::page::PageId;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Fixed-size block I/O over named files in a data directory.
///
/// Keeps one open handle per file for the lifetime of the manager; all
/// handles close on drop. Reads and writes are block-aligned and bounded:
/// touching a page beyond EOF returns `Ok(false)` rather than erroring, and
/// the caller decides what that means.
#[derive(Debug)]
pub struct FileManager {
    block_size: usize,
    data_dir: PathBuf,
    files: HashMap<String, File>,
}

impl FileManager {
    pub fn new(block_size: usize, data_dir: impl Into<PathBuf>) -> Result<FileManager> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(FileManager {
            block_size,
            data_dir,
            files: HashMap::new(),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn path_of(&self, file_name: &str) -> PathBuf {
        Path::new(&self.data_dir).join(file_name)
    }

    fn handle(&mut self, file_name: &str) -> Result<&mut File> {
        if !self.files.contains_key(file_name) {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(self.path_of(file_name))?;
            self.files.insert(file_name.to_string(), file);
        }
        Ok(self.files.get_mut(file_name).unwrap())
    }

    pub fn create_file_if_not_exists(&mut self, file_name: &str) -> Result<()> {
        if self.file_exists(file_name) {
            return Ok(());
        }
        File::create(self.path_of(file_name))?;
        Ok(())
    }

    pub fn file_exists(&self, file_name: &str) -> bool {
        self.path_of(file_name).exists()
    }

    pub fn delete_file(&mut self, file_name: &str) -> Result<bool> {
        self.files.remove(file_name);
        match std::fs::remove_file(self.path_of(file_name)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Error::from(err)),
        }
    }

    /// Number of whole blocks currently stored in the file.
    pub fn page_count(&self, file_name: &str) -> Result<u64> {
        let len = std::fs::metadata(self.path_of(file_name))?.len();
        Ok(len / self.block_size as u64)
    }

    /// Extends the file by `n_blocks` zeroed blocks and returns the page
    /// number of the last newly appended block.
    pub fn append(&mut self, file_name: &str, n_blocks: u64) -> Result<u64> {
        let block_size = self.block_size;
        let file = self.handle(file_name)?;
        let zeroes = vec![0u8; block_size];

        file.seek(SeekFrom::End(0))?;
        for _ in 0..n_blocks {
            file.write_all(&zeroes)?;
        }
        file.flush()?;

        Ok(self.page_count(file_name)? - 1)
    }

    /// Reads one block into `buf`. Returns `Ok(false)` if the page lies
    /// beyond the end of the file.
    pub fn read(&mut self, page_id: &PageId, buf: &mut [u8]) -> Result<bool> {
        if page_id.page_no >= self.page_count(&page_id.file)? {
            return Ok(false);
        }
        let offset = page_id.page_no * self.block_size as u64;
        let block_size = self.block_size;
        let file = self.handle(&page_id.file)?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..block_size])?;
        Ok(true)
    }

    /// Writes one block from `buf`. Returns `Ok(false)` if the page lies
    /// beyond the end of the file.
    pub fn write(&mut self, page_id: &PageId, buf: &[u8]) -> Result<bool> {
        if page_id.page_no >= self.page_count(&page_id.file)? {
            return Ok(false);
        }
        let offset = page_id.page_no * self.block_size as u64;
        let block_size = self.block_size;
        let file = self.handle(&page_id.file)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&buf[..block_size])?;
        file.flush()?;
        Ok(true)
    }
}
