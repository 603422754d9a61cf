use crate::common::constants::COULD_NOT_UNWRAP_RM_MSG;
use crate::common::Result;
use crate::config::config::DbConfig;
use crate::storage::buffer::{BufferManager, FrameId};
use crate::storage::disk::FileManager;
use crate::storage::lock::LockManager;
use crate::storage::page::PageId;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

pub type ResourceManagerHandle = Arc<RwLock<ResourceManager>>;

/// Bundles the file manager, buffer pool, and lock manager for one open
/// database, shared between cursors through an `Arc<RwLock<_>>` handle.
#[derive(Debug)]
pub struct ResourceManager {
    pub file_manager: FileManager,
    pub buffer_manager: BufferManager,
    lock_manager: Arc<LockManager>,
    block_size: usize,
}

impl ResourceManager {
    pub fn new(block_size: usize, pool_size: usize, data_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(ResourceManager {
            file_manager: FileManager::new(block_size, data_dir)?,
            buffer_manager: BufferManager::new(block_size, pool_size),
            lock_manager: Arc::new(LockManager::default()),
            block_size,
        })
    }

    pub fn new_with_handle(
        block_size: usize,
        pool_size: usize,
        data_dir: impl Into<PathBuf>,
    ) -> Result<ResourceManagerHandle> {
        Ok(Arc::new(RwLock::new(Self::new(
            block_size, pool_size, data_dir,
        )?)))
    }

    pub fn from_config(config: &DbConfig) -> Result<ResourceManagerHandle> {
        let rm = ResourceManager {
            file_manager: FileManager::new(config.block_size, &config.data_dir)?,
            buffer_manager: BufferManager::new(config.block_size, config.buffer_pool_frames),
            lock_manager: Arc::new(LockManager::new(config.lock_wait_seconds)),
            block_size: config.block_size,
        };
        Ok(Arc::new(RwLock::new(rm)))
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn lock_manager(&self) -> Arc<LockManager> {
        Arc::clone(&self.lock_manager)
    }
}

/// A pinned buffer frame, released when dropped.
///
/// Every pin taken through this guard is matched by exactly one unpin on
/// every control path; high-level code never unpins explicitly. The frame's
/// content is valid for the lifetime of the guard.
#[derive(Debug)]
pub struct PinnedPage {
    rm: ResourceManagerHandle,
    page_id: PageId,
    frame_id: FrameId,
}

impl PinnedPage {
    /// Pins `page_id`, reading it into the pool if necessary. Returns `None`
    /// when the page does not exist on disk or the pool is exhausted.
    pub fn pin(rm: &ResourceManagerHandle, page_id: PageId) -> Result<Option<PinnedPage>> {
        let frame_id = {
            let mut guard = rm.write()?;
            let ResourceManager {
                file_manager,
                buffer_manager,
                ..
            } = &mut *guard;
            buffer_manager.pin(file_manager, &page_id)?
        };
        Ok(frame_id.map(|frame_id| PinnedPage {
            rm: Arc::clone(rm),
            page_id,
            frame_id,
        }))
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    /// Runs `f` over the page bytes.
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.rm.read().expect(COULD_NOT_UNWRAP_RM_MSG);
        f(guard.buffer_manager.frame(self.frame_id).data())
    }

    /// Runs `f` over the page bytes mutably and marks the frame dirty.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.rm.write().expect(COULD_NOT_UNWRAP_RM_MSG);
        let frame = guard.buffer_manager.frame_mut(self.frame_id);
        frame.mark_dirty();
        f(frame.data_mut())
    }

    /// Copies `bytes` into the page at `offset` and marks the frame dirty.
    pub fn modify(&self, bytes: &[u8], offset: usize) {
        let mut guard = self.rm.write().expect(COULD_NOT_UNWRAP_RM_MSG);
        guard
            .buffer_manager
            .frame_mut(self.frame_id)
            .modify(bytes, offset);
    }
}

impl Drop for PinnedPage {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.rm.write() {
            let ResourceManager {
                file_manager,
                buffer_manager,
                ..
            } = &mut *guard;
            let _ = buffer_manager.unpin(file_manager, &self.page_id);
        }
    }
}
