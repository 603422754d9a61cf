use crate::common::Result;
use crate::storage::lock::{LockManager, LockMode};
use crate::storage::page::PageId;
use crate::storage::resource::{PinnedPage, ResourceManagerHandle};
use std::sync::Arc;

/// A transaction's view of the storage layer: page pins plus the page locks
/// it has acquired so far.
///
/// Lock acquisition follows Wait-Die; when any acquire returns `false` the
/// transaction is expected to call [`Transaction::release_all`] and restart
/// from the top. Dropping the transaction releases whatever it still holds.
pub struct Transaction {
    rm: ResourceManagerHandle,
    lock_manager: Arc<LockManager>,
    ts: u64,
    held: Vec<(PageId, LockMode)>,
}

impl Transaction {
    pub fn new(rm: &ResourceManagerHandle, ts: u64) -> Result<Transaction> {
        let lock_manager = rm.read()?.lock_manager();
        Ok(Transaction {
            rm: Arc::clone(rm),
            lock_manager,
            ts,
            held: Vec::new(),
        })
    }

    pub fn ts(&self) -> u64 {
        self.ts
    }

    /// Pins a page; the pin is released when the returned guard drops.
    pub fn pin(&self, page_id: PageId) -> Result<Option<PinnedPage>> {
        PinnedPage::pin(&self.rm, page_id)
    }

    pub fn s_lock(&mut self, page_id: &PageId) -> bool {
        if self.lock_manager.s_lock(page_id, self.ts) {
            self.held.push((page_id.clone(), LockMode::Shared));
            return true;
        }
        false
    }

    /// Acquires an exclusive lock, upgrading in place if this transaction
    /// already holds the page shared.
    pub fn x_lock(&mut self, page_id: &PageId) -> bool {
        let held_shared = self
            .held
            .iter()
            .position(|(held, mode)| held == page_id && *mode == LockMode::Shared);
        let granted = match held_shared {
            Some(_) => self.lock_manager.x_lock_with(
                page_id,
                self.ts,
                self.lock_manager.default_wait(),
                true,
            ),
            None => self.lock_manager.x_lock(page_id, self.ts),
        };
        if granted {
            match held_shared {
                Some(i) => self.held[i].1 = LockMode::Exclusive,
                None => self.held.push((page_id.clone(), LockMode::Exclusive)),
            }
        }
        granted
    }

    /// Releases every lock this transaction holds, in acquisition order.
    /// Safe to call with nothing held.
    pub fn release_all(&mut self) {
        for (page_id, mode) in self.held.drain(..) {
            match mode {
                LockMode::Shared => self.lock_manager.release_s_lock(&page_id),
                LockMode::Exclusive => self.lock_manager.release_x_lock(&page_id),
            };
        }
    }

    pub fn commit(&mut self) {
        self.release_all();
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.release_all();
    }
}
