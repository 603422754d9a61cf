use crate::config::config::DEFAULT_LOCK_WAIT_SECONDS;
use crate::storage::page::PageId;
use log::debug;
use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Book-keeping for one locked page: the mode, the number of holders, and
/// the earliest (oldest) timestamp among them. A page holds at most one
/// exclusive holder, or any number of shared holders, never both.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LockMetaData {
    pub mode: LockMode,
    pub count: u32,
    pub earliest_ts: u64,
}

/// Per-page shared/exclusive locks with Wait-Die deadlock prevention.
///
/// A requester waits for a conflicting lock only up to its wait window. At
/// the end of the window the outcome depends on age: if the incumbent's
/// earliest holder is older than the requester, the requester dies
/// (`false`); otherwise the request times out, which callers treat the same
/// way. Cycles always contain a younger-waits-for-older edge, so one party
/// is always aborted and no deadlock survives.
#[derive(Debug)]
pub struct LockManager {
    table: Mutex<HashMap<PageId, LockMetaData>>,
    waiters: Condvar,
    default_wait: Duration,
}

impl Default for LockManager {
    fn default() -> Self {
        LockManager::new(DEFAULT_LOCK_WAIT_SECONDS)
    }
}

impl LockManager {
    pub fn new(wait_seconds: u64) -> LockManager {
        LockManager {
            table: Mutex::new(HashMap::new()),
            waiters: Condvar::new(),
            default_wait: Duration::from_secs(wait_seconds),
        }
    }

    pub fn default_wait(&self) -> Duration {
        self.default_wait
    }

    pub fn s_lock(&self, page_id: &PageId, txn_ts: u64) -> bool {
        self.s_lock_with(page_id, txn_ts, self.default_wait)
    }

    /// Acquires a shared lock, waiting up to `wait`. Returns `false` on a
    /// die or timeout; in both cases no holder entry is left behind.
    pub fn s_lock_with(&self, page_id: &PageId, txn_ts: u64, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        let mut table = self.table.lock().unwrap();
        loop {
            let holder = table.get(page_id).copied();
            let acquirable = match holder {
                None => true,
                Some(meta) => meta.mode == LockMode::Shared,
            };
            if acquirable {
                table
                    .entry(page_id.clone())
                    .and_modify(|meta| {
                        meta.count += 1;
                        meta.earliest_ts = meta.earliest_ts.min(txn_ts);
                    })
                    .or_insert(LockMetaData {
                        mode: LockMode::Shared,
                        count: 1,
                        earliest_ts: txn_ts,
                    });
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                let meta = holder.unwrap();
                if meta.earliest_ts < txn_ts {
                    debug!("txn {} dies waiting for S lock on {}", txn_ts, page_id);
                } else {
                    debug!("txn {} timed out waiting for S lock on {}", txn_ts, page_id);
                }
                drop(table);
                self.waiters.notify_all();
                return false;
            }
            table = self.waiters.wait_timeout(table, deadline - now).unwrap().0;
        }
    }

    pub fn x_lock(&self, page_id: &PageId, txn_ts: u64) -> bool {
        self.x_lock_with(page_id, txn_ts, self.default_wait, false)
    }

    /// Acquires an exclusive lock, waiting up to `wait`.
    ///
    /// With `has_s_lock` set, a caller that is the sole shared holder is
    /// upgraded in place; with other shared holders present the request can
    /// never be granted and runs out its window like any other conflict.
    pub fn x_lock_with(
        &self,
        page_id: &PageId,
        txn_ts: u64,
        wait: Duration,
        has_s_lock: bool,
    ) -> bool {
        let deadline = Instant::now() + wait;
        let mut table = self.table.lock().unwrap();
        loop {
            let holder = table.get(page_id).copied();
            match holder {
                None => {
                    table.insert(
                        page_id.clone(),
                        LockMetaData {
                            mode: LockMode::Exclusive,
                            count: 1,
                            earliest_ts: txn_ts,
                        },
                    );
                    return true;
                }
                Some(meta)
                    if has_s_lock && meta.mode == LockMode::Shared && meta.count == 1 =>
                {
                    debug!("txn {} upgrades S lock to X lock on {}", txn_ts, page_id);
                    table.insert(
                        page_id.clone(),
                        LockMetaData {
                            mode: LockMode::Exclusive,
                            count: 1,
                            earliest_ts: meta.earliest_ts.min(txn_ts),
                        },
                    );
                    return true;
                }
                Some(meta) => {
                    let now = Instant::now();
                    if now >= deadline {
                        if meta.earliest_ts < txn_ts {
                            debug!("txn {} dies waiting for X lock on {}", txn_ts, page_id);
                        } else {
                            debug!("txn {} timed out waiting for X lock on {}", txn_ts, page_id);
                        }
                        drop(table);
                        self.waiters.notify_all();
                        return false;
                    }
                    table = self.waiters.wait_timeout(table, deadline - now).unwrap().0;
                }
            }
        }
    }

    /// Releases one shared holder; the entry disappears with the last one.
    pub fn release_s_lock(&self, page_id: &PageId) -> bool {
        {
            let mut table = self.table.lock().unwrap();
            let Some(meta) = table.get_mut(page_id) else {
                return false;
            };
            meta.count -= 1;
            if meta.count == 0 {
                table.remove(page_id);
            }
        }
        self.waiters.notify_all();
        true
    }

    pub fn release_x_lock(&self, page_id: &PageId) -> bool {
        {
            let mut table = self.table.lock().unwrap();
            if table.remove(page_id).is_none() {
                return false;
            }
        }
        self.waiters.notify_all();
        true
    }

    /// Snapshot of the lock entry for a page, if any.
    pub fn metadata(&self, page_id: &PageId) -> Option<LockMetaData> {
        self.table.lock().unwrap().get(page_id).copied()
    }
}
