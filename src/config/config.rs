use crate::common::Result;
use serde::Deserialize;

// Block sizes offered by the storage layer. All on-disk I/O is aligned to
// whichever of these the database was opened with.
pub const TEST_BLOCK_SIZE: usize = 512;
pub const BLOCK_SIZE_S: usize = 4096;
pub const BLOCK_SIZE_M: usize = 8192;
pub const BLOCK_SIZE_L: usize = 16384;

pub const DEFAULT_BUFFER_POOL_FRAMES: usize = 64;
pub const DEFAULT_LOCK_WAIT_SECONDS: u64 = 5;
pub const HEAPDB_DATA_DIR: &str = "data";

/// Runtime configuration, loaded from `heapdb.toml` and the `HEAPDB_*`
/// environment, with built-in defaults as the bottom layer.
#[derive(Clone, Debug, Deserialize)]
pub struct DbConfig {
    pub block_size: usize,
    pub buffer_pool_frames: usize,
    pub lock_wait_seconds: u64,
    pub data_dir: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            block_size: BLOCK_SIZE_S,
            buffer_pool_frames: DEFAULT_BUFFER_POOL_FRAMES,
            lock_wait_seconds: DEFAULT_LOCK_WAIT_SECONDS,
            data_dir: HEAPDB_DATA_DIR.to_string(),
        }
    }
}

impl DbConfig {
    pub fn load() -> Result<Self> {
        let settings = ::config::Config::builder()
            .set_default("block_size", BLOCK_SIZE_S as u64)?
            .set_default("buffer_pool_frames", DEFAULT_BUFFER_POOL_FRAMES as u64)?
            .set_default("lock_wait_seconds", DEFAULT_LOCK_WAIT_SECONDS)?
            .set_default("data_dir", HEAPDB_DATA_DIR)?
            .add_source(::config::File::with_name("heapdb").required(false))
            .add_source(::config::Environment::with_prefix("HEAPDB"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
