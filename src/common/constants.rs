// Page linkage
pub const NO_PAGE: u64 = u64::MAX;

// HeapFileIterator
pub const INVALID_ENTRY_INDEX: u32 = u32::MAX;
pub const TUPLE_PAGE_NOT_PINNED_MSG: &str =
    "Heap file cursor is not positioned on a tuple page.";

// BufferManager
pub const PIN_UNDERFLOW_MSG: &str = "Pin count already at zero, cannot decrement.";

// Slot
pub const SLOT_OFFSET_TOO_LARGE_MSG: &str = "Slot offset does not fit in 31 bits.";

// ResourceManager
pub const COULD_NOT_UNWRAP_RM_MSG: &str =
    "Could not unwrap resource manager from RwLock instance";
