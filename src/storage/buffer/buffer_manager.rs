use crate::common::constants::PIN_UNDERFLOW_MSG;
use crate::common::Result;
use crate::storage::disk::FileManager;
use crate::storage::page::PageId;

pub type FrameId = usize;

/// One frame of the buffer pool: the in-memory copy of a single block.
///
/// A frame's identity (its page id) is stable from the first pin until the
/// pin count returns to zero and the frame is reassigned. Any frame sitting
/// at pin count zero is clean: the dirty flag is cleared by write-back on
/// the last unpin, so eviction never loses data.
#[derive(Debug)]
pub struct BufferFrame {
    page_id: Option<PageId>,
    data: Vec<u8>,
    pin_count: u32,
    dirty: bool,
}

impl BufferFrame {
    fn new(block_size: usize) -> BufferFrame {
        BufferFrame {
            page_id: None,
            data: vec![0; block_size],
            pin_count: 0,
            dirty: false,
        }
    }

    pub fn page_id(&self) -> Option<&PageId> {
        self.page_id.as_ref()
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copies `bytes` into the frame at `offset` and marks it dirty.
    pub fn modify(&mut self, bytes: &[u8], offset: usize) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Fixed pool of frames over a [`FileManager`].
///
/// `pin` hands out frame ids; pinned frames are never reused. Dirty frames
/// are written back synchronously when their pin count drops to zero.
#[derive(Debug)]
pub struct BufferManager {
    frames: Vec<BufferFrame>,
}

impl BufferManager {
    pub fn new(block_size: usize, pool_size: usize) -> BufferManager {
        BufferManager {
            frames: (0..pool_size).map(|_| BufferFrame::new(block_size)).collect(),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, frame_id: FrameId) -> &BufferFrame {
        &self.frames[frame_id]
    }

    pub fn frame_mut(&mut self, frame_id: FrameId) -> &mut BufferFrame {
        &mut self.frames[frame_id]
    }

    /// Pins the given page, reading it through `file_manager` if it is not
    /// already resident.
    ///
    /// Returns `None` when the page does not exist on disk or when every
    /// frame is pinned.
    pub fn pin(
        &mut self,
        file_manager: &mut FileManager,
        page_id: &PageId,
    ) -> Result<Option<FrameId>> {
        let mut free_frame = None;
        let mut existing = None;
        for (i, frame) in self.frames.iter().enumerate() {
            if frame.page_id.as_ref() == Some(page_id) {
                existing = Some(i);
                break;
            }
            if frame.pin_count == 0 && free_frame.is_none() {
                free_frame = Some(i);
            }
        }

        if let Some(i) = existing {
            self.frames[i].pin_count += 1;
            return Ok(Some(i));
        }

        let Some(i) = free_frame else {
            return Ok(None);
        };
        let frame = &mut self.frames[i];
        if !file_manager.read(page_id, &mut frame.data)? {
            return Ok(None);
        }
        frame.page_id = Some(page_id.clone());
        frame.pin_count = 1;
        Ok(Some(i))
    }

    /// Releases one pin on the given page. On the transition to zero pins a
    /// dirty frame is written back and its dirty flag cleared.
    ///
    /// Returns `Ok(false)` only if no frame currently owns that page.
    pub fn unpin(&mut self, file_manager: &mut FileManager, page_id: &PageId) -> Result<bool> {
        for frame in self.frames.iter_mut() {
            if frame.page_id.as_ref() != Some(page_id) {
                continue;
            }
            if frame.pin_count == 0 {
                panic!("{}", PIN_UNDERFLOW_MSG);
            }
            frame.pin_count -= 1;
            if frame.pin_count == 0 && frame.dirty {
                frame.dirty = false;
                if !file_manager.write(page_id, &frame.data)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        Ok(false)
    }
}
