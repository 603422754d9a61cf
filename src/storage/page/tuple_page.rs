use crate::common::constants::SLOT_OFFSET_TOO_LARGE_MSG;
use crate::storage::page::{read_u32, read_u64, write_u32, write_u64, PageType};

/// page_type (4) | checksum (8) | page_size (4) | slot_count (4) |
/// last_occupied_offset (4)
pub const TUPLE_PAGE_HEADER_SIZE: usize = 4 + 8 + 4 + 4 + 4;

pub const SLOT_SIZE: usize = 4;

const OCCUPIED_BIT: u32 = 0x8000_0000;
const OFFSET_BITS: u32 = 0x7FFF_FFFF;

/// Header of a slotted tuple page. Slots grow upward from just past the
/// header; tuple bytes grow downward from the end of the page.
/// `last_occupied_offset` is the lowest byte offset holding tuple data.
#[derive(Clone, Debug, PartialEq)]
pub struct TuplePageHeader {
    pub checksum: u64,
    pub page_size: u32,
    pub slot_count: u32,
    pub last_occupied_offset: u32,
}

impl TuplePageHeader {
    /// Header of a freshly formatted, empty page.
    pub fn empty(block_size: usize) -> TuplePageHeader {
        TuplePageHeader {
            checksum: 0,
            page_size: block_size as u32,
            slot_count: 0,
            last_occupied_offset: block_size as u32,
        }
    }

    pub fn read_from(buf: &[u8]) -> TuplePageHeader {
        TuplePageHeader {
            checksum: read_u64(buf, 4),
            page_size: read_u32(buf, 12),
            slot_count: read_u32(buf, 16),
            last_occupied_offset: read_u32(buf, 20),
        }
    }

    pub fn write_to(&self, buf: &mut [u8]) {
        write_u32(buf, 0, PageType::Tuple.as_u32());
        write_u64(buf, 4, self.checksum);
        write_u32(buf, 12, self.page_size);
        write_u32(buf, 16, self.slot_count);
        write_u32(buf, 20, self.last_occupied_offset);
    }
}

/// A 32-bit slot: MSB is the occupancy flag, the remaining 31 bits are the
/// byte offset of the record within the page.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Slot(u32);

impl Slot {
    pub fn from_raw(raw: u32) -> Slot {
        Slot(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_occupied(self) -> bool {
        self.0 & OCCUPIED_BIT != 0
    }

    pub fn set_occupied(&mut self, occupied: bool) {
        if occupied {
            self.0 |= OCCUPIED_BIT;
        } else {
            self.0 &= OFFSET_BITS;
        }
    }

    pub fn offset(self) -> u32 {
        self.0 & OFFSET_BITS
    }

    pub fn set_offset(&mut self, offset: u32) {
        if offset >= OCCUPIED_BIT {
            panic!("{}", SLOT_OFFSET_TOO_LARGE_MSG);
        }
        self.0 = (self.0 & OCCUPIED_BIT) | (offset & OFFSET_BITS);
    }
}

pub fn slot_at(buf: &[u8], index: u32) -> Slot {
    let offset = TUPLE_PAGE_HEADER_SIZE + index as usize * SLOT_SIZE;
    Slot(read_u32(buf, offset))
}

pub fn put_slot(buf: &mut [u8], index: u32, slot: Slot) {
    let offset = TUPLE_PAGE_HEADER_SIZE + index as usize * SLOT_SIZE;
    write_u32(buf, offset, slot.raw());
}

/// Free space recorded for a newly formatted tuple page.
pub fn max_tuple_space(block_size: usize) -> u32 {
    (block_size - TUPLE_PAGE_HEADER_SIZE) as u32
}

/// Squeezes the holes left by deleted records out of the tuple region.
///
/// Record lengths are not stored in slots; they are recovered from the
/// offsets themselves: every slot offset inside the tuple region marks a
/// boundary, and a record runs from its offset to the next boundary above
/// it. Freed slots keep their stale offset until this runs, precisely so
/// that the hole they left remains measurable; afterwards their offset is
/// cleared.
pub fn compact(buf: &mut [u8]) {
    let mut header = TuplePageHeader::read_from(buf);
    let page_size = header.page_size;

    let slots: Vec<Slot> = (0..header.slot_count).map(|i| slot_at(buf, i)).collect();
    let mut boundaries: Vec<u32> = slots
        .iter()
        .map(|slot| slot.offset())
        .filter(|offset| *offset >= header.last_occupied_offset && *offset < page_size)
        .collect();
    boundaries.push(page_size);
    boundaries.sort_unstable();
    let end_of = |offset: u32| -> u32 {
        boundaries[boundaries.partition_point(|b| *b <= offset)]
    };

    // relocate occupied records toward the end of the page, highest first,
    // so every move is downward and overlap-safe
    let mut occupied: Vec<(u32, u32)> = (0..header.slot_count)
        .zip(slots.iter())
        .filter(|(_, slot)| slot.is_occupied())
        .map(|(index, slot)| (index, slot.offset()))
        .collect();
    occupied.sort_unstable_by(|a, b| b.1.cmp(&a.1));

    let mut write_end = page_size;
    for (index, offset) in occupied {
        let size = end_of(offset) - offset;
        let new_offset = write_end - size;
        if new_offset != offset {
            buf.copy_within(offset as usize..(offset + size) as usize, new_offset as usize);
            let mut slot = slot_at(buf, index);
            slot.set_offset(new_offset);
            put_slot(buf, index, slot);
        }
        write_end = new_offset;
    }

    // stale offsets on freed slots are no longer boundaries
    for index in 0..header.slot_count {
        let mut slot = slot_at(buf, index);
        if !slot.is_occupied() {
            slot.set_offset(0);
            put_slot(buf, index, slot);
        }
    }

    header.last_occupied_offset = write_end;
    header.write_to(buf);
}
