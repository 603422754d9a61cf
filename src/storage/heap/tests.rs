use crate::common::constants::NO_PAGE;
use crate::config::config::TEST_BLOCK_SIZE;
use crate::storage::heap::{create_heap_file, insert_tuples, HeapFileIterator};
use crate::storage::page::{
    entry_at, entry_capacity, max_tuple_space, slot_at, DirectoryHeader, PageType,
    TuplePageHeader, SLOT_SIZE, TUPLE_PAGE_HEADER_SIZE,
};
use crate::storage::resource::{ResourceManager, ResourceManagerHandle};
use crate::types::{FieldValue, Tuple};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use tempfile::TempDir;

const FILE: &str = "heap_test";

fn new_resources() -> (TempDir, ResourceManagerHandle) {
    let dir = TempDir::new().expect("Unable to create temp dir");
    let rm = ResourceManager::new_with_handle(TEST_BLOCK_SIZE, 10, dir.path()).unwrap();
    (dir, rm)
}

fn citizen(name: &str, employment: &str, age: i32) -> Tuple {
    Tuple::new(vec![
        FieldValue::varchar(name),
        FieldValue::fixed_char(20, employment),
        FieldValue::Int(age),
    ])
}

fn random_citizen(rng: &mut ChaCha8Rng) -> Tuple {
    let len = rng.gen_range(1..24);
    let name: String = (0..len)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect();
    citizen(&name, "Engineer", rng.gen_range(18..65))
}

#[test]
fn test_open_formats_new_file() {
    let (_dir, rm) = new_resources();
    let _iter = HeapFileIterator::new(FILE, &rm).unwrap();

    let entries = entry_capacity(TEST_BLOCK_SIZE) as u64;
    let pages = rm.read().unwrap().file_manager.page_count(FILE).unwrap();
    assert_eq!(pages, entries + 1);
}

#[test]
fn test_new_file_directory_shape() {
    let (_dir, rm) = new_resources();
    let iter = HeapFileIterator::new(FILE, &rm).unwrap();

    let entries = entry_capacity(TEST_BLOCK_SIZE) as u64;
    let header = iter.dir_page().with(DirectoryHeader::read_from);
    assert_eq!(header.next_page, NO_PAGE);
    assert_eq!(header.prev_page, NO_PAGE);
    assert_eq!(header.entry_count, entries);
    assert_eq!(header.dir_index, 1);
    assert_eq!(header.table_name, FILE);

    // entry i governs the page immediately following the directory
    iter.dir_page().with(|buf| {
        for i in 0..entries as u32 {
            let entry = entry_at(buf, i);
            assert_eq!(entry.page_number, i as u64 + 1);
            assert_eq!(entry.free_space, max_tuple_space(TEST_BLOCK_SIZE));
        }
    });
}

#[test]
fn test_new_file_tuple_pages_are_formatted() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();

    let mut visited = 0;
    while iter.next_page_in_dir().unwrap() {
        let page = iter.tuple_page().unwrap();
        page.with(|buf| {
            assert_eq!(PageType::of(buf), PageType::Tuple);
            let header = TuplePageHeader::read_from(buf);
            assert_eq!(header.slot_count, 0);
            assert_eq!(header.page_size, TEST_BLOCK_SIZE as u32);
            assert_eq!(header.last_occupied_offset, TEST_BLOCK_SIZE as u32);
        });
        visited += 1;
    }
    assert_eq!(visited, entry_capacity(TEST_BLOCK_SIZE));
    assert!(iter.tuple_page().is_none());
}

#[test]
fn test_open_existing_file_does_not_reformat() {
    let (_dir, rm) = new_resources();
    {
        let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();
        iter.insert_tuple(&citizen("David", "Doctor", 27)).unwrap();
    }

    let pages_before = rm.read().unwrap().file_manager.page_count(FILE).unwrap();
    let iter = HeapFileIterator::new(FILE, &rm).unwrap();
    let pages_after = rm.read().unwrap().file_manager.page_count(FILE).unwrap();
    assert_eq!(pages_before, pages_after);
    drop(iter);
}

#[test]
fn test_insert_updates_slot_and_free_space() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();

    let tuple = citizen("David", "Doctor", 27);
    iter.insert_tuple(&tuple).unwrap();

    let page = iter.tuple_page().expect("cursor should rest on the page");
    page.with(|buf| {
        let header = TuplePageHeader::read_from(buf);
        assert_eq!(header.slot_count, 1);
        assert_eq!(
            header.last_occupied_offset,
            TEST_BLOCK_SIZE as u32 - tuple.record_size
        );
        let slot = slot_at(buf, 0);
        assert!(slot.is_occupied());
        assert_eq!(slot.offset(), header.last_occupied_offset);
    });

    iter.dir_page().with(|buf| {
        let entry = entry_at(buf, iter.entry_index());
        assert_eq!(
            entry.free_space,
            max_tuple_space(TEST_BLOCK_SIZE) - tuple.record_size - SLOT_SIZE as u32
        );
    });
}

/// For every page: occupied bytes + header + slot array + recorded free
/// space must account for the whole block.
#[test]
fn test_space_accounting_balances() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..40 {
        iter.insert_tuple(&random_citizen(&mut rng)).unwrap();
    }

    iter.rewind_to_first_dir().unwrap();
    loop {
        while iter.next_page_in_dir().unwrap() {
            let entry = iter
                .dir_page()
                .with(|buf| entry_at(buf, iter.entry_index()));
            assert!(entry.free_space <= max_tuple_space(TEST_BLOCK_SIZE));

            iter.tuple_page().unwrap().with(|buf| {
                let header = TuplePageHeader::read_from(buf);
                let occupied: u32 = (TEST_BLOCK_SIZE as u32) - header.last_occupied_offset;
                assert_eq!(
                    occupied
                        + TUPLE_PAGE_HEADER_SIZE as u32
                        + header.slot_count * SLOT_SIZE as u32
                        + entry.free_space,
                    TEST_BLOCK_SIZE as u32
                );
            });
        }
        if !iter.next_dir().unwrap() {
            break;
        }
    }
}

#[test]
fn test_tuple_that_exactly_fills_a_page() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();

    // one record + one slot consumes the entire usable region
    let payload = max_tuple_space(TEST_BLOCK_SIZE) as usize - SLOT_SIZE - 4;
    let tuple = Tuple::new(vec![FieldValue::varchar("x".repeat(payload))]);
    iter.insert_tuple(&tuple).unwrap();

    iter.dir_page().with(|buf| {
        assert_eq!(entry_at(buf, iter.entry_index()).free_space, 0);
    });
}

#[test]
fn test_find_space_skips_full_pages() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();

    // nearly fill page 1, leaving less than another big record's worth
    let big = Tuple::new(vec![FieldValue::varchar("x".repeat(400))]);
    iter.insert_tuple(&big).unwrap();
    assert_eq!(iter.entry_index(), 0);

    iter.rewind_to_first_dir().unwrap();
    iter.insert_tuple(&big).unwrap();
    assert_eq!(iter.entry_index(), 1);
}

#[test]
fn test_extension_doubles_directory_count() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();

    iter.extend().unwrap();

    // chain now holds directories 1 and 2
    iter.rewind_to_first_dir().unwrap();
    let first = iter.dir_page().with(DirectoryHeader::read_from);
    assert_eq!(first.dir_index, 1);
    assert_ne!(first.next_page, NO_PAGE);

    assert!(iter.next_dir().unwrap());
    let second = iter.dir_page().with(DirectoryHeader::read_from);
    assert_eq!(second.dir_index, 2);
    assert_eq!(second.next_page, NO_PAGE);
    assert_eq!(second.prev_page, 0);
    assert!(!iter.next_dir().unwrap());

    let entries = entry_capacity(TEST_BLOCK_SIZE) as u64;
    let pages = rm.read().unwrap().file_manager.page_count(FILE).unwrap();
    assert_eq!(pages, 2 * (entries + 1));
}

#[test]
fn test_directory_chain_indices_have_no_gaps() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();
    iter.extend().unwrap(); // 1 -> 2
    iter.extend().unwrap(); // 2 -> 4

    iter.rewind_to_first_dir().unwrap();
    let mut expected = 1;
    loop {
        assert_eq!(
            iter.dir_page().with(DirectoryHeader::read_from).dir_index,
            expected
        );
        if !iter.next_dir().unwrap() {
            break;
        }
        expected += 1;
    }
    assert_eq!(expected, 4);
}

#[test]
fn test_insert_triggers_extension_without_losing_tuples() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();

    // each of these fills a page by itself, so the initial complement of
    // pages runs out and insertion must grow the file
    let entries = entry_capacity(TEST_BLOCK_SIZE);
    let count = entries + 3;
    for i in 0..count {
        let tuple = Tuple::new(vec![
            FieldValue::Int(i as i32),
            FieldValue::varchar("x".repeat(380)),
        ]);
        iter.rewind_to_first_dir().unwrap();
        iter.insert_tuple(&tuple).unwrap();
    }

    let pages = rm.read().unwrap().file_manager.page_count(FILE).unwrap();
    assert_eq!(pages, 2 * (entries as u64 + 1));

    // every inserted tuple is still reachable through the directory chain
    iter.rewind_to_first_dir().unwrap();
    let mut seen = vec![false; count];
    loop {
        while iter.next_page_in_dir().unwrap() {
            iter.tuple_page().unwrap().with(|buf| {
                let header = TuplePageHeader::read_from(buf);
                for s in 0..header.slot_count {
                    let slot = slot_at(buf, s);
                    if slot.is_occupied() {
                        let offset = slot.offset() as usize;
                        let id =
                            i32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
                        seen[id as usize] = true;
                    }
                }
            });
        }
        if !iter.next_dir().unwrap() {
            break;
        }
    }
    assert!(seen.iter().all(|found| *found));
}

#[test]
fn test_insert_reuses_freed_slots() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();

    iter.insert_tuple(&citizen("David", "Doctor", 27)).unwrap();
    iter.insert_tuple(&citizen("Brian", "Engineer", 34)).unwrap();

    // free slot 0 by hand, the way a delete does
    let freed = iter.tuple_page().unwrap().with_mut(|buf| {
        let mut slot = slot_at(buf, 0);
        slot.set_occupied(false);
        crate::storage::page::put_slot(buf, 0, slot);
        slot
    });
    assert!(!freed.is_occupied());

    iter.rewind_to_first_dir().unwrap();
    iter.insert_tuple(&citizen("Emma", "Nurse", 31)).unwrap();
    iter.tuple_page().unwrap().with(|buf| {
        assert!(slot_at(buf, 0).is_occupied());
        assert_eq!(TuplePageHeader::read_from(buf).slot_count, 2);
    });
}

/// A record that fits the accounting but not the contiguous region forces
/// the page to squeeze out its holes rather than run into the slot array.
#[test]
fn test_insert_after_delete_reclaims_fragmented_space() {
    let (_dir, rm) = new_resources();
    let mut iter = HeapFileIterator::new(FILE, &rm).unwrap();

    // four 104-byte records fill most of the page
    let record = |tag: &str| Tuple::new(vec![FieldValue::varchar(tag.repeat(100))]);
    for tag in ["a", "b", "c", "d"] {
        iter.rewind_to_first_dir().unwrap();
        iter.insert_tuple(&record(tag)).unwrap();
    }
    assert_eq!(iter.entry_index(), 0);

    // free the first two slots and credit their bytes back, as deletes do
    iter.tuple_page().unwrap().with_mut(|buf| {
        for i in 0..2u32 {
            let mut slot = slot_at(buf, i);
            slot.set_occupied(false);
            crate::storage::page::put_slot(buf, i, slot);
        }
    });
    iter.dir_page().with_mut(|buf| {
        let mut entry = entry_at(buf, 0);
        entry.free_space += 2 * 104;
        crate::storage::page::put_entry(buf, 0, &entry);
    });

    // 204 bytes of contiguous room remain at the low end, but the freed
    // bytes bring the total to enough for this record
    let big = Tuple::new(vec![FieldValue::varchar("e".repeat(200))]);
    iter.rewind_to_first_dir().unwrap();
    iter.insert_tuple(&big).unwrap();
    assert_eq!(iter.entry_index(), 0);

    // survivors and the newcomer all read back intact
    iter.tuple_page().unwrap().with(|buf| {
        let header = TuplePageHeader::read_from(buf);
        assert!(header.last_occupied_offset >= TUPLE_PAGE_HEADER_SIZE as u32 + 4 * SLOT_SIZE as u32);

        let mut seen = Vec::new();
        for i in 0..header.slot_count {
            let slot = slot_at(buf, i);
            if slot.is_occupied() {
                let field = crate::types::FieldType::VarChar.read(buf, slot.offset() as usize);
                match field.to_constant() {
                    crate::types::Constant::Str(s) => seen.push(s),
                    other => panic!("unexpected field {other:?}"),
                }
            }
        }
        seen.sort();
        assert_eq!(
            seen,
            vec!["c".repeat(100), "d".repeat(100), "e".repeat(200)]
        );
    });
}

#[test]
fn test_batch_insert_orders_by_record_size() {
    let (_dir, rm) = new_resources();

    let tuples = vec![
        Tuple::new(vec![FieldValue::varchar("a much longer name here")]),
        Tuple::new(vec![FieldValue::varchar("ab")]),
        Tuple::new(vec![FieldValue::varchar("medium name")]),
    ];
    insert_tuples(&rm, FILE, tuples).unwrap();

    let iter = HeapFileIterator::new(FILE, &rm).unwrap();
    let mut cursor = iter;
    assert!(cursor.next_page_in_dir().unwrap());
    cursor.tuple_page().unwrap().with(|buf| {
        // smallest record was inserted first, so it sits highest in the page
        let first = slot_at(buf, 0).offset();
        let second = slot_at(buf, 1).offset();
        let third = slot_at(buf, 2).offset();
        assert!(first > second);
        assert!(second > third);
    });
}

#[test]
fn test_create_heap_file_is_directory_page_zero() {
    let (_dir, rm) = new_resources();
    create_heap_file(&rm, FILE).unwrap();

    let iter = HeapFileIterator::new(FILE, &rm).unwrap();
    iter.dir_page()
        .with(|buf| assert_eq!(PageType::of(buf), PageType::Directory));
}

#[test]
fn test_can_store_page_entry_tracks_remaining_directory_bytes() {
    let (_dir, rm) = new_resources();
    let iter = HeapFileIterator::new(FILE, &rm).unwrap();

    // formatting packs the directory with its full complement of entries,
    // so a fresh directory has no room for one more
    assert!(!iter.can_store_page_entry());

    // with one entry's worth of slack it can take a replacement
    iter.dir_page().with_mut(|buf| {
        let mut header = DirectoryHeader::read_from(buf);
        header.entry_count -= 1;
        header.write_to(buf);
    });
    assert!(iter.can_store_page_entry());
}
