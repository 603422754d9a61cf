use crate::common::Result;
use crate::query::{FieldRef, Predicate, SortKey, SortOrder, Term, TermOperand};
use crate::sql::execution::{
    create_sorted_temp_table, ModifyScan, ModifyTableScan, ProductModifyScan, ProductScan,
    ProjectScan, Scan, SelectModifyScan, SelectScan, TableScan, TempTableScan,
};
use crate::sql::parser::UpdateStmt;
use crate::storage::heap;
use crate::storage::resource::{ResourceManager, ResourceManagerHandle};
use crate::types::{Constant, FieldType, FieldValue, Schema, Tuple};
use crate::config::config::TEST_BLOCK_SIZE;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use tempfile::TempDir;

const CITIZEN: &str = "citizen";

fn new_resources() -> (TempDir, ResourceManagerHandle) {
    let dir = TempDir::new().expect("Unable to create temp dir");
    let rm = ResourceManager::new_with_handle(TEST_BLOCK_SIZE, 32, dir.path()).unwrap();
    (dir, rm)
}

fn citizen_schema() -> Schema {
    let mut schema = Schema::new();
    schema.add_field(CITIZEN, "name", FieldType::VarChar);
    schema.add_field(CITIZEN, "employment", FieldType::FixedChar(20));
    schema.add_field(CITIZEN, "age", FieldType::Int);
    schema
}

fn citizen(name: &str, employment: &str, age: i32) -> Tuple {
    Tuple::new(vec![
        FieldValue::varchar(name),
        FieldValue::fixed_char(20, employment),
        FieldValue::Int(age),
    ])
}

fn five_citizens() -> Vec<Tuple> {
    vec![
        citizen("David", "Doctor", 27),
        citizen("Brian", "Engineer", 34),
        citizen("David", "Artist", 41),
        citizen("Emma", "Nurse", 31),
        citizen("Miles", "Carpenter", 41),
    ]
}

fn populate(rm: &ResourceManagerHandle, tuples: Vec<Tuple>) {
    heap::insert_tuples(rm, CITIZEN, tuples).unwrap();
}

const REGION: &str = "region";

fn region_schema() -> Schema {
    let mut schema = Schema::new();
    schema.add_field(REGION, "region_name", FieldType::VarChar);
    schema
}

fn populate_regions(rm: &ResourceManagerHandle, names: &[&str]) {
    let tuples = names
        .iter()
        .map(|name| Tuple::new(vec![FieldValue::varchar(*name)]))
        .collect();
    heap::insert_tuples(rm, REGION, tuples).unwrap();
}

fn drain(scan: &mut dyn Scan) -> Result<Vec<Tuple>> {
    let mut rows = Vec::new();
    scan.get_first()?;
    while scan.next()? {
        rows.push(scan.get()?);
    }
    Ok(rows)
}

fn ages(rows: &[Tuple]) -> Vec<i32> {
    rows.iter()
        .map(|row| match row.constant(2) {
            Constant::Num(age) => age,
            Constant::Str(_) => panic!("age should be numeric"),
        })
        .collect()
}

#[test]
fn test_table_scan_returns_inserted_multiset() {
    let (_dir, rm) = new_resources();
    let inserted = five_citizens();
    populate(&rm, inserted.clone());

    let mut scan = TableScan::new(CITIZEN, &rm, citizen_schema());
    let mut rows = drain(&mut scan).unwrap();

    assert_eq!(rows.len(), inserted.len());
    for tuple in &inserted {
        let at = rows.iter().position(|row| row == tuple).expect("missing tuple");
        rows.remove(at);
    }
}

#[test]
fn test_table_scan_on_empty_table() {
    let (_dir, rm) = new_resources();
    heap::create_heap_file(&rm, CITIZEN).unwrap();

    let mut scan = TableScan::new(CITIZEN, &rm, citizen_schema());
    assert!(drain(&mut scan).unwrap().is_empty());
}

#[test]
fn test_select_scan_filters_by_predicate() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());

    let over_40 = Predicate::Term(Term::new(
        TermOperand::Greater,
        FieldRef::bare("age"),
        Constant::Num(40),
    ));
    let table_scan = Box::new(TableScan::new(CITIZEN, &rm, citizen_schema()));
    let mut scan = SelectScan::new(table_scan, over_40);

    let rows = drain(&mut scan).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(ages(&rows).iter().all(|age| *age > 40));
}

#[test]
fn test_project_scan_reorders_columns() {
    let (_dir, rm) = new_resources();
    populate(&rm, vec![citizen("David", "Doctor", 27)]);

    let table_scan = Box::new(TableScan::new(CITIZEN, &rm, citizen_schema()));
    let mut scan = ProjectScan::new(
        table_scan,
        &[FieldRef::bare("age"), FieldRef::new(CITIZEN, "name")],
    )
    .unwrap();

    assert_eq!(scan.schema().field_count(), 2);
    assert_eq!(scan.schema().field_at(0), "age");

    let rows = drain(&mut scan).unwrap();
    assert_eq!(rows[0].constant(0), Constant::Num(27));
    assert_eq!(rows[0].constant(1), Constant::from("David"));
}

#[test]
fn test_project_scan_rejects_unknown_field() {
    let (_dir, rm) = new_resources();
    populate(&rm, vec![citizen("David", "Doctor", 27)]);

    let table_scan = Box::new(TableScan::new(CITIZEN, &rm, citizen_schema()));
    assert!(ProjectScan::new(table_scan, &[FieldRef::bare("salary")]).is_err());
}

#[test]
fn test_product_scan_emits_all_pairs() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());

    let left = Box::new(TableScan::new(CITIZEN, &rm, citizen_schema()));
    let right = Box::new(TableScan::new(CITIZEN, &rm, citizen_schema()));
    let mut scan = ProductScan::new(left, right);

    assert_eq!(scan.schema().field_count(), 6);
    let rows = drain(&mut scan).unwrap();
    assert_eq!(rows.len(), 25);
    assert!(rows.iter().all(|row| row.fields.len() == 6));
}

#[test]
fn test_product_scan_with_empty_side() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());
    heap::create_heap_file(&rm, "empty_table").unwrap();

    let left = Box::new(TableScan::new(CITIZEN, &rm, citizen_schema()));
    let right = Box::new(TableScan::new("empty_table", &rm, citizen_schema()));
    let mut scan = ProductScan::new(left, right);
    assert!(drain(&mut scan).unwrap().is_empty());
}

#[test]
fn test_temp_table_scan_materializes_and_cleans_up() {
    let (dir, rm) = new_resources();
    populate(&rm, five_citizens());

    let temp_files = |dir: &TempDir| -> Vec<String> {
        std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("temp"))
            .collect()
    };

    {
        let table_scan = Box::new(TableScan::new(CITIZEN, &rm, citizen_schema()));
        let mut scan = TempTableScan::new(table_scan, &rm);
        let rows = drain(&mut scan).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(temp_files(&dir).len(), 1);

        // rewinding replays the materialized table
        scan.get_first().unwrap();
        let mut replayed = 0;
        while scan.next().unwrap() {
            replayed += 1;
        }
        assert_eq!(replayed, 5);
    }
    // dropping the scan removed its backing file
    assert!(temp_files(&dir).is_empty());
}

#[test]
fn test_merge_sort_orders_by_age() {
    let (_dir, rm) = new_resources();

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut tuples = Vec::new();
    for i in 0..105 {
        let name_len = rng.gen_range(3..20);
        let name: String = (0..name_len)
            .map(|_| rng.gen_range(b'a'..=b'z') as char)
            .collect();
        tuples.push(citizen(&name, "Engineer", rng.gen_range(18..90) + (i % 2)));
    }
    populate(&rm, tuples);

    let key = SortKey {
        field: FieldRef::bare("age"),
        order: SortOrder::Ascending,
    };
    let mut input = TableScan::new(CITIZEN, &rm, citizen_schema());
    let mut sorted =
        create_sorted_temp_table(TEST_BLOCK_SIZE, 4, &mut input, &key, &rm).unwrap();

    let rows = drain(sorted.as_mut()).unwrap();
    assert_eq!(rows.len(), 105);
    let ages = ages(&rows);
    assert!(ages.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn test_merge_sort_descending() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());

    let key = SortKey {
        field: FieldRef::bare("age"),
        order: SortOrder::Descending,
    };
    let mut input = TableScan::new(CITIZEN, &rm, citizen_schema());
    let mut sorted =
        create_sorted_temp_table(TEST_BLOCK_SIZE, 4, &mut input, &key, &rm).unwrap();

    let rows = drain(sorted.as_mut()).unwrap();
    let ages = ages(&rows);
    assert!(ages.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn test_merge_sort_is_idempotent() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());

    let key = SortKey {
        field: FieldRef::bare("age"),
        order: SortOrder::Ascending,
    };
    let mut input = TableScan::new(CITIZEN, &rm, citizen_schema());
    let mut once = create_sorted_temp_table(TEST_BLOCK_SIZE, 4, &mut input, &key, &rm).unwrap();
    let first = drain(once.as_mut()).unwrap();

    let mut twice =
        create_sorted_temp_table(TEST_BLOCK_SIZE, 4, once.as_mut(), &key, &rm).unwrap();
    let second = drain(twice.as_mut()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_modify_scan_visits_every_tuple() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());

    let mut scan = ModifyTableScan::new(CITIZEN, &rm, citizen_schema()).unwrap();
    let rows = drain(&mut scan).unwrap();
    assert_eq!(rows.len(), 5);
}

#[test]
fn test_delete_removes_matching_tuples() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());

    let over_40 = Predicate::Term(Term::new(
        TermOperand::Greater,
        FieldRef::bare("age"),
        Constant::Num(40),
    ));
    {
        let table = Box::new(ModifyTableScan::new(CITIZEN, &rm, citizen_schema()).unwrap());
        let mut scan = SelectModifyScan::new(table, over_40);
        scan.get_first().unwrap();
        let mut deleted = 0;
        while scan.next().unwrap() {
            assert!(scan.delete_tuple().unwrap());
            deleted += 1;
        }
        assert_eq!(deleted, 2);
    }

    let mut scan = TableScan::new(CITIZEN, &rm, citizen_schema());
    let rows = drain(&mut scan).unwrap();
    assert_eq!(rows.len(), 3);
    let mut remaining = ages(&rows);
    remaining.sort_unstable();
    assert_eq!(remaining, vec![27, 31, 34]);
}

#[test]
fn test_product_modify_scan_replays_join_and_updates_left_only() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());
    populate_regions(&rm, &["North", "South"]);

    // every citizen pairs with every region, left fields first
    let left = Box::new(ModifyTableScan::new(CITIZEN, &rm, citizen_schema()).unwrap());
    let right = Box::new(TableScan::new(REGION, &rm, region_schema()));
    let mut product = ProductModifyScan::new(left, right);
    assert_eq!(product.schema().field_count(), 4);

    product.get_first().unwrap();
    let mut pairs = 0;
    while product.next().unwrap() {
        let row = product.get().unwrap();
        assert_eq!(row.fields.len(), 4);
        assert!(matches!(row.constant(3), Constant::Str(_)));
        pairs += 1;
    }
    assert_eq!(pairs, 10);
    drop(product);

    // updating through the product touches the left tuple under the
    // cursor; each matching citizen is visited once per region row
    let stmt = UpdateStmt {
        table: CITIZEN.to_string(),
        assignments: vec![(
            FieldRef::bare("employment"),
            Constant::from("Retired").into(),
        )],
        predicate: Some(Predicate::Term(Term::new(
            TermOperand::Greater,
            FieldRef::bare("age"),
            Constant::Num(40),
        ))),
    };
    {
        let left = Box::new(ModifyTableScan::new(CITIZEN, &rm, citizen_schema()).unwrap());
        let right = Box::new(TableScan::new(REGION, &rm, region_schema()));
        let product = Box::new(ProductModifyScan::new(left, right));
        let mut scan = SelectModifyScan::new(product, stmt.predicate.clone().unwrap());
        scan.get_first().unwrap();
        let mut updates = 0;
        while scan.next().unwrap() {
            scan.update(&stmt).unwrap();
            updates += 1;
        }
        assert_eq!(updates, 4);
    }

    let mut check = TableScan::new(CITIZEN, &rm, citizen_schema());
    for row in drain(&mut check).unwrap() {
        let expected = match row.constant(2) {
            Constant::Num(age) if age > 40 => Constant::from("Retired"),
            _ => row.constant(1),
        };
        assert_eq!(row.constant(1), expected);
    }

    // the right input came through untouched
    let mut regions = TableScan::new(REGION, &rm, region_schema());
    let rows = drain(&mut regions).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_product_modify_scan_deletes_from_left_only() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());
    populate_regions(&rm, &["North"]);

    let over_40 = Predicate::Term(Term::new(
        TermOperand::Greater,
        FieldRef::bare("age"),
        Constant::Num(40),
    ));
    {
        let left = Box::new(ModifyTableScan::new(CITIZEN, &rm, citizen_schema()).unwrap());
        let right = Box::new(TableScan::new(REGION, &rm, region_schema()));
        let product = Box::new(ProductModifyScan::new(left, right));
        let mut scan = SelectModifyScan::new(product, over_40);
        scan.get_first().unwrap();
        let mut deleted = 0;
        while scan.next().unwrap() {
            assert!(scan.delete_tuple().unwrap());
            deleted += 1;
        }
        assert_eq!(deleted, 2);
    }

    let mut scan = TableScan::new(CITIZEN, &rm, citizen_schema());
    let rows = drain(&mut scan).unwrap();
    assert_eq!(rows.len(), 3);
    let mut remaining = ages(&rows);
    remaining.sort_unstable();
    assert_eq!(remaining, vec![27, 31, 34]);

    // deletion never reaches the right input
    let mut regions = TableScan::new(REGION, &rm, region_schema());
    assert_eq!(drain(&mut regions).unwrap().len(), 1);
}

#[test]
fn test_update_in_place_keeps_record_size() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());

    // CHAR(20) serializes at a fixed width, so this rewrites in place
    let stmt = UpdateStmt {
        table: CITIZEN.to_string(),
        assignments: vec![(
            FieldRef::bare("employment"),
            Constant::from("Programmer").into(),
        )],
        predicate: None,
    };
    let mut scan = ModifyTableScan::new(CITIZEN, &rm, citizen_schema()).unwrap();
    scan.get_first().unwrap();
    while scan.next().unwrap() {
        scan.update(&stmt).unwrap();
    }
    drop(scan);

    let mut check = TableScan::new(CITIZEN, &rm, citizen_schema());
    let rows = drain(&mut check).unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows
        .iter()
        .all(|row| row.constant(1) == Constant::from("Programmer")));
}

#[test]
fn test_update_growing_field_relocates_tuple() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());

    // growing a VARCHAR forces the tuple out of its slot
    let stmt = UpdateStmt {
        table: CITIZEN.to_string(),
        assignments: vec![(
            FieldRef::bare("name"),
            Constant::from("A considerably longer name").into(),
        )],
        predicate: Some(Predicate::Term(Term::new(
            TermOperand::Equal,
            FieldRef::bare("age"),
            Constant::Num(31),
        ))),
    };
    {
        let table = Box::new(ModifyTableScan::new(CITIZEN, &rm, citizen_schema()).unwrap());
        let mut scan = SelectModifyScan::new(table, stmt.predicate.clone().unwrap());
        scan.get_first().unwrap();
        while scan.next().unwrap() {
            scan.update(&stmt).unwrap();
        }
    }

    let mut check = TableScan::new(CITIZEN, &rm, citizen_schema());
    let rows = drain(&mut check).unwrap();
    assert_eq!(rows.len(), 5);
    let renamed: Vec<&Tuple> = rows
        .iter()
        .filter(|row| row.constant(2) == Constant::Num(31))
        .collect();
    assert_eq!(renamed.len(), 1);
    assert_eq!(
        renamed[0].constant(0),
        Constant::from("A considerably longer name")
    );
}

#[test]
fn test_update_then_scan_leaves_others_untouched() {
    let (_dir, rm) = new_resources();
    populate(&rm, five_citizens());

    let stmt = UpdateStmt {
        table: CITIZEN.to_string(),
        assignments: vec![(
            FieldRef::bare("employment"),
            Constant::from("Retired").into(),
        )],
        predicate: Some(Predicate::Term(Term::new(
            TermOperand::Greater,
            FieldRef::bare("age"),
            Constant::Num(40),
        ))),
    };
    {
        let table = Box::new(ModifyTableScan::new(CITIZEN, &rm, citizen_schema()).unwrap());
        let mut scan = SelectModifyScan::new(table, stmt.predicate.clone().unwrap());
        scan.get_first().unwrap();
        while scan.next().unwrap() {
            scan.update(&stmt).unwrap();
        }
    }

    let mut check = TableScan::new(CITIZEN, &rm, citizen_schema());
    for row in drain(&mut check).unwrap() {
        let expected = match row.constant(2) {
            Constant::Num(age) if age > 40 => Constant::from("Retired"),
            _ => row.constant(1),
        };
        assert_eq!(row.constant(1), expected);
    }
}
