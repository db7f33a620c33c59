use super::*;
use common::{PageId, RecordId};
use tempfile::tempdir;

fn rid(slot: u16) -> RecordId {
    RecordId {
        page_id: PageId(0),
        slot,
    }
}

#[test]
fn create_empty_index() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");

    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 4).unwrap();
    let err = index.find_key(&Value::Int(1)).unwrap_err();
    assert!(matches!(err, DbError::KeyNotFound));
    assert_eq!(index.get_num_entries(), 0);
    assert_eq!(index.get_key_type(), DataType::Int);
}

#[test]
fn insert_and_find_single_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 4).unwrap();

    index.insert_key(Value::Int(42), rid(0)).unwrap();
    assert_eq!(index.find_key(&Value::Int(42)).unwrap(), rid(0));
    assert!(matches!(
        index.find_key(&Value::Int(99)).unwrap_err(),
        DbError::KeyNotFound
    ));
}

#[test]
fn insert_many_keys_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 4).unwrap();

    for i in 0..10 {
        index.insert_key(Value::Int(i), rid(i as u16)).unwrap();
    }
    for i in 0..10 {
        assert_eq!(index.find_key(&Value::Int(i)).unwrap(), rid(i as u16));
    }
}

#[test]
fn insert_many_keys_reverse_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 4).unwrap();

    for i in (0..10).rev() {
        index.insert_key(Value::Int(i), rid(i as u16)).unwrap();
    }
    for i in 0..10 {
        assert_eq!(index.find_key(&Value::Int(i)).unwrap(), rid(i as u16));
    }
}

#[test]
fn duplicate_keys_return_last_inserted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 4).unwrap();

    for slot in 0..3u16 {
        index.insert_key(Value::Int(42), rid(slot)).unwrap();
    }
    assert_eq!(index.find_key(&Value::Int(42)).unwrap(), rid(2));
}

#[test]
fn delete_key_removes_all_duplicates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 4).unwrap();

    for slot in 0..3u16 {
        index.insert_key(Value::Int(42), rid(slot)).unwrap();
    }
    index.insert_key(Value::Int(7), rid(9)).unwrap();

    let removed = index.delete_key(&Value::Int(42)).unwrap();
    assert_eq!(removed, 3);
    assert!(matches!(
        index.find_key(&Value::Int(42)).unwrap_err(),
        DbError::KeyNotFound
    ));
    assert_eq!(index.find_key(&Value::Int(7)).unwrap(), rid(9));
}

#[test]
fn delete_missing_key_removes_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 4).unwrap();
    assert_eq!(index.delete_key(&Value::Int(1)).unwrap(), 0);
}

#[test]
fn scan_yields_ascending_order_across_splits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 3).unwrap();

    for i in (0..20).rev() {
        index.insert_key(Value::Int(i), rid(i as u16)).unwrap();
    }

    let mut scan = index.open_tree_scan().unwrap();
    let mut seen = Vec::new();
    loop {
        match index.next_entry(&mut scan) {
            Ok((Value::Int(k), _)) => seen.push(k),
            Ok(_) => unreachable!(),
            Err(DbError::NoMoreEntries) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    let expected: Vec<i32> = (0..20).collect();
    assert_eq!(seen, expected);
    index.close_tree_scan(scan).unwrap();
}

#[test]
fn text_keys_compare_lexicographically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Str, 4).unwrap();

    for (slot, name) in ["charlie", "alice", "dave", "bob"].iter().enumerate() {
        index
            .insert_key(Value::Str(name.to_string()), rid(slot as u16))
            .unwrap();
    }

    let mut scan = index.open_tree_scan().unwrap();
    let mut seen = Vec::new();
    while let Ok((Value::Str(k), _)) = index.next_entry(&mut scan) {
        seen.push(k);
    }
    assert_eq!(seen, vec!["alice", "bob", "charlie", "dave"]);
}

#[test]
fn persistence_across_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    {
        let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 4).unwrap();
        for i in 0..5 {
            index.insert_key(Value::Int(i), rid(i as u16)).unwrap();
        }
        index.flush().unwrap();
    }
    {
        let mut index = BTreeIndex::open(&path, IndexId(1)).unwrap();
        assert_eq!(index.get_key_type(), DataType::Int);
        assert_eq!(index.get_num_entries(), 5);
        for i in 0..5 {
            assert_eq!(index.find_key(&Value::Int(i)).unwrap(), rid(i as u16));
        }
    }
}

#[test]
fn many_inserts_trigger_splits_and_grow_node_count() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    let mut index = BTreeIndex::create(&path, IndexId(1), DataType::Int, 8).unwrap();

    let count = 200;
    for i in 0..count {
        index.insert_key(Value::Int(i), rid((i % 1000) as u16)).unwrap();
    }
    for i in 0..count {
        index.find_key(&Value::Int(i)).unwrap();
    }
    assert!(index.get_num_nodes() > 1);
}

#[test]
fn destroy_removes_backing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.idx");
    BTreeIndex::create(&path, IndexId(1), DataType::Int, 4).unwrap();
    BTreeIndex::destroy(&path).unwrap();
    assert!(!path.exists());
}
