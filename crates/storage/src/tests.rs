use super::*;
use tempfile::tempdir;

#[test]
fn create_initializes_one_zero_page() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();

    let mut handle = PageFile::open(&path).unwrap();
    assert_eq!(handle.total_pages(), 1);

    let mut buf = [0u8; PAGE_SIZE];
    handle.read_block(0, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn page_file_round_trip_scenario() {
    // spec §8 end-to-end scenario 1
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();

    let mut handle = PageFile::open(&path).unwrap();
    handle.append_empty_block().unwrap();
    handle.append_empty_block().unwrap();

    let buf: Vec<u8> = (0..PAGE_SIZE).map(|i| (i % 256) as u8).collect();
    handle.write_block(1, &buf).unwrap();
    handle.close().unwrap();

    let mut handle = PageFile::open(&path).unwrap();
    let mut out = vec![0u8; PAGE_SIZE];
    handle.read_block(1, &mut out).unwrap();

    assert_eq!(out, buf);
    assert_eq!(handle.total_pages(), 3);
}

#[test]
fn read_out_of_range_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();
    let mut handle = PageFile::open(&path).unwrap();

    let mut buf = [0u8; PAGE_SIZE];
    let err = handle.read_block(5, &mut buf).unwrap_err();
    assert!(matches!(err, DbError::ReadNonExistingPage(5)));
}

#[test]
fn write_at_total_pages_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();
    let mut handle = PageFile::open(&path).unwrap();
    assert_eq!(handle.total_pages(), 1);

    let buf = [7u8; PAGE_SIZE];
    handle.write_block(1, &buf).unwrap();
    assert_eq!(handle.total_pages(), 2);

    let mut out = [0u8; PAGE_SIZE];
    handle.read_block(1, &mut out).unwrap();
    assert_eq!(out, buf);
}

#[test]
fn write_past_total_pages_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();
    let mut handle = PageFile::open(&path).unwrap();

    let buf = [0u8; PAGE_SIZE];
    let err = handle.write_block(5, &buf).unwrap_err();
    assert!(matches!(err, DbError::WriteFailed(_)));
}

#[test]
fn ensure_capacity_grows_to_target() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();
    let mut handle = PageFile::open(&path).unwrap();

    handle.ensure_capacity(5).unwrap();
    assert_eq!(handle.total_pages(), 5);

    // Calling again with a smaller target is a no-op.
    handle.ensure_capacity(2).unwrap();
    assert_eq!(handle.total_pages(), 5);
}

#[test]
fn close_then_use_fails_with_handle_not_init() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();
    let mut handle = PageFile::open(&path).unwrap();
    handle.close().unwrap();

    let mut buf = [0u8; PAGE_SIZE];
    let err = handle.read_block(0, &mut buf).unwrap_err();
    assert!(matches!(err, DbError::FileHandleNotInit));

    let err = handle.close().unwrap_err();
    assert!(matches!(err, DbError::FileHandleNotInit));
}

#[test]
fn destroy_removes_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();
    PageFile::destroy(&path).unwrap();

    let err = PageFile::open(&path).unwrap_err();
    assert!(matches!(err, DbError::FileNotFound(_)));
}

#[test]
fn destroy_missing_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.pf");
    let err = PageFile::destroy(&path).unwrap_err();
    assert!(matches!(err, DbError::FileNotFound(_)));
}

#[test]
fn open_missing_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.pf");
    let err = PageFile::open(&path).unwrap_err();
    assert!(matches!(err, DbError::FileNotFound(_)));
}

#[test]
fn stats_render_includes_bookkeeping_fields() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();
    let mut handle = PageFile::open(&path).unwrap();
    handle.ensure_capacity(3).unwrap();

    let rendered = handle.stats().to_string();
    assert!(rendered.contains("total_pages"));
    assert!(rendered.contains('3'));
}

#[test]
fn convenience_readers_follow_cursor() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.pf");
    PageFile::create(&path).unwrap();
    let mut handle = PageFile::open(&path).unwrap();
    handle.ensure_capacity(4).unwrap();

    for i in 0..4u64 {
        let buf = vec![i as u8; PAGE_SIZE];
        handle.write_block(i, &buf).unwrap();
    }

    let mut buf = vec![0u8; PAGE_SIZE];
    handle.first(&mut buf).unwrap();
    assert_eq!(buf[0], 0);

    handle.next(&mut buf).unwrap();
    assert_eq!(buf[0], 1);

    handle.current(&mut buf).unwrap();
    assert_eq!(buf[0], 1);

    handle.prev(&mut buf).unwrap();
    assert_eq!(buf[0], 0);

    handle.last(&mut buf).unwrap();
    assert_eq!(buf[0], 3);
}
