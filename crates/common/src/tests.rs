use super::*;
use std::io;

#[test]
fn config_defaults_are_sane() {
    let cfg = Config::default();
    assert_eq!(cfg.page_size, 4096);
    assert_eq!(cfg.buffer_pool_frames, 64);
    assert_eq!(cfg.replacement_strategy, ReplacementStrategy::Lru);
}

#[test]
fn config_builder_overrides_defaults() {
    let cfg = Config::builder()
        .buffer_pool_frames(8)
        .replacement_strategy(ReplacementStrategy::Fifo)
        .build();
    assert_eq!(cfg.buffer_pool_frames, 8);
    assert_eq!(cfg.replacement_strategy, ReplacementStrategy::Fifo);
}

#[test]
fn db_error_formats_cleanly() {
    let err = DbError::RecordNotFound(RecordId {
        page_id: PageId(1),
        slot: 2,
    });
    assert!(format!("{err}").contains("record not found"));
}

#[test]
fn io_error_converts() {
    let e = io::Error::other("oops");
    let db_err: DbError = e.into();
    assert!(matches!(db_err, DbError::Io(_)));
}

#[test]
fn record_id_equality() {
    let a = RecordId {
        page_id: PageId(1),
        slot: 0,
    };
    let b = RecordId {
        page_id: PageId(1),
        slot: 0,
    };
    let c = RecordId {
        page_id: PageId(1),
        slot: 1,
    };
    assert_eq!(a, b);
    assert_ne!(a, c);
}
