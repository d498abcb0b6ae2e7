//! Tests for space reclaim
//!
//! These tests verify:
//! - Threshold gating and mutual exclusion
//! - Full reclaim keeps every live value and deadline, drops the rest
//! - Single-file reclaim moves live records and carries tombstones/deadlines
//! - Both survive restart, including a restart with the old files left behind
//! - A full reclaim that fails while installing its output leaves no trace
//!
//! Every pass runs under both index modes.

use std::fs;
use std::path::Path;

use rosedb::reclaim::{ReclaimCoordinator, RECLAIM_DIR};
use rosedb::storage::{segment_file_name, DataType};
use rosedb::{Config, FileRwMethod, IndexMode, RoseDb, RoseError};
use tempfile::TempDir;

const MODES: [(IndexMode, FileRwMethod); 4] = [
    (IndexMode::KeyValueMem, FileRwMethod::FileIo),
    (IndexMode::KeyValueMem, FileRwMethod::MMap),
    (IndexMode::KeyOnlyMem, FileRwMethod::FileIo),
    (IndexMode::KeyOnlyMem, FileRwMethod::MMap),
];

const IDX_MODES: [IndexMode; 2] = [IndexMode::KeyValueMem, IndexMode::KeyOnlyMem];

// =============================================================================
// Helper Functions
// =============================================================================

/// 3-byte key + 71-byte value + 26-byte header = 100 bytes per set record
fn value(tag: u8) -> Vec<u8> {
    vec![tag; 71]
}

fn reclaim_config(
    dir: &Path,
    mode: IndexMode,
    method: FileRwMethod,
    threshold: i64,
    single: i64,
) -> Config {
    Config::builder()
        .dir_path(dir)
        .rw_method(method)
        .idx_mode(mode)
        .block_size(300)
        .max_key_size(16)
        .max_value_size(128)
        .reclaim_threshold(threshold)
        .single_reclaim_threshold(single)
        .build()
}

fn setup_temp_db(
    mode: IndexMode,
    method: FileRwMethod,
    threshold: i64,
    single: i64,
) -> (TempDir, RoseDb) {
    let temp_dir = TempDir::new().unwrap();
    let db = RoseDb::open(reclaim_config(temp_dir.path(), mode, method, threshold, single)).unwrap();
    (temp_dir, db)
}

fn restart(db: RoseDb) -> RoseDb {
    let config = db.config().clone();
    db.close().unwrap();
    RoseDb::open(config).unwrap()
}

fn string_segments(dir: &Path) -> Vec<u32> {
    let mut ids: Vec<u32> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| {
            let name = e.unwrap().file_name().to_string_lossy().into_owned();
            name.strip_suffix(".data.str").and_then(|id| id.parse().ok())
        })
        .collect();
    ids.sort_unstable();
    ids
}

/// Three generations of ten keys, a few removals and two deadlines
fn populate(db: &RoseDb) {
    for tag in [b'a', b'b', b'c'] {
        for i in 0..10 {
            db.set(format!("k{:02}", i).as_bytes(), &value(tag)).unwrap();
        }
    }
    db.remove(b"k03").unwrap();
    db.remove(b"k07").unwrap();
    db.expire(b"k05", 1000).unwrap();
    db.expire(b"k06", 1000).unwrap();
    db.persist(b"k06").unwrap();
}

fn assert_populated(db: &RoseDb) {
    for i in 0..10 {
        let key = format!("k{:02}", i);
        if i == 3 || i == 7 {
            assert!(matches!(db.get(key.as_bytes()), Err(RoseError::KeyNotExist)), "{}", key);
        } else {
            assert_eq!(db.get(key.as_bytes()).unwrap(), value(b'c'), "{}", key);
        }
    }
    assert!(db.ttl(b"k05").unwrap().is_some());
    assert_eq!(db.ttl(b"k06").unwrap(), None);
    assert_eq!(db.key_count(DataType::String), 8);
}

// =============================================================================
// Coordinator Tests
// =============================================================================

#[test]
fn test_full_and_single_are_exclusive() {
    let coordinator = ReclaimCoordinator::new();

    let full = coordinator.begin_full().unwrap();
    assert!(coordinator.is_reclaiming());
    assert!(matches!(coordinator.begin_single(), Err(RoseError::DbIsReclaiming)));
    assert!(matches!(coordinator.begin_full(), Err(RoseError::DbIsReclaiming)));
    drop(full);

    assert!(!coordinator.is_reclaiming());
    let single = coordinator.begin_single().unwrap();
    assert!(coordinator.is_single_reclaiming());
    assert!(matches!(coordinator.begin_full(), Err(RoseError::DbIsReclaiming)));
    drop(single);

    assert!(coordinator.begin_full().is_ok());
}

#[test]
fn test_reclaim_below_threshold() {
    for mode in IDX_MODES {
        let (_temp, db) = setup_temp_db(mode, FileRwMethod::FileIo, 10_000, 10_000);
        populate(&db);

        assert!(matches!(db.reclaim(), Err(RoseError::ReclaimUnreached)));
        assert_eq!(db.single_reclaim().unwrap(), 0);
    }
}

#[test]
fn test_reclaim_at_threshold_is_unreached() {
    for mode in IDX_MODES {
        let (_temp, db) = setup_temp_db(mode, FileRwMethod::FileIo, 100, 10_000);
        db.set(b"k00", &value(b'a')).unwrap();
        db.set(b"k00", &value(b'b')).unwrap();

        assert_eq!(db.reclaimable_space().values().sum::<i64>(), 100);
        assert!(matches!(db.reclaim(), Err(RoseError::ReclaimUnreached)));
    }
}

// =============================================================================
// Full Reclaim Tests
// =============================================================================

#[test]
fn test_full_reclaim_keeps_live_data() {
    for (mode, method) in MODES {
        let (temp, db) = setup_temp_db(mode, method, 0, 10_000);
        populate(&db);
        let old_active = db.active_file_id(DataType::String);
        let old_files = string_segments(temp.path());

        db.reclaim().unwrap();

        assert_populated(&db);
        assert!(db.reclaimable_space().is_empty());
        assert!(db.active_file_id(DataType::String) > old_active);
        assert!(db
            .archived_file_ids(DataType::String)
            .iter()
            .all(|&id| id > old_active));

        let new_files = string_segments(temp.path());
        assert!(new_files.len() < old_files.len());
        assert!(new_files.iter().all(|&id| id > old_active));
        assert!(!temp.path().join(RECLAIM_DIR).exists());

        let db = restart(db);
        assert_populated(&db);
        assert!(db.reclaimable_space().is_empty());
    }
}

#[test]
fn test_full_reclaim_then_writes() {
    for (mode, method) in MODES {
        let (_temp, db) = setup_temp_db(mode, method, 0, 10_000);
        populate(&db);
        db.reclaim().unwrap();

        // same value as the moved record: skipped in KeyValueMem mode
        db.set(b"k01", &value(b'c')).unwrap();
        db.set(b"k00", &value(b'z')).unwrap();
        db.set(b"new", &value(b'n')).unwrap();

        let db = restart(db);
        assert_eq!(db.get(b"k00").unwrap(), value(b'z'));
        assert_eq!(db.get(b"k01").unwrap(), value(b'c'));
        assert_eq!(db.get(b"new").unwrap(), value(b'n'));
    }
}

#[test]
fn test_full_reclaim_crash_before_delete_replays_same_state() {
    let (temp, db) = setup_temp_db(IndexMode::KeyOnlyMem, FileRwMethod::FileIo, 0, 10_000);
    populate(&db);
    db.sync().unwrap();

    let backup = TempDir::new().unwrap();
    let old_ids = string_segments(temp.path());
    for &id in &old_ids {
        let name = segment_file_name(id, DataType::String);
        fs::copy(temp.path().join(&name), backup.path().join(&name)).unwrap();
    }

    db.reclaim().unwrap();
    let config = db.config().clone();
    db.close().unwrap();

    // Old files reappear, as if the process died before deleting them
    for &id in &old_ids {
        let name = segment_file_name(id, DataType::String);
        fs::copy(backup.path().join(&name), temp.path().join(&name)).unwrap();
    }

    let db = RoseDb::open(config).unwrap();
    assert_populated(&db);
}

#[test]
fn test_full_reclaim_failed_install_keeps_later_writes() {
    for (mode, method) in MODES {
        let (temp, db) = setup_temp_db(mode, method, 0, 10_000);
        populate(&db);
        let active = db.active_file_id(DataType::String);

        // output spans active+1..=active+3; the second rename hits a directory
        let blocker = temp.path().join(segment_file_name(active + 2, DataType::String));
        fs::create_dir(&blocker).unwrap();
        let before = string_segments(temp.path());

        assert!(matches!(db.reclaim(), Err(RoseError::Io(_))));

        assert_eq!(string_segments(temp.path()), before);
        assert!(!temp.path().join(RECLAIM_DIR).exists());
        assert_eq!(db.active_file_id(DataType::String), active);
        assert!(!db.reclaimable_space().is_empty());
        assert_eq!(db.get(b"k00").unwrap(), value(b'c'));

        db.set(b"k00", b"fresh").unwrap();
        assert_eq!(db.get(b"k00").unwrap(), b"fresh");

        let db = restart(db);
        assert_eq!(db.get(b"k00").unwrap(), b"fresh");
        assert_eq!(db.get(b"k01").unwrap(), value(b'c'));

        fs::remove_dir(&blocker).unwrap();
        db.reclaim().unwrap();
        assert_eq!(db.get(b"k00").unwrap(), b"fresh");
        assert!(db.ttl(b"k05").unwrap().is_some());
    }
}

#[test]
fn test_leftover_reclaim_dir_removed_on_open() {
    let temp = TempDir::new().unwrap();
    let tmp_dir = temp.path().join(RECLAIM_DIR);
    fs::create_dir_all(&tmp_dir).unwrap();
    fs::write(tmp_dir.join(segment_file_name(9, DataType::String)), b"partial").unwrap();

    let config = reclaim_config(temp.path(), IndexMode::KeyOnlyMem, FileRwMethod::FileIo, 0, 0);
    let db = RoseDb::open(config).unwrap();

    assert!(!tmp_dir.exists());
    assert_eq!(db.active_file_id(DataType::String), 0);
}

// =============================================================================
// Single Reclaim Tests
// =============================================================================

#[test]
fn test_single_reclaim_moves_live_records() {
    for (mode, method) in MODES {
        let (temp, db) = setup_temp_db(mode, method, i64::MAX, 150);

        // file 0: k00 k01 k02 (a)
        for i in 0..3 {
            db.set(format!("k{:02}", i).as_bytes(), &value(b'a')).unwrap();
        }
        // file 1: k00 k01 (b) + k03, file 2 onwards: more overwrites
        db.set(b"k00", &value(b'b')).unwrap();
        db.set(b"k01", &value(b'b')).unwrap();
        db.set(b"k03", &value(b'a')).unwrap();
        db.set(b"k04", &value(b'a')).unwrap();

        assert_eq!(db.reclaimable_space().get(&0), Some(&200));

        let reclaimed = db.single_reclaim().unwrap();

        assert_eq!(reclaimed, 1);
        assert!(!string_segments(temp.path()).contains(&0));
        assert_eq!(db.reclaimable_space().get(&0), None);
        assert_eq!(db.get(b"k02").unwrap(), value(b'a'));
        assert_ne!(db.indexer(b"k02").unwrap().file_id, 0);

        let db = restart(db);
        assert_eq!(db.get(b"k00").unwrap(), value(b'b'));
        assert_eq!(db.get(b"k01").unwrap(), value(b'b'));
        assert_eq!(db.get(b"k02").unwrap(), value(b'a'));
        assert_eq!(db.get(b"k03").unwrap(), value(b'a'));
        assert_eq!(db.get(b"k04").unwrap(), value(b'a'));
    }
}

#[test]
fn test_single_reclaim_carries_tombstones() {
    for mode in IDX_MODES {
        let (temp, db) = setup_temp_db(mode, FileRwMethod::FileIo, i64::MAX, 150);

        // file 0: kaa kcc kee
        for key in [b"kaa", b"kcc", b"kee"] {
            db.set(key, &value(b'a')).unwrap();
        }
        // file 1: remove kaa (29), kbb v1 (100), kbb v2 (100)
        db.remove(b"kaa").unwrap();
        db.set(b"kbb", &value(b'1')).unwrap();
        db.set(b"kbb", &value(b'2')).unwrap();
        // file 2: kbb v3
        db.set(b"kbb", &value(b'3')).unwrap();

        assert_eq!(db.reclaimable_space().get(&0), Some(&100));
        assert_eq!(db.reclaimable_space().get(&1), Some(&200));

        assert_eq!(db.single_reclaim().unwrap(), 1);
        assert_eq!(string_segments(temp.path()), vec![0, 2]);

        let db = restart(db);
        assert!(matches!(db.get(b"kaa"), Err(RoseError::KeyNotExist)));
        assert_eq!(db.get(b"kbb").unwrap(), value(b'3'));
        assert_eq!(db.get(b"kcc").unwrap(), value(b'a'));
    }
}

#[test]
fn test_single_reclaim_carries_deadlines() {
    for mode in IDX_MODES {
        let (_temp, db) = setup_temp_db(mode, FileRwMethod::FileIo, i64::MAX, 150);

        // file 0: kaa kcc kee
        for key in [b"kaa", b"kcc", b"kee"] {
            db.set(key, &value(b'a')).unwrap();
        }
        // file 1: expire kaa (29), kbb v1, kbb v2
        db.expire(b"kaa", 1000).unwrap();
        db.set(b"kbb", &value(b'1')).unwrap();
        db.set(b"kbb", &value(b'2')).unwrap();
        // file 2
        db.set(b"kbb", &value(b'3')).unwrap();

        assert_eq!(db.single_reclaim().unwrap(), 1);

        let db = restart(db);
        assert!(db.ttl(b"kaa").unwrap().is_some());
        assert_eq!(db.get(b"kaa").unwrap(), value(b'a'));
    }
}

#[test]
fn test_single_reclaim_skips_active_file() {
    for mode in IDX_MODES {
        let (_temp, db) = setup_temp_db(mode, FileRwMethod::FileIo, i64::MAX, 1);
        db.set(b"k00", &value(b'a')).unwrap();
        db.set(b"k00", &value(b'b')).unwrap();

        // only file 0 exists and it is active
        assert_eq!(db.single_reclaim().unwrap(), 0);
        assert_eq!(db.get(b"k00").unwrap(), value(b'b'));
    }
}
