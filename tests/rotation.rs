use std::fs;
use std::sync::Arc;

use cronbook::{FixedClock, Store, StoreConfig};
use tempfile::tempdir;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn small_store(root: &std::path::Path, clock: Arc<FixedClock>) -> Store {
    let config = StoreConfig {
        rotate_size: 20,
        rotate_max: 2,
        ..StoreConfig::new(root)
    };
    Store::with_clock(config, clock).expect("store")
}

#[test]
fn crossing_the_threshold_creates_one_backup() {
    let dir = tempdir().expect("tempdir");
    let store = small_store(dir.path(), Arc::new(FixedClock::new(1)));

    let report = store
        .add("m", strings(&["v"]), vec![strings(&["first"])])
        .expect("add");

    assert!(report.rotated);
    let backup = store.backup_path("m", 1).expect("path");
    let archived = fs::read_to_string(&backup).expect("backup");
    assert!(archived.starts_with("unixtime|timestamp|v\n1|"));
    assert!(archived.ends_with("|first\n"));
    assert_eq!(
        fs::read_to_string(dir.path().join("m")).expect("live"),
        "unixtime|timestamp|v\n"
    );
}

#[test]
fn chain_keeps_at_most_rotate_max_backups() {
    let dir = tempdir().expect("tempdir");
    let clock = Arc::new(FixedClock::new(1));
    let store = small_store(dir.path(), clock.clone());

    for value in ["first", "second", "third", "fourth"] {
        store
            .add("m", strings(&["v"]), vec![strings(&[value])])
            .expect("add");
        clock.advance(1);
    }

    let backups = store.backups("m").expect("backups");
    assert_eq!(backups.len(), 2);
    let newest = fs::read_to_string(store.backup_path("m", 1).expect("path")).expect("backup 1");
    let older = fs::read_to_string(store.backup_path("m", 2).expect("path")).expect("backup 2");
    assert!(newest.ends_with("|fourth\n"));
    assert!(older.ends_with("|third\n"));
    assert!(!dir.path().join("m.3").exists());
}

#[test]
fn rotated_live_file_keeps_schema_for_later_rows() {
    let dir = tempdir().expect("tempdir");
    let clock = Arc::new(FixedClock::new(10));
    let store = small_store(dir.path(), clock.clone());

    store
        .add("m", strings(&["a", "b"]), vec![strings(&["1", "2"])])
        .expect("add");
    clock.advance(1);
    assert_eq!(store.schema("m").expect("schema"), strings(&["unixtime", "timestamp", "a", "b"]));

    let config = StoreConfig {
        rotate: false,
        ..store.config().clone()
    };
    let quiet = Store::with_clock(config, clock).expect("store");
    quiet
        .add("m", strings(&["b"]), vec![strings(&["3"])])
        .expect("add");

    let result = quiet.query_for_forward("m", 0, 100).expect("query");
    assert_eq!(result.count, 1);
    assert_eq!(
        result.body,
        r#"{"dataset":"m","keys":["unixtime","a","b"],"values":[["11","","3"]]}"#
    );
}
