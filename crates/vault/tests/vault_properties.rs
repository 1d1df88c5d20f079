use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use opsdeck_vault::{
    SecretEntry, SecretResolver, ServiceSchema, Vault, VaultError, VaultEvent, VaultLocation, backfill, discover, ensure_example,
};

fn open_in(dir: &Path) -> Vault {
    Vault::open(VaultLocation::files(dir.join("vault.db"), dir.join("vault.key"))).expect("open vault")
}

fn redis_schema() -> ServiceSchema {
    ServiceSchema::new("redis")
        .title("Redis")
        .url("localhost:6379")
        .attribute("port", "6379")
        .attribute("db", "0")
        .attribute("tls", "false")
}

#[test]
fn get_after_put_and_not_found_after_delete() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = open_in(dir.path());
    let operations = [
        ("redis/production/cache", "Cache"),
        ("redis/production/sessions", "Sessions"),
        ("kafka/staging/broker", "Broker"),
        ("redis/production/cache", "Cache v2"),
    ];
    for (path, title) in operations {
        let entry = SecretEntry::new(path).with_title(title).with_credentials("ops", "pw");
        vault.put(path, entry.clone()).expect("put");
        assert_eq!(vault.get(path).expect("get after put"), entry);
    }

    vault.delete("redis/production/cache").expect("delete");
    assert!(matches!(vault.get("redis/production/cache"), Err(VaultError::NotFound { .. })));
    assert!(matches!(vault.delete("redis/production/cache"), Err(VaultError::NotFound { .. })));
    assert_eq!(vault.get("redis/production/sessions").expect("untouched").title, "Sessions");
}

#[test]
fn list_returns_exactly_live_paths_and_is_stable_under_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = open_in(dir.path());
    for path in ["redis/prod/a", "redis/prod/b", "redis/production/c", "kafka/prod/d"] {
        vault.put(path, SecretEntry::default()).expect("put");
    }
    vault.delete("redis/prod/b").expect("delete");

    let listed = vault.list("redis/prod").expect("list");
    assert_eq!(listed, vec!["redis/prod/a".to_string()]);
    assert_eq!(vault.list("redis").expect("list service").len(), 2);
    assert!(vault.list("argocd").expect("empty list").is_empty());

    vault.reload().expect("reload");
    assert_eq!(vault.list("redis/prod").expect("list after reload"), listed);
    assert_eq!(vault.list("").expect("list all").len(), 3);
}

#[test]
fn discovery_creates_one_example_and_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = open_in(dir.path());
    let schema = redis_schema();

    let first = discover(&vault, &schema, &["production"]).expect("first discovery");
    assert_eq!(first.created, vec!["redis/production/example".to_string()]);
    let example = vault.get("redis/production/example").expect("example entry");
    assert_eq!(example.attribute("port"), Some("6379"));
    assert_eq!(example.attribute("db"), Some("0"));

    let second = discover(&vault, &schema, &["production"]).expect("second discovery");
    assert!(second.is_empty());
    assert_eq!(vault.list("redis/production").expect("list"), vec!["redis/production/example".to_string()]);
    assert_eq!(vault.get("redis/production/example").expect("example entry"), example);
}

#[test]
fn ensure_example_leaves_populated_groups_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = open_in(dir.path());
    vault
        .put("redis/staging/cache", SecretEntry::default().with_title("Real"))
        .expect("put");
    assert_eq!(ensure_example(&vault, &redis_schema(), "staging").expect("ensure"), None);
    assert_eq!(vault.len(), 1);
}

#[test]
fn backfill_adds_missing_attributes_without_touching_existing_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = open_in(dir.path());
    vault
        .put(
            "redis/production/cache",
            SecretEntry::default().with_attribute("port", "6380").with_attribute("owner", "platform"),
        )
        .expect("put");

    let updated = backfill(&vault, &redis_schema(), "redis/production").expect("backfill");
    assert_eq!(updated, vec!["redis/production/cache".to_string()]);

    let entry = vault.get("redis/production/cache").expect("get");
    assert_eq!(entry.attribute("port"), Some("6380"));
    assert_eq!(entry.attribute("owner"), Some("platform"));
    assert_eq!(entry.attribute("db"), Some("0"));
    assert_eq!(entry.attribute("tls"), Some("false"));

    assert!(backfill(&vault, &redis_schema(), "redis/production").expect("second backfill").is_empty());
}

#[test]
fn resolve_group_skips_disabled_entries_and_explains_empty_groups() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = open_in(dir.path());
    vault
        .put("redis/production/a", SecretEntry::default().with_url("10.0.0.1:6379"))
        .expect("put");
    vault
        .put("redis/production/b", SecretEntry::default().with_attribute("enabled", "false"))
        .expect("put");

    let resolver = SecretResolver::new(&vault);
    let resolved = resolver.resolve_group("redis", "production").expect("resolve group");
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].host.as_deref(), Some("10.0.0.1"));

    let error = resolver.resolve_group("redis", "staging").expect_err("empty group");
    assert!(error.is_not_found());
    assert_eq!(error.to_string(), "no entries under `redis/staging`; create one");

    assert!(resolver.resolve("redis/production/missing").expect_err("missing").is_not_found());
}

#[test]
fn database_on_disk_is_encrypted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = open_in(dir.path());
    vault
        .put("redis/production/cache", SecretEntry::default().with_credentials("admin", "plaintext-password"))
        .expect("put");
    let raw = fs::read_to_string(dir.path().join("vault.db")).expect("read database");
    assert!(raw.contains("\"opsdeck-vault\""));
    assert!(!raw.contains("plaintext-password"));
    assert!(!raw.contains("redis/production"));
}

#[test]
fn watcher_reloads_after_external_edit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = Arc::new(open_in(dir.path()));
    let (tx, rx) = mpsc::channel();
    let _watcher = vault
        .watch(move |event| {
            let _ = tx.send(event);
        })
        .expect("watch");

    let editor = open_in(dir.path());
    editor.put("kafka/dev/broker", SecretEntry::default()).expect("external put");

    let deadline = Duration::from_secs(10);
    loop {
        match rx.recv_timeout(deadline).expect("watcher event") {
            VaultEvent::Reloaded { .. } if vault.contains("kafka/dev/broker") => break,
            _ => continue,
        }
    }
}

fn assert_all_present(vault: &Vault, dir: &Path, count: usize) {
    let expected: Vec<String> = (0..count).map(|i| format!("redis/dev/entry-{i:03}")).collect();
    assert_eq!(vault.list("redis/dev").expect("list"), expected);
    let reopened = open_in(dir);
    assert_eq!(reopened.list("redis/dev").expect("list after reopen"), expected);
}

#[test]
fn concurrent_reloads_never_drop_committed_puts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = Arc::new(open_in(dir.path()));
    let stop = Arc::new(AtomicBool::new(false));

    let reloader = {
        let vault = Arc::clone(&vault);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                vault.reload().expect("reload");
                let _ = vault.reload_if_changed().expect("reload if changed");
            }
        })
    };

    for i in 0..150 {
        vault.put(&format!("redis/dev/entry-{i:03}"), SecretEntry::default()).expect("put");
    }
    stop.store(true, Ordering::Relaxed);
    reloader.join().expect("reloader thread");

    assert_all_present(&vault, dir.path(), 150);
}

#[test]
fn own_writes_under_watch_are_all_kept() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = Arc::new(open_in(dir.path()));
    let _watcher = vault.watch(|_| {}).expect("watch");

    for i in 0..150 {
        vault.put(&format!("redis/dev/entry-{i:03}"), SecretEntry::default()).expect("put");
    }
    thread::sleep(Duration::from_millis(200));

    assert_all_present(&vault, dir.path(), 150);
}
