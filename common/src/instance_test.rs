use super::*;
use tempfile::TempDir;

/// Larger than any `pid_max` the kernel accepts, so never a live process.
const DEAD_PID: u32 = i32::MAX as u32;

#[test]
fn test_lock_path_uses_scope_name() {
    let lock = InstanceLock::new("/tmp");
    assert_eq!(lock.lock_path("linvoc"), PathBuf::from("/tmp/linvoc.lock"));
}

#[test]
fn test_lock_path_sanitizes_separators() {
    let lock = InstanceLock::new("/tmp");
    assert_eq!(lock.lock_path("a/b"), PathBuf::from("/tmp/a_b.lock"));
}

#[test]
fn test_create_then_get_returns_own_pid() {
    let temp = TempDir::new().unwrap();
    let lock = InstanceLock::new(temp.path());

    lock.create_lock(DEFAULT_SCOPE).unwrap();

    assert_eq!(
        lock.get_running_pid(DEFAULT_SCOPE),
        Some(std::process::id())
    );
}

#[test]
fn test_missing_record_is_absent() {
    let temp = TempDir::new().unwrap();
    let lock = InstanceLock::new(temp.path());

    assert_eq!(lock.get_running_pid(DAEMON_SCOPE), None);
}

#[test]
fn test_stale_record_is_pruned() {
    let temp = TempDir::new().unwrap();
    let lock = InstanceLock::new(temp.path());
    let path = lock.lock_path(DEFAULT_SCOPE);
    std::fs::write(&path, DEAD_PID.to_string()).unwrap();

    assert_eq!(lock.get_running_pid(DEFAULT_SCOPE), None);
    assert!(!path.exists());
}

#[test]
fn test_garbage_record_is_pruned() {
    let temp = TempDir::new().unwrap();
    let lock = InstanceLock::new(temp.path());
    let path = lock.lock_path(DEFAULT_SCOPE);
    std::fs::write(&path, "not-a-pid").unwrap();

    assert_eq!(lock.get_running_pid(DEFAULT_SCOPE), None);
    assert!(!path.exists());
}

#[test]
fn test_scopes_are_independent() {
    let temp = TempDir::new().unwrap();
    let lock = InstanceLock::new(temp.path());

    lock.create_lock(DAEMON_SCOPE).unwrap();

    assert_eq!(lock.get_running_pid(DEFAULT_SCOPE), None);
    assert!(lock.get_running_pid(DAEMON_SCOPE).is_some());
}

#[test]
fn test_remove_lock() {
    let temp = TempDir::new().unwrap();
    let lock = InstanceLock::new(temp.path());

    lock.create_lock(DEFAULT_SCOPE).unwrap();
    lock.remove_lock(DEFAULT_SCOPE).unwrap();

    assert!(!lock.lock_path(DEFAULT_SCOPE).exists());
    // Removing twice is fine
    lock.remove_lock(DEFAULT_SCOPE).unwrap();
}

#[test]
fn test_parse_pid_rejects_group_addresses() {
    assert_eq!(parse_pid("0"), None);
    assert_eq!(parse_pid("-1"), None);
    assert_eq!(parse_pid(" 42\n"), Some(42));
}

#[test]
fn test_own_process_is_alive() {
    assert!(is_process_alive(std::process::id()));
    assert!(!is_process_alive(DEAD_PID));
}

#[test]
fn test_signal_to_dead_process_fails() {
    assert!(!send_toggle_signal(DEAD_PID));
}
