//! A running instance toggles on SIGUSR1 and cleans up on SIGTERM.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use linvoc_common::instance::{InstanceLock, send_toggle_signal};
use linvoc_daemon::controller::DictationEvent;
use linvoc_daemon::daemon::{DaemonOptions, run_with_context};
use linvoc_daemon::dictation::{DictationContext, EngineSelection};
use linvoc_daemon::engine::DictationState;
use linvoc_daemon::environment::EnvironmentProbe;
use linvoc_daemon::inject::{InjectorSettings, TextInjector};
use linvoc_daemon::process::SystemRunner;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

const SCOPE: &str = "linvoc-signal-test";

async fn wait_for_lock(lock: &InstanceLock) -> u32 {
    for _ in 0..500 {
        if let Some(pid) = lock.get_running_pid(SCOPE) {
            return pid;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("instance never registered its lock");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_toggle_signal_reaches_engine_and_sigterm_cleans_up() {
    let lock_dir = TempDir::new().unwrap();
    let lock = InstanceLock::new(lock_dir.path());
    let options = DaemonOptions {
        selection: EngineSelection::default(),
        injection: InjectorSettings::default(),
        scope: SCOPE.to_string(),
        lock: lock.clone(),
        start_immediately: false,
        preload: false,
    };

    // No tools on the search path: nerd-dictation is missing and no
    // injection backend can be bound.
    let probe = Arc::new(EnvironmentProbe::new(
        HashMap::new(),
        Vec::new(),
        Arc::new(SystemRunner),
    ));
    let injector = Arc::new(TextInjector::new(
        Arc::clone(&probe),
        InjectorSettings::default(),
    ));
    let context = DictationContext::new(probe, injector);
    let (events, mut rx) = broadcast::channel(16);

    let instance = tokio::spawn(run_with_context(options, context, events));

    let pid = wait_for_lock(&lock).await;
    assert_eq!(pid, std::process::id());

    assert!(send_toggle_signal(pid));
    let event = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event after toggle")
        .unwrap();
    assert_eq!(event, DictationEvent::StateChanged(DictationState::Error));

    kill(Pid::this(), Signal::SIGTERM).unwrap();
    timeout(Duration::from_secs(10), instance)
        .await
        .expect("instance did not stop")
        .unwrap()
        .unwrap();

    assert!(!lock.lock_path(SCOPE).exists());
}

#[tokio::test]
async fn test_unusable_forced_backend_is_fatal() {
    let lock_dir = TempDir::new().unwrap();
    let lock = InstanceLock::new(lock_dir.path());
    let injection = InjectorSettings {
        forced_backend: Some("ydotool".to_string()),
        ..InjectorSettings::default()
    };
    let options = DaemonOptions {
        selection: EngineSelection::default(),
        injection: injection.clone(),
        scope: SCOPE.to_string(),
        lock: lock.clone(),
        start_immediately: false,
        preload: false,
    };

    let probe = Arc::new(EnvironmentProbe::new(
        HashMap::new(),
        Vec::new(),
        Arc::new(SystemRunner),
    ));
    let injector = Arc::new(TextInjector::new(Arc::clone(&probe), injection));
    let (events, _) = broadcast::channel(16);

    let result = run_with_context(options, DictationContext::new(probe, injector), events).await;

    assert!(result.is_err());
    assert!(!lock.lock_path(SCOPE).exists());
}
