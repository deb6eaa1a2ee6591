mod common;

use common::{FakeTransport, Scripted, fast_settings, three_file_fixture, write_file};
use filequeue::broker::ConnectionState;
use filequeue::pipeline::{FailureReason, NoopObserver};
use filequeue::{
    BrokerSettings, ConnectionError, ConnectionManager, MetadataExtractor, PublishError,
    ScanObserver, ScanOrchestrator, ScanStatistics, Traversal,
};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn scan_with(
    fake: &FakeTransport,
    settings: BrokerSettings,
    roots: Vec<PathBuf>,
    extensions: Option<Vec<String>>,
    with_hash: bool,
) -> Result<ScanStatistics, ConnectionError> {
    let manager = ConnectionManager::new(fake.clone(), settings);
    let traversal = Traversal::new(roots, extensions.as_deref());
    ScanOrchestrator::new(traversal, MetadataExtractor::new(with_hash), manager)
        .with_observer(Arc::new(NoopObserver))
        .run()
}

fn scan(fake: &FakeTransport, root: &Path) -> ScanStatistics {
    scan_with(fake, fast_settings(), vec![root.to_path_buf()], None, false).unwrap()
}

fn traversal_names(root: &Path) -> Vec<String> {
    Traversal::new(vec![root.to_path_buf()], None)
        .files()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn numbered_files(dir: &Path, count: usize) {
    for i in 0..count {
        write_file(dir, &format!("file{i:02}.txt"), format!("body {i}").as_bytes());
    }
}

#[derive(Default)]
struct Recorder {
    transitions: Mutex<Vec<(ConnectionState, ConnectionState)>>,
    failures: Mutex<Vec<String>>,
    finished: Mutex<Option<ScanStatistics>>,
}

impl ScanObserver for Recorder {
    fn on_failed(&self, _path: &Path, reason: &FailureReason, _stats: &ScanStatistics) {
        self.failures.lock().unwrap().push(reason.to_string());
    }

    fn on_connection_state(&self, from: ConnectionState, to: ConnectionState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn on_finished(&self, stats: &ScanStatistics) {
        *self.finished.lock().unwrap() = Some(*stats);
    }
}

// --- happy path ---

#[test]
fn test_scan_publishes_every_file() {
    let dir = three_file_fixture();
    let fake = FakeTransport::new();

    let stats = scan(&fake, dir.path());
    assert_eq!(
        stats,
        ScanStatistics {
            processed: 3,
            failed: 0,
            skipped: 0
        }
    );

    let state = fake.state();
    assert_eq!(state.declared_queue.as_deref(), Some("file_scan_queue"));
    assert_eq!(state.opens, 1);
    assert_eq!(state.received.len(), 3);
    for message in &state.received {
        assert!(message.get("sha256_hash").is_none());
        assert!(Path::new(message["file_path"].as_str().unwrap()).is_absolute());
    }
    drop(state);
    let names: BTreeSet<String> = fake.received_names().into_iter().collect();
    assert_eq!(
        names,
        ["test1.txt", "test2.pdf", "test3.jpg"]
            .map(String::from)
            .into_iter()
            .collect()
    );
}

#[test]
fn test_scan_extension_filter_counts_skips() {
    let dir = three_file_fixture();
    let fake = FakeTransport::new();

    let stats = scan_with(
        &fake,
        fast_settings(),
        vec![dir.path().to_path_buf()],
        Some(vec![".PDF".to_string()]),
        false,
    )
    .unwrap();
    assert_eq!(
        stats,
        ScanStatistics {
            processed: 1,
            failed: 0,
            skipped: 2
        }
    );
    assert_eq!(fake.received_names(), vec!["test2.pdf".to_string()]);
}

#[test]
fn test_scan_with_hash_is_deterministic() {
    let dir = three_file_fixture();
    let first = FakeTransport::new();
    let second = FakeTransport::new();

    scan_with(&first, fast_settings(), vec![dir.path().to_path_buf()], None, true).unwrap();
    scan_with(&second, fast_settings(), vec![dir.path().to_path_buf()], None, true).unwrap();

    let digests = |fake: &FakeTransport| -> HashMap<String, String> {
        fake.state()
            .received
            .iter()
            .map(|m| {
                let hash = m["sha256_hash"].as_str().unwrap().to_string();
                assert_eq!(hash.len(), 64);
                (m["file_name"].as_str().unwrap().to_string(), hash)
            })
            .collect()
    };
    let a = digests(&first);
    assert_eq!(a.len(), 3);
    assert_eq!(a, digests(&second));
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeTransport::new();
    assert_eq!(scan(&fake, dir.path()), ScanStatistics::default());
    assert_eq!(fake.state().opens, 1);
    assert_eq!(fake.state().closes, 1);
}

#[test]
fn test_scan_missing_root_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeTransport::new();
    let stats = scan(&fake, &dir.path().join("nope"));
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.total(), 1);
}

#[test]
fn test_scan_observer_sees_final_counters() {
    let dir = three_file_fixture();
    let fake = FakeTransport::new();
    let recorder = Arc::new(Recorder::default());

    let manager = ConnectionManager::new(fake.clone(), fast_settings());
    let stats = ScanOrchestrator::new(
        Traversal::new(vec![dir.path().to_path_buf()], None),
        MetadataExtractor::new(false),
        manager,
    )
    .with_observer(recorder.clone())
    .run()
    .unwrap();

    assert_eq!(*recorder.finished.lock().unwrap(), Some(stats));
    assert_eq!(
        *recorder.transitions.lock().unwrap(),
        vec![
            (ConnectionState::Disconnected, ConnectionState::Connecting),
            (ConnectionState::Connecting, ConnectionState::Connected),
            (ConnectionState::Connected, ConnectionState::Closed),
        ]
    );
}

#[test]
fn test_scan_publishes_in_traversal_order() {
    let dir = tempfile::tempdir().unwrap();
    numbered_files(dir.path(), 4);
    for sub in ["alpha", "omega"] {
        let nested = dir.path().join(sub);
        std::fs::create_dir(&nested).unwrap();
        write_file(&nested, &format!("{sub}-1.txt"), b"1");
        write_file(&nested, &format!("{sub}-2.txt"), b"2");
    }
    let expected = traversal_names(dir.path());
    assert_eq!(expected.len(), 8);

    let fake = FakeTransport::new();
    scan(&fake, dir.path());
    assert_eq!(fake.received_names(), expected);
}

// --- broker failures ---

#[test]
fn test_scan_fatal_when_broker_unreachable() {
    let dir = three_file_fixture();
    let fake = FakeTransport::new();
    fake.state().always_fail_open = true;

    let err = scan_with(&fake, fast_settings(), vec![dir.path().to_path_buf()], None, false)
        .unwrap_err();
    assert!(
        matches!(err, ConnectionError::Exhausted { attempts: 3, .. }),
        "{err:?}"
    );
    let state = fake.state();
    assert_eq!(state.opens, 3);
    assert_eq!(state.publish_calls, 0);
    assert!(state.received.is_empty());
}

#[test]
fn test_scan_initial_connect_succeeds_on_last_attempt() {
    let dir = three_file_fixture();
    let fake = FakeTransport::new();
    fake.state().open_plan.extend([false, false, true]);

    let stats = scan(&fake, dir.path());
    assert_eq!(stats.processed, 3);
    assert_eq!(fake.state().opens, 3);
}

#[test]
fn test_scan_survives_broker_restart() {
    let dir = tempfile::tempdir().unwrap();
    numbered_files(dir.path(), 10);
    let fake = FakeTransport::new();
    fake.state().drop_link_after = Some(4);

    let stats = scan(&fake, dir.path());
    assert_eq!(
        stats,
        ScanStatistics {
            processed: 10,
            failed: 0,
            skipped: 0
        }
    );
    let state = fake.state();
    assert_eq!(state.opens, 2);
    assert_eq!(state.received.len(), 10);
    drop(state);
    let unique: BTreeSet<String> = fake.received_names().into_iter().collect();
    assert_eq!(unique.len(), 10);
}

#[test]
fn test_scan_lost_ack_may_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    numbered_files(dir.path(), 5);
    let fake = FakeTransport::new();
    fake.state()
        .publish_plan
        .extend([Scripted::Ack, Scripted::Ack, Scripted::LostAck]);

    let stats = scan(&fake, dir.path());
    assert_eq!(stats.processed, 5);
    assert_eq!(stats.failed, 0);

    // The re-published copy lands right after the original.
    let mut expected = traversal_names(dir.path());
    expected.insert(3, expected[2].clone());
    assert_eq!(fake.received_names(), expected);
}

#[test]
fn test_scan_nack_is_retried_once() {
    let dir = three_file_fixture();
    let fake = FakeTransport::new();
    fake.state().publish_plan.push_back(Scripted::Nack);

    let stats = scan(&fake, dir.path());
    assert_eq!(stats.processed, 3);
    assert_eq!(fake.state().opens, 2);
    assert_eq!(fake.state().received.len(), 3);
}

#[test]
fn test_scan_record_fails_when_retry_fails_too() {
    let dir = three_file_fixture();
    let fake = FakeTransport::new();
    fake.state()
        .publish_plan
        .extend([Scripted::Returned, Scripted::Timeout]);
    let recorder = Arc::new(Recorder::default());

    let manager = ConnectionManager::new(fake.clone(), fast_settings());
    let stats = ScanOrchestrator::new(
        Traversal::new(vec![dir.path().to_path_buf()], None),
        MetadataExtractor::new(false),
        manager,
    )
    .with_observer(recorder.clone())
    .run()
    .unwrap();

    assert_eq!(
        stats,
        ScanStatistics {
            processed: 2,
            failed: 1,
            skipped: 0
        }
    );
    assert_eq!(fake.state().received.len(), 2);
    let failures = recorder.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("no confirm within"), "{}", failures[0]);
}

#[test]
fn test_scan_reconnect_exhausted_mid_run_then_recovers() {
    let dir = three_file_fixture();
    let fake = FakeTransport::new();
    {
        let mut state = fake.state();
        state.drop_link_after = Some(1);
        // Initial open ok, the whole reconnect budget for record 2 fails, record 3 reconnects.
        state.open_plan.extend([true, false, false, false]);
    }

    let stats = scan(&fake, dir.path());
    assert_eq!(
        stats,
        ScanStatistics {
            processed: 2,
            failed: 1,
            skipped: 0
        }
    );
    assert_eq!(fake.state().opens, 5);
    assert_eq!(fake.state().received.len(), 2);
}

#[test]
fn test_scan_outage_spends_one_attempt_budget_per_file() {
    let by_count = {
        let mut settings = fast_settings();
        settings.health_check.every_messages = 1;
        settings
    };
    let by_time = {
        let mut settings = fast_settings();
        settings.health_check.interval = Duration::ZERO;
        settings
    };
    for settings in [by_count, by_time] {
        let dir = tempfile::tempdir().unwrap();
        numbered_files(dir.path(), 2);
        let fake = FakeTransport::new();
        {
            let mut state = fake.state();
            state.drop_link_after = Some(1);
            state.open_plan.push_back(true);
            state.open_plan.extend([false; 9]);
        }
        let attempts = settings.retry.max_attempts;

        let stats =
            scan_with(&fake, settings, vec![dir.path().to_path_buf()], None, false).unwrap();
        assert_eq!(
            stats,
            ScanStatistics {
                processed: 1,
                failed: 1,
                skipped: 0
            }
        );
        let state = fake.state();
        assert_eq!(state.opens, 1 + attempts);
        assert_eq!(state.publish_calls, 1);
    }
}

#[test]
fn test_scan_health_check_reconnects_before_publishing() {
    let dir = tempfile::tempdir().unwrap();
    numbered_files(dir.path(), 4);
    let fake = FakeTransport::new();
    fake.state().drop_link_after = Some(2);
    let mut settings = fast_settings();
    settings.health_check.every_messages = 1;

    let stats = scan_with(&fake, settings, vec![dir.path().to_path_buf()], None, false).unwrap();
    assert_eq!(stats.processed, 4);
    let state = fake.state();
    assert_eq!(state.opens, 2);
    assert_eq!(state.publish_errors, 0);
    assert!(state.health_checks > 0);
}

// --- per-file isolation ---

#[cfg(unix)]
#[test]
fn test_scan_unreadable_subdirectory_is_isolated() {
    use std::os::unix::fs::PermissionsExt;
    if filequeue::engine::running_as_root() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let locked = dir.path().join("locked");
    let open = dir.path().join("open");
    std::fs::create_dir(&locked).unwrap();
    std::fs::create_dir(&open).unwrap();
    write_file(&locked, "hidden.txt", b"h");
    write_file(&open, "a.txt", b"a");
    write_file(&open, "b.txt", b"b");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

    let fake = FakeTransport::new();
    let stats = scan(&fake, dir.path());
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(
        stats,
        ScanStatistics {
            processed: 2,
            failed: 0,
            skipped: 1
        }
    );
}

#[cfg(unix)]
#[test]
fn test_scan_unreadable_file_counts_as_failed_when_hashing() {
    use std::os::unix::fs::PermissionsExt;
    if filequeue::engine::running_as_root() {
        return;
    }
    let dir = three_file_fixture();
    let locked = dir.path().join("locked.txt");
    write_file(dir.path(), "locked.txt", b"secret");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

    let fake = FakeTransport::new();
    let stats =
        scan_with(&fake, fast_settings(), vec![dir.path().to_path_buf()], None, true).unwrap();
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(
        stats,
        ScanStatistics {
            processed: 3,
            failed: 1,
            skipped: 0
        }
    );
    assert_eq!(fake.state().received.len(), 3);
}

#[test]
fn test_scan_totals_match_candidates() {
    let dir = tempfile::tempdir().unwrap();
    numbered_files(dir.path(), 6);
    write_file(dir.path(), "keep.pdf", b"pdf");
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    write_file(&dir.path().join("nested"), "deep.pdf", b"pdf");
    let fake = FakeTransport::new();
    fake.state()
        .publish_plan
        .extend([Scripted::Nack, Scripted::Nack]);

    let stats = scan_with(
        &fake,
        fast_settings(),
        vec![dir.path().to_path_buf(), dir.path().join("missing")],
        Some(vec!["pdf".to_string()]),
        false,
    )
    .unwrap();
    // 8 files + 1 missing root.
    assert_eq!(stats.total(), 9);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 7);
}

// --- cancellation ---

#[test]
fn test_scan_stop_flag_ends_run_cleanly() {
    let dir = three_file_fixture();
    let fake = FakeTransport::new();
    let manager = ConnectionManager::new(fake.clone(), fast_settings());

    let stats = ScanOrchestrator::new(
        Traversal::new(vec![dir.path().to_path_buf()], None),
        MetadataExtractor::new(false),
        manager,
    )
    .with_observer(Arc::new(NoopObserver))
    .with_stop_flag(Arc::new(AtomicBool::new(true)))
    .run()
    .unwrap();

    assert_eq!(stats, ScanStatistics::default());
    assert_eq!(fake.state().publish_calls, 0);
    assert_eq!(fake.state().closes, 1);
}

// --- connection manager ---

fn record_for(dir: &Path) -> filequeue::FileRecord {
    write_file(dir, "one.txt", b"1");
    MetadataExtractor::new(false)
        .extract(&dir.join("one.txt"))
        .unwrap()
}

#[test]
fn test_manager_connect_publish_close() {
    let dir = tempfile::tempdir().unwrap();
    let record = record_for(dir.path());
    let fake = FakeTransport::new();
    let mut manager = ConnectionManager::new(fake.clone(), fast_settings());

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    manager.connect().unwrap();
    assert!(manager.is_connected());
    manager.connect().unwrap();
    assert_eq!(fake.state().opens, 1);

    manager.publish(&record).unwrap();
    assert!(manager.pending().is_none());

    manager.close();
    manager.close();
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(fake.state().closes, 1);

    let err = manager.publish(&record).unwrap_err();
    assert!(
        matches!(err, PublishError::Reconnect(ConnectionError::Closed)),
        "{err:?}"
    );
    assert!(manager.connect().is_err());
}

#[test]
fn test_manager_publish_connects_lazily() {
    let dir = tempfile::tempdir().unwrap();
    let record = record_for(dir.path());
    let fake = FakeTransport::new();
    let mut manager = ConnectionManager::new(fake.clone(), fast_settings());

    manager.publish(&record).unwrap();
    assert!(manager.is_connected());
    assert_eq!(fake.received_names(), vec!["one.txt".to_string()]);
}

#[test]
fn test_manager_health_check_repairs_dead_link() {
    let fake = FakeTransport::new();
    let mut manager = ConnectionManager::new(fake.clone(), fast_settings());
    manager.connect().unwrap();
    assert!(manager.health_check());

    fake.state().alive = false;
    assert!(manager.health_check());
    assert!(manager.is_connected());
    assert_eq!(fake.state().opens, 2);

    fake.state().alive = false;
    fake.state().always_fail_open = true;
    assert!(!manager.health_check());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[test]
fn test_manager_drop_closes_transport() {
    let fake = FakeTransport::new();
    {
        let mut manager = ConnectionManager::new(fake.clone(), fast_settings());
        manager.connect().unwrap();
    }
    assert_eq!(fake.state().closes, 1);
}
