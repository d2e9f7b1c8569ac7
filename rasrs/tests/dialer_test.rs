//! Dialer behavior against the fake native layer.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use common::{FakeRas, FakeStore};
use rasrs::native::NativeError;
use rasrs::{
    AutoUpdateCredentials, DialError, DialOptions, DialState, Dialer, DialerConfig,
    NetworkCredential, RasClient, RasError,
};

fn entry_config() -> DialerConfig {
    DialerConfig::new().with_entry("Office VPN", "/etc/ras/rasphone.pbk")
}

fn completion_counter(dialer: &Dialer) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    dialer.on_dial_completed(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[tokio::test(flavor = "multi_thread")]
async fn test_async_dial_completes_once_when_connected() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config());
    let completions = completion_counter(&dialer);

    let pending = dialer.dial_async().unwrap();
    let handle = pending.handle();
    assert!(dialer.is_busy());
    assert_eq!(dialer.handle(), Some(handle));

    assert_eq!(api.fire(DialState::OpenPort, 0), Some(true));
    assert_eq!(api.fire(DialState::Connected, 0), Some(true));

    let event = pending.completed().await;
    assert!(event.connected);
    assert!(!event.cancelled);
    assert!(!event.timed_out);
    assert_eq!(event.handle, Some(handle));
    assert!(!dialer.is_busy());

    // A stray notification after completion is ignored.
    assert_eq!(api.fire(DialState::Connected, 0), Some(false));
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(api.hang_up_count(), 0);
}

#[test]
fn test_second_dial_while_busy_is_rejected() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config());

    let pending = dialer.dial_async().unwrap();

    let err = dialer.dial_async().unwrap_err();
    assert!(matches!(err, RasError::DialInProgress(Some(h)) if h == pending.handle()));
    assert!(matches!(dialer.dial(), Err(RasError::DialInProgress(_))));
    assert_eq!(api.begin_connect_count(), 1);
}

#[test]
fn test_concurrent_dial_during_blocking_dial_is_rejected() {
    let api = FakeRas::new();
    *api.blocking_delay.lock().unwrap() = Duration::from_millis(300);
    let dialer = Arc::new(Dialer::new(api.clone(), entry_config()));

    let d = Arc::clone(&dialer);
    let blocking = thread::spawn(move || d.dial());

    thread::sleep(Duration::from_millis(50));
    assert!(dialer.is_busy());
    assert!(matches!(
        dialer.dial_async(),
        Err(RasError::DialInProgress(None))
    ));

    let handle = blocking.join().unwrap().unwrap();
    assert!(handle.is_valid());
    assert!(!dialer.is_busy());
    assert_eq!(api.begin_connect_count(), 1);
}

#[test]
fn test_racing_async_dials_reach_native_layer_once() {
    let api = FakeRas::new();
    let dialer = Arc::new(Dialer::new(api.clone(), entry_config()));
    let barrier = Arc::new(Barrier::new(2));

    let racers: Vec<_> = (0..2)
        .map(|_| {
            let dialer = Arc::clone(&dialer);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                dialer.dial_async().map(|pending| pending.handle())
            })
        })
        .collect();
    let results: Vec<_> = racers.into_iter().map(|t| t.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(RasError::DialInProgress(Some(_)))))
    );
    assert_eq!(api.begin_connect_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_late_notification_from_cancelled_attempt_is_ignored() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config());

    let first = dialer.dial_async().unwrap();
    let stale = first.handle();
    dialer.cancel();
    assert!(first.completed().await.cancelled);

    let second = dialer.dial_async().unwrap();
    let current = second.handle();
    assert_ne!(stale, current);

    // The first attempt's connection reports its teardown late.
    assert_eq!(
        api.notify(stale.value(), DialState::Disconnected, 631, 1),
        Some(false)
    );
    assert!(dialer.is_busy());
    assert_eq!(dialer.handle(), Some(current));
    assert_eq!(api.hang_ups.lock().unwrap().as_slice(), &[(stale, false)]);

    assert_eq!(api.fire(DialState::Connected, 0), Some(true));
    let event = second.completed().await;
    assert!(event.connected);
    assert!(event.error.is_none());
    assert_eq!(event.handle, Some(current));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failure_aborts_current_attempt_handle() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config());

    let pending = dialer.dial_async().unwrap();
    let handle = pending.handle();
    // A multilink sub-entry reports under the bundle's handle value.
    assert_eq!(
        api.notify(handle.value(), DialState::Authenticate, 691, 2),
        Some(false)
    );

    let event = pending.completed().await;
    assert_eq!(event.error.and_then(|e| e.code()), Some(691));
    assert_eq!(api.hang_ups.lock().unwrap().as_slice(), &[(handle, false)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_hangs_up_and_completes_cancelled() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config().with_eap_user_data(vec![1, 2, 3]));
    let completions = completion_counter(&dialer);

    let pending = dialer.dial_async().unwrap();
    let handle = pending.handle();
    dialer.cancel();

    let event = pending.completed().await;
    assert!(event.cancelled);
    assert!(!event.connected);
    assert!(event.error.is_none());
    assert_eq!(api.hang_ups.lock().unwrap().as_slice(), &[(handle, false)]);
    assert!(api.buffers_balanced());

    // Cancel again and a late notification are both no-ops.
    dialer.cancel();
    assert_eq!(api.fire(DialState::Connected, 0), Some(false));
    assert_eq!(api.hang_up_count(), 1);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cancel_without_dial_is_noop() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config());
    dialer.cancel();
    assert_eq!(api.hang_up_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout_aborts_and_reports_timed_out() {
    let api = FakeRas::new();
    let dialer = Dialer::new(
        api.clone(),
        entry_config()
            .with_timeout(Duration::from_millis(50))
            .with_eap_user_data(vec![7]),
    );

    let started = Instant::now();
    let pending = dialer.dial_async().unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), pending.completed())
        .await
        .expect("timeout should complete the dial");

    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(event.timed_out);
    assert!(!event.connected);
    assert!(matches!(event.error, Some(DialError::TimedOut(d)) if d == Duration::from_millis(50)));
    assert_eq!(api.hang_up_count(), 1);
    assert!(api.buffers_balanced());
    assert!(!dialer.is_busy());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timer_of_finished_attempt_never_fires() {
    let api = FakeRas::new();
    let dialer = Dialer::new(
        api.clone(),
        entry_config().with_timeout(Duration::from_millis(100)),
    );
    let completions = completion_counter(&dialer);

    let pending = dialer.dial_async().unwrap();
    api.fire(DialState::Connected, 0);
    assert!(pending.completed().await.connected);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(api.hang_up_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_notification_fails_the_attempt() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config().with_eap_user_data(vec![1]));

    let messages = Arc::new(Mutex::new(Vec::new()));
    let m = Arc::clone(&messages);
    dialer.on_state_changed(move |e| {
        m.lock().unwrap().push((e.state, e.error_code, e.error_message.clone()));
    });

    let pending = dialer.dial_async().unwrap();
    assert_eq!(api.fire(DialState::Authenticate, 691), Some(false));

    let event = pending.completed().await;
    assert!(!event.connected);
    let err = event.error.expect("error");
    assert_eq!(err.code(), Some(691));
    assert!(err.to_string().contains("remote connection was denied"));
    assert_eq!(api.hang_up_count(), 1);
    assert!(api.buffers_balanced());

    let seen = messages.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0],
        (
            DialState::Authenticate,
            691,
            Some("The remote connection was denied".to_string())
        )
    );
}

#[test]
fn test_begin_connect_failure_leaves_dialer_idle() {
    let api = FakeRas::new();
    api.fail_connect_with(NativeError::code(623));
    let dialer = Dialer::new(api.clone(), entry_config().with_eap_user_data(vec![1, 2]));

    let err = dialer.dial_async().unwrap_err();
    match err {
        RasError::Dial(DialError::Failed { code, message, .. }) => {
            assert_eq!(code, 623);
            assert_eq!(message, "unknown error 623");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!dialer.is_busy());
    assert!(api.buffers_balanced());
    assert_eq!(api.allocs.load(Ordering::SeqCst), 1);

    assert!(dialer.dial().is_err());
    assert!(!dialer.is_busy());
    assert!(api.buffers_balanced());
}

#[test]
fn test_missing_target_never_reaches_native_layer() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), DialerConfig::new());

    assert!(matches!(dialer.dial(), Err(RasError::NoDialTarget)));
    assert!(matches!(dialer.dial_async(), Err(RasError::NoDialTarget)));
    assert_eq!(api.begin_connect_count(), 0);
    assert!(!dialer.is_busy());
}

#[test]
fn test_blocking_dial_passes_params() {
    let api = FakeRas::new();
    let dialer = Dialer::new(
        api.clone(),
        DialerConfig::new()
            .with_phone_number("5551234")
            .with_credentials(NetworkCredential::new("alice", "s3cret").with_domain("CORP"))
            .with_options(DialOptions {
                use_prefix_suffix: true,
                ..Default::default()
            }),
    );

    let handle = dialer.dial().unwrap();
    assert!(handle.is_valid());
    assert!(!dialer.is_busy());

    let params = api.last_params.lock().unwrap().clone().unwrap();
    assert_eq!(params.phone_number.as_deref(), Some("5551234"));
    assert!(params.entry_name.is_none());
    assert_eq!(params.username, "alice");
    assert_eq!(params.password, "s3cret");
    assert_eq!(params.domain, "CORP");

    let extensions = api.last_extensions.lock().unwrap().unwrap();
    assert!(!extensions.options.is_empty());
    assert!(extensions.eap_user_data.is_none());
}

#[test]
fn test_stored_credentials_and_eap_blob_are_used() {
    let api = FakeRas::new();
    let store = Arc::new(FakeStore::default());
    *store.stored.lock().unwrap() = Some(NetworkCredential::new("stored", "pw"));
    *store.eap.lock().unwrap() = Some(vec![0xAA; 16]);

    let client = RasClient::new(api.clone()).with_credential_store(store.clone());
    let dialer = client.dialer(entry_config());
    dialer.dial().unwrap();

    let params = api.last_params.lock().unwrap().clone().unwrap();
    assert_eq!(params.username, "stored");
    let extensions = api.last_extensions.lock().unwrap().unwrap();
    assert_eq!(extensions.eap_user_data.map(|b| b.len), Some(16));
    assert_eq!(api.allocs.load(Ordering::SeqCst), 1);
    assert!(api.buffers_balanced());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_credentials_saved_after_successful_async_dial() {
    let api = FakeRas::new();
    let store = Arc::new(FakeStore::default());
    let creds = NetworkCredential::new("alice", "pw");
    let dialer = Dialer::with_credential_store(
        api.clone(),
        store.clone(),
        entry_config()
            .with_credentials(creds.clone())
            .with_auto_update_credentials(AutoUpdateCredentials::User),
    );

    let pending = dialer.dial_async().unwrap();
    assert!(store.saved.lock().unwrap().is_empty());
    api.fire(DialState::Connected, 0);
    assert!(pending.connected().await.is_ok());

    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.as_slice(), &[("Office VPN".to_string(), creds, false)]);
}

#[test]
fn test_credential_save_failure_is_reported_but_dial_succeeds() {
    let api = FakeRas::new();
    let store = Arc::new(FakeStore {
        fail_saves: true,
        ..Default::default()
    });
    let dialer = Dialer::with_credential_store(
        api.clone(),
        store,
        entry_config()
            .with_credentials(NetworkCredential::new("alice", "pw"))
            .with_auto_update_credentials(AutoUpdateCredentials::AllUsers),
    );

    let errors = Arc::new(Mutex::new(Vec::new()));
    let e = Arc::clone(&errors);
    dialer.on_error(move |err| e.lock().unwrap().push(err.to_string()));

    assert!(dialer.dial().is_ok());
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("access denied"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_panicking_handler_is_contained() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config());
    dialer.on_state_changed(|_| panic!("handler blew up"));

    let errors = Arc::new(Mutex::new(Vec::new()));
    let e = Arc::clone(&errors);
    dialer.on_error(move |err| e.lock().unwrap().push(err.to_string()));

    let pending = dialer.dial_async().unwrap();
    assert_eq!(api.fire(DialState::OpenPort, 0), Some(true));
    assert_eq!(api.fire(DialState::Connected, 0), Some(true));
    assert!(pending.completed().await.connected);

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|m| m.contains("handler blew up")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_from_state_handler() {
    let api = FakeRas::new();
    let dialer = Arc::new(Dialer::new(api.clone(), entry_config()));

    let weak: Weak<Dialer> = Arc::downgrade(&dialer);
    dialer.on_state_changed(move |e| {
        if e.state == DialState::Authenticate {
            if let Some(d) = weak.upgrade() {
                d.cancel();
            }
        }
    });

    let pending = dialer.dial_async().unwrap();
    api.fire(DialState::Authenticate, 0);

    let event = pending.completed().await;
    assert!(event.cancelled);
    assert_eq!(api.hang_up_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropping_dialer_cancels_inflight_dial() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config().with_eap_user_data(vec![5]));

    let pending = dialer.dial_async().unwrap();
    drop(dialer);

    assert!(matches!(pending.connected().await, Err(RasError::Cancelled)));
    assert_eq!(api.hang_up_count(), 1);
    assert!(api.buffers_balanced());
}

#[test]
fn test_state_changes_are_observable() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config());
    let rx = dialer.state_changes();

    let _pending = dialer.dial_async().unwrap();
    assert_eq!(*rx.borrow(), None);

    api.fire(DialState::Authenticate, 0);
    assert_eq!(*rx.borrow(), Some(DialState::Authenticate));
}

#[test]
fn test_multilink_notifications_carry_multilink_handle() {
    let api = FakeRas::new();
    let dialer = Dialer::new(api.clone(), entry_config());

    let handles = Arc::new(Mutex::new(Vec::new()));
    let h = Arc::clone(&handles);
    dialer.on_state_changed(move |e| h.lock().unwrap().push(e.handle));

    let _pending = dialer.dial_async().unwrap();
    api.fire_on(DialState::SubEntryConnected, 0, 2);

    let handles = handles.lock().unwrap();
    assert!(handles[0].is_multilink());
}
