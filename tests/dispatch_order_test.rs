//! Ordering, concurrency, lifecycle, and timeout behavior of the
//! per-session execution contexts.

use camkit::{
    Camera, CamError, CameraControl, CommandDispatcher, MockSdk, StatusInquiry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn rig() -> (Arc<MockSdk>, Arc<CommandDispatcher>, Camera) {
    let sdk = Arc::new(MockSdk::new());
    let dispatcher = Arc::new(CommandDispatcher::new(sdk.clone()).expect("dispatcher"));
    let camera = Camera::open(&dispatcher).expect("open session");
    (sdk, dispatcher, camera)
}

#[test]
fn commands_complete_in_submission_order_not_duration_order() {
    let (sdk, _dispatcher, camera) = rig();

    // Three commands with uneven artificial work durations; completion must
    // follow submission order, not duration order.
    sdk.set_latency("status:ui-lock", Duration::from_millis(50));
    sdk.set_latency("status:ui-unlock", Duration::from_millis(10));
    sdk.set_latency("control:extend-shutdown-timer", Duration::from_millis(30));

    let first = camera.send_status(StatusInquiry::UiLock);
    let second = camera.send_status(StatusInquiry::UiUnlock);
    let third = camera.send_control(CameraControl::ExtendShutdownTimer);

    third.wait().expect("third command");
    // By the time the last-submitted command resolved, the earlier ones
    // must have resolved too.
    assert!(first.is_resolved());
    assert!(second.is_resolved());
    first.wait().expect("first command");
    second.wait().expect("second command");

    assert_eq!(
        sdk.started_labels(camera.session()),
        vec![
            "status:ui-lock",
            "status:ui-unlock",
            "control:extend-shutdown-timer"
        ]
    );

    // The journal alternates started/finished per command: strict
    // serialization means no invocation starts before the previous one
    // finished.
    let events = sdk.journal();
    let labels: Vec<_> = events.iter().map(|e| (e.is_started(), e.label().to_string())).collect();
    assert_eq!(
        labels,
        vec![
            (true, "status:ui-lock".to_string()),
            (false, "status:ui-lock".to_string()),
            (true, "status:ui-unlock".to_string()),
            (false, "status:ui-unlock".to_string()),
            (true, "control:extend-shutdown-timer".to_string()),
            (false, "control:extend-shutdown-timer".to_string()),
        ]
    );

    camera.close().expect("close");
}

#[test]
fn sessions_execute_independently() {
    let sdk = Arc::new(MockSdk::new());
    let dispatcher = Arc::new(CommandDispatcher::new(sdk.clone()).expect("dispatcher"));
    let first = Camera::open(&dispatcher).expect("first session");
    let second = Camera::open(&dispatcher).expect("second session");

    sdk.set_latency("status:ui-lock", Duration::from_millis(150));

    let started = Instant::now();
    let a = first.send_status(StatusInquiry::UiLock);
    let b = second.send_status(StatusInquiry::UiLock);
    a.wait().expect("first session command");
    b.wait().expect("second session command");
    let elapsed = started.elapsed();

    // Serialized execution would need ~300ms; parallel sessions finish in
    // roughly one latency.
    assert!(
        elapsed < Duration::from_millis(280),
        "sessions did not run concurrently: {elapsed:?}"
    );

    // Both invocations entered the device before either left it.
    let events = sdk.journal();
    let first_finish = events
        .iter()
        .position(|e| !e.is_started())
        .expect("a finished event");
    let starts_before_any_finish = events[..first_finish]
        .iter()
        .filter(|e| e.is_started())
        .count();
    assert_eq!(starts_before_any_finish, 2, "invocations did not overlap");

    first.close().expect("close first");
    second.close().expect("close second");
}

#[test]
fn closing_a_session_fails_queued_commands_without_device_calls() {
    let (sdk, _dispatcher, camera) = rig();

    sdk.set_latency("status:ui-lock", Duration::from_millis(200));

    let executing = camera.send_status(StatusInquiry::UiLock);
    let queued_one = camera.send_control(CameraControl::ExtendShutdownTimer);
    let queued_two = camera.send_status(StatusInquiry::UiUnlock);

    // Let the first command reach the device before closing.
    std::thread::sleep(Duration::from_millis(50));
    camera.close().expect("close");

    // The in-flight command runs to completion; the queued ones fail fast.
    executing.wait().expect("in-flight command");
    assert!(matches!(queued_one.wait(), Err(CamError::SessionClosed)));
    assert!(matches!(queued_two.wait(), Err(CamError::SessionClosed)));

    assert_eq!(sdk.invocation_count("control:extend-shutdown-timer"), 0);
    assert_eq!(sdk.invocation_count("status:ui-unlock"), 0);

    // Dispatching after close fails fast as well.
    let late = camera.send_status(StatusInquiry::UiLock);
    assert!(matches!(late.wait(), Err(CamError::SessionClosed)));
    assert!(!camera.is_open());
}

#[test]
fn timeout_resolves_at_the_deadline_and_sticks() {
    let (sdk, _dispatcher, camera) = rig();

    sdk.set_latency("shoot", Duration::from_millis(500));
    camera.set_default_timeout(Some(Duration::from_millis(100)));

    let started = Instant::now();
    let handle = camera.shoot().shoot_async();
    let err = handle.wait().expect_err("must time out");
    let elapsed = started.elapsed();

    assert!(matches!(err, CamError::Timeout { .. }), "got {err:?}");
    assert!(
        elapsed >= Duration::from_millis(80) && elapsed < Duration::from_millis(350),
        "timeout did not fire near the 100ms deadline: {elapsed:?}"
    );

    // The device call eventually finishes; its late result must not
    // overwrite the resolved slot.
    std::thread::sleep(Duration::from_millis(500));
    match handle.try_result() {
        Some(Err(CamError::Timeout { .. })) => {}
        other => panic!("slot was overwritten: {other:?}"),
    }

    // The execution context keeps serving the session afterwards.
    camera.set_default_timeout(None);
    camera
        .send_status(StatusInquiry::UiUnlock)
        .wait()
        .expect("command after timeout");

    camera.close().expect("close");
}

#[test]
fn waiters_on_one_command_all_observe_the_same_outcome() {
    let (_sdk, _dispatcher, camera) = rig();

    let handle = camera.property().product_name_async();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let handle = handle.clone();
            std::thread::spawn(move || handle.wait())
        })
        .collect();

    for waiter in waiters {
        let name = waiter.join().expect("waiter thread").expect("product name");
        assert_eq!(name, "MockCam Mark II");
    }
    // Waiting again on the resolved handle is an idempotent read.
    assert_eq!(handle.wait().expect("re-read"), "MockCam Mark II");

    camera.close().expect("close");
}

#[tokio::test]
async fn handles_support_async_observation() {
    let (sdk, _dispatcher, camera) = rig();
    sdk.set_latency("status:ui-lock", Duration::from_millis(30));

    let handle = camera.send_status(StatusInquiry::UiLock);
    handle.join().await.expect("async join");

    camera.close().expect("close");
}
