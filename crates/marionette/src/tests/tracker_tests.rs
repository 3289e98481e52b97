use super::{drain, rig, rig_with};
use crate::errors::AutomationError;
use crate::registry::{Registry, WindowState};
use crate::settings::{Settings, SharedSettings};
use crate::toolkit::ToolkitBackend;
use crate::tracker::WindowTracker;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn window_lifecycle_runs_pending_open_hidden() {
    let rig = rig();
    let window = rig.toolkit.create_window("main");
    rig.tracker.observe(&window).expect("observe");
    assert_eq!(rig.tracker.state_of(&window), Some(WindowState::Pending));

    rig.toolkit.show(&window).expect("show");
    drain(&rig.toolkit.default_queue());
    assert_eq!(rig.tracker.state_of(&window), Some(WindowState::Open));
    // Open alone is not ready; the probe has not confirmed input routing.
    assert!(!rig.tracker.is_ready_for_input(&window).expect("ready query"));

    rig.tracker
        .wait_until_ready(&window, Duration::from_secs(5))
        .expect("readiness probe");
    assert!(rig.tracker.is_ready_for_input(&window).expect("ready query"));

    rig.toolkit.hide(&window).expect("hide");
    drain(&rig.toolkit.default_queue());
    assert_eq!(rig.tracker.state_of(&window), Some(WindowState::Hidden));
    assert!(!rig.tracker.is_ready_for_input(&window).expect("ready query"));
}

#[test]
fn closed_is_terminal() {
    let rig = rig();
    let window = rig.toolkit.create_window("main");
    rig.toolkit.show(&window).expect("show");
    drain(&rig.toolkit.default_queue());
    rig.tracker
        .wait_until_ready(&window, Duration::from_secs(5))
        .expect("readiness probe");

    rig.toolkit.close(&window).expect("close");
    drain(&rig.toolkit.default_queue());
    assert_eq!(rig.tracker.state_of(&window), Some(WindowState::Closed));
    assert!(!rig.tracker.is_ready_for_input(&window).expect("ready query"));

    match rig.tracker.wait_until_ready(&window, Duration::from_millis(100)) {
        Err(AutomationError::ActionFailed(_)) => {}
        other => panic!("expected ActionFailed for a closed window, got {other:?}"),
    }

    // Once the window object itself is garbage, its record goes too.
    rig.registry.forget_window(window.object_id());
    assert_eq!(rig.tracker.state_of(&window), None);
}

#[test]
fn reopened_window_needs_a_new_readiness_cycle() {
    let rig = rig();
    let window = rig.toolkit.create_window("main");
    rig.toolkit.show(&window).expect("show");
    drain(&rig.toolkit.default_queue());
    rig.tracker
        .wait_until_ready(&window, Duration::from_secs(5))
        .expect("readiness probe");

    rig.toolkit.hide(&window).expect("hide");
    rig.toolkit.show(&window).expect("show again");
    drain(&rig.toolkit.default_queue());
    assert_eq!(rig.tracker.state_of(&window), Some(WindowState::Open));
    assert!(
        !rig.tracker.is_ready_for_input(&window).expect("ready query"),
        "hidden reset readiness; reopening must probe again"
    );
}

#[test]
fn ready_query_is_stable_without_state_changes() {
    let rig = rig();
    let window = rig.toolkit.create_window("main");
    let button = rig.toolkit.create_child(&window, "Button", "ok");
    rig.toolkit.show(&window).expect("show");
    drain(&rig.toolkit.default_queue());
    rig.tracker
        .wait_until_ready(&window, Duration::from_secs(5))
        .expect("readiness probe");

    let first = rig.tracker.is_ready_for_input(&button).expect("ready query");
    let second = rig.tracker.is_ready_for_input(&button).expect("ready query");
    assert_eq!(first, second);
    assert!(first);
}

#[test]
fn preexisting_shown_windows_are_ready_immediately() {
    let toolkit = crate::toolkit::headless::HeadlessToolkit::new();
    let window = toolkit.create_window("already-there");
    let button = toolkit.create_child(&window, "Button", "ok");
    toolkit.show(&window).expect("show");
    let backend: Arc<dyn ToolkitBackend> = toolkit.clone();
    drain(&backend.default_queue());

    let settings = SharedSettings::new(Settings::default());
    let registry = Arc::new(Registry::new(backend.default_queue()));
    let tracker =
        WindowTracker::new(backend, registry, settings).expect("tracker construction");

    assert_eq!(tracker.state_of(&window), Some(WindowState::Open));
    assert!(tracker.is_ready_for_input(&button).expect("ready query"));
}

#[test]
fn record_only_tracker_deems_visible_windows_ready() {
    let toolkit = crate::toolkit::headless::HeadlessToolkit::new();
    let backend: Arc<dyn ToolkitBackend> = toolkit.clone();
    let settings = SharedSettings::new(Settings::default());
    let registry = Arc::new(Registry::new(backend.default_queue()));
    let tracker = WindowTracker::record_only(backend, registry, settings)
        .expect("tracker construction");

    let window = toolkit.create_window("main");
    rig_show(&toolkit, &window);
    tracker
        .wait_until_ready(&window, Duration::from_secs(5))
        .expect("visible implies ready without a probe");
    assert!(tracker.is_ready_for_input(&window).expect("ready query"));
}

fn rig_show(toolkit: &crate::toolkit::headless::HeadlessToolkit, window: &crate::Component) {
    toolkit.show(window).expect("show");
    drain(&toolkit.default_queue());
}

#[test]
fn queue_resolution_falls_back_to_default() {
    let rig = rig();
    let window = rig.toolkit.create_window("main");
    let button = rig.toolkit.create_child(&window, "Button", "ok");

    let default_id = rig.toolkit.default_queue().id();
    assert_eq!(rig.tracker.queue_for(&button).id(), default_id);

    let isolated = rig.toolkit.create_queue();
    rig.tracker
        .map_component_queue(&button, &isolated)
        .expect("mapping");
    assert_eq!(rig.tracker.queue_for(&button).id(), isolated.id());
}

#[test]
fn queue_mapping_expires_when_the_window_closes() {
    let rig = rig();
    let window = rig.toolkit.create_window("main");
    let button = rig.toolkit.create_child(&window, "Button", "ok");
    let isolated = rig.toolkit.create_queue();
    rig.tracker
        .map_component_queue(&button, &isolated)
        .expect("mapping");
    rig.toolkit.show(&window).expect("show");
    drain(&rig.toolkit.default_queue());

    rig.toolkit.close(&window).expect("close");
    drain(&rig.toolkit.default_queue());

    let default_id = rig.toolkit.default_queue().id();
    assert_eq!(
        rig.tracker.queue_for(&button).id(),
        default_id,
        "expired mapping must fall back to the default queue"
    );
}

#[test]
fn window_component_mapping_routes_its_queue() {
    let rig = rig();
    let isolated = rig.toolkit.create_queue();
    let window = rig.toolkit.create_window("embedded");
    rig.tracker
        .map_component_queue(&window, &isolated)
        .expect("mapping");
    let button = rig.toolkit.create_child(&window, "Button", "ok");

    // The child inherits its window's mapping.
    assert_eq!(rig.tracker.queue_for(&button).id(), isolated.id());
}

#[test]
fn readiness_probe_times_out_on_a_stalled_queue() {
    let mut settings = Settings::default();
    settings.idle_timeout_ms = 500;
    let rig = rig_with(settings);
    let window = rig.toolkit.create_window("main");
    rig.toolkit.show(&window).expect("show");
    drain(&rig.toolkit.default_queue());

    // Jam the dispatch thread so the probe's marker cannot round-trip.
    rig.toolkit
        .default_queue()
        .post_task(Box::new(|| thread::sleep(Duration::from_millis(1800))))
        .expect("post stall");

    match rig.tracker.wait_until_ready(&window, Duration::from_millis(200)) {
        Err(AutomationError::WaitTimedOut(_)) => {}
        other => panic!("expected WaitTimedOut, got {other:?}"),
    }
    // Let the stall finish so the worker is idle before teardown.
    drain(&rig.toolkit.default_queue());
}

#[test]
fn open_windows_enumerates_across_queues_deduplicated() {
    let rig = rig();
    let first = rig.toolkit.create_window("first");
    let isolated = rig.toolkit.create_queue();
    let second = rig.toolkit.create_window_on("second", Some(&isolated));
    let hidden = rig.toolkit.create_window("hidden");

    rig.toolkit.show(&first).expect("show");
    rig.toolkit.show(&second).expect("show");
    drain(&rig.toolkit.default_queue());
    drain(&isolated);

    let open = rig.tracker.open_windows().expect("enumerate");
    assert_eq!(open.len(), 2);
    assert!(open.contains(&first));
    assert!(open.contains(&second));
    assert!(!open.contains(&hidden));
}
