//! Engine behavior tests, driven against the headless toolkit.

mod idle_tests;
mod input_tests;
mod lock_tests;
mod tracker_tests;

use crate::registry::Registry;
use crate::settings::{SharedSettings, Settings};
use crate::toolkit::headless::HeadlessToolkit;
use crate::toolkit::{EventQueue, ToolkitBackend};
use crate::tracker::WindowTracker;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a subsystem test needs, wired without a session (and so
/// without the process-wide screen lock)
pub(crate) struct Rig {
    pub toolkit: Arc<HeadlessToolkit>,
    pub settings: SharedSettings,
    pub registry: Arc<Registry>,
    pub tracker: Arc<WindowTracker>,
}

pub(crate) fn rig() -> Rig {
    rig_with(Settings::default())
}

pub(crate) fn rig_with(settings: Settings) -> Rig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let toolkit = HeadlessToolkit::new();
    let backend: Arc<dyn ToolkitBackend> = toolkit.clone();
    let settings = SharedSettings::new(settings);
    let registry = Arc::new(Registry::new(backend.default_queue()));
    let tracker = WindowTracker::new(backend, registry.clone(), settings.clone())
        .expect("tracker construction");
    Rig {
        toolkit,
        settings,
        registry,
        tracker,
    }
}

/// Block until everything posted so far on `queue` has been dispatched
pub(crate) fn drain(queue: &EventQueue) {
    assert!(
        queue
            .marker_rendezvous(DRAIN_TIMEOUT)
            .expect("marker rendezvous"),
        "queue did not drain within {DRAIN_TIMEOUT:?}"
    );
}
