//! Keyboard-focus transfer.

use crate::element::Component;
use crate::errors::AutomationError;
use crate::idle::IdleWaiter;
use crate::input::InputSynthesizer;
use crate::settings::SharedSettings;
use crate::toolkit::{FocusListenerGuard, ToolkitBackend};
use crate::tracker::WindowTracker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Pause between polls while waiting for the focus-gained notification
const FOCUS_POLL_DELAY: Duration = Duration::from_millis(10);

/// Raises windows and transfers keyboard focus on behalf of the driver
pub struct FocusCoordinator {
    toolkit: Arc<dyn ToolkitBackend>,
    synthesizer: Arc<InputSynthesizer>,
    idle: Arc<IdleWaiter>,
    tracker: Arc<WindowTracker>,
    settings: SharedSettings,
}

impl FocusCoordinator {
    pub fn new(
        toolkit: Arc<dyn ToolkitBackend>,
        synthesizer: Arc<InputSynthesizer>,
        idle: Arc<IdleWaiter>,
        tracker: Arc<WindowTracker>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            toolkit,
            synthesizer,
            idle,
            tracker,
            settings,
        }
    }

    /// Give keyboard focus to `target`. No-op when it already owns focus.
    ///
    /// The pointer is moved over the target first (pointer-follows-focus
    /// environments route focus with the pointer), the owning window is
    /// raised when it differs from the focused window's owner, then focus
    /// is requested. With `wait`, blocks until the focus-gained
    /// notification arrives and raises
    /// [`AutomationError::ActionFailed`] when it does not within the idle
    /// timeout. The notification listener is detached on every exit path.
    #[instrument(level = "debug", skip(self, target), fields(target = %target.describe()))]
    pub fn focus(&self, target: &Component, wait: bool) -> Result<(), AutomationError> {
        if self.owns_focus(target)? {
            debug!("target already owns focus");
            return Ok(());
        }

        // Pointer-follows-focus environments move focus with the pointer.
        let (_, _, w, h) = target.bounds()?;
        self.synthesizer
            .move_mouse(target, (w / 2.0) as i32, (h / 2.0) as i32)?;

        let target_window = self.tracker.window_of(target)?;
        let focused_window = match self.toolkit.focus_owner()? {
            Some(owner) => owner.window()?.or_else(|| {
                if owner.is_window() {
                    Some(owner)
                } else {
                    None
                }
            }),
            None => None,
        };
        if focused_window.as_ref() != Some(&target_window) {
            target_window.raise()?;
            self.idle.wait_for_idle()?;
        }

        if !wait {
            return target.request_focus();
        }

        let gained = Arc::new(AtomicBool::new(false));
        let listener_gained = gained.clone();
        let target_id = target.object_id();
        // Guard detaches the listener on every exit path, failure included.
        let _guard = FocusListenerGuard::attach(
            self.toolkit.clone(),
            Arc::new(move |owner: &Component| {
                if owner.object_id() == target_id {
                    listener_gained.store(true, Ordering::SeqCst);
                }
            }),
        );

        target.request_focus()?;

        let timeout = self.settings.idle_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            if gained.load(Ordering::SeqCst) || self.owns_focus(target)? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::ActionFailed(format!(
                    "{} did not gain focus within {timeout:?}",
                    target.describe()
                )));
            }
            thread::sleep(FOCUS_POLL_DELAY);
        }
    }

    fn owns_focus(&self, target: &Component) -> Result<bool, AutomationError> {
        Ok(self
            .toolkit
            .focus_owner()?
            .map(|owner| owner == *target)
            .unwrap_or(false))
    }
}
