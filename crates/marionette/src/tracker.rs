//! Window lifecycle tracking and per-component queue resolution.
//!
//! A window's visibility alone does not prove it can route input: between
//! the toolkit's "shown" notification and the moment the window is wired
//! into input dispatch there is a gap no passive signal covers. The
//! tracker therefore combines passive notifications (delivered
//! asynchronously on the GUI event thread) with an active readiness probe
//! run on the driver thread: settle, jitter the pointer over the window,
//! confirm the queue round-trips a marker, and as a last resort force a
//! one-pixel resize-and-restore to provoke the toolkit into finishing
//! input registration.

use crate::element::Component;
use crate::errors::AutomationError;
use crate::registry::{Registry, WindowState};
use crate::settings::SharedSettings;
use crate::toolkit::{
    ButtonMask, EventQueue, PointerKind, ToolkitBackend, WindowEvent,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Pause between polls while waiting for a window to open
const OPEN_POLL_DELAY: Duration = Duration::from_millis(10);
/// Bound for one marker rendezvous during the readiness probe
const PROBE_RENDEZVOUS_TIMEOUT: Duration = Duration::from_millis(500);

/// Tracks every window the session has observed and resolves the event
/// queue serving any component
pub struct WindowTracker {
    registry: Arc<Registry>,
    toolkit: Arc<dyn ToolkitBackend>,
    settings: SharedSettings,
    /// When false (record-only sessions), a window is deemed ready as
    /// soon as it is visible and the probe is skipped entirely
    probe_enabled: bool,
    listener_id: u64,
}

impl WindowTracker {
    pub fn new(
        toolkit: Arc<dyn ToolkitBackend>,
        registry: Arc<Registry>,
        settings: SharedSettings,
    ) -> Result<Arc<Self>, AutomationError> {
        Self::with_probe(toolkit, registry, settings, true)
    }

    /// A tracker without a synthesis backend: visibility implies readiness
    pub fn record_only(
        toolkit: Arc<dyn ToolkitBackend>,
        registry: Arc<Registry>,
        settings: SharedSettings,
    ) -> Result<Arc<Self>, AutomationError> {
        Self::with_probe(toolkit, registry, settings, false)
    }

    fn with_probe(
        toolkit: Arc<dyn ToolkitBackend>,
        registry: Arc<Registry>,
        settings: SharedSettings,
        probe_enabled: bool,
    ) -> Result<Arc<Self>, AutomationError> {
        let listener_registry = registry.clone();
        let default_queue = toolkit.default_queue();
        registry.register_queue(&default_queue);

        // Runs on the GUI event thread: record the transition and return.
        // The readiness probe happens later, on the driver thread.
        let listener_id = toolkit.add_window_listener(Arc::new(move |event: &WindowEvent| {
            let (window, mark): (&Component, fn(&Registry, &EventQueue, usize)) = match event {
                WindowEvent::Shown(w) => (w, Registry::mark_open),
                WindowEvent::Hidden(w) => (w, Registry::mark_hidden),
                WindowEvent::Closed(w) => (w, Registry::mark_closed),
            };
            let id = window.object_id();
            let queue = listener_registry
                .mapped_queue(id)
                .unwrap_or_else(|| default_queue.clone());
            debug!(window_id = id, ?event, "window notification");
            mark(&listener_registry, &queue, id);
        }));

        let tracker = Arc::new(Self {
            registry,
            toolkit,
            settings,
            probe_enabled,
            listener_id,
        });

        // Construction hook: windows alive before this session started are
        // recorded immediately rather than waiting for their next event.
        for window in tracker.toolkit.root_windows()? {
            tracker.observe(&window)?;
        }
        Ok(tracker)
    }

    /// Record a window on first observation, keyed by its current
    /// visibility. Pre-existing visible windows finished their input
    /// registration long ago and are recorded ready.
    pub fn observe(&self, window: &Component) -> Result<(), AutomationError> {
        let id = window.object_id();
        if self.registry.window_record(id).is_some() {
            return Ok(());
        }
        let queue = self.queue_for(window);
        if window.is_showing()? {
            self.registry.mark_open(&queue, id);
            self.registry.mark_ready(&queue, id);
        } else {
            self.registry.mark_pending(&queue, id);
        }
        Ok(())
    }

    /// The queue serving `component`: its own mapping if one exists, then
    /// its window's, then the default queue
    pub fn queue_for(&self, component: &Component) -> EventQueue {
        if let Some(queue) = self.registry.mapped_queue(component.object_id()) {
            return queue;
        }
        if let Ok(Some(window)) = component.window() {
            if let Some(queue) = self.registry.mapped_queue(window.object_id()) {
                return queue;
            }
        }
        self.toolkit.default_queue()
    }

    /// Declare that `component` is served by `queue` until its owning
    /// window closes
    pub fn map_component_queue(
        &self,
        component: &Component,
        queue: &EventQueue,
    ) -> Result<(), AutomationError> {
        let window = self.window_of(component)?;
        self.registry
            .map_component_queue(component.object_id(), queue, window.object_id());
        Ok(())
    }

    /// The top-level window containing `component`
    pub fn window_of(&self, component: &Component) -> Result<Component, AutomationError> {
        if component.is_window() {
            return Ok(component.clone());
        }
        component.window()?.ok_or_else(|| {
            AutomationError::ActionFailed(format!(
                "{} has no window ancestor",
                component.describe()
            ))
        })
    }

    /// Current lifecycle state of `window`, if it has been observed
    pub fn state_of(&self, window: &Component) -> Option<WindowState> {
        self.registry.window_record(window.object_id()).map(|r| r.state)
    }

    /// Whether `component` can accept input right now: its window is Open
    /// and probed ready, and the component itself reports showing. Pure
    /// read: repeated calls without an intervening state change agree.
    pub fn is_ready_for_input(&self, component: &Component) -> Result<bool, AutomationError> {
        let window = match component.window()? {
            Some(window) => window,
            None if component.is_window() => component.clone(),
            None => return Ok(false),
        };
        let Some(record) = self.registry.window_record(window.object_id()) else {
            return Ok(false);
        };
        if record.state != WindowState::Open || !record.ready {
            return Ok(false);
        }
        component.is_showing()
    }

    /// Block the driver thread until `window` is Open and confirmed able
    /// to route input, probing actively once it is visible.
    #[instrument(level = "debug", skip(self, window), fields(window_id = window.object_id()))]
    pub fn wait_until_ready(
        &self,
        window: &Component,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        self.observe(window)?;
        let deadline = Instant::now() + timeout;
        let id = window.object_id();

        // Passive phase: wait for the Shown notification to land.
        loop {
            let record = self.registry.window_record(id);
            match record.as_ref().map(|r| r.state) {
                Some(WindowState::Open) if window.is_showing()? => break,
                Some(WindowState::Closed) => {
                    return Err(AutomationError::ActionFailed(format!(
                        "window {} is closed",
                        window.describe()
                    )))
                }
                _ => {}
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::WaitTimedOut(format!(
                    "window {} did not open within {timeout:?}",
                    window.describe()
                )));
            }
            thread::sleep(OPEN_POLL_DELAY);
        }

        let queue = self
            .registry
            .window_record(id)
            .map(|r| r.queue)
            .unwrap_or_else(|| self.queue_for(window));

        if self
            .registry
            .window_record(id)
            .map(|r| r.ready)
            .unwrap_or(false)
        {
            return Ok(());
        }

        if !self.probe_enabled {
            // No synthesis backend: visible is as ready as it gets.
            self.registry.mark_ready(&queue, id);
            return Ok(());
        }

        self.settle_after_shown(id, deadline);

        if self.probe(window, &queue)? {
            self.registry.mark_ready(&queue, id);
            return Ok(());
        }

        // The toolkit has not wired the window into input dispatch yet;
        // force a one-pixel resize-and-restore and re-check once.
        warn!(window_id = id, "readiness unconfirmed, nudging window");
        window.nudge_resize()?;
        if self.probe(window, &queue)? {
            self.registry.mark_ready(&queue, id);
            return Ok(());
        }
        Err(AutomationError::WaitTimedOut(format!(
            "window {} never became ready for input",
            window.describe()
        )))
    }

    /// The short deferred check after "shown": give the toolkit the
    /// configured settle delay before probing
    fn settle_after_shown(&self, window_id: usize, deadline: Instant) {
        let settle = self.settings.component_delay();
        if settle.is_zero() {
            return;
        }
        if let Some(shown_at) = self
            .registry
            .window_record(window_id)
            .and_then(|r| r.shown_at)
        {
            let target = (shown_at + settle).min(deadline);
            let now = Instant::now();
            if target > now {
                thread::sleep(target - now);
            }
        }
    }

    /// One probe round: jitter the pointer over the window's center, then
    /// confirm the queue dispatches a marker. Skipped (and failed) when
    /// the window has no screen location yet.
    fn probe(&self, window: &Component, queue: &EventQueue) -> Result<bool, AutomationError> {
        let Some((cx, cy)) = window.center_on_screen()? else {
            return Ok(false);
        };
        self.toolkit
            .inject_pointer(PointerKind::Move, (cx, cy), ButtonMask::default(), 0)?;
        self.toolkit
            .inject_pointer(PointerKind::Move, (cx + 1, cy), ButtonMask::default(), 0)?;
        queue.marker_rendezvous(PROBE_RENDEZVOUS_TIMEOUT)
    }

    /// Every currently open top-level window across every known queue,
    /// de-duplicated
    pub fn open_windows(&self) -> Result<Vec<Component>, AutomationError> {
        let mut seen = HashSet::new();
        let mut open = Vec::new();
        for window in self.toolkit.root_windows()? {
            self.observe(&window)?;
            if !seen.insert(window.object_id()) {
                continue;
            }
            if self.state_of(&window) == Some(WindowState::Open) {
                open.push(window);
            }
        }
        Ok(open)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl Drop for WindowTracker {
    fn drop(&mut self) {
        self.toolkit.remove_window_listener(self.listener_id);
    }
}
