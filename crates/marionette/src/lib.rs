//! Deterministic GUI test automation over a cooperative event loop.
//!
//! This crate lets a test-driver thread simulate user input (mouse,
//! keyboard) on a graphical application and safely observe the result,
//! while the application's widgets live on their own single-threaded
//! event-processing loop that the driver does not control. The driver
//! resolves a target component, routes synthetic events through the
//! target's event queue, and uses queue-drain synchronization to know
//! when the application has finished reacting.
//!
//! The host toolkit is abstracted behind [`toolkit::ToolkitBackend`]; the
//! in-process [`toolkit::headless::HeadlessToolkit`] backend is provided
//! for driving the engine without a display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub mod element;
pub mod errors;
pub mod finder;
pub mod focus;
pub mod formatter;
pub mod hierarchy;
pub mod idle;
pub mod input;
pub mod lock;
pub mod matcher;
pub mod registry;
pub mod settings;
#[cfg(test)]
mod tests;
pub mod toolkit;
pub mod tracker;

pub use element::{Component, ComponentAttributes, ComponentImpl};
pub use errors::AutomationError;
pub use finder::ComponentFinder;
pub use focus::FocusCoordinator;
pub use formatter::{format_hierarchy, format_subtree, ComponentSnapshot};
pub use hierarchy::{ComponentHierarchy, ImplicitRelation};
pub use idle::IdleWaiter;
pub use input::InputSynthesizer;
pub use lock::{LockOwner, ScreenLock};
pub use matcher::{ComponentMatcher, MatchCriteria, PredicateMatcher};
pub use registry::{InputState, Registry, WindowRecord, WindowState};
pub use settings::{
    ComponentLookupScope, EventMode, Settings, SharedSettings, MAX_COMPONENT_DELAY_MS,
};
pub use toolkit::{ButtonMask, EventQueue, KeyCode, Modifiers, ToolkitBackend};
pub use tracker::WindowTracker;

/// The main entry point: one automation session over one toolkit backend.
///
/// Construction acquires the process-wide screen lock for this session,
/// serializing it against other sessions in the same process;
/// [`clean_up`](Session::clean_up) (or dropping the session) releases
/// still-pressed keys and buttons and gives the lock back.
pub struct Session {
    toolkit: Arc<dyn ToolkitBackend>,
    tracker: Arc<WindowTracker>,
    synthesizer: Arc<InputSynthesizer>,
    idle: Arc<IdleWaiter>,
    focus: FocusCoordinator,
    finder: ComponentFinder,
    hierarchy: Arc<ComponentHierarchy>,
    settings: SharedSettings,
    lock_owner: LockOwner,
    cleaned: AtomicBool,
}

impl Session {
    /// A session seeing the full hierarchy, with default settings
    pub fn new(toolkit: Arc<dyn ToolkitBackend>) -> Result<Self, AutomationError> {
        Self::with_settings(toolkit, Settings::default())
    }

    /// A session with explicit initial settings
    pub fn with_settings(
        toolkit: Arc<dyn ToolkitBackend>,
        settings: Settings,
    ) -> Result<Self, AutomationError> {
        let hierarchy = Arc::new(ComponentHierarchy::new(toolkit.clone()));
        Self::build(toolkit, settings, hierarchy)
    }

    /// A session that ignores every window existing at creation time, so
    /// it can run beside whatever is already on screen
    pub fn ignoring_existing(toolkit: Arc<dyn ToolkitBackend>) -> Result<Self, AutomationError> {
        let hierarchy = Arc::new(ComponentHierarchy::new_ignoring_existing(toolkit.clone())?);
        Self::build(toolkit, Settings::default(), hierarchy)
    }

    #[instrument(skip(toolkit, settings, hierarchy))]
    fn build(
        toolkit: Arc<dyn ToolkitBackend>,
        settings: Settings,
        hierarchy: Arc<ComponentHierarchy>,
    ) -> Result<Self, AutomationError> {
        let lock_owner = LockOwner::new();
        ScreenLock::instance().acquire(lock_owner);

        let result = (|| {
            let settings = SharedSettings::new(settings);
            let registry = Arc::new(Registry::new(toolkit.default_queue()));
            let tracker =
                WindowTracker::new(toolkit.clone(), registry.clone(), settings.clone())?;
            let synthesizer = Arc::new(InputSynthesizer::new(
                toolkit.clone(),
                tracker.clone(),
                settings.clone(),
            ));
            let idle = Arc::new(IdleWaiter::new(registry, settings.clone()));
            let finder = ComponentFinder::new(hierarchy.clone(), settings.clone());
            let focus = FocusCoordinator::new(
                toolkit.clone(),
                synthesizer.clone(),
                idle.clone(),
                tracker.clone(),
                settings.clone(),
            );
            info!("automation session initialized");
            Ok(Self {
                toolkit,
                tracker,
                synthesizer,
                idle,
                focus,
                finder,
                hierarchy,
                settings,
                lock_owner,
                cleaned: AtomicBool::new(false),
            })
        })();
        if result.is_err() {
            let _ = ScreenLock::instance().release(lock_owner);
        }
        result
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    pub fn toolkit(&self) -> &Arc<dyn ToolkitBackend> {
        &self.toolkit
    }

    pub fn tracker(&self) -> &Arc<WindowTracker> {
        &self.tracker
    }

    pub fn synthesizer(&self) -> &Arc<InputSynthesizer> {
        &self.synthesizer
    }

    pub fn finder(&self) -> &ComponentFinder {
        &self.finder
    }

    pub fn hierarchy(&self) -> &Arc<ComponentHierarchy> {
        &self.hierarchy
    }

    /// Find the unique component matching the given criteria
    pub fn find(&self, criteria: impl Into<MatchCriteria>) -> Result<Component, AutomationError> {
        self.finder.find(&criteria.into())
    }

    /// Find the unique component matching the criteria inside `root`
    pub fn find_in(
        &self,
        root: &Component,
        criteria: impl Into<MatchCriteria>,
    ) -> Result<Component, AutomationError> {
        self.finder.find_in(root, &criteria.into())
    }

    /// Find the unique component accepted by an arbitrary matcher
    pub fn find_with(&self, matcher: &dyn ComponentMatcher) -> Result<Component, AutomationError> {
        self.finder.find(matcher)
    }

    /// Whether `component` can accept input right now
    pub fn is_ready_for_input(&self, component: &Component) -> Result<bool, AutomationError> {
        self.tracker.is_ready_for_input(component)
    }

    /// Block until every tracked queue is drained
    pub fn wait_for_idle(&self) -> Result<(), AutomationError> {
        self.idle.wait_for_idle()
    }

    fn center_of(component: &Component) -> Result<(i32, i32), AutomationError> {
        let (_, _, w, h) = component.bounds()?;
        Ok(((w / 2.0) as i32, (h / 2.0) as i32))
    }

    /// Wait until the target's window routes input, bounded by the idle
    /// timeout
    fn await_ready(&self, target: &Component) -> Result<(), AutomationError> {
        let window = self.tracker.window_of(target)?;
        self.tracker
            .wait_until_ready(&window, self.settings.idle_timeout())
    }

    fn click_with(
        &self,
        target: &Component,
        buttons: ButtonMask,
        times: u32,
    ) -> Result<(), AutomationError> {
        self.await_ready(target)?;
        let center = Self::center_of(target)?;
        self.synthesizer.move_mouse(target, center.0, center.1)?;
        for _ in 0..times {
            self.synthesizer.press_mouse(target, center, buttons)?;
            self.synthesizer.release_mouse(target, center, buttons)?;
        }
        self.idle.wait_for_idle()
    }

    /// Left-click the center of `target` and wait for the queues to drain
    #[instrument(skip(self, target), fields(target = %target.describe()))]
    pub fn click(&self, target: &Component) -> Result<(), AutomationError> {
        self.click_with(target, ButtonMask::LEFT, 1)
    }

    /// Double-click the center of `target`
    #[instrument(skip(self, target), fields(target = %target.describe()))]
    pub fn double_click(&self, target: &Component) -> Result<(), AutomationError> {
        self.click_with(target, ButtonMask::LEFT, 2)
    }

    /// Right-click the center of `target`
    #[instrument(skip(self, target), fields(target = %target.describe()))]
    pub fn right_click(&self, target: &Component) -> Result<(), AutomationError> {
        self.click_with(target, ButtonMask::RIGHT, 1)
    }

    /// Press pointer buttons at a component-local point
    pub fn press_mouse(
        &self,
        target: &Component,
        point: (i32, i32),
        buttons: ButtonMask,
    ) -> Result<(), AutomationError> {
        self.synthesizer.press_mouse(target, point, buttons)
    }

    /// Release pointer buttons at a component-local point
    pub fn release_mouse(
        &self,
        target: &Component,
        point: (i32, i32),
        buttons: ButtonMask,
    ) -> Result<(), AutomationError> {
        self.synthesizer.release_mouse(target, point, buttons)
    }

    /// Move the pointer to a component-local point
    pub fn move_mouse(&self, target: &Component, x: i32, y: i32) -> Result<(), AutomationError> {
        self.synthesizer.move_mouse(target, x, y)
    }

    /// Rotate the wheel over the component last moved over
    pub fn rotate_wheel(&self, amount: i32) -> Result<(), AutomationError> {
        self.synthesizer.rotate_wheel(amount)
    }

    /// Type one character: key press and release carrying the char
    pub fn type_char(&self, ch: char) -> Result<(), AutomationError> {
        let code = KeyCode(ch.to_ascii_uppercase() as u32);
        self.synthesizer.press_key(code, Some(ch))?;
        self.synthesizer.release_key(code, Some(ch))
    }

    /// Type a string character by character with the configured
    /// inter-event delay
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub fn enter_text(&self, text: &str) -> Result<(), AutomationError> {
        for ch in text.chars() {
            self.type_char(ch)?;
        }
        Ok(())
    }

    /// Press and release `code` while holding the given modifier keys
    pub fn press_and_release_key(
        &self,
        code: KeyCode,
        modifiers: &[KeyCode],
    ) -> Result<(), AutomationError> {
        for modifier in modifiers {
            self.synthesizer.press_key(*modifier, None)?;
        }
        let result = self
            .synthesizer
            .press_key(code, None)
            .and_then(|()| self.synthesizer.release_key(code, None));
        // Modifiers come back up in reverse order even when the key failed.
        for modifier in modifiers.iter().rev() {
            self.synthesizer.release_key(*modifier, None)?;
        }
        result
    }

    /// Open the popup menu attached to `invoker` with a right click at the
    /// given component-local point (its center by default) and return the
    /// popup
    #[instrument(skip(self, invoker), fields(invoker = %invoker.describe()))]
    pub fn show_popup_menu(
        &self,
        invoker: &Component,
        point: Option<(i32, i32)>,
    ) -> Result<Component, AutomationError> {
        self.await_ready(invoker)?;
        let point = match point {
            Some(point) => point,
            None => Self::center_of(invoker)?,
        };
        self.synthesizer
            .press_mouse(invoker, point, ButtonMask::RIGHT)?;
        self.synthesizer
            .release_mouse(invoker, point, ButtonMask::RIGHT)?;
        self.idle.wait_for_idle()?;

        match invoker.attached_popup()? {
            Some(popup) if popup.is_showing()? => Ok(popup),
            Some(popup) => {
                debug!(popup = %popup.describe(), "popup attached but not showing");
                Err(AutomationError::ActionFailed(format!(
                    "popup attached to {} never became visible",
                    invoker.describe()
                )))
            }
            None => Err(AutomationError::ActionFailed(format!(
                "no popup menu appeared for {}",
                invoker.describe()
            ))),
        }
    }

    /// Give keyboard focus to `target` without waiting for the transfer
    pub fn focus(&self, target: &Component) -> Result<(), AutomationError> {
        self.focus.focus(target, false)
    }

    /// Give keyboard focus to `target` and wait until it owns focus
    pub fn focus_and_wait(&self, target: &Component) -> Result<(), AutomationError> {
        self.focus.focus(target, true)
    }

    /// Release every still-pressed key and button, drain the queues, and
    /// give the screen lock back. Safe to call more than once.
    #[instrument(skip(self))]
    pub fn clean_up(&self) -> Result<(), AutomationError> {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let released = self.synthesizer.release_all();
        let drained = self.idle.wait_for_idle();
        ScreenLock::instance().release(self.lock_owner)?;
        released?;
        drained
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.cleaned.load(Ordering::SeqCst) {
            if let Err(e) = self.clean_up() {
                warn!(error = %e, "session clean-up during drop failed");
            }
        }
    }
}
