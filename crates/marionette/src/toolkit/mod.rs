//! The boundary between the engine and the host GUI toolkit.
//!
//! Everything the engine needs from a toolkit is expressed here:
//! [`ToolkitBackend`] (window enumeration, focus-owner queries, event
//! subscriptions, OS-level input injection) and [`EventQueue`] (one serial
//! input channel consumed by a single GUI event thread). The engine never
//! talks to a real windowing system directly; it is wired to whichever
//! backend the embedder supplies. The in-process [`headless`] backend is
//! the reference implementation and the substrate for the engine's tests.

use crate::element::Component;
use crate::errors::AutomationError;
use std::fmt::Debug;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod headless;

/// A unit of work executed on a GUI event thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Pointer button bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ButtonMask(pub u8);

impl ButtonMask {
    pub const LEFT: ButtonMask = ButtonMask(1);
    pub const MIDDLE: ButtonMask = ButtonMask(2);
    pub const RIGHT: ButtonMask = ButtonMask(4);

    pub fn contains(self, other: ButtonMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: ButtonMask) -> ButtonMask {
        ButtonMask(self.0 | other.0)
    }

    pub fn difference(self, other: ButtonMask) -> ButtonMask {
        ButtonMask(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Keyboard modifier bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers(pub u8);

impl Modifiers {
    pub const SHIFT: Modifiers = Modifiers(1);
    pub const CONTROL: Modifiers = Modifiers(2);
    pub const ALT: Modifiers = Modifiers(4);
    pub const META: Modifiers = Modifiers(8);

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    pub fn difference(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Toolkit-independent key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub const SHIFT: KeyCode = KeyCode(0x10);
    pub const CONTROL: KeyCode = KeyCode(0x11);
    pub const ALT: KeyCode = KeyCode(0x12);
    pub const META: KeyCode = KeyCode(0x9D);
    pub const ENTER: KeyCode = KeyCode(0x0A);
    pub const TAB: KeyCode = KeyCode(0x09);
    pub const ESCAPE: KeyCode = KeyCode(0x1B);

    /// The modifier bit this key contributes while pressed, if any
    pub fn modifier(self) -> Option<Modifiers> {
        match self {
            KeyCode::SHIFT => Some(Modifiers::SHIFT),
            KeyCode::CONTROL => Some(Modifiers::CONTROL),
            KeyCode::ALT => Some(Modifiers::ALT),
            KeyCode::META => Some(Modifiers::META),
            _ => None,
        }
    }
}

/// What a pointer event does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Press,
    Release,
    Move,
    /// Logical press+release pair, carrying the accumulated click count
    Clicked,
    /// Wheel rotation by the given amount (positive = towards the user)
    Wheel(i32),
}

/// A synthesized pointer event addressed to one component
#[derive(Debug, Clone)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub target: Component,
    /// Component-local coordinates
    pub point: (i32, i32),
    pub buttons: ButtonMask,
    pub modifiers: Modifiers,
    pub click_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Press,
    Release,
}

/// A synthesized keyboard event
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub kind: KeyKind,
    /// The focused component at synthesis time, when known
    pub target: Option<Component>,
    pub code: KeyCode,
    pub ch: Option<char>,
    pub modifiers: Modifiers,
}

/// A synthesized input event
#[derive(Debug, Clone)]
pub enum InputEvent {
    Pointer(PointerEvent),
    Key(KeyEvent),
}

impl InputEvent {
    /// The component the event is addressed to, when any
    pub fn target(&self) -> Option<&Component> {
        match self {
            InputEvent::Pointer(ev) => Some(&ev.target),
            InputEvent::Key(ev) => ev.target.as_ref(),
        }
    }
}

/// Window lifecycle notifications delivered asynchronously on the GUI
/// event thread
#[derive(Debug, Clone)]
pub enum WindowEvent {
    Shown(Component),
    Hidden(Component),
    Closed(Component),
}

pub type WindowListener = Arc<dyn Fn(&WindowEvent) + Send + Sync>;
pub type FocusListener = Arc<dyn Fn(&Component) + Send + Sync>;

/// One serial input channel, consumed by exactly one GUI event thread
pub trait EventQueueImpl: Send + Sync + Debug {
    /// Stable identity of this queue for its lifetime
    fn queue_id(&self) -> usize;
    /// Enqueue an input event for dispatch
    fn post_input(&self, event: InputEvent) -> Result<(), AutomationError>;
    /// Enqueue a unit of work
    fn post_task(&self, task: Task) -> Result<(), AutomationError>;
    /// Whether the queue currently has a pending head event
    fn has_pending(&self) -> bool;
    /// Whether the calling thread is this queue's dispatch thread
    fn is_dispatch_thread(&self) -> bool;
    /// The modal, input-consuming window currently blocking this queue,
    /// if any
    fn blocking_modal(&self) -> Option<Component>;
}

/// Cloneable handle identifying one serial input channel
#[derive(Debug, Clone)]
pub struct EventQueue {
    inner: Arc<dyn EventQueueImpl>,
}

impl EventQueue {
    pub fn new(inner: Arc<dyn EventQueueImpl>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> usize {
        self.inner.queue_id()
    }

    pub fn post_input(&self, event: InputEvent) -> Result<(), AutomationError> {
        self.inner.post_input(event)
    }

    pub fn post_task(&self, task: Task) -> Result<(), AutomationError> {
        self.inner.post_task(task)
    }

    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }

    pub fn is_dispatch_thread(&self) -> bool {
        self.inner.is_dispatch_thread()
    }

    pub fn blocking_modal(&self) -> Option<Component> {
        self.inner.blocking_modal()
    }

    /// Enqueue a unit of work and block the calling thread until the GUI
    /// event thread has executed it, returning its result.
    ///
    /// This is the synchronous submit-and-wait primitive: all widget-state
    /// reads and writes are funneled through it. Must not be called from
    /// the queue's own dispatch thread.
    pub fn submit_and_wait<R, F>(&self, timeout: Duration, f: F) -> Result<R, AutomationError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.inner.is_dispatch_thread() {
            return Err(AutomationError::ActionFailed(
                "submit_and_wait called from the queue's own dispatch thread".to_string(),
            ));
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.inner.post_task(Box::new(move || {
            let _ = tx.send(f());
        }))?;
        match rx.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(AutomationError::WaitTimedOut(format!(
                "queue {} did not execute submitted work within {timeout:?}",
                self.inner.queue_id()
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(AutomationError::PlatformError(format!(
                    "queue {} discarded submitted work (dispatch thread panicked or shut down)",
                    self.inner.queue_id()
                )))
            }
        }
    }

    /// Post a marker unit of work and wait for it to be dispatched.
    /// Returns `true` when the rendezvous completed within the timeout.
    pub fn marker_rendezvous(&self, timeout: Duration) -> Result<bool, AutomationError> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.inner.post_task(Box::new(move || {
            let _ = tx.send(());
        }))?;
        Ok(rx.recv_timeout(timeout).is_ok())
    }
}

impl PartialEq for EventQueue {
    fn eq(&self, other: &Self) -> bool {
        self.inner.queue_id() == other.inner.queue_id()
    }
}

impl Eq for EventQueue {}

impl std::hash::Hash for EventQueue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.queue_id().hash(state);
    }
}

/// The host toolkit's window and input primitives
pub trait ToolkitBackend: Send + Sync {
    /// All currently known top-level windows, hidden ones included
    fn root_windows(&self) -> Result<Vec<Component>, AutomationError>;

    /// The queue serving components with no more specific mapping
    fn default_queue(&self) -> EventQueue;

    /// The component currently owning keyboard focus
    fn focus_owner(&self) -> Result<Option<Component>, AutomationError>;

    fn add_window_listener(&self, listener: WindowListener) -> u64;
    fn remove_window_listener(&self, id: u64);

    fn add_focus_listener(&self, listener: FocusListener) -> u64;
    fn remove_focus_listener(&self, id: u64);

    /// OS-level pointer injection at absolute screen coordinates
    fn inject_pointer(
        &self,
        kind: PointerKind,
        screen: (i32, i32),
        buttons: ButtonMask,
        click_count: u32,
    ) -> Result<(), AutomationError>;

    /// OS-level key injection, routed to the current focus owner
    fn inject_key(
        &self,
        kind: KeyKind,
        code: KeyCode,
        ch: Option<char>,
    ) -> Result<(), AutomationError>;

    /// Last known pointer location in screen coordinates
    fn pointer_location(&self) -> (i32, i32);

    fn as_any(&self) -> &dyn std::any::Any;
}

/// Detaches a toolkit focus listener when dropped, so the listener is
/// removed on every exit path of a wait, including failures
pub struct FocusListenerGuard {
    toolkit: Arc<dyn ToolkitBackend>,
    id: u64,
}

impl FocusListenerGuard {
    pub fn attach(toolkit: Arc<dyn ToolkitBackend>, listener: FocusListener) -> Self {
        let id = toolkit.add_focus_listener(listener);
        Self { toolkit, id }
    }
}

impl Drop for FocusListenerGuard {
    fn drop(&mut self) {
        self.toolkit.remove_focus_listener(self.id);
    }
}
