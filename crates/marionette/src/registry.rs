//! Shared mutable session state behind coarse, registry-level locks.
//!
//! One [`Registry`] is owned by the session facade and passed by reference
//! to every subcomponent; there are no process-wide singletons here, so
//! independent sessions can coexist in one process, serialized only by the
//! explicit screen lock. Every mutation is an idempotent "mark as X"
//! operation safe to repeat: the driver thread writes proactively to stay
//! ahead of asynchronous delivery, while the GUI event thread writes the
//! same facts when notifications arrive.

use crate::element::Component;
use crate::toolkit::{ButtonMask, EventQueue, KeyCode, Modifiers};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::debug;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned registry lock only means another thread panicked while
    // holding it; the idempotent mark operations remain valid.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Lifecycle of one top-level window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Observed but not yet shown
    Pending,
    /// Shown; input-readiness is tracked separately
    Open,
    Hidden,
    /// Disposed; terminal
    Closed,
}

/// Everything the tracker knows about one live window
#[derive(Debug, Clone)]
pub struct WindowRecord {
    pub state: WindowState,
    /// Confirmed able to route input (readiness probe succeeded)
    pub ready: bool,
    /// Last-known queue serving this window
    pub queue: EventQueue,
    /// When the most recent `Shown` notification was observed
    pub shown_at: Option<Instant>,
}

/// Cumulative device state, updated *before* each event is enqueued so a
/// subsequent synthesis call observes the effect of the previous one even
/// though the consumer has not processed it yet
#[derive(Debug, Default)]
pub struct InputState {
    pub buttons: ButtonMask,
    /// Keys currently held down, in press order
    pub pressed_keys: Vec<(KeyCode, Option<char>)>,
    pub modifiers: Modifiers,
    /// A button is down and the pointer has moved since the press
    pub dragging: bool,
    /// The component the pointer was last synthesized over
    pub pointer_target: Option<Component>,
    /// Last synthesized pointer position in screen coordinates
    pub pointer_location: (i32, i32),
}

struct QueueWindows {
    records: HashMap<usize, WindowRecord>,
}

struct QueueMapping {
    queue: EventQueue,
    /// The window whose closure expires this mapping
    window_id: usize,
}

/// Coarse-locked session state: window records (reachable only through
/// their owning queue's map), the component-to-queue mapping, the shared
/// input state, and the list of known queues.
pub struct Registry {
    queues: Mutex<Vec<EventQueue>>,
    windows: Mutex<HashMap<usize, QueueWindows>>,
    queue_map: Mutex<HashMap<usize, QueueMapping>>,
    input: Mutex<InputState>,
}

impl Registry {
    pub fn new(default_queue: EventQueue) -> Self {
        Self {
            queues: Mutex::new(vec![default_queue]),
            windows: Mutex::new(HashMap::new()),
            queue_map: Mutex::new(HashMap::new()),
            input: Mutex::new(InputState::default()),
        }
    }

    /// Record a queue as known, preserving first-seen order
    pub fn register_queue(&self, queue: &EventQueue) {
        let mut queues = lock(&self.queues);
        if !queues.iter().any(|q| q == queue) {
            debug!(queue_id = queue.id(), "registering event queue");
            queues.push(queue.clone());
        }
    }

    /// Every queue ever registered, in first-seen order. Deliberately may
    /// include queues that have since gone idle or lost their windows.
    pub fn known_queues(&self) -> Vec<EventQueue> {
        lock(&self.queues).clone()
    }

    fn with_record<R>(
        &self,
        queue: &EventQueue,
        window_id: usize,
        f: impl FnOnce(&mut WindowRecord) -> R,
    ) -> R {
        let mut windows = lock(&self.windows);
        let slot = windows.entry(queue.id()).or_insert_with(|| QueueWindows {
            records: HashMap::new(),
        });
        let record = slot.records.entry(window_id).or_insert_with(|| WindowRecord {
            state: WindowState::Pending,
            ready: false,
            queue: queue.clone(),
            shown_at: None,
        });
        record.queue = queue.clone();
        f(record)
    }

    pub fn mark_pending(&self, queue: &EventQueue, window_id: usize) {
        self.with_record(queue, window_id, |r| {
            if r.state == WindowState::Closed {
                return;
            }
            r.state = WindowState::Pending;
            r.ready = false;
        });
    }

    pub fn mark_open(&self, queue: &EventQueue, window_id: usize) {
        self.with_record(queue, window_id, |r| {
            if r.state == WindowState::Closed {
                return;
            }
            r.state = WindowState::Open;
            if r.shown_at.is_none() {
                r.shown_at = Some(Instant::now());
            }
        });
    }

    pub fn mark_ready(&self, queue: &EventQueue, window_id: usize) {
        self.with_record(queue, window_id, |r| {
            if r.state == WindowState::Open {
                r.ready = true;
            }
        });
    }

    pub fn mark_hidden(&self, queue: &EventQueue, window_id: usize) {
        self.with_record(queue, window_id, |r| {
            if r.state == WindowState::Closed {
                return;
            }
            r.state = WindowState::Hidden;
            r.ready = false;
            r.shown_at = None;
        });
    }

    /// Terminal: the record stays Closed and expires any component-queue
    /// mappings owned by the window
    pub fn mark_closed(&self, queue: &EventQueue, window_id: usize) {
        self.with_record(queue, window_id, |r| {
            r.state = WindowState::Closed;
            r.ready = false;
            r.shown_at = None;
        });
        lock(&self.queue_map).retain(|_, m| m.window_id != window_id);
    }

    /// Drop the record entirely once the window object is gone
    pub fn forget_window(&self, window_id: usize) {
        let mut windows = lock(&self.windows);
        for slot in windows.values_mut() {
            slot.records.remove(&window_id);
        }
        lock(&self.queue_map).retain(|_, m| m.window_id != window_id);
    }

    /// Snapshot of one window's record, searched across every queue's map
    pub fn window_record(&self, window_id: usize) -> Option<WindowRecord> {
        let windows = lock(&self.windows);
        windows
            .values()
            .find_map(|slot| slot.records.get(&window_id).cloned())
    }

    /// Map a component to the queue that serves it, expiring with `window_id`
    pub fn map_component_queue(&self, component_id: usize, queue: &EventQueue, window_id: usize) {
        self.register_queue(queue);
        lock(&self.queue_map).insert(
            component_id,
            QueueMapping {
                queue: queue.clone(),
                window_id,
            },
        );
    }

    /// The queue mapped for a component, when the mapping has not expired
    pub fn mapped_queue(&self, component_id: usize) -> Option<EventQueue> {
        lock(&self.queue_map)
            .get(&component_id)
            .map(|m| m.queue.clone())
    }

    /// Run a closure against the shared input state
    pub fn with_input<R>(&self, f: impl FnOnce(&mut InputState) -> R) -> R {
        f(&mut lock(&self.input))
    }
}
