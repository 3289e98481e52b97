//! Mutable session configuration.
//!
//! A single [`Settings`] value is shared by every subcomponent of a session
//! through [`SharedSettings`]. There is no file- or environment-based
//! configuration; callers mutate the value through the session facade.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound for [`Settings::component_delay_ms`]
pub const MAX_COMPONENT_DELAY_MS: u64 = 60_000;

/// How synthesized events reach the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventMode {
    /// Delegate to OS-level input injection using absolute screen coordinates
    #[default]
    NativeInjection,
    /// Construct event objects and enqueue them directly on the target's
    /// resolved event queue
    DirectQueuePost,
}

/// Which components a lookup is allowed to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ComponentLookupScope {
    /// All components in the hierarchy
    #[default]
    Default,
    /// Only components that are currently showing on screen
    ShowingOnly,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Pause inserted after each synthesized event, in milliseconds.
    /// Transiently forced to 0 while a multi-click sequence is in flight.
    pub delay_between_events_ms: u64,
    /// Upper bound for queue-drain waits, in milliseconds
    pub idle_timeout_ms: u64,
    /// How synthesized events are delivered
    pub event_mode: EventMode,
    /// Lookup visibility scope
    pub component_lookup_scope: ComponentLookupScope,
    /// Settle delay applied before interacting with a freshly shown
    /// component, clamped to [0, 60000] ms on write
    component_delay_ms: u64,
    /// Maximum gap between two presses on the same target for them to be
    /// grouped into one multi-click sequence. Environment-specific
    /// heuristic, deliberately configurable.
    pub multi_click_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delay_between_events_ms: 0,
            idle_timeout_ms: 30_000,
            event_mode: EventMode::default(),
            component_lookup_scope: ComponentLookupScope::default(),
            component_delay_ms: 0,
            multi_click_interval_ms: 250,
        }
    }
}

impl Settings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn delay_between_events(&self) -> Duration {
        Duration::from_millis(self.delay_between_events_ms)
    }

    pub fn multi_click_interval(&self) -> Duration {
        Duration::from_millis(self.multi_click_interval_ms)
    }

    pub fn component_delay(&self) -> Duration {
        Duration::from_millis(self.component_delay_ms)
    }

    /// Set the component settle delay, clamped to [0, 60000] ms
    pub fn set_component_delay_ms(&mut self, delay_ms: u64) {
        self.component_delay_ms = delay_ms.min(MAX_COMPONENT_DELAY_MS);
    }

    pub fn component_delay_ms(&self) -> u64 {
        self.component_delay_ms
    }
}

/// Shared, mutable settings handle passed to every subcomponent of a session
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Read a copy of the current settings
    pub fn snapshot(&self) -> Settings {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Mutate the settings in place
    pub fn update<R>(&self, f: impl FnOnce(&mut Settings) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn idle_timeout(&self) -> Duration {
        self.snapshot().idle_timeout()
    }

    pub fn delay_between_events(&self) -> Duration {
        self.snapshot().delay_between_events()
    }

    pub fn multi_click_interval(&self) -> Duration {
        self.snapshot().multi_click_interval()
    }

    pub fn event_mode(&self) -> EventMode {
        self.snapshot().event_mode
    }

    pub fn lookup_scope(&self) -> ComponentLookupScope {
        self.snapshot().component_lookup_scope
    }

    pub fn component_delay(&self) -> Duration {
        self.snapshot().component_delay()
    }
}
