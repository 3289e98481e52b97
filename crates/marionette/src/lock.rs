//! Process-wide screen session lock.
//!
//! There is exactly one physical pointer, keyboard and screen; independent
//! automation sessions in the same process must take turns. This is the
//! single sanctioned process-wide object in the crate; every other
//! registry is owned per session.

use crate::errors::AutomationError;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use tracing::debug;

static SCREEN_LOCK: Lazy<ScreenLock> = Lazy::new(|| ScreenLock {
    holder: Mutex::new(None),
    released: Condvar::new(),
});

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Token identifying one lock owner, usually one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOwner(u64);

impl LockOwner {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Mutual exclusion over the physical screen and input devices
pub struct ScreenLock {
    holder: Mutex<Option<LockOwner>>,
    released: Condvar,
}

impl ScreenLock {
    /// The process-wide instance
    pub fn instance() -> &'static ScreenLock {
        &SCREEN_LOCK
    }

    /// Block until the lock is free or already held by `owner`, then hold
    /// it for `owner`. Re-acquiring as the current holder is a no-op.
    pub fn acquire(&self, owner: LockOwner) {
        let mut holder = self.holder.lock().unwrap_or_else(|e| e.into_inner());
        while matches!(*holder, Some(current) if current != owner) {
            holder = self
                .released
                .wait(holder)
                .unwrap_or_else(|e| e.into_inner());
        }
        debug!(owner = owner.0, "screen lock acquired");
        *holder = Some(owner);
    }

    /// Release the lock. Only the current holder may release; anyone else
    /// gets [`AutomationError::ScreenLockViolation`].
    pub fn release(&self, owner: LockOwner) -> Result<(), AutomationError> {
        let mut holder = self.holder.lock().unwrap_or_else(|e| e.into_inner());
        match *holder {
            Some(current) if current == owner => {
                *holder = None;
                debug!(owner = owner.0, "screen lock released");
                self.released.notify_all();
                Ok(())
            }
            Some(current) => Err(AutomationError::ScreenLockViolation(format!(
                "owner {} attempted to release the screen lock held by {}",
                owner.0, current.0
            ))),
            None => Err(AutomationError::ScreenLockViolation(format!(
                "owner {} attempted to release the screen lock while it was not held",
                owner.0
            ))),
        }
    }

    /// Whether `owner` currently holds the lock
    pub fn is_held_by(&self, owner: LockOwner) -> bool {
        matches!(
            *self.holder.lock().unwrap_or_else(|e| e.into_inner()),
            Some(current) if current == owner
        )
    }
}
