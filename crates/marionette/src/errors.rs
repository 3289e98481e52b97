use thiserror::Error;

/// Errors that can occur during automation operations
#[derive(Error, Debug)]
pub enum AutomationError {
    /// A component lookup matched zero components, or more than one.
    ///
    /// The message carries the criteria description, every ambiguous match
    /// when there were several, and optionally a dump of the searched
    /// hierarchy when there were none.
    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    /// An input-simulation action could not be validated or performed:
    /// a queue blocked by a modal popup, an invalid key code, a missing
    /// window ancestor, a failed focus change.
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// A bounded wait (window readiness, submit-and-wait rendezvous)
    /// exceeded its timeout.
    #[error("Wait timed out: {0}")]
    WaitTimedOut(String),

    /// A screen-lock release was attempted by a caller that does not
    /// currently hold the lock.
    #[error("Screen lock violation: {0}")]
    ScreenLockViolation(String),

    /// An argument was outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A failure raised by the underlying toolkit boundary
    #[error("Platform error: {0}")]
    PlatformError(String),
}
