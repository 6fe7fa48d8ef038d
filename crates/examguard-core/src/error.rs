//! Session and persistence error types.
//!
//! Ordering races (late answers, a second finalize, signals after the monitor
//! stopped) are expected in an event-driven host and are reported through
//! return values, not through these errors.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while driving an exam session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `begin` was called while an attempt is still running.
    #[error("attempt {0} is already in progress")]
    AttemptInProgress(Uuid),

    /// `begin` was called on a session whose attempt already finished.
    #[error("attempt {0} has already been completed")]
    AlreadyCompleted(Uuid),

    /// The operation needs an attempt and none was started.
    #[error("no exam attempt has been started")]
    NotStarted,

    /// The candidate did not accept the proctoring rules.
    #[error("proctoring rules were declined, no attempt was created")]
    ConsentDeclined,

    /// The completed attempt could not be handed to the store.
    #[error("failed to persist attempt: {0}")]
    Persist(#[from] StoreError),
}

/// Errors raised by an [`AttemptSink`](crate::traits::AttemptSink).
///
/// Defined here so the session can wrap them without knowing which store
/// is plugged in.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The attempt could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The store refused the record.
    #[error("attempt rejected: {0}")]
    Rejected(String),
}

impl SessionError {
    /// Returns `true` if the error is an ordering problem on the caller's side
    /// rather than a failure of a collaborator.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            SessionError::AttemptInProgress(_)
                | SessionError::AlreadyCompleted(_)
                | SessionError::NotStarted
                | SessionError::ConsentDeclined
        )
    }
}
