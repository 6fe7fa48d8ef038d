//! In-memory attempt store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use examguard_core::error::StoreError;
use examguard_core::model::ExamAttempt;
use examguard_core::traits::AttemptSink;

/// Keeps completed attempts in memory.
///
/// Clones share the same list, so a caller can keep a handle while the
/// session owns the boxed sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    attempts: Arc<Mutex<Vec<ExamAttempt>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ExamAttempt>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every stored attempt, in acceptance order.
    pub fn attempts(&self) -> Vec<ExamAttempt> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl AttemptSink for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn accept(&mut self, attempt: &ExamAttempt) -> Result<(), StoreError> {
        if !attempt.is_completed() {
            return Err(StoreError::Rejected(format!(
                "attempt {} is still in progress",
                attempt.id
            )));
        }
        let mut attempts = self.lock();
        if attempts.iter().any(|a| a.id == attempt.id) {
            return Err(StoreError::Rejected(format!(
                "attempt {} is already stored",
                attempt.id
            )));
        }
        attempts.push(attempt.clone());
        tracing::debug!(attempt_id = %attempt.id, total = attempts.len(), "attempt stored in memory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::completed_attempt;
    use examguard_core::model::AttemptStatus;

    #[test]
    fn clones_share_attempts() {
        let store = MemoryStore::new();
        let mut sink: Box<dyn AttemptSink> = Box::new(store.clone());
        assert!(store.is_empty());

        sink.accept(&completed_attempt("alice", 0)).unwrap();
        sink.accept(&completed_attempt("bob", 10)).unwrap();

        assert_eq!(store.len(), 2);
        let users: Vec<String> = store.attempts().into_iter().map(|a| a.user_id).collect();
        assert_eq!(users, ["alice", "bob"]);
    }

    #[test]
    fn rejects_in_progress_and_duplicate_attempts() {
        let mut store = MemoryStore::new();
        let attempt = completed_attempt("alice", 0);
        store.accept(&attempt).unwrap();
        assert!(matches!(
            store.accept(&attempt),
            Err(StoreError::Rejected(_))
        ));

        let mut running = completed_attempt("carol", 0);
        running.status = AttemptStatus::InProgress;
        running.outcome = None;
        let err = store.accept(&running).unwrap_err();
        assert!(err.to_string().contains("still in progress"));
        assert_eq!(store.len(), 1);
    }
}
