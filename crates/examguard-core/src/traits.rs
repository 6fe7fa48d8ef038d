//! Seams to the collaborators around an exam session.
//!
//! The store that keeps completed attempts lives in `examguard-store`; the
//! consent screen belongs to whatever UI hosts the exam.

use crate::error::StoreError;
use crate::model::{ExamAttempt, ExamRules};

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Receives every attempt once it is completed.
pub trait AttemptSink: Send {
    /// Human-readable store name (e.g. "json").
    fn name(&self) -> &str;

    /// Keep a completed attempt.
    fn accept(&mut self, attempt: &ExamAttempt) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Consent
// ---------------------------------------------------------------------------

/// The candidate's answer to the proctoring rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    Accepted,
    Declined,
}

/// Shows the rules and collects consent before an attempt starts.
pub trait ConsentGate {
    fn review(&mut self, rules: &ExamRules) -> Consent;
}

/// A gate that gives the same answer every time.
#[derive(Debug, Clone, Copy)]
pub struct AutoConsent(pub Consent);

impl ConsentGate for AutoConsent {
    fn review(&mut self, _: &ExamRules) -> Consent {
        self.0
    }
}

impl<F> ConsentGate for F
where
    F: FnMut(&ExamRules) -> Consent,
{
    fn review(&mut self, rules: &ExamRules) -> Consent {
        self(rules)
    }
}
