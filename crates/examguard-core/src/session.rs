//! Exam session state machine.
//!
//! ```text
//!   NotStarted ──begin──▶ InProgress ──finalize──▶ Completed
//!                              │  ▲
//!            user submit ──────┤  │
//!            timer expiry ─────┤  └── answers, host signals, ticks
//!            max violations ───┘
//! ```
//!
//! Every path to `Completed` goes through [`ExamSession::finalize`], which
//! acts only on the first call. It stops the countdown and deactivates the
//! monitor before doing anything that can fail.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::clock::{duration_millis, Clock};
use crate::error::SessionError;
use crate::host::{HostEnvironment, HostEvent};
use crate::model::{
    AttemptOutcome, AttemptStatus, ExamAttempt, ExamRules, Question, QuestionSet,
    SubmissionReason, Violation, ViolationKind,
};
use crate::monitor::{
    EventDisposition, IntegrityMonitor, IntegrityObserver, MonitorConfig, BLOCKED_ACTIONS,
    DEFAULT_MAX_VIOLATIONS,
};
use crate::scoring;
use crate::traits::{AttemptSink, Consent, ConsentGate};

/// Configuration for an exam session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Violations that force submission.
    pub max_violations: usize,
    /// Pause between reaching the threshold and the forced submission, so the
    /// last warning stays visible. Zero submits immediately.
    pub forced_submit_delay: Duration,
    pub monitor: MonitorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_violations: DEFAULT_MAX_VIOLATIONS,
            forced_submit_delay: Duration::from_millis(2000),
            monitor: MonitorConfig::default(),
        }
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    InProgress,
    Completed,
}

/// Whole-second countdown. Cancelling is permanent.
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    remaining_secs: u64,
    running: bool,
}

impl Countdown {
    fn start(&mut self, secs: u64) {
        self.remaining_secs = secs;
        self.running = true;
    }

    /// Advance one second. `None` once stopped.
    fn tick(&mut self) -> Option<u64> {
        if !self.running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.running = false;
        }
        Some(self.remaining_secs)
    }

    fn cancel(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No countdown is running.
    Idle,
    /// Seconds left after this tick.
    Remaining(u64),
    /// The countdown hit zero and the attempt was finalized.
    Expired,
}

/// Result of a finalize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeStatus {
    /// This call completed the attempt.
    Submitted(SubmissionReason),
    /// An earlier call already completed it; nothing changed.
    AlreadyFinalized,
    /// No attempt exists yet.
    NotStarted,
}

/// Drives one timed exam attempt.
pub struct ExamSession<H: HostEnvironment> {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    monitor: IntegrityMonitor<H>,
    sink: Box<dyn AttemptSink>,
    questions: Vec<Question>,
    attempt: Option<ExamAttempt>,
    countdown: Countdown,
    threshold_tx: mpsc::Sender<Vec<Violation>>,
    threshold_rx: mpsc::Receiver<Vec<Violation>>,
    pending_forced_submit: Option<Vec<Violation>>,
}

impl<H: HostEnvironment> ExamSession<H> {
    pub fn new(
        host: H,
        clock: Arc<dyn Clock>,
        sink: Box<dyn AttemptSink>,
        config: SessionConfig,
    ) -> Self {
        let monitor = IntegrityMonitor::new(host, Arc::clone(&clock), config.monitor.clone());
        let (threshold_tx, threshold_rx) = mpsc::channel();
        Self {
            config,
            clock,
            monitor,
            sink,
            questions: Vec::new(),
            attempt: None,
            countdown: Countdown::default(),
            threshold_tx,
            threshold_rx,
            pending_forced_submit: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IntegrityObserver>) -> Self {
        self.monitor = self.monitor.with_observer(observer);
        self
    }

    /// The rules a candidate must accept for this exam.
    pub fn rules(&self, course_id: &str, total_questions: usize, duration_secs: u64) -> ExamRules {
        ExamRules {
            course_id: course_id.to_string(),
            duration_secs,
            total_questions,
            max_violations: self.config.max_violations,
            fullscreen_required: self.config.monitor.require_fullscreen,
            monitored: ViolationKind::ALL.to_vec(),
            blocked: BLOCKED_ACTIONS.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Start an attempt once the candidate accepts the rules.
    ///
    /// Consent is collected first: a declined gate creates no attempt and
    /// never starts the monitor.
    pub fn begin(
        &mut self,
        user_id: &str,
        course_id: &str,
        questions: Vec<Question>,
        duration_secs: u64,
        consent: &mut dyn ConsentGate,
    ) -> Result<Uuid, SessionError> {
        if let Some(attempt) = &self.attempt {
            return Err(if attempt.is_completed() {
                SessionError::AlreadyCompleted(attempt.id)
            } else {
                SessionError::AttemptInProgress(attempt.id)
            });
        }

        let rules = self.rules(course_id, questions.len(), duration_secs);
        if consent.review(&rules) == Consent::Declined {
            tracing::info!(user_id, course_id, "proctoring rules declined");
            return Err(SessionError::ConsentDeclined);
        }

        if questions.is_empty() {
            tracing::warn!(course_id, "starting exam with no questions");
        }

        let attempt = ExamAttempt::start(user_id, course_id, self.clock.now());
        let attempt_id = attempt.id;
        self.questions = questions;
        self.attempt = Some(attempt);
        self.countdown.start(duration_secs);

        let tx = self.threshold_tx.clone();
        self.monitor.activate(
            self.config.max_violations,
            Box::new(move |violations: Vec<Violation>| {
                // the receiver lives as long as the session
                let _ = tx.send(violations);
            }),
        );

        tracing::info!(%attempt_id, user_id, course_id, duration_secs, "exam attempt started");

        if duration_secs == 0 {
            let violations = self.monitor.snapshot();
            self.finalize(SubmissionReason::TimerExpired, violations)?;
        }
        Ok(attempt_id)
    }

    /// [`begin`](Self::begin) with the course, questions and duration of a set.
    pub fn begin_set(
        &mut self,
        user_id: &str,
        set: &QuestionSet,
        consent: &mut dyn ConsentGate,
    ) -> Result<Uuid, SessionError> {
        self.begin(
            user_id,
            &set.course_id,
            set.questions.clone(),
            set.duration_secs,
            consent,
        )
    }

    /// Store or overwrite an answer. Returns `false` when no attempt is in
    /// progress.
    pub fn record_answer(&mut self, question_id: &str, value: &str) -> bool {
        match self.attempt.as_mut() {
            Some(attempt) if !attempt.is_completed() => {
                attempt
                    .answers
                    .insert(question_id.to_string(), value.to_string());
                true
            }
            _ => {
                tracing::debug!(question_id, "answer ignored, no attempt in progress");
                false
            }
        }
    }

    /// Feed a host event to the monitor and react to a threshold crossing.
    pub fn handle_event(&mut self, event: &HostEvent) -> Result<EventDisposition, SessionError> {
        let disposition = self.monitor.handle_event(event);
        self.collect_threshold()?;
        Ok(disposition)
    }

    fn collect_threshold(&mut self) -> Result<(), SessionError> {
        let Ok(violations) = self.threshold_rx.try_recv() else {
            return Ok(());
        };
        if self.state() != SessionState::InProgress {
            return Ok(());
        }
        if self.config.forced_submit_delay.is_zero() {
            self.finalize(SubmissionReason::MaxViolations, violations)?;
        } else {
            tracing::info!(
                delay_ms = duration_millis(self.config.forced_submit_delay),
                "forced submission scheduled"
            );
            self.pending_forced_submit = Some(violations);
        }
        Ok(())
    }

    /// Whether a threshold crossing is waiting for its delayed submission.
    pub fn has_pending_forced_submit(&self) -> bool {
        self.pending_forced_submit.is_some()
    }

    pub fn forced_submit_delay(&self) -> Duration {
        self.config.forced_submit_delay
    }

    /// Run the delayed forced submission. Returns `false` if nothing was
    /// pending, e.g. because the candidate submitted during the delay.
    pub fn fire_forced_submit(&mut self) -> Result<bool, SessionError> {
        match self.pending_forced_submit.take() {
            Some(violations) => {
                let status = self.finalize(SubmissionReason::MaxViolations, violations)?;
                Ok(matches!(status, FinalizeStatus::Submitted(_)))
            }
            None => Ok(false),
        }
    }

    /// Advance the countdown by one second, finalizing on expiry.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        if self.state() != SessionState::InProgress {
            return Ok(TickOutcome::Idle);
        }
        match self.countdown.tick() {
            None => Ok(TickOutcome::Idle),
            Some(0) => {
                let violations = self.monitor.snapshot();
                self.finalize(SubmissionReason::TimerExpired, violations)?;
                Ok(TickOutcome::Expired)
            }
            Some(remaining) => Ok(TickOutcome::Remaining(remaining)),
        }
    }

    /// The candidate pressed submit.
    pub fn submit(&mut self) -> Result<FinalizeStatus, SessionError> {
        let violations = self.monitor.snapshot();
        self.finalize(SubmissionReason::UserSubmitted, violations)
    }

    /// Complete the attempt. Only the first call on an in-progress attempt
    /// has any effect.
    ///
    /// The countdown and the monitor are stopped before the attempt is handed
    /// to the store; a store failure leaves the attempt completed and is
    /// returned as [`SessionError::Persist`].
    pub fn finalize(
        &mut self,
        reason: SubmissionReason,
        violations: Vec<Violation>,
    ) -> Result<FinalizeStatus, SessionError> {
        let Some(attempt) = self.attempt.as_mut() else {
            tracing::debug!(%reason, "finalize ignored, no attempt");
            return Ok(FinalizeStatus::NotStarted);
        };
        if attempt.is_completed() {
            tracing::debug!(%reason, attempt_id = %attempt.id, "attempt already finalized");
            return Ok(FinalizeStatus::AlreadyFinalized);
        }

        self.countdown.cancel();
        self.pending_forced_submit = None;
        self.monitor.deactivate();

        let grade = scoring::grade(&attempt.answers, &self.questions);
        let violation_count = violations.len();
        attempt.outcome = Some(AttemptOutcome {
            submitted_at: self.clock.now(),
            score: grade.score,
            total_marks: grade.total_marks,
            percentage: grade.percentage,
            answered_questions: grade.answered_questions,
            total_questions: grade.total_questions,
            violations,
            violation_count,
            auto_submitted: reason.is_automatic(),
            submission_reason: reason,
        });
        attempt.status = AttemptStatus::Completed;

        tracing::info!(
            attempt_id = %attempt.id,
            %reason,
            score = grade.score,
            total_marks = grade.total_marks,
            percentage = grade.percentage,
            violations = violation_count,
            "attempt finalized"
        );

        if let Err(e) = self.sink.accept(attempt) {
            tracing::error!(attempt_id = %attempt.id, store = self.sink.name(), "failed to persist attempt: {e}");
            return Err(e.into());
        }
        Ok(FinalizeStatus::Submitted(reason))
    }

    pub fn state(&self) -> SessionState {
        match &self.attempt {
            None => SessionState::NotStarted,
            Some(a) if a.is_completed() => SessionState::Completed,
            Some(_) => SessionState::InProgress,
        }
    }

    pub fn attempt(&self) -> Option<&ExamAttempt> {
        self.attempt.as_ref()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn monitor(&self) -> &IntegrityMonitor<H> {
        &self.monitor
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
