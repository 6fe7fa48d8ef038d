//! Async event loop for a live exam.
//!
//! [`drive`] owns the one-second countdown interval and the one-shot forced
//! submission timer, and feeds candidate input into the session until the
//! attempt completes. Each branch runs to completion before the next is
//! polled, so the session's own status check is the only synchronization
//! needed between the three ways an attempt can end.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::clock::Clock;
use crate::error::SessionError;
use crate::host::{HostEnvironment, HostEvent};
use crate::model::ExamAttempt;
use crate::session::{ExamSession, SessionState, TickOutcome};

/// Something the candidate or the host did.
#[derive(Debug, Clone)]
pub enum ExamInput {
    Signal(HostEvent),
    Answer { question_id: String, value: String },
    Submit,
}

/// Clock that follows tokio's timer, including paused test time.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: DateTime<Utc>,
    start: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            start: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}

const TICK: Duration = Duration::from_secs(1);

/// Run a started session until its attempt completes.
///
/// When `inputs` closes the loop keeps running on the countdown alone.
/// Returns a copy of the completed attempt.
pub async fn drive<H: HostEnvironment>(
    session: &mut ExamSession<H>,
    inputs: &mut mpsc::UnboundedReceiver<ExamInput>,
) -> Result<ExamAttempt, SessionError> {
    let mut ticker = time::interval_at(Instant::now() + TICK, TICK);
    let mut forced_deadline: Option<Instant> = None;
    let mut inputs_open = true;

    while session.state() == SessionState::InProgress {
        tokio::select! {
            biased;

            _ = ticker.tick() => {
                if let TickOutcome::Remaining(secs) = session.tick()? {
                    tracing::trace!(secs, "countdown tick");
                }
            }
            _ = time::sleep_until(forced_deadline.unwrap_or_else(Instant::now)), if forced_deadline.is_some() => {
                forced_deadline = None;
                session.fire_forced_submit()?;
            }
            input = inputs.recv(), if inputs_open => match input {
                Some(ExamInput::Signal(event)) => {
                    session.handle_event(&event)?;
                }
                Some(ExamInput::Answer { question_id, value }) => {
                    session.record_answer(&question_id, &value);
                }
                Some(ExamInput::Submit) => {
                    session.submit()?;
                }
                None => {
                    tracing::debug!("input channel closed, waiting for the countdown");
                    inputs_open = false;
                }
            },
        }

        if forced_deadline.is_none() && session.has_pending_forced_submit() {
            forced_deadline = Some(Instant::now() + session.forced_submit_delay());
        }
    }

    session.attempt().cloned().ok_or(SessionError::NotStarted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;
    use crate::model::SubmissionReason;
    use crate::session::SessionConfig;
    use crate::testing::{sample_questions, RecordingSink};
    use crate::traits::{AutoConsent, Consent};
    use std::sync::Arc;

    fn session(sink: &RecordingSink, duration_secs: u64) -> ExamSession<HeadlessHost> {
        let mut session = ExamSession::new(
            HeadlessHost::new(),
            Arc::new(TokioClock::new()),
            Box::new(sink.clone()),
            SessionConfig::default(),
        );
        session
            .begin(
                "user-1",
                "course-1",
                sample_questions(),
                duration_secs,
                &mut AutoConsent(Consent::Accepted),
            )
            .unwrap();
        session
    }

    fn elapsed_ms(attempt: &ExamAttempt) -> i64 {
        let submitted = attempt.submitted_at().unwrap();
        submitted
            .signed_duration_since(attempt.started_at)
            .num_milliseconds()
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_submits_once() {
        let sink = RecordingSink::default();
        let mut session = session(&sink, 1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(tx);

        let attempt = drive(&mut session, &mut rx).await.unwrap();
        let outcome = attempt.outcome.as_ref().unwrap();
        assert_eq!(outcome.submission_reason, SubmissionReason::TimerExpired);
        assert!(outcome.auto_submitted);
        assert_eq!(outcome.violation_count, 0);
        assert_eq!(elapsed_ms(&attempt), 1000);
        assert_eq!(sink.len(), 1);
        assert!(!session.countdown().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_submits_after_delay() {
        let sink = RecordingSink::default();
        let mut session = session(&sink, 600);
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            tx.send(ExamInput::Answer {
                question_id: "1".into(),
                value: "A".into(),
            })
            .unwrap();
            tx.send(ExamInput::Signal(HostEvent::VisibilityChanged { hidden: true }))
                .unwrap();
            time::sleep(Duration::from_millis(2500)).await;
            tx.send(ExamInput::Signal(HostEvent::WindowBlur)).unwrap();
            time::sleep(Duration::from_millis(2000)).await;
            tx.send(ExamInput::Signal(HostEvent::FullscreenChanged { fullscreen: false }))
                .unwrap();
            // keep the channel open past the forced submission
            time::sleep(Duration::from_secs(60)).await;
        });

        let attempt = drive(&mut session, &mut rx).await.unwrap();
        let outcome = attempt.outcome.as_ref().unwrap();
        assert_eq!(outcome.submission_reason, SubmissionReason::MaxViolations);
        assert!(outcome.auto_submitted);
        assert_eq!(outcome.violation_count, 3);
        assert_eq!(outcome.score, 1);
        assert_eq!(elapsed_ms(&attempt), 6500);
        assert_eq!(session.monitor().host().live_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_during_delay_window_wins() {
        let sink = RecordingSink::default();
        let mut session = session(&sink, 600);
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for event in [
                HostEvent::WindowBlur,
                HostEvent::VisibilityChanged { hidden: true },
                HostEvent::VisibilityChanged { hidden: false },
            ] {
                tx.send(ExamInput::Signal(event)).unwrap();
                time::sleep(Duration::from_millis(1100)).await;
            }
            // threshold was reached at 2.2s; forced submission would land at 4.2s
            tx.send(ExamInput::Submit).unwrap();
            time::sleep(Duration::from_secs(60)).await;
        });

        let attempt = drive(&mut session, &mut rx).await.unwrap();
        let outcome = attempt.outcome.as_ref().unwrap();
        assert_eq!(outcome.submission_reason, SubmissionReason::UserSubmitted);
        assert!(!outcome.auto_submitted);
        assert_eq!(outcome.violation_count, 3);
        assert_eq!(elapsed_ms(&attempt), 3300);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_signals_count_once() {
        let sink = RecordingSink::default();
        let mut session = session(&sink, 600);
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            tx.send(ExamInput::Signal(HostEvent::VisibilityChanged { hidden: true }))
                .unwrap();
            time::sleep(Duration::from_millis(500)).await;
            tx.send(ExamInput::Signal(HostEvent::WindowBlur)).unwrap();
            time::sleep(Duration::from_millis(100)).await;
            tx.send(ExamInput::Submit).unwrap();
        });

        let attempt = drive(&mut session, &mut rx).await.unwrap();
        let outcome = attempt.outcome.as_ref().unwrap();
        assert_eq!(outcome.violation_count, 1);
        assert_eq!(outcome.violations[0].kind.to_string(), "tab_switch");
    }

    #[tokio::test(start_paused = true)]
    async fn submit_racing_expiry_finalizes_exactly_once() {
        let sink = RecordingSink::default();
        let mut session = session(&sink, 1);
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            let _ = tx.send(ExamInput::Submit);
        });

        let attempt = drive(&mut session, &mut rx).await.unwrap();
        let outcome = attempt.outcome.as_ref().unwrap();
        assert!(matches!(
            outcome.submission_reason,
            SubmissionReason::TimerExpired | SubmissionReason::UserSubmitted
        ));
        assert_eq!(
            outcome.auto_submitted,
            outcome.submission_reason == SubmissionReason::TimerExpired
        );
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unstarted_session_is_an_error() {
        let sink = RecordingSink::default();
        let mut session = ExamSession::new(
            HeadlessHost::new(),
            Arc::new(TokioClock::new()),
            Box::new(sink.clone()),
            SessionConfig::default(),
        );
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let err = drive(&mut session, &mut rx).await.unwrap_err();
        assert!(matches!(err, SessionError::NotStarted));
    }
}
