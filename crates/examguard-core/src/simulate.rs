//! Deterministic replay of a scripted exam timeline.
//!
//! A script lists what the candidate and the host do, and when. [`replay`]
//! runs it against an [`ExamSession`] on a [`ManualClock`], interleaving the
//! one-second countdown ticks and the deferred forced submission the same
//! way the async runtime would, without any real waiting.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::clock::{duration_millis, ManualClock};
use crate::error::SessionError;
use crate::host::{HostEnvironment, HostEvent};
use crate::model::{ExamAttempt, QuestionSet};
use crate::session::{ExamSession, SessionState};
use crate::traits::ConsentGate;

const TICK_MS: u64 = 1000;

/// A scripted exam timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    /// Overrides the question set's duration.
    #[serde(default)]
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

/// One scripted action at an offset from the start of the attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Milliseconds after the attempt started.
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    /// A host signal reaches the monitor.
    Signal { event: HostEvent },
    /// The candidate answers a question.
    Answer { question_id: String, value: String },
    /// The candidate clicks submit.
    Submit,
}

impl Script {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse script TOML")
    }

    /// Load a script from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid script: {}", path.display()))
    }
}

/// What happens next on the timeline. Declaration order breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Next {
    Tick,
    ForcedSubmit,
    Step,
}

/// Begin an attempt on `set` at the clock's current instant and play
/// `script` until the attempt completes.
///
/// Steps run in `at_ms` order (stable for equal offsets). When the script
/// ends first, the countdown runs out.
pub fn replay<H: HostEnvironment>(
    session: &mut ExamSession<H>,
    clock: &ManualClock,
    script: &Script,
    user_id: &str,
    set: &QuestionSet,
    consent: &mut dyn ConsentGate,
) -> Result<ExamAttempt, SessionError> {
    let duration_secs = script.duration_secs.unwrap_or(set.duration_secs);
    session.begin(
        user_id,
        &set.course_id,
        set.questions.clone(),
        duration_secs,
        consent,
    )?;

    let mut steps: Vec<&ScriptStep> = script.steps.iter().collect();
    steps.sort_by_key(|s| s.at_ms);
    let mut steps = steps.into_iter().peekable();

    let forced_delay_ms = duration_millis(session.forced_submit_delay());
    let mut now_ms = 0u64;
    let mut next_tick = TICK_MS;
    let mut forced_at: Option<u64> = None;

    while session.state() == SessionState::InProgress {
        let tick_at = session.countdown().is_running().then_some(next_tick);
        let step_at = steps.peek().map(|s| s.at_ms);
        let next = [
            (tick_at, Next::Tick),
            (forced_at, Next::ForcedSubmit),
            (step_at, Next::Step),
        ]
        .into_iter()
        .filter_map(|(at, what)| at.map(|at| (at, what)))
        .min();

        let Some((at, what)) = next else {
            break;
        };
        if at > now_ms {
            clock.advance(Duration::from_millis(at - now_ms));
            now_ms = at;
        }

        match what {
            Next::Tick => {
                next_tick += TICK_MS;
                session.tick()?;
            }
            Next::ForcedSubmit => {
                forced_at = None;
                session.fire_forced_submit()?;
            }
            Next::Step => {
                let Some(step) = steps.next() else {
                    break;
                };
                tracing::debug!(at_ms = step.at_ms, action = ?step.action, "script step");
                match &step.action {
                    ScriptAction::Signal { event } => {
                        session.handle_event(event)?;
                    }
                    ScriptAction::Answer { question_id, value } => {
                        session.record_answer(question_id, value);
                    }
                    ScriptAction::Submit => {
                        session.submit()?;
                    }
                }
            }
        }

        if forced_at.is_none() && session.has_pending_forced_submit() {
            forced_at = Some(now_ms.saturating_add(forced_delay_ms));
        }
    }

    let skipped = steps.count();
    if skipped > 0 {
        tracing::debug!(skipped, "script steps after completion were not played");
    }

    session.attempt().cloned().ok_or(SessionError::NotStarted)
}
