//! Core data model types for examguard.
//!
//! Questions and question sets are immutable inputs to a session. Violations
//! and attempts are produced by the session and handed to the store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single exam question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within its question set.
    pub id: String,
    /// Text shown to the candidate.
    pub prompt: String,
    /// How the answer is captured.
    #[serde(default)]
    pub kind: QuestionKind,
    /// Choices for multiple-choice and true/false questions.
    #[serde(default)]
    pub options: Vec<String>,
    /// The only answer that earns marks. Compared byte-for-byte.
    pub correct_answer: String,
    /// Marks awarded for a correct answer.
    #[serde(default = "default_marks")]
    pub marks: u32,
}

fn default_marks() -> u32 {
    1
}

/// Supported answer-capture styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::MultipleChoice => write!(f, "multiple_choice"),
            QuestionKind::TrueFalse => write!(f, "true_false"),
            QuestionKind::ShortAnswer => write!(f, "short_answer"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "multiple_choice" | "mcq" => Ok(QuestionKind::MultipleChoice),
            "true_false" | "boolean" => Ok(QuestionKind::TrueFalse),
            "short_answer" | "text" => Ok(QuestionKind::ShortAnswer),
            other => Err(format!("unknown question kind: {other}")),
        }
    }
}

/// The questions of one course exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSet {
    /// Unique identifier for this question set.
    pub id: String,
    /// Course the exam belongs to.
    pub course_id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Time allowed for one attempt.
    #[serde(default = "default_duration")]
    pub duration_secs: u64,
    #[serde(default)]
    pub questions: Vec<Question>,
}

pub(crate) fn default_duration() -> u64 {
    600
}

impl QuestionSet {
    /// Sum of marks over every question.
    pub fn total_marks(&self) -> u32 {
        self.questions.iter().map(|q| q.marks).sum()
    }
}

/// Classification of a suspicious host signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TabSwitch,
    WindowBlur,
    TabReturn,
    MouseExit,
    FullscreenExit,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 5] = [
        ViolationKind::TabSwitch,
        ViolationKind::WindowBlur,
        ViolationKind::TabReturn,
        ViolationKind::MouseExit,
        ViolationKind::FullscreenExit,
    ];

    /// Fixed human-readable description recorded with every violation.
    pub fn description(self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "Switched to another tab or minimized the window",
            ViolationKind::WindowBlur => "Exam window lost focus",
            ViolationKind::TabReturn => "Returned to the exam after leaving it",
            ViolationKind::MouseExit => "Mouse pointer left the exam window",
            ViolationKind::FullscreenExit => "Exited fullscreen mode",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::TabSwitch => write!(f, "tab_switch"),
            ViolationKind::WindowBlur => write!(f, "window_blur"),
            ViolationKind::TabReturn => write!(f, "tab_return"),
            ViolationKind::MouseExit => write!(f, "mouse_exit"),
            ViolationKind::FullscreenExit => write!(f, "fullscreen_exit"),
        }
    }
}

impl FromStr for ViolationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViolationKind::ALL
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| format!("unknown violation type: {s}"))
    }
}

/// One accepted integrity violation. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl Violation {
    pub fn new(kind: ViolationKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            description: kind.description().to_string(),
            timestamp,
        }
    }
}

/// Lifecycle of an attempt. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

/// Why an attempt was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionReason {
    UserSubmitted,
    TimerExpired,
    MaxViolations,
}

impl SubmissionReason {
    /// Anything other than the candidate pressing submit is automatic.
    pub fn is_automatic(self) -> bool {
        self != SubmissionReason::UserSubmitted
    }
}

impl fmt::Display for SubmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionReason::UserSubmitted => write!(f, "user-submitted"),
            SubmissionReason::TimerExpired => write!(f, "timer-expired"),
            SubmissionReason::MaxViolations => write!(f, "max-violations"),
        }
    }
}

/// One candidate's run through a question set.
///
/// The outcome is absent while the attempt is in progress and is written
/// exactly once when the session finalizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAttempt {
    pub id: Uuid,
    pub user_id: String,
    pub course_id: String,
    pub started_at: DateTime<Utc>,
    pub status: AttemptStatus,
    /// Question id → answer value.
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(flatten)]
    pub outcome: Option<AttemptOutcome>,
}

impl ExamAttempt {
    pub(crate) fn start(user_id: &str, course_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            started_at,
            status: AttemptStatus::InProgress,
            answers: BTreeMap::new(),
            outcome: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    /// Time of submission, if finalized.
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.outcome.as_ref().map(|o| o.submitted_at)
    }
}

/// Frozen scoring and integrity record of a completed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutcome {
    pub submitted_at: DateTime<Utc>,
    pub score: u32,
    pub total_marks: u32,
    pub percentage: f64,
    pub answered_questions: usize,
    pub total_questions: usize,
    pub violations: Vec<Violation>,
    /// Always `violations.len()`.
    pub violation_count: usize,
    pub auto_submitted: bool,
    pub submission_reason: SubmissionReason,
}

/// What the candidate is asked to accept before the monitor starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamRules {
    pub course_id: String,
    pub duration_secs: u64,
    pub total_questions: usize,
    pub max_violations: usize,
    pub fullscreen_required: bool,
    /// Behaviours that count toward the violation budget.
    pub monitored: Vec<ViolationKind>,
    /// Actions that are blocked without counting.
    pub blocked: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_kind_display_and_parse() {
        for kind in ViolationKind::ALL {
            assert_eq!(kind.to_string().parse::<ViolationKind>().unwrap(), kind);
        }
        assert_eq!(ViolationKind::FullscreenExit.to_string(), "fullscreen_exit");
        assert!("copy".parse::<ViolationKind>().is_err());
    }

    #[test]
    fn question_kind_parse_aliases() {
        assert_eq!(
            "multiple-choice".parse::<QuestionKind>().unwrap(),
            QuestionKind::MultipleChoice
        );
        assert_eq!("boolean".parse::<QuestionKind>().unwrap(), QuestionKind::TrueFalse);
        assert_eq!("Text".parse::<QuestionKind>().unwrap(), QuestionKind::ShortAnswer);
        assert!("essay".parse::<QuestionKind>().is_err());
    }

    #[test]
    fn violation_uses_fixed_description() {
        let v = Violation::new(ViolationKind::WindowBlur, Utc::now());
        assert_eq!(v.description, "Exam window lost focus");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], "window_blur");
    }

    #[test]
    fn in_progress_attempt_serializes_without_outcome() {
        let attempt = ExamAttempt::start("u1", "c1", Utc::now());
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["status"], "in-progress");
        assert!(json.get("score").is_none());
        assert!(attempt.submitted_at().is_none());
    }

    #[test]
    fn completed_attempt_flattens_outcome() {
        let now = Utc::now();
        let mut attempt = ExamAttempt::start("u1", "c1", now);
        attempt.status = AttemptStatus::Completed;
        attempt.outcome = Some(AttemptOutcome {
            submitted_at: now,
            score: 1,
            total_marks: 3,
            percentage: 33.33,
            answered_questions: 2,
            total_questions: 2,
            violations: vec![],
            violation_count: 0,
            auto_submitted: true,
            submission_reason: SubmissionReason::TimerExpired,
        });
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["submissionReason"], "timer-expired");
        assert_eq!(json["totalMarks"], 3);
        assert_eq!(json["autoSubmitted"], true);

        let back: ExamAttempt = serde_json::from_value(json).unwrap();
        assert_eq!(back.outcome.unwrap().score, 1);
    }

    #[test]
    fn question_set_total_marks() {
        let set = QuestionSet {
            id: "s".into(),
            course_id: "c".into(),
            name: "S".into(),
            description: String::new(),
            duration_secs: 60,
            questions: vec![],
        };
        assert_eq!(set.total_marks(), 0);
    }
}
