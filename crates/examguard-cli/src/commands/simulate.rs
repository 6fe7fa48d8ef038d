//! The `examguard simulate` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;

use examguard_core::clock::ManualClock;
use examguard_core::error::SessionError;
use examguard_core::host::HeadlessHost;
use examguard_core::model::{ExamAttempt, ExamRules, QuestionSet, Violation};
use examguard_core::monitor::{BlockedAction, IntegrityObserver, IntegrityState};
use examguard_core::parser;
use examguard_core::runtime::{self, ExamInput, TokioClock};
use examguard_core::session::{ExamSession, SessionConfig};
use examguard_core::simulate::{self, Script, ScriptAction};
use examguard_core::traits::{AttemptSink, Consent, ConsentGate};
use examguard_store::{create_store, load_config_from, StoreConfig};

pub struct SimulateArgs {
    pub question_set: PathBuf,
    pub script: PathBuf,
    pub user: String,
    pub config: Option<PathBuf>,
    pub store_dir: Option<PathBuf>,
    pub max_violations: Option<usize>,
    pub decline_rules: bool,
    pub realtime: bool,
    pub format: String,
}

/// Prints warnings the way a proctored exam page would show toasts.
struct ConsoleObserver;

impl IntegrityObserver for ConsoleObserver {
    fn on_violation(&self, violation: &Violation, state: &IntegrityState) {
        eprintln!(
            "  WARNING: {} ({}/{}, {} remaining)",
            violation.description,
            state.violation_count(),
            state.max_violations(),
            state.remaining()
        );
    }

    fn on_blocked(&self, action: BlockedAction) {
        eprintln!("  Blocked: {action}");
    }

    fn on_threshold(&self, count: usize) {
        eprintln!("  Violation limit reached after {count} violations, submitting exam");
    }
}

fn print_rules(rules: &ExamRules) {
    eprintln!("Exam rules for {}:", rules.course_id);
    eprintln!(
        "  {} questions, {} minute(s)",
        rules.total_questions,
        rules.duration_secs.div_ceil(60)
    );
    eprintln!(
        "  Fullscreen required: {}",
        if rules.fullscreen_required { "yes" } else { "no" }
    );
    eprintln!("  Monitored:");
    for kind in &rules.monitored {
        eprintln!("    - {}", kind.description());
    }
    eprintln!("  Blocked: {}", rules.blocked.join(", "));
    eprintln!(
        "  The exam is submitted automatically after {} violation(s).",
        rules.max_violations
    );
}

pub async fn execute(args: SimulateArgs) -> Result<()> {
    let mut config = load_config_from(args.config.as_deref())?;
    if let Some(max) = args.max_violations {
        config.proctoring.max_violations = max;
    }
    if let Some(dir) = &args.store_dir {
        config.store = StoreConfig::Json { dir: dir.clone() };
    }
    config.validate()?;

    let set = parser::parse_question_set(&args.question_set)?;
    for w in parser::validate_question_set(&set) {
        tracing::warn!(question = ?w.question_id, "{}", w.message);
    }
    let script = Script::load(&args.script)?;

    let session_config = config.to_session_config();
    let sink = create_store(&config.store);
    let store_name = sink.name().to_string();

    let decline = args.decline_rules;
    let mut gate = move |rules: &ExamRules| {
        print_rules(rules);
        if decline {
            eprintln!("Rules declined.");
            Consent::Declined
        } else {
            eprintln!("Rules accepted.\n");
            Consent::Accepted
        }
    };

    let result = if args.realtime {
        run_realtime(&args.user, &set, &script, session_config, sink, &mut gate).await
    } else {
        let clock = ManualClock::new(Utc::now());
        let mut session = ExamSession::new(
            HeadlessHost::new(),
            Arc::new(clock.clone()),
            sink,
            session_config,
        )
        .with_observer(Arc::new(ConsoleObserver));
        simulate::replay(&mut session, &clock, &script, &args.user, &set, &mut gate)
    };

    let attempt = match result {
        Ok(attempt) => attempt,
        Err(SessionError::ConsentDeclined) => {
            println!("No attempt was created: the proctoring rules were declined.");
            return Ok(());
        }
        Err(e) => return Err(e).context("exam session failed"),
    };

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&attempt)?),
        _ => print_attempt(&attempt, &store_name),
    }

    Ok(())
}

/// Feed the script to the async runtime on the wall clock.
async fn run_realtime(
    user: &str,
    set: &QuestionSet,
    script: &Script,
    config: SessionConfig,
    sink: Box<dyn AttemptSink>,
    gate: &mut dyn ConsentGate,
) -> Result<ExamAttempt, SessionError> {
    let mut session = ExamSession::new(
        HeadlessHost::new(),
        Arc::new(TokioClock::new()),
        sink,
        config,
    )
    .with_observer(Arc::new(ConsoleObserver));
    let duration_secs = script.duration_secs.unwrap_or(set.duration_secs);
    session.begin(user, &set.course_id, set.questions.clone(), duration_secs, gate)?;

    let mut steps = script.steps.clone();
    steps.sort_by_key(|s| s.at_ms);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let feeder = tokio::spawn(async move {
        let start = tokio::time::Instant::now();
        for step in steps {
            tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
            let input = match step.action {
                ScriptAction::Signal { event } => ExamInput::Signal(event),
                ScriptAction::Answer { question_id, value } => {
                    ExamInput::Answer { question_id, value }
                }
                ScriptAction::Submit => ExamInput::Submit,
            };
            if tx.send(input).is_err() {
                break;
            }
        }
    });

    let attempt = runtime::drive(&mut session, &mut rx).await;
    feeder.abort();
    attempt
}

fn print_attempt(attempt: &ExamAttempt, store_name: &str) {
    println!("Attempt {}", attempt.id);
    println!("  User:       {}", attempt.user_id);
    println!("  Course:     {}", attempt.course_id);

    let Some(outcome) = &attempt.outcome else {
        println!("  Status:     in progress");
        return;
    };

    println!(
        "  Score:      {}/{} ({:.2}%)",
        outcome.score, outcome.total_marks, outcome.percentage
    );
    println!(
        "  Answered:   {}/{}",
        outcome.answered_questions, outcome.total_questions
    );
    println!("  Violations: {}", outcome.violation_count);
    for v in &outcome.violations {
        let offset = v.timestamp.signed_duration_since(attempt.started_at);
        println!(
            "    +{:.1}s {} ({})",
            offset.num_milliseconds() as f64 / 1000.0,
            v.kind,
            v.description
        );
    }
    let mode = if outcome.auto_submitted {
        "automatic"
    } else {
        "manual"
    };
    println!("  Submitted:  {} ({mode})", outcome.submission_reason);
    let elapsed = outcome.submitted_at.signed_duration_since(attempt.started_at);
    println!(
        "  Duration:   {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    println!("Saved to {store_name} store.");
}
