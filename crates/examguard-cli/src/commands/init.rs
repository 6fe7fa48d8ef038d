//! The `examguard init` command.

use std::path::Path;

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("examguard.toml"), SAMPLE_CONFIG)?;
    write_if_missing(Path::new("question-sets/example.toml"), EXAMPLE_QUESTION_SET)?;
    write_if_missing(Path::new("scripts/example.toml"), EXAMPLE_SCRIPT)?;

    println!("\nNext steps:");
    println!("  1. Edit examguard.toml to tune the violation budget and store");
    println!("  2. Run: examguard validate --question-set question-sets/example.toml");
    println!(
        "  3. Run: examguard simulate --question-set question-sets/example.toml --script scripts/example.toml"
    );

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examguard configuration

[proctoring]
max_violations = 3
debounce_ms = 1000
forced_submit_delay_ms = 2000
require_fullscreen = true

[store]
kind = "json"
dir = "./examguard-attempts"
"#;

const EXAMPLE_QUESTION_SET: &str = r#"[question_set]
id = "example"
course_id = "example-course"
name = "Example Quiz"
description = "A short quiz to try examguard"
duration_secs = 300

[[questions]]
id = "capital"
prompt = "What is the capital of France?"
options = ["Berlin", "Paris", "Madrid"]
correct_answer = "Paris"

[[questions]]
id = "even"
prompt = "Is 7 an even number?"
kind = "true_false"
correct_answer = "false"

[[questions]]
id = "planet"
prompt = "Which planet is closest to the sun?"
kind = "short_answer"
correct_answer = "Mercury"
marks = 2
"#;

const EXAMPLE_SCRIPT: &str = r#"# Offsets are milliseconds after the attempt starts.

[[steps]]
at_ms = 2000
action = "answer"
question_id = "capital"
value = "Paris"

[[steps]]
at_ms = 5000
action = "signal"
event = { type = "visibility_changed", hidden = true }

[[steps]]
at_ms = 9000
action = "signal"
event = { type = "visibility_changed", hidden = false }

[[steps]]
at_ms = 12000
action = "answer"
question_id = "even"
value = "false"

[[steps]]
at_ms = 15000
action = "submit"
"#;
