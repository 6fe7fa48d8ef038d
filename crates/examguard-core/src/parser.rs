//! TOML question set parser.
//!
//! Loads question sets from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{default_duration, Question, QuestionKind, QuestionSet};

/// Intermediate TOML structure for parsing question set files.
#[derive(Debug, Deserialize)]
struct TomlQuestionFile {
    question_set: TomlQuestionSetHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestionSetHeader {
    id: String,
    course_id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_duration")]
    duration_secs: u64,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    prompt: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    correct_answer: String,
    #[serde(default = "default_marks")]
    marks: u32,
}

fn default_marks() -> u32 {
    1
}

/// Parse a single TOML file into a `QuestionSet`.
pub fn parse_question_set(path: &Path) -> Result<QuestionSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question set file: {}", path.display()))?;

    parse_question_set_str(&content, path)
}

/// Parse a TOML string into a `QuestionSet`.
pub fn parse_question_set_str(content: &str, source_path: &Path) -> Result<QuestionSet> {
    let parsed: TomlQuestionFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let kind: QuestionKind = match q.kind {
                Some(k) => k
                    .parse()
                    .map_err(|e: String| anyhow::anyhow!("question {}: {}", q.id, e))?,
                None => QuestionKind::default(),
            };
            // true/false questions need no explicit options
            let options = if kind == QuestionKind::TrueFalse && q.options.is_empty() {
                vec!["true".to_string(), "false".to_string()]
            } else {
                q.options
            };

            Ok(Question {
                id: q.id,
                prompt: q.prompt,
                kind,
                options,
                correct_answer: q.correct_answer,
                marks: q.marks,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionSet {
        id: parsed.question_set.id,
        course_id: parsed.question_set.course_id,
        name: parsed.question_set.name,
        description: parsed.question_set.description,
        duration_secs: parsed.question_set.duration_secs,
        questions,
    })
}

/// Recursively load all `.toml` question set files from a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_question_directory(dir: &Path) -> Result<Vec<QuestionSet>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            sets.extend(load_question_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_question_set(&path) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(sets)
}

/// A warning from question set validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    pub message: String,
}

impl ValidationWarning {
    fn question(id: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a question set for common authoring mistakes.
pub fn validate_question_set(set: &QuestionSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if set.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "question set has no questions, every attempt scores 0%".into(),
        });
    }
    if set.duration_secs == 0 {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "duration_secs is 0, attempts expire as soon as they start".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for q in &set.questions {
        if !seen_ids.insert(q.id.as_str()) {
            warnings.push(ValidationWarning::question(
                &q.id,
                format!("duplicate question ID: {}", q.id),
            ));
        }
        if q.prompt.trim().is_empty() {
            warnings.push(ValidationWarning::question(&q.id, "prompt is empty"));
        }
        if q.marks == 0 {
            warnings.push(ValidationWarning::question(&q.id, "question is worth 0 marks"));
        }
        let needs_option = matches!(q.kind, QuestionKind::MultipleChoice | QuestionKind::TrueFalse);
        if needs_option && !q.options.contains(&q.correct_answer) {
            warnings.push(ValidationWarning::question(
                &q.id,
                format!("correct answer {:?} is not one of the options", q.correct_answer),
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[question_set]
id = "rust-basics"
course_id = "rust-101"
name = "Rust Basics"
description = "Ownership and borrowing"
duration_secs = 900

[[questions]]
id = "q1"
prompt = "Which keyword makes a binding mutable?"
options = ["let", "mut", "ref"]
correct_answer = "mut"
marks = 2

[[questions]]
id = "q2"
prompt = "A `&mut T` may coexist with a `&T` to the same value."
kind = "true_false"
correct_answer = "false"

[[questions]]
id = "q3"
prompt = "Name the trait used for `{}` formatting."
kind = "short-answer"
correct_answer = "Display"
"#;

    #[test]
    fn parse_valid_toml() {
        let set = parse_question_set_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(set.id, "rust-basics");
        assert_eq!(set.course_id, "rust-101");
        assert_eq!(set.duration_secs, 900);
        assert_eq!(set.questions.len(), 3);
        assert_eq!(set.questions[0].kind, QuestionKind::MultipleChoice);
        assert_eq!(set.questions[0].marks, 2);
        assert_eq!(set.questions[1].kind, QuestionKind::TrueFalse);
        assert_eq!(set.questions[1].options, vec!["true", "false"]);
        assert_eq!(set.questions[1].marks, 1);
        assert_eq!(set.questions[2].kind, QuestionKind::ShortAnswer);
        assert_eq!(set.total_marks(), 4);
        assert!(validate_question_set(&set).is_empty());
    }

    #[test]
    fn parse_missing_optional_fields() {
        let toml = r#"
[question_set]
id = "minimal"
course_id = "c"
name = "Minimal"
"#;
        let set = parse_question_set_str(toml, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(set.duration_secs, 600);
        assert!(set.questions.is_empty());
        assert!(set.description.is_empty());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let toml = r#"
[question_set]
id = "bad"
course_id = "c"
name = "Bad"

[[questions]]
id = "q1"
prompt = "?"
kind = "essay"
correct_answer = "x"
"#;
        let err = parse_question_set_str(toml, &PathBuf::from("test.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("unknown question kind"));
    }

    #[test]
    fn validate_reports_authoring_mistakes() {
        let toml = r#"
[question_set]
id = "dupes"
course_id = "c"
name = "Dupes"

[[questions]]
id = "same"
prompt = "First"
options = ["a", "b"]
correct_answer = "c"

[[questions]]
id = "same"
prompt = "  "
kind = "short_answer"
correct_answer = "x"
marks = 0
"#;
        let set = parse_question_set_str(toml, &PathBuf::from("test.toml")).unwrap();
        let warnings = validate_question_set(&set);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate")));
        assert!(warnings.iter().any(|w| w.message.contains("not one of the options")));
        assert!(warnings.iter().any(|w| w.message == "prompt is empty"));
        assert!(warnings.iter().any(|w| w.message.contains("0 marks")));
        assert_eq!(warnings.len(), 4);
    }

    #[test]
    fn validate_empty_set() {
        let toml = "[question_set]\nid = \"e\"\ncourse_id = \"c\"\nname = \"Empty\"\n";
        let set = parse_question_set_str(toml, &PathBuf::from("test.toml")).unwrap();
        let warnings = validate_question_set(&set);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].question_id.is_none());
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_question_set_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory_recurses_and_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("basics.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not = [valid").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(
            nested.join("other.toml"),
            VALID_TOML.replace("rust-basics", "rust-advanced"),
        )
        .unwrap();

        let sets = load_question_directory(dir.path()).unwrap();
        let ids: Vec<&str> = sets.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["rust-basics", "rust-advanced"]);
    }

    #[test]
    fn load_directory_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("set.toml");
        std::fs::write(&file, VALID_TOML).unwrap();
        assert!(load_question_directory(&file).is_err());
    }
}
