//! Exact-match grading.
//!
//! An answer earns a question's marks only when it is byte-for-byte equal to
//! the question's `correct_answer`. There is no partial credit and no
//! whitespace or case folding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Question;

/// Result of grading one set of answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub score: u32,
    pub total_marks: u32,
    /// `score / total_marks * 100`, rounded to two decimals. Zero when the
    /// question set carries no marks.
    pub percentage: f64,
    /// Number of answer entries, including empty strings.
    pub answered_questions: usize,
    pub total_questions: usize,
}

/// Grade `answers` against `questions`.
pub fn grade(answers: &BTreeMap<String, String>, questions: &[Question]) -> Grade {
    let total_marks: u32 = questions.iter().map(|q| q.marks).sum();
    let score: u32 = questions
        .iter()
        .filter(|q| answers.get(&q.id).is_some_and(|a| *a == q.correct_answer))
        .map(|q| q.marks)
        .sum();

    Grade {
        score,
        total_marks,
        percentage: percentage(score, total_marks),
        answered_questions: answers.len(),
        total_questions: questions.len(),
    }
}

/// Percentage rounded to two decimal places; `0.0` for an empty total.
pub fn percentage(score: u32, total_marks: u32) -> f64 {
    if total_marks == 0 {
        return 0.0;
    }
    let raw = f64::from(score) / f64::from(total_marks) * 100.0;
    (raw * 100.0).round() / 100.0
}
