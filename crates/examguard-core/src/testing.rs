//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::model::{ExamAttempt, Question, QuestionKind};
use crate::traits::AttemptSink;

/// Sink that keeps every accepted attempt; clones share the list.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    pub(crate) attempts: Arc<Mutex<Vec<ExamAttempt>>>,
}

impl RecordingSink {
    pub(crate) fn len(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl AttemptSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn accept(&mut self, attempt: &ExamAttempt) -> Result<(), StoreError> {
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }
}

pub(crate) fn question(id: &str, correct: &str, marks: u32) -> Question {
    Question {
        id: id.into(),
        prompt: format!("Question {id}"),
        kind: QuestionKind::MultipleChoice,
        options: vec!["A".into(), "B".into(), "C".into()],
        correct_answer: correct.into(),
        marks,
    }
}

/// Two questions worth 1 and 2 marks, answered "A" and "B".
pub(crate) fn sample_questions() -> Vec<Question> {
    vec![question("1", "A", 1), question("2", "B", 2)]
}
