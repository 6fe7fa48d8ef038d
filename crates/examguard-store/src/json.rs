//! Directory of JSON attempt files.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use examguard_core::error::StoreError;
use examguard_core::model::ExamAttempt;
use examguard_core::traits::AttemptSink;

const FILE_PREFIX: &str = "attempt-";

/// Writes each completed attempt to `<dir>/attempt-<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// The directory is created on the first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File an attempt with this id is stored under.
    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}.json"))
    }

    /// Save an attempt as pretty-printed JSON, replacing any earlier copy.
    pub fn save(&self, attempt: &ExamAttempt) -> Result<PathBuf, StoreError> {
        let json = serde_json::to_string_pretty(attempt)?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(attempt.id);
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Load one attempt file.
    pub fn load(path: &Path) -> Result<ExamAttempt, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Every attempt in the directory, oldest start first.
    ///
    /// A missing directory holds no attempts. Files not named
    /// `attempt-*.json` are ignored.
    pub fn load_all(&self) -> Result<Vec<ExamAttempt>, StoreError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut attempts = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_attempt = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(".json"));
            if is_attempt {
                attempts.push(Self::load(&path)?);
            }
        }
        attempts.sort_by_key(|a| (a.started_at, a.id));
        Ok(attempts)
    }
}

impl AttemptSink for JsonFileStore {
    fn name(&self) -> &str {
        "json"
    }

    fn accept(&mut self, attempt: &ExamAttempt) -> Result<(), StoreError> {
        if !attempt.is_completed() {
            return Err(StoreError::Rejected(format!(
                "attempt {} is still in progress",
                attempt.id
            )));
        }
        let path = self.save(attempt)?;
        tracing::info!(attempt_id = %attempt.id, path = %path.display(), "attempt saved");
        Ok(())
    }
}
