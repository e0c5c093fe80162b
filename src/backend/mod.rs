//! Access to the REST backend.
//!
//! The [`Backend`] trait is the only way wizards, the grading view and the
//! gateway talk to the outside world. [`RestBackend`] speaks HTTP;
//! [`InMemoryBackend`] keeps everything in process.

mod memory;
mod rest;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AdminResult;
use crate::models::{GradeRecord, OverrideGrade, Payload, QuizAttempt};

pub use memory::{Call, InMemoryBackend, Operation};
pub use rest::RestBackend;

/// Query parameters for list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter(BTreeMap<String, String>);

impl ListFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns the conditions in field order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true if there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resource and grading calls against the backend.
///
/// Entity shapes belong to the backend, so resource calls exchange plain
/// JSON; grading calls are typed.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Creates an entity under `resource`.
    async fn create(&self, resource: &str, payload: Payload) -> AdminResult<Value>;

    /// Updates the entity `id` under `resource`.
    async fn update(&self, resource: &str, id: &str, payload: Payload) -> AdminResult<Value>;

    /// Fetches the entity `id` under `resource`.
    async fn get(&self, resource: &str, id: &str) -> AdminResult<Value>;

    /// Lists the entities under `resource` matching `filter`.
    async fn list(&self, resource: &str, filter: &ListFilter) -> AdminResult<Vec<Value>>;

    /// Creates or replaces the record `key` under `resource`.
    async fn upsert(&self, resource: &str, key: &str, payload: Payload) -> AdminResult<Value>;

    /// Fetches a quiz attempt with its questions and answers.
    async fn fetch_attempt(&self, attempt_id: &str) -> AdminResult<QuizAttempt>;

    /// Saves the grade for one question of an attempt.
    async fn save_question_grade(
        &self,
        attempt_id: &str,
        question_id: &str,
        grade: &GradeRecord,
    ) -> AdminResult<()>;

    /// Sets the attempt's final score, independent of question points.
    async fn save_override(&self, attempt_id: &str, grade: &OverrideGrade)
    -> AdminResult<QuizAttempt>;

    /// Recomputes automatic grades for objective questions.
    async fn regrade(&self, attempt_id: &str) -> AdminResult<QuizAttempt>;
}
