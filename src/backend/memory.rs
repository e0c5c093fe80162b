//! In-process backend.
//!
//! Stores entities and quiz attempts in memory, records every call, and can
//! be told to fail specific calls. Used for offline demos and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::{AdminError, AdminResult};
use crate::models::{Answer, GradeRecord, GradingStatus, OverrideGrade, Payload, QuizAttempt, normalize_id};

use super::{Backend, ListFilter};

/// The kind of backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// [`Backend::create`].
    Create,
    /// [`Backend::update`].
    Update,
    /// [`Backend::get`].
    Get,
    /// [`Backend::list`].
    List,
    /// [`Backend::upsert`].
    Upsert,
    /// [`Backend::fetch_attempt`].
    FetchAttempt,
    /// [`Backend::save_question_grade`].
    SaveQuestionGrade,
    /// [`Backend::save_override`].
    SaveOverride,
    /// [`Backend::regrade`].
    Regrade,
}

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// The kind of call.
    pub operation: Operation,
    /// `resource`, `resource/id`, `attempt` or `attempt/question`.
    pub target: String,
    /// The JSON fields sent, if the call had a body.
    pub fields: Option<Map<String, Value>>,
    /// Whether the body carried a file.
    pub multipart: bool,
}

#[derive(Debug, Clone)]
struct FailureRule {
    operation: Operation,
    target: Option<String>,
    status: u16,
    message: String,
}

#[derive(Debug, Default)]
struct Inner {
    resources: BTreeMap<String, BTreeMap<String, Value>>,
    attempts: BTreeMap<String, QuizAttempt>,
    answer_keys: BTreeMap<(String, String), Value>,
    calls: Vec<Call>,
    failures: Vec<FailureRule>,
    next_id: u64,
}

/// A [`Backend`] that keeps its data in memory.
///
/// # Example
///
/// ```
/// use campus_admin::backend::{Backend, InMemoryBackend, Operation};
/// use campus_admin::models::Payload;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let backend = InMemoryBackend::new();
/// let fields = json!({"name": "Computer Science"}).as_object().unwrap().clone();
/// let created = backend.create("/academic/departments", Payload::json(fields)).await.unwrap();
/// assert!(created["id"].is_string());
/// assert_eq!(backend.calls_of(Operation::Create).len(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores an entity under `resource`. The entity must carry an `id`.
    pub fn insert(&self, resource: &str, entity: Value) {
        if let Some(id) = normalize_id(&entity) {
            self.lock()
                .resources
                .entry(resource.to_string())
                .or_default()
                .insert(id, entity);
        }
    }

    /// Stores a quiz attempt.
    pub fn insert_attempt(&self, attempt: QuizAttempt) {
        self.lock().attempts.insert(attempt.id.clone(), attempt);
    }

    /// Sets the correct response for an objective question, used by regrade.
    pub fn set_answer_key(&self, attempt_id: &str, question_id: &str, response: Value) {
        self.lock()
            .answer_keys
            .insert((attempt_id.to_string(), question_id.to_string()), response);
    }

    /// Makes every matching call fail with the given status and message.
    ///
    /// `target` narrows the rule to one resource path, `resource/id`,
    /// attempt id or `attempt/question`; `None` matches all targets.
    pub fn fail_on(
        &self,
        operation: Operation,
        target: Option<&str>,
        status: u16,
        message: impl Into<String>,
    ) {
        self.lock().failures.push(FailureRule {
            operation,
            target: target.map(str::to_string),
            status,
            message: message.into(),
        });
    }

    /// Removes all failure rules.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Returns the calls of one kind, in order.
    pub fn calls_of(&self, operation: Operation) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    /// Returns a stored entity.
    pub fn entity(&self, resource: &str, id: &str) -> Option<Value> {
        self.lock()
            .resources
            .get(resource)
            .and_then(|r| r.get(id))
            .cloned()
    }

    /// Returns a stored attempt.
    pub fn attempt(&self, attempt_id: &str) -> Option<QuizAttempt> {
        self.lock().attempts.get(attempt_id).cloned()
    }

    /// Records the call and applies failure rules.
    fn begin(
        inner: &mut Inner,
        operation: Operation,
        target: String,
        payload: Option<&Payload>,
    ) -> AdminResult<()> {
        let failure = inner
            .failures
            .iter()
            .find(|f| f.operation == operation && f.target.as_ref().is_none_or(|t| *t == target))
            .cloned();

        inner.calls.push(Call {
            operation,
            target,
            fields: payload.map(|p| p.fields.clone()),
            multipart: payload.is_some_and(Payload::is_multipart),
        });

        match failure {
            Some(rule) => Err(AdminError::Backend {
                status: rule.status,
                message: rule.message,
            }),
            None => Ok(()),
        }
    }

    fn not_found(what: &str) -> AdminError {
        AdminError::Backend {
            status: 404,
            message: format!("{what} not found"),
        }
    }

    /// Merges payload fields into `entity`, storing a file by its name.
    fn apply(entity: &mut Map<String, Value>, payload: Payload) {
        entity.extend(payload.fields);
        if let Some((field, attachment)) = payload.attachment {
            entity.insert(field, Value::String(attachment.file_name));
        }
    }

    fn recompute_total(attempt: &mut QuizAttempt) {
        attempt.total_score = Some(
            attempt
                .answers
                .iter()
                .filter_map(|a| a.points_awarded)
                .sum::<Decimal>(),
        );
        attempt.status = GradingStatus::Graded;
        attempt.updated_at = Some(Utc::now());
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn create(&self, resource: &str, payload: Payload) -> AdminResult<Value> {
        let mut inner = self.lock();
        Self::begin(&mut inner, Operation::Create, resource.to_string(), Some(&payload))?;

        inner.next_id += 1;
        let id = payload
            .get("id")
            .and_then(normalize_id)
            .unwrap_or_else(|| format!("mem_{}", inner.next_id));

        let mut entity = Map::new();
        Self::apply(&mut entity, payload);
        entity.insert("id".to_string(), Value::String(id.clone()));
        let entity = Value::Object(entity);

        inner
            .resources
            .entry(resource.to_string())
            .or_default()
            .insert(id, entity.clone());
        Ok(entity)
    }

    async fn update(&self, resource: &str, id: &str, payload: Payload) -> AdminResult<Value> {
        let mut inner = self.lock();
        Self::begin(
            &mut inner,
            Operation::Update,
            format!("{resource}/{id}"),
            Some(&payload),
        )?;

        let entity = inner
            .resources
            .get_mut(resource)
            .and_then(|r| r.get_mut(id))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| Self::not_found(resource))?;
        Self::apply(entity, payload);
        Ok(Value::Object(entity.clone()))
    }

    async fn get(&self, resource: &str, id: &str) -> AdminResult<Value> {
        let mut inner = self.lock();
        Self::begin(&mut inner, Operation::Get, format!("{resource}/{id}"), None)?;

        inner
            .resources
            .get(resource)
            .and_then(|r| r.get(id))
            .cloned()
            .ok_or_else(|| Self::not_found(resource))
    }

    async fn list(&self, resource: &str, filter: &ListFilter) -> AdminResult<Vec<Value>> {
        let mut inner = self.lock();
        Self::begin(&mut inner, Operation::List, resource.to_string(), None)?;

        let matches = |entity: &Value| {
            filter
                .pairs()
                .all(|(field, expected)| normalize_id(&entity[field]).as_deref() == Some(expected))
        };

        Ok(inner
            .resources
            .get(resource)
            .map(|r| r.values().filter(|e| matches(e)).cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, resource: &str, key: &str, payload: Payload) -> AdminResult<Value> {
        let mut inner = self.lock();
        Self::begin(
            &mut inner,
            Operation::Upsert,
            format!("{resource}/{key}"),
            Some(&payload),
        )?;

        let slot = inner
            .resources
            .entry(resource.to_string())
            .or_default()
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(entity) = slot.as_object_mut() {
            Self::apply(entity, payload);
            entity
                .entry("id".to_string())
                .or_insert_with(|| Value::String(key.to_string()));
        }
        Ok(slot.clone())
    }

    async fn fetch_attempt(&self, attempt_id: &str) -> AdminResult<QuizAttempt> {
        let mut inner = self.lock();
        Self::begin(&mut inner, Operation::FetchAttempt, attempt_id.to_string(), None)?;

        inner
            .attempts
            .get(attempt_id)
            .cloned()
            .ok_or_else(|| Self::not_found("Quiz attempt"))
    }

    async fn save_question_grade(
        &self,
        attempt_id: &str,
        question_id: &str,
        grade: &GradeRecord,
    ) -> AdminResult<()> {
        let mut inner = self.lock();
        Self::begin(
            &mut inner,
            Operation::SaveQuestionGrade,
            format!("{attempt_id}/{question_id}"),
            None,
        )?;

        let attempt = inner
            .attempts
            .get_mut(attempt_id)
            .ok_or_else(|| Self::not_found("Quiz attempt"))?;
        if attempt.question(question_id).is_none() {
            return Err(Self::not_found("Question"));
        }

        match attempt.answers.iter_mut().find(|a| a.question_id == question_id) {
            Some(answer) => {
                answer.points_awarded = Some(grade.points);
                answer.feedback = Some(grade.feedback.clone());
            }
            None => attempt.answers.push(Answer {
                question_id: question_id.to_string(),
                response: Value::Null,
                points_awarded: Some(grade.points),
                feedback: Some(grade.feedback.clone()),
                is_correct: None,
            }),
        }
        Self::recompute_total(attempt);
        Ok(())
    }

    async fn save_override(
        &self,
        attempt_id: &str,
        grade: &OverrideGrade,
    ) -> AdminResult<QuizAttempt> {
        let mut inner = self.lock();
        Self::begin(&mut inner, Operation::SaveOverride, attempt_id.to_string(), None)?;

        let attempt = inner
            .attempts
            .get_mut(attempt_id)
            .ok_or_else(|| Self::not_found("Quiz attempt"))?;
        attempt.override_score = Some(grade.total);
        attempt.override_feedback = Some(grade.feedback.clone());
        attempt.status = GradingStatus::Graded;
        attempt.updated_at = Some(Utc::now());
        Ok(attempt.clone())
    }

    async fn regrade(&self, attempt_id: &str) -> AdminResult<QuizAttempt> {
        let mut inner = self.lock();
        Self::begin(&mut inner, Operation::Regrade, attempt_id.to_string(), None)?;

        let Inner {
            attempts,
            answer_keys,
            ..
        } = &mut *inner;
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| Self::not_found("Quiz attempt"))?;

        let objective: Vec<(String, Decimal)> = attempt
            .questions
            .iter()
            .filter(|q| q.kind.is_objective())
            .map(|q| (q.id.clone(), q.max_points))
            .collect();

        for (question_id, max_points) in objective {
            let Some(key) = answer_keys.get(&(attempt_id.to_string(), question_id.clone())) else {
                continue;
            };
            if let Some(answer) = attempt
                .answers
                .iter_mut()
                .find(|a| a.question_id == question_id)
            {
                let correct = answer.response == *key;
                answer.is_correct = Some(correct);
                answer.points_awarded = Some(if correct { max_points } else { Decimal::ZERO });
            }
        }

        Self::recompute_total(attempt);
        Ok(attempt.clone())
    }
}
