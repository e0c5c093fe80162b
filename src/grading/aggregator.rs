//! Per-question grade entry and aggregation for one quiz attempt.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::context::SessionContext;
use crate::error::{AdminError, AdminResult};
use crate::models::{GradeRecord, GradingStatus, OverrideGrade, QuizAttempt};

/// A snapshot of an attempt's grading state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingSummary {
    /// The attempt id.
    pub attempt_id: String,
    /// The status reported by the backend.
    pub status: GradingStatus,
    /// Sum of the held per-question points.
    #[serde(with = "rust_decimal::serde::float")]
    pub aggregate_total: Decimal,
    /// Sum of the questions' maximum points.
    #[serde(with = "rust_decimal::serde::float")]
    pub max_points: Decimal,
    /// The manual override, if one was saved.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub override_score: Option<Decimal>,
    /// The override if set, otherwise the aggregate.
    #[serde(with = "rust_decimal::serde::float")]
    pub final_score: Decimal,
    /// Number of questions with a held grade.
    pub graded_questions: usize,
    /// Number of questions in the attempt.
    pub total_questions: usize,
    /// Questions whose points fall outside `[0, max_points]`.
    pub out_of_range: Vec<String>,
}

/// Holds one attempt and the grades entered for it.
///
/// Grades live in memory until saved. Points are not clamped: the backend
/// decides what it accepts, and out-of-range entries are only reported.
/// Every successful save replaces the local state with the backend's copy,
/// so concurrent graders overwrite each other (last write wins).
#[derive(Debug, Clone)]
pub struct GradingAggregator {
    context: SessionContext,
    attempt: QuizAttempt,
    grades: BTreeMap<String, GradeRecord>,
}

impl GradingAggregator {
    /// Wraps an attempt, seeding grades from the points already awarded.
    ///
    /// Only roles that can grade are accepted.
    pub fn new(context: SessionContext, attempt: QuizAttempt) -> AdminResult<Self> {
        if !context.role.can_grade() {
            return Err(AdminError::Forbidden {
                role: context.role,
                action: "grade quiz attempts".to_string(),
            });
        }

        let grades = Self::seed(&attempt);
        Ok(Self {
            context,
            attempt,
            grades,
        })
    }

    /// Fetches an attempt and wraps it.
    pub async fn load(
        backend: &dyn Backend,
        context: SessionContext,
        attempt_id: &str,
    ) -> AdminResult<Self> {
        if !context.role.can_grade() {
            return Err(AdminError::Forbidden {
                role: context.role,
                action: "grade quiz attempts".to_string(),
            });
        }
        let attempt = backend.fetch_attempt(attempt_id).await?;
        Self::new(context, attempt)
    }

    fn seed(attempt: &QuizAttempt) -> BTreeMap<String, GradeRecord> {
        attempt
            .answers
            .iter()
            .filter(|a| attempt.question(&a.question_id).is_some())
            .filter_map(|a| {
                a.points_awarded.map(|points| {
                    (
                        a.question_id.clone(),
                        GradeRecord {
                            points,
                            feedback: a.feedback.clone().unwrap_or_default(),
                        },
                    )
                })
            })
            .collect()
    }

    /// Replaces all local state with the backend's copy of the attempt.
    fn replace(&mut self, attempt: QuizAttempt) {
        debug!(
            attempt = %attempt.id,
            status = ?attempt.status,
            "Grading state refreshed"
        );
        self.grades = Self::seed(&attempt);
        self.attempt = attempt;
    }

    /// The attempt as last seen from the backend.
    pub fn attempt(&self) -> &QuizAttempt {
        &self.attempt
    }

    /// The held grade for a question.
    pub fn grade(&self, question_id: &str) -> Option<&GradeRecord> {
        self.grades.get(question_id)
    }

    /// Records points and feedback for a question, in memory only.
    pub fn set_question_grade(
        &mut self,
        question_id: &str,
        points: Decimal,
        feedback: impl Into<String>,
    ) -> AdminResult<()> {
        let question =
            self.attempt
                .question(question_id)
                .ok_or_else(|| AdminError::UnknownQuestion {
                    question_id: question_id.to_string(),
                })?;

        if points < Decimal::ZERO || points > question.max_points {
            warn!(
                attempt = %self.attempt.id,
                question = question_id,
                points = %points,
                max_points = %question.max_points,
                "Points outside the question's range"
            );
        }

        self.grades.insert(
            question_id.to_string(),
            GradeRecord {
                points,
                feedback: feedback.into(),
            },
        );
        Ok(())
    }

    /// Held grades in question order.
    fn ordered_grades(&self) -> Vec<(String, GradeRecord)> {
        self.attempt
            .questions
            .iter()
            .filter_map(|q| self.grades.get(&q.id).map(|g| (q.id.clone(), g.clone())))
            .collect()
    }

    /// Question ids whose held points fall outside `[0, max_points]`.
    pub fn out_of_range(&self) -> Vec<String> {
        self.attempt
            .questions
            .iter()
            .filter(|q| {
                self.grades
                    .get(&q.id)
                    .is_some_and(|g| g.points < Decimal::ZERO || g.points > q.max_points)
            })
            .map(|q| q.id.clone())
            .collect()
    }

    /// Sum of the held per-question points.
    pub fn aggregate_total(&self) -> Decimal {
        self.grades.values().map(|g| g.points).sum()
    }

    /// The override score if one is set, otherwise the aggregate.
    pub fn final_score(&self) -> Decimal {
        self.attempt
            .override_score
            .unwrap_or_else(|| self.aggregate_total())
    }

    /// Saves one question's grade, then refreshes from the backend.
    pub async fn save_question_grade(
        &mut self,
        backend: &dyn Backend,
        question_id: &str,
    ) -> AdminResult<()> {
        let grade = self
            .grades
            .get(question_id)
            .cloned()
            .ok_or_else(|| AdminError::NoGradeRecorded {
                question_id: question_id.to_string(),
            })?;

        backend
            .save_question_grade(&self.attempt.id, question_id, &grade)
            .await?;
        info!(
            attempt = %self.attempt.id,
            question = question_id,
            grader = %self.context.actor_id,
            points = %grade.points,
            "Question grade saved"
        );

        let refreshed = backend.fetch_attempt(&self.attempt.id).await?;
        self.replace(refreshed);
        Ok(())
    }

    /// Saves every held grade, one call per question in question order.
    ///
    /// A failed save does not stop the remaining ones, and saves that
    /// succeeded stay committed. All failures are reported together as one
    /// [`AdminError::GradeBatchFailed`]. The attempt is refreshed when at
    /// least one save went through; grades that failed to save are kept
    /// locally for a retry. Returns the number of grades saved.
    pub async fn save_all_grades(&mut self, backend: &dyn Backend) -> AdminResult<usize> {
        let grades = self.ordered_grades();
        let attempted = grades.len();
        let mut failed = Vec::new();

        for (question_id, grade) in &grades {
            if let Err(e) = backend
                .save_question_grade(&self.attempt.id, question_id, grade)
                .await
            {
                warn!(
                    attempt = %self.attempt.id,
                    question = %question_id,
                    error = %e,
                    "Question grade not saved"
                );
                failed.push(question_id.clone());
            }
        }

        let saved = attempted - failed.len();
        info!(
            attempt = %self.attempt.id,
            grader = %self.context.actor_id,
            saved,
            failed = failed.len(),
            "Bulk grade save finished"
        );

        if saved > 0 {
            match backend.fetch_attempt(&self.attempt.id).await {
                Ok(refreshed) => self.replace(refreshed),
                Err(e) if failed.is_empty() => return Err(e),
                Err(e) => warn!(attempt = %self.attempt.id, error = %e, "Refresh failed"),
            }
        }

        // Unsaved entries stay held so they can be retried.
        for (question_id, grade) in grades {
            if failed.contains(&question_id) {
                self.grades.insert(question_id, grade);
            }
        }

        if failed.is_empty() {
            Ok(saved)
        } else {
            Err(AdminError::GradeBatchFailed { failed, attempted })
        }
    }

    /// Sets the attempt's final score, independent of the question points.
    pub async fn save_override(
        &mut self,
        backend: &dyn Backend,
        total: Decimal,
        feedback: impl Into<String>,
    ) -> AdminResult<()> {
        let grade = OverrideGrade {
            total,
            feedback: feedback.into(),
        };
        let updated = backend.save_override(&self.attempt.id, &grade).await?;
        info!(
            attempt = %self.attempt.id,
            grader = %self.context.actor_id,
            total = %total,
            "Override score saved"
        );
        self.replace(updated);
        Ok(())
    }

    /// Asks the backend to recompute objective grades.
    pub async fn regrade(&mut self, backend: &dyn Backend) -> AdminResult<()> {
        let updated = backend.regrade(&self.attempt.id).await?;
        info!(
            attempt = %self.attempt.id,
            grader = %self.context.actor_id,
            "Attempt regraded"
        );
        self.replace(updated);
        Ok(())
    }

    /// Summarizes the current grading state.
    pub fn summary(&self) -> GradingSummary {
        GradingSummary {
            attempt_id: self.attempt.id.clone(),
            status: self.attempt.status,
            aggregate_total: self.aggregate_total(),
            max_points: self.attempt.max_points(),
            override_score: self.attempt.override_score,
            final_score: self.final_score(),
            graded_questions: self.grades.len(),
            total_questions: self.attempt.questions.len(),
            out_of_range: self.out_of_range(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryBackend, Operation};
    use crate::context::Role;
    use crate::models::{Answer, Question, QuestionKind};
    use serde_json::json;

    fn teacher() -> SessionContext {
        SessionContext::new("usr_teacher", Role::Teacher)
    }

    fn question(id: &str, kind: QuestionKind, max: i64) -> Question {
        Question {
            id: id.to_string(),
            prompt: format!("Question {id}"),
            kind,
            max_points: Decimal::from(max),
        }
    }

    fn answer(question_id: &str, response: serde_json::Value) -> Answer {
        Answer {
            question_id: question_id.to_string(),
            response,
            points_awarded: None,
            feedback: None,
            is_correct: None,
        }
    }

    fn attempt() -> QuizAttempt {
        QuizAttempt {
            id: "att_1".to_string(),
            quiz: None,
            student: None,
            status: GradingStatus::PendingReview,
            questions: vec![
                question("q1", QuestionKind::ShortAnswer, 5),
                question("q2", QuestionKind::Essay, 10),
                question("q3", QuestionKind::TrueFalse, 1),
            ],
            answers: vec![
                answer("q1", json!("borrowing")),
                answer("q2", json!("An essay")),
                answer("q3", json!(true)),
            ],
            total_score: None,
            override_score: None,
            override_feedback: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_moderator_cannot_grade() {
        let context = SessionContext::new("usr_mod", Role::Moderator);
        let result = GradingAggregator::new(context, attempt());
        assert!(matches!(result, Err(AdminError::Forbidden { .. })));
    }

    #[test]
    fn test_seeds_from_awarded_points() {
        let mut attempt = attempt();
        attempt.answers[2].points_awarded = Some(Decimal::ONE);
        attempt.answers[2].feedback = Some("Auto".to_string());

        let grading = GradingAggregator::new(teacher(), attempt).unwrap();
        assert_eq!(grading.aggregate_total(), Decimal::ONE);
        assert_eq!(grading.grade("q3").unwrap().feedback, "Auto");
        assert!(grading.grade("q1").is_none());
    }

    #[test]
    fn test_unknown_question_rejected() {
        let mut grading = GradingAggregator::new(teacher(), attempt()).unwrap();
        let result = grading.set_question_grade("q9", Decimal::ONE, "");
        assert!(matches!(result, Err(AdminError::UnknownQuestion { .. })));
    }

    #[test]
    fn test_out_of_range_points_are_kept_and_reported() {
        let mut grading = GradingAggregator::new(teacher(), attempt()).unwrap();
        grading.set_question_grade("q1", Decimal::from(7), "Extra credit").unwrap();
        grading.set_question_grade("q2", Decimal::from(-1), "Penalty").unwrap();
        grading.set_question_grade("q3", Decimal::ONE, "").unwrap();

        assert_eq!(grading.aggregate_total(), Decimal::from(7));
        assert_eq!(grading.out_of_range(), vec!["q1", "q2"]);
    }

    #[test]
    fn test_final_score_prefers_override() {
        let mut attempt = attempt();
        attempt.override_score = Some(Decimal::from(12));
        let mut grading = GradingAggregator::new(teacher(), attempt).unwrap();
        grading.set_question_grade("q1", Decimal::from(3), "").unwrap();

        assert_eq!(grading.aggregate_total(), Decimal::from(3));
        assert_eq!(grading.final_score(), Decimal::from(12));
    }

    #[tokio::test]
    async fn test_save_question_grade_refreshes() {
        let backend = InMemoryBackend::new();
        backend.insert_attempt(attempt());
        let mut grading = GradingAggregator::load(&backend, teacher(), "att_1").await.unwrap();

        grading.set_question_grade("q2", Decimal::from(8), "Well argued").unwrap();
        grading.save_question_grade(&backend, "q2").await.unwrap();

        assert_eq!(grading.attempt().status, GradingStatus::Graded);
        assert_eq!(grading.attempt().total_score, Some(Decimal::from(8)));
        assert_eq!(backend.calls_of(Operation::FetchAttempt).len(), 2);
    }

    #[tokio::test]
    async fn test_save_without_grade_is_error() {
        let backend = InMemoryBackend::new();
        let mut grading = GradingAggregator::new(teacher(), attempt()).unwrap();
        let result = grading.save_question_grade(&backend, "q1").await;
        assert!(matches!(result, Err(AdminError::NoGradeRecorded { .. })));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_save_all_continues_after_failure() {
        let backend = InMemoryBackend::new();
        backend.insert_attempt(attempt());
        backend.fail_on(Operation::SaveQuestionGrade, Some("att_1/q2"), 500, "Write conflict");

        let mut grading = GradingAggregator::new(teacher(), attempt()).unwrap();
        grading.set_question_grade("q1", Decimal::from(4), "").unwrap();
        grading.set_question_grade("q2", Decimal::from(6), "").unwrap();
        grading.set_question_grade("q3", Decimal::ONE, "").unwrap();

        let result = grading.save_all_grades(&backend).await;
        match result {
            Err(AdminError::GradeBatchFailed { failed, attempted }) => {
                assert_eq!(failed, vec!["q2"]);
                assert_eq!(attempted, 3);
            }
            other => panic!("Expected GradeBatchFailed, got {:?}", other),
        }

        let targets: Vec<String> = backend
            .calls_of(Operation::SaveQuestionGrade)
            .into_iter()
            .map(|c| c.target)
            .collect();
        assert_eq!(targets, vec!["att_1/q1", "att_1/q2", "att_1/q3"]);

        assert_eq!(grading.attempt().total_score, Some(Decimal::from(5)));
        assert_eq!(grading.grade("q2").unwrap().points, Decimal::from(6));
        assert_eq!(grading.aggregate_total(), Decimal::from(11));

        backend.clear_failures();
        grading.save_question_grade(&backend, "q2").await.unwrap();
        assert_eq!(grading.attempt().total_score, Some(Decimal::from(11)));
    }

    #[tokio::test]
    async fn test_save_all_success_returns_count() {
        let backend = InMemoryBackend::new();
        backend.insert_attempt(attempt());
        let mut grading = GradingAggregator::new(teacher(), attempt()).unwrap();
        grading.set_question_grade("q1", Decimal::from(5), "").unwrap();
        grading.set_question_grade("q2", Decimal::from(9), "").unwrap();

        assert_eq!(grading.save_all_grades(&backend).await.unwrap(), 2);
        assert_eq!(grading.summary().aggregate_total, Decimal::from(14));
    }

    #[tokio::test]
    async fn test_override_is_independent_of_sum() {
        let backend = InMemoryBackend::new();
        backend.insert_attempt(attempt());
        let mut grading = GradingAggregator::new(teacher(), attempt()).unwrap();
        grading.set_question_grade("q1", Decimal::from(5), "").unwrap();
        grading.save_question_grade(&backend, "q1").await.unwrap();

        grading
            .save_override(&backend, Decimal::from(2), "Late submission")
            .await
            .unwrap();

        let summary = grading.summary();
        assert_eq!(summary.aggregate_total, Decimal::from(5));
        assert_eq!(summary.override_score, Some(Decimal::from(2)));
        assert_eq!(summary.final_score, Decimal::from(2));
        assert_eq!(summary.max_points, Decimal::from(16));
    }

    #[tokio::test]
    async fn test_regrade_replaces_state() {
        let backend = InMemoryBackend::new();
        backend.insert_attempt(attempt());
        backend.set_answer_key("att_1", "q3", json!(true));
        let mut grading = GradingAggregator::new(teacher(), attempt()).unwrap();

        grading.regrade(&backend).await.unwrap();

        assert_eq!(grading.attempt().answer("q3").unwrap().is_correct, Some(true));
        assert_eq!(grading.grade("q3").unwrap().points, Decimal::ONE);
        assert_eq!(grading.summary().graded_questions, 1);
    }

    #[test]
    fn test_summary_serializes_numbers() {
        let grading = GradingAggregator::new(teacher(), attempt()).unwrap();
        let json = serde_json::to_value(grading.summary()).unwrap();
        assert_eq!(json["max_points"], json!(16.0));
        assert_eq!(json["override_score"], json!(null));
        assert_eq!(json["status"], json!("pending_review"));
    }
}
