//! Quiz attempt and grading models.
//!
//! A [`QuizAttempt`] is one student's submitted answers as returned by the
//! backend. Instructors record a [`GradeRecord`] per question and may set an
//! [`OverrideGrade`] that supersedes the per-question sum.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reference::{Identified, Ref};

/// Grading status of an attempt. Owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingStatus {
    /// Waiting for an instructor to review subjective answers.
    PendingReview,
    /// At least one grading action has completed.
    Graded,
    /// Any status this client does not know about.
    #[serde(other)]
    Other,
}

/// The kind of question, which decides whether the backend can auto-grade it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Pick one or more options.
    MultipleChoice,
    /// True or false.
    TrueFalse,
    /// A short free-text answer.
    ShortAnswer,
    /// A long free-text answer.
    Essay,
    /// A kind this client does not know about.
    #[serde(other)]
    Other,
}

impl QuestionKind {
    /// Returns true for kinds the backend grades automatically.
    pub fn is_objective(&self) -> bool {
        matches!(self, QuestionKind::MultipleChoice | QuestionKind::TrueFalse)
    }
}

/// A question within a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Unique identifier for the question.
    pub id: String,
    /// The question text.
    #[serde(default)]
    pub prompt: String,
    /// The kind of question.
    pub kind: QuestionKind,
    /// The maximum points the question is worth.
    pub max_points: Decimal,
}

/// A student's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// The question this answers.
    pub question_id: String,
    /// The raw response (option ids, text, ...).
    #[serde(default)]
    pub response: Value,
    /// Points awarded so far, if graded.
    #[serde(default)]
    pub points_awarded: Option<Decimal>,
    /// Instructor feedback for this answer.
    #[serde(default)]
    pub feedback: Option<String>,
    /// Server-computed correctness for objective questions.
    #[serde(default)]
    pub is_correct: Option<bool>,
}

/// Minimal quiz information embedded in an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    /// Unique identifier for the quiz.
    pub id: String,
    /// The quiz title.
    #[serde(default)]
    pub title: String,
}

/// Minimal student information embedded in an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    /// Unique identifier for the student.
    pub id: String,
    /// The student's full name.
    #[serde(default)]
    pub full_name: String,
}

impl Identified for QuizSummary {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.title
    }
}

impl Identified for StudentSummary {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.full_name
    }
}

/// One student's submitted quiz, as the backend reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    /// Unique identifier for the attempt.
    pub id: String,
    /// The quiz that was attempted.
    #[serde(default)]
    pub quiz: Option<Ref<QuizSummary>>,
    /// The student who made the attempt.
    #[serde(default)]
    pub student: Option<Ref<StudentSummary>>,
    /// The grading status.
    pub status: GradingStatus,
    /// The quiz's questions, in display order.
    #[serde(default)]
    pub questions: Vec<Question>,
    /// The student's answers.
    #[serde(default)]
    pub answers: Vec<Answer>,
    /// The backend's total score.
    #[serde(default)]
    pub total_score: Option<Decimal>,
    /// An instructor-entered final score.
    #[serde(default)]
    pub override_score: Option<Decimal>,
    /// Feedback accompanying the override score.
    #[serde(default)]
    pub override_feedback: Option<String>,
    /// When the backend last changed the attempt.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl QuizAttempt {
    /// Returns the question with the given id.
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Returns the answer for the given question.
    pub fn answer(&self, question_id: &str) -> Option<&Answer> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }

    /// Returns the sum of all questions' maximum points.
    pub fn max_points(&self) -> Decimal {
        self.questions.iter().map(|q| q.max_points).sum()
    }
}

/// Points and feedback for one question, as held by the grading view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    /// Points awarded.
    #[serde(with = "rust_decimal::serde::float")]
    pub points: Decimal,
    /// Feedback for the student.
    #[serde(default)]
    pub feedback: String,
}

/// A manual final score that supersedes the per-question sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideGrade {
    /// The final score.
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    /// Feedback for the student.
    #[serde(default)]
    pub feedback: String,
}
