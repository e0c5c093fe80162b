//! Core data models for the administration client.
//!
//! This module contains the draft, reference, grading, payload and notice models
//! shared by the wizards, the grading view and the gateway.

mod draft;
mod grading;
mod notice;
mod payload;
mod reference;

pub use draft::{Draft, FieldValue, Section};
pub use grading::{
    Answer, GradeRecord, GradingStatus, OverrideGrade, Question, QuestionKind, QuizAttempt,
    QuizSummary, StudentSummary,
};
pub use notice::{Notice, NoticeLevel};
pub use payload::{Attachment, Payload};
pub use reference::{
    Batch, Department, Identified, Program, Ref, ReferenceData, Session, Teacher,
    canonicalize_ids, normalize_id,
};
