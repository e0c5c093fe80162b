//! Configuration-driven registration wizards.
//!
//! One [`StagedForm`] engine serves every entity type (students, staff,
//! faculty); the differences live in the YAML wizard definitions. The
//! [`lookup`] helpers load reference lists and join them against the ids a
//! draft holds.

mod compose;
mod controller;
pub mod lookup;
mod validation;

pub use compose::{primary_payload, related_payload};
pub use controller::{StagedForm, SubmissionOutcome, SubmitState};
pub use lookup::{
    batches_for_department, display_name, load_reference_data, programs_for_department,
    teachers_for_department,
};
pub use validation::{
    StepValidator, ValidationErrors, check_field, is_valid_email, is_valid_phone, validate_step,
};
