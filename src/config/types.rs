//! Configuration types for the administration client.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files: backend endpoints and
//! the step layout of every registration wizard.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::context::Role;

/// Backend connection settings (`client.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST backend (e.g., "https://api.example.edu").
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Endpoints for reference lists.
    pub reference: ReferenceEndpoints,
    /// Endpoints for quiz grading.
    pub grading: GradingEndpoints,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Resource paths for the lookup lists fetched on page load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEndpoints {
    /// Departments resource (e.g., "/academic/departments").
    pub departments: String,
    /// Batches resource.
    pub batches: String,
    /// Programs resource.
    pub programs: String,
    /// Sessions resource.
    pub sessions: String,
    /// Teachers resource.
    pub teachers: String,
}

/// Resource paths for quiz grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingEndpoints {
    /// Quiz attempts resource (e.g., "/classroom/quiz-attempts").
    pub attempts: String,
}

/// The kind of input a field represents, which decides how it is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    #[default]
    Text,
    /// An email address.
    Email,
    /// A phone number.
    Phone,
    /// A calendar date (`YYYY-MM-DD`).
    Date,
    /// A number.
    Number,
    /// A checkbox.
    Boolean,
    /// One of a fixed list of options.
    Select,
    /// The id of a reference entity (department, batch, ...).
    Reference,
    /// A nested record (address, contact).
    Record,
}

/// Validation rule for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// The field name as sent to the backend (e.g., "fullName").
    pub name: String,
    /// The label used in error messages (e.g., "Full name").
    pub label: String,
    /// The kind of input.
    #[serde(default)]
    pub kind: FieldKind,
    /// Whether the field must be filled in.
    #[serde(default)]
    pub required: bool,
    /// Minimum text length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum text length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Minimum numeric value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Decimal>,
    /// Maximum numeric value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Decimal>,
    /// Rejects dates after the session's reference date.
    #[serde(default)]
    pub not_future: bool,
    /// Allowed values for select fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FieldRule {
    /// Creates an optional rule with no bounds.
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            not_future: false,
            options: Vec::new(),
        }
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// One step of a wizard: a titled group of fields stored in one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// The title shown in the step header.
    pub title: String,
    /// The draft section the step's fields are stored in.
    pub section: String,
    /// The fields collected in this step.
    #[serde(default)]
    pub fields: Vec<FieldRule>,
}

/// A related record saved after the primary entity (e.g., a profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    /// Name used in notices (e.g., "Profile").
    pub label: String,
    /// Resource path; the record is upserted at `{resource}/{entity id}`.
    pub resource: String,
    /// Draft sections that make up the related record.
    pub sections: Vec<String>,
    /// Field that links the record back to the primary entity.
    #[serde(default = "default_link_field")]
    pub link_field: String,
}

fn default_link_field() -> String {
    "owner".to_string()
}

/// A registration wizard (`wizards/<kind>.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardDefinition {
    /// Identifier used in routes (e.g., "student").
    pub kind: String,
    /// Title of the wizard page.
    pub title: String,
    /// Name of the entity used in notices (e.g., "Student").
    pub entity_label: String,
    /// Resource path of the primary entity (e.g., "/user/students").
    pub resource: String,
    /// Roles allowed to use the wizard.
    #[serde(default = "all_roles")]
    pub roles: Vec<Role>,
    /// The ordered steps.
    pub steps: Vec<StepDefinition>,
    /// Optional related record saved after the primary entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<RelatedEntity>,
    /// Multipart field name for the profile picture, if the wizard takes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_field: Option<String>,
}

fn all_roles() -> Vec<Role> {
    vec![Role::Admin, Role::Moderator, Role::Teacher]
}

impl WizardDefinition {
    /// Returns the number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the 1-based step, if it exists.
    pub fn step(&self, step: usize) -> Option<&StepDefinition> {
        step.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    /// Returns the section names in step order.
    pub fn section_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.section.as_str()).collect()
    }

    /// Returns true if the role may use this wizard.
    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns the rule for a field, searching all steps.
    pub fn field(&self, name: &str) -> Option<(&StepDefinition, &FieldRule)> {
        self.steps
            .iter()
            .find_map(|step| step.fields.iter().find(|f| f.name == name).map(|f| (step, f)))
    }

    /// Checks the definition for internal consistency.
    ///
    /// Returns a description of the first problem found.
    pub fn check(&self) -> Result<(), String> {
        if self.kind.trim().is_empty() {
            return Err("wizard kind must not be empty".to_string());
        }
        if self.steps.is_empty() {
            return Err(format!("wizard '{}' has no steps", self.kind));
        }

        let mut sections = HashSet::new();
        let mut fields = HashSet::new();
        for step in &self.steps {
            if !sections.insert(step.section.as_str()) {
                return Err(format!(
                    "wizard '{}' uses section '{}' in more than one step",
                    self.kind, step.section
                ));
            }
            for field in &step.fields {
                if !fields.insert(field.name.as_str()) {
                    return Err(format!(
                        "wizard '{}' declares field '{}' twice",
                        self.kind, field.name
                    ));
                }
                if field.kind == FieldKind::Select && field.options.is_empty() {
                    return Err(format!(
                        "select field '{}' in wizard '{}' has no options",
                        field.name, self.kind
                    ));
                }
            }
        }

        if let Some(related) = &self.related {
            if let Some(missing) = related
                .sections
                .iter()
                .find(|s| !sections.contains(s.as_str()))
            {
                return Err(format!(
                    "related entity of wizard '{}' refers to unknown section '{}'",
                    self.kind, missing
                ));
            }
        }

        Ok(())
    }
}
