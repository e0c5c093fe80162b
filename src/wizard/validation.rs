//! Field validation for wizard steps.
//!
//! Each step is checked against the [`FieldRule`]s of its definition and
//! then against any code validators registered for it.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{FieldKind, FieldRule, StepDefinition};
use crate::context::SessionContext;
use crate::models::{Draft, FieldValue, normalize_id};

/// Field name to message, for the fields of one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// Creates an empty set of errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error. The first message for a field is kept.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Returns the message for a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Clears the error for a field.
    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    /// Returns true if a field has an error.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns true if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of fields with errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A code validator attached to one step, for checks a [`FieldRule`]
/// cannot express (cross-field constraints, for instance).
///
/// Closures with the matching signature implement this trait.
///
/// # Examples
///
/// ```
/// use campus_admin::context::SessionContext;
/// use campus_admin::models::Draft;
/// use campus_admin::wizard::{StepValidator, ValidationErrors};
///
/// let guardian_needs_phone = |draft: &Draft, _: &SessionContext, errors: &mut ValidationErrors| {
///     if draft.get("kin", "guardianName").is_some() && draft.get("kin", "guardianPhone").is_none() {
///         errors.insert("guardianPhone", "Guardian phone is required with a guardian name");
///     }
/// };
/// let _boxed: Box<dyn StepValidator> = Box::new(guardian_needs_phone);
/// ```
pub trait StepValidator: Send + Sync {
    /// Adds any errors found in `draft` to `errors`.
    fn validate(&self, draft: &Draft, context: &SessionContext, errors: &mut ValidationErrors);
}

impl<F> StepValidator for F
where
    F: Fn(&Draft, &SessionContext, &mut ValidationErrors) + Send + Sync,
{
    fn validate(&self, draft: &Draft, context: &SessionContext, errors: &mut ValidationErrors) {
        self(draft, context, errors)
    }
}

/// Checks every field rule of a step against the draft.
pub fn validate_step(
    step: &StepDefinition,
    draft: &Draft,
    context: &SessionContext,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for rule in &step.fields {
        let value = draft.get(&step.section, &rule.name);
        if let Some(message) = check_field(rule, value, context.today) {
            errors.insert(rule.name.clone(), message);
        }
    }
    errors
}

/// Checks one value against its rule, returning the error message if any.
///
/// Optional fields that are blank pass without further checks.
pub fn check_field(rule: &FieldRule, value: Option<&FieldValue>, today: NaiveDate) -> Option<String> {
    let label = &rule.label;
    let value = match value {
        Some(v) if !v.is_blank() => v,
        _ if rule.required => return Some(format!("{label} is required")),
        _ => return None,
    };

    match rule.kind {
        FieldKind::Text => {}
        FieldKind::Email => {
            if !value.as_text().is_some_and(is_valid_email) {
                return Some("Enter a valid email address".to_string());
            }
        }
        FieldKind::Phone => {
            if !value.as_text().is_some_and(is_valid_phone) {
                return Some("Enter a valid phone number".to_string());
            }
        }
        FieldKind::Date => {
            let Some(date) = parse_date(value) else {
                return Some(format!("{label} must be a valid date (YYYY-MM-DD)"));
            };
            if rule.not_future && date > today {
                return Some(format!("{label} cannot be in the future"));
            }
        }
        FieldKind::Number => {
            let Some(number) = parse_number(value) else {
                return Some(format!("{label} must be a number"));
            };
            if let Some(min) = rule.min.filter(|min| number < *min) {
                return Some(format!("{label} must be at least {min}"));
            }
            if let Some(max) = rule.max.filter(|max| number > *max) {
                return Some(format!("{label} must be at most {max}"));
            }
        }
        FieldKind::Boolean => {
            if !matches!(value, FieldValue::Bool(_)) {
                return Some(format!("{label} must be yes or no"));
            }
        }
        FieldKind::Select => {
            if !value
                .as_text()
                .is_some_and(|v| rule.options.iter().any(|o| o == v))
            {
                return Some(format!("{label} must be one of: {}", rule.options.join(", ")));
            }
        }
        FieldKind::Reference => {
            if normalize_id(&value.to_json()).is_none() {
                return Some(format!("{label} must be selected"));
            }
        }
        FieldKind::Record => {
            if !matches!(value, FieldValue::Record(_)) {
                return Some(format!("{label} is invalid"));
            }
        }
    }

    if let Some(text) = value.as_text() {
        let length = text.trim().chars().count();
        if let Some(min) = rule.min_length.filter(|min| length < *min) {
            return Some(format!("{label} must be at least {min} characters"));
        }
        if let Some(max) = rule.max_length.filter(|max| length > *max) {
            return Some(format!("{label} must be at most {max} characters"));
        }
    }

    None
}

fn parse_date(value: &FieldValue) -> Option<NaiveDate> {
    match value {
        FieldValue::Date(d) => Some(*d),
        FieldValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        _ => None,
    }
}

fn parse_number(value: &FieldValue) -> Option<Decimal> {
    match value {
        FieldValue::Number(d) => Some(*d),
        FieldValue::Text(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Returns true for addresses of the form `local@domain.tld`.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Returns true for 7 to 15 digits with an optional leading `+`.
///
/// Spaces, dashes and parentheses are ignored.
pub fn is_valid_phone(phone: &str) -> bool {
    let compact: String = phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}
