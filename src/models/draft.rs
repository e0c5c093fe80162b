//! Draft model for staged forms.
//!
//! A [`Draft`] is the not-yet-submitted state of a wizard, partitioned into
//! named sections ("basic", "profile", "address", ...). Each section maps
//! field names to [`FieldValue`]s.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A single form field value.
///
/// Serializes to plain JSON. Deserializing never guesses: every JSON string
/// becomes [`FieldValue::Text`], and date rules parse text when validating.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value.
    #[default]
    Null,
    /// A checkbox or toggle.
    Bool(bool),
    /// A numeric input.
    Number(Decimal),
    /// Free text, select values and identifiers.
    Text(String),
    /// A date picker value.
    Date(NaiveDate),
    /// A multi-select or repeated value.
    List(Vec<FieldValue>),
    /// A small nested record (address, contact).
    Record(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Returns true if the value counts as "not filled in".
    ///
    /// # Examples
    ///
    /// ```
    /// use campus_admin::models::FieldValue;
    ///
    /// assert!(FieldValue::Null.is_blank());
    /// assert!(FieldValue::from("   ").is_blank());
    /// assert!(!FieldValue::from(false).is_blank());
    /// ```
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Record(fields) => fields.values().all(FieldValue::is_blank),
            FieldValue::Bool(_) | FieldValue::Number(_) | FieldValue::Date(_) => false,
        }
    }

    /// Returns the text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts the value to plain JSON.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Number(d) => decimal_to_json(*d),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            FieldValue::Record(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn decimal_to_json(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::from(i);
        }
    }
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                let text = n.to_string();
                Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .map(FieldValue::Number)
                    .unwrap_or(FieldValue::Text(text))
            }
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => FieldValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                FieldValue::Record(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<Decimal> for FieldValue {
    fn from(d: Decimal) -> Self {
        FieldValue::Number(d)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(Decimal::from(n))
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldValue::from)
    }
}

/// Fields of one draft section, keyed by field name.
pub type Section = BTreeMap<String, FieldValue>;

/// Accumulated field state of a wizard across all of its steps.
///
/// # Examples
///
/// ```
/// use campus_admin::models::Draft;
///
/// let mut draft = Draft::new();
/// draft.set("basic", "fullName", "Jane Doe");
/// draft.set("profile", "bloodGroup", "O+");
///
/// let payload = draft.merged(&["basic", "profile"]);
/// assert_eq!(payload["fullName"], "Jane Doe");
/// assert_eq!(payload["bloodGroup"], "O+");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Draft {
    sections: BTreeMap<String, Section>,
}

impl Draft {
    /// Creates an empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, creating the section if needed.
    pub fn set(&mut self, section: &str, field: &str, value: impl Into<FieldValue>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(field.to_string(), value.into());
    }

    /// Returns a field's value.
    pub fn get(&self, section: &str, field: &str) -> Option<&FieldValue> {
        self.sections.get(section).and_then(|s| s.get(field))
    }

    /// Returns a whole section.
    pub fn section(&self, section: &str) -> Option<&Section> {
        self.sections.get(section)
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, section: &str, field: &str) -> Option<FieldValue> {
        self.sections.get_mut(section).and_then(|s| s.remove(field))
    }

    /// Returns true if no field holds a value.
    pub fn is_empty(&self) -> bool {
        self.sections
            .values()
            .all(|s| s.values().all(FieldValue::is_blank))
    }

    /// Discards every field.
    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Merges the named sections, in order, into one JSON object.
    ///
    /// Later sections win on key collisions; nested records stay nested.
    /// Sections that do not exist are skipped.
    pub fn merged<S: AsRef<str>>(&self, sections: &[S]) -> Map<String, Value> {
        let mut merged = Map::new();
        for name in sections {
            if let Some(section) = self.sections.get(name.as_ref()) {
                for (field, value) in section {
                    merged.insert(field.clone(), value.to_json());
                }
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_from_json_keeps_strings_as_text() {
        let value: FieldValue = json!("0123456789").into();
        assert_eq!(value, FieldValue::Text("0123456789".to_string()));

        let date_like: FieldValue = json!("2024-01-10").into();
        assert_eq!(date_like.as_text(), Some("2024-01-10"));
    }

    #[test]
    fn test_field_value_numbers() {
        let value: FieldValue = json!(2.5).into();
        assert_eq!(value, FieldValue::Number(Decimal::new(25, 1)));
        assert_eq!(value.to_json(), json!(2.5));

        let int: FieldValue = json!(42).into();
        assert_eq!(int.to_json(), json!(42));
    }

    #[test]
    fn test_field_value_date_serializes_as_iso() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(FieldValue::Date(date).to_json(), json!("2024-01-10"));
    }

    #[test]
    fn test_record_roundtrips_nested() {
        let value: FieldValue = json!({"city": "Dhaka", "zip": "1207"}).into();
        match &value {
            FieldValue::Record(fields) => assert_eq!(fields.len(), 2),
            other => panic!("Expected record, got {:?}", other),
        }
        assert_eq!(value.to_json(), json!({"city": "Dhaka", "zip": "1207"}));
    }

    #[test]
    fn test_blank_record_with_blank_fields() {
        let value: FieldValue = json!({"city": "", "zip": null}).into();
        assert!(value.is_blank());
    }

    #[test]
    fn test_merged_later_section_wins() {
        let mut draft = Draft::new();
        draft.set("basic", "phone", "111");
        draft.set("profile", "phone", "222");
        let merged = draft.merged(&["basic", "profile"]);
        assert_eq!(merged["phone"], "222");

        let reversed = draft.merged(&["profile", "basic"]);
        assert_eq!(reversed["phone"], "111");
    }

    #[test]
    fn test_merged_skips_missing_sections() {
        let mut draft = Draft::new();
        draft.set("basic", "fullName", "Jane Doe");
        let merged = draft.merged(&["basic", "kin"]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_draft_deserializes_from_section_object() {
        let draft: Draft = serde_json::from_value(json!({
            "basic": {"fullName": "Jane Doe", "age": 20},
            "address": {"present": {"city": "Dhaka"}}
        }))
        .unwrap();
        assert_eq!(
            draft.get("basic", "fullName"),
            Some(&FieldValue::Text("Jane Doe".to_string()))
        );
        assert!(matches!(
            draft.get("address", "present"),
            Some(FieldValue::Record(_))
        ));
    }

    #[test]
    fn test_is_empty_and_clear() {
        let mut draft = Draft::new();
        assert!(draft.is_empty());
        draft.set("basic", "fullName", "  ");
        assert!(draft.is_empty());
        draft.set("basic", "email", "jane@example.com");
        assert!(!draft.is_empty());
        draft.clear();
        assert!(draft.is_empty());
    }

    #[test]
    fn test_remove_field() {
        let mut draft = Draft::new();
        draft.set("basic", "email", "jane@example.com");
        assert!(draft.remove("basic", "email").is_some());
        assert!(draft.get("basic", "email").is_none());
    }
}
