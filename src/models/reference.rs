//! Reference entities and relation handling.
//!
//! The backend returns relations either as a bare identifier or as an
//! embedded ("populated") object. [`Ref`] captures both shapes so callers
//! pattern-match instead of sniffing JSON, and [`normalize_id`] does the
//! same for untyped values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Anything with a stable identifier and a display name.
pub trait Identified {
    /// Returns the entity's identifier.
    fn id(&self) -> &str;

    /// Returns the name shown in option lists.
    fn name(&self) -> &str;
}

/// A relation that is either a bare identifier or a populated entity.
///
/// # Examples
///
/// ```
/// use campus_admin::models::{Department, Ref};
///
/// let bare: Ref<Department> = serde_json::from_str(r#""dep_cse""#).unwrap();
/// let populated: Ref<Department> =
///     serde_json::from_str(r#"{"id": "dep_cse", "name": "Computer Science"}"#).unwrap();
/// assert_eq!(bare.id(), Some("dep_cse"));
/// assert_eq!(populated.id(), Some("dep_cse"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    /// An unpopulated relation.
    Id(String),
    /// A relation the backend embedded.
    Populated(T),
}

impl<T: Identified> Ref<T> {
    /// Returns the identifier, or `None` for an empty bare id.
    pub fn id(&self) -> Option<&str> {
        let id = match self {
            Ref::Id(id) => id.as_str(),
            Ref::Populated(entity) => entity.id(),
        };
        if id.is_empty() { None } else { Some(id) }
    }

    /// Returns the embedded entity, if the relation was populated.
    pub fn populated(&self) -> Option<&T> {
        match self {
            Ref::Id(_) => None,
            Ref::Populated(entity) => Some(entity),
        }
    }

    /// Returns true if the relation points at `id`.
    pub fn is(&self, id: &str) -> bool {
        self.id() == Some(id)
    }
}

impl<T> From<&str> for Ref<T> {
    fn from(id: &str) -> Self {
        Ref::Id(id.to_string())
    }
}

impl<T> From<String> for Ref<T> {
    fn from(id: String) -> Self {
        Ref::Id(id)
    }
}

/// Normalizes an untyped relation value to a plain identifier.
///
/// Strings are returned as-is (empty strings yield `None`), numbers as their
/// decimal text, and objects by their `id` (falling back to `_id`).
///
/// # Examples
///
/// ```
/// use campus_admin::models::normalize_id;
/// use serde_json::json;
///
/// assert_eq!(normalize_id(&json!({"id": "x"})), Some("x".to_string()));
/// assert_eq!(normalize_id(&json!("x")), Some("x".to_string()));
/// assert_eq!(normalize_id(&json!(null)), None);
/// ```
pub fn normalize_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map
            .get("id")
            .and_then(normalize_id)
            .or_else(|| map.get("_id").and_then(normalize_id)),
        _ => None,
    }
}

/// Rewrites `_id` keys to `id` throughout a JSON value.
///
/// When an object carries both keys, `id` wins and `_id` is dropped, so
/// typed entities only ever see `id`.
pub fn canonicalize_ids(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(mongo_id) = map.remove("_id") {
                if !map.contains_key("id") {
                    map.insert("id".to_string(), mongo_id);
                }
            }
            map.values_mut().for_each(canonicalize_ids);
        }
        Value::Array(items) => items.iter_mut().for_each(canonicalize_ids),
        _ => {}
    }
}

/// An academic department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    /// Unique identifier for the department.
    pub id: String,
    /// Display name (e.g., "Computer Science").
    #[serde(default)]
    pub name: String,
    /// Short code (e.g., "CSE").
    #[serde(default)]
    pub code: Option<String>,
}

/// A degree program offered by a department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    /// Unique identifier for the program.
    pub id: String,
    /// Display name (e.g., "BSc in CSE").
    #[serde(default)]
    pub name: String,
    /// The owning department.
    #[serde(default)]
    pub department: Option<Ref<Department>>,
}

/// An academic session (e.g., "2024-2025").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique identifier for the session.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// A student batch (cohort) within a department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Unique identifier for the batch.
    pub id: String,
    /// Display name (e.g., "CSE 24").
    #[serde(default)]
    pub name: String,
    /// The department the batch belongs to.
    #[serde(default)]
    pub department: Option<Ref<Department>>,
    /// The program the batch is enrolled in.
    #[serde(default)]
    pub program: Option<Ref<Program>>,
    /// The session the batch was admitted in.
    #[serde(default)]
    pub session: Option<Ref<Session>>,
}

/// A teacher, as listed for committee and workspace assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    /// Unique identifier for the teacher.
    pub id: String,
    /// The teacher's full name.
    #[serde(default)]
    pub full_name: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// The teacher's home department.
    #[serde(default)]
    pub department: Option<Ref<Department>>,
}

impl Identified for Department {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Identified for Program {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Identified for Session {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Identified for Batch {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Identified for Teacher {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.full_name
    }
}

/// Lookup lists fetched once per page load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    /// All departments.
    pub departments: Vec<Department>,
    /// All batches.
    pub batches: Vec<Batch>,
    /// All programs.
    pub programs: Vec<Program>,
    /// All sessions.
    pub sessions: Vec<Session>,
    /// All teachers.
    pub teachers: Vec<Teacher>,
}
