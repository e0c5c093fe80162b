//! Reference list loading and client-side joins.
//!
//! The draft stores only identifiers; these helpers filter the fetched
//! reference lists by a selected department and resolve names for display.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::backend::{Backend, ListFilter};
use crate::config::ReferenceEndpoints;
use crate::models::{Batch, Identified, Notice, Program, ReferenceData, Teacher, canonicalize_ids};

/// Returns the batches that belong to the department.
pub fn batches_for_department<'a>(batches: &'a [Batch], department_id: &str) -> Vec<&'a Batch> {
    batches
        .iter()
        .filter(|b| b.department.as_ref().is_some_and(|d| d.is(department_id)))
        .collect()
}

/// Returns the programs offered by the department.
pub fn programs_for_department<'a>(
    programs: &'a [Program],
    department_id: &str,
) -> Vec<&'a Program> {
    programs
        .iter()
        .filter(|p| p.department.as_ref().is_some_and(|d| d.is(department_id)))
        .collect()
}

/// Returns the teachers whose home department is the department.
pub fn teachers_for_department<'a>(
    teachers: &'a [Teacher],
    department_id: &str,
) -> Vec<&'a Teacher> {
    teachers
        .iter()
        .filter(|t| t.department.as_ref().is_some_and(|d| d.is(department_id)))
        .collect()
}

/// Looks up the display name for an id in an already-fetched list.
///
/// # Examples
///
/// ```
/// use campus_admin::models::Session;
/// use campus_admin::wizard::display_name;
///
/// let sessions = vec![Session { id: "s1".to_string(), name: "2024-2025".to_string() }];
/// assert_eq!(display_name(&sessions, "s1"), Some("2024-2025"));
/// assert_eq!(display_name(&sessions, "s2"), None);
/// ```
pub fn display_name<'a, T: Identified>(list: &'a [T], id: &str) -> Option<&'a str> {
    list.iter().find(|item| item.id() == id).map(Identified::name)
}

/// Fetches all reference lists.
///
/// A list that cannot be loaded or decoded is left empty and reported as a
/// warning notice; the form stays usable.
pub async fn load_reference_data(
    backend: &dyn Backend,
    endpoints: &ReferenceEndpoints,
) -> (ReferenceData, Vec<Notice>) {
    let mut notices = Vec::new();
    let data = ReferenceData {
        departments: load_list(backend, &endpoints.departments, "departments", &mut notices).await,
        batches: load_list(backend, &endpoints.batches, "batches", &mut notices).await,
        programs: load_list(backend, &endpoints.programs, "programs", &mut notices).await,
        sessions: load_list(backend, &endpoints.sessions, "sessions", &mut notices).await,
        teachers: load_list(backend, &endpoints.teachers, "teachers", &mut notices).await,
    };
    (data, notices)
}

/// Fetches and decodes one list, degrading to empty on failure.
///
/// Rows that cannot be decoded (no id, wrong shapes) are skipped and counted
/// in a single warning notice.
pub async fn load_list<T: DeserializeOwned>(
    backend: &dyn Backend,
    resource: &str,
    label: &str,
    notices: &mut Vec<Notice>,
) -> Vec<T> {
    let rows = match backend.list(resource, &ListFilter::new()).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(resource, error = %e, "Failed to load reference list");
            notices.push(Notice::warning(format!("Failed to load {label}")));
            return Vec::new();
        }
    };

    let mut items = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for mut row in rows {
        canonicalize_ids(&mut row);
        match serde_json::from_value(row) {
            Ok(item) => items.push(item),
            Err(e) => {
                debug!(resource, error = %e, "Skipping malformed reference row");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(resource, skipped, "Some reference rows could not be read");
        notices.push(Notice::warning(format!(
            "{skipped} {label} could not be read"
        )));
    }

    debug!(resource, count = items.len(), "Reference list loaded");
    items
}
