//! Builds backend payloads from a finished draft.

use serde_json::{Map, Value};

use crate::config::{FieldKind, RelatedEntity, WizardDefinition};
use crate::models::{Attachment, Draft, Payload, normalize_id};

/// Builds the create/update payload for the primary entity.
///
/// Every section is merged in step order. The attachment, when present and
/// the wizard declares an attachment field, turns the payload into multipart.
pub fn primary_payload(
    definition: &WizardDefinition,
    draft: &Draft,
    attachment: Option<&Attachment>,
) -> Payload {
    let mut fields = draft.merged(&definition.section_names());
    reduce_references(definition, &mut fields);
    let payload = Payload::json(fields);
    match (&definition.attachment_field, attachment) {
        (Some(field), Some(attachment)) => payload.with_attachment(field, attachment.clone()),
        _ => payload,
    }
}

/// Builds the upsert payload for the related record of `entity_id`.
pub fn related_payload(
    definition: &WizardDefinition,
    related: &RelatedEntity,
    draft: &Draft,
    entity_id: &str,
) -> Payload {
    let mut fields = draft.merged(&related.sections);
    reduce_references(definition, &mut fields);
    fields.insert(
        related.link_field.clone(),
        Value::String(entity_id.to_string()),
    );
    Payload::json(fields)
}

/// Replaces populated reference values with their ids.
fn reduce_references(definition: &WizardDefinition, fields: &mut Map<String, Value>) {
    let references = definition
        .steps
        .iter()
        .flat_map(|step| &step.fields)
        .filter(|rule| rule.kind == FieldKind::Reference);

    for rule in references {
        if let Some(value) = fields.get_mut(&rule.name) {
            *value = normalize_id(value).map_or(Value::Null, Value::String);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldRule, StepDefinition};
    use crate::models::FieldValue;
    use serde_json::json;

    fn definition() -> WizardDefinition {
        WizardDefinition {
            kind: "student".to_string(),
            title: "Add Student".to_string(),
            entity_label: "Student".to_string(),
            resource: "/user/students".to_string(),
            roles: vec![],
            steps: vec![
                StepDefinition {
                    title: "Basic".to_string(),
                    section: "basic".to_string(),
                    fields: vec![
                        FieldRule::new("fullName", "Full name", FieldKind::Text),
                        FieldRule::new("batch", "Batch", FieldKind::Reference),
                    ],
                },
                StepDefinition {
                    title: "Profile".to_string(),
                    section: "profile".to_string(),
                    fields: vec![FieldRule::new("bloodGroup", "Blood group", FieldKind::Text)],
                },
            ],
            related: Some(RelatedEntity {
                label: "Profile".to_string(),
                resource: "/user/student-profiles".to_string(),
                sections: vec!["profile".to_string()],
                link_field: "student".to_string(),
            }),
            attachment_field: Some("profilePicture".to_string()),
        }
    }

    #[test]
    fn test_primary_payload_merges_all_sections() {
        let mut draft = Draft::new();
        draft.set("basic", "fullName", "Jane Doe");
        draft.set("profile", "bloodGroup", "O+");

        let payload = primary_payload(&definition(), &draft, None);
        assert!(!payload.is_multipart());
        assert_eq!(payload.get("fullName"), Some(&json!("Jane Doe")));
        assert_eq!(payload.get("bloodGroup"), Some(&json!("O+")));
    }

    #[test]
    fn test_populated_reference_sent_as_id() {
        let mut draft = Draft::new();
        draft.set("basic", "batch", FieldValue::from(json!({"_id": "b1", "name": "CSE 24"})));

        let payload = primary_payload(&definition(), &draft, None);
        assert_eq!(payload.get("batch"), Some(&json!("b1")));
    }

    #[test]
    fn test_primary_payload_with_attachment_is_multipart() {
        let draft = Draft::new();
        let attachment = Attachment::new("me.png", "image/png", vec![0u8; 4]);
        let payload = primary_payload(&definition(), &draft, Some(&attachment));

        let (field, file) = payload.attachment.as_ref().unwrap();
        assert_eq!(field, "profilePicture");
        assert_eq!(file.file_name, "me.png");
    }

    #[test]
    fn test_attachment_ignored_without_attachment_field() {
        let mut definition = definition();
        definition.attachment_field = None;
        let attachment = Attachment::new("me.png", "image/png", vec![1]);
        let payload = primary_payload(&definition, &Draft::new(), Some(&attachment));
        assert!(!payload.is_multipart());
    }

    #[test]
    fn test_related_payload_links_entity() {
        let definition = definition();
        let mut draft = Draft::new();
        draft.set("basic", "fullName", "Jane Doe");
        draft.set("profile", "bloodGroup", "O+");

        let related = definition.related.as_ref().unwrap();
        let payload = related_payload(&definition, related, &draft, "stu_1");
        assert_eq!(payload.get("student"), Some(&json!("stu_1")));
        assert_eq!(payload.get("bloodGroup"), Some(&json!("O+")));
        assert!(payload.get("fullName").is_none());
    }
}
