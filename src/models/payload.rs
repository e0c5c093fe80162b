//! Request bodies sent to the backend.

use serde_json::{Map, Value};

/// A binary file sent alongside a payload (e.g., a profile picture).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Original file name.
    pub file_name: String,
    /// MIME type (e.g., "image/png").
    pub content_type: String,
    /// The file contents.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment.
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// A create/update/upsert body: JSON fields plus an optional file.
///
/// Without an attachment the fields are sent as a JSON object; with one,
/// as multipart form data where the file is stored under `field`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    /// The JSON fields.
    pub fields: Map<String, Value>,
    /// The multipart field name and file, if any.
    pub attachment: Option<(String, Attachment)>,
}

impl Payload {
    /// Creates a JSON-only payload.
    pub fn json(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            attachment: None,
        }
    }

    /// Adds a file under the given multipart field name.
    pub fn with_attachment(mut self, field: impl Into<String>, attachment: Attachment) -> Self {
        self.attachment = Some((field.into(), attachment));
        self
    }

    /// Returns true if the payload must be sent as multipart form data.
    pub fn is_multipart(&self) -> bool {
        self.attachment.is_some()
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Renders the fields as multipart text parts.
    ///
    /// Strings are sent as-is; every other value is JSON-encoded. Null
    /// fields are left out.
    pub fn text_parts(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect()
    }
}
