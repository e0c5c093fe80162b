//! HTTP backend over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{AdminError, AdminResult};
use crate::models::{GradeRecord, OverrideGrade, Payload, QuizAttempt, canonicalize_ids};

use super::{Backend, ListFilter};

/// A [`Backend`] that talks to the REST API.
///
/// Responses wrapped in a `data` envelope (`data` plus only wrapper keys such
/// as `success` or `message`) are unwrapped, and `_id` keys are
/// renamed to `id` before anything else sees them.
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: Url,
    attempts: String,
    bearer_token: Option<String>,
}

impl RestBackend {
    /// Creates a backend from the client configuration.
    pub fn new(config: &ClientConfig) -> AdminResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| AdminError::ConfigParseError {
            path: "client.yaml".to_string(),
            message: format!("invalid base_url '{}': {e}", config.base_url),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AdminError::ConfigParseError {
                path: "client.yaml".to_string(),
                message: format!("base_url '{}' cannot be a base", config.base_url),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            attempts: config.grading.attempts.clone(),
            bearer_token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Builds the URL for a resource path plus extra segments.
    ///
    /// Extra segments (ids) are percent-encoded.
    fn url(&self, resource: &str, extra: &[&str]) -> AdminResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| AdminError::Transport {
                message: format!("cannot build a URL from {}", self.base_url),
            })?;
            segments.pop_if_empty();
            segments.extend(resource.split('/').filter(|s| !s.is_empty()));
            segments.extend(extra);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn with_body(builder: RequestBuilder, payload: Payload) -> AdminResult<RequestBuilder> {
        if !payload.is_multipart() {
            return Ok(builder.json(&Value::Object(payload.fields)));
        }

        let mut form = Form::new();
        for (name, text) in payload.text_parts() {
            form = form.text(name, text);
        }
        if let Some((field, attachment)) = payload.attachment {
            let part = Part::bytes(attachment.bytes)
                .file_name(attachment.file_name)
                .mime_str(&attachment.content_type)?;
            form = form.part(field, part);
        }
        Ok(builder.multipart(form))
    }

    /// Sends the request and returns the unwrapped, canonicalized body.
    async fn send(&self, builder: RequestBuilder) -> AdminResult<Value> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "Sending backend request");

        let response = self.client.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, %url, status = status.as_u16(), "Backend responded");

        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(_) if !status.is_success() => Value::String(text.clone()),
                Err(e) => {
                    return Err(AdminError::Decode {
                        message: e.to_string(),
                    });
                }
            }
        };

        if !status.is_success() {
            let message = match &body {
                Value::Object(map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                _ => None,
            }
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
            return Err(AdminError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let mut body = match body {
            Value::Object(mut map) if is_envelope(&map) => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        canonicalize_ids(&mut body);
        Ok(body)
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> AdminResult<T> {
        serde_json::from_value(value).map_err(|e| AdminError::Decode {
            message: e.to_string(),
        })
    }
}

/// Keys a response wrapper may carry next to `data`.
const ENVELOPE_KEYS: [&str; 5] = ["success", "message", "statusCode", "status", "meta"];

/// True for `{ "data": ... }` wrappers, false for entities that merely have
/// a `data` field.
fn is_envelope(map: &Map<String, Value>) -> bool {
    map.contains_key("data")
        && map
            .keys()
            .all(|key| key == "data" || ENVELOPE_KEYS.contains(&key.as_str()))
}

#[async_trait]
impl Backend for RestBackend {
    async fn create(&self, resource: &str, payload: Payload) -> AdminResult<Value> {
        let builder = self.request(Method::POST, self.url(resource, &[])?);
        self.send(Self::with_body(builder, payload)?).await
    }

    async fn update(&self, resource: &str, id: &str, payload: Payload) -> AdminResult<Value> {
        let builder = self.request(Method::PATCH, self.url(resource, &[id])?);
        self.send(Self::with_body(builder, payload)?).await
    }

    async fn get(&self, resource: &str, id: &str) -> AdminResult<Value> {
        self.send(self.request(Method::GET, self.url(resource, &[id])?))
            .await
    }

    async fn list(&self, resource: &str, filter: &ListFilter) -> AdminResult<Vec<Value>> {
        let mut url = self.url(resource, &[])?;
        if !filter.is_empty() {
            url.query_pairs_mut().extend_pairs(filter.pairs());
        }

        match self.send(self.request(Method::GET, url)).await? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(AdminError::Decode {
                message: format!("expected a list from {resource}, got {other}"),
            }),
        }
    }

    async fn upsert(&self, resource: &str, key: &str, payload: Payload) -> AdminResult<Value> {
        let builder = self.request(Method::PUT, self.url(resource, &[key])?);
        self.send(Self::with_body(builder, payload)?).await
    }

    async fn fetch_attempt(&self, attempt_id: &str) -> AdminResult<QuizAttempt> {
        let url = self.url(&self.attempts, &[attempt_id])?;
        Self::decode(self.send(self.request(Method::GET, url)).await?)
    }

    async fn save_question_grade(
        &self,
        attempt_id: &str,
        question_id: &str,
        grade: &GradeRecord,
    ) -> AdminResult<()> {
        let url = self.url(
            &self.attempts,
            &[attempt_id, "answers", question_id, "grade"],
        )?;
        self.send(self.request(Method::PATCH, url).json(grade))
            .await?;
        Ok(())
    }

    async fn save_override(
        &self,
        attempt_id: &str,
        grade: &OverrideGrade,
    ) -> AdminResult<QuizAttempt> {
        let url = self.url(&self.attempts, &[attempt_id, "grade"])?;
        Self::decode(self.send(self.request(Method::PATCH, url).json(grade)).await?)
    }

    async fn regrade(&self, attempt_id: &str) -> AdminResult<QuizAttempt> {
        let url = self.url(&self.attempts, &[attempt_id, "regrade"])?;
        Self::decode(
            self.send(self.request(Method::POST, url).json(&json!({})))
                .await?,
        )
    }
}
