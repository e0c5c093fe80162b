//! Request types for the gateway.
//!
//! This module defines the JSON request bodies and the header-based
//! session extraction shared by all handlers.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::context::{Role, SessionContext};
use crate::models::Draft;

use super::response::ApiErrorResponse;

/// Header carrying the acting user's role.
pub const ROLE_HEADER: &str = "x-actor-role";

/// Header carrying the acting user's id.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Request body for `POST /wizards/:kind/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// The 1-based step to check.
    pub step: usize,
    /// The draft as held by the client.
    #[serde(default)]
    pub draft: Draft,
}

/// Request body for `POST /wizards/:kind/submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// The completed draft.
    pub draft: Draft,
    /// The entity being edited; absent for a new entity.
    #[serde(default)]
    pub entity_id: Option<String>,
}

/// Query string for `GET /lookup/batches`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchQuery {
    /// Only batches of this department; all batches when absent.
    #[serde(default)]
    pub department: Option<String>,
}

/// Builds the session context from the actor headers.
///
/// A missing or unknown role is rejected as unauthenticated.
pub fn session_from_headers(headers: &HeaderMap) -> Result<SessionContext, ApiErrorResponse> {
    let role = headers
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiErrorResponse::unauthenticated(format!("Missing {ROLE_HEADER} header")))?
        .parse::<Role>()
        .map_err(ApiErrorResponse::unauthenticated)?;

    let actor_id = headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous");

    Ok(SessionContext::new(actor_id, role))
}
