//! HTTP gateway for the administration dashboard.
//!
//! This module exposes the wizards, batch lookups and grading summaries as
//! JSON endpoints. The acting user's role and id arrive in the
//! `x-actor-role` and `x-actor-id` headers.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{
    ACTOR_HEADER, BatchQuery, ROLE_HEADER, SubmitRequest, ValidateRequest, session_from_headers,
};
pub use response::{ApiError, ApiErrorResponse, BatchOptions, ValidateResponse};
pub use state::AppState;
