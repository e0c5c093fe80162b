//! Instructor review of quiz attempts.
//!
//! The [`GradingAggregator`] holds per-question grades for one attempt,
//! aggregates them into a total, and saves grades, overrides and regrade
//! requests through a [`Backend`](crate::backend::Backend).

mod aggregator;

pub use aggregator::{GradingAggregator, GradingSummary};
