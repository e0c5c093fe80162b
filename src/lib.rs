//! Administration client for a university dashboard
//!
//! This crate provides configuration-driven registration wizards (students,
//! staff, faculty), instructor grading of quiz attempts, and the reference
//! lookups both rely on, together with a REST backend client and an HTTP
//! gateway.

#![warn(missing_docs)]

pub mod api;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod grading;
pub mod models;
pub mod wizard;
