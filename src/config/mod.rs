//! Configuration loading and management.
//!
//! This module loads the backend connection settings and the registration
//! wizard definitions from YAML files.
//!
//! # Example
//!
//! ```no_run
//! use campus_admin::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/university").unwrap();
//! println!("Backend: {}", config.client().base_url);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    ClientConfig, FieldKind, FieldRule, GradingEndpoints, ReferenceEndpoints, RelatedEntity,
    StepDefinition, WizardDefinition,
};
