//! Application state for the gateway.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use std::sync::Arc;

use crate::backend::Backend;
use crate::config::ConfigLoader;

/// Shared application state.
///
/// Holds the loaded configuration and the backend every handler talks to.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ConfigLoader>,
    backend: Arc<dyn Backend>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(config: ConfigLoader, backend: Arc<dyn Backend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }

    /// Returns a reference to the configuration loader.
    pub fn config(&self) -> &ConfigLoader {
        &self.config
    }

    /// Returns the backend.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone_and_send() {
        fn assert_state<T: Clone + Send + Sync + 'static>() {}
        assert_state::<AppState>();
    }
}
