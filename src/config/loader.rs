//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the client
//! configuration and wizard definitions from YAML files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{AdminError, AdminResult};

use super::types::{ClientConfig, WizardDefinition};

/// Loads and provides access to the client configuration.
///
/// # Directory Structure
///
/// ```text
/// config/university/
/// ├── client.yaml        # Backend base URL and endpoints
/// └── wizards/
///     ├── student.yaml   # One wizard definition per file
///     ├── staff.yaml
///     └── faculty.yaml
/// ```
///
/// # Example
///
/// ```no_run
/// use campus_admin::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/university")?;
/// let wizard = loader.wizard("student")?;
/// println!("{} has {} steps", wizard.title, wizard.step_count());
/// # Ok::<(), campus_admin::error::AdminError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    client: ClientConfig,
    wizards: BTreeMap<String, Arc<WizardDefinition>>,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// Returns an error if `client.yaml` or the `wizards` directory is
    /// missing, if any file contains invalid YAML, or if a wizard definition
    /// is inconsistent.
    pub fn load<P: AsRef<Path>>(path: P) -> AdminResult<Self> {
        let path = path.as_ref();

        let client = Self::load_yaml::<ClientConfig>(&path.join("client.yaml"))?;
        let wizards = Self::load_wizards(&path.join("wizards"))?;

        debug!(
            base_url = %client.base_url,
            wizards = wizards.len(),
            "Configuration loaded"
        );

        Ok(Self { client, wizards })
    }

    /// Builds a loader from already-parsed parts.
    pub fn from_parts(
        client: ClientConfig,
        wizards: impl IntoIterator<Item = WizardDefinition>,
    ) -> AdminResult<Self> {
        let mut map = BTreeMap::new();
        for wizard in wizards {
            Self::insert_wizard(&mut map, wizard, "<inline>")?;
        }
        Ok(Self {
            client,
            wizards: map,
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> AdminResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| AdminError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| AdminError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads every wizard definition from the wizards directory.
    fn load_wizards(dir: &Path) -> AdminResult<BTreeMap<String, Arc<WizardDefinition>>> {
        let dir_str = dir.display().to_string();

        let entries = fs::read_dir(dir).map_err(|_| AdminError::ConfigNotFound {
            path: dir_str.clone(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| AdminError::ConfigNotFound {
                path: dir_str.clone(),
            })?;
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                paths.push(path);
            }
        }
        paths.sort();

        let mut wizards = BTreeMap::new();
        for path in &paths {
            let wizard = Self::load_yaml::<WizardDefinition>(path)?;
            Self::insert_wizard(&mut wizards, wizard, &path.display().to_string())?;
        }

        if wizards.is_empty() {
            return Err(AdminError::ConfigNotFound {
                path: format!("{} (no wizard files found)", dir_str),
            });
        }

        Ok(wizards)
    }

    fn insert_wizard(
        wizards: &mut BTreeMap<String, Arc<WizardDefinition>>,
        wizard: WizardDefinition,
        source: &str,
    ) -> AdminResult<()> {
        wizard
            .check()
            .map_err(|message| AdminError::ConfigParseError {
                path: source.to_string(),
                message,
            })?;

        if wizards.contains_key(&wizard.kind) {
            return Err(AdminError::ConfigParseError {
                path: source.to_string(),
                message: format!("wizard '{}' is defined more than once", wizard.kind),
            });
        }

        wizards.insert(wizard.kind.clone(), Arc::new(wizard));
        Ok(())
    }

    /// Returns the backend connection settings.
    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    /// Returns the wizard registered under `kind`.
    pub fn wizard(&self, kind: &str) -> AdminResult<Arc<WizardDefinition>> {
        self.wizards
            .get(kind)
            .cloned()
            .ok_or_else(|| AdminError::WizardNotFound {
                kind: kind.to_string(),
            })
    }

    /// Returns the configured wizard kinds in sorted order.
    pub fn wizard_kinds(&self) -> Vec<&str> {
        self.wizards.keys().map(String::as_str).collect()
    }
}
