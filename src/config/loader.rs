//! Configuration Loader
//!
//! Environment-aware YAML loading: a base file plus an optional
//! per-environment overlay directory, mirroring how operators deploy the
//! engine alongside its collaborators.

use super::OutreachConfig;
use crate::error::{OutreachError, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const CONFIG_FILE_NAME: &str = "outreach-config.yaml";

/// Loaded configuration with its provenance
pub struct ConfigManager {
    config: OutreachConfig,
    environment: String,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    ///
    /// Looks for `OUTREACH_CONFIG_DIR/outreach-config.yaml`, then
    /// `config/outreach-config.yaml`; falls back to compiled-in defaults when
    /// no file is present.
    pub fn load() -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        let candidates = [
            env::var("OUTREACH_CONFIG_DIR")
                .ok()
                .map(|dir| PathBuf::from(dir).join(CONFIG_FILE_NAME)),
            Some(PathBuf::from("config").join(CONFIG_FILE_NAME)),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.exists() {
                return Self::load_from_file(&candidate, &environment);
            }
        }

        debug!(
            environment = %environment,
            "No configuration file found, using compiled-in defaults"
        );
        let config = OutreachConfig::default();
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_path: None,
        }))
    }

    /// Load configuration from an explicit YAML file
    pub fn load_from_file(path: &Path, environment: &str) -> Result<Arc<ConfigManager>> {
        debug!(
            environment = environment,
            path = %path.display(),
            "Loading configuration"
        );

        let contents = std::fs::read_to_string(path).map_err(|e| {
            OutreachError::configuration(format!("failed to read {}: {e}", path.display()))
        })?;

        let config: OutreachConfig = serde_yaml::from_str(&contents).map_err(|e| {
            OutreachError::configuration(format!("failed to parse {}: {e}", path.display()))
        })?;

        config.validate()?;

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_path: Some(path.to_path_buf()),
        }))
    }

    pub fn config(&self) -> &OutreachConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    fn detect_environment() -> String {
        env::var("OUTREACH_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| {
                warn!("OUTREACH_ENV not set, defaulting to development");
                "development".to_string()
            })
    }
}
