//! # Configuration
//!
//! Optional TOML file tuning the core's policies:
//!
//! ```toml
//! [selector]
//! default_placement = [8, 1, 1]
//! default_context = "general"
//!
//! [selector.placements]
//! animal = [1, 1, 2]
//! vehicle = [1, 2, 1]
//!
//! [tension]
//! branch_weight = 500
//! context_weight = 250
//! ```
//!
//! The path comes from `--config`, else `AXIOM_CONFIG`, else defaults apply.

use crate::error::AppError;
use axiom_core::{Clock, GraphStore, SelectorPolicy, StrategySelector, SystemClock, TensionPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "AXIOM_CONFIG";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxiomConfig {
    pub selector: SelectorPolicy,
    pub tension: TensionPolicy,
}

impl AxiomConfig {
    /// Load from `path`, else from `AXIOM_CONFIG`, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let from_env = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            AppError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(AppError::ConfigError(format!(
                "{} exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        toml::from_str(content).map_err(|e| AppError::ConfigError(e.to_string()))
    }

    /// A fresh store stamped by the wall clock.
    #[must_use]
    pub fn build_store(&self) -> GraphStore {
        self.build_store_with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn build_store_with_clock(&self, clock: Arc<dyn Clock>) -> GraphStore {
        GraphStore::with_clock(clock).with_tension_policy(self.tension)
    }

    #[must_use]
    pub fn selector(&self) -> StrategySelector {
        StrategySelector::new(self.selector.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AxiomConfig::from_toml_str("").expect("parse");
        assert_eq!(config, AxiomConfig::default());
        assert_eq!(config.selector.default_placement, (8, 1, 1));
        assert_eq!(config.tension.branch_weight, 500);
    }

    #[test]
    fn partial_tables_merge_with_defaults() {
        let config = AxiomConfig::from_toml_str(
            r#"
            [selector.placements]
            animal = [1, 1, 2]

            [tension]
            branch_weight = 100
            "#,
        )
        .expect("parse");

        assert_eq!(config.selector.placements.get("animal"), Some(&(1, 1, 2)));
        assert_eq!(config.selector.default_context, "general");
        assert_eq!(config.tension.branch_weight, 100);
        assert_eq!(config.tension.context_weight, 250);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            AxiomConfig::from_toml_str("[storage]\npath = \"x\""),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn store_uses_tension_weights() {
        let config = AxiomConfig::from_toml_str("[tension]\ncontext_weight = 9").expect("parse");
        let store = config.build_store();
        assert_eq!(store.tension_policy().context_weight, 9);
    }
}
