//! Engine configuration, persisted as TOML.
//!
//! Every field has a serde default, so an empty file (or no file at all)
//! yields the same configuration as [`EngineConfig::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::vocabulary::Vocabulary;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Behaviour switches and collaborator settings for the batch engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Stamp the acting user as `contributor` on created content.
    #[serde(default = "default_true")]
    pub use_user_id: bool,
    /// Stamp `date` (YYYY-MM-DD) on created content.
    #[serde(default = "default_true")]
    pub use_creation_date: bool,
    /// Include reasoner-inferred types in rendered responses.
    #[serde(default = "default_true")]
    pub add_inferences: bool,
    /// Run the pre-save validator before `store`.
    #[serde(default = "default_true")]
    pub validate_before_save: bool,
    /// Reject class ids in expressions that the vocabulary does not know.
    #[serde(default)]
    pub check_literal_identifiers: bool,
    /// Directory for stored models. `None` disables `store`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Ontology imports applied by `update-imports`.
    #[serde(default = "default_imports")]
    pub imports: Vec<String>,
    /// Base URL of an external label lookup service.
    #[serde(default)]
    pub label_service: Option<String>,
    #[serde(default = "Vocabulary::builtin")]
    pub vocabulary: Vocabulary,
}

fn default_true() -> bool {
    true
}
fn default_imports() -> Vec<String> {
    vec!["http://purl.obolibrary.org/obo/go.owl".into()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_user_id: true,
            use_creation_date: true,
            add_inferences: true,
            validate_before_save: true,
            check_literal_identifiers: false,
            data_dir: None,
            imports: default_imports(),
            label_service: None,
            vocabulary: Vocabulary::builtin(),
        }
    }
}

impl EngineConfig {
    /// Memory-only configuration with persistence under `dir`.
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config: EngineConfig = toml::from_str(
            r#"
            validate_before_save = false
            data_dir = "/tmp/models"

            [[vocabulary.relations]]
            id = "RO:0002333"
            label = "enabled by"
            relevant = true
            "#,
        )
        .unwrap();
        assert!(!config.validate_before_save);
        assert!(config.use_user_id);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/models")));
        assert_eq!(config.vocabulary.relations.len(), 1);
        assert!(config.vocabulary.classes.is_empty());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("m3.toml");
        let mut config = EngineConfig::default();
        config.check_literal_identifiers = true;
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/m3.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
