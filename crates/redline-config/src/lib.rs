use redline_engine::schema::{CachedSchema, DefaultSchema, Schema, StaticVocabulary, Vocabulary};
use redline_engine::store::DEFAULT_MAX_ATTEMPTS;
use redline_engine::{DiffConfig, EngineConfig, Mark, MatcherConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Compare-and-swap attempts before a batch gives up.
    pub max_attempts: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Restricts which blocks and marks operations may create. Unset lists
/// fall back to the full default vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularySettings {
    pub ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marks: Option<BTreeSet<Mark>>,
}

impl Default for VocabularySettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            blocks: None,
            marks: None,
        }
    }
}

impl VocabularySettings {
    pub fn schema(&self) -> Arc<dyn Schema> {
        if self.blocks.is_none() && self.marks.is_none() {
            return Arc::new(DefaultSchema);
        }
        let defaults = Vocabulary::default();
        let vocabulary = Vocabulary {
            blocks: self.blocks.clone().unwrap_or(defaults.blocks),
            marks: self.marks.clone().unwrap_or(defaults.marks),
        };
        Arc::new(CachedSchema::new(
            StaticVocabulary(vocabulary),
            Duration::from_secs(self.ttl_secs),
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory searched for `<id>.json` when a document is named by id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_path: Option<PathBuf>,
    pub matcher: MatcherConfig,
    pub diff: DiffConfig,
    pub store: StoreSettings,
    pub vocabulary: VocabularySettings,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config.documents_path = config
            .documents_path
            .map(|path| Self::expand_path(&path).unwrap_or(path));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Like [`Config::load`], with defaults when no file exists.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Ok(Self::load()?.unwrap_or_default())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/redline");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            matcher: self.matcher.clone(),
            diff: self.diff.clone(),
        }
    }

    /// Resolves a document argument: existing paths are used as given,
    /// bare ids are looked up under `documents_path`.
    pub fn document_path(&self, document: &str) -> PathBuf {
        let direct = PathBuf::from(document);
        if direct.exists() {
            return direct;
        }
        match &self.documents_path {
            Some(dir) if !document.contains(std::path::MAIN_SEPARATOR) => dir.join(format!("{document}.json")),
            _ => direct,
        }
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
