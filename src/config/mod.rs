//! Configuration management for talent-match
//!
//! Every tunable the pipeline reads (model, batch size, collection name,
//! result count, staleness policy) lives here and is passed explicitly into
//! the synchronizer and retriever at construction.

use crate::error::{MatchError, Result};
use crate::sync::StalenessPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub recommend: RecommendConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where records come from and where the index lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Integrated JSON file holding `employees` and `job_descriptions`
    pub data_file: PathBuf,
    /// Directory of the persisted index store
    pub store_dir: PathBuf,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String, // "fastembed" or "hash"
    pub model: String,
    pub dimension: usize,
    /// Records embedded and upserted per store call
    pub batch_size: usize,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub collection: String,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    #[serde(default)]
    pub staleness: StalenessPolicy,
}

/// Query-time defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    pub num_results: usize,
    pub overfetch_factor: usize,
    pub min_candidates: usize,
    pub default_query: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "fastembed".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            batch_size: 5000,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: "hr_job_embeddings".to_string(),
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
            staleness: StalenessPolicy::Count,
        }
    }
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            num_results: 5,
            overfetch_factor: 5,
            min_candidates: 20,
            default_query: "software development project".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MatchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MatchError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| MatchError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: TALENT_MATCH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("TALENT_MATCH_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EMBEDDING__PROVIDER" => {
                self.embedding.provider = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__BATCH_SIZE" => {
                self.embedding.batch_size = parse_usize(path, value)?;
            }
            "INDEX__COLLECTION" => {
                self.index.collection = value.to_string();
            }
            "INDEX__STALENESS" => {
                self.index.staleness =
                    value
                        .parse()
                        .map_err(|message| MatchError::InvalidConfigValue {
                            path: path.to_string(),
                            message,
                        })?;
            }
            "RECOMMEND__NUM_RESULTS" => {
                self.recommend.num_results = parse_usize(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| MatchError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("talent-match").join("config.toml"))
    }
}

fn parse_usize(path: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| MatchError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}' as a positive integer", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_file: PathBuf::from("data/hr_data.json"),
                store_dir: PathBuf::from("~/.talent-match/store"),
            },
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            recommend: RecommendConfig::default(),
        }
    }
}
