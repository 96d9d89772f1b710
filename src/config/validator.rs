use crate::config::Config;
use crate::error::{MatchError, Result, ValidationError};
use regex::Regex;

const SUPPORTED_PROVIDERS: [&str; 2] = ["fastembed", "hash"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_recommend(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MatchError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked at load time: the store directory is created
        // on demand and the data file may be supplied on the command line.
        if config.storage.data_file.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_file",
                "Data file path cannot be empty",
            ));
        }

        if config.storage.store_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.store_dir",
                "Store directory cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.embedding.provider;
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    SUPPORTED_PROVIDERS, provider
                ),
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        let name = &config.index.collection;
        if !Self::is_valid_collection_name(name) {
            errors.push(ValidationError::new(
                "index.collection",
                format!(
                    "Collection name must be 3-63 characters of [A-Za-z0-9._-], starting and ending alphanumeric, got '{}'",
                    name
                ),
            ));
        }

        if config.index.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_recommend(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.recommend.num_results == 0 {
            errors.push(ValidationError::new(
                "recommend.num_results",
                "Result count must be greater than 0",
            ));
        }

        if config.recommend.overfetch_factor == 0 {
            errors.push(ValidationError::new(
                "recommend.overfetch_factor",
                "Over-fetch factor must be greater than 0",
            ));
        }

        if config.recommend.default_query.trim().is_empty() {
            errors.push(ValidationError::new(
                "recommend.default_query",
                "Default query cannot be blank",
            ));
        }
    }

    fn is_valid_collection_name(name: &str) -> bool {
        match Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{1,61}[A-Za-z0-9]$") {
            Ok(re) => re.is_match(name),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_empty_data_file() {
        let mut config = Config::default();
        config.storage.data_file = PathBuf::new();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_invalid_provider() {
        let mut config = Config::default();
        config.embedding.provider = "openai".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collection_names() {
        assert!(ConfigValidator::is_valid_collection_name("hr_job_embeddings"));
        assert!(ConfigValidator::is_valid_collection_name("a.b"));
        assert!(!ConfigValidator::is_valid_collection_name("ab"));
        assert!(!ConfigValidator::is_valid_collection_name("_leading"));
        assert!(!ConfigValidator::is_valid_collection_name("has space"));
    }

    #[test]
    fn test_collects_every_violation() {
        let mut config = Config::default();
        config.embedding.batch_size = 0;
        config.recommend.num_results = 0;

        match ConfigValidator::validate(&config) {
            Err(MatchError::ConfigValidation { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
