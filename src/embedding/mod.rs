/// Text embedding
///
/// The pipeline treats the model as an opaque, deterministic
/// `texts -> fixed-dimension vectors` function behind [`EmbeddingProvider`].
/// Two backends:
/// - FastEmbedProvider: local ONNX sentence model (all-MiniLM-L6-v2, 384-dim)
/// - HashEmbedProvider: feature-hashed bag of words, no model download
mod hash;
mod provider;

pub use hash::HashEmbedProvider;
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};

use crate::config::EmbeddingConfig;

/// Build the provider named in the configuration
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "fastembed" => Ok(Box::new(FastEmbedProvider::new(&config.model)?)),
        "hash" => Ok(Box::new(HashEmbedProvider::new(config.dimension))),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unsupported embedding provider: {}",
            other
        ))),
    }
}
