//! talent-match - Semantic talent matching
//!
//! Embeds employee profiles and job postings into a persisted vector index,
//! then answers free-text project descriptions with a ranked list of
//! candidates, narrowed by department, language, and document type, each
//! carrying the reasons it was ranked where it was.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod records;
pub mod retrieval;
pub mod store;
pub mod sync;

pub use error::{MatchError, Result};
