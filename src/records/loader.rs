//! Integrated data file loading (`employees` + `job_descriptions`)

use super::{DocType, Record};
use crate::error::{MatchError, Result};
use ahash::AHashSet;
use serde_json::Value;
use std::path::Path;

const EMPLOYEES_KEY: &str = "employees";
const JOBS_KEY: &str = "job_descriptions";

/// Raw record elements of both variants, as read from the source
#[derive(Debug, Clone, Default)]
pub struct RecordSource {
    pub employees: Vec<Value>,
    pub job_descriptions: Vec<Value>,
}

impl RecordSource {
    /// Load the integrated JSON file.
    ///
    /// A missing file or invalid JSON is fatal. A missing key or a non-list
    /// value only yields zero records of that variant.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MatchError::DataNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MatchError::Io {
            source: e,
            context: format!("Failed to read data file: {:?}", path),
        })?;

        let source = Self::from_json_str(&content).map_err(|e| match e {
            MatchError::Json { source, .. } => MatchError::Json {
                source,
                context: format!("Malformed data file: {:?}", path),
            },
            other => other,
        })?;

        tracing::info!(
            "Loaded {} employees and {} job descriptions from {}",
            source.employees.len(),
            source.job_descriptions.len(),
            path.display()
        );

        Ok(source)
    }

    /// Parse integrated JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).map_err(|e| MatchError::Json {
            source: e,
            context: "Malformed record data".to_string(),
        })?;
        Ok(Self::from_value(&value))
    }

    /// Extract both lists from an already-parsed document
    pub fn from_value(value: &Value) -> Self {
        Self {
            employees: extract_list(value, EMPLOYEES_KEY),
            job_descriptions: extract_list(value, JOBS_KEY),
        }
    }

    pub fn new(employees: Vec<Value>, job_descriptions: Vec<Value>) -> Self {
        Self {
            employees,
            job_descriptions,
        }
    }

    /// Total number of raw elements, well-formed or not
    pub fn len(&self) -> usize {
        self.employees.len() + self.job_descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All elements with their variant tag, employees first
    pub fn iter(&self) -> impl Iterator<Item = (DocType, &Value)> {
        self.employees
            .iter()
            .map(|v| (DocType::Employee, v))
            .chain(self.job_descriptions.iter().map(|v| (DocType::Job, v)))
    }

    /// IDs of every element that parses as a record, i.e. the ids a
    /// complete sync would index
    pub fn ids(&self) -> AHashSet<String> {
        self.iter()
            .filter_map(|(doc_type, v)| Record::from_value(v, doc_type).ok())
            .map(|record| record.id)
            .collect()
    }
}

fn extract_list(value: &Value, key: &str) -> Vec<Value> {
    match value.get(key) {
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            tracing::warn!("Value under '{}' is not a list, treating as empty", key);
            Vec::new()
        }
        None => {
            tracing::warn!("No '{}' key in record data, treating as empty", key);
            Vec::new()
        }
    }
}
