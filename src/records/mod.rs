//! Employee and job-posting records
//!
//! Records arrive as loosely-typed JSON objects. Each one is tagged with a
//! [`DocType`] the moment it is read and the tag travels with it through
//! normalization, the index store, retrieval, and reranking.

mod loader;
mod normalize;

pub use loader::RecordSource;
pub use normalize::{flatten_attributes, normalize, normalize_value, NormalizedRecord};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Flattened, scalar-only attribute map stored next to each embedding
pub type Attributes = BTreeMap<String, AttrValue>;

/// Attribute key carrying the variant tag
pub const DOC_TYPE_KEY: &str = "doc_type";

/// Discriminator between the two record variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Employee,
    Job,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Employee => "employee",
            DocType::Job => "job",
        }
    }

    /// Display name used in rendered results
    pub fn label(&self) -> &'static str {
        match self {
            DocType::Employee => "Employee",
            DocType::Job => "Job",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "employee" => Ok(DocType::Employee),
            "job" => Ok(DocType::Job),
            other => Err(format!(
                "unknown document type '{}', expected 'employee' or 'job'",
                other
            )),
        }
    }
}

/// Scalar attribute value accepted by the index store's metadata layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    /// Text form of the value, `None` for null
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => Ok(()),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(x) => write!(f, "{}", x),
            AttrValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

/// Rejection raised for a record that cannot be indexed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedRecord {
    #[error("{doc_type} record has no id: {preview}")]
    MissingId { doc_type: DocType, preview: String },

    #[error("{doc_type} record {id} has an invalid field: {message}")]
    InvalidField {
        doc_type: DocType,
        id: String,
        message: String,
    },
}

/// Explicit `null` reads as the field's default, same as an absent key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Structured education entry of an employee
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    #[serde(deserialize_with = "null_as_default")]
    pub degree: String,
    #[serde(deserialize_with = "null_as_default")]
    pub school: String,
    pub graduation_year: Option<AttrValue>,
}

/// Employee profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Employee {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub position: String,
    #[serde(deserialize_with = "null_as_default")]
    pub department: String,
    #[serde(deserialize_with = "null_as_default")]
    pub profile_summary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub projects: Vec<String>,
    pub education: Option<Education>,
    #[serde(deserialize_with = "null_as_default")]
    pub languages: Vec<String>,
}

/// Job posting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub department: String,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub employment_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub required_skills: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub preferred_skills: Vec<String>,
    pub experience_years: Option<AttrValue>,
    pub education: Option<AttrValue>,
    #[serde(deserialize_with = "null_as_default")]
    pub responsibilities: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
}

/// Variant-specific body of a record
#[derive(Debug, Clone)]
pub enum RecordBody {
    Employee(Employee),
    Job(Job),
}

/// A validated record: identity, typed body, and the raw object it came from
#[derive(Debug, Clone)]
pub struct Record {
    pub id: String,
    pub body: RecordBody,
    raw: Map<String, Value>,
}

impl Record {
    /// Parse a raw JSON element as a record of the given variant
    pub fn from_value(value: &Value, doc_type: DocType) -> Result<Self, MalformedRecord> {
        let id = record_id(value).ok_or_else(|| MalformedRecord::MissingId {
            doc_type,
            preview: preview(value),
        })?;

        // record_id only succeeds for objects
        let raw = value.as_object().cloned().unwrap_or_default();

        let invalid = |e: serde_json::Error| MalformedRecord::InvalidField {
            doc_type,
            id: id.clone(),
            message: e.to_string(),
        };

        let body = match doc_type {
            DocType::Employee => {
                RecordBody::Employee(serde_json::from_value(value.clone()).map_err(invalid)?)
            }
            DocType::Job => RecordBody::Job(serde_json::from_value(value.clone()).map_err(invalid)?),
        };

        Ok(Self { id, body, raw })
    }

    pub fn doc_type(&self) -> DocType {
        match self.body {
            RecordBody::Employee(_) => DocType::Employee,
            RecordBody::Job(_) => DocType::Job,
        }
    }

    pub fn department(&self) -> &str {
        match &self.body {
            RecordBody::Employee(e) => &e.department,
            RecordBody::Job(j) => &j.department,
        }
    }

    /// The object as loaded, including keys the typed body does not model
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }
}

/// Identity of a raw element: a string id, or an integer id rendered as text
pub fn record_id(value: &Value) -> Option<String> {
    match value.as_object()?.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() <= 100 {
        text
    } else {
        let cut: String = text.chars().take(100).collect();
        format!("{}...", cut)
    }
}
