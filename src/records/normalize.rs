//! Record normalization: one text blob for the embedder, one flat
//! attribute map for the store's scalar-only metadata layer.

use super::{
    AttrValue, Attributes, DocType, Education, Employee, Job, MalformedRecord, Record, RecordBody,
    DOC_TYPE_KEY,
};
use serde_json::{Map, Value};

/// Output of [`normalize`]
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub id: String,
    pub doc_type: DocType,
    pub text: String,
    pub attributes: Attributes,
}

/// Normalize a validated record into embedding text and flat attributes.
///
/// The attribute map always carries the variant tag under [`DOC_TYPE_KEY`].
pub fn normalize(record: &Record) -> NormalizedRecord {
    let text = match &record.body {
        RecordBody::Employee(e) => employee_text(e),
        RecordBody::Job(j) => job_text(j),
    };

    let mut attributes = flatten_attributes(record.raw());
    attributes.insert(
        DOC_TYPE_KEY.to_string(),
        AttrValue::from(record.doc_type().as_str()),
    );

    NormalizedRecord {
        id: record.id.clone(),
        doc_type: record.doc_type(),
        text,
        attributes,
    }
}

/// Validate and normalize a raw JSON element in one step
pub fn normalize_value(value: &Value, doc_type: DocType) -> Result<NormalizedRecord, MalformedRecord> {
    Record::from_value(value, doc_type).map(|record| normalize(&record))
}

/// Flatten a raw record object into scalar attributes.
///
/// Lists become one `", "`-joined string, the nested `education` object is
/// spread into `education_<key>` entries, scalars pass through, and any other
/// nested value is stored as its JSON text.
pub fn flatten_attributes(object: &Map<String, Value>) -> Attributes {
    let mut flat = Attributes::new();

    for (key, value) in object {
        match value {
            Value::Object(inner) if key == "education" => {
                for (edu_key, edu_value) in inner {
                    let flattened = match edu_value {
                        Value::Null => AttrValue::Null,
                        other => AttrValue::Str(stringify(other)),
                    };
                    flat.insert(format!("education_{}", edu_key), flattened);
                }
            }
            Value::Array(items) => {
                let joined = items.iter().map(stringify).collect::<Vec<_>>().join(", ");
                flat.insert(key.clone(), AttrValue::Str(joined));
            }
            Value::Null => {
                flat.insert(key.clone(), AttrValue::Null);
            }
            Value::Bool(b) => {
                flat.insert(key.clone(), AttrValue::Bool(*b));
            }
            Value::Number(n) => {
                let scalar = match n.as_i64() {
                    Some(i) => AttrValue::Int(i),
                    None => AttrValue::Float(n.as_f64().unwrap_or_default()),
                };
                flat.insert(key.clone(), scalar);
            }
            Value::String(s) => {
                flat.insert(key.clone(), AttrValue::Str(s.clone()));
            }
            Value::Object(_) => {
                flat.insert(key.clone(), AttrValue::Str(value.to_string()));
            }
        }
    }

    flat
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn display_opt(value: &Option<AttrValue>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn education_text(education: Option<&Education>) -> String {
    let default = Education::default();
    let edu = education.unwrap_or(&default);
    let year = edu
        .graduation_year
        .as_ref()
        .and_then(AttrValue::as_text)
        .unwrap_or_else(|| "N/A".to_string());
    format!("{} {} ({})", edu.degree, edu.school, year)
}

fn employee_text(e: &Employee) -> String {
    format!(
        "Employee. Profile: {}. Position: {}. Department: {}. Skills: {}. Projects: {}. Education: {}. Languages: {}.",
        e.profile_summary,
        e.position,
        e.department,
        e.skills.join(", "),
        e.projects.join(". "),
        education_text(e.education.as_ref()),
        e.languages.join(", "),
    )
    .trim()
    .to_string()
}

fn job_text(j: &Job) -> String {
    format!(
        "Job posting. Title: {}. Department: {}. Location: {}. Employment type: {}. Required skills: {}. Preferred skills: {}. Experience: {}. Education: {}. Responsibilities: {}. Description: {}.",
        j.title,
        j.department,
        j.location,
        j.employment_type,
        j.required_skills.join(", "),
        j.preferred_skills.join(", "),
        display_opt(&j.experience_years),
        display_opt(&j.education),
        j.responsibilities.join(". "),
        j.description,
    )
    .trim()
    .to_string()
}
