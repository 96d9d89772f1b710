//! Query-scoped projections of indexed entries

use crate::records::{AttrValue, Attributes, DocType};
use crate::store::StoreHit;
use serde::Serialize;

const MISSING: &str = "N/A";

/// Variant-specific fields carried alongside a candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "doc_type", rename_all = "lowercase")]
pub enum CandidateDetail {
    Employee {
        position: String,
        projects: String,
        languages: String,
    },
    Job {
        location: String,
        employment_type: String,
        experience_years: String,
        responsibilities: String,
    },
}

/// One retrieved entry plus the reasons it survived reranking
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub doc_type: DocType,
    /// Cosine distance from the query embedding
    pub distance: f32,
    pub name_or_title: String,
    pub department: String,
    pub profile_or_description: String,
    pub skills_info: String,
    pub detail: CandidateDetail,
    pub reasons: Vec<String>,
}

fn text(attributes: &Attributes, key: &str) -> String {
    attributes
        .get(key)
        .and_then(AttrValue::as_text)
        .unwrap_or_default()
}

fn text_or_missing(attributes: &Attributes, key: &str) -> String {
    let value = text(attributes, key);
    if value.is_empty() {
        MISSING.to_string()
    } else {
        value
    }
}

impl Candidate {
    pub fn from_hit(hit: StoreHit) -> Self {
        let attrs = &hit.attributes;

        let (name_or_title, profile_or_description, skills_info, detail) = match hit.doc_type {
            DocType::Employee => (
                text_or_missing(attrs, "name"),
                text(attrs, "profile_summary"),
                text(attrs, "skills"),
                CandidateDetail::Employee {
                    position: text(attrs, "position"),
                    projects: text(attrs, "projects"),
                    languages: text(attrs, "languages"),
                },
            ),
            DocType::Job => (
                text_or_missing(attrs, "title"),
                text(attrs, "description"),
                text(attrs, "required_skills"),
                CandidateDetail::Job {
                    location: text(attrs, "location"),
                    employment_type: text(attrs, "employment_type"),
                    experience_years: text(attrs, "experience_years"),
                    responsibilities: text(attrs, "responsibilities"),
                },
            ),
        };

        Self {
            department: text(attrs, "department"),
            id: hit.id,
            doc_type: hit.doc_type,
            distance: hit.distance,
            name_or_title,
            profile_or_description,
            skills_info,
            detail,
            reasons: Vec::new(),
        }
    }

    /// Text searched by keyword annotation: project history for employees,
    /// responsibilities and description for jobs
    pub fn keyword_span(&self) -> String {
        match &self.detail {
            CandidateDetail::Employee { projects, .. } => projects.clone(),
            CandidateDetail::Job {
                responsibilities, ..
            } => format!("{} {}", responsibilities, self.profile_or_description),
        }
    }

    /// Flattened language field, `None` for jobs
    pub fn languages(&self) -> Option<&str> {
        match &self.detail {
            CandidateDetail::Employee { languages, .. } => Some(languages),
            CandidateDetail::Job { .. } => None,
        }
    }
}

/// Final ranked output record
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub doc_type: DocType,
    pub name_or_title: String,
    pub department: String,
    /// `1 - distance`
    pub similarity: f32,
    pub profile_or_description: String,
    pub skills_info: String,
    pub detail: CandidateDetail,
    pub reasons: Vec<String>,
}

impl From<Candidate> for Recommendation {
    fn from(c: Candidate) -> Self {
        Self {
            id: c.id,
            doc_type: c.doc_type,
            name_or_title: c.name_or_title,
            department: c.department,
            similarity: 1.0 - c.distance,
            profile_or_description: c.profile_or_description,
            skills_info: c.skills_info,
            detail: c.detail,
            reasons: c.reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc_type: DocType, pairs: &[(&str, &str)]) -> StoreHit {
        StoreHit {
            id: "x1".to_string(),
            doc_type,
            distance: 0.25,
            document: String::new(),
            attributes: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), AttrValue::from(*v)))
                .collect(),
        }
    }

    #[test]
    fn test_employee_projection() {
        let candidate = Candidate::from_hit(hit(
            DocType::Employee,
            &[
                ("name", "Kim"),
                ("department", "R&D"),
                ("skills", "Rust, SQL"),
                ("projects", "Billing API, Search revamp"),
                ("languages", "Korean(native), English(business)"),
            ],
        ));

        assert_eq!(candidate.name_or_title, "Kim");
        assert_eq!(candidate.skills_info, "Rust, SQL");
        assert_eq!(candidate.keyword_span(), "Billing API, Search revamp");
        assert_eq!(
            candidate.languages(),
            Some("Korean(native), English(business)")
        );
    }

    #[test]
    fn test_job_projection_and_missing_fields() {
        let candidate = Candidate::from_hit(hit(
            DocType::Job,
            &[
                ("responsibilities", "Build services"),
                ("description", "Backend role"),
            ],
        ));

        assert_eq!(candidate.name_or_title, "N/A");
        assert_eq!(candidate.department, "");
        assert_eq!(candidate.keyword_span(), "Build services Backend role");
        assert!(candidate.languages().is_none());

        let rec = Recommendation::from(candidate);
        assert!((rec.similarity - 0.75).abs() < 1e-6);
    }
}
