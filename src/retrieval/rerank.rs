//! Rerank & filter stages
//!
//! Stages run in a fixed order: variant backstop, department, keyword
//! annotation, languages, sort, truncate. A filtering stage tags every
//! survivor with a reason; an empty list is passed through, never an error.

use super::{Candidate, CandidatePool};
use crate::records::DocType;
use std::cmp::Reverse;

/// Query-side inputs to reranking
#[derive(Debug, Clone, Default)]
pub struct RerankOptions<'a> {
    pub query_text: &'a str,
    pub k: usize,
    pub department: Option<&'a str>,
    pub languages: &'a [String],
    pub doc_type: Option<DocType>,
}

/// Run every stage and return at most `k` candidates
pub fn rerank(pool: CandidatePool, options: &RerankOptions<'_>) -> Vec<Candidate> {
    let mut candidates = pool.candidates;

    if let Some(doc_type) = options.doc_type {
        if !pool.variant_enforced {
            candidates = apply_variant_backstop(candidates, doc_type);
        }
    }

    if let Some(department) = options.department {
        candidates = filter_department(candidates, department);
    }

    annotate_keywords(&mut candidates, options.query_text);

    if !options.languages.is_empty() {
        candidates = filter_languages(candidates, options.languages);
    }

    sort_candidates(&mut candidates);
    candidates.truncate(options.k);
    candidates
}

/// Keep only candidates of `doc_type`
pub fn apply_variant_backstop(candidates: Vec<Candidate>, doc_type: DocType) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| c.doc_type == doc_type)
        .map(|mut c| {
            c.reasons.push(format!("document type: {}", doc_type));
            c
        })
        .collect()
}

/// Keep candidates whose department equals `department`, ignoring case
pub fn filter_department(candidates: Vec<Candidate>, department: &str) -> Vec<Candidate> {
    let wanted = department.to_lowercase();
    candidates
        .into_iter()
        .filter(|c| c.department.to_lowercase() == wanted)
        .map(|mut c| {
            let reason = format!("department match: {}", c.department);
            c.reasons.push(reason);
            c
        })
        .collect()
}

/// Lower-cased whitespace tokens longer than two characters
pub fn query_keywords(query_text: &str) -> Vec<String> {
    query_text
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Count keyword hits in each candidate's text span; never removes a candidate
pub fn annotate_keywords(candidates: &mut [Candidate], query_text: &str) {
    let keywords = query_keywords(query_text);
    if keywords.is_empty() {
        return;
    }

    for candidate in candidates.iter_mut() {
        let span = candidate.keyword_span().to_lowercase();
        let matches = keywords.iter().filter(|k| span.contains(k.as_str())).count();
        if matches > 0 {
            candidate.reasons.push(format!("{} keyword matches", matches));
        }
    }
}

/// Keep employees whose language field contains every required language as a
/// case-insensitive substring. Jobs pass through untouched.
pub fn filter_languages(candidates: Vec<Candidate>, required: &[String]) -> Vec<Candidate> {
    let wanted: Vec<String> = required.iter().map(|l| l.to_lowercase()).collect();
    let reason = format!("required languages satisfied: {}", required.join(", "));

    candidates
        .into_iter()
        .filter_map(|mut c| {
            let languages = match c.languages() {
                Some(languages) => languages.to_lowercase(),
                None => return Some(c),
            };
            if wanted.iter().all(|l| languages.contains(l.as_str())) {
                c.reasons.push(reason.clone());
                Some(c)
            } else {
                None
            }
        })
        .collect()
}

/// More reasons first, then closer distance. Stable.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        Reverse(a.reasons.len())
            .cmp(&Reverse(b.reasons.len()))
            .then_with(|| a.distance.total_cmp(&b.distance))
    });
}
