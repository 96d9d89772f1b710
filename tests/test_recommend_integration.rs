use ahash::AHashSet;
use serde_json::json;
use std::sync::Arc;
use talent_match::config::{Config, RecommendConfig};
use talent_match::embedding::{EmbeddingProvider, HashEmbedProvider};
use talent_match::records::{DocType, RecordSource};
use talent_match::retrieval::{
    parse_languages, CandidateDetail, RecommendQuery, Recommender, Retriever, RetrievalConfig,
};
use talent_match::store::{
    AnnParams, Collection, IndexedEntry, Predicate, SqliteCollection, SqliteStore, StoreError,
    StoreHit,
};
use talent_match::sync::{IndexSynchronizer, SyncConfig};
use tempfile::TempDir;

/// Collection wrapper whose store rejects every predicate
struct NoPredicates<'a>(&'a SqliteCollection);

impl Collection for NoPredicates<'_> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn upsert(&self, entries: &[IndexedEntry]) -> Result<(), StoreError> {
        self.0.upsert(entries)
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<StoreHit>, StoreError> {
        match predicate {
            Some(_) => Err(StoreError::PredicateUnsupported(
                "metadata filters disabled".to_string(),
            )),
            None => self.0.query(vector, k, None),
        }
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.0.count()
    }

    fn ids(&self) -> Result<AHashSet<String>, StoreError> {
        self.0.ids()
    }
}

fn provider() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashEmbedProvider::new(256))
}

fn sample_records() -> RecordSource {
    RecordSource::from_value(&json!({
        "employees": [
            {
                "id": 101,
                "name": "Kim Minji",
                "position": "Backend Engineer",
                "department": "R&D",
                "profile_summary": "Builds web services and APIs",
                "skills": ["Rust", "PostgreSQL", "Kubernetes"],
                "projects": ["Web service development for payments", "Search API redesign"],
                "education": {"degree": "BSc", "school": "KAIST", "graduation_year": 2016},
                "languages": ["Korean(native)", "English(business)"]
            },
            {
                "id": "E-200",
                "name": "Lee Jun",
                "position": "Account Manager",
                "department": "Sales",
                "profile_summary": "Manages enterprise web service accounts",
                "skills": ["Negotiation"],
                "projects": ["Web service development partner program"],
                "languages": ["Korean(native)"]
            }
        ],
        "job_descriptions": [
            {
                "id": "J-1",
                "title": "Web Service Developer",
                "department": "Platform",
                "location": "Seoul",
                "employment_type": "Full-time",
                "required_skills": ["Go", "gRPC"],
                "experience_years": 3,
                "responsibilities": ["Web service development", "On-call rotation"],
                "description": "Develop and operate web services"
            }
        ]
    }))
}

fn synced(temp: &TempDir, records: &RecordSource) -> SqliteCollection {
    let store = SqliteStore::open(temp.path(), AnnParams::default()).unwrap();
    let config = Config::default();
    let (collection, report) = IndexSynchronizer::new(provider(), SyncConfig::from_config(&config))
        .sync(records, &store)
        .unwrap();
    assert!(report.failed_batches.is_empty());
    collection
}

fn recommender() -> Recommender {
    Recommender::new(provider(), &RecommendConfig::default())
}

#[test]
fn test_department_filter_end_to_end() {
    let temp = TempDir::new().unwrap();
    let collection = synced(&temp, &sample_records());

    let query = RecommendQuery::new("web service development", 5).with_department("R&D");
    let results = recommender().recommend(&collection, &query).unwrap();

    assert_eq!(results.len(), 1);
    let top = &results[0];
    assert_eq!(top.id, "101");
    assert_eq!(top.doc_type, DocType::Employee);
    assert_eq!(top.name_or_title, "Kim Minji");
    assert!(top
        .reasons
        .iter()
        .any(|r| r == "department match: R&D"));
    assert!(top.similarity >= -1e-5 - 1.0 && top.similarity <= 1.0 + 1e-5);
}

#[test]
fn test_doc_type_restriction_end_to_end() {
    let temp = TempDir::new().unwrap();
    let collection = synced(&temp, &sample_records());

    let query = RecommendQuery::new("web service development", 5)
        .with_doc_type(Some(DocType::Job));
    let results = recommender().recommend(&collection, &query).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "J-1");
    match &results[0].detail {
        CandidateDetail::Job {
            location,
            experience_years,
            ..
        } => {
            assert_eq!(location, "Seoul");
            assert_eq!(experience_years, "3");
        }
        other => panic!("expected job detail, got {:?}", other),
    }
    // pushed down to the store, so no backstop reason
    assert!(!results[0]
        .reasons
        .iter()
        .any(|r| r.starts_with("document type")));
}

#[test]
fn test_rejected_predicate_falls_back_and_still_filters() {
    let temp = TempDir::new().unwrap();
    let inner = synced(&temp, &sample_records());
    let collection = NoPredicates(&inner);

    let retriever = Retriever::new(provider(), RetrievalConfig::default());
    let pool = retriever
        .retrieve("web service development", &collection, 5, Some(DocType::Employee))
        .unwrap();
    assert!(!pool.variant_enforced);
    assert_eq!(pool.len(), 3);

    let query = RecommendQuery::new("web service development", 5)
        .with_doc_type(Some(DocType::Employee));
    let results = recommender().recommend(&collection, &query).unwrap();

    assert_eq!(results.len(), 2);
    for rec in &results {
        assert_eq!(rec.doc_type, DocType::Employee);
        assert_eq!(rec.reasons[0], "document type: employee");
    }
}

#[test]
fn test_language_requirement_end_to_end() {
    let temp = TempDir::new().unwrap();
    let collection = synced(&temp, &sample_records());

    let query = RecommendQuery::new("web service development", 5)
        .with_languages(parse_languages("english"))
        .with_doc_type(Some(DocType::Employee));
    let results = recommender().recommend(&collection, &query).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "101");
    assert!(results[0]
        .reasons
        .contains(&"required languages satisfied: english".to_string()));
}

#[test]
fn test_results_ordered_by_reasons_then_similarity() {
    let temp = TempDir::new().unwrap();
    let collection = synced(&temp, &sample_records());

    let query = RecommendQuery::new("web service development payments", 5);
    let results = recommender().recommend(&collection, &query).unwrap();

    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.reasons.len() > b.reasons.len()
                || (a.reasons.len() == b.reasons.len() && a.similarity >= b.similarity),
            "{} ranked above {}",
            a.id,
            b.id
        );
    }
    // employee 101 matches all four keywords in its projects
    let kim = results.iter().find(|r| r.id == "101").unwrap();
    assert_eq!(kim.reasons, vec!["4 keyword matches"]);
}

#[test]
fn test_limit_and_blank_query() {
    let temp = TempDir::new().unwrap();
    let collection = synced(&temp, &sample_records());

    let results = recommender()
        .recommend(&collection, &RecommendQuery::new("   ", 2))
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn test_empty_index_returns_no_results() {
    let temp = TempDir::new().unwrap();
    let collection = synced(&temp, &RecordSource::default());

    let query = RecommendQuery::new("web service development", 5).with_department("R&D");
    let results = recommender().recommend(&collection, &query).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_filters_can_empty_the_pool() {
    let temp = TempDir::new().unwrap();
    let collection = synced(&temp, &sample_records());

    let query = RecommendQuery::new("web service development", 5).with_department("Legal");
    let results = recommender().recommend(&collection, &query).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_pipeline_from_data_file() {
    let temp = TempDir::new().unwrap();
    let data_path = temp.path().join("hr_data.json");
    std::fs::write(
        &data_path,
        r#"{
            "employees": [
                {"id": "E1", "name": "Park", "department": "R&D",
                 "projects": ["Mobile app launch"], "languages": ["English"]}
            ],
            "job_descriptions": {"unexpected": "shape"}
        }"#,
    )
    .unwrap();

    let records = RecordSource::load(&data_path).unwrap();
    assert_eq!(records.employees.len(), 1);
    assert!(records.job_descriptions.is_empty());

    let store_dir = temp.path().join("store");
    let store = SqliteStore::open(&store_dir, AnnParams::default()).unwrap();
    let (collection, _) = IndexSynchronizer::new(provider(), SyncConfig::default())
        .sync(&records, &store)
        .unwrap();

    let results = recommender()
        .recommend(&collection, &RecommendQuery::new("mobile app", 5))
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].reasons, vec!["2 keyword matches"]);

    assert!(RecordSource::load(&temp.path().join("missing.json")).is_err());
}
