use std::path::{Path, PathBuf};
use std::sync::Arc;
use talent_match::cli::{Cli, Commands, ConfigAction, DocTypeArg};
use talent_match::config::Config;
use talent_match::embedding::{create_provider, EmbeddingProvider};
use talent_match::error::{MatchError, Result};
use talent_match::records::RecordSource;
use talent_match::retrieval::{
    parse_languages, CandidateDetail, RecommendQuery, Recommendation, Recommender,
};
use talent_match::store::{AnnParams, Collection, IndexStore, SqliteStore};
use talent_match::sync::{IndexSynchronizer, SyncConfig, SyncReport};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    let overrides = PathOverrides {
        config: cli.config,
        data: cli.data,
        store: cli.store,
    };

    match cli.command {
        Commands::Sync { json } => {
            cmd_sync(&overrides, json)?;
        }
        Commands::Query {
            text,
            department,
            languages,
            doc_type,
            limit,
            skip_sync,
            json,
        } => {
            let request = QueryRequest {
                text: text.unwrap_or_default(),
                department,
                languages,
                doc_type,
                limit,
                skip_sync,
                json,
            };
            cmd_query(&overrides, request)?;
        }
        Commands::Status => {
            cmd_status(&overrides)?;
        }
        Commands::Config { action } => {
            cmd_config(&overrides, action)?;
        }
    }

    Ok(())
}

struct PathOverrides {
    config: Option<PathBuf>,
    data: Option<PathBuf>,
    store: Option<PathBuf>,
}

struct QueryRequest {
    text: String,
    department: Option<String>,
    languages: Option<String>,
    doc_type: DocTypeArg,
    limit: Option<usize>,
    skip_sync: bool,
    json: bool,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "talent_match=debug"
    } else {
        "talent_match=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_sync(overrides: &PathOverrides, json: bool) -> Result<()> {
    let config = load_config(overrides)?;
    let provider = build_provider(&config)?;
    let store = open_store(&config)?;

    let (_collection, report) = run_sync(&config, provider, &store)?;

    if json {
        println!("{}", to_json(&report)?);
    } else {
        print_sync_report(&report);
    }

    Ok(())
}

fn cmd_query(overrides: &PathOverrides, request: QueryRequest) -> Result<()> {
    let config = load_config(overrides)?;
    let provider = build_provider(&config)?;
    let store = open_store(&config)?;

    let collection = if request.skip_sync {
        match store.get(&config.index.collection)? {
            Some(collection) => collection,
            None => {
                if request.json {
                    println!("[]");
                } else {
                    println!("No matching candidates found.");
                    println!(
                        "Index '{}' does not exist yet. Run 'talent-match sync' first.",
                        config.index.collection
                    );
                }
                return Ok(());
            }
        }
    } else {
        let (collection, report) = run_sync(&config, Arc::clone(&provider), &store)?;
        if !report.failed_batches.is_empty() {
            eprintln!(
                "⚠ {} batch(es) failed during sync; results may be incomplete",
                report.failed_batches.len()
            );
        }
        collection
    };

    let limit = request.limit.unwrap_or(config.recommend.num_results);
    let query = RecommendQuery::new(request.text, limit)
        .with_department(request.department.unwrap_or_default())
        .with_languages(
            request
                .languages
                .as_deref()
                .map(parse_languages)
                .unwrap_or_default(),
        )
        .with_doc_type(request.doc_type.to_filter());

    let recommender = Recommender::new(provider, &config.recommend);
    let results = recommender.recommend(&collection, &query)?;

    if request.json {
        println!("{}", to_json(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No matching candidates found.");
        if collection.count()? > 0 {
            println!("Try relaxing --department, --languages or --doc-type.");
        } else {
            println!(
                "The index is empty. Check the record file: {}",
                config.storage.data_file.display()
            );
        }
        return Ok(());
    }

    println!(
        "Top {} match(es) for: {}\n",
        results.len(),
        query.effective_text(&config.recommend.default_query)
    );
    for (rank, rec) in results.iter().enumerate() {
        print_recommendation(rank + 1, rec);
    }

    Ok(())
}

fn cmd_status(overrides: &PathOverrides) -> Result<()> {
    let config = load_config(overrides)?;
    let store = open_store(&config)?;

    println!("talent-match Status");
    println!("===================");
    println!("\nStore: {}", store.path().display());
    println!("Records: {}", config.storage.data_file.display());
    println!(
        "Embedding: {} ({})",
        config.embedding.provider, config.embedding.model
    );

    let names = store.list()?;
    println!("\nCollections: {} total", names.len());
    for name in names {
        if let Some(collection) = store.get(&name)? {
            let marker = if name == config.index.collection {
                " (active)"
            } else {
                ""
            };
            println!("  {} - {} items{}", name, collection.count()?, marker);
        }
    }

    Ok(())
}

fn cmd_config(overrides: &PathOverrides, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(overrides)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or_else(|| overrides.config.clone()) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Collection: {}", config.index.collection);
        }
        ConfigAction::Init { force } => {
            let path = match &overrides.config {
                Some(path) => path.clone(),
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| MatchError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn run_sync(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
    store: &SqliteStore,
) -> Result<(<SqliteStore as IndexStore>::Collection, SyncReport)> {
    let data_file = expand_path(&config.storage.data_file)?;
    let source = RecordSource::load(&data_file)?;

    let synchronizer = IndexSynchronizer::new(provider, SyncConfig::from_config(config));
    Ok(synchronizer.sync(&source, store)?)
}

fn build_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = create_provider(&config.embedding)?;
    Ok(Arc::from(provider))
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    let dir = expand_path(&config.storage.store_dir)?;
    let params = AnnParams {
        m: config.index.hnsw_m,
        ef_construction: config.index.hnsw_ef_construction,
        ef_search: config.index.hnsw_ef_search,
    };
    Ok(SqliteStore::open(&dir, params)?)
}

fn load_config(overrides: &PathOverrides) -> Result<Config> {
    let path = match &overrides.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        tracing::warn!(
            "Config file not found, using defaults. Run 'talent-match config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    if let Some(data) = &overrides.data {
        config.storage.data_file = data.clone();
    }
    if let Some(store) = &overrides.store {
        config.storage.store_dir = store.clone();
    }

    Ok(config)
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| MatchError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| MatchError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| MatchError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}

fn print_sync_report(report: &SyncReport) {
    println!("✓ Index '{}' {}", report.collection, report.status);
    println!("  Records: {}", report.records);
    println!("  Stored items: {}", report.stored_items);
    if report.batches > 0 {
        println!(
            "  Indexed: {} in {} batch(es)",
            report.indexed, report.batches
        );
    }
    if report.skipped > 0 {
        println!("  Skipped malformed: {}", report.skipped);
    }
    for failure in &report.failed_batches {
        println!(
            "  ⚠ Batch {} failed (first id: {}, {} records): {}",
            failure.batch, failure.first_id, failure.size, failure.error
        );
    }
    println!("  Took: {}ms", report.duration_ms);
}

fn or_missing(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

fn print_recommendation(rank: usize, rec: &Recommendation) {
    println!(
        "{}. [{}] {} ({})  similarity {:.4}",
        rank,
        rec.doc_type.label(),
        rec.name_or_title,
        or_missing(&rec.department),
        rec.similarity
    );

    match &rec.detail {
        CandidateDetail::Employee {
            position,
            projects,
            languages,
        } => {
            println!("   Position: {}", or_missing(position));
            println!("   Skills: {}", or_missing(&rec.skills_info));
            println!("   Projects: {}", or_missing(projects));
            println!("   Languages: {}", or_missing(languages));
        }
        CandidateDetail::Job {
            location,
            employment_type,
            experience_years,
            responsibilities,
        } => {
            println!(
                "   Location: {} | {}",
                or_missing(location),
                or_missing(employment_type)
            );
            println!("   Required skills: {}", or_missing(&rec.skills_info));
            println!("   Experience: {}", or_missing(experience_years));
            println!("   Responsibilities: {}", or_missing(responsibilities));
        }
    }

    if !rec.reasons.is_empty() {
        println!("   Reasons: {}", rec.reasons.join("; "));
    }
    println!();
}
