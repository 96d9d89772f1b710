//! CLI command definitions and parsing
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::records::DocType;

#[derive(Parser, Debug)]
#[command(
    name = "talent-match",
    version,
    about = "Match project descriptions against employee profiles and job postings",
    long_about = "talent-match embeds employee profiles and job postings into a local vector index \
                  and ranks them against a free-text project or role description, filtered by \
                  department, spoken languages, and document type."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/talent-match/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Record file with `employees` and `job_descriptions` (overrides config)
    #[arg(long, global = true, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Index store directory (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Document-type restriction accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocTypeArg {
    Employee,
    Job,
    #[default]
    All,
}

impl DocTypeArg {
    pub fn to_filter(self) -> Option<DocType> {
        match self {
            DocTypeArg::Employee => Some(DocType::Employee),
            DocTypeArg::Job => Some(DocType::Job),
            DocTypeArg::All => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize the index with the record file
    Sync {
        /// Print the sync report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recommend employees or job postings for a project description
    Query {
        /// Project or role description (blank uses the configured default)
        text: Option<String>,

        /// Keep only candidates from this department
        #[arg(short, long)]
        department: Option<String>,

        /// Comma-separated languages every employee result must speak
        #[arg(short, long)]
        languages: Option<String>,

        /// Restrict results to one document type
        #[arg(short = 't', long, value_enum, default_value_t = DocTypeArg::All)]
        doc_type: DocTypeArg,

        /// Maximum number of results (defaults to recommend.num_results)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Query the stored index as-is without synchronizing first
        #[arg(long)]
        skip_sync: bool,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show index store status
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_arguments() {
        let cli = Cli::parse_from([
            "talent-match",
            "query",
            "web service development",
            "--department",
            "R&D",
            "--languages",
            "English,Korean",
            "--doc-type",
            "employee",
            "-n",
            "3",
        ]);

        match cli.command {
            Commands::Query {
                text,
                department,
                languages,
                doc_type,
                limit,
                skip_sync,
                json,
            } => {
                assert_eq!(text.as_deref(), Some("web service development"));
                assert_eq!(department.as_deref(), Some("R&D"));
                assert_eq!(languages.as_deref(), Some("English,Korean"));
                assert_eq!(doc_type.to_filter(), Some(DocType::Employee));
                assert_eq!(limit, Some(3));
                assert!(!skip_sync);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_doc_type_defaults_to_all() {
        let cli = Cli::parse_from(["talent-match", "query"]);
        match cli.command {
            Commands::Query { text, doc_type, .. } => {
                assert!(text.is_none());
                assert_eq!(doc_type.to_filter(), None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
