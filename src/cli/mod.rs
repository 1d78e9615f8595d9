//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "codehound",
    version,
    about = "Iterative code retrieval for questions about a repository",
    long_about = "codehound answers questions about a source repository by gathering the smallest \
                  relevant set of code elements: it combines BM25 keyword and embedding search, and \
                  lets a completion oracle steer several rounds of search, reading, and pruning \
                  under a line and token budget."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/codehound/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration profile to apply (e.g., "fast", "thorough")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Gather the code needed to answer a question
    Ask {
        /// Natural-language question
        query: String,

        /// Repository root
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Indexer output (JSON array of code elements); defaults to one element per file
        #[arg(short, long, value_name = "FILE")]
        elements: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Skip embeddings and rank by keywords only
        #[arg(long)]
        no_embeddings: bool,

        /// Write the retrieval session trace to this file
        #[arg(long, value_name = "FILE")]
        trace: Option<PathBuf>,
    },

    /// Run a single retrieval tool (search, list, read, skim, query)
    Exec {
        /// Tool action name
        action: String,

        /// Tool argument (pattern, path, or query text)
        #[arg(default_value = "")]
        argument: String,

        /// Repository root
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Indexer output (JSON array of code elements)
        #[arg(short, long, value_name = "FILE")]
        elements: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Skip embeddings and rank by keywords only
        #[arg(long)]
        no_embeddings: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section (retrieval, tools, oracle, embedding, profiles)
        #[arg(short, long)]
        section: Option<String>,
    },

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
