use codehound::cli::{Cli, Commands, ConfigAction};
use codehound::config::Config;
use codehound::controller::{IterativeController, QueryProcessor, RetrievalResult};
use codehound::elements::{self, CodeElement};
use codehound::embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use codehound::error::{HoundError, Result};
use codehound::oracle::HttpOracle;
use codehound::retrieval::{HybridRetriever, SearchError};
use codehound::tools::{ToolExecutor, ToolResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Ask {
            query,
            repo,
            elements,
            json,
            no_embeddings,
            trace,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ask(&config, &query, &repo, elements, json, no_embeddings, trace)?;
        }
        Commands::Exec {
            action,
            argument,
            repo,
            elements,
            json,
            no_embeddings,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_exec(&config, &action, &argument, &repo, elements, json, no_embeddings)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "codehound=debug"
    } else {
        "codehound=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stderr keeps --json output on stdout parseable
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_ask(
    config: &Config,
    query: &str,
    repo: &Path,
    elements_file: Option<PathBuf>,
    json: bool,
    no_embeddings: bool,
    trace: Option<PathBuf>,
) -> Result<()> {
    let executor = build_executor(config, repo, elements_file, no_embeddings)?;
    let oracle = HttpOracle::from_env(
        &config.oracle.base_url,
        &config.oracle.api_key_env,
        &config.oracle.model,
        config.oracle_timeout(),
    )?;

    let controller =
        IterativeController::new(executor, Arc::new(oracle), config.controller_config());
    let processed = QueryProcessor::new().process(query);

    let (result, session) = controller.retrieve_traced(query, &processed);
    if let Some(path) = trace {
        session.save_trace(&path)?;
        tracing::info!("Session trace written to {}", path.display());
    }

    if json {
        println!("{}", to_json(&result, "Failed to serialize retrieval result")?);
    } else {
        print_retrieval(&result);
    }

    Ok(())
}

fn cmd_exec(
    config: &Config,
    action: &str,
    argument: &str,
    repo: &Path,
    elements_file: Option<PathBuf>,
    json: bool,
    no_embeddings: bool,
) -> Result<()> {
    let executor = build_executor(config, repo, elements_file, no_embeddings)?;
    let result = executor.execute(action, argument)?;

    if json {
        println!("{}", to_json(&result, "Failed to serialize tool result")?);
    } else {
        print_tool_result(&result);
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = serde_json::to_value(&config).map_err(|e| HoundError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let shown = match section {
                Some(section) => value
                    .get(&section)
                    .cloned()
                    .ok_or_else(|| HoundError::Config(format!("Unknown section: {}", section)))?,
                None => value,
            };
            println!("{}", to_json(&shown, "Failed to serialize config")?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Profiles: {}", config.profiles.len());
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let mut config = Config::load_or_default(config_path.as_deref())?;

    if let Some(profile) = profile {
        config.apply_profile(&profile)?;
        tracing::info!("Applied profile: {}", profile);
    }

    Ok(config)
}

/// Load elements, index them, and wrap everything in a tool executor
fn build_executor(
    config: &Config,
    repo: &Path,
    elements_file: Option<PathBuf>,
    no_embeddings: bool,
) -> Result<Arc<ToolExecutor>> {
    if !repo.is_dir() {
        return Err(HoundError::Config(format!(
            "Repository path is not a directory: {}",
            repo.display()
        )));
    }

    let fs = config.repo_fs(repo);
    let elements: Vec<CodeElement> = match elements_file {
        Some(path) => elements::load_json(&path)?,
        None => {
            let repo_name = repo
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_default();
            elements::load_repository(&fs, &repo_name)
        }
    };
    tracing::info!("Loaded {} code elements", elements.len());

    let embedder = if no_embeddings {
        None
    } else {
        build_embedder(config)?
    };

    let mut retriever = HybridRetriever::new(config.hybrid_config()?);
    match retriever.index_elements(&elements, embedder.as_deref()) {
        Ok(report) => tracing::debug!(
            "Indexed {} elements, embedded {}",
            report.indexed,
            report.embedded
        ),
        Err(SearchError::EmbeddingFailed { failed, total, .. }) => {
            tracing::warn!(
                "Continuing with partial embeddings ({} of {} failed)",
                failed,
                total
            );
        }
        Err(e) => return Err(e.into()),
    }

    let mut executor = ToolExecutor::new(Arc::new(retriever), fs, config.tool_config());
    if let Some(embedder) = embedder {
        executor = executor.with_embedder(embedder);
    }

    Ok(Arc::new(executor))
}

fn build_embedder(config: &Config) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    let settings = &config.embedding;
    if !settings.enabled {
        return Ok(None);
    }

    match settings.provider.as_str() {
        "http" => {
            let api_key = if settings.api_key_env.is_empty() {
                None
            } else {
                match std::env::var(&settings.api_key_env) {
                    Ok(key) => Some(key),
                    Err(_) => {
                        tracing::warn!(
                            "{} is not set; ranking by keywords only",
                            settings.api_key_env
                        );
                        return Ok(None);
                    }
                }
            };

            let provider = HttpEmbeddingProvider::new(
                &settings.base_url,
                api_key,
                &settings.model,
                settings.dimension,
                config.embedding_timeout(),
            )?;
            let provider: Arc<dyn EmbeddingProvider> = Arc::new(provider);
            Ok(Some(provider))
        }
        "local" => local_embedder(&settings.model),
        _ => Ok(None),
    }
}

#[cfg(feature = "local-embeddings")]
fn local_embedder(model: &str) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    let provider: Arc<dyn EmbeddingProvider> =
        Arc::new(codehound::embedding::FastEmbedProvider::new(model)?);
    Ok(Some(provider))
}

#[cfg(not(feature = "local-embeddings"))]
fn local_embedder(_model: &str) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    tracing::warn!("Built without the local-embeddings feature; ranking by keywords only");
    Ok(None)
}

fn to_json<T: serde::Serialize>(value: &T, context: &str) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| HoundError::Json {
        source: e,
        context: context.to_string(),
    })
}

fn print_retrieval(result: &RetrievalResult) {
    println!(
        "Stopped: {} after {} rounds (confidence {})",
        result.stop_reason, result.rounds, result.confidence
    );
    if let Some(error) = &result.metadata.error {
        println!("Error: {}", error);
    }
    println!(
        "{} elements, {} lines, {} oracle calls, {} tokens\n",
        result.elements.len(),
        result.total_lines(),
        result.metadata.oracle_calls,
        result.metadata.tokens_used
    );

    for element in &result.elements {
        println!(
            "  {:<13} {}:{}-{}  {}",
            element.kind.as_str(),
            element.path,
            element.start_line,
            element.end_line,
            element.name
        );
    }
}

fn print_tool_result(result: &ToolResult) {
    if !result.text.is_empty() {
        println!("{}", result.text);
    }
    if !result.elements.is_empty() {
        println!("\n{} elements:", result.elements.len());
        for element in &result.elements {
            println!(
                "  {:<13} {}:{}-{}  {}",
                element.kind.as_str(),
                element.path,
                element.start_line,
                element.end_line,
                element.name
            );
        }
    }
}
