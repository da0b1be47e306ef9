use kindex::cli::{parse_metadata_pairs, Cli, Commands, ConfigAction, IngestSource};
use kindex::config::Config;
use kindex::embedding::provider_from_config;
use kindex::error::{KindexError, Result};
use kindex::index::VectorIndex;
use kindex::ingest::{self, Extraction};
use kindex::knowledge::{KnowledgeBase, KnowledgeSettings, KnowledgeStats};
use kindex::persistence::{self, PersistOptions};
use kindex::store::metadata;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Add { text, metadata } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_add(&config, cli.kb, text, &metadata)?;
        }
        Commands::Ingest { source } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ingest(&config, cli.kb, source)?;
        }
        Commands::Build => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_build(&config, cli.kb)?;
        }
        Commands::Query { query, top_k, json } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_query(&config, cli.kb, &query, top_k, json)?;
        }
        Commands::Stats { json } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_stats(&config, cli.kb, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "kindex=debug" } else { "kindex=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn snapshot_path(config: &Config, kb: Option<PathBuf>) -> Result<PathBuf> {
    match kb {
        Some(path) => kindex::config::expand_path(&path),
        None => config.snapshot_path(),
    }
}

/// Load the knowledge base at `path`, or start an empty one if it does not exist yet
fn open_or_create(config: &Config, path: &Path) -> Result<KnowledgeBase> {
    let provider = provider_from_config(&config.embedding)?;
    let settings = KnowledgeSettings::from(config);

    if path.exists() {
        KnowledgeBase::load(path, provider, settings)
    } else {
        tracing::info!("Creating new knowledge base at {}", path.display());
        Ok(KnowledgeBase::new(provider).with_settings(settings))
    }
}

fn cmd_add(config: &Config, kb: Option<PathBuf>, text: String, pairs: &[String]) -> Result<()> {
    let path = snapshot_path(config, kb)?;
    let pairs = parse_metadata_pairs(pairs).map_err(KindexError::InvalidArgument)?;

    let mut kb = open_or_create(config, &path)?;
    let position = kb.add(text, metadata(pairs))?;
    kb.save(&path)?;

    println!("✓ Added document #{} ({} total)", position, kb.len());
    Ok(())
}

fn open_csv(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| KindexError::Io {
        source: e,
        context: format!("Failed to open dataset: {}", path.display()),
    })
}

fn cmd_ingest(config: &Config, kb: Option<PathBuf>, source: IngestSource) -> Result<()> {
    let path = snapshot_path(config, kb)?;

    let extraction: Extraction = match source {
        IngestSource::Table { file, name } => {
            let name = name.unwrap_or_else(|| ingest::dataset_name(&file));
            ingest::summarize_table(open_csv(&file)?, &name, &config.ingest)?
        }
        IngestSource::Transcripts { file, name, column } => {
            let name = name.unwrap_or_else(|| ingest::dataset_name(&file));
            let mut ingest_config = config.ingest.clone();
            if let Some(column) = column {
                ingest_config.transcript_column = column;
            }
            ingest::extract_transcripts(open_csv(&file)?, &name, &ingest_config)?
        }
    };

    let mut kb = open_or_create(config, &path)?;
    let mut report = kb.add_batch(extraction.fragments);
    report.skipped += extraction.skipped;
    kb.save(&path)?;

    println!(
        "✓ Ingested {} fragments ({} skipped, {} failed)",
        report.added, report.skipped, report.failed
    );
    println!("  Knowledge base: {} ({} documents)", path.display(), kb.len());
    Ok(())
}

fn cmd_build(config: &Config, kb: Option<PathBuf>) -> Result<()> {
    let path = snapshot_path(config, kb)?;
    let store = persistence::load_snapshot(&path)?;

    let mut index = VectorIndex::new();
    index.build(store.vectors())?;

    let artifact = persistence::artifact_path(&path);
    if index.is_empty() {
        persistence::remove_artifact(&artifact)?;
        println!("Knowledge base is empty; no index to build");
        return Ok(());
    }

    persistence::save_artifact(&index, &artifact, PersistOptions::from(&config.storage))?;
    println!(
        "✓ Built index over {} vectors ({}D)",
        index.len(),
        index.dimension().unwrap_or(0)
    );
    println!("  Artifact: {}", artifact.display());
    Ok(())
}

fn cmd_query(
    config: &Config,
    kb: Option<PathBuf>,
    query: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let path = snapshot_path(config, kb)?;
    if !path.exists() {
        println!("No knowledge base at {}", path.display());
        println!("Use 'kindex add' or 'kindex ingest' to create one.");
        return Ok(());
    }

    let mut kb = open_or_create(config, &path)?;
    let top_k = top_k.unwrap_or(config.query.default_top_k);
    let hits = kb.query(query, top_k)?;

    if json {
        let out = serde_json::to_string_pretty(&hits).map_err(|e| KindexError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results for: {}", query);
        return Ok(());
    }

    println!("Results for: {}\n", query);
    for (rank, hit) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {}", rank + 1, hit.score, hit.text);
        if !hit.metadata.is_empty() {
            let meta: Vec<String> = hit
                .metadata
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            println!("   {}", meta.join(", "));
        }
    }
    Ok(())
}

fn cmd_stats(config: &Config, kb: Option<PathBuf>, json: bool) -> Result<()> {
    let path = snapshot_path(config, kb)?;
    let store = persistence::load_snapshot(&path)?;
    let index = persistence::load_artifact(&persistence::artifact_path(&path), &store)
        .unwrap_or_else(|e| {
            tracing::debug!("Index artifact unavailable: {}", e);
            VectorIndex::new()
        });
    let stats = KnowledgeStats::collect(&store, &index);

    if json {
        let out = serde_json::to_string_pretty(&stats).map_err(|e| KindexError::Json {
            source: e,
            context: "Failed to serialize stats".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    println!("Knowledge base: {}", path.display());
    println!("  Documents: {}", stats.documents);
    match stats.dimension {
        Some(d) => println!("  Dimension: {}", d),
        None => println!("  Dimension: -"),
    }
    println!("  Index:     {} ({} vectors)", stats.index_state, stats.indexed);
    if !stats.by_type.is_empty() {
        println!("  By type:");
        for (kind, count) in &stats.by_type {
            println!("    {:<24} {}", kind, count);
        }
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
            let value = serde_json::to_value(&config).map_err(|e| KindexError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let shown = match section {
                Some(section) => value.get(&section).cloned().ok_or_else(|| {
                    KindexError::Config(format!("Unknown config section: {}", section))
                })?,
                None => value,
            };

            let json = serde_json::to_string_pretty(&shown).map_err(|e| KindexError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
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

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| KindexError::Io {
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

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'kindex config init' to create one."
        );
        return Config::from_defaults(profile.as_deref());
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}
