//! wikiqa CLI - Command-line interface for the wiki indexing pipelines
//!
//! Runs pipelines declared in YAML, lists the registered node types, exports
//! loaded pipelines back to YAML and manages the TOML configuration file.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use wikiqa_core::{
    init_logging, ErrorContext, WikiqaConfig, WikiqaError, WikiqaResult,
};
use wikiqa_nodes::registry_from_config;
use wikiqa_pipeline::{NodeRegistry, Pipeline, PipelineState, RunRequest};

#[derive(Parser)]
#[command(name = "wikiqa")]
#[command(about = "Wiki question answering pipelines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the indexing pipeline once
    Index {
        /// Pipeline YAML file (defaults to server.pipeline_yaml_path)
        #[arg(short, long)]
        pipeline: Option<PathBuf>,

        /// Pipeline name (defaults to server.indexing_pipeline_name)
        #[arg(short, long)]
        name: Option<String>,

        /// Print the per-node debug trace
        #[arg(long)]
        debug: bool,
    },

    /// Run a query pipeline and print the final state
    Query {
        /// Query text
        query: String,

        /// Pipeline YAML file (defaults to server.pipeline_yaml_path)
        #[arg(short, long)]
        pipeline: Option<PathBuf>,

        /// Pipeline name
        #[arg(short, long, default_value = "query")]
        name: String,

        /// Per-node or global parameters as a JSON object
        #[arg(long)]
        params: Option<String>,

        /// Record debug data for every node
        #[arg(long)]
        debug: bool,
    },

    /// List the registered node types
    Nodes,

    /// Load a pipeline and write its effective configuration back to YAML
    Export {
        /// Pipeline YAML file
        pipeline: PathBuf,

        /// Pipeline name
        #[arg(short, long, default_value = "indexing")]
        name: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Set a configuration value (key=value format)
        #[arg(long)]
        set: Option<String>,

        /// Get a configuration value
        #[arg(long)]
        get: Option<String>,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> WikiqaResult<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }
    init_logging(&logging_config)?;

    info!("Starting wikiqa CLI v{}", env!("CARGO_PKG_VERSION"));

    let registry = registry_from_config(&config)?;

    match cli.command {
        Commands::Index {
            pipeline,
            name,
            debug,
        } => {
            handle_index(&registry, pipeline, name, debug, &config).await?;
        }
        Commands::Query {
            query,
            pipeline,
            name,
            params,
            debug,
        } => {
            handle_query(&registry, query, pipeline, &name, params, debug, &config).await?;
        }
        Commands::Nodes => handle_nodes(&registry)?,
        Commands::Export {
            pipeline,
            name,
            output,
        } => {
            let loaded = Pipeline::load_from_yaml(&registry, &pipeline, &name)?;
            loaded.save_to_yaml(&output, &name)?;
            println!("Exported pipeline '{}' to {}", name, output.display());
        }
        Commands::Config {
            show,
            init,
            set,
            get,
            validate,
        } => {
            handle_config(cli.config.as_deref(), show, init, set, get, validate)?;
        }
    }

    Ok(())
}

fn load_config(config_path: Option<&Path>) -> WikiqaResult<WikiqaConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from {:?}", path);
        return WikiqaConfig::from_file(path);
    }

    let default_paths = [
        dirs::config_dir().map(|d| d.join("wikiqa").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".wikiqa").join("config.toml")),
        Some(PathBuf::from("wikiqa.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            info!("Loading configuration from {:?}", path);
            return WikiqaConfig::from_file(path);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(WikiqaConfig::default())
}

fn pipeline_path(explicit: Option<PathBuf>, config: &WikiqaConfig) -> WikiqaResult<PathBuf> {
    explicit
        .or_else(|| config.server.pipeline_yaml_path.as_ref().map(PathBuf::from))
        .ok_or_else(|| WikiqaError::Config {
            message: "No pipeline YAML given".to_string(),
            source: None,
            context: ErrorContext::new("cli")
                .with_operation("load_pipeline")
                .with_suggestion("Pass --pipeline or set server.pipeline_yaml_path"),
        })
}

fn print_debug(state: &PipelineState) -> WikiqaResult<()> {
    if let Some(trace) = &state.debug {
        println!("{}", serde_json::to_string_pretty(trace)?);
    }
    Ok(())
}

async fn handle_index(
    registry: &NodeRegistry,
    pipeline: Option<PathBuf>,
    name: Option<String>,
    debug: bool,
    config: &WikiqaConfig,
) -> WikiqaResult<()> {
    let path = pipeline_path(pipeline, config)?;
    let name = name.unwrap_or_else(|| config.server.indexing_pipeline_name.clone());
    let pipeline = Pipeline::load_from_yaml(registry, &path, &name)?;

    let request = RunRequest {
        debug: Some(debug),
        ..RunRequest::indexing()
    };
    let output = pipeline.run(request).await?;

    match output.field("documents_written") {
        Some(written) => println!("Indexed {} documents", written),
        None => println!(
            "Pipeline produced {} documents",
            output.documents.as_ref().map_or(0, Vec::len)
        ),
    }
    if debug {
        print_debug(&output)?;
    }
    Ok(())
}

async fn handle_query(
    registry: &NodeRegistry,
    query: String,
    pipeline: Option<PathBuf>,
    name: &str,
    params: Option<String>,
    debug: bool,
    config: &WikiqaConfig,
) -> WikiqaResult<()> {
    let path = pipeline_path(pipeline, config)?;
    let pipeline = Pipeline::load_from_yaml(registry, &path, name)?;

    let params = match params {
        Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw)? {
            serde_json::Value::Object(map) => Some(map),
            _ => {
                return Err(WikiqaError::Config {
                    message: "--params must be a JSON object".to_string(),
                    source: None,
                    context: ErrorContext::new("cli").with_operation("parse_params"),
                })
            }
        },
        None => None,
    };

    let request = RunRequest {
        params,
        debug: Some(debug),
        ..RunRequest::query(query)
    };
    let output = pipeline.run(request).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn handle_nodes(registry: &NodeRegistry) -> WikiqaResult<()> {
    for type_name in registry.type_names() {
        let descriptor = registry.get_subclass(type_name)?;
        println!("{}", type_name);
        println!("  run: {}", descriptor.run_params.join(", "));
        println!("  outgoing edges: {}", descriptor.outgoing_edges);
        for param in &descriptor.init_params {
            match &param.default {
                Some(default) => println!("  {} = {}", param.name, default),
                None => println!("  {} (required)", param.name),
            }
        }
    }
    Ok(())
}

fn handle_config(
    config_path: Option<&Path>,
    show: bool,
    init: bool,
    set: Option<String>,
    get: Option<String>,
    validate: bool,
) -> WikiqaResult<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if init {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        WikiqaConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {:?}", path);
    }

    if show {
        let config = load_config(config_path)?;
        let rendered = toml::to_string_pretty(&config).map_err(|e| WikiqaError::Config {
            message: format!("Failed to render config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("cli").with_operation("show_config"),
        })?;
        println!("{}", rendered);
    }

    if validate {
        match load_config(config_path)?.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                println!("Configuration validation failed: {}", e);
                return Err(e);
            }
        }
    }

    if let Some(key_value) = set {
        let (key, value) = key_value.split_once('=').ok_or_else(|| WikiqaError::Config {
            message: "Invalid format. Use key=value format".to_string(),
            source: None,
            context: ErrorContext::new("config_set")
                .with_suggestion("Example: --set wiki.graphql_url=http://wiki/graphql"),
        })?;
        let mut config = if path.exists() {
            WikiqaConfig::from_file(&path)?
        } else {
            WikiqaConfig::default()
        };
        set_config_value(&mut config, key, value)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save_to_file(&path)?;
        println!("Set {} = {}", key, value);
    }

    if let Some(key) = get {
        let config = load_config(config_path)?;
        println!("{} = {}", key, get_config_value(&config, &key)?);
    }

    Ok(())
}

/// Get the default configuration file path
fn default_config_path() -> WikiqaResult<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .map(|dir| dir.join("wikiqa").join("config.toml"))
        .ok_or_else(|| WikiqaError::Config {
            message: "Could not determine a configuration directory".to_string(),
            source: None,
            context: ErrorContext::new("cli").with_suggestion("Pass --config explicitly"),
        })
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> WikiqaResult<T> {
    value.parse().map_err(|_| WikiqaError::Config {
        message: format!("Invalid value for {}: {}", key, value),
        source: None,
        context: ErrorContext::new("config_set"),
    })
}

fn unknown_key(key: &str) -> WikiqaError {
    WikiqaError::Config {
        message: format!("Unknown configuration key: {}", key),
        source: None,
        context: ErrorContext::new("config")
            .with_suggestion("Use --show to see available configuration keys"),
    }
}

fn set_config_value(config: &mut WikiqaConfig, key: &str, value: &str) -> WikiqaResult<()> {
    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        ["wiki", "graphql_url"] => config.wiki.graphql_url = value.to_string(),
        ["wiki", "timeout_secs"] => config.wiki.timeout_secs = parse_value(key, value)?,
        ["wiki", "max_retries"] => config.wiki.max_retries = parse_value(key, value)?,
        ["qa", "provider"] => config.qa.provider = value.to_string(),
        ["qa", "model"] => config.qa.model = value.to_string(),
        ["qa", "temperature"] => config.qa.temperature = parse_value(key, value)?,
        ["qa", "max_pairs"] => config.qa.max_pairs = parse_value(key, value)?,
        ["server", "host"] => config.server.host = value.to_string(),
        ["server", "port"] => config.server.port = parse_value(key, value)?,
        ["server", "pipeline_yaml_path"] => {
            config.server.pipeline_yaml_path = Some(value.to_string())
        }
        ["server", "indexing_pipeline_name"] => {
            config.server.indexing_pipeline_name = value.to_string()
        }
        _ => return Err(unknown_key(key)),
    }
    Ok(())
}

fn get_config_value(config: &WikiqaConfig, key: &str) -> WikiqaResult<String> {
    let parts: Vec<&str> = key.split('.').collect();
    let value = match parts.as_slice() {
        ["wiki", "graphql_url"] => config.wiki.graphql_url.clone(),
        ["wiki", "timeout_secs"] => config.wiki.timeout_secs.to_string(),
        ["wiki", "max_retries"] => config.wiki.max_retries.to_string(),
        ["qa", "provider"] => config.qa.provider.clone(),
        ["qa", "model"] => config.qa.model.clone(),
        ["qa", "temperature"] => config.qa.temperature.to_string(),
        ["qa", "max_pairs"] => config.qa.max_pairs.to_string(),
        ["server", "host"] => config.server.host.clone(),
        ["server", "port"] => config.server.port.to_string(),
        ["server", "pipeline_yaml_path"] => config
            .server
            .pipeline_yaml_path
            .clone()
            .unwrap_or_default(),
        ["server", "indexing_pipeline_name"] => config.server.indexing_pipeline_name.clone(),
        _ => return Err(unknown_key(key)),
    };
    Ok(value)
}
