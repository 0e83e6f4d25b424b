//! wikiqa Web Server
//!
//! Serves `POST /api/update-index` for the pipeline declared in a YAML file.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use wikiqa_core::WikiqaConfig;
use wikiqa_nodes::registry_from_config;
use wikiqa_web::server::WikiqaServerBuilder;
use wikiqa_web::{init_logging, WebConfig};

/// wikiqa Web Server - HTTP trigger for the wiki indexing pipeline
#[derive(Parser, Debug)]
#[command(name = "wikiqa-web")]
#[command(about = "HTTP trigger for the wiki indexing pipeline")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Pipeline YAML file
    #[arg(long)]
    pipeline: Option<String>,

    /// Name of the indexing pipeline inside the YAML file
    #[arg(long)]
    pipeline_name: Option<String>,

    /// TOML configuration file; its server section is used as the base
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Settings file named by `--config`, or the built-in defaults
    fn settings(&self) -> anyhow::Result<Option<WikiqaConfig>> {
        self.config
            .as_ref()
            .map(|path| {
                WikiqaConfig::from_file(path).with_context(|| format!("loading {}", path))
            })
            .transpose()
    }

    fn web_config(&self, settings: Option<&WikiqaConfig>) -> WebConfig {
        let mut config = match settings {
            Some(file) => {
                let base = WebConfig::from(&file.server);
                let env = WebConfig::from_env();
                let defaults = WebConfig::default();
                // environment variables only override what they actually set
                WebConfig {
                    host: pick(env.host, defaults.host, base.host),
                    port: pick(env.port, defaults.port, base.port),
                    pipeline_yaml_path: env.pipeline_yaml_path.or(base.pipeline_yaml_path),
                    indexing_pipeline_name: pick(
                        env.indexing_pipeline_name,
                        defaults.indexing_pipeline_name,
                        base.indexing_pipeline_name,
                    ),
                }
            }
            None => WebConfig::from_env(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(pipeline) = &self.pipeline {
            config.pipeline_yaml_path = Some(pipeline.clone());
        }
        if let Some(name) = &self.pipeline_name {
            config.indexing_pipeline_name = name.clone();
        }
        config
    }
}

fn pick<T: PartialEq>(env: T, default: T, base: T) -> T {
    if env != default {
        env
    } else {
        base
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_logging(&args.log_level)?;

    let settings = args.settings()?;
    let config = args.web_config(settings.as_ref());
    let registry = registry_from_config(&settings.unwrap_or_default())?;
    info!(
        address = %config.address(),
        pipeline_yaml = ?config.pipeline_yaml_path,
        pipeline = %config.indexing_pipeline_name,
        "Starting wikiqa web server"
    );

    let server = WikiqaServerBuilder::from_config(config)
        .registry(registry)
        .build()
        .context("failed to build server")?;
    server.start().await?;

    Ok(())
}
