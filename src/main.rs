// SPDX-License-Identifier: MIT

use anyhow::Context;
use blockflow_rs::flow::catalog::SchemaCatalog;
use blockflow_rs::flow::config::EngineConfig;
use blockflow_rs::flow::engine::{Engine, RunOptions, Traversal};
use blockflow_rs::flow::loader::GraphLoader;
use blockflow_rs::flow::server::{self, AppState};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a graph document
    Run {
        /// Path to the graph (JSON or YAML)
        #[arg(short, long)]
        file: PathBuf,

        /// Initial values for InteractiveUI blocks, keyed by block id
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Discovery traversal: bfs or dfs
        #[arg(short, long)]
        method: Option<Traversal>,

        /// Start block id; repeatable. Every block is a start when omitted
        #[arg(short, long)]
        start: Vec<String>,

        /// Exit with an error when the run did not complete
        #[arg(long)]
        strict: bool,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 5001)]
        port: u16,

        /// Extra API schemas to merge into the catalog
        #[arg(long)]
        schemas: Option<PathBuf>,
    },
    /// Print the API schema catalog
    Schemas {
        /// Extra API schemas to merge into the catalog
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

async fn catalog_with(extra: Option<&PathBuf>) -> anyhow::Result<SchemaCatalog> {
    let catalog = SchemaCatalog::builtin();
    if let Some(path) = extra {
        catalog
            .load_file(path)
            .await
            .with_context(|| format!("Failed to load schemas from {}", path.display()))?;
    }
    Ok(catalog)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = EngineConfig::from_env();

    match args.command {
        Commands::Run {
            file,
            input,
            method,
            start,
            strict,
        } => {
            let loader = GraphLoader::new();
            let mut graph = loader
                .load(&file)
                .with_context(|| format!("Failed to load graph from {}", file.display()))?;

            let mut options = RunOptions::new();
            options.traversal = method;
            if let Some(path) = input {
                let seeds = loader
                    .load_seeds(&path)
                    .with_context(|| format!("Failed to load inputs from {}", path.display()))?;
                options = options.with_initial_values(seeds);
            }

            let starts = if start.is_empty() {
                graph.ids().cloned().collect()
            } else {
                start
            };

            let engine = Engine::from_config(config)?;
            let report = engine.run_with(&mut graph, &starts, options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if strict {
                report.ensure_complete().context("Run did not complete")?;
            }
        }
        Commands::Serve { port, schemas } => {
            let catalog = catalog_with(schemas.as_ref()).await?;
            let engine = Engine::from_config(config)?;
            server::serve(port, AppState::new(engine, catalog)).await?;
        }
        Commands::Schemas { file } => {
            let catalog = catalog_with(file.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&catalog.list().await)?);
        }
    }

    Ok(())
}
