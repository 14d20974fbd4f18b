use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use grantwatch_pipeline::{
    export, load_rules, load_source_registry, PipelineConfig, QualityFilter, RefreshPipeline,
};
use grantwatch_storage::{GrantStore, JsonFileStore};
use grantwatch_web::AppState;

#[derive(Debug, Parser)]
#[command(name = "grantwatch")]
#[command(about = "Grant opportunity tracker: refresh, serve, export, purge")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one refresh cycle across all enabled sources.
    Refresh,
    /// Serve the read-only JSON API over the canonical set.
    Serve {
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Write the canonical set as CSV to a file or stdout.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Drop previously stored records that fail the quality filter.
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();
    let store = JsonFileStore::new(config.store_path());

    match cli.command.unwrap_or(Commands::Refresh) {
        Commands::Refresh => {
            let registry = load_source_registry(&config.workspace_root)?;
            let rules = load_rules(&config.workspace_root)?;
            let pipeline = RefreshPipeline::new(config, registry, rules)?;
            let summary = pipeline.run_once(&store).await?;
            println!(
                "refresh complete: run_id={} sources={} ({} failed) raw={} persisted={} rejected={} reports={}",
                summary.run_id,
                summary.sources_attempted,
                summary.sources_failed,
                summary.raw_records,
                summary.merge.unique,
                summary.rejected,
                summary.reports_dir,
            );
            if !summary.store_available {
                eprintln!("warning: grant store was unavailable; this run was not persisted");
            }
        }
        Commands::Serve { port } => {
            grantwatch_web::serve(AppState::new(Arc::new(store)), port).await?;
        }
        Commands::Export { out } => {
            let grants = store.load_all().await?;
            let csv = export::to_csv(&grants);
            match out {
                Some(path) => std::fs::write(&path, csv)?,
                None => print!("{csv}"),
            }
        }
        Commands::Purge => {
            let filter = QualityFilter::default();
            let removed = store.purge(&|grant| filter.accepts(grant)).await?;
            println!("purged {removed} low-quality records");
        }
    }

    Ok(())
}
