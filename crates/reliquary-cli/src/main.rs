//! Operator tooling for the media pipeline: sweep stale uploads, list an
//! entity's synced assets, and audit index/filesystem consistency.

use anyhow::Result;
use clap::{Parser, Subcommand};
use reliquary_core::{AssetState, PipelineConfig};
use reliquary_db::AssetStore;
use reliquary_services::MediaPipeline;
use reliquary_storage::PathCodec;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "reliquary")]
#[command(about = "Media staging pipeline operations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sweep pass over staged assets past the retention window
    Sweep {
        /// Override the configured retention window
        #[arg(long, value_name = "HOURS")]
        older_than_hours: Option<i64>,
    },
    /// List the synced assets of an owning entity
    List {
        /// The owning entity's identifier
        #[arg(long, value_name = "UUID")]
        binding: Uuid,

        /// Output format: json or table (default: table)
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Verify that every synced asset's durable files exist on disk
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = PipelineConfig::from_env()?;

    match cli.command {
        Command::Sweep { older_than_hours } => {
            if let Some(hours) = older_than_hours {
                config.staged_retention_hours = hours;
            }
            let pipeline = MediaPipeline::from_config(config).await?;
            let reaped = pipeline.sweep_stale().await?;
            println!("Reaped {} stale staged asset(s)", reaped);
        }
        Command::List { binding, format } => {
            let pipeline = MediaPipeline::from_config(config).await?;
            let views = pipeline.list_synced(binding).await?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                println!(
                    "{:<38} {:<22} {}",
                    "ID", "KIND", "PRIMARY URL"
                );
                for view in &views {
                    println!(
                        "{:<38} {:<22} {}",
                        view.id, view.kind, view.primary_url
                    );
                }
                println!("{} asset(s)", views.len());
            }
        }
        Command::Check => {
            config.validate()?;
            let pool = reliquary_db::connect(&config.database_url).await?;
            let store = AssetStore::new(pool);
            let codec = PathCodec::from_config(&config);

            let assets = store.all().await?;
            let mut violations = 0usize;

            for asset in &assets {
                match asset.state {
                    AssetState::Synced => {
                        let primary = codec.durable_path(asset);
                        if !primary.exists() {
                            violations += 1;
                            println!(
                                "MISSING primary   {} {}",
                                asset.id,
                                primary.display()
                            );
                        }
                        if asset.kind.needs_rendition() {
                            let rendition = codec.rendition_path(&primary);
                            if !rendition.exists() {
                                violations += 1;
                                println!(
                                    "MISSING rendition {} {}",
                                    asset.id,
                                    rendition.display()
                                );
                            }
                        }
                    }
                    AssetState::Staged => {
                        let durable = codec.durable_path(asset);
                        if durable.exists() {
                            violations += 1;
                            println!(
                                "UNEXPECTED durable {} {}",
                                asset.id,
                                durable.display()
                            );
                        }
                    }
                }
            }

            println!(
                "Checked {} asset(s), {} violation(s)",
                assets.len(),
                violations
            );
            if violations > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
