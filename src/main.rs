use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use aircast::{AircastConfig, Dashboard, logging, web};

#[derive(Parser)]
#[command(
    name = "aircast",
    version,
    about = "County air quality dashboard backed by reconciled provider data"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconciled summary for a county or a coordinate pair
    Summary {
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        county: Option<String>,
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Map markers for every configured county
    Markers,
    /// County markers grouped for a map zoom level
    Clusters {
        #[arg(long)]
        zoom: u8,
    },
    /// Scraped pollen card for a county
    Pollen {
        #[arg(long)]
        county: String,
    },
    /// Run the JSON API server
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).with_context(|| "Failed to encode output")?;
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AircastConfig::load_from_path(cli.config)?;
    logging::init(&config.logging, cli.verbose);

    let port = config.server.port;
    let dashboard = Dashboard::new(config)?;

    match cli.command {
        Command::Summary { county, lat, lon } => {
            let summary = match (county, lat, lon) {
                (Some(county), _, _) => dashboard.summary_for_county(&county).await?,
                (None, Some(lat), Some(lon)) => {
                    dashboard.summary_for_coordinates(lat, lon).await?
                }
                _ => anyhow::bail!("Provide --county or both --lat and --lon"),
            };
            print_json(&summary)
        }
        Command::Markers => print_json(&dashboard.county_markers().await),
        Command::Clusters { zoom } => {
            let markers = dashboard.county_markers().await;
            print_json(&dashboard.clusters(&markers, zoom))
        }
        Command::Pollen { county } => print_json(&dashboard.pollen_card(&county).await?),
        Command::Serve { port: override_port } => {
            web::run(dashboard, override_port.unwrap_or(port)).await
        }
    }
}
