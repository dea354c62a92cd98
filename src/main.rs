pub mod config;
pub mod data;
pub mod error;
pub mod processing;
pub mod render;
pub mod server;
pub mod tunnel;
pub mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use types::Year;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML config; built-in defaults when omitted
    #[arg(short, long, value_name = "FILE", global = true, env = "DIASPORA_MAP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the population table for one year
    Table {
        /// Defaults to the dashboard's default year
        #[arg(short, long)]
        year: Option<Year>,
        /// Only rows that appear on the map
        #[arg(long)]
        mappable: bool,
    },
    /// Write the long-form observation sets as CSV
    Export {
        #[arg(short, long, value_name = "DIR", default_value = "output")]
        out_dir: PathBuf,
    },
    /// Serve the interactive dashboard
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        /// Expose the dashboard through a public tunnel
        #[arg(long)]
        tunnel: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut app_config = config::AppConfig::load(cli.config.as_deref())?;
    let dataset = data::load_data(&app_config)?;

    match cli.command {
        Commands::Table { year, mappable } => {
            print!("{}", table_report(&app_config, &dataset, year, mappable)?);
        }
        Commands::Export { out_dir } => {
            export_observations(&dataset, &out_dir)?;
        }
        Commands::Serve { port, tunnel } => {
            let tunnel_enabled = apply_serve_overrides(&mut app_config, port, tunnel);
            let tunnel_config = app_config.tunnel.clone();

            let listener = server::bind(&app_config.server).await?;
            let state = Arc::new(server::AppState::new(app_config, dataset)?);

            let provider: Option<Box<dyn tunnel::TunnelProvider>> = if tunnel_enabled {
                match tunnel::NgrokTunnel::new(tunnel_config) {
                    Ok(provider) => Some(Box::new(provider)),
                    Err(e) => {
                        tracing::warn!(error = %e, "public tunnel unavailable, serving locally only");
                        None
                    }
                }
            } else {
                None
            };

            server::run_dashboard(listener, state, provider).await?;
        }
    }

    Ok(())
}

/// The text table for `year`, or the configured default year.
fn table_report(
    config: &config::AppConfig,
    dataset: &types::Dataset,
    year: Option<Year>,
    mappable: bool,
) -> Result<String> {
    let sets = processing::build_observations(dataset)?;
    let year = match year {
        Some(year) => year,
        None => config.dashboard.resolve_default_year(&dataset.years)?,
    };
    let view = processing::year_view(&sets, &dataset.years, year)?;

    let (rows, total) = if mappable {
        let rows = processing::sort_for_display(&view.map);
        let total = processing::sum_population(&rows, year)?;
        (rows, total)
    } else {
        (view.table, view.total)
    };
    Ok(render::format_table(&rows, total))
}

/// Writes `observations.csv` and `mappable.csv` under `out_dir`.
fn export_observations(dataset: &types::Dataset, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let sets = processing::build_observations(dataset)?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

    let mut written = Vec::new();
    for (file_name, observations) in [("observations.csv", &sets.all), ("mappable.csv", &sets.mappable)] {
        let path = out_dir.join(file_name);
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        render::write_observations_csv(BufWriter::new(file), observations)?;
        tracing::info!(?path, rows = observations.len(), "wrote observations");
        written.push(path);
    }
    Ok(written)
}

/// Folds `serve` flags into the config; returns whether to open a tunnel.
fn apply_serve_overrides(config: &mut config::AppConfig, port: Option<u16>, tunnel: bool) -> bool {
    if let Some(port) = port {
        config.server.port = port;
    }
    tunnel || config.tunnel.enabled
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
