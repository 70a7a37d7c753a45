//! # playa
//!
//! Command-line front end for the playa offline kit.
//!
//! ## Commands
//!
//! - `status`: Show event, unlock and sync state
//! - `sync`: Run a full or incremental content sync from a catalog directory
//! - `unlock`: Evaluate (and latch) the unlock condition
//! - `access`: Ask whether a content type is available
//! - `distance`: Distance to the event center or another point
//!
//! ## Example
//!
//! ```bash
//! # Pull content from a mounted catalog
//! playa sync --catalog /media/playa-catalog
//!
//! # Check the gate from the current position
//! playa unlock --lat -32.5513 --lon 19.9884
//!
//! # What would an art installation show here?
//! playa access art-installation --lat -32.5513 --lon 19.9884 \
//!     --spot-lat -32.5513 --spot-lon 19.9884
//! ```

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use playa_types::ContentType;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{access, distance, status, sync, unlock, Context};

/// Offline content and unlock gate for event devices.
#[derive(Parser, Debug)]
#[command(name = "playa")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for state, packages and the device id
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: <data-dir>/playa.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluate time rules at this RFC 3339 instant instead of now
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    /// Debug logging when RUST_LOG is unset
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show event, unlock and sync state
    Status,

    /// Sync content packages from a catalog directory
    Sync {
        /// Only update packages that are already installed
        #[arg(long)]
        incremental: bool,

        /// Catalog directory (overrides [sync] catalog_dir)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Evaluate the unlock gate
    Unlock {
        /// Current latitude
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Current longitude
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Report unlocked without persisting anything
        #[arg(long)]
        bypass: bool,
    },

    /// Decide access to a content type
    Access {
        /// Content type (e.g. safety, map, theme-camp, art-installation)
        content_type: ContentType,

        /// Current latitude
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Current longitude
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Latitude of the spot the content is tied to
        #[arg(long, requires = "spot_lon", allow_negative_numbers = true)]
        spot_lat: Option<f64>,

        /// Longitude of the spot the content is tied to
        #[arg(long, requires = "spot_lat", allow_negative_numbers = true)]
        spot_lon: Option<f64>,

        /// Spot radius in metres (default: [event] default_requirement_radius_m)
        #[arg(long)]
        spot_radius: Option<f64>,
    },

    /// Distance from a point to the event center (or to another point)
    Distance {
        /// Latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Target latitude (default: event center)
        #[arg(long, requires = "to_lon", allow_negative_numbers = true)]
        to_lat: Option<f64>,

        /// Target longitude (default: event center)
        #[arg(long, requires = "to_lat", allow_negative_numbers = true)]
        to_lon: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config = config::Config::load(cli.config.as_deref(), &data_dir)?;
    let ctx = Context::new(config, data_dir, cli.now).await?;

    match cli.command {
        Commands::Status => {
            status::run(&ctx).await?;
        }
        Commands::Sync {
            incremental,
            catalog,
        } => {
            sync::run(&ctx, incremental, catalog).await?;
        }
        Commands::Unlock { lat, lon, bypass } => {
            unlock::run(&ctx, lat.zip(lon), bypass).await?;
        }
        Commands::Access {
            content_type,
            lat,
            lon,
            spot_lat,
            spot_lon,
            spot_radius,
        } => {
            access::run(&ctx, content_type, lat.zip(lon), spot_lat.zip(spot_lon), spot_radius);
        }
        Commands::Distance {
            lat,
            lon,
            to_lat,
            to_lon,
        } => {
            distance::run(&ctx, (lat, lon), to_lat.zip(to_lon));
        }
    }

    Ok(())
}

/// Get the default data directory for playa.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "playa")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
