use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dashboard-data",
    about = "Builds, normalizes and serves the strategy dashboard document"
)]
pub struct Cli {
    /// Published document; overrides DASHBOARD_DATA_PATH
    #[arg(long = "data", global = true, value_hint = clap::ValueHint::FilePath)]
    pub data_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate placeholder strategies, normalize every view and publish
    Generate(GenerateArgs),

    /// Re-normalize the published document in place
    Normalize {
        /// Seed for synthesized defaults; overrides DATA_SEED
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Validate the published document without modifying it
    Check,

    /// Serve the dashboard directory with caching disabled
    Serve {
        /// Listen port; overrides SERVER_PORT
        #[arg(long)]
        port: Option<u16>,

        /// Directory to serve; overrides DASHBOARD_SERVE_DIR
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },

    /// List registered views and their fields
    Views,
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Seed for every sampled value; overrides DATA_SEED
    #[arg(long)]
    pub seed: Option<u64>,

    /// Size of the base individual strategy set
    #[arg(long, default_value_t = 60)]
    pub individual: usize,

    /// Size of the base multi-factor combination set
    #[arg(long, default_value_t = 20)]
    pub combinations: usize,
}
