use crate::errors::{PipelineError, PipelineResult};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub serve_dir: PathBuf,
    pub server_port: u16,
    pub seed: Option<u64>,
}

impl AppConfig {
    pub fn from_env() -> PipelineResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "8000")
            .parse::<u16>()
            .map_err(|e| PipelineError::Config(format!("SERVER_PORT: {e}")))?;

        let seed = match std::env::var("DATA_SEED") {
            Ok(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|e| PipelineError::Config(format!("DATA_SEED: {e}")))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            data_path: PathBuf::from(env_var_or("DASHBOARD_DATA_PATH", "dashboard_data.json")),
            serve_dir: PathBuf::from(env_var_or("DASHBOARD_SERVE_DIR", ".")),
            server_port,
            seed,
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
