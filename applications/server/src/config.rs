/// Server configuration
use crate::error::{Result, ServerError};
use mastering_core::{Preset, DEFAULT_PRESET};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_server")]
    pub server: ServerSettings,

    #[serde(default = "default_engine")]
    pub engine: EngineSettings,

    #[serde(default = "default_storage")]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix for local download references, e.g. `https://master.example.com`
    #[serde(default)]
    pub public_base_url: String,

    /// Largest accepted upload body
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Maximum number of concurrent DSP invocations
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Wall-clock limit for a single DSP invocation
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Wall-clock limit for downloading a `sourceUrl` recording
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Finished jobs kept for result lookups before the oldest are dropped
    #[serde(default = "default_retained_jobs")]
    pub retained_jobs: usize,

    #[serde(default = "default_preset")]
    pub default_preset: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub remote: Option<RemoteStorageSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteStorageSettings {
    /// Base URL objects are `PUT` to
    pub endpoint: String,

    /// Base URL objects are served from; defaults to the endpoint
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default)]
    pub token: Option<String>,
}

impl EngineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl ServerSettings {
    /// Upload limit in bytes, also applied to fetched source recordings
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl ServerConfig {
    /// Load configuration from `config.toml` (or `path`) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        let config_path = path.map_or_else(|| PathBuf::from("config.toml"), Path::to_path_buf);
        if config_path.exists() {
            settings = settings.add_source(config::File::from(config_path));
        } else if path.is_some() {
            return Err(ServerError::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        // Override with environment variables, e.g. MASTERING_ENGINE__WORKERS=4
        settings = settings.add_source(
            config::Environment::with_prefix("MASTERING")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.workers == 0 {
            return Err(ServerError::Config(
                "engine.workers must be at least 1".to_string(),
            ));
        }

        if self.server.max_upload_mb == 0 {
            return Err(ServerError::Config(
                "server.max_upload_mb must be at least 1".to_string(),
            ));
        }

        if self.engine.timeout_secs == 0 {
            return Err(ServerError::Config(
                "engine.timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.engine.fetch_timeout_secs == 0 {
            return Err(ServerError::Config(
                "engine.fetch_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.engine.retained_jobs == 0 {
            return Err(ServerError::Config(
                "engine.retained_jobs must be at least 1".to_string(),
            ));
        }

        if Preset::find(&self.engine.default_preset).is_none() {
            return Err(ServerError::Config(format!(
                "Unknown default preset '{}'",
                self.engine.default_preset
            )));
        }

        if let Some(remote) = &self.storage.remote {
            if !remote.endpoint.starts_with("http://") && !remote.endpoint.starts_with("https://")
            {
                return Err(ServerError::Config(
                    "storage.remote.endpoint must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }
}

// Default values
fn default_server() -> ServerSettings {
    ServerSettings {
        host: default_host(),
        port: default_port(),
        public_base_url: String::new(),
        max_upload_mb: default_max_upload_mb(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_mb() -> usize {
    512
}

fn default_engine() -> EngineSettings {
    EngineSettings {
        ffmpeg_path: default_ffmpeg_path(),
        workers: default_workers(),
        timeout_secs: default_timeout_secs(),
        fetch_timeout_secs: default_fetch_timeout_secs(),
        retained_jobs: default_retained_jobs(),
        default_preset: default_preset(),
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_workers() -> usize {
    2
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_fetch_timeout_secs() -> u64 {
    120
}

fn default_retained_jobs() -> usize {
    1000
}

fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}

fn default_storage() -> StorageSettings {
    StorageSettings {
        temp_dir: default_temp_dir(),
        output_dir: default_output_dir(),
        remote: None,
    }
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./data/tmp")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./data/masters")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            engine: default_engine(),
            storage: default_storage(),
        }
    }
}
