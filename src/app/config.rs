use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_PATH: &str = "config/queue.toml";

/// Layered settings: `config/queue.toml` (optional) overlaid by `TASKQ__*`
/// environment variables, deserialized into one struct with `serde(default)`
/// per section so a missing file or missing section never fails to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerSettings,
    pub store: StoreSettings,
    pub http: HttpSettings,
    pub worker: WorkerSettings,
    pub observability: ObservabilitySettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            broker: BrokerSettings::default(),
            store: StoreSettings::default(),
            http: HttpSettings::default(),
            worker: WorkerSettings::default(),
            observability: ObservabilitySettings::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(None::<PathBuf>)
    }

    /// `path`, when given, is a required override on top of the optional
    /// default file; either way, `TASKQ__SECTION__FIELD` environment
    /// variables take precedence over both.
    pub fn load_from_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            File::from(PathBuf::from(DEFAULT_CONFIG_PATH))
                .format(FileFormat::Toml)
                .required(false),
        );

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path.as_ref())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(Environment::with_prefix("TASKQ").separator("__"));

        let config = builder.build()?;
        config.try_deserialize().context("invalid task queue configuration")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub redis_url: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/taskq".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub queue_name: String,
    pub worker_count: usize,
    pub poll_interval_seconds: u64,
    pub max_tasks_per_run: Option<u64>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_name: "default".to_string(),
            worker_count: 4,
            poll_interval_seconds: 1,
            max_tasks_per_run: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub log_level: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
