use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};

use crate::record_store::DEFAULT_STORAGE_KEY;

pub const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "catalog.db";
pub const DEFAULT_AUTOPLAY_INTERVAL_MS: u64 = 8000;
pub const DEFAULT_NOTICE_DURATION_MS: u64 = 3000;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "BookCatalog", "book_catalog")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub storage_key: String,
    pub database_path: PathBuf,
    pub autoplay_interval_ms: u64,
    pub notice_duration_ms: u64,
    pub show_demo_when_unset: bool,
    pub download_dir: PathBuf,
    pub log_level: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let download_dir = UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| data_dir.join("downloads"));

        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            database_path: data_dir.join(DATABASE_FILE_NAME),
            autoplay_interval_ms: DEFAULT_AUTOPLAY_INTERVAL_MS,
            notice_duration_ms: DEFAULT_NOTICE_DURATION_MS,
            show_demo_when_unset: false,
            download_dir,
            log_level: "info".to_string(),
        }
    }
}

impl CatalogConfig {
    /// Loads the config file from the platform config directory.
    /// A missing or unreadable file yields the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(err) => {
                // Logging may not be initialised yet.
                eprintln!("ignoring config at {}: {err:#}", path.display());
                Self::default()
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(config.normalized()))
    }

    fn normalized(mut self) -> Self {
        if self.storage_key.trim().is_empty() {
            self.storage_key = DEFAULT_STORAGE_KEY.to_string();
        }
        if self.autoplay_interval_ms == 0 {
            self.autoplay_interval_ms = DEFAULT_AUTOPLAY_INTERVAL_MS;
        }
        self
    }

    pub fn autoplay_interval(&self) -> Duration {
        Duration::from_millis(self.autoplay_interval_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    pub fn init_logging(&self) {
        let env = env_logger::Env::default().default_filter_or(self.log_level.as_str());
        let _ = env_logger::Builder::from_env(env).try_init();
    }
}
