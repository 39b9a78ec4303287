//! Client Settings
//!
//! Provides persistent client settings with:
//! - Atomic file writes (temp file + rename)
//! - Tolerant normalization with defaults
//! - Environment overrides applied after the file
//!
//! Storage location: {config_dir}/formcheck/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::{CoreError, CoreResult};

/// Settings schema version
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Directory under the platform config dir
pub const SETTINGS_DIR_NAME: &str = "formcheck";

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_USER_ID: &str = "demo_user";
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

pub const ENV_API_URL: &str = "FORMCHECK_API_URL";
pub const ENV_USER_ID: &str = "FORMCHECK_USER_ID";
pub const ENV_TIMEOUT_SECS: &str = "FORMCHECK_TIMEOUT_SECS";

/// Client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Base URL of the analysis service
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Caller identity sent with every submission
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Upper bound on one analysis request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Frame rate used to place issue markers
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_frame_rate() -> u32 {
    crate::core::analysis::DEFAULT_FRAME_RATE
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            api_url: default_api_url(),
            user_id: default_user_id(),
            request_timeout_secs: default_timeout_secs(),
            frame_rate: default_frame_rate(),
        }
    }
}

impl ClientSettings {
    /// Corrects bad values instead of failing, so a broken file or variable
    /// never blocks a submission.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.api_url = match validate_base_url(&self.api_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("{}; using {}", e, DEFAULT_API_URL);
                default_api_url()
            }
        };

        let user_id = self.user_id.trim();
        self.user_id = if user_id.is_empty() {
            default_user_id()
        } else {
            user_id.to_string()
        };

        self.request_timeout_secs = self.request_timeout_secs.clamp(1, 600);
        self.frame_rate = self.frame_rate.clamp(1, 240);
    }

    /// Applies `FORMCHECK_*` variables from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, then normalizes
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(user_id) = lookup(ENV_USER_ID) {
            self.user_id = user_id;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => warn!("Ignoring {}={:?}: not a number of seconds", ENV_TIMEOUT_SECS, raw),
            }
        }
        self.normalize();
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Validates an http(s) base URL and strips trailing slashes
pub fn validate_base_url(url: &str) -> Result<String, String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err("Base URL cannot be empty".to_string());
    }

    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| format!("Invalid base URL '{}': {}", trimmed, e))?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.trim_end_matches('/').to_string()),
        scheme => Err(format!(
            "Invalid base URL scheme '{}'. Use http or https.",
            scheme
        )),
    }
}

/// Settings manager for loading, saving, and resetting settings
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a settings manager storing into `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self {
            settings_path: dir.join(SETTINGS_FILE),
        }
    }

    /// Settings manager for the platform config directory
    pub fn in_default_dir() -> CoreResult<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| CoreError::Config("no platform config directory".to_string()))?;
        Ok(Self::new(base.join(SETTINGS_DIR_NAME)))
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or corrupt
    pub fn load(&self) -> ClientSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(ClientSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)?;
            let mut settings = serde_json::from_str::<ClientSettings>(&content)?;
            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                ClientSettings::default()
            }
        }
    }

    /// Loads the file, then applies environment overrides
    pub fn resolve(&self) -> ClientSettings {
        let mut settings = self.load();
        settings.apply_env();
        settings
    }

    /// Save settings using atomic write (temp file + rename)
    pub fn save(&self, settings: &ClientSettings) -> CoreResult<ClientSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            let content = serde_json::to_string_pretty(&normalized)?;

            let temp_path = self.settings_path.with_extension("json.tmp");
            if temp_path.exists() {
                let _ = fs::remove_file(&temp_path);
            }

            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;

            if cfg!(windows) && self.settings_path.exists() {
                // rename does not overwrite on Windows
                fs::remove_file(&self.settings_path)?;
            }
            fs::rename(&temp_path, &self.settings_path).map_err(|e| {
                CoreError::Config(format!("Failed to finalize settings file: {}", e))
            })?;

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<ClientSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path)?;
                info!("Settings file deleted");
            }
            Ok(ClientSettings::default())
        })
    }
}
