use std::{fs, path::Path};

use serde::Deserialize;
use storage::{sqlite_url_for_path, DEFAULT_STORAGE_KEY};
use tracing::warn;

use crate::log_stream::DEFAULT_LOG_CAPACITY;

pub const SETTINGS_FILE: &str = "forge.toml";
const FALLBACK_DATABASE_URL: &str = "sqlite://./forge-state.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub storage_key: String,
    pub log_capacity: usize,
    pub backend_step_delay_ms: u64,
    pub login_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            storage_key: DEFAULT_STORAGE_KEY.into(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            backend_step_delay_ms: 1000,
            login_delay_ms: 1500,
        }
    }
}

/// Subset of [`Settings`] that may appear in `forge.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSettings {
    database_url: Option<String>,
    storage_key: Option<String>,
    log_capacity: Option<usize>,
    backend_step_delay_ms: Option<u64>,
    login_delay_ms: Option<u64>,
}

fn default_database_url() -> String {
    match dirs::data_local_dir() {
        Some(dir) => sqlite_url_for_path(&dir.join("forge").join("state.sqlite3")),
        None => FALLBACK_DATABASE_URL.into(),
    }
}

/// Defaults, then `forge.toml` in the working directory, then the environment.
pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from<F>(file: &Path, env: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => warn!(path = %file.display(), "ignoring unreadable settings file: {err}"),
        }
    }

    if let Some(v) = env("FORGE_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__STORAGE_KEY") {
        settings.storage_key = v;
    }
    if let Some(v) = env("APP__LOG_CAPACITY") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.log_capacity = parsed;
        }
    }
    if let Some(v) = env("APP__BACKEND_STEP_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.backend_step_delay_ms = parsed;
        }
    }
    if let Some(v) = env("APP__LOGIN_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.login_delay_ms = parsed;
        }
    }

    settings.database_url = normalize_database_url(&settings.database_url);
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.storage_key {
        settings.storage_key = v;
    }
    if let Some(v) = file_cfg.log_capacity {
        settings.log_capacity = v;
    }
    if let Some(v) = file_cfg.backend_step_delay_ms {
        settings.backend_step_delay_ms = v;
    }
    if let Some(v) = file_cfg.login_delay_ms {
        settings.login_delay_ms = v;
    }
}

/// Accepts full sqlite urls as well as bare file paths.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return default_database_url();
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return sqlite_url_for_path(Path::new(path));
    }

    sqlite_url_for_path(Path::new(raw_database_url))
}
