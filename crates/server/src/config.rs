use std::{collections::HashMap, path::Path};

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;
use storage::seed::DEFAULT_DEMO_OWNERS;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    /// Demo owners generated at startup when the store is empty. Zero turns
    /// seeding off.
    pub seed_owners: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/clinic.db".into(),
            seed_owners: DEFAULT_DEMO_OWNERS,
        }
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    settings_from(Path::new(SETTINGS_FILE), std::env::vars().collect())
}

/// Layers, lowest first: defaults, the optional TOML file, `APP__*` variables.
/// The plain `SERVER_BIND` and `DATABASE_URL` variables apply only when their
/// `APP__*` counterpart is absent.
pub(crate) fn settings_from(
    file: &Path,
    vars: HashMap<String, String>,
) -> anyhow::Result<Settings> {
    let app_env = Environment::with_prefix("APP")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .source(Some(vars.clone()));

    let mut settings: Settings = Config::builder()
        .add_source(File::from(file).required(false))
        .add_source(app_env)
        .build()
        .with_context(|| format!("failed to load settings from '{}'", file.display()))?
        .try_deserialize()
        .context("invalid server settings")?;

    if !vars.contains_key("APP__BIND_ADDR") {
        if let Some(v) = vars.get("SERVER_BIND") {
            settings.bind_addr = v.clone();
        }
    }
    if !vars.contains_key("APP__DATABASE_URL") {
        if let Some(v) = vars.get("DATABASE_URL") {
            settings.database_url = v.clone();
        }
    }

    Ok(settings)
}

/// Normalizes plain file paths into `sqlite://` URLs. `Storage::new`
/// creates any missing parent directory when it opens the file.
pub fn prepare_database_url(raw_database_url: &str) -> String {
    normalize_database_url(raw_database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
