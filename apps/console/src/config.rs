use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub token_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:9000/v1".into(),
            token_path: None,
        }
    }
}

/// Defaults, then `console.toml` (or the explicitly passed file), then env
/// overrides. A missing default file is fine; a missing explicit file is not.
pub fn load_settings(explicit_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let file_path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("console.toml"));
    match fs::read_to_string(&file_path) {
        Ok(raw) => {
            if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
                if let Some(v) = file_cfg.get("server_url") {
                    settings.server_url = v.clone();
                }
                if let Some(v) = file_cfg.get("token_path") {
                    settings.token_path = Some(PathBuf::from(v));
                }
            }
        }
        Err(_) if explicit_path.is_none() => {}
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to read settings file '{}'", file_path.display()))
        }
    }

    if let Ok(v) = std::env::var("ADMIN_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("ADMIN_TOKEN_PATH") {
        settings.token_path = Some(PathBuf::from(v));
    }

    Ok(settings)
}

fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("coach-admin")
        .join("token")
}

pub fn token_path(settings: &Settings) -> PathBuf {
    settings.token_path.clone().unwrap_or_else(default_token_path)
}

pub fn read_cached_token(settings: &Settings) -> Result<Option<String>> {
    let path = token_path(settings);
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let token = raw.trim().to_string();
            Ok((!token.is_empty()).then_some(token))
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error)
            .with_context(|| format!("failed to read token file '{}'", path.display())),
    }
}

pub fn write_cached_token(settings: &Settings, token: &str) -> Result<()> {
    let path = token_path(settings);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    fs::write(&path, token)
        .with_context(|| format!("failed to write token file '{}'", path.display()))
}
