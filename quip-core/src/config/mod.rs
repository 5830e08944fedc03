/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! User settings, stored as `settings.toml` in the platform config directory.
//!
//! ```no_run
//! use quip_core::config;
//!
//! let mut settings = config::load().unwrap_or_default();
//! settings.api_base_url = "https://memes.example".to_string();
//! config::save(&settings).ok();
//! ```

pub mod defaults;

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use defaults::*;

const CONFIG_FILE: &str = "settings.toml";
const APP_NAME: &str = "Quip";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_canvas_width: u32,
    pub max_canvas_height: u32,
    pub api_base_url: String,
    pub save_path: String,
    pub download_dir: Option<PathBuf>,
    pub download_file_name: String,
    pub release_delay_ms: u64,
    pub max_upload_bytes: usize,
    pub font_dirs: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_canvas_width: DEFAULT_MAX_CANVAS_WIDTH,
            max_canvas_height: DEFAULT_MAX_CANVAS_HEIGHT,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            save_path: DEFAULT_SAVE_PATH.to_string(),
            download_dir: None,
            download_file_name: DEFAULT_DOWNLOAD_FILE_NAME.to_string(),
            release_delay_ms: DEFAULT_RELEASE_DELAY_MS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            font_dirs: Vec::new(),
        }
    }
}

impl Config {
    /// Configured download directory, else the platform one, else the cwd.
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Absolute save endpoint.
    pub fn save_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.save_path.trim_start_matches('/')
        )
    }

    /// Image URL as the preview loads it. Server-relative paths are served
    /// from the API host, as the export fetch does.
    pub fn image_url(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("data:") || url.starts_with("blob:") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path.push(CONFIG_FILE);
        path
    })
}

pub fn load() -> Result<Config> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(Config::default())
}

pub fn save(config: &Config) -> Result<()> {
    if let Some(path) = get_default_config_path() {
        return save_to_path(config, &path);
    }
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content).unwrap_or_else(|e| {
        warn!("Ignoring invalid settings in {}: {}", path.display(), e);
        Config::default()
    }))
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let config = Config {
            api_base_url: "https://memes.example".to_string(),
            download_dir: Some(PathBuf::from("/tmp/memes")),
            release_delay_ms: 250,
            font_dirs: vec![PathBuf::from("/usr/share/fonts/truetype")],
            ..Config::default()
        };
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        save_to_path(&config, &config_path).expect("failed to save config");
        let loaded = load_from_path(&config_path).expect("failed to load config");

        assert_eq!(loaded, config);
    }

    #[test]
    fn load_from_path_returns_default_on_invalid_toml() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "not = valid = toml").expect("failed to write invalid toml");

        let loaded = load_from_path(&config_path).expect("load should not error");
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn missing_keys_take_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "max_canvas_width = 800\n").expect("failed to write toml");

        let loaded = load_from_path(&config_path).expect("load should not error");
        assert_eq!(loaded.max_canvas_width, 800);
        assert_eq!(loaded.max_canvas_height, DEFAULT_MAX_CANVAS_HEIGHT);
        assert_eq!(loaded.save_path, DEFAULT_SAVE_PATH);
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        assert!(load_from_path(&temp_dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn save_url_joins_base_and_path() {
        let mut config = Config::default();
        assert_eq!(config.save_url(), "http://localhost:5000/api/memes/save");
        config.api_base_url = "https://memes.example/".to_string();
        assert_eq!(config.save_url(), "https://memes.example/api/memes/save");
    }

    #[test]
    fn relative_image_urls_use_the_api_host() {
        let config = Config::default();
        assert_eq!(
            config.image_url("/uploads/m1.png"),
            "http://localhost:5000/uploads/m1.png"
        );
        assert_eq!(config.image_url("https://cdn.example/a.png"), "https://cdn.example/a.png");
    }
}
