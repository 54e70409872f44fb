//! Configuration module for newsreader
//!
//! Handles loading settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Load settings from the first file found, falling back to defaults
pub fn load() -> Result<Settings> {
    if let Ok(path) = std::env::var("NEWSREADER_SETTINGS_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return load_path(&path);
        }
    }

    let paths = [
        PathBuf::from("newsreader.yml"),
        PathBuf::from("config/newsreader.yml"),
        dirs::config_dir()
            .map(|p| p.join("newsreader/settings.yml"))
            .unwrap_or_default(),
    ];

    for path in paths.iter() {
        if !path.as_os_str().is_empty() && path.exists() {
            return load_path(path);
        }
    }

    info!("No settings file found, using defaults");
    let mut settings = Settings::default();
    settings.merge_env();
    Ok(settings)
}

fn load_path(path: &Path) -> Result<Settings> {
    info!("Loading settings from: {}", path.display());
    let mut settings = Settings::from_file(path)?;
    settings.merge_env();
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "general:\n  instance_name: morning-edition").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.general.instance_name, "morning-edition");
        assert_eq!(settings.search.history_capacity, 10);
    }

    #[test]
    fn test_from_missing_file() {
        assert!(Settings::from_file("/definitely/not/here.yml").is_err());
    }
}
