//! Store settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Settings of quiz generation and set building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Max snippets returned by a snippet search.
    pub snippet_limit: usize,
    /// Min number of kanji a line needs to become a snippet.
    pub snippet_min_len: usize,
    /// Shuffle snippet search results.
    pub shuffle_snippets: bool,
    /// Pick sources uniformly instead of by weight.
    pub ignore_source_weight: bool,
    /// Kanji per set chunk, and per random quiz.
    pub set_chunk_size: usize,
    /// Options per question, the answer included.
    pub option_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snippet_limit: 1000,
            snippet_min_len: 5,
            shuffle_snippets: true,
            ignore_source_weight: false,
            set_chunk_size: 25,
            option_count: 10,
        }
    }
}

impl Settings {
    /// Reject settings that cannot produce a quiz.
    pub fn validate(&self) -> std::result::Result<(), StoreError> {
        if self.set_chunk_size == 0 {
            return Err(StoreError::Settings("set_chunk_size must be at least 1".into()));
        }
        if self.option_count < 2 {
            return Err(StoreError::Settings("option_count must be at least 2".into()));
        }
        Ok(())
    }
}

/// Load settings from well-known paths.
///
/// Search order:
/// 1. `kanjiquiz.toml` in the current directory
/// 2. `~/.config/kanjiquiz/config.toml`
///
/// Environment variable overrides: `KANJIQUIZ_SET_CHUNK_SIZE`,
/// `KANJIQUIZ_IGNORE_SOURCE_WEIGHT`.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(None)
}

/// Load settings from an explicit path, or search the default locations.
pub fn load_settings_from(path: Option<&Path>) -> Result<Settings> {
    let settings_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("settings file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("kanjiquiz.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut settings = match settings_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            toml::from_str::<Settings>(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?
        }
        None => Settings::default(),
    };

    apply_overrides(&mut settings, |key| std::env::var(key).ok())?;
    settings.validate()?;

    tracing::debug!(?settings, "loaded settings");
    Ok(settings)
}

fn apply_overrides<F>(settings: &mut Settings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("KANJIQUIZ_SET_CHUNK_SIZE") {
        settings.set_chunk_size = value
            .trim()
            .parse()
            .with_context(|| format!("invalid KANJIQUIZ_SET_CHUNK_SIZE: {value:?}"))?;
    }

    if let Some(value) = lookup("KANJIQUIZ_IGNORE_SOURCE_WEIGHT") {
        settings.ignore_source_weight = match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => anyhow::bail!("invalid KANJIQUIZ_IGNORE_SOURCE_WEIGHT: {value:?}"),
        };
    }

    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("kanjiquiz"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.snippet_limit, 1000);
        assert_eq!(settings.snippet_min_len, 5);
        assert!(settings.shuffle_snippets);
        assert!(!settings.ignore_source_weight);
        assert_eq!(settings.set_chunk_size, 25);
        assert_eq!(settings.option_count, 10);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: Settings =
            toml::from_str("set_chunk_size = 10\nshuffle_snippets = false\n").unwrap();
        assert_eq!(settings.set_chunk_size, 10);
        assert!(!settings.shuffle_snippets);
        assert_eq!(settings.snippet_limit, 1000);
    }

    #[test]
    fn load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "snippet_min_len = 3").unwrap();
        writeln!(file, "option_count = 4").unwrap();

        let settings = load_settings_from(Some(file.path())).unwrap();
        assert_eq!(settings.snippet_min_len, 3);
        assert_eq!(settings.option_count, 4);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings_from(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("settings file not found"));
    }

    #[test]
    fn malformed_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "set_chunk_size = \"many\"").unwrap();

        let err = load_settings_from(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("failed to parse settings"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let settings = Settings {
            set_chunk_size: 0,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(StoreError::Settings(_))));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, |key| match key {
            "KANJIQUIZ_SET_CHUNK_SIZE" => Some("40".into()),
            "KANJIQUIZ_IGNORE_SOURCE_WEIGHT" => Some("true".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(settings.set_chunk_size, 40);
        assert!(settings.ignore_source_weight);

        let mut untouched = Settings::default();
        apply_overrides(&mut untouched, no_env).unwrap();
        assert_eq!(untouched, Settings::default());
    }

    #[test]
    fn invalid_env_override_is_an_error() {
        let mut settings = Settings::default();
        let err = apply_overrides(&mut settings, |key| {
            (key == "KANJIQUIZ_SET_CHUNK_SIZE").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("KANJIQUIZ_SET_CHUNK_SIZE"));
    }
}
