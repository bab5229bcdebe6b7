//! JSON files in the platform data directory
//!
//! Settings, the leaderboard, fallback score records and the local ledger
//! all go through here. Writes land in a temp file first and are renamed
//! over the target, so a crash never leaves half a file behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const SETTINGS_FILE: &str = "settings.json";
pub const LEADERBOARD_FILE: &str = "leaderboard.json";
pub const FALLBACK_FILE: &str = "fallback-scores.json";
pub const LEDGER_FILE: &str = "ledger.json";
pub const LOG_FILE: &str = "snowmotion.log";

/// Per-user data directory (created on demand by `save_json`)
pub fn data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "snowmotion", "SnowMotion")
        .context("could not resolve a home directory for game data")?;
    Ok(dirs.data_local_dir().to_path_buf())
}

/// Path of a named file inside the data directory
pub fn data_file(name: &str) -> Result<PathBuf> {
    Ok(data_dir()?.join(name))
}

/// Read a JSON file. A missing file is `Ok(None)`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

/// Read a JSON file, falling back to the default on any problem
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path) {
        Ok(Some(value)) => {
            log::info!("Loaded {}", path.display());
            value
        }
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("{:#} - starting fresh", e);
            T::default()
        }
    }
}

/// Write a value as pretty JSON via temp file and rename
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("serializing")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    log::debug!("Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
pub(crate) fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("snowmotion-test-{}", std::process::id()))
        .join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_missing_file_is_none() {
        let path = scratch_path("does-not-exist.json");
        let loaded: Option<Sample> = load_json(&path).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch_path("persistence-sample.json");
        let sample = Sample {
            name: "frosty".into(),
            count: 3,
        };
        save_json(&path, &sample).unwrap();
        assert_eq!(load_json::<Sample>(&path).unwrap(), Some(sample));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let path = scratch_path("persistence-corrupt.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(load_json::<Sample>(&path).is_err());
        assert_eq!(load_or_default::<Sample>(&path), Sample::default());
    }
}
