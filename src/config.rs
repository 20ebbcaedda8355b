use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default interval between playback ticks
pub const DEFAULT_TICK_MS: u64 = 100;

/// Player behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    /// Redeliver every message from the log start up to the seek point when
    /// seeking. Costs time proportional to the log size on every seek.
    pub historical_seek: bool,
    /// Trace every tick and every delivered message
    pub debug_mode: bool,
}

/// Persistent player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub player: PlayerOptions,
    pub tick_ms: u64,
    /// Topics hidden from the loaded-topic list. A trailing `*` matches by prefix.
    pub ignored_topics: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player: PlayerOptions::default(),
            tick_ms: DEFAULT_TICK_MS,
            ignored_topics: Vec::new(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bagpiper").join("settings.json"))
    }

    /// Load settings from the user config dir, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings {:?}: {:#}", path, e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file: {:?}", path))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("No config directory on this platform")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write settings file: {:?}", path))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn is_ignored(&self, topic: &str) -> bool {
        self.ignored_topics.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => topic.starts_with(prefix),
            None => topic == pattern,
        })
    }

    /// Drop ignored topics from a topic -> type map
    pub fn filter_topics(&self, topics: BTreeMap<String, String>) -> BTreeMap<String, String> {
        topics.into_iter().filter(|(topic, _)| !self.is_ignored(topic)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(!settings.player.historical_seek);
        assert!(!settings.player.debug_mode);
        assert_eq!(settings.tick_period(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"player": {"historical_seek": true}}"#).unwrap();
        assert!(settings.player.historical_seek);
        assert!(!settings.player.debug_mode);
        assert_eq!(settings.tick_ms, DEFAULT_TICK_MS);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            player: PlayerOptions { historical_seek: true, debug_mode: true },
            tick_ms: 50,
            ignored_topics: vec!["/rosout".to_string()],
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_from_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_filter_topics() {
        let settings = Settings {
            ignored_topics: vec!["/rosout".to_string(), "/diagnostics*".to_string()],
            ..Default::default()
        };
        let mut topics = BTreeMap::new();
        topics.insert("/rosout".to_string(), "rosgraph_msgs/Log".to_string());
        topics.insert("/diagnostics_agg".to_string(), "diagnostic_msgs/DiagnosticArray".to_string());
        topics.insert("/odom".to_string(), "nav_msgs/Odometry".to_string());

        let kept = settings.filter_topics(topics);
        assert_eq!(kept.keys().collect::<Vec<_>>(), vec!["/odom"]);
    }
}
