use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PortSelector {
    #[default]
    First,
    Index(usize),
    Name(String),
    Virtual(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub client_name: String,
    pub port: PortSelector,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            client_name: "seqplay".to_string(),
            port: PortSelector::First,
        }
    }
}

/// How the dispatch thread waits for an event's due time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WaitStrategy {
    /// Spin on the clock for the whole wait.
    Spin,
    /// Sleep in short slices, then spin for the last `spin_window_us`.
    Hybrid { spin_window_us: u64 },
}

impl WaitStrategy {
    pub fn spin_window(&self) -> Option<Duration> {
        match self {
            WaitStrategy::Spin => None,
            WaitStrategy::Hybrid { spin_window_us } => {
                Some(Duration::from_micros(*spin_window_us))
            }
        }
    }
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Hybrid {
            spin_window_us: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThreadPriority {
    #[default]
    Normal,
    /// Ask the platform to favor the dispatch thread. Best effort.
    Elevated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub wait: WaitStrategy,
    pub thread_priority: ThreadPriority,
    pub thread_name: String,
    pub looping: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            wait: WaitStrategy::default(),
            thread_priority: ThreadPriority::Normal,
            thread_name: "seqplay-dispatch".to_string(),
            looping: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub playback: PlaybackConfig,
}

impl Config {
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path)?;
        Self::from_ron(&ron_string)
    }

    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Config = ron::from_str(source)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = Config::from_ron("(playback: (looping: true))").unwrap();
        assert!(config.playback.looping);
        assert_eq!(config.playback.wait, WaitStrategy::default());
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn parses_port_selectors_and_wait_strategy() {
        let config = Config::from_ron(
            r#"(
                output: (client_name: "rig", port: Name("FluidSynth")),
                playback: (wait: Spin, thread_priority: Elevated),
            )"#,
        )
        .unwrap();
        assert_eq!(config.output.client_name, "rig");
        assert_eq!(config.output.port, PortSelector::Name("FluidSynth".into()));
        assert_eq!(config.playback.wait.spin_window(), None);
        assert_eq!(config.playback.thread_priority, ThreadPriority::Elevated);
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(matches!(
            Config::from_ron("(playback: (wait: Sometimes))"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn saves_and_loads_from_disk() {
        let dir = std::env::temp_dir().join(format!("seqplay-config-{}", std::process::id()));
        let path = dir.join("player.ron");

        let mut config = Config::default();
        config.output.port = PortSelector::Virtual("seqplay-out".into());
        config.playback.wait = WaitStrategy::Hybrid {
            spin_window_us: 500,
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.playback.wait.spin_window(),
            Some(Duration::from_micros(500))
        );

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load(Path::new("/nonexistent/seqplay.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
