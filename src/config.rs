use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use directories::ProjectDirs;
use anyhow::{Context, Result};
use std::fs;

use crate::formatter::Formatter;
use crate::watch::Backend;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub quirks: QuirksConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_dmenu")]
    pub dmenu: String,
    #[serde(default = "default_terminal")]
    pub terminal: String,
    #[serde(default)]
    pub wrapper: Option<String>,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub use_xdg_de: bool,
    #[serde(default)]
    pub no_generic: bool,
    #[serde(default)]
    pub display_binary: Formatter,
    #[serde(default)]
    pub usage_log: Option<PathBuf>,
}

fn default_dmenu() -> String { "dmenu -i".to_string() }
fn default_terminal() -> String { "i3-sensible-terminal".to_string() }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dmenu: default_dmenu(),
            terminal: default_terminal(),
            wrapper: None,
            case_insensitive: false,
            use_xdg_de: false,
            no_generic: false,
            display_binary: Formatter::default(),
            usage_log: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct QuirksConfig {
    #[serde(default)]
    pub wine_escaping: bool,
    #[serde(default)]
    pub multiple_spaces: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FilterConfig {
    /// Regular expressions matched against display names.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WatchConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 { 2000 }

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn default_config_path() -> PathBuf {
    match ProjectDirs::from("org", "runner", "dmenu-runner") {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

/// Load `path`, or the default location when `None`. Only a missing file at
/// the default location falls back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path();
            if !path.exists() {
                return Ok(Config::default());
            }
            path
        }
    };

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("couldn't read config file {:?}", config_path))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("invalid config file {:?}", config_path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.general.dmenu, "dmenu -i");
        assert_eq!(config.general.terminal, "i3-sensible-terminal");
        assert_eq!(config.general.display_binary, Formatter::Plain);
        assert_eq!(config.watch.backend, Backend::Native);
        assert_eq!(config.watch.poll_interval(), Duration::from_secs(2));
        assert!(!config.quirks.wine_escaping);
        assert!(config.filter.exclude.is_empty());
    }

    #[test]
    fn full_file() {
        let config: Config = toml::from_str(
            r#"
            [general]
            dmenu = "rofi -dmenu"
            wrapper = "systemd-run --user"
            case_insensitive = true
            display_binary = "base"
            usage_log = "/tmp/usage.json"

            [quirks]
            wine_escaping = true

            [filter]
            exclude = ["^Wine", "\\(beta\\)$"]

            [watch]
            backend = "poll"
            poll_interval_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.general.dmenu, "rofi -dmenu");
        assert_eq!(config.general.terminal, "i3-sensible-terminal");
        assert_eq!(config.general.wrapper.as_deref(), Some("systemd-run --user"));
        assert!(config.general.case_insensitive);
        assert_eq!(config.general.display_binary, Formatter::WithBinaryBase);
        assert_eq!(config.general.usage_log, Some(PathBuf::from("/tmp/usage.json")));
        assert!(config.quirks.wine_escaping);
        assert!(!config.quirks.multiple_spaces);
        assert_eq!(config.filter.exclude.len(), 2);
        assert_eq!(config.watch.backend, Backend::Poll);
        assert_eq!(config.watch.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("config.toml");
        fs::write(&path, "[general]\nterminal = \"foot\"\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().general.terminal, "foot");

        fs::write(&path, "[general\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
