use std::path::{Path, PathBuf};

use afval_core::{Credentials, ProviderConfig};
use anyhow::{Context, Result};
use log::LevelFilter;
use serde::Deserialize;

const CONFIG_ENV: &str = "AFVAL_LED_CONFIG";
const DEFAULT_CONFIG: &str = "afval-led.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Platform {
    /// Log pin levels instead of driving hardware.
    #[default]
    Console,
    /// Linux sysfs GPIO, e.g. on a Raspberry Pi.
    Sysfs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WifiConfig {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TimeConfig {
    #[serde(default = "default_time_host")]
    pub host: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            host: default_time_host(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct PinConfig {
    pub gray: u32,
    pub green: u32,
    pub blue: u32,
    pub orange: u32,
    pub red: u32,
    pub status: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            gray: 20,
            green: 19,
            blue: 18,
            orange: 17,
            red: 16,
            status: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub wifi: WifiConfig,
    #[serde(default)]
    pub time: TimeConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub pins: PinConfig,
    /// `host:port` the link check connects to.
    #[serde(default = "default_probe")]
    pub probe: String,
}

impl Config {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub(crate) fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub(crate) fn credentials(&self) -> Credentials {
        Credentials {
            ssid: self.wifi.ssid.clone(),
            password: self.wifi.password.clone(),
        }
    }

    pub(crate) fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

/// First CLI argument, then `AFVAL_LED_CONFIG`, then `afval-led.json`.
pub(crate) fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from)
}

fn default_time_host() -> String {
    "pool.ntp.org".to_owned()
}

fn default_probe() -> String {
    "1.1.1.1:53".to_owned()
}
