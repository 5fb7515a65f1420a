// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration and session files.
//!
//! [`Settings`] describes the consoles (devices, channels, controller
//! filters, value ranges) and is read from YAML or TOML depending on the
//! file extension. [`SessionFile`] stores a recorded event log as YAML.

pub mod watcher;

pub use watcher::{ConfigEvent, ConfigWatcher};

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::capture::ControllerFilter;
use crate::output::ValueRange;
use crate::session::{console_name, ControllerEvent, EventLog, CONSOLE_COUNT};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Global switch for transmitting to external consoles
    #[serde(default = "default_true")]
    pub send_enabled: bool,
    /// Update last-message slots for controllers that were never recorded
    #[serde(default)]
    pub track_unmanaged: bool,
    /// Console definitions, A first
    #[serde(default = "default_consoles")]
    pub consoles: Vec<ConsoleSettings>,
}

fn default_true() -> bool {
    true
}

fn default_consoles() -> Vec<ConsoleSettings> {
    (0..CONSOLE_COUNT as u8).map(ConsoleSettings::named).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            send_enabled: true,
            track_unmanaged: false,
            consoles: default_consoles(),
        }
    }
}

/// Settings of one console
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleSettings {
    /// Display name
    pub name: String,
    /// Input device index (0 = all devices), `None` = not connected
    #[serde(default)]
    pub input: Option<usize>,
    /// Output destination index, `None` = no output
    #[serde(default)]
    pub output: Option<usize>,
    /// Output destination matched by name, used when `output` is unset
    #[serde(default)]
    pub output_name: Option<String>,
    /// Input channel filter (1-16, 0 = any)
    #[serde(default)]
    pub input_channel: u8,
    /// Output channel (1-16)
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// Captured controllers as a range string
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Usable output value range `[min, max]`
    #[serde(default)]
    pub range: ValueRange,
}

fn default_channel() -> u8 {
    1
}

fn default_filter() -> String {
    "1-128".to_string()
}

impl ConsoleSettings {
    fn named(console: u8) -> Self {
        Self {
            name: console_name(console).to_string(),
            input: None,
            output: None,
            output_name: None,
            input_channel: 0,
            channel: default_channel(),
            filter: default_filter(),
            range: ValueRange::default(),
        }
    }

    /// Parsed controller filter
    pub fn controller_filter(&self) -> Result<ControllerFilter> {
        ControllerFilter::parse(&self.filter)
            .map_err(|e| anyhow!("console {}: invalid filter '{}': {}", self.name, self.filter, e))
    }
}

enum Format {
    Yaml,
    Toml,
}

fn format_of(path: &Path) -> Format {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Format::Toml,
        _ => Format::Yaml,
    }
}

impl Settings {
    /// Load settings from a YAML or TOML file (chosen by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        match format_of(path) {
            Format::Toml => Self::from_toml(&contents),
            Format::Yaml => Self::from_yaml(&contents),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml).context("Failed to parse YAML settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text).context("Failed to parse TOML settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings, format chosen by extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = match format_of(path) {
            Format::Toml => toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?,
            Format::Yaml => serde_yaml::to_string(self).context("Failed to serialize settings to YAML")?,
        };
        fs::write(path, text).with_context(|| format!("Failed to write settings file: {:?}", path))
    }

    /// Check filters, channels and console count
    pub fn validate(&self) -> Result<()> {
        if self.consoles.len() > CONSOLE_COUNT {
            return Err(anyhow!(
                "{} consoles configured, at most {} supported",
                self.consoles.len(),
                CONSOLE_COUNT
            ));
        }
        for console in &self.consoles {
            console.controller_filter()?;
            if console.channel > 16 || console.input_channel > 16 {
                return Err(anyhow!("console {}: MIDI channel out of range", console.name));
            }
        }
        Ok(())
    }

    pub fn console(&self, console: u8) -> Option<&ConsoleSettings> {
        self.consoles.get(console as usize)
    }

    pub fn console_mut(&mut self, console: u8) -> Option<&mut ConsoleSettings> {
        self.consoles.get_mut(console as usize)
    }
}

/// Current session file version
pub const SESSION_VERSION: u32 = 1;

/// A recorded session on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionFile {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Session length in seconds
    pub duration: f32,
    /// Capture filters in effect when recording, one per console
    #[serde(default)]
    pub filters: Vec<String>,
    /// Events as (timestamp, console, channel, number, value)
    #[serde(default)]
    pub events: Vec<ControllerEvent>,
}

fn default_version() -> u32 {
    SESSION_VERSION
}

impl SessionFile {
    pub fn new(log: &EventLog, duration: f32, filters: Vec<String>) -> Self {
        Self {
            version: SESSION_VERSION,
            duration,
            filters,
            events: log.events().to_vec(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read session file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse session YAML")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize session to YAML")
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write session file: {:?}", path.as_ref()))
    }

    /// The event log, sorted and with invalid entries dropped
    pub fn to_log(&self) -> EventLog {
        EventLog::from_events(self.events.clone())
    }
}
