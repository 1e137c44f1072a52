// Application settings
//
// Settings are stored as one JSON document made of per-component sections.
// Components hand back their section as a `SettingsSection`; `assemble`
// merges them into the document that gets written to disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Errors while reading or writing the settings file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Control loop and display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Control cycles per second
    pub target_frame_rate: u32,
    /// Whether the external display renderer is enabled
    pub use_display: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            target_frame_rate: 60,
            use_display: true,
        }
    }
}

/// MIDI device discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    pub midi_in_default_channel: u8,
    pub default_midi_in_device_name: Option<String>,
    /// Ports whose name contains any of these are never opened
    pub excluded_port_patterns: Vec<String>,
    /// Seconds between two scans for newly connected devices
    pub device_rescan_interval_secs: f64,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            midi_in_default_channel: 0,
            default_midi_in_device_name: None,
            excluded_port_patterns: vec![
                "Ableton Push".to_string(),
                "RtMidi".to_string(),
                "Through".to_string(),
            ],
            device_rescan_interval_secs: 5.0,
        }
    }
}

/// Session defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub bpm: f64,
    pub root: String,
    pub scale: String,
    /// Output device bound to each track at startup, by track index
    pub track_output_devices: Vec<Option<String>>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            root: "C".to_string(),
            scale: "major".to_string(),
            track_output_devices: Vec::new(),
        }
    }
}

/// Project storage settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Defaults to `~/pushit-projects`
    pub projects_dir: Option<PathBuf>,
}

impl ProjectSettings {
    pub fn resolved_projects_dir(&self) -> PathBuf {
        self.projects_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pushit-projects")
        })
    }
}

/// One component's contribution to the settings document
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsSection {
    App(AppSettings),
    Midi(MidiSettings),
    Session(SessionSettings),
    Projects(ProjectSettings),
}

/// Full settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub midi: MidiSettings,
    pub session: SessionSettings,
    pub projects: ProjectSettings,
}

impl Settings {
    /// Build a document from component sections, later sections win
    pub fn assemble<I>(sections: I) -> Self
    where
        I: IntoIterator<Item = SettingsSection>,
    {
        let mut settings = Settings::default();
        for section in sections {
            settings.merge(section);
        }
        settings
    }

    /// Replace one section
    pub fn merge(&mut self, section: SettingsSection) {
        match section {
            SettingsSection::App(app) => self.app = app,
            SettingsSection::Midi(midi) => self.midi = midi,
            SettingsSection::Session(session) => self.session = session,
            SettingsSection::Projects(projects) => self.projects = projects,
        }
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&json)?;
        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
