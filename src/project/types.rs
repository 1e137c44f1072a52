// Types for project persistence

use serde::{Deserialize, Serialize};

use crate::sequencer::clip::StepData;

/// Project format version ("major.minor")
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectVersion {
    pub major: u32,
    pub minor: u32,
}

impl ProjectVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn current() -> Self {
        Self::new(1, 0)
    }

    /// Parse "1", "1.0" or "1.0.3" (patch ignored)
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().ok()?,
            None => 0,
        };
        Some(Self { major, minor })
    }

    /// Same major version loads; minor differences only add defaulted fields
    pub fn is_compatible(&self) -> bool {
        self.major == Self::current().major
    }
}

impl std::fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One saved clip slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipDocument {
    /// Scene index
    pub index: usize,
    pub name: String,
    pub clip_length_in_beats: f64,
    pub step_divisions: u32,
    pub beats_per_bar: u32,
    pub bpm_multiplier: f64,
    pub current_quantization_step: f64,
    pub max_polyphony: usize,
    #[serde(flatten)]
    pub step_data: StepData,
}

impl Default for ClipDocument {
    fn default() -> Self {
        Self {
            index: 0,
            name: String::new(),
            clip_length_in_beats: 4.0,
            step_divisions: 16,
            beats_per_bar: 4,
            bpm_multiplier: 1.0,
            current_quantization_step: 0.0,
            max_polyphony: crate::sequencer::clip::DEFAULT_MAX_POLYPHONY,
            step_data: StepData::default(),
        }
    }
}

/// One saved track with its non-empty clip slots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackDocument {
    pub index: usize,
    /// Output device name
    pub device: Option<String>,
    pub midi_channel: u8,
    pub input_monitoring: bool,
    pub clip_data: Vec<ClipDocument>,
}

/// A whole saved session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDocument {
    pub version: String,
    /// RFC 3339
    pub created: String,
    /// RFC 3339
    pub modified: String,
    pub bpm: f64,
    pub current_track: usize,
    pub scale: String,
    pub key: String,
    pub tracks: Vec<TrackDocument>,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: ProjectVersion::current().to_string(),
            created: now.clone(),
            modified: now,
            bpm: 120.0,
            current_track: 0,
            scale: "major".to_string(),
            key: "C".to_string(),
            tracks: Vec::new(),
        }
    }
}

/// Entry of `ProjectManager::list_projects`
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInfo {
    pub name: String,
    pub path: std::path::PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        assert_eq!(ProjectVersion::parse("1.0"), Some(ProjectVersion::new(1, 0)));
        assert_eq!(ProjectVersion::parse("1"), Some(ProjectVersion::new(1, 0)));
        assert_eq!(ProjectVersion::parse("1.3.7"), Some(ProjectVersion::new(1, 3)));
        assert_eq!(ProjectVersion::parse("one"), None);
        assert_eq!(ProjectVersion::parse(""), None);
    }

    #[test]
    fn test_version_compatibility() {
        assert!(ProjectVersion::new(1, 4).is_compatible());
        assert!(!ProjectVersion::new(2, 0).is_compatible());
        assert!(!ProjectVersion::new(0, 9).is_compatible());
        assert_eq!(ProjectVersion::current().to_string(), "1.0");
    }

    #[test]
    fn test_missing_fields_are_defaulted() {
        let doc: ProjectDocument = serde_json::from_str(r#"{"bpm": 90.0}"#).unwrap();
        assert_eq!(doc.bpm, 90.0);
        assert_eq!(doc.version, "1.0");
        assert!(doc.tracks.is_empty());

        let clip: ClipDocument = serde_json::from_str(r#"{"index": 2, "notes": [[60]]}"#).unwrap();
        assert_eq!(clip.index, 2);
        assert_eq!(clip.clip_length_in_beats, 4.0);
        assert_eq!(clip.step_data.notes, vec![vec![60]]);
    }
}
