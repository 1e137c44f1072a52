// Serialization utilities for project persistence
//
// Conversions between the live session grid and `ProjectDocument`. Building
// tracks from a document validates everything up front so a bad file never
// leaves a half-built grid behind.

use crate::project::manager::ProjectError;
use crate::project::types::*;
use crate::sequencer::clip::{Clip, ClipError};
use crate::sequencer::session::{NUM_TRACKS, Session};
use crate::sequencer::track::{NUM_SCENES, Track};

/// Serialize a project document to pretty JSON
pub fn serialize_to_json(document: &ProjectDocument) -> Result<String, ProjectError> {
    serde_json::to_string_pretty(document).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to serialize project: {}", e))
    })
}

/// Deserialize a project document from JSON
pub fn deserialize_from_json(json_data: &str) -> Result<ProjectDocument, ProjectError> {
    serde_json::from_str(json_data).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to deserialize project: {}", e))
    })
}

pub fn clip_to_document(scene: usize, clip: &Clip) -> ClipDocument {
    ClipDocument {
        index: scene,
        name: clip.name.clone(),
        clip_length_in_beats: clip.clip_length_in_beats(),
        step_divisions: clip.step_divisions(),
        beats_per_bar: clip.beats_per_bar(),
        bpm_multiplier: clip.bpm_multiplier(),
        current_quantization_step: clip.current_quantization_step(),
        max_polyphony: clip.max_polyphony(),
        step_data: clip.step_data(),
    }
}

pub fn track_to_document(track: &Track) -> TrackDocument {
    TrackDocument {
        index: track.index(),
        device: track.output_device_name().map(str::to_string),
        midi_channel: track.midi_channel(),
        input_monitoring: track.input_monitoring,
        clip_data: track
            .clips()
            .iter()
            .enumerate()
            .filter_map(|(scene, clip)| clip.as_ref().map(|c| clip_to_document(scene, c)))
            .collect(),
    }
}

/// Snapshot the session. `created` is kept from a previous save when given.
pub fn session_to_document(session: &Session, created: Option<String>) -> ProjectDocument {
    let now = chrono::Utc::now().to_rfc3339();
    ProjectDocument {
        version: ProjectVersion::current().to_string(),
        created: created.unwrap_or_else(|| now.clone()),
        modified: now,
        bpm: session.bpm(),
        current_track: session.current_track(),
        scale: session.scale.clone(),
        key: session.key.clone(),
        tracks: session.tracks().iter().map(track_to_document).collect(),
    }
}

fn invalid(message: String) -> ProjectError {
    ProjectError::InvalidStructure(message)
}

/// Build a detached clip with geometry first, then content
pub fn clip_from_document(document: &ClipDocument) -> Result<Clip, ProjectError> {
    let context = |e: ClipError| invalid(format!("Clip '{}': {}", document.name, e));

    let mut clip = Clip::new();
    clip.name = document.name.clone();
    clip.set_beats_per_bar(document.beats_per_bar).map_err(context)?;
    clip.set_step_divisions(document.step_divisions).map_err(context)?;
    clip.set_length(document.clip_length_in_beats).map_err(context)?;
    clip.set_bpm_multiplier(document.bpm_multiplier).map_err(context)?;
    clip.set_max_polyphony(document.max_polyphony);
    clip.load_step_data(&document.step_data).map_err(context)?;
    clip.set_quantization_step(document.current_quantization_step);
    Ok(clip)
}

pub fn track_from_document(document: &TrackDocument) -> Result<Track, ProjectError> {
    if document.index >= NUM_TRACKS {
        return Err(invalid(format!("Track index {} out of range", document.index)));
    }

    let mut track = Track::new(document.index);
    track.set_output_device_by_name(document.device.as_deref());
    track
        .set_midi_channel(document.midi_channel)
        .map_err(|e| invalid(format!("Track {}: {}", document.index + 1, e)))?;
    track.set_input_monitoring(document.input_monitoring);

    for clip_document in document.clip_data.iter() {
        if clip_document.index >= NUM_SCENES {
            return Err(invalid(format!(
                "Track {}: scene {} out of range",
                document.index + 1,
                clip_document.index
            )));
        }
        let clip = clip_from_document(clip_document)?;
        track
            .add_clip(clip_document.index, clip)
            .map_err(|e| invalid(format!("Track {}: {}", document.index + 1, e)))?;
    }
    Ok(track)
}

/// A complete grid: listed tracks rebuilt, missing ones left empty
pub fn tracks_from_document(document: &ProjectDocument) -> Result<Vec<Track>, ProjectError> {
    let mut tracks: Vec<Track> = (0..NUM_TRACKS).map(Track::new).collect();
    let mut seen = [false; NUM_TRACKS];

    for track_document in document.tracks.iter() {
        let track = track_from_document(track_document)?;
        let index = track.index();
        if std::mem::replace(&mut seen[index], true) {
            return Err(invalid(format!("Track {} listed twice", index + 1)));
        }
        tracks[index] = track;
    }
    Ok(tracks)
}
