// Project manager for loading and saving projects

use crate::config::ProjectSettings;
use crate::project::serialization::*;
use crate::project::types::*;
use crate::sequencer::session::{NUM_TRACKS, Session};
use crate::sequencer::timeline::Tempo;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const PROJECT_EXTENSION: &str = "json";

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("File system error: {0}")]
    FileSystemError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid project structure: {0}")]
    InvalidStructure(String),

    #[error("Unsupported project version: {0}")]
    UnsupportedVersion(String),

    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Project manager - saves and loads sessions as `<dir>/<name>.json`
pub struct ProjectManager {
    projects_dir: PathBuf,
    current_project_file: Option<PathBuf>,
}

impl ProjectManager {
    pub fn new<P: Into<PathBuf>>(projects_dir: P) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            current_project_file: None,
        }
    }

    pub fn from_settings(settings: &ProjectSettings) -> Self {
        Self::new(settings.resolved_projects_dir())
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// File of the last project saved or loaded
    pub fn current_project_file(&self) -> Option<&Path> {
        self.current_project_file.as_deref()
    }

    /// Path for a project name. Names must be plain file stems.
    pub fn project_path(&self, name: &str) -> Result<PathBuf, ProjectError> {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed == "."
            || trimmed == ".."
        {
            return Err(ProjectError::InvalidStructure(format!(
                "Invalid project name '{}'",
                name
            )));
        }
        Ok(self
            .projects_dir
            .join(format!("{}.{}", trimmed, PROJECT_EXTENSION)))
    }

    /// Save the session under `name`, replacing any previous file.
    /// The creation date of an existing file is kept.
    pub fn save_project(&mut self, session: &Session, name: &str) -> Result<PathBuf, ProjectError> {
        let path = self.project_path(name)?;

        std::fs::create_dir_all(&self.projects_dir).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to create projects directory: {}", e))
        })?;

        let created = std::fs::read_to_string(&path)
            .ok()
            .and_then(|json| deserialize_from_json(&json).ok())
            .map(|previous| previous.created);
        let document = session_to_document(session, created);
        let json = serialize_to_json(&document)?;

        // Write next to the target, then rename over it
        let temp_path = path.with_extension(format!("{}.tmp", PROJECT_EXTENSION));
        std::fs::write(&temp_path, json).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to write project: {}", e))
        })?;
        std::fs::rename(&temp_path, &path).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to replace project file: {}", e))
        })?;

        log::info!("Project '{}' saved to {}", name, path.display());
        self.current_project_file = Some(path.clone());
        Ok(path)
    }

    /// Parse and validate a saved project without touching any session
    pub fn read_project(&self, name: &str) -> Result<ProjectDocument, ProjectError> {
        let path = self.project_path(name)?;
        if !path.is_file() {
            return Err(ProjectError::NotFound(name.to_string()));
        }

        let json = std::fs::read_to_string(&path).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to read project: {}", e))
        })?;
        let document = deserialize_from_json(&json)?;
        validate_document(&document)?;
        Ok(document)
    }

    /// Replace the session's grid and globals with a saved project.
    /// On any error the session is left exactly as it was.
    pub fn load_project(&mut self, session: &mut Session, name: &str) -> Result<(), ProjectError> {
        let document = self.read_project(name)?;
        let tracks = tracks_from_document(&document)?;

        session
            .replace_tracks(tracks)
            .map_err(|e| ProjectError::InvalidStructure(e.to_string()))?;
        session
            .set_bpm(document.bpm)
            .map_err(|e| ProjectError::InvalidStructure(e.to_string()))?;
        session
            .set_current_track(document.current_track)
            .map_err(|e| ProjectError::InvalidStructure(e.to_string()))?;
        session.set_scale(&document.scale);
        session.set_key(&document.key);

        log::info!(
            "Project '{}' loaded ({} tracks with clips)",
            name,
            document.tracks.iter().filter(|t| !t.clip_data.is_empty()).count()
        );
        self.current_project_file = self.project_path(name).ok();
        Ok(())
    }

    /// Saved project names, sorted
    pub fn list_projects(&self) -> Result<Vec<ProjectInfo>, ProjectError> {
        if !self.projects_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut projects = Vec::new();
        for entry in WalkDir::new(&self.projects_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                ProjectError::FileSystemError(format!("Failed to walk directory: {}", e))
            })?;

            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(PROJECT_EXTENSION)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                projects.push(ProjectInfo {
                    name: stem.to_string(),
                    path: path.to_path_buf(),
                });
            }
        }

        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    pub fn delete_project(&mut self, name: &str) -> Result<(), ProjectError> {
        let path = self.project_path(name)?;
        if !path.is_file() {
            return Err(ProjectError::NotFound(name.to_string()));
        }
        std::fs::remove_file(&path)?;
        if self.current_project_file.as_deref() == Some(path.as_path()) {
            self.current_project_file = None;
        }
        Ok(())
    }
}

/// Document-level checks; track and clip contents are checked while building
pub fn validate_document(document: &ProjectDocument) -> Result<(), ProjectError> {
    let version = ProjectVersion::parse(&document.version).ok_or_else(|| {
        ProjectError::InvalidStructure(format!("Invalid version '{}'", document.version))
    })?;
    if !version.is_compatible() {
        return Err(ProjectError::UnsupportedVersion(document.version.clone()));
    }

    if !Tempo::is_valid_bpm(document.bpm) {
        return Err(ProjectError::InvalidStructure(format!(
            "BPM must be between {} and {}, got {}",
            Tempo::MIN_BPM,
            Tempo::MAX_BPM,
            document.bpm
        )));
    }

    if document.current_track >= NUM_TRACKS {
        return Err(ProjectError::InvalidStructure(format!(
            "Current track {} out of range",
            document.current_track
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::manager::MidiDeviceRegistry;
    use crate::sequencer::scheduler::ClipScheduler;
    use crate::sequencer::transport::Transport;
    use tempfile::tempdir;

    fn offline_session() -> Session {
        Session::new(ClipScheduler::new(
            Transport::new(),
            MidiDeviceRegistry::offline(),
        ))
    }

    #[test]
    fn test_project_save_load_cycle() {
        let dir = tempdir().unwrap();
        let mut manager = ProjectManager::new(dir.path());

        let mut session = offline_session();
        session.set_bpm(96.0).unwrap();
        session.set_scale("minor");
        session.set_current_track(3).unwrap();
        session
            .ensure_clip(3, 1)
            .unwrap()
            .add_note_at_step(4, 62, 0.5, 80)
            .unwrap();

        let path = manager.save_project(&session, "groove").unwrap();
        assert!(path.exists());
        assert_eq!(manager.current_project_file(), Some(path.as_path()));

        let mut restored = offline_session();
        manager.load_project(&mut restored, "groove").unwrap();
        assert_eq!(restored.bpm(), 96.0);
        assert_eq!(restored.scale, "minor");
        assert_eq!(restored.current_track(), 3);
        let clip = restored.get_clip_by_idx(3, 1).unwrap();
        assert_eq!(clip.notes_at_step(4), vec![62]);
        assert_eq!(clip.get_amplitude_at_position(4).unwrap(), Some(80));
    }

    #[test]
    fn test_created_date_survives_resave() {
        let dir = tempdir().unwrap();
        let mut manager = ProjectManager::new(dir.path());
        let session = offline_session();

        manager.save_project(&session, "keep").unwrap();
        let first = manager.read_project("keep").unwrap();
        manager.save_project(&session, "keep").unwrap();
        let second = manager.read_project("keep").unwrap();
        assert_eq!(first.created, second.created);
    }

    #[test]
    fn test_list_projects_sorted() {
        let dir = tempdir().unwrap();
        let mut manager = ProjectManager::new(dir.path());
        let session = offline_session();

        assert!(manager.list_projects().unwrap().is_empty());
        manager.save_project(&session, "zeta").unwrap();
        manager.save_project(&session, "alpha").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let names: Vec<String> = manager
            .list_projects()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let dir = tempdir().unwrap();
        let manager = ProjectManager::new(dir.path().join("not-created"));
        assert!(manager.list_projects().unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_project() {
        let dir = tempdir().unwrap();
        let mut manager = ProjectManager::new(dir.path());
        let mut session = offline_session();
        assert!(matches!(
            manager.load_project(&mut session, "nope"),
            Err(ProjectError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let manager = ProjectManager::new("/tmp/projects");
        assert!(manager.project_path("").is_err());
        assert!(manager.project_path("../escape").is_err());
        assert!(manager.project_path("..").is_err());
        assert!(manager.project_path("ok name").is_ok());
    }

    #[test]
    fn test_unsupported_version() {
        let document = ProjectDocument {
            version: "2.0".to_string(),
            ..ProjectDocument::default()
        };
        assert!(matches!(
            validate_document(&document),
            Err(ProjectError::UnsupportedVersion(_))
        ));

        let garbage = ProjectDocument {
            version: "latest".to_string(),
            ..ProjectDocument::default()
        };
        assert!(matches!(
            validate_document(&garbage),
            Err(ProjectError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_delete_project() {
        let dir = tempdir().unwrap();
        let mut manager = ProjectManager::new(dir.path());
        manager.save_project(&offline_session(), "gone").unwrap();
        manager.delete_project("gone").unwrap();
        assert!(manager.current_project_file().is_none());
        assert!(matches!(
            manager.delete_project("gone"),
            Err(ProjectError::NotFound(_))
        ));
    }
}
