// Project persistence - sessions saved as JSON documents

pub mod manager;
pub mod serialization;
pub mod types;

pub use manager::{ProjectError, ProjectManager, validate_document};
pub use types::{ClipDocument, ProjectDocument, ProjectInfo, ProjectVersion, TrackDocument};
