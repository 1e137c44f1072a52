// Sequencer module
// Clips, tracks and the session grid, plus the beat clock that plays them

pub mod clip;
pub mod event;
pub mod scheduler;
pub mod session;
pub mod timeline;
pub mod track;
pub mod transport;

pub use clip::{Clip, ClipError, ClipStatus, EmptyStatus, PlayStatus, RecordStatus, StepData};
pub use event::{EventId, SequenceEvent, SequenceEventEdit, SequenceEventKind};
pub use scheduler::{ClipScheduler, ScheduleError};
pub use session::{ClipRef, Session, SessionError, TrackPlaybackInfo};
pub use timeline::{BarPosition, Tempo};
pub use track::{Track, TrackError};
pub use transport::{ClockHandle, ScheduleId, SequenceSlot, Transport};
