// Session - The track x scene grid and what should be playing now
//
// The session is owned by the control loop. Clip play state changes only
// through it: per-clip launches are queued as pending actions on the next
// bar, scene launches as one transition shared by every track.

use crate::config::{SessionSettings, SettingsSection};
use crate::messaging::channels::{NotificationProducer, push_notification};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sequencer::clip::{Clip, EmptyStatus, PlayStatus};
use crate::sequencer::scheduler::{BEATS_PER_BAR, ClipScheduler};
use crate::sequencer::timeline::{self, BarPosition, Tempo};
use crate::sequencer::track::{NUM_SCENES, Track};
use crate::sequencer::transport::Transport;

/// Tracks in a session (one per track button)
pub const NUM_TRACKS: usize = 8;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("BPM must be between {min} and {max}, got {bpm}")]
    InvalidBpm { bpm: f64, min: f64, max: f64 },

    #[error("Invalid velocity: {0}")]
    InvalidVelocity(u8),

    #[error("Track {0} out of range")]
    TrackOutOfRange(usize),

    #[error("Expected {expected} tracks, got {got}")]
    WrongTrackCount { expected: usize, got: usize },
}

/// Grid address of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipRef {
    pub track: usize,
    pub scene: usize,
}

impl ClipRef {
    pub fn new(track: usize, scene: usize) -> Self {
        Self { track, scene }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipAction {
    Start,
    Stop,
}

/// A per-clip launch or stop waiting for its beat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingAction {
    pub beat: f64,
    pub action: ClipAction,
    pub clip: ClipRef,
}

/// A scene launch waiting for its bar line
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTransition {
    pub time: f64,
    pub clips_to_stop: Vec<ClipRef>,
    pub clips_to_start: Vec<ClipRef>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlaybackInfo {
    pub scene: usize,
    pub clip_length: f64,
    pub playhead_position: f64,
}

/// Per-track playback summary for the display
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPlaybackInfo {
    pub track: usize,
    /// Clips playing or cued to stop
    pub playing: Vec<ClipPlaybackInfo>,
    /// Clips cued to play
    pub will_play: Vec<ClipPlaybackInfo>,
}

pub struct Session {
    tracks: Vec<Track>,
    scheduler: ClipScheduler,
    bpm: f64,
    pub scale: String,
    pub key: String,
    fixed_velocity: Option<u8>,
    current_track: usize,
    pending_actions: Vec<PendingAction>,
    pending_scene_transition: Option<SceneTransition>,
    pads_need_update: bool,
    notifications: Option<NotificationProducer>,
}

impl Session {
    pub fn new(scheduler: ClipScheduler) -> Self {
        let bpm = scheduler.transport().tempo().bpm();
        Self {
            tracks: (0..NUM_TRACKS).map(Track::new).collect(),
            scheduler,
            bpm,
            scale: "major".to_string(),
            key: "C".to_string(),
            fixed_velocity: None,
            current_track: 0,
            pending_actions: Vec::new(),
            pending_scene_transition: None,
            pads_need_update: true,
            notifications: None,
        }
    }

    /// Apply startup defaults. Invalid values are logged and skipped.
    pub fn apply_settings(&mut self, settings: &SessionSettings) {
        if let Err(e) = self.set_bpm(settings.bpm) {
            log::warn!("Ignoring session bpm: {}", e);
        }
        self.key = settings.root.clone();
        self.scale = settings.scale.clone();

        for (track, device) in self
            .tracks
            .iter_mut()
            .zip(settings.track_output_devices.iter())
        {
            track.set_output_device_by_name(device.as_deref());
        }
    }

    pub fn settings_section(&self) -> SettingsSection {
        SettingsSection::Session(SessionSettings {
            bpm: self.bpm,
            root: self.key.clone(),
            scale: self.scale.clone(),
            track_output_devices: self
                .tracks
                .iter()
                .map(|t| t.output_device_name().map(str::to_string))
                .collect(),
        })
    }

    pub fn set_notification_producer(&mut self, producer: NotificationProducer) {
        self.notifications = Some(producer);
    }

    fn notify(&mut self, category: NotificationCategory, message: String) {
        if let Some(producer) = self.notifications.as_mut() {
            if !push_notification(producer, Notification::info(category, message)) {
                log::debug!("Notification buffer full, message dropped");
            }
        }
    }

    // ---- Accessors ----

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get_track_by_idx(&self, track: usize) -> Option<&Track> {
        self.tracks.get(track)
    }

    pub fn get_track_by_idx_mut(&mut self, track: usize) -> Option<&mut Track> {
        self.tracks.get_mut(track)
    }

    /// `None` for an out-of-range index and for an empty slot alike
    pub fn get_clip_by_idx(&self, track: usize, scene: usize) -> Option<&Clip> {
        self.tracks.get(track).and_then(|t| t.clip(scene))
    }

    pub fn get_clip_by_idx_mut(&mut self, track: usize, scene: usize) -> Option<&mut Clip> {
        self.tracks.get_mut(track).and_then(|t| t.clip_mut(scene))
    }

    /// Clip at a slot, created if empty (pad press on an empty slot)
    pub fn ensure_clip(&mut self, track: usize, scene: usize) -> Option<&mut Clip> {
        self.pads_need_update = true;
        self.tracks.get_mut(track).and_then(|t| t.ensure_clip(scene))
    }

    /// Swap in a freshly built grid (project load)
    pub fn replace_tracks(&mut self, tracks: Vec<Track>) -> Result<(), SessionError> {
        if tracks.len() != NUM_TRACKS {
            return Err(SessionError::WrongTrackCount {
                expected: NUM_TRACKS,
                got: tracks.len(),
            });
        }
        self.stop_timeline();
        self.tracks = tracks;
        self.pads_need_update = true;
        Ok(())
    }

    pub fn scheduler(&self) -> &ClipScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut ClipScheduler {
        &mut self.scheduler
    }

    pub fn transport(&self) -> &Transport {
        self.scheduler.transport()
    }

    pub fn current_time(&self) -> f64 {
        self.scheduler.current_time()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.transport().is_running()
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn fixed_velocity(&self) -> Option<u8> {
        self.fixed_velocity
    }

    pub fn current_track(&self) -> usize {
        self.current_track
    }

    pub fn pending_actions(&self) -> &[PendingAction] {
        &self.pending_actions
    }

    pub fn pending_scene_transition(&self) -> Option<&SceneTransition> {
        self.pending_scene_transition.as_ref()
    }

    pub fn pads_need_update(&self) -> bool {
        self.pads_need_update
    }

    /// Read and clear the redraw flag
    pub fn take_pads_need_update(&mut self) -> bool {
        std::mem::take(&mut self.pads_need_update)
    }

    // ---- Global settings ----

    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), SessionError> {
        let Some(tempo) = Tempo::try_new(bpm) else {
            return Err(SessionError::InvalidBpm {
                bpm,
                min: Tempo::MIN_BPM,
                max: Tempo::MAX_BPM,
            });
        };
        self.bpm = bpm;
        self.scheduler.transport().set_tempo(tempo);
        log::info!("Tempo set to {:.1} BPM", bpm);
        Ok(())
    }

    pub fn set_scale(&mut self, scale: &str) {
        self.scale = scale.to_string();
    }

    pub fn set_key(&mut self, key: &str) {
        self.key = key.to_string();
    }

    /// `None` turns fixed velocity off
    pub fn set_fixed_velocity(&mut self, velocity: Option<u8>) -> Result<(), SessionError> {
        if let Some(v) = velocity
            && v > 127
        {
            return Err(SessionError::InvalidVelocity(v));
        }
        self.fixed_velocity = velocity;
        Ok(())
    }

    pub fn set_current_track(&mut self, track: usize) -> Result<(), SessionError> {
        if track >= self.tracks.len() {
            return Err(SessionError::TrackOutOfRange(track));
        }
        self.current_track = track;
        Ok(())
    }

    // ---- Timeline ----

    pub fn start_timeline(&mut self) {
        self.scheduler.start_timeline();
    }

    /// Stop everything: no schedule stays live, no clip stays playing or cued
    pub fn stop_timeline(&mut self) {
        self.scheduler.stop_timeline();
        for track in self.tracks.iter_mut() {
            for scene in 0..NUM_SCENES {
                if let Some(clip) = track.clip_mut(scene) {
                    clip.stop_playing();
                    clip.cancel_cues();
                }
            }
        }
        self.pending_actions.clear();
        self.pending_scene_transition = None;
        self.pads_need_update = true;
    }

    /// Back to beat 0. Playing clips restart from their first step; cues are dropped.
    pub fn reset_timeline(&mut self) {
        self.scheduler.reset_timeline();
        for track in self.tracks.iter_mut() {
            for scene in 0..NUM_SCENES {
                if let Some(clip) = track.clip_mut(scene) {
                    clip.cancel_cues();
                    if clip.playing() {
                        clip.start_playing(0.0);
                    }
                }
            }
        }
        self.pending_actions.clear();
        self.pending_scene_transition = None;
        self.pads_need_update = true;
    }

    /// Next 4/4 bar boundary strictly after now
    pub fn get_next_bar_boundary(&self, bars_per_quantize: u32) -> f64 {
        self.scheduler.get_next_bar_boundary(bars_per_quantize)
    }

    // ---- Per-clip launch ----

    fn remove_pending_for(&mut self, clip: ClipRef) {
        self.pending_actions.retain(|a| a.clip != clip);
    }

    /// Take clips of a track (or one clip when `scene` is given) out of the
    /// pending scene transition and cancel their cues. A later per-clip
    /// launch or stop wins over an earlier scene launch.
    fn withdraw_from_scene_transition(&mut self, track: usize, scene: Option<usize>) {
        let Some(transition) = self.pending_scene_transition.as_mut() else {
            return;
        };
        let matches = |c: &ClipRef| c.track == track && scene.is_none_or(|s| s == c.scene);

        let withdrawn: Vec<ClipRef> = transition
            .clips_to_stop
            .iter()
            .chain(transition.clips_to_start.iter())
            .copied()
            .filter(|c| matches(c))
            .collect();
        transition.clips_to_stop.retain(|c| !matches(c));
        transition.clips_to_start.retain(|c| !matches(c));
        if transition.clips_to_stop.is_empty() && transition.clips_to_start.is_empty() {
            self.pending_scene_transition = None;
        }

        for clip_ref in withdrawn {
            if let Some(clip) = self.get_clip_by_idx_mut(clip_ref.track, clip_ref.scene) {
                clip.cancel_cues();
            }
        }
    }

    /// Schedule and enter the playing state now. The track's previous
    /// schedule is replaced; a failure leaves the clip stopped.
    fn start_clip_now(&mut self, clip_ref: ClipRef, at_beat: f64) -> bool {
        let ClipRef { track, scene } = clip_ref;
        let Some(track_ref) = self.tracks.get(track) else {
            return false;
        };
        let Some(clip) = track_ref.clip(scene) else {
            return false;
        };

        let result = self.scheduler.schedule_clip_at(
            track,
            clip,
            track_ref.output_device_name(),
            track_ref.midi_channel(),
            at_beat,
        );

        for other in 0..NUM_SCENES {
            if other != scene
                && let Some(clip) = self.tracks[track].clip_mut(other)
                && clip.playing()
            {
                clip.stop_playing();
            }
        }

        let Some(clip) = self.tracks[track].clip_mut(scene) else {
            return false;
        };
        // The schedule was built from the current content
        clip.take_content_changed();
        self.pads_need_update = true;
        match result {
            Ok(_) => {
                clip.start_playing(at_beat);
                true
            }
            Err(e) => {
                log::error!("Could not start clip {}-{}: {}", track + 1, scene + 1, e);
                clip.stop_playing();
                clip.cancel_cues();
                false
            }
        }
    }

    /// Leave the playing state now and drop the track's schedule
    fn stop_clip_now(&mut self, clip_ref: ClipRef) {
        let ClipRef { track, scene } = clip_ref;
        let Some(clip) = self.get_clip_by_idx_mut(track, scene) else {
            return;
        };
        let was_playing = clip.playing();
        clip.stop_playing();
        if was_playing {
            self.scheduler.unschedule_clip(track);
        }
        self.pads_need_update = true;
    }

    /// Launch a clip: on the next bar while running, right away when stopped.
    /// Any other clip playing on the track stops at the same moment, and the
    /// track no longer follows a pending scene launch.
    pub fn play_clip(&mut self, track: usize, scene: usize) -> bool {
        let clip_ref = ClipRef::new(track, scene);
        let Some(clip) = self.get_clip_by_idx_mut(track, scene) else {
            return false;
        };
        if !clip.play() {
            return false;
        }
        self.withdraw_from_scene_transition(track, None);

        if !self.is_running() {
            return self.start_clip_now(clip_ref, self.current_time());
        }

        let beat = self.get_next_bar_boundary(1);
        self.remove_pending_for(clip_ref);
        if let Some(clip) = self.get_clip_by_idx_mut(track, scene) {
            clip.cue_play(beat);
        }
        self.pending_actions.push(PendingAction {
            beat,
            action: ClipAction::Start,
            clip: clip_ref,
        });

        for other in 0..NUM_SCENES {
            if other == scene {
                continue;
            }
            let other_ref = ClipRef::new(track, other);
            let Some(clip) = self.get_clip_by_idx_mut(track, other) else {
                continue;
            };
            if clip.playing() {
                clip.cue_stop(beat);
                self.remove_pending_for(other_ref);
                self.pending_actions.push(PendingAction {
                    beat,
                    action: ClipAction::Stop,
                    clip: other_ref,
                });
            } else if clip.will_play_at() >= 0.0 {
                clip.cancel_cues();
                self.remove_pending_for(other_ref);
            }
        }

        log::debug!("Clip {}-{} will start at beat {}", track + 1, scene + 1, beat);
        self.pads_need_update = true;
        true
    }

    /// Stop a clip: on the next bar while running, right away when stopped.
    /// A clip only cued to play gets its cue cancelled.
    pub fn stop_clip(&mut self, track: usize, scene: usize) -> bool {
        let clip_ref = ClipRef::new(track, scene);
        let running = self.is_running();
        let Some(clip) = self.get_clip_by_idx_mut(track, scene) else {
            return false;
        };
        if clip.track_index().is_none() {
            return false;
        }
        self.withdraw_from_scene_transition(track, Some(scene));

        let Some(clip) = self.get_clip_by_idx_mut(track, scene) else {
            return false;
        };
        if !clip.playing() {
            clip.cancel_cues();
            self.remove_pending_for(clip_ref);
            self.pads_need_update = true;
            return true;
        }

        if !running {
            clip.stop();
            self.remove_pending_for(clip_ref);
            self.stop_clip_now(clip_ref);
            return true;
        }

        clip.stop();
        let beat = self.get_next_bar_boundary(1);
        if let Some(clip) = self.get_clip_by_idx_mut(track, scene) {
            clip.cue_stop(beat);
        }
        self.remove_pending_for(clip_ref);
        self.pending_actions.push(PendingAction {
            beat,
            action: ClipAction::Stop,
            clip: clip_ref,
        });
        log::debug!("Clip {}-{} will stop at beat {}", track + 1, scene + 1, beat);
        self.pads_need_update = true;
        true
    }

    pub fn play_stop_clip(&mut self, track: usize, scene: usize) -> bool {
        match self.get_clip_by_idx(track, scene) {
            Some(clip) if clip.playing() || clip.will_play_at() >= 0.0 => {
                self.stop_clip(track, scene)
            }
            Some(_) => self.play_clip(track, scene),
            None => false,
        }
    }

    /// Run pending actions whose beat has come, stops before starts
    pub fn process_pending_actions(&mut self) {
        let now = self.current_time();
        let (due, waiting): (Vec<PendingAction>, Vec<PendingAction>) = self
            .pending_actions
            .drain(..)
            .partition(|a| a.beat <= now);
        self.pending_actions = waiting;

        for action in due.iter().filter(|a| a.action == ClipAction::Stop) {
            self.stop_clip_now(action.clip);
        }
        for action in due.iter().filter(|a| a.action == ClipAction::Start) {
            self.start_clip_now(action.clip, action.beat);
        }
    }

    // ---- Scenes ----

    /// Cue a scene on the next bar line: every playing clip stops and every
    /// non-empty clip of the scene starts, all tracks on the same beat.
    /// A newer scene launch replaces a pending one, and pending per-clip
    /// launches and stops are dropped.
    pub fn scene_play(&mut self, scene: usize) -> bool {
        if scene >= NUM_SCENES {
            return false;
        }

        let now = self.current_time();
        let time = now.floor() + timeline::beats_until_next_bar(now, BEATS_PER_BAR);

        if let Some(previous) = self.pending_scene_transition.take() {
            for clip_ref in previous
                .clips_to_stop
                .iter()
                .chain(previous.clips_to_start.iter())
            {
                if let Some(clip) = self.get_clip_by_idx_mut(clip_ref.track, clip_ref.scene) {
                    clip.cancel_cues();
                }
            }
        }

        self.pending_actions.clear();

        let mut clips_to_stop = Vec::new();
        let mut clips_to_start = Vec::new();
        for track in self.tracks.iter_mut() {
            let track_index = track.index();
            for slot in 0..NUM_SCENES {
                let Some(clip) = track.clip_mut(slot) else {
                    continue;
                };
                clip.cancel_cues();
                if clip.playing() {
                    clip.cue_stop(time);
                    clips_to_stop.push(ClipRef::new(track_index, slot));
                }
                if slot == scene && !clip.is_empty() {
                    clip.cue_play(time);
                    clips_to_start.push(ClipRef::new(track_index, slot));
                }
            }
        }

        log::info!(
            "Scene {} cued at beat {} ({} to stop, {} to start)",
            scene + 1,
            time,
            clips_to_stop.len(),
            clips_to_start.len()
        );
        let position = BarPosition::from_beats(time, BEATS_PER_BAR as u32);
        self.notify(
            NotificationCategory::Session,
            format!("Scene {} cued at {}", scene + 1, position),
        );

        self.pending_scene_transition = Some(SceneTransition {
            time,
            clips_to_stop,
            clips_to_start,
        });
        self.pads_need_update = true;
        true
    }

    /// Fire the pending scene transition once its time has come.
    /// Returns whether it fired.
    pub fn check_pending_scene_transition(&mut self) -> bool {
        let due = self
            .pending_scene_transition
            .as_ref()
            .is_some_and(|t| self.current_time() >= t.time);
        if !due {
            return false;
        }
        let Some(transition) = self.pending_scene_transition.take() else {
            return false;
        };

        for clip_ref in transition.clips_to_stop.iter() {
            self.stop_clip_now(*clip_ref);
        }
        for clip_ref in transition.clips_to_start.iter() {
            self.start_clip_now(*clip_ref, transition.time);
        }

        self.pads_need_update = true;
        true
    }

    pub fn update_playhead_positions(&mut self) {
        let now = self.current_time();
        for track in self.tracks.iter_mut() {
            for scene in 0..NUM_SCENES {
                if let Some(clip) = track.clip_mut(scene)
                    && clip.playing()
                {
                    clip.update_playhead_position(now);
                }
            }
        }
    }

    /// Turn `Clip::play`/`Clip::stop` requests made outside the session into launches
    fn resolve_unattended_cues(&mut self) {
        let mut plays = Vec::new();
        let mut stops = Vec::new();
        for (track_index, track) in self.tracks.iter().enumerate() {
            for (scene, clip) in track
                .clips()
                .iter()
                .enumerate()
                .filter_map(|(scene, c)| c.as_ref().map(|c| (scene, c)))
            {
                if clip.has_unresolved_play() {
                    plays.push(ClipRef::new(track_index, scene));
                } else if clip.has_unresolved_stop() {
                    stops.push(ClipRef::new(track_index, scene));
                }
            }
        }

        for clip_ref in stops {
            self.stop_clip(clip_ref.track, clip_ref.scene);
        }
        for clip_ref in plays {
            self.play_clip(clip_ref.track, clip_ref.scene);
        }
    }

    /// Playing clips edited outside `edit_clip` get their schedule rebuilt
    fn reschedule_changed_clips(&mut self) {
        let mut changed = Vec::new();
        for (track_index, track) in self.tracks.iter_mut().enumerate() {
            for scene in 0..NUM_SCENES {
                if let Some(clip) = track.clip_mut(scene)
                    && clip.take_content_changed()
                    && clip.playing()
                {
                    changed.push((track_index, scene));
                }
            }
        }

        for (track, scene) in changed {
            self.reschedule_track(track, scene);
            self.pads_need_update = true;
        }
    }

    /// Once per control cycle
    pub fn check_for_delayed_actions(&mut self) {
        self.resolve_unattended_cues();
        self.reschedule_changed_clips();
        self.process_pending_actions();
        self.check_pending_scene_transition();
        self.update_playhead_positions();
    }

    /// Tracks with something playing or cued, for the display
    pub fn playing_clips_info(&self) -> Vec<TrackPlaybackInfo> {
        let mut info = Vec::new();
        for track in self.tracks.iter() {
            let mut playing = Vec::new();
            let mut will_play = Vec::new();

            for (scene, clip) in track
                .clips()
                .iter()
                .enumerate()
                .filter_map(|(scene, c)| c.as_ref().map(|c| (scene, c)))
            {
                let status = clip.get_status();
                if status.empty_status == EmptyStatus::Empty {
                    continue;
                }
                let entry = ClipPlaybackInfo {
                    scene,
                    clip_length: status.clip_length,
                    playhead_position: clip.playhead_position_in_beats(),
                };
                match status.play_status {
                    PlayStatus::Playing | PlayStatus::CuedToStop => playing.push(entry),
                    PlayStatus::CuedToPlay => will_play.push(entry),
                    PlayStatus::Stopped => {}
                }
            }

            if !playing.is_empty() || !will_play.is_empty() {
                info.push(TrackPlaybackInfo {
                    track: track.index(),
                    playing,
                    will_play,
                });
            }
        }
        info
    }

    // ---- Clip editing ----

    /// Edit a clip; a playing clip is rescheduled afterwards so the next
    /// pass plays the new content.
    pub fn edit_clip<F, R>(&mut self, track: usize, scene: usize, edit: F) -> Option<R>
    where
        F: FnOnce(&mut Clip) -> R,
    {
        let clip = self.get_clip_by_idx_mut(track, scene)?;
        let result = edit(clip);
        clip.take_content_changed();
        self.reschedule_track(track, scene);
        self.pads_need_update = true;
        Some(result)
    }

    fn reschedule_track(&mut self, track: usize, scene: usize) {
        let Some(track_ref) = self.tracks.get(track) else {
            return;
        };
        let Some(clip) = track_ref.clip(scene) else {
            return;
        };
        if let Err(e) = self.scheduler.reschedule_clip(
            track,
            clip,
            track_ref.output_device_name(),
            track_ref.midi_channel(),
        ) {
            log::error!("Reschedule of track {} failed: {}", track + 1, e);
        }
    }

    pub fn clear_clip(&mut self, track: usize, scene: usize) -> bool {
        if self.edit_clip(track, scene, Clip::clear).is_none() {
            return false;
        }
        self.notify(
            NotificationCategory::Session,
            format!("Cleared clip: {}-{}", track + 1, scene + 1),
        );
        true
    }

    pub fn double_clip(&mut self, track: usize, scene: usize) -> bool {
        if self.edit_clip(track, scene, Clip::double).is_none() {
            return false;
        }
        self.notify(
            NotificationCategory::Session,
            format!("Doubled clip: {}-{}", track + 1, scene + 1),
        );
        true
    }

    /// Recording toggles immediately, it is never quantized
    pub fn record_on_off_clip(&mut self, track: usize, scene: usize) -> bool {
        let toggled = self
            .get_clip_by_idx_mut(track, scene)
            .is_some_and(Clip::record_on_off);
        if toggled {
            self.pads_need_update = true;
        }
        toggled
    }

    // ---- Devices ----

    /// Note on (velocity > 0) or note off (velocity 0) to a named device
    pub fn send_note(&mut self, device_name: &str, note: u8, velocity: u8, channel: u8) {
        self.scheduler.send_note(device_name, note, velocity, channel);
    }

    pub fn update_midi_devices(&mut self) {
        self.scheduler.update_midi_devices();
    }
}
