// Integration tests for the session grid
// Clip launching, scene transitions and clip editing through `Session`

use pushit::config::Settings;
use pushit::midi::device::{CaptureDevice, OutputDevice};
use pushit::midi::manager::MidiDeviceRegistry;
use pushit::sequencer::clip::PlayStatus;
use pushit::sequencer::session::{ClipRef, NUM_TRACKS};
use pushit::sequencer::{Clip, ClipScheduler, Session, Tempo, Transport};

fn session_with_synth() -> (Session, CaptureDevice) {
    let mut registry = MidiDeviceRegistry::offline();
    let sink = CaptureDevice::new();
    registry.register("Synth", OutputDevice::capture("Synth", sink.clone()));

    let mut session = Session::new(ClipScheduler::new(Transport::new(), registry));
    for index in 0..NUM_TRACKS {
        session
            .get_track_by_idx_mut(index)
            .unwrap()
            .set_output_device_by_name(Some("Synth"));
    }
    (session, sink)
}

fn run_until(session: &mut Session, beat: f64) {
    // Control frames of 1/32 beat
    while session.current_time() < beat - 1e-9 {
        let step = (beat - session.current_time()).min(1.0 / 32.0);
        session.transport().advance(step);
        session.check_for_delayed_actions();
    }
}

#[test]
fn test_default_clip_geometry() {
    let clip = Clip::new();
    assert_eq!(clip.clip_length_in_beats(), 4.0);
    assert_eq!(clip.step_divisions(), 16);
    assert_eq!(clip.steps(), 16);
    assert_eq!(clip.pages(), 2);
}

#[test]
fn test_add_and_remove_note_through_session() {
    let (mut session, _) = session_with_synth();
    let clip = session.ensure_clip(0, 0).unwrap();
    clip.add_note_at_step(3, 64, 0.25, 100).unwrap();
    assert!(clip.has_note_at_step(3, 64));
    assert!(!clip.is_empty());

    assert!(clip.remove_note_at_step(3, 64).unwrap());
    assert!(clip.is_empty());
    assert!(clip.add_note_at_step(16, 64, 0.25, 100).is_err());
}

#[test]
fn test_next_bar_boundary_while_running() {
    let (mut session, _) = session_with_synth();
    session.start_timeline();
    run_until(&mut session, 5.5);
    assert_eq!(session.get_next_bar_boundary(1), 8.0);
    assert_eq!(session.get_next_bar_boundary(2), 8.0);
}

#[test]
fn test_scene_launch_from_beat_three() {
    let (mut session, sink) = session_with_synth();
    for track in 0..3 {
        session
            .ensure_clip(track, 2)
            .unwrap()
            .add_note_at_step(0, 60 + track as u8, 0.25, 100)
            .unwrap();
    }

    session.start_timeline();
    run_until(&mut session, 3.0);
    assert!(session.scene_play(2));
    assert_eq!(session.pending_scene_transition().unwrap().time, 4.0);
    for track in 0..3 {
        let status = session.get_clip_by_idx(track, 2).unwrap().get_status();
        assert_eq!(status.play_status, PlayStatus::CuedToPlay);
    }
    assert!(sink.messages().is_empty());

    run_until(&mut session, 4.0);
    assert!(session.pending_scene_transition().is_none());
    for track in 0..3 {
        let clip = session.get_clip_by_idx(track, 2).unwrap();
        assert!(clip.playing());
        assert_eq!(clip.play_started_at(), 4.0);
    }

    run_until(&mut session, 4.1);
    let ons = sink.messages().iter().filter(|m| m.is_note_on()).count();
    assert_eq!(ons, 3);
}

#[test]
fn test_only_one_clip_per_track_plays() {
    let (mut session, _) = session_with_synth();
    for scene in 0..4 {
        session
            .ensure_clip(0, scene)
            .unwrap()
            .add_note_at_step(0, 40, 0.25, 100)
            .unwrap();
    }

    session.start_timeline();
    for scene in 0..4 {
        session.play_clip(0, scene);
        let boundary = session.get_next_bar_boundary(1);
        run_until(&mut session, boundary);
        let playing = session.get_track_by_idx(0).unwrap().playing_scenes();
        assert_eq!(playing, vec![scene]);
    }
    assert_eq!(session.scheduler().live_schedule_count(), 1);
}

#[test]
fn test_scene_launch_stops_other_tracks() {
    let (mut session, _) = session_with_synth();
    session.ensure_clip(0, 0).unwrap().add_note_at_step(0, 36, 0.25, 100).unwrap();
    session.ensure_clip(1, 1).unwrap().add_note_at_step(0, 48, 0.25, 100).unwrap();

    session.play_clip(0, 0);
    session.start_timeline();
    run_until(&mut session, 1.0);

    session.scene_play(1);
    let transition = session.pending_scene_transition().unwrap();
    assert_eq!(transition.clips_to_stop, vec![ClipRef::new(0, 0)]);
    assert_eq!(transition.clips_to_start, vec![ClipRef::new(1, 1)]);

    run_until(&mut session, 4.0);
    assert!(!session.get_clip_by_idx(0, 0).unwrap().playing());
    assert!(session.get_clip_by_idx(1, 1).unwrap().playing());
    assert!(!session.scheduler().has_schedule(0));
    assert!(session.scheduler().has_schedule(1));
}

#[test]
fn test_clear_and_double_playing_clip() {
    let (mut session, _) = session_with_synth();
    {
        let clip = session.ensure_clip(2, 3).unwrap();
        clip.add_note_at_step(0, 60, 0.25, 100).unwrap();
        clip.add_note_at_step(5, 62, 0.25, 90).unwrap();
    }
    session.play_clip(2, 3);

    assert!(session.double_clip(2, 3));
    let clip = session.get_clip_by_idx(2, 3).unwrap();
    assert_eq!(clip.clip_length_in_beats(), 8.0);
    assert_eq!(clip.steps(), 32);
    assert!(clip.has_note_at_step(16, 60));
    assert!(clip.has_note_at_step(21, 62));
    assert!(session.scheduler().has_schedule(2));

    assert!(session.clear_clip(2, 3));
    assert!(session.get_clip_by_idx(2, 3).unwrap().is_empty());
    assert!(session.get_clip_by_idx(2, 3).unwrap().playing());
}

#[test]
fn test_orphan_clip_ignores_playback() {
    let mut clip = Clip::new();
    assert!(!clip.play());
    assert!(!clip.stop());
    assert!(!clip.record_on_off());
    assert_eq!(clip.get_status().play_status, PlayStatus::Stopped);
}

#[test]
fn test_stop_timeline_silences_everything() {
    let (mut session, sink) = session_with_synth();
    for track in 0..4 {
        session
            .ensure_clip(track, 0)
            .unwrap()
            .add_note_at_step(0, 50 + track as u8, 1.0, 100)
            .unwrap();
        session.play_clip(track, 0);
    }
    session.start_timeline();
    run_until(&mut session, 0.5);

    session.stop_timeline();
    let messages = sink.take_messages();
    let ons = messages.iter().filter(|m| m.is_note_on()).count();
    let offs = messages.iter().filter(|m| m.is_note_off()).count();
    assert_eq!(ons, 4);
    assert_eq!(offs, 4);
    assert!(session.playing_clips_info().is_empty());
}

#[test]
fn test_out_of_range_settings_bpm_keeps_default_tempo() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"session":{"bpm":5}}"#).unwrap();
    let settings = Settings::load(&path).unwrap();

    let (mut session, _) = session_with_synth();
    session.apply_settings(&settings.session);
    assert_eq!(session.bpm(), Tempo::DEFAULT_BPM);
    assert_eq!(session.transport().tempo().bpm(), Tempo::DEFAULT_BPM);
}

#[test]
fn test_scene_launch_overrides_queued_clip_launches() {
    let (mut session, _) = session_with_synth();
    for (track, scene) in [(0, 2), (1, 2), (3, 5), (1, 6)] {
        session
            .ensure_clip(track, scene)
            .unwrap()
            .add_note_at_step(0, 60, 0.25, 100)
            .unwrap();
    }

    session.start_timeline();
    run_until(&mut session, 1.0);
    session.play_clip(3, 5);
    session.play_clip(1, 6);
    session.scene_play(2);

    run_until(&mut session, 4.5);
    for track in session.tracks() {
        let expected: Vec<usize> = if track.clip(2).is_some() { vec![2] } else { vec![] };
        assert_eq!(track.playing_scenes(), expected);
    }
}
