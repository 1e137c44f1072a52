// Quick demonstration of the project persistence system
// Run with: cargo run --bin demo_project_persistence

use pushit::midi::manager::MidiDeviceRegistry;
use pushit::project::ProjectManager;
use pushit::sequencer::{ClipScheduler, Session, Transport};

fn offline_session() -> Session {
    Session::new(ClipScheduler::new(
        Transport::new(),
        MidiDeviceRegistry::offline(),
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pushit::logging::init();

    println!("Pushit - Project Persistence Demo");
    println!("=================================");

    let mut session = offline_session();
    session.set_bpm(124.0)?;
    session.set_scale("minor");
    session.set_key("A");

    if let Some(track) = session.get_track_by_idx_mut(0) {
        track.set_output_device_by_name(Some("Drum Machine 20:0"));
        track.set_midi_channel(9)?;
    }
    if let Some(clip) = session.ensure_clip(0, 0) {
        for step in [0, 4, 8, 12] {
            clip.add_note_at_step(step, 36, 0.25, 110)?;
        }
        clip.add_note_at_step(4, 38, 0.25, 96)?;
    }
    if let Some(clip) = session.ensure_clip(1, 0) {
        clip.set_length(8.0)?;
        clip.add_note_at_step(0, 45, 1.0, 100)?;
        clip.add_note_at_step(16, 43, 1.0, 100)?;
    }

    println!("Created session:");
    println!("   - BPM: {}", session.bpm());
    println!("   - Key: {} {}", session.key, session.scale);
    for track in session.tracks() {
        let clips = track.clips().iter().flatten().count();
        if clips > 0 {
            println!(
                "   - Track {} ({}): {} clip(s)",
                track.index() + 1,
                track.output_device_short_name(),
                clips
            );
        }
    }

    let projects_dir = std::env::temp_dir().join("pushit-demo-projects");
    let mut manager = ProjectManager::new(&projects_dir);
    let path = manager.save_project(&session, "demo")?;
    println!("\nSaved project to: {}", path.display());
    println!("   - File size: {} bytes", std::fs::metadata(&path)?.len());

    let mut restored = offline_session();
    manager.load_project(&mut restored, "demo")?;

    println!("\nLoaded project:");
    println!("   - BPM: {}", restored.bpm());
    println!("   - Key: {} {}", restored.key, restored.scale);
    if let Some(clip) = restored.get_clip_by_idx(0, 0) {
        println!("   - Clip 1-1: {} steps, notes {:?}", clip.steps(), clip.notes());
    }
    if let Some(clip) = restored.get_clip_by_idx(1, 0) {
        println!(
            "   - Clip 2-1: {} beats, {} events",
            clip.clip_length_in_beats(),
            clip.event_count()
        );
    }

    let names: Vec<String> = manager.list_projects()?.into_iter().map(|p| p.name).collect();
    println!("\nProjects in {}: {:?}", projects_dir.display(), names);

    std::fs::remove_file(&path)?;
    println!("\nDemo completed");
    Ok(())
}
