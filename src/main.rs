use pushit::config::{DEFAULT_SETTINGS_FILE, Settings};
use pushit::messaging::channels::{create_notification_channel, drain_notifications};
use pushit::sequencer::{ClipScheduler, Session, Transport};
use pushit::{MidiDeviceRegistry, logging};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const NOTIFICATION_RINGBUFFER_CAPACITY: usize = 256;
const MIN_RESCAN_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(5);

struct Options {
    settings_path: PathBuf,
    /// Stop after this many seconds (runs until killed otherwise)
    seconds: Option<f64>,
    /// Load a small pattern on track 1 and start it
    demo: bool,
}

fn usage() {
    println!("Usage: pushit [--settings <file>] [--seconds <n>] [--demo]");
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Options, String> {
    let mut options = Options {
        settings_path: PathBuf::from(DEFAULT_SETTINGS_FILE),
        seconds: None,
        demo: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let value = args.next().ok_or("--settings needs a file")?;
                options.settings_path = PathBuf::from(value);
            }
            "--seconds" => {
                let value = args.next().ok_or("--seconds needs a number")?;
                let seconds: f64 = value
                    .parse()
                    .map_err(|_| format!("Invalid --seconds value '{}'", value))?;
                options.seconds = Some(seconds);
            }
            "--demo" => options.demo = true,
            other => return Err(format!("Unknown argument '{}'", other)),
        }
    }
    Ok(options)
}

/// Device rescan period from settings; unusable values fall back to the default
fn rescan_interval(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds)
        .map(|interval| interval.max(MIN_RESCAN_INTERVAL))
        .unwrap_or(DEFAULT_RESCAN_INTERVAL)
}

fn load_demo_pattern(session: &mut Session) {
    let Some(clip) = session.ensure_clip(0, 0) else {
        return;
    };
    for (step, note) in [(0, 36), (4, 38), (8, 36), (10, 36), (12, 38)] {
        if let Err(e) = clip.add_note_at_step(step, note, 0.25, 100) {
            log::warn!("Demo note skipped: {}", e);
        }
    }

    let first_device = session
        .scheduler()
        .registry()
        .output_device_names()
        .first()
        .cloned();
    match first_device {
        Some(name) => {
            println!("Demo pattern on '{}'", name);
            if let Some(track) = session.get_track_by_idx_mut(0) {
                track.set_output_device_by_name(Some(&name));
            }
        }
        None => println!("No MIDI output found, demo pattern will be silent"),
    }
    session.play_clip(0, 0);
}

fn main() {
    println!("=== Pushit ===");
    println!("Version {}\n", env!("CARGO_PKG_VERSION"));

    logging::init();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            usage();
            return;
        }
    };

    let settings = match Settings::load(&options.settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!(
                "Could not read {}: {}. Using defaults.",
                options.settings_path.display(),
                e
            );
            Settings::default()
        }
    };

    println!("MIDI Initialisation...");
    let registry = MidiDeviceRegistry::with_ports(settings.midi.clone());
    for name in registry.output_device_names() {
        println!("  output: {}", name);
    }

    // The session validates the configured tempo and keeps the default on a bad value
    let transport = Transport::new();
    let mut session = Session::new(ClipScheduler::new(transport.clone(), registry));
    session.apply_settings(&settings.session);

    let (notification_tx, mut notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);
    session.set_notification_producer(notification_tx);

    let clock = match transport.spawn_clock() {
        Ok(clock) => clock,
        Err(e) => {
            eprintln!("ERROR: could not start clock thread: {}", e);
            return;
        }
    };

    if options.demo {
        load_demo_pattern(&mut session);
        session.start_timeline();
    }

    println!("\n=== Pushit started ! ===\n");

    let frame_rate = settings.app.target_frame_rate.max(1);
    let frame = Duration::from_secs_f64(1.0 / frame_rate as f64);
    let rescan_period = rescan_interval(settings.midi.device_rescan_interval_secs);
    let started = Instant::now();
    let mut last_rescan = Instant::now();

    loop {
        let cycle_start = Instant::now();

        if let Some(limit) = options.seconds
            && started.elapsed().as_secs_f64() >= limit
        {
            break;
        }

        if last_rescan.elapsed() >= rescan_period {
            session.update_midi_devices();
            last_rescan = Instant::now();
        }

        session.check_for_delayed_actions();

        for notification in drain_notifications(&mut notification_rx) {
            println!("[{:?}] {}", notification.level, notification.message);
        }

        if let Some(remaining) = frame.checked_sub(cycle_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    session.stop_timeline();
    clock.shutdown();
    session.scheduler_mut().registry_mut().close_all();

    let sections = [
        pushit::SettingsSection::App(settings.app.clone()),
        session.scheduler().registry().settings_section(),
        session.settings_section(),
        pushit::SettingsSection::Projects(settings.projects.clone()),
    ];
    if let Err(e) = Settings::assemble(sections).save(&options.settings_path) {
        log::warn!("Could not save settings: {}", e);
    }
    println!("Bye");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(args(&["--seconds", "2.5", "--demo"])).unwrap();
        assert_eq!(options.seconds, Some(2.5));
        assert!(options.demo);
        assert_eq!(options.settings_path, PathBuf::from(DEFAULT_SETTINGS_FILE));

        assert!(parse_args(args(&["--seconds"])).is_err());
        assert!(parse_args(args(&["--seconds", "soon"])).is_err());
        assert!(parse_args(args(&["--loud"])).is_err());
    }

    #[test]
    fn test_rescan_interval_never_panics() {
        assert_eq!(rescan_interval(2.0), Duration::from_secs(2));
        assert_eq!(rescan_interval(0.0), MIN_RESCAN_INTERVAL);
        assert_eq!(rescan_interval(-3.0), DEFAULT_RESCAN_INTERVAL);
        assert_eq!(rescan_interval(f64::NAN), DEFAULT_RESCAN_INTERVAL);
        assert_eq!(rescan_interval(1e300), DEFAULT_RESCAN_INTERVAL);
    }
}
