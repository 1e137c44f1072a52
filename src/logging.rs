// Logging - Console backend for the `log` facade
//
// Level comes from the PUSHIT_LOG environment variable (error, warn, info,
// debug, trace, off). Unknown or missing values mean `info`.

use log::{LevelFilter, Log, Metadata, Record};
use std::str::FromStr;

pub const LOG_LEVEL_ENV: &str = "PUSHIT_LOG";

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!(
            "{} {:<5} [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Parse a level name, `info` when absent or unknown
pub fn parse_level(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the console logger. A second call keeps the first logger.
pub fn init() -> LevelFilter {
    let level = parse_level(std::env::var(LOG_LEVEL_ENV).ok().as_deref());
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
    level
}
