// Beat math shared by the session, the scheduler and the transport.
// The session core only ever speaks in beats; `Tempo` is where beats meet
// wall clock, and only the transport's clock thread crosses that line.

use std::fmt;

/// Display resolution of a beat
pub const TICKS_PER_BEAT: u32 = 480;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const MIN_BPM: f64 = 20.0;
    pub const MAX_BPM: f64 = 999.0;
    pub const DEFAULT_BPM: f64 = 120.0;

    /// Tempo clamped into `MIN_BPM..=MAX_BPM`. NaN gives the default tempo.
    pub fn new(bpm: f64) -> Self {
        if bpm.is_nan() {
            return Self::default();
        }
        Self {
            bpm: bpm.clamp(Self::MIN_BPM, Self::MAX_BPM),
        }
    }

    /// `None` when `bpm` is out of range
    pub fn try_new(bpm: f64) -> Option<Self> {
        Self::is_valid_bpm(bpm).then_some(Self { bpm })
    }

    pub fn is_valid_bpm(bpm: f64) -> bool {
        (Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm)
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        seconds * self.bpm / 60.0
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: Self::DEFAULT_BPM,
        }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Next multiple of `bars_per_quantize` bars strictly after `current_beat`.
///
/// A position sitting exactly on a boundary yields the following one, so a
/// cued action never fires with zero delay.
pub fn next_bar_boundary(current_beat: f64, beats_per_bar: f64, bars_per_quantize: u32) -> f64 {
    let beats_per_quantize = beats_per_bar * bars_per_quantize.max(1) as f64;
    ((current_beat / beats_per_quantize).floor() + 1.0) * beats_per_quantize
}

/// Beats from the current (whole) beat to the next bar line, in `1..=beats_per_bar`.
pub fn beats_until_next_bar(current_beat: f64, beats_per_bar: f64) -> f64 {
    let until = beats_per_bar - current_beat.floor().rem_euclid(beats_per_bar);
    if until <= 0.0 { beats_per_bar } else { until }
}

/// 1-based bar and beat plus ticks into the beat, as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarPosition {
    pub bar: u32,
    pub beat: u32,
    pub tick: u32,
}

impl BarPosition {
    pub fn from_beats(beats: f64, beats_per_bar: u32) -> Self {
        let beats_per_bar = beats_per_bar.max(1) as u64;
        let ticks = (beats.max(0.0) * TICKS_PER_BEAT as f64).round() as u64;
        let whole_beats = ticks / TICKS_PER_BEAT as u64;

        Self {
            bar: (whole_beats / beats_per_bar) as u32 + 1,
            beat: (whole_beats % beats_per_bar) as u32 + 1,
            tick: (ticks % TICKS_PER_BEAT as u64) as u32,
        }
    }
}

impl fmt::Display for BarPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}:{:03}", self.bar, self.beat, self.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_conversion() {
        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.seconds_to_beats(1.0), 2.0);
        assert_eq!(Tempo::new(90.0).seconds_to_beats(2.0), 3.0);
        assert_eq!(tempo.to_string(), "120.0 BPM");
    }

    #[test]
    fn test_out_of_range_tempo_is_clamped() {
        assert_eq!(Tempo::new(5.0).bpm(), Tempo::MIN_BPM);
        assert_eq!(Tempo::new(5000.0).bpm(), Tempo::MAX_BPM);
        assert_eq!(Tempo::new(f64::NAN), Tempo::default());

        assert!(Tempo::try_new(5.0).is_none());
        assert_eq!(Tempo::try_new(98.0).map(|t| t.bpm()), Some(98.0));
        assert!(!Tempo::is_valid_bpm(f64::NAN));
    }

    #[test]
    fn test_next_bar_boundary() {
        assert_eq!(next_bar_boundary(5.5, 4.0, 1), 8.0);
        assert_eq!(next_bar_boundary(0.0, 4.0, 1), 4.0);
        // On a bar line: the following bar, never zero delay
        assert_eq!(next_bar_boundary(8.0, 4.0, 1), 12.0);
        assert_eq!(next_bar_boundary(5.5, 4.0, 2), 8.0);
        assert_eq!(next_bar_boundary(9.0, 4.0, 2), 16.0);
        assert_eq!(next_bar_boundary(4.0, 3.0, 1), 6.0);
    }

    #[test]
    fn test_beats_until_next_bar() {
        assert_eq!(beats_until_next_bar(3.0, 4.0), 1.0);
        assert_eq!(beats_until_next_bar(3.7, 4.0), 1.0);
        assert_eq!(beats_until_next_bar(4.0, 4.0), 4.0);
        assert_eq!(beats_until_next_bar(0.0, 4.0), 4.0);
        assert_eq!(beats_until_next_bar(5.0, 4.0), 3.0);
    }

    #[test]
    fn test_bar_position() {
        assert_eq!(BarPosition::from_beats(0.0, 4).to_string(), "1:01:000");
        assert_eq!(BarPosition::from_beats(4.5, 4).to_string(), "2:01:240");
        assert_eq!(BarPosition::from_beats(3.0, 3).to_string(), "2:01:000");
        assert_eq!(
            BarPosition::from_beats(9.25, 4),
            BarPosition { bar: 3, beat: 2, tick: 120 }
        );
    }
}
