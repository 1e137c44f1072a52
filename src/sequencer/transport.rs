// Transport - Beat clock and live schedules
// Owns the playhead in beats and the table of registered schedules. The
// control loop and the clock thread share it through cheap clones.

use super::timeline::Tempo;
use crate::midi::device::SharedOutputDevice;
use crate::midi::event::MidiMessage;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Handle of a registered schedule
pub type ScheduleId = u64;

/// Shortest gate sent, so a note-off never lands on its own note-on
const MIN_GATE_BEATS: f64 = 1.0 / 960.0;

/// Clock thread tick
const CLOCK_TICK: Duration = Duration::from_millis(1);

/// One note of a slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotNote {
    pub note: u8,
    pub velocity: u8,
    /// Note length in beats
    pub gate: f64,
    /// Offset from the slot start in beats
    pub delay: f64,
    /// Probability of firing (0.0 - 1.0)
    pub chance: f32,
}

/// Raw MIDI sent at a slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRaw {
    pub delay: f64,
    pub bytes: Vec<u8>,
}

/// One entry of a value sequence: everything that starts at this slot.
///
/// A slot without notes is a rest and still takes its `duration`. Several
/// notes form a chord.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceSlot {
    /// Beats until the next slot
    pub duration: f64,
    pub notes: Vec<SlotNote>,
    pub raw: Vec<SlotRaw>,
}

impl SequenceSlot {
    pub fn rest(duration: f64) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }

    pub fn is_rest(&self) -> bool {
        self.notes.is_empty() && self.raw.is_empty()
    }
}

#[derive(Debug)]
struct PendingMessage {
    at: f64,
    /// 0 = note-off, 1 = everything else (offs go first on ties)
    rank: u8,
    message: MidiMessage,
}

struct Schedule {
    slots: Vec<SequenceSlot>,
    device: SharedOutputDevice,
    channel: u8,
    cursor: usize,
    next_slot_at: f64,
    pending: Vec<PendingMessage>,
    sounding: Vec<u8>,
}

impl Schedule {
    fn loop_length(&self) -> f64 {
        self.slots.iter().map(|s| s.duration.max(0.0)).sum()
    }

    /// Skip whole slots that ended before `position` without firing them
    fn skip_to(&mut self, position: f64) {
        if self.loop_length() <= 0.0 {
            return;
        }
        loop {
            let duration = self.slots[self.cursor].duration.max(0.0);
            if self.next_slot_at + duration > position {
                break;
            }
            self.next_slot_at += duration;
            self.cursor = (self.cursor + 1) % self.slots.len();
        }
    }

    /// Expand every slot starting at or before `position` into pending messages
    fn expand_until(&mut self, position: f64) {
        if self.loop_length() <= 0.0 {
            return;
        }
        let mut rng = rand::thread_rng();

        while self.next_slot_at <= position {
            let slot = &self.slots[self.cursor];
            let start = self.next_slot_at;

            for note in slot.notes.iter() {
                if note.velocity == 0 {
                    continue;
                }
                if note.chance < 1.0 && !rng.gen_bool(note.chance.clamp(0.0, 1.0) as f64) {
                    continue;
                }
                let on_at = start + note.delay.max(0.0);
                self.pending.push(PendingMessage {
                    at: on_at,
                    rank: 1,
                    message: MidiMessage::NoteOn {
                        channel: self.channel,
                        note: note.note,
                        velocity: note.velocity,
                    },
                });
                self.pending.push(PendingMessage {
                    at: on_at + note.gate.max(MIN_GATE_BEATS),
                    rank: 0,
                    message: MidiMessage::NoteOff {
                        channel: self.channel,
                        note: note.note,
                    },
                });
            }

            for raw in slot.raw.iter() {
                self.pending.push(PendingMessage {
                    at: start + raw.delay.max(0.0),
                    rank: 1,
                    message: MidiMessage::Raw(raw.bytes.clone()),
                });
            }

            self.next_slot_at += slot.duration.max(0.0);
            self.cursor = (self.cursor + 1) % self.slots.len();
        }
    }

    /// Send every pending message due at or before `position`
    fn fire_until(&mut self, position: f64) {
        self.pending
            .sort_by(|a, b| a.at.total_cmp(&b.at).then(a.rank.cmp(&b.rank)));
        let due = self.pending.iter().take_while(|p| p.at <= position).count();
        if due == 0 {
            return;
        }

        let messages: Vec<PendingMessage> = self.pending.drain(..due).collect();
        let Ok(mut device) = self.device.lock() else {
            return;
        };
        for pending in messages {
            match &pending.message {
                MidiMessage::NoteOn { note, .. } => self.sounding.push(*note),
                MidiMessage::NoteOff { note, .. } => {
                    if let Some(index) = self.sounding.iter().position(|n| n == note) {
                        self.sounding.remove(index);
                    }
                }
                _ => {}
            }
            device.send(pending.message);
        }
    }

    /// Note-off for everything still sounding, drop what has not fired
    fn flush(&mut self) {
        self.pending.clear();
        if self.sounding.is_empty() {
            return;
        }
        if let Ok(mut device) = self.device.lock() {
            for note in self.sounding.drain(..) {
                device.note_off(note, self.channel);
            }
        }
    }
}

#[derive(Default)]
struct ScheduleTable {
    next_id: ScheduleId,
    schedules: BTreeMap<ScheduleId, Schedule>,
}

/// State shared between the control loop and the clock thread
pub struct SharedTransportState {
    running: AtomicBool,
    position_bits: AtomicU64,
    bpm_bits: AtomicU64,
    table: Mutex<ScheduleTable>,
}

impl SharedTransportState {
    fn new(tempo: Tempo) -> Self {
        Self {
            running: AtomicBool::new(false),
            position_bits: AtomicU64::new(0.0f64.to_bits()),
            bpm_bits: AtomicU64::new(tempo.bpm().to_bits()),
            table: Mutex::new(ScheduleTable::default()),
        }
    }

    fn position(&self) -> f64 {
        f64::from_bits(self.position_bits.load(Ordering::Acquire))
    }

    fn set_position(&self, beats: f64) {
        self.position_bits.store(beats.to_bits(), Ordering::Release);
    }

    fn table(&self) -> MutexGuard<'_, ScheduleTable> {
        match self.table.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Beat clock with start/stop/reset and schedule registration.
///
/// Cloning gives another handle on the same clock.
#[derive(Clone)]
pub struct Transport {
    shared: Arc<SharedTransportState>,
}

impl Transport {
    pub fn new() -> Self {
        Self::with_tempo(Tempo::default())
    }

    pub fn with_tempo(tempo: Tempo) -> Self {
        Self {
            shared: Arc::new(SharedTransportState::new(tempo)),
        }
    }

    pub fn start(&self) {
        if !self.shared.running.swap(true, Ordering::AcqRel) {
            log::info!("Timeline started at beat {:.2}", self.current_time());
        }
    }

    /// Stop the clock; sounding notes get their note-off
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            log::info!("Timeline stopped at beat {:.2}", self.current_time());
        }
        let mut table = self.shared.table();
        for schedule in table.schedules.values_mut() {
            schedule.flush();
        }
    }

    /// Back to beat 0; live schedules restart from their first slot
    pub fn reset(&self) {
        let mut table = self.shared.table();
        self.shared.set_position(0.0);
        for schedule in table.schedules.values_mut() {
            schedule.flush();
            schedule.cursor = 0;
            schedule.next_slot_at = 0.0;
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Current position in beats
    pub fn current_time(&self) -> f64 {
        self.shared.position()
    }

    pub fn tempo(&self) -> Tempo {
        Tempo::new(f64::from_bits(self.shared.bpm_bits.load(Ordering::Acquire)))
    }

    pub fn set_tempo(&self, tempo: Tempo) {
        self.shared
            .bpm_bits
            .store(tempo.bpm().to_bits(), Ordering::Release);
    }

    /// Register a looping schedule starting at the current beat
    pub fn schedule(
        &self,
        slots: Vec<SequenceSlot>,
        device: SharedOutputDevice,
        channel: u8,
    ) -> ScheduleId {
        self.schedule_at(slots, device, channel, self.current_time())
    }

    /// Register a looping schedule whose first slot is at `start_beat`.
    ///
    /// A start in the past keeps the phase: slots that already ended are
    /// skipped and the one under the playhead fires on the next advance.
    pub fn schedule_at(
        &self,
        slots: Vec<SequenceSlot>,
        device: SharedOutputDevice,
        channel: u8,
        start_beat: f64,
    ) -> ScheduleId {
        let mut table = self.shared.table();
        let id = table.next_id;
        table.next_id += 1;

        let mut schedule = Schedule {
            slots,
            device,
            channel,
            cursor: 0,
            next_slot_at: start_beat,
            pending: Vec::new(),
            sounding: Vec::new(),
        };
        schedule.skip_to(self.current_time());

        table.schedules.insert(id, schedule);
        id
    }

    /// Remove a schedule, silencing its sounding notes. Unknown ids are ignored.
    pub fn unschedule(&self, id: ScheduleId) -> bool {
        let removed = self.shared.table().schedules.remove(&id);
        match removed {
            Some(mut schedule) => {
                schedule.flush();
                true
            }
            None => false,
        }
    }

    pub fn has_schedule(&self, id: ScheduleId) -> bool {
        self.shared.table().schedules.contains_key(&id)
    }

    pub fn schedule_count(&self) -> usize {
        self.shared.table().schedules.len()
    }

    /// Move the playhead forward and fire everything that became due.
    /// Does nothing while stopped. Returns the new position.
    pub fn advance(&self, delta_beats: f64) -> f64 {
        if !self.is_running() || !(delta_beats > 0.0) {
            return self.current_time();
        }

        let mut table = self.shared.table();
        let position = self.current_time() + delta_beats;
        self.shared.set_position(position);

        for schedule in table.schedules.values_mut() {
            schedule.expand_until(position);
            schedule.fire_until(position);
        }
        position
    }

    /// Run the clock on a background thread, converting wall time to beats
    /// with the current tempo.
    pub fn spawn_clock(&self) -> std::io::Result<ClockHandle> {
        let transport = self.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("pushit-clock".to_string())
            .spawn(move || {
                let mut last = Instant::now();
                while !stop_flag.load(Ordering::Acquire) {
                    std::thread::sleep(CLOCK_TICK);
                    let now = Instant::now();
                    let elapsed = now.duration_since(last).as_secs_f64();
                    last = now;
                    let beats = transport.tempo().seconds_to_beats(elapsed);
                    transport.advance(beats);
                }
            })?;

        Ok(ClockHandle {
            stop,
            handle: Some(handle),
        })
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

/// Running clock thread; stops when dropped
pub struct ClockHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ClockHandle {
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Clock thread panicked");
            }
        }
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::device::{CaptureDevice, OutputDevice};

    fn note(note: u8, gate: f64) -> SlotNote {
        SlotNote {
            note,
            velocity: 100,
            gate,
            delay: 0.0,
            chance: 1.0,
        }
    }

    fn slot(duration: f64, notes: Vec<SlotNote>) -> SequenceSlot {
        SequenceSlot {
            duration,
            notes,
            raw: Vec::new(),
        }
    }

    fn capture() -> (CaptureDevice, SharedOutputDevice) {
        let sink = CaptureDevice::new();
        let device = OutputDevice::capture("Test", sink.clone()).into_shared();
        (sink, device)
    }

    fn note_ons(messages: &[MidiMessage]) -> Vec<u8> {
        messages
            .iter()
            .filter_map(|m| match m {
                MidiMessage::NoteOn { note, .. } => Some(*note),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_start_stop_reset() {
        let transport = Transport::new();
        assert!(!transport.is_running());
        assert_eq!(transport.advance(1.0), 0.0);

        transport.start();
        assert!(transport.is_running());
        assert_eq!(transport.advance(1.5), 1.5);
        assert_eq!(transport.current_time(), 1.5);

        transport.stop();
        assert_eq!(transport.advance(1.0), 1.5);

        transport.reset();
        assert_eq!(transport.current_time(), 0.0);
    }

    #[test]
    fn test_tempo() {
        let transport = Transport::new();
        assert_eq!(transport.tempo().bpm(), 120.0);
        let clone = transport.clone();
        clone.set_tempo(Tempo::new(90.0));
        assert_eq!(transport.tempo().bpm(), 90.0);
    }

    #[test]
    fn test_schedule_fires_notes_and_rests() {
        let transport = Transport::new();
        let (sink, device) = capture();
        transport.schedule(
            vec![
                slot(1.0, vec![note(60, 0.5)]),
                SequenceSlot::rest(1.0),
                slot(1.0, vec![note(62, 0.5)]),
                SequenceSlot::rest(1.0),
            ],
            device,
            0,
        );
        transport.start();

        transport.advance(0.25);
        assert_eq!(note_ons(&sink.messages()), vec![60]);

        transport.advance(1.0); // 1.25: note 60 released, rest
        assert_eq!(
            sink.take_messages(),
            vec![
                MidiMessage::NoteOn {
                    channel: 0,
                    note: 60,
                    velocity: 100
                },
                MidiMessage::NoteOff { channel: 0, note: 60 },
            ]
        );

        transport.advance(1.0); // 2.25
        assert_eq!(note_ons(&sink.take_messages()), vec![62]);

        transport.advance(2.0); // 4.25: loops back to the first slot
        assert_eq!(note_ons(&sink.take_messages()), vec![60]);
    }

    #[test]
    fn test_chord_slot() {
        let transport = Transport::new();
        let (sink, device) = capture();
        transport.schedule(vec![slot(4.0, vec![note(60, 1.0), note(64, 1.0), note(67, 1.0)])], device, 2);
        transport.start();
        transport.advance(0.1);
        assert_eq!(note_ons(&sink.messages()), vec![60, 64, 67]);
    }

    #[test]
    fn test_note_off_before_note_on_on_ties() {
        let transport = Transport::new();
        let (sink, device) = capture();
        transport.schedule(vec![slot(1.0, vec![note(60, 1.0)])], device, 0);
        transport.start();
        transport.advance(0.5);
        sink.take_messages();

        transport.advance(0.5); // beat 1.0: off of the first, on of the second
        assert_eq!(
            sink.messages(),
            vec![
                MidiMessage::NoteOff { channel: 0, note: 60 },
                MidiMessage::NoteOn {
                    channel: 0,
                    note: 60,
                    velocity: 100
                },
            ]
        );
    }

    #[test]
    fn test_delay_and_chance() {
        let transport = Transport::new();
        let (sink, device) = capture();
        transport.schedule(
            vec![slot(
                4.0,
                vec![
                    SlotNote {
                        delay: 0.5,
                        ..note(60, 0.25)
                    },
                    SlotNote {
                        chance: 0.0,
                        ..note(61, 0.25)
                    },
                ],
            )],
            device,
            0,
        );
        transport.start();

        transport.advance(0.25);
        assert!(sink.messages().is_empty());
        transport.advance(0.5);
        assert_eq!(note_ons(&sink.messages()), vec![60]);
    }

    #[test]
    fn test_unschedule_is_idempotent_and_silences() {
        let transport = Transport::new();
        let (sink, device) = capture();
        let id = transport.schedule(vec![slot(4.0, vec![note(60, 2.0)])], device, 0);
        transport.start();
        transport.advance(0.5);
        sink.take_messages();

        assert!(transport.unschedule(id));
        assert_eq!(
            sink.take_messages(),
            vec![MidiMessage::NoteOff { channel: 0, note: 60 }]
        );
        assert!(!transport.unschedule(id));
        assert!(!transport.has_schedule(id));

        transport.advance(8.0);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_stop_flushes_sounding_notes() {
        let transport = Transport::new();
        let (sink, device) = capture();
        transport.schedule(vec![slot(4.0, vec![note(60, 2.0)])], device, 0);
        transport.start();
        transport.advance(0.5);
        sink.take_messages();

        transport.stop();
        assert_eq!(
            sink.messages(),
            vec![MidiMessage::NoteOff { channel: 0, note: 60 }]
        );
        assert_eq!(transport.schedule_count(), 1);
    }

    #[test]
    fn test_reset_restarts_schedules() {
        let transport = Transport::new();
        let (sink, device) = capture();
        transport.schedule(
            vec![slot(1.0, vec![note(60, 0.5)]), slot(1.0, vec![note(62, 0.5)])],
            device,
            0,
        );
        transport.start();
        transport.advance(1.25);
        sink.take_messages();

        transport.reset();
        transport.advance(0.1);
        assert_eq!(note_ons(&sink.messages()), vec![60]);
    }

    #[test]
    fn test_schedule_in_the_past_keeps_phase() {
        let transport = Transport::new();
        transport.start();
        transport.advance(4.3);

        let (sink, device) = capture();
        transport.schedule_at(
            vec![
                slot(0.25, vec![note(60, 0.1)]),
                slot(0.25, vec![note(62, 0.1)]),
                slot(3.5, Vec::new()),
            ],
            device,
            0,
            4.0,
        );
        transport.advance(0.01);
        // 4.0 + 0.25 <= 4.31: the slot under the playhead is the second
        assert_eq!(note_ons(&sink.messages()), vec![62]);
    }

    #[test]
    fn test_zero_length_schedule_is_inert() {
        let transport = Transport::new();
        let (sink, device) = capture();
        transport.schedule(vec![slot(0.0, vec![note(60, 0.5)])], device, 0);
        transport.start();
        transport.advance(4.0);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_clock_thread_advances() {
        let transport = Transport::new();
        transport.set_tempo(Tempo::new(999.0));
        transport.start();
        let clock = transport.spawn_clock().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        clock.shutdown();
        assert!(transport.current_time() > 0.0);
    }
}
