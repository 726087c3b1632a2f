//! MIDI message helpers
//!
//! The adapters pass bytes through untouched. These helpers are for the
//! driver side (delta times) and for diagnostics.

use std::fmt;

/// Converts the driver's absolute microsecond timestamps into the delta
/// seconds the host sees.
///
/// The first message after a port opens has a delta of zero. A timestamp
/// that goes backwards also yields zero, never a negative delta.
#[derive(Debug, Default, Clone)]
pub struct DeltaClock {
    last: Option<u64>,
}

impl DeltaClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous stamp
    pub fn delta(&mut self, stamp_us: u64) -> f64 {
        let elapsed = match self.last {
            Some(prev) => stamp_us.saturating_sub(prev),
            None => 0,
        };
        self.last = Some(stamp_us);
        elapsed as f64 / 1_000_000.0
    }
}

/// Channel message decoded from a status byte and its data bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    NoteOff { channel: u8, key: u8, velocity: u8 },
    NoteOn { channel: u8, key: u8, velocity: u8 },
    PolyPressure { channel: u8, key: u8, pressure: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// 14-bit bend, centered on zero
    PitchBend { channel: u8, value: i16 },
    /// System common / realtime / SysEx, identified by status byte
    System(u8),
    /// Data bytes without a status, or a truncated message
    Unknown,
}

impl MessageKind {
    pub fn parse(bytes: &[u8]) -> Self {
        let Some(&status) = bytes.first() else {
            return Self::Unknown;
        };
        if status < 0x80 {
            return Self::Unknown;
        }
        if status >= 0xF0 {
            return Self::System(status);
        }

        let channel = status & 0x0F;
        let data = |i: usize| bytes.get(i).map(|b| b & 0x7F);

        match (status & 0xF0, data(1), data(2)) {
            (0x80, Some(key), Some(velocity)) => Self::NoteOff { channel, key, velocity },
            // Running-status convention: note on with zero velocity is a note off
            (0x90, Some(key), Some(0)) => Self::NoteOff { channel, key, velocity: 0 },
            (0x90, Some(key), Some(velocity)) => Self::NoteOn { channel, key, velocity },
            (0xA0, Some(key), Some(pressure)) => Self::PolyPressure { channel, key, pressure },
            (0xB0, Some(controller), Some(value)) => Self::ControlChange {
                channel,
                controller,
                value,
            },
            (0xC0, Some(program), _) => Self::ProgramChange { channel, program },
            (0xD0, Some(pressure), _) => Self::ChannelPressure { channel, pressure },
            (0xE0, Some(lsb), Some(msb)) => Self::PitchBend {
                channel,
                value: (((msb as i16) << 7) | lsb as i16) - 8192,
            },
            _ => Self::Unknown,
        }
    }

    /// Key number for note on/off messages
    pub fn key(&self) -> Option<u8> {
        match self {
            Self::NoteOn { key, .. } | Self::NoteOff { key, .. } => Some(*key),
            _ => None,
        }
    }
}

/// A received message as the host sees it: delta seconds plus raw bytes
#[derive(Debug, Clone, PartialEq)]
pub struct MidiMessage {
    pub delta: f64,
    pub bytes: Vec<u8>,
}

impl MidiMessage {
    pub fn new(delta: f64, bytes: Vec<u8>) -> Self {
        Self { delta, bytes }
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::parse(&self.bytes)
    }

    /// Space-separated uppercase hex, e.g. `90 3C 7F`
    pub fn hex(&self) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.4}s]: {}", self.delta, self.hex())
    }
}

/// Note name with octave, middle C = C4
pub fn note_name(key: u8) -> String {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (key / 12) as i32 - 1;
    format!("{}{}", NAMES[(key % 12) as usize], octave)
}
