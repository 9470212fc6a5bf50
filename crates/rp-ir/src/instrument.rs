//! XM instruments: keymaps, envelopes, autovibrato.

use alloc::vec::Vec;
use arrayvec::{ArrayString, ArrayVec};

use crate::sample::Sample;

/// Maximum points in an XM volume or panning envelope.
pub const ENVELOPE_MAX_POINTS: usize = 12;

/// One breakpoint of a piecewise-linear envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvelopePoint {
    /// Tick position of this point.
    pub frame: u16,
    /// Value at this point (volume: 0..=64, panning: 0..=64 with 32 center).
    pub value: u16,
}

/// A volume or panning envelope with optional sustain and loop regions.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    pub points: ArrayVec<EnvelopePoint, ENVELOPE_MAX_POINTS>,
    /// Index of the sustain point.
    pub sustain_point: u8,
    /// Index of the loop start point.
    pub loop_start: u8,
    /// Index of the loop end point.
    pub loop_end: u8,
    /// Bit 0: enabled, bit 1: sustain, bit 2: loop.
    pub flags: u8,
}

impl Envelope {
    /// Build an envelope from `(frame, value)` pairs.
    pub fn from_points(points: &[(u16, u16)], flags: u8) -> Self {
        let mut env = Self { flags, ..Self::default() };
        for &(frame, value) in points {
            env.points.push(EnvelopePoint { frame, value });
        }
        env
    }

    pub fn enabled(&self) -> bool {
        self.flags & 1 != 0
    }

    pub fn sustain_enabled(&self) -> bool {
        self.flags & 2 != 0
    }

    pub fn loop_enabled(&self) -> bool {
        self.flags & 4 != 0
    }
}

/// Instrument autovibrato parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoVibrato {
    /// Waveform: 0 sine, 1 square, 2 ramp up, 3 ramp down.
    pub waveform: u8,
    /// Ticks over which the depth ramps in from zero.
    pub sweep: u8,
    pub depth: u8,
    /// Position advance per tick.
    pub rate: u8,
}

/// An XM instrument: a bank of samples with a note keymap, envelopes,
/// fadeout and autovibrato.
#[derive(Clone, Debug)]
pub struct Instrument {
    pub name: ArrayString<28>,
    /// Maps note (1..=96, index `note - 1`) to an index into `samples`.
    pub keymap: [u8; 96],
    pub samples: Vec<Sample>,
    pub volume_envelope: Envelope,
    pub panning_envelope: Envelope,
    /// Per-tick fadeout subtracted from the channel fadeout level after
    /// key-off.
    pub fadeout: u16,
    pub vibrato: AutoVibrato,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            keymap: [0; 96],
            samples: Vec::new(),
            volume_envelope: Envelope::default(),
            panning_envelope: Envelope::default(),
            fadeout: 0,
            vibrato: AutoVibrato::default(),
        }
    }
}

impl Instrument {
    /// Create a new instrument with an empty keymap.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        let _ = inst.name.try_push_str(name);
        inst
    }

    /// Create an instrument holding a single sample mapped to every note.
    pub fn with_sample(name: &str, sample: Sample) -> Self {
        let mut inst = Self::new(name);
        inst.samples.push(sample);
        inst
    }

    /// Sample for a note (1..=96), if the keymap entry is valid.
    pub fn sample_for_note(&self, note: u8) -> Option<u8> {
        if note == 0 || note > 96 {
            return None;
        }
        let idx = self.keymap[note as usize - 1];
        ((idx as usize) < self.samples.len()).then_some(idx)
    }
}
