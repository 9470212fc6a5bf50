//! The module: order list, patterns, samples, instruments.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::instrument::Instrument;
use crate::pattern::{Cell, Pattern};
use crate::sample::Sample;

/// The three supported module formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleKind {
    /// Amiga 4-8 channel pattern format.
    ProTracker,
    /// Scream Tracker 3.
    ScreamTracker3,
    /// FastTracker II Extended Module.
    FastTracker2,
}

/// One entry of the order list.
///
/// S3M and XM order bytes reserve `254` (skip) and `255` (end-of-song);
/// parsers map those to [`OrderEntry::Skip`] and [`OrderEntry::End`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderEntry {
    Pattern(u8),
    Skip,
    End,
}

impl OrderEntry {
    /// Decode a raw order byte.
    pub fn from_raw(byte: u8) -> Self {
        match byte {
            254 => OrderEntry::Skip,
            255 => OrderEntry::End,
            n => OrderEntry::Pattern(n),
        }
    }
}

/// A parsed tracker module. Immutable for the playback session.
#[derive(Clone, Debug)]
pub struct Module {
    pub name: ArrayString<32>,
    pub kind: ModuleKind,
    pub num_channels: u16,
    /// Initial ticks per row.
    pub default_speed: u8,
    /// Initial tempo.
    pub default_bpm: u8,
    /// XM header flag bit 0: linear period mode (false = Amiga periods).
    pub linear_periods: bool,
    pub order: Vec<OrderEntry>,
    pub patterns: Vec<Pattern>,
    /// Sample bank for PT and S3M. XM samples live inside instruments.
    pub samples: Vec<Sample>,
    /// XM instrument bank; empty for the other formats.
    pub instruments: Vec<Instrument>,
}

impl Module {
    /// Create an empty module with the format defaults (speed 6, 125 BPM).
    pub fn new(name: &str, kind: ModuleKind, num_channels: u16) -> Self {
        let mut module = Self {
            name: ArrayString::new(),
            kind,
            num_channels,
            default_speed: 6,
            default_bpm: 125,
            linear_periods: kind == ModuleKind::FastTracker2,
            order: Vec::new(),
            patterns: Vec::new(),
            samples: Vec::new(),
            instruments: Vec::new(),
        };
        let _ = module.name.try_push_str(name);
        module
    }

    /// Number of entries in the order list.
    pub fn song_length(&self) -> usize {
        self.order.len()
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Rows in a pattern; 0 for an invalid index.
    pub fn num_rows(&self, pattern: usize) -> u16 {
        self.patterns.get(pattern).map_or(0, |p| p.rows)
    }

    /// Cell lookup with out-of-range positions yielding the empty cell.
    pub fn cell(&self, pattern: usize, row: u16, channel: u16) -> Cell {
        self.patterns
            .get(pattern)
            .map_or_else(Cell::empty, |p| p.cell(row, channel))
    }

    /// Append a pattern, returning its index.
    pub fn add_pattern(&mut self, pattern: Pattern) -> u8 {
        self.patterns.push(pattern);
        (self.patterns.len() - 1) as u8
    }

    /// Append an order entry.
    pub fn add_order(&mut self, entry: OrderEntry) {
        self.order.push(entry);
    }
}
