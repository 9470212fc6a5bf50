//! Data model for tracker modules.
//!
//! This crate defines the read-only input consumed by the playback engine:
//! a [`Module`] with its order list, patterns, samples and (for XM)
//! instruments. Format parsers produce these types; the engine only reads
//! them for the lifetime of a playback session.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod instrument;
mod module;
mod pattern;
mod sample;

pub use instrument::{AutoVibrato, Envelope, EnvelopePoint, Instrument, ENVELOPE_MAX_POINTS};
pub use module::{Module, ModuleKind, OrderEntry};
pub use pattern::{Cell, Pattern};
pub use sample::{LoopType, Sample};
