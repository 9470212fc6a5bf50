//! Playback engine for tracker modules.
//!
//! Drives a parsed [`rp_ir::Module`] through the row/tick effects machine
//! of its original tracker and streams mixed 16-bit PCM into an
//! [`AudioSink`]. One format-specific [`Tracker`] (ProTracker, Scream
//! Tracker 3 or FastTracker II) is selected at playback start; the
//! scheduler, mixing and flow control are shared.

mod channel;
mod effects;
mod envelope;
mod mix;
mod player;
mod protracker;
mod s3m;
mod sink;
mod tracker;
mod xm;

pub use channel::{resolve_sample, ChannelState};
pub use envelope::{envelope_advance, envelope_value};
pub use mix::{pan, to_pcm_bytes, TickBuffer};
pub use player::{Player, PlayerState, RenderOptions, StateUpdate};
pub use protracker::ProTracker;
pub use s3m::ScreamTracker;
pub use sink::{AudioSink, PlayError};
pub use tracker::{tracker_for, FlowDelta, Tracker};
pub use xm::FastTracker;
