//! The per-format effects machine behind one narrow interface.

use rp_ir::{Cell, Module, ModuleKind};

use crate::channel::ChannelState;
use crate::mix::TickBuffer;
use crate::player::PlayerState;
use crate::protracker::ProTracker;
use crate::s3m::ScreamTracker;
use crate::xm::FastTracker;

/// Flow-control output of one tick of effect processing.
///
/// The scheduler owns the order/row cursor; effect handlers only describe
/// the jump they want. Later writes win when several channels set the same
/// field within a row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowDelta {
    pub next_row: Option<u16>,
    pub next_order: Option<u16>,
    pub pattern_delay: Option<u8>,
}

impl FlowDelta {
    /// Overlay `other`, keeping existing values where `other` is silent.
    pub fn merge(&mut self, other: FlowDelta) {
        if other.next_row.is_some() {
            self.next_row = other.next_row;
        }
        if other.next_order.is_some() {
            self.next_order = other.next_order;
        }
        if other.pattern_delay.is_some() {
            self.pattern_delay = other.pattern_delay;
        }
    }
}

/// One format's effect machine: state mutation per tick, audio per tick.
///
/// Implementations are stateless; everything mutable lives in
/// [`ChannelState`] and [`PlayerState`].
pub trait Tracker: Send + Sync {
    /// Apply one `(channel, tick)` step of the format's effect semantics.
    fn process_tick(
        &self,
        module: &Module,
        state: &mut PlayerState,
        ch: &mut ChannelState,
        cell: &Cell,
        tick: u32,
    ) -> FlowDelta;

    /// Render the channel into the tick accumulator.
    fn render_tick(
        &self,
        module: &Module,
        ch: &mut ChannelState,
        buf: &mut TickBuffer,
        global_volume: f64,
    );
}

/// Select the effect machine for a module format.
pub fn tracker_for(kind: ModuleKind) -> Box<dyn Tracker> {
    match kind {
        ModuleKind::ProTracker => Box::new(ProTracker),
        ModuleKind::ScreamTracker3 => Box::new(ScreamTracker),
        ModuleKind::FastTracker2 => Box::new(FastTracker),
    }
}
