//! The scheduler: order-list walking, the row/tick loop, and the PCM bridge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;

use log::{debug, info};
use rp_ir::{Module, ModuleKind, OrderEntry};

use crate::channel::{resolve_sample, ChannelState};
use crate::mix::{self, TickBuffer};
use crate::sink::{AudioSink, PlayError};
use crate::tracker::{tracker_for, FlowDelta, Tracker};
use crate::xm;

/// Output configuration.
#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    pub sample_rate: u32,
    /// 1 or 2.
    pub output_channels: usize,
    /// Only 16-bit output is produced.
    pub bytes_per_sample: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            output_channels: 2,
            bytes_per_sample: 2,
        }
    }
}

/// One row's worth of playback position, published before the row renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateUpdate {
    pub order: u16,
    pub pattern: u16,
    pub row: u16,
    pub speed: u8,
    pub bpm: u8,
}

/// Song-global playback state. Channel states live beside it on the
/// [`Player`] so effect handlers can borrow both at once.
#[derive(Clone, Debug)]
pub struct PlayerState {
    pub order: u16,
    pub row: u16,
    pub pattern: u16,
    /// Ticks per row.
    pub speed: u8,
    pub bpm: u8,
    /// 0..=1; scales S3M and XM output.
    pub global_volume: f64,
    /// Rows still to repeat before the cursor moves again.
    pub pattern_delay: u8,
    pub pattern_loop_row: u16,
    pub pattern_loop_count: u8,
}

impl PlayerState {
    pub fn new(speed: u8, bpm: u8) -> Self {
        Self {
            order: 0,
            row: 0,
            pattern: 0,
            speed,
            bpm,
            global_volume: 1.0,
            pattern_delay: 0,
            pattern_loop_row: 0,
            pattern_loop_count: 0,
        }
    }

    /// Output frames per tick at the current tempo.
    pub fn samples_per_tick(&self, sample_rate: u32) -> usize {
        (sample_rate as f64 * 2.5 / self.bpm as f64).round() as usize
    }
}

/// Plays one module to a sink, row by row.
pub struct Player<'m> {
    module: &'m Module,
    tracker: Box<dyn Tracker>,
    options: RenderOptions,
    state: PlayerState,
    channels: Vec<ChannelState>,
    state_tx: Option<SyncSender<StateUpdate>>,
}

impl<'m> Player<'m> {
    pub fn new(module: &'m Module, options: RenderOptions) -> Self {
        Self {
            module,
            tracker: tracker_for(module.kind),
            options,
            state: PlayerState::new(module.default_speed, module.default_bpm),
            channels: vec![ChannelState::new(); module.num_channels as usize],
            state_tx: None,
        }
    }

    /// Publish row positions into `tx`. Delivery is best-effort: a full
    /// channel drops the event rather than stall the render loop.
    pub fn with_state_updates(mut self, tx: SyncSender<StateUpdate>) -> Self {
        self.state_tx = Some(tx);
        self
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels.get(index)
    }

    /// Render the whole song into `sink`.
    ///
    /// Returns when the order cursor runs off the song, when `cancel` is
    /// observed at a row boundary, or with an error when the sink fails.
    /// The sink is closed on every exit path; a close failure after an
    /// otherwise clean run is itself a sink error.
    pub fn render(&mut self, sink: &mut dyn AudioSink, cancel: &AtomicBool) -> Result<(), PlayError> {
        let result = self.render_loop(sink, cancel);
        let closed = sink.close();
        match result {
            Ok(()) => closed.map_err(PlayError::from),
            Err(err) => Err(err),
        }
    }

    fn render_loop(
        &mut self,
        sink: &mut dyn AudioSink,
        cancel: &AtomicBool,
    ) -> Result<(), PlayError> {
        info!(
            "playing '{}' ({:?}, {} channels, speed {}, {} bpm)",
            self.module.name,
            self.module.kind,
            self.module.num_channels,
            self.state.speed,
            self.state.bpm
        );

        loop {
            if cancel.load(Ordering::Relaxed) {
                debug!("playback cancelled at order {}", self.state.order);
                return Ok(());
            }
            if self.state.order as usize >= self.module.song_length() {
                return Ok(());
            }

            let pattern = match self.module.order[self.state.order as usize] {
                OrderEntry::Skip => {
                    self.state.order += 1;
                    continue;
                }
                OrderEntry::End => return Ok(()),
                OrderEntry::Pattern(idx) if (idx as usize) < self.module.num_patterns() => {
                    idx as u16
                }
                OrderEntry::Pattern(idx) => {
                    debug!("order {} names missing pattern {}; stopping", self.state.order, idx);
                    return Ok(());
                }
            };

            let rows = self.module.num_rows(pattern as usize);
            if self.state.row >= rows {
                self.state.row = 0;
                self.state.order += 1;
                continue;
            }
            self.state.pattern = pattern;

            if let Some(tx) = &self.state_tx {
                let _ = tx.try_send(StateUpdate {
                    order: self.state.order,
                    pattern,
                    row: self.state.row,
                    speed: self.state.speed,
                    bpm: self.state.bpm,
                });
            }

            let (row_buffer, flow) = self.process_row();
            if !row_buffer.is_empty() {
                if cancel.load(Ordering::Relaxed) {
                    return Ok(());
                }
                sink.write(&mix::to_pcm_bytes(&row_buffer))?;
            }

            if let Some(order) = flow.next_order {
                debug!("flow: order {} row {:?}", order, flow.next_row);
                self.state.order = order;
                self.state.row = flow.next_row.unwrap_or(0);
            } else if let Some(row) = flow.next_row {
                self.state.row = row;
            } else {
                self.state.row += 1;
            }
        }
    }

    /// Run all ticks of the current row, producing its interleaved
    /// accumulator samples and the merged flow-control request.
    fn process_row(&mut self) -> (Vec<i32>, FlowDelta) {
        // A pending pattern delay replays the row without producing audio.
        if self.state.pattern_delay > 0 {
            self.state.pattern_delay -= 1;
            let hold = FlowDelta {
                next_row: Some(self.state.row),
                ..FlowDelta::default()
            };
            return (Vec::new(), hold);
        }

        let mut flow = FlowDelta::default();
        let mut row_buffer = Vec::new();
        let glissando_rounding =
            self.module.kind == ModuleKind::FastTracker2 && self.module.linear_periods;

        let mut tick: u32 = 0;
        // Speed is re-read every lap so an Fxx on an earlier tick shortens
        // or stretches the row it appears in.
        while tick < self.state.speed as u32 {
            let samples_per_tick = self.state.samples_per_tick(self.options.sample_rate);
            let mut tick_buf = TickBuffer::new(
                samples_per_tick,
                self.options.output_channels,
                self.options.sample_rate,
            );

            for index in 0..self.channels.len() {
                let cell = self
                    .module
                    .cell(self.state.pattern as usize, self.state.row, index as u16);
                let tracker = self.tracker.as_ref();
                let ch = &mut self.channels[index];

                flow.merge(tracker.process_tick(self.module, &mut self.state, ch, &cell, tick));

                if resolve_sample(self.module, ch).is_some() && ch.period > 0 {
                    apply_tone_porta(ch);
                    if glissando_rounding && ch.glissando && ch.porta_target > 0 {
                        xm::round_period_to_semitone(ch);
                    }
                    tracker.render_tick(self.module, ch, &mut tick_buf, self.state.global_volume);
                }
            }

            row_buffer.extend(tick_buf.into_samples());
            tick += 1;
        }

        if let Some(delay) = flow.pattern_delay.take() {
            self.state.pattern_delay = delay;
        }
        (row_buffer, flow)
    }
}

/// Converge the period toward the portamento target by at most
/// `porta_speed`, clamping at the target so it never overshoots.
fn apply_tone_porta(ch: &mut ChannelState) {
    if ch.porta_target == 0 {
        return;
    }
    if ch.period < ch.porta_target {
        ch.period = ch
            .period
            .saturating_add(ch.porta_speed)
            .min(ch.porta_target);
    } else if ch.period > ch.porta_target {
        ch.period = ch
            .period
            .saturating_sub(ch.porta_speed)
            .max(ch.porta_target);
    }
}
