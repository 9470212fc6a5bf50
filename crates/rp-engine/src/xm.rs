//! FastTracker II effect processing and rendering.

use core::f64::consts::TAU;

use log::warn;
use rp_ir::{Cell, Instrument, Module, Sample};

use crate::channel::{resolve_sample, ChannelState};
use crate::effects::{
    apply_arpeggio, apply_tremolo, apply_tremor, apply_vibrato, note_delay, pattern_loop,
    retrig_volume, volume_slide,
};
use crate::envelope::{envelope_advance, envelope_value};
use crate::mix::{pan, TickBuffer};
use crate::player::PlayerState;
use crate::tracker::{FlowDelta, Tracker};

/// Top of the linear period range (note 1, no finetune).
pub const LINEAR_PERIOD_MAX: u16 = 7680;

/// Amiga-mode master clock.
const AMIGA_CLOCK: f64 = 3_546_895.0;

/// First-octave Amiga periods; higher octaves shift right.
const AMIGA_PERIODS: [u16; 12] = [856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453];

/// Key-off marker in the note byte.
const NOTE_KEY_OFF: u8 = 97;

fn period_bounds(module: &Module) -> (u16, u16) {
    if module.linear_periods {
        (1, LINEAR_PERIOD_MAX)
    } else {
        (1, 32767)
    }
}

fn is_tone_porta(cell: &Cell) -> bool {
    cell.effect == 0x03 || cell.effect == 0x05 || cell.volume >= 0xF0
}

/// Round a linear-mode period to the nearest whole semitone (glissando).
/// Amiga-mode rounding is left alone; its behavior is not pinned down.
pub(crate) fn round_period_to_semitone(ch: &mut ChannelState) {
    if ch.period == 0 {
        return;
    }
    let finetune = ch.finetune as f64 / 2.0;
    let note = ((7680.0 - ch.period as f64 - finetune) / 64.0 + 1.0).round();
    let period = 7680.0 - (note - 1.0) * 64.0 - finetune;
    ch.period = period.clamp(1.0, LINEAR_PERIOD_MAX as f64) as u16;
}

/// The FastTracker II effects machine.
pub struct FastTracker;

impl FastTracker {
    /// Period for a note, after the sample's relative-note shift. Linear
    /// mode folds the finetune in; Amiga mode walks the octave table.
    fn period_for_note(&self, module: &Module, note: u8, sample: Option<&Sample>) -> u16 {
        let (finetune, relative) = sample.map_or((0, 0), |s| (s.finetune, s.relative_note));
        let real = (note as i32 + relative as i32).clamp(1, 120);
        if module.linear_periods {
            let period = 7680 - (real - 1) * 64 - finetune as i32 / 2;
            period.clamp(1, LINEAR_PERIOD_MAX as i32) as u16
        } else {
            let idx = ((real - 1) % 12) as usize;
            let octave = ((real - 1) / 12) as u32;
            (AMIGA_PERIODS[idx] >> octave).max(1)
        }
    }

    fn instrument<'a>(&self, module: &'a Module, ch: &ChannelState) -> Option<&'a Instrument> {
        if ch.sample_index <= 0 {
            return None;
        }
        module.instruments.get(ch.sample_index as usize - 1)
    }

    fn handle_trigger(&self, module: &Module, ch: &mut ChannelState, cell: &Cell) {
        if cell.instrument > 0 {
            if (cell.instrument as usize) <= module.instruments.len() {
                ch.sample_index = cell.instrument as i32;
                let instrument = &module.instruments[cell.instrument as usize - 1];
                if (1..NOTE_KEY_OFF).contains(&cell.note) {
                    match instrument.sample_for_note(cell.note) {
                        Some(idx) => ch.sub_sample = idx,
                        None => warn!(
                            "instrument {} has no sample for note {}",
                            cell.instrument, cell.note
                        ),
                    }
                }
                if let Some(sample) = instrument.samples.get(ch.sub_sample as usize) {
                    ch.volume = sample.volume.min(64) as f64 / 64.0;
                    ch.panning = sample.panning as f64 / 255.0;
                    ch.finetune = sample.finetune;
                }
            } else {
                warn!(
                    "cell references instrument {} of {}",
                    cell.instrument,
                    module.instruments.len()
                );
            }
        }

        if (1..NOTE_KEY_OFF).contains(&cell.note) {
            let period = self.period_for_note(module, cell.note, resolve_sample(module, ch));
            if is_tone_porta(cell) {
                ch.porta_target = period;
            } else {
                ch.period = period;
                ch.note_period = period;
                ch.note = cell.note;
                ch.sample_pos = 0.0;
                ch.loop_forward = true;
                ch.fadeout = 65535;
                ch.volume_envelope_pos = 0;
                ch.panning_envelope_pos = 0;
                ch.autovibrato_pos = 0;
                ch.tremor_counter = 0;
                ch.sustained = true;
            }
        } else if cell.note == NOTE_KEY_OFF {
            ch.sustained = false;
        }
    }

    /// The volume byte's second effect lane. Fine slides and sets fire on
    /// tick 0; plain slides run on the later ticks.
    fn handle_volume_column(&self, ch: &mut ChannelState, cell: &Cell, tick: u32) {
        let v = cell.volume;
        let y = (v & 0x0F) as f64;
        match v {
            0x10..=0x50 => {
                if tick == 0 {
                    ch.volume = (v - 0x10) as f64 / 64.0;
                }
            }
            0x60..=0x6F => {
                if tick > 0 {
                    ch.nudge_volume(-y / 64.0);
                }
            }
            0x70..=0x7F => {
                if tick > 0 {
                    ch.nudge_volume(y / 64.0);
                }
            }
            0x80..=0x8F => {
                if tick == 0 {
                    ch.nudge_volume(-y / 64.0);
                }
            }
            0x90..=0x9F => {
                if tick == 0 {
                    ch.nudge_volume(y / 64.0);
                }
            }
            0xA0..=0xAF => {
                if tick == 0 {
                    ch.vibrato_speed = v & 0x0F;
                }
            }
            0xB0..=0xBF => {
                if tick == 0 {
                    ch.vibrato_depth = v & 0x0F;
                }
            }
            0xC0..=0xCF => {
                if tick == 0 {
                    ch.panning = (v & 0x0F) as f64 / 15.0;
                }
            }
            0xD0..=0xDF => {
                if tick > 0 {
                    ch.nudge_panning(-y / 64.0);
                }
            }
            0xE0..=0xEF => {
                if tick > 0 {
                    ch.nudge_panning(y / 64.0);
                }
            }
            0xF0..=0xFF => {
                if tick == 0 && v & 0x0F > 0 {
                    ch.porta_speed = (v & 0x0F) as u16 * 4;
                }
            }
            _ => {}
        }
    }

    fn handle_effect(
        &self,
        module: &Module,
        state: &mut PlayerState,
        ch: &mut ChannelState,
        cell: &Cell,
        tick: u32,
    ) -> FlowDelta {
        let mut flow = FlowDelta::default();
        let param = cell.param;
        let (min, max) = period_bounds(module);

        if cell.effect == 0 && param == 0 {
            return flow;
        }

        match cell.effect {
            0x00 => {
                apply_arpeggio(ch, param, tick, |ch, off| {
                    let note = ch.note.saturating_add(off);
                    self.period_for_note(module, note, resolve_sample(module, ch))
                });
            }
            0x01 => {
                if tick > 0 {
                    if param > 0 {
                        ch.last_porta_up = param;
                    }
                    ch.nudge_period(-(ch.last_porta_up as f64) * 4.0, min, max);
                }
            }
            0x02 => {
                if tick > 0 {
                    if param > 0 {
                        ch.last_porta_down = param;
                    }
                    ch.nudge_period(ch.last_porta_down as f64 * 4.0, min, max);
                }
            }
            0x03 => {
                if param > 0 {
                    ch.porta_speed = param as u16 * 4;
                }
            }
            0x04 => {
                if param >> 4 > 0 {
                    ch.vibrato_speed = param >> 4;
                }
                if param & 0x0F > 0 {
                    ch.vibrato_depth = param & 0x0F;
                }
            }
            0x05 => volume_slide(ch, param, tick, false),
            0x06 => volume_slide(ch, param, tick, false),
            0x07 => {
                if param >> 4 > 0 {
                    ch.tremolo_speed = param >> 4;
                }
                if param & 0x0F > 0 {
                    ch.tremolo_depth = param & 0x0F;
                }
            }
            0x08 => {
                if tick == 0 {
                    ch.panning = param as f64 / 255.0;
                }
            }
            0x09 => {
                if tick == 0 {
                    if param > 0 {
                        ch.last_sample_offset = param as u16;
                    }
                    ch.sample_pos = ch.last_sample_offset as f64 * 256.0;
                }
            }
            0x0A => volume_slide(ch, param, tick, false),
            0x0B => {
                if tick == 0 {
                    flow.next_order = Some(param as u16);
                    flow.next_row = Some(0);
                }
            }
            0x0C => {
                if tick == 0 {
                    ch.volume = param.min(64) as f64 / 64.0;
                }
            }
            0x0D => {
                if tick == 0 {
                    flow.next_order = Some(state.order + 1);
                    flow.next_row = Some((param >> 4) as u16 * 10 + (param & 0x0F) as u16);
                }
            }
            0x0E => self.handle_extended(state, ch, param >> 4, param & 0x0F, tick, &mut flow, min, max),
            0x0F => {
                if tick == 0 && param > 0 {
                    if param <= 0x1F {
                        state.speed = param;
                    } else {
                        state.bpm = param;
                    }
                }
            }
            // Gxx: set global volume
            0x10 => {
                if tick == 0 && param <= 64 {
                    state.global_volume = param as f64 / 64.0;
                }
            }
            // Hxy: global volume slide
            0x11 => {
                if tick > 0 {
                    let x = param >> 4;
                    let y = param & 0x0F;
                    let delta = if x > 0 {
                        x as f64 / 64.0
                    } else {
                        -(y as f64) / 64.0
                    };
                    state.global_volume = (state.global_volume + delta).clamp(0.0, 1.0);
                }
            }
            // Kxx: key off at tick
            0x14 => {
                if tick == param as u32 {
                    ch.sustained = false;
                    ch.fadeout = 0;
                }
            }
            // Lxx: set envelope position
            0x15 => {
                if tick == 0 {
                    ch.volume_envelope_pos = param as u16;
                    ch.panning_envelope_pos = param as u16;
                }
            }
            // Rxy: multi retrigger with volume modifier
            0x1A => {
                let interval = (param & 0x0F) as u32;
                if tick > 0 && interval > 0 && tick % interval == 0 {
                    ch.sample_pos = 0.0;
                    ch.volume = retrig_volume(ch.volume, param >> 4);
                }
            }
            // Txy: tremor
            0x1C => apply_tremor(ch, param),
            _ => {}
        }
        flow
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_extended(
        &self,
        state: &mut PlayerState,
        ch: &mut ChannelState,
        command: u8,
        value: u8,
        tick: u32,
        flow: &mut FlowDelta,
        min: u16,
        max: u16,
    ) {
        if tick == 0 {
            match command {
                0x01 => ch.nudge_period(-(value as f64) * 4.0, min, max),
                0x02 => ch.nudge_period(value as f64 * 4.0, min, max),
                0x03 => ch.glissando = value > 0,
                0x04 => ch.vibrato_wave = value,
                0x06 => {
                    if let Some(row) = pattern_loop(state, value) {
                        flow.next_row = Some(row);
                    }
                }
                0x07 => ch.tremolo_wave = value,
                0x0A => ch.nudge_volume(value as f64 / 64.0),
                0x0B => ch.nudge_volume(-(value as f64) / 64.0),
                0x0E => flow.pattern_delay = Some(value),
                _ => {}
            }
        }
        match command {
            0x09 => {
                if tick > 0 && value > 0 && tick % value as u32 == 0 {
                    ch.sample_pos = 0.0;
                }
            }
            0x0C => {
                if tick == value as u32 {
                    ch.volume = 0.0;
                }
            }
            // 0x0D note delay shifts the trigger tick; see process_tick.
            _ => {}
        }
    }

    /// Walk the volume/panning envelopes and the key-off fade.
    fn update_envelopes(&self, module: &Module, ch: &mut ChannelState) {
        let Some(instrument) = self.instrument(module, ch) else {
            return;
        };

        let env = &instrument.volume_envelope;
        if env.enabled() {
            ch.env_volume = envelope_value(env, ch.volume_envelope_pos) / 64.0;
            ch.volume_envelope_pos = envelope_advance(env, ch.volume_envelope_pos, ch.sustained);
        } else {
            ch.env_volume = 1.0;
            if !ch.sustained {
                // No envelope: key-off is an immediate cut.
                ch.volume = 0.0;
            }
        }

        let env = &instrument.panning_envelope;
        if env.enabled() {
            ch.env_panning = Some((envelope_value(env, ch.panning_envelope_pos) / 64.0).clamp(0.0, 1.0));
            ch.panning_envelope_pos = envelope_advance(env, ch.panning_envelope_pos, ch.sustained);
        } else {
            ch.env_panning = None;
        }

        if !ch.sustained {
            ch.fadeout = ch.fadeout.saturating_sub(instrument.fadeout);
        }
    }

    /// Instrument autovibrato: waveform scaled by depth, ramped in over the
    /// sweep, added to the period every tick.
    fn apply_autovibrato(&self, module: &Module, ch: &mut ChannelState) {
        let Some(instrument) = self.instrument(module, ch) else {
            return;
        };
        let vib = instrument.vibrato;
        if vib.depth == 0 {
            return;
        }

        let pos = ch.autovibrato_pos as f64;
        let depth = vib.depth as f64;
        let mut delta = match vib.waveform {
            0 => libm::sin(pos * TAU / 256.0) * depth,
            1 => {
                if ch.autovibrato_pos < 128 {
                    depth
                } else {
                    -depth
                }
            }
            2 => (pos / 128.0 - 1.0) * depth,
            3 => (1.0 - pos / 128.0) * depth,
            _ => 0.0,
        };
        if vib.sweep > 0 && pos < vib.sweep as f64 {
            delta *= pos / vib.sweep as f64;
        }

        let (min, max) = period_bounds(module);
        ch.nudge_period(delta, min, max);
        ch.autovibrato_pos = ch.autovibrato_pos.wrapping_add(vib.rate);
    }

    fn frequency(&self, module: &Module, period: u16) -> f64 {
        if module.linear_periods {
            8363.0 * libm::pow(2.0, (4608.0 - period as f64) / 768.0)
        } else {
            AMIGA_CLOCK / period as f64
        }
    }
}

impl Tracker for FastTracker {
    fn process_tick(
        &self,
        module: &Module,
        state: &mut PlayerState,
        ch: &mut ChannelState,
        cell: &Cell,
        tick: u32,
    ) -> FlowDelta {
        ch.tremor_mute = false;
        if tick == note_delay(cell) as u32 {
            self.handle_trigger(module, ch, cell);
        }
        self.handle_volume_column(ch, cell, tick);
        let flow = self.handle_effect(module, state, ch, cell, tick);
        self.update_envelopes(module, ch);
        let (min, max) = period_bounds(module);
        apply_vibrato(ch, min, max);
        apply_tremolo(ch);
        self.apply_autovibrato(module, ch);
        flow
    }

    fn render_tick(
        &self,
        module: &Module,
        ch: &mut ChannelState,
        buf: &mut TickBuffer,
        global_volume: f64,
    ) {
        let Some(sample) = resolve_sample(module, ch) else {
            return;
        };
        if ch.period == 0 || sample.is_empty() {
            return;
        }

        let freq = self.frequency(module, ch.period);
        let base_step = freq / buf.sample_rate() as f64;
        let length = sample.frames() as f64;
        let loop_start = sample.loop_start as f64;
        let loop_length = sample.loop_length() as f64;
        let has_loop = sample.has_loop() && sample.loop_length() > 2;
        let ping_pong = sample.loop_type == rp_ir::LoopType::PingPong;

        let volume = if ch.tremor_mute {
            0.0
        } else {
            ch.volume * ch.env_volume * (ch.fadeout as f64 / 65535.0) * global_volume
        };
        let panning = ch.env_panning.unwrap_or(ch.panning);

        for i in 0..buf.frames() {
            if ch.sample_pos >= length {
                if has_loop {
                    if ping_pong {
                        // Reflect at the right edge; bounds are re-checked
                        // next frame in case the step exceeds the loop.
                        ch.loop_forward = false;
                        ch.sample_pos = length - 1.0;
                    } else {
                        ch.sample_pos -= loop_length;
                    }
                } else {
                    ch.cut_sample();
                    return;
                }
            } else if ping_pong && !ch.loop_forward && ch.sample_pos < loop_start {
                ch.loop_forward = true;
                ch.sample_pos = loop_start;
            }

            let pos = ch.sample_pos.max(0.0);
            let floor = pos as usize;
            let alpha = pos - floor as f64;

            let s1 = sample.frame(floor) as f64;
            let s2 = if floor + 1 < sample.frames() {
                sample.frame(floor + 1) as f64
            } else if has_loop {
                if ping_pong {
                    sample.frame(floor.saturating_sub(1)) as f64
                } else {
                    sample.frame(loop_start as usize) as f64
                }
            } else {
                s1
            };

            let value = (s1 * (1.0 - alpha) + s2 * alpha) * volume;
            let (left, right) = pan(buf.channels(), panning, value);
            buf.add(i, left, right);

            ch.sample_pos += if ch.loop_forward { base_step } else { -base_step };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_ir::{Envelope, LoopType, ModuleKind};

    fn module_with_instrument(data: Vec<i16>, volume: u8) -> Module {
        let mut module = Module::new("test", ModuleKind::FastTracker2, 1);
        let mut sample = Sample::new("s1");
        sample.data = data;
        sample.volume = volume;
        let instrument = Instrument::with_sample("i1", sample);
        module.instruments.push(instrument);
        module
    }

    fn note_cell(note: u8, instrument: u8) -> Cell {
        Cell { note, instrument, ..Cell::empty() }
    }

    fn effect_cell(effect: u8, param: u8) -> Cell {
        Cell { effect, param, ..Cell::empty() }
    }

    fn tick(
        module: &Module,
        state: &mut PlayerState,
        ch: &mut ChannelState,
        cell: &Cell,
        n: u32,
    ) -> FlowDelta {
        FastTracker.process_tick(module, state, ch, cell, n)
    }

    fn playing_channel(module: &Module) -> (PlayerState, ChannelState) {
        let mut state = PlayerState::new(6, 125);
        let mut ch = ChannelState::new();
        tick(module, &mut state, &mut ch, &note_cell(49, 1), 0);
        (state, ch)
    }

    #[test]
    fn linear_period_formula() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let ft = FastTracker;
        assert_eq!(ft.period_for_note(&module, 1, None), 7680);
        assert_eq!(ft.period_for_note(&module, 49, None), 7680 - 48 * 64);
        assert_eq!(ft.period_for_note(&module, 97, None), 7680 - 96 * 64);
    }

    #[test]
    fn amiga_period_table_shifts_by_octave() {
        let mut module = module_with_instrument(vec![0; 1000], 64);
        module.linear_periods = false;
        let ft = FastTracker;
        assert_eq!(ft.period_for_note(&module, 1, None), 856);
        assert_eq!(ft.period_for_note(&module, 13, None), 428);
        assert_eq!(ft.period_for_note(&module, 25, None), 214);
    }

    #[test]
    fn relative_note_and_finetune_shift_linear_periods() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let ft = FastTracker;
        let mut sample = Sample::new("s");
        sample.relative_note = 12;
        sample.finetune = 64;
        let period = ft.period_for_note(&module, 49, Some(&sample));
        assert_eq!(period, 7680 - 60 * 64 - 32);
    }

    #[test]
    fn trigger_resets_instrument_machinery() {
        let module = module_with_instrument(vec![0; 1000], 48);
        let mut state = PlayerState::new(6, 125);
        let mut ch = ChannelState::new();
        ch.fadeout = 100;
        ch.volume_envelope_pos = 30;
        tick(&module, &mut state, &mut ch, &note_cell(49, 1), 0);
        assert_eq!(ch.period, 7680 - 48 * 64);
        assert_eq!(ch.note, 49);
        assert_eq!(ch.volume, 48.0 / 64.0);
        assert_eq!(ch.fadeout, 65535);
        assert!(ch.sustained);
        // No envelope is enabled, so the position is not walked.
        assert_eq!(ch.volume_envelope_pos, 0);
    }

    #[test]
    fn key_off_note_releases_sustain() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let (mut state, mut ch) = playing_channel(&module);
        tick(&module, &mut state, &mut ch, &note_cell(97, 0), 0);
        assert!(!ch.sustained);
    }

    #[test]
    fn key_off_without_envelope_cuts_volume() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let (mut state, mut ch) = playing_channel(&module);
        assert_eq!(ch.volume, 1.0);
        tick(&module, &mut state, &mut ch, &note_cell(97, 0), 0);
        assert_eq!(ch.volume, 0.0);
    }

    #[test]
    fn fadeout_winds_down_after_release() {
        let mut module = module_with_instrument(vec![0; 1000], 64);
        module.instruments[0].fadeout = 1000;
        // An enabled envelope keeps the volume alive through the fade.
        module.instruments[0].volume_envelope = Envelope::from_points(&[(0, 64), (100, 64)], 1);
        let (mut state, mut ch) = playing_channel(&module);
        tick(&module, &mut state, &mut ch, &note_cell(97, 0), 0);
        assert_eq!(ch.fadeout, 64535);
        tick(&module, &mut state, &mut ch, &Cell::empty(), 1);
        assert_eq!(ch.fadeout, 63535);
        assert!(!ch.sustained);
    }

    #[test]
    fn volume_envelope_feeds_env_volume() {
        let mut module = module_with_instrument(vec![0; 1000], 64);
        module.instruments[0].volume_envelope =
            Envelope::from_points(&[(0, 0), (10, 64), (20, 0)], 1);
        let (mut state, mut ch) = playing_channel(&module);
        for n in 1..6 {
            tick(&module, &mut state, &mut ch, &Cell::empty(), n);
        }
        // After 6 ticks the envelope sits at position 5: value 32 of 64.
        assert!((ch.env_volume - 32.0 / 64.0).abs() < 1e-9);
    }

    #[test]
    fn set_envelope_position_jumps_both_lanes() {
        let mut module = module_with_instrument(vec![0; 1000], 64);
        module.instruments[0].volume_envelope =
            Envelope::from_points(&[(0, 0), (50, 64)], 1);
        let (mut state, mut ch) = playing_channel(&module);
        tick(&module, &mut state, &mut ch, &effect_cell(0x15, 25), 0);
        // The volume lane walked one tick from the forced position; the
        // disabled panning lane holds it.
        assert_eq!(ch.volume_envelope_pos, 26);
        assert_eq!(ch.panning_envelope_pos, 25);
    }

    #[test]
    fn volume_column_sets_and_slides() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let (mut state, mut ch) = playing_channel(&module);

        let mut cell = Cell::empty();
        cell.volume = 0x30; // set to 32/64
        tick(&module, &mut state, &mut ch, &cell, 0);
        assert_eq!(ch.volume, 0.5);

        cell.volume = 0x72; // slide up 2 per tick
        tick(&module, &mut state, &mut ch, &cell, 0);
        assert_eq!(ch.volume, 0.5);
        tick(&module, &mut state, &mut ch, &cell, 1);
        assert_eq!(ch.volume, 0.5 + 2.0 / 64.0);

        cell.volume = 0x84; // fine slide down 4, tick 0 only
        tick(&module, &mut state, &mut ch, &cell, 0);
        assert_eq!(ch.volume, 0.5 + 2.0 / 64.0 - 4.0 / 64.0);
        tick(&module, &mut state, &mut ch, &cell, 1);
        assert_eq!(ch.volume, 0.5 + 2.0 / 64.0 - 4.0 / 64.0);
    }

    #[test]
    fn volume_column_vibrato_and_pan() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let (mut state, mut ch) = playing_channel(&module);

        let mut cell = Cell::empty();
        cell.volume = 0xA5;
        tick(&module, &mut state, &mut ch, &cell, 0);
        assert_eq!(ch.vibrato_speed, 5);
        cell.volume = 0xB3;
        tick(&module, &mut state, &mut ch, &cell, 0);
        assert_eq!(ch.vibrato_depth, 3);
        cell.volume = 0xCF;
        tick(&module, &mut state, &mut ch, &cell, 0);
        assert_eq!(ch.panning, 1.0);
    }

    #[test]
    fn volume_column_tone_porta_speed() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let (mut state, mut ch) = playing_channel(&module);
        let mut cell = note_cell(61, 0);
        cell.volume = 0xF3;
        tick(&module, &mut state, &mut ch, &cell, 0);
        assert_eq!(ch.porta_speed, 12);
        // The note became a portamento target, not an immediate jump.
        assert_eq!(ch.period, 7680 - 48 * 64);
        assert_eq!(ch.porta_target, 7680 - 60 * 64);
    }

    #[test]
    fn porta_scales_param_by_four() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let (mut state, mut ch) = playing_channel(&module);
        let before = ch.period;
        tick(&module, &mut state, &mut ch, &effect_cell(0x01, 2), 1);
        assert_eq!(ch.period, before - 8);
        tick(&module, &mut state, &mut ch, &effect_cell(0x02, 2), 1);
        assert_eq!(ch.period, before);
        // Param 0 reuses the slide memory.
        tick(&module, &mut state, &mut ch, &effect_cell(0x02, 0), 1);
        assert_eq!(ch.period, before + 8);
    }

    #[test]
    fn key_off_effect_fires_at_its_tick() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let (mut state, mut ch) = playing_channel(&module);
        let cell = effect_cell(0x14, 2);
        tick(&module, &mut state, &mut ch, &cell, 1);
        assert!(ch.sustained);
        tick(&module, &mut state, &mut ch, &cell, 2);
        assert!(!ch.sustained);
        assert_eq!(ch.fadeout, 0);
    }

    #[test]
    fn global_volume_set_and_slide() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let (mut state, mut ch) = playing_channel(&module);
        tick(&module, &mut state, &mut ch, &effect_cell(0x10, 32), 0);
        assert_eq!(state.global_volume, 0.5);
        tick(&module, &mut state, &mut ch, &effect_cell(0x11, 0x20), 1);
        assert_eq!(state.global_volume, 0.5 + 2.0 / 64.0);
        tick(&module, &mut state, &mut ch, &effect_cell(0x11, 0x04), 1);
        assert_eq!(state.global_volume, 0.5 + 2.0 / 64.0 - 4.0 / 64.0);
    }

    #[test]
    fn multi_retrigger_applies_volume_table() {
        let module = module_with_instrument(vec![0; 100_000], 64);
        let (mut state, mut ch) = playing_channel(&module);
        ch.volume = 0.5;
        ch.sample_pos = 700.0;
        let cell = effect_cell(0x1A, 0x72); // halve volume every 2 ticks
        tick(&module, &mut state, &mut ch, &cell, 2);
        assert_eq!(ch.sample_pos, 0.0);
        assert_eq!(ch.volume, 0.25);
    }

    #[test]
    fn note_delay_defers_xm_trigger() {
        let module = module_with_instrument(vec![0; 1000], 64);
        let mut state = PlayerState::new(6, 125);
        let mut ch = ChannelState::new();
        let cell = Cell { note: 49, instrument: 1, effect: 0x0E, param: 0xD2, ..Cell::empty() };
        tick(&module, &mut state, &mut ch, &cell, 0);
        assert_eq!(ch.period, 0);
        tick(&module, &mut state, &mut ch, &cell, 2);
        assert_eq!(ch.period, 7680 - 48 * 64);
    }

    #[test]
    fn autovibrato_bends_period_after_sweep() {
        let mut module = module_with_instrument(vec![0; 1000], 64);
        module.instruments[0].vibrato = rp_ir::AutoVibrato {
            waveform: 0,
            sweep: 0,
            depth: 8,
            rate: 16,
        };
        let (mut state, mut ch) = playing_channel(&module);
        let base = ch.note_period;
        tick(&module, &mut state, &mut ch, &Cell::empty(), 1);
        tick(&module, &mut state, &mut ch, &Cell::empty(), 2);
        assert_ne!(ch.period, base);
    }

    #[test]
    fn glissando_rounds_to_whole_semitones() {
        let mut ch = ChannelState::new();
        // 40 of the 64 units toward the next semitone: round up.
        ch.period = 4608 - 40;
        round_period_to_semitone(&mut ch);
        assert_eq!(ch.period, 4608 - 64);
        // 20 units along: fall back to the base note.
        ch.period = 4608 - 20;
        round_period_to_semitone(&mut ch);
        assert_eq!(ch.period, 4608);
    }

    #[test]
    fn render_interpolates_between_frames() {
        let mut module = module_with_instrument(vec![0, 1000], 64);
        // Slow the sample right down so successive output frames sit
        // between the two data points.
        module.instruments[0].samples[0].relative_note = -48;
        let (_, mut ch) = playing_channel(&module);
        ch.panning = 0.0;
        let mut buf = TickBuffer::new(3, 2, 44100);
        FastTracker.render_tick(&module, &mut ch, &mut buf, 1.0);
        let samples = buf.into_samples();
        assert_eq!(samples[0], 0);
        // Position advanced by a fraction; output is strictly between the
        // two sample values.
        assert!(samples[2] > 0 && samples[2] < 1000);
    }

    #[test]
    fn render_ping_pong_reflects_and_persists_direction() {
        let mut module = module_with_instrument(vec![100; 16], 64);
        {
            let sample = &mut module.instruments[0].samples[0];
            sample.loop_start = 0;
            sample.loop_end = 16;
            sample.loop_type = LoopType::PingPong;
        }
        let (_, mut ch) = playing_channel(&module);
        ch.sample_pos = 15.9;
        let mut buf = TickBuffer::new(8, 2, 44100);
        FastTracker.render_tick(&module, &mut ch, &mut buf, 1.0);
        assert!(!ch.loop_forward, "direction should have flipped at the end");
        assert!(ch.sample_pos < 16.0);
        // Direction survives into the next tick's render.
        let mut buf = TickBuffer::new(4, 2, 44100);
        FastTracker.render_tick(&module, &mut ch, &mut buf, 1.0);
        assert!(ch.sample_pos >= 0.0);
    }

    #[test]
    fn render_ping_pong_reflects_at_loop_start() {
        let mut module = module_with_instrument(vec![100; 16], 64);
        {
            let sample = &mut module.instruments[0].samples[0];
            sample.loop_start = 4;
            sample.loop_end = 16;
            sample.loop_type = LoopType::PingPong;
        }
        let (_, mut ch) = playing_channel(&module);
        ch.loop_forward = false;
        ch.sample_pos = 4.1;
        let mut buf = TickBuffer::new(64, 2, 44100);
        FastTracker.render_tick(&module, &mut ch, &mut buf, 1.0);
        assert!(ch.loop_forward, "direction should flip forward at loop start");
        assert!(ch.sample_pos >= 4.0);
    }

    #[test]
    fn render_forward_loop_subtracts_loop_length() {
        let mut module = module_with_instrument(vec![100; 16], 64);
        {
            let sample = &mut module.instruments[0].samples[0];
            sample.loop_start = 8;
            sample.loop_end = 16;
            sample.loop_type = LoopType::Forward;
        }
        let (_, mut ch) = playing_channel(&module);
        let mut buf = TickBuffer::new(2000, 2, 44100);
        FastTracker.render_tick(&module, &mut ch, &mut buf, 1.0);
        assert_eq!(ch.sample_index, 1);
        assert!(ch.sample_pos < 16.0);
    }

    #[test]
    fn render_scales_by_fadeout_level() {
        let module = module_with_instrument(vec![1000; 4000], 64);
        let (_, mut ch) = playing_channel(&module);
        ch.panning = 0.0;
        ch.fadeout = 32768;
        let mut buf = TickBuffer::new(1, 2, 44100);
        FastTracker.render_tick(&module, &mut ch, &mut buf, 1.0);
        let value = buf.into_samples()[0];
        assert!((value - 500).abs() <= 1, "expected ~500, got {value}");
    }
}
