//! Scream Tracker 3 effect processing and rendering.

use log::warn;
use rp_ir::{Cell, Module};

use crate::channel::{resolve_sample, ChannelState};
use crate::effects::{
    apply_arpeggio, apply_tremolo, apply_tremor, apply_vibrato, pattern_loop, retrig_volume,
    s3m_porta_down, s3m_porta_up, volume_slide,
};
use crate::mix::{pan, TickBuffer};
use crate::player::PlayerState;
use crate::tracker::{FlowDelta, Tracker};

/// Period clamp bounds, the extremes of the nine-octave table.
pub const PERIOD_MIN: u16 = 56;
pub const PERIOD_MAX: u16 = 27392;

/// S3M master clock; sample rate = clock / period.
const S3M_CLOCK: f64 = 14_317_456.0;

/// Note cut marker in the note byte.
const NOTE_CUT: u8 = 254;
/// Empty note marker.
const NOTE_NONE: u8 = 255;
/// Empty volume column marker.
const VOLUME_NONE: u8 = 255;

/// Nine octaves of periods at the unadjusted 8363 Hz C2 rate.
#[rustfmt::skip]
const PERIOD_TABLE: [u16; 12 * 9] = [
    27392, 25856, 24384, 23040, 21696, 20480, 19328, 18240, 17216, 16256, 15360, 14496,
    13696, 12928, 12192, 11520, 10848, 10240, 9664, 9120, 8608, 8128, 7680, 7248,
    6848, 6464, 6096, 5760, 5424, 5120, 4832, 4560, 4304, 4064, 3840, 3624,
    3424, 3232, 3048, 2880, 2712, 2560, 2416, 2280, 2152, 2032, 1920, 1812,
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 906,
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453,
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226,
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113,
    107, 101, 95, 90, 85, 80, 75, 71, 67, 63, 60, 56,
];

/// Shift a table period by semitones, staying within its octave row.
fn shift_period(period: u16, offset: u8) -> u16 {
    let Some(idx) = PERIOD_TABLE.iter().position(|&p| p == period) else {
        return period;
    };
    let octave = idx / 12;
    let note = ((idx % 12) + offset as usize).min(11);
    PERIOD_TABLE[octave * 12 + note]
}

fn is_tone_porta(effect: u8) -> bool {
    // Gxx and Lxy keep the running note and slide toward the new one.
    effect == 7 || effect == 12
}

/// The Scream Tracker 3 effects machine.
pub struct ScreamTracker;

impl ScreamTracker {
    fn handle_trigger(&self, module: &Module, ch: &mut ChannelState, cell: &Cell) {
        if cell.instrument > 0 {
            if (cell.instrument as usize) <= module.samples.len() {
                ch.sample_index = cell.instrument as i32;
                let sample = &module.samples[cell.instrument as usize - 1];
                ch.volume = if cell.volume <= 64 {
                    cell.volume as f64 / 64.0
                } else {
                    sample.volume.min(64) as f64 / 64.0
                };
            } else {
                warn!("cell references sample {} of {}", cell.instrument, module.samples.len());
            }
        } else if cell.volume <= 64 {
            ch.volume = cell.volume as f64 / 64.0;
        }

        match cell.note {
            NOTE_NONE | 0 => {}
            NOTE_CUT => ch.volume = 0.0,
            note => {
                let octave = (note >> 4) as usize;
                let semitone = (note & 0x0F) as usize;
                let idx = octave * 12 + semitone;
                if idx < PERIOD_TABLE.len() {
                    let base = PERIOD_TABLE[idx] as f64;
                    let c2_rate = resolve_sample(module, ch)
                        .map(|s| s.c2_rate)
                        .filter(|&r| r > 0)
                        .unwrap_or(8363);
                    let period = (base * 8363.0 / c2_rate as f64) as u16;
                    if is_tone_porta(cell.effect) {
                        ch.porta_target = period;
                    } else {
                        ch.period = period;
                        ch.note_period = period;
                        ch.sample_pos = 0.0;
                        ch.loop_forward = true;
                        ch.tremor_counter = 0;
                    }
                }
            }
        }
    }

    fn handle_effect(
        &self,
        state: &mut PlayerState,
        ch: &mut ChannelState,
        cell: &Cell,
        tick: u32,
    ) -> FlowDelta {
        let mut flow = FlowDelta::default();
        let param = cell.param;

        match cell.effect {
            // Axx: set speed
            1 => {
                if tick == 0 && param > 0 {
                    state.speed = param;
                }
            }
            // Bxx: jump to order
            2 => {
                if tick == 0 {
                    flow.next_order = Some(param as u16);
                    flow.next_row = Some(0);
                }
            }
            // Cxx: break to row (decimal-coded)
            3 => {
                if tick == 0 {
                    flow.next_order = Some(state.order + 1);
                    flow.next_row = Some((param >> 4) as u16 * 10 + (param & 0x0F) as u16);
                }
            }
            // Dxy: volume slide (with fine variants)
            4 => volume_slide(ch, param, tick, true),
            // Exx: portamento down
            5 => s3m_porta_down(ch, param, tick, PERIOD_MIN, PERIOD_MAX),
            // Fxx: portamento up
            6 => s3m_porta_up(ch, param, tick, PERIOD_MIN, PERIOD_MAX),
            // Gxx: tone portamento
            7 => {
                if param > 0 {
                    ch.porta_speed = param as u16 * 4;
                }
            }
            // Hxy: vibrato
            8 => {
                if param > 0 {
                    ch.vibrato_speed = param >> 4;
                    ch.vibrato_depth = param & 0x0F;
                }
            }
            // Ixy: tremor
            9 => apply_tremor(ch, param),
            // Jxy: arpeggio
            10 => apply_arpeggio(ch, param, tick, |ch, off| shift_period(ch.note_period, off)),
            // Kxy: vibrato + volume slide
            11 => volume_slide(ch, param, tick, true),
            // Lxy: tone portamento + volume slide
            12 => volume_slide(ch, param, tick, true),
            // Oxy: sample offset
            15 => {
                if tick == 0 {
                    if param > 0 {
                        ch.last_sample_offset = param as u16;
                    }
                    ch.sample_pos = ch.last_sample_offset as f64 * 256.0;
                }
            }
            // Qxy: retrigger + volume modifier
            17 => {
                let interval = (param & 0x0F) as u32;
                if tick > 0 && interval > 0 && tick % interval == 0 {
                    ch.sample_pos = 0.0;
                    ch.volume = retrig_volume(ch.volume, param >> 4);
                }
            }
            // Rxy: tremolo
            18 => {
                if param > 0 {
                    ch.tremolo_speed = param >> 4;
                    ch.tremolo_depth = param & 0x0F;
                }
            }
            // Sxy: specials
            19 => self.handle_special(state, ch, param >> 4, param & 0x0F, tick, &mut flow),
            // Txx: set tempo
            20 => {
                if tick == 0 && param > 32 {
                    state.bpm = param;
                }
            }
            // Uxy: fine vibrato (same oscillator)
            21 => {
                if param > 0 {
                    ch.vibrato_speed = param >> 4;
                    ch.vibrato_depth = param & 0x0F;
                }
            }
            // Vxx: set global volume
            22 => {
                if tick == 0 && param <= 64 {
                    state.global_volume = param as f64 / 64.0;
                }
            }
            _ => {}
        }
        flow
    }

    fn handle_special(
        &self,
        state: &mut PlayerState,
        ch: &mut ChannelState,
        command: u8,
        value: u8,
        tick: u32,
        flow: &mut FlowDelta,
    ) {
        match command {
            0x1 => ch.glissando = value > 0,
            0x3 => ch.vibrato_wave = value,
            0x4 => ch.tremolo_wave = value,
            0x8 => {
                if tick == 0 {
                    ch.panning = value as f64 / 15.0;
                }
            }
            0xB => {
                if tick == 0 {
                    if let Some(row) = pattern_loop(state, value) {
                        flow.next_row = Some(row);
                    }
                }
            }
            0xC => {
                if tick == value as u32 {
                    ch.volume = 0.0;
                }
            }
            // SEy delays in rows, each lasting the current tick count.
            0xE => {
                if tick == 0 {
                    let rows = value as u16 * state.speed as u16;
                    flow.pattern_delay = Some(rows.min(255) as u8);
                }
            }
            _ => {}
        }
    }
}

impl Tracker for ScreamTracker {
    fn process_tick(
        &self,
        module: &Module,
        state: &mut PlayerState,
        ch: &mut ChannelState,
        cell: &Cell,
        tick: u32,
    ) -> FlowDelta {
        ch.tremor_mute = false;
        if tick == 0 {
            self.handle_trigger(module, ch, cell);
        }
        let flow = self.handle_effect(state, ch, cell, tick);
        if tick > 0 {
            apply_vibrato(ch, PERIOD_MIN, PERIOD_MAX);
            apply_tremolo(ch);
        }
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

        let freq = S3M_CLOCK / ch.period as f64;
        let step = freq / buf.sample_rate() as f64;
        let length = sample.frames() as f64;
        let loop_end = sample.loop_end as f64;
        let loop_length = sample.loop_length() as f64;
        let looped = sample.has_loop() && loop_length > 1.0;
        let volume = if ch.tremor_mute {
            0.0
        } else {
            ch.volume * global_volume
        };

        for i in 0..buf.frames() {
            if looped {
                if ch.sample_pos >= loop_end {
                    ch.sample_pos -= loop_length;
                }
            } else if ch.sample_pos >= length {
                ch.cut_sample();
                return;
            }

            let pos = ch.sample_pos as usize;
            if sample.stereo {
                // Stereo samples pan identity-wise: left data to the left
                // bus, right data to the right.
                let (l, r) = sample.stereo_frame(pos);
                buf.add(i, (l as f64 * volume) as i32, (r as f64 * volume) as i32);
            } else {
                let value = sample.frame(pos) as f64 * volume;
                let (left, right) = pan(buf.channels(), ch.panning, value);
                buf.add(i, left, right);
            }
            ch.sample_pos += step;
        }
    }
}
