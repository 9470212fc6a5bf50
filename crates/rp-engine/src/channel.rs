//! Per-channel playback state.

use rp_ir::{Module, ModuleKind, Sample};

/// Mixing and effect state for a single tracker channel.
///
/// Effect commands with "param 0 repeats last" semantics keep their memory
/// in the flat `last_*` fields; the access pattern is hot enough that a map
/// would be a poor fit.
#[derive(Clone, Debug)]
pub struct ChannelState {
    /// 1-based sample (PT/S3M) or instrument (XM) number; -1 = none.
    pub sample_index: i32,
    /// XM: keymap-resolved sample within the current instrument.
    pub sub_sample: u8,
    /// Read position in the sample, in frames.
    pub sample_pos: f64,
    /// Ping-pong loop direction.
    pub loop_forward: bool,

    /// Current period. Smaller is higher pitched.
    pub period: u16,
    /// Period of the last triggered note; arpeggio shifts from this base.
    pub note_period: u16,
    /// Last triggered note number (XM).
    pub note: u8,
    pub porta_target: u16,
    /// Tone portamento speed in period units per tick.
    pub porta_speed: u16,
    pub finetune: i8,
    pub glissando: bool,

    /// Channel volume, 0..=1.
    pub volume: f64,
    /// Stereo position, 0 = left, 1 = right.
    pub panning: f64,

    pub vibrato_speed: u8,
    pub vibrato_depth: u8,
    pub vibrato_wave: u8,
    pub vibrato_pos: u8,
    pub tremolo_speed: u8,
    pub tremolo_depth: u8,
    pub tremolo_wave: u8,
    pub tremolo_pos: u8,
    /// Tremor on/off phase lengths (stored as the raw nibbles; the effect
    /// plays for `on + 1` ticks and mutes for `off + 1`).
    pub tremor_on: u8,
    pub tremor_off: u8,
    pub tremor_counter: u8,
    pub tremor_mute: bool,

    // Effect memory registers.
    pub last_porta_up: u8,
    pub last_porta_down: u8,
    /// S3M shares one memory register between both portamento directions.
    pub last_porta: u8,
    pub last_vol_slide: u8,
    pub last_sample_offset: u16,

    // XM instrument machinery.
    pub volume_envelope_pos: u16,
    pub panning_envelope_pos: u16,
    /// Evaluated volume envelope, 0..=1 (1 when the envelope is disabled).
    pub env_volume: f64,
    /// Evaluated panning envelope; `None` when disabled.
    pub env_panning: Option<f64>,
    /// Key-off fade level: 65535 = full volume, 0 = silent.
    pub fadeout: u16,
    pub autovibrato_pos: u8,
    /// False once a key-off has been seen.
    pub sustained: bool,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            sample_index: -1,
            sub_sample: 0,
            sample_pos: 0.0,
            loop_forward: true,
            period: 0,
            note_period: 0,
            note: 0,
            porta_target: 0,
            porta_speed: 0,
            finetune: 0,
            glissando: false,
            volume: 1.0,
            panning: 0.5,
            vibrato_speed: 0,
            vibrato_depth: 0,
            vibrato_wave: 0,
            vibrato_pos: 0,
            tremolo_speed: 0,
            tremolo_depth: 0,
            tremolo_wave: 0,
            tremolo_pos: 0,
            tremor_on: 0,
            tremor_off: 0,
            tremor_counter: 0,
            tremor_mute: false,
            last_porta_up: 0,
            last_porta_down: 0,
            last_porta: 0,
            last_vol_slide: 0,
            last_sample_offset: 0,
            volume_envelope_pos: 0,
            panning_envelope_pos: 0,
            env_volume: 1.0,
            env_panning: None,
            fadeout: 65535,
            autovibrato_pos: 0,
            sustained: false,
        }
    }
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the period by `delta`, saturating into `[min, max]`. All period
    /// arithmetic goes through here so oscillator under/overflow can never
    /// wrap the integer.
    pub fn nudge_period(&mut self, delta: f64, min: u16, max: u16) {
        let p = (self.period as f64 + delta).clamp(min as f64, max as f64);
        self.period = p as u16;
    }

    /// Move the volume by `delta`, clamped to `[0, 1]`.
    pub fn nudge_volume(&mut self, delta: f64) {
        self.volume = (self.volume + delta).clamp(0.0, 1.0);
    }

    /// Move the panning by `delta`, clamped to `[0, 1]`.
    pub fn nudge_panning(&mut self, delta: f64) {
        self.panning = (self.panning + delta).clamp(0.0, 1.0);
    }

    /// Drop the sample; the channel goes silent until the next trigger.
    pub fn cut_sample(&mut self) {
        self.sample_index = -1;
        self.sample_pos = 0.0;
    }
}

/// Resolve the channel's current sample against the module banks.
///
/// XM indexes through the instrument's keymap-selected sample; the other
/// formats index the module-level bank directly.
pub fn resolve_sample<'a>(module: &'a Module, ch: &ChannelState) -> Option<&'a Sample> {
    if ch.sample_index <= 0 {
        return None;
    }
    let idx = ch.sample_index as usize - 1;
    match module.kind {
        ModuleKind::FastTracker2 => module
            .instruments
            .get(idx)?
            .samples
            .get(ch.sub_sample as usize),
        _ => module.samples.get(idx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_ir::{Instrument, Sample};

    #[test]
    fn default_state_is_silent_center() {
        let ch = ChannelState::new();
        assert_eq!(ch.sample_index, -1);
        assert_eq!(ch.volume, 1.0);
        assert_eq!(ch.panning, 0.5);
        assert!(ch.loop_forward);
        assert_eq!(ch.fadeout, 65535);
    }

    #[test]
    fn nudge_period_saturates_at_bounds() {
        let mut ch = ChannelState::new();
        ch.period = 120;
        ch.nudge_period(-50.0, 113, 856);
        assert_eq!(ch.period, 113);
        ch.period = 850;
        ch.nudge_period(50.0, 113, 856);
        assert_eq!(ch.period, 856);
    }

    #[test]
    fn nudge_volume_clamps_unit_range() {
        let mut ch = ChannelState::new();
        ch.volume = 0.9;
        ch.nudge_volume(0.5);
        assert_eq!(ch.volume, 1.0);
        ch.nudge_volume(-2.0);
        assert_eq!(ch.volume, 0.0);
    }

    #[test]
    fn resolve_sample_indexes_module_bank() {
        let mut module = Module::new("t", ModuleKind::ProTracker, 1);
        module.samples.push(Sample::new("one"));
        let mut ch = ChannelState::new();
        assert!(resolve_sample(&module, &ch).is_none());
        ch.sample_index = 1;
        assert!(resolve_sample(&module, &ch).is_some());
        ch.sample_index = 2;
        assert!(resolve_sample(&module, &ch).is_none());
    }

    #[test]
    fn resolve_sample_goes_through_xm_instrument() {
        let mut module = Module::new("t", ModuleKind::FastTracker2, 1);
        module
            .instruments
            .push(Instrument::with_sample("lead", Sample::new("a")));
        let mut ch = ChannelState::new();
        ch.sample_index = 1;
        ch.sub_sample = 0;
        assert!(resolve_sample(&module, &ch).is_some());
        ch.sub_sample = 3;
        assert!(resolve_sample(&module, &ch).is_none());
    }
}
