//! Tick accumulation, panning and the PCM bridge.

/// Integer accumulator for one tick of audio, interleaved per output channel.
///
/// Channels sum into it without clipping; the clip to 16-bit happens once,
/// when the row is converted to PCM bytes.
pub struct TickBuffer {
    samples: Vec<i32>,
    channels: usize,
    sample_rate: u32,
}

impl TickBuffer {
    pub fn new(frames: usize, channels: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![0; frames * channels],
            channels,
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Accumulate one frame. The right value is dropped on mono output.
    pub fn add(&mut self, frame: usize, left: i32, right: i32) {
        let offset = frame * self.channels;
        self.samples[offset] += left;
        if self.channels > 1 {
            self.samples[offset + 1] += right;
        }
    }

    pub fn into_samples(self) -> Vec<i32> {
        self.samples
    }
}

/// Split a sample value across the stereo field.
///
/// Mono output receives the unpanned value on its single channel.
pub fn pan(output_channels: usize, panning: f64, value: f64) -> (i32, i32) {
    if output_channels == 1 {
        (value as i32, 0)
    } else {
        (
            (value * (1.0 - panning)) as i32,
            (value * panning) as i32,
        )
    }
}

/// Clip accumulated samples to signed 16-bit and serialize little-endian.
pub fn to_pcm_bytes(samples: &[i32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clipped = sample.clamp(-32768, 32767) as i16;
        bytes.extend_from_slice(&clipped.to_le_bytes());
    }
    bytes
}
