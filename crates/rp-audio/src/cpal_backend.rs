//! Speaker output through cpal.

use std::io;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use log::{info, warn};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use rp_engine::AudioSink;

use crate::AudioError;

/// Plays PCM on the default output device.
///
/// Samples go through a ring buffer drained by the cpal callback. `write`
/// spins when the buffer is full, which is what paces the whole render
/// loop to real time.
pub struct CpalSink {
    // Held for its Drop; the callback stops when the stream goes away.
    _stream: Stream,
    producer: HeapProd<i16>,
    sample_rate: u32,
}

impl CpalSink {
    /// Open the default device and start the output stream.
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        let config: StreamConfig = config.into();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels as usize;

        // Roughly 200 ms of buffer.
        let rb = HeapRb::<i16>::new(sample_rate as usize / 5 * channels);
        let (producer, mut consumer) = rb.split();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for slot in data.iter_mut() {
                        *slot = match consumer.try_pop() {
                            Some(sample) => sample as f32 / 32768.0,
                            None => 0.0,
                        };
                    }
                },
                |err| warn!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::Playback(e.to_string()))?;

        info!("opened audio device at {sample_rate} Hz");
        Ok(Self {
            _stream: stream,
            producer,
            sample_rate,
        })
    }
}

impl AudioSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, pcm: &[u8]) -> io::Result<()> {
        for bytes in pcm.chunks_exact(2) {
            let mut sample = i16::from_le_bytes([bytes[0], bytes[1]]);
            // Park until the callback has drained space for it.
            while let Err(rejected) = self.producer.try_push(sample) {
                sample = rejected;
                std::thread::yield_now();
            }
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
