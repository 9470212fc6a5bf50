//! Audio sinks for the replayer engine.
//!
//! Three [`rp_engine::AudioSink`] implementations: [`WavSink`] writes a
//! RIFF file, [`StreamSink`] forwards raw PCM to any writer, and
//! [`CpalSink`] plays through the default output device.

mod cpal_backend;
mod stream;
mod wav;

pub use cpal_backend::CpalSink;
pub use stream::StreamSink;
pub use wav::WavSink;

/// Errors from audio device setup and playback.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("device init error: {0}")]
    DeviceInit(String),
    #[error("stream create error: {0}")]
    StreamCreate(String),
    #[error("playback error: {0}")]
    Playback(String),
}
