//! The audio sink boundary and playback errors.

use std::io;

/// Destination for rendered PCM.
///
/// The engine emits interleaved little-endian signed 16-bit samples at the
/// sink's declared sample rate. `write` is the only point where the engine
/// may block; a real-time sink throttles playback through it.
pub trait AudioSink {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Write a full buffer of PCM bytes. An error aborts playback.
    fn write(&mut self, pcm: &[u8]) -> io::Result<()>;

    /// Flush and release the sink.
    fn close(&mut self) -> io::Result<()>;
}

/// Fatal playback errors. Invalid module references are skipped rather than
/// raised, and cancellation exits cleanly with `Ok`.
#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("sink write failed: {0}")]
    Sink(#[from] io::Error),
}
