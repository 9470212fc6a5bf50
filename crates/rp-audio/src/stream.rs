//! Raw PCM pass-through sink.

use std::io::{self, Write};

use rp_engine::AudioSink;

/// Forwards interleaved 16-bit little-endian PCM to any writer, headerless.
/// Useful for piping into other tools or dumping raw captures.
pub struct StreamSink<W: Write> {
    writer: W,
    sample_rate: u32,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W, sample_rate: u32) -> Self {
        Self { writer, sample_rate }
    }

    /// Give the wrapped writer back (e.g. to inspect a buffer).
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> AudioSink for StreamSink<W> {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, pcm: &[u8]) -> io::Result<()> {
        self.writer.write_all(pcm)
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
