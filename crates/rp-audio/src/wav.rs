//! Streaming WAV sink.

use std::io::{self, Seek, SeekFrom, Write};

use log::debug;
use rp_engine::AudioSink;

const HEADER_LEN: u32 = 44;

/// Writes a RIFF/WAVE file around the PCM stream.
///
/// The header goes out before the first data write with placeholder sizes;
/// `close` seeks back and patches the RIFF chunk size (offset 4) and the
/// data chunk size (offset 40) once the stream length is known.
pub struct WavSink<W: Write + Seek> {
    writer: W,
    sample_rate: u32,
    channels: u16,
    bytes_per_sample: u16,
    data_size: u32,
    header_written: bool,
}

impl<W: Write + Seek> WavSink<W> {
    pub fn new(writer: W, sample_rate: u32, channels: u16, bytes_per_sample: u16) -> Self {
        Self {
            writer,
            sample_rate,
            channels,
            bytes_per_sample,
            data_size: 0,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// PCM bytes written so far.
    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    fn write_header(&mut self) -> io::Result<()> {
        let block_align = self.channels * self.bytes_per_sample;
        let byte_rate = self.sample_rate * block_align as u32;

        self.writer.write_all(b"RIFF")?;
        self.writer.write_all(&0u32.to_le_bytes())?;
        self.writer.write_all(b"WAVE")?;

        self.writer.write_all(b"fmt ")?;
        self.writer.write_all(&16u32.to_le_bytes())?;
        self.writer.write_all(&1u16.to_le_bytes())?;
        self.writer.write_all(&self.channels.to_le_bytes())?;
        self.writer.write_all(&self.sample_rate.to_le_bytes())?;
        self.writer.write_all(&byte_rate.to_le_bytes())?;
        self.writer.write_all(&block_align.to_le_bytes())?;
        self.writer
            .write_all(&(self.bytes_per_sample * 8).to_le_bytes())?;

        self.writer.write_all(b"data")?;
        self.writer.write_all(&0u32.to_le_bytes())?;
        Ok(())
    }
}

impl<W: Write + Seek> AudioSink for WavSink<W> {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, pcm: &[u8]) -> io::Result<()> {
        if !self.header_written {
            self.write_header()?;
            self.header_written = true;
        }
        self.writer.write_all(pcm)?;
        self.data_size += pcm.len() as u32;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if !self.header_written {
            self.write_header()?;
            self.header_written = true;
        }
        debug!("closing wav sink with {} data bytes", self.data_size);

        self.writer.seek(SeekFrom::Start(4))?;
        self.writer
            .write_all(&(HEADER_LEN - 8 + self.data_size).to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(40))?;
        self.writer.write_all(&self.data_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()
    }
}
