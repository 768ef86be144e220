//! WAV encoding for 16-bit stereo PCM.

use dseq_engine::{Frame, PcmSink};
use std::io::{self, Seek, SeekFrom, Write};

const NUM_CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = NUM_CHANNELS * (BITS_PER_SAMPLE / 8);
const HEADER_LEN: u64 = 44;

pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> io::Result<()> {
    let data_size = frames.len() as u32 * BLOCK_ALIGN as u32;

    write_header(w, sample_rate, data_size)?;
    for frame in frames {
        w.write_all(&frame.to_le_bytes())?;
    }
    Ok(())
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN as usize + frames.len() * BLOCK_ALIGN as usize);
    // Writing into a Vec cannot fail.
    let _ = write_wav(&mut buf, frames, sample_rate);
    buf
}

fn write_header(w: &mut impl Write, sample_rate: u32, data_size: u32) -> io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36u32.saturating_add(data_size)).to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&NUM_CHANNELS.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * BLOCK_ALIGN as u32).to_le_bytes())?;
    w.write_all(&BLOCK_ALIGN.to_le_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())
}

/// Streaming WAV writer used as a recording sink.
///
/// The header is written up front with empty sizes and patched by
/// [`finish`](Self::finish). The first I/O error stops further writes and is
/// returned from `finish`.
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    sample_rate: u32,
    data_size: u32,
    error: Option<io::Error>,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(mut inner: W, sample_rate: u32) -> io::Result<Self> {
        write_header(&mut inner, sample_rate, 0)?;
        Ok(Self { inner, sample_rate, data_size: 0, error: None })
    }

    /// Bytes of PCM data written so far.
    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    /// Patch the header sizes and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.inner.flush()?;
        self.inner.seek(SeekFrom::Start(4))?;
        self.inner.write_all(&(36u32.saturating_add(self.data_size)).to_le_bytes())?;
        self.inner.seek(SeekFrom::Start(40))?;
        self.inner.write_all(&self.data_size.to_le_bytes())?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl<W: Write + Seek> PcmSink for WavWriter<W> {
    fn write_pcm(&mut self, pcm: &[u8]) {
        if self.error.is_some() {
            return;
        }
        let pcm = &pcm[..pcm.len() - pcm.len() % BLOCK_ALIGN as usize];
        match self.inner.write_all(pcm) {
            Ok(()) => self.data_size = self.data_size.saturating_add(pcm.len() as u32),
            Err(err) => self.error = Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn header_describes_16_bit_stereo() {
        let wav = frames_to_wav(&[Frame { left: 1, right: -1 }; 3], 65_456);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(u32_at(&wav, 24), 65_456);
        assert_eq!(u32_at(&wav, 28), 65_456 * 4);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 12);
        assert_eq!(u32_at(&wav, 4), 36 + 12);
        assert_eq!(wav.len(), 44 + 12);
        assert_eq!(&wav[44..48], &[1, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn streaming_writer_patches_sizes() {
        let mut w = WavWriter::new(Cursor::new(Vec::new()), 48_000).unwrap();
        w.write_pcm(&[1, 0, 2, 0]);
        w.write_pcm(&[3, 0, 4, 0, 5, 0, 6, 0]);
        assert_eq!(w.data_size(), 12);
        let bytes = w.finish().unwrap().into_inner();
        assert_eq!(u32_at(&bytes, 40), 12);
        assert_eq!(u32_at(&bytes, 4), 48);
        assert_eq!(bytes.len(), 56);

        let frames = [
            Frame { left: 1, right: 2 },
            Frame { left: 3, right: 4 },
            Frame { left: 5, right: 6 },
        ];
        assert_eq!(bytes, frames_to_wav(&frames, 48_000));
    }

    #[test]
    fn partial_frames_are_dropped() {
        let mut w = WavWriter::new(Cursor::new(Vec::new()), 48_000).unwrap();
        w.write_pcm(&[1, 0, 2, 0, 9]);
        assert_eq!(w.data_size(), 4);
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FailingWriter {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn header_failure_is_reported() {
        assert!(WavWriter::new(FailingWriter, 48_000).is_err());
    }
}
