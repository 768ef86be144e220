//! Stereo PCM frame and the sinks that receive rendered buffers.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Scale a mixed 32-bit sum by `level`, clamping to 16 bits.
    pub fn from_mix(left: i32, right: i32, level: f32) -> Self {
        let scale = |v: i32| (v as f32 * level).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        Self { left: scale(left), right: scale(right) }
    }

    /// Interleaved little-endian bytes: left then right.
    pub fn to_le_bytes(self) -> [u8; 4] {
        let [l0, l1] = self.left.to_le_bytes();
        let [r0, r1] = self.right.to_le_bytes();
        [l0, l1, r0, r1]
    }

    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self {
            left: i16::from_le_bytes([bytes[0], bytes[1]]),
            right: i16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    /// Decode a buffer of interleaved little-endian frames. A trailing
    /// partial frame is ignored.
    pub fn iter_le_bytes(pcm: &[u8]) -> impl Iterator<Item = Frame> + '_ {
        pcm.chunks_exact(4)
            .map(|c| Frame::from_le_bytes([c[0], c[1], c[2], c[3]]))
    }
}

/// Receiver for rendered PCM: interleaved 16-bit little-endian stereo.
pub trait PcmSink {
    fn write_pcm(&mut self, pcm: &[u8]);
}

/// Sink that drops everything written to it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl PcmSink for NullSink {
    fn write_pcm(&mut self, _pcm: &[u8]) {}
}

impl PcmSink for alloc::vec::Vec<u8> {
    fn write_pcm(&mut self, pcm: &[u8]) {
        self.extend_from_slice(pcm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_clamps_to_16_bits() {
        let f = Frame::from_mix(100_000, -100_000, 1.0);
        assert_eq!(f, Frame { left: i16::MAX, right: i16::MIN });
    }

    #[test]
    fn mix_truncates_toward_zero() {
        let f = Frame::from_mix(3, -3, 0.5);
        assert_eq!(f, Frame { left: 1, right: -1 });
    }

    #[test]
    fn bytes_are_little_endian_left_first() {
        let f = Frame { left: 0x0102, right: -2 };
        assert_eq!(f.to_le_bytes(), [0x02, 0x01, 0xFE, 0xFF]);
        assert_eq!(Frame::from_le_bytes(f.to_le_bytes()), f);
    }

    #[test]
    fn byte_iterator_skips_partial_frame() {
        let frames: Vec<_> = Frame::iter_le_bytes(&[1, 0, 2, 0, 9]).collect();
        assert_eq!(frames, vec![Frame { left: 1, right: 2 }]);
    }

    #[test]
    fn vec_sink_appends() {
        let mut sink: Vec<u8> = Vec::new();
        sink.write_pcm(&[1, 2]);
        sink.write_pcm(&[3]);
        assert_eq!(sink, vec![1, 2, 3]);
    }
}
