//! Linear-interpolation rate conversion from the engine rate to the device rate.

use dseq_engine::Frame;

/// Converts a stream of source frames to another sample rate.
///
/// Holds the two source frames around the current read position and blends
/// them by the fractional part of the position.
#[derive(Clone, Debug)]
pub struct Resampler {
    step: f64,
    pos: f64,
    prev: Frame,
    next: Frame,
}

impl Resampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        let step = if target_rate == 0 { 1.0 } else { source_rate as f64 / target_rate as f64 };
        // Start with both frames unread so the first call pulls two source frames.
        Self { step, pos: 2.0, prev: Frame::silence(), next: Frame::silence() }
    }

    /// Source frames consumed per output frame.
    pub fn ratio(&self) -> f64 {
        self.step
    }

    /// Produce one output frame, pulling source frames from `pull` as needed.
    /// `pull` returning `None` (underrun) is treated as silence.
    pub fn next_frame(&mut self, mut pull: impl FnMut() -> Option<Frame>) -> Frame {
        while self.pos >= 1.0 {
            self.prev = self.next;
            self.next = pull().unwrap_or_default();
            self.pos -= 1.0;
        }
        let t = self.pos as f32;
        let lerp = |a: i16, b: i16| (a as f32 + (b as f32 - a as f32) * t) as i16;
        let out = Frame {
            left: lerp(self.prev.left, self.next.left),
            right: lerp(self.prev.right, self.next.right),
        };
        self.pos += self.step;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(values: &[i16]) -> impl FnMut() -> Option<Frame> + '_ {
        let mut it = values.iter();
        move || it.next().map(|&v| Frame { left: v, right: -v })
    }

    #[test]
    fn equal_rates_pass_frames_through() {
        let data = [10, 20, 30, 40];
        let mut pull = source(&data);
        let mut r = Resampler::new(48_000, 48_000);
        let out: Vec<i16> = (0..3).map(|_| r.next_frame(&mut pull).left).collect();
        assert_eq!(out, vec![10, 20, 30]);
    }

    #[test]
    fn upsampling_interpolates_between_frames() {
        let data = [0, 100, 200];
        let mut pull = source(&data);
        let mut r = Resampler::new(24_000, 48_000);
        let out: Vec<Frame> = (0..4).map(|_| r.next_frame(&mut pull)).collect();
        assert_eq!(out.iter().map(|f| f.left).collect::<Vec<_>>(), vec![0, 50, 100, 150]);
        assert_eq!(out[1].right, -50);
    }

    #[test]
    fn downsampling_skips_frames() {
        let data = [0, 1, 2, 3, 4, 5, 6, 7];
        let mut pull = source(&data);
        let mut r = Resampler::new(96_000, 48_000);
        let out: Vec<i16> = (0..3).map(|_| r.next_frame(&mut pull).left).collect();
        assert_eq!(out, vec![0, 2, 4]);
    }

    #[test]
    fn underrun_fades_to_silence() {
        let data = [1000];
        let mut pull = source(&data);
        let mut r = Resampler::new(48_000, 48_000);
        assert_eq!(r.next_frame(&mut pull).left, 1000);
        assert_eq!(r.next_frame(&mut pull), Frame::silence());
    }

    #[test]
    fn engine_rate_to_common_device_rate() {
        let r = Resampler::new(65_456, 48_000);
        assert!((r.ratio() - 65_456.0 / 48_000.0).abs() < 1e-12);
    }
}
