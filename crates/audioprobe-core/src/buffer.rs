use std::time::Duration;

/// A block of interleaved `f32` samples.
///
/// `samples.len()` is always a multiple of `channels`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Construct a buffer from interleaved samples.
    ///
    /// Trailing samples that do not make up a whole frame are dropped.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is `0`.
    pub fn new(mut samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        assert_ne!(channels, 0);

        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);

        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Construct a buffer by writing a mono signal into every channel.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is `0`.
    pub fn from_mono(mono: &[f32], channels: u16, sample_rate: u32) -> Self {
        assert_ne!(channels, 0);

        let mut samples = vec![0.0; mono.len() * channels as usize];
        crate::util::interleave_mono(mono, &mut samples, channels as usize);

        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }

        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Iterate over the samples of a single channel.
    ///
    /// `channel` must be less than [`SampleBuffer::channels`].
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        debug_assert!(channel < self.channels as usize);

        self.samples
            .iter()
            .skip(channel)
            .step_by(self.channels as usize)
            .copied()
    }

    /// Returns a copy of this buffer with every sample multiplied by `gain`.
    pub fn scaled(&self, gain: f32) -> Self {
        Self {
            samples: self.samples.iter().map(|s| s * gain).collect(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }
}
