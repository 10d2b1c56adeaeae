use crate::SampleBuffer;

/// Parameters of the output test tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneConfig {
    /// Length of the tone in seconds.
    ///
    /// By default this is set to `2.0`.
    pub duration_secs: f64,
    /// Frequency of the tone in Hz.
    ///
    /// By default this is set to `1000.0`.
    pub freq_hz: f32,
    /// Peak amplitude of the tone in the range `[0.0, 1.0]`.
    ///
    /// By default this is set to `0.2`.
    pub amp: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            duration_secs: 2.0,
            freq_hz: 1000.0,
            amp: 0.2,
        }
    }
}

/// The longest test duration accepted, in seconds.
pub const MAX_DURATION_SECS: f64 = 3600.0;

/// A test duration outside of `(0, MAX_DURATION_SECS]`.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Invalid duration {0:?}s (expected a number of seconds in (0, 3600])")]
pub struct InvalidDuration(pub f64);

/// Returns `duration_secs` if it is a finite number of seconds in
/// `(0, MAX_DURATION_SECS]`.
pub fn check_duration(duration_secs: f64) -> Result<f64, InvalidDuration> {
    if duration_secs.is_finite() && duration_secs > 0.0 && duration_secs <= MAX_DURATION_SECS {
        Ok(duration_secs)
    } else {
        Err(InvalidDuration(duration_secs))
    }
}

/// The number of whole frames in `duration_secs` at `sample_rate`.
pub fn frames_for_duration(
    sample_rate: u32,
    duration_secs: f64,
) -> Result<usize, InvalidDuration> {
    let duration_secs = check_duration(duration_secs)?;
    let frames = (sample_rate as f64 * duration_secs).floor();

    if frames <= usize::MAX as f64 {
        Ok(frames as usize)
    } else {
        Err(InvalidDuration(duration_secs))
    }
}

/// A sine oscillator driven by a wrapping phasor.
#[derive(Debug, Clone)]
pub struct SineOsc {
    phasor: f64,
    phasor_inc: f64,
    gain: f32,
}

impl SineOsc {
    pub fn new(freq_hz: f32, sample_rate: u32, gain: f32) -> Self {
        Self {
            phasor: 0.0,
            phasor_inc: freq_hz as f64 / sample_rate.max(1) as f64,
            gain,
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let s = (self.phasor * std::f64::consts::TAU).sin() as f32 * self.gain;
        self.phasor = (self.phasor + self.phasor_inc).fract();
        s
    }
}

/// Generate the test tone with the given number of channels.
///
/// Every channel carries the same signal.
///
/// # Panics
///
/// Panics if `channels` is `0`.
pub fn generate_tone(
    sample_rate: u32,
    channels: u16,
    config: &ToneConfig,
) -> Result<SampleBuffer, InvalidDuration> {
    let frames = frames_for_duration(sample_rate, config.duration_secs)?;
    let gain = if config.amp.is_finite() {
        config.amp.clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(sine(frames, channels, sample_rate, config.freq_hz, gain))
}

/// `frames` frames of a sine starting at phase zero, on every channel.
///
/// # Panics
///
/// Panics if `channels` is `0`.
pub fn sine(
    frames: usize,
    channels: u16,
    sample_rate: u32,
    freq_hz: f32,
    gain: f32,
) -> SampleBuffer {
    let mut osc = SineOsc::new(freq_hz, sample_rate, gain);
    let mono: Vec<f32> = (0..frames).map(|_| osc.next_sample()).collect();

    SampleBuffer::from_mono(&mono, channels, sample_rate)
}
