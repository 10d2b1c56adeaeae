use crate::{util, SampleBuffer};

/// A loudness summary of a captured buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    /// Root-mean-square amplitude of each channel.
    pub rms: Vec<f64>,
    /// `rms` in dBFS, floored at [`util::MIN_AMP`].
    pub rms_dbfs: Vec<f64>,
    /// The largest absolute sample value across all channels.
    pub peak: f32,
}

impl LevelReport {
    pub fn num_channels(&self) -> usize {
        self.rms.len()
    }
}

/// Compute per-channel RMS and the overall peak of `buffer`.
pub fn analyze(buffer: &SampleBuffer) -> LevelReport {
    let frames = buffer.frames();
    let channels = buffer.channels() as usize;

    let rms: Vec<f64> = (0..channels)
        .map(|ch| {
            if frames == 0 {
                return 0.0;
            }

            let sum_sq: f64 = buffer
                .channel(ch)
                .map(|s| {
                    let s = s as f64;
                    s * s
                })
                .sum();

            (sum_sq / frames as f64).sqrt()
        })
        .collect();

    let rms_dbfs = rms.iter().map(|&r| util::amp_to_db_floored(r)).collect();

    let peak = buffer
        .samples()
        .iter()
        .fold(0.0f32, |peak, s| peak.max(s.abs()));

    LevelReport {
        rms,
        rms_dbfs,
        peak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::{generate_tone, ToneConfig};

    #[test]
    fn constant_signal() {
        let samples = vec![0.5, -0.25, -0.5, 0.25, 0.5, -0.25, -0.5, 0.25];
        let buf = SampleBuffer::new(samples, 2, 48_000);
        let report = analyze(&buf);

        assert_eq!(report.num_channels(), 2);
        assert!((report.rms[0] - 0.5).abs() < 1e-12);
        assert!((report.rms[1] - 0.25).abs() < 1e-12);
        assert!((report.rms_dbfs[0] - -6.0206).abs() < 1e-4);
        assert!((report.rms_dbfs[1] - -12.0412).abs() < 1e-4);
        assert_eq!(report.peak, 0.5);
    }

    #[test]
    fn known_mixed_values() {
        // sqrt((0.1² + 0.2² + 0.3² + 0.4²) / 4) = sqrt(0.075)
        let buf = SampleBuffer::new(vec![0.1, -0.2, 0.3, -0.4], 1, 4);
        let report = analyze(&buf);

        assert!((report.rms[0] - 0.075f64.sqrt()).abs() < 1e-7);
        assert_eq!(report.peak, 0.4);
    }

    #[test]
    fn sine_rms_is_amp_over_sqrt2() {
        let tone = generate_tone(
            48_000,
            1,
            &ToneConfig {
                duration_secs: 1.0,
                freq_hz: 1000.0,
                amp: 0.8,
            },
        )
        .unwrap();
        let report = analyze(&tone);

        assert!((report.rms[0] - 0.8 / 2f64.sqrt()).abs() < 1e-4);
        assert!((report.peak - 0.8).abs() < 1e-4);
    }

    #[test]
    fn silence_and_empty() {
        let report = analyze(&SampleBuffer::new(vec![0.0; 64], 2, 48_000));
        assert_eq!(report.rms, vec![0.0, 0.0]);
        assert!(report.rms_dbfs.iter().all(|db| (db - -240.0).abs() < 1e-9));
        assert_eq!(report.peak, 0.0);

        let report = analyze(&SampleBuffer::new(Vec::new(), 1, 48_000));
        assert_eq!(report.rms, vec![0.0]);
        assert!((report.rms_dbfs[0] - -240.0).abs() < 1e-9);
        assert_eq!(report.peak, 0.0);
    }
}
