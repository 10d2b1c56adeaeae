//! General conversion functions and utilities.

/// The smallest amplitude considered when converting to decibels.
///
/// Silence maps to `-240` dB instead of negative infinity.
pub const MIN_AMP: f64 = 1e-12;

/// Returns the raw amplitude from the given decibel value.
#[inline]
pub fn db_to_amp(db: f64) -> f64 {
    10.0f64.powf(0.05 * db)
}

/// Returns the decibel value from the raw amplitude.
#[inline]
pub fn amp_to_db(amp: f64) -> f64 {
    20.0 * amp.log10()
}

/// Returns the decibel value from the raw amplitude value.
///
/// If `amp < MIN_AMP`, then [`MIN_AMP`] is used instead.
#[inline]
pub fn amp_to_db_floored(amp: f64) -> f64 {
    amp_to_db(amp.max(MIN_AMP))
}

/// Copy a mono signal into every channel of an interleaved buffer.
pub fn interleave_mono(mono: &[f32], interleaved: &mut [f32], num_interleaved_channels: usize) {
    if num_interleaved_channels == 0 {
        return;
    }

    for (frame, s) in interleaved
        .chunks_exact_mut(num_interleaved_channels)
        .zip(mono.iter())
    {
        frame.fill(*s);
    }
}
