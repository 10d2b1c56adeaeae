//! The tone and record tests run against a single device or a whole device
//! class.
//!
//! Each handler writes its progress to `out` and returns whether the test
//! succeeded. Backend failures are reported as messages, never propagated.

use std::io::{self, Write};

use crate::{
    backend::{AudioBackend, RecordRequest},
    level,
    tone::{frames_for_duration, generate_tone, ToneConfig},
    DeviceInfo, DeviceList,
};

/// The gain applied to a recording before it is played back.
pub const PLAYBACK_GAIN: f32 = 0.8;

/// The maximum number of channels opened by a test.
pub const MAX_TEST_CHANNELS: u16 = 2;

/// An error that occured while preparing a test.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Device index {0} out of range")]
    DeviceNotFound(usize),
    #[error("No default output device")]
    NoDefaultOutput,
    #[error("{0}")]
    Backend(Box<dyn std::error::Error>),
}

impl ProbeError {
    fn backend<E: std::error::Error + 'static>(e: E) -> Self {
        Self::Backend(Box::new(e))
    }
}

/// Enumerate the devices and look up `index`.
///
/// The list is returned with the device so the caller can find the default
/// output without enumerating again.
fn query_device<B: AudioBackend>(
    backend: &mut B,
    index: usize,
) -> Result<(DeviceList, DeviceInfo), ProbeError> {
    let list = backend.enumerate().map_err(ProbeError::backend)?;
    let device = list
        .get(index)
        .cloned()
        .ok_or(ProbeError::DeviceNotFound(index))?;

    Ok((list, device))
}

/// Play the test tone on the output device with the given index.
pub fn test_output_device<B: AudioBackend, W: Write>(
    backend: &mut B,
    index: usize,
    tone: &ToneConfig,
    out: &mut W,
) -> io::Result<bool> {
    let device = match query_device(backend, index) {
        Ok((_, d)) => d,
        Err(e) => {
            writeln!(out, "[out {}] cannot query device: {}", index, e)?;
            return Ok(false);
        }
    };

    if !device.has_outputs() {
        writeln!(out, "[out {}] no output channels, skipping", index)?;
        return Ok(false);
    }

    let sample_rate = device.sample_rate_or_fallback();
    let channels = device.max_output_channels.min(MAX_TEST_CHANNELS);
    let clip = match generate_tone(sample_rate, channels, tone) {
        Ok(clip) => clip,
        Err(e) => {
            writeln!(out, "[out {}] cannot generate tone: {}", index, e)?;
            return Ok(false);
        }
    };

    writeln!(
        out,
        "[out {}] playing {:?}Hz tone for {:?}s (sr={})",
        index, tone.freq_hz, tone.duration_secs, sample_rate
    )?;
    out.flush()?;

    match backend.play(&device, &clip) {
        Ok(()) => {
            writeln!(out, "[out {}] finished", index)?;
            Ok(true)
        }
        Err(e) => {
            log::debug!("Playback on device {} failed: {:?}", index, e);
            writeln!(out, "[out {}] playback failed: {}", index, e)?;
            Ok(false)
        }
    }
}

/// Record a short sample from the input device with the given index, print
/// its levels, and play it back on the default output device.
///
/// A failed playback is reported but does not fail the test.
pub fn test_input_device<B: AudioBackend, W: Write>(
    backend: &mut B,
    index: usize,
    duration_secs: f64,
    out: &mut W,
) -> io::Result<bool> {
    let (list, device) = match query_device(backend, index) {
        Ok(found) => found,
        Err(e) => {
            writeln!(out, "[in  {}] cannot query device: {}", index, e)?;
            return Ok(false);
        }
    };

    if !device.has_inputs() {
        writeln!(out, "[in  {}] no input channels, skipping", index)?;
        return Ok(false);
    }

    let sample_rate = device.sample_rate_or_fallback();
    let frames = match frames_for_duration(sample_rate, duration_secs) {
        Ok(frames) => frames,
        Err(e) => {
            writeln!(out, "[in  {}] recording failed: {}", index, e)?;
            return Ok(false);
        }
    };
    let request = RecordRequest {
        sample_rate,
        channels: device.max_input_channels.min(MAX_TEST_CHANNELS),
        frames,
    };

    writeln!(
        out,
        "[in  {}] recording {:?}s (sr={}, ch={}) ...",
        index, duration_secs, request.sample_rate, request.channels
    )?;
    out.flush()?;

    let recording = match backend.record(&device, request) {
        Ok(r) => r,
        Err(e) => {
            writeln!(out, "[in  {}] recording failed: {}", index, e)?;
            return Ok(false);
        }
    };

    let report = level::analyze(&recording);
    for (ch, (rms, db)) in report.rms.iter().zip(report.rms_dbfs.iter()).enumerate() {
        writeln!(out, "  channel {}: RMS={:.6}, dBFS={:.1} dB", ch + 1, rms, db)?;
    }
    writeln!(out, "  peak amplitude: {:.6}", report.peak)?;

    let playback = recording.scaled(PLAYBACK_GAIN);
    drop(recording);

    let Some(default_out) = list.default_output() else {
        writeln!(
            out,
            "[in  {}] playback failed: {}",
            index,
            ProbeError::NoDefaultOutput
        )?;
        return Ok(true);
    };

    writeln!(
        out,
        "[in  {}] playing back recording on output device {} ...",
        index, default_out.index
    )?;
    out.flush()?;

    match backend.play(default_out, &playback) {
        Ok(()) => writeln!(out, "[in  {}] playback finished", index)?,
        Err(e) => writeln!(out, "[in  {}] playback failed: {}", index, e)?,
    }

    Ok(true)
}

/// Run [`test_output_device`] on every device with output channels.
///
/// Returns the number of devices that passed.
pub fn test_all_outputs<B: AudioBackend, W: Write>(
    backend: &mut B,
    tone: &ToneConfig,
    out: &mut W,
) -> io::Result<usize> {
    let indices: Vec<usize> = match backend.enumerate() {
        Ok(list) => list.outputs().map(|d| d.index).collect(),
        Err(e) => {
            writeln!(out, "Failed to query audio devices: {}", e)?;
            return Ok(0);
        }
    };

    let mut passed = 0;
    for i in indices {
        if test_output_device(backend, i, tone, out)? {
            passed += 1;
        }
    }

    Ok(passed)
}

/// Run [`test_input_device`] on every device with input channels.
///
/// Returns the number of devices that passed.
pub fn test_all_inputs<B: AudioBackend, W: Write>(
    backend: &mut B,
    duration_secs: f64,
    out: &mut W,
) -> io::Result<usize> {
    let indices: Vec<usize> = match backend.enumerate() {
        Ok(list) => list.inputs().map(|d| d.index).collect(),
        Err(e) => {
            writeln!(out, "Failed to query audio devices: {}", e)?;
            return Ok(0);
        }
    };

    let mut passed = 0;
    for i in indices {
        if test_input_device(backend, i, duration_secs, out)? {
            passed += 1;
        }
    }

    Ok(passed)
}
