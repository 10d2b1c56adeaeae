use clap::Parser;

use audioprobe_core::{tone, SortKey, ToneConfig};

fn parse_duration(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
    tone::check_duration(secs).map_err(|e| e.to_string())
}

/// List and test audio devices.
#[derive(Parser, Debug, Clone)]
#[command(name = "audioprobe")]
#[command(about = "List and test audio devices", long_about = None)]
pub struct Args {
    /// Output device list as JSON
    #[arg(long)]
    pub json: bool,

    /// Sort devices (index, name, in, out)
    #[arg(long, default_value = "index", value_name = "KEY")]
    pub sort: SortKey,

    /// Show default samplerate
    #[arg(long)]
    pub show_sr: bool,

    /// Play test tone to output device index
    #[arg(long, value_name = "INDEX")]
    pub test_output_index: Option<usize>,

    /// Record short sample from input device index
    #[arg(long, value_name = "INDEX")]
    pub test_input_index: Option<usize>,

    /// Play test tone to all output devices
    #[arg(long)]
    pub test_all_outputs: bool,

    /// Record short sample from all input devices
    #[arg(long)]
    pub test_all_inputs: bool,

    /// Duration in seconds for tests (at most 3600)
    #[arg(long, default_value_t = 2.0, value_name = "SECS", value_parser = parse_duration)]
    pub duration: f64,

    /// Frequency for output test tone (Hz)
    #[arg(long, default_value_t = 1000.0, value_name = "HZ")]
    pub freq: f32,

    /// Amplitude for output test tone (0.0-1.0)
    #[arg(long, default_value_t = 0.2, value_name = "AMP")]
    pub amp: f32,

    /// Only use devices of this audio host (e.g. alsa, jack, wasapi)
    #[arg(long, value_name = "NAME")]
    pub host: Option<String>,

    /// Use the built-in dummy devices instead of real audio hardware
    #[arg(long)]
    pub dummy: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn tone_config(&self) -> ToneConfig {
        ToneConfig {
            duration_secs: self.duration,
            freq_hz: self.freq,
            amp: self.amp,
        }
    }

    /// Returns `true` if any explicit test flag was given.
    pub fn has_test_flags(&self) -> bool {
        self.test_output_index.is_some()
            || self.test_input_index.is_some()
            || self.test_all_outputs
            || self.test_all_inputs
    }

    #[cfg(feature = "cpal")]
    pub fn backend_config(&self) -> audioprobe_cpal::CpalBackendConfig {
        audioprobe_cpal::CpalBackendConfig {
            host: self.host.clone(),
            ..Default::default()
        }
    }
}
