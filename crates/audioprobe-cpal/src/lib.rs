use std::{
    fmt::Debug,
    time::{Duration, Instant},
};

use audioprobe_core::{AudioBackend, DeviceInfo, DeviceList, RecordRequest, SampleBuffer};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SizedSample,
};

const BUILD_STREAM_TIMEOUT: Duration = Duration::from_secs(5);
const MSG_CHANNEL_CAPACITY: usize = 4;

/// Configuration of a [`CpalBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpalBackendConfig {
    /// Only enumerate devices of the host with this name (case-insensitive).
    ///
    /// By default this is set to `None` (all available hosts).
    pub host: Option<String>,
    /// How often a running stream is polled for progress and errors.
    ///
    /// By default this is set to 15ms.
    pub poll_interval: Duration,
    /// How long a stream may run past the length of its clip before it is
    /// considered stalled.
    ///
    /// By default this is set to 5 seconds.
    pub stall_timeout: Duration,
}

impl Default for CpalBackendConfig {
    fn default() -> Self {
        Self {
            host: None,
            poll_interval: Duration::from_millis(15),
            stall_timeout: Duration::from_secs(5),
        }
    }
}

/// The names of all hosts compiled into this build of cpal.
pub fn available_host_names() -> Vec<&'static str> {
    cpal::available_hosts()
        .into_iter()
        .map(|id| id.name())
        .collect()
}

fn host_matches(filter: Option<&str>, host_name: &str) -> bool {
    match filter {
        Some(filter) => host_name.eq_ignore_ascii_case(filter.trim()),
        None => true,
    }
}

fn max_channels(channels: impl Iterator<Item = u16>) -> u16 {
    channels.max().unwrap_or(0)
}

/// Whether a stream error ends the stream.
///
/// Backend specific errors such as buffer under/overruns are only logged.
fn is_fatal(e: &cpal::StreamError) -> bool {
    matches!(e, cpal::StreamError::DeviceNotAvailable)
}

/// How long the device needs to play out the last block handed to it.
///
/// `latency` is the time between the callback and the playback of its
/// block, when the host reports it.
fn drain_tail(
    latency: Option<Duration>,
    block_len: usize,
    channels: u16,
    sample_rate: u32,
) -> Duration {
    let frames = (block_len / channels.max(1) as usize) as u64;
    let block = Duration::from_nanos(frames * 1_000_000_000 / sample_rate.max(1) as u64);

    latency.unwrap_or(Duration::ZERO) + block
}

/// An [`AudioBackend`] on top of cpal.
///
/// Devices are addressed by their index in the most recent enumeration.
pub struct CpalBackend {
    config: CpalBackendConfig,
    devices: Vec<cpal::Device>,
}

impl CpalBackend {
    pub fn new(config: CpalBackendConfig) -> Self {
        Self {
            config,
            devices: Vec::new(),
        }
    }

    pub fn config(&self) -> &CpalBackendConfig {
        &self.config
    }

    fn hosts(&self) -> Result<Vec<cpal::Host>, CpalBackendError> {
        let filter = self.config.host.as_deref();

        let ids: Vec<cpal::HostId> = cpal::available_hosts()
            .into_iter()
            .filter(|id| host_matches(filter, id.name()))
            .collect();

        if let Some(name) = filter {
            if ids.is_empty() {
                return Err(CpalBackendError::UnknownHost {
                    name: name.to_string(),
                    available: available_host_names().join(", "),
                });
            }
        }

        let mut hosts = Vec::with_capacity(ids.len());
        for id in ids {
            match cpal::host_from_id(id) {
                Ok(host) => hosts.push(host),
                Err(e) => {
                    if filter.is_some() {
                        return Err(e.into());
                    }
                    log::warn!("Audio host {} is unavailable: {}", id.name(), e);
                }
            }
        }

        Ok(hosts)
    }

    fn device(&mut self, info: &DeviceInfo) -> Result<cpal::Device, CpalBackendError> {
        if info.index >= self.devices.len() {
            self.enumerate()?;
        }

        let Some(device) = self.devices.get(info.index) else {
            return Err(CpalBackendError::DeviceNotFound(
                info.display_name().to_string(),
            ));
        };

        if let Some(expected) = &info.name {
            match device.name() {
                Ok(name) if &name == expected => {}
                _ => {
                    log::warn!(
                        "Audio device at index {} is no longer \"{}\"",
                        info.index,
                        expected
                    );
                    return Err(CpalBackendError::DeviceNotFound(expected.clone()));
                }
            }
        }

        Ok(device.clone())
    }

    fn describe(
        device: &cpal::Device,
        index: usize,
        host_name: &str,
        default_in_name: Option<&String>,
        default_out_name: Option<&String>,
    ) -> DeviceInfo {
        let name = match device.name() {
            Ok(n) => Some(n),
            Err(e) => {
                log::warn!("Failed to get name of audio device {}: {}", index, e);
                None
            }
        };

        let max_input_channels = match device.supported_input_configs() {
            Ok(configs) => max_channels(configs.map(|c| c.channels())),
            Err(e) => {
                log::debug!("No input configs for audio device {}: {}", index, e);
                0
            }
        };
        let max_output_channels = match device.supported_output_configs() {
            Ok(configs) => max_channels(configs.map(|c| c.channels())),
            Err(e) => {
                log::debug!("No output configs for audio device {}: {}", index, e);
                0
            }
        };

        let default_config = if max_output_channels > 0 {
            device.default_output_config()
        } else {
            device.default_input_config()
        };
        let default_sample_rate = match default_config {
            Ok(c) => Some(c.sample_rate().0),
            Err(e) => {
                log::debug!("Failed to get default config for audio device {}: {}", index, e);
                None
            }
        };

        let is_default_input = name.is_some() && name.as_ref() == default_in_name;
        let is_default_output = name.is_some() && name.as_ref() == default_out_name;

        DeviceInfo {
            index,
            name,
            host_api: host_name.to_string(),
            max_input_channels,
            max_output_channels,
            default_sample_rate,
            is_default_input: is_default_input && max_input_channels > 0,
            is_default_output: is_default_output && max_output_channels > 0,
        }
    }

    /// Wait for a running stream until `done` returns `true`.
    fn run_stream(
        &self,
        stream: &cpal::Stream,
        clip_duration: Duration,
        err_rx: &mut rtrb::Consumer<cpal::StreamError>,
        mut done: impl FnMut() -> bool,
    ) -> Result<(), CpalBackendError> {
        stream.play()?;

        let start = Instant::now();
        let limit = clip_duration + self.config.stall_timeout;

        loop {
            while let Ok(e) = err_rx.pop() {
                if is_fatal(&e) {
                    log::error!("Audio stream error: {}", e);
                    return Err(e.into());
                }
                log::warn!("Audio stream error: {}", e);
            }

            if done() {
                return Ok(());
            }

            if start.elapsed() > limit {
                return Err(CpalBackendError::Stalled(start.elapsed()));
            }

            std::thread::sleep(self.config.poll_interval);
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(CpalBackendConfig::default())
    }
}

// Implement Debug so `unwrap()` can be used.
impl Debug for CpalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CpalBackend {{ host: {:?} }}", &self.config.host)
    }
}

impl AudioBackend for CpalBackend {
    type Error = CpalBackendError;

    fn enumerate(&mut self) -> Result<DeviceList, Self::Error> {
        let default_host_id = cpal::default_host().id();

        let mut devices = Vec::with_capacity(16);
        let mut infos = Vec::with_capacity(16);

        for host in self.hosts()? {
            let host_name = host.id().name();

            // Only the default host's default devices are flagged.
            let (default_in_name, default_out_name) = if host.id() == default_host_id {
                (
                    host.default_input_device().and_then(|d| d.name().ok()),
                    host.default_output_device().and_then(|d| d.name().ok()),
                )
            } else {
                (None, None)
            };

            let host_devices = match host.devices() {
                Ok(d) => d,
                Err(e) => {
                    log::error!("Failed to get {} audio devices: {}", host_name, e);
                    continue;
                }
            };

            for device in host_devices {
                let mut info = Self::describe(
                    &device,
                    infos.len(),
                    host_name,
                    default_in_name.as_ref(),
                    default_out_name.as_ref(),
                );

                let has_default_in = infos.iter().any(|d: &DeviceInfo| d.is_default_input);
                let has_default_out = infos.iter().any(|d: &DeviceInfo| d.is_default_output);
                info.is_default_input &= !has_default_in;
                info.is_default_output &= !has_default_out;

                log::debug!("Found audio device {:?}", &info);

                infos.push(info);
                devices.push(device);
            }
        }

        self.devices = devices;

        Ok(DeviceList::new(infos))
    }

    fn play(&mut self, info: &DeviceInfo, clip: &SampleBuffer) -> Result<(), Self::Error> {
        let device = self.device(info)?;
        let sample_format = device.default_output_config()?.sample_format();

        let config = cpal::StreamConfig {
            channels: clip.channels(),
            sample_rate: cpal::SampleRate(clip.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        log::info!(
            "Starting output audio stream with device \"{}\" with configuration {:?}",
            info.display_name(),
            &config
        );

        let capacity = clip.samples().len().max(1);
        let (mut to_stream_tx, from_clip_rx) = rtrb::RingBuffer::<f32>::new(capacity);
        for &s in clip.samples() {
            // The ring buffer holds the whole clip.
            let _ = to_stream_tx.push(s);
        }

        let (err_to_backend_tx, mut from_err_rx) =
            rtrb::RingBuffer::<cpal::StreamError>::new(MSG_CHANNEL_CAPACITY);
        let (tail_to_backend_tx, mut from_tail_rx) = rtrb::RingBuffer::<Duration>::new(1);
        let tx = StreamTx {
            clip: from_clip_rx,
            tail: tail_to_backend_tx,
            errors: err_to_backend_tx,
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_output_stream::<f32>(&device, &config, tx),
            cpal::SampleFormat::F64 => build_output_stream::<f64>(&device, &config, tx),
            cpal::SampleFormat::I16 => build_output_stream::<i16>(&device, &config, tx),
            cpal::SampleFormat::I32 => build_output_stream::<i32>(&device, &config, tx),
            cpal::SampleFormat::U16 => build_output_stream::<u16>(&device, &config, tx),
            cpal::SampleFormat::U8 => build_output_stream::<u8>(&device, &config, tx),
            other => return Err(CpalBackendError::UnsupportedSampleFormat(other)),
        }?;

        // The callback reports the drain tail once it has taken the last
        // sample of the clip.
        let mut tail = Duration::ZERO;
        self.run_stream(&stream, clip.duration(), &mut from_err_rx, || {
            match from_tail_rx.pop() {
                Ok(t) => {
                    tail = t;
                    true
                }
                Err(_) => false,
            }
        })?;

        log::debug!("Waiting {:?} for the output device to drain", tail);
        std::thread::sleep(tail.min(self.config.stall_timeout) + self.config.poll_interval);

        log::info!("Audio output stream finished");

        Ok(())
    }

    fn record(
        &mut self,
        info: &DeviceInfo,
        request: RecordRequest,
    ) -> Result<SampleBuffer, Self::Error> {
        if request.channels == 0 {
            return Err(CpalBackendError::InvalidChannelCount(request.channels));
        }
        let total = request
            .num_samples()
            .ok_or(CpalBackendError::RequestTooLarge(request.frames))?;

        let device = self.device(info)?;
        let sample_format = device.default_input_config()?.sample_format();

        let config = cpal::StreamConfig {
            channels: request.channels,
            sample_rate: cpal::SampleRate(request.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        log::info!(
            "Starting input audio stream with device \"{}\" with configuration {:?}",
            info.display_name(),
            &config
        );

        let (to_backend_tx, mut from_stream_rx) = rtrb::RingBuffer::<f32>::new(total.max(1));
        let (err_to_backend_tx, mut from_err_rx) =
            rtrb::RingBuffer::<cpal::StreamError>::new(MSG_CHANNEL_CAPACITY);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_input_stream::<f32>(&device, &config, to_backend_tx, err_to_backend_tx)
            }
            cpal::SampleFormat::F64 => {
                build_input_stream::<f64>(&device, &config, to_backend_tx, err_to_backend_tx)
            }
            cpal::SampleFormat::I16 => {
                build_input_stream::<i16>(&device, &config, to_backend_tx, err_to_backend_tx)
            }
            cpal::SampleFormat::I32 => {
                build_input_stream::<i32>(&device, &config, to_backend_tx, err_to_backend_tx)
            }
            cpal::SampleFormat::U16 => {
                build_input_stream::<u16>(&device, &config, to_backend_tx, err_to_backend_tx)
            }
            cpal::SampleFormat::U8 => {
                build_input_stream::<u8>(&device, &config, to_backend_tx, err_to_backend_tx)
            }
            other => return Err(CpalBackendError::UnsupportedSampleFormat(other)),
        }?;

        let mut samples: Vec<f32> = Vec::with_capacity(total);
        let clip_duration =
            Duration::from_secs_f64(request.frames as f64 / request.sample_rate.max(1) as f64);

        self.run_stream(&stream, clip_duration, &mut from_err_rx, || {
            let n = from_stream_rx.slots();
            if n > 0 {
                if let Ok(chunk) = from_stream_rx.read_chunk(n) {
                    let (first, second) = chunk.as_slices();
                    samples.extend_from_slice(first);
                    samples.extend_from_slice(second);
                    chunk.commit_all();
                }
            }

            samples.len() >= total
        })?;

        drop(stream);
        samples.truncate(total);

        log::info!("Audio input stream finished");

        Ok(SampleBuffer::new(
            samples,
            request.channels,
            request.sample_rate,
        ))
    }
}

/// The ring buffer ends moved into an output stream's callbacks.
struct StreamTx {
    clip: rtrb::Consumer<f32>,
    tail: rtrb::Producer<Duration>,
    errors: rtrb::Producer<cpal::StreamError>,
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: StreamTx,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let StreamTx {
        clip: mut from_clip_rx,
        tail: mut tail_to_backend_tx,
        errors: mut err_to_backend_tx,
    } = tx;
    let channels = config.channels;
    let sample_rate = config.sample_rate.0;
    let mut tail_sent = false;

    device.build_output_stream(
        config,
        move |data: &mut [T], info: &cpal::OutputCallbackInfo| {
            for s in data.iter_mut() {
                *s = T::from_sample(from_clip_rx.pop().unwrap_or(0.0));
            }

            if !tail_sent && from_clip_rx.is_empty() {
                let timestamp = info.timestamp();
                let latency = timestamp.playback.duration_since(&timestamp.callback);
                let tail = drain_tail(latency, data.len(), channels, sample_rate);

                tail_sent = tail_to_backend_tx.push(tail).is_ok();
            }
        },
        move |err| {
            let _ = err_to_backend_tx.push(err);
        },
        Some(BUILD_STREAM_TIMEOUT),
    )
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut to_backend_tx: rtrb::Producer<f32>,
    mut err_to_backend_tx: rtrb::Producer<cpal::StreamError>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _info: &cpal::InputCallbackInfo| {
            for &s in data {
                // Samples past the requested length are dropped.
                if to_backend_tx.push(s.to_sample::<f32>()).is_err() {
                    break;
                }
            }
        },
        move |err| {
            let _ = err_to_backend_tx.push(err);
        },
        Some(BUILD_STREAM_TIMEOUT),
    )
}

/// An error occured while talking to a cpal host or device.
#[derive(Debug, thiserror::Error)]
pub enum CpalBackendError {
    #[error("Unknown audio host \"{name}\" (available: {available})")]
    UnknownHost { name: String, available: String },
    #[error("Audio host is unavailable: {0}")]
    HostUnavailable(#[from] cpal::HostUnavailable),
    #[error("The requested audio device was not found: {0}")]
    DeviceNotFound(String),
    #[error("Could not get audio devices: {0}")]
    FailedToGetDevices(#[from] cpal::DevicesError),
    #[error("Failed to get audio device config: {0}")]
    FailedToGetConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("Unsupported sample format: {0:?}")]
    UnsupportedSampleFormat(cpal::SampleFormat),
    #[error("Failed to build audio stream: {0}")]
    BuildStreamError(#[from] cpal::BuildStreamError),
    #[error("Failed to start audio stream: {0}")]
    PlayStreamError(#[from] cpal::PlayStreamError),
    #[error("Audio stream error: {0}")]
    StreamError(#[from] cpal::StreamError),
    #[error("Audio stream stalled after {0:?}")]
    Stalled(Duration),
    #[error("Cannot record {0} frames")]
    RequestTooLarge(usize),
    #[error("Invalid number of channels: {0}")]
    InvalidChannelCount(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_filter_is_case_insensitive() {
        assert!(host_matches(None, "ALSA"));
        assert!(host_matches(Some("alsa"), "ALSA"));
        assert!(host_matches(Some(" Jack "), "JACK"));
        assert!(!host_matches(Some("pulse"), "ALSA"));
    }

    #[test]
    fn max_channels_of_configs() {
        assert_eq!(max_channels([2, 8, 1].into_iter()), 8);
        assert_eq!(max_channels(std::iter::empty()), 0);
    }

    #[test]
    fn unknown_host_is_an_error() {
        let mut backend = CpalBackend::new(CpalBackendConfig {
            host: Some("not-a-real-host".into()),
            ..Default::default()
        });

        match backend.enumerate() {
            Err(CpalBackendError::UnknownHost { name, .. }) => {
                assert_eq!(name, "not-a-real-host")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn only_lost_devices_end_a_stream() {
        assert!(is_fatal(&cpal::StreamError::DeviceNotAvailable));

        let xrun = cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "buffer underrun".into(),
            },
        };
        assert!(!is_fatal(&xrun));
    }

    #[test]
    fn drain_tail_covers_latency_and_last_block() {
        // 480 stereo frames at 48kHz is one 10ms block.
        assert_eq!(
            drain_tail(Some(Duration::from_millis(40)), 960, 2, 48_000),
            Duration::from_millis(50)
        );
        assert_eq!(drain_tail(None, 960, 2, 48_000), Duration::from_millis(10));
        assert_eq!(drain_tail(None, 0, 0, 0), Duration::ZERO);
    }

    #[test]
    fn oversized_record_is_an_error() {
        let mut backend = CpalBackend::default();
        let info = DeviceInfo {
            index: usize::MAX,
            name: None,
            host_api: "none".into(),
            max_input_channels: 2,
            max_output_channels: 0,
            default_sample_rate: None,
            is_default_input: false,
            is_default_output: false,
        };
        let request = RecordRequest {
            sample_rate: 48_000,
            channels: 2,
            frames: usize::MAX,
        };

        match backend.record(&info, request) {
            Err(CpalBackendError::RequestTooLarge(frames)) => assert_eq!(frames, usize::MAX),
            other => panic!("unexpected result: {:?}", other),
        }

        let request = RecordRequest {
            channels: 0,
            frames: 16,
            ..request
        };
        match backend.record(&info, request) {
            Err(CpalBackendError::InvalidChannelCount(0)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn default_config() {
        let config = CpalBackendConfig::default();
        assert_eq!(config.host, None);
        assert_eq!(config.poll_interval, Duration::from_millis(15));
        assert_eq!(config.stall_timeout, Duration::from_secs(5));
    }
}
