use std::error::Error;

use crate::{DeviceInfo, DeviceList, SampleBuffer};

/// Parameters of a capture from an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRequest {
    pub sample_rate: u32,
    pub channels: u16,
    /// The number of frames to capture.
    pub frames: usize,
}

impl RecordRequest {
    /// The total number of interleaved samples, or `None` if it does not
    /// fit in a `usize`.
    pub fn num_samples(&self) -> Option<usize> {
        self.frames.checked_mul(self.channels as usize)
    }
}

/// The platform audio library as seen by the command handlers.
///
/// All calls block until the operation has finished.
pub trait AudioBackend {
    type Error: Error + 'static;

    /// Enumerate every available device.
    fn enumerate(&mut self) -> Result<DeviceList, Self::Error>;

    /// Play `clip` on the given output device at the clip's sample rate and
    /// channel count.
    fn play(&mut self, device: &DeviceInfo, clip: &SampleBuffer) -> Result<(), Self::Error>;

    /// Record `request.frames` frames from the given input device.
    fn record(
        &mut self,
        device: &DeviceInfo,
        request: RecordRequest,
    ) -> Result<SampleBuffer, Self::Error>;
}

pub mod dummy {
    use crate::{tone, DeviceInfo, DeviceList, SampleBuffer};

    use super::{AudioBackend, RecordRequest};

    /// A record of one call to [`DummyAudioBackend::play`].
    #[derive(Debug, Clone, PartialEq)]
    pub struct PlayedClip {
        pub device_index: usize,
        pub sample_rate: u32,
        pub channels: u16,
        pub frames: usize,
        pub peak: f32,
    }

    /// An in-memory backend for running the probes without audio hardware.
    ///
    /// Recording returns a sine of `input_freq_hz` at `input_amp` on every
    /// channel.
    #[derive(Debug, Clone)]
    pub struct DummyAudioBackend {
        pub devices: Vec<DeviceInfo>,
        pub input_freq_hz: f32,
        pub input_amp: f32,
        pub fail_enumerate: bool,
        /// Device indices that fail to play.
        pub fail_play: Vec<usize>,
        /// Device indices that fail to record.
        pub fail_record: Vec<usize>,
        pub played: Vec<PlayedClip>,
        pub recorded: Vec<(usize, RecordRequest)>,
        enumerations: usize,
    }

    impl DummyAudioBackend {
        pub fn new(devices: Vec<DeviceInfo>) -> Self {
            Self {
                devices,
                input_freq_hz: 440.0,
                input_amp: 0.5,
                fail_enumerate: false,
                fail_play: Vec::new(),
                fail_record: Vec::new(),
                played: Vec::new(),
                recorded: Vec::new(),
                enumerations: 0,
            }
        }

        pub fn num_enumerations(&self) -> usize {
            self.enumerations
        }

        fn describe(index: usize, name: &str, ins: u16, outs: u16, sr: u32) -> DeviceInfo {
            DeviceInfo {
                index,
                name: Some(name.into()),
                host_api: "Dummy".into(),
                max_input_channels: ins,
                max_output_channels: outs,
                default_sample_rate: Some(sr),
                is_default_input: false,
                is_default_output: false,
            }
        }
    }

    impl Default for DummyAudioBackend {
        /// A small set of devices: a mono microphone, a stereo output and a
        /// duplex interface.
        fn default() -> Self {
            let mut mic = Self::describe(0, "Dummy Microphone", 1, 0, 16_000);
            mic.is_default_input = true;
            let mut speakers = Self::describe(1, "Dummy Speakers", 0, 2, 48_000);
            speakers.is_default_output = true;
            let interface = Self::describe(2, "Dummy Interface", 4, 4, 44_100);

            Self::new(vec![mic, speakers, interface])
        }
    }

    impl AudioBackend for DummyAudioBackend {
        type Error = DummyBackendError;

        fn enumerate(&mut self) -> Result<DeviceList, Self::Error> {
            self.enumerations += 1;

            if self.fail_enumerate {
                return Err(DummyBackendError::Unavailable);
            }

            Ok(DeviceList::new(self.devices.clone()))
        }

        fn play(&mut self, device: &DeviceInfo, clip: &SampleBuffer) -> Result<(), Self::Error> {
            if self.fail_play.contains(&device.index) {
                return Err(DummyBackendError::Unavailable);
            }
            if clip.channels() > device.max_output_channels {
                return Err(DummyBackendError::InvalidChannelCount(clip.channels()));
            }

            log::debug!(
                "Dummy playback of {} frames on device {}",
                clip.frames(),
                device.index
            );

            self.played.push(PlayedClip {
                device_index: device.index,
                sample_rate: clip.sample_rate(),
                channels: clip.channels(),
                frames: clip.frames(),
                peak: crate::level::analyze(clip).peak,
            });

            Ok(())
        }

        fn record(
            &mut self,
            device: &DeviceInfo,
            request: RecordRequest,
        ) -> Result<SampleBuffer, Self::Error> {
            if self.fail_record.contains(&device.index) {
                return Err(DummyBackendError::Unavailable);
            }
            if request.channels == 0 || request.channels > device.max_input_channels {
                return Err(DummyBackendError::InvalidChannelCount(request.channels));
            }

            if request.num_samples().is_none() {
                return Err(DummyBackendError::RequestTooLarge(request.frames));
            }

            self.recorded.push((device.index, request));

            Ok(tone::sine(
                request.frames,
                request.channels,
                request.sample_rate,
                self.input_freq_hz,
                self.input_amp,
            ))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum DummyBackendError {
        #[error("Device unavailable")]
        Unavailable,
        #[error("Invalid number of channels: {0}")]
        InvalidChannelCount(u16),
        #[error("Cannot record {0} frames")]
        RequestTooLarge(usize),
    }

}
