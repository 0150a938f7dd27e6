//! Live capture from the default input device through CPAL.

use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info};

use super::{AudioBackend, AudioCallback, CaptureInfo, StreamParams};
use crate::error::AudioError;

/// Captures from the host's default input device.
///
/// The stream is created on the thread that calls `start` and stays there;
/// CPAL streams are not `Send` on every platform.
pub struct CpalBackend {
    host: cpal::Host,
    stream: Option<cpal::Stream>,
    description: String,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
            stream: None,
            description: String::from("Device: none"),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds an f32 input configuration that supports `target_rate`, preferring
/// mono.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}

impl AudioBackend for CpalBackend {
    fn start(&mut self, params: StreamParams, mut callback: AudioCallback) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::Start("input stream already running".to_string()));
        }

        let device = self.host.default_input_device().ok_or(AudioError::NoInputDevice)?;
        let device_name = device.name().map_err(|e| AudioError::DeviceName(e.to_string()))?;
        self.description = format!("Device: {} [{}]", device_name, self.host.id().name());

        let configs = device
            .supported_input_configs()
            .map_err(|e| AudioError::Open(e.to_string()))?
            .collect::<Vec<_>>();
        let supported = find_supported_config(configs, params.sample_frequency).ok_or(
            AudioError::UnsupportedConfig {
                sample_frequency: params.sample_frequency,
            },
        )?;

        let config: cpal::StreamConfig = supported
            .with_sample_rate(cpal::SampleRate(params.sample_frequency))
            .into();
        let channels = config.channels as usize;

        // Downmix buffer, sized up front so the callback normally does not
        // allocate.
        let mut mono = Vec::with_capacity(params.frames_per_buffer * 2);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if channels == 1 {
                        callback(data, &CaptureInfo::now());
                    } else {
                        mono.clear();
                        mono.extend(
                            data.chunks(channels)
                                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                        );
                        callback(&mono, &CaptureInfo::now());
                    }
                },
                |err| error!("An error occurred on the audio stream: {}", err),
                None,
            )
            .map_err(|e| AudioError::Open(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Start(e.to_string()))?;

        info!(
            "Input stream started: {} ({} Hz, {} channel(s), ~{} frames per buffer)",
            self.description, params.sample_frequency, channels, params.frames_per_buffer
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = self.stream.take() {
            let paused = stream.pause().map_err(|e| AudioError::Stop(e.to_string()));
            // Dropping the stream closes it even if pausing failed.
            drop(stream);
            paused?;
            info!("Input stream stopped");
        }
        Ok(())
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}
