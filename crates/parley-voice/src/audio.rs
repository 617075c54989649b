//! Microphone capture using CPAL.
//!
//! The capture device is opened at the start of each utterance and released
//! when the stream is dropped, so no other part of the system ever holds it.

use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::mpsc;
use tracing::{info, warn};

/// Capture configuration.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 16000).
    pub sample_rate: u32,
    /// Channel count (default: 1). The segmenter's frame timing and the WAV
    /// upload both assume mono; keep this at 1.
    pub channels: u16,
    /// Samples per frame handed to the segmenter (default: 1024).
    pub frame_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            frame_size: 1024,
        }
    }
}

/// One fixed-size block of signed 16-bit PCM from the capture callback.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
}

/// Capture handle for the default input device.
pub struct AudioCapture {
    config: AudioConfig,
    device: Device,
    stream_config: StreamConfig,
}

impl AudioCapture {
    pub fn new(config: AudioConfig) -> VoiceResult<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| VoiceError::Capture("no input device available".to_string()))?;

        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate = config.sample_rate,
            channels = config.channels,
            "audio capture ready"
        );

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.frame_size as u32),
        };

        Ok(Self {
            config,
            device,
            stream_config,
        })
    }

    /// Start capturing. Frames of exactly `frame_size` samples are sent on
    /// `frame_tx`. Drop the returned stream to release the device.
    pub fn start_capture(self, frame_tx: mpsc::Sender<AudioFrame>) -> VoiceResult<Stream> {
        let frame_size = self.config.frame_size;
        let mut sample_buffer: Vec<i16> = Vec::with_capacity(frame_size);

        let stream = self.device.build_input_stream(
            &self.stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    sample_buffer.push(sample);
                    if sample_buffer.len() >= frame_size {
                        let frame = AudioFrame {
                            samples: std::mem::replace(
                                &mut sample_buffer,
                                Vec::with_capacity(frame_size),
                            ),
                        };
                        // send fails only when the receiver is gone and the
                        // stream is about to be dropped
                        let _ = frame_tx.send(frame);
                    }
                }
            },
            move |err| {
                warn!(error = %err, "audio stream error");
            },
            None,
        )?;

        stream.play()?;
        Ok(stream)
    }

    /// Names of available input devices, for diagnostics.
    pub fn list_input_devices() -> VoiceResult<Vec<String>> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for device in host.input_devices()? {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_config_defaults() {
        let c = AudioConfig::default();
        assert_eq!(c.sample_rate, 16_000);
        assert_eq!(c.channels, 1);
        assert_eq!(c.frame_size, 1024);
    }
}
