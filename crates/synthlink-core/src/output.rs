//! CPAL output binding for the render consumer.

use crate::render::RenderConsumer;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Largest device buffer rendered in one pass; bigger buffers are chunked.
const SCRATCH_FRAMES: usize = 4096;

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` due to platform internals. The session owns the
/// handle and only drops it during teardown, never touching it concurrently.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

// SAFETY: the stream is never accessed after construction except to drop it,
// which the session does from a single thread.
unsafe impl Send for StreamHandle {}

/// A running output stream driving a [`RenderConsumer`].
pub struct OutputStream {
    sample_rate: u32,
    channels: usize,
    _stream: StreamHandle,
}

impl OutputStream {
    /// Open `device_index` (or the default device) and start rendering.
    pub fn start(consumer: RenderConsumer, device_index: Option<usize>, sample_rate: u32) -> Result<Self> {
        let device = Self::get_device(device_index)?;
        let default = device.default_output_config()?;

        if default.sample_rate().0 != sample_rate {
            tracing::warn!(
                "Output device runs at {} Hz, session renders at {} Hz",
                default.sample_rate().0,
                sample_rate
            );
        }

        let mut config: cpal::StreamConfig = default.config();
        config.sample_rate = cpal::SampleRate(sample_rate);

        let stream = match default.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, consumer)?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, consumer)?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, consumer)?,
            format => {
                return Err(Error::InvalidConfig(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        };

        stream.play()?;
        tracing::info!(
            "Output stream started ({} channels @ {} Hz)",
            config.channels,
            sample_rate
        );

        Ok(Self {
            sample_rate,
            channels: config.channels as usize,
            _stream: StreamHandle(stream),
        })
    }

    fn get_device(index: Option<usize>) -> Result<cpal::Device> {
        let host = cpal::default_host();

        if let Some(idx) = index {
            let devices: Vec<_> = host.output_devices()?.collect();

            let device_count = devices.len();
            devices.into_iter().nth(idx).ok_or_else(|| {
                Error::InvalidDevice(format!(
                    "Output device index {} out of range (available: {})",
                    idx, device_count
                ))
            })
        } else {
            host.default_output_device()
                .ok_or_else(|| Error::InvalidDevice("No output device available".to_string()))
        }
    }

    /// Names of the available output devices, in index order.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for device in host.output_devices()? {
            names.push(device.name()?);
        }
        Ok(names)
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut consumer: RenderConsumer,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let device_channels = config.channels as usize;
        let ring_channels = consumer.channels();
        let mut scratch = vec![0.0f32; SCRATCH_FRAMES * ring_channels];

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    for block in data.chunks_mut(SCRATCH_FRAMES * device_channels) {
                        let frames = block.len() / device_channels;
                        let rendered = &mut scratch[..frames * ring_channels];
                        consumer.process(rendered);

                        for (i, sample) in block.iter_mut().enumerate() {
                            let channel = i % device_channels;
                            let frame = i / device_channels;
                            let value = if channel < ring_channels {
                                rendered[frame * ring_channels + channel]
                            } else {
                                0.0
                            };
                            *sample = T::from_sample(value);
                        }
                    }
                }));

                if result.is_err() {
                    // Panic in callback - output silence
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0);
                    }
                }
            },
            |_err| {
                // Audio stream error - cannot log from callback
            },
            None,
        )?;

        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
