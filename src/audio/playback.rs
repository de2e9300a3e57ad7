//! Audio playback to system speakers via cpal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::clip::AudioClip;
use super::decode::decode_clip;
use super::scheduler::AudioSink;
use crate::config::AudioConfig;
use crate::error::{ChatError, Result};

/// [`AudioSink`] that plays decoded clips on an output device.
///
/// A fresh output stream is opened per clip at the clip's own sample rate, so
/// no resampling is needed.
pub struct CpalSink {
    device: cpal::Device,
}

impl CpalSink {
    /// Open the configured output device.
    ///
    /// # Errors
    ///
    /// Returns an error if no output device is available.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.output_device {
            host.output_devices()
                .map_err(|e| ChatError::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| ChatError::Audio(format!("output device '{name}' not found")))?
        } else {
            host.default_output_device()
                .ok_or_else(|| ChatError::Audio("no default output device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using output device: {device_name}");

        Ok(Self { device })
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| ChatError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl AudioSink for CpalSink {
    async fn play(&self, clip: &AudioClip, cancel: CancellationToken) -> Result<()> {
        let audio = decode_clip(&clip.payload)?;
        let device = self.device.clone();
        let stop = Arc::new(AtomicBool::new(false));

        let watcher = {
            let stop = Arc::clone(&stop);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                stop.store(true, Ordering::SeqCst);
            })
        };

        let result = tokio::task::spawn_blocking(move || {
            play_blocking(&device, audio.samples, audio.sample_rate, &stop)
        })
        .await
        .map_err(|e| ChatError::Audio(format!("playback task failed: {e}")));

        watcher.abort();
        result?
    }
}

/// Play mono samples, blocking until they ran out or `stop` was set.
fn play_blocking(
    device: &cpal::Device,
    samples: Vec<f32>,
    sample_rate: u32,
    stop: &AtomicBool,
) -> Result<()> {
    let stream_config = StreamConfig {
        channels: 1,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples,
        position: 0,
        finished: false,
    }));
    let buffer_clone = Arc::clone(&buffer);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut buf = match buffer_clone.lock() {
                    Ok(b) => b,
                    Err(_) => return,
                };

                for sample in data.iter_mut() {
                    if buf.position < buf.samples.len() {
                        *sample = buf.samples[buf.position];
                        buf.position += 1;
                    } else {
                        *sample = 0.0;
                        buf.finished = true;
                    }
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| ChatError::Audio(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| ChatError::Audio(format!("failed to start output stream: {e}")))?;

    loop {
        std::thread::sleep(Duration::from_millis(10));
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let buf = buffer
            .lock()
            .map_err(|e| ChatError::Audio(format!("playback buffer lock poisoned: {e}")))?;
        if buf.finished {
            break;
        }
    }

    drop(stream);
    Ok(())
}

struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}
