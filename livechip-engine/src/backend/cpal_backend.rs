//! cpal output backend.
//!
//! Device selection, in order:
//! 1. the configured device name (exact match, then substring match)
//! 2. the host's default output device
//! 3. the first output-capable device the host lists
//!
//! The stream is always mono `f32` at the configured rate. A fixed buffer size
//! of one block is requested first; if the device refuses it, the device
//! default is used and the consumer simply sees differently sized callbacks.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{AudioBackend, OutputStream, StreamSpec};
use crate::consumer::RenderConsumer;
use crate::error::{EngineError, EngineResult};

pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self { host: cpal::default_host() }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of every output-capable device on the default host.
pub fn list_output_devices() -> EngineResult<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| EngineError::DeviceQuery(e.to_string()))?;
    Ok(devices.map(|d| device_name(&d)).collect())
}

fn device_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "<unnamed>".to_string())
}

fn pick_device(host: &cpal::Host, wanted: Option<&str>) -> EngineResult<cpal::Device> {
    if let Some(name) = wanted {
        let mut devices: Vec<cpal::Device> = host
            .output_devices()
            .map_err(|e| EngineError::DeviceQuery(e.to_string()))?
            .collect();
        if let Some(i) = devices.iter().position(|d| device_name(d) == name) {
            return Ok(devices.swap_remove(i));
        }
        if let Some(d) = devices.into_iter().find(|d| device_name(d).contains(name)) {
            log::info!("device '{name}' matched '{}'", device_name(&d));
            return Ok(d);
        }
        return Err(EngineError::DeviceNotFound(name.to_string()));
    }

    if let Some(d) = host.default_output_device() {
        return Ok(d);
    }
    log::warn!("host reports no default output device, falling back to the first one listed");
    host.output_devices()
        .map_err(|e| EngineError::DeviceQuery(e.to_string()))?
        .next()
        .ok_or(EngineError::NoOutputDevice)
}

fn build_stream(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    consumer: Arc<RenderConsumer>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_output_stream(
        cfg,
        move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
            consumer.fill(output);
        },
        |e: cpal::StreamError| log::error!("[cpal] stream error: {e}"),
        None,
    )
}

impl AudioBackend for CpalBackend {
    type Stream = CpalStream;

    fn open(&mut self, spec: &StreamSpec, consumer: RenderConsumer) -> EngineResult<CpalStream> {
        let device = pick_device(&self.host, spec.device.as_deref())?;
        let name = device_name(&device);
        let block = u32::try_from(spec.frame_size)
            .map_err(|_| EngineError::InvalidConfig(format!("frame_size {} too large", spec.frame_size)))?;

        let mut cfg = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(block),
        };

        // Shared only between the two build attempts; at most one stream survives.
        let consumer = Arc::new(consumer);
        let stream = match build_stream(&device, &cfg, Arc::clone(&consumer)) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("'{name}' refused a fixed {block}-frame buffer ({e}); using the device default");
                cfg.buffer_size = cpal::BufferSize::Default;
                build_stream(&device, &cfg, consumer).map_err(|e| EngineError::OpenStream(format!("{name}: {e}")))?
            }
        };
        // Some hosts start streams on creation; keep it silent until `play`.
        if let Err(e) = stream.pause() {
            log::debug!("pause after open not supported on '{name}': {e}");
        }

        log::info!("opened '{name}': mono f32 @ {} Hz, {:?}", spec.sample_rate, cfg.buffer_size);
        Ok(CpalStream { stream })
    }
}

pub struct CpalStream {
    stream: cpal::Stream,
}

impl OutputStream for CpalStream {
    fn play(&self) -> EngineResult<()> {
        self.stream.play().map_err(|e| EngineError::PlayStream(e.to_string()))
    }

    fn pause(&self) -> EngineResult<()> {
        self.stream.pause().map_err(|e| EngineError::PlayStream(e.to_string()))
    }
}
