//! cpal-based audio backend.
//!
//! [`CpalBackend`] wraps the platform's default cpal host. Output streams use
//! the requested channel count and rate. Capture streams open the device at
//! its own default configuration and downmix to mono before handing samples
//! to the callback, so callers never deal with device channel layouts.

use crate::backend::{
    AudioBackend, BackendStreamConfig, ErrorCallback, InputCallback, OutputCallback, StreamHandle,
};
use crate::devices::{device_name, name_matches, not_found};
use crate::{AudioDevice, Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, Host};

/// cpal-based audio backend.
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    /// Create a backend on the platform's default audio host.
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal backend initialized");
        Self { host }
    }

    fn find_device(&self, name: Option<&str>, is_input: bool) -> Result<cpal::Device> {
        let Some(search) = name else {
            let device = if is_input {
                self.host.default_input_device()
            } else {
                self.host.default_output_device()
            };
            return device.ok_or(Error::NoDevice);
        };

        let mut devices = if is_input {
            self.host.input_devices()
        } else {
            self.host.output_devices()
        }
        .map_err(|e| Error::Stream(e.to_string()))?;

        devices
            .find(|device| device_name(device).is_ok_and(|name| name_matches(&name, search)))
            .ok_or_else(|| not_found(search, is_input))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn map_build_error(err: BuildStreamError) -> Error {
    match err {
        BuildStreamError::DeviceNotAvailable => Error::PermissionDenied(err.to_string()),
        other => Error::Stream(other.to_string()),
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        crate::devices::list_devices()
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        let (_, output) = crate::devices::default_device()?;
        Ok(output)
    }

    fn default_input_device(&self) -> Result<Option<AudioDevice>> {
        let (input, _) = crate::devices::default_device()?;
        Ok(input)
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: OutputCallback,
        mut error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let device = self.find_device(config.device_name.as_deref(), false)?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| callback(data),
                move |err| error_callback(&err.to_string()),
                None,
            )
            .map_err(map_build_error)?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            channels = config.channels,
            sample_rate = config.sample_rate,
            "output stream started"
        );

        Ok(StreamHandle::new(stream))
    }

    fn build_input_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: InputCallback,
        mut error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let device = self.find_device(config.device_name.as_deref(), true)?;
        let supported = device
            .default_input_config()
            .map_err(|e| Error::PermissionDenied(e.to_string()))?;
        let channels = supported.channels().max(1);
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let width = usize::from(channels);
        let mut mono = Vec::with_capacity(config.buffer_size as usize);
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if width == 1 {
                        callback(data);
                        return;
                    }
                    mono.clear();
                    mono.extend(
                        data.chunks(width)
                            .map(|frame| frame.iter().sum::<f32>() / width as f32),
                    );
                    callback(&mono);
                },
                move |err| error_callback(&err.to_string()),
                None,
            )
            .map_err(map_build_error)?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            channels,
            sample_rate = stream_config.sample_rate,
            "input stream started"
        );

        Ok(StreamHandle::new(stream))
    }

    fn input_sample_rate(&self, config: &BackendStreamConfig) -> u32 {
        self.find_device(config.device_name.as_deref(), true)
            .ok()
            .and_then(|d| d.default_input_config().ok())
            .map(|c| c.sample_rate())
            .unwrap_or(config.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_name() {
        assert_eq!(CpalBackend::new().name(), "cpal");
    }

    #[test]
    fn unavailable_device_maps_to_permission_denied() {
        assert!(matches!(
            map_build_error(BuildStreamError::DeviceNotAvailable),
            Error::PermissionDenied(_)
        ));
    }
}
