//! Source provisioning.
//!
//! Turns a [`SourceKind`] into a [`SourceSpec`] the graph can be built
//! around. Tone and sample sources are available immediately; live input
//! has to wait for the capture device, so it comes back as a pending
//! [`DeviceRequest`] that the engine polls.

use crate::error::EngineError;
use crate::graph::SourceSpec;
use crate::host::{AudioBuffer, CaptureDevice, DeviceRequest, ProcessingHost};
use leveler_core::SourceKind;
use leveler_effects::ToneSettings;
use leveler_io::StreamHandle;
use std::sync::Arc;

/// Result of asking for a source.
#[derive(Debug)]
pub enum Provision {
    /// Ready to build a graph around.
    Ready(SourceSpec),
    /// Waiting on the capture device.
    Pending(DeviceRequest),
}

/// Builds source descriptions.
#[derive(Debug, Clone, Default)]
pub struct SourceProvider {
    tone: ToneSettings,
}

impl SourceProvider {
    /// Provider whose tone uses `tone`.
    pub fn new(tone: ToneSettings) -> Self {
        Self { tone }
    }

    /// Prepare a source of the given kind.
    ///
    /// Sample playback needs `recording`; without one this fails with
    /// [`EngineError::NoRecordingAvailable`] and nothing is requested.
    pub fn provide<H: ProcessingHost + ?Sized>(
        &self,
        kind: SourceKind,
        recording: Option<&Arc<AudioBuffer>>,
        host: &mut H,
    ) -> Result<Provision, EngineError> {
        match kind {
            SourceKind::Tone => Ok(Provision::Ready(SourceSpec::Tone(self.tone))),
            SourceKind::Sample => match recording {
                Some(buffer) if !buffer.is_empty() => {
                    Ok(Provision::Ready(SourceSpec::Sample(Arc::clone(buffer))))
                }
                _ => Err(EngineError::NoRecordingAvailable),
            },
            SourceKind::Live => Ok(Provision::Pending(host.request_capture_device())),
        }
    }

    /// Split a granted device into the live source and the handle that keeps
    /// the device open.
    pub fn live(device: CaptureDevice) -> (SourceSpec, StreamHandle) {
        let CaptureDevice {
            stream,
            samples,
            sample_rate,
        } = device;
        (
            SourceSpec::Live {
                samples,
                sample_rate,
            },
            stream,
        )
    }
}
