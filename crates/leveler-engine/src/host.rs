//! The processing engine contract.
//!
//! The leveler core never makes sound itself. It describes graphs, writes
//! parameters and reads meters through [`ProcessingHost`]. The bundled
//! [`RenderHost`](crate::RenderHost) implements it with in-process DSP; tests
//! implement it with a recording fake.

use crate::error::HostError;
use crate::graph::{GraphId, GraphSpec, NodeId, NodeParam};
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use leveler_io::StreamHandle;

/// Decoded mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Mono samples.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap samples recorded at `sample_rate`.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f32 / self.sample_rate as f32
        }
    }

    /// True if there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// An open capture device.
///
/// The device stays open while `stream` is alive. Dropping the whole struct
/// releases it.
#[derive(Debug)]
pub struct CaptureDevice {
    /// Keeps the device open.
    pub stream: StreamHandle,
    /// Captured mono samples.
    pub samples: Receiver<f32>,
    /// Capture rate in Hz.
    pub sample_rate: u32,
}

type DeviceResult = Result<CaptureDevice, HostError>;

/// Outstanding request for the capture device.
///
/// Resolves once, with the device or the reason it was refused. Dropping the
/// request abandons it; a device granted afterwards is released unused.
#[derive(Debug)]
pub struct DeviceRequest {
    rx: Receiver<DeviceResult>,
}

/// Sending half of a [`DeviceRequest`].
#[derive(Debug)]
pub struct DeviceResponder {
    tx: Sender<DeviceResult>,
}

impl DeviceResponder {
    /// Hand over the device.
    pub fn grant(self, device: CaptureDevice) {
        // Send fails only if the request was abandoned; the device drops here.
        let _ = self.tx.send(Ok(device));
    }

    /// Refuse the request.
    pub fn deny(self, err: HostError) {
        let _ = self.tx.send(Err(err));
    }
}

impl DeviceRequest {
    /// A request that resolves later through the returned responder.
    pub fn pending() -> (DeviceResponder, DeviceRequest) {
        let (tx, rx) = bounded(1);
        (DeviceResponder { tx }, DeviceRequest { rx })
    }

    /// A request that has already resolved.
    pub fn ready(result: Result<CaptureDevice, HostError>) -> Self {
        let (responder, request) = Self::pending();
        match result {
            Ok(device) => responder.grant(device),
            Err(err) => responder.deny(err),
        }
        request
    }

    /// The outcome, if there is one yet. Never blocks.
    pub fn try_resolve(&self) -> Option<Result<CaptureDevice, HostError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(HostError::Cancelled)),
        }
    }
}

/// Everything the leveler needs from an audio runtime.
///
/// Reads take `&self` and must not block: a read that cannot be served right
/// away returns an error and the caller skips it.
pub trait ProcessingHost {
    /// Rate the graphs run at, in Hz.
    fn sample_rate(&self) -> f32;

    /// Instantiate a graph without connecting it to the output.
    fn build_graph(&mut self, spec: GraphSpec) -> Result<GraphId, HostError>;

    /// Connect a built graph to the output and start its source.
    fn activate_graph(&mut self, graph: GraphId) -> Result<(), HostError>;

    /// Stop the graph's source and disconnect every node. Unknown ids are
    /// ignored.
    fn teardown_graph(&mut self, graph: GraphId);

    /// Approach `target` on a node parameter with an exponential time
    /// constant in seconds.
    fn set_parameter(
        &mut self,
        graph: GraphId,
        node: NodeId,
        param: NodeParam,
        target: f32,
        time_constant_s: f32,
    ) -> Result<(), HostError>;

    /// Current reduction of the dynamics node, in dB (zero or negative).
    fn read_gain_reduction(&self, graph: GraphId) -> Result<f32, HostError>;

    /// Copy the analysis tap's most recent samples into `out`, oldest first.
    /// Returns how many were written.
    fn read_time_domain(&self, graph: GraphId, out: &mut [f32]) -> Result<usize, HostError>;

    /// Ask for the capture device.
    fn request_capture_device(&mut self) -> DeviceRequest;

    /// Decode a complete encoded audio stream.
    fn decode(&mut self, bytes: &[u8]) -> Result<AudioBuffer, HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_request_resolves_once() {
        let (responder, request) = DeviceRequest::pending();
        assert!(request.try_resolve().is_none());
        responder.deny(HostError::AccessDenied("no".into()));
        assert!(matches!(
            request.try_resolve(),
            Some(Err(HostError::AccessDenied(_)))
        ));
    }

    #[test]
    fn dropped_responder_cancels() {
        let (responder, request) = DeviceRequest::pending();
        drop(responder);
        assert!(matches!(request.try_resolve(), Some(Err(HostError::Cancelled))));
    }

    #[test]
    fn buffer_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 24000], 48000);
        assert_eq!(buffer.duration_secs(), 0.5);
        assert!(!buffer.is_empty());
    }
}
