//! Timed capture of a short recording.
//!
//! ```text
//!         request            grant              deadline / stop
//! Idle ───────────► Requesting ─────► Recording ────────────────► Decoding
//!  ▲                    │  deny           │                          │
//!  │ stop               ▼                 │                  ok ┌────┴────┐ err
//!  └─────────────── (cancel)           Failed ◄─────────────────┤         │
//!                                                          Ready ◄┘     Failed
//! ```
//!
//! A recording never runs past `max_seconds`: the countdown reaching zero
//! and an explicit stop share one finishing path. The previous recording is
//! only replaced when a new one reaches [`CaptureStatus::Ready`].

use crate::error::EngineError;
use crate::host::{AudioBuffer, CaptureDevice, DeviceRequest, ProcessingHost};
use leveler_io::{WavSpec, encode_wav};
use std::sync::Arc;
use std::time::Duration;

/// Message shown when the device is refused for recording.
pub const ACCESS_DENIED_MESSAGE: &str = "Microphone access denied for recording.";
/// Message shown when the recording cannot be decoded.
pub const DECODE_FAILED_MESSAGE: &str = "Could not decode the recording.";

/// Where the capture session is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Waiting for the capture device.
    Requesting,
    /// Capturing.
    Recording {
        /// Whole seconds left before the automatic stop.
        remaining_seconds: u32,
    },
    /// Turning captured audio into a playable buffer.
    Decoding,
    /// A new recording is available.
    Ready,
    /// The last attempt failed; any earlier recording is still available.
    Failed {
        /// User-facing reason.
        message: String,
    },
}

impl CaptureStatus {
    /// True while a request or recording is in flight.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CaptureStatus::Requesting | CaptureStatus::Recording { .. } | CaptureStatus::Decoding
        )
    }
}

struct Session {
    device: CaptureDevice,
    started: Duration,
    samples: Vec<f32>,
}

impl Session {
    fn drain(&mut self) {
        self.samples.extend(self.device.samples.try_iter());
    }
}

/// Drives one recording at a time.
pub struct CaptureMachine {
    status: CaptureStatus,
    max_seconds: u32,
    request: Option<DeviceRequest>,
    session: Option<Session>,
    buffer: Option<Arc<AudioBuffer>>,
    transitions: Vec<CaptureStatus>,
}

impl CaptureMachine {
    /// Machine whose recordings stop after `max_seconds`.
    pub fn new(max_seconds: u32) -> Self {
        Self {
            status: CaptureStatus::Idle,
            max_seconds: max_seconds.max(1),
            request: None,
            session: None,
            buffer: None,
            transitions: Vec::new(),
        }
    }

    /// Current status.
    pub fn status(&self) -> &CaptureStatus {
        &self.status
    }

    /// The last successful recording.
    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    /// Whether a recording can be played.
    pub fn has_recording(&self) -> bool {
        self.buffer.is_some()
    }

    /// Whether the capture device is currently held.
    pub fn holds_device(&self) -> bool {
        self.session.is_some()
    }

    /// Statuses entered since the last call, oldest first.
    pub fn drain_transitions(&mut self) -> Vec<CaptureStatus> {
        std::mem::take(&mut self.transitions)
    }

    fn enter(&mut self, status: CaptureStatus) {
        tracing::debug!(?status, "capture status");
        self.status = status.clone();
        self.transitions.push(status);
    }

    fn fail(&mut self, message: &str, err: EngineError) -> Result<(), EngineError> {
        self.request = None;
        self.session = None;
        self.enter(CaptureStatus::Failed {
            message: message.to_string(),
        });
        Err(err)
    }

    /// Ask for the device and start recording once it is granted.
    ///
    /// Does nothing while a request or recording is already in progress.
    pub fn request<H: ProcessingHost + ?Sized>(
        &mut self,
        host: &mut H,
        now: Duration,
    ) -> Result<(), EngineError> {
        if matches!(
            self.status,
            CaptureStatus::Requesting | CaptureStatus::Recording { .. }
        ) {
            return Ok(());
        }
        self.request = Some(host.request_capture_device());
        self.enter(CaptureStatus::Requesting);
        self.poll(host, now)
    }

    /// Resolve a pending request, collect samples, advance the countdown and
    /// stop at the deadline.
    pub fn poll<H: ProcessingHost + ?Sized>(
        &mut self,
        host: &mut H,
        now: Duration,
    ) -> Result<(), EngineError> {
        match self.status {
            CaptureStatus::Requesting => {
                let Some(outcome) = self.request.as_ref().and_then(DeviceRequest::try_resolve)
                else {
                    return Ok(());
                };
                self.request = None;
                match outcome {
                    Ok(device) => {
                        tracing::info!(sample_rate = device.sample_rate, "recording started");
                        let capacity = device.sample_rate as usize * self.max_seconds as usize;
                        self.session = Some(Session {
                            device,
                            started: now,
                            samples: Vec::with_capacity(capacity),
                        });
                        self.enter(CaptureStatus::Recording {
                            remaining_seconds: self.max_seconds,
                        });
                        Ok(())
                    }
                    Err(err) => self.fail(
                        ACCESS_DENIED_MESSAGE,
                        EngineError::DeviceAccessDenied(err.to_string()),
                    ),
                }
            }
            CaptureStatus::Recording { remaining_seconds } => {
                let Some(session) = self.session.as_mut() else {
                    return Ok(());
                };
                session.drain();
                let elapsed = now.saturating_sub(session.started).as_secs();
                let remaining = u64::from(self.max_seconds).saturating_sub(elapsed) as u32;
                if remaining == 0 {
                    self.finish(host)
                } else {
                    if remaining != remaining_seconds {
                        self.enter(CaptureStatus::Recording {
                            remaining_seconds: remaining,
                        });
                    }
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Stop early. Cancels a pending request; finishes a running recording.
    pub fn stop<H: ProcessingHost + ?Sized>(&mut self, host: &mut H) -> Result<(), EngineError> {
        match self.status {
            CaptureStatus::Requesting => {
                self.request = None;
                self.enter(CaptureStatus::Idle);
                Ok(())
            }
            CaptureStatus::Recording { .. } => self.finish(host),
            _ => Ok(()),
        }
    }

    /// Drop any request or device without producing a recording.
    pub fn abort(&mut self) {
        self.request = None;
        if self.session.take().is_some() {
            tracing::info!("recording aborted");
        }
        if self.status.is_active() {
            self.enter(CaptureStatus::Idle);
        }
    }

    fn finish<H: ProcessingHost + ?Sized>(&mut self, host: &mut H) -> Result<(), EngineError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        session.drain();
        let Session {
            device, samples, ..
        } = session;
        let sample_rate = device.sample_rate;
        // Releases the device before decoding starts.
        drop(device);

        let mut samples = samples;
        samples.truncate(sample_rate as usize * self.max_seconds as usize);
        tracing::info!(
            samples = samples.len(),
            sample_rate,
            "recording stopped"
        );
        self.enter(CaptureStatus::Decoding);

        if samples.is_empty() {
            return self.fail(
                DECODE_FAILED_MESSAGE,
                EngineError::DecodeFailure("recording is empty".to_string()),
            );
        }

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
        };
        let decoded = encode_wav(&samples, spec)
            .map_err(|e| e.to_string())
            .and_then(|bytes| host.decode(&bytes).map_err(|e| e.to_string()));

        match decoded {
            Ok(buffer) if !buffer.is_empty() => {
                tracing::info!(seconds = buffer.duration_secs(), "recording ready");
                self.buffer = Some(Arc::new(buffer));
                self.enter(CaptureStatus::Ready);
                Ok(())
            }
            Ok(_) => self.fail(
                DECODE_FAILED_MESSAGE,
                EngineError::DecodeFailure("decoded recording is empty".to_string()),
            ),
            Err(reason) => self.fail(DECODE_FAILED_MESSAGE, EngineError::DecodeFailure(reason)),
        }
    }
}

impl std::fmt::Debug for CaptureMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureMachine")
            .field("status", &self.status)
            .field("max_seconds", &self.max_seconds)
            .field("holds_device", &self.session.is_some())
            .field("has_recording", &self.buffer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::graph::{GraphId, GraphSpec, NodeId, NodeParam};
    use crate::host::DeviceResponder;
    use crossbeam_channel::{Sender, unbounded};
    use leveler_io::{StreamHandle, decode_wav};

    const RATE: u32 = 100;

    #[derive(Default)]
    struct MicHost {
        deny: bool,
        hold: bool,
        fail_decode: bool,
        mic: Option<Sender<f32>>,
        held: Option<DeviceResponder>,
    }

    impl MicHost {
        fn speak(&self, n: usize) {
            if let Some(mic) = &self.mic {
                for i in 0..n {
                    mic.send((i as f32 * 0.01).sin()).unwrap();
                }
            }
        }
    }

    impl ProcessingHost for MicHost {
        fn sample_rate(&self) -> f32 {
            RATE as f32
        }
        fn build_graph(&mut self, _spec: GraphSpec) -> Result<GraphId, HostError> {
            Ok(GraphId(0))
        }
        fn activate_graph(&mut self, _graph: GraphId) -> Result<(), HostError> {
            Ok(())
        }
        fn teardown_graph(&mut self, _graph: GraphId) {}
        fn set_parameter(
            &mut self,
            _graph: GraphId,
            _node: NodeId,
            _param: NodeParam,
            _target: f32,
            _time_constant_s: f32,
        ) -> Result<(), HostError> {
            Ok(())
        }
        fn read_gain_reduction(&self, _graph: GraphId) -> Result<f32, HostError> {
            Ok(0.0)
        }
        fn read_time_domain(&self, _graph: GraphId, _out: &mut [f32]) -> Result<usize, HostError> {
            Ok(0)
        }
        fn request_capture_device(&mut self) -> DeviceRequest {
            if self.deny {
                return DeviceRequest::ready(Err(HostError::AccessDenied("test".into())));
            }
            if self.hold {
                let (responder, request) = DeviceRequest::pending();
                self.held = Some(responder);
                return request;
            }
            let (tx, rx) = unbounded();
            self.mic = Some(tx);
            DeviceRequest::ready(Ok(CaptureDevice {
                stream: StreamHandle::new(()),
                samples: rx,
                sample_rate: RATE,
            }))
        }
        fn decode(&mut self, bytes: &[u8]) -> Result<AudioBuffer, HostError> {
            if self.fail_decode {
                return Err(HostError::Decode("corrupt".into()));
            }
            let (samples, spec) = decode_wav(bytes)?;
            Ok(AudioBuffer::new(samples, spec.sample_rate))
        }
    }

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn counts_down_and_stops_at_the_deadline() {
        let mut host = MicHost::default();
        let mut capture = CaptureMachine::new(10);
        capture.request(&mut host, secs(0.0)).unwrap();
        assert_eq!(
            capture.status(),
            &CaptureStatus::Recording {
                remaining_seconds: 10
            }
        );

        host.speak(250);
        capture.poll(&mut host, secs(1.5)).unwrap();
        capture.poll(&mut host, secs(1.7)).unwrap();
        assert_eq!(
            capture.status(),
            &CaptureStatus::Recording {
                remaining_seconds: 9
            }
        );

        capture.poll(&mut host, secs(10.0)).unwrap();
        assert_eq!(capture.status(), &CaptureStatus::Ready);
        assert!(!capture.holds_device());
        assert_eq!(capture.buffer().unwrap().samples.len(), 250);

        assert_eq!(
            capture.drain_transitions(),
            vec![
                CaptureStatus::Requesting,
                CaptureStatus::Recording {
                    remaining_seconds: 10
                },
                CaptureStatus::Recording {
                    remaining_seconds: 9
                },
                CaptureStatus::Decoding,
                CaptureStatus::Ready,
            ]
        );
    }

    #[test]
    fn recording_is_capped_at_max_duration() {
        let mut host = MicHost::default();
        let mut capture = CaptureMachine::new(10);
        capture.request(&mut host, secs(0.0)).unwrap();
        host.speak(RATE as usize * 12);
        capture.poll(&mut host, secs(12.0)).unwrap();
        let buffer = capture.buffer().unwrap();
        assert_eq!(buffer.samples.len(), RATE as usize * 10);
        assert!(buffer.duration_secs() <= 10.0);
    }

    #[test]
    fn early_stop_finishes_the_recording() {
        let mut host = MicHost::default();
        let mut capture = CaptureMachine::new(10);
        capture.request(&mut host, secs(0.0)).unwrap();
        host.speak(300);
        capture.stop(&mut host).unwrap();
        assert_eq!(capture.status(), &CaptureStatus::Ready);
        assert_eq!(capture.buffer().unwrap().samples.len(), 300);
    }

    #[test]
    fn denial_fails_without_a_recording() {
        let mut host = MicHost {
            deny: true,
            ..MicHost::default()
        };
        let mut capture = CaptureMachine::new(10);
        let err = capture.request(&mut host, secs(0.0)).unwrap_err();
        assert!(matches!(err, EngineError::DeviceAccessDenied(_)));
        assert_eq!(
            capture.status(),
            &CaptureStatus::Failed {
                message: ACCESS_DENIED_MESSAGE.to_string()
            }
        );
        assert!(!capture.has_recording());
    }

    #[test]
    fn failed_decode_keeps_previous_recording() {
        let mut host = MicHost::default();
        let mut capture = CaptureMachine::new(10);
        capture.request(&mut host, secs(0.0)).unwrap();
        host.speak(120);
        capture.stop(&mut host).unwrap();
        let first = Arc::clone(capture.buffer().unwrap());

        host.fail_decode = true;
        capture.request(&mut host, secs(20.0)).unwrap();
        host.speak(80);
        let err = capture.stop(&mut host).unwrap_err();
        assert!(matches!(err, EngineError::DecodeFailure(_)));
        assert!(matches!(capture.status(), CaptureStatus::Failed { .. }));
        assert!(Arc::ptr_eq(capture.buffer().unwrap(), &first));
    }

    #[test]
    fn empty_recording_is_a_decode_failure() {
        let mut host = MicHost::default();
        let mut capture = CaptureMachine::new(10);
        capture.request(&mut host, secs(0.0)).unwrap();
        assert!(matches!(
            capture.stop(&mut host),
            Err(EngineError::DecodeFailure(_))
        ));
        assert!(!capture.has_recording());
    }

    #[test]
    fn second_request_while_recording_is_ignored() {
        let mut host = MicHost::default();
        let mut capture = CaptureMachine::new(10);
        capture.request(&mut host, secs(0.0)).unwrap();
        capture.drain_transitions();
        capture.request(&mut host, secs(1.0)).unwrap();
        assert!(capture.drain_transitions().is_empty());
        assert!(capture.holds_device());
    }

    #[test]
    fn stop_while_requesting_cancels() {
        let mut host = MicHost {
            hold: true,
            ..MicHost::default()
        };
        let mut capture = CaptureMachine::new(10);
        capture.request(&mut host, secs(0.0)).unwrap();
        assert_eq!(capture.status(), &CaptureStatus::Requesting);
        capture.stop(&mut host).unwrap();
        assert_eq!(capture.status(), &CaptureStatus::Idle);

        // A grant arriving after the cancel goes nowhere.
        let (_tx, rx) = unbounded();
        host.held.take().unwrap().grant(CaptureDevice {
            stream: StreamHandle::new(()),
            samples: rx,
            sample_rate: RATE,
        });
        capture.poll(&mut host, secs(1.0)).unwrap();
        assert_eq!(capture.status(), &CaptureStatus::Idle);
        assert!(!capture.holds_device());
    }

    #[test]
    fn abort_releases_the_device() {
        let mut host = MicHost::default();
        let mut capture = CaptureMachine::new(10);
        capture.request(&mut host, secs(0.0)).unwrap();
        capture.abort();
        assert!(!capture.holds_device());
        assert_eq!(capture.status(), &CaptureStatus::Idle);
    }
}
