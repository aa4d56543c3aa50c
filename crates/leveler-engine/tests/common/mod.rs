//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use crossbeam_channel::{Sender, unbounded};
use leveler_core::{MappedParams, SourceKind};
use leveler_engine::{
    AudioBuffer, CaptureDevice, CaptureStatus, DeviceRequest, DeviceResponder, EngineConfig,
    GraphId, GraphSpec, HostError, LevelerEngine, ManualClock, MeterSnapshot, NodeId, NodeParam,
    ProcessingHost,
};
use leveler_io::{StreamHandle, decode_wav};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Capture rate of fake devices. Small so recordings stay small.
pub const MIC_RATE: u32 = 1000;

/// How the fake answers device requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePolicy {
    Grant,
    Deny,
    /// Keep the request open until [`FakeHost::grant_pending`].
    Hold,
}

/// One `set_parameter` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamWrite {
    pub graph: GraphId,
    pub node: NodeId,
    pub param: NodeParam,
    pub target: f32,
    pub time_constant_s: f32,
}

/// One built graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Built {
    pub id: GraphId,
    pub source: SourceKind,
    pub params: MappedParams,
}

/// Host-side events, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    Build(GraphId),
    Activate(GraphId),
    Teardown(GraphId),
    /// Nth device handed out, counting from zero.
    DeviceOpened(usize),
    DeviceReleased(usize),
    TapRead(GraphId),
}

/// Shared, ordered log of host events.
pub type CallLog = Arc<Mutex<Vec<HostCall>>>;

struct DeviceGuard {
    index: usize,
    open: Arc<AtomicUsize>,
    log: CallLog,
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.log.lock().push(HostCall::DeviceReleased(self.index));
    }
}

/// Processing host that records every call and makes no sound.
pub struct FakeHost {
    next_id: u64,
    staged: Vec<GraphId>,
    pub built: Vec<Built>,
    /// Graphs currently connected to the output.
    pub connected: Vec<GraphId>,
    /// Largest number of graphs ever connected at once.
    pub max_connected: usize,
    pub torn_down: Vec<GraphId>,
    pub writes: Vec<ParamWrite>,
    pub gain_reduction_db: f32,
    pub tap_level: f32,
    pub tap_fails: bool,
    pub fail_build: bool,
    pub fail_decode: bool,
    pub policy: DevicePolicy,
    pub device_requests: usize,
    held: Vec<DeviceResponder>,
    open_devices: Arc<AtomicUsize>,
    devices_opened: usize,
    log: CallLog,
    mics: Vec<Sender<f32>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            next_id: 1,
            staged: Vec::new(),
            built: Vec::new(),
            connected: Vec::new(),
            max_connected: 0,
            torn_down: Vec::new(),
            writes: Vec::new(),
            gain_reduction_db: -8.0,
            tap_level: 0.5,
            tap_fails: false,
            fail_build: false,
            fail_decode: false,
            policy: DevicePolicy::Grant,
            device_requests: 0,
            held: Vec::new(),
            open_devices: Arc::new(AtomicUsize::new(0)),
            devices_opened: 0,
            log: CallLog::default(),
            mics: Vec::new(),
        }
    }
}

impl FakeHost {
    pub fn with_policy(policy: DevicePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Devices currently open (granted and not yet dropped).
    pub fn open_devices(&self) -> usize {
        self.open_devices.load(Ordering::SeqCst)
    }

    /// Every host event so far, oldest first.
    pub fn calls(&self) -> Vec<HostCall> {
        self.log.lock().clone()
    }

    fn open_device(&mut self) -> CaptureDevice {
        self.open_devices.fetch_add(1, Ordering::SeqCst);
        let index = self.devices_opened;
        self.devices_opened += 1;
        self.log.lock().push(HostCall::DeviceOpened(index));
        let (tx, rx) = unbounded();
        self.mics.push(tx);
        CaptureDevice {
            stream: StreamHandle::new(DeviceGuard {
                index,
                open: Arc::clone(&self.open_devices),
                log: Arc::clone(&self.log),
            }),
            samples: rx,
            sample_rate: MIC_RATE,
        }
    }

    /// Grant the oldest held request.
    pub fn grant_pending(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let responder = self.held.remove(0);
        let device = self.open_device();
        responder.grant(device);
    }

    /// Deny the oldest held request.
    pub fn deny_pending(&mut self) {
        if !self.held.is_empty() {
            self.held
                .remove(0)
                .deny(HostError::AccessDenied("user refused".into()));
        }
    }

    /// Push `n` samples into every device handed out so far.
    pub fn speak(&self, n: usize) {
        for mic in &self.mics {
            for i in 0..n {
                let _ = mic.send(((i % 50) as f32 / 50.0) - 0.5);
            }
        }
    }

    /// Writes to one node parameter, oldest first.
    pub fn writes_to(&self, (node, param): (NodeId, NodeParam)) -> Vec<ParamWrite> {
        self.writes
            .iter()
            .filter(|w| w.node == node && w.param == param)
            .copied()
            .collect()
    }
}

impl ProcessingHost for FakeHost {
    fn sample_rate(&self) -> f32 {
        48000.0
    }

    fn build_graph(&mut self, spec: GraphSpec) -> Result<GraphId, HostError> {
        if self.fail_build {
            return Err(HostError::InvalidGraph("build refused".into()));
        }
        spec.validate()?;
        let id = GraphId(self.next_id);
        self.next_id += 1;
        self.staged.push(id);
        self.log.lock().push(HostCall::Build(id));
        self.built.push(Built {
            id,
            source: spec.source().kind(),
            params: *spec.params(),
        });
        Ok(id)
    }

    fn activate_graph(&mut self, graph: GraphId) -> Result<(), HostError> {
        let Some(pos) = self.staged.iter().position(|&id| id == graph) else {
            return Err(HostError::UnknownGraph(graph));
        };
        self.staged.remove(pos);
        self.log.lock().push(HostCall::Activate(graph));
        self.connected.push(graph);
        self.max_connected = self.max_connected.max(self.connected.len());
        Ok(())
    }

    fn teardown_graph(&mut self, graph: GraphId) {
        self.staged.retain(|&id| id != graph);
        self.connected.retain(|&id| id != graph);
        self.torn_down.push(graph);
        self.log.lock().push(HostCall::Teardown(graph));
    }

    fn set_parameter(
        &mut self,
        graph: GraphId,
        node: NodeId,
        param: NodeParam,
        target: f32,
        time_constant_s: f32,
    ) -> Result<(), HostError> {
        if !self.connected.contains(&graph) && !self.staged.contains(&graph) {
            return Err(HostError::UnknownGraph(graph));
        }
        self.writes.push(ParamWrite {
            graph,
            node,
            param,
            target,
            time_constant_s,
        });
        Ok(())
    }

    fn read_gain_reduction(&self, graph: GraphId) -> Result<f32, HostError> {
        if !self.connected.contains(&graph) {
            return Err(HostError::TapUnavailable);
        }
        Ok(self.gain_reduction_db)
    }

    fn read_time_domain(&self, graph: GraphId, out: &mut [f32]) -> Result<usize, HostError> {
        self.log.lock().push(HostCall::TapRead(graph));
        if self.tap_fails || !self.connected.contains(&graph) {
            return Err(HostError::TapUnavailable);
        }
        out.fill(self.tap_level);
        Ok(out.len())
    }

    fn request_capture_device(&mut self) -> DeviceRequest {
        self.device_requests += 1;
        match self.policy {
            DevicePolicy::Grant => DeviceRequest::ready(Ok(self.open_device())),
            DevicePolicy::Deny => {
                DeviceRequest::ready(Err(HostError::AccessDenied("user refused".into())))
            }
            DevicePolicy::Hold => {
                let (responder, request) = DeviceRequest::pending();
                self.held.push(responder);
                request
            }
        }
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<AudioBuffer, HostError> {
        if self.fail_decode {
            return Err(HostError::Decode("corrupt stream".into()));
        }
        let (samples, spec) = decode_wav(bytes)?;
        Ok(AudioBuffer::new(samples, spec.sample_rate))
    }
}

/// Engine on `host` with a manual clock.
pub fn engine(host: FakeHost) -> (LevelerEngine<FakeHost>, ManualClock) {
    let clock = ManualClock::new();
    let engine = LevelerEngine::with_clock(host, EngineConfig::default(), clock.clone());
    (engine, clock)
}

/// Shared list for observers to push into.
pub type Collected<T> = Arc<Mutex<Vec<T>>>;

/// Collect every error message the engine publishes.
pub fn collect_errors(engine: &mut LevelerEngine<FakeHost>) -> Collected<String> {
    let store: Collected<String> = Arc::default();
    let sink = Arc::clone(&store);
    engine.observe_error(move |msg| sink.lock().push(msg.to_string()));
    store
}

/// Collect every meter snapshot the engine publishes.
pub fn collect_meters(engine: &mut LevelerEngine<FakeHost>) -> Collected<MeterSnapshot> {
    let store: Collected<MeterSnapshot> = Arc::default();
    let sink = Arc::clone(&store);
    engine.observe(move |snap| sink.lock().push(*snap));
    store
}

/// Collect every capture status transition.
pub fn collect_statuses(engine: &mut LevelerEngine<FakeHost>) -> Collected<CaptureStatus> {
    let store: Collected<CaptureStatus> = Arc::default();
    let sink = Arc::clone(&store);
    engine.observe_capture_status(move |status| sink.lock().push(status.clone()));
    store
}

/// Advance the clock in display frames, ticking after each.
pub fn run_frames(engine: &mut LevelerEngine<FakeHost>, clock: &ManualClock, frames: usize) {
    for _ in 0..frames {
        clock.advance(Duration::from_millis(16));
        let _ = engine.tick();
    }
}

/// Record `seconds` of speech and let the countdown finish.
pub fn record(engine: &mut LevelerEngine<FakeHost>, clock: &ManualClock, seconds: u32) {
    engine.request_recording().expect("recording starts");
    for _ in 0..seconds {
        engine.host().speak(MIC_RATE as usize);
        clock.advance(Duration::from_secs(1));
        let _ = engine.tick();
    }
}
