//! The leveler engine.
//!
//! [`LevelerEngine`] owns the control state, the live graph handle, the
//! capture machine and the metering loop, and drives a [`ProcessingHost`].
//! It is single-threaded and cooperative: callers feed it control changes
//! and call [`tick`](LevelerEngine::tick) at display refresh rate. Nothing
//! in here blocks; the only wait (a device grant) is polled.
//!
//! Two kinds of change reach the host:
//!
//! - knob and bypass changes retarget parameters on the live graph
//! - power and source changes replace the whole graph: build the new one,
//!   tear down the old one, then activate the new one
//!
//! ```rust
//! use leveler_engine::{EngineConfig, LevelerEngine, RenderHost};
//! use leveler_core::ControlUpdate;
//! use leveler_io::MockBackend;
//!
//! let config = EngineConfig::default();
//! let backend = MockBackend::new(config.audio.sample_rate);
//! let host = RenderHost::new(Box::new(backend), &config.audio, config.metering.tap_window);
//! let mut engine = LevelerEngine::new(host, config);
//!
//! engine.set_control_state(ControlUpdate::power(true)).unwrap();
//! assert!(engine.graph_id().is_some());
//! engine.set_bypass(true).unwrap();
//! engine.shutdown();
//! assert!(engine.graph_id().is_none());
//! ```

use crate::capture::{CaptureMachine, CaptureStatus};
use crate::clock::{Clock, MonotonicClock};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::{GraphId, GraphSpec, NodeId, NodeParam, SourceSpec, binding};
use crate::host::{AudioBuffer, DeviceRequest, ProcessingHost};
use crate::metering::{MeterSnapshot, MeteringLoop};
use crate::source::{Provision, SourceProvider};
use leveler_core::{ControlState, ControlUpdate, MappedParams, SourceKind};
use leveler_io::StreamHandle;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Receives every published meter snapshot.
pub type MeterObserver = Box<dyn FnMut(&MeterSnapshot) + Send>;
/// Receives every capture status transition.
pub type CaptureObserver = Box<dyn FnMut(&CaptureStatus) + Send>;
/// Receives one user-facing message per surfaced error.
pub type ErrorObserver = Box<dyn FnMut(&str) + Send>;

struct ActiveGraph {
    id: GraphId,
    source: SourceKind,
    /// Held for live graphs; dropping it releases the device.
    device: Option<StreamHandle>,
}

struct PendingSwitch {
    kind: SourceKind,
    request: DeviceRequest,
}

/// Signal chain, source and capture controller for the leveling amplifier.
pub struct LevelerEngine<H: ProcessingHost> {
    host: H,
    clock: Box<dyn Clock>,
    config: EngineConfig,
    state: ControlState,
    graph: Option<ActiveGraph>,
    pending: Option<PendingSwitch>,
    applied: HashMap<(NodeId, NodeParam), f32>,
    provider: SourceProvider,
    capture: CaptureMachine,
    metering: MeteringLoop,
    meter_observers: Vec<MeterObserver>,
    capture_observers: Vec<CaptureObserver>,
    error_observers: Vec<ErrorObserver>,
    shut_down: bool,
}

impl<H: ProcessingHost> LevelerEngine<H> {
    /// Engine on `host`, timed by the system clock. Starts powered off.
    pub fn new(host: H, config: EngineConfig) -> Self {
        Self::with_clock(host, config, MonotonicClock::new())
    }

    /// Engine timed by `clock`.
    pub fn with_clock(host: H, config: EngineConfig, clock: impl Clock + 'static) -> Self {
        Self {
            provider: SourceProvider::new(config.tone),
            capture: CaptureMachine::new(config.capture.max_seconds),
            metering: MeteringLoop::new(config.metering.interval(), config.metering.tap_window),
            host,
            clock: Box::new(clock),
            config,
            state: ControlState::default(),
            graph: None,
            pending: None,
            applied: HashMap::new(),
            meter_observers: Vec::new(),
            capture_observers: Vec::new(),
            error_observers: Vec::new(),
            shut_down: false,
        }
    }

    // --- Observers ---

    /// Call `f` with every meter snapshot.
    pub fn observe(&mut self, f: impl FnMut(&MeterSnapshot) + Send + 'static) {
        self.meter_observers.push(Box::new(f));
    }

    /// Call `f` on every capture status transition.
    pub fn observe_capture_status(&mut self, f: impl FnMut(&CaptureStatus) + Send + 'static) {
        self.capture_observers.push(Box::new(f));
    }

    /// Call `f` with a user-facing message for every surfaced error.
    pub fn observe_error(&mut self, f: impl FnMut(&str) + Send + 'static) {
        self.error_observers.push(Box::new(f));
    }

    // --- Controls ---

    /// Apply a partial control change.
    ///
    /// Knob and bypass changes are pushed first and never rebuild the graph.
    /// When the update powers down, power is handled before the source so
    /// the choice is only recorded; otherwise the source is switched first
    /// so powering up builds the right graph once. The first error is
    /// returned; every error is also published.
    pub fn set_control_state(&mut self, update: ControlUpdate) -> Result<(), EngineError> {
        let knobs = ControlUpdate {
            power: None,
            source: None,
            ..update
        };
        let changes = self.state.apply(&knobs);
        if changes.knobs || changes.bypass {
            self.push_params();
        }

        let outcomes = if update.power == Some(false) {
            let power = self.apply_power(update.power);
            [power, self.apply_source(update.source)]
        } else {
            let source = self.apply_source(update.source);
            [source, self.apply_power(update.power)]
        };
        outcomes.into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }

    fn apply_power(&mut self, power: Option<bool>) -> Result<(), EngineError> {
        power.map_or(Ok(()), |on| self.set_power(on))
    }

    fn apply_source(&mut self, source: Option<SourceKind>) -> Result<(), EngineError> {
        source.map_or(Ok(()), |kind| self.select_source(kind))
    }

    /// Crossfade between the processed and the dry path.
    pub fn set_bypass(&mut self, on: bool) -> Result<(), EngineError> {
        self.set_control_state(ControlUpdate::bypass(on))
    }

    /// Choose the signal source.
    ///
    /// Sample playback without a recording is rejected and changes nothing.
    /// A newer selection supersedes a live switch still waiting for its
    /// device. Powered off, the choice is only recorded.
    pub fn select_source(&mut self, kind: SourceKind) -> Result<(), EngineError> {
        if self.shut_down {
            return Ok(());
        }
        if kind == SourceKind::Sample && !self.capture.has_recording() {
            return self.fail(EngineError::NoRecordingAvailable);
        }
        if let Some(superseded) = self.pending.take() {
            tracing::debug!(source = %superseded.kind, "pending switch superseded");
        }
        let serving = self
            .graph
            .as_ref()
            .is_some_and(|graph| graph.source == kind);
        if kind == self.state.source && (!self.state.power || serving) {
            return Ok(());
        }
        if !self.state.power {
            self.state.source = kind;
            return Ok(());
        }
        self.switch_to(kind)
    }

    /// Turn the leveler on or off.
    ///
    /// On starts metering and builds a graph for the selected source. Off
    /// cancels any pending switch, tears the graph down, releases the live
    /// device and stops metering.
    pub fn set_power(&mut self, on: bool) -> Result<(), EngineError> {
        if self.shut_down || on == self.state.power {
            return Ok(());
        }
        self.state.power = on;
        if on {
            tracing::info!(source = %self.state.source, "power on");
            self.metering.start(self.clock.now());
            self.switch_to(self.state.source)
        } else {
            tracing::info!("power off");
            self.pending = None;
            self.release_graph();
            self.metering.stop();
            Ok(())
        }
    }

    // --- Recording ---

    /// Start a recording. Ignored while one is already requested or running.
    pub fn request_recording(&mut self) -> Result<(), EngineError> {
        if self.shut_down {
            return Ok(());
        }
        let now = self.clock.now();
        let result = self.capture.request(&mut self.host, now);
        self.after_capture(result)
    }

    /// Stop the recording early, or cancel a request still waiting.
    pub fn stop_recording(&mut self) -> Result<(), EngineError> {
        let result = self.capture.stop(&mut self.host);
        self.after_capture(result)
    }

    // --- Tick ---

    /// Advance the engine: resolve device grants, run the recording
    /// countdown and take a meter reading if one is due.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        if self.shut_down {
            return Ok(());
        }
        let switched = self.poll_pending();

        let now = self.clock.now();
        let polled = self.capture.poll(&mut self.host, now);
        let captured = self.after_capture(polled);

        if let Some(graph) = &self.graph
            && let Some(snapshot) =
                self.metering
                    .tick(now, &self.host, graph.id, self.state.bypass)
        {
            for observer in &mut self.meter_observers {
                observer(&snapshot);
            }
        }
        switched.and(captured)
    }

    /// Release every resource: the recording device and any pending request
    /// first, then the live device and graph, then metering. Also runs on
    /// drop. Later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.capture.abort();
        self.pending = None;
        if let Some(graph) = self.graph.take() {
            drop(graph.device);
            self.host.teardown_graph(graph.id);
        }
        self.metering.stop();
        self.applied.clear();
        self.state.power = false;
        tracing::info!("engine shut down");
    }

    // --- Accessors ---

    /// Current control state.
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Source of the live graph, if any.
    pub fn active_source(&self) -> Option<SourceKind> {
        self.graph.as_ref().map(|graph| graph.source)
    }

    /// Source still waiting for its device, if any.
    pub fn pending_source(&self) -> Option<SourceKind> {
        self.pending.as_ref().map(|pending| pending.kind)
    }

    /// Id of the live graph, if any.
    pub fn graph_id(&self) -> Option<GraphId> {
        self.graph.as_ref().map(|graph| graph.id)
    }

    /// Capture machine status.
    pub fn capture_status(&self) -> &CaptureStatus {
        self.capture.status()
    }

    /// Whether sample playback can be selected.
    pub fn has_recording(&self) -> bool {
        self.capture.has_recording()
    }

    /// The last successful recording.
    pub fn recording(&self) -> Option<&Arc<AudioBuffer>> {
        self.capture.buffer()
    }

    /// Most recent meter snapshot.
    pub fn latest_meter(&self) -> MeterSnapshot {
        self.metering.latest()
    }

    /// Whether the metering loop is running.
    pub fn is_metering(&self) -> bool {
        self.metering.is_running()
    }

    /// Time on the engine's clock.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The processing host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The processing host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    // --- Internals ---

    fn fail(&mut self, err: EngineError) -> Result<(), EngineError> {
        tracing::warn!(error = %err, "engine error");
        let message = err.user_message();
        for observer in &mut self.error_observers {
            observer(&message);
        }
        Err(err)
    }

    /// Write every mapped parameter whose target differs from what the live
    /// graph was last given.
    fn push_params(&mut self) {
        let Some(graph) = &self.graph else {
            return;
        };
        let id = graph.id;
        for (control, target, time_constant_s) in MappedParams::from_state(&self.state).targets()
        {
            let key = binding(control);
            if self.applied.get(&key) == Some(&target) {
                continue;
            }
            match self
                .host
                .set_parameter(id, key.0, key.1, target, time_constant_s)
            {
                Ok(()) => {
                    tracing::trace!(?control, target, "parameter ramp");
                    self.applied.insert(key, target);
                }
                Err(err) => tracing::warn!(?control, %err, "parameter write failed"),
            }
        }
    }

    fn switch_to(&mut self, kind: SourceKind) -> Result<(), EngineError> {
        let recording = self.capture.buffer().cloned();
        match self.provider.provide(kind, recording.as_ref(), &mut self.host) {
            Ok(Provision::Ready(source)) => self.commit(kind, source, None),
            Ok(Provision::Pending(request)) => {
                tracing::debug!(source = %kind, "waiting for capture device");
                self.pending = Some(PendingSwitch { kind, request });
                self.poll_pending()
            }
            Err(err) => self.fail(err),
        }
    }

    fn poll_pending(&mut self) -> Result<(), EngineError> {
        let Some(outcome) = self
            .pending
            .as_ref()
            .and_then(|pending| pending.request.try_resolve())
        else {
            return Ok(());
        };
        let Some(PendingSwitch { kind, .. }) = self.pending.take() else {
            return Ok(());
        };
        match outcome {
            Ok(device) => {
                let (source, stream) = SourceProvider::live(device);
                self.commit(kind, source, Some(stream))
            }
            Err(err) => self.fail(EngineError::DeviceAccessDenied(err.to_string())),
        }
    }

    /// Build a graph around `source`, retire the old one, activate the new.
    fn commit(
        &mut self,
        kind: SourceKind,
        source: SourceSpec,
        device: Option<StreamHandle>,
    ) -> Result<(), EngineError> {
        let params = MappedParams::from_state(&self.state);
        let spec = GraphSpec::leveling_amplifier(source, params, self.config.dynamics);
        let id = match self.host.build_graph(spec) {
            Ok(id) => id,
            Err(err) => {
                drop(device);
                return self.fail(EngineError::GraphBuildFailure(err.to_string()));
            }
        };

        self.release_graph();
        if let Err(err) = self.host.activate_graph(id) {
            self.host.teardown_graph(id);
            drop(device);
            return self.fail(EngineError::GraphBuildFailure(err.to_string()));
        }

        tracing::info!(%id, source = %kind, "graph activated");
        self.graph = Some(ActiveGraph {
            id,
            source: kind,
            device,
        });
        self.state.source = kind;
        self.applied = params
            .targets()
            .into_iter()
            .map(|(control, target, _)| (binding(control), target))
            .collect();
        Ok(())
    }

    fn release_graph(&mut self) {
        if let Some(graph) = self.graph.take() {
            drop(graph.device);
            self.host.teardown_graph(graph.id);
            tracing::debug!(id = %graph.id, source = %graph.source, "graph released");
        }
        self.applied.clear();
    }

    /// Publish capture transitions and react to a fresh recording.
    fn after_capture(&mut self, result: Result<(), EngineError>) -> Result<(), EngineError> {
        let mut fresh_recording = false;
        for status in self.capture.drain_transitions() {
            fresh_recording |= status == CaptureStatus::Ready;
            for observer in &mut self.capture_observers {
                observer(&status);
            }
        }
        let result = match result {
            Ok(()) => Ok(()),
            Err(err) => self.fail(err),
        };
        // Sample playback picks up the new take.
        if fresh_recording && self.state.power && self.active_source() == Some(SourceKind::Sample) {
            return result.and(self.switch_to(SourceKind::Sample));
        }
        result
    }
}

impl<H: ProcessingHost> Drop for LevelerEngine<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<H: ProcessingHost> std::fmt::Debug for LevelerEngine<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelerEngine")
            .field("state", &self.state)
            .field("graph", &self.graph_id())
            .field("pending", &self.pending_source())
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}
