//! In-process processing host.
//!
//! [`RenderHost`] implements [`ProcessingHost`] on top of an
//! [`AudioBackend`]. Graphs are instantiated on the control side, then moved
//! to the audio thread over a command channel; the audio thread publishes
//! the analysis tap back through [`SharedMeters`].
//!
//! ```text
//!  control side                         audio thread
//! ┌──────────────┐  HostCommand   ┌──────────────────────┐
//! │  RenderHost  │ ─────────────► │ Renderer             │
//! │              │                │  └─ RenderGraph      │
//! │              │ ◄───────────── │      try_publish     │
//! └──────────────┘  SharedMeters  └──────────────────────┘
//! ```

mod chain;
mod renderer;
mod sources;
mod tap;

pub use chain::RenderGraph;
pub use renderer::Renderer;
pub use tap::SharedMeters;

use crate::config::AudioConfig;
use crate::error::HostError;
use crate::graph::{GraphId, GraphSpec, NodeId, NodeKind, NodeParam};
use crate::host::{AudioBuffer, CaptureDevice, DeviceRequest, ProcessingHost};
use chain::check_parameter;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use leveler_io::{AudioBackend, BackendStreamConfig, StreamHandle, decode_wav};
use renderer::{HostCommand, Retired};
use std::collections::HashMap;
use std::sync::Arc;

/// Graphs the audio thread can hand back between two control-side calls.
const RETIRED_CAPACITY: usize = 8;

/// Processing host that renders through an audio backend.
pub struct RenderHost {
    backend: Box<dyn AudioBackend>,
    output_config: BackendStreamConfig,
    input_config: BackendStreamConfig,
    commands: Sender<HostCommand>,
    retired: Receiver<Retired>,
    staged: HashMap<GraphId, Box<RenderGraph>>,
    active: Option<(GraphId, Vec<NodeKind>)>,
    next_id: u64,
    meters: Arc<SharedMeters>,
    renderer: Option<Renderer>,
    output: Option<StreamHandle>,
}

impl RenderHost {
    /// Host on `backend` using the rates and devices in `audio`.
    ///
    /// Nothing is heard until [`start_output`](Self::start_output) or until
    /// the renderer is taken and driven by hand.
    pub fn new(backend: Box<dyn AudioBackend>, audio: &AudioConfig, tap_window: usize) -> Self {
        let (commands, rx) = unbounded();
        let (retired_tx, retired) = bounded(RETIRED_CAPACITY);
        let meters = Arc::new(SharedMeters::new(tap_window));
        let renderer = Renderer::new(rx, retired_tx, Arc::clone(&meters), tap_window);
        let output_config = BackendStreamConfig {
            sample_rate: audio.sample_rate,
            buffer_size: audio.block_size,
            channels: 2,
            device_name: audio.output_device.clone(),
        };
        let input_config = BackendStreamConfig {
            channels: 1,
            device_name: audio.input_device.clone(),
            ..output_config.clone()
        };
        Self {
            backend,
            output_config,
            input_config,
            commands,
            retired,
            staged: HashMap::new(),
            active: None,
            next_id: 1,
            meters,
            renderer: Some(renderer),
            output: None,
        }
    }

    /// Open the output stream and move the renderer into its callback.
    /// Calling it again is a no-op.
    pub fn start_output(&mut self) -> Result<(), HostError> {
        let Some(mut renderer) = self.renderer.take() else {
            return Ok(());
        };
        let channels = usize::from(self.output_config.channels);
        let stream = self.backend.build_output_stream(
            &self.output_config,
            Box::new(move |buffer: &mut [f32]| renderer.render_interleaved(buffer, channels)),
            Box::new(|err| tracing::error!(%err, "output stream error")),
        )?;
        tracing::info!(
            backend = self.backend.name(),
            sample_rate = self.output_config.sample_rate,
            "output started"
        );
        self.output = Some(stream);
        Ok(())
    }

    /// Take the renderer to drive it directly instead of through a stream.
    pub fn take_renderer(&mut self) -> Option<Renderer> {
        self.renderer.take()
    }

    /// Whether the output stream is open.
    pub fn is_output_running(&self) -> bool {
        self.output.is_some()
    }

    /// The backend in use.
    pub fn backend(&self) -> &dyn AudioBackend {
        self.backend.as_ref()
    }

    /// Free the graphs the renderer has let go of. Returns how many.
    ///
    /// Every graph call collects on its own; this is for callers that want
    /// the memory back without touching the graph.
    pub fn collect_retired(&mut self) -> usize {
        let mut freed = 0;
        for (id, graph) in self.retired.try_iter() {
            drop(graph);
            tracing::trace!(%id, "retired graph freed");
            freed += 1;
        }
        freed
    }

    fn send(&self, command: HostCommand) -> Result<(), HostError> {
        self.commands.send(command).map_err(|_| HostError::Disconnected)
    }
}

impl std::fmt::Debug for RenderHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHost")
            .field("backend", &self.backend.name())
            .field("staged", &self.staged.len())
            .field("active", &self.active.as_ref().map(|(id, _)| *id))
            .finish_non_exhaustive()
    }
}

impl ProcessingHost for RenderHost {
    fn sample_rate(&self) -> f32 {
        self.output_config.sample_rate as f32
    }

    fn build_graph(&mut self, spec: GraphSpec) -> Result<GraphId, HostError> {
        self.collect_retired();
        let kind = spec.source().kind();
        let graph = RenderGraph::from_spec(spec, self.sample_rate())?;
        let id = GraphId(self.next_id);
        self.next_id += 1;
        tracing::debug!(%id, source = %kind, "graph built");
        self.staged.insert(id, Box::new(graph));
        Ok(id)
    }

    fn activate_graph(&mut self, graph: GraphId) -> Result<(), HostError> {
        self.collect_retired();
        let built = self
            .staged
            .remove(&graph)
            .ok_or(HostError::UnknownGraph(graph))?;
        let nodes = built.nodes().to_vec();
        self.send(HostCommand::Activate(graph, built))?;
        self.active = Some((graph, nodes));
        tracing::debug!(id = %graph, "graph activated");
        Ok(())
    }

    fn teardown_graph(&mut self, graph: GraphId) {
        self.collect_retired();
        if self.staged.remove(&graph).is_some() {
            tracing::debug!(id = %graph, "staged graph dropped");
            return;
        }
        if self.active.as_ref().is_some_and(|(id, _)| *id == graph) {
            self.active = None;
            // A disconnected renderer has nothing left to tear down.
            let _ = self.send(HostCommand::Teardown(graph));
            self.meters.clear();
            tracing::debug!(id = %graph, "graph torn down");
        }
    }

    fn set_parameter(
        &mut self,
        graph: GraphId,
        node: NodeId,
        param: NodeParam,
        target: f32,
        time_constant_s: f32,
    ) -> Result<(), HostError> {
        self.collect_retired();
        if let Some(staged) = self.staged.get_mut(&graph) {
            return staged.set_parameter(node, param, target, time_constant_s);
        }
        match &self.active {
            Some((id, nodes)) if *id == graph => {
                check_parameter(nodes, node, param)?;
                self.send(HostCommand::SetParam {
                    graph,
                    node,
                    param,
                    target,
                    time_constant_s,
                })
            }
            _ => Err(HostError::UnknownGraph(graph)),
        }
    }

    fn read_gain_reduction(&self, graph: GraphId) -> Result<f32, HostError> {
        self.meters.gain_reduction_db(graph)
    }

    fn read_time_domain(&self, graph: GraphId, out: &mut [f32]) -> Result<usize, HostError> {
        self.meters.read_time_domain(graph, out)
    }

    fn request_capture_device(&mut self) -> DeviceRequest {
        let sample_rate = self.backend.input_sample_rate(&self.input_config);
        // One second of slack between the capture callback and its reader.
        let (tx, rx) = bounded(sample_rate.max(1) as usize);
        let result = self.backend.build_input_stream(
            &self.input_config,
            Box::new(move |samples: &[f32]| {
                for &sample in samples {
                    if tx.try_send(sample).is_err() {
                        break;
                    }
                }
            }),
            Box::new(|err| tracing::warn!(%err, "input stream error")),
        );
        let device = match result {
            Ok(stream) => {
                tracing::info!(sample_rate, "capture device opened");
                Ok(CaptureDevice {
                    stream,
                    samples: rx,
                    sample_rate,
                })
            }
            Err(leveler_io::Error::PermissionDenied(reason)) => {
                Err(HostError::AccessDenied(reason))
            }
            Err(err) => Err(HostError::DeviceUnavailable(err.to_string())),
        };
        DeviceRequest::ready(device)
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<AudioBuffer, HostError> {
        let (samples, spec) = decode_wav(bytes).map_err(|e| HostError::Decode(e.to_string()))?;
        Ok(AudioBuffer::new(samples, spec.sample_rate))
    }
}
