//! Audio-thread half of the render host.

use super::chain::RenderGraph;
use super::tap::{SharedMeters, TapRing};
use crate::graph::{GraphId, NodeId, NodeParam};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;

/// A graph the audio thread has finished with, on its way back to be dropped.
pub(crate) type Retired = (GraphId, Box<RenderGraph>);

/// Messages from the control side to the audio thread.
#[derive(Debug)]
pub(crate) enum HostCommand {
    /// Replace whatever is playing with this graph and start its source.
    Activate(GraphId, Box<RenderGraph>),
    /// Stop and drop the graph if it is the one playing.
    Teardown(GraphId),
    /// Ramp a parameter on the playing graph.
    SetParam {
        graph: GraphId,
        node: NodeId,
        param: NodeParam,
        target: f32,
        time_constant_s: f32,
    },
}

/// Pulls commands, runs the active graph and feeds the analysis tap.
///
/// Lives inside the output callback. Nothing here blocks, and graphs it
/// lets go of are handed back to the control side to be freed there.
pub struct Renderer {
    commands: Receiver<HostCommand>,
    retired: Sender<Retired>,
    active: Option<(GraphId, Box<RenderGraph>)>,
    ring: TapRing,
    meters: Arc<SharedMeters>,
}

impl Renderer {
    pub(crate) fn new(
        commands: Receiver<HostCommand>,
        retired: Sender<Retired>,
        meters: Arc<SharedMeters>,
        tap_window: usize,
    ) -> Self {
        Self {
            commands,
            retired,
            active: None,
            ring: TapRing::new(tap_window),
            meters,
        }
    }

    /// Id of the graph currently playing.
    pub fn active_graph(&self) -> Option<GraphId> {
        self.active.as_ref().map(|(id, _)| *id)
    }

    /// Stop `graph` and send it back. Only a control side that has stopped
    /// collecting leaves the channel full, and then the graph is freed here.
    fn retire(&self, id: GraphId, mut graph: Box<RenderGraph>) {
        graph.stop();
        let _ = self.retired.try_send((id, graph));
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                HostCommand::Activate(id, mut graph) => {
                    graph.start();
                    self.ring.clear();
                    if let Some((old_id, old)) = self.active.replace((id, graph)) {
                        self.retire(old_id, old);
                    }
                }
                HostCommand::Teardown(id) => {
                    if self.active_graph() == Some(id)
                        && let Some((id, graph)) = self.active.take()
                    {
                        self.retire(id, graph);
                        self.ring.clear();
                    }
                }
                HostCommand::SetParam {
                    graph,
                    node,
                    param,
                    target,
                    time_constant_s,
                } => {
                    if let Some((id, active)) = self.active.as_mut()
                        && *id == graph
                    {
                        // Checked against the node list before it was sent.
                        let _ = active.set_parameter(node, param, target, time_constant_s);
                    }
                }
            }
        }
    }

    /// Fill a mono buffer.
    pub fn render(&mut self, out: &mut [f32]) {
        self.render_interleaved(out, 1);
    }

    /// Fill an interleaved buffer, writing the same signal to every channel.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        self.drain_commands();
        let channels = channels.max(1);
        let Some((id, graph)) = self.active.as_mut() else {
            out.fill(0.0);
            return;
        };
        for frame in out.chunks_mut(channels) {
            let sample = graph.process();
            self.ring.push(sample);
            frame.fill(sample);
        }
        self.meters
            .try_publish(*id, &self.ring, graph.gain_reduction_db());
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("active", &self.active_graph())
            .finish_non_exhaustive()
    }
}
