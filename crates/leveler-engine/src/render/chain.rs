//! An instantiated leveling graph.
//!
//! The node list of a [`GraphSpec`] is fixed, so the renderer does not walk
//! it sample by sample. Instead each node becomes a concrete field and
//! [`RenderGraph::process`] runs them in topological order:
//!
//! ```text
//! x ─► drive ─► dynamics ─► makeup ─► wet ─┐
//! └──► dry ────────────────────────────────┴─► out
//! ```

use super::sources::SourceVoice;
use crate::error::HostError;
use crate::graph::{GraphSpec, NodeId, NodeKind, NodeParam, binding};
use leveler_core::{Control, Effect, GainStage, SourceKind};
use leveler_effects::LevelingCompressor;

/// Running state of one graph, owned by the audio thread once activated.
#[derive(Debug)]
pub struct RenderGraph {
    nodes: Vec<NodeKind>,
    source: SourceVoice,
    drive: GainStage,
    dynamics: LevelingCompressor,
    makeup: GainStage,
    wet: GainStage,
    dry: GainStage,
}

impl RenderGraph {
    /// Instantiate `spec` at `sample_rate`. The source starts stopped.
    pub fn from_spec(spec: GraphSpec, sample_rate: f32) -> Result<Self, HostError> {
        spec.validate()?;
        let (nodes, source, params, dynamics) = spec.into_parts();
        let gain = |control: Control| GainStage::new(params.get(control), sample_rate);
        Ok(Self {
            source: SourceVoice::new(source, sample_rate),
            drive: gain(Control::Drive),
            dynamics: LevelingCompressor::new(
                sample_rate,
                dynamics,
                params.get(Control::Threshold),
            ),
            makeup: gain(Control::Makeup),
            wet: gain(Control::Wet),
            dry: gain(Control::Dry),
            nodes,
        })
    }

    /// Node kinds, indexed by [`NodeId`].
    pub fn nodes(&self) -> &[NodeKind] {
        &self.nodes
    }

    /// Which source feeds the graph.
    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// Whether the source is producing audio.
    pub fn is_running(&self) -> bool {
        self.source.is_running()
    }

    /// Start the source.
    pub fn start(&mut self) {
        self.source.start();
    }

    /// Stop the source.
    pub fn stop(&mut self) {
        self.source.stop();
    }

    /// Ramp a node parameter.
    pub fn set_parameter(
        &mut self,
        node: NodeId,
        param: NodeParam,
        target: f32,
        time_constant_s: f32,
    ) -> Result<(), HostError> {
        check_parameter(&self.nodes, node, param)?;
        let control = Control::ALL
            .into_iter()
            .find(|&c| binding(c) == (node, param))
            .ok_or(HostError::InvalidParameter {
                node: node.0,
                param: param.as_str(),
            })?;
        match control {
            Control::Drive => self.drive.ramp_to(target, time_constant_s),
            Control::Threshold => self.dynamics.set_threshold_db(target, time_constant_s),
            Control::Makeup => self.makeup.ramp_to(target, time_constant_s),
            Control::Wet => self.wet.ramp_to(target, time_constant_s),
            Control::Dry => self.dry.ramp_to(target, time_constant_s),
        }
        Ok(())
    }

    /// Reduction currently applied by the dynamics node, in dB.
    pub fn gain_reduction_db(&self) -> f32 {
        self.dynamics.gain_reduction_db()
    }

    /// Produce the next sample at the analysis tap.
    #[inline]
    pub fn process(&mut self) -> f32 {
        let x = self.source.next_sample();
        let driven = self.drive.process(x);
        let leveled = self.dynamics.process(driven);
        let wet = self.wet.process(self.makeup.process(leveled));
        wet + self.dry.process(x)
    }
}

/// Check that `node` exists in `nodes` and carries `param`.
pub(crate) fn check_parameter(
    nodes: &[NodeKind],
    node: NodeId,
    param: NodeParam,
) -> Result<(), HostError> {
    match nodes.get(node.0) {
        Some(kind) if kind.accepts(param) => Ok(()),
        _ => Err(HostError::InvalidParameter {
            node: node.0,
            param: param.as_str(),
        }),
    }
}
