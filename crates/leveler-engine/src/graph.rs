//! Signal graph description.
//!
//! A [`GraphSpec`] is what the engine hands the processing host: the nodes,
//! the connections between them, the source that feeds them and the initial
//! parameter values. The host turns it into something that makes sound; the
//! engine never patches a running graph node by node, it builds a new one.
//!
//! ```text
//!            ┌─► drive ─► dynamics ─► makeup ─► wet ─┐
//! source ────┤                                       ├─► tap ─► destination
//!            └─► dry ────────────────────────────────┘
//! ```

use crate::error::HostError;
use crate::host::AudioBuffer;
use crossbeam_channel::Receiver;
use leveler_core::{Control, MappedParams, SourceKind};
use leveler_effects::{DynamicsSettings, ToneSettings};
use std::fmt;
use std::sync::Arc;

/// Host-assigned handle for a built graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub u64);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph#{}", self.0)
    }
}

/// Index of a node within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// What a node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Signal origin.
    Source(SourceKind),
    /// Linear gain ahead of the dynamics processor.
    InputDrive,
    /// Compressor with a settable threshold.
    Dynamics,
    /// Linear gain after the dynamics processor.
    MakeupGain,
    /// Processed path weight.
    WetGain,
    /// Unprocessed path weight.
    DryGain,
    /// Pass-through node whose recent samples can be read.
    AnalysisTap,
    /// Device output.
    Destination,
}

impl NodeKind {
    /// Whether this node carries `param`.
    pub fn accepts(self, param: NodeParam) -> bool {
        match param {
            NodeParam::Gain => matches!(
                self,
                NodeKind::InputDrive | NodeKind::MakeupGain | NodeKind::WetGain | NodeKind::DryGain
            ),
            NodeParam::Threshold => self == NodeKind::Dynamics,
        }
    }
}

/// A settable node parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeParam {
    /// Linear gain.
    Gain,
    /// Threshold in dB.
    Threshold,
}

impl NodeParam {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeParam::Gain => "gain",
            NodeParam::Threshold => "threshold",
        }
    }
}

impl fmt::Display for NodeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a graph's signal comes from, with everything needed to start it.
#[derive(Debug)]
pub enum SourceSpec {
    /// Generated tone.
    Tone(ToneSettings),
    /// Samples arriving from a capture device.
    Live {
        /// Captured mono samples.
        samples: Receiver<f32>,
        /// Capture rate in Hz.
        sample_rate: u32,
    },
    /// Looped recording.
    Sample(Arc<AudioBuffer>),
}

impl SourceSpec {
    /// Which source this is.
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSpec::Tone(_) => SourceKind::Tone,
            SourceSpec::Live { .. } => SourceKind::Live,
            SourceSpec::Sample(_) => SourceKind::Sample,
        }
    }
}

const SOURCE: NodeId = NodeId(0);
const DRIVE: NodeId = NodeId(1);
const DYNAMICS: NodeId = NodeId(2);
const MAKEUP: NodeId = NodeId(3);
const WET: NodeId = NodeId(4);
const DRY: NodeId = NodeId(5);
const TAP: NodeId = NodeId(6);
const DESTINATION: NodeId = NodeId(7);

/// Node and parameter a mapped control is written to.
pub fn binding(control: Control) -> (NodeId, NodeParam) {
    match control {
        Control::Drive => (DRIVE, NodeParam::Gain),
        Control::Threshold => (DYNAMICS, NodeParam::Threshold),
        Control::Makeup => (MAKEUP, NodeParam::Gain),
        Control::Wet => (WET, NodeParam::Gain),
        Control::Dry => (DRY, NodeParam::Gain),
    }
}

/// Complete description of one signal graph.
#[derive(Debug)]
pub struct GraphSpec {
    nodes: Vec<NodeKind>,
    connections: Vec<(NodeId, NodeId)>,
    source: SourceSpec,
    params: MappedParams,
    dynamics: DynamicsSettings,
}

impl GraphSpec {
    /// The leveling amplifier topology around `source`.
    pub fn leveling_amplifier(
        source: SourceSpec,
        params: MappedParams,
        dynamics: DynamicsSettings,
    ) -> Self {
        let nodes = vec![
            NodeKind::Source(source.kind()),
            NodeKind::InputDrive,
            NodeKind::Dynamics,
            NodeKind::MakeupGain,
            NodeKind::WetGain,
            NodeKind::DryGain,
            NodeKind::AnalysisTap,
            NodeKind::Destination,
        ];
        let connections = vec![
            (SOURCE, DRIVE),
            (DRIVE, DYNAMICS),
            (DYNAMICS, MAKEUP),
            (MAKEUP, WET),
            (SOURCE, DRY),
            (WET, TAP),
            (DRY, TAP),
            (TAP, DESTINATION),
        ];
        Self {
            nodes,
            connections,
            source,
            params,
            dynamics,
        }
    }

    /// Node kinds, indexed by [`NodeId`].
    pub fn nodes(&self) -> &[NodeKind] {
        &self.nodes
    }

    /// Directed connections.
    pub fn connections(&self) -> &[(NodeId, NodeId)] {
        &self.connections
    }

    /// Kind of one node.
    pub fn node(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(id.0).copied()
    }

    /// Signal source.
    pub fn source(&self) -> &SourceSpec {
        &self.source
    }

    /// Initial parameter values.
    pub fn params(&self) -> &MappedParams {
        &self.params
    }

    /// Fixed dynamics characteristics.
    pub fn dynamics(&self) -> &DynamicsSettings {
        &self.dynamics
    }

    /// The analysis tap node.
    pub fn tap(&self) -> NodeId {
        TAP
    }

    /// Number of source nodes.
    pub fn active_source_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|k| matches!(k, NodeKind::Source(_)))
            .count()
    }

    /// Split into the parts a host needs to instantiate the graph.
    pub fn into_parts(self) -> (Vec<NodeKind>, SourceSpec, MappedParams, DynamicsSettings) {
        (self.nodes, self.source, self.params, self.dynamics)
    }

    /// Check that the graph is complete and well-formed.
    ///
    /// Exactly one source, every connection between existing nodes, every
    /// node reachable from the source and the destination fed only by the
    /// analysis tap.
    pub fn validate(&self) -> Result<(), HostError> {
        let invalid = |msg: String| Err(HostError::InvalidGraph(msg));

        let sources = self.active_source_count();
        if sources != 1 {
            return invalid(format!("expected one source node, found {sources}"));
        }
        for &(from, to) in &self.connections {
            if from.0 >= self.nodes.len() || to.0 >= self.nodes.len() {
                return invalid(format!("connection {from} -> {to} references a missing node"));
            }
            if from == to {
                return invalid(format!("{from} is connected to itself"));
            }
            if self.nodes[to.0] == NodeKind::Destination
                && self.nodes[from.0] != NodeKind::AnalysisTap
            {
                return invalid(format!("destination fed by {from} instead of the tap"));
            }
        }
        if let SourceSpec::Sample(buffer) = &self.source
            && buffer.samples.is_empty()
        {
            return invalid("sample source has no audio".to_string());
        }

        let source = self
            .nodes
            .iter()
            .position(|k| matches!(k, NodeKind::Source(_)))
            .map(NodeId);
        let mut reached = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = source.into_iter().collect();
        while let Some(node) = stack.pop() {
            if std::mem::replace(&mut reached[node.0], true) {
                continue;
            }
            stack.extend(
                self.connections
                    .iter()
                    .filter(|(from, _)| *from == node)
                    .map(|&(_, to)| to),
            );
        }
        if let Some(orphan) = reached.iter().position(|r| !r) {
            return invalid(format!("{} is not reachable from the source", NodeId(orphan)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_graph() -> GraphSpec {
        GraphSpec::leveling_amplifier(
            SourceSpec::Tone(ToneSettings::default()),
            MappedParams::default(),
            DynamicsSettings::default(),
        )
    }

    #[test]
    fn leveling_topology_is_valid() {
        let graph = tone_graph();
        graph.validate().unwrap();
        assert_eq!(graph.active_source_count(), 1);
        assert_eq!(graph.node(graph.tap()), Some(NodeKind::AnalysisTap));
    }

    #[test]
    fn source_feeds_drive_and_dry() {
        let graph = tone_graph();
        let from_source: Vec<_> = graph
            .connections()
            .iter()
            .filter(|(from, _)| *from == SOURCE)
            .map(|&(_, to)| graph.node(to))
            .collect();
        assert_eq!(
            from_source,
            vec![Some(NodeKind::InputDrive), Some(NodeKind::DryGain)]
        );
    }

    #[test]
    fn bindings_hit_nodes_that_accept_them() {
        let graph = tone_graph();
        for control in Control::ALL {
            let (node, param) = binding(control);
            let kind = graph.node(node).unwrap();
            assert!(kind.accepts(param), "{control:?} -> {kind:?}.{param}");
        }
    }

    #[test]
    fn empty_sample_is_rejected() {
        let graph = GraphSpec::leveling_amplifier(
            SourceSpec::Sample(Arc::new(AudioBuffer::new(Vec::new(), 48000))),
            MappedParams::default(),
            DynamicsSettings::default(),
        );
        assert!(matches!(graph.validate(), Err(HostError::InvalidGraph(_))));
    }

    #[test]
    fn unreachable_node_is_rejected() {
        let mut graph = tone_graph();
        graph.connections.retain(|&(from, to)| !(from == SOURCE && to == DRY));
        assert!(matches!(graph.validate(), Err(HostError::InvalidGraph(_))));
    }

    #[test]
    fn second_source_is_rejected() {
        let mut graph = tone_graph();
        graph.nodes.push(NodeKind::Source(SourceKind::Live));
        graph.connections.push((NodeId(8), DRIVE));
        assert!(matches!(graph.validate(), Err(HostError::InvalidGraph(_))));
    }
}
