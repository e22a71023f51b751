// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deferred resolution of source connections into destination edges.
//!
//! Adapters run in any order, so a consumer may ask for an input whose
//! producer has not been translated yet. The consumer records the request
//! here, producers register which destination node stands in for each of
//! their outputs, and pass-through nodes register redirects. `finalize`
//! then walks every request back to a producer.

use crate::builder::{BuilderError, GraphBuilder};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Severity};
use crate::shape::{Shape, Value};
use ordoplay_shader_graph::{Graph, PortDirection, SlotRef};
use std::collections::{HashMap, HashSet};

/// Default bound on redirect chains
pub const MAX_REDIRECT_DEPTH: usize = 64;

/// Destination output standing in for a source output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Destination node
    pub node: String,
    /// Named output on a multi-output node
    pub output: Option<String>,
}

/// Outcome of walking a source slot back to its producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A registered producer was found
    Target(Target),
    /// Nothing upstream: the input is unconnected or its producer was not translated
    Unresolved,
    /// The chain loops or exceeds the depth bound
    Cycle,
}

#[derive(Debug, Clone)]
struct PendingEdge {
    consumer: SlotRef,
    node: String,
    port: String,
}

/// Producer and redirect tables plus the pending consumer list
#[derive(Debug)]
pub struct ExternalEdgeMap {
    producers: HashMap<SlotRef, Target>,
    redirects: HashMap<SlotRef, SlotRef>,
    pending: Vec<PendingEdge>,
    max_depth: usize,
}

impl Default for ExternalEdgeMap {
    fn default() -> Self {
        Self::new(MAX_REDIRECT_DEPTH)
    }
}

impl ExternalEdgeMap {
    /// Create an empty map with a redirect depth bound
    pub fn new(max_depth: usize) -> Self {
        Self {
            producers: HashMap::new(),
            redirects: HashMap::new(),
            pending: Vec::new(),
            max_depth,
        }
    }

    /// Register the destination output that produces a source output slot
    pub fn add_external_port(&mut self, slot: SlotRef, node: &str, output: Option<&str>) {
        self.producers.insert(
            slot,
            Target { node: node.to_string(), output: output.map(str::to_string) },
        );
    }

    /// Mark a destination port as fed by whatever feeds a source input slot
    pub fn add_external_port_and_edge(
        &mut self,
        builder: &mut GraphBuilder,
        input: SlotRef,
        node: &str,
        port: &str,
        shape: Shape,
    ) -> Result<(), BuilderError> {
        builder.mark_pending(node, port, shape)?;
        self.pending.push(PendingEdge { consumer: input, node: node.to_string(), port: port.to_string() });
        Ok(())
    }

    /// Declare that `source` produces whatever `destination` resolves to
    pub fn add_external_edge(&mut self, source: SlotRef, destination: SlotRef) {
        self.redirects.insert(source, destination);
    }

    /// Number of requests awaiting `finalize`
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Walk a source slot to its destination producer.
    ///
    /// Input slots follow the source connection upstream; output slots take a
    /// registered producer first, then a redirect.
    pub fn resolve_slot(&self, source: &Graph, slot: SlotRef) -> Resolution {
        let mut visited = HashSet::new();
        let mut current = slot;
        for _ in 0..=self.max_depth {
            if !visited.insert(current) {
                return Resolution::Cycle;
            }
            match source.slot_direction(current) {
                Some(PortDirection::Input) => match source.producer_of(current) {
                    Some(producer) => current = producer,
                    None => return Resolution::Unresolved,
                },
                Some(PortDirection::Output) | None => {
                    if let Some(target) = self.producers.get(&current) {
                        return Resolution::Target(target.clone());
                    }
                    match self.redirects.get(&current) {
                        Some(next) => current = *next,
                        None => return Resolution::Unresolved,
                    }
                }
            }
        }
        Resolution::Cycle
    }

    /// Bind every pending port: connect it to its resolved producer (with
    /// coercion), or fall back to the consumer's authored literal, or drop it.
    pub fn finalize(
        &mut self,
        source: &Graph,
        builder: &mut GraphBuilder,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), BuilderError> {
        let pending = std::mem::take(&mut self.pending);
        tracing::debug!(count = pending.len(), "resolving pending edges");

        for edge in pending {
            match self.resolve_slot(source, edge.consumer) {
                Resolution::Target(target) => {
                    if builder.connect_coerced(&edge.node, &edge.port, &target.node, target.output.as_deref())? {
                        continue;
                    }
                    let from = builder
                        .output_shape(&target.node, target.output.as_deref())
                        .map(|s| s.to_string())
                        .unwrap_or_default();
                    let to = builder
                        .port_shape(&edge.node, &edge.port)
                        .map(|s| s.to_string())
                        .unwrap_or_default();
                    diagnostics.report(
                        edge.consumer.node,
                        Severity::Warning,
                        DiagnosticKind::TypeError,
                        format!("cannot connect {from} to {to} input '{}.{}'", edge.node, edge.port),
                    );
                }
                Resolution::Cycle => diagnostics.report(
                    edge.consumer.node,
                    Severity::Warning,
                    DiagnosticKind::UnsupportedConstruct,
                    format!("connection into '{}.{}' loops back on itself", edge.node, edge.port),
                ),
                Resolution::Unresolved => {}
            }
            fallback(source, builder, &edge)?;
        }
        Ok(())
    }
}

/// Write the consumer's authored literal, or drop the port when there is none.
fn fallback(source: &Graph, builder: &mut GraphBuilder, edge: &PendingEdge) -> Result<(), BuilderError> {
    let authored = source
        .node(edge.consumer.node)
        .and_then(|n| n.port(&edge.consumer.port))
        .and_then(|p| p.default_value.as_ref());
    let shape = builder.port_shape(&edge.node, &edge.port);

    if let (Some(value), Some(shape)) = (authored, shape) {
        let (value, natural) = Value::from_port_value(value);
        if let Some(value) = value.coerce(natural, shape) {
            return builder.add_port_value(&edge.node, &edge.port, shape, value);
        }
    }
    builder.remove_port(&edge.node, &edge.port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeFlags;
    use ordoplay_shader_graph::graphs::material::create_material_registry;
    use ordoplay_shader_graph::{Node, PortValue};

    fn node(type_id: &str) -> Node {
        create_material_registry().create_node(type_id).unwrap()
    }

    fn out_slot(graph: &Graph, id: ordoplay_shader_graph::NodeId, name: &str) -> SlotRef {
        SlotRef::new(id, graph.node(id).unwrap().output_named(name).unwrap().id)
    }

    fn in_slot(graph: &Graph, id: ordoplay_shader_graph::NodeId, name: &str) -> SlotRef {
        SlotRef::new(id, graph.node(id).unwrap().input_named(name).unwrap().id)
    }

    #[test]
    fn test_redirect_chain_resolves() {
        let mut graph = Graph::new("test");
        let c = graph.add_node(node("float_constant"));
        let r1 = graph.add_node(node("reroute"));
        let r2 = graph.add_node(node("reroute"));
        let s = graph.add_node(node("sin"));
        graph.connect_named(c, "Value", r1, "In").unwrap();
        graph.connect_named(r1, "Out", r2, "In").unwrap();
        graph.connect_named(r2, "Out", s, "Angle").unwrap();

        let mut edges = ExternalEdgeMap::default();
        edges.add_external_port(out_slot(&graph, c, "Value"), "constant_1", None);
        edges.add_external_edge(out_slot(&graph, r1, "Out"), in_slot(&graph, r1, "In"));
        edges.add_external_edge(out_slot(&graph, r2, "Out"), in_slot(&graph, r2, "In"));

        assert_eq!(
            edges.resolve_slot(&graph, in_slot(&graph, s, "Angle")),
            Resolution::Target(Target { node: "constant_1".into(), output: None })
        );
    }

    #[test]
    fn test_redirect_cycle_is_detected() {
        let mut graph = Graph::new("test");
        let r1 = graph.add_node(node("reroute"));
        let r2 = graph.add_node(node("reroute"));
        let s = graph.add_node(node("sin"));
        graph.connect_named(r1, "Out", r2, "In").unwrap();
        graph.connect_named(r2, "Out", r1, "In").unwrap();
        graph.connect_named(r2, "Out", s, "Angle").unwrap();

        let mut edges = ExternalEdgeMap::default();
        edges.add_external_edge(out_slot(&graph, r1, "Out"), in_slot(&graph, r1, "In"));
        edges.add_external_edge(out_slot(&graph, r2, "Out"), in_slot(&graph, r2, "In"));
        assert_eq!(edges.resolve_slot(&graph, in_slot(&graph, s, "Angle")), Resolution::Cycle);

        let mut builder = GraphBuilder::new("test");
        builder.add_node("sin_1", "sin", Shape::Float, NodeFlags::default()).unwrap();
        edges
            .add_external_port_and_edge(&mut builder, in_slot(&graph, s, "Angle"), "sin_1", "in", Shape::Float)
            .unwrap();
        let mut diagnostics = Diagnostics::new();
        edges.finalize(&graph, &mut builder, &mut diagnostics).unwrap();

        assert_eq!(diagnostics.of_kind(DiagnosticKind::UnsupportedConstruct).count(), 1);
        // Angle has no authored default, so the port is dropped
        assert!(builder.graph().node("sin_1").unwrap().port("in").is_none());
    }

    #[test]
    fn test_unconnected_input_takes_authored_literal() {
        let mut graph = Graph::new("test");
        let p = graph.add_node(node("power").with_value("Exponent", PortValue::Float(3.0)));

        let mut builder = GraphBuilder::new("test");
        builder.add_node("power_1", "power", Shape::Float, NodeFlags::default()).unwrap();
        let mut edges = ExternalEdgeMap::default();
        edges
            .add_external_port_and_edge(&mut builder, in_slot(&graph, p, "Exponent"), "power_1", "in2", Shape::Float)
            .unwrap();
        edges.finalize(&graph, &mut builder, &mut Diagnostics::new()).unwrap();

        assert_eq!(
            builder.graph().node("power_1").unwrap().literal("in2"),
            Some(&Value::Float(3.0))
        );
    }
}
