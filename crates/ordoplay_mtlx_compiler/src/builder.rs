// SPDX-License-Identifier: MIT OR Apache-2.0
//! Incremental construction of the destination graph.
//!
//! Every creation call is get-or-create: asking twice for the same node or
//! port returns what already exists. Ports carry at most one of a literal or
//! a connection, and writing one over the other is a [`BuilderError`].

use crate::graph::{DestNode, DestPort, DestinationGraph, GraphOutput, NodeFlags, PortBinding};
use crate::shape::{coercion, Coercion, Shape, Value};
use indexmap::{IndexMap, IndexSet};
use ordoplay_shader_graph::NodeId;
use std::collections::HashMap;

/// Renderer-provided properties that exist once per destination graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemInput {
    /// Primary UV set
    Texcoord,
    /// World-space position
    Position,
    /// Object-space position
    ObjectPosition,
    /// World-space normal
    Normal,
    /// World-space tangent
    Tangent,
    /// Direction from the surface towards the viewer
    ViewDirection,
    /// Vertex color attribute
    VertexColor,
    /// Seconds since start
    Time,
    /// Frame number
    Frame,
}

impl SystemInput {
    /// Destination node category
    pub fn category(self) -> &'static str {
        match self {
            Self::Texcoord => "texcoord",
            Self::Position | Self::ObjectPosition => "position",
            Self::Normal => "normal",
            Self::Tangent => "tangent",
            Self::ViewDirection => "viewdirection",
            Self::VertexColor => "geomcolor",
            Self::Time => "time",
            Self::Frame => "frame",
        }
    }

    /// Output shape of the property node
    pub fn shape(self) -> Shape {
        match self {
            Self::Texcoord => Shape::Vector2,
            Self::Position
            | Self::ObjectPosition
            | Self::Normal
            | Self::Tangent
            | Self::ViewDirection => Shape::Vector3,
            Self::VertexColor => Shape::Color4,
            Self::Time | Self::Frame => Shape::Float,
        }
    }

    /// Fixed name of the shared node
    pub fn node_name(self) -> &'static str {
        match self {
            Self::Texcoord => "implicit_texcoord",
            Self::Position => "implicit_position_world",
            Self::ObjectPosition => "implicit_position_object",
            Self::Normal => "implicit_normal",
            Self::Tangent => "implicit_tangent",
            Self::ViewDirection => "implicit_viewdirection",
            Self::VertexColor => "implicit_geomcolor",
            Self::Time => "implicit_time",
            Self::Frame => "implicit_frame",
        }
    }

    fn fixed_ports(self) -> Vec<(&'static str, Shape, Value)> {
        let space = |s: &str| ("space", Shape::String, Value::String(s.to_string()));
        match self {
            Self::Texcoord | Self::VertexColor => vec![("index", Shape::Integer, Value::Integer(0))],
            Self::Position | Self::Normal | Self::Tangent | Self::ViewDirection => vec![space("world")],
            Self::ObjectPosition => vec![space("object")],
            Self::Time | Self::Frame => Vec::new(),
        }
    }
}

/// Builder invariant violation. These indicate a defect in an adapter or in
/// the compiler itself and abort the compilation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuilderError {
    /// A node name was reused for a different kind of node
    #[error("node '{name}' already exists as {existing} and cannot become {requested}")]
    NodeRedefined {
        /// Node name
        name: String,
        /// Existing category and shape
        existing: String,
        /// Requested category and shape
        requested: String,
    },

    /// Referenced node does not exist
    #[error("node '{0}' does not exist")]
    MissingNode(String),

    /// Referenced port does not exist
    #[error("port '{node}.{port}' does not exist")]
    MissingPort {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// Literal and connection requested on the same port
    #[error("port '{node}.{port}' already holds {existing}; cannot bind {requested}")]
    PortConflict {
        /// Node name
        node: String,
        /// Port name
        port: String,
        /// Current binding
        existing: String,
        /// Rejected binding
        requested: String,
    },

    /// Literal does not match the port shape
    #[error("literal '{value}' does not fit port '{node}.{port}' of type {shape}")]
    LiteralShape {
        /// Node name
        node: String,
        /// Port name
        port: String,
        /// Port shape
        shape: Shape,
        /// Offending literal
        value: String,
    },

    /// A pending port survived resolution
    #[error("port '{node}.{port}' is still pending after resolution")]
    UnresolvedPort {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// A graph output name was bound to two different nodes
    #[error("graph output '{0}' is already bound elsewhere")]
    OutputRedefined(String),
}

fn describe(binding: &PortBinding) -> String {
    match binding {
        PortBinding::Unset => "nothing".to_string(),
        PortBinding::Pending => "a pending connection".to_string(),
        PortBinding::Literal(value) => format!("literal '{value}'"),
        PortBinding::Connected { node, output: None } => format!("a connection from '{node}'"),
        PortBinding::Connected { node, output: Some(output) } => {
            format!("a connection from '{node}.{output}'")
        }
        PortBinding::GraphOutput(name) => format!("graph output '{name}'"),
    }
}

fn sanitize(hint: &str) -> String {
    let mut out: String = hint
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'n');
    }
    out
}

/// Writes a binding onto a node port, enforcing port exclusivity.
fn bind_port(
    node_name: &str,
    node: &mut DestNode,
    port: &str,
    shape: Shape,
    binding: PortBinding,
) -> Result<(), BuilderError> {
    let entry = node
        .ports
        .entry(port.to_string())
        .or_insert_with(|| DestPort { shape, binding: PortBinding::Unset });

    let conflict = |existing: &PortBinding, requested: &PortBinding| BuilderError::PortConflict {
        node: node_name.to_string(),
        port: port.to_string(),
        existing: describe(existing),
        requested: describe(requested),
    };

    let binding = match binding {
        PortBinding::Literal(value) => {
            if matches!(
                entry.binding,
                PortBinding::Connected { .. } | PortBinding::GraphOutput(_)
            ) {
                return Err(conflict(&entry.binding, &PortBinding::Literal(value)));
            }
            let value = if entry.shape == shape {
                Some(value)
            } else {
                value.coerce(shape, entry.shape)
            };
            match value {
                Some(value) if value.fits(entry.shape) => PortBinding::Literal(value),
                other => {
                    return Err(BuilderError::LiteralShape {
                        node: node_name.to_string(),
                        port: port.to_string(),
                        shape: entry.shape,
                        value: other.map(|v| v.to_string()).unwrap_or_default(),
                    })
                }
            }
        }
        PortBinding::Pending => match entry.binding {
            PortBinding::Unset | PortBinding::Pending => PortBinding::Pending,
            _ => return Err(conflict(&entry.binding, &PortBinding::Pending)),
        },
        PortBinding::Unset => return Ok(()),
        requested @ (PortBinding::Connected { .. } | PortBinding::GraphOutput(_)) => {
            match &entry.binding {
                PortBinding::Unset | PortBinding::Pending => requested,
                existing if *existing == requested => requested,
                existing => return Err(conflict(existing, &requested)),
            }
        }
    };
    entry.binding = binding;
    Ok(())
}

/// Owns the destination graph and every per-compilation cache.
#[derive(Debug)]
pub struct GraphBuilder {
    graph: DestinationGraph,
    ordinals: HashMap<NodeId, usize>,
    implicit: IndexMap<SystemInput, String>,
}

impl GraphBuilder {
    /// Start an empty destination graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: DestinationGraph::new(name),
            ordinals: HashMap::new(),
            implicit: IndexMap::new(),
        }
    }

    /// Read-only view of the graph under construction
    pub fn graph(&self) -> &DestinationGraph {
        &self.graph
    }

    /// Deterministic destination name for something created on behalf of a
    /// source node. Each source node gets one ordinal, in first-request order.
    pub fn derived_name(&mut self, source: NodeId, hint: &str) -> String {
        let next = self.ordinals.len() + 1;
        let ordinal = *self.ordinals.entry(source).or_insert(next);
        format!("{}_{ordinal}", sanitize(hint))
    }

    /// Whether a nodegraph node exists
    pub fn has_node(&self, name: &str) -> bool {
        self.graph.nodes.contains_key(name)
    }

    /// Get or create a nodegraph node
    pub fn add_node(
        &mut self,
        name: &str,
        category: &str,
        shape: Shape,
        flags: NodeFlags,
    ) -> Result<String, BuilderError> {
        if let Some(existing) = self.graph.nodes.get(name) {
            if existing.category != category || existing.shape != shape {
                return Err(BuilderError::NodeRedefined {
                    name: name.to_string(),
                    existing: format!("{} ({})", existing.category, existing.shape),
                    requested: format!("{category} ({shape})"),
                });
            }
            return Ok(name.to_string());
        }
        tracing::trace!(name, category, %shape, "add node");
        self.graph
            .nodes
            .insert(name.to_string(), DestNode::new(category, shape, flags));
        Ok(name.to_string())
    }

    /// Declare a named output on a multi-output node
    pub fn add_node_output(&mut self, node: &str, output: &str, shape: Shape) -> Result<(), BuilderError> {
        self.node_mut(node)?
            .outputs
            .entry(output.to_string())
            .or_insert(shape);
        Ok(())
    }

    /// Get or create an unbound port
    pub fn add_port(&mut self, node: &str, port: &str, shape: Shape) -> Result<(), BuilderError> {
        self.node_mut(node)?
            .ports
            .entry(port.to_string())
            .or_insert(DestPort { shape, binding: PortBinding::Unset });
        Ok(())
    }

    /// Write a literal. `value` is expressed in `shape` and coerced to the
    /// port's declared shape when the port already exists.
    pub fn add_port_value(
        &mut self,
        node: &str,
        port: &str,
        shape: Shape,
        value: Value,
    ) -> Result<(), BuilderError> {
        let dest = self.graph.nodes.get_mut(node).ok_or_else(|| BuilderError::MissingNode(node.to_string()))?;
        bind_port(node, dest, port, shape, PortBinding::Literal(value))
    }

    /// Write a string literal
    pub fn add_port_string(&mut self, node: &str, port: &str, text: &str) -> Result<(), BuilderError> {
        self.add_port_value(node, port, Shape::String, Value::String(text.to_string()))
    }

    /// Connect an existing port to an upstream node output
    pub fn add_edge(
        &mut self,
        node: &str,
        port: &str,
        upstream: &str,
        output: Option<&str>,
    ) -> Result<(), BuilderError> {
        self.check_upstream(upstream, output)?;
        let dest = self.node_mut(node)?;
        let shape = dest
            .port(port)
            .map(|p| p.shape)
            .ok_or_else(|| BuilderError::MissingPort { node: node.to_string(), port: port.to_string() })?;
        bind_port(
            node,
            dest,
            port,
            shape,
            PortBinding::Connected { node: upstream.to_string(), output: output.map(str::to_string) },
        )
    }

    /// Create a port and connect it in one step
    pub fn add_port_and_edge(
        &mut self,
        node: &str,
        port: &str,
        shape: Shape,
        upstream: &str,
        output: Option<&str>,
    ) -> Result<(), BuilderError> {
        self.add_port(node, port, shape)?;
        self.add_edge(node, port, upstream, output)
    }

    /// Mark a port as awaiting a cross-reference
    pub fn mark_pending(&mut self, node: &str, port: &str, shape: Shape) -> Result<(), BuilderError> {
        let dest = self.node_mut(node)?;
        bind_port(node, dest, port, shape, PortBinding::Pending)
    }

    /// Drop a port so the node's own default applies
    pub fn remove_port(&mut self, node: &str, port: &str) -> Result<(), BuilderError> {
        self.node_mut(node)?.ports.shift_remove(port);
        Ok(())
    }

    /// Declared shape of a port
    pub fn port_shape(&self, node: &str, port: &str) -> Option<Shape> {
        self.graph.nodes.get(node)?.port(port).map(|p| p.shape)
    }

    /// Shape produced by a node output
    pub fn output_shape(&self, node: &str, output: Option<&str>) -> Option<Shape> {
        self.graph.nodes.get(node)?.output_shape(output)
    }

    /// Connect a port to an upstream output, inserting a conversion when the
    /// shapes differ. Returns `false` when no conversion exists.
    pub fn connect_coerced(
        &mut self,
        node: &str,
        port: &str,
        upstream: &str,
        output: Option<&str>,
    ) -> Result<bool, BuilderError> {
        let shape = self
            .port_shape(node, port)
            .ok_or_else(|| BuilderError::MissingPort { node: node.to_string(), port: port.to_string() })?;
        match self.coerced_source(upstream, output, shape)? {
            Some((source, source_output)) => {
                self.add_edge(node, port, &source, source_output.as_deref())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The node output that delivers `upstream` as `shape`, creating the
    /// conversion node if needed. Constants are folded into a new constant.
    pub fn coerced_source(
        &mut self,
        upstream: &str,
        output: Option<&str>,
        shape: Shape,
    ) -> Result<Option<(String, Option<String>)>, BuilderError> {
        let from = self.check_upstream(upstream, output)?;
        let base = match output {
            Some(output) => format!("{upstream}_{}", sanitize(output)),
            None => upstream.to_string(),
        };
        let direct = Some((upstream.to_string(), output.map(str::to_string)));

        match coercion(from, shape) {
            Coercion::Identity => Ok(direct),
            Coercion::Relabel if from.is_text() => Ok(direct),
            Coercion::Incompatible => Ok(None),
            Coercion::Truncate => {
                let name = self.add_node(&format!("{base}_x"), "extract", Shape::Float, NodeFlags::default())?;
                self.add_port_and_edge(&name, "in", from, upstream, output)?;
                self.add_port_value(&name, "index", Shape::Integer, Value::Integer(0))?;
                Ok(Some((name, None)))
            }
            Coercion::Promote | Coercion::Relabel | Coercion::Resize => {
                let folded = self
                    .graph
                    .nodes
                    .get(upstream)
                    .filter(|n| n.flags.constant && output.is_none())
                    .and_then(|n| n.literal("value"))
                    .and_then(|v| v.coerce(from, shape));
                if let Some(value) = folded {
                    let name = self.add_node(&format!("{base}_{shape}"), "constant", shape, NodeFlags::CONSTANT)?;
                    self.add_port_value(&name, "value", shape, value)?;
                    return Ok(Some((name, None)));
                }
                let name = self.add_node(&format!("{base}_to_{shape}"), "convert", shape, NodeFlags::default())?;
                self.add_port_and_edge(&name, "in", from, upstream, output)?;
                Ok(Some((name, None)))
            }
        }
    }

    /// Shared node for a renderer-provided property, created on first use
    pub fn implicit_property(&mut self, input: SystemInput) -> Result<String, BuilderError> {
        if let Some(name) = self.implicit.get(&input) {
            return Ok(name.clone());
        }
        let name = self.add_node(input.node_name(), input.category(), input.shape(), NodeFlags::SYSTEM_INPUT)?;
        for (port, shape, value) in input.fixed_ports() {
            self.add_port_value(&name, port, shape, value)?;
        }
        tracing::debug!(node = %name, "created implicit property");
        self.implicit.insert(input, name.clone());
        Ok(name)
    }

    /// Declare a named nodegraph output
    pub fn add_graph_output(
        &mut self,
        name: &str,
        shape: Shape,
        node: &str,
        output: Option<&str>,
    ) -> Result<(), BuilderError> {
        self.check_upstream(node, output)?;
        let requested = GraphOutput { shape, node: node.to_string(), output: output.map(str::to_string) };
        match self.graph.outputs.get(name) {
            Some(existing) if *existing != requested => Err(BuilderError::OutputRedefined(name.to_string())),
            Some(_) => Ok(()),
            None => {
                self.graph.outputs.insert(name.to_string(), requested);
                Ok(())
            }
        }
    }

    /// Get or create a root node
    pub fn add_root(&mut self, name: &str, category: &str, shape: Shape) -> Result<(), BuilderError> {
        if let Some(existing) = self.graph.roots.get(name) {
            if existing.category != category || existing.shape != shape {
                return Err(BuilderError::NodeRedefined {
                    name: name.to_string(),
                    existing: format!("{} ({})", existing.category, existing.shape),
                    requested: format!("{category} ({shape})"),
                });
            }
            return Ok(());
        }
        self.graph
            .roots
            .insert(name.to_string(), DestNode::new(category, shape, NodeFlags::default()));
        Ok(())
    }

    /// Write a literal onto a root port
    pub fn add_root_value(&mut self, root: &str, port: &str, shape: Shape, value: Value) -> Result<(), BuilderError> {
        let node = self.root_mut(root)?;
        bind_port(root, node, port, shape, PortBinding::Literal(value))
    }

    /// Point a root port at a nodegraph output
    pub fn add_root_output_ref(&mut self, root: &str, port: &str, shape: Shape, output: &str) -> Result<(), BuilderError> {
        if !self.graph.outputs.contains_key(output) {
            return Err(BuilderError::MissingNode(output.to_string()));
        }
        let node = self.root_mut(root)?;
        bind_port(root, node, port, shape, PortBinding::GraphOutput(output.to_string()))
    }

    /// Connect a root port to another root
    pub fn add_root_edge(&mut self, root: &str, port: &str, shape: Shape, upstream_root: &str) -> Result<(), BuilderError> {
        if !self.graph.roots.contains_key(upstream_root) {
            return Err(BuilderError::MissingNode(upstream_root.to_string()));
        }
        let node = self.root_mut(root)?;
        bind_port(
            root,
            node,
            port,
            shape,
            PortBinding::Connected { node: upstream_root.to_string(), output: None },
        )
    }

    /// Check invariants, prune nodes no output depends on and drop unset ports.
    pub fn finish(mut self) -> Result<DestinationGraph, BuilderError> {
        for (name, node) in self.graph.nodes.iter().chain(self.graph.roots.iter()) {
            for (port, dest) in &node.ports {
                if dest.binding == PortBinding::Pending {
                    return Err(BuilderError::UnresolvedPort { node: name.clone(), port: port.clone() });
                }
            }
        }

        let mut live = IndexSet::new();
        let mut stack: Vec<String> = self.graph.outputs.values().map(|o| o.node.clone()).collect();
        while let Some(name) = stack.pop() {
            if !live.insert(name.clone()) {
                continue;
            }
            if let Some(node) = self.graph.nodes.get(&name) {
                stack.extend(node.ports.values().filter_map(|p| p.binding.upstream().map(str::to_string)));
            }
        }
        let before = self.graph.nodes.len();
        self.graph.nodes.retain(|name, _| live.contains(name));
        if before != self.graph.nodes.len() {
            tracing::debug!(pruned = before - self.graph.nodes.len(), "removed unused nodes");
        }

        for node in self.graph.nodes.values_mut().chain(self.graph.roots.values_mut()) {
            node.ports.retain(|_, p| p.binding != PortBinding::Unset);
        }
        Ok(self.graph)
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut DestNode, BuilderError> {
        self.graph
            .nodes
            .get_mut(name)
            .ok_or_else(|| BuilderError::MissingNode(name.to_string()))
    }

    fn root_mut(&mut self, name: &str) -> Result<&mut DestNode, BuilderError> {
        self.graph
            .roots
            .get_mut(name)
            .ok_or_else(|| BuilderError::MissingNode(name.to_string()))
    }

    fn check_upstream(&self, upstream: &str, output: Option<&str>) -> Result<Shape, BuilderError> {
        let node = self
            .graph
            .nodes
            .get(upstream)
            .ok_or_else(|| BuilderError::MissingNode(upstream.to_string()))?;
        node.output_shape(output).ok_or_else(|| BuilderError::MissingPort {
            node: upstream.to_string(),
            port: output.unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with_constant() -> GraphBuilder {
        let mut builder = GraphBuilder::new("test");
        builder.add_node("c", "constant", Shape::Float, NodeFlags::CONSTANT).unwrap();
        builder.add_port_value("c", "value", Shape::Float, Value::Float(0.25)).unwrap();
        builder
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut builder = GraphBuilder::new("test");
        let first = builder.add_node("n", "add", Shape::Float, NodeFlags::default()).unwrap();
        let second = builder.add_node("n", "add", Shape::Float, NodeFlags::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(builder.graph().node_count(), 1);

        let err = builder.add_node("n", "multiply", Shape::Float, NodeFlags::default()).unwrap_err();
        assert!(matches!(err, BuilderError::NodeRedefined { .. }));
    }

    #[test]
    fn test_port_exclusivity() {
        let mut builder = builder_with_constant();
        builder.add_node("s", "sin", Shape::Float, NodeFlags::default()).unwrap();
        builder.add_port_and_edge("s", "in", Shape::Float, "c", None).unwrap();
        // Same edge again is a no-op
        builder.add_edge("s", "in", "c", None).unwrap();

        let err = builder.add_port_value("s", "in", Shape::Float, Value::Float(1.0)).unwrap_err();
        assert!(matches!(err, BuilderError::PortConflict { .. }));

        builder.add_node("t", "cos", Shape::Float, NodeFlags::default()).unwrap();
        builder.add_port_value("t", "in", Shape::Float, Value::Float(1.0)).unwrap();
        let err = builder.add_edge("t", "in", "c", None).unwrap_err();
        assert!(matches!(err, BuilderError::PortConflict { .. }));
    }

    #[test]
    fn test_literal_may_replace_pending() {
        let mut builder = GraphBuilder::new("test");
        builder.add_node("m", "multiply", Shape::Color3, NodeFlags::default()).unwrap();
        builder.mark_pending("m", "in1", Shape::Color3).unwrap();
        builder.add_port_value("m", "in1", Shape::Float, Value::Float(0.5)).unwrap();
        assert_eq!(
            builder.graph().node("m").unwrap().literal("in1"),
            Some(&Value::Tuple(vec![0.5, 0.5, 0.5]))
        );
    }

    #[test]
    fn test_derived_names_share_an_ordinal_per_source() {
        let mut builder = GraphBuilder::new("test");
        let a = NodeId::new();
        let b = NodeId::new();
        assert_eq!(builder.derived_name(a, "Add"), "add_1");
        assert_eq!(builder.derived_name(b, "Add"), "add_2");
        assert_eq!(builder.derived_name(a, "extract r"), "extract_r_1");
    }

    #[test]
    fn test_implicit_property_is_shared() {
        let mut builder = GraphBuilder::new("test");
        let first = builder.implicit_property(SystemInput::Texcoord).unwrap();
        let second = builder.implicit_property(SystemInput::Texcoord).unwrap();
        assert_eq!(first, second);
        assert_eq!(builder.graph().nodes_of_category("texcoord").count(), 1);
        assert_eq!(
            builder.graph().node(&first).unwrap().literal("index"),
            Some(&Value::Integer(0))
        );
    }

    #[test]
    fn test_coercion_inserts_convert() {
        let mut builder = GraphBuilder::new("test");
        builder.add_node("t", "time", Shape::Float, NodeFlags::SYSTEM_INPUT).unwrap();
        builder.add_node("m", "multiply", Shape::Vector3, NodeFlags::default()).unwrap();
        builder.add_port("m", "in1", Shape::Vector3).unwrap();
        assert!(builder.connect_coerced("m", "in1", "t", None).unwrap());

        let edges = builder.graph().edges_into("m");
        assert_eq!(edges[0].from_node, "t_to_vector3");
        assert_eq!(builder.graph().node("t_to_vector3").unwrap().category, "convert");
    }

    #[test]
    fn test_constant_coercion_folds() {
        let mut builder = builder_with_constant();
        let (name, _) = builder.coerced_source("c", None, Shape::Color3).unwrap().unwrap();
        let folded = builder.graph().node(&name).unwrap();
        assert_eq!(folded.category, "constant");
        assert_eq!(folded.literal("value"), Some(&Value::Tuple(vec![0.25, 0.25, 0.25])));
    }

    #[test]
    fn test_incompatible_connection_is_refused() {
        let mut builder = GraphBuilder::new("test");
        builder.add_node("f", "constant", Shape::Filename, NodeFlags::CONSTANT).unwrap();
        builder.add_node("s", "sin", Shape::Float, NodeFlags::default()).unwrap();
        builder.add_port("s", "in", Shape::Float).unwrap();
        assert!(!builder.connect_coerced("s", "in", "f", None).unwrap());
    }

    #[test]
    fn test_finish_prunes_and_rejects_pending() {
        let mut builder = builder_with_constant();
        builder.add_node("unused", "sin", Shape::Float, NodeFlags::default()).unwrap();
        builder.add_port("unused", "in", Shape::Float).unwrap();
        builder.add_graph_output("out", Shape::Float, "c", None).unwrap();
        let graph = builder.finish().unwrap();
        assert!(graph.node("c").is_some());
        assert!(graph.node("unused").is_none());

        let mut builder = builder_with_constant();
        builder.add_node("p", "sin", Shape::Float, NodeFlags::default()).unwrap();
        builder.mark_pending("p", "in", Shape::Float).unwrap();
        assert!(matches!(builder.finish(), Err(BuilderError::UnresolvedPort { .. })));
    }
}
