// SPDX-License-Identifier: MIT OR Apache-2.0
//! Destination graph: a MaterialX-style node graph plus its material roots.

use crate::shape::{Shape, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Marker flags on a destination node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    /// Node only holds a literal `value`
    pub constant: bool,
    /// Node reads a renderer-provided property (UV, position, time)
    pub system_input: bool,
}

impl NodeFlags {
    /// Flags for a constant node
    pub const CONSTANT: Self = Self { constant: true, system_input: false };
    /// Flags for an implicit property node
    pub const SYSTEM_INPUT: Self = Self { constant: false, system_input: true };
}

/// What a destination port is bound to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortBinding {
    /// Declared but not yet given a value
    Unset,
    /// Literal value
    Literal(Value),
    /// Awaiting resolution of a source-graph connection
    Pending,
    /// Connected to an upstream node output
    Connected {
        /// Upstream node name
        node: String,
        /// Named output on a multi-output node
        output: Option<String>,
    },
    /// Root port reading a nodegraph output
    GraphOutput(String),
}

impl PortBinding {
    /// Literal payload, if any
    pub fn literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Upstream node name, if connected
    pub fn upstream(&self) -> Option<&str> {
        match self {
            Self::Connected { node, .. } => Some(node),
            _ => None,
        }
    }
}

/// An input port on a destination node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestPort {
    /// Declared port shape
    pub shape: Shape,
    /// Current binding
    pub binding: PortBinding,
}

/// A node in the destination graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestNode {
    /// Category, e.g. `add`, `image`, `UsdPreviewSurface`
    pub category: String,
    /// Declared output shape
    pub shape: Shape,
    /// Input ports in declaration order
    pub ports: IndexMap<String, DestPort>,
    /// Named outputs of a multi-output node
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Shape>,
    /// Marker flags
    #[serde(default)]
    pub flags: NodeFlags,
}

impl DestNode {
    /// Create a node with no ports
    pub fn new(category: impl Into<String>, shape: Shape, flags: NodeFlags) -> Self {
        Self {
            category: category.into(),
            shape,
            ports: IndexMap::new(),
            outputs: IndexMap::new(),
            flags,
        }
    }

    /// Get a port by name
    pub fn port(&self, name: &str) -> Option<&DestPort> {
        self.ports.get(name)
    }

    /// Literal bound to a port, if any
    pub fn literal(&self, name: &str) -> Option<&Value> {
        self.ports.get(name).and_then(|p| p.binding.literal())
    }

    /// Shape produced at `output` (`None` for the node's single output)
    pub fn output_shape(&self, output: Option<&str>) -> Option<Shape> {
        match output {
            None => Some(self.shape),
            Some(name) => self.outputs.get(name).copied(),
        }
    }
}

/// A named output of the nodegraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphOutput {
    /// Output shape
    pub shape: Shape,
    /// Node feeding the output
    pub node: String,
    /// Named output on that node
    pub output: Option<String>,
}

/// Derived view of a connection inside the nodegraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Upstream node
    pub from_node: String,
    /// Named output on the upstream node
    pub from_output: Option<String>,
    /// Downstream node
    pub to_node: String,
    /// Downstream port
    pub to_port: String,
}

/// The translated graph handed to an encoder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationGraph {
    /// Nodegraph name
    pub name: String,
    pub(crate) nodes: IndexMap<String, DestNode>,
    pub(crate) outputs: IndexMap<String, GraphOutput>,
    pub(crate) roots: IndexMap<String, DestNode>,
}

impl DestinationGraph {
    /// Create an empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Get a nodegraph node
    pub fn node(&self, name: &str) -> Option<&DestNode> {
        self.nodes.get(name)
    }

    /// All nodegraph nodes with their names
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &DestNode)> {
        self.nodes.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Number of nodegraph nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Names of nodegraph nodes of one category
    pub fn nodes_of_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.nodes
            .iter()
            .filter(move |(_, node)| node.category == category)
            .map(|(name, _)| name.as_str())
    }

    /// Get a nodegraph output
    pub fn output(&self, name: &str) -> Option<&GraphOutput> {
        self.outputs.get(name)
    }

    /// All nodegraph outputs
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &GraphOutput)> {
        self.outputs.iter().map(|(name, output)| (name.as_str(), output))
    }

    /// Get a root node
    pub fn root(&self, name: &str) -> Option<&DestNode> {
        self.roots.get(name)
    }

    /// All root nodes
    pub fn roots(&self) -> impl Iterator<Item = (&str, &DestNode)> {
        self.roots.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Root nodes of one category
    pub fn roots_of_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = (&'a str, &'a DestNode)> + 'a {
        self.roots().filter(move |(_, node)| node.category == category)
    }

    /// Connections between nodegraph nodes. Root references are not edges.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for (name, node) in &self.nodes {
            for (port, dest_port) in &node.ports {
                if let PortBinding::Connected { node: upstream, output } = &dest_port.binding {
                    edges.push(Edge {
                        from_node: upstream.clone(),
                        from_output: output.clone(),
                        to_node: name.clone(),
                        to_port: port.clone(),
                    });
                }
            }
        }
        edges
    }

    /// Edges arriving at one node
    pub fn edges_into(&self, node: &str) -> Vec<Edge> {
        self.edges().into_iter().filter(|e| e.to_node == node).collect()
    }

    /// Serialize as pretty RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        ron::ser::to_string_pretty(self, config)
    }
}
