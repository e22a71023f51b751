// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.

use crate::connection::{Connection, ConnectionId, SlotRef};
use crate::node::{Node, NodeId};
use crate::port::{PortDirection, PortId, PortType};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Recursion bound when resolving dynamic (`Any`) port types upstream.
const MAX_TYPE_RESOLVE_DEPTH: usize = 64;

/// A shader node graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: IndexMap<ConnectionId, Connection>,
    /// Nodes whose inputs define what the graph produces
    #[serde(default)]
    outputs: Vec<NodeId>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            outputs: Vec::new(),
        }
    }

    /// Load a graph from a RON file
    pub fn load(path: &Path) -> Result<Self, GraphIoError> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    /// Save the graph to a RON file
    pub fn save(&self, path: &Path) -> Result<(), GraphIoError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Add a node and mark it as an active output
    pub fn add_output_node(&mut self, node: Node) -> NodeId {
        let id = self.add_node(node);
        self.mark_output(id);
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.connections.retain(|_, c| !c.involves_node(node_id));
        self.outputs.retain(|id| *id != node_id);
        self.nodes.swap_remove(&node_id)
    }

    /// Declare a node as an active output of the graph
    pub fn mark_output(&mut self, node_id: NodeId) {
        if !self.outputs.contains(&node_id) {
            self.outputs.push(node_id);
        }
    }

    /// Active output nodes, in declaration order
    pub fn active_outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect an output port to an input port, addressing both by name
    pub fn connect_named(
        &mut self,
        from_node: NodeId,
        from_port: &str,
        to_node: NodeId,
        to_port: &str,
    ) -> Result<ConnectionId, ConnectionError> {
        let from = self
            .nodes
            .get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?
            .output_named(from_port)
            .ok_or_else(|| ConnectionError::PortNameNotFound(from_port.to_string()))?
            .id;
        let to = self
            .nodes
            .get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?
            .input_named(to_port)
            .ok_or_else(|| ConnectionError::PortNameNotFound(to_port.to_string()))?
            .id;
        self.connect(from_node, from, to_node, to)
    }

    /// Add a connection between ports
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: PortId,
        to_node: NodeId,
        to_port: PortId,
    ) -> Result<ConnectionId, ConnectionError> {
        let source_node = self.nodes.get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self.nodes.get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;

        let source_port = source_node.port(&from_port)
            .ok_or(ConnectionError::PortNotFound(from_port))?;
        let target_port = target_node.port(&to_port)
            .ok_or(ConnectionError::PortNotFound(to_port))?;

        if source_port.direction != PortDirection::Output
            || target_port.direction != PortDirection::Input
        {
            return Err(ConnectionError::WrongDirection);
        }

        if !source_port.can_connect(target_port) {
            return Err(ConnectionError::IncompatiblePorts);
        }

        // Inputs take a single producer
        let target = SlotRef::new(to_node, to_port);
        if self.connections.values().any(|c| c.to_slot() == target) {
            return Err(ConnectionError::PortAlreadyConnected(to_port));
        }

        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        let connection = Connection::new(from_node, from_port, to_node, to_port);
        let id = connection.id;
        self.connections.insert(id, connection);
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.connections.swap_remove(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The output slot feeding an input slot, if the input is connected
    pub fn producer_of(&self, input: SlotRef) -> Option<SlotRef> {
        self.connections
            .values()
            .find(|c| c.to_slot() == input)
            .map(Connection::from_slot)
    }

    /// Direction of a slot, or `None` if the slot does not exist
    pub fn slot_direction(&self, slot: SlotRef) -> Option<PortDirection> {
        self.node(slot.node)?.port(&slot.port).map(|p| p.direction)
    }

    /// Concrete type of a slot, resolving dynamic ports from what feeds them.
    ///
    /// A dynamic output takes the widest type among its node's inputs; a
    /// dynamic input takes its producer's type, then its literal's type.
    /// Anything unresolvable is treated as a float.
    pub fn resolved_type(&self, slot: SlotRef) -> PortType {
        self.resolve_type_at(slot, 0)
    }

    fn resolve_type_at(&self, slot: SlotRef, depth: usize) -> PortType {
        let Some(node) = self.node(slot.node) else {
            return PortType::Float;
        };
        let Some(port) = node.port(&slot.port) else {
            return PortType::Float;
        };
        if port.port_type != PortType::Any {
            return port.port_type.clone();
        }
        if depth >= MAX_TYPE_RESOLVE_DEPTH {
            return PortType::Float;
        }
        match port.direction {
            PortDirection::Input => {
                if let Some(producer) = self.producer_of(slot) {
                    self.resolve_type_at(producer, depth + 1)
                } else {
                    port.default_value
                        .as_ref()
                        .map(|v| v.port_type())
                        .unwrap_or(PortType::Float)
                }
            }
            PortDirection::Output => node
                .inputs
                .iter()
                .map(|input| self.resolve_type_at(SlotRef::new(node.id, input.id), depth + 1))
                .fold(PortType::Float, |widest, ty| {
                    if ty.arity().unwrap_or(0) > widest.arity().unwrap_or(0) {
                        ty
                    } else {
                        widest
                    }
                }),
        }
    }

    /// Nodes reachable upstream from the active outputs
    pub fn reachable_set(&self) -> IndexSet<NodeId> {
        let mut seen = IndexSet::new();
        let mut stack: Vec<NodeId> = self.outputs.clone();
        while let Some(node_id) = stack.pop() {
            if !self.nodes.contains_key(&node_id) || !seen.insert(node_id) {
                continue;
            }
            for connection in self.connections.values() {
                if connection.to_node == node_id {
                    stack.push(connection.from_node);
                }
            }
        }
        seen
    }

    /// Nodes reachable from the active outputs, producers before consumers
    pub fn reachable_from_outputs(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut visited = HashSet::new();
        let mut temp_mark = HashSet::new();
        let mut order = Vec::new();

        for node_id in &self.outputs {
            if self.nodes.contains_key(node_id) && !visited.contains(node_id) {
                self.visit(*node_id, &mut visited, &mut temp_mark, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node_id: NodeId,
        visited: &mut HashSet<NodeId>,
        temp_mark: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<(), CycleError> {
        if temp_mark.contains(&node_id) {
            return Err(CycleError);
        }
        if visited.contains(&node_id) {
            return Ok(());
        }

        temp_mark.insert(node_id);

        // Visit all nodes that this node depends on
        for connection in self.connections.values() {
            if connection.to_node == node_id {
                self.visit(connection.from_node, visited, temp_mark, order)?;
            }
        }

        temp_mark.remove(&node_id);
        visited.insert(node_id);
        order.push(node_id);

        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when creating a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0:?}")]
    PortNotFound(PortId),

    /// Port name not found on the node
    #[error("Port not found: {0}")]
    PortNameNotFound(String),

    /// Connection must run from an output to an input
    #[error("Connections must run from an output to an input")]
    WrongDirection,

    /// Incompatible port types
    #[error("Incompatible port types")]
    IncompatiblePorts,

    /// Port is already connected
    #[error("Port already connected: {0:?}")]
    PortAlreadyConnected(PortId),

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}

/// Error when graph contains a cycle
#[derive(Debug, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;

/// Error reading or writing a graph file
#[derive(Debug, thiserror::Error)]
pub enum GraphIoError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RON
    #[error("Invalid graph file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization failure
    #[error("Could not serialize graph: {0}")]
    Serialize(#[from] ron::Error),
}
