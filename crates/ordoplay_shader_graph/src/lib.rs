// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader node graph model for `OrdoPlay` materials.
//!
//! This crate is the authoring-side representation consumed by the
//! MaterialX translator:
//! - Typed input/output ports with authored literal defaults
//! - Dynamic (`Any`) ports resolved from upstream producers
//! - Connection validation
//! - Traversal from the graph's active outputs
//! - RON serialization

pub mod node;
pub mod port;
pub mod connection;
pub mod graph;
pub mod graphs;

pub use node::{Node, NodeCategory, NodeId, NodeRegistry, NodeType};
pub use port::{Port, PortId, PortType, PortDirection, PortValue};
pub use connection::{Connection, ConnectionId, SlotRef};
pub use graph::{ConnectionError, CycleError, Graph, GraphIoError};
