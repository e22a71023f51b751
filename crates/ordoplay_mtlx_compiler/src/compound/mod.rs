// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler for inline code snippets.
//!
//! Snippets are small C-like programs over a fixed set of named inputs and
//! outputs. [`compile_snippet`] turns one into a [`Subgraph`] of destination
//! nodes with no control flow: loops are unrolled, constant branches folded,
//! and conditional values become selection nodes. Every failure a user can
//! cause is reported as a [`CompoundError`] before lowering starts.

mod ast;
mod bind;
mod builtins;
mod error;
#[cfg(test)]
mod interp;
mod lexer;
mod lower;
mod parser;
mod types;
mod unroll;

pub use error::{CompoundError, CompoundErrorKind};
pub use lower::{Operand, SubNode, Subgraph};

use crate::builder::{BuilderError, GraphBuilder};
use crate::graph::NodeFlags;
use crate::shape::Shape;
use indexmap::IndexMap;
use types::CheckMode;

/// Default iteration budget for the loops of one snippet
pub const MAX_UNROLL_ITERATIONS: usize = 1024;

/// Named, shaped inputs and outputs a snippet is compiled against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    /// Inputs in port order
    pub inputs: Vec<(String, Shape)>,
    /// Outputs in port order
    pub outputs: Vec<(String, Shape)>,
}

impl Signature {
    /// Empty signature
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input
    pub fn input(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.inputs.push((name.into(), shape));
        self
    }

    /// Add an output
    pub fn output(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.outputs.push((name.into(), shape));
        self
    }
}

/// Limits applied while compiling a snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Iterations all loops of one snippet may expand to, nested ones included
    pub max_unroll_iterations: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { max_unroll_iterations: MAX_UNROLL_ITERATIONS }
    }
}

/// Compile snippet text into a data-flow subgraph.
pub fn compile_snippet(src: &str, sig: &Signature, options: &CompileOptions) -> Result<Subgraph, CompoundError> {
    let program = parser::parse_program(src)?;
    let program = bind::bind_program(program, sig)?;
    types::check_program(&program, sig, CheckMode::Structured, src.len())?;
    let program = unroll::unroll_program(program, options.max_unroll_iterations)?;
    types::check_program(&program, sig, CheckMode::Flat, src.len())?;
    let subgraph = lower::lower_program(&program, sig)?;
    tracing::debug!(nodes = subgraph.nodes.len(), outputs = subgraph.outputs.len(), "compiled snippet");
    Ok(subgraph)
}

/// A port of an instantiated subgraph that reads a snippet input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalUse {
    /// Snippet input name
    pub input: String,
    /// Destination node
    pub node: String,
    /// Port on that node
    pub port: String,
    /// Port shape
    pub shape: Shape,
}

/// Names given to a subgraph's nodes in the destination graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    /// Destination name per subgraph node
    pub nodes: Vec<String>,
    /// Output name to its alias node
    pub outputs: IndexMap<String, String>,
    /// Ports the caller must bind to the snippet inputs
    pub external_uses: Vec<ExternalUse>,
}

impl Subgraph {
    /// Create the subgraph's nodes under `prefix`. Ports reading snippet
    /// inputs are left unbound and listed in [`Instance::external_uses`].
    pub fn instantiate(&self, prefix: &str, builder: &mut GraphBuilder) -> Result<Instance, BuilderError> {
        let mut instance = Instance::default();
        for (index, node) in self.nodes.iter().enumerate() {
            let name = match &node.alias {
                Some(alias) => format!("{prefix}_out_{alias}"),
                None => format!("{prefix}_{index}_{}", node.category),
            };
            let name = builder.add_node(&name, &node.category, node.shape, NodeFlags::default())?;

            for (port, shape, operand) in &node.ports {
                match operand {
                    Operand::Node(upstream) => {
                        let upstream = instance
                            .nodes
                            .get(*upstream)
                            .ok_or_else(|| BuilderError::MissingNode(format!("{prefix}[{upstream}]")))?;
                        builder.add_port_and_edge(&name, port, *shape, upstream, None)?;
                    }
                    Operand::Literal(value) => builder.add_port_value(&name, port, *shape, value.clone())?,
                    Operand::Global(input) => {
                        let upstream = builder.implicit_property(*input)?;
                        builder.add_port_and_edge(&name, port, *shape, &upstream, None)?;
                    }
                    Operand::Input(input) => instance.external_uses.push(ExternalUse {
                        input: input.clone(),
                        node: name.clone(),
                        port: port.clone(),
                        shape: *shape,
                    }),
                }
            }
            if let Some(alias) = &node.alias {
                instance.outputs.insert(alias.clone(), name.clone());
            }
            instance.nodes.push(name);
        }
        Ok(instance)
    }
}
