// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-node-type translation recipes.
//!
//! Every source node type the compiler understands has a [`NodeAdapter`]
//! registered under its type id. Adapters create destination nodes through
//! the [`BuildContext`], register which destination output stands in for
//! each of their source outputs, and ask for their inputs to be wired once
//! every producer is known.

mod constants;
mod custom;
mod inputs;
mod math;
mod recipes;
mod stages;
mod texture;

pub use constants::{CombineAdapter, ConstantAdapter, SplitAdapter};
pub use custom::{CustomCodeAdapter, RerouteAdapter};
pub use inputs::{ImplicitInputAdapter, TimeAdapter};
pub use math::{DirectOp, PortShape};
pub use recipes::SnippetAdapter;
pub use stages::StageBlockAdapter;
pub use texture::{NormalMapAdapter, TextureSampleAdapter};

use crate::assembler::StageContributions;
use crate::builder::{BuilderError, GraphBuilder};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::graph::NodeFlags;
use crate::resolver::ExternalEdgeMap;
use crate::settings::CompilerSettings;
use crate::shape::{Shape, Value};
use crate::snippets::SnippetLoader;
use indexmap::IndexMap;
use ordoplay_shader_graph::{Graph, Node, PortValue, SlotRef};

/// Read-only inputs shared by every adapter during one compilation
#[derive(Clone, Copy)]
pub struct AdapterEnv<'a> {
    /// Compiler settings
    pub settings: &'a CompilerSettings,
    /// Source of snippet resources
    pub loader: &'a dyn SnippetLoader,
    /// Graph being compiled
    pub source: &'a Graph,
}

impl<'a> AdapterEnv<'a> {
    /// Slot of a named input
    pub fn input_slot(&self, node: &Node, input: &str) -> Option<SlotRef> {
        node.input_named(input).map(|p| SlotRef::new(node.id, p.id))
    }

    /// Slot of a named output
    pub fn output_slot(&self, node: &Node, output: &str) -> Option<SlotRef> {
        node.output_named(output).map(|p| SlotRef::new(node.id, p.id))
    }

    /// Destination shape of a named input, with dynamic types resolved
    pub fn input_shape(&self, node: &Node, input: &str) -> Shape {
        self.input_slot(node, input)
            .map_or(Shape::Float, |slot| Shape::from_port_type(&self.source.resolved_type(slot)))
    }

    /// Destination shape of a named output, with dynamic types resolved
    pub fn output_shape(&self, node: &Node, output: &str) -> Shape {
        self.output_slot(node, output)
            .map_or(Shape::Float, |slot| Shape::from_port_type(&self.source.resolved_type(slot)))
    }

    /// Whether a named input has a producer
    pub fn is_connected(&self, node: &Node, input: &str) -> bool {
        self.input_slot(node, input)
            .is_some_and(|slot| self.source.producer_of(slot).is_some())
    }

    /// Whether anything reads a named output
    pub fn output_used(&self, node: &Node, output: &str) -> bool {
        self.output_slot(node, output)
            .is_some_and(|slot| self.source.connections().any(|c| c.from_slot() == slot))
    }

    /// Authored literal of a named input
    pub fn authored<'n>(&self, node: &'n Node, input: &str) -> Option<&'n PortValue> {
        node.input_named(input).and_then(|p| p.default_value.as_ref())
    }
}

/// Mutable state an adapter builds into
pub struct BuildContext<'a> {
    /// Read-only inputs
    pub env: AdapterEnv<'a>,
    /// Destination graph under construction
    pub builder: &'a mut GraphBuilder,
    /// Deferred connections
    pub edges: &'a mut ExternalEdgeMap,
    /// Diagnostic sink
    pub diagnostics: &'a mut Diagnostics,
    /// Stage block contributions
    pub stages: &'a mut StageContributions,
}

impl<'a> BuildContext<'a> {
    /// Deterministic destination name for a node created on behalf of `node`
    pub fn name(&mut self, node: &Node, hint: &str) -> String {
        self.builder.derived_name(node.id, hint)
    }

    /// Feed a destination port from whatever feeds a source input. Unknown
    /// inputs are ignored.
    pub fn wire_input(
        &mut self,
        node: &Node,
        input: &str,
        dest: &str,
        port: &str,
        shape: Shape,
    ) -> Result<(), BuilderError> {
        match self.env.input_slot(node, input) {
            Some(slot) => self.edges.add_external_port_and_edge(self.builder, slot, dest, port, shape),
            None => Ok(()),
        }
    }

    /// Register `dest` as the producer of a source output
    pub fn expose_output(&mut self, node: &Node, output: &str, dest: &str, dest_output: Option<&str>) {
        if let Some(slot) = self.env.output_slot(node, output) {
            self.edges.add_external_port(slot, dest, dest_output);
        }
    }

    /// Make a source output produce whatever a source input resolves to
    pub fn redirect(&mut self, node: &Node, output: &str, input: &str) {
        if let (Some(from), Some(to)) = (self.env.output_slot(node, output), self.env.input_slot(node, input)) {
            self.edges.add_external_edge(from, to);
        }
    }

    /// Expose component outputs of `source` (e.g. `R`, `G`, `B`, `A`) as
    /// `extract` nodes. Only outputs something reads are created.
    pub fn expose_components(
        &mut self,
        node: &Node,
        source: &str,
        components: &[(&str, i32)],
    ) -> Result<(), BuilderError> {
        let shape = self
            .builder
            .output_shape(source, None)
            .ok_or_else(|| BuilderError::MissingNode(source.to_string()))?;
        for (output, index) in components {
            if !self.env.output_used(node, output) {
                continue;
            }
            let name = self.name(node, &format!("extract_{}", output.to_lowercase()));
            self.builder.add_node(&name, "extract", Shape::Float, NodeFlags::default())?;
            self.builder.add_port_and_edge(&name, "in", shape, source, None)?;
            self.builder.add_port_value(&name, "index", Shape::Integer, Value::Integer(*index))?;
            self.expose_output(node, output, &name, None);
        }
        Ok(())
    }
}

/// Translation recipe for one source node type
pub trait NodeAdapter: Send + Sync {
    /// Why `node` cannot be translated, or an empty string when it can.
    /// Must not touch any compilation state.
    fn support_details(&self, _node: &Node, _env: &AdapterEnv<'_>) -> String {
        String::new()
    }

    /// Whether `node` can be translated
    fn is_supported(&self, node: &Node, env: &AdapterEnv<'_>) -> bool {
        self.support_details(node, env).is_empty()
    }

    /// Whether the adapter only forwards outputs to inputs and creates no
    /// destination nodes
    fn is_redirect(&self) -> bool {
        false
    }

    /// Create destination nodes for `node`
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError>;

    /// Problems found without building, for validation-only callers
    fn check(&self, _node: &Node, _env: &AdapterEnv<'_>) -> Vec<Diagnostic> {
        Vec::new()
    }
}

/// Registry of adapters by source node type id
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: IndexMap<String, Box<dyn NodeAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for the type
    pub fn register(&mut self, type_id: impl Into<String>, adapter: impl NodeAdapter + 'static) {
        self.adapters.insert(type_id.into(), Box::new(adapter));
    }

    /// Adapter for a type id
    pub fn get(&self, type_id: &str) -> Option<&dyn NodeAdapter> {
        self.adapters.get(type_id).map(Box::as_ref)
    }

    /// Whether a type id has an adapter
    pub fn contains(&self, type_id: &str) -> bool {
        self.adapters.contains_key(type_id)
    }

    /// Registered type ids
    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    /// Number of registered adapters
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapter is registered
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Registry with every built-in recipe for the material node vocabulary
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        constants::register(&mut registry);
        math::register(&mut registry);
        inputs::register(&mut registry);
        texture::register(&mut registry);
        recipes::register(&mut registry);
        custom::register(&mut registry);
        stages::register(&mut registry);
        tracing::debug!(count = registry.len(), "registered default adapters");
        registry
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::graph::DestinationGraph;
    use crate::resolver::Resolution;
    use crate::snippets::MemorySnippetLoader;
    use ordoplay_shader_graph::graphs::material::create_material_registry;

    pub(crate) fn node(type_id: &str) -> Node {
        create_material_registry().create_node(type_id).unwrap()
    }

    /// Build every node of `source` with the default registry and expose the
    /// listed source outputs as graph outputs `out0`, `out1`, ...
    pub(crate) fn build_all(
        source: &Graph,
        settings: &CompilerSettings,
        exposed: &[(ordoplay_shader_graph::NodeId, &str)],
    ) -> (DestinationGraph, Diagnostics) {
        let registry = AdapterRegistry::with_defaults();
        let loader = MemorySnippetLoader::new();
        let mut builder = GraphBuilder::new("test");
        let mut edges = ExternalEdgeMap::default();
        let mut diagnostics = Diagnostics::new();
        let mut stages = StageContributions::new();
        let env = AdapterEnv { settings, loader: &loader, source };

        for node in source.nodes() {
            let adapter = registry.get(&node.node_type).unwrap();
            let mut ctx = BuildContext {
                env,
                builder: &mut builder,
                edges: &mut edges,
                diagnostics: &mut diagnostics,
                stages: &mut stages,
            };
            adapter.build(node, &mut ctx).unwrap();
        }
        for (i, (id, output)) in exposed.iter().enumerate() {
            let n = source.node(*id).unwrap();
            let slot = SlotRef::new(*id, n.output_named(output).unwrap().id);
            let name = format!("probe_{i}");
            let shape = Shape::from_port_type(&source.resolved_type(slot));
            builder.add_node(&name, "dot", shape, NodeFlags::default()).unwrap();
            if let Resolution::Target(t) = edges.resolve_slot(source, slot) {
                builder.add_port_and_edge(&name, "in", shape, &t.node, t.output.as_deref()).unwrap();
            }
        }
        edges.finalize(source, &mut builder, &mut diagnostics).unwrap();
        for i in 0..exposed.len() {
            let name = format!("probe_{i}");
            let shape = builder.output_shape(&name, None).unwrap();
            builder.add_graph_output(&format!("out{i}"), shape, &name, None).unwrap();
        }
        (builder.finish().unwrap(), diagnostics)
    }
}
