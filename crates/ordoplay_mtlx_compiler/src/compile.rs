// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compilation driver.
//!
//! One [`Compiler`] holds the adapter registry, settings and snippet loader
//! and can compile any number of graphs. Each call owns its own builder,
//! edge map and diagnostics, so compilations never share state.

use crate::adapters::{AdapterEnv, AdapterRegistry, BuildContext};
use crate::assembler::{Assembler, StageContributions};
use crate::builder::{BuilderError, GraphBuilder};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
use crate::graph::DestinationGraph;
use crate::resolver::ExternalEdgeMap;
use crate::settings::CompilerSettings;
use crate::snippets::{FsSnippetLoader, SnippetLoader};
use indexmap::{IndexMap, IndexSet};
use ordoplay_shader_graph::{Graph, NodeId};

/// Fatal compilation error
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// An adapter or the assembler broke a builder invariant
    #[error("graph construction failed: {0}")]
    Builder(#[from] BuilderError),
}

/// Result of a successful compilation
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Translated graph
    pub graph: DestinationGraph,
    /// Everything reported along the way
    pub diagnostics: Diagnostics,
}

/// Translates source graphs with a fixed registry and settings
pub struct Compiler {
    registry: AdapterRegistry,
    settings: CompilerSettings,
    loader: Box<dyn SnippetLoader>,
}

impl Compiler {
    /// Compiler with the default adapters, reading snippet resources from
    /// the settings' search paths
    pub fn new(settings: CompilerSettings) -> Self {
        let loader = FsSnippetLoader::new(settings.snippet_paths.iter().cloned());
        Self {
            registry: AdapterRegistry::with_defaults(),
            settings,
            loader: Box::new(loader),
        }
    }

    /// Replace the snippet loader
    pub fn with_loader(mut self, loader: impl SnippetLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Replace the adapter registry
    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Settings in use
    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Adapters in use
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    fn env<'a>(&'a self, source: &'a Graph) -> AdapterEnv<'a> {
        AdapterEnv { settings: &self.settings, loader: self.loader.as_ref(), source }
    }

    /// Translate `source`. Recoverable problems are returned as diagnostics
    /// alongside the graph; only builder invariant violations fail.
    pub fn compile(&self, source: &Graph) -> Result<CompileOutput, CompileError> {
        let _span = tracing::info_span!("compile", graph = %source.name).entered();
        let env = self.env(source);
        let mut builder = GraphBuilder::new(source.name.clone());
        let mut edges = ExternalEdgeMap::new(self.settings.max_redirect_depth);
        let mut diagnostics = Diagnostics::new();
        let mut stages = StageContributions::new();

        for id in self.dispatch_order(source, &mut diagnostics) {
            let Some(node) = source.node(id) else {
                continue;
            };
            let Some(adapter) = self.registry.get(&node.node_type) else {
                diagnostics.unsupported_node(id, format!("'{}': no translation for node type '{}'", node.name, node.node_type));
                continue;
            };
            let details = adapter.support_details(node, &env);
            if !details.is_empty() {
                diagnostics.unsupported_node(id, format!("'{}': {details}", node.name));
                continue;
            }
            tracing::debug!(node = %id, node_type = %node.node_type, "dispatching");
            let mut ctx = BuildContext {
                env,
                builder: &mut builder,
                edges: &mut edges,
                diagnostics: &mut diagnostics,
                stages: &mut stages,
            };
            adapter.build(node, &mut ctx)?;
        }

        edges.finalize(source, &mut builder, &mut diagnostics)?;
        Assembler::new(&self.settings, &stages).assemble(&mut builder, &mut diagnostics)?;
        let graph = builder.finish()?;

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edges().len(),
            diagnostics = diagnostics.len(),
            "compiled material graph"
        );
        Ok(CompileOutput { graph, diagnostics })
    }

    /// Nodes to dispatch, producers first. When the graph has a cycle, nodes
    /// on it are reported and left out unless they only redirect.
    fn dispatch_order(&self, source: &Graph, diagnostics: &mut Diagnostics) -> Vec<NodeId> {
        if let Ok(order) = source.reachable_from_outputs() {
            return order;
        }
        let reachable = source.reachable_set();
        let cyclic = cyclic_nodes(source, &reachable);
        let mut order = Vec::with_capacity(reachable.len());
        for id in reachable {
            let redirect = source
                .node(id)
                .and_then(|n| self.registry.get(&n.node_type))
                .is_some_and(|a| a.is_redirect());
            if cyclic.contains(&id) && !redirect {
                diagnostics.report(
                    id,
                    Severity::Warning,
                    DiagnosticKind::UnsupportedConstruct,
                    "node feeds back into its own inputs",
                );
                continue;
            }
            order.push(id);
        }
        order
    }

    /// Support details and dry-run problems for one node
    pub fn validate_node(&self, source: &Graph, id: NodeId) -> Vec<Diagnostic> {
        let Some(node) = source.node(id) else {
            return Vec::new();
        };
        let unsupported = |message: String| Diagnostic {
            severity: Severity::Warning,
            kind: DiagnosticKind::UnsupportedNode,
            message,
            node: Some(id),
        };
        let Some(adapter) = self.registry.get(&node.node_type) else {
            return vec![unsupported(format!("'{}': no translation for node type '{}'", node.name, node.node_type))];
        };
        let env = self.env(source);
        let details = adapter.support_details(node, &env);
        if !details.is_empty() {
            return vec![unsupported(format!("'{}': {details}", node.name))];
        }
        adapter.check(node, &env)
    }

    /// [`Self::validate_node`] over every node, without building anything
    pub fn validate_graph(&self, source: &Graph) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for node in source.nodes() {
            for diagnostic in self.validate_node(source, node.id) {
                diagnostics.push(diagnostic);
            }
        }
        diagnostics
    }
}

/// Nodes that can reach themselves through connections
fn cyclic_nodes(source: &Graph, nodes: &IndexSet<NodeId>) -> IndexSet<NodeId> {
    let mut upstream: IndexMap<NodeId, Vec<NodeId>> = IndexMap::new();
    for connection in source.connections() {
        upstream.entry(connection.to_node).or_default().push(connection.from_node);
    }

    let mut cyclic = IndexSet::new();
    for &start in nodes {
        let mut seen = IndexSet::new();
        let mut stack: Vec<NodeId> = upstream.get(&start).cloned().unwrap_or_default();
        while let Some(id) = stack.pop() {
            if id == start {
                cyclic.insert(start);
                break;
            }
            if seen.insert(id) {
                stack.extend(upstream.get(&id).into_iter().flatten().copied());
            }
        }
    }
    cyclic
}
