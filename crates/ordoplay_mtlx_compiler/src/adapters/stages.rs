// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output blocks feeding the shader stages.

use super::{AdapterRegistry, BuildContext, NodeAdapter};
use crate::assembler::Stage;
use crate::builder::BuilderError;
use crate::graph::NodeFlags;
use ordoplay_shader_graph::Node;

/// Output node whose inputs supply logical stage inputs. Each input becomes
/// a collector node the assembler reads once edges are resolved.
#[derive(Debug, Clone, Copy)]
pub struct StageBlockAdapter {
    /// Stage fed
    pub stage: Stage,
    /// Source input name and logical input it supplies
    pub ports: &'static [(&'static str, &'static str)],
    /// Skip unconnected inputs even when they carry a literal
    pub connected_only: bool,
}

impl NodeAdapter for StageBlockAdapter {
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        for (input, logical) in self.ports {
            let connected = ctx.env.is_connected(node, input);
            if !connected && (self.connected_only || ctx.env.authored(node, input).is_none()) {
                continue;
            }
            if ctx.stages.collector(self.stage, logical).is_some() {
                ctx.diagnostics.note(Some(node.id), format!("'{logical}' already supplied by another output block"));
                continue;
            }
            let shape = ctx.env.input_shape(node, input);
            let name = ctx.name(node, &format!("{}_{}", self.stage, logical.to_lowercase()));
            ctx.builder.add_node(&name, "dot", shape, NodeFlags::default())?;
            ctx.stages.collect(self.stage, logical, &name);
            ctx.wire_input(node, input, &name, "in", shape)?;
        }
        Ok(())
    }
}

const SURFACE: &[(&str, &str)] = &[
    ("Base Color", "BaseColor"),
    ("Metallic", "Metallic"),
    ("Smoothness", "Smoothness"),
    ("Normal", "Normal"),
    ("Emission", "Emission"),
    ("Occlusion", "Occlusion"),
    ("Alpha", "Alpha"),
    ("Alpha Clip Threshold", "AlphaClipThreshold"),
];

const UNLIT: &[(&str, &str)] = &[
    ("Color", "BaseColor"),
    ("Alpha", "Alpha"),
    ("Alpha Clip Threshold", "AlphaClipThreshold"),
];

const VERTEX: &[(&str, &str)] = &[("Position", "Position"), ("Normal", "VertexNormal"), ("Tangent", "VertexTangent")];

pub(super) fn register(registry: &mut AdapterRegistry) {
    registry.register(
        "material_output",
        StageBlockAdapter { stage: Stage::Fragment, ports: SURFACE, connected_only: false },
    );
    registry.register(
        "unlit_output",
        StageBlockAdapter { stage: Stage::Fragment, ports: UNLIT, connected_only: false },
    );
    registry.register(
        "vertex_output",
        StageBlockAdapter { stage: Stage::Vertex, ports: VERTEX, connected_only: true },
    );
}

#[cfg(test)]
mod tests {
    use super::super::test_util::node;
    use super::super::{AdapterEnv, BuildContext};
    use super::*;
    use crate::assembler::{Contribution, StageContributions};
    use crate::builder::GraphBuilder;
    use crate::diagnostics::{DiagnosticKind, Diagnostics};
    use crate::resolver::ExternalEdgeMap;
    use crate::settings::CompilerSettings;
    use crate::shape::{Shape, Value};
    use crate::snippets::MemorySnippetLoader;
    use ordoplay_shader_graph::{Graph, PortValue};

    fn build(source: &Graph) -> (GraphBuilder, StageContributions, Diagnostics) {
        let registry = AdapterRegistry::with_defaults();
        let settings = CompilerSettings::default();
        let loader = MemorySnippetLoader::new();
        let mut builder = GraphBuilder::new("test");
        let mut edges = ExternalEdgeMap::default();
        let mut diagnostics = Diagnostics::new();
        let mut stages = StageContributions::new();
        let env = AdapterEnv { settings: &settings, loader: &loader, source };
        for node in source.nodes() {
            let mut ctx = BuildContext {
                env,
                builder: &mut builder,
                edges: &mut edges,
                diagnostics: &mut diagnostics,
                stages: &mut stages,
            };
            registry.get(&node.node_type).unwrap().build(node, &mut ctx).unwrap();
        }
        edges.finalize(source, &mut builder, &mut diagnostics).unwrap();
        (builder, stages, diagnostics)
    }

    #[test]
    fn test_literals_and_connections_are_collected() {
        let mut source = Graph::new("test");
        let c = source.add_node(node("float_constant").with_value("Value", PortValue::Float(0.8)));
        let out = source.add_output_node(node("material_output").with_value("Metallic", PortValue::Float(0.25)));
        source.connect_named(c, "Value", out, "Smoothness").unwrap();

        let (builder, stages, _) = build(&source);
        let names: Vec<&str> = stages.logical_names(Stage::Fragment).collect();
        assert!(names.contains(&"Smoothness"));
        assert!(names.contains(&"Metallic"));
        assert!(!names.contains(&"Normal"));
        assert_eq!(stages.collector(Stage::Fragment, "Smoothness"), Some("fragment_smoothness_2"));

        assert_eq!(
            stages.settle(&builder, Stage::Fragment, "Metallic"),
            Some(Contribution::Literal { value: Value::Float(0.25), shape: Shape::Float })
        );
        assert_eq!(
            stages.settle(&builder, Stage::Fragment, "Smoothness"),
            Some(Contribution::Node { node: "constant_1".into(), output: None })
        );
    }

    #[test]
    fn test_vertex_block_skips_unconnected() {
        let mut source = Graph::new("test");
        source.add_output_node(node("vertex_output"));
        let (_, stages, _) = build(&source);
        assert_eq!(stages.logical_names(Stage::Vertex).count(), 0);
    }

    #[test]
    fn test_second_block_is_noted() {
        let mut source = Graph::new("test");
        source.add_output_node(node("material_output"));
        let unlit = source.add_output_node(node("unlit_output"));
        let (_, stages, diagnostics) = build(&source);
        assert!(stages.collector(Stage::Fragment, "BaseColor").is_some());
        let notes: Vec<_> = diagnostics.for_node(unlit).collect();
        assert_eq!(notes.len(), 3);
        assert!(notes.iter().all(|d| d.kind == DiagnosticKind::Note));
    }
}
