// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nodes implemented as snippets.
//!
//! A recipe is snippet text written against the node's own port names with
//! spaces removed (`Color A` is `ColorA`). An output whose name clashes with
//! an input gets an `_out` suffix. Inputs listed as fallbacks read a renderer
//! property when nothing is connected to them.

use super::{AdapterEnv, AdapterRegistry, BuildContext, NodeAdapter};
use crate::builder::BuilderError;
use crate::compound::{compile_snippet, CompileOptions, CompoundError, CompoundErrorKind, Signature, Subgraph};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use ordoplay_shader_graph::Node;

/// Snippet ports derived from a source node
#[derive(Debug, Clone, Default)]
pub(super) struct SnippetPorts {
    signature: Signature,
    /// Source input name and snippet identifier
    inputs: Vec<(String, String)>,
    /// Source output name and snippet identifier
    outputs: Vec<(String, String)>,
    /// Declarations binding unconnected fallback inputs to globals
    prelude: String,
}

impl SnippetPorts {
    pub(super) fn new(node: &Node, env: &AdapterEnv<'_>, fallbacks: &[(&str, &str)]) -> Self {
        let mut ports = Self::default();
        let input_names: Vec<String> = node.inputs.iter().map(|p| identifier(&p.name)).collect();

        for (port, name) in node.inputs.iter().zip(&input_names) {
            let shape = env.input_shape(node, &port.name);
            let fallback = fallbacks.iter().find(|(input, _)| *input == port.name);
            match fallback {
                Some((_, global)) if !env.is_connected(node, &port.name) => {
                    ports.prelude.push_str(&format!("{} {name} = {global};\n", shape.name()));
                }
                _ => {
                    ports.signature.inputs.push((name.clone(), shape));
                    ports.inputs.push((port.name.clone(), name.clone()));
                }
            }
        }
        for port in &node.outputs {
            let mut name = identifier(&port.name);
            if input_names.contains(&name) {
                name.push_str("_out");
            }
            ports.signature.outputs.push((name.clone(), env.output_shape(node, &port.name)));
            ports.outputs.push((port.name.clone(), name));
        }
        ports
    }

    /// Compile `code` against these ports. Error offsets are relative to `code`.
    pub(super) fn compile(&self, code: &str, env: &AdapterEnv<'_>) -> Result<Subgraph, CompoundError> {
        let options = CompileOptions { max_unroll_iterations: env.settings.max_unroll_iterations };
        let text = format!("{}{code}", self.prelude);
        compile_snippet(&text, &self.signature, &options).map_err(|mut err| {
            err.offset = err.offset.saturating_sub(self.prelude.len());
            err
        })
    }

    /// Create the subgraph's nodes and wire them to the source node's ports
    pub(super) fn instantiate(
        &self,
        node: &Node,
        ctx: &mut BuildContext<'_>,
        hint: &str,
        subgraph: &Subgraph,
    ) -> Result<(), BuilderError> {
        let prefix = ctx.name(node, hint);
        let instance = subgraph.instantiate(&prefix, ctx.builder)?;
        for external in &instance.external_uses {
            let Some((source, _)) = self.inputs.iter().find(|(_, name)| *name == external.input) else {
                continue;
            };
            ctx.wire_input(node, source, &external.node, &external.port, external.shape)?;
        }
        for (source, name) in &self.outputs {
            if let Some(alias) = instance.outputs.get(name) {
                ctx.expose_output(node, source, alias, None);
            }
        }
        tracing::debug!(node = %node.id, prefix = %prefix, nodes = instance.nodes.len(), "instantiated snippet");
        Ok(())
    }
}

fn identifier(port: &str) -> String {
    port.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Diagnostic for a snippet that failed to compile
pub(super) fn compile_diagnostic(node: &Node, err: &CompoundError) -> Diagnostic {
    let kind = match err.kind {
        CompoundErrorKind::Parse => DiagnosticKind::ParseError,
        CompoundErrorKind::Type => DiagnosticKind::TypeError,
        CompoundErrorKind::Unsupported => DiagnosticKind::UnsupportedConstruct,
    };
    Diagnostic {
        severity: Severity::Warning,
        kind,
        message: format!("'{}': {err}", node.name),
        node: Some(node.id),
    }
}

/// Node implemented by fixed snippet text
#[derive(Debug, Clone, Copy)]
pub struct SnippetAdapter {
    /// Snippet text
    pub code: &'static str,
    /// Input name and the global it reads when unconnected
    pub fallbacks: &'static [(&'static str, &'static str)],
}

impl SnippetAdapter {
    /// Recipe without fallbacks
    pub const fn new(code: &'static str) -> Self {
        Self { code, fallbacks: &[] }
    }

    /// Recipe whose unconnected inputs read globals
    pub const fn with_fallbacks(code: &'static str, fallbacks: &'static [(&'static str, &'static str)]) -> Self {
        Self { code, fallbacks }
    }
}

impl NodeAdapter for SnippetAdapter {
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let ports = SnippetPorts::new(node, &ctx.env, self.fallbacks);
        match ports.compile(self.code, &ctx.env) {
            Ok(subgraph) => ports.instantiate(node, ctx, &node.node_type, &subgraph),
            Err(err) => {
                ctx.diagnostics.push(compile_diagnostic(node, &err));
                Ok(())
            }
        }
    }

    fn check(&self, node: &Node, env: &AdapterEnv<'_>) -> Vec<Diagnostic> {
        let ports = SnippetPorts::new(node, env, self.fallbacks);
        match ports.compile(self.code, env) {
            Ok(_) => Vec::new(),
            Err(err) => vec![compile_diagnostic(node, &err)],
        }
    }
}

const NORMAL: &[(&str, &str)] = &[("Normal", "normal")];
const UV: &[(&str, &str)] = &[("UV", "uv")];

pub(super) fn register(registry: &mut AdapterRegistry) {
    registry.register("one_minus", SnippetAdapter::new("Result = 1.0 - Value;"));
    registry.register("saturate", SnippetAdapter::new("Result = saturate(Value);"));
    registry.register("fract", SnippetAdapter::new("Result = fract(Value);"));
    registry.register("negate", SnippetAdapter::new("Result = -Value;"));
    registry.register(
        "remap",
        SnippetAdapter::new("Result = OutMin + (Value - InMin) * (OutMax - OutMin) / (InMax - InMin);"),
    );
    registry.register("distance", SnippetAdapter::new("Distance = distance(A, B);"));
    registry.register(
        "fresnel",
        SnippetAdapter::with_fallbacks(
            "Result = pow(1.0 - saturate(dot(normalize(Normal), normalize(view_direction))), Power);",
            NORMAL,
        ),
    );
    registry.register("reflect", SnippetAdapter::with_fallbacks("Result = reflect(Vector, Normal);", NORMAL));
    registry.register(
        "uv_tiling",
        SnippetAdapter::with_fallbacks("UV_out = UV * Tiling + Offset;", UV),
    );
    registry.register(
        "checkerboard",
        SnippetAdapter::with_fallbacks(
            "vec2 cell = floor(UV * Scale);\n\
             float parity = mod(cell.x + cell.y, 2.0);\n\
             Color = parity < 1.0 ? ColorA : ColorB;",
            UV,
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{build_all, node};
    use super::*;
    use crate::builder::SystemInput;
    use crate::eval::EvaluationContext;
    use crate::settings::CompilerSettings;
    use crate::snippets::MemorySnippetLoader;
    use ordoplay_shader_graph::{Graph, PortValue};

    #[test]
    fn test_port_identifiers() {
        let source = Graph::new("test");
        let settings = CompilerSettings::default();
        let loader = MemorySnippetLoader::new();
        let env = AdapterEnv { settings: &settings, loader: &loader, source: &source };

        let ports = SnippetPorts::new(&node("uv_tiling"), &env, UV);
        assert_eq!(ports.prelude, "vector2 UV = uv;\n");
        assert_eq!(ports.signature.outputs[0].0, "UV_out");
        assert_eq!(ports.inputs.len(), 2);

        let ports = SnippetPorts::new(&node("checkerboard"), &env, &[]);
        let names: Vec<&str> = ports.signature.inputs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["UV", "Scale", "ColorA", "ColorB"]);
    }

    #[test]
    fn test_one_minus_on_vector() {
        let mut source = Graph::new("test");
        let v = source.add_node(node("vector3_constant").with_value("Vector", PortValue::Vector3([0.25, 0.5, 1.0])));
        let one_minus = source.add_node(node("one_minus"));
        source.connect_named(v, "Vector", one_minus, "Value").unwrap();

        let (graph, diagnostics) = build_all(&source, &CompilerSettings::default(), &[(one_minus, "Result")]);
        assert!(diagnostics.is_empty());
        assert!(graph.node("one_minus_2_out_Result").is_some());
        let result = EvaluationContext::new(&graph).evaluate_output("out0").unwrap();
        assert_eq!(result, vec![0.75, 0.5, 0.0]);
    }

    #[test]
    fn test_remap_uses_authored_ranges() {
        let mut source = Graph::new("test");
        let remap = source.add_node(
            node("remap")
                .with_value("Value", PortValue::Float(0.5))
                .with_value("Out Min", PortValue::Float(10.0))
                .with_value("Out Max", PortValue::Float(20.0)),
        );
        let (graph, _) = build_all(&source, &CompilerSettings::default(), &[(remap, "Result")]);
        let result = EvaluationContext::new(&graph).evaluate_output("out0").unwrap();
        assert!((result[0] - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_checkerboard_reads_mesh_uv() {
        let mut source = Graph::new("test");
        let checker = source.add_node(node("checkerboard"));
        let (graph, diagnostics) = build_all(&source, &CompilerSettings::default(), &[(checker, "Color")]);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics.iter().collect::<Vec<_>>());
        assert!(graph.node(SystemInput::Texcoord.node_name()).is_some());

        let dark = EvaluationContext::new(&graph)
            .with_system_input(SystemInput::Texcoord, vec![0.25, 0.25])
            .evaluate_output("out0")
            .unwrap();
        assert_eq!(dark, vec![0.0, 0.0, 0.0, 1.0]);
        let light = EvaluationContext::new(&graph)
            .with_system_input(SystemInput::Texcoord, vec![0.25, 0.75])
            .evaluate_output("out0")
            .unwrap();
        assert_eq!(light, vec![1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_compile_errors_become_diagnostics() {
        let source = Graph::new("test");
        let settings = CompilerSettings::default();
        let loader = MemorySnippetLoader::new();
        let env = AdapterEnv { settings: &settings, loader: &loader, source: &source };
        let broken = SnippetAdapter::new("Result = Value +;");
        let diagnostics = broken.check(&node("one_minus"), &env);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::ParseError);
        assert!(diagnostics[0].message.contains("One Minus"));
    }
}
