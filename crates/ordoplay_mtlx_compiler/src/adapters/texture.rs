// SPDX-License-Identifier: MIT OR Apache-2.0
//! Texture sampling and normal maps.

use super::{AdapterEnv, AdapterRegistry, BuildContext, NodeAdapter};
use crate::builder::{BuilderError, SystemInput};
use crate::graph::NodeFlags;
use crate::shape::Shape;
use ordoplay_shader_graph::Node;

/// Why a node's `Texture` input cannot be translated, if it cannot
fn texture_details(node: &Node, env: &AdapterEnv<'_>) -> Option<String> {
    if env.is_connected(node, "Texture") {
        return None;
    }
    match env.authored(node, "Texture").and_then(|v| v.as_str()) {
        Some(path) if !path.is_empty() => None,
        _ => Some("no texture is bound to the Texture input".to_string()),
    }
}

/// Create an `image` node reading `Texture` at `UV`, or at the mesh UVs when
/// `UV` is unconnected.
fn image_node(node: &Node, ctx: &mut BuildContext<'_>, shape: Shape) -> Result<String, BuilderError> {
    let name = ctx.name(node, "image");
    ctx.builder.add_node(&name, "image", shape, NodeFlags::default())?;
    ctx.wire_input(node, "Texture", &name, "file", Shape::Filename)?;
    if ctx.env.is_connected(node, "UV") {
        ctx.wire_input(node, "UV", &name, "texcoord", Shape::Vector2)?;
    } else {
        let uv = ctx.builder.implicit_property(SystemInput::Texcoord)?;
        ctx.builder.add_port_and_edge(&name, "texcoord", Shape::Vector2, &uv, None)?;
    }
    Ok(name)
}

/// `texture_sample` to `image`, with per-channel outputs as `extract` nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct TextureSampleAdapter;

impl NodeAdapter for TextureSampleAdapter {
    fn support_details(&self, node: &Node, env: &AdapterEnv<'_>) -> String {
        texture_details(node, env).unwrap_or_default()
    }

    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let image = image_node(node, ctx, Shape::Color4)?;
        ctx.expose_output(node, "Color", &image, None);
        ctx.expose_components(node, &image, &[("R", 0), ("G", 1), ("B", 2), ("A", 3)])
    }
}

/// `normal_map` to an `image` decoded by `normalmap`
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalMapAdapter;

impl NodeAdapter for NormalMapAdapter {
    fn support_details(&self, node: &Node, env: &AdapterEnv<'_>) -> String {
        if env.settings.is_unlit() {
            return "normal maps have no effect on unlit materials".to_string();
        }
        texture_details(node, env).unwrap_or_default()
    }

    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let image = image_node(node, ctx, Shape::Vector3)?;
        let name = ctx.name(node, "normalmap");
        ctx.builder.add_node(&name, "normalmap", Shape::Vector3, NodeFlags::default())?;
        ctx.builder.add_port_and_edge(&name, "in", Shape::Vector3, &image, None)?;
        ctx.wire_input(node, "Strength", &name, "scale", Shape::Float)?;
        ctx.expose_output(node, "Normal", &name, None);
        Ok(())
    }
}

pub(super) fn register(registry: &mut AdapterRegistry) {
    registry.register("texture_sample", TextureSampleAdapter);
    registry.register("normal_map", NormalMapAdapter);
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{build_all, node};
    use super::*;
    use crate::settings::{CompilerSettings, ShadingMode};
    use crate::shape::Value;
    use crate::snippets::MemorySnippetLoader;
    use ordoplay_shader_graph::{Graph, PortValue};

    #[test]
    fn test_sample_uses_implicit_uv() {
        let mut source = Graph::new("test");
        let tex = source.add_node(node("texture_sample").with_value("Texture", PortValue::Texture("brick.png".into())));
        let mul = source.add_node(node("multiply"));
        source.connect_named(tex, "R", mul, "A").unwrap();
        source.connect_named(tex, "G", mul, "B").unwrap();

        let (graph, diagnostics) = build_all(&source, &CompilerSettings::default(), &[(mul, "Result")]);
        assert!(diagnostics.is_empty());
        let image = graph.node("image_1").unwrap();
        assert_eq!(image.literal("file"), Some(&Value::String("brick.png".into())));
        assert_eq!(image.port("texcoord").unwrap().binding.upstream(), Some("implicit_texcoord"));
        assert!(graph.node("extract_r_1").is_some());
        assert!(graph.node("extract_g_1").is_some());
        assert!(graph.node("extract_b_1").is_none());
    }

    #[test]
    fn test_missing_texture_is_unsupported() {
        let source = Graph::new("test");
        let settings = CompilerSettings::default();
        let loader = MemorySnippetLoader::new();
        let env = AdapterEnv { settings: &settings, loader: &loader, source: &source };
        let sample = node("texture_sample");
        assert!(!TextureSampleAdapter.is_supported(&sample, &env));
    }

    #[test]
    fn test_normal_map_requires_lit_shading() {
        let source = Graph::new("test");
        let loader = MemorySnippetLoader::new();
        let map = node("normal_map").with_value("Texture", PortValue::Texture("n.png".into()));

        let lit = CompilerSettings::default();
        let env = AdapterEnv { settings: &lit, loader: &loader, source: &source };
        assert!(NormalMapAdapter.is_supported(&map, &env));

        let unlit = CompilerSettings { shading: ShadingMode::Unlit, ..Default::default() };
        let env = AdapterEnv { settings: &unlit, loader: &loader, source: &source };
        assert!(NormalMapAdapter.support_details(&map, &env).contains("unlit"));
    }

    #[test]
    fn test_normal_map_chain() {
        let mut source = Graph::new("test");
        let map = source.add_node(
            node("normal_map")
                .with_value("Texture", PortValue::Texture("n.png".into()))
                .with_value("Strength", PortValue::Float(0.5)),
        );
        let (graph, _) = build_all(&source, &CompilerSettings::default(), &[(map, "Normal")]);
        let decode = graph.node("normalmap_1").unwrap();
        assert_eq!(decode.literal("scale"), Some(&Value::Float(0.5)));
        assert_eq!(decode.port("in").unwrap().binding.upstream(), Some("image_1"));
        assert_eq!(graph.node("image_1").unwrap().shape, Shape::Vector3);
    }
}
