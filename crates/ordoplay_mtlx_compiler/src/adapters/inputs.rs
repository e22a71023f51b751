// SPDX-License-Identifier: MIT OR Apache-2.0
//! Geometry and time inputs backed by renderer-provided properties.

use super::{AdapterEnv, AdapterRegistry, BuildContext, NodeAdapter};
use crate::builder::{BuilderError, SystemInput};
use crate::graph::NodeFlags;
use crate::shape::Shape;
use ordoplay_shader_graph::Node;

/// Source node whose main output is a shared implicit property. Component
/// outputs become `extract` nodes over it.
#[derive(Debug, Clone, Copy)]
pub struct ImplicitInputAdapter {
    /// Property read
    pub input: SystemInput,
    /// Output carrying the whole property
    pub main: &'static str,
    /// Single-component outputs and their index
    pub components: &'static [(&'static str, i32)],
}

impl NodeAdapter for ImplicitInputAdapter {
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let property = ctx.builder.implicit_property(self.input)?;
        ctx.expose_output(node, self.main, &property, None);
        ctx.expose_components(node, &property, self.components)
    }
}

/// `time` node: elapsed time and its sine and cosine
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeAdapter;

impl NodeAdapter for TimeAdapter {
    fn support_details(&self, node: &Node, env: &AdapterEnv<'_>) -> String {
        if env.output_used(node, "Delta Time") {
            "Delta Time has no per-frame equivalent in the destination".to_string()
        } else {
            String::new()
        }
    }

    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let time = ctx.builder.implicit_property(SystemInput::Time)?;
        ctx.expose_output(node, "Time", &time, None);
        for (output, category) in [("Sin Time", "sin"), ("Cos Time", "cos")] {
            if !ctx.env.output_used(node, output) {
                continue;
            }
            let name = ctx.name(node, category);
            ctx.builder.add_node(&name, category, Shape::Float, NodeFlags::default())?;
            ctx.builder.add_port_and_edge(&name, "in", Shape::Float, &time, None)?;
            ctx.expose_output(node, output, &name, None);
        }
        Ok(())
    }
}

const RGBA: &[(&str, i32)] = &[("R", 0), ("G", 1), ("B", 2), ("A", 3)];
const XYZ: &[(&str, i32)] = &[("X", 0), ("Y", 1), ("Z", 2)];

pub(super) fn register(registry: &mut AdapterRegistry) {
    registry.register(
        "uv_coord",
        ImplicitInputAdapter { input: SystemInput::Texcoord, main: "UV", components: &[("U", 0), ("V", 1)] },
    );
    registry.register(
        "vertex_color",
        ImplicitInputAdapter { input: SystemInput::VertexColor, main: "Color", components: RGBA },
    );
    registry.register(
        "world_position",
        ImplicitInputAdapter { input: SystemInput::Position, main: "Position", components: XYZ },
    );
    registry.register(
        "world_normal",
        ImplicitInputAdapter { input: SystemInput::Normal, main: "Normal", components: &[] },
    );
    registry.register(
        "view_direction",
        ImplicitInputAdapter { input: SystemInput::ViewDirection, main: "Direction", components: &[] },
    );
    registry.register("time", TimeAdapter);
}
