// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constants and vector split/combine.

use super::{AdapterRegistry, BuildContext, NodeAdapter};
use crate::builder::BuilderError;
use crate::graph::NodeFlags;
use crate::shape::{Shape, Value};
use ordoplay_shader_graph::Node;

const AXES: [&str; 4] = ["X", "Y", "Z", "W"];
const SEPARATE_OUTPUTS: [&str; 4] = ["outx", "outy", "outz", "outw"];

/// Constant node; the literal lives on the source output port
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantAdapter;

impl NodeAdapter for ConstantAdapter {
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let Some(port) = node.outputs.first() else {
            return Ok(());
        };
        let shape = Shape::from_port_type(&port.port_type);
        let value = port
            .default_value
            .as_ref()
            .and_then(|v| {
                let (value, natural) = Value::from_port_value(v);
                value.coerce(natural, shape)
            })
            .or_else(|| Value::splat(shape, 0.0))
            .unwrap_or(Value::Float(0.0));

        let name = ctx.name(node, "constant");
        ctx.builder.add_node(&name, "constant", shape, NodeFlags::CONSTANT)?;
        ctx.builder.add_port_value(&name, "value", shape, value)?;
        ctx.expose_output(node, &port.name, &name, None);
        Ok(())
    }
}

/// `split_vectorN` to a multi-output `separateN`
#[derive(Debug, Clone, Copy)]
pub struct SplitAdapter {
    /// Vector width
    pub width: usize,
}

impl NodeAdapter for SplitAdapter {
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let category = format!("separate{}", self.width);
        let shape = Shape::vector(self.width).unwrap_or(Shape::Vector3);
        let name = ctx.name(node, &category);
        ctx.builder.add_node(&name, &category, Shape::MultiOutput, NodeFlags::default())?;
        ctx.wire_input(node, "Vector", &name, "in", shape)?;
        for (axis, output) in AXES.iter().zip(SEPARATE_OUTPUTS).take(self.width) {
            ctx.builder.add_node_output(&name, output, Shape::Float)?;
            ctx.expose_output(node, axis, &name, Some(output));
        }
        Ok(())
    }
}

/// `combine_vectorN` to `combineN`
#[derive(Debug, Clone, Copy)]
pub struct CombineAdapter {
    /// Vector width
    pub width: usize,
}

impl NodeAdapter for CombineAdapter {
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let category = format!("combine{}", self.width);
        let shape = Shape::vector(self.width).unwrap_or(Shape::Vector3);
        let name = ctx.name(node, &category);
        ctx.builder.add_node(&name, &category, shape, NodeFlags::default())?;
        for (i, axis) in AXES.iter().take(self.width).enumerate() {
            ctx.wire_input(node, axis, &name, &format!("in{}", i + 1), Shape::Float)?;
        }
        ctx.expose_output(node, "Vector", &name, None);
        Ok(())
    }
}

pub(super) fn register(registry: &mut AdapterRegistry) {
    for type_id in ["color_constant", "float_constant", "vector2_constant", "vector3_constant", "vector4_constant"] {
        registry.register(type_id, ConstantAdapter);
    }
    for width in 2..=4 {
        registry.register(format!("split_vector{width}"), SplitAdapter { width });
        registry.register(format!("combine_vector{width}"), CombineAdapter { width });
    }
}
