// SPDX-License-Identifier: MIT OR Apache-2.0
//! Table-driven adapters for nodes with a one-to-one destination category.

use super::{AdapterRegistry, BuildContext, NodeAdapter};
use crate::builder::BuilderError;
use crate::graph::NodeFlags;
use crate::shape::Shape;
use ordoplay_shader_graph::Node;

/// How the shape of a destination port or node is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortShape {
    /// The resolved shape of the source node's output
    Output,
    /// The resolved shape of the source port itself
    Own,
    /// Always this shape
    Fixed(Shape),
}

/// Adapter mapping a source node onto one destination node
#[derive(Debug, Clone, Copy)]
pub struct DirectOp {
    /// Destination category
    pub category: &'static str,
    /// Category used instead when the node's shape is scalar
    pub scalar_category: Option<&'static str>,
    /// Source input, destination port and port shape
    pub inputs: &'static [(&'static str, &'static str, PortShape)],
    /// Source output
    pub output: &'static str,
    /// Shape of the destination node
    pub shape: PortShape,
}

impl DirectOp {
    /// Op whose ports and result all follow the source output shape
    pub const fn new(category: &'static str, inputs: &'static [(&'static str, &'static str, PortShape)], output: &'static str) -> Self {
        Self { category, scalar_category: None, inputs, output, shape: PortShape::Output }
    }

    /// Set the destination node shape
    pub const fn shape(mut self, shape: PortShape) -> Self {
        self.shape = shape;
        self
    }

    /// Use another category for scalar operands
    pub const fn scalar(mut self, category: &'static str) -> Self {
        self.scalar_category = Some(category);
        self
    }

    fn resolve(&self, node: &Node, ctx: &BuildContext<'_>, port: &str, shape: PortShape, output: Shape) -> Shape {
        match shape {
            PortShape::Output => output,
            PortShape::Own => ctx.env.input_shape(node, port),
            PortShape::Fixed(shape) => shape,
        }
    }
}

impl NodeAdapter for DirectOp {
    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let output = ctx.env.output_shape(node, self.output);
        let shape = match self.shape {
            PortShape::Fixed(shape) => shape,
            PortShape::Output | PortShape::Own => output,
        };
        let category = match self.scalar_category {
            Some(scalar) if self.inputs.iter().all(|(source, _, s)| self.resolve(node, ctx, source, *s, output).is_scalar()) => scalar,
            _ => self.category,
        };

        let name = ctx.name(node, category);
        ctx.builder.add_node(&name, category, shape, NodeFlags::default())?;
        for (source, port, port_shape) in self.inputs {
            let port_shape = self.resolve(node, ctx, source, *port_shape, output);
            ctx.wire_input(node, source, &name, port, port_shape)?;
        }
        ctx.expose_output(node, self.output, &name, None);
        Ok(())
    }
}

use PortShape::{Fixed, Output, Own};

const BINARY: &[(&str, &str, PortShape)] = &[("A", "in1", Output), ("B", "in2", Output)];
const UNARY: &[(&str, &str, PortShape)] = &[("Value", "in", Output)];
const ANGLE: &[(&str, &str, PortShape)] = &[("Angle", "in", Fixed(Shape::Float))];
const VECTORS: &[(&str, &str, PortShape)] = &[("A", "in1", Fixed(Shape::Vector3)), ("B", "in2", Fixed(Shape::Vector3))];

pub(super) fn register(registry: &mut AdapterRegistry) {
    for category in ["add", "subtract", "multiply", "divide", "min", "max"] {
        registry.register(category, DirectOp::new(category, BINARY, "Result"));
    }
    for (type_id, category) in [
        ("abs", "absval"),
        ("floor", "floor"),
        ("ceil", "ceil"),
        ("normalize", "normalize"),
        ("sqrt", "sqrt"),
    ] {
        registry.register(type_id, DirectOp::new(category, UNARY, "Result"));
    }
    for category in ["sin", "cos", "tan"] {
        registry.register(category, DirectOp::new(category, ANGLE, "Result").shape(Fixed(Shape::Float)));
    }

    registry.register(
        "power",
        DirectOp::new("power", &[("Base", "in1", Output), ("Exponent", "in2", Output)], "Result"),
    );
    registry.register(
        "atan2",
        DirectOp::new("atan2", &[("Y", "iny", Fixed(Shape::Float)), ("X", "inx", Fixed(Shape::Float))], "Angle")
            .shape(Fixed(Shape::Float)),
    );
    registry.register(
        "lerp",
        DirectOp::new(
            "mix",
            &[("A", "bg", Output), ("B", "fg", Output), ("T", "mix", Fixed(Shape::Float))],
            "Result",
        ),
    );
    registry.register(
        "smoothstep",
        DirectOp::new(
            "smoothstep",
            &[("X", "in", Output), ("Edge0", "low", Output), ("Edge1", "high", Output)],
            "Result",
        ),
    );
    registry.register(
        "clamp",
        DirectOp::new(
            "clamp",
            &[("Value", "in", Output), ("Min", "low", Output), ("Max", "high", Output)],
            "Result",
        ),
    );
    registry.register("dot", DirectOp::new("dotproduct", VECTORS, "Result").shape(Fixed(Shape::Float)));
    registry.register("cross", DirectOp::new("crossproduct", VECTORS, "Result").shape(Fixed(Shape::Vector3)));
    registry.register(
        "length",
        DirectOp::new("magnitude", &[("Vector", "in", Own)], "Length")
            .shape(Fixed(Shape::Float))
            .scalar("absval"),
    );
}
