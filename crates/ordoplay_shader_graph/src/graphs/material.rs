// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material/shader graph node vocabulary.
//!
//! These are the node types a user can author. The translator in
//! `ordoplay_mtlx_compiler` maps each of them onto MaterialX-style nodes.

use crate::node::{NodeCategory, NodeRegistry, NodeType};
use crate::port::{PortType, PortValue};

/// Node property holding inline code for `custom_code` nodes
pub const CODE_PROPERTY: &str = "code";
/// Node property naming an external code resource for `custom_code` nodes
pub const CODE_RESOURCE_PROPERTY: &str = "code_resource";

/// Create the material graph node registry with all available node types
pub fn create_material_registry() -> NodeRegistry {
    use PortType::*;

    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Output Nodes (stage blocks)
    // ========================================================================

    registry.register(
        NodeType::new("material_output", "Material Output", NodeCategory::Output, "Final lit material output")
            .input_with("Base Color", Color, PortValue::Color([0.5, 0.5, 0.5, 1.0]))
            .input_with("Metallic", Float, PortValue::Float(0.0))
            .input_with("Smoothness", Float, PortValue::Float(0.5))
            .input("Normal", Vector3)
            .input_with("Emission", Color, PortValue::Color([0.0, 0.0, 0.0, 1.0]))
            .input_with("Occlusion", Float, PortValue::Float(1.0))
            .input_with("Alpha", Float, PortValue::Float(1.0))
            .input_with("Alpha Clip Threshold", Float, PortValue::Float(0.5)),
    );

    registry.register(
        NodeType::new("unlit_output", "Unlit Output", NodeCategory::Output, "Unlit material output (no lighting)")
            .input_with("Color", Color, PortValue::Color([0.5, 0.5, 0.5, 1.0]))
            .input_with("Alpha", Float, PortValue::Float(1.0))
            .input_with("Alpha Clip Threshold", Float, PortValue::Float(0.5)),
    );

    registry.register(
        NodeType::new("vertex_output", "Vertex Output", NodeCategory::Output, "Per-vertex position and frame")
            .input("Position", Vector3)
            .input("Normal", Vector3)
            .input("Tangent", Vector3),
    );

    // ========================================================================
    // Input Nodes - Constants (the literal lives on the output port)
    // ========================================================================

    let constants = [
        ("color_constant", "Color", "Color", Color, PortValue::Color([1.0, 1.0, 1.0, 1.0])),
        ("float_constant", "Float", "Value", Float, PortValue::Float(0.0)),
        ("vector2_constant", "Vector2", "Vector", Vector2, PortValue::Vector2([0.0; 2])),
        ("vector3_constant", "Vector3", "Vector", Vector3, PortValue::Vector3([0.0; 3])),
        ("vector4_constant", "Vector4", "Vector", Vector4, PortValue::Vector4([0.0; 4])),
    ];
    for (id, name, port, ty, value) in constants {
        let mut node_type = NodeType::new(id, name, NodeCategory::Input, format!("Constant {name} value"))
            .output(port, ty);
        node_type.outputs[0].default_value = Some(value);
        registry.register(node_type);
    }

    // ========================================================================
    // Input Nodes - Geometry & Parameters
    // ========================================================================

    registry.register(
        NodeType::new("uv_coord", "UV Coordinates", NodeCategory::Input, "Mesh UV coordinates")
            .output("UV", Vector2)
            .output("U", Float)
            .output("V", Float),
    );
    registry.register(
        NodeType::new("vertex_color", "Vertex Color", NodeCategory::Input, "Per-vertex color attribute")
            .output("Color", Color)
            .output("R", Float)
            .output("G", Float)
            .output("B", Float)
            .output("A", Float),
    );
    registry.register(
        NodeType::new("world_position", "World Position", NodeCategory::Input, "Fragment world position")
            .output("Position", Vector3)
            .output("X", Float)
            .output("Y", Float)
            .output("Z", Float),
    );
    registry.register(
        NodeType::new("world_normal", "World Normal", NodeCategory::Input, "Fragment world normal")
            .output("Normal", Vector3),
    );
    registry.register(
        NodeType::new("view_direction", "View Direction", NodeCategory::Input, "Direction from fragment to camera")
            .output("Direction", Vector3),
    );
    registry.register(
        NodeType::new("time", "Time", NodeCategory::Input, "Shader time values")
            .output("Time", Float)
            .output("Sin Time", Float)
            .output("Cos Time", Float)
            .output("Delta Time", Float),
    );

    // ========================================================================
    // Texture Nodes
    // ========================================================================

    registry.register(
        NodeType::new("texture_sample", "Texture Sample", NodeCategory::Texture, "Sample a 2D texture")
            .input("Texture", PortType::Texture)
            .input("UV", Vector2)
            .output("Color", Color)
            .output("R", Float)
            .output("G", Float)
            .output("B", Float)
            .output("A", Float),
    );
    registry.register(
        NodeType::new("normal_map", "Normal Map", NodeCategory::Texture, "Sample and decode a normal map")
            .input("Texture", PortType::Texture)
            .input("UV", Vector2)
            .input_with("Strength", Float, PortValue::Float(1.0))
            .output("Normal", Vector3),
    );
    registry.register(
        NodeType::new("triplanar_mapping", "Triplanar Mapping", NodeCategory::Texture, "Triplanar texture projection")
            .input("Texture", PortType::Texture)
            .input("Position", Vector3)
            .input("Normal", Vector3)
            .input_with("Blend", Float, PortValue::Float(1.0))
            .input_with("Scale", Float, PortValue::Float(1.0))
            .output("Color", Color),
    );

    // ========================================================================
    // Math Nodes
    // ========================================================================

    for (id, name, description) in [
        ("add", "Add", "Add two values"),
        ("subtract", "Subtract", "Subtract B from A"),
        ("multiply", "Multiply", "Multiply two values"),
        ("divide", "Divide", "Divide A by B"),
        ("min", "Minimum", "Component-wise minimum"),
        ("max", "Maximum", "Component-wise maximum"),
    ] {
        registry.register(
            NodeType::new(id, name, NodeCategory::Math, description)
                .input("A", Any)
                .input("B", Any)
                .output("Result", Any),
        );
    }

    for (id, name, description) in [
        ("abs", "Absolute", "Absolute value"),
        ("negate", "Negate", "Negate value (-x)"),
        ("floor", "Floor", "Round down"),
        ("ceil", "Ceiling", "Round up"),
        ("fract", "Fraction", "Fractional part"),
        ("one_minus", "One Minus", "1 - x"),
        ("saturate", "Saturate", "Clamp to [0, 1]"),
        ("normalize", "Normalize", "Normalize vector"),
        ("sqrt", "Square Root", "Square root of value"),
    ] {
        registry.register(
            NodeType::new(id, name, NodeCategory::Math, description)
                .input("Value", Any)
                .output("Result", Any),
        );
    }

    for (id, name) in [("sin", "Sine"), ("cos", "Cosine"), ("tan", "Tangent")] {
        registry.register(
            NodeType::new(id, name, NodeCategory::Math, format!("{name} of angle (radians)"))
                .input("Angle", Float)
                .output("Result", Float),
        );
    }

    registry.register(
        NodeType::new("power", "Power", NodeCategory::Math, "Raise A to the power of B")
            .input("Base", Float)
            .input_with("Exponent", Float, PortValue::Float(2.0))
            .output("Result", Float),
    );
    registry.register(
        NodeType::new("atan2", "Arctangent 2", NodeCategory::Math, "Angle of the vector (X, Y)")
            .input("Y", Float)
            .input("X", Float)
            .output("Angle", Float),
    );
    registry.register(
        NodeType::new("lerp", "Lerp", NodeCategory::Math, "Linear interpolation")
            .input("A", Any)
            .input("B", Any)
            .input_with("T", Float, PortValue::Float(0.5))
            .output("Result", Any),
    );
    registry.register(
        NodeType::new("smoothstep", "Smoothstep", NodeCategory::Math, "Hermite interpolation between edges")
            .input_with("Edge0", Float, PortValue::Float(0.0))
            .input_with("Edge1", Float, PortValue::Float(1.0))
            .input("X", Float)
            .output("Result", Float),
    );
    registry.register(
        NodeType::new("clamp", "Clamp", NodeCategory::Math, "Clamp value between min and max")
            .input("Value", Any)
            .input_with("Min", Any, PortValue::Float(0.0))
            .input_with("Max", Any, PortValue::Float(1.0))
            .output("Result", Any),
    );
    registry.register(
        NodeType::new("remap", "Remap", NodeCategory::Math, "Remap value from one range to another")
            .input("Value", Float)
            .input_with("In Min", Float, PortValue::Float(0.0))
            .input_with("In Max", Float, PortValue::Float(1.0))
            .input_with("Out Min", Float, PortValue::Float(0.0))
            .input_with("Out Max", Float, PortValue::Float(1.0))
            .output("Result", Float),
    );

    // ========================================================================
    // Vector Nodes
    // ========================================================================

    registry.register(
        NodeType::new("dot", "Dot Product", NodeCategory::Math, "Dot product of two vectors")
            .input("A", Vector3)
            .input("B", Vector3)
            .output("Result", Float),
    );
    registry.register(
        NodeType::new("cross", "Cross Product", NodeCategory::Math, "Cross product of two vectors")
            .input("A", Vector3)
            .input("B", Vector3)
            .output("Result", Vector3),
    );
    registry.register(
        NodeType::new("length", "Length", NodeCategory::Math, "Vector length")
            .input("Vector", Any)
            .output("Length", Float),
    );
    registry.register(
        NodeType::new("distance", "Distance", NodeCategory::Math, "Distance between two points")
            .input("A", Any)
            .input("B", Any)
            .output("Distance", Float),
    );
    registry.register(
        NodeType::new("reflect", "Reflect", NodeCategory::Math, "Reflect vector around normal")
            .input("Vector", Vector3)
            .input("Normal", Vector3)
            .output("Result", Vector3),
    );

    let axes = ["X", "Y", "Z", "W"];
    for (n, ty) in [(2, Vector2), (3, Vector3), (4, Vector4)] {
        let mut split = NodeType::new(
            format!("split_vector{n}"),
            format!("Split Vector{n}"),
            NodeCategory::Utility,
            format!("Split a {n}D vector into components"),
        )
        .input("Vector", ty.clone());
        let mut combine = NodeType::new(
            format!("combine_vector{n}"),
            format!("Combine Vector{n}"),
            NodeCategory::Utility,
            format!("Build a {n}D vector from components"),
        );
        for axis in &axes[..n] {
            split = split.output(axis, Float);
            combine = combine.input_with(axis, Float, PortValue::Float(0.0));
        }
        registry.register(split);
        registry.register(combine.output("Vector", ty));
    }

    // ========================================================================
    // Procedural & Effects
    // ========================================================================

    registry.register(
        NodeType::new("uv_tiling", "UV Tiling", NodeCategory::Utility, "Scale and offset UVs")
            .input("UV", Vector2)
            .input_with("Tiling", Vector2, PortValue::Vector2([1.0, 1.0]))
            .input_with("Offset", Vector2, PortValue::Vector2([0.0, 0.0]))
            .output("UV", Vector2),
    );
    registry.register(
        NodeType::new("checkerboard", "Checkerboard", NodeCategory::Utility, "Checkerboard pattern")
            .input("UV", Vector2)
            .input_with("Scale", Float, PortValue::Float(2.0))
            .input_with("Color A", Color, PortValue::Color([0.0, 0.0, 0.0, 1.0]))
            .input_with("Color B", Color, PortValue::Color([1.0, 1.0, 1.0, 1.0]))
            .output("Color", Color),
    );
    registry.register(
        NodeType::new("fresnel", "Fresnel", NodeCategory::Utility, "Fresnel effect based on view angle")
            .input("Normal", Vector3)
            .input_with("Power", Float, PortValue::Float(5.0))
            .output("Result", Float),
    );
    registry.register(
        NodeType::new("noise_perlin", "Perlin Noise", NodeCategory::Utility, "Gradient noise")
            .input("UV", Vector2)
            .input_with("Scale", Float, PortValue::Float(10.0))
            .output("Value", Float),
    );
    registry.register(
        NodeType::new("noise_voronoi", "Voronoi Noise", NodeCategory::Utility, "Cellular noise")
            .input("UV", Vector2)
            .input_with("Scale", Float, PortValue::Float(5.0))
            .input_with("Randomness", Float, PortValue::Float(1.0))
            .output("Distance", Float)
            .output("Cells", Float),
    );

    // ========================================================================
    // Custom
    // ========================================================================

    registry.register(
        NodeType::new("reroute", "Reroute", NodeCategory::Custom, "Pass-through used to tidy wires")
            .input("In", Any)
            .output("Out", Any),
    );

    // Ports are authored per instance; the code lives in `CODE_PROPERTY`
    // or is loaded through `CODE_RESOURCE_PROPERTY`.
    registry.register(NodeType::new(
        "custom_code",
        "Custom Code",
        NodeCategory::Custom,
        "User-written expression code compiled into nodes",
    ));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_carry_output_literal() {
        let registry = create_material_registry();
        let node = registry.create_node("color_constant").unwrap();
        assert_eq!(
            node.outputs[0].default_value,
            Some(PortValue::Color([1.0, 1.0, 1.0, 1.0]))
        );
    }

    #[test]
    fn test_split_and_combine_arity() {
        let registry = create_material_registry();
        assert_eq!(registry.get("split_vector3").unwrap().outputs.len(), 3);
        assert_eq!(registry.get("combine_vector4").unwrap().inputs.len(), 4);
        assert_eq!(registry.types_in_category(NodeCategory::Output).count(), 3);
    }
}
