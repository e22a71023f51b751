// SPDX-License-Identifier: MIT OR Apache-2.0
//! Destination value shapes, literal values and the coercion table.

use ordoplay_shader_graph::{PortType, PortValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a destination node output or port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Boolean
    Boolean,
    /// Integer
    Integer,
    /// Float
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// RGB color
    Color3,
    /// RGBA color
    Color4,
    /// 2x2 matrix
    Matrix22,
    /// 3x3 matrix
    Matrix33,
    /// 4x4 matrix
    Matrix44,
    /// String
    String,
    /// File path, typically a texture
    Filename,
    /// Surface shader root
    SurfaceShader,
    /// Displacement shader root
    DisplacementShader,
    /// Material root
    Material,
    /// Node with several named outputs
    MultiOutput,
}

impl Shape {
    /// MaterialX type name
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Vector2 => "vector2",
            Self::Vector3 => "vector3",
            Self::Vector4 => "vector4",
            Self::Color3 => "color3",
            Self::Color4 => "color4",
            Self::Matrix22 => "matrix22",
            Self::Matrix33 => "matrix33",
            Self::Matrix44 => "matrix44",
            Self::String => "string",
            Self::Filename => "filename",
            Self::SurfaceShader => "surfaceshader",
            Self::DisplacementShader => "displacementshader",
            Self::Material => "material",
            Self::MultiOutput => "multioutput",
        }
    }

    /// Number of float components, if numeric
    pub fn arity(self) -> Option<usize> {
        match self {
            Self::Boolean | Self::Integer | Self::Float => Some(1),
            Self::Vector2 => Some(2),
            Self::Vector3 | Self::Color3 => Some(3),
            Self::Vector4 | Self::Color4 | Self::Matrix22 => Some(4),
            Self::Matrix33 => Some(9),
            Self::Matrix44 => Some(16),
            _ => None,
        }
    }

    /// Vectors and colors
    pub fn is_vector_like(self) -> bool {
        matches!(
            self,
            Self::Vector2 | Self::Vector3 | Self::Vector4 | Self::Color3 | Self::Color4
        )
    }

    /// Boolean, integer and float
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Boolean | Self::Integer | Self::Float)
    }

    /// Matrices of any size
    pub fn is_matrix(self) -> bool {
        matches!(self, Self::Matrix22 | Self::Matrix33 | Self::Matrix44)
    }

    /// Colors of either size
    pub fn is_color(self) -> bool {
        matches!(self, Self::Color3 | Self::Color4)
    }

    /// String and filename
    pub fn is_text(self) -> bool {
        matches!(self, Self::String | Self::Filename)
    }

    /// The vector shape with `n` components (`n == 1` gives float)
    pub fn vector(n: usize) -> Option<Shape> {
        match n {
            1 => Some(Self::Float),
            2 => Some(Self::Vector2),
            3 => Some(Self::Vector3),
            4 => Some(Self::Vector4),
            _ => None,
        }
    }

    /// Shape used for a source port type. Unresolved dynamic ports are floats.
    pub fn from_port_type(port_type: &PortType) -> Shape {
        match port_type {
            PortType::Bool => Self::Boolean,
            PortType::Int => Self::Integer,
            PortType::Float | PortType::Any => Self::Float,
            PortType::Vector2 => Self::Vector2,
            PortType::Vector3 => Self::Vector3,
            PortType::Vector4 => Self::Vector4,
            PortType::Color => Self::Color4,
            PortType::Mat3 => Self::Matrix33,
            PortType::Mat4 => Self::Matrix44,
            PortType::Texture => Self::Filename,
            PortType::String => Self::String,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a value of one shape reaches a port of another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Same shape
    Identity,
    /// Same components under a different label (color3 and vector3)
    Relabel,
    /// Scalar widened to float or broadcast across components
    Promote,
    /// Vector or color truncated or padded to another width
    Resize,
    /// First component of a vector or color
    Truncate,
    /// No implicit conversion exists
    Incompatible,
}

/// Central coercion table shared by the builder, the resolver and literal writes.
pub fn coercion(from: Shape, to: Shape) -> Coercion {
    if from == to {
        return Coercion::Identity;
    }
    if from.is_text() && to.is_text() {
        return Coercion::Relabel;
    }
    if from.is_scalar() && (to == Shape::Float || to.is_vector_like()) {
        return Coercion::Promote;
    }
    if from.is_vector_like() && to.is_vector_like() {
        return if from.arity() == to.arity() {
            Coercion::Relabel
        } else {
            Coercion::Resize
        };
    }
    if from.is_vector_like() && to == Shape::Float {
        return Coercion::Truncate;
    }
    Coercion::Incompatible
}

/// Literal value carried by a destination port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean
    Boolean(bool),
    /// Integer
    Integer(i32),
    /// Float
    Float(f32),
    /// Vector, color or matrix components
    Tuple(Vec<f32>),
    /// String or filename
    String(String),
}

impl Value {
    /// Convert an authored source literal, returning its natural shape.
    pub fn from_port_value(value: &PortValue) -> (Value, Shape) {
        match value {
            PortValue::Bool(b) => (Self::Boolean(*b), Shape::Boolean),
            PortValue::Int(i) => (Self::Integer(*i), Shape::Integer),
            PortValue::Float(f) => (Self::Float(*f), Shape::Float),
            PortValue::Vector2(v) => (Self::Tuple(v.to_vec()), Shape::Vector2),
            PortValue::Vector3(v) => (Self::Tuple(v.to_vec()), Shape::Vector3),
            PortValue::Vector4(v) => (Self::Tuple(v.to_vec()), Shape::Vector4),
            PortValue::Color(c) => (Self::Tuple(c.to_vec()), Shape::Color4),
            PortValue::Mat4(m) => (Self::Tuple(m.to_vec()), Shape::Matrix44),
            PortValue::Texture(path) => (Self::String(path.clone()), Shape::Filename),
            PortValue::String(s) => (Self::String(s.clone()), Shape::String),
        }
    }

    /// Build a numeric value of `shape` from float components
    pub fn from_components(shape: Shape, components: &[f32]) -> Value {
        match shape {
            Shape::Boolean => Self::Boolean(components.first().is_some_and(|c| *c != 0.0)),
            Shape::Integer => Self::Integer(components.first().copied().unwrap_or(0.0) as i32),
            Shape::Float => Self::Float(components.first().copied().unwrap_or(0.0)),
            _ => Self::Tuple(components.to_vec()),
        }
    }

    /// A scalar broadcast to every component of `shape`
    pub fn splat(shape: Shape, value: f32) -> Option<Value> {
        let n = shape.arity()?;
        Some(Self::from_components(shape, &vec![value; n]))
    }

    /// Float components of a numeric value
    pub fn components(&self) -> Option<Vec<f32>> {
        match self {
            Self::Boolean(b) => Some(vec![if *b { 1.0 } else { 0.0 }]),
            Self::Integer(i) => Some(vec![*i as f32]),
            Self::Float(f) => Some(vec![*f]),
            Self::Tuple(v) => Some(v.clone()),
            Self::String(_) => None,
        }
    }

    /// Text payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Re-express a literal of shape `from` as shape `to`, following the
    /// coercion table. Resized colors gain an opaque alpha; other padding is zero.
    pub fn coerce(&self, from: Shape, to: Shape) -> Option<Value> {
        match coercion(from, to) {
            Coercion::Identity | Coercion::Relabel => Some(self.clone()),
            Coercion::Incompatible => None,
            Coercion::Promote => {
                let scalar = *self.components()?.first()?;
                Self::splat(to, scalar)
            }
            Coercion::Truncate => Some(Self::Float(*self.components()?.first()?)),
            Coercion::Resize => {
                let mut components = self.components()?;
                let n = to.arity()?;
                while components.len() < n {
                    let pad = if to == Shape::Color4 && components.len() == 3 { 1.0 } else { 0.0 };
                    components.push(pad);
                }
                components.truncate(n);
                Some(Self::Tuple(components))
            }
        }
    }

    /// Whether this literal can be stored in a port of `shape` as is
    pub fn fits(&self, shape: Shape) -> bool {
        match self {
            Self::Boolean(_) => shape == Shape::Boolean,
            Self::Integer(_) => shape == Shape::Integer,
            Self::Float(_) => shape == Shape::Float,
            Self::Tuple(v) => !shape.is_scalar() && shape.arity() == Some(v.len()),
            Self::String(_) => shape.is_text(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Tuple(v) => {
                for (i, c) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{c}")?;
                }
                Ok(())
            }
            Self::String(s) => f.write_str(s),
        }
    }
}
