// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// Matrix 3x3
    Mat3,
    /// Matrix 4x4
    Mat4,
    /// Texture asset reference
    Texture,
    /// String value
    String,
    /// Dynamic type, resolved from whatever is connected upstream
    Any,
}

impl PortType {
    /// Number of float components carried by this type, if numeric.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int | Self::Float => Some(1),
            Self::Vector2 => Some(2),
            Self::Vector3 => Some(3),
            Self::Vector4 | Self::Color => Some(4),
            Self::Mat3 => Some(9),
            Self::Mat4 => Some(16),
            Self::Texture | Self::String | Self::Any => None,
        }
    }

    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        // Dynamic ports accept anything
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if self == other {
            return true;
        }

        // Implicit conversions
        match (self, other) {
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            (Self::Bool, Self::Float) => true,
            (Self::Float, Self::Vector2 | Self::Vector3 | Self::Vector4 | Self::Color) => true,
            // Truncation and extension between vectors is allowed, as in most shader graphs
            (Self::Vector2 | Self::Vector3 | Self::Vector4 | Self::Color,
             Self::Vector2 | Self::Vector3 | Self::Vector4 | Self::Color) => true,
            _ => false,
        }
    }
}

/// A port on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Authored literal; for constant nodes this lives on the output port
    pub default_value: Option<PortValue>,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Input,
            port_type,
            default_value: None,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Output,
            port_type,
            default_value: None,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: PortValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Copy of this port with a fresh ID, used when instancing a node type.
    pub fn instantiate(&self) -> Self {
        Self {
            id: PortId::new(),
            ..self.clone()
        }
    }

    /// Check if a connection to another port is valid
    pub fn can_connect(&self, other: &Port) -> bool {
        if self.direction == other.direction {
            return false;
        }
        self.port_type.can_connect_to(&other.port_type)
    }
}

/// Value that can be stored in a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// Row-major 4x4 matrix
    Mat4([f32; 16]),
    /// Texture asset path
    Texture(String),
    /// String
    String(String),
}

impl PortValue {
    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Vector2(_) => PortType::Vector2,
            Self::Vector3(_) => PortType::Vector3,
            Self::Vector4(_) => PortType::Vector4,
            Self::Color(_) => PortType::Color,
            Self::Mat4(_) => PortType::Mat4,
            Self::Texture(_) => PortType::Texture,
            Self::String(_) => PortType::String,
        }
    }

    /// Flatten numeric values into their float components.
    pub fn components(&self) -> Option<Vec<f32>> {
        match self {
            Self::Bool(b) => Some(vec![if *b { 1.0 } else { 0.0 }]),
            Self::Int(i) => Some(vec![*i as f32]),
            Self::Float(f) => Some(vec![*f]),
            Self::Vector2(v) => Some(v.to_vec()),
            Self::Vector3(v) => Some(v.to_vec()),
            Self::Vector4(v) | Self::Color(v) => Some(v.to_vec()),
            Self::Mat4(m) => Some(m.to_vec()),
            Self::Texture(_) | Self::String(_) => None,
        }
    }

    /// Text payload of string-like values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Texture(s) | Self::String(s) => Some(s),
            _ => None,
        }
    }
}
