// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snippet syntax tree. Every node carries the byte offset it came from.

use crate::builder::SystemInput;
use crate::shape::Shape;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Program {
    pub(crate) body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stmt {
    pub(crate) kind: StmtKind,
    pub(crate) offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StmtKind {
    Declare {
        shape: Shape,
        name: String,
        init: Option<Expr>,
    },
    Assign {
        target: String,
        op: AssignOp,
        value: Expr,
    },
    /// `i++` / `i--`
    Step {
        target: String,
        increment: bool,
    },
    Expr(Expr),
    Block(Vec<Stmt>),
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// `while` and `do ... while`; parsed so they can be rejected with a location
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `return`, `break` or `continue`
    Jump(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    pub(crate) fn binary(self) -> Option<BinaryOp> {
        match self {
            Self::Set => None,
            Self::Add => Some(BinaryOp::Add),
            Self::Sub => Some(BinaryOp::Sub),
            Self::Mul => Some(BinaryOp::Mul),
            Self::Div => Some(BinaryOp::Div),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expr {
    pub(crate) kind: ExprKind,
    pub(crate) offset: usize,
}

impl Expr {
    pub(crate) fn new(kind: ExprKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprKind {
    Lit(Lit),
    Ident(String),
    /// Identifier resolved to a renderer-provided property.
    Global(SystemInput),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
    Swizzle {
        base: Box<Expr>,
        components: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Lit {
    Bool(bool),
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    pub(crate) fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    pub(crate) fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

/// Shape named by a declaration keyword. GLSL, HLSL and MaterialX spellings
/// are all accepted.
pub(crate) fn shape_from_type_name(name: &str) -> Option<Shape> {
    Some(match name {
        "bool" | "boolean" => Shape::Boolean,
        "int" | "integer" => Shape::Integer,
        "float" | "half" => Shape::Float,
        "vec2" | "float2" | "vector2" => Shape::Vector2,
        "vec3" | "float3" | "vector3" => Shape::Vector3,
        "vec4" | "float4" | "vector4" => Shape::Vector4,
        "color3" | "color" => Shape::Color3,
        "color4" => Shape::Color4,
        "mat2" | "float2x2" | "matrix22" => Shape::Matrix22,
        "mat3" | "float3x3" | "matrix33" => Shape::Matrix33,
        "mat4" | "float4x4" | "matrix44" => Shape::Matrix44,
        "string" => Shape::String,
        "filename" | "texture" | "sampler2D" => Shape::Filename,
        _ => return None,
    })
}
