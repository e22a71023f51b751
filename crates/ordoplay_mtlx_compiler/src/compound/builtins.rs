// SPDX-License-Identifier: MIT OR Apache-2.0
//! Functions a snippet may call, and their result shapes.

use super::ast::shape_from_type_name;
use super::error::CompoundError;
use super::types::{promotes, unify};
use crate::shape::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    /// Component-wise single-argument function mapped to a node category
    Unary(&'static str),
    /// Component-wise two-argument function mapped to a node category
    Binary(&'static str),
    Atan,
    Atan2,
    Fract,
    Saturate,
    Step,
    Clamp,
    Mix,
    Smoothstep,
    Dot,
    Cross,
    Length,
    Distance,
    Normalize,
    Reflect,
    Texture,
    Construct(Shape),
}

pub(crate) fn lookup(name: &str) -> Option<Builtin> {
    let builtin = match name {
        "sin" => Builtin::Unary("sin"),
        "cos" => Builtin::Unary("cos"),
        "tan" => Builtin::Unary("tan"),
        "asin" => Builtin::Unary("asin"),
        "acos" => Builtin::Unary("acos"),
        "exp" => Builtin::Unary("exp"),
        "log" => Builtin::Unary("ln"),
        "sqrt" => Builtin::Unary("sqrt"),
        "abs" => Builtin::Unary("absval"),
        "floor" => Builtin::Unary("floor"),
        "ceil" => Builtin::Unary("ceil"),
        "sign" => Builtin::Unary("sign"),
        "pow" => Builtin::Binary("power"),
        "min" => Builtin::Binary("min"),
        "max" => Builtin::Binary("max"),
        "mod" | "fmod" => Builtin::Binary("modulo"),
        "atan" => Builtin::Atan,
        "atan2" => Builtin::Atan2,
        "fract" | "frac" => Builtin::Fract,
        "saturate" => Builtin::Saturate,
        "step" => Builtin::Step,
        "clamp" => Builtin::Clamp,
        "mix" | "lerp" => Builtin::Mix,
        "smoothstep" => Builtin::Smoothstep,
        "dot" => Builtin::Dot,
        "cross" => Builtin::Cross,
        "length" => Builtin::Length,
        "distance" => Builtin::Distance,
        "normalize" => Builtin::Normalize,
        "reflect" => Builtin::Reflect,
        "texture" | "sample" | "tex2D" => Builtin::Texture,
        other => Builtin::Construct(shape_from_type_name(other)?),
    };
    Some(builtin)
}

pub(crate) fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

fn is_float_like(shape: Shape) -> bool {
    matches!(shape, Shape::Integer | Shape::Float) || shape.is_vector_like()
}

/// Integers are computed as floats by every math builtin.
fn as_float(shape: Shape) -> Shape {
    if shape == Shape::Integer {
        Shape::Float
    } else {
        shape
    }
}

/// Result shape of calling `func` with arguments of `args` shapes.
pub(crate) fn call_shape(func: &str, args: &[Shape], offset: usize) -> Result<Shape, CompoundError> {
    let builtin = lookup(func).ok_or_else(|| {
        CompoundError::unsupported(offset, format!("call to '{func}' is not supported; only built-in functions may be called"))
    })?;

    let arity = |n: usize| -> Result<(), CompoundError> {
        if args.len() == n {
            Ok(())
        } else {
            Err(CompoundError::type_error(
                offset,
                format!("'{func}' expects {n} argument{}, found {}", if n == 1 { "" } else { "s" }, args.len()),
            ))
        }
    };
    let bad = |shape: Shape| CompoundError::type_error(offset, format!("'{func}' cannot take a {shape} argument"));
    let unified = |a: Shape, b: Shape| {
        unify(a, b).ok_or_else(|| {
            CompoundError::type_error(offset, format!("'{func}' cannot combine {a} and {b}"))
        })
    };
    let float_like = |shape: Shape| if is_float_like(shape) { Ok(as_float(shape)) } else { Err(bad(shape)) };
    let vector_like = |shape: Shape| if shape.is_vector_like() { Ok(shape) } else { Err(bad(shape)) };
    let exact = |shape: Shape, want: Shape| if promotes(shape, want) { Ok(want) } else { Err(bad(shape)) };

    match builtin {
        Builtin::Unary(_) | Builtin::Fract | Builtin::Saturate => {
            arity(1)?;
            float_like(args[0])
        }
        Builtin::Atan => {
            arity(1)?;
            exact(args[0], Shape::Float)
        }
        Builtin::Binary(_) => {
            arity(2)?;
            float_like(unified(args[0], args[1])?)
        }
        Builtin::Atan2 | Builtin::Step => {
            arity(2)?;
            exact(args[0], Shape::Float)?;
            exact(args[1], Shape::Float)
        }
        Builtin::Clamp => {
            arity(3)?;
            let shape = float_like(args[0])?;
            exact(args[1], shape)?;
            exact(args[2], shape)
        }
        Builtin::Mix => {
            arity(3)?;
            let shape = float_like(unified(args[0], args[1])?)?;
            if promotes(args[2], Shape::Float) || args[2] == shape {
                Ok(shape)
            } else {
                Err(bad(args[2]))
            }
        }
        Builtin::Smoothstep => {
            arity(3)?;
            let shape = float_like(args[2])?;
            exact(args[0], shape)?;
            exact(args[1], shape)
        }
        Builtin::Dot => {
            arity(2)?;
            vector_like(unified(args[0], args[1])?)?;
            Ok(Shape::Float)
        }
        Builtin::Distance => {
            arity(2)?;
            float_like(unified(args[0], args[1])?)?;
            Ok(Shape::Float)
        }
        Builtin::Cross | Builtin::Reflect => {
            arity(2)?;
            exact(args[0], Shape::Vector3)?;
            exact(args[1], Shape::Vector3)
        }
        Builtin::Length => {
            arity(1)?;
            float_like(args[0])?;
            Ok(Shape::Float)
        }
        Builtin::Normalize => {
            arity(1)?;
            vector_like(args[0])
        }
        Builtin::Texture => {
            arity(2)?;
            if args[0] != Shape::Filename {
                return Err(bad(args[0]));
            }
            exact(args[1], Shape::Vector2)?;
            Ok(Shape::Color4)
        }
        Builtin::Construct(target) => construct_shape(func, target, args, offset),
    }
}

fn construct_shape(func: &str, target: Shape, args: &[Shape], offset: usize) -> Result<Shape, CompoundError> {
    if target.is_matrix() || target.is_text() {
        return Err(CompoundError::unsupported(offset, format!("'{func}' constructors are not supported")));
    }
    if args.is_empty() {
        return Err(CompoundError::type_error(offset, format!("'{func}' needs at least one argument")));
    }
    if args.iter().any(|a| a.is_matrix() || a.is_text()) {
        return Err(CompoundError::type_error(offset, format!("'{func}' takes only scalar and vector arguments")));
    }
    if target.is_scalar() {
        return if args.len() == 1 && args[0].is_scalar() {
            Ok(target)
        } else {
            Err(CompoundError::type_error(offset, format!("'{func}' takes a single scalar argument")))
        };
    }
    // One argument converts; several are concatenated component-wise.
    if args.len() == 1 {
        return Ok(target);
    }
    let total: usize = args.iter().filter_map(|a| a.arity()).sum();
    let want = target.arity().unwrap_or(0);
    if total != want {
        return Err(CompoundError::type_error(
            offset,
            format!("'{func}' needs {want} components, found {total}"),
        ));
    }
    Ok(target)
}
