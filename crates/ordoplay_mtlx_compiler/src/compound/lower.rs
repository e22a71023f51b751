// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lowering of straight-line snippets to a data-flow subgraph.
//!
//! Each expression becomes one or more nodes. Identical nodes are shared
//! through a cache keyed by category, shape and operands. Literal operands
//! stay literal; reads of snippet inputs and renderer properties become
//! operands the caller wires up when the subgraph is instantiated.

use super::ast::{BinaryOp, Expr, ExprKind, Lit, Program, Stmt, StmtKind, UnaryOp};
use super::builtins::{lookup, Builtin};
use super::error::CompoundError;
use super::types::{binary_shape, swizzle, unify, BinaryShape};
use super::Signature;
use crate::builder::SystemInput;
use crate::shape::{coercion, Coercion, Shape, Value};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Where a subgraph port takes its value from
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Another node of the same subgraph, by index
    Node(usize),
    /// A literal written onto the port
    Literal(Value),
    /// A snippet input, supplied by the caller
    Input(String),
    /// A renderer-provided property
    Global(SystemInput),
}

impl Operand {
    fn key(&self) -> String {
        match self {
            Self::Node(i) => format!("#{i}"),
            Self::Literal(v) => format!("={v}"),
            Self::Input(name) => format!("${name}"),
            Self::Global(input) => format!("@{}", input.node_name()),
        }
    }
}

/// A node of a lowered snippet
#[derive(Debug, Clone, PartialEq)]
pub struct SubNode {
    /// Destination category
    pub category: String,
    /// Output shape
    pub shape: Shape,
    /// Ports in declaration order
    pub ports: Vec<(String, Shape, Operand)>,
    /// Output name this node stands for, if it is an output alias
    pub alias: Option<String>,
}

/// A lowered snippet. Output aliases are the last nodes, in signature order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subgraph {
    /// Nodes in dependency order
    pub nodes: Vec<SubNode>,
    /// Output name to alias node index
    pub outputs: IndexMap<String, usize>,
}

impl Subgraph {
    /// Number of nodes with `category`
    pub fn count(&self, category: &str) -> usize {
        self.nodes.iter().filter(|n| n.category == category).count()
    }
}

#[derive(Debug, Clone)]
struct Val {
    op: Operand,
    shape: Shape,
}

impl Val {
    fn lit(value: Value, shape: Shape) -> Self {
        Self { op: Operand::Literal(value), shape }
    }

    fn float(value: f32) -> Self {
        Self::lit(Value::Float(value), Shape::Float)
    }
}

fn zero(shape: Shape) -> Value {
    match shape {
        Shape::Boolean => Value::Boolean(false),
        Shape::Integer => Value::Integer(0),
        Shape::String | Shape::Filename => Value::String(String::new()),
        other => Value::splat(other, 0.0).unwrap_or(Value::Float(0.0)),
    }
}

fn literal(lit: Lit, offset: usize) -> Result<Val, CompoundError> {
    Ok(match lit {
        Lit::Bool(b) => Val::lit(Value::Boolean(b), Shape::Boolean),
        Lit::Int(i) => {
            let i = i32::try_from(i)
                .map_err(|_| CompoundError::type_error(offset, format!("integer value {i} does not fit in 32 bits")))?;
            Val::lit(Value::Integer(i), Shape::Integer)
        }
        Lit::Float(f) => Val::float(f as f32),
    })
}

struct Lowerer {
    graph: Subgraph,
    cache: HashMap<String, usize>,
    scopes: Vec<HashMap<String, Val>>,
}

/// Lower a checked, unrolled program.
pub(crate) fn lower_program(program: &Program, sig: &Signature) -> Result<Subgraph, CompoundError> {
    let mut base = HashMap::new();
    for (name, shape) in &sig.inputs {
        base.insert(name.clone(), Val { op: Operand::Input(name.clone()), shape: *shape });
    }
    let mut lowerer = Lowerer { graph: Subgraph::default(), cache: HashMap::new(), scopes: vec![base] };
    lowerer.stmts(&program.body)?;

    for (name, shape) in &sig.outputs {
        let value = lowerer
            .lookup(name)
            .ok_or_else(|| CompoundError::type_error(0, format!("output '{name}' is never assigned")))?;
        let value = lowerer.coerce(value, *shape);
        let index = lowerer.graph.nodes.len();
        lowerer.graph.nodes.push(SubNode {
            category: "dot".to_string(),
            shape: *shape,
            ports: vec![("in".to_string(), *shape, value.op)],
            alias: Some(name.clone()),
        });
        lowerer.graph.outputs.insert(name.clone(), index);
    }
    Ok(lowerer.graph)
}

impl Lowerer {
    fn lookup(&self, name: &str) -> Option<Val> {
        self.scopes.iter().rev().find_map(|s| s.get(name).cloned())
    }

    fn assign(&mut self, name: &str, value: Val) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return;
            }
        }
        // First write to an output
        if let Some(base) = self.scopes.first_mut() {
            base.insert(name.to_string(), value);
        }
    }

    fn node(&mut self, category: &str, shape: Shape, ports: Vec<(&str, Val)>) -> Val {
        let ports: Vec<(String, Shape, Operand)> =
            ports.into_iter().map(|(name, v)| (name.to_string(), v.shape, v.op)).collect();
        let mut key = format!("{category}:{shape}");
        for (name, port_shape, op) in &ports {
            key.push_str(&format!("|{name}:{port_shape}{}", op.key()));
        }
        let index = match self.cache.get(&key) {
            Some(index) => *index,
            None => {
                let index = self.graph.nodes.len();
                self.graph.nodes.push(SubNode { category: category.to_string(), shape, ports, alias: None });
                self.cache.insert(key, index);
                index
            }
        };
        Val { op: Operand::Node(index), shape }
    }

    /// Deliver `value` as `shape`: literals are re-expressed, everything else
    /// goes through a conversion node.
    fn coerce(&mut self, value: Val, shape: Shape) -> Val {
        if value.shape == shape {
            return value;
        }
        if let Operand::Literal(v) = &value.op {
            let converted = v.coerce(value.shape, shape).or_else(|| {
                // Explicit scalar conversions such as int(2.7)
                let first = *v.components()?.first()?;
                shape.is_scalar().then(|| Value::from_components(shape, &[first]))
            });
            if let Some(converted) = converted {
                return Val::lit(converted, shape);
            }
        }
        if coercion(value.shape, shape) == Coercion::Truncate {
            return self.extract(value, 0);
        }
        self.node("convert", shape, vec![("in", value)])
    }

    fn extract(&mut self, value: Val, index: usize) -> Val {
        if let Operand::Literal(v) = &value.op {
            if let Some(c) = v.components().and_then(|c| c.get(index).copied()) {
                return Val::float(c);
            }
        }
        if value.shape == Shape::Float {
            return value;
        }
        self.node("extract", Shape::Float, vec![("in", value), ("index", Val::lit(Value::Integer(index as i32), Shape::Integer))])
    }

    fn combine(&mut self, shape: Shape, components: Vec<Val>) -> Val {
        let literals: Option<Vec<f32>> = components
            .iter()
            .map(|c| match &c.op {
                Operand::Literal(v) => v.components().and_then(|c| c.first().copied()),
                _ => None,
            })
            .collect();
        if let Some(literals) = literals {
            return Val::lit(Value::from_components(shape, &literals), shape);
        }
        let category = format!("combine{}", components.len());
        let names = ["in1", "in2", "in3", "in4"];
        let ports = names.iter().copied().zip(components).collect();
        self.node(&category, shape, ports)
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<(), CompoundError> {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Declare { shape, name, init } => {
                    let value = match init {
                        Some(init) => {
                            let value = self.expr(init)?;
                            self.coerce(value, *shape)
                        }
                        None => Val::lit(zero(*shape), *shape),
                    };
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert(name.clone(), value);
                    }
                }
                StmtKind::Assign { target, op, value } => {
                    let rhs = self.expr(value)?;
                    let current = self.lookup(target);
                    let (value, shape) = match (op.binary(), current) {
                        (Some(op), Some(current)) => {
                            let shape = current.shape;
                            (self.binary(op, current, rhs, stmt.offset)?, shape)
                        }
                        (None, Some(current)) => (rhs, current.shape),
                        (_, None) => {
                            let shape = rhs.shape;
                            (rhs, shape)
                        }
                    };
                    let value = self.coerce(value, shape);
                    self.assign(target, value);
                }
                StmtKind::Block(body) => {
                    self.scopes.push(HashMap::new());
                    let result = self.stmts(body);
                    self.scopes.pop();
                    result?;
                }
                // No side effects to keep
                StmtKind::Expr(_) => {}
                _ => {
                    return Err(CompoundError::unsupported(stmt.offset, "control flow survived unrolling"));
                }
            }
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<Val, CompoundError> {
        let offset = expr.offset;
        match &expr.kind {
            ExprKind::Lit(lit) => literal(*lit, offset),
            ExprKind::Ident(name) => self
                .lookup(name)
                .ok_or_else(|| CompoundError::type_error(offset, format!("output '{name}' is read before it is assigned"))),
            ExprKind::Global(input) => Ok(Val { op: Operand::Global(*input), shape: input.shape() }),
            ExprKind::Unary { op: UnaryOp::Neg, expr } => {
                let value = self.expr(expr)?;
                if let Operand::Literal(v) = &value.op {
                    let negated = match v {
                        Value::Integer(i) => i.checked_neg().map(Value::Integer),
                        other => other
                            .components()
                            .map(|c| Value::from_components(value.shape, &c.iter().map(|x| -x).collect::<Vec<_>>())),
                    };
                    if let Some(negated) = negated {
                        return Ok(Val::lit(negated, value.shape));
                    }
                }
                let shape = if value.shape == Shape::Integer { Shape::Float } else { value.shape };
                let value = self.coerce(value, shape);
                let minus_one = self.coerce(Val::float(-1.0), shape);
                Ok(self.node("multiply", shape, vec![("in1", value), ("in2", minus_one)]))
            }
            ExprKind::Unary { op: UnaryOp::Not, expr } => {
                let value = self.expr(expr)?;
                Ok(self.node("not", Shape::Boolean, vec![("in", value)]))
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.expr(left)?;
                let r = self.expr(right)?;
                self.binary(*op, l, r, offset)
            }
            ExprKind::Call { func, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.expr(arg)?);
                }
                self.call(func, values, offset)
            }
            ExprKind::Swizzle { base, components } => {
                let base = self.expr(base)?;
                let (indices, shape) = swizzle(base.shape, components, offset)?;
                Ok(self.select(base, &indices, shape))
            }
            ExprKind::Index { base, index } => {
                let base = self.expr(base)?;
                let ExprKind::Lit(Lit::Int(i)) = index.kind else {
                    return Err(CompoundError::unsupported(index.offset, "index must be a compile-time constant"));
                };
                Ok(self.extract(base, i as usize))
            }
            ExprKind::Ternary { cond, then_expr, else_expr } => {
                let cond = self.expr(cond)?;
                let a = self.expr(then_expr)?;
                let b = self.expr(else_expr)?;
                let shape = unify(a.shape, b.shape).ok_or_else(|| {
                    CompoundError::type_error(offset, format!("conditional branches cannot combine {} and {}", a.shape, b.shape))
                })?;
                let a = self.coerce(a, shape);
                let b = self.coerce(b, shape);
                Ok(self.node(
                    "ifequal",
                    shape,
                    vec![
                        ("value1", cond),
                        ("value2", Val::lit(Value::Boolean(true), Shape::Boolean)),
                        ("in1", a),
                        ("in2", b),
                    ],
                ))
            }
        }
    }

    fn select(&mut self, base: Val, indices: &[usize], shape: Shape) -> Val {
        let identity = indices.iter().enumerate().all(|(i, &c)| i == c) && base.shape.arity() == Some(indices.len());
        if identity {
            return self.coerce(base, shape);
        }
        if indices.len() == 1 {
            return self.extract(base, indices[0]);
        }
        let parts = indices.iter().map(|&i| self.extract(base.clone(), i)).collect();
        self.combine(shape, parts)
    }

    fn binary(&mut self, op: BinaryOp, l: Val, r: Val, offset: usize) -> Result<Val, CompoundError> {
        match binary_shape(op, l.shape, r.shape, offset)? {
            BinaryShape::Transform { vector } => {
                let r = self.coerce(r, vector);
                Ok(self.node("transformmatrix", vector, vec![("in", r), ("mat", l)]))
            }
            BinaryShape::Elementwise { operand, result } => {
                // Arithmetic on integers is carried out in float
                let operand = if operand == Shape::Integer && !op.is_comparison() { Shape::Float } else { operand };
                let result = if result == Shape::Integer { Shape::Float } else { result };
                let l = self.coerce(l, operand);
                let r = self.coerce(r, operand);
                let (category, first, second) = match op {
                    BinaryOp::Add => ("add", l, r),
                    BinaryOp::Sub => ("subtract", l, r),
                    BinaryOp::Mul => ("multiply", l, r),
                    BinaryOp::Div => ("divide", l, r),
                    BinaryOp::Mod => ("modulo", l, r),
                    BinaryOp::And => ("and", l, r),
                    BinaryOp::Or => ("or", l, r),
                    BinaryOp::Gt => return Ok(self.compare("ifgreater", l, r)),
                    BinaryOp::Lt => return Ok(self.compare("ifgreater", r, l)),
                    BinaryOp::Ge => return Ok(self.compare("ifgreatereq", l, r)),
                    BinaryOp::Le => return Ok(self.compare("ifgreatereq", r, l)),
                    BinaryOp::Eq => return Ok(self.compare("ifequal", l, r)),
                    BinaryOp::Ne => {
                        let eq = self.compare("ifequal", l, r);
                        return Ok(self.node("not", Shape::Boolean, vec![("in", eq)]));
                    }
                };
                Ok(self.node(category, result, vec![("in1", first), ("in2", second)]))
            }
        }
    }

    fn compare(&mut self, category: &str, value1: Val, value2: Val) -> Val {
        self.node(category, Shape::Boolean, vec![("value1", value1), ("value2", value2)])
    }

    fn call(&mut self, func: &str, args: Vec<Val>, offset: usize) -> Result<Val, CompoundError> {
        let builtin = lookup(func).ok_or_else(|| {
            CompoundError::unsupported(offset, format!("call to '{func}' is not supported"))
        })?;
        let arity_error = || CompoundError::type_error(offset, format!("wrong number of arguments to '{func}'"));
        let float_of = |shape: Shape| if shape == Shape::Integer { Shape::Float } else { shape };

        let mut args = args.into_iter();
        let mut next = || args.next().ok_or_else(arity_error);

        Ok(match builtin {
            Builtin::Unary(category) => {
                let x = next()?;
                let shape = float_of(x.shape);
                let x = self.coerce(x, shape);
                self.node(category, shape, vec![("in", x)])
            }
            Builtin::Binary(category) => {
                let (a, b) = (next()?, next()?);
                let shape = float_of(unify(a.shape, b.shape).ok_or_else(arity_error)?);
                let a = self.coerce(a, shape);
                let b = self.coerce(b, shape);
                self.node(category, shape, vec![("in1", a), ("in2", b)])
            }
            Builtin::Atan => {
                let y = next()?;
                let y = self.coerce(y, Shape::Float);
                self.node("atan2", Shape::Float, vec![("iny", y), ("inx", Val::float(1.0))])
            }
            Builtin::Atan2 => {
                let (y, x) = (next()?, next()?);
                let y = self.coerce(y, Shape::Float);
                let x = self.coerce(x, Shape::Float);
                self.node("atan2", Shape::Float, vec![("iny", y), ("inx", x)])
            }
            Builtin::Fract => {
                let x = next()?;
                let shape = float_of(x.shape);
                let x = self.coerce(x, shape);
                let floor = self.node("floor", shape, vec![("in", x.clone())]);
                self.node("subtract", shape, vec![("in1", x), ("in2", floor)])
            }
            Builtin::Saturate => {
                let x = next()?;
                let shape = float_of(x.shape);
                let x = self.coerce(x, shape);
                let low = self.coerce(Val::float(0.0), shape);
                let high = self.coerce(Val::float(1.0), shape);
                self.node("clamp", shape, vec![("in", x), ("low", low), ("high", high)])
            }
            Builtin::Step => {
                let (edge, x) = (next()?, next()?);
                let edge = self.coerce(edge, Shape::Float);
                let x = self.coerce(x, Shape::Float);
                self.node(
                    "ifgreatereq",
                    Shape::Float,
                    vec![("value1", x), ("value2", edge), ("in1", Val::float(1.0)), ("in2", Val::float(0.0))],
                )
            }
            Builtin::Clamp => {
                let (x, low, high) = (next()?, next()?, next()?);
                let shape = float_of(x.shape);
                let x = self.coerce(x, shape);
                let low = self.coerce(low, shape);
                let high = self.coerce(high, shape);
                self.node("clamp", shape, vec![("in", x), ("low", low), ("high", high)])
            }
            Builtin::Mix => {
                let (a, b, t) = (next()?, next()?, next()?);
                let shape = float_of(unify(a.shape, b.shape).ok_or_else(arity_error)?);
                let a = self.coerce(a, shape);
                let b = self.coerce(b, shape);
                let t_shape = if t.shape == shape { shape } else { Shape::Float };
                let t = self.coerce(t, t_shape);
                self.node("mix", shape, vec![("fg", b), ("bg", a), ("mix", t)])
            }
            Builtin::Smoothstep => {
                let (low, high, x) = (next()?, next()?, next()?);
                let shape = float_of(x.shape);
                let x = self.coerce(x, shape);
                let low = self.coerce(low, shape);
                let high = self.coerce(high, shape);
                self.node("smoothstep", shape, vec![("in", x), ("low", low), ("high", high)])
            }
            Builtin::Dot => {
                let (a, b) = (next()?, next()?);
                let shape = unify(a.shape, b.shape).ok_or_else(arity_error)?;
                let a = self.coerce(a, shape);
                let b = self.coerce(b, shape);
                self.node("dotproduct", Shape::Float, vec![("in1", a), ("in2", b)])
            }
            Builtin::Cross => {
                let (a, b) = (next()?, next()?);
                let a = self.coerce(a, Shape::Vector3);
                let b = self.coerce(b, Shape::Vector3);
                self.node("crossproduct", Shape::Vector3, vec![("in1", a), ("in2", b)])
            }
            Builtin::Length => {
                let x = next()?;
                self.magnitude(x)
            }
            Builtin::Distance => {
                let (a, b) = (next()?, next()?);
                let shape = float_of(unify(a.shape, b.shape).ok_or_else(arity_error)?);
                let a = self.coerce(a, shape);
                let b = self.coerce(b, shape);
                let delta = self.node("subtract", shape, vec![("in1", a), ("in2", b)]);
                self.magnitude(delta)
            }
            Builtin::Normalize => {
                let x = next()?;
                let shape = x.shape;
                self.node("normalize", shape, vec![("in", x)])
            }
            Builtin::Reflect => {
                // i - 2 * dot(n, i) * n
                let (i, n) = (next()?, next()?);
                let i = self.coerce(i, Shape::Vector3);
                let n = self.coerce(n, Shape::Vector3);
                let d = self.node("dotproduct", Shape::Float, vec![("in1", n.clone()), ("in2", i.clone())]);
                let twice = self.node("multiply", Shape::Float, vec![("in1", d), ("in2", Val::float(2.0))]);
                let twice = self.coerce(twice, Shape::Vector3);
                let scaled = self.node("multiply", Shape::Vector3, vec![("in1", n), ("in2", twice)]);
                self.node("subtract", Shape::Vector3, vec![("in1", i), ("in2", scaled)])
            }
            Builtin::Texture => {
                let (file, uv) = (next()?, next()?);
                let uv = self.coerce(uv, Shape::Vector2);
                self.node("image", Shape::Color4, vec![("file", file), ("texcoord", uv)])
            }
            Builtin::Construct(target) => {
                let args: Vec<Val> = std::iter::from_fn(|| next().ok()).collect();
                self.construct(target, args, offset)?
            }
        })
    }

    /// Length of a vector; the absolute value of a scalar
    fn magnitude(&mut self, x: Val) -> Val {
        if x.shape.is_scalar() {
            let x = self.coerce(x, Shape::Float);
            self.node("absval", Shape::Float, vec![("in", x)])
        } else {
            self.node("magnitude", Shape::Float, vec![("in", x)])
        }
    }

    fn construct(&mut self, target: Shape, args: Vec<Val>, offset: usize) -> Result<Val, CompoundError> {
        if args.len() == 1 {
            let mut args = args;
            let Some(arg) = args.pop() else {
                return Err(CompoundError::type_error(offset, "constructor needs an argument"));
            };
            return Ok(self.coerce(arg, target));
        }
        let mut parts = Vec::new();
        for arg in args {
            let n = arg.shape.arity().unwrap_or(1);
            if arg.shape.is_scalar() {
                parts.push(self.coerce(arg, Shape::Float));
            } else {
                for i in 0..n {
                    parts.push(self.extract(arg.clone(), i));
                }
            }
        }
        if Some(parts.len()) != target.arity() {
            return Err(CompoundError::type_error(offset, format!("wrong number of components for {target}")));
        }
        Ok(self.combine(target, parts))
    }
}
