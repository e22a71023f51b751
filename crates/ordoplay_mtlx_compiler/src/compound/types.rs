// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shape propagation and checking.
//!
//! Promotion runs integer → float → vector/color broadcast. Binary operators
//! need identical shapes once promoted. The same checker runs twice: on the
//! structured program (loops present) and again on the unrolled program,
//! where it also verifies indices and that outputs are assigned before use.

use super::ast::{BinaryOp, Expr, ExprKind, Lit, Program, Stmt, StmtKind, UnaryOp};
use super::builtins::call_shape;
use super::error::CompoundError;
use super::Signature;
use crate::shape::Shape;
use std::collections::{HashMap, HashSet};

/// Whether a value of `from` may be used where `to` is expected.
pub(crate) fn promotes(from: Shape, to: Shape) -> bool {
    from == to
        || (from == Shape::Integer && to == Shape::Float)
        || (matches!(from, Shape::Integer | Shape::Float) && to.is_vector_like())
}

/// Common shape of two operands after promotion.
pub(crate) fn unify(a: Shape, b: Shape) -> Option<Shape> {
    if promotes(a, b) {
        Some(b)
    } else if promotes(b, a) {
        Some(a)
    } else {
        None
    }
}

/// How a binary operator is carried out on its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryShape {
    /// Both operands promoted to `operand`; the result has shape `result`.
    Elementwise { operand: Shape, result: Shape },
    /// Vector transformed by a matrix
    Transform { vector: Shape },
}

pub(crate) fn binary_shape(op: BinaryOp, left: Shape, right: Shape, offset: usize) -> Result<BinaryShape, CompoundError> {
    let symbol = op.symbol();
    let mismatch = || {
        CompoundError::type_error(offset, format!("operator '{symbol}' cannot combine {left} and {right}"))
    };
    if left.is_text() || right.is_text() {
        return Err(mismatch());
    }

    if op.is_logical() {
        return if left == Shape::Boolean && right == Shape::Boolean {
            Ok(BinaryShape::Elementwise { operand: Shape::Boolean, result: Shape::Boolean })
        } else {
            Err(CompoundError::type_error(
                offset,
                format!("operator '{symbol}' requires boolean operands, found {left} and {right}"),
            ))
        };
    }

    if op.is_comparison() {
        let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);
        let scalar = |s: Shape| s == Shape::Integer || s == Shape::Float || (equality && s == Shape::Boolean);
        if !scalar(left) || !scalar(right) {
            return Err(CompoundError::type_error(
                offset,
                format!("operator '{symbol}' requires scalar operands, found {left} and {right}"),
            ));
        }
        let operand = unify(left, right).ok_or_else(mismatch)?;
        return Ok(BinaryShape::Elementwise { operand, result: Shape::Boolean });
    }

    if left == Shape::Boolean || right == Shape::Boolean {
        return Err(mismatch());
    }

    if left.is_matrix() || right.is_matrix() {
        return match (left, right) {
            (a, b) if a == b && matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul) => {
                Ok(BinaryShape::Elementwise { operand: a, result: a })
            }
            (Shape::Matrix33, Shape::Vector3)
            | (Shape::Matrix44, Shape::Vector3 | Shape::Vector4)
                if op == BinaryOp::Mul =>
            {
                Ok(BinaryShape::Transform { vector: right })
            }
            _ => Err(mismatch()),
        };
    }

    let operand = unify(left, right).ok_or_else(mismatch)?;
    Ok(BinaryShape::Elementwise { operand, result: operand })
}

pub(crate) fn unary_shape(op: UnaryOp, operand: Shape, offset: usize) -> Result<Shape, CompoundError> {
    match op {
        UnaryOp::Neg if operand != Shape::Boolean && !operand.is_text() => Ok(operand),
        UnaryOp::Not if operand == Shape::Boolean => Ok(Shape::Boolean),
        UnaryOp::Neg => Err(CompoundError::type_error(offset, format!("cannot negate a {operand}"))),
        UnaryOp::Not => Err(CompoundError::type_error(
            offset,
            format!("operator '!' requires a boolean operand, found {operand}"),
        )),
    }
}

/// Component indices and result shape of a swizzle such as `.xzy` or `.rgb`.
pub(crate) fn swizzle(base: Shape, components: &str, offset: usize) -> Result<(Vec<usize>, Shape), CompoundError> {
    let arity = match base {
        Shape::Float => 1,
        s if s.is_vector_like() => s.arity().unwrap_or(0),
        other => {
            return Err(CompoundError::type_error(offset, format!("cannot access components of a {other}")));
        }
    };
    if components.is_empty() || components.len() > 4 {
        return Err(CompoundError::type_error(offset, format!("invalid swizzle '.{components}'")));
    }
    let set = if components.chars().all(|c| "xyzw".contains(c)) {
        "xyzw"
    } else if components.chars().all(|c| "rgba".contains(c)) {
        "rgba"
    } else {
        return Err(CompoundError::type_error(offset, format!("invalid swizzle '.{components}'")));
    };
    let mut indices = Vec::with_capacity(components.len());
    for c in components.chars() {
        let index = set.find(c).unwrap_or(0);
        if index >= arity {
            return Err(CompoundError::type_error(
                offset,
                format!("component '{c}' is out of range for {base}"),
            ));
        }
        indices.push(index);
    }
    let shape = match (indices.len(), base.is_color()) {
        (1, _) => Shape::Float,
        (3, true) => Shape::Color3,
        (4, true) => Shape::Color4,
        (n, _) => Shape::vector(n).unwrap_or(Shape::Float),
    };
    Ok((indices, shape))
}

/// Which pass of the checker is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckMode {
    /// Before unrolling: loops and branches are still present
    Structured,
    /// After unrolling: straight-line code with constant indices
    Flat,
}

#[derive(Debug, Clone, Copy)]
struct Var {
    shape: Shape,
    assigned: bool,
}

struct Checker<'a> {
    mode: CheckMode,
    scopes: Vec<HashMap<String, Var>>,
    outputs: HashMap<&'a str, Var>,
    loop_vars: HashSet<String>,
}

/// Check shapes across a whole program.
pub(crate) fn check_program(program: &Program, sig: &Signature, mode: CheckMode, end: usize) -> Result<(), CompoundError> {
    let mut base = HashMap::new();
    for (name, shape) in &sig.inputs {
        base.insert(name.clone(), Var { shape: *shape, assigned: true });
    }
    let mut checker = Checker {
        mode,
        scopes: vec![base],
        outputs: sig
            .outputs
            .iter()
            .map(|(name, shape)| (name.as_str(), Var { shape: *shape, assigned: false }))
            .collect(),
        loop_vars: HashSet::new(),
    };
    checker.check_stmts(&program.body)?;

    if mode == CheckMode::Flat {
        for (name, _) in &sig.outputs {
            if checker.outputs.get(name.as_str()).is_some_and(|v| !v.assigned) {
                return Err(CompoundError::type_error(end, format!("output '{name}' is never assigned")));
            }
        }
    }
    Ok(())
}

impl Checker<'_> {
    fn lookup(&self, name: &str) -> Option<Var> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .or_else(|| self.outputs.get(name).copied())
    }

    fn mark_assigned(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(var) = scope.get_mut(name) {
                var.assigned = true;
                return;
            }
        }
        if let Some(var) = self.outputs.get_mut(name) {
            var.assigned = true;
        }
    }

    fn scoped(&mut self, stmts: &[Stmt]) -> Result<(), CompoundError> {
        self.scopes.push(HashMap::new());
        let result = self.check_stmts(stmts);
        self.scopes.pop();
        result
    }

    fn check_stmts(&mut self, stmts: &[Stmt]) -> Result<(), CompoundError> {
        for stmt in stmts {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn declare(&mut self, name: &str, shape: Shape) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Var { shape, assigned: true });
        }
    }

    fn check_target(&self, target: &str, offset: usize) -> Result<Var, CompoundError> {
        self.lookup(target)
            .ok_or_else(|| CompoundError::type_error(offset, format!("assignment to undeclared variable '{target}'")))
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), CompoundError> {
        let offset = stmt.offset;
        match &stmt.kind {
            StmtKind::Declare { shape, name, init } => {
                if let Some(init) = init {
                    let value = self.check_expr(init)?;
                    if !promotes(value, *shape) {
                        return Err(CompoundError::type_error(
                            init.offset,
                            format!("cannot initialize {shape} '{name}' with a {value}"),
                        ));
                    }
                }
                self.declare(name, *shape);
            }
            StmtKind::Assign { target, op, value } => {
                let var = self.check_target(target, offset)?;
                let mut value_shape = self.check_expr(value)?;
                if let Some(op) = op.binary() {
                    if self.mode == CheckMode::Flat && !var.assigned {
                        return Err(CompoundError::type_error(offset, format!("output '{target}' is read before it is assigned")));
                    }
                    value_shape = match binary_shape(op, var.shape, value_shape, offset)? {
                        BinaryShape::Elementwise { result, .. } => result,
                        BinaryShape::Transform { vector } => vector,
                    };
                }
                if !promotes(value_shape, var.shape) {
                    return Err(CompoundError::type_error(
                        value.offset,
                        format!("cannot assign a {value_shape} to {} '{target}'", var.shape),
                    ));
                }
                self.mark_assigned(target);
            }
            StmtKind::Step { target, .. } => {
                let var = self.check_target(target, offset)?;
                if !matches!(var.shape, Shape::Integer | Shape::Float) {
                    return Err(CompoundError::type_error(offset, format!("cannot step a {}", var.shape)));
                }
            }
            StmtKind::Expr(expr) => {
                self.check_expr(expr)?;
            }
            StmtKind::Block(body) => self.scoped(body)?,
            StmtKind::For { init, cond, step, body } => {
                self.scopes.push(HashMap::new());
                let mut loop_var = None;
                if let Some(init) = init {
                    self.check_stmt(init)?;
                    loop_var = match &init.kind {
                        StmtKind::Declare { name, .. } | StmtKind::Assign { target: name, .. } => Some(name.clone()),
                        _ => None,
                    };
                }
                if let Some(name) = &loop_var {
                    self.loop_vars.insert(name.clone());
                }
                let result = self.check_loop(cond.as_ref(), step.as_deref(), body);
                if let Some(name) = &loop_var {
                    self.loop_vars.remove(name);
                }
                self.scopes.pop();
                result?;
            }
            StmtKind::If { cond, then_body, else_body } => {
                self.expect_boolean(cond)?;
                self.scoped(then_body)?;
                self.scoped(else_body)?;
            }
            StmtKind::While { cond, body } => {
                self.expect_boolean(cond)?;
                self.scoped(body)?;
            }
            StmtKind::Jump(_) => {}
        }
        Ok(())
    }

    fn check_loop(&mut self, cond: Option<&Expr>, step: Option<&Stmt>, body: &[Stmt]) -> Result<(), CompoundError> {
        if let Some(cond) = cond {
            self.expect_boolean(cond)?;
        }
        if let Some(step) = step {
            self.check_stmt(step)?;
        }
        self.scoped(body)
    }

    fn expect_boolean(&mut self, cond: &Expr) -> Result<(), CompoundError> {
        let shape = self.check_expr(cond)?;
        if shape == Shape::Boolean {
            Ok(())
        } else {
            Err(CompoundError::type_error(cond.offset, format!("condition must be boolean, found {shape}")))
        }
    }

    /// Literals and loop variables only
    fn is_constant(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Lit(_) => true,
            ExprKind::Ident(name) => self.loop_vars.contains(name),
            ExprKind::Unary { expr, .. } => self.is_constant(expr),
            ExprKind::Binary { left, right, .. } => self.is_constant(left) && self.is_constant(right),
            _ => false,
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> Result<Shape, CompoundError> {
        let offset = expr.offset;
        match &expr.kind {
            ExprKind::Lit(Lit::Bool(_)) => Ok(Shape::Boolean),
            ExprKind::Lit(Lit::Int(_)) => Ok(Shape::Integer),
            ExprKind::Lit(Lit::Float(_)) => Ok(Shape::Float),
            ExprKind::Ident(name) => {
                let var = self
                    .lookup(name)
                    .ok_or_else(|| CompoundError::type_error(offset, format!("unknown identifier '{name}'")))?;
                if self.mode == CheckMode::Flat && !var.assigned {
                    return Err(CompoundError::type_error(offset, format!("output '{name}' is read before it is assigned")));
                }
                Ok(var.shape)
            }
            ExprKind::Global(input) => Ok(input.shape()),
            ExprKind::Unary { op, expr } => {
                let operand = self.check_expr(expr)?;
                unary_shape(*op, operand, offset)
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.check_expr(left)?;
                let r = self.check_expr(right)?;
                Ok(match binary_shape(*op, l, r, offset)? {
                    BinaryShape::Elementwise { result, .. } => result,
                    BinaryShape::Transform { vector } => vector,
                })
            }
            ExprKind::Call { func, args } => {
                let mut shapes = Vec::with_capacity(args.len());
                for arg in args {
                    shapes.push(self.check_expr(arg)?);
                }
                call_shape(func, &shapes, offset)
            }
            ExprKind::Swizzle { base, components } => {
                let base = self.check_expr(base)?;
                Ok(swizzle(base, components, offset)?.1)
            }
            ExprKind::Index { base, index } => {
                let base_shape = self.check_expr(base)?;
                if !base_shape.is_vector_like() {
                    return Err(CompoundError::type_error(offset, format!("cannot index a {base_shape}")));
                }
                let index_shape = self.check_expr(index)?;
                if index_shape != Shape::Integer {
                    return Err(CompoundError::type_error(index.offset, format!("index must be an integer, found {index_shape}")));
                }
                match (&index.kind, self.mode) {
                    (ExprKind::Lit(Lit::Int(i)), _) => {
                        let arity = base_shape.arity().unwrap_or(0) as i64;
                        if *i < 0 || *i >= arity {
                            return Err(CompoundError::type_error(
                                index.offset,
                                format!("index {i} is out of range for {base_shape}"),
                            ));
                        }
                    }
                    (_, CheckMode::Structured) if self.is_constant(index) => {}
                    _ => {
                        return Err(CompoundError::unsupported(
                            index.offset,
                            "index must be a compile-time constant",
                        ));
                    }
                }
                Ok(Shape::Float)
            }
            ExprKind::Ternary { cond, then_expr, else_expr } => {
                self.expect_boolean(cond)?;
                let a = self.check_expr(then_expr)?;
                let b = self.check_expr(else_expr)?;
                unify(a, b).ok_or_else(|| {
                    CompoundError::type_error(offset, format!("conditional branches cannot combine {a} and {b}"))
                })
            }
        }
    }
}
