// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loop unrolling and constant branch folding.
//!
//! The output is straight-line code: every `for` becomes one block per
//! iteration with the loop variable replaced by a literal, and every `if`
//! becomes the block of the branch its constant condition selects.

use super::ast::{AssignOp, BinaryOp, Expr, ExprKind, Lit, Program, Stmt, StmtKind, UnaryOp};
use super::error::CompoundError;
use crate::shape::Shape;

/// Evaluate an expression made only of literals and bound loop variables.
pub(crate) fn const_eval(expr: &Expr, env: &[(String, Lit)]) -> Option<Lit> {
    match &expr.kind {
        ExprKind::Lit(lit) => Some(*lit),
        ExprKind::Ident(name) => env.iter().rev().find(|(n, _)| n == name).map(|(_, lit)| *lit),
        ExprKind::Unary { op, expr } => match (op, const_eval(expr, env)?) {
            (UnaryOp::Neg, Lit::Int(i)) => Some(Lit::Int(i.checked_neg()?)),
            (UnaryOp::Neg, Lit::Float(f)) => Some(Lit::Float(-f)),
            (UnaryOp::Not, Lit::Bool(b)) => Some(Lit::Bool(!b)),
            _ => None,
        },
        ExprKind::Binary { op, left, right } => fold_binary(*op, const_eval(left, env)?, const_eval(right, env)?),
        ExprKind::Ternary { cond, then_expr, else_expr } => match const_eval(cond, env)? {
            Lit::Bool(true) => const_eval(then_expr, env),
            Lit::Bool(false) => const_eval(else_expr, env),
            _ => None,
        },
        _ => None,
    }
}

fn as_f64(lit: Lit) -> Option<f64> {
    match lit {
        Lit::Int(i) => Some(i as f64),
        Lit::Float(f) => Some(f),
        Lit::Bool(_) => None,
    }
}

fn fold_binary(op: BinaryOp, left: Lit, right: Lit) -> Option<Lit> {
    use BinaryOp::*;
    match (op, left, right) {
        (And, Lit::Bool(a), Lit::Bool(b)) => return Some(Lit::Bool(a && b)),
        (Or, Lit::Bool(a), Lit::Bool(b)) => return Some(Lit::Bool(a || b)),
        (Eq, Lit::Bool(a), Lit::Bool(b)) => return Some(Lit::Bool(a == b)),
        (Ne, Lit::Bool(a), Lit::Bool(b)) => return Some(Lit::Bool(a != b)),
        (Add, Lit::Int(a), Lit::Int(b)) => return a.checked_add(b).map(Lit::Int),
        (Sub, Lit::Int(a), Lit::Int(b)) => return a.checked_sub(b).map(Lit::Int),
        (Mul, Lit::Int(a), Lit::Int(b)) => return a.checked_mul(b).map(Lit::Int),
        (Div, Lit::Int(a), Lit::Int(b)) => return a.checked_div(b).map(Lit::Int),
        (Mod, Lit::Int(a), Lit::Int(b)) => return a.checked_rem(b).map(Lit::Int),
        _ => {}
    }
    let (a, b) = (as_f64(left)?, as_f64(right)?);
    Some(match op {
        Add => Lit::Float(a + b),
        Sub => Lit::Float(a - b),
        Mul => Lit::Float(a * b),
        Div => Lit::Float(a / b),
        Mod => Lit::Float(a - b * (a / b).floor()),
        Eq => Lit::Bool(a == b),
        Ne => Lit::Bool(a != b),
        Lt => Lit::Bool(a < b),
        Le => Lit::Bool(a <= b),
        Gt => Lit::Bool(a > b),
        Ge => Lit::Bool(a >= b),
        And | Or => return None,
    })
}

/// Give a loop variable's value the representation of its declared shape.
fn conform(lit: Lit, shape: Shape) -> Lit {
    match (shape, lit) {
        (Shape::Float, Lit::Int(i)) => Lit::Float(i as f64),
        (Shape::Integer, Lit::Float(f)) => Lit::Int(f as i64),
        _ => lit,
    }
}

struct Unroller {
    /// Budget shared by every loop, nested ones included
    max_iterations: usize,
    expanded: usize,
    env: Vec<(String, Lit)>,
}

pub(crate) fn unroll_program(program: Program, max_iterations: usize) -> Result<Program, CompoundError> {
    let mut unroller = Unroller { max_iterations, expanded: 0, env: Vec::new() };
    let body = unroller.stmts(program.body)?;
    Ok(Program { body })
}

impl Unroller {
    fn stmts(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>, CompoundError> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.stmt(stmt, &mut out)?;
        }
        Ok(out)
    }

    fn stmt(&mut self, stmt: Stmt, out: &mut Vec<Stmt>) -> Result<(), CompoundError> {
        let offset = stmt.offset;
        let kind = match stmt.kind {
            StmtKind::Declare { shape, name, init } => StmtKind::Declare {
                shape,
                name,
                init: init.map(|e| self.subst(e)),
            },
            StmtKind::Assign { target, op, value } => StmtKind::Assign { target, op, value: self.subst(value) },
            StmtKind::Step { target, increment } => StmtKind::Assign {
                target,
                op: if increment { AssignOp::Add } else { AssignOp::Sub },
                value: Expr::new(ExprKind::Lit(Lit::Int(1)), offset),
            },
            StmtKind::Expr(expr) => StmtKind::Expr(self.subst(expr)),
            StmtKind::Block(body) => StmtKind::Block(self.stmts(body)?),
            StmtKind::If { cond, then_body, else_body } => {
                let taken = match const_eval(&cond, &self.env) {
                    Some(Lit::Bool(true)) => then_body,
                    Some(Lit::Bool(false)) => else_body,
                    _ => {
                        return Err(CompoundError::unsupported(
                            cond.offset,
                            "branch condition must be a compile-time constant; use the ?: operator to select values",
                        ));
                    }
                };
                StmtKind::Block(self.stmts(taken)?)
            }
            StmtKind::For { init, cond, step, body } => {
                return self.unroll_for(init, cond, step, body, offset, out);
            }
            StmtKind::While { .. } => {
                return Err(CompoundError::unsupported(offset, "'while' loops cannot be unrolled"));
            }
            StmtKind::Jump(keyword) => {
                return Err(CompoundError::unsupported(offset, format!("'{keyword}' is not supported")));
            }
        };
        out.push(Stmt { kind, offset });
        Ok(())
    }

    fn unroll_for(
        &mut self,
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
        offset: usize,
        out: &mut Vec<Stmt>,
    ) -> Result<(), CompoundError> {
        let (Some(init), Some(cond), Some(step)) = (init, cond, step) else {
            return Err(CompoundError::unsupported(offset, "loops need an initializer, a condition and a step"));
        };
        let not_constant = |offset: usize| CompoundError::unsupported(offset, "loop bounds must be compile-time constants");

        // Declared loop variables vanish; assigned ones keep their final value.
        let (name, shape, start, writes_back) = match init.kind {
            StmtKind::Declare { shape, name, init: Some(value) } => {
                let start = const_eval(&value, &self.env).ok_or_else(|| not_constant(value.offset))?;
                (name, shape, start, false)
            }
            StmtKind::Assign { target, op: AssignOp::Set, value } => {
                let start = const_eval(&value, &self.env).ok_or_else(|| not_constant(value.offset))?;
                let shape = if matches!(start, Lit::Int(_)) { Shape::Integer } else { Shape::Float };
                (target, shape, start, true)
            }
            _ => return Err(not_constant(init.offset)),
        };

        let mut current = conform(start, shape);
        let mut iterations = 0usize;
        loop {
            self.env.push((name.clone(), current));
            let keep_going = const_eval(&cond, &self.env);
            self.env.pop();
            match keep_going {
                Some(Lit::Bool(true)) => {}
                Some(Lit::Bool(false)) => break,
                _ => return Err(not_constant(cond.offset)),
            }

            iterations += 1;
            self.expanded += 1;
            if self.expanded > self.max_iterations {
                return Err(CompoundError::unsupported(
                    offset,
                    format!("loops expand to more than {} iterations", self.max_iterations),
                ));
            }

            self.env.push((name.clone(), current));
            let unrolled = self.stmts(body.clone());
            let next = match &step.kind {
                StmtKind::Step { increment, .. } => {
                    fold_binary(if *increment { BinaryOp::Add } else { BinaryOp::Sub }, current, Lit::Int(1))
                }
                StmtKind::Assign { op: AssignOp::Set, value, .. } => const_eval(value, &self.env),
                StmtKind::Assign { op, value, .. } => {
                    let rhs = const_eval(value, &self.env);
                    op.binary().zip(rhs).and_then(|(op, rhs)| fold_binary(op, current, rhs))
                }
                _ => None,
            };
            self.env.pop();

            out.push(Stmt { kind: StmtKind::Block(unrolled?), offset });
            current = conform(next.ok_or_else(|| not_constant(step.offset))?, shape);
        }
        tracing::trace!(loop_var = %name, iterations, "unrolled loop");

        if writes_back {
            out.push(Stmt {
                kind: StmtKind::Assign {
                    target: name,
                    op: AssignOp::Set,
                    value: Expr::new(ExprKind::Lit(current), offset),
                },
                offset,
            });
        }
        Ok(())
    }

    /// Replace bound loop variables by their literal value. Indices fold to
    /// integer literals so the flat checker can range-check them.
    fn subst(&self, expr: Expr) -> Expr {
        let offset = expr.offset;
        let kind = match expr.kind {
            ExprKind::Ident(name) => match self.env.iter().rev().find(|(n, _)| *n == name) {
                Some((_, lit)) => ExprKind::Lit(*lit),
                None => ExprKind::Ident(name),
            },
            ExprKind::Unary { op, expr } => ExprKind::Unary { op, expr: Box::new(self.subst(*expr)) },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op,
                left: Box::new(self.subst(*left)),
                right: Box::new(self.subst(*right)),
            },
            ExprKind::Call { func, args } => ExprKind::Call {
                func,
                args: args.into_iter().map(|a| self.subst(a)).collect(),
            },
            ExprKind::Swizzle { base, components } => ExprKind::Swizzle { base: Box::new(self.subst(*base)), components },
            ExprKind::Index { base, index } => {
                let index = match const_eval(&index, &self.env) {
                    Some(Lit::Int(i)) => Expr::new(ExprKind::Lit(Lit::Int(i)), index.offset),
                    _ => self.subst(*index),
                };
                ExprKind::Index { base: Box::new(self.subst(*base)), index: Box::new(index) }
            }
            ExprKind::Ternary { cond, then_expr, else_expr } => ExprKind::Ternary {
                cond: Box::new(self.subst(*cond)),
                then_expr: Box::new(self.subst(*then_expr)),
                else_expr: Box::new(self.subst(*else_expr)),
            },
            kind @ (ExprKind::Lit(_) | ExprKind::Global(_)) => kind,
        };
        Expr { kind, offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::error::CompoundErrorKind;
    use crate::compound::parser::parse_program;

    fn unroll(src: &str, max: usize) -> Result<Program, CompoundError> {
        unroll_program(parse_program(src).unwrap(), max)
    }

    fn count_assigns(stmts: &[Stmt]) -> usize {
        stmts
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Assign { .. } => 1,
                StmtKind::Block(body) => count_assigns(body),
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn one_block_per_iteration() {
        let program = unroll("for (int i = 0; i < 3; i++) { s = s + i; }", 16).unwrap();
        assert_eq!(program.body.len(), 3);
        let StmtKind::Block(body) = &program.body[2].kind else {
            panic!("expected block");
        };
        let StmtKind::Assign { value, .. } = &body[0].kind else {
            panic!("expected assignment");
        };
        let ExprKind::Binary { right, .. } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(right.kind, ExprKind::Lit(Lit::Int(2)));
    }

    #[test]
    fn nested_loops_and_strides() {
        let program = unroll(
            "for (int i = 0; i < 4; i += 2) { for (int j = 3; j > 0; j--) { s += 1.0; } }",
            16,
        )
        .unwrap();
        assert_eq!(count_assigns(&program.body), 6);
    }

    #[test]
    fn iteration_limit() {
        let err = unroll("for (int i = 0; i < 100; i++) { s += 1.0; }", 99).unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Unsupported);
        assert!(unroll("for (int i = 0; i < 100; i++) { s += 1.0; }", 100).is_ok());
    }

    #[test]
    fn iteration_limit_covers_nested_loops() {
        let src = "for (int i = 0; i < 200; i++) { for (int j = 0; j < 200; j++) { for (int k = 0; k < 200; k++) { s += a; } } }";
        let err = unroll(src, 1024).unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Unsupported);

        // 4 outer + 4 * 8 inner
        let src = "for (int i = 0; i < 4; i++) { for (int j = 0; j < 8; j++) { s += a; } }";
        assert!(unroll(src, 36).is_ok());
        assert!(unroll(src, 35).is_err());
        assert!(unroll("for (int i = 0; i < 3; i++) { s += a; } for (int j = 0; j < 3; j++) { s += a; }", 5).is_err());
    }

    #[test]
    fn non_constant_bounds() {
        let err = unroll("for (int i = 0; i < n; i++) { s += 1.0; }", 16).unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Unsupported);
        assert_eq!(err.offset, 18);
    }

    #[test]
    fn folds_constant_branches() {
        let program = unroll("for (int i = 0; i < 2; i++) { if (i == 1) { s = 1.0; } else { s = 2.0; t = 0.0; } }", 16)
            .unwrap();
        assert_eq!(count_assigns(&program.body), 3);

        let err = unroll("if (s > 0.0) { s = 1.0; }", 16).unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Unsupported);
    }

    #[test]
    fn assigned_loop_variable_keeps_final_value() {
        let program = unroll("for (k = 0; k < 2; k++) { }", 16).unwrap();
        let last = program.body.last().unwrap();
        assert!(matches!(
            &last.kind,
            StmtKind::Assign { value: Expr { kind: ExprKind::Lit(Lit::Int(2)), .. }, .. }
        ));
    }
}
