// SPDX-License-Identifier: MIT OR Apache-2.0
//! Name binding and structural checks.
//!
//! Resolves every identifier to an input, output, local, loop variable or
//! renderer-provided global, and rejects constructs that cannot become data
//! flow before any shape work happens.

use super::ast::{Expr, ExprKind, Lit, Program, Stmt, StmtKind};
use super::builtins::is_builtin;
use super::error::CompoundError;
use super::Signature;
use crate::builder::SystemInput;
use crate::shape::Shape;
use std::collections::HashMap;

/// Identifiers that read renderer-provided properties unless shadowed.
pub(crate) fn global(name: &str) -> Option<SystemInput> {
    Some(match name {
        "uv" | "texcoord" => SystemInput::Texcoord,
        "position" | "world_position" => SystemInput::Position,
        "object_position" => SystemInput::ObjectPosition,
        "normal" | "world_normal" => SystemInput::Normal,
        "tangent" => SystemInput::Tangent,
        "view_direction" | "view_dir" => SystemInput::ViewDirection,
        "vertex_color" => SystemInput::VertexColor,
        "time" => SystemInput::Time,
        "frame" => SystemInput::Frame,
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Input,
    Output,
    Local,
    LoopVar,
}

struct Binder {
    scopes: Vec<HashMap<String, Symbol>>,
}

pub(crate) fn bind_program(program: Program, sig: &Signature) -> Result<Program, CompoundError> {
    let mut base = HashMap::new();
    for (name, _) in &sig.inputs {
        base.insert(name.clone(), Symbol::Input);
    }
    for (name, _) in &sig.outputs {
        if base.insert(name.clone(), Symbol::Output).is_some() {
            return Err(CompoundError::type_error(0, format!("'{name}' is declared as both an input and an output")));
        }
    }
    let mut binder = Binder { scopes: vec![base] };
    let body = binder.bind_stmts(program.body)?;
    Ok(Program { body })
}

impl Binder {
    fn lookup(&self, name: &str) -> Option<Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    fn declare(&mut self, name: &str, symbol: Symbol, offset: usize) -> Result<(), CompoundError> {
        if let Some(existing) = self.lookup(name) {
            let clash = match existing {
                Symbol::Input | Symbol::Output => Some("a snippet parameter"),
                Symbol::LoopVar => Some("a loop variable"),
                Symbol::Local => None,
            };
            if let Some(what) = clash {
                return Err(CompoundError::type_error(offset, format!("'{name}' is already declared as {what}")));
            }
        }
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(());
        };
        if scope.insert(name.to_string(), symbol).is_some() {
            return Err(CompoundError::type_error(offset, format!("'{name}' is declared twice in the same scope")));
        }
        Ok(())
    }

    fn scoped(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>, CompoundError> {
        self.scopes.push(HashMap::new());
        let result = self.bind_stmts(stmts);
        self.scopes.pop();
        result
    }

    fn bind_stmts(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>, CompoundError> {
        stmts.into_iter().map(|stmt| self.bind_stmt(stmt)).collect()
    }

    fn check_writable(&self, target: &str, offset: usize) -> Result<(), CompoundError> {
        match self.lookup(target) {
            Some(Symbol::LoopVar) => Err(CompoundError::unsupported(
                offset,
                format!("loop variable '{target}' is modified inside the loop body"),
            )),
            Some(_) => Ok(()),
            None if global(target).is_some() => {
                Err(CompoundError::type_error(offset, format!("cannot assign to built-in '{target}'")))
            }
            None => Err(CompoundError::type_error(offset, format!("assignment to undeclared variable '{target}'"))),
        }
    }

    fn bind_stmt(&mut self, stmt: Stmt) -> Result<Stmt, CompoundError> {
        let offset = stmt.offset;
        let kind = match stmt.kind {
            StmtKind::Declare { shape, name, init } => {
                let init = init.map(|e| self.bind_expr(e)).transpose()?;
                self.declare(&name, Symbol::Local, offset)?;
                StmtKind::Declare { shape, name, init }
            }
            StmtKind::Assign { target, op, value } => {
                let value = self.bind_expr(value)?;
                self.check_writable(&target, offset)?;
                StmtKind::Assign { target, op, value }
            }
            StmtKind::Step { target, increment } => {
                self.check_writable(&target, offset)?;
                StmtKind::Step { target, increment }
            }
            StmtKind::Expr(expr) => StmtKind::Expr(self.bind_expr(expr)?),
            StmtKind::Block(body) => StmtKind::Block(self.scoped(body)?),
            StmtKind::For { init, cond, step, body } => {
                let (Some(init), Some(cond), Some(step)) = (init, cond, step) else {
                    return Err(CompoundError::unsupported(
                        offset,
                        "loops need an initializer, a condition and a step to be unrolled",
                    ));
                };
                self.scopes.push(HashMap::new());
                let result = self.bind_for(*init, cond, *step, body, offset);
                self.scopes.pop();
                result?
            }
            StmtKind::If { cond, then_body, else_body } => StmtKind::If {
                cond: self.bind_expr(cond)?,
                then_body: self.scoped(then_body)?,
                else_body: self.scoped(else_body)?,
            },
            StmtKind::While { .. } => {
                return Err(CompoundError::unsupported(
                    offset,
                    "'while' loops have no fixed trip count and cannot be unrolled",
                ));
            }
            StmtKind::Jump(keyword) => {
                return Err(CompoundError::unsupported(offset, format!("'{keyword}' is not supported")));
            }
        };
        Ok(Stmt { kind, offset })
    }

    fn bind_for(
        &mut self,
        init: Stmt,
        cond: Expr,
        step: Stmt,
        body: Vec<Stmt>,
        offset: usize,
    ) -> Result<StmtKind, CompoundError> {
        // `for (i = 0; ...)` with an undeclared `i` declares it.
        let init_offset = init.offset;
        let init = match init.kind {
            StmtKind::Declare { shape, name, init: value } => {
                let value = value.map(|e| self.bind_expr(e)).transpose()?;
                self.declare(&name, Symbol::LoopVar, init_offset)?;
                Stmt { kind: StmtKind::Declare { shape, name, init: value }, offset: init_offset }
            }
            StmtKind::Assign { target, op, value } if self.lookup(&target).is_none() && global(&target).is_none() => {
                let value = self.bind_expr(value)?;
                if op.binary().is_some() {
                    return Err(CompoundError::type_error(init_offset, format!("assignment to undeclared variable '{target}'")));
                }
                let shape = match value.kind {
                    ExprKind::Lit(Lit::Int(_)) => Shape::Integer,
                    _ => Shape::Float,
                };
                self.declare(&target, Symbol::LoopVar, init_offset)?;
                Stmt { kind: StmtKind::Declare { shape, name: target, init: Some(value) }, offset: init_offset }
            }
            StmtKind::Assign { target, op, value } => {
                let value = self.bind_expr(value)?;
                self.check_writable(&target, init_offset)?;
                // Rebind in the loop scope so the body cannot write it
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(target.clone(), Symbol::LoopVar);
                }
                Stmt { kind: StmtKind::Assign { target, op, value }, offset: init_offset }
            }
            _ => {
                return Err(CompoundError::unsupported(init_offset, "loop initializer must set the loop variable"));
            }
        };
        let loop_var = match &init.kind {
            StmtKind::Declare { name, .. } | StmtKind::Assign { target: name, .. } => name.clone(),
            _ => String::new(),
        };

        let cond = self.bind_expr(cond)?;

        let step_offset = step.offset;
        let step = match step.kind {
            StmtKind::Step { target, increment } if target == loop_var => {
                Stmt { kind: StmtKind::Step { target, increment }, offset: step_offset }
            }
            StmtKind::Assign { target, op, value } if target == loop_var => {
                Stmt { kind: StmtKind::Assign { target, op, value: self.bind_expr(value)? }, offset: step_offset }
            }
            _ => {
                return Err(CompoundError::unsupported(
                    step_offset,
                    format!("loop step must update the loop variable '{loop_var}'"),
                ));
            }
        };

        let body = self.scoped(body)?;
        Ok(StmtKind::For {
            init: Some(Box::new(init)),
            cond: Some(cond),
            step: Some(Box::new(step)),
            body,
        })
        .map(|kind| {
            tracing::trace!(offset, loop_var = %loop_var, "bound loop");
            kind
        })
    }

    fn bind_expr(&mut self, expr: Expr) -> Result<Expr, CompoundError> {
        let offset = expr.offset;
        let kind = match expr.kind {
            ExprKind::Ident(name) => {
                if self.lookup(&name).is_some() {
                    ExprKind::Ident(name)
                } else if let Some(input) = global(&name) {
                    ExprKind::Global(input)
                } else {
                    return Err(CompoundError::type_error(offset, format!("unknown identifier '{name}'")));
                }
            }
            ExprKind::Call { func, args } => {
                if !is_builtin(&func) {
                    return Err(CompoundError::unsupported(
                        offset,
                        format!("call to '{func}' is not supported; only built-in functions may be called"),
                    ));
                }
                let args = args.into_iter().map(|a| self.bind_expr(a)).collect::<Result<_, _>>()?;
                ExprKind::Call { func, args }
            }
            ExprKind::Unary { op, expr } => ExprKind::Unary { op, expr: Box::new(self.bind_expr(*expr)?) },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op,
                left: Box::new(self.bind_expr(*left)?),
                right: Box::new(self.bind_expr(*right)?),
            },
            ExprKind::Swizzle { base, components } => ExprKind::Swizzle {
                base: Box::new(self.bind_expr(*base)?),
                components,
            },
            ExprKind::Index { base, index } => ExprKind::Index {
                base: Box::new(self.bind_expr(*base)?),
                index: Box::new(self.bind_expr(*index)?),
            },
            ExprKind::Ternary { cond, then_expr, else_expr } => ExprKind::Ternary {
                cond: Box::new(self.bind_expr(*cond)?),
                then_expr: Box::new(self.bind_expr(*then_expr)?),
                else_expr: Box::new(self.bind_expr(*else_expr)?),
            },
            kind @ (ExprKind::Lit(_) | ExprKind::Global(_)) => kind,
        };
        Ok(Expr { kind, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::error::CompoundErrorKind;
    use crate::compound::parser::parse_program;

    fn sig() -> Signature {
        Signature::new()
            .input("A", Shape::Float)
            .output("Out", Shape::Float)
    }

    fn bind(src: &str) -> Result<Program, CompoundError> {
        bind_program(parse_program(src).unwrap(), &sig())
    }

    #[test]
    fn resolves_globals_unless_shadowed() {
        let program = bind("Out = uv.x;").unwrap();
        let StmtKind::Assign { value, .. } = &program.body[0].kind else {
            panic!("expected assignment");
        };
        let ExprKind::Swizzle { base, .. } = &value.kind else {
            panic!("expected swizzle");
        };
        assert_eq!(base.kind, ExprKind::Global(SystemInput::Texcoord));

        let program = bind("float time = 2.0; Out = time;").unwrap();
        let StmtKind::Assign { value, .. } = &program.body[1].kind else {
            panic!("expected assignment");
        };
        assert_eq!(value.kind, ExprKind::Ident("time".into()));
    }

    #[test]
    fn rejects_unknown_names_and_calls() {
        let err = bind("Out = B;").unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Type);
        assert_eq!(err.offset, 6);

        let err = bind("Out = noise(A);").unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Unsupported);
    }

    #[test]
    fn rejects_unbounded_loops() {
        let err = bind("while (A > 0.0) { A -= 1.0; } Out = A;").unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Unsupported);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn rejects_loop_variable_writes_in_body() {
        let err = bind("for (int i = 0; i < 4; i++) { i += 1; } Out = A;").unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Unsupported);
        assert!(err.message.contains("loop variable 'i'"));
    }

    #[test]
    fn implicit_loop_variable_declaration() {
        let program = bind("for (i = 0; i < 3; i++) { A = A + i; } Out = A;").unwrap();
        let StmtKind::For { init: Some(init), .. } = &program.body[0].kind else {
            panic!("expected loop");
        };
        assert!(matches!(
            init.kind,
            StmtKind::Declare { shape: Shape::Integer, .. }
        ));
    }
}
