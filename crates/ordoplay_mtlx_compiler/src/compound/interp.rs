// SPDX-License-Identifier: MIT OR Apache-2.0
//! Direct interpreter for bound snippets, used as the reference when
//! checking that unrolling and lowering preserve meaning.
//!
//! Every value is a list of float components; booleans are 0 or 1 and
//! integers are floats.

use super::ast::{AssignOp, BinaryOp, Expr, ExprKind, Lit, Program, Stmt, StmtKind, UnaryOp};
use crate::builder::SystemInput;
use std::collections::HashMap;

struct Interp {
    globals: HashMap<SystemInput, Vec<f32>>,
    scopes: Vec<HashMap<String, Vec<f32>>>,
}

/// Execute `program` and return every variable left in the outermost scope.
pub(crate) fn run(
    program: &Program,
    inputs: &[(&str, Vec<f32>)],
    globals: &[(SystemInput, Vec<f32>)],
) -> HashMap<String, Vec<f32>> {
    let base = inputs.iter().map(|(n, v)| (n.to_string(), v.clone())).collect();
    let mut interp = Interp { globals: globals.iter().cloned().collect(), scopes: vec![base] };
    interp.stmts(&program.body);
    interp.scopes.swap_remove(0)
}

fn broadcast(a: &[f32], b: &[f32], f: impl Fn(f32, f32) -> f32) -> Vec<f32> {
    let n = a.len().max(b.len());
    (0..n)
        .map(|i| f(a[if a.len() == 1 { 0 } else { i }], b[if b.len() == 1 { 0 } else { i }]))
        .collect()
}

fn truth(v: &[f32]) -> bool {
    v[0] != 0.0
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn length(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

impl Interp {
    fn get(&self, name: &str) -> Vec<f32> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name).cloned())
            .unwrap_or_else(|| panic!("read of unset '{name}'"))
    }

    fn set(&mut self, name: &str, value: Vec<f32>) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = fit(value, slot.len());
                return;
            }
        }
        self.scopes[0].insert(name.to_string(), value);
    }

    fn scoped(&mut self, stmts: &[Stmt]) {
        self.scopes.push(HashMap::new());
        self.stmts(stmts);
        self.scopes.pop();
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Declare { shape, name, init } => {
                let n = shape.arity().unwrap_or(1);
                let value = init.as_ref().map(|e| fit(self.expr(e), n)).unwrap_or_else(|| vec![0.0; n]);
                self.scopes.last_mut().unwrap().insert(name.clone(), value);
            }
            StmtKind::Assign { target, op, value } => {
                let rhs = self.expr(value);
                let value = match op {
                    AssignOp::Set => rhs,
                    op => arith(op.binary().unwrap(), &self.get(target), &rhs),
                };
                self.set(target, value);
            }
            StmtKind::Step { target, increment } => {
                let delta = if *increment { 1.0 } else { -1.0 };
                let value = self.get(target).iter().map(|v| v + delta).collect();
                self.set(target, value);
            }
            StmtKind::Expr(expr) => {
                self.expr(expr);
            }
            StmtKind::Block(body) => self.scoped(body),
            StmtKind::For { init, cond, step, body } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.stmt(init);
                }
                while cond.as_ref().map_or(true, |c| truth(&self.expr(c))) {
                    self.scoped(body);
                    if let Some(step) = step {
                        self.stmt(step);
                    }
                }
                self.scopes.pop();
            }
            StmtKind::If { cond, then_body, else_body } => {
                if truth(&self.expr(cond)) {
                    self.scoped(then_body);
                } else {
                    self.scoped(else_body);
                }
            }
            StmtKind::While { cond, body } => {
                while truth(&self.expr(cond)) {
                    self.scoped(body);
                }
            }
            StmtKind::Jump(keyword) => panic!("'{keyword}' is not interpreted"),
        }
    }

    fn expr(&mut self, expr: &Expr) -> Vec<f32> {
        match &expr.kind {
            ExprKind::Lit(Lit::Bool(b)) => vec![if *b { 1.0 } else { 0.0 }],
            ExprKind::Lit(Lit::Int(i)) => vec![*i as f32],
            ExprKind::Lit(Lit::Float(f)) => vec![*f as f32],
            ExprKind::Ident(name) => self.get(name),
            ExprKind::Global(input) => self.globals[input].clone(),
            ExprKind::Unary { op: UnaryOp::Neg, expr } => self.expr(expr).iter().map(|v| -v).collect(),
            ExprKind::Unary { op: UnaryOp::Not, expr } => vec![if truth(&self.expr(expr)) { 0.0 } else { 1.0 }],
            ExprKind::Binary { op, left, right } => {
                let l = self.expr(left);
                let r = self.expr(right);
                arith(*op, &l, &r)
            }
            ExprKind::Call { func, args } => {
                let args: Vec<Vec<f32>> = args.iter().map(|a| self.expr(a)).collect();
                call(func, &args)
            }
            ExprKind::Swizzle { base, components } => {
                let base = self.expr(base);
                components
                    .chars()
                    .map(|c| {
                        let i = "xyzw".find(c).or_else(|| "rgba".find(c)).unwrap();
                        base[if base.len() == 1 { 0 } else { i }]
                    })
                    .collect()
            }
            ExprKind::Index { base, index } => {
                let base = self.expr(base);
                let i = self.expr(index)[0] as usize;
                vec![base[i]]
            }
            ExprKind::Ternary { cond, then_expr, else_expr } => {
                if truth(&self.expr(cond)) {
                    self.expr(then_expr)
                } else {
                    self.expr(else_expr)
                }
            }
        }
    }
}

fn fit(value: Vec<f32>, n: usize) -> Vec<f32> {
    match value.len() {
        len if len == n => value,
        1 => vec![value[0]; n],
        _ => {
            let mut value = value;
            value.resize(n, 0.0);
            value
        }
    }
}

fn arith(op: BinaryOp, l: &[f32], r: &[f32]) -> Vec<f32> {
    let b = |x: bool| if x { 1.0 } else { 0.0 };
    match op {
        BinaryOp::Add => broadcast(l, r, |a, b| a + b),
        BinaryOp::Sub => broadcast(l, r, |a, b| a - b),
        BinaryOp::Mul => broadcast(l, r, |a, b| a * b),
        BinaryOp::Div => broadcast(l, r, |a, b| a / b),
        BinaryOp::Mod => broadcast(l, r, |a, b| a - b * (a / b).floor()),
        BinaryOp::Eq => vec![b(l[0] == r[0])],
        BinaryOp::Ne => vec![b(l[0] != r[0])],
        BinaryOp::Lt => vec![b(l[0] < r[0])],
        BinaryOp::Le => vec![b(l[0] <= r[0])],
        BinaryOp::Gt => vec![b(l[0] > r[0])],
        BinaryOp::Ge => vec![b(l[0] >= r[0])],
        BinaryOp::And => vec![b(truth(l) && truth(r))],
        BinaryOp::Or => vec![b(truth(l) || truth(r))],
    }
}

fn map(a: &[f32], f: impl Fn(f32) -> f32) -> Vec<f32> {
    a.iter().map(|v| f(*v)).collect()
}

fn call(func: &str, args: &[Vec<f32>]) -> Vec<f32> {
    let a = |i: usize| args[i].as_slice();
    match func {
        "sin" => map(a(0), f32::sin),
        "cos" => map(a(0), f32::cos),
        "tan" => map(a(0), f32::tan),
        "sqrt" => map(a(0), f32::sqrt),
        "exp" => map(a(0), f32::exp),
        "log" => map(a(0), f32::ln),
        "abs" => map(a(0), f32::abs),
        "floor" => map(a(0), f32::floor),
        "ceil" => map(a(0), f32::ceil),
        "fract" | "frac" => map(a(0), |x| x - x.floor()),
        "saturate" => map(a(0), |x| x.clamp(0.0, 1.0)),
        "pow" => broadcast(a(0), a(1), f32::powf),
        "min" => broadcast(a(0), a(1), f32::min),
        "max" => broadcast(a(0), a(1), f32::max),
        "mod" | "fmod" => broadcast(a(0), a(1), |x, y| x - y * (x / y).floor()),
        "atan2" => vec![a(0)[0].atan2(a(1)[0])],
        "atan" => vec![a(0)[0].atan()],
        "step" => vec![if a(1)[0] >= a(0)[0] { 1.0 } else { 0.0 }],
        "clamp" => {
            let low = broadcast(a(0), a(1), f32::max);
            broadcast(&low, a(2), f32::min)
        }
        "mix" | "lerp" => {
            let diff = broadcast(a(1), a(0), |b, a| b - a);
            let scaled = broadcast(&diff, a(2), |d, t| d * t);
            broadcast(a(0), &scaled, |a, s| a + s)
        }
        "smoothstep" => {
            let t = broadcast(&broadcast(a(2), a(0), |x, e0| x - e0), &broadcast(a(1), a(0), |e1, e0| e1 - e0), |n, d| {
                (n / d).clamp(0.0, 1.0)
            });
            map(&t, |t| t * t * (3.0 - 2.0 * t))
        }
        "dot" => vec![dot(a(0), a(1))],
        "length" => vec![length(a(0))],
        "distance" => vec![length(&broadcast(a(0), a(1), |x, y| x - y))],
        "normalize" => {
            let len = length(a(0));
            map(a(0), |x| x / len)
        }
        "cross" => {
            let (u, v) = (a(0), a(1));
            vec![u[1] * v[2] - u[2] * v[1], u[2] * v[0] - u[0] * v[2], u[0] * v[1] - u[1] * v[0]]
        }
        "reflect" => {
            let (i, n) = (a(0), a(1));
            let d = 2.0 * dot(n, i);
            broadcast(i, n, |i, n| i - d * n)
        }
        constructor => {
            let n = match constructor {
                "float" | "int" => 1,
                "vec2" | "float2" | "vector2" => 2,
                "vec3" | "float3" | "vector3" | "color3" | "color" => 3,
                "vec4" | "float4" | "vector4" | "color4" => 4,
                other => panic!("'{other}' is not interpreted"),
            };
            fit(args.concat(), n)
        }
    }
}
