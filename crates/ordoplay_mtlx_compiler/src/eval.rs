// SPDX-License-Identifier: MIT OR Apache-2.0
//! Numeric evaluation of destination graphs.
//!
//! Evaluates the math subset of the node vocabulary on float components so
//! compiled graphs can be checked against expected values. Texture lookups,
//! matrix transforms and shader roots are out of reach and report
//! [`EvalError::UnsupportedCategory`].

use crate::builder::SystemInput;
use crate::graph::{DestNode, DestinationGraph, PortBinding};
use crate::shape::{Shape, Value};
use std::collections::{HashMap, HashSet};

/// Error during evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Graph contains a cycle
    #[error("cycle through node '{0}'")]
    CycleDetected(String),

    /// Node not found
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Output not found
    #[error("graph output not found: {0}")]
    OutputNotFound(String),

    /// Missing required input
    #[error("node '{node}' has no value for input '{port}'")]
    MissingInput {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },

    /// No value was supplied for a renderer-provided property
    #[error("no value supplied for '{0}'")]
    MissingSystemInput(String),

    /// Category without a numeric definition
    #[error("cannot evaluate '{0}' nodes")]
    UnsupportedCategory(String),

    /// A literal that is not numeric
    #[error("non-numeric value on '{node}.{port}'")]
    TypeMismatch {
        /// Node name
        node: String,
        /// Port name
        port: String,
    },
}

/// Context for graph evaluation
pub struct EvaluationContext<'a> {
    /// The graph being evaluated
    pub graph: &'a DestinationGraph,
    /// Cached results keyed by node and output
    cache: HashMap<(String, Option<String>), Vec<f32>>,
    /// Values for renderer-provided properties, keyed by node name
    system: HashMap<&'static str, Vec<f32>>,
    visiting: HashSet<String>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(graph: &'a DestinationGraph) -> Self {
        Self {
            graph,
            cache: HashMap::new(),
            system: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    /// Supply the value a renderer-provided property takes
    pub fn with_system_input(mut self, input: SystemInput, value: Vec<f32>) -> Self {
        self.system.insert(input.node_name(), value);
        self
    }

    /// Evaluate a named graph output
    pub fn evaluate_output(&mut self, name: &str) -> Result<Vec<f32>, EvalError> {
        let output = self
            .graph
            .output(name)
            .ok_or_else(|| EvalError::OutputNotFound(name.to_string()))?;
        self.evaluate(&output.node, output.output.as_deref())
    }

    /// Evaluate one output of a node
    pub fn evaluate(&mut self, name: &str, output: Option<&str>) -> Result<Vec<f32>, EvalError> {
        let key = (name.to_string(), output.map(str::to_string));
        if let Some(value) = self.cache.get(&key) {
            return Ok(value.clone());
        }
        if !self.visiting.insert(name.to_string()) {
            return Err(EvalError::CycleDetected(name.to_string()));
        }
        let graph = self.graph;
        let result = match graph.node(name) {
            Some(node) => self.compute(name, node, output),
            None => Err(EvalError::NodeNotFound(name.to_string())),
        };
        self.visiting.remove(name);
        let value = result?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    fn input(&mut self, name: &str, node: &DestNode, port: &str) -> Result<Vec<f32>, EvalError> {
        let missing = || EvalError::MissingInput { node: name.to_string(), port: port.to_string() };
        let dest = node.port(port).ok_or_else(missing)?;
        match &dest.binding {
            PortBinding::Literal(value) => value
                .components()
                .ok_or_else(|| EvalError::TypeMismatch { node: name.to_string(), port: port.to_string() }),
            PortBinding::Connected { node: upstream, output } => self.evaluate(upstream, output.as_deref()),
            _ => Err(missing()),
        }
    }

    fn input_or(&mut self, name: &str, node: &DestNode, port: &str, default: f32) -> Result<Vec<f32>, EvalError> {
        if node.port(port).is_some() {
            self.input(name, node, port)
        } else {
            Ok(vec![default])
        }
    }

    fn compute(&mut self, name: &str, node: &DestNode, output: Option<&str>) -> Result<Vec<f32>, EvalError> {
        if node.flags.system_input {
            return self
                .system
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::MissingSystemInput(name.to_string()));
        }
        let width = node.shape.arity().unwrap_or(1);
        let category = node.category.as_str();

        let value = match category {
            "constant" | "dot" | "convert" => {
                let port = if category == "constant" { "value" } else { "in" };
                let value = self.input(name, node, port)?;
                let from = node.port(port).map_or(node.shape, |p| p.shape);
                Value::Tuple(value)
                    .coerce(from, node.shape)
                    .and_then(|v| v.components())
                    .ok_or_else(|| EvalError::TypeMismatch { node: name.to_string(), port: port.to_string() })?
            }
            "extract" => {
                let value = self.input(name, node, "in")?;
                let index = self.input_or(name, node, "index", 0.0)?[0] as usize;
                vec![value.get(index).copied().unwrap_or(0.0)]
            }
            "separate2" | "separate3" | "separate4" => {
                let value = self.input(name, node, "in")?;
                let index = match output {
                    Some("outy") => 1,
                    Some("outz") => 2,
                    Some("outw") => 3,
                    _ => 0,
                };
                vec![value.get(index).copied().unwrap_or(0.0)]
            }
            "combine2" | "combine3" | "combine4" => {
                let mut components = Vec::with_capacity(width);
                for port in ["in1", "in2", "in3", "in4"].iter().take(width) {
                    components.push(self.input(name, node, port)?[0]);
                }
                components
            }
            "add" | "subtract" | "multiply" | "divide" | "modulo" | "power" | "min" | "max" => {
                let a = self.input(name, node, "in1")?;
                let b = self.input(name, node, "in2")?;
                let f: fn(f32, f32) -> f32 = match category {
                    "add" => |a, b| a + b,
                    "subtract" => |a, b| a - b,
                    "multiply" => |a, b| a * b,
                    "divide" => |a, b| a / b,
                    "modulo" => |a, b| a - b * (a / b).floor(),
                    "power" => f32::powf,
                    "min" => f32::min,
                    _ => f32::max,
                };
                zip(&a, &b, f)
            }
            "sin" | "cos" | "tan" | "asin" | "acos" | "exp" | "ln" | "sqrt" | "absval" | "floor" | "ceil" | "sign" => {
                let a = self.input(name, node, "in")?;
                let f: fn(f32) -> f32 = match category {
                    "sin" => f32::sin,
                    "cos" => f32::cos,
                    "tan" => f32::tan,
                    "asin" => f32::asin,
                    "acos" => f32::acos,
                    "exp" => f32::exp,
                    "ln" => f32::ln,
                    "sqrt" => f32::sqrt,
                    "absval" => f32::abs,
                    "floor" => f32::floor,
                    "ceil" => f32::ceil,
                    _ => |x: f32| if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 },
                };
                a.into_iter().map(f).collect()
            }
            "atan2" => {
                let y = self.input_or(name, node, "iny", 0.0)?;
                let x = self.input_or(name, node, "inx", 1.0)?;
                zip(&y, &x, f32::atan2)
            }
            "magnitude" => vec![length(&self.input(name, node, "in")?)],
            "normalize" => {
                let a = self.input(name, node, "in")?;
                let len = length(&a);
                a.into_iter().map(|x| x / len).collect()
            }
            "dotproduct" => {
                let a = self.input(name, node, "in1")?;
                let b = self.input(name, node, "in2")?;
                vec![a.iter().zip(&b).map(|(x, y)| x * y).sum()]
            }
            "crossproduct" => {
                let u = self.input(name, node, "in1")?;
                let v = self.input(name, node, "in2")?;
                if u.len() < 3 || v.len() < 3 {
                    return Err(EvalError::TypeMismatch { node: name.to_string(), port: "in1".to_string() });
                }
                vec![u[1] * v[2] - u[2] * v[1], u[2] * v[0] - u[0] * v[2], u[0] * v[1] - u[1] * v[0]]
            }
            "clamp" => {
                let x = self.input(name, node, "in")?;
                let low = self.input_or(name, node, "low", 0.0)?;
                let high = self.input_or(name, node, "high", 1.0)?;
                zip(&zip(&x, &low, f32::max), &high, f32::min)
            }
            "mix" => {
                let fg = self.input(name, node, "fg")?;
                let bg = self.input(name, node, "bg")?;
                let t = self.input_or(name, node, "mix", 0.0)?;
                let delta = zip(&fg, &bg, |f, b| f - b);
                zip(&bg, &zip(&delta, &t, |d, t| d * t), |b, s| b + s)
            }
            "smoothstep" => {
                let x = self.input(name, node, "in")?;
                let low = self.input_or(name, node, "low", 0.0)?;
                let high = self.input_or(name, node, "high", 1.0)?;
                let span = zip(&high, &low, |h, l| h - l);
                let t = zip(&zip(&x, &low, |x, l| x - l), &span, |n, d| (n / d).clamp(0.0, 1.0));
                t.into_iter().map(|t| t * t * (3.0 - 2.0 * t)).collect()
            }
            "ifgreater" | "ifgreatereq" | "ifequal" => {
                let a = self.input(name, node, "value1")?[0];
                let b = self.input_or(name, node, "value2", 0.0)?[0];
                let taken = match category {
                    "ifgreater" => a > b,
                    "ifgreatereq" => a >= b,
                    _ => a == b,
                };
                if node.shape == Shape::Boolean {
                    vec![flag(taken)]
                } else {
                    let in1 = self.input_or(name, node, "in1", 0.0)?;
                    let in2 = self.input_or(name, node, "in2", 0.0)?;
                    if taken {
                        in1
                    } else {
                        in2
                    }
                }
            }
            "and" | "or" => {
                let a = self.input(name, node, "in1")?[0] != 0.0;
                let b = self.input(name, node, "in2")?[0] != 0.0;
                vec![flag(if category == "and" { a && b } else { a || b })]
            }
            "not" => vec![flag(self.input(name, node, "in")?[0] == 0.0)],
            other => return Err(EvalError::UnsupportedCategory(other.to_string())),
        };
        Ok(widen(value, width))
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn length(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Component-wise `f`, broadcasting single components
fn zip(a: &[f32], b: &[f32], f: impl Fn(f32, f32) -> f32) -> Vec<f32> {
    let n = a.len().max(b.len());
    (0..n)
        .map(|i| {
            let x = if a.len() == 1 { a[0] } else { a.get(i).copied().unwrap_or(0.0) };
            let y = if b.len() == 1 { b[0] } else { b.get(i).copied().unwrap_or(0.0) };
            f(x, y)
        })
        .collect()
}

fn widen(value: Vec<f32>, width: usize) -> Vec<f32> {
    if value.len() == 1 && width > 1 {
        vec![value[0]; width]
    } else {
        value
    }
}
