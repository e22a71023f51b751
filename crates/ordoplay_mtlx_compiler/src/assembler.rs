// SPDX-License-Identifier: MIT OR Apache-2.0
//! Surface and stage assembly.
//!
//! Stage block adapters record, per logical input (`BaseColor`, `Alpha`,
//! `Position`, ...), a collector node whose single input is resolved like any
//! other edge. Once resolution is done the assembler reads each collector,
//! applies the rule for its logical name and writes the result onto the
//! shader roots. Collectors themselves are bypassed and pruned.

use crate::builder::{BuilderError, GraphBuilder, SystemInput};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Severity};
use crate::graph::{NodeFlags, PortBinding};
use crate::settings::{BlendMode, CompilerSettings};
use crate::shape::{Shape, Value};
use indexmap::IndexMap;
use std::fmt;

/// Name of the fragment root
pub const SURFACE_ROOT: &str = "surface_shader";
/// Name of the vertex root
pub const DISPLACEMENT_ROOT: &str = "displacement_shader";
/// Name of the material root
pub const MATERIAL_ROOT: &str = "material";

const LUMINANCE: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Pipeline stage a stage block feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Per-vertex, evaluated first
    Vertex,
    /// Per-fragment, evaluated last
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        })
    }
}

/// A settled stage input
#[derive(Debug, Clone, PartialEq)]
pub enum Contribution {
    /// Produced by a nodegraph node
    Node {
        /// Node name
        node: String,
        /// Output on a multi-output node
        output: Option<String>,
    },
    /// A constant
    Literal {
        /// Value
        value: Value,
        /// Shape the value is expressed in
        shape: Shape,
    },
}

/// Collector nodes per stage and logical input name
#[derive(Debug, Clone, Default)]
pub struct StageContributions {
    vertex: IndexMap<String, String>,
    fragment: IndexMap<String, String>,
}

impl StageContributions {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    fn stage(&self, stage: Stage) -> &IndexMap<String, String> {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
        }
    }

    /// Record the collector for a logical input. Returns `false` when the
    /// input was already supplied by another stage block.
    pub fn collect(&mut self, stage: Stage, logical: &str, collector: &str) -> bool {
        let map = match stage {
            Stage::Vertex => &mut self.vertex,
            Stage::Fragment => &mut self.fragment,
        };
        if map.contains_key(logical) {
            return false;
        }
        map.insert(logical.to_string(), collector.to_string());
        true
    }

    /// Collector node recorded for a logical input
    pub fn collector(&self, stage: Stage, logical: &str) -> Option<&str> {
        self.stage(stage).get(logical).map(String::as_str)
    }

    /// Logical inputs supplied to a stage, in collection order
    pub fn logical_names(&self, stage: Stage) -> impl Iterator<Item = &str> {
        self.stage(stage).keys().map(String::as_str)
    }

    /// What a collector ended up bound to, once edges are resolved
    pub fn settle(&self, builder: &GraphBuilder, stage: Stage, logical: &str) -> Option<Contribution> {
        let collector = self.collector(stage, logical)?;
        let port = builder.graph().node(collector)?.port("in")?;
        match &port.binding {
            PortBinding::Literal(value) => Some(Contribution::Literal { value: value.clone(), shape: port.shape }),
            PortBinding::Connected { node, output } => {
                Some(Contribution::Node { node: node.clone(), output: output.clone() })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrapper {
    /// Vector-like input reduced to its luminance
    Grayscale,
    /// Green channel of a tangent-space normal negated
    FlipNormalGreen,
    /// `1 - x`
    OneMinus,
    /// Color scaled by alpha under additive blending
    AlphaGate,
    /// Position made relative to the object-space rest position
    RestOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Always,
    LitOnly,
    UnlitOnly,
    TransparentOrClip,
    AlphaClip,
}

impl Presence {
    fn holds(self, settings: &CompilerSettings) -> bool {
        match self {
            Self::Always => true,
            Self::LitOnly => !settings.is_unlit(),
            Self::UnlitOnly => settings.is_unlit(),
            Self::TransparentOrClip => settings.is_transparent() || settings.alpha_clip,
            Self::AlphaClip => settings.alpha_clip,
        }
    }
}

struct Rule {
    logical: &'static str,
    stage: Stage,
    port: &'static str,
    shape: Shape,
    wrappers: &'static [Wrapper],
    presence: Presence,
}

const fn rule(
    logical: &'static str,
    stage: Stage,
    port: &'static str,
    shape: Shape,
    wrappers: &'static [Wrapper],
    presence: Presence,
) -> Rule {
    Rule { logical, stage, port, shape, wrappers, presence }
}

use Presence::*;
use Wrapper::*;

static RULES: &[Rule] = &[
    rule("BaseColor", Stage::Fragment, "diffuseColor", Shape::Color3, &[AlphaGate], LitOnly),
    rule("BaseColor", Stage::Fragment, "emissiveColor", Shape::Color3, &[AlphaGate], UnlitOnly),
    rule("Emission", Stage::Fragment, "emissiveColor", Shape::Color3, &[AlphaGate], LitOnly),
    rule("Metallic", Stage::Fragment, "metallic", Shape::Float, &[Grayscale], LitOnly),
    rule("Smoothness", Stage::Fragment, "roughness", Shape::Float, &[Grayscale, OneMinus], LitOnly),
    rule("Normal", Stage::Fragment, "normal", Shape::Vector3, &[FlipNormalGreen], LitOnly),
    rule("Occlusion", Stage::Fragment, "occlusion", Shape::Float, &[Grayscale], LitOnly),
    rule("Alpha", Stage::Fragment, "opacity", Shape::Float, &[Grayscale], TransparentOrClip),
    rule("AlphaClipThreshold", Stage::Fragment, "opacityThreshold", Shape::Float, &[], AlphaClip),
    rule("Position", Stage::Vertex, "displacement", Shape::Vector3, &[RestOffset], Always),
];

/// Logical inputs with no destination port
const DROPPED: &[&str] = &["VertexNormal", "VertexTangent"];

/// Shape a stage block collects a logical input in, when it has a fixed one
pub fn logical_shape(logical: &str) -> Option<Shape> {
    RULES.iter().find(|r| r.logical == logical).map(|r| r.shape)
}

struct PortDefault {
    port: &'static str,
    shape: Shape,
    value: &'static [f32],
    presence: Presence,
}

const fn port_default(port: &'static str, shape: Shape, value: &'static [f32], presence: Presence) -> PortDefault {
    PortDefault { port, shape, value, presence }
}

static LIT_DEFAULTS: &[PortDefault] = &[
    port_default("diffuseColor", Shape::Color3, &[0.18, 0.18, 0.18], Always),
    port_default("emissiveColor", Shape::Color3, &[0.0, 0.0, 0.0], Always),
    port_default("useSpecularWorkflow", Shape::Integer, &[0.0], Always),
    port_default("metallic", Shape::Float, &[0.0], Always),
    port_default("roughness", Shape::Float, &[0.5], Always),
    port_default("clearcoat", Shape::Float, &[0.0], Always),
    port_default("clearcoatRoughness", Shape::Float, &[0.01], Always),
    port_default("opacity", Shape::Float, &[1.0], TransparentOrClip),
    port_default("opacityThreshold", Shape::Float, &[0.5], AlphaClip),
    port_default("ior", Shape::Float, &[1.5], Always),
    port_default("normal", Shape::Vector3, &[0.0, 0.0, 1.0], Always),
    port_default("occlusion", Shape::Float, &[1.0], Always),
];

static UNLIT_DEFAULTS: &[PortDefault] = &[
    port_default("diffuseColor", Shape::Color3, &[0.0, 0.0, 0.0], Always),
    port_default("emissiveColor", Shape::Color3, &[0.18, 0.18, 0.18], Always),
    port_default("useSpecularWorkflow", Shape::Integer, &[0.0], Always),
    port_default("metallic", Shape::Float, &[0.0], Always),
    port_default("roughness", Shape::Float, &[1.0], Always),
    port_default("opacity", Shape::Float, &[1.0], TransparentOrClip),
    port_default("opacityThreshold", Shape::Float, &[0.5], AlphaClip),
];

/// Writes the shader roots from collected stage contributions
pub struct Assembler<'a> {
    settings: &'a CompilerSettings,
    stages: &'a StageContributions,
}

impl<'a> Assembler<'a> {
    /// Assembler for one compilation
    pub fn new(settings: &'a CompilerSettings, stages: &'a StageContributions) -> Self {
        Self { settings, stages }
    }

    /// Emit the fragment root, the vertex root unless in preview mode, and
    /// the material root referencing them.
    pub fn assemble(&self, builder: &mut GraphBuilder, diagnostics: &mut Diagnostics) -> Result<(), BuilderError> {
        builder.add_root(SURFACE_ROOT, "UsdPreviewSurface", Shape::SurfaceShader)?;
        let supplied = self.apply_rules(builder, Stage::Fragment, SURFACE_ROOT, diagnostics)?;

        let defaults = if self.settings.is_unlit() { UNLIT_DEFAULTS } else { LIT_DEFAULTS };
        for entry in defaults {
            if supplied.contains(&entry.port) || !entry.presence.holds(self.settings) {
                continue;
            }
            let value = Value::from_components(entry.shape, entry.value);
            builder.add_root_value(SURFACE_ROOT, entry.port, entry.shape, value)?;
        }

        for logical in self.stages.logical_names(Stage::Vertex) {
            if DROPPED.contains(&logical) {
                diagnostics.note(None, format!("vertex input '{logical}' has no destination equivalent and is ignored"));
            }
        }

        builder.add_root(MATERIAL_ROOT, "surfacematerial", Shape::Material)?;
        builder.add_root_edge(MATERIAL_ROOT, "surfaceshader", Shape::SurfaceShader, SURFACE_ROOT)?;

        if self.settings.preview {
            if self.stages.collector(Stage::Vertex, "Position").is_some() {
                diagnostics.note(None, "preview mode: vertex stage output suppressed");
            }
        } else {
            builder.add_root(DISPLACEMENT_ROOT, "displacement", Shape::DisplacementShader)?;
            let supplied = self.apply_rules(builder, Stage::Vertex, DISPLACEMENT_ROOT, diagnostics)?;
            if !supplied.contains(&"displacement") {
                builder.add_root_value(
                    DISPLACEMENT_ROOT,
                    "displacement",
                    Shape::Vector3,
                    Value::Tuple(vec![0.0; 3]),
                )?;
            }
            builder.add_root_value(DISPLACEMENT_ROOT, "scale", Shape::Float, Value::Float(1.0))?;
            builder.add_root_edge(MATERIAL_ROOT, "displacementshader", Shape::DisplacementShader, DISPLACEMENT_ROOT)?;
        }
        tracing::debug!(preview = self.settings.preview, unlit = self.settings.is_unlit(), "assembled shader roots");
        Ok(())
    }

    fn apply_rules(
        &self,
        builder: &mut GraphBuilder,
        stage: Stage,
        root: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<&'static str>, BuilderError> {
        let mut supplied = Vec::new();
        for rule in RULES.iter().filter(|r| r.stage == stage && r.presence.holds(self.settings)) {
            let Some(mut contribution) = self.stages.settle(builder, stage, rule.logical) else {
                continue;
            };
            for wrapper in rule.wrappers {
                contribution = self.wrap(builder, *wrapper, rule, contribution)?;
            }
            match contribution {
                Contribution::Literal { value, shape } => {
                    let Some(value) = value.coerce(shape, rule.shape) else {
                        diagnostics.push(type_mismatch(rule, shape));
                        continue;
                    };
                    builder.add_root_value(root, rule.port, rule.shape, value)?;
                }
                Contribution::Node { node, output } => {
                    let Some((source, source_output)) = builder.coerced_source(&node, output.as_deref(), rule.shape)? else {
                        let shape = builder.output_shape(&node, output.as_deref()).unwrap_or(Shape::Float);
                        diagnostics.push(type_mismatch(rule, shape));
                        continue;
                    };
                    let name = format!("{}_output", rule.port);
                    builder.add_graph_output(&name, rule.shape, &source, source_output.as_deref())?;
                    builder.add_root_output_ref(root, rule.port, rule.shape, &name)?;
                }
            }
            supplied.push(rule.port);
        }
        Ok(supplied)
    }

    fn wrap(
        &self,
        builder: &mut GraphBuilder,
        wrapper: Wrapper,
        rule: &Rule,
        input: Contribution,
    ) -> Result<Contribution, BuilderError> {
        let shape = contribution_shape(builder, &input);
        let name = format!("{}_{}", rule.port, wrapper_name(wrapper));

        match wrapper {
            Grayscale if !shape.is_vector_like() => Ok(input),
            Grayscale => match &input {
                Contribution::Literal { value, .. } => {
                    let c = value.components().unwrap_or_default();
                    let luma = c.iter().zip(LUMINANCE).map(|(c, w)| c * w).sum();
                    Ok(Contribution::Literal { value: Value::Float(luma), shape: Shape::Float })
                }
                Contribution::Node { .. } => {
                    builder.add_node(&name, "dotproduct", Shape::Float, NodeFlags::default())?;
                    if !feed(builder, &name, "in1", Shape::Vector3, &input)? {
                        return Ok(input);
                    }
                    builder.add_port_value(&name, "in2", Shape::Vector3, Value::Tuple(LUMINANCE.to_vec()))?;
                    Ok(node(name))
                }
            },
            OneMinus => match &input {
                Contribution::Literal { value, shape } => {
                    let c: Vec<f32> = value.components().unwrap_or_default().iter().map(|c| 1.0 - c).collect();
                    Ok(Contribution::Literal { value: Value::from_components(*shape, &c), shape: *shape })
                }
                Contribution::Node { .. } => {
                    builder.add_node(&name, "subtract", rule.shape, NodeFlags::default())?;
                    builder.add_port_value(&name, "in1", Shape::Float, Value::Float(1.0))?;
                    if !feed(builder, &name, "in2", rule.shape, &input)? {
                        return Ok(input);
                    }
                    Ok(node(name))
                }
            },
            FlipNormalGreen => match &input {
                Contribution::Literal { value, shape } => {
                    let mut c = value.components().unwrap_or_default();
                    if let Some(green) = c.get_mut(1) {
                        *green = -*green;
                    }
                    Ok(Contribution::Literal { value: Value::from_components(*shape, &c), shape: *shape })
                }
                Contribution::Node { .. } => {
                    builder.add_node(&name, "multiply", Shape::Vector3, NodeFlags::default())?;
                    if !feed(builder, &name, "in1", Shape::Vector3, &input)? {
                        return Ok(input);
                    }
                    builder.add_port_value(&name, "in2", Shape::Vector3, Value::Tuple(vec![1.0, -1.0, 1.0]))?;
                    Ok(node(name))
                }
            },
            AlphaGate => {
                if !(self.settings.is_transparent() && self.settings.blend == BlendMode::Additive) {
                    return Ok(input);
                }
                let Some(alpha) = self.stages.settle(builder, Stage::Fragment, "Alpha") else {
                    return Ok(input);
                };
                if let (
                    Contribution::Literal { value, shape },
                    Contribution::Literal { value: alpha, .. },
                ) = (&input, &alpha)
                {
                    let a = alpha.components().and_then(|c| c.first().copied()).unwrap_or(1.0);
                    let c: Vec<f32> = value.components().unwrap_or_default().iter().map(|c| c * a).collect();
                    return Ok(Contribution::Literal { value: Value::from_components(*shape, &c), shape: *shape });
                }
                builder.add_node(&name, "multiply", rule.shape, NodeFlags::default())?;
                if !feed(builder, &name, "in1", rule.shape, &input)? || !feed(builder, &name, "in2", Shape::Float, &alpha)? {
                    return Ok(input);
                }
                Ok(node(name))
            }
            RestOffset => {
                let rest = builder.implicit_property(SystemInput::ObjectPosition)?;
                builder.add_node(&name, "subtract", Shape::Vector3, NodeFlags::default())?;
                if !feed(builder, &name, "in1", Shape::Vector3, &input)? {
                    return Ok(input);
                }
                builder.add_port_and_edge(&name, "in2", Shape::Vector3, &rest, None)?;
                Ok(node(name))
            }
        }
    }
}

fn wrapper_name(wrapper: Wrapper) -> &'static str {
    match wrapper {
        Grayscale => "grayscale",
        FlipNormalGreen => "flip_green",
        OneMinus => "one_minus",
        AlphaGate => "alpha_gate",
        RestOffset => "rest_offset",
    }
}

fn node(name: String) -> Contribution {
    Contribution::Node { node: name, output: None }
}

fn contribution_shape(builder: &GraphBuilder, contribution: &Contribution) -> Shape {
    match contribution {
        Contribution::Literal { shape, .. } => *shape,
        Contribution::Node { node, output } => builder.output_shape(node, output.as_deref()).unwrap_or(Shape::Float),
    }
}

/// Bind a contribution to a wrapper port. Returns `false` when the shapes
/// cannot be reconciled.
fn feed(
    builder: &mut GraphBuilder,
    node: &str,
    port: &str,
    shape: Shape,
    input: &Contribution,
) -> Result<bool, BuilderError> {
    match input {
        Contribution::Literal { value, shape: from } => match value.coerce(*from, shape) {
            Some(value) => {
                builder.add_port_value(node, port, shape, value)?;
                Ok(true)
            }
            None => Ok(false),
        },
        Contribution::Node { node: upstream, output } => {
            builder.add_port(node, port, shape)?;
            builder.connect_coerced(node, port, upstream, output.as_deref())
        }
    }
}

fn type_mismatch(rule: &Rule, shape: Shape) -> crate::diagnostics::Diagnostic {
    crate::diagnostics::Diagnostic {
        severity: Severity::Warning,
        kind: DiagnosticKind::TypeError,
        message: format!("cannot use a {shape} value for '{}' ({})", rule.port, rule.shape),
        node: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DestinationGraph;
    use crate::settings::{ShadingMode, SurfaceType};

    fn collector(builder: &mut GraphBuilder, stages: &mut StageContributions, stage: Stage, logical: &str, shape: Shape) -> String {
        let name = format!("collect_{logical}");
        builder.add_node(&name, "dot", shape, NodeFlags::default()).unwrap();
        stages.collect(stage, logical, &name);
        name
    }

    fn assemble(mut builder: GraphBuilder, stages: &StageContributions, settings: &CompilerSettings) -> DestinationGraph {
        Assembler::new(settings, stages).assemble(&mut builder, &mut Diagnostics::new()).unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn test_defaults_and_roots() {
        let graph = assemble(GraphBuilder::new("m"), &StageContributions::new(), &CompilerSettings::default());
        let surface = graph.root(SURFACE_ROOT).unwrap();
        assert_eq!(surface.category, "UsdPreviewSurface");
        assert_eq!(surface.literal("useSpecularWorkflow"), Some(&Value::Integer(0)));
        assert_eq!(surface.literal("roughness"), Some(&Value::Float(0.5)));
        assert!(surface.port("opacityThreshold").is_none());
        assert!(surface.port("opacity").is_none());
        assert_eq!(graph.roots_of_category("surfacematerial").count(), 1);
        assert_eq!(graph.roots_of_category("displacement").count(), 1);
    }

    #[test]
    fn test_alpha_clip_threshold_presence() {
        let build = || {
            let mut builder = GraphBuilder::new("m");
            let mut stages = StageContributions::new();
            let c = collector(&mut builder, &mut stages, Stage::Fragment, "AlphaClipThreshold", Shape::Float);
            builder.add_port_value(&c, "in", Shape::Float, Value::Float(0.3)).unwrap();
            (builder, stages)
        };

        let (builder, stages) = build();
        let graph = assemble(builder, &stages, &CompilerSettings::default());
        assert!(graph.root(SURFACE_ROOT).unwrap().port("opacityThreshold").is_none());

        let (builder, stages) = build();
        let settings = CompilerSettings { alpha_clip: true, ..Default::default() };
        let graph = assemble(builder, &stages, &settings);
        let surface = graph.root(SURFACE_ROOT).unwrap();
        assert_eq!(surface.literal("opacityThreshold"), Some(&Value::Float(0.3)));
        assert_eq!(surface.literal("opacity"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn test_unlit_renames_base_color() {
        let mut builder = GraphBuilder::new("m");
        let mut stages = StageContributions::new();
        let c = collector(&mut builder, &mut stages, Stage::Fragment, "BaseColor", Shape::Color4);
        builder.add_port_value(&c, "in", Shape::Color4, Value::Tuple(vec![1.0, 0.0, 0.0, 1.0])).unwrap();

        let settings = CompilerSettings { shading: ShadingMode::Unlit, ..Default::default() };
        let graph = assemble(builder, &stages, &settings);
        let surface = graph.root(SURFACE_ROOT).unwrap();
        assert_eq!(surface.literal("emissiveColor"), Some(&Value::Tuple(vec![1.0, 0.0, 0.0])));
        assert_eq!(surface.literal("diffuseColor"), Some(&Value::Tuple(vec![0.0, 0.0, 0.0])));
        assert_eq!(surface.literal("roughness"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn test_smoothness_becomes_roughness() {
        let mut builder = GraphBuilder::new("m");
        let mut stages = StageContributions::new();
        builder.add_node("smooth_src", "sin", Shape::Float, NodeFlags::default()).unwrap();
        builder.add_port_value("smooth_src", "in", Shape::Float, Value::Float(0.2)).unwrap();
        let c = collector(&mut builder, &mut stages, Stage::Fragment, "Smoothness", Shape::Float);
        builder.add_port_and_edge(&c, "in", Shape::Float, "smooth_src", None).unwrap();

        let graph = assemble(builder, &stages, &CompilerSettings::default());
        let output = graph.output("roughness_output").unwrap();
        assert_eq!(output.node, "roughness_one_minus");
        let wrapper = graph.node("roughness_one_minus").unwrap();
        assert_eq!(wrapper.category, "subtract");
        assert_eq!(wrapper.literal("in1"), Some(&Value::Float(1.0)));
        // The collector is bypassed
        assert!(graph.node(&c).is_none());
    }

    #[test]
    fn test_literal_wrappers_fold() {
        let mut builder = GraphBuilder::new("m");
        let mut stages = StageContributions::new();
        let n = collector(&mut builder, &mut stages, Stage::Fragment, "Normal", Shape::Vector3);
        builder.add_port_value(&n, "in", Shape::Vector3, Value::Tuple(vec![0.0, 0.5, 1.0])).unwrap();
        let s = collector(&mut builder, &mut stages, Stage::Fragment, "Smoothness", Shape::Float);
        builder.add_port_value(&s, "in", Shape::Float, Value::Float(0.25)).unwrap();

        let graph = assemble(builder, &stages, &CompilerSettings::default());
        let surface = graph.root(SURFACE_ROOT).unwrap();
        assert_eq!(surface.literal("normal"), Some(&Value::Tuple(vec![0.0, -0.5, 1.0])));
        assert_eq!(surface.literal("roughness"), Some(&Value::Float(0.75)));
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_rest_offset_and_preview() {
        let build = || {
            let mut builder = GraphBuilder::new("m");
            let mut stages = StageContributions::new();
            let position = builder.implicit_property(SystemInput::Position).unwrap();
            let c = collector(&mut builder, &mut stages, Stage::Vertex, "Position", Shape::Vector3);
            builder.add_port_and_edge(&c, "in", Shape::Vector3, &position, None).unwrap();
            (builder, stages)
        };

        let (builder, stages) = build();
        let graph = assemble(builder, &stages, &CompilerSettings::default());
        let offset = graph.node("displacement_rest_offset").unwrap();
        assert_eq!(offset.category, "subtract");
        assert!(graph.node(SystemInput::ObjectPosition.node_name()).is_some());
        assert!(graph.root(DISPLACEMENT_ROOT).is_some());

        let (builder, stages) = build();
        let settings = CompilerSettings { preview: true, ..Default::default() };
        let graph = assemble(builder, &stages, &settings);
        assert!(graph.root(DISPLACEMENT_ROOT).is_none());
        assert!(graph.root(MATERIAL_ROOT).unwrap().port("displacementshader").is_none());
    }

    #[test]
    fn test_additive_alpha_gates_color() {
        let mut builder = GraphBuilder::new("m");
        let mut stages = StageContributions::new();
        let color = collector(&mut builder, &mut stages, Stage::Fragment, "BaseColor", Shape::Color3);
        builder.add_port_value(&color, "in", Shape::Color3, Value::Tuple(vec![1.0, 0.5, 0.0])).unwrap();
        let alpha = collector(&mut builder, &mut stages, Stage::Fragment, "Alpha", Shape::Float);
        builder.add_port_value(&alpha, "in", Shape::Float, Value::Float(0.5)).unwrap();

        let settings = CompilerSettings {
            surface: SurfaceType::Transparent,
            blend: BlendMode::Additive,
            ..Default::default()
        };
        let graph = assemble(builder, &stages, &settings);
        let surface = graph.root(SURFACE_ROOT).unwrap();
        assert_eq!(surface.literal("diffuseColor"), Some(&Value::Tuple(vec![0.5, 0.25, 0.0])));
        assert_eq!(surface.literal("opacity"), Some(&Value::Float(0.5)));
    }
}
