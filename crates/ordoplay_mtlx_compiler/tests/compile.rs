// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end compilation of material graphs.

use ordoplay_mtlx_compiler::{
    BlendMode, CompileOutput, Compiler, CompilerSettings, DiagnosticKind, EvaluationContext, MemorySnippetLoader,
    PortBinding, ShadingMode, Shape, SurfaceType, SystemInput, Value, MATERIAL_ROOT, SURFACE_ROOT,
};
use ordoplay_shader_graph::graphs::material::{create_material_registry, CODE_PROPERTY, CODE_RESOURCE_PROPERTY};
use ordoplay_shader_graph::{Graph, Node, Port, PortType, PortValue};

fn node(type_id: &str) -> Node {
    create_material_registry().create_node(type_id).unwrap()
}

fn compile(graph: &Graph, settings: CompilerSettings) -> CompileOutput {
    Compiler::new(settings).compile(graph).unwrap()
}

fn surface_binding<'a>(output: &'a CompileOutput, port: &str) -> &'a PortBinding {
    &output.graph.root(SURFACE_ROOT).unwrap().port(port).unwrap().binding
}

#[test]
fn constant_color_feeds_surface_directly() {
    let mut graph = Graph::new("flat");
    let color = graph.add_node(node("color_constant").with_value("Color", PortValue::Color([0.8, 0.1, 0.1, 1.0])));
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(color, "Color", out, "Base Color").unwrap();

    let output = compile(&graph, CompilerSettings::default());
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.graph.node_count(), 1);
    assert!(output.graph.edges().is_empty());

    let PortBinding::GraphOutput(name) = surface_binding(&output, "diffuseColor") else {
        panic!("diffuseColor is not connected to the nodegraph");
    };
    let target = output.graph.output(name).unwrap();
    let constant = output.graph.node(&target.node).unwrap();
    assert_eq!(constant.category, "constant");
    assert_eq!(constant.shape, Shape::Color3);
    assert_eq!(constant.literal("value"), Some(&Value::Tuple(vec![0.8, 0.1, 0.1])));
}

#[test]
fn unregistered_node_falls_back_to_authored_literal() {
    let mut graph = Graph::new("noise");
    let noise = graph.add_node(node("noise_perlin"));
    let add = graph.add_node(
        node("add")
            .with_value("A", PortValue::Float(2.0))
            .with_value("B", PortValue::Float(3.0)),
    );
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(noise, "Value", add, "A").unwrap();
    graph.connect_named(add, "Result", out, "Metallic").unwrap();

    let output = compile(&graph, CompilerSettings::default());
    let unsupported: Vec<_> = output.diagnostics.of_kind(DiagnosticKind::UnsupportedNode).collect();
    assert_eq!(unsupported.len(), 1);
    assert_eq!(unsupported[0].node, Some(noise));

    let (name, add_node) = output.graph.nodes().find(|(_, n)| n.category == "add").unwrap();
    assert_eq!(add_node.literal("in1"), Some(&Value::Float(2.0)));
    assert_eq!(output.graph.node_count(), 1, "{name} should be the only node");
    let metallic = EvaluationContext::new(&output.graph).evaluate_output("metallic_output").unwrap();
    assert_eq!(metallic, vec![5.0]);
}

#[test]
fn custom_code_loop_unrolls_into_additions() {
    let mut custom = node("custom_code").with_property(
        CODE_PROPERTY,
        PortValue::String("for (int i = 0; i < 3; i++) { sum = sum + i; }\nOut = sum;".into()),
    );
    custom.inputs.push(Port::input("sum", PortType::Float).with_default(PortValue::Float(1.0)));
    custom.outputs.push(Port::output("Out", PortType::Float));

    let mut graph = Graph::new("loop");
    let custom = graph.add_node(custom);
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(custom, "Out", out, "Metallic").unwrap();

    let output = compile(&graph, CompilerSettings::default());
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.graph.nodes_of_category("add").count(), 3);
    assert!(output.graph.nodes().all(|(_, n)| ["add", "dot"].contains(&n.category.as_str())));

    let metallic = EvaluationContext::new(&output.graph).evaluate_output("metallic_output").unwrap();
    assert_eq!(metallic, vec![4.0]);
}

#[test]
fn custom_code_loop_variable_may_be_undeclared() {
    let mut custom = node("custom_code").with_property(
        CODE_PROPERTY,
        PortValue::String("for (i=0;i<3;i++) { sum = sum + i; } Out = sum;".into()),
    );
    custom.inputs.push(Port::input("sum", PortType::Float).with_default(PortValue::Float(0.5)));
    custom.outputs.push(Port::output("Out", PortType::Float));

    let mut graph = Graph::new("loop");
    let custom = graph.add_node(custom);
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(custom, "Out", out, "Metallic").unwrap();

    let output = compile(&graph, CompilerSettings::default());
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.graph.nodes_of_category("add").count(), 3);
    let metallic = EvaluationContext::new(&output.graph).evaluate_output("metallic_output").unwrap();
    assert_eq!(metallic, vec![3.5]);
}

#[test]
fn snippet_faults_stay_on_their_node() {
    let faulty = [
        "Out = -2147483648;",
        "Out = sum; for (i=0;i<200;i++) { for (j=0;j<200;j++) { for (k=0;k<200;k++) { Out += sum; } } }",
    ];
    for code in faulty {
        let mut custom = node("custom_code").with_property(CODE_PROPERTY, PortValue::String(code.into()));
        custom.inputs.push(Port::input("sum", PortType::Float).with_default(PortValue::Float(0.5)));
        custom.outputs.push(Port::output("Out", PortType::Float));

        let mut graph = Graph::new("faulty");
        let custom = graph.add_node(custom);
        let out = graph.add_output_node(node("material_output"));
        graph.connect_named(custom, "Out", out, "Metallic").unwrap();

        let output = compile(&graph, CompilerSettings::default());
        assert_eq!(output.diagnostics.len(), 1, "{code}");
        assert_eq!(output.diagnostics.iter().next().unwrap().node, Some(custom));
        assert_eq!(output.graph.root(SURFACE_ROOT).unwrap().literal("metallic"), Some(&Value::Float(0.0)));
    }
}

#[test]
fn custom_code_resources_come_from_the_loader() {
    let mut custom = node("custom_code")
        .with_property(CODE_RESOURCE_PROPERTY, PortValue::String("shared/square.glsl".into()));
    custom.inputs.push(Port::input("X", PortType::Float).with_default(PortValue::Float(3.0)));
    custom.outputs.push(Port::output("Y", PortType::Float));

    let mut graph = Graph::new("resource");
    let custom = graph.add_node(custom);
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(custom, "Y", out, "Occlusion").unwrap();

    let loader = MemorySnippetLoader::new().with("shared/square.glsl", "Y = X * X;");
    let output = Compiler::new(CompilerSettings::default()).with_loader(loader).compile(&graph).unwrap();
    assert!(output.diagnostics.is_empty());
    let occlusion = EvaluationContext::new(&output.graph).evaluate_output("occlusion_output").unwrap();
    assert_eq!(occlusion, vec![9.0]);

    let output = Compiler::new(CompilerSettings::default())
        .with_loader(MemorySnippetLoader::new())
        .compile(&graph)
        .unwrap();
    assert_eq!(output.diagnostics.of_kind(DiagnosticKind::ResourceLoad).count(), 1);
    assert_eq!(output.graph.root(SURFACE_ROOT).unwrap().literal("occlusion"), Some(&Value::Float(1.0)));
}

#[test]
fn implicit_properties_are_shared() {
    let mut graph = Graph::new("shared_uv");
    let uv = graph.add_node(node("uv_coord"));
    let texture = graph.add_node(node("texture_sample").with_value("Texture", PortValue::Texture("albedo.png".into())));
    let add = graph.add_node(node("add"));
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(uv, "U", add, "A").unwrap();
    graph.connect_named(texture, "R", add, "B").unwrap();
    graph.connect_named(add, "Result", out, "Metallic").unwrap();

    let output = compile(&graph, CompilerSettings::default());
    let texcoords: Vec<_> = output.graph.nodes_of_category("texcoord").collect();
    assert_eq!(texcoords, [SystemInput::Texcoord.node_name()]);
    let readers = output
        .graph
        .edges()
        .into_iter()
        .filter(|e| e.from_node == SystemInput::Texcoord.node_name())
        .count();
    assert_eq!(readers, 2);
}

#[test]
fn ports_hold_a_literal_or_a_connection() {
    let mut graph = Graph::new("mixed");
    let time = graph.add_node(node("time"));
    let sin = graph.add_node(node("sin"));
    let lerp = graph.add_node(node("lerp").with_value("A", PortValue::Float(0.2)));
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(time, "Time", sin, "Angle").unwrap();
    graph.connect_named(sin, "Result", lerp, "B").unwrap();
    graph.connect_named(lerp, "Result", out, "Smoothness").unwrap();

    let output = compile(&graph, CompilerSettings::default());
    for (name, dest) in output.graph.nodes().chain(output.graph.roots()) {
        for (port, p) in &dest.ports {
            assert!(
                !matches!(p.binding, PortBinding::Pending | PortBinding::Unset),
                "{name}.{port} is {:?}",
                p.binding
            );
        }
    }
    let roughness = output.graph.root(SURFACE_ROOT).unwrap().port("roughness").unwrap();
    assert!(matches!(roughness.binding, PortBinding::GraphOutput(_)));
}

#[test]
fn reroute_loops_are_reported() {
    let mut graph = Graph::new("loop");
    let r1 = graph.add_node(node("reroute"));
    let r2 = graph.add_node(node("reroute"));
    let sin = graph.add_node(node("sin"));
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(r1, "Out", r2, "In").unwrap();
    graph.connect_named(r2, "Out", r1, "In").unwrap();
    graph.connect_named(r2, "Out", sin, "Angle").unwrap();
    graph.connect_named(sin, "Result", out, "Metallic").unwrap();

    let output = compile(&graph, CompilerSettings::default());
    let loops: Vec<_> = output.diagnostics.of_kind(DiagnosticKind::UnsupportedConstruct).collect();
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].node, Some(sin));
    let (_, sin_node) = output.graph.nodes().find(|(_, n)| n.category == "sin").unwrap();
    assert!(sin_node.port("in").is_none());
}

#[test]
fn node_cycles_are_skipped() {
    let mut graph = Graph::new("feedback");
    let add = graph.add_node(node("add"));
    let mul = graph.add_node(node("multiply"));
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(add, "Result", mul, "A").unwrap();
    graph.connect_named(mul, "Result", add, "A").unwrap();
    graph.connect_named(mul, "Result", out, "Metallic").unwrap();

    let output = compile(&graph, CompilerSettings::default());
    assert_eq!(output.diagnostics.of_kind(DiagnosticKind::UnsupportedConstruct).count(), 2);
    assert_eq!(output.graph.node_count(), 0);
    assert_eq!(output.graph.root(SURFACE_ROOT).unwrap().literal("metallic"), Some(&Value::Float(0.0)));
}

#[test]
fn unlit_color_becomes_emission() {
    let mut graph = Graph::new("unlit");
    let color = graph.add_node(node("color_constant").with_value("Color", PortValue::Color([0.0, 1.0, 0.0, 1.0])));
    let out = graph.add_output_node(node("unlit_output"));
    graph.connect_named(color, "Color", out, "Color").unwrap();

    let settings = CompilerSettings { shading: ShadingMode::Unlit, ..Default::default() };
    let output = compile(&graph, settings);
    let surface = output.graph.root(SURFACE_ROOT).unwrap();
    assert!(matches!(surface.port("emissiveColor").unwrap().binding, PortBinding::GraphOutput(_)));
    assert_eq!(surface.literal("diffuseColor"), Some(&Value::Tuple(vec![0.0, 0.0, 0.0])));
    assert!(surface.port("clearcoat").is_none());
}

#[test]
fn normal_map_is_rejected_when_unlit() {
    let mut graph = Graph::new("unlit_normals");
    let map = graph.add_node(node("normal_map").with_value("Texture", PortValue::Texture("n.png".into())));
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(map, "Normal", out, "Normal").unwrap();

    let settings = CompilerSettings { shading: ShadingMode::Unlit, ..Default::default() };
    let output = compile(&graph, settings);
    let unsupported: Vec<_> = output.diagnostics.of_kind(DiagnosticKind::UnsupportedNode).collect();
    assert_eq!(unsupported.len(), 1);
    assert!(unsupported[0].message.contains("unlit"));
    assert_eq!(output.graph.nodes_of_category("normalmap").count(), 0);
}

#[test]
fn opacity_ports_follow_surface_settings() {
    let mut graph = Graph::new("alpha");
    graph.add_output_node(
        node("material_output")
            .with_value("Alpha", PortValue::Float(0.4))
            .with_value("Alpha Clip Threshold", PortValue::Float(0.3)),
    );

    let opaque = compile(&graph, CompilerSettings::default());
    let surface = opaque.graph.root(SURFACE_ROOT).unwrap();
    assert!(surface.port("opacity").is_none());
    assert!(surface.port("opacityThreshold").is_none());

    let clipped = compile(&graph, CompilerSettings { alpha_clip: true, ..Default::default() });
    let surface = clipped.graph.root(SURFACE_ROOT).unwrap();
    assert_eq!(surface.literal("opacity"), Some(&Value::Float(0.4)));
    assert_eq!(surface.literal("opacityThreshold"), Some(&Value::Float(0.3)));

    let transparent = compile(
        &graph,
        CompilerSettings { surface: SurfaceType::Transparent, blend: BlendMode::Premultiply, ..Default::default() },
    );
    let surface = transparent.graph.root(SURFACE_ROOT).unwrap();
    assert_eq!(surface.literal("opacity"), Some(&Value::Float(0.4)));
    assert!(surface.port("opacityThreshold").is_none());
}

#[test]
fn preview_mode_has_no_displacement() {
    let mut graph = Graph::new("wobble");
    let position = graph.add_node(node("world_position"));
    let vertex = graph.add_output_node(node("vertex_output"));
    graph.add_output_node(node("material_output"));
    graph.connect_named(position, "Position", vertex, "Position").unwrap();

    let full = compile(&graph, CompilerSettings::default());
    assert_eq!(full.graph.roots_of_category("displacement").count(), 1);
    let material = full.graph.root(MATERIAL_ROOT).unwrap();
    assert!(material.port("displacementshader").is_some());

    let preview = compile(&graph, CompilerSettings { preview: true, ..Default::default() });
    assert_eq!(preview.graph.roots_of_category("displacement").count(), 0);
    assert_eq!(preview.graph.roots_of_category("surfacematerial").count(), 1);
    assert_eq!(preview.diagnostics.of_kind(DiagnosticKind::Note).count(), 1);
}

#[test]
fn compilation_is_deterministic() {
    let mut graph = Graph::new("checker");
    let checker = graph.add_node(node("checkerboard").with_value("Scale", PortValue::Float(4.0)));
    let fresnel = graph.add_node(node("fresnel"));
    let out = graph.add_output_node(node("material_output"));
    graph.connect_named(checker, "Color", out, "Base Color").unwrap();
    graph.connect_named(fresnel, "Result", out, "Emission").unwrap();

    let compiler = Compiler::new(CompilerSettings::default());
    let first = compiler.compile(&graph).unwrap();
    let second = compiler.compile(&graph).unwrap();
    assert!(first.diagnostics.is_empty());
    assert_eq!(first.graph, second.graph);
    assert_eq!(first.graph.to_ron().unwrap(), second.graph.to_ron().unwrap());
}
