// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runs the built binary against a small graph.

use std::path::PathBuf;
use std::process::Command;

use ordoplay_shader_graph::graphs::material::create_material_registry;
use ordoplay_shader_graph::{Graph, PortValue};

fn write_graph(dir: &PathBuf, with_noise: bool) -> PathBuf {
    let registry = create_material_registry();
    let mut graph = Graph::new("smoke");
    let color = graph.add_node(
        registry
            .create_node("color_constant")
            .unwrap()
            .with_value("Color", PortValue::Color([0.2, 0.4, 0.6, 1.0])),
    );
    let out = graph.add_output_node(registry.create_node("material_output").unwrap());
    graph.connect_named(color, "Color", out, "Base Color").unwrap();
    if with_noise {
        let noise = graph.add_node(registry.create_node("noise_perlin").unwrap());
        graph.connect_named(noise, "Value", out, "Metallic").unwrap();
    }
    let path = dir.join(if with_noise { "noise.ron" } else { "flat.ron" });
    graph.save(&path).unwrap();
    path
}

#[test]
fn compile_writes_json() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let graph = write_graph(&dir, false);
    let out = dir.join("flat.json");
    let _ = std::fs::remove_file(&out);

    let status = Command::new(env!("CARGO_BIN_EXE_ordoplay_mtlx"))
        .arg("compile")
        .arg(&graph)
        .args(["--format", "json", "--out"])
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["name"], "smoke");
    assert_eq!(json["roots"]["surface_shader"]["category"], "UsdPreviewSurface");
}

#[test]
fn validate_fails_on_unsupported_nodes() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();

    let clean = Command::new(env!("CARGO_BIN_EXE_ordoplay_mtlx"))
        .arg("validate")
        .arg(write_graph(&dir, false))
        .status()
        .unwrap();
    assert!(clean.success());

    let noisy = Command::new(env!("CARGO_BIN_EXE_ordoplay_mtlx"))
        .arg("validate")
        .arg(write_graph(&dir, true))
        .output()
        .unwrap();
    assert!(!noisy.status.success());
    assert!(String::from_utf8_lossy(&noisy.stderr).contains("unsupported node"));
}
