// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reroutes and user-written code nodes.

use super::recipes::{compile_diagnostic, SnippetPorts};
use super::{AdapterEnv, AdapterRegistry, BuildContext, NodeAdapter};
use crate::builder::BuilderError;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use ordoplay_shader_graph::graphs::material::{CODE_PROPERTY, CODE_RESOURCE_PROPERTY};
use ordoplay_shader_graph::Node;

/// Pass-through node: its output is whatever feeds its input
#[derive(Debug, Clone, Copy, Default)]
pub struct RerouteAdapter;

impl NodeAdapter for RerouteAdapter {
    fn is_redirect(&self) -> bool {
        true
    }

    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        ctx.redirect(node, "Out", "In");
        Ok(())
    }
}

/// `custom_code` node. The code is inline in the `code` property or loaded
/// by id from `code_resource`; ports are the node's own.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomCodeAdapter;

impl CustomCodeAdapter {
    fn source_text(node: &Node, env: &AdapterEnv<'_>) -> Result<String, Diagnostic> {
        if let Some(code) = node.property_str(CODE_PROPERTY) {
            return Ok(code.to_string());
        }
        let id = node.property_str(CODE_RESOURCE_PROPERTY).unwrap_or_default();
        env.loader.load(id).map_err(|err| Diagnostic {
            severity: Severity::Warning,
            kind: DiagnosticKind::ResourceLoad,
            message: format!("'{}': {err}", node.name),
            node: Some(node.id),
        })
    }
}

impl NodeAdapter for CustomCodeAdapter {
    fn support_details(&self, node: &Node, _env: &AdapterEnv<'_>) -> String {
        if node.property_str(CODE_PROPERTY).is_none() && node.property_str(CODE_RESOURCE_PROPERTY).is_none() {
            return format!("neither '{CODE_PROPERTY}' nor '{CODE_RESOURCE_PROPERTY}' is set");
        }
        if node.outputs.is_empty() {
            return "the node declares no outputs".to_string();
        }
        String::new()
    }

    fn build(&self, node: &Node, ctx: &mut BuildContext<'_>) -> Result<(), BuilderError> {
        let code = match Self::source_text(node, &ctx.env) {
            Ok(code) => code,
            Err(diagnostic) => {
                ctx.diagnostics.push(diagnostic);
                return Ok(());
            }
        };
        let ports = SnippetPorts::new(node, &ctx.env, &[]);
        match ports.compile(&code, &ctx.env) {
            Ok(subgraph) => ports.instantiate(node, ctx, "custom", &subgraph),
            Err(err) => {
                ctx.diagnostics.push(compile_diagnostic(node, &err));
                Ok(())
            }
        }
    }

    fn check(&self, node: &Node, env: &AdapterEnv<'_>) -> Vec<Diagnostic> {
        let code = match Self::source_text(node, env) {
            Ok(code) => code,
            Err(diagnostic) => return vec![diagnostic],
        };
        match SnippetPorts::new(node, env, &[]).compile(&code, env) {
            Ok(_) => Vec::new(),
            Err(err) => vec![compile_diagnostic(node, &err)],
        }
    }
}

pub(super) fn register(registry: &mut AdapterRegistry) {
    registry.register("reroute", RerouteAdapter);
    registry.register("custom_code", CustomCodeAdapter);
}
