// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recoverable, node-attached problems reported during a compilation.

use ordoplay_shader_graph::NodeId;
use serde::Serialize;
use std::fmt;

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// Informational, e.g. a dropped input with no destination equivalent
    Info,
    /// Part of the graph was not translated
    Warning,
    /// User content was rejected
    Error,
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// No adapter, or the adapter declined this configuration
    UnsupportedNode,
    /// Snippet text failed to parse
    ParseError,
    /// Snippet or connection types do not line up
    TypeError,
    /// Construct with no data-flow equivalent (loops, cycles, calls)
    UnsupportedConstruct,
    /// External snippet could not be loaded
    ResourceLoad,
    /// Information that does not affect correctness
    Note,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnsupportedNode => "unsupported node",
            Self::ParseError => "parse error",
            Self::TypeError => "type error",
            Self::UnsupportedConstruct => "unsupported construct",
            Self::ResourceLoad => "resource load",
            Self::Note => "note",
        };
        f.write_str(text)
    }
}

/// A single diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Category
    pub kind: DiagnosticKind,
    /// Human readable message
    pub message: String,
    /// Source node the problem is attached to
    pub node: Option<NodeId>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "{} [{node}]: {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Diagnostic sink for one compilation. Every entry is mirrored to `tracing`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => tracing::info!(node = ?diagnostic.node, "{}", diagnostic),
            Severity::Warning | Severity::Error => {
                tracing::warn!(node = ?diagnostic.node, "{}", diagnostic);
            }
        }
        self.entries.push(diagnostic);
    }

    /// Record a problem attached to a source node
    pub fn report(&mut self, node: NodeId, severity: Severity, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic { severity, kind, message: message.into(), node: Some(node) });
    }

    /// Record an unsupported-node warning
    pub fn unsupported_node(&mut self, node: NodeId, message: impl Into<String>) {
        self.report(node, Severity::Warning, DiagnosticKind::UnsupportedNode, message);
    }

    /// Record an informational note
    pub fn note(&mut self, node: Option<NodeId>, message: impl Into<String>) {
        self.push(Diagnostic { severity: Severity::Info, kind: DiagnosticKind::Note, message: message.into(), node });
    }

    /// All diagnostics in report order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Diagnostics of one kind
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    /// Diagnostics attached to one node
    pub fn for_node(&self, node: NodeId) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.node == Some(node))
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether anything at warning level or above was reported
    pub fn has_warnings(&self) -> bool {
        self.entries.iter().any(|d| d.severity >= Severity::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        let a = NodeId::new();
        let mut diagnostics = Diagnostics::new();
        diagnostics.note(None, "dropped vertex normal");
        assert!(!diagnostics.has_warnings());

        diagnostics.unsupported_node(a, "no translation for 'noise_perlin'");
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.has_warnings());
        assert_eq!(diagnostics.of_kind(DiagnosticKind::UnsupportedNode).count(), 1);
        assert_eq!(diagnostics.for_node(a).count(), 1);
    }
}
