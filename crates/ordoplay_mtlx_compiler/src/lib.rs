// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` material graph to MaterialX translator.
//!
//! This crate turns an [`ordoplay_shader_graph::Graph`] into a
//! [`DestinationGraph`]: a MaterialX-style nodegraph plus the
//! `UsdPreviewSurface`, `displacement` and `surfacematerial` roots.
//! - Per-node-type adapters ([`adapters`])
//! - Deferred edge resolution through pass-through nodes ([`resolver`])
//! - Inline code snippets compiled to flat subgraphs ([`compound`])
//! - Stage assembly with lit/unlit defaults ([`assembler`])
//! - Recoverable problems reported as [`Diagnostics`]

pub mod adapters;
pub mod assembler;
pub mod builder;
pub mod compile;
pub mod compound;
pub mod diagnostics;
pub mod eval;
pub mod graph;
pub mod resolver;
pub mod settings;
pub mod shape;
pub mod snippets;

pub use adapters::{AdapterEnv, AdapterRegistry, BuildContext, NodeAdapter};
pub use assembler::{Stage, DISPLACEMENT_ROOT, MATERIAL_ROOT, SURFACE_ROOT};
pub use builder::{BuilderError, GraphBuilder, SystemInput};
pub use compile::{CompileError, CompileOutput, Compiler};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use eval::{EvalError, EvaluationContext};
pub use graph::{DestNode, DestinationGraph, Edge, NodeFlags, PortBinding};
pub use settings::{BlendMode, CompilerSettings, SettingsError, ShadingMode, SurfaceType};
pub use shape::{Shape, Value};
pub use snippets::{FsSnippetLoader, MemorySnippetLoader, SnippetError, SnippetLoader};
