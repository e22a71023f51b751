// SPDX-License-Identifier: MIT OR Apache-2.0
//! `ordoplay_mtlx` - translate `OrdoPlay` material graphs from the command line.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use ordoplay_mtlx_compiler::{Compiler, CompilerSettings, Diagnostics};
use ordoplay_shader_graph::Graph;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "ordoplay_mtlx", version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate a material graph and write the destination graph.
    Compile(CompileArgs),
    /// Report which nodes of a material graph can be translated.
    Validate(ValidateArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Ron,
    Json,
}

#[derive(Parser, Debug)]
struct CompileArgs {
    /// Material graph (RON).
    graph: PathBuf,

    /// Compiler settings (RON).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output encoding.
    #[arg(long, value_enum, default_value_t = Format::Ron)]
    format: Format,

    /// Output path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Material graph (RON).
    graph: PathBuf,

    /// Compiler settings (RON).
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ordoplay_mtlx=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Compile(args) => cmd_compile(args),
        Command::Validate(args) => cmd_validate(args),
    }
}

fn load_inputs(graph: &Path, settings: Option<&Path>) -> anyhow::Result<(Graph, CompilerSettings)> {
    let graph = Graph::load(graph).with_context(|| format!("read graph '{}'", graph.display()))?;
    let settings = match settings {
        Some(path) => {
            CompilerSettings::load(path).with_context(|| format!("read settings '{}'", path.display()))?
        }
        None => CompilerSettings::default(),
    };
    Ok((graph, settings))
}

fn report(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!("{diagnostic}");
    }
}

fn cmd_compile(args: CompileArgs) -> anyhow::Result<()> {
    let (graph, settings) = load_inputs(&args.graph, args.settings.as_deref())?;
    let output = Compiler::new(settings)
        .compile(&graph)
        .with_context(|| format!("compile '{}'", args.graph.display()))?;
    report(&output.diagnostics);

    let text = match args.format {
        Format::Ron => output.graph.to_ron().context("encode RON")?,
        Format::Json => serde_json::to_string_pretty(&output.graph).context("encode JSON")?,
    };
    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(path, text).with_context(|| format!("write '{}'", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let (graph, settings) = load_inputs(&args.graph, args.settings.as_deref())?;
    let diagnostics = Compiler::new(settings).validate_graph(&graph);
    report(&diagnostics);
    if diagnostics.has_warnings() {
        anyhow::bail!("{} problem(s) found in '{}'", diagnostics.len(), args.graph.display());
    }
    println!("{}: all {} nodes can be translated", args.graph.display(), graph.nodes().count());
    Ok(())
}
