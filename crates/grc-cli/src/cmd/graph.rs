use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use grc_core::config::{Config, ExportFormat};
use grc_core::export::{GraphView, to_dot};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Export format accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportArg {
    Dot,
    Json,
}

impl From<ExportArg> for ExportFormat {
    fn from(arg: ExportArg) -> Self {
        match arg {
            ExportArg::Dot => Self::Dot,
            ExportArg::Json => Self::Json,
        }
    }
}

/// Arguments for `grc graph`.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Flow document to compile.
    pub file: PathBuf,

    /// Export format (defaults to `[output] format` from config).
    #[arg(long, value_enum)]
    pub export: Option<ExportArg>,

    /// Skip anonymous elision and synonym collapse.
    #[arg(long)]
    pub raw: bool,

    /// Write to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Compile `args.file` and emit the graph as DOT or JSON.
///
/// # Errors
///
/// Returns an error if the document fails to compile or the output cannot
/// be written.
pub fn run_graph(args: &GraphArgs, config: &Config) -> Result<()> {
    let simplify = config.graph.simplify && !args.raw;
    let format = args.export.map_or(config.output.format, ExportFormat::from);
    let compiled = super::compile_file(&args.file, simplify)?;

    let mut rendered = match format {
        ExportFormat::Dot => to_dot(&compiled, &config.render),
        ExportFormat::Json => GraphView::new(&compiled).to_json()?,
    };
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    if let Some(path) = &args.output {
        std::fs::write(path, &rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(file = %path.display(), ?format, "wrote graph");
    } else {
        let mut out = std::io::stdout().lock();
        out.write_all(rendered.as_bytes())?;
    }
    Ok(())
}
