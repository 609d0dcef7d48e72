use anyhow::Result;
use clap::Args;
use grc_core::config::Config;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

use crate::output::{CliError, OutputMode, render_mode};

/// Arguments for `grc check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Flow documents to compile.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    edges: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CliError>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    checked: usize,
    failed: usize,
    files: Vec<FileReport>,
}

/// Compile every file and report per-file success.
///
/// Returns `Ok(false)` when at least one file failed to compile.
///
/// # Errors
///
/// Returns an error only if writing the report fails.
pub fn run_check(args: &CheckArgs, output: OutputMode, config: &Config) -> Result<bool> {
    let files: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| {
            let file = path.display().to_string();
            match super::compile_file(path, config.graph.simplify) {
                Ok(compiled) => FileReport {
                    file,
                    ok: true,
                    name: compiled.metadata.map(|m| m.name),
                    nodes: Some(compiled.graph.node_count()),
                    edges: Some(compiled.graph.edge_count()),
                    error: None,
                },
                Err(err) => {
                    warn!(%file, error = %err, "check failed");
                    FileReport {
                        file,
                        ok: false,
                        name: None,
                        nodes: None,
                        edges: None,
                        error: Some(CliError::from(&err)),
                    }
                }
            }
        })
        .collect();

    let failed = files.iter().filter(|f| !f.ok).count();
    let report = CheckReport {
        checked: files.len(),
        failed,
        files,
    };

    render_mode(
        output,
        &report,
        |r, w| {
            for f in &r.files {
                match &f.error {
                    None => writeln!(
                        w,
                        "ok\t{}\t{}\t{}",
                        f.file,
                        f.nodes.unwrap_or_default(),
                        f.edges.unwrap_or_default()
                    )?,
                    Some(e) => writeln!(
                        w,
                        "error\t{}\t{}\t{}",
                        f.file,
                        e.error_code.as_deref().unwrap_or("-"),
                        e.message
                    )?,
                }
            }
            Ok(())
        },
        |r, w| {
            for f in &r.files {
                match &f.error {
                    None => writeln!(
                        w,
                        "✓ {} ({} nodes, {} edges)",
                        f.file,
                        f.nodes.unwrap_or_default(),
                        f.edges.unwrap_or_default()
                    )?,
                    Some(e) => {
                        writeln!(w, "✗ {}", f.file)?;
                        writeln!(w, "  {}", e.headline())?;
                        if let Some(hint) = &e.suggestion {
                            writeln!(w, "  hint: {hint}")?;
                        }
                    }
                }
            }
            writeln!(w)?;
            writeln!(w, "{} checked, {} failed", r.checked, r.failed)
        },
    )?;

    Ok(failed == 0)
}
