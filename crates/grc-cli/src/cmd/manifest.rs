use anyhow::Result;
use clap::Args;
use grc_core::config::Config;
use grc_core::flow::ManifestEntry;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `grc manifest`.
#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Flow document to read.
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ManifestReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    entries: Vec<ManifestEntry>,
}

/// Print the primary entities of a document and their amounts.
///
/// # Errors
///
/// Returns an error if the document fails to compile or stdout fails.
pub fn run_manifest(args: &ManifestArgs, output: OutputMode, config: &Config) -> Result<()> {
    let compiled = super::compile_file(&args.file, config.graph.simplify)?;
    let report = ManifestReport {
        name: compiled.metadata.map(|m| m.name),
        entries: compiled.manifest.iter().cloned().collect(),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            for entry in &r.entries {
                writeln!(
                    w,
                    "{}\t{}",
                    entry.name,
                    entry.qualifier.as_deref().unwrap_or("-")
                )?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, r.name.as_deref().unwrap_or("Manifest"))?;
            if r.entries.is_empty() {
                writeln!(w, "(no primary entities)")?;
            }
            for entry in &r.entries {
                pretty_kv(w, &entry.name, entry.qualifier.as_deref().unwrap_or("-"))?;
            }
            Ok(())
        },
    )
}
