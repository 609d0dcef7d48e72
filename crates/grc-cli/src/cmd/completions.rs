use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use clap_complete::{Shell, generate};

/// Name the scripts complete, independent of the package name.
const BIN_NAME: &str = "grc";

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to emit a completion script for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Emit the `shell` completion script for `command` into `out`.
///
/// # Errors
///
/// Returns an error if `out` cannot be flushed.
pub fn write_completions(
    shell: Shell,
    command: &mut clap::Command,
    out: &mut dyn Write,
) -> Result<()> {
    generate(shell, command, BIN_NAME, out);
    out.flush().context("Failed to write completion script")
}
