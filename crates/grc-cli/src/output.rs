//! Shared output layer for pretty/text/JSON parity across CLI commands.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` flag
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.
//!
//! Graph exports (DOT, JSON) are payloads, not reports, and bypass this layer.

use clap::ValueEnum;
use grc_core::{ErrorCode, FlowError};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Width of the dashed rule under pretty report headings.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Dashed rule, [`PRETTY_RULE_WIDTH`] wide.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Heading line, such as a document name, underlined by a rule.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// `key:` padded to a fixed column, then `value`; used for manifest entries.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<16} {}", format!("{key}:"), value.as_ref())
}

/// How `manifest` and `check` reports and errors are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Headings and aligned columns for a terminal.
    Pretty,
    /// One tab-separated record per line.
    Text,
    /// The report struct serialized as JSON.
    Json,
}

/// Pick a mode from the flag, the `FORMAT` value and whether stdout is a
/// terminal.
fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    format_env: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }

    if let Some(val) = format_env {
        match val.to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {} // ignored
        }
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// [`resolve_output_mode_inner`] against the live environment.
pub fn resolve_output_mode(format_flag: Option<OutputMode>) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(format_flag, env_val.as_deref(), is_tty)
}

/// Write a report to stdout: JSON is serialized directly, the other modes
/// go through their writer.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// A structured error with optional suggestion and error code.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E3002").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Attach a known code to an error that carries none of its own.
    pub fn with_code(err: &anyhow::Error, code: ErrorCode) -> Self {
        Self {
            message: format!("{err:#}"),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }

    /// `error[E####]: message` or `error: message`.
    pub fn headline(&self) -> String {
        match &self.error_code {
            Some(code) => format!("error[{code}]: {}", self.message),
            None => format!("error: {}", self.message),
        }
    }
}

/// Convert an `anyhow` error, surfacing the code of a wrapped [`FlowError`].
impl From<&anyhow::Error> for CliError {
    fn from(err: &anyhow::Error) -> Self {
        let Some(flow) = err.downcast_ref::<FlowError>() else {
            return Self {
                message: format!("{err:#}"),
                suggestion: None,
                error_code: None,
            };
        };

        // Context layers go first; the flow error already prints its source.
        let outer = err.to_string();
        let inner = flow.to_string();
        let message = if outer == inner {
            inner
        } else {
            format!("{outer}: {inner}")
        };
        Self {
            message,
            suggestion: flow.hint().map(str::to_string),
            error_code: Some(flow.code().code().to_string()),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            writeln!(out, "{}", error.headline())?;
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  hint: {suggestion}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    // ── OutputMode ──────────────────────────────────────────────────────────

    #[test]
    fn resolve_format_flag_wins_over_env() {
        let mode = resolve_output_mode_inner(Some(OutputMode::Text), Some("pretty"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn resolve_format_env_json() {
        let mode = resolve_output_mode_inner(None, Some("json"), false);
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn resolve_format_env_case_insensitive() {
        let mode = resolve_output_mode_inner(None, Some("PRETTY"), false);
        assert_eq!(mode, OutputMode::Pretty);
    }

    #[test]
    fn resolve_format_env_unknown_falls_through_to_tty() {
        assert_eq!(
            resolve_output_mode_inner(None, Some("fancy"), true),
            OutputMode::Pretty
        );
        assert_eq!(
            resolve_output_mode_inner(None, Some("fancy"), false),
            OutputMode::Text
        );
    }

    #[test]
    fn resolve_default_no_tty_is_text() {
        assert_eq!(resolve_output_mode_inner(None, None, false), OutputMode::Text);
    }

    // ── CliError ────────────────────────────────────────────────────────────

    #[test]
    fn flow_error_code_survives_context() {
        let result: Result<(), FlowError> = Err(FlowError::EmptyFlow);
        let err = result.context("soup.grc").unwrap_err();

        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E1003"));
        assert_eq!(cli.message, "soup.grc: document has no flow lines");
        assert!(cli.suggestion.is_some());
        assert!(cli.headline().starts_with("error[E1003]: soup.grc"));
    }

    #[test]
    fn plain_errors_have_no_code() {
        let err = anyhow::anyhow!("could not read file");
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code, None);
        assert_eq!(cli.headline(), "error: could not read file");
    }

    #[test]
    fn with_code_sets_hint_from_code() {
        let err = anyhow::anyhow!("Failed to parse grc.toml");
        let cli = CliError::with_code(&err, ErrorCode::ConfigParseError);
        assert_eq!(cli.error_code.as_deref(), Some("E1001"));
        assert_eq!(cli.suggestion.as_deref(), ErrorCode::ConfigParseError.hint());
    }

    #[test]
    fn error_json_shape() {
        let cli = CliError {
            message: "boom".to_string(),
            suggestion: None,
            error_code: Some("E2001".to_string()),
        };
        let json = serde_json::to_value(&cli).unwrap();
        assert_eq!(json["message"], "boom");
        assert_eq!(json["error_code"], "E2001");
        assert!(json.get("suggestion").is_none());
    }
}
