pub mod check;
pub mod completions;
pub mod graph;
pub mod manifest;

use anyhow::{Context, Result};
use grc_core::{Compiled, Document};
use std::path::Path;
use tracing::debug;

/// Read and compile one flow document.
///
/// Errors carry `path` and, for line-level failures, the source line, so
/// the rendered message reads `recipe.grc:7: line 3: ...`.
pub fn compile_file(path: &Path, simplify: bool) -> Result<Compiled> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let document = Document::parse(&text).with_context(|| path.display().to_string())?;
    let compiled = document.compile(simplify).map_err(|err| {
        let location = err
            .line()
            .and_then(|line| document.source_line(line))
            .map_or_else(
                || path.display().to_string(),
                |line| format!("{}:{line}", path.display()),
            );
        anyhow::Error::new(err).context(location)
    })?;

    debug!(
        file = %path.display(),
        nodes = compiled.graph.node_count(),
        edges = compiled.graph.edge_count(),
        "compiled document"
    );
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CliError;
    use tempfile::TempDir;

    #[test]
    fn builder_errors_point_at_source_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.grc");
        std::fs::write(&path, "name: Bad\n----\nflour\n\nflour | sift\nsugar | melt\n").unwrap();

        let err = compile_file(&path, true).unwrap_err();
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E3002"));
        assert!(cli.message.contains("bad.grc:6: line 3"), "{}", cli.message);
    }

    #[test]
    fn missing_file_has_no_code() {
        let dir = TempDir::new().unwrap();
        let err = compile_file(&dir.path().join("absent.grc"), true).unwrap_err();
        assert!(CliError::from(&err).error_code.is_none());
    }
}
