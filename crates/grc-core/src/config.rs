use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project config file name, looked up in the working directory.
pub const PROJECT_CONFIG: &str = "grc.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_true")]
    pub simplify: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            simplify: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_comment_wrap")]
    pub comment_wrap: usize,
    #[serde(default = "default_rankdir")]
    pub rankdir: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            comment_wrap: default_comment_wrap(),
            rankdir: default_rankdir(),
        }
    }
}

/// Export format for `grc graph`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Dot,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: ExportFormat,
}

/// A config file with every field optional, used for layering.
#[derive(Debug, Clone, Default, Deserialize)]
struct PartialConfig {
    #[serde(default)]
    graph: PartialGraph,
    #[serde(default)]
    render: PartialRender,
    #[serde(default)]
    output: PartialOutput,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PartialGraph {
    simplify: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PartialRender {
    comment_wrap: Option<usize>,
    rankdir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PartialOutput {
    format: Option<ExportFormat>,
}

impl Config {
    fn apply(&mut self, layer: PartialConfig) {
        if let Some(simplify) = layer.graph.simplify {
            self.graph.simplify = simplify;
        }
        if let Some(width) = layer.render.comment_wrap {
            self.render.comment_wrap = width;
        }
        if let Some(rankdir) = layer.render.rankdir {
            self.render.rankdir = rankdir;
        }
        if let Some(format) = layer.output.format {
            self.output.format = format;
        }
    }
}

fn load_layer(path: &Path) -> Result<Option<PartialConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<PartialConfig>(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Path of the per-user config file, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("grc/config.toml"))
}

/// Load config from explicit layer paths; later paths win field by field.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read or parsed.
pub fn load_from(paths: &[PathBuf]) -> Result<Config> {
    let mut config = Config::default();
    for path in paths {
        if let Some(layer) = load_layer(path)? {
            config.apply(layer);
        }
    }
    Ok(config)
}

/// Resolve user config, then `grc.toml` in `project_root`.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read or parsed.
pub fn resolve_config(project_root: &Path) -> Result<Config> {
    let mut paths: Vec<PathBuf> = user_config_path().into_iter().collect();
    paths.push(project_root.join(PROJECT_CONFIG));
    load_from(&paths)
}

const fn default_true() -> bool {
    true
}

const fn default_comment_wrap() -> usize {
    30
}

fn default_rankdir() -> String {
    "TB".to_string()
}
