#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use grc_core::ErrorCode;
use grc_core::config::{Config, resolve_config};
use output::{CliError, OutputMode};
use std::env;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "grc: compile production-flow notation into diagram-ready graphs",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Report format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Compile a document and export its graph",
        long_about = "Compile a flow document, simplify the graph, and emit it as Graphviz DOT or JSON.",
        after_help = "EXAMPLES:\n    # DOT to stdout\n    grc graph carrots.grc\n\n    # JSON without simplification\n    grc graph carrots.grc --export json --raw\n\n    # Render with Graphviz\n    grc graph carrots.grc -o carrots.dot && dot -Tsvg carrots.dot"
    )]
    Graph(cmd::graph::GraphArgs),

    #[command(
        about = "List the raw inputs of a document",
        after_help = "EXAMPLES:\n    grc manifest carrots.grc\n    grc manifest carrots.grc --format json"
    )]
    Manifest(cmd::manifest::ManifestArgs),

    #[command(
        about = "Compile documents and report failures",
        long_about = "Compile each document and report ok or the first error per file. Exits non-zero if any file fails.",
        after_help = "EXAMPLES:\n    grc check recipes/*.grc"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    grc completions bash\n\n    # Generate zsh completions\n    grc completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("GRC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "grc=debug,info"
        } else {
            "grc=info,warn"
        })
    });

    let format = env::var("GRC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(command: Commands, output: OutputMode, config: &Config) -> anyhow::Result<bool> {
    match command {
        Commands::Graph(args) => cmd::graph::run_graph(&args, config).map(|()| true),
        Commands::Manifest(args) => {
            cmd::manifest::run_manifest(&args, output, config).map(|()| true)
        }
        Commands::Check(args) => cmd::check::run_check(&args, output, config),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            let mut out = std::io::stdout().lock();
            cmd::completions::write_completions(args.shell, &mut command, &mut out).map(|()| true)
        }
    }
}

fn fail(output: OutputMode, error: &CliError) -> ExitCode {
    if output::render_error(output, error).is_err() {
        eprintln!("{}", error.headline());
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = output::resolve_output_mode(cli.format);

    let config = match env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|root| resolve_config(&root))
    {
        Ok(config) => config,
        Err(err) => return fail(output, &CliError::with_code(&err, ErrorCode::ConfigParseError)),
    };

    match run(cli.command, output, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => fail(output, &CliError::from(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_subcommand_parses_flags() {
        let cli = Cli::parse_from(["grc", "graph", "a.grc", "--export", "json", "--raw", "-o", "a.json"]);
        let Commands::Graph(args) = cli.command else {
            panic!("expected graph command");
        };
        assert_eq!(args.export, Some(cmd::graph::ExportArg::Json));
        assert!(args.raw);
        assert_eq!(args.output.as_deref(), Some(std::path::Path::new("a.json")));
    }

    #[test]
    fn format_flag_is_global() {
        let cli = Cli::parse_from(["grc", "manifest", "a.grc", "--format", "json"]);
        assert_eq!(cli.format, Some(OutputMode::Json));
        assert!(matches!(cli.command, Commands::Manifest(_)));
    }

    #[test]
    fn check_requires_a_file() {
        assert!(Cli::try_parse_from(["grc", "check"]).is_err());
        let cli = Cli::parse_from(["grc", "check", "a.grc", "b.grc"]);
        let Commands::Check(args) = cli.command else {
            panic!("expected check command");
        };
        assert_eq!(args.files.len(), 2);
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["grc", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }

    #[test]
    fn verbose_flag_parsed() {
        let cli = Cli::parse_from(["grc", "-v", "check", "a.grc"]);
        assert!(cli.verbose);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
