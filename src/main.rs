use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use diffcov::cli::cmd_diff_coverage;
use diffcov::config::{CliOverrides, Config};
use diffcov::detect::Format;
use diffcov::diff::{DiffSource, GitDiff, PatchFile};
use diffcov::report::OutputFormat;

/// diffcov — coverage of the lines a patch adds.
#[derive(Parser, Debug)]
#[command(name = "diffcov", version, about)]
struct Cli {
    /// Unified diff to measure. Use `-` to read it from stdin.
    #[arg(required_unless_present = "git_diff", conflicts_with = "git_diff")]
    patch: Option<PathBuf>,

    /// Compute the diff with `git diff <ARGS>` instead, e.g. "main" or "HEAD~1".
    #[arg(long, value_name = "ARGS")]
    git_diff: Option<String>,

    /// Also report files whose added lines are all covered.
    #[arg(long)]
    show_all: bool,

    /// Coverage data: LCOV, Cobertura XML or a SQLite coverage store
    /// (default: lcov.info in the root directory).
    #[arg(long, value_name = "PATH")]
    coverage_file: Option<PathBuf>,

    /// Override coverage format detection (lcov, cobertura, sqlite).
    #[arg(long, value_name = "FORMAT")]
    coverage_format: Option<String>,

    /// Report to use from a coverage store. If omitted, uses the most recent.
    #[arg(long)]
    report: Option<String>,

    /// Where to write the rendered report (default: diffcoverage.html).
    #[arg(long, value_name = "PATH")]
    output_file: Option<PathBuf>,

    /// Report format. If omitted, inferred from the output file extension.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Settings file (default: .diffcov.toml in the root directory, if present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory diff paths are relative to (default: current directory).
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Skip changed files whose path contains TEXT. Repeatable.
    #[arg(long, value_name = "TEXT")]
    ignore: Vec<String>,

    /// Skip changed files whose path matches REGEX. Repeatable.
    #[arg(long, value_name = "REGEX")]
    ignore_regex: Vec<String>,

    /// Do not apply the built-in ignore patterns.
    #[arg(long)]
    no_default_ignores: bool,

    /// Prefix prepended to diff paths before looking them up in the
    /// coverage data.
    #[arg(long)]
    path_prefix: Option<String>,

    /// Log debug output to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(summary) => {
            print!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("diffcov: error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("DIFFCOV_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<String> {
    let coverage_format = cli
        .coverage_format
        .as_deref()
        .map(str::parse::<Format>)
        .transpose()?;

    let overrides = CliOverrides {
        config_path: cli.config,
        root: cli.root,
        coverage_path: cli.coverage_file,
        coverage_format,
        report: cli.report,
        output_path: cli.output_file,
        output_format: cli.format,
        show_all: cli.show_all,
        ignore: cli.ignore,
        ignore_regex: cli.ignore_regex,
        no_default_ignores: cli.no_default_ignores,
        path_prefix: cli.path_prefix,
    };
    let config = Config::load(&overrides)?;

    let source: Box<dyn DiffSource> = match (cli.git_diff, cli.patch) {
        (Some(args), _) => Box::new(GitDiff { args }),
        (None, Some(path)) => Box::new(PatchFile { path }),
        (None, None) => anyhow::bail!("a patch file or --git-diff is required"),
    };

    cmd_diff_coverage(&config, source.as_ref())
}
