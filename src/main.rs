//! testredundancy CLI - find Go tests that add no per-function coverage.

use std::io::{stdout, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use testredundancy::cli::{Cli, Command, FindArgs, FuncsArgs, MergeArgs};
use testredundancy::config::Config;
use testredundancy::core::progress::create_spinner;
use testredundancy::core::{CancellationToken, Result};
use testredundancy::coverage::{BlockSet, FunctionMap, Profile};
use testredundancy::golang::{GoConfig, GoToolchain};
use testredundancy::output::Format;
use testredundancy::pipeline::find_go;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_default(&cli.path)?,
    };
    let format = Format::from(cli.format);

    match &cli.command {
        Command::Find(args) => run_find(&cli.path, &mut config, args, format),
        Command::Merge(args) => run_merge(&config, args),
        Command::Funcs(args) => run_funcs(&cli.path, &config, args, format),
    }
}

fn run_find(root: &Path, config: &mut Config, args: &FindArgs, format: Format) -> Result<()> {
    args.apply(config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let report = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping test runs");
                on_signal.cancel();
            }
        });
        find_go(config, root, &cancel).await
    })?;

    format.write_report(&report, &mut stdout())
}

fn run_merge(config: &Config, args: &MergeArgs) -> Result<()> {
    let contents = args
        .files
        .iter()
        .map(std::fs::read_to_string)
        .collect::<std::io::Result<Vec<_>>>()?;
    let merged = Profile::merge_contents(&contents, &config.filter())?;
    if merged.skipped > 0 {
        tracing::warn!("Skipped {} malformed coverage lines", merged.skipped);
    }

    let text = merged.render();
    match &args.output {
        Some(path) => {
            std::fs::write(path, text)?;
            tracing::info!(
                "Merged {} profiles into {} ({} blocks)",
                args.files.len(),
                path.display(),
                merged.blocks.len()
            );
        }
        None => stdout().write_all(text.as_bytes())?,
    }
    Ok(())
}

fn run_funcs(root: &Path, config: &Config, args: &FuncsArgs, format: Format) -> Result<()> {
    let text = std::fs::read_to_string(&args.profile)?;
    let coverage = BlockSet::load_from_record(&text, &config.filter())?;

    let toolchain = GoToolchain::new(GoConfig {
        project_dir: root.to_path_buf(),
        ..GoConfig::default()
    })?;
    let module_root = toolchain.module_root()?;

    let spinner = create_spinner("Mapping functions...");
    let map = FunctionMap::build(&module_root);
    spinner.finish_and_clear();
    let map = map?;

    let functions = coverage.function_coverage(&map);
    format.write_function_coverage(&functions, coverage.percent(), &mut stdout())
}
