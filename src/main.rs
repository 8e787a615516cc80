//! stackup: local environment setup in parallel bundles.
//!
//! This is the entry point of the application. It parses command-line arguments,
//! loads configuration, and hands the resulting bundles to the parallel runner.

use std::collections::{HashMap, HashSet};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::{CommandFactory, Parser, Subcommand};
use crossterm::style::Stylize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use stackup::config;
use stackup::executor;
use stackup::output::{sanitize_text, OutputHistory};
use stackup::progress::ProgressBar;
use stackup::report::RunReport;
use stackup::{
    build_bundles, Bundle, BundleInput, ParallelRunner, ProcessHandle, RunOutcome, RunState,
    ShellConfig, ShellExecutor,
};

const DEFAULT_CONFIG: &str = "stackup.toml";
const DEFAULT_LOG_LEVEL: &str = "warn";
const LOG_ENV: &str = "STACKUP_LOG";
const FAILURE_TAIL_LINES: usize = 10;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "stackup",
    version,
    about = "Run local setup commands in parallel bundles",
    styles = help_styles(),
    color = clap::ColorChoice::Always,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Path to stackup.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ignore any stackup.toml in the current directory.
    #[arg(long)]
    no_config: bool,
    /// Print every finished command and its output instead of a progress bar.
    #[arg(short, long)]
    verbose: bool,
    /// Shell used to run commands (e.g. "bash -lc").
    #[arg(long)]
    shell: Option<String>,
    /// Working directory for every command.
    #[arg(long)]
    cwd: Option<PathBuf>,
    /// Write a JSON report of the run to this path.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Env entries (KEY=VAL) passed to every command.
    #[arg(long)]
    env: Vec<String>,
    /// Log filter when STACKUP_LOG is unset (e.g. "info", "stackup=debug").
    #[arg(long)]
    log_level: Option<String>,
    /// Bundle definitions: --bundle <name> <cmd> [<cmd>...]
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the configured bundles (default).
    Run,
    /// Show bundles and command order without running anything.
    List,
    /// Show help information.
    Help,
    /// Show version information.
    Version,
}

/// Runtime configuration derived from CLI arguments and the config file.
#[derive(Debug)]
struct RunSettings {
    verbose: bool,
    shell: ShellConfig,
    cwd: Option<PathBuf>,
    report: Option<PathBuf>,
    env: HashMap<String, String>,
    log_level: String,
    before: Vec<String>,
    bundles: Vec<(String, BundleInput)>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Help) => {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
        Some(Commands::Version) => {
            println!("stackup {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let settings = load_settings(&cli)?;
    init_logging(&settings.log_level);

    if matches!(cli.command, Some(Commands::List)) {
        let bundles = build_bundles(settings.bundles)?;
        print_bundles(&bundles);
        return Ok(());
    }
    run_setup(settings).await
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run_setup(settings: RunSettings) -> Result<()> {
    let shell = Arc::new(ShellExecutor::new(settings.shell).with_env(settings.env));
    let cwd = settings.cwd.as_deref();

    for step in &settings.before {
        eprintln!("{}", format_tool_message(&format!("before: {}", step)));
        executor::run_checked(&*shell, step, cwd, |outcome| {
            print_failure_tail(&outcome.output);
            Err(anyhow!(
                "before step `{}` exited with code {}",
                step,
                outcome.exit_code()
            ))
        })
        .await?;
    }

    let mut runner = ParallelRunner::new(shell, settings.bundles)?
        .verbose(settings.verbose)
        .on_complete(print_totals);
    if let Some(cwd) = &settings.cwd {
        runner = runner.with_cwd(cwd);
    }
    if settings.verbose {
        runner = runner.on_exit(print_completion);
    } else if std::io::stderr().is_terminal() {
        runner = runner.with_progress(Box::new(ProgressBar::stderr()));
    }

    let outcome = runner.run().await;
    print_failures(&outcome);

    if let Some(path) = &settings.report {
        RunReport::from_outcome(&outcome).write_to(path)?;
        eprintln!(
            "{}",
            format_tool_message(&format!("report written to {}", path.display()))
        );
    }

    if !outcome.success() {
        bail!("{} command(s) failed", outcome.state.errors().len());
    }
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<RunSettings> {
    let mut config = config::Config::default();
    if !cli.no_config {
        let config_path = cli.config.clone().or_else(default_config_path);
        if let Some(path) = config_path {
            config = config::load_config(&path)?;
        }
    }

    let mut bundles = config.bundle_inputs();
    if !cli.args.is_empty() {
        bundles.extend(parse_cli_bundles(&cli.args)?);
    }
    ensure_unique_names(&bundles)?;

    let shell = match cli.shell.as_deref().or(config.shell.as_deref()) {
        Some(raw) => ShellConfig::parse(raw)?,
        None => ShellConfig::default(),
    };
    let mut env = config.env;
    for entry in &cli.env {
        let (key, value) = split_env(entry)?;
        env.insert(key, value);
    }

    Ok(RunSettings {
        verbose: cli.verbose || config.verbose.unwrap_or(false),
        shell,
        cwd: cli.cwd.clone().or(config.cwd.map(PathBuf::from)),
        report: cli.report.clone().or(config.report.map(PathBuf::from)),
        env,
        log_level: cli
            .log_level
            .clone()
            .or(config.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        before: config.before,
        bundles,
    })
}

fn default_config_path() -> Option<PathBuf> {
    let path = Path::new(DEFAULT_CONFIG);
    if path.exists() {
        Some(path.to_path_buf())
    } else {
        None
    }
}

fn parse_cli_bundles(args: &[String]) -> Result<Vec<(String, BundleInput)>> {
    let mut bundles = Vec::new();
    let mut idx = 0;
    while idx < args.len() {
        if args[idx] != "--bundle" {
            bail!("expected --bundle, got {}", args[idx]);
        }
        idx += 1;
        let name = args
            .get(idx)
            .ok_or_else(|| anyhow!("missing name after --bundle"))?
            .clone();
        idx += 1;
        let mut commands = Vec::new();
        while idx < args.len() && args[idx] != "--bundle" {
            commands.push(args[idx].clone());
            idx += 1;
        }
        if commands.is_empty() {
            bail!("bundle {} has no commands", name);
        }
        bundles.push((name, BundleInput::Commands(commands)));
    }
    Ok(bundles)
}

fn ensure_unique_names(bundles: &[(String, BundleInput)]) -> Result<()> {
    let mut seen = HashSet::new();
    for (name, _) in bundles {
        if !seen.insert(name.as_str()) {
            bail!("duplicate bundle name: {}", name);
        }
    }
    Ok(())
}

fn split_env(value: &str) -> Result<(String, String)> {
    let (key, val) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid env {}, expected KEY=VALUE", value))?;
    Ok((key.to_string(), val.to_string()))
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}

fn format_tool_message(text: &str) -> String {
    format!("◆ stackup: {}", text)
}

fn format_handle_line(bundle: &str, handle: &ProcessHandle) -> String {
    let code = handle.exit_code().unwrap_or(1);
    let status = match handle.signal() {
        Some(signal) => format!("signal {}", signal),
        None => format!("exit {}", code),
    };
    format!(
        "[{}] {} › {} ({})",
        handle.index(),
        bundle,
        handle.command(),
        status
    )
}

// Verbose per-exit output. Interleaving across bundles is best-effort.
fn print_completion(bundle: &Bundle, handle: &ProcessHandle, state: &RunState) {
    let line = format_handle_line(bundle.key(), handle);
    if handle.exit_code() == Some(0) {
        println!("{} {}", "✔".green(), line);
    } else {
        println!("{} {}", "✘".red(), line.red());
    }
    if let Some(history) = state.output_for(handle.command()) {
        for text in history.lines() {
            println!("    {}", text);
        }
    }
}

fn print_failure_tail(history: &OutputHistory) {
    for line in history.tail(FAILURE_TAIL_LINES) {
        eprintln!("    {}", sanitize_text(line, true));
    }
}

fn format_totals(state: &RunState) -> String {
    format!(
        "{} of {} commands succeeded, {} failed",
        state.successful().len(),
        state.exited().len(),
        state.errors().len()
    )
}

// Final callback: runs once, after every command has exited.
fn print_totals(state: &RunState) {
    let totals = format_tool_message(&format_totals(state));
    if state.errors().is_empty() {
        eprintln!("{}", totals.green());
    } else {
        eprintln!("{}", totals.red());
    }
}

fn print_failures(outcome: &RunOutcome) {
    for bundle in &outcome.bundles {
        for handle in bundle.handles() {
            if !outcome.state.errors().contains(&handle.index()) {
                continue;
            }
            eprintln!("{} {}", "✘".red(), format_handle_line(bundle.key(), handle));
            if let Some(history) = outcome.state.output_for(handle.command()) {
                print_failure_tail(history);
            }
        }
    }
}

fn print_bundles(bundles: &[Bundle]) {
    for bundle in bundles {
        println!("{}", bundle.key().bold());
        for handle in bundle.handles() {
            println!("  [{}] {}", handle.index(), handle.command());
        }
    }
}
