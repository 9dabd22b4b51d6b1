mod completion;
mod dispatch;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use pypm_core::CancelToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::completion::CliCompletionShell;
use crate::dispatch::{exit_status_for_error, run_cli};
use crate::render::{current_output_style, render_status_line};

const LOG_ENV: &str = "PYPM_LOG";

#[derive(Parser, Debug)]
#[command(name = "pypm")]
#[command(about = "Manage packages across local Python installations", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Environment to use: a label, an interpreter path, or #N from `pypm envs`.
    #[arg(long, global = true, value_name = "ENV")]
    python: Option<String>,
    /// Package index mirror to use for this run.
    #[arg(long, global = true, value_name = "NAME")]
    mirror: Option<String>,
    /// Bound every index probe and installer run, in seconds.
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,
    /// Disable badges, colors and spinners.
    #[arg(long, global = true)]
    plain: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List discovered Python installations.
    Envs {
        #[arg(long)]
        json: bool,
    },
    /// List installed packages of the selected environment.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Report whether a package is installed and current, without changing it.
    Check { name: String },
    /// Install a package, or update it when a newer release exists.
    Get {
        name: String,
        /// Answer yes to the install or update offer.
        #[arg(short, long)]
        yes: bool,
    },
    Uninstall {
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// List installed packages with newer releases on the selected mirror.
    Outdated {
        #[arg(long)]
        json: bool,
    },
    /// List the versions the selected mirror offers for a package.
    Versions { name: String },
    Mirror {
        #[command(subcommand)]
        command: MirrorCommands,
    },
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
    Version,
}

#[derive(Subcommand, Debug)]
enum MirrorCommands {
    List,
    Add {
        name: String,
        index_url: String,
    },
    Remove {
        name: String,
    },
    /// Set the default mirror; without a name, restore the built-in default.
    Default {
        name: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let style = current_output_style(cli.plain);
    let cancel = install_interrupt_handler();
    match run_cli(cli, style, cancel) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", render_status_line(style, "error", &format!("{err:#}")));
            ExitCode::from(exit_status_for_error(&err))
        }
    }
}

/// The first Ctrl-C kills any running pip child and lets the command report
/// it; a second one exits straight away.
fn install_interrupt_handler() -> CancelToken {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    let installed = ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        handler_token.cancel();
    });
    if let Err(err) = installed {
        warn!(error = %err, "failed to install Ctrl-C handler");
    }
    cancel
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
