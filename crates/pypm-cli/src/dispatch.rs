use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use pypm_core::{CancelToken, CoreError, FailureCategory, MirrorConfig, Outcome, TerminalState};
use pypm_engine::{Intent, Session};
use pypm_index::{default_config_root, IndexClientOptions, MirrorStore, PypiIndexClient};
use pypm_installer::{Installer, PipInstaller, WhichResolver};
use serde::Serialize;
use tracing::debug;

use crate::completion::write_completions_script;
use crate::render::{
    format_environment_lines, format_inventory_lines, format_mirror_lines, format_outcome_lines,
    format_outdated_lines, outcome_status, OutputStyle, TerminalRenderer,
};
use crate::{Cli, Commands, MirrorCommands};

/// Session knobs shared by every command that touches an environment.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionOptions {
    pub(crate) python: Option<String>,
    pub(crate) mirror: Option<String>,
    pub(crate) timeout: Option<u64>,
    pub(crate) config_dir: Option<PathBuf>,
    pub(crate) cancel: CancelToken,
}

#[derive(Debug, Serialize)]
struct EnvironmentRow<'a> {
    position: usize,
    label: &'a str,
    executable: String,
    selected: bool,
}

#[derive(Debug, Serialize)]
struct OutdatedRow {
    name: String,
    installed: Option<String>,
    latest: String,
}

pub(crate) fn run_cli(cli: Cli, style: OutputStyle, cancel: CancelToken) -> Result<ExitCode> {
    let renderer = TerminalRenderer::from_style(style);
    let options = SessionOptions {
        python: cli.python,
        mirror: cli.mirror,
        timeout: cli.timeout,
        config_dir: cli.config_dir,
        cancel,
    };

    match cli.command {
        Commands::Version => {
            println!("pypm {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            let mut stdout = io::stdout().lock();
            write_completions_script(shell, &mut stdout)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Mirror { command } => {
            let store = mirror_store(options.config_dir.as_deref())?;
            run_mirror_command(&store, command, renderer)
        }
        Commands::Envs { json } => {
            let session = open_session(&options)?;
            run_envs_command(&session, json, renderer)
        }
        Commands::List { json } => {
            let session = open_session(&options)?;
            run_list_command(&session, json, renderer)
        }
        Commands::Check { name } => {
            let session = open_session(&options)?;
            run_check_command(&session, &name, renderer)
        }
        Commands::Get { name, yes } => {
            let session = open_session(&options)?;
            run_get_command(&session, &name, yes, renderer)
        }
        Commands::Uninstall { name, yes } => {
            let session = open_session(&options)?;
            run_uninstall_command(&session, &name, yes, renderer)
        }
        Commands::Outdated { json } => {
            let session = open_session(&options)?;
            run_outdated_command(&session, json, renderer)
        }
        Commands::Versions { name } => {
            let session = open_session(&options)?;
            run_versions_command(&session, &name, renderer)
        }
    }
}

pub(crate) fn mirror_store(config_dir: Option<&Path>) -> Result<MirrorStore> {
    let root = match config_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_config_root()?,
    };
    Ok(MirrorStore::new(root))
}

fn open_session(options: &SessionOptions) -> Result<Session> {
    let store = mirror_store(options.config_dir.as_deref())?;
    let catalog = store.load_catalog()?;
    let timeout = options.timeout.map(Duration::from_secs);

    let installer: Arc<dyn Installer> = Arc::new(
        PipInstaller::new()
            .with_timeout(timeout)
            .with_cancel_token(options.cancel.clone()),
    );
    let mut index_options = IndexClientOptions::default();
    if timeout.is_some() {
        index_options.timeout = timeout;
    }
    let index = PypiIndexClient::new(Arc::clone(&installer), index_options)
        .context("failed to set up package index client")?;

    let mut session = Session::discover(&WhichResolver, catalog, installer, Arc::new(index));
    if let Some(selector) = options.python.as_deref() {
        session.select_environment(selector)?;
    }
    if let Some(mirror) = options.mirror.as_deref() {
        session.select_mirror(mirror)?;
    }
    debug!(
        environment = %session.environment(),
        mirror = %session.mirror().name,
        "session ready"
    );
    Ok(session)
}

/// Runs `work` on a worker thread while the spinner animates.
fn with_spinner<T, F>(renderer: TerminalRenderer, label: &str, work: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    let spinner = renderer.start_spinner(label);
    let joined = thread::scope(|scope| scope.spawn(work).join());
    spinner.finish();
    match joined {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn run_envs_command(
    session: &Session,
    json: bool,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    let selected = session.environment();
    if json {
        let rows = session
            .environments()
            .iter()
            .enumerate()
            .map(|(index, environment)| EnvironmentRow {
                position: index + 1,
                label: environment.label(),
                executable: environment.executable().display().to_string(),
                selected: environment == selected,
            })
            .collect::<Vec<_>>();
        print_json(&rows)?;
        return Ok(ExitCode::SUCCESS);
    }

    renderer.print_section("environments");
    renderer.print_lines(&format_environment_lines(session.environments(), selected));
    Ok(ExitCode::SUCCESS)
}

fn run_list_command(
    session: &Session,
    json: bool,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    let scanned = with_spinner(renderer, "scanning installed packages", || session.refresh());
    let inventory = match scanned {
        Ok(inventory) => inventory,
        Err(err) => return Ok(report_failure(renderer, &err)),
    };

    if json {
        print_json(inventory.packages())?;
        return Ok(ExitCode::SUCCESS);
    }

    renderer.print_section(&session.environment().to_string());
    if inventory.is_empty() {
        renderer.print_status("ok", "no packages installed");
    } else {
        renderer.print_lines(&format_inventory_lines(&inventory));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_check_command(
    session: &Session,
    name: &str,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    let result = with_spinner(renderer, "checking", || {
        session.refresh()?;
        session.request(name, &mut Intent::CheckOnly)
    });

    match &result {
        Ok(outcome) => {
            renderer.print_status(outcome_status(&result), &check_message(outcome));
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Ok(report_failure(renderer, err)),
    }
}

fn run_get_command(
    session: &Session,
    name: &str,
    assume_yes: bool,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    let intent = if assume_yes {
        Intent::Apply
    } else {
        Intent::CheckOnly
    };
    let first = with_spinner(renderer, "resolving", || {
        let mut intent = intent;
        session.refresh()?;
        session.request(name, &mut intent)
    });

    let needs_answer = matches!(
        &first,
        Ok(outcome) if matches!(
            outcome.state,
            TerminalState::DeclinedInstall | TerminalState::DeclinedUpdate
        )
    );
    if assume_yes || !needs_answer {
        return Ok(print_outcome(renderer, &first));
    }

    let question = match &first {
        Ok(outcome) if outcome.state == TerminalState::DeclinedUpdate => format!(
            "Update {name} from {} to {} in {}?",
            outcome.installed_version.as_deref().unwrap_or("?"),
            outcome.latest_version.as_deref().unwrap_or("?"),
            session.environment().label()
        ),
        _ => format!("Install {name} into {}?", session.environment().label()),
    };
    if !confirm(&question)? {
        return Ok(print_outcome(renderer, &first));
    }

    let label = match &first {
        Ok(outcome) if outcome.state == TerminalState::DeclinedUpdate => "updating",
        _ => "installing",
    };
    let applied = with_spinner(renderer, label, || session.request(name, &mut Intent::Apply));
    Ok(print_outcome(renderer, &applied))
}

fn run_uninstall_command(
    session: &Session,
    name: &str,
    assume_yes: bool,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    let scanned = with_spinner(renderer, "scanning installed packages", || session.refresh());
    if let Err(err) = scanned {
        return Ok(report_failure(renderer, &err));
    }

    let environment = session.environment();
    if !assume_yes
        && session.inventory_cache().contains(environment, name)
        && !confirm(&format!("Uninstall {name} from {}?", environment.label()))?
    {
        renderer.print_status("ok", &format!("{name} left installed"));
        return Ok(ExitCode::SUCCESS);
    }

    let result = with_spinner(renderer, "uninstalling", || session.uninstall(name));
    Ok(print_outcome(renderer, &result))
}

fn run_outdated_command(
    session: &Session,
    json: bool,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    let (scanned, outdated) = with_spinner(renderer, "checking for updates", || {
        (session.refresh(), session.outdated())
    });
    let outdated = match outdated {
        Ok(outdated) => outdated,
        Err(err) => return Ok(report_failure(renderer, &err)),
    };

    let inventory = scanned.ok();
    let rows = outdated
        .into_iter()
        .map(|(name, latest)| OutdatedRow {
            installed: inventory
                .as_ref()
                .and_then(|inventory| inventory.find(&name))
                .map(|record| record.version.clone()),
            name,
            latest,
        })
        .collect::<Vec<_>>();

    if json {
        print_json(&rows)?;
        return Ok(ExitCode::SUCCESS);
    }

    if rows.is_empty() {
        renderer.print_status(
            "ok",
            &format!("all packages are up to date on {}", session.mirror().name),
        );
        return Ok(ExitCode::SUCCESS);
    }
    renderer.print_section(&format!("updates on {}", session.mirror().name));
    let lines = rows
        .into_iter()
        .map(|row| (row.name, row.installed, row.latest))
        .collect::<Vec<_>>();
    renderer.print_lines(&format_outdated_lines(&lines));
    Ok(ExitCode::SUCCESS)
}

fn run_versions_command(
    session: &Session,
    name: &str,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    let result = with_spinner(renderer, "querying index", || session.available_versions(name));
    match result {
        Ok(versions) => {
            renderer.print_section(&format!("{} on {}", versions.name, session.mirror().name));
            println!("latest: {}", versions.latest);
            println!("available: {}", versions.versions.join(", "));
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Ok(report_failure(renderer, &err)),
    }
}

fn run_mirror_command(
    store: &MirrorStore,
    command: MirrorCommands,
    renderer: TerminalRenderer,
) -> Result<ExitCode> {
    match command {
        MirrorCommands::List => {
            let catalog = store.load_catalog()?;
            renderer.print_section("mirrors");
            renderer.print_lines(&format_mirror_lines(catalog.mirrors(), catalog.default_mirror()));
        }
        MirrorCommands::Add { name, index_url } => {
            store.add_mirror(MirrorConfig::new(name.as_str(), index_url))?;
            renderer.print_status("ok", &format!("added mirror {name}"));
        }
        MirrorCommands::Remove { name } => {
            store.remove_mirror(&name)?;
            renderer.print_status("ok", &format!("removed mirror {name}"));
        }
        MirrorCommands::Default { name } => {
            store.set_default(name.as_deref())?;
            let catalog = store.load_catalog()?;
            renderer.print_status(
                "ok",
                &format!("default mirror is now {}", catalog.default_mirror().name),
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_outcome(renderer: TerminalRenderer, result: &Result<Outcome, CoreError>) -> ExitCode {
    let lines = format_outcome_lines(result, renderer.style());
    match result {
        Ok(_) => {
            renderer.print_lines(&lines);
            ExitCode::SUCCESS
        }
        Err(err) => {
            for line in lines {
                eprintln!("{line}");
            }
            exit_code_for(err)
        }
    }
}

fn report_failure(renderer: TerminalRenderer, err: &CoreError) -> ExitCode {
    print_outcome(renderer, &Err(err.clone()))
}

pub(crate) fn exit_code_for(err: &CoreError) -> ExitCode {
    ExitCode::from(exit_status(err))
}

pub(crate) fn exit_status(err: &CoreError) -> u8 {
    match err.category() {
        FailureCategory::Usage => 2,
        _ => 1,
    }
}

/// Status for errors that escaped a command as `anyhow`, such as a bad
/// `--python` selector or an invalid mirror definition.
pub(crate) fn exit_status_for_error(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CoreError>())
        .map_or(1, exit_status)
}

/// Wording for `pypm check`, where nothing is ever changed.
pub(crate) fn check_message(outcome: &Outcome) -> String {
    let name = &outcome.name;
    match outcome.state {
        TerminalState::DeclinedInstall => format!("{name} is not installed"),
        TerminalState::DeclinedUpdate => format!(
            "{name} {} is installed; {} is available",
            outcome.installed_version.as_deref().unwrap_or("?"),
            outcome.latest_version.as_deref().unwrap_or("?")
        ),
        _ => outcome.message(),
    }
}

pub(crate) fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn confirm(question: &str) -> Result<bool> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{question} [y/N] ").context("failed writing prompt")?;
    stdout.flush().context("failed flushing prompt")?;
    drop(stdout);

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed reading answer")?;
    Ok(parse_confirmation(&answer))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(value).context("failed to render output as json")?;
    println!("{rendered}");
    Ok(())
}
