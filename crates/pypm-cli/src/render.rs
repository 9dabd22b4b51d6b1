use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use pypm_core::{
    CoreError, Environment, FailureCategory, Inventory, MirrorConfig, OperationResult, Outcome,
    RefreshStatus,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn resolve_output_style(
    stdout_is_tty: bool,
    no_color: bool,
    forced_plain: bool,
) -> OutputStyle {
    if stdout_is_tty && !no_color && !forced_plain {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn current_output_style(forced_plain: bool) -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    resolve_output_style(std::io::stdout().is_terminal(), no_color, forced_plain)
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match (style, status) {
        (OutputStyle::Plain, "ok") => message.to_string(),
        (OutputStyle::Plain, "warn") => format!("warning: {message}"),
        (OutputStyle::Plain, _) => format!("error: {message}"),
        (OutputStyle::Rich, "ok") => format!("[OK] {message}"),
        (OutputStyle::Rich, "warn") => format!("[WARN] {message}"),
        (OutputStyle::Rich, _) => format!("[ERR] {message}"),
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

/// Spinner shown while a blocking call runs on a worker thread.
pub(crate) struct TerminalSpinner {
    progress_bar: Option<ProgressBar>,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        let line = render_status_line(self.style, status, message);
        match self.style {
            OutputStyle::Plain => println!("{line}"),
            OutputStyle::Rich => println!("{}", colorize_badge(status, &line)),
        }
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Rich {
            println!("{}", colorize(section_style(), &format!("== {title} ==")));
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_spinner(self, label: &str) -> TerminalSpinner {
        if self.style == OutputStyle::Plain {
            return TerminalSpinner { progress_bar: None };
        }

        let progress_bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
            progress_bar.set_style(style.tick_chars("\\|/- "));
        }
        progress_bar.set_message(label.to_string());
        progress_bar.enable_steady_tick(Duration::from_millis(80));
        TerminalSpinner {
            progress_bar: Some(progress_bar),
        }
    }
}

impl TerminalSpinner {
    pub(crate) fn finish(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

/// Status badge for a finished request: `ok`, or `warn` when the package list
/// could not be refreshed afterwards, or `error`.
pub(crate) fn outcome_status(result: &Result<Outcome, CoreError>) -> &'static str {
    match result {
        Ok(outcome) if matches!(outcome.refresh, RefreshStatus::Failed(_)) => "warn",
        Ok(_) => "ok",
        Err(_) => "error",
    }
}

pub(crate) fn format_outcome_lines(
    result: &Result<Outcome, CoreError>,
    style: OutputStyle,
) -> Vec<String> {
    let rendered = OperationResult::from_result(result);
    let mut lines = vec![render_status_line(
        style,
        outcome_status(result),
        &rendered.message,
    )];
    if let Err(err) = result {
        if let Some(hint) = failure_hint(err) {
            lines.push(format!("  {hint}"));
        }
    }
    lines
}

pub(crate) fn failure_hint(err: &CoreError) -> Option<&'static str> {
    match err.category() {
        FailureCategory::Network => {
            Some("check the network connection or pick another mirror with --mirror")
        }
        FailureCategory::Stale => Some("run `pypm list` to scan installed packages first"),
        FailureCategory::Usage | FailureCategory::NotFound | FailureCategory::CommandFailed => {
            None
        }
    }
}

pub(crate) fn format_environment_lines(
    environments: &[Environment],
    selected: &Environment,
) -> Vec<String> {
    let width = environments
        .iter()
        .map(|environment| environment.label().len())
        .max()
        .unwrap_or(0);
    environments
        .iter()
        .enumerate()
        .map(|(index, environment)| {
            let marker = if environment == selected { '*' } else { ' ' };
            format!(
                "{marker} #{:<3} {:<width$}  {}",
                index + 1,
                environment.label(),
                environment.executable().display()
            )
        })
        .collect()
}

pub(crate) fn format_inventory_lines(inventory: &Inventory) -> Vec<String> {
    let width = inventory
        .packages()
        .iter()
        .map(|package| package.name.len())
        .max()
        .unwrap_or(0);
    inventory
        .packages()
        .iter()
        .map(|package| format!("{:<width$}  {}", package.name, package.version))
        .collect()
}

/// `(name, installed, latest)` rows; the installed column is `?` for packages
/// missing from the last scan.
pub(crate) fn format_outdated_lines(rows: &[(String, Option<String>, String)]) -> Vec<String> {
    let width = rows.iter().map(|(name, _, _)| name.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(name, installed, latest)| {
            format!(
                "{name:<width$}  {} -> {latest}",
                installed.as_deref().unwrap_or("?")
            )
        })
        .collect()
}

pub(crate) fn format_mirror_lines(
    mirrors: &[MirrorConfig],
    default: &MirrorConfig,
) -> Vec<String> {
    let width = mirrors
        .iter()
        .map(|mirror| mirror.name.len())
        .max()
        .unwrap_or(0);
    mirrors
        .iter()
        .map(|mirror| {
            let marker = if mirror == default { '*' } else { ' ' };
            format!("{marker} {:<width$}  {}", mirror.name, mirror.index_url)
        })
        .collect()
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Cyan.into()))
        .effects(Effects::BOLD)
}

fn badge_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::Green,
        "warn" => AnsiColor::Yellow,
        _ => AnsiColor::Red,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// Paints the leading `[..]` badge of a rich status line.
fn colorize_badge(status: &str, line: &str) -> String {
    match line.split_once(' ') {
        Some((badge, rest)) if badge.starts_with('[') => {
            format!("{} {rest}", colorize(badge_style(status), badge))
        }
        _ => line.to_string(),
    }
}
