// UI module for consistent terminal output with spinners and styling
//
// The only module allowed to print; everything else logs.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use console::{Term, style};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn is_tty() -> bool {
    Term::stderr().is_term()
}

/// Create a styled spinner for long-running work
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if !is_tty() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars(SPINNER_CHARS)
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());

    if is_tty() {
        pb.enable_steady_tick(Duration::from_millis(80));
    }

    pb
}

/// Clear a spinner without leaving a message
pub fn clear_bar(pb: &ProgressBar) {
    pb.finish_and_clear();
}

pub fn success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

pub fn action(message: &str) {
    println!("{} {}", style("→").cyan(), message);
}

pub fn dim(message: &str) {
    println!("{}", style(message).dim());
}

/// `:<task> [<context>]`, printed before a task runs on a context
pub fn task_header(task: &str, context: &str) {
    println!("{}", style(format!(":{} [{}]", task, context)).bold());
}

pub fn task_failed(task: &str, context: &str, err: &dyn std::fmt::Display) {
    eprintln!(
        "{} {}\n",
        style(format!(":{} [{}] FAILED:", task, context)).red().bold(),
        err
    );
}

/// A plugin matched to a remote project
pub fn resolved(local: &str, remote: &str, repository: &str, confidence: f64) {
    println!(
        "{} {} {} {}",
        style("✓").green(),
        local,
        style(format!("→ {}:{}", repository, remote)).cyan(),
        style(format!("({:.0}%)", confidence * 100.0)).dim()
    );
}

/// A plugin no repository could match
pub fn unresolved(local: &str, err: &dyn std::fmt::Display) {
    eprintln!("{} {} {}", style("✗").red(), local, style(err).dim());
}

/// One row of the cached plugin listing
pub fn cached_entry(local: &str, name: &str, repository: &str, remote: &str, confidence: f64) {
    println!(
        "  {} {} {} {}",
        style(local).bold(),
        name,
        style(format!("{}:{}", repository, remote)).cyan(),
        style(format!("{:.2}", confidence)).dim()
    );
}

/// `SUCCESS`/`FAILURE` line closing every invocation
pub fn outcome(failure: Option<&dyn std::fmt::Display>, elapsed: Duration) {
    let took = Duration::from_millis(elapsed.as_millis() as u64);
    match failure {
        None => println!("{} (took {:?})", style("SUCCESS").green().bold(), took),
        Some(err) => {
            eprintln!("{}", err);
            println!("{} (took {:?})", style("FAILURE").red().bold(), took);
        }
    }
}
