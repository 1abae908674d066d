use bucket::cli::{Cli, Commands};
use bucket::config::Config;
use bucket::{App, MultiError, tasks, ui};
use clap::Parser;
use log::warn;
use std::fmt::Display;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let started = Instant::now();
    let cli = Cli::parse();

    let mut config = Config::load_system(&cli.config);
    if cli.serial {
        config.multithread = Some(false);
    }

    let app = Arc::new(App::with_builtin_platforms(config));

    let cancel = app.cancel().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling running operations");
            cancel.cancel();
        }
    });

    let result = run(&app, &cli).await;
    ui::outcome(
        result.as_ref().err().map(|e| e as &dyn Display),
        started.elapsed(),
    );

    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run(app: &Arc<App>, cli: &Cli) -> bucket::Result<()> {
    let task = match &cli.command {
        Commands::Contexts => return show_contexts(app.config(), &cli.context),
        Commands::Resolve => tasks::resolve(),
        Commands::List => tasks::list(),
        Commands::Clean { all } => tasks::clean(*all),
    };

    let workspace = app.open_workspace(&cli.context).await?;

    let mut errors = MultiError::new();
    if let Err(e) = workspace.run_task(&task).await {
        errors.push(e);
    }
    if let Err(e) = workspace.close().await {
        errors.push(e);
    }
    errors.into_result()
}

fn show_contexts(config: &Config, selection: &str) -> bucket::Result<()> {
    let mut config = config.clone();
    let active = config.select_contexts(selection)?;

    for context in &config.contexts {
        let line = format!("{} ({})", context.name, context.url);
        if active.contains(context) {
            ui::success(&line);
        } else {
            ui::dim(&format!("  {}", line));
        }
    }
    Ok(())
}
