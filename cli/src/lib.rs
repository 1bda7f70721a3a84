//! linvoc command line: launch an instance, toggle one, or report on the
//! environment.

mod args;
mod launch;
mod report;

use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use linvoc_common::instance::{DAEMON_SCOPE, DEFAULT_SCOPE, InstanceLock};
use linvoc_daemon::config::{Config, LogLevel};
use linvoc_daemon::daemon::DaemonOptions;
use linvoc_daemon::engine::EngineKind;
use linvoc_daemon::environment::EnvironmentProbe;
use linvoc_daemon::models::ModelManager;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*};

use args::Args;
use launch::{LaunchDecision, ToggleOutcome};

/// Parse the command line and do what it asks.
pub fn run() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply(args.overrides());

    if args.toggle {
        init_stderr_logging(config.logging.level)?;
        return Ok(toggle_daemon());
    }

    if args.info || args.check {
        init_stderr_logging(config.logging.level)?;
        return check(&config, args.check);
    }

    launch(&args, config)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Short-lived invocations log to stderr.
fn init_stderr_logging(level: LogLevel) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(linvoc_daemon::env_filter(level)?)
        .try_init()?;
    linvoc_daemon::route_native_logs();
    Ok(())
}

fn toggle_daemon() -> ExitCode {
    match launch::toggle_running(&InstanceLock::system(), DAEMON_SCOPE) {
        ToggleOutcome::Sent(_) => ExitCode::SUCCESS,
        ToggleOutcome::NotRunning => {
            println!("No linvoc instance is running.");
            ExitCode::FAILURE
        }
        ToggleOutcome::Failed(pid) => {
            println!("Could not signal the running instance (PID {pid}).");
            ExitCode::FAILURE
        }
    }
}

/// `--info` prints the environment; `--check` also verifies dependencies.
fn check(config: &Config, verify: bool) -> Result<ExitCode> {
    let info = EnvironmentProbe::from_env().environment_info();
    let mut out = std::io::stdout().lock();
    report::print_info(&info, &mut out)?;
    if !verify {
        return Ok(ExitCode::SUCCESS);
    }

    writeln!(out)?;
    let selection = config.engine_selection();
    if let Some(model) = selection.model_id() {
        let models = ModelManager::new(selection.model_dir.clone())?;
        report::print_model_status(&models.check_model_blocking(model)?, &mut out)?;
    }
    let engine = EngineKind::from_key(&selection.kind);
    let missing = report::missing_dependencies(&info, engine);
    let ok = report::print_missing(&missing, &mut out)?;
    if ok {
        writeln!(out, "✓ All dependencies are satisfied.")?;
    }
    Ok(exit_code(ok))
}

fn launch(args: &Args, config: Config) -> Result<ExitCode> {
    let info = EnvironmentProbe::from_env().environment_info();
    let engine = EngineKind::from_key(&config.engine.kind);
    let missing = report::missing_dependencies(&info, engine);
    if !report::print_missing(&missing, &mut std::io::stdout().lock())? {
        println!("\nRun with --check for details.");
        return Ok(ExitCode::FAILURE);
    }

    let _guard = linvoc_daemon::init_file_logging(config.logging.level)?;

    let lock = InstanceLock::system();
    let scope = if args.daemon { DAEMON_SCOPE } else { DEFAULT_SCOPE };
    match launch::decide(&lock, scope, args.daemon) {
        LaunchDecision::AlreadyRunning(pid) => {
            println!("A linvoc instance is already running (PID {pid}).");
            println!("Use --toggle to start or stop listening.");
            return Ok(ExitCode::SUCCESS);
        }
        LaunchDecision::Toggled(pid) => {
            info!(pid = pid, "Toggled the running instance");
            return Ok(ExitCode::SUCCESS);
        }
        LaunchDecision::Start => {}
    }

    info!(
        engine = %config.engine.kind,
        language = %config.engine.language,
        scope = scope,
        "Starting linvoc"
    );

    let options = DaemonOptions {
        selection: config.engine_selection(),
        injection: config.injector_settings(),
        scope: scope.to_string(),
        lock,
        start_immediately: config.daemon.start_immediately,
        preload: config.daemon.preload,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(linvoc_daemon::daemon::run(options))?;
    Ok(ExitCode::SUCCESS)
}
