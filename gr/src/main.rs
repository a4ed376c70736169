//! GitReporter - repository change reports for chat webhooks
//!
//! CLI entry point for the daemon, one-shot passes and daemon control.

use std::fs;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use gitreporter::cli::{Cli, Command, OutputFormat, generate_after_help, get_log_path};
use gitreporter::config::{Config, project_source};
use gitreporter::events::{
    LogLevel, ScanEvent, create_event_bus, default_activity_dir, latest_pass_id, read_pass_events, spawn_event_logger,
};
use gitreporter::ipc;
use gitreporter::notify::WebhookSink;
use gitreporter::repo::GitInspector;
use gitreporter::scan::{PassOutcome, PassSummary, ScanHandle, ScanStatus, Trigger};
use gitreporter::scheduler::{Scheduler, SchedulerConfig};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;
    info!(source = ?config.source, projects = config.projects.len(), "GitReporter loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Daemon => run_daemon(&config).await,
        Command::Run { project } => cmd_run(&config, project.as_deref()).await,
        Command::TestWebhook { url } => cmd_test_webhook(&config, &url).await,
        Command::Check => cmd_check(&config),
        Command::Trigger { project } => cmd_trigger(project.as_deref()).await,
        Command::Cancel => cmd_cancel().await,
        Command::Status { format } => cmd_status(format).await,
        Command::Ping => cmd_ping().await,
        Command::Stop => cmd_stop().await,
        Command::Activity { pass_id, lines } => cmd_activity(pass_id, lines),
    }
}

/// Spawn the orchestrator over the real git inspector and webhook sink
fn spawn_orchestrator(
    config: &Config,
    events: Arc<gitreporter::events::EventBus>,
) -> Result<(ScanHandle, tokio::task::JoinHandle<()>)> {
    let sink = WebhookSink::from_config(&config.http).context("Failed to create webhook client")?;
    Ok(ScanHandle::spawn(
        project_source(config),
        Arc::new(GitInspector::new()),
        Arc::new(sink),
        events,
    ))
}

/// Print pass events to the terminal until the bus closes
async fn print_events(mut rx: broadcast::Receiver<ScanEvent>) {
    loop {
        match rx.recv().await {
            Ok(ScanEvent::Progress { .. }) => {}
            Ok(event) => {
                let line = event.summary();
                match &event {
                    ScanEvent::Log {
                        level: LogLevel::Error, ..
                    } => println!("{}", line.red()),
                    ScanEvent::Log {
                        level: LogLevel::Warn, ..
                    }
                    | ScanEvent::TriggerRejected { .. } => println!("{}", line.yellow()),
                    ScanEvent::PassFinished { .. } => println!("{}", line.bold()),
                    _ => println!("{}", line),
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => debug!(missed = n, "print_events: lagged"),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_summary(summary: &PassSummary) {
    let outcome = match summary.outcome {
        PassOutcome::Completed => summary.outcome.to_string().green(),
        PassOutcome::Cancelled => summary.outcome.to_string().yellow(),
        PassOutcome::Failed => summary.outcome.to_string().red(),
    };
    println!(
        "{} Pass {} {}: {}/{} units, {} notifications sent",
        "✓".green(),
        summary.pass_id.cyan(),
        outcome,
        summary.completed,
        summary.total,
        summary.dispatched
    );
}

/// One pass in-process
async fn cmd_run(config: &Config, project: Option<&str>) -> Result<()> {
    debug!(?project, "cmd_run: called");
    config.validate()?;

    let events = create_event_bus();
    let printer = tokio::spawn(print_events(events.subscribe()));
    let logger = spawn_event_logger(events.clone())?;
    let (handle, task) = spawn_orchestrator(config, events.clone())?;
    drop(events);

    let result = handle.run_to_completion(Trigger::Manual, project).await;
    handle.shutdown().await?;
    drop(handle);
    let _ = task.await;
    let _ = printer.await;
    let _ = logger.await;

    print_summary(&result?);
    Ok(())
}

async fn cmd_test_webhook(config: &Config, url: &str) -> Result<()> {
    debug!(%url, "cmd_test_webhook: called");
    let events = create_event_bus();
    let (handle, task) = spawn_orchestrator(config, events)?;
    let result = handle.test_webhook(url).await;
    handle.shutdown().await?;
    let _ = task.await;

    match result {
        Ok(()) => {
            println!("{} Webhook accepted the test message: {}", "✓".green(), url);
            Ok(())
        }
        Err(e) => {
            println!("{} Webhook test failed: {}", "✗".red(), e);
            Err(e.into())
        }
    }
}

fn cmd_check(config: &Config) -> Result<()> {
    debug!("cmd_check: called");
    config.validate()?;
    let scheduler = SchedulerConfig::from_config(config)?;

    match &config.source {
        Some(path) => println!("Config: {}", path.display()),
        None => println!("Config: (defaults)"),
    }
    match scheduler.interval {
        Some(interval) => println!("Interval: every {} minutes", interval.as_secs() / 60),
        None => println!("Interval: disabled"),
    }
    println!("Calendar entries: {}", scheduler.calendar.len());
    println!("Projects: {}", config.projects.len());
    for project in &config.projects {
        let branches = if project.branches.is_empty() {
            "(current branch)".to_string()
        } else {
            project.branches.join(", ")
        };
        println!("  {} {} [{}]", project.name.cyan(), project.path.display(), branches);
        for webhook in &project.webhooks {
            let throttle = if webhook.frequency_minutes > 0 {
                format!(", at most every {} min", webhook.frequency_minutes)
            } else {
                String::new()
            };
            println!("    → {} ({}{})", webhook.url, webhook.format, throttle);
        }
    }
    println!("{} Configuration is valid", "✓".green());
    Ok(())
}

async fn cmd_trigger(project: Option<&str>) -> Result<()> {
    debug!(?project, "cmd_trigger: called");
    let pass_id = ipc::DaemonClient::new().trigger(project).await?;
    println!("{} Pass started: {}", "✓".green(), pass_id.cyan());
    Ok(())
}

async fn cmd_cancel() -> Result<()> {
    debug!("cmd_cancel: called");
    if ipc::DaemonClient::new().cancel().await? {
        println!("Cancellation requested; the pass stops at the next branch");
    } else {
        println!("No pass is running");
    }
    Ok(())
}

fn print_status(status: &ScanStatus) {
    println!("GitReporter Status");
    println!("------------------");
    println!("State: {}", status.phase);
    if let Some(current) = &status.current {
        println!(
            "Current pass: {} ({} trigger) {}/{}",
            current.pass_id, current.trigger, current.completed, current.total
        );
    }
    if let Some(last) = &status.last {
        println!(
            "Last pass: {} {} at {} ({}/{} units, {} sent)",
            last.pass_id,
            last.outcome,
            last.finished_at.format("%Y-%m-%d %H:%M:%S"),
            last.completed,
            last.total,
            last.dispatched
        );
    }
    println!("Tracked branches: {}", status.tracked_branches);
}

async fn cmd_status(format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_status: called");
    let status = ipc::DaemonClient::new().status().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => print_status(&status),
    }
    Ok(())
}

async fn cmd_ping() -> Result<()> {
    debug!("cmd_ping: called");
    let client = ipc::DaemonClient::new();
    if !client.socket_exists() {
        println!("GitReporter daemon is not running");
        return Ok(());
    }
    match client.ping().await {
        Ok(version) => {
            println!("Daemon is alive and responsive");
            println!("Version: {}", version);
        }
        Err(e) => {
            println!("Daemon socket exists but is not responding");
            println!("Error: {}", e);
        }
    }
    Ok(())
}

async fn cmd_stop() -> Result<()> {
    debug!("cmd_stop: called");
    let client = ipc::DaemonClient::new();
    if !client.socket_exists() {
        println!("GitReporter daemon is not running");
        return Ok(());
    }
    client.shutdown().await?;

    let mut attempts = 0;
    while client.socket_exists() && attempts < 100 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        attempts += 1;
    }
    if client.socket_exists() {
        println!("Stop requested; the daemon is finishing its current pass");
    } else {
        println!("GitReporter daemon stopped");
    }
    Ok(())
}

fn cmd_activity(pass_id: Option<String>, lines: usize) -> Result<()> {
    debug!(?pass_id, lines, "cmd_activity: called");
    let dir = default_activity_dir();
    let pass_id = match pass_id {
        Some(id) => id,
        None => match latest_pass_id(&dir)? {
            Some(id) => id,
            None => {
                println!("No activity recorded yet");
                return Ok(());
            }
        },
    };

    let entries = read_pass_events(&dir, &pass_id)?;
    if entries.is_empty() {
        println!("No activity for pass {}", pass_id);
        return Ok(());
    }
    println!("Pass {}", pass_id.cyan());
    let skip = entries.len().saturating_sub(lines);
    for entry in entries.iter().skip(skip) {
        println!("{} {}", entry.timestamp.format("%H:%M:%S"), entry.event.summary());
    }
    Ok(())
}

/// Run the daemon main loop
async fn run_daemon(config: &Config) -> Result<()> {
    debug!("run_daemon: called");
    config.validate()?;
    let scheduler_config = SchedulerConfig::from_config(config)?;

    let events = create_event_bus();
    let logger = spawn_event_logger(events.clone())?;
    let (handle, orchestrator_task) = spawn_orchestrator(config, events.clone())?;
    drop(events);
    info!("Orchestrator started");

    let mut scheduler = Scheduler::new(scheduler_config, handle.clone());
    scheduler.start();
    info!("Scheduler started");

    let (listener, socket_path) = ipc::create_listener()?;
    let (stop_tx, mut stop_rx) = tokio::sync::mpsc::channel::<()>(1);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let server = ipc::IpcServer::new(listener, handle.clone(), env!("GIT_DESCRIBE"), stop_tx);
    let ipc_task = tokio::spawn(server.run(shutdown_rx));
    info!(?socket_path, "IPC socket listening");

    println!("GitReporter daemon running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
            _ = stop_rx.recv() => info!("stop requested over IPC"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("Ctrl+C received"),
            _ = stop_rx.recv() => info!("stop requested over IPC"),
        }
    }

    info!("Daemon shutting down...");
    let _ = shutdown_tx.send(true);
    let _ = ipc_task.await;
    ipc::cleanup_socket(&socket_path);

    scheduler.shutdown().await;
    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "orchestrator already stopped");
    }
    drop(handle);
    let _ = orchestrator_task.await;
    let _ = logger.await;

    info!("Daemon stopped");
    println!("GitReporter daemon stopped");
    Ok(())
}
