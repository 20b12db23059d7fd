//! CLI entrypoint for conclave
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod commands;
mod logging;
mod output;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use commands::{Cli, Command, OutputFormat, PlanArgs};
use conclave_application::{PlanningApi, WorkflowEngine};
use conclave_domain::{CoordinationId, PlanningRequest, WorkflowStatus};
use conclave_infrastructure::{
    ConfigLoader, EventHub, FileConfig, HttpPlanningClient, JsonlWorkflowLogger,
    TungsteniteConnector,
};
use output::ConsoleFormatter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting conclave");

    let config = ConfigLoader::load(cli.config.as_deref())
        .map_err(|e| anyhow!("failed to load configuration: {e}"))?;

    let issues = config.validate();
    for issue in &issues {
        if issue.is_error() {
            warn!("Config error: {}", issue.message);
        } else {
            warn!("Config warning: {}", issue.message);
        }
    }

    if let Command::Config = cli.command {
        return show_config(&cli, &config, &issues);
    }

    if issues.iter().any(|i| i.is_error()) {
        eprint!("{}", ConsoleFormatter::format_issues(&issues));
        bail!("configuration is invalid; run `conclave config` for details");
    }

    // === Dependency Injection ===
    let api = Arc::new(
        HttpPlanningClient::with_timeout(&config.api.base_url, config.api.timeout())
            .with_read_retry(config.retry.to_policy()),
    );

    match cli.command {
        Command::Plan(args) => run_plan(args, cli.output, &config, api).await,
        Command::Status { coordination_id } => {
            let plan = api
                .get_plan_result(&CoordinationId::new(coordination_id))
                .await?;
            print_result(cli.output, &plan, ConsoleFormatter::format_plan);
            Ok(())
        }
        Command::Sessions => {
            let sessions = api.list_sessions().await?;
            print_result(cli.output, &sessions, |s| ConsoleFormatter::format_sessions(s));
            Ok(())
        }
        Command::Agents => {
            let agents = api.list_agents().await?;
            print_result(cli.output, &agents, |a| ConsoleFormatter::format_agents(a));
            Ok(())
        }
        Command::Events {
            coordination_id,
            limit,
        } => {
            let events = api
                .list_events(&CoordinationId::new(coordination_id), limit)
                .await?;
            print_result(cli.output, &events, |e| ConsoleFormatter::format_events(e));
            Ok(())
        }
        Command::Config => Ok(()),
    }
}

fn print_result<T: serde::Serialize>(format: OutputFormat, value: &T, text: impl Fn(&T) -> String) {
    match format {
        OutputFormat::Json => println!("{}", ConsoleFormatter::format_json(value)),
        OutputFormat::Text => print!("{}", text(value)),
    }
}

fn show_config(
    cli: &Cli,
    config: &FileConfig,
    issues: &[conclave_domain::ConfigIssue],
) -> Result<()> {
    if cli.output == OutputFormat::Json {
        println!("{}", ConsoleFormatter::format_json(config));
        return Ok(());
    }

    ConfigLoader::print_config_sources(cli.config.as_deref());
    println!();
    println!("Effective configuration:");
    println!(
        "{}",
        toml::to_string_pretty(config).context("serialize effective configuration")?
    );
    print!("{}", ConsoleFormatter::format_issues(issues));
    Ok(())
}

async fn run_plan(
    args: PlanArgs,
    format: OutputFormat,
    config: &FileConfig,
    api: Arc<HttpPlanningClient>,
) -> Result<()> {
    let retry = config.retry.to_policy();
    let hub = Arc::new(EventHub::new(
        Arc::new(
            TungsteniteConnector::new(config.events.url.as_str())
                .with_connect_timeout(config.events.connect_timeout()),
        ),
        retry,
    ));

    let mut engine = WorkflowEngine::new(api, hub.clone()).with_config(config.to_engine_config());
    if let Some(path) = &config.workflow.journal {
        match JsonlWorkflowLogger::open(path) {
            Ok(journal) => {
                info!("Workflow journal: {}", journal.path().display());
                engine = engine.with_logger(Arc::new(journal));
            }
            Err(e) => warn!("Workflow journal disabled: cannot open {}: {}", path.display(), e),
        }
    }
    let handle = engine.spawn();

    // Stream status transitions while the workflow runs
    let printer = (format == OutputFormat::Text).then(|| {
        let mut updates = handle.watch();
        tokio::spawn(async move {
            let mut last = updates.borrow_and_update().status;
            while updates.changed().await.is_ok() {
                let status = updates.borrow_and_update().status;
                if status != last {
                    println!("{}", ConsoleFormatter::status_line(last, status));
                    last = status;
                }
            }
        })
    });

    let mut request = PlanningRequest::new(args.objective).with_complexity(args.complexity);
    if let Some(pattern) = args.pattern {
        request = request.with_pattern(pattern);
    }
    if let Some(max_agents) = args.max_agents {
        request = request.with_max_agents(max_agents);
    }
    if let Some(context) = args.context {
        request = request.with_context(context);
    }

    let mut status = handle.submit_planning_request(request).await?;

    if status == WorkflowStatus::Consensus {
        let mut updates = handle.watch();
        let settled = tokio::time::timeout(
            Duration::from_secs(args.wait_secs),
            updates.wait_for(|s| s.consensus_complete || s.status == WorkflowStatus::Failed),
        )
        .await
        .map(|waited| waited.map(|_| ()));
        match settled {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => warn!("Workflow stopped while waiting for consensus"),
            Err(_) => warn!(
                "Consensus not reached within {}s, giving up",
                args.wait_secs
            ),
        }

        if args.execute && handle.can_execute() {
            status = handle.execute_plan().await?;
        } else {
            status = handle.snapshot().status;
        }
    }

    let state = handle.snapshot();
    let metrics = handle.metrics();
    handle.shutdown().await?;
    hub.shutdown();
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            ConsoleFormatter::format_json(&serde_json::json!({
                "state": state,
                "metrics": metrics,
            }))
        ),
        OutputFormat::Text => print!("{}", ConsoleFormatter::format_summary(&state, &metrics)),
    }

    if status == WorkflowStatus::Failed {
        bail!(
            "workflow failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
