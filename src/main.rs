use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use common::Catalog;
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::Configuration;
use std::sync::Arc;
use vacuum::{
    Audited, Resolution, SqlExecutor, TracingAuditHook, VacuumMetrics, VacuumReport,
    VacuumScheduler, VacuumService, Vacuumer,
};

#[derive(Parser)]
#[command(name = "purposedb")]
#[command(about = "purposedb - purpose-bound retention enforcement for personal data")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the vacuuming scheduler until interrupted (default)
    Start,
    /// Run the system-wide pass once
    VacuumAll {
        #[arg(long, help = "Log statements instead of executing them")]
        dry_run: bool,
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    /// Run the named vacuuming policies once
    Vacuum {
        #[arg(required = true, help = "Vacuuming policy names")]
        names: Vec<String>,
        #[arg(long, help = "Log statements instead of executing them")]
        dry_run: bool,
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    /// Run every vacuuming policy whose period has elapsed
    Due {
        #[arg(long, help = "Log statements instead of executing them")]
        dry_run: bool,
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    /// Show the statements a system-wide pass would execute
    Plan {
        #[arg(long, help = "Print the plan as JSON")]
        json: bool,
    },
    #[command(flatten)]
    Common(CommonCommands),
}

type Service = Audited<Vacuumer, TracingAuditHook>;

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => log::info!("Received SIGINT"),
            _ = sigterm.recv() => log::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        log::info!("Received Ctrl+C");
    }

    Ok(())
}

async fn build_service(config: &Configuration, dry_run: bool) -> Result<Service> {
    let catalog = Catalog::new(&config.database.dsn)
        .await
        .context("Failed to initialize catalog")?;

    let mut vacuum_config = config.vacuum.clone();
    vacuum_config.dry_run |= dry_run;

    let vacuumer = Vacuumer::new(
        Arc::new(catalog.clone()),
        Arc::new(SqlExecutor::from_catalog(&catalog)),
        vacuum_config,
        VacuumMetrics::new(),
    );
    Ok(Audited::new(vacuumer, TracingAuditHook))
}

fn print_report(report: &VacuumReport, json: bool) -> Result<()> {
    if json {
        let json =
            serde_json::to_string_pretty(report).context("Failed to serialize vacuum report")?;
        println!("{json}");
    } else {
        report.log();
    }

    if report.has_failures() {
        bail!(
            "{} of {} deletion statements failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn print_plan(plan: &Resolution, json: bool) -> Result<()> {
    if json {
        let json = serde_json::to_string_pretty(plan).context("Failed to serialize plan")?;
        println!("{json}");
        return Ok(());
    }

    for feedback in &plan.feedback {
        println!("-- {feedback}");
    }
    for execution in &plan.executions {
        println!("{}", execution.statement);
    }
    Ok(())
}

async fn run_scheduler(config: &Configuration) -> Result<()> {
    if !config.vacuum.enabled {
        log::info!("Vacuuming is disabled in configuration (vacuum.enabled = false)");
        log::info!("Set PURPOSEDB__VACUUM__ENABLED=true or enable it in the config file");
        return Ok(());
    }

    let service = Arc::new(build_service(config, false).await?);
    let metrics = service.inner().metrics().clone();

    log::info!(
        "Starting vacuuming scheduler with interval {:?} in {:?} mode",
        config.vacuum.interval,
        config.vacuum.mode
    );
    let scheduler = VacuumScheduler::spawn(
        service,
        config.vacuum.interval,
        config.vacuum.mode,
        metrics.clone(),
    );

    wait_for_shutdown_signal().await?;

    log::info!("Stopping vacuuming scheduler, waiting for the current pass");
    scheduler.stop().await;
    metrics.summary().log();
    log::info!("purposedb stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    // Load application configuration
    let config = utils::load_config(cli.common.config.as_ref())?;

    let command = cli.command.unwrap_or(Commands::Start);
    if let Commands::Common(ref common_cmd) = command {
        return utils::handle_common_command(common_cmd, &config);
    }

    config.validate().context("Configuration is invalid")?;

    match command {
        Commands::Start => run_scheduler(&config).await,
        Commands::VacuumAll { dry_run, json } => {
            let service = build_service(&config, dry_run).await?;
            let report = service.run_all().await?;
            print_report(&report, json)
        }
        Commands::Vacuum {
            names,
            dry_run,
            json,
        } => {
            let service = build_service(&config, dry_run).await?;
            let report = service.run_policies(&names).await?;
            print_report(&report, json)
        }
        Commands::Due { dry_run, json } => {
            let service = build_service(&config, dry_run).await?;
            let report = service.run_due(Utc::now()).await?;
            print_report(&report, json)
        }
        Commands::Plan { json } => {
            let service = build_service(&config, false).await?;
            let plan = service.plan().await?;
            print_plan(&plan, json)
        }
        Commands::Common(_) => Ok(()),
    }
}
