use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use harvest_lite::config::SchedulerConfig;
use harvest_lite::dashboard::{run_dashboard, DashboardState};
use harvest_lite::driver::CycleDriver;
use harvest_lite::fleet::SimulatedFleet;
use harvest_lite::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "harvest-lite")]
#[command(version)]
#[command(about = "A cycle-driven resource harvesting scheduler")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the scheduler loop against a simulated fleet until interrupted
    Run(RunArgs),

    /// Run a single cycle and print the status report
    Plan {
        #[command(flatten)]
        fleet: FleetArgs,

        /// Output format
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct FleetArgs {
    /// Path to a JSON fleet description
    #[arg(long, short = 'f')]
    fleet: PathBuf,

    /// Node discovery starts from
    #[arg(long, default_value = "home")]
    root: String,

    /// Let the root node host jobs too
    #[arg(long)]
    include_root: bool,

    /// Always use the approximate estimator
    #[arg(long)]
    no_analytic: bool,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    fleet: FleetArgs,

    /// Seconds to sleep between cycles
    #[arg(long, default_value = "10")]
    cycle_delay_secs: u64,

    /// Port for the status dashboard (optional)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Print each cycle's report to stdout
    #[arg(long)]
    echo: bool,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Helpers
// =============================================================================

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn scheduler_config(args: &FleetArgs) -> SchedulerConfig {
    SchedulerConfig::new(args.root.clone())
        .with_root_runner(args.include_root)
        .with_analytic_model(!args.no_analytic)
}

// =============================================================================
// Commands
// =============================================================================

async fn run_scheduler(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut fleet = SimulatedFleet::load(&args.fleet.fleet).await?;
    let config = scheduler_config(&args.fleet)
        .with_cycle_delay(Duration::from_secs(args.cycle_delay_secs));

    tracing::info!(
        fleet = %args.fleet.fleet.display(),
        root = %config.root,
        exclude_root_runner = config.exclude_root_runner,
        analytic = config.use_analytic_model,
        dashboard_port = ?args.dashboard_port,
        "Starting harvest-lite"
    );

    let mut driver = CycleDriver::new(config).with_report_echo(args.echo);

    if let Some(port) = args.dashboard_port {
        let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
        let state = DashboardState {
            report: driver.latest_report(),
        };
        tokio::spawn(async move {
            run_dashboard(addr, state).await;
        });
    }

    let shutdown = install_shutdown_handler()?;
    driver.run(&mut fleet, shutdown).await;
    Ok(())
}

async fn plan_once(
    args: FleetArgs,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut fleet = SimulatedFleet::load(&args.fleet).await?;
    let mut driver = CycleDriver::new(scheduler_config(&args));
    let outcome = driver.run_cycle(&mut fleet)?;

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        }
        OutputFormat::Table => {
            print!("{}", outcome.report);
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging();

    match args.command {
        Commands::Run(run_args) => run_scheduler(run_args).await?,
        Commands::Plan { fleet, output } => plan_once(fleet, output).await?,
    }

    Ok(())
}
