use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use delivery_planner::models::{Coordinate, DeliveryId, DriverId, VehicleId};
use delivery_planner::store::JsonFileStore;
use delivery_planner::{ClusterRadius, PlanFailure, PlanOptions, PlanReport, RoutePlanner, RunContext, Selection};
use jiff::civil::Date;
use tracing::error;

mod parsers;
mod render;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON dataset holding deliveries, fleet and planned routes
    #[arg(long, global = true, env = "PLANNER_DATA_FILE", default_value = "planner-data.json")]
    data: PathBuf,

    /// Upper bound for each storage call (e.g., "10s", "PT1M")
    #[arg(long, global = true, value_parser = parsers::parse_duration, default_value = "10s")]
    timeout: Duration,

    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan every pending delivery scheduled for one date
    PlanDailyRoutes {
        /// YYYY-MM-DD, today or tomorrow
        #[arg(long, value_parser = parsers::parse_date, default_value = "tomorrow")]
        date: Date,

        /// Replace routes already planned for the date
        #[arg(long)]
        force: bool,

        /// Compute and print routes without saving them
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        shared: SharedArgs,
    },
    /// Plan an explicit set of deliveries with explicit vehicles and drivers
    OptimizeDeliveries {
        #[arg(long, value_delimiter = ',', required = true, value_parser = parsers::parse_id)]
        delivery_ids: Vec<u64>,

        #[arg(long, value_delimiter = ',', required = true, value_parser = parsers::parse_id)]
        vehicle_ids: Vec<u64>,

        #[arg(long, value_delimiter = ',', required = true, value_parser = parsers::parse_id)]
        driver_ids: Vec<u64>,

        #[arg(long, value_parser = parsers::parse_date, default_value = "today")]
        date: Date,

        /// Save the routes; without it the run is a preview
        #[arg(long)]
        commit: bool,

        /// Replace routes already planned for the date (with --commit)
        #[arg(long, requires = "commit")]
        force: bool,

        #[command(flatten)]
        shared: SharedArgs,
    },
}

#[derive(Args)]
struct SharedArgs {
    /// Cluster radius in km (0.5 to 10)
    #[arg(long, value_parser = parsers::parse_radius, default_value = "2.0")]
    cluster_radius_km: ClusterRadius,

    /// Depot as lat,lon; defaults to the dataset depot
    #[arg(long, value_parser = parsers::parse_coordinate, allow_hyphen_values = true)]
    depot: Option<Coordinate>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl SharedArgs {
    fn options(&self, store: &JsonFileStore) -> anyhow::Result<PlanOptions> {
        let depot = match self.depot {
            Some(depot) => depot,
            None => store
                .depot()?
                .ok_or_else(|| anyhow!("no depot in {} and no --depot given", store.path().display()))?,
        };
        Ok(PlanOptions::new(depot).with_cluster_radius(self.cluster_radius_km))
    }
}

fn main() -> ExitCode {
    dotenvy::from_filename("./.env.local").ok();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("failed to plan ({err:#})");
            if let Some(failure) = err.downcast_ref::<PlanFailure>() {
                let unassigned = failure.error.unassigned();
                if !unassigned.is_empty() {
                    eprintln!("{}", render::unassigned_table(unassigned));
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let store = JsonFileStore::open(&cli.data).with_context(|| format!("opening {}", cli.data.display()))?;
    let ctx = RunContext::new(cli.timeout);

    let (report, json) = match cli.command {
        Commands::PlanDailyRoutes {
            date,
            force,
            dry_run,
            shared,
        } => {
            let options = shared.options(&store)?.with_force(force).with_dry_run(dry_run);
            let planner = RoutePlanner::new(store);
            (planner.plan_day(&ctx, date, &options)?, shared.json)
        }
        Commands::OptimizeDeliveries {
            delivery_ids,
            vehicle_ids,
            driver_ids,
            date,
            commit,
            force,
            shared,
        } => {
            let selection = Selection::new(
                date,
                delivery_ids.into_iter().map(DeliveryId).collect(),
                vehicle_ids.into_iter().map(VehicleId).collect(),
                driver_ids.into_iter().map(DriverId).collect(),
            )?;
            let options = shared.options(&store)?.with_force(force).with_dry_run(!commit);
            let planner = RoutePlanner::new(store);
            (planner.plan_selection(&ctx, &selection, &options)?, shared.json)
        }
    };

    emit(&report, json)
}

fn emit(report: &PlanReport, json: bool) -> anyhow::Result<()> {
    if json {
        render::print_json(report)
    } else {
        render::print_report(report);
        Ok(())
    }
}
