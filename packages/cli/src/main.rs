#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the crime grid pipeline.
//!
//! Each step is a subcommand. Run without one to pick a step interactively.
//!
//! ```text
//! crime_grid_cli --config pipeline.toml build-grid
//! crime_grid_cli aggregate --batch-size 100000
//! crime_grid_cli run --hex-diameter 250
//! ```

mod interactive;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crime_grid_cli_utils::{IndicatifProgress, MultiProgress};
use crime_grid_pipeline::{AggregateSummary, GridSummary, PipelineConfig};

#[derive(Parser)]
#[command(name = "crime_grid_cli", about = "Hex grid crime aggregation pipeline")]
struct Cli {
    /// Pipeline configuration file (TOML). Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the hex grid from the city boundary and save it
    BuildGrid {
        #[command(flatten)]
        overrides: GridOverrides,
    },
    /// Aggregate crimes and environmental datasets onto the saved grid
    Aggregate {
        #[command(flatten)]
        overrides: AggregateOverrides,
    },
    /// Build the grid, then aggregate onto it
    Run {
        #[command(flatten)]
        grid: GridOverrides,

        #[command(flatten)]
        aggregate: AggregateOverrides,
    },
}

#[derive(Args)]
struct GridOverrides {
    /// Hexagon diameter in boundary CRS units
    #[arg(long)]
    hex_diameter: Option<f64>,
}

impl GridOverrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(diameter) = self.hex_diameter {
            config.hex_diameter = diameter;
        }
    }
}

#[derive(Args)]
struct AggregateOverrides {
    /// Crime records held in memory at once
    #[arg(long)]
    batch_size: Option<usize>,
}

impl AggregateOverrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_grid_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::BuildGrid { overrides }) => {
            overrides.apply(&mut config);
            build_grid(&config)?;
        }
        Some(Commands::Aggregate { overrides }) => {
            overrides.apply(&mut config);
            aggregate(&config, &multi)?;
        }
        Some(Commands::Run { grid, aggregate }) => {
            grid.apply(&mut config);
            aggregate.apply(&mut config);
            run(&config, &multi)?;
        }
        None => interactive::run(config, &multi)?,
    }

    Ok(())
}

pub(crate) fn build_grid(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (_, summary) = crime_grid_pipeline::build_grid_step(config)?;
    print_grid_summary(&summary);
    Ok(())
}

pub(crate) fn aggregate(
    config: &PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = IndicatifProgress::records_bar(multi, "Aggregating crimes");
    let summary = crime_grid_pipeline::aggregate_step(config, Some(progress))?;
    print_aggregate_summary(&summary);
    Ok(())
}

pub(crate) fn run(
    config: &PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = IndicatifProgress::records_bar(multi, "Aggregating crimes");
    let (grid, summary) = crime_grid_pipeline::run(config, Some(progress))?;
    print_grid_summary(&grid);
    print_aggregate_summary(&summary);
    Ok(())
}

fn print_grid_summary(summary: &GridSummary) {
    println!();
    println!("Grid: {} cells ({})", summary.cells, summary.crs);
    println!("  Area:  {:.1}", summary.total_area);
    println!("  Saved: {}", summary.path.display());
}

fn print_aggregate_summary(summary: &AggregateSummary) {
    println!();
    println!("Aggregation over {} cells", summary.cells);
    println!(
        "  Crimes:   {} read, {} dropped, {} in grid, {} outside ({} batches)",
        summary.rows_read,
        summary.rows_dropped,
        summary.stats.events_classified,
        summary.stats.events_outside,
        summary.stats.batches
    );
    for dataset in &summary.datasets {
        println!(
            "  {}: {} in grid, {} outside, {} dropped",
            dataset.name, dataset.counted, dataset.outside, dataset.dropped
        );
    }
    println!(
        "  Tables:   {} feature rows, {} monthly rows",
        summary.output.feature_rows, summary.output.monthly_rows
    );
    println!("  Saved:    {}", summary.path.display());
}
