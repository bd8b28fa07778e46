#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Orchestration of the crime grid pipeline.
//!
//! Two steps, runnable separately or together:
//!
//! 1. **Build grid**: load the boundary, tessellate it, save the grid file.
//! 2. **Aggregate**: load the saved grid, index it, count each auxiliary
//!    dataset, stream the crime export through the chunked aggregator, and
//!    save the `features` and `monthly_cell_crime` tables.
//!
//! [`run`] does both without re-reading the grid in between.

pub mod config;

use std::path::PathBuf;
use std::sync::Arc;

use crime_grid_aggregate::{
    AggregateError, AggregationStats, ChunkedAggregator, EnrichedGrid, PointCounts, count_points,
};
use crime_grid_database::DbError;
use crime_grid_database::grid_file::{read_grid, write_grid};
use crime_grid_database::tables::{OutputSummary, write_outputs};
use crime_grid_source::progress::{ProgressCallback, null_progress};
use crime_grid_source::{CsvCrimeSource, SourceError};
use crime_grid_spatial::{CellIndex, Crs, Grid, SpatialError, build_grid};

pub use config::{ConfigError, PipelineConfig};

/// Errors that can occur while running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Tessellation or grid validation failed.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// An input could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Accumulators could not be combined.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// An artifact could not be read or written.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result of the grid step.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSummary {
    pub cells: usize,
    pub crs: Crs,
    pub total_area: f64,
    pub path: PathBuf,
}

/// Point counts of one auxiliary dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub name: String,
    pub counted: u64,
    pub outside: u64,
    /// Records the loader skipped.
    pub dropped: u64,
}

/// Result of the aggregation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSummary {
    pub cells: usize,
    pub stats: AggregationStats,
    pub rows_read: u64,
    pub rows_dropped: u64,
    pub datasets: Vec<DatasetSummary>,
    pub output: OutputSummary,
    pub path: PathBuf,
}

/// Builds the grid from the configured boundary and saves it.
///
/// # Errors
///
/// Returns [`PipelineError`] if the boundary cannot be loaded or
/// tessellated, or the grid file cannot be written.
pub fn build_grid_step(config: &PipelineConfig) -> Result<(Grid, GridSummary), PipelineError> {
    config.validate()?;
    log::info!("Loading boundary from {}", config.boundary.path.display());
    let crs = config.boundary_crs()?;
    let boundary = crime_grid_source::boundary::load_boundary(&config.boundary.path, crs.as_ref())?;

    log::info!("Building hex grid (diameter {})", config.hex_diameter);
    let grid = build_grid(&boundary, config.hex_diameter)?;

    let path = config.output.grid_path();
    write_grid(&path, &grid)?;

    let summary = GridSummary {
        cells: grid.len(),
        crs: grid.crs().clone(),
        total_area: grid.total_area(),
        path,
    };
    log::info!("Grid built with {} cells", summary.cells);

    Ok((grid, summary))
}

/// Loads the saved grid and aggregates onto it.
///
/// # Errors
///
/// Returns [`PipelineError`] if the grid file is missing or invalid, or
/// aggregation fails.
pub fn aggregate_step(
    config: &PipelineConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<AggregateSummary, PipelineError> {
    config.validate()?;
    let path = config.output.grid_path();
    log::info!("Loading grid from {}", path.display());
    let crs = config.boundary_crs()?;
    let grid = read_grid(&path, crs.as_ref())?;

    aggregate_grid(config, &grid, progress)
}

/// Runs both steps.
///
/// # Errors
///
/// Returns [`PipelineError`] from whichever step fails; nothing is
/// written to the `DuckDB` output in that case.
pub fn run(
    config: &PipelineConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<(GridSummary, AggregateSummary), PipelineError> {
    let (grid, grid_summary) = build_grid_step(config)?;
    let aggregate_summary = aggregate_grid(config, &grid, progress)?;
    Ok((grid_summary, aggregate_summary))
}

/// Counts auxiliary datasets and crimes onto `grid` and saves both tables.
///
/// # Errors
///
/// Returns [`PipelineError`] if an input cannot be read or the output
/// cannot be written.
pub fn aggregate_grid(
    config: &PipelineConfig,
    grid: &Grid,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<AggregateSummary, PipelineError> {
    config.validate()?;
    let progress = progress.unwrap_or_else(null_progress);
    let index = CellIndex::new(grid);

    progress.set_message("Counting environmental datasets...".to_string());
    let mut environment: Vec<(String, PointCounts)> = Vec::with_capacity(config.environment.len());
    let mut datasets = Vec::with_capacity(config.environment.len());

    for dataset in &config.environment {
        let format = dataset.resolved_format()?;
        let loaded =
            crime_grid_source::points::load_points(&dataset.path, format, &dataset.columns())?;
        let counts = count_points(&loaded.points, &index);

        log::info!(
            "{}: {} points in grid, {} outside",
            dataset.name,
            counts.total(),
            counts.outside()
        );
        datasets.push(DatasetSummary {
            name: dataset.name.clone(),
            counted: counts.total(),
            outside: counts.outside(),
            dropped: loaded.dropped,
        });
        environment.push((dataset.name.clone(), counts));
    }

    log::info!("Processing crime data in batches of {}", config.batch_size);
    progress.set_message("Aggregating crimes...".to_string());
    progress.set_total(0);
    progress.set_position(0);

    let mut source = CsvCrimeSource::open(
        &config.crimes.path,
        &config.crimes.columns(),
        config.batch_size,
    )?;
    let mut aggregator = ChunkedAggregator::new(&index, &config.categories);
    aggregator.consume(&mut source, progress.as_ref())?;
    let output = aggregator.finish();

    log::info!(
        "Aggregated {} of {} crimes ({} outside grid, {} rows dropped)",
        output.stats.events_classified,
        output.stats.events_seen,
        output.stats.events_outside,
        source.rows_dropped()
    );

    let mut enriched = EnrichedGrid::new(grid, &output.aggregates)?;
    for (name, counts) in &environment {
        enriched = enriched.with_environment(name, counts)?;
    }

    progress.set_message("Saving outputs...".to_string());
    let path = config.output.database_path();
    let written = write_outputs(&path, &enriched, &output.monthly)?;
    progress.finish(format!(
        "Aggregated {} crimes into {} cells",
        output.stats.events_classified,
        grid.len()
    ));

    Ok(AggregateSummary {
        cells: grid.len(),
        stats: output.stats,
        rows_read: source.rows_read(),
        rows_dropped: source.rows_dropped(),
        datasets,
        output: written,
        path,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crime_grid_database::tables::{FEATURES_TABLE, MONTHLY_TABLE, table_columns};

    use super::*;
    use crate::config::EnvironmentDataset;

    const BOUNDARY: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::3435" } },
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0, 0], [1000, 0], [1000, 1000], [0, 1000], [0, 0]]]
            }
        }]
    }"#;

    const CRIMES: &str = "\
ID,Date,Primary Type,X Coordinate,Y Coordinate
1,01/15/2024 02:30:00 PM,BURGLARY,750,433
2,01/16/2024 09:10:00 AM,ROBBERY,375,217
3,01/15/2024 02:45:00 PM,THEFT,752,431
4,02/01/2024 11:00:00 PM,ASSAULT,5000,5000
5,not a date,BURGLARY,750,433
";

    const LIGHTS: &str = "\
Creation Date,X Coordinate,Y Coordinate
01/01/2024,750,440
01/02/2024,,
01/03/2024,-100,-100
";

    const STOPS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [376, 218]}}
        ]
    }"#;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn fixture(dir: &Path, crimes: &str) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.batch_size = 2;
        config.boundary.path = write(dir, "city.geojson", BOUNDARY);
        config.crimes.path = write(dir, "crimes.csv", crimes);
        config.environment = vec![
            EnvironmentDataset {
                name: "streetlight".to_owned(),
                path: write(dir, "lights.csv", LIGHTS),
                format: None,
                x_column: "x_coordinate".to_owned(),
                y_column: "y_coordinate".to_owned(),
            },
            EnvironmentDataset {
                name: "bus".to_owned(),
                path: write(dir, "stops.geojson", STOPS),
                format: None,
                x_column: "x_coordinate".to_owned(),
                y_column: "y_coordinate".to_owned(),
            },
        ];
        config.output.dir = dir.join("processed");
        config
    }

    fn scalar(path: &Path, sql: &str) -> i64 {
        let conn = duckdb::Connection::open(path).unwrap();
        conn.prepare(&format!("SELECT CAST(({sql}) AS BIGINT)"))
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn run_builds_grid_and_writes_both_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let config = fixture(tmp.path(), CRIMES);

        let (grid, summary) = run(&config, None).unwrap();

        assert_eq!(grid.cells, 12);
        assert_eq!(grid.crs, Crs::epsg(3435));
        assert!((grid.total_area - 1_000_000.0).abs() < 1e-2);
        assert!(grid.path.exists());

        assert_eq!(summary.rows_read, 5);
        assert_eq!(summary.rows_dropped, 1);
        assert_eq!(summary.stats.events_seen, 4);
        assert_eq!(summary.stats.events_classified, 3);
        assert_eq!(summary.stats.events_outside, 1);
        assert_eq!(summary.stats.batches, 2);
        assert_eq!(summary.output.feature_rows, 12);
        assert_eq!(summary.output.monthly_rows, 3);

        assert_eq!(
            summary.datasets,
            [
                DatasetSummary {
                    name: "streetlight".to_owned(),
                    counted: 1,
                    outside: 1,
                    dropped: 1,
                },
                DatasetSummary {
                    name: "bus".to_owned(),
                    counted: 1,
                    outside: 0,
                    dropped: 0,
                },
            ]
        );

        let db = &summary.path;
        assert_eq!(
            table_columns(db, FEATURES_TABLE).unwrap(),
            [
                "cell_id",
                "crime_count_total",
                "crime_burglary",
                "crime_robbery",
                "crime_assault",
                "streetlight_count",
                "bus_count",
                "geometry",
            ]
        );
        assert_eq!(scalar(db, "SELECT SUM(crime_count_total) FROM features"), 3);
        assert_eq!(scalar(db, "SELECT SUM(crime_burglary) FROM features"), 1);
        assert_eq!(scalar(db, "SELECT SUM(crime_assault) FROM features"), 0);
        assert_eq!(scalar(db, "SELECT MAX(crime_count_total) FROM features"), 2);
        assert_eq!(scalar(db, "SELECT SUM(crime_count) FROM monthly_cell_crime"), 3);
        assert_eq!(
            scalar(
                db,
                "SELECT COUNT(*) FROM features WHERE crime_count_total = 2 AND streetlight_count = 1"
            ),
            1
        );
        assert_eq!(
            scalar(
                db,
                "SELECT COUNT(*) FROM features WHERE crime_robbery = 1 AND bus_count = 1"
            ),
            1
        );
    }

    #[test]
    fn aggregate_step_reuses_the_saved_grid() {
        let tmp = tempfile::tempdir().unwrap();
        let config = fixture(tmp.path(), CRIMES);

        let (_, first) = run(&config, None).unwrap();
        let second = aggregate_step(&config, None).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn aggregate_step_without_grid_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config = fixture(tmp.path(), CRIMES);

        assert!(matches!(
            aggregate_step(&config, None),
            Err(PipelineError::Db(_))
        ));
        assert!(!config.output.database_path().exists());
    }

    #[test]
    fn crimes_outside_the_grid_give_an_empty_monthly_table() {
        let tmp = tempfile::tempdir().unwrap();
        let crimes = "Date,Primary Type,X Coordinate,Y Coordinate\n\
                      01/15/2024 02:30:00 PM,THEFT,-50,-50\n";
        let config = fixture(tmp.path(), crimes);

        let (_, summary) = run(&config, None).unwrap();
        assert_eq!(summary.stats.events_outside, 1);
        assert_eq!(summary.output.monthly_rows, 0);

        let db = &summary.path;
        assert_eq!(
            table_columns(db, MONTHLY_TABLE).unwrap(),
            crime_grid_aggregate::MONTHLY_COLUMNS
        );
        assert_eq!(scalar(db, "SELECT SUM(crime_count_total) FROM features"), 0);
    }

    #[test]
    fn geographic_boundary_is_rejected_before_any_output() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = fixture(tmp.path(), CRIMES);
        config.boundary.crs = Some("EPSG:4326".to_owned());

        assert!(matches!(run(&config, None), Err(PipelineError::Spatial(_))));
        assert!(!config.output.grid_path().exists());
        assert!(!config.output.database_path().exists());
    }

    #[test]
    fn clashing_category_columns_fail_before_any_work() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = fixture(tmp.path(), CRIMES);
        config.categories = vec!["THEFT".to_owned(), "theft".to_owned()];

        assert!(matches!(run(&config, None), Err(PipelineError::Config(_))));
        assert!(!config.output.grid_path().exists());

        config.categories = vec!["COUNT TOTAL".to_owned()];
        assert!(matches!(
            aggregate_step(&config, None),
            Err(PipelineError::Config(_))
        ));
        assert!(!config.output.database_path().exists());
    }

    #[test]
    fn missing_crime_file_aborts_without_output() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = fixture(tmp.path(), CRIMES);
        config.crimes.path = tmp.path().join("missing.csv");

        assert!(matches!(run(&config, None), Err(PipelineError::Source(_))));
        assert!(!config.output.database_path().exists());
    }
}
