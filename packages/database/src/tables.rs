//! `DuckDB` output tables.
//!
//! `features` holds one row per cell: `cell_id`, the count columns of the
//! [`EnrichedGrid`] and the cell geometry as `GeoJSON` text.
//! `monthly_cell_crime` holds the sparse monthly tally. Both are written
//! into a staging file in one transaction; the staging file replaces the
//! output only after the commit succeeds.

use std::path::Path;

use crime_grid_aggregate::enriched::{CELL_ID_COLUMN, GEOMETRY_COLUMN};
use crime_grid_aggregate::{EnrichedGrid, MONTHLY_COLUMNS, MonthlyTally};
use duckdb::Connection;
use duckdb::types::Value;

use crate::DbError;
use crate::paths::{ensure_dir, staging_path};

pub const FEATURES_TABLE: &str = "features";
pub const MONTHLY_TABLE: &str = "monthly_cell_crime";

/// Row counts of a completed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSummary {
    pub feature_rows: u64,
    pub monthly_rows: u64,
}

/// Writes both output tables to a fresh `DuckDB` file at `path`.
///
/// Any existing file at `path` is replaced only if both tables were written
/// successfully; on failure it is left untouched.
///
/// # Errors
///
/// Returns [`DbError`] if the database cannot be written, a count does not
/// fit in a `BIGINT`, or the staging file cannot be renamed.
pub fn write_outputs(
    path: &Path,
    enriched: &EnrichedGrid<'_>,
    monthly: &MonthlyTally,
) -> Result<OutputSummary, DbError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let staging = staging_path(path);
    remove_stale(&staging)?;

    let summary = match write_staging(&staging, enriched, monthly) {
        Ok(summary) => summary,
        Err(e) => {
            if let Err(cleanup) = remove_stale(&staging) {
                log::warn!("Failed to remove {}: {cleanup}", staging.display());
            }
            return Err(e);
        }
    };

    std::fs::rename(&staging, path)?;
    log::info!(
        "Saved {} feature rows and {} monthly rows to {}",
        summary.feature_rows,
        summary.monthly_rows,
        path.display()
    );

    Ok(summary)
}

fn write_staging(
    path: &Path,
    enriched: &EnrichedGrid<'_>,
    monthly: &MonthlyTally,
) -> Result<OutputSummary, DbError> {
    let conn = Connection::open(path)?;

    conn.execute_batch("BEGIN TRANSACTION")?;
    let feature_rows = write_features(&conn, enriched)?;
    let monthly_rows = write_monthly(&conn, monthly)?;
    conn.execute_batch("COMMIT")?;
    conn.execute_batch("CHECKPOINT")?;

    Ok(OutputSummary {
        feature_rows,
        monthly_rows,
    })
}

fn write_features(conn: &Connection, enriched: &EnrichedGrid<'_>) -> Result<u64, DbError> {
    let count_columns = enriched.count_columns();

    let mut definitions = vec![format!("{} BIGINT PRIMARY KEY", quote(CELL_ID_COLUMN))];
    definitions.extend(
        count_columns
            .iter()
            .map(|column| format!("{} BIGINT NOT NULL", quote(column))),
    );
    definitions.push(format!("{} VARCHAR NOT NULL", quote(GEOMETRY_COLUMN)));

    conn.execute_batch(&format!(
        "CREATE TABLE {FEATURES_TABLE} ({});",
        definitions.join(", ")
    ))?;

    let placeholders = vec!["?"; count_columns.len() + 2].join(", ");
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {FEATURES_TABLE} VALUES ({placeholders})"
    ))?;

    let mut rows = 0_u64;
    for cell in enriched.grid().cells() {
        let mut values = Vec::with_capacity(count_columns.len() + 2);
        values.push(Value::BigInt(to_bigint(cell.cell_id)?));
        for count in enriched.row_counts(cell.cell_id) {
            values.push(Value::BigInt(to_bigint(count)?));
        }

        let geometry = geojson::Geometry::new(geojson::Value::from(&cell.geometry));
        values.push(Value::Text(serde_json::to_string(&geometry)?));

        stmt.execute(duckdb::params_from_iter(values))?;
        rows += 1;
    }

    Ok(rows)
}

fn write_monthly(conn: &Connection, monthly: &MonthlyTally) -> Result<u64, DbError> {
    let [cell_id, month, hour, dow, primary_type, crime_count] = MONTHLY_COLUMNS.map(quote);

    conn.execute_batch(&format!(
        "CREATE TABLE {MONTHLY_TABLE} (
            {cell_id} BIGINT NOT NULL,
            {month} VARCHAR NOT NULL,
            {hour} INTEGER NOT NULL,
            {dow} INTEGER NOT NULL,
            {primary_type} VARCHAR NOT NULL,
            {crime_count} BIGINT NOT NULL
        );"
    ))?;

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {MONTHLY_TABLE} VALUES (?, ?, ?, ?, ?, ?)"
    ))?;

    let mut rows = 0_u64;
    for row in monthly.rows() {
        stmt.execute(duckdb::params![
            to_bigint(row.cell_id)?,
            row.month.to_string(),
            i32::from(row.hour),
            i32::from(row.dow),
            row.primary_type,
            to_bigint(row.crime_count)?,
        ])?;
        rows += 1;
    }

    Ok(rows)
}

/// Column names of `table` in the `DuckDB` file at `path`, in table order.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be opened or queried.
pub fn table_columns(path: &Path, table: &str) -> Result<Vec<String>, DbError> {
    let conn = Connection::open(path)?;
    let mut stmt = conn.prepare(
        "SELECT column_name FROM information_schema.columns
         WHERE table_name = ? ORDER BY ordinal_position",
    )?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn to_bigint<T>(value: T) -> Result<i64, DbError>
where
    T: TryInto<i64> + Copy + std::fmt::Display,
{
    value
        .try_into()
        .map_err(|_| DbError::conversion(format!("{value} does not fit in BIGINT")))
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Removes a leftover staging file and its write-ahead log.
fn remove_stale(path: &Path) -> std::io::Result<()> {
    let mut wal = path.as_os_str().to_os_string();
    wal.push(".wal");

    for candidate in [path, Path::new(&wal)] {
        match std::fs::remove_file(candidate) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
