//! Lazy CSV reader for crime exports.
//!
//! Rows are read one batch at a time; rows without a parseable timestamp,
//! coordinates or primary type are dropped and counted rather than failing
//! the run.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crime_grid_crime_models::CrimeEvent;
use geo::Point;

use crate::parsing::{CHICAGO_TIMESTAMP_FORMAT, normalize_header, parse_coordinate, parse_timestamp};
use crate::{CrimeBatchSource, SourceError};

/// Upper bound on the capacity reserved up front for one batch.
const MAX_PREALLOCATED_EVENTS: usize = 65_536;

/// Which columns of a crime export hold which field.
///
/// Names are matched after header normalization, so `"X Coordinate"` in the
/// file matches `x_coordinate` here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrimeColumns {
    pub x: String,
    pub y: String,
    pub date: String,
    pub primary_type: String,
    /// `chrono` format string for the date column.
    pub date_format: String,
}

impl Default for CrimeColumns {
    fn default() -> Self {
        Self {
            x: "x_coordinate".to_owned(),
            y: "y_coordinate".to_owned(),
            date: "date".to_owned(),
            primary_type: "primary_type".to_owned(),
            date_format: CHICAGO_TIMESTAMP_FORMAT.to_owned(),
        }
    }
}

/// Column positions resolved against the header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    x: usize,
    y: usize,
    date: usize,
    primary_type: usize,
}

/// A [`CrimeBatchSource`] over a delimited crime export.
///
/// Holds at most `batch_size` events at a time.
pub struct CsvCrimeSource<R: Read> {
    reader: csv::Reader<R>,
    record: csv::StringRecord,
    indices: ColumnIndices,
    date_format: String,
    batch_size: usize,
    rows_read: u64,
    rows_dropped: u64,
    exhausted: bool,
}

impl CsvCrimeSource<File> {
    /// Opens a crime export on disk.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the file cannot be opened, the header
    /// cannot be read, or a configured column is missing.
    pub fn open(
        path: &Path,
        columns: &CrimeColumns,
        batch_size: usize,
    ) -> Result<Self, SourceError> {
        log::info!("Opening crime export {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(file, columns, batch_size)
    }
}

impl<R: Read> CsvCrimeSource<R> {
    /// Wraps any reader producing CSV with a header row.
    ///
    /// A `batch_size` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the header cannot be read or a configured
    /// column is missing.
    pub fn from_reader(
        reader: R,
        columns: &CrimeColumns,
        batch_size: usize,
    ) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
        let find = |name: &str| -> Result<usize, SourceError> {
            let wanted = normalize_header(name);
            headers
                .iter()
                .position(|h| *h == wanted)
                .ok_or_else(|| SourceError::MissingColumn {
                    name: wanted,
                    available: headers.join(", "),
                })
        };

        let indices = ColumnIndices {
            x: find(&columns.x)?,
            y: find(&columns.y)?,
            date: find(&columns.date)?,
            primary_type: find(&columns.primary_type)?,
        };
        log::debug!("Resolved crime columns {indices:?} from header {headers:?}");

        Ok(Self {
            reader,
            record: csv::StringRecord::new(),
            indices,
            date_format: columns.date_format.clone(),
            batch_size: batch_size.max(1),
            rows_read: 0,
            rows_dropped: 0,
            exhausted: false,
        })
    }

    /// Data rows read so far, kept or dropped.
    #[must_use]
    pub const fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Rows dropped for a missing or unparseable field.
    #[must_use]
    pub const fn rows_dropped(&self) -> u64 {
        self.rows_dropped
    }

    fn parse_record(&self) -> Option<CrimeEvent> {
        let record = &self.record;
        let x = parse_coordinate(record.get(self.indices.x)?)?;
        let y = parse_coordinate(record.get(self.indices.y)?)?;
        let at = parse_timestamp(record.get(self.indices.date)?, &self.date_format)?;
        let primary_type = record.get(self.indices.primary_type)?.trim();
        if primary_type.is_empty() {
            return None;
        }

        Some(CrimeEvent::at(Point::new(x, y), primary_type, at))
    }
}

impl<R: Read> CrimeBatchSource for CsvCrimeSource<R> {
    fn next_batch(&mut self) -> Result<Option<Vec<CrimeEvent>>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut batch = Vec::with_capacity(self.batch_size.min(MAX_PREALLOCATED_EVENTS));

        while batch.len() < self.batch_size {
            if !self.reader.read_record(&mut self.record)? {
                self.exhausted = true;
                break;
            }
            self.rows_read += 1;

            match self.parse_record() {
                Some(event) => batch.push(event),
                None => self.rows_dropped += 1,
            }
        }

        if batch.is_empty() {
            log::debug!(
                "Crime export exhausted after {} rows ({} dropped)",
                self.rows_read,
                self.rows_dropped
            );
            return Ok(None);
        }

        Ok(Some(batch))
    }
}
