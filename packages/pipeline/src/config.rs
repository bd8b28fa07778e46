//! Pipeline configuration, read from TOML.
//!
//! Every key is optional. Defaults follow the `data/raw` / `data/processed`
//! layout and the Chicago crime export's column names:
//!
//! ```toml
//! hex_diameter = 500.0
//! batch_size = 500000
//! categories = ["BURGLARY", "ROBBERY", "ASSAULT"]
//!
//! [boundary]
//! path = "raw/city_limits.geojson"
//! crs = "EPSG:3435"
//!
//! [crimes]
//! path = "raw/crimes.csv"
//! date_format = "%m/%d/%Y %I:%M:%S %p"
//!
//! [[environment]]
//! name = "streetlight"
//! path = "raw/street_lights_all_out.csv"
//!
//! [output]
//! dir = "processed"
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use std::path::{Path, PathBuf};

use crime_grid_aggregate::enriched::{
    CELL_ID_COLUMN, GEOMETRY_COLUMN, TOTAL_COLUMN, environment_column,
};
use crime_grid_crime_models::{DefaultCategory, category_column, column_slug};
use crime_grid_database::paths;
use crime_grid_source::parsing::CHICAGO_TIMESTAMP_FORMAT;
use crime_grid_source::{CrimeColumns, PointColumns, PointFormat};
use crime_grid_spatial::Crs;
use serde::{Deserialize, Serialize};

/// Default vertex-to-vertex hexagon diameter, in CRS units.
pub const DEFAULT_HEX_DIAMETER: f64 = 500.0;

/// Default number of crime rows held in memory at once.
pub const DEFAULT_BATCH_SIZE: usize = 500_000;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML or has unknown keys.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range or inconsistent.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub hex_diameter: f64,
    pub batch_size: usize,
    /// Tracked categories, each getting a `crime_<category>` column.
    pub categories: Vec<String>,
    pub boundary: BoundaryConfig,
    pub crimes: CrimesConfig,
    /// Auxiliary point datasets, each getting a `<name>_count` column.
    pub environment: Vec<EnvironmentDataset>,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hex_diameter: DEFAULT_HEX_DIAMETER,
            batch_size: DEFAULT_BATCH_SIZE,
            categories: DefaultCategory::labels(),
            boundary: BoundaryConfig::default(),
            crimes: CrimesConfig::default(),
            environment: EnvironmentDataset::defaults(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundaryConfig {
    /// `GeoJSON` file with the boundary polygon(s).
    pub path: PathBuf,
    /// CRS of the boundary, overriding the file's `crs` member.
    pub crs: Option<String>,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            path: paths::raw_dir().join("city_limits.geojson"),
            crs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrimesConfig {
    pub path: PathBuf,
    pub x_column: String,
    pub y_column: String,
    pub date_column: String,
    pub type_column: String,
    pub date_format: String,
}

impl Default for CrimesConfig {
    fn default() -> Self {
        let columns = CrimeColumns::default();
        Self {
            path: paths::raw_dir().join("crimes.csv"),
            x_column: columns.x,
            y_column: columns.y,
            date_column: columns.date,
            type_column: columns.primary_type,
            date_format: CHICAGO_TIMESTAMP_FORMAT.to_owned(),
        }
    }
}

impl CrimesConfig {
    #[must_use]
    pub fn columns(&self) -> CrimeColumns {
        CrimeColumns {
            x: self.x_column.clone(),
            y: self.y_column.clone(),
            date: self.date_column.clone(),
            primary_type: self.type_column.clone(),
            date_format: self.date_format.clone(),
        }
    }
}

/// One auxiliary point dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentDataset {
    pub name: String,
    pub path: PathBuf,
    /// Inferred from the file extension when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PointFormat>,
    #[serde(default = "default_x_column")]
    pub x_column: String,
    #[serde(default = "default_y_column")]
    pub y_column: String,
}

fn default_x_column() -> String {
    PointColumns::default().x
}

fn default_y_column() -> String {
    PointColumns::default().y
}

impl EnvironmentDataset {
    /// Streetlight outages and bus stops under `data/raw/`.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                name: "streetlight".to_owned(),
                path: paths::raw_dir().join("street_lights_all_out.csv"),
                format: Some(PointFormat::Csv),
                x_column: default_x_column(),
                y_column: default_y_column(),
            },
            Self {
                name: "bus".to_owned(),
                path: paths::raw_dir().join("cta_bus_stops.geojson"),
                format: Some(PointFormat::Geojson),
                x_column: default_x_column(),
                y_column: default_y_column(),
            },
        ]
    }

    /// The configured format, or the one implied by the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if neither is available.
    pub fn resolved_format(&self) -> Result<PointFormat, ConfigError> {
        self.format
            .or_else(|| PointFormat::from_path(&self.path))
            .ok_or_else(|| {
                ConfigError::invalid(format!(
                    "cannot infer format of dataset {:?} from {}; set `format`",
                    self.name,
                    self.path.display()
                ))
            })
    }

    #[must_use]
    pub fn columns(&self) -> PointColumns {
        PointColumns {
            x: self.x_column.clone(),
            y: self.y_column.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory receiving the grid file and the `DuckDB` output.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: paths::processed_dir(),
        }
    }
}

impl OutputConfig {
    #[must_use]
    pub fn grid_path(&self) -> PathBuf {
        paths::grid_path(&self.dir)
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        paths::output_db_path(&self.dir)
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document. Relative paths are left as
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed or a value is
    /// invalid.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a config file, resolving relative paths against its directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        log::debug!("Loaded config from {}: {config:?}", path.display());
        Ok(config)
    }

    /// Reads `path` if given, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be loaded.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Joins every relative path onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.boundary.path);
        resolve(&mut self.crimes.path);
        resolve(&mut self.output.dir);
        for dataset in &mut self.environment {
            resolve(&mut dataset.path);
        }
    }

    /// Checks value ranges and column-name consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.hex_diameter.is_finite() || self.hex_diameter <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "hex_diameter must be a positive number, got {}",
                self.hex_diameter
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size must be at least 1"));
        }
        if let Some(name) = &self.boundary.crs {
            Crs::parse(name).map_err(|e| ConfigError::invalid(e.to_string()))?;
        }

        let mut columns: Vec<String> = [CELL_ID_COLUMN, TOTAL_COLUMN, GEOMETRY_COLUMN]
            .iter()
            .map(|&c| c.to_owned())
            .collect();

        let mut tracked: Vec<&str> = Vec::new();
        for category in &self.categories {
            if tracked.contains(&category.as_str()) {
                continue;
            }
            if column_slug(category).is_empty() {
                return Err(ConfigError::invalid(format!(
                    "category {category:?} has no alphanumeric characters"
                )));
            }

            let column = category_column(category);
            if columns.contains(&column) {
                return Err(ConfigError::invalid(format!(
                    "category {category:?} maps to the column {column}, which is already taken"
                )));
            }
            columns.push(column);
            tracked.push(category);
        }

        for dataset in &self.environment {
            if column_slug(&dataset.name).is_empty() {
                return Err(ConfigError::invalid(format!(
                    "environment dataset name {:?} is empty",
                    dataset.name
                )));
            }
            dataset.resolved_format()?;

            let column = environment_column(&dataset.name);
            if columns.contains(&column) {
                return Err(ConfigError::invalid(format!(
                    "environment dataset {:?} maps to the column {column}, which is already taken",
                    dataset.name
                )));
            }
            columns.push(column);
        }

        Ok(())
    }

    /// The configured boundary CRS, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the name cannot be parsed.
    pub fn boundary_crs(&self) -> Result<Option<Crs>, ConfigError> {
        self.boundary
            .crs
            .as_deref()
            .map(|name| Crs::parse(name).map_err(|e| ConfigError::invalid(e.to_string())))
            .transpose()
    }
}
