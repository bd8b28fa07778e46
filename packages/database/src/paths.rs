#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the pipeline's data directory.
//!
//! Inputs live under `data/raw/`, artifacts under `data/processed/`.

use std::path::{Path, PathBuf};

/// File name of the persisted grid inside the output directory.
pub const GRID_FILE_NAME: &str = "hex_grid.geojson";

/// File name of the `DuckDB` output inside the output directory.
pub const OUTPUT_DB_FILE_NAME: &str = "features.duckdb";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`; falls back to the
/// current directory if the manifest is not nested two levels deep.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the `data/raw/` directory for input datasets.
#[must_use]
pub fn raw_dir() -> PathBuf {
    data_dir().join("raw")
}

/// Returns the `data/processed/` directory for pipeline outputs.
#[must_use]
pub fn processed_dir() -> PathBuf {
    data_dir().join("processed")
}

/// Returns the grid file path inside `output_dir`.
#[must_use]
pub fn grid_path(output_dir: &Path) -> PathBuf {
    output_dir.join(GRID_FILE_NAME)
}

/// Returns the `DuckDB` output path inside `output_dir`.
#[must_use]
pub fn output_db_path(output_dir: &Path) -> PathBuf {
    output_dir.join(OUTPUT_DB_FILE_NAME)
}

/// Returns the sibling path a file is staged at before being renamed into
/// place (`features.duckdb` -> `features.duckdb.tmp`).
#[must_use]
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_live_in_output_dir() {
        let dir = Path::new("/tmp/out");
        assert_eq!(grid_path(dir), Path::new("/tmp/out/hex_grid.geojson"));
        assert_eq!(output_db_path(dir), Path::new("/tmp/out/features.duckdb"));
        assert_eq!(
            staging_path(&output_db_path(dir)),
            Path::new("/tmp/out/features.duckdb.tmp")
        );
    }

    #[test]
    fn data_dirs_hang_off_project_root() {
        assert!(raw_dir().ends_with("data/raw"));
        assert!(processed_dir().ends_with("data/processed"));
    }

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }
}
