//! Coordinate reference system identifiers.
//!
//! Only the authority and code are tracked. The grid needs to know one
//! thing about a CRS: whether its units are linear (projected) or angular
//! (geographic), since hexagon diameters are given in distance units.

use std::fmt;
use std::str::FromStr;

use crate::SpatialError;

/// EPSG codes of common geographic (lat/lon) reference systems.
const GEOGRAPHIC_EPSG_CODES: &[&str] = &[
    "4326", "4269", "4258", "4267", "4283", "4230", "4617", "4674", "4019", "4322",
];

/// A named coordinate reference system such as `EPSG:3435`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crs {
    authority: String,
    code: String,
}

impl Crs {
    /// Creates an `EPSG:<code>` reference system.
    #[must_use]
    pub fn epsg(code: u32) -> Self {
        Self {
            authority: "EPSG".to_owned(),
            code: code.to_string(),
        }
    }

    /// Parses `AUTHORITY:CODE` (`EPSG:32616`) or an OGC URN
    /// (`urn:ogc:def:crs:EPSG::32616`, `urn:ogc:def:crs:OGC:1.3:CRS84`).
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Configuration`] if the name has no authority
    /// or no code.
    pub fn parse(name: &str) -> Result<Self, SpatialError> {
        let trimmed = name.trim();
        let lower = trimmed.to_ascii_lowercase();

        let (authority, code) = if lower.starts_with("urn:ogc:def:crs:") {
            let rest = &trimmed["urn:ogc:def:crs:".len()..];
            let mut parts = rest.split(':');
            let authority = parts.next().unwrap_or_default();
            let code = parts.next_back().unwrap_or_default();
            (authority, code)
        } else {
            trimmed.split_once(':').unwrap_or(("", trimmed))
        };

        if authority.is_empty() || code.is_empty() {
            return Err(SpatialError::configuration(format!(
                "unrecognized CRS name {name:?}: expected AUTHORITY:CODE"
            )));
        }

        Ok(Self {
            authority: authority.to_ascii_uppercase(),
            code: code.to_ascii_uppercase(),
        })
    }

    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether coordinates in this system are angular (degrees).
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        match self.authority.as_str() {
            "OGC" => matches!(self.code.as_str(), "CRS84" | "CRS83" | "CRS27"),
            "EPSG" => GEOGRAPHIC_EPSG_CODES.contains(&self.code.as_str()),
            _ => false,
        }
    }

    /// Whether coordinates in this system are in linear units.
    #[must_use]
    pub fn is_projected(&self) -> bool {
        !self.is_geographic()
    }

    /// The OGC URN form used in the legacy `GeoJSON` `crs` member.
    #[must_use]
    pub fn urn(&self) -> String {
        if self.authority == "OGC" {
            format!("urn:ogc:def:crs:OGC:1.3:{}", self.code)
        } else {
            format!("urn:ogc:def:crs:{}::{}", self.authority, self.code)
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl FromStr for Crs {
    type Err = SpatialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
