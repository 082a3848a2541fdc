//! Per-station track layouts.
//!
//! The only layout field the control core needs is the exit span: the
//! distance from a station's centre to its outermost exit boundary.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::StationId;

use super::error::TopologyError;

/// Source of station exit spans.
///
/// This abstraction allows topology queries to be tested without layout
/// files on disk.
pub trait LayoutSource: Send + Sync {
    /// Fetch the exit span for a station.
    fn exit_span(&self, station: &StationId) -> Result<f64, TopologyError>;
}

/// The subset of a station layout document we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationLayout {
    max_exit_distance: f64,
}

/// Layout documents stored as `{STATION}.json` files in one directory.
///
/// File names are matched case-insensitively against the station id.
#[derive(Debug, Clone)]
pub struct LayoutDirectory {
    dir: PathBuf,
}

impl LayoutDirectory {
    /// Create a layout source rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Find the layout file for a station.
    fn locate(&self, station: &StationId) -> Result<PathBuf, TopologyError> {
        let direct = self.dir.join(format!("{}.json", station.as_str()));
        if direct.is_file() {
            return Ok(direct);
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|source| TopologyError::Io {
            path: self.dir.clone(),
            source,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let matches = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| StationId::parse(s).ok())
                .is_some_and(|id| &id == station);
            if matches {
                return Ok(path);
            }
        }

        Err(TopologyError::MissingLayout(station.clone()))
    }
}

impl LayoutSource for LayoutDirectory {
    fn exit_span(&self, station: &StationId) -> Result<f64, TopologyError> {
        let path = self.locate(station)?;
        let json = std::fs::read_to_string(&path).map_err(|source| TopologyError::Io {
            path: path.clone(),
            source,
        })?;
        let layout: StationLayout =
            serde_json::from_str(&json).map_err(|source| TopologyError::Json { path, source })?;
        checked_span(station, layout.max_exit_distance)
    }
}

/// An exit span must be a finite, non-negative distance.
fn checked_span(station: &StationId, span: f64) -> Result<f64, TopologyError> {
    if span.is_finite() && span >= 0.0 {
        Ok(span)
    } else {
        Err(TopologyError::InvalidNetwork(format!(
            "station {station} has exit span {span}"
        )))
    }
}

/// Exit spans held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLayouts {
    spans: HashMap<StationId, f64>,
}

impl InMemoryLayouts {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a station's exit span.
    pub fn insert(&mut self, station: StationId, span: f64) {
        self.spans.insert(station, span);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, station: StationId, span: f64) -> Self {
        self.insert(station, span);
        self
    }
}

impl LayoutSource for InMemoryLayouts {
    fn exit_span(&self, station: &StationId) -> Result<f64, TopologyError> {
        let span = self
            .spans
            .get(station)
            .copied()
            .ok_or_else(|| TopologyError::MissingLayout(station.clone()))?;
        checked_span(station, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn station(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    #[test]
    fn reads_max_exit_distance() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("QUAY.json"),
            r#"{"name": "Quay", "maxExitDistance": 60.5, "tracks": []}"#,
        )
        .unwrap();

        let layouts = LayoutDirectory::new(dir.path());
        assert_eq!(layouts.exit_span(&station("quay")).unwrap(), 60.5);
    }

    #[test]
    fn file_names_match_case_insensitively() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Mill.json"), r#"{"maxExitDistance": 40}"#).unwrap();

        let layouts = LayoutDirectory::new(dir.path());
        assert_eq!(layouts.exit_span(&station("MILL")).unwrap(), 40.0);
    }

    #[test]
    fn missing_layout() {
        let dir = tempdir().unwrap();
        let layouts = LayoutDirectory::new(dir.path());
        assert!(matches!(
            layouts.exit_span(&station("NOWHERE")),
            Err(TopologyError::MissingLayout(_))
        ));
    }

    #[test]
    fn malformed_layout() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("BAD.json"), r#"{"tracks": []}"#).unwrap();

        let layouts = LayoutDirectory::new(dir.path());
        assert!(matches!(
            layouts.exit_span(&station("bad")),
            Err(TopologyError::Json { .. })
        ));
    }

    #[test]
    fn negative_exit_span_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("SLIP.json"), r#"{"maxExitDistance": -25}"#).unwrap();

        let layouts = LayoutDirectory::new(dir.path());
        assert!(matches!(
            layouts.exit_span(&station("slip")),
            Err(TopologyError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn non_finite_in_memory_span_is_rejected() {
        let layouts = InMemoryLayouts::new()
            .with(station("A"), f64::NAN)
            .with(station("B"), f64::INFINITY);
        assert!(layouts.exit_span(&station("A")).is_err());
        assert!(layouts.exit_span(&station("B")).is_err());
    }

    #[test]
    fn in_memory_lookup() {
        let layouts = InMemoryLayouts::new().with(station("A"), 12.0);
        assert_eq!(layouts.exit_span(&station("a")).unwrap(), 12.0);
        assert!(layouts.exit_span(&station("b")).is_err());
    }
}
