//! Network description: stations and directed sections.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::StationId;

use super::error::TopologyError;

/// How many trains a section can carry at once, when the data says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    /// One train at a time; entry needs the far controller's approval
    Single,
    /// Independent tracks per direction
    Double,
}

/// A directed connection between two stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Departure end
    pub from: StationId,

    /// Arrival end
    pub to: StationId,

    /// Base length, excluding the station throats
    pub distance: f64,

    /// Number of signal blocks along the section
    #[serde(default)]
    pub block_count: u32,

    /// Explicit track mode, if the source data carries one
    #[serde(default)]
    pub mode: Option<TrackMode>,
}

impl Section {
    /// Create a section with no explicit mode.
    pub fn new(from: StationId, to: StationId, distance: f64) -> Self {
        Self {
            from,
            to,
            distance,
            block_count: 1,
            mode: None,
        }
    }

    /// Set the explicit track mode.
    pub fn with_mode(mut self, mode: TrackMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Whether this section joins `a` and `b` in either direction.
    pub fn joins(&self, a: &StationId, b: &StationId) -> bool {
        (&self.from == a && &self.to == b) || (&self.from == b && &self.to == a)
    }
}

/// On-disk network description.
#[derive(Debug, Deserialize)]
struct NetworkFile {
    #[serde(default)]
    stations: Vec<StationId>,
    #[serde(default)]
    connections: Vec<Section>,
}

/// The set of stations and the ordered list of sections between them.
///
/// Immutable once built. Station order is the order stations were first
/// declared (or first mentioned by a section), and is used only as the
/// stable fallback when deriving a display order.
#[derive(Debug, Clone, Default)]
pub struct Network {
    stations: Vec<StationId>,
    sections: Vec<Section>,
}

impl Network {
    /// Build a network. Stations referenced only by sections are appended.
    pub fn new(stations: Vec<StationId>, sections: Vec<Section>) -> Result<Self, TopologyError> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::with_capacity(stations.len());

        for station in stations {
            if seen.insert(station.clone()) {
                ordered.push(station);
            }
        }

        for section in &sections {
            if !section.distance.is_finite() || section.distance < 0.0 {
                return Err(TopologyError::InvalidNetwork(format!(
                    "section {} -> {} has distance {}",
                    section.from, section.to, section.distance
                )));
            }
            if section.from == section.to {
                return Err(TopologyError::InvalidNetwork(format!(
                    "section {} loops onto itself",
                    section.from
                )));
            }
            for end in [&section.from, &section.to] {
                if seen.insert(end.clone()) {
                    ordered.push(end.clone());
                }
            }
        }

        Ok(Self {
            stations: ordered,
            sections,
        })
    }

    /// Parse a network description from JSON text.
    pub fn from_json(json: &str, origin: &Path) -> Result<Self, TopologyError> {
        let file: NetworkFile = serde_json::from_str(json).map_err(|source| TopologyError::Json {
            path: origin.to_path_buf(),
            source,
        })?;
        Self::new(file.stations, file.connections)
    }

    /// Load a network description from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json, path)
    }

    /// All stations in declaration order.
    pub fn stations(&self) -> &[StationId] {
        &self.stations
    }

    /// All sections in declaration order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Whether the station is part of this network.
    pub fn contains(&self, station: &StationId) -> bool {
        self.stations.contains(station)
    }
}
