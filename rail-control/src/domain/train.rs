//! Train records as reported by the motion simulation.

use serde::{Deserialize, Serialize};

use super::{StationId, TrainNumber};

/// A train running on the network.
///
/// Trains are owned by the motion simulation; the control core only keeps
/// this descriptive record alongside the train's protocol status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Train {
    /// Unique running number
    pub number: TrainNumber,

    /// Service type (e.g. "express", "freight")
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Line speed
    #[serde(default)]
    pub speed: f64,

    /// Number of cars
    #[serde(default)]
    pub car_count: u32,

    /// Stations the train calls at, in order
    #[serde(default)]
    pub path: Vec<StationId>,
}

impl Train {
    /// Create a train with no path.
    pub fn new(number: TrainNumber) -> Self {
        Self {
            number,
            kind: String::new(),
            speed: 0.0,
            car_count: 0,
            path: Vec::new(),
        }
    }

    /// Set the calling path.
    pub fn with_path(mut self, path: Vec<StationId>) -> Self {
        self.path = path;
        self
    }

    /// The station the train starts from, if it has a path.
    pub fn origin(&self) -> Option<&StationId> {
        self.path.first()
    }

    /// The station after `station` on this train's path.
    pub fn next_after(&self, station: &StationId) -> Option<&StationId> {
        let idx = self.path.iter().position(|s| s == station)?;
        self.path.get(idx + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    #[test]
    fn next_after_follows_path() {
        let train = Train::new(TrainNumber::parse("T1").unwrap()).with_path(vec![
            station("A"),
            station("B"),
            station("C"),
        ]);

        assert_eq!(train.origin(), Some(&station("A")));
        assert_eq!(train.next_after(&station("A")), Some(&station("B")));
        assert_eq!(train.next_after(&station("C")), None);
        assert_eq!(train.next_after(&station("Z")), None);
    }

    #[test]
    fn deserialize_from_simulation_json() {
        let json = r#"{
            "number": "T9",
            "type": "express",
            "speed": 120.0,
            "carCount": 8,
            "path": ["north", "South"]
        }"#;
        let train: Train = serde_json::from_str(json).unwrap();
        assert_eq!(train.kind, "express");
        assert_eq!(train.car_count, 8);
        assert_eq!(train.path, vec![station("NORTH"), station("SOUTH")]);
    }
}
