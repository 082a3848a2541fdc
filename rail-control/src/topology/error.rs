//! Topology error types.

use std::path::PathBuf;

use crate::domain::StationId;

/// Errors that can occur when loading network or layout data.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// Reading a data file failed
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data file was not valid JSON for its schema
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No layout document exists for the station
    #[error("no layout for station {0}")]
    MissingLayout(StationId),

    /// The network description is structurally unusable
    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TopologyError::MissingLayout(StationId::parse("quay").unwrap());
        assert_eq!(err.to_string(), "no layout for station QUAY");

        let err = TopologyError::InvalidNetwork("negative distance".into());
        assert_eq!(err.to_string(), "invalid network: negative distance");
    }
}
