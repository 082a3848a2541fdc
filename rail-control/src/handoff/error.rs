//! Train handoff error types.

use crate::domain::{StationId, TrainNumber};

/// A report referenced something the core does not know.
///
/// These are local diagnostics only; they are never forwarded to other
/// controllers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandoffError {
    /// No train with this number is registered
    #[error("unknown train {0}")]
    UnknownTrain(TrainNumber),

    /// The station is not part of the network
    #[error("unknown station {0}")]
    UnknownStation(StationId),
}
