//! Station control error types.

use crate::domain::{PlayerId, StationId};

/// Reasons a station control request can be refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// Another active player already controls the station
    #[error("station {station} is already controlled by {controller}")]
    StationControlled {
        station: StationId,
        controller: String,
    },

    /// The player does not control any station
    #[error("player {0} does not control a station")]
    NoStation(PlayerId),

    /// The player controls a different station from the one named
    #[error("player {player} does not control station {station}")]
    NotController { player: PlayerId, station: StationId },
}
