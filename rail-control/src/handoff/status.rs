//! Train lifecycle states.

use serde::Serialize;

use crate::domain::{StationId, Train};

use super::motion::SectionRef;

/// Where a train is in the handoff protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainStatus {
    /// Running; advanced by the simulation each tick
    EnRoute,
    /// Waiting at a section boundary for the far controller
    AwaitingApproval,
    /// Entry was denied; the train stays short of the boundary
    Held,
    /// Stopped at a station platform
    StoppedAtStation,
    /// Left a station, not yet cleared into the next leg
    Departed,
    /// Reclaimed after its station's controller left
    ReturnedToOrigin,
    /// Terminal: excluded from all further protocol activity
    Collided,
}

impl TrainStatus {
    /// Whether the train no longer takes part in the protocol.
    pub fn is_terminal(self) -> bool {
        self == TrainStatus::Collided
    }
}

/// A registered train and its protocol state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainState {
    pub train: Train,
    pub status: TrainStatus,

    /// Station the train is physically at
    pub station: Option<StationId>,

    /// Station the train most recently departed
    pub departed_from: Option<StationId>,

    /// Section the train is waiting to enter
    pub awaiting: Option<SectionRef>,

    /// Section the train is cleared to enter
    pub cleared: Option<SectionRef>,
}

impl TrainState {
    /// A freshly registered train.
    pub fn new(train: Train) -> Self {
        Self {
            train,
            status: TrainStatus::EnRoute,
            station: None,
            departed_from: None,
            awaiting: None,
            cleared: None,
        }
    }
}

/// Whether a report changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// State changed
    Applied,
    /// Duplicate, late or otherwise stale; nothing changed
    Ignored,
}

/// Result of asking for entry into a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOutcome {
    /// The train may enter now
    Cleared,
    /// Waiting on the destination controller
    Pending,
    /// A request for this section is already waiting
    AlreadyPending,
    /// The train is out of the protocol (collided)
    Ignored,
}
