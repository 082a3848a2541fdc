//! Event payloads pushed to station controllers.

use serde::Serialize;

use crate::domain::{StationId, TrainNumber};

/// Why an approval request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The destination controller answered
    Answered,
    /// The destination controller left while the request was pending
    ControllerLeft,
    /// Nobody answered within the configured wait
    TimedOut,
    /// The train was withdrawn (collision or removal)
    Withdrawn,
}

/// A state change addressed to one station's controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StationEvent {
    /// A train asks to enter the single-track section towards this station
    ApprovalRequested {
        train: TrainNumber,
        from: StationId,
        to: StationId,
        distance: f64,
    },

    /// This station's outbound request was answered
    ApprovalResolved {
        train: TrainNumber,
        from: StationId,
        to: StationId,
        approved: bool,
        resolution: Resolution,
    },

    /// A train was accepted into this station
    TrainArrived { train: TrainNumber, exit_id: String },

    /// A train stopped at this station
    TrainStopped { train: TrainNumber },

    /// A train left this station
    TrainDeparted {
        train: TrainNumber,
        next: Option<StationId>,
    },

    /// A train left the previous station and is heading here
    TrainIncoming { train: TrainNumber, from: StationId },

    /// Two trains collided at this station
    TrainsCollided {
        first: TrainNumber,
        second: TrainNumber,
    },

    /// A train was sent back to its origin
    TrainReturned {
        train: TrainNumber,
        from: StationId,
    },
}

/// An event and the station it is addressed to.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub station: StationId,
    pub event: StationEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let event = StationEvent::TrainStopped {
            train: TrainNumber::parse("T1").unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "train_stopped");
        assert_eq!(json["train"], "T1");
    }

    #[test]
    fn resolution_is_snake_case() {
        let event = StationEvent::ApprovalResolved {
            train: TrainNumber::parse("T1").unwrap(),
            from: StationId::parse("a").unwrap(),
            to: StationId::parse("b").unwrap(),
            approved: false,
            resolution: Resolution::ControllerLeft,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["resolution"], "controller_left");
        assert_eq!(json["from"], "A");
    }
}
