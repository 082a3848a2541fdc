//! Data transfer objects for web requests, responses and socket frames.

use serde::{Deserialize, Serialize};

use crate::domain::StationId;
use crate::handoff::{EntryOutcome, Outcome};
use crate::notify::StationEvent;
use crate::service::{Ack, StationStatus};

/// A remote call sent by a controller over its WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ClientCall {
    JoinStation {
        player_id: String,
        station_id: String,
        player_name: String,
    },
    LeaveStation {
        player_id: String,
    },
    GetStationStatus {
        station_id: String,
    },
    ReceiveTrain {
        player_id: String,
        train_number: String,
        exit_id: String,
    },
    ReportTrainStopped {
        player_id: String,
        train_number: String,
        station_id: String,
    },
    ReportTrainDeparted {
        player_id: String,
        train_number: String,
        station_id: String,
    },
    ReportTrainCollision {
        player_id: String,
        train_a: String,
        train_b: String,
        station_id: String,
    },
    RespondApproval {
        player_id: String,
        train_number: String,
        from_station_id: String,
        approved: bool,
    },
}

impl ClientCall {
    /// The wire name of the call, echoed in its acknowledgement.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCall::JoinStation { .. } => "join_station",
            ClientCall::LeaveStation { .. } => "leave_station",
            ClientCall::GetStationStatus { .. } => "get_station_status",
            ClientCall::ReceiveTrain { .. } => "receive_train",
            ClientCall::ReportTrainStopped { .. } => "report_train_stopped",
            ClientCall::ReportTrainDeparted { .. } => "report_train_departed",
            ClientCall::ReportTrainCollision { .. } => "report_train_collision",
            ClientCall::RespondApproval { .. } => "respond_approval",
        }
    }
}

/// A frame sent from the server to a controller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame on every connection
    Welcome { connection_id: String },

    /// Reply to one `ClientCall`
    Ack {
        call: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<StationStatus>,
    },

    /// A station event pushed to its controller
    Event {
        station: StationId,
        payload: StationEvent,
    },
}

impl ServerMessage {
    /// Build an acknowledgement frame.
    pub fn ack(call: &str, ack: Ack) -> Self {
        ServerMessage::Ack {
            call: call.to_string(),
            ok: ack.ok,
            reason: ack.reason,
            status: None,
        }
    }
}

/// Request to enter a section.
#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    pub from: String,
    pub to: String,
}

/// Response to an entry request.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub outcome: EntryOutcome,
}

/// A collision reported by the simulation.
#[derive(Debug, Deserialize)]
pub struct CollisionRequest {
    pub other: String,
    pub station: String,
}

/// Response to a report.
#[derive(Debug, Serialize)]
pub struct OutcomeResponse {
    pub outcome: Outcome,
}

/// Response to registering a train.
#[derive(Debug, Serialize)]
pub struct RegisterTrainResponse {
    /// False if the train was already registered and only its record changed
    pub created: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
