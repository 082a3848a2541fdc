//! WebSocket sessions for station controllers.
//!
//! Each socket gets a fresh [`ConnectionId`]. Inbound text frames are
//! parsed as [`ClientCall`]s and answered with an ack frame; station events
//! reach the socket through the [`SessionHub`](super::hub::SessionHub).

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::ConnectionId;
use crate::service::{Ack, RailService};

use super::dto::{ClientCall, ServerMessage};
use super::state::AppState;

/// Upgrade an HTTP request to a controller socket.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection = ConnectionId::generate();
    let (mut ws_write, mut ws_read) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    state.hub.register(connection.clone(), tx);
    info!(connection = %connection, "controller connected");
    state.hub.send_to(
        &connection,
        &ServerMessage::Welcome {
            connection_id: connection.to_string(),
        },
    );

    while let Some(frame) = ws_read.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(connection = %connection, error = %e, "socket read failed");
                break;
            }
        };

        let reply = handle_frame(&state.service, &connection, &text);
        state.hub.send_to(&connection, &reply);
    }

    // Release the player's station before the hub forgets the socket.
    if let Some(report) = state.service.disconnect_connection(&connection) {
        debug!(
            connection = %connection,
            denied = report.denied.len(),
            returned = report.returned.len(),
            "connection recovery"
        );
    }
    state.hub.unregister(&connection);
    writer.abort();
    info!(connection = %connection, "controller disconnected");
}

/// Parse one inbound text frame and answer it.
pub fn handle_frame(
    service: &RailService,
    connection: &ConnectionId,
    text: &str,
) -> ServerMessage {
    match serde_json::from_str::<ClientCall>(text) {
        Ok(call) => handle_call(service, connection, call),
        Err(e) => {
            warn!(connection = %connection, error = %e, "malformed call");
            ServerMessage::ack("unknown", Ack::fail(format!("malformed call: {e}")))
        }
    }
}

/// Run one call against the service and build its acknowledgement.
pub fn handle_call(
    service: &RailService,
    connection: &ConnectionId,
    call: ClientCall,
) -> ServerMessage {
    let name = call.name();
    let ack: Ack = match call {
        ClientCall::JoinStation {
            player_id,
            station_id,
            player_name,
        } => service
            .join_station(connection, &player_id, &station_id, &player_name)
            .into(),
        ClientCall::LeaveStation { player_id } => service.leave_station(&player_id).into(),
        ClientCall::GetStationStatus { station_id } => {
            return match service.station_status(&station_id) {
                Ok(status) => ServerMessage::Ack {
                    call: name.to_string(),
                    ok: true,
                    reason: None,
                    status: Some(status),
                },
                Err(e) => ServerMessage::ack(name, Ack::fail(e.to_string())),
            };
        }
        ClientCall::ReceiveTrain {
            player_id,
            train_number,
            exit_id,
        } => service
            .receive_train(&player_id, &train_number, &exit_id)
            .into(),
        ClientCall::ReportTrainStopped {
            player_id,
            train_number,
            station_id,
        } => service
            .report_train_stopped(&player_id, &train_number, &station_id)
            .into(),
        ClientCall::ReportTrainDeparted {
            player_id,
            train_number,
            station_id,
        } => service
            .report_train_departed(&player_id, &train_number, &station_id)
            .into(),
        ClientCall::ReportTrainCollision {
            player_id,
            train_a,
            train_b,
            station_id,
        } => service
            .report_train_collision(&player_id, &train_a, &train_b, &station_id)
            .into(),
        ClientCall::RespondApproval {
            player_id,
            train_number,
            from_station_id,
            approved,
        } => service
            .respond_approval(&player_id, &train_number, &from_station_id, approved)
            .into(),
    };

    if let Some(reason) = &ack.reason {
        debug!(connection = %connection, call = name, reason = %reason, "call refused");
    }
    ServerMessage::ack(name, ack)
}
