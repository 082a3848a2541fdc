//! Live WebSocket sessions and their station groups.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{ConnectionId, StationId};
use crate::notify::{GroupTransport, StationEvent};

use super::dto::ServerMessage;

/// Outbound half of one connection: serialized frames for its writer task.
pub type Outbound = mpsc::UnboundedSender<String>;

#[derive(Default)]
struct Sessions {
    senders: HashMap<ConnectionId, Outbound>,
    groups: HashMap<StationId, HashSet<ConnectionId>>,
}

/// Tracks every open socket and which station groups it belongs to.
///
/// Group membership is only changed by the dispatcher through
/// [`GroupTransport`]; closing a connection drops it from every group.
#[derive(Default)]
pub struct SessionHub {
    sessions: Mutex<Sessions>,
}

impl SessionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a connection.
    pub fn register(&self, connection: ConnectionId, outbound: Outbound) {
        self.sessions.lock().senders.insert(connection, outbound);
    }

    /// Forget a connection and remove it from every group.
    pub fn unregister(&self, connection: &ConnectionId) {
        let mut sessions = self.sessions.lock();
        sessions.senders.remove(connection);
        sessions.groups.retain(|_, members| {
            members.remove(connection);
            !members.is_empty()
        });
    }

    /// Send a frame to one connection. Returns false if it is gone.
    pub fn send_to(&self, connection: &ConnectionId, message: &ServerMessage) -> bool {
        let Some(text) = encode(message) else {
            return false;
        };
        let sessions = self.sessions.lock();
        match sessions.senders.get(connection) {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        }
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.sessions.lock().senders.len()
    }

    /// Connections currently in a station's group.
    pub fn members(&self, station: &StationId) -> Vec<ConnectionId> {
        let sessions = self.sessions.lock();
        let mut members: Vec<_> = sessions
            .groups
            .get(station)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "failed to encode server message");
            None
        }
    }
}

impl GroupTransport for SessionHub {
    fn join_group(&self, connection: &ConnectionId, station: &StationId) {
        let mut sessions = self.sessions.lock();
        if !sessions.senders.contains_key(connection) {
            debug!(connection = %connection, station = %station, "join for closed connection ignored");
            return;
        }
        sessions
            .groups
            .entry(station.clone())
            .or_default()
            .insert(connection.clone());
    }

    fn leave_group(&self, connection: &ConnectionId, station: &StationId) {
        let mut sessions = self.sessions.lock();
        if let Some(members) = sessions.groups.get_mut(station) {
            members.remove(connection);
            if members.is_empty() {
                sessions.groups.remove(station);
            }
        }
    }

    fn send_to_group(&self, station: &StationId, event: &StationEvent) {
        let message = ServerMessage::Event {
            station: station.clone(),
            payload: event.clone(),
        };
        let Some(text) = encode(&message) else {
            return;
        };

        let sessions = self.sessions.lock();
        let Some(members) = sessions.groups.get(station) else {
            return;
        };
        for connection in members {
            if let Some(tx) = sessions.senders.get(connection)
                && tx.send(text.clone()).is_err()
            {
                debug!(connection = %connection, "dropped event for closing connection");
            }
        }
    }
}
