//! Group-messaging capability of the transport layer.

use crate::domain::{ConnectionId, StationId};

use super::event::StationEvent;

/// Directed messaging by station group.
///
/// Joining a station's group means receiving its events; leaving means no
/// longer receiving them. Membership is managed entirely by the transport.
pub trait GroupTransport: Send + Sync {
    /// Add a connection to a station's group.
    fn join_group(&self, connection: &ConnectionId, station: &StationId);

    /// Remove a connection from a station's group.
    fn leave_group(&self, connection: &ConnectionId, station: &StationId);

    /// Deliver an event to every current member of a station's group.
    fn send_to_group(&self, station: &StationId, event: &StationEvent);
}

#[cfg(test)]
pub(crate) mod recording {
    use std::collections::{HashMap, HashSet};

    use parking_lot::Mutex;

    use super::*;

    /// Transport that records group membership and sent events.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub groups: Mutex<HashMap<StationId, HashSet<ConnectionId>>>,
        pub sent: Mutex<Vec<(StationId, StationEvent)>>,
    }

    impl RecordingTransport {
        pub fn events_for(&self, station: &StationId) -> Vec<StationEvent> {
            self.sent
                .lock()
                .iter()
                .filter(|(s, _)| s == station)
                .map(|(_, e)| e.clone())
                .collect()
        }

        pub fn members(&self, station: &StationId) -> HashSet<ConnectionId> {
            self.groups.lock().get(station).cloned().unwrap_or_default()
        }
    }

    impl GroupTransport for RecordingTransport {
        fn join_group(&self, connection: &ConnectionId, station: &StationId) {
            self.groups
                .lock()
                .entry(station.clone())
                .or_default()
                .insert(connection.clone());
        }

        fn leave_group(&self, connection: &ConnectionId, station: &StationId) {
            if let Some(members) = self.groups.lock().get_mut(station) {
                members.remove(connection);
            }
        }

        fn send_to_group(&self, station: &StationId, event: &StationEvent) {
            self.sent.lock().push((station.clone(), event.clone()));
        }
    }
}
