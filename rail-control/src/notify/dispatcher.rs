//! Ordered, point-to-point delivery of station events.
//!
//! Components enqueue a [`Notification`] while they still hold the lock that
//! committed the state change, so the channel order is the commit order.
//! Delivery happens later on a single consumer, which resolves the station's
//! controller at that moment: the event reaches whoever controls the
//! station when it is delivered, not when it was raised.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::control::StationControlRegistry;
use crate::domain::{ConnectionId, StationId};

use super::event::{Notification, StationEvent};
use super::transport::GroupTransport;

/// Producer side of the notification channel.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationQueue {
    /// Create a queue and the receiver its dispatcher drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue an event for a station. Never blocks.
    pub fn enqueue(&self, station: &StationId, event: StationEvent) {
        let notification = Notification {
            station: station.clone(),
            event,
        };
        if self.tx.send(notification).is_err() {
            debug!(station = %station, "dispatcher stopped, event dropped");
        }
    }
}

/// Delivers events to the controller of a station.
pub struct NotificationDispatcher {
    registry: Arc<StationControlRegistry>,
    transport: Arc<dyn GroupTransport>,
}

impl NotificationDispatcher {
    /// Create a dispatcher over the given registry and transport.
    pub fn new(registry: Arc<StationControlRegistry>, transport: Arc<dyn GroupTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Deliver an event to the station's current controller.
    ///
    /// Returns `false` when the station has no controller; the event is
    /// dropped, not queued.
    pub fn notify(&self, station: &StationId, event: &StationEvent) -> bool {
        match self.registry.controller_of(station) {
            Some(controller) => {
                debug!(station = %station, player = %controller.id, ?event, "delivering event");
                self.transport.send_to_group(station, event);
                true
            }
            None => {
                info!(station = %station, ?event, "no controller, event dropped");
                false
            }
        }
    }

    /// Subscribe a connection to a station's events.
    pub fn attach(&self, connection: &ConnectionId, station: &StationId) {
        self.transport.join_group(connection, station);
    }

    /// Unsubscribe a connection from a station's events.
    pub fn detach(&self, connection: &ConnectionId, station: &StationId) {
        self.transport.leave_group(connection, station);
    }

    /// Deliver everything currently queued. Returns the number delivered.
    pub fn drain(&self, rx: &mut mpsc::UnboundedReceiver<Notification>) -> usize {
        let mut delivered = 0;
        while let Ok(n) = rx.try_recv() {
            if self.notify(&n.station, &n.event) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver queued events until every producer is gone.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Notification>) {
        while let Some(n) = rx.recv().await {
            self.notify(&n.station, &n.event);
        }
        debug!("notification channel closed");
    }
}
