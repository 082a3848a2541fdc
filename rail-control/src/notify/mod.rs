//! Notification fan-out to station controllers.

mod dispatcher;
mod event;
mod transport;

pub use dispatcher::{NotificationDispatcher, NotificationQueue};
pub use event::{Notification, Resolution, StationEvent};
pub use transport::GroupTransport;

#[cfg(test)]
pub(crate) use transport::recording::RecordingTransport;
