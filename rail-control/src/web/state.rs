//! Application state for the web layer.

use std::sync::Arc;

use crate::handoff::MotionOutbox;
use crate::service::RailService;

use super::hub::SessionHub;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// Remote call surface
    pub service: Arc<RailService>,

    /// Live WebSocket connections and their station groups
    pub hub: Arc<SessionHub>,

    /// Commands waiting for the motion simulation to collect
    pub motion: Arc<MotionOutbox>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(service: Arc<RailService>, hub: Arc<SessionHub>, motion: Arc<MotionOutbox>) -> Self {
        Self {
            service,
            hub,
            motion,
        }
    }
}
