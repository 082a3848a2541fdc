//! Web layer for the rail control server.
//!
//! Controllers talk to the server over a WebSocket at `/ws`; the motion
//! simulation and dashboards use the JSON endpoints under `/api`.

mod dto;
mod hub;
mod routes;
mod socket;
mod state;

pub use dto::*;
pub use hub::{Outbound, SessionHub};
pub use routes::{AppError, create_router};
pub use socket::{handle_call, handle_frame};
pub use state::AppState;
