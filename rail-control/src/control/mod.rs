//! Exclusive station control.
//!
//! Each station is driven by at most one player at a time. Claims, releases
//! and disconnects all go through [`StationControlRegistry`].

mod error;
mod registry;

pub use error::ControlError;
pub use registry::{ControlGrant, Player, StationControlRegistry};
