//! Domain types for station control.
//!
//! Identifiers enforce their invariants at construction time, so code that
//! receives them can trust they are non-empty and in canonical form.

mod ids;
mod station;
mod train;

pub use ids::{ConnectionId, InvalidIdentifier, PlayerId, TrainNumber};
pub use station::{InvalidStationId, StationId};
pub use train::Train;
