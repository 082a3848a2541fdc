//! Train handoff between stations.
//!
//! Tracks each train's protocol state and orchestrates the approval
//! coordinator and notifications as controllers and the simulation report
//! events.

mod error;
mod motion;
mod service;
mod status;

pub use error::HandoffError;
pub use motion::{
    DEFAULT_OUTBOX_CAPACITY, MotionCommand, MotionOutbox, MotionSimulation, SectionRef,
};
pub use service::{RecoveryReport, TrainHandoffService};
pub use status::{EntryOutcome, Outcome, TrainState, TrainStatus};
