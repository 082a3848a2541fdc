//! Approval handshake for entering exclusive sections.

mod config;
mod coordinator;

pub use config::ApprovalConfig;
pub use coordinator::{
    ApprovalCoordinator, ApprovalError, ApprovalRequest, ApprovalStatus, EntryDecision,
};
