//! Cross-station authorisation for single-track sections.
//!
//! A train may only enter a single-track section once the controller of the
//! station at the far end has signed off. Requests never block: entry
//! returns a pending marker immediately and the answer arrives later as an
//! independent call. Anything that leaves a request unanswered (controller
//! leaving, timeout, train withdrawn) resolves it to denied.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{StationId, TrainNumber};
use crate::notify::{NotificationQueue, Resolution, StationEvent};
use crate::topology::NetworkTopology;

use super::config::ApprovalConfig;

/// Lifecycle of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
}

/// A request to enter the section `from -> to`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub train: TrainNumber,
    pub from: StationId,
    pub to: StationId,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    requested_at: Instant,
}

/// Outcome of asking to enter a section.
#[derive(Debug, Clone)]
pub enum EntryDecision {
    /// The section is not exclusive; the train may proceed
    Clear,
    /// A new request is waiting on the destination controller
    Pending(ApprovalRequest),
}

/// Errors from requesting entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    /// A request for this train and destination is already pending
    #[error("train {train} already has a pending request for {to}")]
    DuplicatePending { train: TrainNumber, to: StationId },
}

type RequestKey = (TrainNumber, StationId);

/// Holds pending approval requests, at most one per (train, destination).
pub struct ApprovalCoordinator {
    topology: Arc<NetworkTopology>,
    config: ApprovalConfig,
    requests: Mutex<HashMap<RequestKey, ApprovalRequest>>,
    queue: NotificationQueue,
}

impl ApprovalCoordinator {
    /// Create a coordinator.
    pub fn new(
        topology: Arc<NetworkTopology>,
        config: ApprovalConfig,
        queue: NotificationQueue,
    ) -> Self {
        Self {
            topology,
            config,
            requests: Mutex::new(HashMap::new()),
            queue,
        }
    }

    /// Ask for `train` to enter the section `from -> to`.
    ///
    /// Non-exclusive sections are cleared immediately. For single-track
    /// sections a pending request is recorded and the destination
    /// controller is notified.
    pub fn request_entry(
        &self,
        train: &TrainNumber,
        from: &StationId,
        to: &StationId,
    ) -> Result<EntryDecision, ApprovalError> {
        if !self.topology.is_single_track(from, to) {
            debug!(train = %train, from = %from, to = %to, "section not exclusive, cleared");
            return Ok(EntryDecision::Clear);
        }

        // Computed before locking: may read layout files
        let distance = self.topology.section_distance(from, to);

        let mut requests = self.requests.lock();
        let key = (train.clone(), to.clone());
        if requests.contains_key(&key) {
            debug!(train = %train, to = %to, "duplicate entry request rejected");
            return Err(ApprovalError::DuplicatePending {
                train: train.clone(),
                to: to.clone(),
            });
        }

        let request = ApprovalRequest {
            train: train.clone(),
            from: from.clone(),
            to: to.clone(),
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
            requested_at: Instant::now(),
        };
        requests.insert(key, request.clone());
        self.queue.enqueue(
            to,
            StationEvent::ApprovalRequested {
                train: train.clone(),
                from: from.clone(),
                to: to.clone(),
                distance,
            },
        );

        info!(train = %train, from = %from, to = %to, "approval requested");
        Ok(EntryDecision::Pending(request))
    }

    /// Answer the pending request for `train` from `from` into `to`.
    ///
    /// Returns the resolved (and now discarded) request, or `None` if no
    /// matching request is pending. Late or duplicate answers are no-ops.
    pub fn resolve(
        &self,
        train: &TrainNumber,
        from: &StationId,
        to: &StationId,
        approved: bool,
    ) -> Option<ApprovalRequest> {
        let mut requests = self.requests.lock();
        let key = (train.clone(), to.clone());

        if requests.get(&key).is_none_or(|r| &r.from != from) {
            debug!(train = %train, from = %from, to = %to, "no matching pending request");
            return None;
        }

        let request = requests.remove(&key)?;
        Some(self.finish(request, approved, Resolution::Answered))
    }

    /// Deny every request addressed to `station`.
    ///
    /// Called when the station's controller goes away.
    pub fn deny_for_destination(&self, station: &StationId) -> Vec<ApprovalRequest> {
        self.deny_where(|r| &r.to == station, Resolution::ControllerLeft)
    }

    /// Deny every request made by `train`.
    pub fn withdraw_train(&self, train: &TrainNumber) -> Vec<ApprovalRequest> {
        self.deny_where(|r| &r.train == train, Resolution::Withdrawn)
    }

    /// Deny the request `train` made for the section `from -> to`, if any.
    ///
    /// Used when the train no longer waits at that boundary.
    pub fn withdraw_section(
        &self,
        train: &TrainNumber,
        from: &StationId,
        to: &StationId,
    ) -> Option<ApprovalRequest> {
        self.deny_where(
            |r| &r.train == train && &r.from == from && &r.to == to,
            Resolution::Withdrawn,
        )
        .pop()
    }

    /// Deny every request that has waited longer than the configured maximum.
    pub fn expire_overdue(&self, now: Instant) -> Vec<ApprovalRequest> {
        let max_wait = self.config.max_wait;
        self.deny_where(
            |r| now.saturating_duration_since(r.requested_at) >= max_wait,
            Resolution::TimedOut,
        )
    }

    /// The pending request for a train and destination.
    pub fn pending(&self, train: &TrainNumber, to: &StationId) -> Option<ApprovalRequest> {
        self.requests.lock().get(&(train.clone(), to.clone())).cloned()
    }

    /// All requests waiting on `station`'s controller, oldest first.
    pub fn pending_for(&self, station: &StationId) -> Vec<ApprovalRequest> {
        let requests = self.requests.lock();
        let mut found: Vec<ApprovalRequest> =
            requests.values().filter(|r| &r.to == station).cloned().collect();
        found.sort_by_key(|r| r.requested_at);
        found
    }

    /// Number of pending requests.
    pub fn pending_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn deny_where(
        &self,
        predicate: impl Fn(&ApprovalRequest) -> bool,
        resolution: Resolution,
    ) -> Vec<ApprovalRequest> {
        let mut requests = self.requests.lock();
        let keys: Vec<RequestKey> = requests
            .iter()
            .filter(|(_, r)| predicate(r))
            .map(|(k, _)| k.clone())
            .collect();

        let mut denied: Vec<ApprovalRequest> = keys
            .into_iter()
            .filter_map(|k| requests.remove(&k))
            .collect();
        denied.sort_by_key(|r| r.requested_at);

        denied
            .into_iter()
            .map(|r| self.finish(r, false, resolution))
            .collect()
    }

    /// Mark a removed request resolved and tell the requesting station.
    /// Must be called with the request table locked.
    fn finish(
        &self,
        mut request: ApprovalRequest,
        approved: bool,
        resolution: Resolution,
    ) -> ApprovalRequest {
        request.status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Denied
        };
        self.queue.enqueue(
            &request.from,
            StationEvent::ApprovalResolved {
                train: request.train.clone(),
                from: request.from.clone(),
                to: request.to.clone(),
                approved,
                resolution,
            },
        );
        info!(
            train = %request.train,
            from = %request.from,
            to = %request.to,
            approved,
            ?resolution,
            "approval resolved"
        );
        request
    }
}
