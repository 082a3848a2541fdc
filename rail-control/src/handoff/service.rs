//! Train lifecycle state machine.
//!
//! ```text
//! EnRoute -> AwaitingApproval -> EnRoute (approved) | Held (denied)
//! EnRoute -> StoppedAtStation -> Departed -> EnRoute (next leg)
//! any     -> ReturnedToOrigin (controller left while train at station)
//! any     -> Collided (terminal)
//! ```
//!
//! The train table and the approval table have separate locks and are never
//! held together. Calls into the motion simulation happen after the train
//! table lock is released.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::approval::{ApprovalCoordinator, ApprovalRequest, ApprovalStatus, EntryDecision};
use crate::domain::{StationId, Train, TrainNumber};
use crate::notify::{NotificationQueue, StationEvent};
use crate::topology::NetworkTopology;

use super::error::HandoffError;
use super::motion::{MotionSimulation, SectionRef};
use super::status::{EntryOutcome, Outcome, TrainState, TrainStatus};

/// What recovery did after a station's controller left.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Requests addressed to the station, now denied
    pub denied: Vec<ApprovalRequest>,
    /// Trains at the station sent back to their origin
    pub returned: Vec<TrainNumber>,
}

/// Drives trains through the handoff protocol.
pub struct TrainHandoffService {
    topology: Arc<NetworkTopology>,
    approvals: Arc<ApprovalCoordinator>,
    motion: Arc<dyn MotionSimulation>,
    queue: NotificationQueue,
    trains: Mutex<HashMap<TrainNumber, TrainState>>,
}

impl TrainHandoffService {
    /// Create a handoff service.
    pub fn new(
        topology: Arc<NetworkTopology>,
        approvals: Arc<ApprovalCoordinator>,
        motion: Arc<dyn MotionSimulation>,
        queue: NotificationQueue,
    ) -> Self {
        Self {
            topology,
            approvals,
            motion,
            queue,
            trains: Mutex::new(HashMap::new()),
        }
    }

    fn check_station(&self, station: &StationId) -> Result<(), HandoffError> {
        if self.topology.contains(station) {
            Ok(())
        } else {
            warn!(station = %station, "report names unknown station");
            Err(HandoffError::UnknownStation(station.clone()))
        }
    }

    fn unknown_train(train: &TrainNumber) -> HandoffError {
        warn!(train = %train, "report names unknown train");
        HandoffError::UnknownTrain(train.clone())
    }

    // ---- Simulation-facing train set ----

    /// Start tracking a train. Re-registering updates the train record and
    /// keeps its protocol state. Returns true if the train was new.
    pub fn register_train(&self, train: Train) -> bool {
        let mut trains = self.trains.lock();
        match trains.get_mut(&train.number) {
            Some(state) => {
                debug!(train = %train.number, "train record updated");
                state.train = train;
                false
            }
            None => {
                info!(train = %train.number, "train registered");
                trains.insert(train.number.clone(), TrainState::new(train));
                true
            }
        }
    }

    /// Stop tracking a train and withdraw its pending requests.
    pub fn remove_train(&self, train: &TrainNumber) -> Option<TrainState> {
        let removed = self.trains.lock().remove(train);
        if removed.is_some() {
            info!(train = %train, "train removed");
            self.approvals.withdraw_train(train);
        }
        removed
    }

    /// Current state of one train.
    pub fn train(&self, train: &TrainNumber) -> Option<TrainState> {
        self.trains.lock().get(train).cloned()
    }

    /// Current status of one train.
    pub fn train_status(&self, train: &TrainNumber) -> Option<TrainStatus> {
        self.trains.lock().get(train).map(|s| s.status)
    }

    /// All trains, ordered by number.
    pub fn snapshot(&self) -> Vec<TrainState> {
        let mut all: Vec<TrainState> = self.trains.lock().values().cloned().collect();
        all.sort_by(|a, b| a.train.number.cmp(&b.train.number));
        all
    }

    /// Trains physically at a station, ordered by number.
    pub fn trains_at(&self, station: &StationId) -> Vec<TrainNumber> {
        let mut found: Vec<TrainNumber> = self
            .trains
            .lock()
            .values()
            .filter(|s| s.station.as_ref() == Some(station))
            .map(|s| s.train.number.clone())
            .collect();
        found.sort();
        found
    }

    /// Whether the simulation may move the train into `from -> to`.
    pub fn may_enter(&self, train: &TrainNumber, from: &StationId, to: &StationId) -> bool {
        let section = SectionRef::new(from.clone(), to.clone());
        self.trains
            .lock()
            .get(train)
            .is_some_and(|s| !s.status.is_terminal() && s.cleared.as_ref() == Some(&section))
    }

    // ---- Protocol operations ----

    /// Ask for `train` to enter the section `from -> to`.
    pub fn request_entry(
        &self,
        train: &TrainNumber,
        from: &StationId,
        to: &StationId,
    ) -> Result<EntryOutcome, HandoffError> {
        self.check_station(from)?;
        self.check_station(to)?;
        let section = SectionRef::new(from.clone(), to.clone());

        {
            let trains = self.trains.lock();
            let state = trains.get(train).ok_or_else(|| Self::unknown_train(train))?;
            if state.status.is_terminal() {
                debug!(train = %train, "entry request from collided train ignored");
                return Ok(EntryOutcome::Ignored);
            }
            if state.cleared.as_ref() == Some(&section) {
                return Ok(EntryOutcome::Cleared);
            }
            if state.status == TrainStatus::AwaitingApproval
                && state.awaiting.as_ref() == Some(&section)
            {
                return Ok(EntryOutcome::AlreadyPending);
            }
        }

        let decision = match self.approvals.request_entry(train, from, to) {
            Ok(decision) => decision,
            Err(e) => {
                debug!(train = %train, error = %e, "entry already pending");
                return Ok(EntryOutcome::AlreadyPending);
            }
        };

        let (outcome, superseded) = {
            let mut trains = self.trains.lock();
            let live = trains
                .get(train)
                .is_some_and(|s| !s.status.is_terminal());
            if !live {
                // Collided or removed while the request was being placed
                drop(trains);
                self.approvals.withdraw_train(train);
                return Ok(EntryOutcome::Ignored);
            }
            let Some(state) = trains.get_mut(train) else {
                return Ok(EntryOutcome::Ignored);
            };

            let previous = state.awaiting.take();
            let outcome = match decision {
                EntryDecision::Clear => {
                    state.status = TrainStatus::EnRoute;
                    state.cleared = Some(section.clone());
                    EntryOutcome::Cleared
                }
                EntryDecision::Pending(_) => {
                    state.status = TrainStatus::AwaitingApproval;
                    state.awaiting = Some(section.clone());
                    state.cleared = None;
                    EntryOutcome::Pending
                }
            };
            (outcome, previous.filter(|p| p != &section))
        };

        if let Some(previous) = superseded {
            debug!(
                train = %train,
                from = %previous.from,
                to = %previous.to,
                "superseded request withdrawn"
            );
            self.approvals
                .withdraw_section(train, &previous.from, &previous.to);
        }
        Ok(outcome)
    }

    /// The destination controller's answer to a pending request.
    ///
    /// Late, duplicate or unmatched answers are ignored.
    pub fn resolve_approval(
        &self,
        train: &TrainNumber,
        from: &StationId,
        to: &StationId,
        approved: bool,
    ) -> Result<Outcome, HandoffError> {
        let Some(request) = self.approvals.resolve(train, from, to, approved) else {
            return Ok(Outcome::Ignored);
        };
        if !self.trains.lock().contains_key(train) {
            debug!(train = %train, "answer for a train no longer registered");
            return Ok(Outcome::Ignored);
        }

        self.apply_resolution(&request);
        Ok(Outcome::Applied)
    }

    /// Reflect a resolved request on the train and tell the simulation.
    fn apply_resolution(&self, request: &ApprovalRequest) {
        let section = SectionRef::new(request.from.clone(), request.to.clone());
        let granted = request.status == ApprovalStatus::Approved;

        {
            let mut trains = self.trains.lock();
            let Some(state) = trains.get_mut(&request.train) else {
                return;
            };
            if state.status.is_terminal() || state.awaiting.as_ref() != Some(&section) {
                debug!(train = %request.train, "resolution no longer relevant");
                return;
            }

            state.awaiting = None;
            if granted {
                state.cleared = Some(section.clone());
            }
            if state.status == TrainStatus::AwaitingApproval {
                state.status = if granted {
                    TrainStatus::EnRoute
                } else {
                    TrainStatus::Held
                };
            }
            info!(train = %request.train, status = ?state.status, granted, "train clearance updated");
        }

        self.motion.set_clearance(&request.train, &section, granted);
    }

    /// A train was accepted into `station` through exit `exit_id`.
    pub fn receive_train(
        &self,
        train: &TrainNumber,
        station: &StationId,
        exit_id: &str,
    ) -> Result<Outcome, HandoffError> {
        self.check_station(station)?;

        let superseded = {
            let mut trains = self.trains.lock();
            let state = trains.get_mut(train).ok_or_else(|| Self::unknown_train(train))?;
            if state.status.is_terminal() || state.station.as_ref() == Some(station) {
                return Ok(Outcome::Ignored);
            }

            state.status = TrainStatus::EnRoute;
            state.station = Some(station.clone());
            state.cleared = None;
            self.queue.enqueue(
                station,
                StationEvent::TrainArrived {
                    train: train.clone(),
                    exit_id: exit_id.to_string(),
                },
            );
            state.awaiting.take()
        };

        if let Some(section) = superseded {
            self.approvals
                .withdraw_section(train, &section.from, &section.to);
        }
        info!(train = %train, station = %station, exit = exit_id, "train received");
        Ok(Outcome::Applied)
    }

    /// A controller reports the train stopped at its station. Idempotent.
    pub fn report_stopped(
        &self,
        train: &TrainNumber,
        station: &StationId,
    ) -> Result<Outcome, HandoffError> {
        self.check_station(station)?;

        let mut trains = self.trains.lock();
        let state = trains.get_mut(train).ok_or_else(|| Self::unknown_train(train))?;
        if state.status.is_terminal() {
            debug!(train = %train, "stop report for collided train ignored");
            return Ok(Outcome::Ignored);
        }
        if state.status == TrainStatus::StoppedAtStation && state.station.as_ref() == Some(station)
        {
            return Ok(Outcome::Ignored);
        }

        state.status = TrainStatus::StoppedAtStation;
        state.station = Some(station.clone());
        state.departed_from = None;
        self.queue.enqueue(
            station,
            StationEvent::TrainStopped {
                train: train.clone(),
            },
        );

        info!(train = %train, station = %station, "train stopped");
        Ok(Outcome::Applied)
    }

    /// A controller reports the train left its station.
    ///
    /// Only meaningful from `StoppedAtStation` at the same station; repeat
    /// reports are ignored. The next station on the train's path is told a
    /// train is on its way.
    pub fn report_departed(
        &self,
        train: &TrainNumber,
        station: &StationId,
    ) -> Result<Outcome, HandoffError> {
        self.check_station(station)?;

        let mut trains = self.trains.lock();
        let state = trains.get_mut(train).ok_or_else(|| Self::unknown_train(train))?;
        if state.status != TrainStatus::StoppedAtStation || state.station.as_ref() != Some(station)
        {
            debug!(train = %train, status = ?state.status, "departure report ignored");
            return Ok(Outcome::Ignored);
        }

        state.status = TrainStatus::Departed;
        state.station = None;
        state.departed_from = Some(station.clone());

        let next = state.train.next_after(station).cloned();
        self.queue.enqueue(
            station,
            StationEvent::TrainDeparted {
                train: train.clone(),
                next: next.clone(),
            },
        );
        if let Some(next) = &next {
            self.queue.enqueue(
                next,
                StationEvent::TrainIncoming {
                    train: train.clone(),
                    from: station.clone(),
                },
            );
        }

        info!(train = %train, station = %station, next = ?next, "train departed");
        Ok(Outcome::Applied)
    }

    /// Two trains collided at `station`. Both leave the protocol for good.
    ///
    /// The report is all-or-nothing: if either train is unknown nothing
    /// changes.
    pub fn report_collision(
        &self,
        first: &TrainNumber,
        second: &TrainNumber,
        station: &StationId,
    ) -> Result<Outcome, HandoffError> {
        self.check_station(station)?;

        let mut newly_collided = Vec::with_capacity(2);
        {
            let mut trains = self.trains.lock();
            for train in [first, second] {
                if !trains.contains_key(train) {
                    return Err(Self::unknown_train(train));
                }
            }

            for train in [first, second] {
                if let Some(state) = trains.get_mut(train)
                    && !state.status.is_terminal()
                {
                    state.status = TrainStatus::Collided;
                    state.awaiting = None;
                    state.cleared = None;
                    newly_collided.push(train.clone());
                }
            }

            if newly_collided.is_empty() {
                return Ok(Outcome::Ignored);
            }
            self.queue.enqueue(
                station,
                StationEvent::TrainsCollided {
                    first: first.clone(),
                    second: second.clone(),
                },
            );
        }

        warn!(first = %first, second = %second, station = %station, "trains collided");
        for train in &newly_collided {
            self.approvals.withdraw_train(train);
            self.motion.mark_collided(train);
        }
        Ok(Outcome::Applied)
    }

    /// Deny every request waiting on `station`, which has lost its
    /// controller, and hold the requesting trains.
    pub fn station_released(&self, station: &StationId) -> Vec<ApprovalRequest> {
        let denied = self.approvals.deny_for_destination(station);
        for request in &denied {
            self.apply_resolution(request);
        }
        denied
    }

    /// Send every train at `station` back to its origin and withdraw any
    /// request those trains still have outstanding.
    pub fn return_trains_at(&self, station: &StationId) -> Vec<TrainNumber> {
        let mut returned = Vec::new();
        {
            let mut trains = self.trains.lock();
            for state in trains.values_mut() {
                if state.station.as_ref() != Some(station) || state.status.is_terminal() {
                    continue;
                }
                state.status = TrainStatus::ReturnedToOrigin;
                state.station = None;
                state.awaiting = None;
                state.cleared = None;

                let origin = state.train.origin().unwrap_or(station);
                self.queue.enqueue(
                    origin,
                    StationEvent::TrainReturned {
                        train: state.train.number.clone(),
                        from: station.clone(),
                    },
                );
                returned.push(state.train.number.clone());
            }
        }
        returned.sort();

        for train in &returned {
            info!(train = %train, station = %station, "train returned to origin");
            self.approvals.withdraw_train(train);
            self.motion.return_to_origin(train);
        }
        returned
    }

    /// Deny requests that waited too long and hold their trains.
    pub fn expire_overdue(&self, now: Instant) -> Vec<ApprovalRequest> {
        let expired = self.approvals.expire_overdue(now);
        for request in &expired {
            self.apply_resolution(request);
        }
        expired
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
