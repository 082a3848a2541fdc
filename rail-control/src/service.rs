//! The remote call surface.
//!
//! [`RailService`] owns every component and is the only mutation entry
//! point for controllers and the motion simulation. Arguments arrive as
//! strings and are validated here; every call either fully succeeds or
//! leaves state unchanged and reports why.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::approval::{ApprovalConfig, ApprovalCoordinator, ApprovalRequest};
use crate::control::{ControlError, Player, StationControlRegistry};
use crate::domain::{
    ConnectionId, InvalidIdentifier, InvalidStationId, PlayerId, StationId, Train, TrainNumber,
};
use crate::handoff::{
    EntryOutcome, HandoffError, MotionSimulation, Outcome, RecoveryReport, TrainHandoffService,
    TrainState,
};
use crate::notify::{GroupTransport, Notification, NotificationDispatcher, NotificationQueue};
use crate::topology::NetworkTopology;

/// Why a remote call was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    InvalidStation(#[from] InvalidStationId),

    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),
}

/// Acknowledgement returned for every remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Ack {
    /// A successful acknowledgement.
    pub fn ok() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    /// A failed acknowledgement with a human-readable reason.
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

impl<T> From<Result<T, CallError>> for Ack {
    fn from(result: Result<T, CallError>) -> Self {
        match result {
            Ok(_) => Ack::ok(),
            Err(e) => Ack::fail(e.to_string()),
        }
    }
}

/// What a station looks like right now.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStatus {
    pub station: StationId,
    pub controlled: bool,
    pub controller: Option<String>,
    pub trains: Vec<TrainNumber>,
    pub pending_approvals: Vec<ApprovalRequest>,
}

/// One entry of the display-ordered station list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSummary {
    pub station: StationId,
    pub controlled: bool,
    pub controller: Option<String>,
}

/// Owns the control components and exposes the remote call surface.
pub struct RailService {
    topology: Arc<NetworkTopology>,
    registry: Arc<StationControlRegistry>,
    approvals: Arc<ApprovalCoordinator>,
    handoff: Arc<TrainHandoffService>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl RailService {
    /// Wire up every component.
    ///
    /// Returns the receiver the dispatcher must drain (see
    /// [`NotificationDispatcher::run`]).
    pub fn new(
        topology: Arc<NetworkTopology>,
        transport: Arc<dyn GroupTransport>,
        motion: Arc<dyn MotionSimulation>,
        approval_config: ApprovalConfig,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (queue, rx) = NotificationQueue::channel();
        let registry = Arc::new(StationControlRegistry::new());
        let approvals = Arc::new(ApprovalCoordinator::new(
            topology.clone(),
            approval_config,
            queue.clone(),
        ));
        let handoff = Arc::new(TrainHandoffService::new(
            topology.clone(),
            approvals.clone(),
            motion,
            queue,
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(registry.clone(), transport));

        let service = Self {
            topology,
            registry,
            approvals,
            handoff,
            dispatcher,
        };
        (service, rx)
    }

    /// The notification dispatcher.
    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    fn known_station(&self, station_id: &str) -> Result<StationId, CallError> {
        let station = StationId::parse(station_id)?;
        if !self.topology.contains(&station) {
            return Err(HandoffError::UnknownStation(station).into());
        }
        Ok(station)
    }

    /// The station `player` controls, which must be `station`.
    fn require_controller(&self, player: &PlayerId, station: &StationId) -> Result<(), CallError> {
        match self.registry.station_of(player) {
            Some(held) if &held == station => Ok(()),
            _ => Err(ControlError::NotController {
                player: player.clone(),
                station: station.clone(),
            }
            .into()),
        }
    }

    fn held_station(&self, player: &PlayerId) -> Result<StationId, CallError> {
        self.registry
            .station_of(player)
            .ok_or_else(|| ControlError::NoStation(player.clone()).into())
    }

    // ---- Controller calls ----

    /// Claim control of a station over `connection`.
    pub fn join_station(
        &self,
        connection: &ConnectionId,
        player_id: &str,
        station_id: &str,
        player_name: &str,
    ) -> Result<(), CallError> {
        let player = PlayerId::parse(player_id)?;
        let station = self.known_station(station_id)?;
        let previous = self.registry.player(&player);

        let grant = self
            .registry
            .take_control(&player, &station, connection, player_name.trim())?;

        if let Some(prev) = previous
            && let Some(prev_station) = prev.station
            && (prev_station != station || &prev.connection != connection)
        {
            self.dispatcher.detach(&prev.connection, &prev_station);
        }
        self.dispatcher.attach(connection, &station);

        if let Some(released) = &grant.released {
            self.handoff.station_released(released);
        }
        Ok(())
    }

    /// Give up the station the player controls.
    pub fn leave_station(&self, player_id: &str) -> Result<(), CallError> {
        let player = PlayerId::parse(player_id)?;
        let record = self.registry.player(&player);
        let station = self
            .registry
            .release(&player)
            .ok_or_else(|| ControlError::NoStation(player.clone()))?;

        if let Some(record) = record {
            self.dispatcher.detach(&record.connection, &station);
        }
        self.handoff.station_released(&station);
        Ok(())
    }

    /// Current status of a station.
    pub fn station_status(&self, station_id: &str) -> Result<StationStatus, CallError> {
        let station = self.known_station(station_id)?;
        let controller = self.registry.controller_of(&station);
        Ok(StationStatus {
            controlled: controller.is_some(),
            controller: controller.map(|p| p.display_name),
            trains: self.handoff.trains_at(&station),
            pending_approvals: self.approvals.pending_for(&station),
            station,
        })
    }

    /// Accept a train into the player's station through an exit.
    pub fn receive_train(
        &self,
        player_id: &str,
        train_number: &str,
        exit_id: &str,
    ) -> Result<Outcome, CallError> {
        let player = PlayerId::parse(player_id)?;
        let train = TrainNumber::parse(train_number)?;
        let station = self.held_station(&player)?;
        Ok(self.handoff.receive_train(&train, &station, exit_id.trim())?)
    }

    /// Report a train stopped at the player's station.
    pub fn report_train_stopped(
        &self,
        player_id: &str,
        train_number: &str,
        station_id: &str,
    ) -> Result<Outcome, CallError> {
        let player = PlayerId::parse(player_id)?;
        let train = TrainNumber::parse(train_number)?;
        let station = self.known_station(station_id)?;
        self.require_controller(&player, &station)?;
        Ok(self.handoff.report_stopped(&train, &station)?)
    }

    /// Report a train departed the player's station.
    pub fn report_train_departed(
        &self,
        player_id: &str,
        train_number: &str,
        station_id: &str,
    ) -> Result<Outcome, CallError> {
        let player = PlayerId::parse(player_id)?;
        let train = TrainNumber::parse(train_number)?;
        let station = self.known_station(station_id)?;
        self.require_controller(&player, &station)?;
        Ok(self.handoff.report_departed(&train, &station)?)
    }

    /// Report two trains collided at the player's station.
    pub fn report_train_collision(
        &self,
        player_id: &str,
        first: &str,
        second: &str,
        station_id: &str,
    ) -> Result<Outcome, CallError> {
        let player = PlayerId::parse(player_id)?;
        let first = TrainNumber::parse(first)?;
        let second = TrainNumber::parse(second)?;
        let station = self.known_station(station_id)?;
        self.require_controller(&player, &station)?;
        Ok(self.handoff.report_collision(&first, &second, &station)?)
    }

    /// Answer an approval request addressed to the player's station.
    pub fn respond_approval(
        &self,
        player_id: &str,
        train_number: &str,
        from_station_id: &str,
        approved: bool,
    ) -> Result<Outcome, CallError> {
        let player = PlayerId::parse(player_id)?;
        let train = TrainNumber::parse(train_number)?;
        let from = StationId::parse(from_station_id)?;
        let to = self.held_station(&player)?;
        Ok(self.handoff.resolve_approval(&train, &from, &to, approved)?)
    }

    /// A player's connection went away.
    ///
    /// Releases its station, denies every request waiting on it and sends
    /// trains at the station home, all before returning.
    pub fn disconnect(&self, player_id: &str) -> Result<Option<RecoveryReport>, CallError> {
        let player = PlayerId::parse(player_id)?;
        let record = self.registry.player(&player);
        let Some(station) = self.registry.disconnect(&player) else {
            return Ok(None);
        };

        if let Some(record) = record {
            self.dispatcher.detach(&record.connection, &station);
        }
        let report = self.recover(&station);
        info!(
            player = %player,
            station = %station,
            denied = report.denied.len(),
            returned = report.returned.len(),
            "controller recovery complete"
        );
        Ok(Some(report))
    }

    /// Deny requests waiting on a station that lost its controller, then
    /// send its trains home unless someone has claimed it in the meantime.
    fn recover(&self, station: &StationId) -> RecoveryReport {
        let denied = self.handoff.station_released(station);
        let returned = if self.registry.is_controlled(station) {
            info!(station = %station, "station reclaimed before trains were returned");
            Vec::new()
        } else {
            self.handoff.return_trains_at(station)
        };
        RecoveryReport { denied, returned }
    }

    /// A transport connection closed; disconnect whoever was bound to it.
    pub fn disconnect_connection(&self, connection: &ConnectionId) -> Option<RecoveryReport> {
        let Some(player) = self.registry.player_for_connection(connection) else {
            debug!(connection = %connection, "closed connection had no player");
            return None;
        };
        self.disconnect(player.as_str()).ok().flatten()
    }

    // ---- Simulation calls ----

    /// Start tracking a train.
    pub fn register_train(&self, train: Train) -> bool {
        self.handoff.register_train(train)
    }

    /// Stop tracking a train.
    pub fn remove_train(&self, train_number: &str) -> Result<Option<TrainState>, CallError> {
        let train = TrainNumber::parse(train_number)?;
        Ok(self.handoff.remove_train(&train))
    }

    /// Current state of a train.
    pub fn train_state(&self, train_number: &str) -> Result<TrainState, CallError> {
        let train = TrainNumber::parse(train_number)?;
        self.handoff
            .train(&train)
            .ok_or_else(|| HandoffError::UnknownTrain(train).into())
    }

    /// Ask for a train to enter the section `from -> to`.
    pub fn request_entry(
        &self,
        train_number: &str,
        from_station_id: &str,
        to_station_id: &str,
    ) -> Result<EntryOutcome, CallError> {
        let train = TrainNumber::parse(train_number)?;
        let from = StationId::parse(from_station_id)?;
        let to = StationId::parse(to_station_id)?;
        Ok(self.handoff.request_entry(&train, &from, &to)?)
    }

    /// Whether a train may move into the section `from -> to`.
    pub fn may_enter(
        &self,
        train_number: &str,
        from_station_id: &str,
        to_station_id: &str,
    ) -> Result<bool, CallError> {
        let train = TrainNumber::parse(train_number)?;
        let from = StationId::parse(from_station_id)?;
        let to = StationId::parse(to_station_id)?;
        Ok(self.handoff.may_enter(&train, &from, &to))
    }

    /// Collision reported by the simulation itself.
    pub fn report_collision(
        &self,
        first: &str,
        second: &str,
        station_id: &str,
    ) -> Result<Outcome, CallError> {
        let first = TrainNumber::parse(first)?;
        let second = TrainNumber::parse(second)?;
        let station = StationId::parse(station_id)?;
        Ok(self.handoff.report_collision(&first, &second, &station)?)
    }

    /// Deny approvals that have waited past the configured maximum.
    pub fn expire_overdue(&self) -> Vec<ApprovalRequest> {
        self.handoff.expire_overdue(Instant::now())
    }

    // ---- Reads ----

    /// Stations in display order with their control status.
    pub fn station_order(&self) -> Vec<StationSummary> {
        self.topology
            .derive_station_order()
            .into_iter()
            .map(|station| {
                let controller = self.registry.controller_of(&station);
                StationSummary {
                    controlled: controller.is_some(),
                    controller: controller.map(|p| p.display_name),
                    station,
                }
            })
            .collect()
    }

    /// Every registered train.
    pub fn trains(&self) -> Vec<TrainState> {
        self.handoff.snapshot()
    }

    /// Every connected player.
    pub fn active_players(&self) -> Vec<Player> {
        self.registry.list_active_players()
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
