//! Exclusive station-to-player assignment.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{ConnectionId, PlayerId, StationId};

use super::error::ControlError;

/// A human controller known to the registry.
///
/// Players are created on their first successful claim and are never
/// removed; a disconnect only clears `active` and `station`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub station: Option<StationId>,
    pub connection: ConnectionId,
    pub display_name: String,
    pub active: bool,
}

/// Result of a successful `take_control`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlGrant {
    /// The station now held
    pub station: StationId,

    /// A different station the player held before, now released
    pub released: Option<StationId>,

    /// The player already held this station (idempotent re-join)
    pub rejoined: bool,
}

#[derive(Debug, Default)]
struct Tables {
    players: HashMap<PlayerId, Player>,
    controllers: HashMap<StationId, PlayerId>,
}

impl Tables {
    /// Remove the station mapping held by `player`, if any.
    fn unbind(&mut self, player: &PlayerId) -> Option<StationId> {
        let record = self.players.get_mut(player)?;
        let station = record.station.take()?;
        if self.controllers.get(&station) == Some(player) {
            self.controllers.remove(&station);
        }
        Some(station)
    }
}

/// The bidirectional station <-> player mapping.
///
/// Both directions live behind one lock, so every mutation sees and leaves
/// a consistent pair: a station maps to at most one player, a player to at
/// most one station, and each direction is the inverse of the other.
#[derive(Debug, Default)]
pub struct StationControlRegistry {
    tables: Mutex<Tables>,
}

impl StationControlRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim control of `station` for `player`.
    ///
    /// Succeeds when the station is free or already held by the same player,
    /// in which case the connection and display name are rebound. Any other
    /// station the player held is released first. Fails without mutating
    /// anything when another active player holds the station.
    pub fn take_control(
        &self,
        player: &PlayerId,
        station: &StationId,
        connection: &ConnectionId,
        display_name: &str,
    ) -> Result<ControlGrant, ControlError> {
        let mut tables = self.tables.lock();

        if let Some(holder) = tables.controllers.get(station).cloned()
            && &holder != player
        {
            let holder_record = tables.players.get(&holder);
            if holder_record.is_some_and(|p| p.active) {
                let controller = holder_record
                    .map(|p| p.display_name.clone())
                    .unwrap_or_else(|| holder.to_string());
                debug!(station = %station, player = %player, holder = %holder, "station claim refused");
                return Err(ControlError::StationControlled {
                    station: station.clone(),
                    controller,
                });
            }
            warn!(station = %station, holder = %holder, "clearing stale mapping to inactive player");
            tables.unbind(&holder);
        }

        let current = tables.players.get(player).and_then(|p| p.station.clone());
        let rejoined = current.as_ref() == Some(station);
        let released = if rejoined { None } else { tables.unbind(player) };

        tables
            .players
            .entry(player.clone())
            .and_modify(|p| {
                p.station = Some(station.clone());
                p.connection = connection.clone();
                p.display_name = display_name.to_string();
                p.active = true;
            })
            .or_insert_with(|| Player {
                id: player.clone(),
                station: Some(station.clone()),
                connection: connection.clone(),
                display_name: display_name.to_string(),
                active: true,
            });
        tables.controllers.insert(station.clone(), player.clone());

        info!(
            station = %station,
            player = %player,
            released = ?released,
            rejoined,
            "station control granted"
        );

        Ok(ControlGrant {
            station: station.clone(),
            released,
            rejoined,
        })
    }

    /// Voluntarily give up control. Returns the released station, or `None`
    /// if the player held nothing.
    pub fn release(&self, player: &PlayerId) -> Option<StationId> {
        let released = self.tables.lock().unbind(player);
        match &released {
            Some(station) => info!(station = %station, player = %player, "station released"),
            None => debug!(player = %player, "release with no station held"),
        }
        released
    }

    /// Mark the player inactive and clear its station mapping.
    ///
    /// Returns the station the player held so the caller can run recovery
    /// for trains present there. Safe to call for unknown players.
    pub fn disconnect(&self, player: &PlayerId) -> Option<StationId> {
        let mut tables = self.tables.lock();
        let released = tables.unbind(player);
        if let Some(record) = tables.players.get_mut(player) {
            record.active = false;
        }
        drop(tables);

        info!(player = %player, station = ?released, "player disconnected");
        released
    }

    /// The active player bound to a transport connection.
    pub fn player_for_connection(&self, connection: &ConnectionId) -> Option<PlayerId> {
        let tables = self.tables.lock();
        tables
            .players
            .values()
            .find(|p| p.active && &p.connection == connection)
            .map(|p| p.id.clone())
    }

    /// Whether anyone controls the station.
    pub fn is_controlled(&self, station: &StationId) -> bool {
        self.tables.lock().controllers.contains_key(station)
    }

    /// The player controlling the station, if any.
    pub fn controller_of(&self, station: &StationId) -> Option<Player> {
        let tables = self.tables.lock();
        let id = tables.controllers.get(station)?;
        tables.players.get(id).cloned()
    }

    /// The station a player controls, if any.
    pub fn station_of(&self, player: &PlayerId) -> Option<StationId> {
        let tables = self.tables.lock();
        tables.players.get(player).and_then(|p| p.station.clone())
    }

    /// Look up a player record.
    pub fn player(&self, player: &PlayerId) -> Option<Player> {
        self.tables.lock().players.get(player).cloned()
    }

    /// All active players, ordered by id.
    pub fn list_active_players(&self) -> Vec<Player> {
        let tables = self.tables.lock();
        let mut players: Vec<Player> = tables.players.values().filter(|p| p.active).cloned().collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        players
    }

    /// All controlled stations with their controller, ordered by station.
    pub fn list_controlled_stations(&self) -> Vec<(StationId, PlayerId)> {
        let tables = self.tables.lock();
        let mut stations: Vec<(StationId, PlayerId)> = tables
            .controllers
            .iter()
            .map(|(s, p)| (s.clone(), p.clone()))
            .collect();
        stations.sort();
        stations
    }

    /// Check the bidirectional mapping invariant.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let tables = self.tables.lock();
        for (station, player) in &tables.controllers {
            let record = tables.players.get(player).expect("controller has a record");
            assert_eq!(record.station.as_ref(), Some(station));
            assert!(record.active, "inactive player {player} still mapped");
        }
        for record in tables.players.values() {
            if let Some(station) = &record.station {
                assert_eq!(tables.controllers.get(station), Some(&record.id));
            }
        }
    }
}
