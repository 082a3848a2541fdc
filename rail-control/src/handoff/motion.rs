//! The motion simulation as seen from the control core.
//!
//! The simulation owns train movement. The core tells it about protocol
//! decisions through [`MotionSimulation`]; the simulation reads clearances
//! back through `TrainHandoffService::may_enter`.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{StationId, TrainNumber};

/// A directed section a train wants to enter or has been cleared into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SectionRef {
    pub from: StationId,
    pub to: StationId,
}

impl SectionRef {
    /// Create a section reference.
    pub fn new(from: StationId, to: StationId) -> Self {
        Self { from, to }
    }
}

/// State transitions the core forces on the simulation.
pub trait MotionSimulation: Send + Sync {
    /// Reclaim a train whose station controller left.
    fn return_to_origin(&self, train: &TrainNumber);

    /// Apply an approval decision for a section the train is waiting at.
    fn set_clearance(&self, train: &TrainNumber, section: &SectionRef, granted: bool);

    /// Stop simulating a train that collided.
    fn mark_collided(&self, train: &TrainNumber);
}

/// A command for the simulation to apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MotionCommand {
    ReturnToOrigin {
        train: TrainNumber,
    },
    SetClearance {
        train: TrainNumber,
        section: SectionRef,
        granted: bool,
    },
    MarkCollided {
        train: TrainNumber,
    },
}

/// Commands buffered before the oldest are discarded.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 10_000;

/// Buffers commands until an external simulation polls for them.
///
/// A simulation must poll regularly. Once `capacity` commands are waiting,
/// each new command discards the oldest one.
#[derive(Debug)]
pub struct MotionOutbox {
    commands: Mutex<VecDeque<MotionCommand>>,
    capacity: usize,
}

impl Default for MotionOutbox {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl MotionOutbox {
    /// Create an empty outbox with the default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty outbox holding at most `capacity` commands.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Take every buffered command, oldest first.
    pub fn take_all(&self) -> Vec<MotionCommand> {
        self.commands.lock().drain(..).collect()
    }

    fn push(&self, command: MotionCommand) {
        debug!(?command, "motion command queued");
        let mut commands = self.commands.lock();
        if commands.len() >= self.capacity
            && let Some(dropped) = commands.pop_front()
        {
            warn!(
                ?dropped,
                capacity = self.capacity,
                "motion outbox full, oldest command dropped"
            );
        }
        commands.push_back(command);
    }
}

impl MotionSimulation for MotionOutbox {
    fn return_to_origin(&self, train: &TrainNumber) {
        self.push(MotionCommand::ReturnToOrigin {
            train: train.clone(),
        });
    }

    fn set_clearance(&self, train: &TrainNumber, section: &SectionRef, granted: bool) {
        self.push(MotionCommand::SetClearance {
            train: train.clone(),
            section: section.clone(),
            granted,
        });
    }

    fn mark_collided(&self, train: &TrainNumber) {
        self.push(MotionCommand::MarkCollided {
            train: train.clone(),
        });
    }
}
