//! Unit tests for the train lifecycle state machine.

use super::*;
use crate::approval::ApprovalConfig;
use crate::handoff::MotionCommand;
use crate::notify::{Notification, Resolution};
use crate::topology::{InMemoryLayouts, Network, Section};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn station(s: &str) -> StationId {
    StationId::parse(s).unwrap()
}

fn train(s: &str) -> TrainNumber {
    TrainNumber::parse(s).unwrap()
}

/// Simulation double that records every forced transition.
#[derive(Default)]
struct RecordingSimulation {
    commands: Mutex<Vec<MotionCommand>>,
}

impl RecordingSimulation {
    fn commands(&self) -> Vec<MotionCommand> {
        self.commands.lock().clone()
    }
}

impl MotionSimulation for RecordingSimulation {
    fn return_to_origin(&self, train: &TrainNumber) {
        self.commands.lock().push(MotionCommand::ReturnToOrigin {
            train: train.clone(),
        });
    }

    fn set_clearance(&self, train: &TrainNumber, section: &SectionRef, granted: bool) {
        self.commands.lock().push(MotionCommand::SetClearance {
            train: train.clone(),
            section: section.clone(),
            granted,
        });
    }

    fn mark_collided(&self, train: &TrainNumber) {
        self.commands.lock().push(MotionCommand::MarkCollided {
            train: train.clone(),
        });
    }
}

struct Fixture {
    service: TrainHandoffService,
    approvals: Arc<ApprovalCoordinator>,
    sim: Arc<RecordingSimulation>,
    rx: UnboundedReceiver<Notification>,
}

impl Fixture {
    fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.rx.try_recv() {
            out.push(n);
        }
        out
    }
}

/// A-B is single track, B-C double track. T1 and T2 run A -> B -> C.
fn fixture(max_wait: Duration) -> Fixture {
    let network = Network::new(
        vec![station("A"), station("B"), station("C")],
        vec![
            Section::new(station("A"), station("B"), 900.0),
            Section::new(station("B"), station("C"), 400.0),
            Section::new(station("C"), station("B"), 400.0),
        ],
    )
    .unwrap();
    let layouts = InMemoryLayouts::new()
        .with(station("A"), 60.0)
        .with(station("B"), 40.0);
    let topology = Arc::new(NetworkTopology::new(network, Arc::new(layouts)));
    let (queue, rx) = NotificationQueue::channel();
    let approvals = Arc::new(ApprovalCoordinator::new(
        topology.clone(),
        ApprovalConfig::new(max_wait),
        queue.clone(),
    ));
    let sim = Arc::new(RecordingSimulation::default());
    let service = TrainHandoffService::new(topology, approvals.clone(), sim.clone(), queue);

    for number in ["T1", "T2"] {
        service.register_train(Train::new(train(number)).with_path(vec![
            station("A"),
            station("B"),
            station("C"),
        ]));
    }

    Fixture {
        service,
        approvals,
        sim,
        rx,
    }
}

fn default_fixture() -> Fixture {
    fixture(Duration::from_secs(60))
}

#[test]
fn unknown_train_is_rejected() {
    let f = default_fixture();
    let err = f
        .service
        .request_entry(&train("X9"), &station("A"), &station("B"))
        .unwrap_err();
    assert_eq!(err, HandoffError::UnknownTrain(train("X9")));

    let err = f.service.report_stopped(&train("X9"), &station("A")).unwrap_err();
    assert_eq!(err, HandoffError::UnknownTrain(train("X9")));
}

#[test]
fn unknown_station_is_rejected() {
    let f = default_fixture();
    let err = f
        .service
        .report_stopped(&train("T1"), &station("Z"))
        .unwrap_err();
    assert_eq!(err, HandoffError::UnknownStation(station("Z")));
    assert_eq!(f.service.train_status(&train("T1")), Some(TrainStatus::EnRoute));
}

#[test]
fn double_track_entry_is_cleared() {
    let f = default_fixture();
    let outcome = f
        .service
        .request_entry(&train("T1"), &station("B"), &station("C"))
        .unwrap();

    assert_eq!(outcome, EntryOutcome::Cleared);
    assert!(f.service.may_enter(&train("T1"), &station("B"), &station("C")));
    assert_eq!(f.approvals.pending_count(), 0);
}

#[test]
fn single_track_entry_awaits_approval() {
    let mut f = default_fixture();
    let outcome = f
        .service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();

    assert_eq!(outcome, EntryOutcome::Pending);
    assert_eq!(
        f.service.train_status(&train("T1")),
        Some(TrainStatus::AwaitingApproval)
    );
    assert!(!f.service.may_enter(&train("T1"), &station("A"), &station("B")));

    let sent = f.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].station, station("B"));

    // Asking again while pending changes nothing
    let again = f
        .service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();
    assert_eq!(again, EntryOutcome::AlreadyPending);
    assert_eq!(f.approvals.pending_count(), 1);
    assert!(f.drain().is_empty());
}

#[test]
fn approval_clears_train_once() {
    let f = default_fixture();
    f.service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();

    let outcome = f
        .service
        .resolve_approval(&train("T1"), &station("A"), &station("B"), true)
        .unwrap();
    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(f.service.train_status(&train("T1")), Some(TrainStatus::EnRoute));
    assert!(f.service.may_enter(&train("T1"), &station("A"), &station("B")));

    let again = f
        .service
        .resolve_approval(&train("T1"), &station("A"), &station("B"), false)
        .unwrap();
    assert_eq!(again, Outcome::Ignored);
    assert!(f.service.may_enter(&train("T1"), &station("A"), &station("B")));

    assert_eq!(
        f.sim.commands(),
        vec![MotionCommand::SetClearance {
            train: train("T1"),
            section: SectionRef::new(station("A"), station("B")),
            granted: true,
        }]
    );
}

#[test]
fn denial_holds_train_and_allows_retry() {
    let f = default_fixture();
    f.service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();
    f.service
        .resolve_approval(&train("T1"), &station("A"), &station("B"), false)
        .unwrap();

    assert_eq!(f.service.train_status(&train("T1")), Some(TrainStatus::Held));
    assert!(!f.service.may_enter(&train("T1"), &station("A"), &station("B")));

    let retry = f
        .service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();
    assert_eq!(retry, EntryOutcome::Pending);
}

#[test]
fn stopped_is_idempotent() {
    let mut f = default_fixture();
    assert_eq!(
        f.service.report_stopped(&train("T1"), &station("A")).unwrap(),
        Outcome::Applied
    );
    assert_eq!(
        f.service.report_stopped(&train("T1"), &station("A")).unwrap(),
        Outcome::Ignored
    );

    assert_eq!(
        f.service.train_status(&train("T1")),
        Some(TrainStatus::StoppedAtStation)
    );
    assert_eq!(f.service.trains_at(&station("A")), vec![train("T1")]);
    assert_eq!(f.drain().len(), 1);
}

#[test]
fn departed_requires_stop_at_same_station() {
    let mut f = default_fixture();

    // Not stopped yet
    assert_eq!(
        f.service.report_departed(&train("T1"), &station("A")).unwrap(),
        Outcome::Ignored
    );

    f.service.report_stopped(&train("T1"), &station("A")).unwrap();
    assert_eq!(
        f.service.report_departed(&train("T1"), &station("B")).unwrap(),
        Outcome::Ignored
    );
    f.drain();

    assert_eq!(
        f.service.report_departed(&train("T1"), &station("A")).unwrap(),
        Outcome::Applied
    );
    assert_eq!(
        f.service.report_departed(&train("T1"), &station("A")).unwrap(),
        Outcome::Ignored
    );

    let state = f.service.train(&train("T1")).unwrap();
    assert_eq!(state.status, TrainStatus::Departed);
    assert_eq!(state.station, None);
    assert_eq!(state.departed_from, Some(station("A")));

    let sent = f.drain();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].station, station("A"));
    assert_eq!(
        sent[0].event,
        StationEvent::TrainDeparted {
            train: train("T1"),
            next: Some(station("B")),
        }
    );
    assert_eq!(sent[1].station, station("B"));
    assert_eq!(
        sent[1].event,
        StationEvent::TrainIncoming {
            train: train("T1"),
            from: station("A"),
        }
    );
}

#[test]
fn departed_train_starts_next_leg_on_clearance() {
    let f = default_fixture();
    f.service.report_stopped(&train("T1"), &station("B")).unwrap();
    f.service.report_departed(&train("T1"), &station("B")).unwrap();

    f.service
        .request_entry(&train("T1"), &station("B"), &station("C"))
        .unwrap();
    assert_eq!(f.service.train_status(&train("T1")), Some(TrainStatus::EnRoute));
}

#[test]
fn collision_is_terminal() {
    let mut f = default_fixture();
    f.service
        .request_entry(&train("T2"), &station("A"), &station("B"))
        .unwrap();
    f.drain();

    let outcome = f
        .service
        .report_collision(&train("T1"), &train("T2"), &station("B"))
        .unwrap();
    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(f.service.train_status(&train("T1")), Some(TrainStatus::Collided));
    assert_eq!(f.service.train_status(&train("T2")), Some(TrainStatus::Collided));

    // T2's pending request was withdrawn
    assert_eq!(f.approvals.pending_count(), 0);

    // Later reports are no-ops
    assert_eq!(
        f.service.report_stopped(&train("T1"), &station("B")).unwrap(),
        Outcome::Ignored
    );
    assert_eq!(f.service.train_status(&train("T1")), Some(TrainStatus::Collided));
    assert_eq!(
        f.service
            .request_entry(&train("T1"), &station("A"), &station("B"))
            .unwrap(),
        EntryOutcome::Ignored
    );
    assert_eq!(
        f.service
            .report_collision(&train("T1"), &train("T2"), &station("B"))
            .unwrap(),
        Outcome::Ignored
    );

    let commands = f.sim.commands();
    assert!(commands.contains(&MotionCommand::MarkCollided { train: train("T1") }));
    assert!(commands.contains(&MotionCommand::MarkCollided { train: train("T2") }));

    let sent = f.drain();
    assert_eq!(sent[0].station, station("B"));
    assert!(matches!(sent[0].event, StationEvent::TrainsCollided { .. }));
}

#[test]
fn collision_with_unknown_train_changes_nothing() {
    let f = default_fixture();
    let err = f
        .service
        .report_collision(&train("T1"), &train("X9"), &station("B"))
        .unwrap_err();

    assert_eq!(err, HandoffError::UnknownTrain(train("X9")));
    assert_eq!(f.service.train_status(&train("T1")), Some(TrainStatus::EnRoute));
    assert!(f.sim.commands().is_empty());
}

#[test]
fn receive_train_marks_presence_once() {
    let mut f = default_fixture();
    assert_eq!(
        f.service
            .receive_train(&train("T1"), &station("B"), "east-1")
            .unwrap(),
        Outcome::Applied
    );
    assert_eq!(
        f.service
            .receive_train(&train("T1"), &station("B"), "east-1")
            .unwrap(),
        Outcome::Ignored
    );

    assert_eq!(f.service.trains_at(&station("B")), vec![train("T1")]);
    let sent = f.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].event,
        StationEvent::TrainArrived {
            train: train("T1"),
            exit_id: "east-1".into(),
        }
    );
}

#[test]
fn controller_leaving_denies_and_returns_trains() {
    let mut f = default_fixture();
    f.service
        .receive_train(&train("T1"), &station("B"), "west")
        .unwrap();
    f.service
        .request_entry(&train("T2"), &station("A"), &station("B"))
        .unwrap();
    f.drain();

    let denied = f.service.station_released(&station("B"));
    let returned = f.service.return_trains_at(&station("B"));

    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].train, train("T2"));
    assert_eq!(denied[0].status, ApprovalStatus::Denied);
    assert_eq!(returned, vec![train("T1")]);

    assert_eq!(f.approvals.pending_count(), 0);
    assert_eq!(f.service.train_status(&train("T2")), Some(TrainStatus::Held));
    assert_eq!(
        f.service.train_status(&train("T1")),
        Some(TrainStatus::ReturnedToOrigin)
    );
    assert!(f.service.trains_at(&station("B")).is_empty());

    let commands = f.sim.commands();
    assert!(commands.contains(&MotionCommand::ReturnToOrigin { train: train("T1") }));
    assert!(commands.contains(&MotionCommand::SetClearance {
        train: train("T2"),
        section: SectionRef::new(station("A"), station("B")),
        granted: false,
    }));

    let sent = f.drain();
    assert!(sent.iter().any(|n| n.station == station("A")
        && n.event
            == StationEvent::TrainReturned {
                train: train("T1"),
                from: station("B"),
            }));
}

#[test]
fn collided_trains_are_not_returned() {
    let f = default_fixture();
    f.service.report_stopped(&train("T1"), &station("B")).unwrap();
    f.service
        .report_collision(&train("T1"), &train("T2"), &station("B"))
        .unwrap();

    assert!(f.service.return_trains_at(&station("B")).is_empty());
    assert_eq!(f.service.train_status(&train("T1")), Some(TrainStatus::Collided));
}

#[test]
fn returned_train_withdraws_its_own_request() {
    let mut f = default_fixture();
    f.service
        .receive_train(&train("T1"), &station("A"), "platform")
        .unwrap();
    f.service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();
    assert_eq!(f.approvals.pending_count(), 1);
    f.drain();

    assert_eq!(f.service.return_trains_at(&station("A")), vec![train("T1")]);
    assert_eq!(f.approvals.pending_count(), 0);

    let sent = f.drain();
    assert!(sent.iter().any(|n| n.station == station("A")
        && matches!(
            n.event,
            StationEvent::ApprovalResolved {
                approved: false,
                resolution: Resolution::Withdrawn,
                ..
            }
        )));

    // A late answer from the destination changes nothing
    let outcome = f
        .service
        .resolve_approval(&train("T1"), &station("A"), &station("B"), true)
        .unwrap();
    assert_eq!(outcome, Outcome::Ignored);
    assert!(!f.service.may_enter(&train("T1"), &station("A"), &station("B")));
}

#[test]
fn receiving_a_waiting_train_withdraws_its_request() {
    let f = default_fixture();
    f.service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();
    assert_eq!(
        f.service.train_status(&train("T1")),
        Some(TrainStatus::AwaitingApproval)
    );

    f.service
        .receive_train(&train("T1"), &station("A"), "platform")
        .unwrap();

    assert_eq!(f.approvals.pending_count(), 0);
    assert!(f.service.train(&train("T1")).unwrap().awaiting.is_none());
}

#[test]
fn requesting_another_section_withdraws_the_previous_one() {
    let f = default_fixture();
    f.service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();

    // B -> C is double track, so the new request clears at once
    let outcome = f
        .service
        .request_entry(&train("T1"), &station("B"), &station("C"))
        .unwrap();
    assert_eq!(outcome, EntryOutcome::Cleared);
    assert!(f.approvals.pending(&train("T1"), &station("B")).is_none());
    assert_eq!(f.approvals.pending_count(), 0);
    assert!(f.service.may_enter(&train("T1"), &station("B"), &station("C")));
}

#[test]
fn answer_after_train_removed_is_ignored() {
    let f = default_fixture();
    f.service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();
    f.service.remove_train(&train("T1"));

    let outcome = f
        .service
        .resolve_approval(&train("T1"), &station("A"), &station("B"), true)
        .unwrap();
    assert_eq!(outcome, Outcome::Ignored);
}

#[test]
fn overdue_requests_hold_the_train() {
    let f = fixture(Duration::from_millis(0));
    f.service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();

    let expired = f.service.expire_overdue(Instant::now());
    assert_eq!(expired.len(), 1);
    assert_eq!(f.service.train_status(&train("T1")), Some(TrainStatus::Held));
}

#[test]
fn removing_train_withdraws_requests() {
    let f = default_fixture();
    f.service
        .request_entry(&train("T1"), &station("A"), &station("B"))
        .unwrap();

    assert!(f.service.remove_train(&train("T1")).is_some());
    assert_eq!(f.approvals.pending_count(), 0);
    assert!(f.service.train(&train("T1")).is_none());
    assert!(f.service.remove_train(&train("T1")).is_none());
}

#[test]
fn reregistering_keeps_protocol_state() {
    let f = default_fixture();
    f.service.report_stopped(&train("T1"), &station("A")).unwrap();

    let mut updated = Train::new(train("T1"));
    updated.car_count = 6;
    assert!(!f.service.register_train(updated));

    let state = f.service.train(&train("T1")).unwrap();
    assert_eq!(state.status, TrainStatus::StoppedAtStation);
    assert_eq!(state.train.car_count, 6);
}

#[test]
fn snapshot_is_sorted() {
    let f = default_fixture();
    let numbers: Vec<_> = f
        .service
        .snapshot()
        .into_iter()
        .map(|s| s.train.number)
        .collect();
    assert_eq!(numbers, vec![train("T1"), train("T2")]);
}
