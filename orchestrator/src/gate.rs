//! gate.rs — Coincidence Gate (§4.G)
//!
//! Buffers per-observer hints and seals a batch once every active observer has
//! reported for the same event, or once `batch_window` elapses with at least two
//! contributors. Single-writer: callers hold `&mut Gate` for the duration of each
//! `ingest` call, the same discipline `SeqTracker` used for per-node sequence state.

use std::collections::HashSet;
use std::time::Duration;

use witness_types::{Observation, ObservationBatch};

#[derive(Debug)]
enum State {
    Idle,
    Open { first_at_ms: i64, contributors: HashSet<String>, observations: Vec<Observation> },
}

/// One pending-batch state machine. The orchestrator owns exactly one `Gate` per
/// logical event stream and drives it from the merged observer-session channel.
pub struct Gate {
    state: State,
    next_batch_id: u64,
    active_observers: usize,
    batch_window: Duration,
}

/// What `Gate::ingest` or `Gate::check_timeout` produced.
pub enum GateEvent {
    /// No batch is ready yet.
    Pending,
    /// A batch sealed and should be handed to the orchestrator.
    Sealed(ObservationBatch),
    /// An `OPEN` batch aged out with fewer than two contributors and was dropped.
    Dropped,
}

impl Gate {
    pub fn new(active_observers: usize, batch_window: Duration) -> Self {
        Self { state: State::Idle, next_batch_id: 0, active_observers, batch_window }
    }

    fn seal(&mut self, observations: Vec<Observation>) -> ObservationBatch {
        let first_at_ms = observations.iter().map(|o| o.observed_at_ms).min().unwrap_or(0);
        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;
        ObservationBatch { batch_id, observations, first_at_ms }
    }

    /// Feed one hint into the gate. `now_ms` is the wall-clock time of ingestion,
    /// passed in rather than read internally so the gate stays free of direct
    /// system-clock coupling and is trivially testable.
    pub fn ingest(&mut self, observation: Observation, now_ms: i64) -> GateEvent {
        match &mut self.state {
            State::Idle => {
                let mut contributors = HashSet::new();
                contributors.insert(observation.observer_id.clone());
                self.state = State::Open { first_at_ms: now_ms, contributors, observations: vec![observation] };
                GateEvent::Pending
            }
            State::Open { contributors, observations, .. } => {
                if contributors.contains(&observation.observer_id) {
                    // Same observer reporting again before the batch sealed: treat
                    // as the start of a new event, sealing the old one if it already
                    // has quorum.
                    let previous = std::mem::take(observations);
                    let previous_contributors = std::mem::take(contributors);
                    let sealed = if previous_contributors.len() >= 2 { Some(self.seal(previous)) } else { None };

                    let mut new_contributors = HashSet::new();
                    new_contributors.insert(observation.observer_id.clone());
                    self.state = State::Open { first_at_ms: now_ms, contributors: new_contributors, observations: vec![observation] };

                    return match sealed {
                        Some(batch) => GateEvent::Sealed(batch),
                        None => GateEvent::Dropped,
                    };
                }

                contributors.insert(observation.observer_id.clone());
                observations.push(observation);

                if contributors.len() >= self.active_observers {
                    let observations = std::mem::take(observations);
                    self.state = State::Idle;
                    GateEvent::Sealed(self.seal(observations))
                } else {
                    GateEvent::Pending
                }
            }
        }
    }

    /// Called on a timer tick (or directly in tests) to check whether the current
    /// `OPEN` batch has aged past `batch_window`.
    pub fn check_timeout(&mut self, now_ms: i64) -> GateEvent {
        match &self.state {
            State::Open { first_at_ms, contributors, .. } if now_ms - first_at_ms >= self.batch_window.as_millis() as i64 => {
                let had_quorum = contributors.len() >= 2;
                let State::Open { observations, .. } = std::mem::replace(&mut self.state, State::Idle) else {
                    unreachable!()
                };
                if had_quorum {
                    GateEvent::Sealed(self.seal(observations))
                } else {
                    GateEvent::Dropped
                }
            }
            _ => GateEvent::Pending,
        }
    }

    /// Flush on shutdown: seal the current `OPEN` batch if it has quorum, else drop
    /// it. Leaves the gate `Idle` either way.
    pub fn flush(&mut self) -> GateEvent {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => GateEvent::Pending,
            State::Open { contributors, observations, .. } => {
                if contributors.len() >= 2 {
                    GateEvent::Sealed(self.seal(observations))
                } else {
                    GateEvent::Dropped
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use witness_types::{Hint, Point2};

    fn obs(id: &str, t: i64) -> Observation {
        Observation {
            observer_id: id.into(),
            observer_pos: Point2::new(0.0, 0.0),
            observer_y: 64.0,
            hint: Hint::new(1, 1),
            hint_y: 64,
            observed_at_ms: t,
        }
    }

    #[test]
    fn seals_once_every_active_observer_reports() {
        let mut gate = Gate::new(2, Duration::from_secs(5));
        assert!(matches!(gate.ingest(obs("a", 0), 0), GateEvent::Pending));
        match gate.ingest(obs("b", 100), 100) {
            GateEvent::Sealed(batch) => assert_eq!(batch.observations.len(), 2),
            _ => panic!("expected sealed batch"),
        }
    }

    #[test]
    fn times_out_and_seals_with_quorum() {
        let mut gate = Gate::new(3, Duration::from_secs(5));
        gate.ingest(obs("a", 0), 0);
        gate.ingest(obs("b", 100), 100);
        match gate.check_timeout(5_100) {
            GateEvent::Sealed(batch) => assert_eq!(batch.observations.len(), 2),
            _ => panic!("expected sealed batch at timeout with quorum"),
        }
    }

    #[test]
    fn times_out_and_drops_without_quorum() {
        let mut gate = Gate::new(3, Duration::from_secs(5));
        gate.ingest(obs("a", 0), 0);
        assert!(matches!(gate.check_timeout(5_100), GateEvent::Dropped));
    }

    #[test]
    fn repeated_observer_before_seal_starts_a_new_event() {
        let mut gate = Gate::new(5, Duration::from_secs(5));
        gate.ingest(obs("a", 0), 0);
        gate.ingest(obs("b", 50), 50);
        // "a" reports again before the third observer arrives: old batch (2
        // contributors) seals, new OPEN batch starts with just "a".
        match gate.ingest(obs("a", 6_000), 6_000) {
            GateEvent::Sealed(batch) => assert_eq!(batch.observations.len(), 2),
            _ => panic!("expected the prior batch to seal on re-report"),
        }
    }

    #[test]
    fn s5_five_observers_seal_then_sixth_starts_new_batch_then_seventh_times_out() {
        let mut gate = Gate::new(5, Duration::from_secs(5));
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            assert!(matches!(gate.ingest(obs(id, i as i64 * 50), i as i64 * 50), GateEvent::Pending));
        }
        match gate.ingest(obs("e", 250), 250) {
            GateEvent::Sealed(batch) => assert_eq!(batch.observations.len(), 5),
            _ => panic!("expected five-observer batch to seal"),
        }

        assert!(matches!(gate.ingest(obs("a", 6_250), 6_250), GateEvent::Pending));
        assert!(matches!(gate.check_timeout(16_251), GateEvent::Dropped));
    }
}
