//! Setup Tracker
//!
//! Maintains the set of active [`SetupStateMachine`]s, indexed by setup id
//! and by session date. Feeds bars/events to every active machine in
//! arrival order and evicts machines once they reach a terminal state, so a
//! caller (live engine or backtest driver) never has to track liveness
//! itself.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use slob_schemas::setup::Setup;
use uuid::Uuid;

use crate::setup_state_machine::SetupStateMachine;

/// Indexed, insertion-ordered set of active setup state machines.
#[derive(Debug, Default)]
pub struct SetupTracker {
    machines: HashMap<Uuid, SetupStateMachine>,
    /// Arrival order, oldest first — iterating this instead of `machines`
    /// gives deterministic, arrival-ordered bar delivery.
    order: Vec<Uuid>,
    by_session: BTreeMap<NaiveDate, Vec<Uuid>>,
}

impl SetupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a new machine for `setup`, recording it under `session_date`.
    pub fn spawn(&mut self, setup: Setup, session_date: NaiveDate) -> Uuid {
        let id = setup.id;
        self.machines.insert(id, SetupStateMachine::new(setup));
        self.order.push(id);
        self.by_session.entry(session_date).or_default().push(id);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&SetupStateMachine> {
        self.machines.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut SetupStateMachine> {
        self.machines.get_mut(&id)
    }

    /// Active machine ids in the order they were spawned.
    pub fn active_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.order.iter().copied()
    }

    pub fn ids_for_session(&self, date: NaiveDate) -> &[Uuid] {
        self.by_session.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn active_count(&self) -> usize {
        self.machines.len()
    }

    /// Remove every machine that has reached a terminal state, returning
    /// their final `Setup` snapshots in arrival order. `by_session` entries
    /// for evicted ids are pruned too.
    pub fn evict_terminal(&mut self) -> Vec<Setup> {
        let mut evicted = Vec::new();
        let mut remaining = Vec::with_capacity(self.order.len());

        for id in self.order.drain(..) {
            let terminal = self
                .machines
                .get(&id)
                .map(|m| m.state().is_terminal())
                .unwrap_or(true);

            if terminal {
                if let Some(m) = self.machines.remove(&id) {
                    evicted.push(m.into_setup());
                }
            } else {
                remaining.push(id);
            }
        }

        self.order = remaining;

        if !evicted.is_empty() {
            let evicted_ids: std::collections::HashSet<Uuid> =
                evicted.iter().map(|s| s.id).collect();
            for ids in self.by_session.values_mut() {
                ids.retain(|id| !evicted_ids.contains(id));
            }
            self.by_session.retain(|_, ids| !ids.is_empty());
        }

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup_state_machine::SetupEvent;
    use chrono::NaiveDate;
    use slob_schemas::prices::Direction;
    use uuid::Uuid;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    }

    #[test]
    fn spawn_and_fetch_round_trips() {
        let mut t = SetupTracker::new();
        let setup = Setup::new(Uuid::new_v4(), "NQ", Direction::Long, 10, 5);
        let id = t.spawn(setup, day());
        assert_eq!(t.active_count(), 1);
        assert!(t.get(id).is_some());
        assert_eq!(t.ids_for_session(day()), &[id]);
    }

    #[test]
    fn arrival_order_is_preserved() {
        let mut t = SetupTracker::new();
        let a = t.spawn(Setup::new(Uuid::new_v4(), "NQ", Direction::Long, 1, 0), day());
        let b = t.spawn(Setup::new(Uuid::new_v4(), "NQ", Direction::Short, 1, 0), day());
        assert_eq!(t.active_ids().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn evict_terminal_drains_only_terminal_machines() {
        let mut t = SetupTracker::new();
        let done = t.spawn(Setup::new(Uuid::new_v4(), "NQ", Direction::Long, 1, 0), day());
        let alive = t.spawn(Setup::new(Uuid::new_v4(), "NQ", Direction::Short, 1, 0), day());

        t.get_mut(done).unwrap().apply(SetupEvent::Liq1Detected).unwrap();
        t.get_mut(done)
            .unwrap()
            .invalidate(
                slob_schemas::setup::InvalidationReason::NoLiq1Break,
                chrono::Utc::now(),
            )
            .unwrap();

        let evicted = t.evict_terminal();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, done);
        assert_eq!(t.active_count(), 1);
        assert_eq!(t.active_ids().collect::<Vec<_>>(), vec![alive]);
        assert_eq!(t.ids_for_session(day()), &[alive]);
    }
}
