//! Setup State Machine
//!
//! Explicit state machine for a single 5/1 SLOB candidate, one per live
//! setup. Distinct from [`crate::oms::state_machine`], which tracks a live
//! broker *order's* fill/cancel lifecycle — this one tracks the *pattern*
//! lifecycle from LSE range through a completed (or invalidated) trade.
//!
//! Transitions are driven by [`SetupEvent`]s raised as `PatternFinder`
//! detectors confirm each stage, plus order-execution callbacks once a
//! bracket is submitted. Every edge moves strictly forward except
//! `ConsolidationForming`, which may self-loop while bars keep extending
//! the window, and `Invalidate`, which is legal from any non-terminal
//! state.

use chrono::{DateTime, Utc};
use slob_schemas::setup::{InvalidationReason, Setup, SetupState};

/// Events that drive transitions in a [`SetupStateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupEvent {
    Liq1Detected,
    /// The consolidation window extended by one more bar without breaking out.
    ConsolidationExtended,
    ConsolidationConfirmed,
    NoWickSweepFound,
    EntryArmed,
    OrderSubmitted,
    /// The bracket's entry leg filled; the setup is now in a live trade.
    Filled,
    /// The trade exited (TP, SL, or timeout) and the setup is done.
    Completed,
}

/// Returned when an event cannot legally be applied in the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupTransitionError {
    pub from: SetupState,
    pub event: SetupEvent,
}

impl std::fmt::Display for SetupTransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal setup transition: {:?} + {:?}", self.from, self.event)
    }
}

impl std::error::Error for SetupTransitionError {}

/// Drives one [`Setup`] through its lifecycle. Every accepted transition
/// writes `at` onto the setup's invalidation timestamp (when invalidating)
/// so a caller can snapshot the setup to `StatePersistence` immediately
/// after `apply` returns `Ok`.
#[derive(Debug, Clone)]
pub struct SetupStateMachine {
    setup: Setup,
}

impl SetupStateMachine {
    pub fn new(setup: Setup) -> Self {
        Self { setup }
    }

    pub fn state(&self) -> SetupState {
        self.setup.state
    }

    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    pub fn into_setup(self) -> Setup {
        self.setup
    }

    /// Apply a forward-progress event. Returns [`SetupTransitionError`] if
    /// the event is illegal in the current state; the setup is left
    /// unchanged on error.
    pub fn apply(&mut self, event: SetupEvent) -> Result<(), SetupTransitionError> {
        use SetupEvent::*;
        use SetupState::*;

        let next = match (self.setup.state, event) {
            (LseReady, Liq1Detected) => SetupState::Liq1Detected,

            (Liq1Detected, ConsolidationExtended) => SetupState::ConsolidationForming,
            (ConsolidationForming, ConsolidationExtended) => SetupState::ConsolidationForming,

            (ConsolidationForming, ConsolidationConfirmed) => SetupState::ConsolidationConfirmed,

            (ConsolidationConfirmed, NoWickSweepFound) => SetupState::NoWickSweepFound,

            (NoWickSweepFound, EntryArmed) => SetupState::EntryArmed,

            (EntryArmed, OrderSubmitted) => SetupState::OrderSubmitted,

            (OrderSubmitted, Filled) => SetupState::InTrade,

            (InTrade, Completed) => SetupState::Completed,

            (from, event) => return Err(SetupTransitionError { from, event }),
        };

        self.setup.state = next;
        Ok(())
    }

    /// Invalidate the setup. Legal from any non-terminal state.
    pub fn invalidate(
        &mut self,
        reason: InvalidationReason,
        at: DateTime<Utc>,
    ) -> Result<(), SetupTransitionError> {
        if self.setup.state.is_terminal() {
            return Err(SetupTransitionError {
                from: self.setup.state,
                event: SetupEvent::Completed,
            });
        }

        self.setup.state = SetupState::Invalidated;
        self.setup.invalidation = Some(slob_schemas::setup::Invalidation {
            reason,
            timestamp: at,
        });
        Ok(())
    }
}
