//! Table-driven state transitions.
//!
//! Each state machine is a pure function `(state, event) -> Option<next>`.
//! Every mutator goes through [`transit`], so legality lives in one table per
//! entity type instead of being re-checked at call sites.

use std::fmt::Debug;
use volumeflow_shared::{VolumeflowError, VolumeflowResult};

pub trait StateMachine: Copy + Eq + Debug {
    type Event: Copy + Debug;

    /// Next state for `event`, or `None` if the pair is not in the table.
    fn next(self, event: Self::Event) -> Option<Self>;

    /// Whether no event leads out of this state.
    fn is_terminal(self) -> bool;
}

/// Look up the next state without mutating anything.
pub fn peek<S: StateMachine>(state: S, event: S::Event) -> VolumeflowResult<S> {
    state
        .next(event)
        .ok_or_else(|| VolumeflowError::InvalidTransition {
            from: format!("{:?}", state),
            event: format!("{:?}", event),
        })
}

/// Apply `event` to `state` in place. Illegal pairs leave `state` untouched.
pub fn transit<S: StateMachine>(state: &mut S, event: S::Event) -> VolumeflowResult<S> {
    let next = peek(*state, event)?;
    *state = next;
    Ok(next)
}
