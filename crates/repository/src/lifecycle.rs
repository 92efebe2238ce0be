//! Entity lifecycle state machine.
//!
//! ```text
//! PENDING ──submit──▶ SUBMITTED ──publish──▶ PUBLISHED ──withdraw──▶ WITHDRAWN
//!    ▲                    │
//!    └──────pending───────┘
//! ```
//!
//! Requesting the state an entity is already in is a no-op. Any other
//! move not drawn above is an invalid parameter.

use archivum_core::{DomainError, DomainResult};

use crate::entity::EntityState;

/// Named lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Submit,
    Publish,
    Withdraw,
    Pending,
}

impl Transition {
    pub const ALL: [Transition; 4] = [
        Transition::Submit,
        Transition::Publish,
        Transition::Withdraw,
        Transition::Pending,
    ];

    pub fn target(self) -> EntityState {
        match self {
            Transition::Submit => EntityState::Submitted,
            Transition::Publish => EntityState::Published,
            Transition::Withdraw => EntityState::Withdrawn,
            Transition::Pending => EntityState::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Publish => "publish",
            Transition::Withdraw => "withdraw",
            Transition::Pending => "pending",
        }
    }
}

pub struct StateMachine;

impl StateMachine {
    /// Whether `from -> to` is one of the drawn edges.
    pub fn can_transition(from: EntityState, to: EntityState) -> bool {
        use EntityState::*;
        matches!(
            (from, to),
            (Pending, Submitted) | (Submitted, Published) | (Published, Withdrawn) | (Submitted, Pending)
        )
    }

    /// Plan a transition from `current`.
    ///
    /// Returns `Ok(None)` when the entity already is in the target state.
    pub fn plan(current: EntityState, transition: Transition) -> DomainResult<Option<EntityState>> {
        let target = transition.target();
        if current == target {
            return Ok(None);
        }
        if Self::can_transition(current, target) {
            Ok(Some(target))
        } else {
            Err(DomainError::invalid_parameter(format!(
                "unable to {} an entity in state {current}",
                transition.as_str()
            )))
        }
    }

    /// Content writes are rejected once an entity is published or withdrawn.
    pub fn ensure_mutable(state: EntityState) -> DomainResult<()> {
        if state.is_frozen() {
            Err(DomainError::invalid_parameter(format!(
                "unable to modify an entity in state {state}"
            )))
        } else {
            Ok(())
        }
    }
}

/// Free-standing form of [`StateMachine::can_transition`].
pub fn can_transition(from: EntityState, to: EntityState) -> bool {
    StateMachine::can_transition(from, to)
}
