// libs/appointment-cell/src/services/lifecycle.rs
use std::fmt;

use tracing::{debug, warn};

use crate::error::AppointmentError;
use crate::models::AppointmentState;

/// Event-driven moves. Direct administrative overwrites bypass this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Confirm,
    Cancel,
    Complete,
    Reassign,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Confirm => write!(f, "confirm"),
            LifecycleEvent::Cancel => write!(f, "cancel"),
            LifecycleEvent::Complete => write!(f, "complete"),
            LifecycleEvent::Reassign => write!(f, "reassign"),
        }
    }
}

pub fn valid_events(current: AppointmentState) -> &'static [LifecycleEvent] {
    match current {
        AppointmentState::Pending => &[LifecycleEvent::Confirm, LifecycleEvent::Cancel],
        AppointmentState::Confirmed => &[
            LifecycleEvent::Cancel,
            LifecycleEvent::Complete,
            LifecycleEvent::Reassign,
        ],
        // Terminal states
        AppointmentState::Cancelled | AppointmentState::Completed => &[],
    }
}

/// Target state of `event` from `current`, or `InvalidTransition`.
pub fn next_state(current: AppointmentState, event: LifecycleEvent) -> Result<AppointmentState, AppointmentError> {
    if !valid_events(current).contains(&event) {
        warn!("Rejected transition: {} from {}", event, current);
        return Err(AppointmentError::InvalidTransition {
            from: current,
            event: event.to_string(),
        });
    }

    let next = match event {
        LifecycleEvent::Confirm | LifecycleEvent::Reassign => AppointmentState::Confirmed,
        LifecycleEvent::Cancel => AppointmentState::Cancelled,
        LifecycleEvent::Complete => AppointmentState::Completed,
    };
    debug!("Transition {} -> {} via {}", current, next, event);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pending_can_be_confirmed_or_cancelled() {
        assert_eq!(
            next_state(AppointmentState::Pending, LifecycleEvent::Confirm),
            Ok(AppointmentState::Confirmed)
        );
        assert_eq!(
            next_state(AppointmentState::Pending, LifecycleEvent::Cancel),
            Ok(AppointmentState::Cancelled)
        );
        assert_matches!(
            next_state(AppointmentState::Pending, LifecycleEvent::Complete),
            Err(AppointmentError::InvalidTransition { .. })
        );
    }

    #[test]
    fn confirmed_can_complete_cancel_or_move() {
        assert_eq!(
            next_state(AppointmentState::Confirmed, LifecycleEvent::Complete),
            Ok(AppointmentState::Completed)
        );
        assert_eq!(
            next_state(AppointmentState::Confirmed, LifecycleEvent::Reassign),
            Ok(AppointmentState::Confirmed)
        );
        assert_matches!(
            next_state(AppointmentState::Confirmed, LifecycleEvent::Confirm),
            Err(AppointmentError::InvalidTransition { .. })
        );
    }

    #[test]
    fn terminal_states_accept_no_events() {
        for state in [AppointmentState::Cancelled, AppointmentState::Completed] {
            for event in [
                LifecycleEvent::Confirm,
                LifecycleEvent::Cancel,
                LifecycleEvent::Complete,
                LifecycleEvent::Reassign,
            ] {
                assert_matches!(
                    next_state(state, event),
                    Err(AppointmentError::InvalidTransition { from, .. }) if from == state
                );
            }
        }
    }
}
