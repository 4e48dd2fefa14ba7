//! Lifecycle transitions of a summary

use coa_protocol::summary::{SummaryResult, SummaryState};
use tracing::info;

use crate::errors::CoordinatorError;

/// Check that a summary may move from `from` to `to`.
///
/// States only move forward. Repeating the current state is accepted so a
/// retried report does not fail, and nothing leaves `Done`.
pub fn check_transition(
    id: &str,
    from: SummaryState,
    to: SummaryState,
) -> Result<(), CoordinatorError> {
    match (from, to) {
        (SummaryState::Pending, _) => Ok(()),
        (SummaryState::Running, SummaryState::Running | SummaryState::Done) => Ok(()),
        (SummaryState::Done, SummaryState::Done) => Ok(()),
        (from, to) => Err(CoordinatorError::InvalidTransition {
            id: id.to_string(),
            from,
            to,
        }),
    }
}

/// Move `result` to `to`, refreshing its timestamp
pub fn advance(result: &mut SummaryResult, to: SummaryState) -> Result<(), CoordinatorError> {
    let from = result.state;
    check_transition(&result.summary_id, from, to)?;
    if from != to {
        info!("Summary {} moved {:?} -> {:?}", result.summary_id, from, to);
    }
    result.state = to;
    result.touch();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut result = SummaryResult::new("s1", "1", "h", SummaryState::Pending);

        advance(&mut result, SummaryState::Running).unwrap();
        assert_eq!(result.state, SummaryState::Running);

        advance(&mut result, SummaryState::Running).unwrap();
        advance(&mut result, SummaryState::Done).unwrap();
        assert!(result.is_finished());

        advance(&mut result, SummaryState::Done).unwrap();
        assert!(result.is_finished());
    }

    #[test]
    fn test_pending_may_finish_directly() {
        assert!(check_transition("s1", SummaryState::Pending, SummaryState::Done).is_ok());
        assert!(check_transition("s1", SummaryState::Pending, SummaryState::Pending).is_ok());
    }

    #[test]
    fn test_backward_transitions_rejected() {
        let mut result = SummaryResult::new("s1", "1", "h", SummaryState::Done);
        let err = advance(&mut result, SummaryState::Running).unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::InvalidTransition {
                from: SummaryState::Done,
                to: SummaryState::Running,
                ..
            }
        ));
        assert!(result.is_finished());

        assert!(check_transition("s1", SummaryState::Running, SummaryState::Pending).is_err());
        assert!(check_transition("s1", SummaryState::Done, SummaryState::Pending).is_err());
    }
}
