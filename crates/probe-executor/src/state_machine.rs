//! Pure per-attempt state machine for one executable step
//!
//! `transition(state, event, policy) -> (state, effects)`. No async, no I/O:
//! the executor performs the effects and feeds back what happened.
//!
//! ```text
//! Pending → Attempting → Succeeded
//!                      → Rescuing → Succeeded | Retrying
//!                      → Retrying → Attempting
//!                      → Exhausted
//! ```
//!
//! Invalid transitions end in `Exhausted` with a descriptive error; the
//! function never panics.

use probe_core::FailureKind;

/// Retry budget and rescue eligibility for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub rescues_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Pending,
    Attempting {
        attempt: u32,
        rescues_tried: bool,
    },
    /// Rescue strategies are running after a not-found failure
    Rescuing {
        attempt: u32,
        error: String,
    },
    /// Waiting before the next attempt
    Retrying {
        attempt: u32,
        rescues_tried: bool,
    },
    Succeeded {
        retries: u32,
        rescued_by: Option<String>,
    },
    Exhausted {
        retries: u32,
        kind: FailureKind,
        error: String,
    },
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Exhausted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    Start,
    Succeeded,
    Failed {
        kind: FailureKind,
        error: String,
        /// The step has a concrete target a rescue could act on
        rescuable: bool,
    },
    RescueSucceeded {
        strategy: String,
    },
    RescueFailed,
    /// Pre-retry effects are done
    RetryReady,
}

/// Side effects the executor performs after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Perform,
    /// Short pause, then retry with the same selector
    AwaitStaleSettle,
    /// Swap in an alternative selector for the next attempt
    SwitchSelector,
    /// Retry delay
    Backoff,
    RunRescues,
    Log { message: String },
}

fn retry_effects(kind: FailureKind) -> Vec<Effect> {
    match kind {
        FailureKind::StaleElement => vec![Effect::AwaitStaleSettle],
        FailureKind::NotFound => vec![Effect::SwitchSelector, Effect::Backoff],
        FailureKind::Timeout | FailureKind::Unknown => vec![Effect::Backoff],
    }
}

/// Pure state transition function
pub fn transition(state: AttemptState, event: AttemptEvent, policy: &RetryPolicy) -> (AttemptState, Vec<Effect>) {
    match (state, event) {
        (AttemptState::Pending, AttemptEvent::Start) => (
            AttemptState::Attempting {
                attempt: 0,
                rescues_tried: false,
            },
            vec![Effect::Perform],
        ),

        (AttemptState::Attempting { attempt, .. }, AttemptEvent::Succeeded) => (
            AttemptState::Succeeded {
                retries: attempt,
                rescued_by: None,
            },
            vec![],
        ),

        (
            AttemptState::Attempting {
                attempt,
                rescues_tried,
            },
            AttemptEvent::Failed {
                kind,
                error,
                rescuable,
            },
        ) => {
            let log = Effect::Log {
                message: format!("Attempt {} failed ({}): {}", attempt + 1, kind, error),
            };
            if attempt >= policy.max_retries {
                return (
                    AttemptState::Exhausted {
                        retries: attempt,
                        kind,
                        error,
                    },
                    vec![log],
                );
            }
            if kind == FailureKind::NotFound && rescuable && policy.rescues_enabled && !rescues_tried {
                return (
                    AttemptState::Rescuing { attempt, error },
                    vec![log, Effect::RunRescues],
                );
            }
            let mut effects = vec![log];
            effects.extend(retry_effects(kind));
            (
                AttemptState::Retrying {
                    attempt: attempt + 1,
                    rescues_tried,
                },
                effects,
            )
        }

        (AttemptState::Rescuing { attempt, .. }, AttemptEvent::RescueSucceeded { strategy }) => (
            AttemptState::Succeeded {
                retries: attempt,
                rescued_by: Some(strategy),
            },
            vec![],
        ),

        (AttemptState::Rescuing { attempt, error }, AttemptEvent::RescueFailed) => {
            let mut effects = vec![Effect::Log {
                message: format!("Rescues found nothing; retrying after: {}", error),
            }];
            effects.extend(retry_effects(FailureKind::NotFound));
            (
                AttemptState::Retrying {
                    attempt: attempt + 1,
                    rescues_tried: true,
                },
                effects,
            )
        }

        (
            AttemptState::Retrying {
                attempt,
                rescues_tried,
            },
            AttemptEvent::RetryReady,
        ) => (
            AttemptState::Attempting {
                attempt,
                rescues_tried,
            },
            vec![Effect::Perform],
        ),

        (state, event) => {
            let retries = match &state {
                AttemptState::Attempting { attempt, .. }
                | AttemptState::Rescuing { attempt, .. }
                | AttemptState::Retrying { attempt, .. } => *attempt,
                AttemptState::Succeeded { retries, .. } | AttemptState::Exhausted { retries, .. } => *retries,
                AttemptState::Pending => 0,
            };
            (
                AttemptState::Exhausted {
                    retries,
                    kind: FailureKind::Unknown,
                    error: format!("Invalid state transition: {:?} cannot handle event {:?}", state, event),
                },
                vec![],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: RetryPolicy = RetryPolicy {
        max_retries: 3,
        rescues_enabled: true,
    };

    fn failed(kind: FailureKind, rescuable: bool) -> AttemptEvent {
        AttemptEvent::Failed {
            kind,
            error: format!("{} error", kind),
            rescuable,
        }
    }

    #[test]
    fn test_stale_twice_then_success() {
        let (state, effects) = transition(AttemptState::Pending, AttemptEvent::Start, &POLICY);
        assert_eq!(effects, vec![Effect::Perform]);

        let (state, effects) = transition(state, failed(FailureKind::StaleElement, true), &POLICY);
        assert!(matches!(state, AttemptState::Retrying { attempt: 1, .. }));
        assert!(effects.contains(&Effect::AwaitStaleSettle));
        let (state, _) = transition(state, AttemptEvent::RetryReady, &POLICY);

        let (state, _) = transition(state, failed(FailureKind::StaleElement, true), &POLICY);
        let (state, _) = transition(state, AttemptEvent::RetryReady, &POLICY);
        let (state, _) = transition(state, AttemptEvent::Succeeded, &POLICY);
        assert_eq!(
            state,
            AttemptState::Succeeded {
                retries: 2,
                rescued_by: None
            }
        );
    }

    #[test]
    fn test_not_found_tries_rescues_once() {
        let (state, _) = transition(AttemptState::Pending, AttemptEvent::Start, &POLICY);
        let (state, effects) = transition(state, failed(FailureKind::NotFound, true), &POLICY);
        assert!(matches!(state, AttemptState::Rescuing { attempt: 0, .. }));
        assert!(effects.contains(&Effect::RunRescues));

        let (state, effects) = transition(state, AttemptEvent::RescueFailed, &POLICY);
        assert!(effects.contains(&Effect::SwitchSelector));
        let (state, _) = transition(state, AttemptEvent::RetryReady, &POLICY);

        // Second not-found goes straight to a retry
        let (state, effects) = transition(state, failed(FailureKind::NotFound, true), &POLICY);
        assert!(matches!(state, AttemptState::Retrying { attempt: 2, rescues_tried: true }));
        assert!(!effects.contains(&Effect::RunRescues));
    }

    #[test]
    fn test_rescue_success_completes_step() {
        let state = AttemptState::Rescuing {
            attempt: 0,
            error: "not found".to_string(),
        };
        let (state, _) = transition(
            state,
            AttemptEvent::RescueSucceeded {
                strategy: "iframe".to_string(),
            },
            &POLICY,
        );
        assert_eq!(
            state,
            AttemptState::Succeeded {
                retries: 0,
                rescued_by: Some("iframe".to_string())
            }
        );
    }

    #[test]
    fn test_untargeted_not_found_skips_rescues() {
        let (state, _) = transition(AttemptState::Pending, AttemptEvent::Start, &POLICY);
        let (state, effects) = transition(state, failed(FailureKind::NotFound, false), &POLICY);
        assert!(matches!(state, AttemptState::Retrying { .. }));
        assert!(!effects.contains(&Effect::RunRescues));
    }

    #[test]
    fn test_timeout_exhausts_budget() {
        let policy = RetryPolicy {
            max_retries: 1,
            rescues_enabled: true,
        };
        let (state, _) = transition(AttemptState::Pending, AttemptEvent::Start, &policy);
        let (state, effects) = transition(state, failed(FailureKind::Timeout, true), &policy);
        assert!(effects.contains(&Effect::Backoff));
        let (state, _) = transition(state, AttemptEvent::RetryReady, &policy);
        let (state, _) = transition(state, failed(FailureKind::Timeout, true), &policy);
        assert!(state.is_terminal());
        assert!(matches!(
            state,
            AttemptState::Exhausted {
                retries: 1,
                kind: FailureKind::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn test_no_rescue_on_last_attempt() {
        let policy = RetryPolicy {
            max_retries: 0,
            rescues_enabled: true,
        };
        let (state, _) = transition(AttemptState::Pending, AttemptEvent::Start, &policy);
        let (state, _) = transition(state, failed(FailureKind::NotFound, true), &policy);
        assert!(matches!(state, AttemptState::Exhausted { .. }));
    }

    #[test]
    fn test_invalid_transition_exhausts() {
        let (state, effects) = transition(AttemptState::Pending, AttemptEvent::RetryReady, &POLICY);
        assert!(matches!(state, AttemptState::Exhausted { kind: FailureKind::Unknown, .. }));
        assert!(effects.is_empty());
    }
}
