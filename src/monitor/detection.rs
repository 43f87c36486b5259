//! Detection state machine
//!
//! Callers feed only authoritative signals (see [`super::Route`]). The
//! machine never re-issues an action for a state it already holds.

use crate::host::SignalKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionState {
    /// Nothing known yet; the only state that accepts a one-time sync
    #[default]
    Uninitialized,
    Inactive,
    Active,
}

/// Replay buffer action implied by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DetectionState,
    pub to: DetectionState,
}

impl Transition {
    /// Entering `Active` starts; only leaving `Active` stops. Leaving
    /// `Uninitialized` for `Inactive` implies nothing because nothing was
    /// started.
    pub fn action(&self) -> Option<Action> {
        match (self.from, self.to) {
            (_, DetectionState::Active) => Some(Action::Start),
            (DetectionState::Active, DetectionState::Inactive) => Some(Action::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Detector {
    state: DetectionState,
}

impl Detector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    /// Apply an authoritative signal
    pub fn apply(&mut self, signal: SignalKind) -> Option<Transition> {
        let target = if signal.indicates_activity() {
            DetectionState::Active
        } else {
            DetectionState::Inactive
        };
        self.transition_to(target)
    }

    /// One-time sync from a host query. Ignored once any state is known.
    pub fn sync(&mut self, active: bool) -> Option<Transition> {
        if self.state != DetectionState::Uninitialized {
            return None;
        }
        self.transition_to(if active {
            DetectionState::Active
        } else {
            DetectionState::Inactive
        })
    }

    /// Back to `Uninitialized`, returning the state that was held
    pub fn reset(&mut self) -> DetectionState {
        std::mem::take(&mut self.state)
    }

    fn transition_to(&mut self, to: DetectionState) -> Option<Transition> {
        if self.state == to {
            return None;
        }
        let from = std::mem::replace(&mut self.state, to);
        Some(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(detector: &mut Detector, signals: &[SignalKind]) -> Vec<Action> {
        signals
            .iter()
            .filter_map(|signal| detector.apply(*signal))
            .filter_map(|transition| transition.action())
            .collect()
    }

    #[test]
    fn test_hook_sequence() {
        let mut detector = Detector::new();
        let issued = actions(
            &mut detector,
            &[SignalKind::Hooked, SignalKind::Hooked, SignalKind::Unhooked],
        );
        assert_eq!(issued, vec![Action::Start, Action::Stop]);
        assert_eq!(detector.state(), DetectionState::Inactive);
    }

    #[test]
    fn test_generic_sequence() {
        let mut detector = Detector::new();
        let issued = actions(&mut detector, &[SignalKind::Show, SignalKind::Hide]);
        assert_eq!(issued, vec![Action::Start, Action::Stop]);
    }

    #[test]
    fn test_first_deactivation_issues_nothing() {
        let mut detector = Detector::new();
        let transition = detector.apply(SignalKind::Unhooked).unwrap();
        assert_eq!(transition.from, DetectionState::Uninitialized);
        assert_eq!(transition.action(), None);
        assert_eq!(detector.state(), DetectionState::Inactive);
    }

    #[test]
    fn test_sync_only_from_uninitialized() {
        let mut detector = Detector::new();
        let transition = detector.sync(true).unwrap();
        assert_eq!(transition.action(), Some(Action::Start));

        // already known, a later query must not override signals
        assert_eq!(detector.sync(false), None);
        assert_eq!(detector.state(), DetectionState::Active);
    }

    #[test]
    fn test_inactive_sync_issues_nothing() {
        let mut detector = Detector::new();
        let transition = detector.sync(false).unwrap();
        assert_eq!(transition.action(), None);
    }

    #[test]
    fn test_reset_reports_previous_state() {
        let mut detector = Detector::new();
        detector.apply(SignalKind::Activate);
        assert_eq!(detector.reset(), DetectionState::Active);
        assert_eq!(detector.state(), DetectionState::Uninitialized);
        assert_eq!(detector.reset(), DetectionState::Uninitialized);
    }

    #[test]
    fn test_start_stop_balance_over_all_sequences() {
        // every sequence of exactly five signals covers every shorter prefix
        let alphabet = SignalKind::ALL;
        let base = alphabet.len();
        let total = base.pow(5);

        for mut n in 0..total {
            let mut seq = Vec::with_capacity(5);
            for _ in 0..5 {
                seq.push(alphabet[n % base]);
                n /= base;
            }

            let mut detector = Detector::new();
            let mut balance: i32 = 0;
            for signal in &seq {
                if let Some(action) = detector.apply(*signal).and_then(|t| t.action()) {
                    match action {
                        Action::Start => balance += 1,
                        Action::Stop => balance -= 1,
                    }
                }
                assert!(
                    balance == 0 || balance == 1,
                    "unbalanced actions for {:?}",
                    seq
                );
                if balance == 1 {
                    assert_eq!(detector.state(), DetectionState::Active);
                }
            }
        }
    }
}
