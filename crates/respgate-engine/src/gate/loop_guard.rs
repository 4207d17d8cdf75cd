use respgate_core::loop_state::LoopState;
use respgate_core::reasons;
use respgate_core::traits::LoopGuard;
use respgate_core::types::DecisionIndex;
use tracing::{debug, warn};

use super::verdict::Verdict;
use crate::trace::Trace;

/// Default hook: returns the index unchanged.
///
/// Loop-aware policy belongs in matrix selection (see the `pr_review_loop`
/// profiles), never in relaxing the index here.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLoopGuard;

impl LoopGuard for NoopLoopGuard {
    fn evaluate(&self, index: DecisionIndex, state: Option<&LoopState>) -> DecisionIndex {
        if let Some(s) = state {
            debug!(
                round_index = s.round_index,
                nit_only_streak = s.nit_only_streak,
                "loop guard: no-op"
            );
        }
        index
    }
}

/// Run the hook and enforce no-relax: a lower returned index is discarded.
pub fn apply_loop_guard(
    mut v: Verdict,
    guard: &dyn LoopGuard,
    state: Option<&LoopState>,
    trace: &mut Trace,
) -> Verdict {
    let before = v.index();
    let returned = guard.evaluate(before, state);
    if returned < before {
        warn!(pre = %before, returned = %returned, "loop guard attempted to relax decision");
        trace.push(format!(
            "LoopGuard: attempted relax ignored (pre={before}, returned={returned})"
        ));
        return v;
    }
    if returned > before {
        trace.push(format!("LoopGuard: tightened {before} -> {returned}"));
        v.raise_to(returned, reasons::LOOP_GUARD_TIGHTEN);
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Relaxer;

    impl LoopGuard for Relaxer {
        fn evaluate(&self, index: DecisionIndex, _state: Option<&LoopState>) -> DecisionIndex {
            DecisionIndex::new(index.value().saturating_sub(1)).unwrap_or(index)
        }
    }

    struct StreakTightener;

    impl LoopGuard for StreakTightener {
        fn evaluate(&self, index: DecisionIndex, state: Option<&LoopState>) -> DecisionIndex {
            match state {
                Some(s) if s.nit_only_streak >= 3 => index.max(DecisionIndex::HITL),
                _ => index,
            }
        }
    }

    fn state(streak: u32) -> LoopState {
        LoopState {
            round_index: 4,
            nit_only_streak: streak,
            last_signal_fingerprint: None,
        }
    }

    #[test]
    fn noop_keeps_index() {
        let mut trace = Trace::new(true);
        let v = apply_loop_guard(Verdict::new(DecisionIndex::HITL), &NoopLoopGuard, Some(&state(1)), &mut trace);
        assert_eq!(v.index(), DecisionIndex::HITL);
        assert!(trace.lines().is_empty());
    }

    #[test]
    fn relax_is_ignored_and_traced() {
        let mut trace = Trace::new(true);
        let v = apply_loop_guard(Verdict::new(DecisionIndex::HITL), &Relaxer, None, &mut trace);
        assert_eq!(v.index(), DecisionIndex::HITL);
        assert!(trace.contains("LoopGuard: attempted relax ignored"));
    }

    #[test]
    fn tightening_is_accepted() {
        let mut trace = Trace::new(true);
        let v = apply_loop_guard(Verdict::default(), &StreakTightener, Some(&state(3)), &mut trace);
        assert_eq!(v.index(), DecisionIndex::HITL);
        assert_eq!(v.primary_reason(), reasons::LOOP_GUARD_TIGHTEN);

        let v = apply_loop_guard(Verdict::default(), &StreakTightener, Some(&state(1)), &mut trace);
        assert_eq!(v.index(), DecisionIndex::ALLOW);
    }
}
