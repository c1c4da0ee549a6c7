//! Reaction state transitions
//!
//! Applied only after the backing store has acknowledged a toggle; there is
//! no optimistic mutation.

use crate::types::{Reaction, ReactionSummary};

/// Compute the reaction summary after the caller toggles `requested`.
///
/// - same reaction again: toggles it off
/// - no prior reaction: casts `requested`
/// - the other reaction: switches, moving one vote across
///
/// Counts saturate at zero.
pub fn resolve(prior: ReactionSummary, requested: Reaction) -> ReactionSummary {
    let mut next = prior;
    match prior.caller_reaction {
        Some(current) if current == requested => {
            decrement(&mut next, requested);
            next.caller_reaction = None;
        }
        Some(current) => {
            decrement(&mut next, current);
            increment(&mut next, requested);
            next.caller_reaction = Some(requested);
        }
        None => {
            increment(&mut next, requested);
            next.caller_reaction = Some(requested);
        }
    }
    next
}

fn increment(summary: &mut ReactionSummary, reaction: Reaction) {
    match reaction {
        Reaction::Like => summary.like_count = summary.like_count.saturating_add(1),
        Reaction::Dislike => summary.dislike_count = summary.dislike_count.saturating_add(1),
    }
}

fn decrement(summary: &mut ReactionSummary, reaction: Reaction) {
    match reaction {
        Reaction::Like => summary.like_count = summary.like_count.saturating_sub(1),
        Reaction::Dislike => summary.dislike_count = summary.dislike_count.saturating_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REACTIONS: [Reaction; 2] = [Reaction::Like, Reaction::Dislike];

    fn priors() -> Vec<ReactionSummary> {
        let mut out = Vec::new();
        for like in [0, 1, 5] {
            for dislike in [0, 1, 7] {
                out.push(ReactionSummary::new(like, dislike, None));
                if like > 0 {
                    out.push(ReactionSummary::new(like, dislike, Some(Reaction::Like)));
                }
                if dislike > 0 {
                    out.push(ReactionSummary::new(like, dislike, Some(Reaction::Dislike)));
                }
            }
        }
        out
    }

    #[test]
    fn test_like_then_like_again() {
        let start = ReactionSummary::new(5, 7, None);

        let liked = resolve(start, Reaction::Like);
        assert_eq!(liked, ReactionSummary::new(6, 7, Some(Reaction::Like)));

        let unliked = resolve(liked, Reaction::Like);
        assert_eq!(unliked, ReactionSummary::new(5, 7, None));
    }

    #[test]
    fn test_switch_moves_one_vote() {
        let start = ReactionSummary::new(3, 2, Some(Reaction::Like));
        let switched = resolve(start, Reaction::Dislike);
        assert_eq!(switched, ReactionSummary::new(2, 3, Some(Reaction::Dislike)));
    }

    #[test]
    fn test_double_toggle_is_identity() {
        for prior in priors() {
            for r in REACTIONS {
                assert_eq!(resolve(resolve(prior, r), r), prior, "prior {:?} reaction {:?}", prior, r);
            }
        }
    }

    #[test]
    fn test_total_moves_by_at_most_one() {
        for prior in priors() {
            for r in REACTIONS {
                let next = resolve(prior, r);
                let delta = next.total() as i64 - prior.total() as i64;
                assert!(delta.abs() <= 1, "prior {:?} reaction {:?}", prior, r);
            }
        }
    }

    #[test]
    fn test_inconsistent_prior_clamps_at_zero() {
        // Caller claims a like the counts don't reflect
        let prior = ReactionSummary::new(0, 0, Some(Reaction::Like));
        assert_eq!(resolve(prior, Reaction::Like), ReactionSummary::new(0, 0, None));
        assert_eq!(resolve(prior, Reaction::Dislike), ReactionSummary::new(0, 1, Some(Reaction::Dislike)));
    }
}
