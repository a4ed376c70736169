//! Change detection against the last-seen revision

use tracing::debug;

use super::state::{BranchKey, ScanState};

/// True iff `head` differs from the revision recorded for `key`, or nothing is recorded
///
/// Does not mutate state; the pass records the new head right after this
/// check, before filtering or dispatch.
pub fn is_new(state: &ScanState, key: &BranchKey, head: &str) -> bool {
    let previous = state.last_seen(key);
    let new = previous != Some(head);
    debug!(path = %key.path.display(), branch = %key.branch, ?previous, %head, new, "is_new");
    new
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_sighting_is_new() {
        let state = ScanState::new();
        assert!(is_new(&state, &BranchKey::new("/repo", "main"), "abc123"));
    }

    #[test]
    fn test_same_head_is_not_new() {
        let mut state = ScanState::new();
        let key = BranchKey::new("/repo", "main");
        state.record_seen(&key, "abc123");
        assert!(!is_new(&state, &key, "abc123"));
        assert!(is_new(&state, &key, "def456"));
    }

    #[test]
    fn test_three_distinct_revisions_flag_three_times() {
        let mut state = ScanState::new();
        let key = BranchKey::new("/repo", "main");
        let mut flagged = 0;
        for rev in ["r1", "r2", "r3"] {
            if is_new(&state, &key, rev) {
                flagged += 1;
            }
            state.record_seen(&key, rev);
        }
        assert_eq!(flagged, 3);
    }

    proptest! {
        #[test]
        fn prop_new_once_per_change(revs in proptest::collection::vec("[a-c]", 1..40)) {
            let mut state = ScanState::new();
            let key = BranchKey::new("/repo", "main");
            let mut flagged = 0usize;
            for rev in &revs {
                if is_new(&state, &key, rev) {
                    flagged += 1;
                }
                state.record_seen(&key, rev);
            }
            let changes = 1 + revs.windows(2).filter(|w| w[0] != w[1]).count();
            prop_assert_eq!(flagged, changes);
        }
    }
}
