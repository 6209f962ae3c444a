use std::collections::HashSet;

use proptest::collection::vec;
use proptest::prelude::*;
use tidewatch_daemon::scan::{scan_for_new, CachePolicy};

fn id() -> impl Strategy<Value = String> {
    "[1-9][0-9]{0,3}"
}

fn policy() -> impl Strategy<Value = CachePolicy> {
    prop_oneof![Just(CachePolicy::Unbounded), (1usize..20).prop_map(CachePolicy::Bounded)]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn new_ids_are_unseen_and_unique(
        extracted in vec(id(), 0..40),
        known in vec(id(), 0..40),
        policy in policy(),
    ) {
        let delta = scan_for_new(&extracted, &known, policy);
        let known_set: HashSet<&String> = known.iter().collect();
        let mut seen = HashSet::new();
        for new_id in &delta.new_ids {
            prop_assert!(!known_set.contains(new_id));
            prop_assert!(extracted.contains(new_id));
            prop_assert!(seen.insert(new_id.clone()), "duplicate new id {}", new_id);
        }
    }

    #[test]
    fn updated_known_leads_with_new_ids(
        extracted in vec(id(), 0..40),
        known in vec(id(), 0..40),
        policy in policy(),
    ) {
        let delta = scan_for_new(&extracted, &known, policy);
        prop_assert_eq!(&delta.updated_known[..delta.new_ids.len()], &delta.new_ids[..]);
        if let CachePolicy::Bounded(limit) = policy {
            prop_assert!(delta.updated_known.len() <= limit.max(delta.new_ids.len()));
        } else {
            prop_assert_eq!(delta.updated_known.len(), delta.new_ids.len() + known.len());
        }
    }

    #[test]
    fn nothing_is_reported_twice_across_cycles(
        fetches in vec(vec(id(), 0..15), 1..8),
        policy in policy(),
    ) {
        let mut known: Vec<String> = Vec::new();
        let mut previous: HashSet<String> = HashSet::new();
        let mut reported: HashSet<String> = HashSet::new();
        for extracted in &fetches {
            let delta = scan_for_new(extracted, &known, policy);
            for new_id in &delta.new_ids {
                prop_assert!(
                    !previous.contains(new_id),
                    "{} reported on consecutive cycles",
                    new_id
                );
                if policy == CachePolicy::Unbounded {
                    prop_assert!(!reported.contains(new_id), "{} reported again", new_id);
                }
            }
            previous = delta.new_ids.iter().cloned().collect();
            reported.extend(delta.new_ids.iter().cloned());
            known = delta.updated_known;
        }
    }
}
