//! Property tests for the two pieces of the dispatch algorithm with the
//! widest input space: priority/FIFO ordering inside a bucket, and runtime
//! generic-argument matching under the variance rules.

use std::any::TypeId;

use eventcore::generic::matches as generic_matches;
use eventcore::{EventConfiguration, GenericParamSpec, HandlerDescriptor, TypeDescriptor, Variance};
use proptest::prelude::*;

fn leaf<T: 'static>(name: &'static str) -> TypeDescriptor {
    TypeDescriptor::leaf::<T>(name)
}

fn build_descriptor(id: String, priority: i32, seq_hint: u32) -> std::sync::Arc<HandlerDescriptor> {
    let cfg = EventConfiguration::builder().priority(priority).build();
    // `seq_hint` only influences registration order in the proptest driver below;
    // the descriptor's real `seq` still comes from the crate's monotonic counter.
    let _ = seq_hint;
    std::sync::Arc::new(
        HandlerDescriptor::builder(TypeId::of::<()>(), "unit", id)
            .configuration(cfg)
            .plain(|_, _| Ok(()))
            .build()
            .unwrap(),
    )
}

proptest! {
    /// For any sequence of (id, priority) registrations inserted in order, the
    /// resulting bucket snapshot is sorted by descending priority, and within
    /// equal priority preserves the original registration order.
    #[test]
    fn bucket_snapshot_is_priority_sorted_and_fifo_stable(
        priorities in prop::collection::vec(-100i32..100, 1..30)
    ) {
        let bucket = eventcore::bucket::HandlerBucket::default();
        let mut expected_ids: Vec<String> = Vec::new();
        for (i, priority) in priorities.iter().enumerate() {
            let id = format!("h{i}");
            bucket.insert(build_descriptor(id.clone(), *priority, i as u32));
            expected_ids.push(id);
        }

        let snapshot = bucket.snapshot();
        let got: Vec<(i32, &str)> = snapshot
            .iter()
            .map(|d| (d.configuration.priority(), d.handler_id.as_ref()))
            .collect();

        // Descending priority.
        for window in got.windows(2) {
            prop_assert!(window[0].0 >= window[1].0);
        }

        // Within each priority group, relative registration order is preserved.
        let mut by_priority: std::collections::BTreeMap<i32, Vec<&str>> = std::collections::BTreeMap::new();
        for (priority, id) in &got {
            by_priority.entry(-*priority).or_default().push(id);
        }
        for (priority, ids_in_snapshot) in &by_priority {
            let priority = -*priority;
            let expected_order: Vec<&str> = expected_ids
                .iter()
                .enumerate()
                .filter(|(i, _)| priorities[*i] == priority)
                .map(|(_, id)| id.as_str())
                .collect();
            prop_assert_eq!(ids_in_snapshot, &expected_order);
        }
    }

    /// Invariant matching never accepts a runtime type other than the exact
    /// bound, regardless of what other leaf types are thrown at it.
    #[test]
    fn invariant_spec_only_accepts_its_bound(seed in 0u8..4) {
        let bound = leaf::<String>("String");
        let spec = vec![GenericParamSpec::invariant(bound.clone())];

        let candidates = [
            leaf::<String>("String"),
            leaf::<i64>("i64"),
            leaf::<bool>("bool"),
            leaf::<f64>("f64"),
        ];
        let runtime = &candidates[seed as usize % candidates.len()];
        let accepted = generic_matches(&spec, std::slice::from_ref(runtime));
        prop_assert_eq!(accepted, runtime.id == bound.id);
    }

    /// Unconstrained specs accept any single-argument runtime type, but still
    /// reject arity mismatches.
    #[test]
    fn unconstrained_ignores_identity_but_respects_arity(extra_args in 0usize..4) {
        let spec = vec![GenericParamSpec::unconstrained()];
        let runtime_args: Vec<TypeDescriptor> = (0..extra_args + 1)
            .map(|_| leaf::<i64>("i64"))
            .collect();

        if runtime_args.len() == spec.len() {
            prop_assert!(generic_matches(&spec, &runtime_args));
        } else {
            prop_assert!(!generic_matches(&spec, &runtime_args));
        }
    }
}

#[test]
fn variance_enum_round_trips_through_equality() {
    assert_eq!(Variance::Invariant, Variance::Invariant);
    assert_ne!(Variance::Invariant, Variance::Covariant);
}
