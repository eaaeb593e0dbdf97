//! Property tests for the aggregation store

use proptest::prelude::*;
use rolemap_core::Role;
use rolemap_crawler::AggregationStore;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

fn role_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    (
        "roles/r[0-9]{1,2}",
        prop::collection::vec("p[0-9]{1,2}", 0..8),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_merges_are_unique_and_consistent(roles in prop::collection::vec(role_strategy(), 0..30)) {
        let store = AggregationStore::new("global");
        for (name, permissions) in &roles {
            store.merge_role(Role::new(name, "global").with_permissions(permissions.clone()));
        }

        let role_names: HashSet<&String> = roles.iter().map(|(n, _)| n).collect();
        prop_assert_eq!(store.role_count(), role_names.len());

        // only the first merge of a role name counts
        let mut first: Vec<(&String, &Vec<String>)> = Vec::new();
        for (name, permissions) in &roles {
            if !first.iter().any(|(n, _)| *n == name) {
                first.push((name, permissions));
            }
        }
        let distinct: BTreeSet<&String> = first.iter().flat_map(|(_, p)| p.iter()).collect();
        prop_assert_eq!(store.permission_count(), distinct.len());

        prop_assert!(store.consistency_violations().is_empty());
        for permission in store.permissions() {
            for role in &permission.roles {
                let entry = store.get_role(role).unwrap();
                prop_assert!(entry.included_permissions.contains(&permission.name));
            }
        }
    }

    #[test]
    fn prop_linking_is_idempotent(permission in "p[0-9]{1,3}", role in "roles/r[0-9]{1,3}", repeats in 1usize..5) {
        let store = AggregationStore::new("global");
        for _ in 0..repeats {
            store.link_permission(&permission, &role, None);
        }

        let entry = store.get_permission(&permission).unwrap();
        prop_assert_eq!(entry.roles.len(), 1);
        prop_assert!(entry.has_role(&role));
    }
}

#[test]
fn test_concurrent_merges_converge() {
    let store = Arc::new(AggregationStore::new("global"));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    let perms = (0..6).map(|j| format!("p{}", (t * 7 + i + j) % 25));
                    store.merge_role(Role::new(format!("roles/r{}", i), "global").with_permissions(perms));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.role_count(), 50);
    assert!(store.permission_count() <= 25);
    assert!(store.consistency_violations().is_empty());
}
