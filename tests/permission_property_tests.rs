//! Property tests for permission matching and persistence

use orion_host::permission::{
    matches, Namespace, MemoryBackend, PermissionBackend, PermissionSnapshot, PermissionStore,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn node() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..4).prop_map(|s| s.join("."))
}

fn grants() -> impl Strategy<Value = BTreeMap<String, BTreeSet<String>>> {
    prop::collection::btree_map("[0-9]{1,6}", prop::collection::btree_set(node(), 1..5), 0..6)
}

proptest! {
    #[test]
    fn global_grant_matches_any_node(required in node()) {
        prop_assert!(matches("*", &required));
    }

    #[test]
    fn every_grant_matches_itself(granted in "[a-z.*]{1,12}") {
        prop_assert!(matches(&granted, &granted));
    }

    #[test]
    fn wildcard_covers_exactly_its_subtree(prefix in node(), rest in node(), other in segment()) {
        let grant = format!("{}.*", prefix);
        prop_assert!(matches(&grant, &prefix));
        let child = format!("{}.{}", prefix, rest);
        prop_assert!(matches(&grant, &child));
        // a sibling sharing the textual prefix is not covered
        let sibling = format!("{}{}", prefix, other);
        prop_assert!(!matches(&grant, &sibling));
    }

    #[test]
    fn exact_grant_never_covers_children(granted in node(), child in segment()) {
        let required = format!("{}.{}", granted, child);
        prop_assert!(!matches(&granted, &required));
    }

    #[test]
    fn matching_ignores_case(granted in node()) {
        prop_assert!(matches(&granted, &granted.to_uppercase()));
    }

    #[test]
    fn save_then_load_round_trips(users in grants(), roles in grants()) {
        let backend = Arc::new(MemoryBackend::new());
        let store = PermissionStore::open(backend.clone()).unwrap();
        for (actor, nodes) in &users {
            for node in nodes {
                store.add_permission(Namespace::User, actor, node).unwrap();
            }
        }
        for (actor, nodes) in &roles {
            for node in nodes {
                store.add_permission(Namespace::Role, actor, node).unwrap();
            }
        }

        let fresh = PermissionStore::open(backend.clone()).unwrap();
        for (actor, nodes) in &users {
            prop_assert_eq!(&fresh.get(Namespace::User, actor), nodes);
        }
        for (actor, nodes) in &roles {
            prop_assert_eq!(&fresh.get(Namespace::Role, actor), nodes);
        }
        prop_assert_eq!(fresh.snapshot(), store.snapshot());
    }

    #[test]
    fn file_round_trip(users in grants(), roles in grants()) {
        let tmp = tempfile::TempDir::new().unwrap();
        let to_vecs = |m: &BTreeMap<String, BTreeSet<String>>| -> BTreeMap<String, Vec<String>> {
            m.iter().map(|(k, v)| (k.clone(), v.iter().cloned().collect())).collect()
        };
        let snapshot = PermissionSnapshot { users: to_vecs(&users), roles: to_vecs(&roles) };
        for name in ["p.toml", "p.json"] {
            let backend = orion_host::permission::FileBackend::new(tmp.path().join(name)).unwrap();
            backend.save(&snapshot).unwrap();
            prop_assert_eq!(backend.load().unwrap(), snapshot.clone());
        }
    }
}
