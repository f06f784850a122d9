//! Desired/current diffing for keyed collections

use std::collections::{BTreeMap, BTreeSet};

/// Keys to create, update and delete to move `current` to `desired`
///
/// The change sets are pairwise disjoint. Together with `unchanged` they
/// cover every key of both inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSet<K: Ord> {
    pub to_create: BTreeSet<K>,
    pub to_update: BTreeSet<K>,
    pub to_delete: BTreeSet<K>,
    /// Present on both sides and already equal
    pub unchanged: BTreeSet<K>,
}

impl<K: Ord> Default for ReconcileSet<K> {
    fn default() -> Self {
        Self {
            to_create: BTreeSet::new(),
            to_update: BTreeSet::new(),
            to_delete: BTreeSet::new(),
            unchanged: BTreeSet::new(),
        }
    }
}

impl<K: Ord> ReconcileSet<K> {
    /// No change is needed
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Number of keys that need a change
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Diff two keyed maps.
///
/// `equal(desired, current)` decides whether a key present on both sides
/// needs an update; it is where callers ignore derived or cosmetic fields.
pub fn diff<K, V, F>(
    desired: &BTreeMap<K, V>,
    current: &BTreeMap<K, V>,
    equal: F,
) -> ReconcileSet<K>
where
    K: Ord + Clone,
    F: Fn(&V, &V) -> bool,
{
    let mut set = ReconcileSet::default();

    for (key, want) in desired {
        match current.get(key) {
            None => {
                set.to_create.insert(key.clone());
            }
            Some(have) if !equal(want, have) => {
                set.to_update.insert(key.clone());
            }
            Some(_) => {
                set.unchanged.insert(key.clone());
            }
        }
    }

    for key in current.keys() {
        if !desired.contains_key(key) {
            set.to_delete.insert(key.clone());
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Bucket {
        size: u32,
        versioning: bool,
        /// Assigned by the portal; never compared
        created_at: Option<String>,
    }

    fn bucket(size: u32, versioning: bool) -> Bucket {
        Bucket {
            size,
            versioning,
            created_at: None,
        }
    }

    fn same_bucket(a: &Bucket, b: &Bucket) -> bool {
        a.size == b.size && a.versioning == b.versioning
    }

    fn map(entries: &[(&str, Bucket)]) -> BTreeMap<String, Bucket> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn keys(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_create_into_empty() {
        let set = diff(&map(&[("b1", bucket(10, false))]), &map(&[]), same_bucket);

        assert_eq!(keys(&set.to_create), vec!["b1"]);
        assert!(set.to_update.is_empty());
        assert!(set.to_delete.is_empty());
    }

    #[test]
    fn test_changed_value_is_update() {
        let set = diff(
            &map(&[("b1", bucket(20, false))]),
            &map(&[("b1", bucket(10, false))]),
            same_bucket,
        );

        assert_eq!(keys(&set.to_update), vec!["b1"]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_missing_from_desired_is_delete() {
        let set = diff(&map(&[]), &map(&[("b1", bucket(10, true))]), same_bucket);

        assert_eq!(keys(&set.to_delete), vec!["b1"]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_identical_sets_are_empty() {
        let entries = [("a", bucket(1, false)), ("b", bucket(2, true))];
        let set = diff(&map(&entries), &map(&entries), same_bucket);

        assert!(set.is_empty());
        assert_eq!(keys(&set.unchanged), vec!["a", "b"]);
    }

    #[test]
    fn test_equal_ignores_derived_fields() {
        let mut remote = bucket(10, false);
        remote.created_at = Some("2026-01-01T00:00:00Z".to_string());

        let set = diff(
            &map(&[("b1", bucket(10, false))]),
            &map(&[("b1", remote)]),
            same_bucket,
        );
        assert!(set.is_empty());
    }

    #[test]
    fn test_sets_are_disjoint_and_cover_all_keys() {
        let desired = map(&[
            ("keep", bucket(1, false)),
            ("grow", bucket(5, false)),
            ("new", bucket(1, true)),
        ]);
        let current = map(&[
            ("keep", bucket(1, false)),
            ("grow", bucket(2, false)),
            ("old", bucket(1, false)),
        ]);

        let set = diff(&desired, &current, same_bucket);

        assert!(set.to_create.is_disjoint(&set.to_update));
        assert!(set.to_create.is_disjoint(&set.to_delete));
        assert!(set.to_update.is_disjoint(&set.to_delete));

        assert_eq!(keys(&set.unchanged), vec!["keep"]);
        assert!(set.unchanged.iter().all(|k| !set.to_update.contains(k)));

        let covered: BTreeSet<String> = set
            .to_create
            .iter()
            .chain(&set.to_update)
            .chain(&set.to_delete)
            .chain(&set.unchanged)
            .cloned()
            .collect();

        let all: BTreeSet<String> = desired.keys().chain(current.keys()).cloned().collect();
        assert_eq!(covered, all);
    }

    mod properties {
        use super::super::*;
        use proptest::collection::btree_map;
        use proptest::prelude::*;

        fn arb_state() -> impl Strategy<Value = BTreeMap<u8, u8>> {
            btree_map(any::<u8>(), 0u8..4, 0..24)
        }

        proptest! {
            #[test]
            fn diff_partitions_every_key(desired in arb_state(), current in arb_state()) {
                let set = diff(&desired, &current, |a, b| a == b);

                prop_assert!(set.to_create.is_disjoint(&set.to_update));
                prop_assert!(set.to_create.is_disjoint(&set.to_delete));
                prop_assert!(set.to_update.is_disjoint(&set.to_delete));
                prop_assert!(set.unchanged.is_disjoint(&set.to_update));

                for key in &set.to_create {
                    prop_assert!(desired.contains_key(key) && !current.contains_key(key));
                }
                for key in &set.to_delete {
                    prop_assert!(current.contains_key(key) && !desired.contains_key(key));
                }
                for key in &set.to_update {
                    prop_assert_ne!(desired.get(key), current.get(key));
                }

                let covered: BTreeSet<u8> = set
                    .to_create
                    .iter()
                    .chain(&set.to_update)
                    .chain(&set.to_delete)
                    .chain(&set.unchanged)
                    .copied()
                    .collect();
                let all: BTreeSet<u8> = desired.keys().chain(current.keys()).copied().collect();
                prop_assert_eq!(covered, all);
            }

            #[test]
            fn diff_against_itself_is_empty(state in arb_state()) {
                let set = diff(&state, &state, |a, b| a == b);

                prop_assert!(set.is_empty());
                prop_assert_eq!(set.unchanged.len(), state.len());
            }
        }
    }
}
