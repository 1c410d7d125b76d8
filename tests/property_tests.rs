//! Property-based tests for core domain types and stack planning.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use gstack::core::graph::StackGraph;
use gstack::core::state::{MemoryStore, StackStore};
use gstack::core::types::{BranchName, Oid};
use gstack::core::verify::verify_forest;
use gstack::engine::create::plan_insertion;
use gstack::engine::InsertMode;

/// Strategy for generating valid branch name characters.
fn branch_name_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('A', 'Z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('.'),
        Just('/'),
    ]
}

/// Strategy for generating valid branch names.
fn valid_branch_name() -> impl Strategy<Value = String> {
    prop::collection::vec(branch_name_char(), 1..50).prop_filter_map(
        "must be valid branch name",
        |chars| {
            let name: String = chars.into_iter().collect();
            let bad_component = name
                .split('/')
                .any(|c| c.starts_with('.') || c.ends_with('.') || c.ends_with(".lock"));
            if name.starts_with('-')
                || name.starts_with('/')
                || name.ends_with('/')
                || name.ends_with('.')
                || name.contains("..")
                || name.contains("//")
                || bad_component
            {
                None
            } else {
                Some(name)
            }
        },
    )
}

fn mode() -> impl Strategy<Value = InsertMode> {
    prop_oneof![
        Just(InsertMode::Append),
        Just(InsertMode::InsertAbove),
        Just(InsertMode::InsertBelow),
    ]
}

/// One `create`: which existing node to start from, and how.
#[derive(Debug, Clone)]
struct Step {
    from: usize,
    mode: InsertMode,
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        (any::<usize>(), mode()).prop_map(|(from, mode)| Step { from, mode }),
        1..25,
    )
}

fn name(s: &str) -> BranchName {
    BranchName::new(s).unwrap()
}

fn head() -> Oid {
    Oid::new("a".repeat(40)).unwrap()
}

proptest! {
    /// Any valid branch name round-trips through serde.
    #[test]
    fn branch_name_serde_roundtrip(raw in valid_branch_name()) {
        let branch = BranchName::new(raw.as_str()).unwrap();
        let json = serde_json::to_string(&branch).unwrap();
        let parsed: BranchName = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(branch, parsed);
    }

    /// Names with a forbidden character never validate.
    #[test]
    fn forbidden_characters_rejected(
        prefix in "[a-z]{1,8}",
        bad in prop::sample::select(vec![' ', '~', '^', ':', '?', '*', '[', '\\']),
        suffix in "[a-z]{0,8}",
    ) {
        let raw = format!("{prefix}{bad}{suffix}");
        prop_assert!(BranchName::new(raw).is_err());
    }

    /// Any sequence of creates keeps the forest trunk-rooted and acyclic,
    /// and every mode puts the new branch where it promises.
    #[test]
    fn creates_preserve_forest(steps in steps()) {
        let trunk = name("main");
        let store = MemoryStore::new(trunk.clone());
        let mut nodes = vec![trunk.clone()];

        for (i, step) in steps.iter().enumerate() {
            let current = nodes[step.from % nodes.len()].clone();
            let new = name(&format!("b{i}"));
            let children_before = store.list_above(&current).unwrap();
            let base_before = store.lookup_branch(&current).ok().map(|b| b.base.name);

            let plan = match plan_insertion(&store, step.mode, &new, &current, &head()) {
                Ok(plan) => plan,
                Err(_) => {
                    prop_assert!(current == trunk && step.mode == InsertMode::InsertBelow);
                    continue;
                }
            };
            store.upsert_branches(&plan.upserts, &plan.message).unwrap();
            nodes.push(new.clone());

            let branches = store.branches().unwrap();
            let graph = StackGraph::from_edges(branches.iter().map(|b| (&b.name, &b.base.name)));
            prop_assert!(verify_forest(&graph, &trunk).is_ok());

            match step.mode {
                InsertMode::Append => {
                    prop_assert_eq!(store.lookup_branch(&new).unwrap().base.name, current.clone());
                    prop_assert!(store.list_above(&new).unwrap().is_empty());
                }
                InsertMode::InsertAbove => {
                    prop_assert_eq!(store.list_above(&current).unwrap(), vec![new.clone()]);
                    prop_assert_eq!(store.list_above(&new).unwrap(), children_before);
                }
                InsertMode::InsertBelow => {
                    prop_assert_eq!(store.lookup_branch(&current).unwrap().base.name, new.clone());
                    prop_assert_eq!(
                        Some(store.lookup_branch(&new).unwrap().base.name),
                        base_before
                    );
                }
            }
        }

        prop_assert_eq!(store.branches().unwrap().len(), nodes.len() - 1);
    }
}
