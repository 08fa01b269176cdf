//! Property-based tests for the reconciliation state machine.
//!
//! Any sequence of operations over a handful of names must leave the
//! controller and its parent set in the state predicted by folding the
//! present/absent transition table over each name's operations.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use assistants_controller::{ControllerKind, ResourceController, ResourceSet, SchemaBacked};
use assistants_core::kinds::Prompt;
use assistants_core::resource::{API_VERSION, ASSISTANTS_GROUP};
use assistants_core::{KindRef, PendingOperation, ResourceDocument, Verdict};
use serde_json::json;

#[derive(Debug, Clone)]
enum Op {
    Apply(String),
    Invalid,
    Delete,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => prop::sample::select(vec!["one", "two", "three"]).prop_map(|s| Op::Apply(s.to_string())),
        1 => Just(Op::Invalid),
        2 => Just(Op::Delete),
    ]
}

fn sequence_strategy() -> impl Strategy<Value = Vec<(String, Op)>> {
    prop::collection::vec(
        (prop::sample::select(vec!["a", "b", "c"]).prop_map(String::from), op_strategy()),
        0..40,
    )
}

fn kind() -> KindRef {
    KindRef::new(ASSISTANTS_GROUP, API_VERSION, "Prompt")
}

fn operation(name: &str, op: &Op) -> PendingOperation {
    let config = match op {
        Op::Apply(text) => Some(ResourceDocument::new(&kind(), name, json!({ "prompt": text }))),
        Op::Invalid => Some(ResourceDocument::new(&kind(), name, json!({ "unexpected": true }))),
        Op::Delete => None,
    };
    PendingOperation::new(name, config, None).0
}

/// The transition table, folded per name.
fn expected(sequence: &[(String, Op)]) -> (HashMap<String, String>, Vec<Verdict>) {
    let mut table = HashMap::new();
    let mut verdicts = Vec::new();
    for (name, op) in sequence {
        match op {
            Op::Apply(text) => {
                table.insert(name.clone(), text.clone());
                verdicts.push(Verdict::Accepted);
            }
            Op::Invalid => verdicts.push(Verdict::Rejected),
            Op::Delete => {
                table.remove(name);
                verdicts.push(Verdict::Accepted);
            }
        }
    }
    (table, verdicts)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn table_matches_transition_fold(sequence in sequence_strategy()) {
        let controller = ResourceController::new(
            "test",
            kind(),
            ControllerKind::SchemaBacked(SchemaBacked::typed(|p: Prompt| Ok(Arc::new(p)))),
        );
        let set = ResourceSet::new();
        set.register(&controller);

        let verdicts = runtime().block_on(async {
            let mut verdicts = Vec::new();
            for (name, op) in &sequence {
                verdicts.push(controller.reconcile(operation(name, op)).await);
            }
            verdicts
        });

        let (table, expected_verdicts) = expected(&sequence);
        prop_assert_eq!(verdicts, expected_verdicts);

        let mut names: Vec<String> = table.keys().cloned().collect();
        names.sort();
        prop_assert_eq!(controller.names(), names);
        for (name, text) in &table {
            prop_assert_eq!(&controller.get(name).unwrap().prompt, text);
            prop_assert_eq!(&set.get_key(&controller.key(name)).unwrap().prompt, text);
        }
        prop_assert_eq!(set.len(), table.len());
    }

    #[test]
    fn reapplying_present_config_changes_nothing(text in "[a-z ]{0,20}") {
        let controller = ResourceController::new(
            "test",
            kind(),
            ControllerKind::SchemaBacked(SchemaBacked::typed(|p: Prompt| Ok(Arc::new(p)))),
        );
        let doc = ResourceDocument::new(&kind(), "a", json!({ "prompt": text }));

        let (first, second) = runtime().block_on(async {
            let first = controller.apply("a", &doc).await.unwrap();
            let second = controller.apply("a", &doc).await.unwrap();
            (first, second)
        });

        prop_assert!(Arc::ptr_eq(&first, &second));
        prop_assert_eq!(controller.document("a"), Some(doc));
    }
}
