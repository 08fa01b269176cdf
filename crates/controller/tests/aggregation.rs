//! Resource set propagation across controllers.

use std::sync::Arc;

use assistants_controller::{ControllerKind, ResourceController, ResourceSet, SchemaBacked};
use assistants_core::kinds::Prompt;
use assistants_core::resource::{API_VERSION, ASSISTANTS_GROUP, TOOLS_GROUP};
use assistants_core::{KindRef, ResourceDocument};
use serde_json::json;

fn controller(group: &str, kind: &str) -> ResourceController<Prompt> {
    ResourceController::new(
        "test",
        KindRef::new(group, API_VERSION, kind),
        ControllerKind::SchemaBacked(SchemaBacked::typed(|p: Prompt| Ok(Arc::new(p)))),
    )
}

fn doc(controller: &ResourceController<Prompt>, name: &str, text: &str) -> ResourceDocument {
    ResourceDocument::new(controller.kind(), name, json!({ "prompt": text }))
}

#[tokio::test]
async fn same_name_in_two_kinds_gives_two_keys() {
    let prompts = controller(ASSISTANTS_GROUP, "Prompt");
    let tools = controller(TOOLS_GROUP, "Tool");
    let set = ResourceSet::new();
    set.register(&prompts);
    set.register(&tools);

    prompts.apply("x", &doc(&prompts, "x", "from prompt")).await.unwrap();
    tools.apply("x", &doc(&tools, "x", "from tool")).await.unwrap();

    assert_eq!(
        set.keys(),
        vec![
            "assistants.thatone.ai/v1/Prompt/x".to_string(),
            "tools.thatone.ai/v1/Tool/x".to_string(),
        ]
    );

    prompts.remove("x").await;
    assert_eq!(set.len(), 1);
    assert_eq!(set.get("tools.thatone.ai/v1/Tool/x").unwrap().prompt, "from tool");
}

#[tokio::test]
async fn late_registration_replays_existing() {
    let prompts = controller(ASSISTANTS_GROUP, "Prompt");
    prompts.apply("a", &doc(&prompts, "a", "one")).await.unwrap();
    prompts.apply("b", &doc(&prompts, "b", "two")).await.unwrap();

    let set = ResourceSet::new();
    set.register(&prompts);
    assert_eq!(set.len(), 2);

    prompts.apply("c", &doc(&prompts, "c", "three")).await.unwrap();
    assert!(set.contains("assistants.thatone.ai/v1/Prompt/c"));
}

#[tokio::test]
async fn set_holds_aliases_not_copies() {
    let prompts = controller(ASSISTANTS_GROUP, "Prompt");
    let set = ResourceSet::new();
    set.register(&prompts);

    let created = prompts.apply("a", &doc(&prompts, "a", "one")).await.unwrap();
    let seen = set.get_key(&prompts.key("a")).unwrap();
    assert!(Arc::ptr_eq(&created, &seen));

    prompts.apply("a", &doc(&prompts, "a", "two")).await.unwrap();
    assert_eq!(set.get_key(&prompts.key("a")).unwrap().prompt, "two");
}

#[tokio::test]
async fn resolve_expands_short_references() {
    let prompts = controller(ASSISTANTS_GROUP, "Prompt");
    let set = ResourceSet::new();
    set.register(&prompts);
    prompts.apply("intro", &doc(&prompts, "intro", "hello")).await.unwrap();

    let defaults = prompts.kind().clone();
    let (key, prompt) = set.resolve("intro", &defaults).unwrap();
    assert_eq!(key, prompts.key("intro"));
    assert_eq!(prompt.prompt, "hello");
    assert!(set.resolve("Prompt/intro", &defaults).is_ok());
    assert!(set.resolve("missing", &defaults).is_err());
}

#[tokio::test]
async fn two_sets_receive_the_same_events() {
    let prompts = controller(ASSISTANTS_GROUP, "Prompt");
    let first = ResourceSet::new();
    let second = ResourceSet::new();
    first.register(&prompts);
    second.register(&prompts);

    prompts.apply("a", &doc(&prompts, "a", "one")).await.unwrap();
    assert_eq!(first.keys(), second.keys());

    prompts.remove("a").await;
    assert!(first.is_empty());
    assert!(second.is_empty());
}
