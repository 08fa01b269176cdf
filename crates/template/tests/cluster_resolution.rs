//! Templates resolving Prompts and Configs held by live controllers.

use serde_json::{Map, Value, json};
use std::sync::Arc;

use assistants_controller::{ControllerKind, ResourceController, ResourceSet, SchemaBacked};
use assistants_core::kinds::{CONFIG, PROMPT};
use assistants_core::resource::{API_VERSION, ASSISTANTS_GROUP};
use assistants_core::{KindRef, Prompt, ResourceDocument};
use assistants_template::{ClusterResolver, Rendered, substitute};

struct Cluster {
    prompts: ResourceController<Prompt>,
    configs: ResourceController<Value>,
    resolver: ClusterResolver,
}

fn cluster() -> Cluster {
    let prompts = ResourceController::new(
        "test",
        KindRef::new(ASSISTANTS_GROUP, API_VERSION, PROMPT),
        ControllerKind::SchemaBacked(SchemaBacked::typed(|p: Prompt| Ok(Arc::new(p)))),
    );
    let configs = ResourceController::new(
        "test",
        KindRef::new(ASSISTANTS_GROUP, API_VERSION, CONFIG),
        ControllerKind::SchemaBacked(SchemaBacked::untyped(|spec| Ok(Arc::new(Value::Object(spec.clone()))))),
    );
    let prompt_set = ResourceSet::new();
    prompt_set.register(&prompts);
    let config_set = ResourceSet::new();
    config_set.register(&configs);
    let resolver = ClusterResolver::new(ASSISTANTS_GROUP, API_VERSION, prompt_set, config_set);
    Cluster {
        prompts,
        configs,
        resolver,
    }
}

#[tokio::test]
async fn resolves_prompt_text() {
    let cluster = cluster();
    let doc = ResourceDocument::new(cluster.prompts.kind(), "intro", json!({"prompt": "You are helpful."}));
    cluster.prompts.apply("intro", &doc).await.unwrap();

    let rendered = substitute(
        "${assistants.thatone.ai/v1/Prompt/intro} Be brief.",
        &Map::new(),
        Some(&cluster.resolver),
    );
    assert_eq!(rendered, Rendered::Text("You are helpful. Be brief.".into()));
}

#[tokio::test]
async fn resolves_config_as_json_or_yaml() {
    let cluster = cluster();
    let doc = ResourceDocument::new(cluster.configs.kind(), "limits", json!({"max": 3}));
    cluster.configs.apply("limits", &doc).await.unwrap();

    let json = substitute(
        "${assistants.thatone.ai/v1/Config/limits|json}",
        &Map::new(),
        Some(&cluster.resolver),
    );
    assert_eq!(json.into_string(), r#"{"max":3}"#);

    let yaml = substitute(
        "${assistants.thatone.ai/v1/Config/limits | yaml}",
        &Map::new(),
        Some(&cluster.resolver),
    );
    assert_eq!(yaml.into_string(), "max: 3\n");
}

#[tokio::test]
async fn updates_are_seen_on_next_render() {
    let cluster = cluster();
    let kind = cluster.prompts.kind().clone();
    cluster
        .prompts
        .apply("p", &ResourceDocument::new(&kind, "p", json!({"prompt": "one"})))
        .await
        .unwrap();
    let template = "${assistants.thatone.ai/v1/Prompt/p}";
    assert_eq!(substitute(template, &Map::new(), Some(&cluster.resolver)).into_string(), "one");

    cluster
        .prompts
        .apply("p", &ResourceDocument::new(&kind, "p", json!({"prompt": "two"})))
        .await
        .unwrap();
    assert_eq!(substitute(template, &Map::new(), Some(&cluster.resolver)).into_string(), "two");

    cluster.prompts.remove("p").await;
    assert_eq!(substitute(template, &Map::new(), Some(&cluster.resolver)).into_string(), "");
}

#[test]
fn unknown_group_degrades_to_empty() {
    let cluster = cluster();
    let rendered = substitute("[${other.io/v2/Prompt/x}]", &Map::new(), Some(&cluster.resolver));
    assert_eq!(rendered.into_string(), "[]");
}
