//! Tool kinds reconciled from the in-memory bus.

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use assistants_bus::InMemoryBus;
use assistants_controller::{ControllerKind, ResourceController, ResourceSet, SchemaBacked};
use assistants_core::bus::{ResourceBus, StreamBus};
use assistants_core::kinds::StreamSpec;
use assistants_core::{KindRef, ResourceDocument, Tool};
use assistants_tools::{ConfigStore, SendTarget, ToolEnvironment, tool_controllers};

const CLUSTER: &str = "test";

fn assistants_kind(kind: &str) -> KindRef {
    KindRef::new("assistants.thatone.ai", "v1", kind)
}

fn tools_kind(kind: &str) -> KindRef {
    KindRef::new("tools.thatone.ai", "v1", kind)
}

async fn eventually<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

struct Harness {
    bus: InMemoryBus,
    tools: ResourceSet<dyn Tool>,
    configs: ResourceSet<Value>,
}

async fn harness() -> Harness {
    let bus = InMemoryBus::new();
    let shared: Arc<InMemoryBus> = Arc::new(bus.clone());

    let streams = ResourceSet::<StreamSpec>::new();
    let stream_controller = Arc::new(ResourceController::new(
        CLUSTER,
        assistants_kind("Stream"),
        ControllerKind::SchemaBacked(SchemaBacked::typed(|spec: StreamSpec| Ok(Arc::new(spec)))),
    ));
    streams.register(&stream_controller);

    let configs = ResourceSet::<Value>::new();
    let config_controller = Arc::new(ResourceController::new(
        CLUSTER,
        assistants_kind("Config"),
        ControllerKind::SchemaBacked(SchemaBacked::untyped(|spec| Ok(Arc::new(Value::Object(spec.clone()))))),
    ));
    configs.register(&config_controller);

    let env = ToolEnvironment {
        cluster: CLUSTER.into(),
        group: "tools.thatone.ai".into(),
        version: "v1".into(),
        http: reqwest::Client::new(),
        provider: None,
        send: SendTarget {
            bus: shared.clone() as Arc<dyn StreamBus>,
            streams,
            stream_kind: assistants_kind("Stream"),
        },
        configs: ConfigStore {
            bus: shared.clone() as Arc<dyn ResourceBus>,
            cluster: CLUSTER.into(),
            configs: configs.clone(),
            config_kind: assistants_kind("Config"),
        },
    };

    let tools = ResourceSet::<dyn Tool>::new();
    stream_controller.start(shared.clone()).await.unwrap();
    config_controller.start(shared.clone()).await.unwrap();
    for controller in tool_controllers(&env) {
        tools.register(&controller);
        controller.start(shared.clone()).await.unwrap();
    }

    Harness { bus, tools, configs }
}

#[tokio::test]
async fn send_tool_publishes_to_referenced_stream() {
    let h = harness().await;
    let mut inbox = h.bus.subscribe("chat-out").await.unwrap();

    h.bus
        .apply_resource(
            CLUSTER,
            ResourceDocument::new(&assistants_kind("Stream"), "out", json!({"stream": "chat-out"})),
            false,
        )
        .await
        .unwrap();
    h.bus
        .apply_resource(
            CLUSTER,
            ResourceDocument::new(
                &tools_kind("SendTool"),
                "notify",
                json!({"description": "tell the user", "stream": "out", "format": {"text": "$msg"}}),
            ),
            false,
        )
        .await
        .unwrap();

    let key = "tools.thatone.ai/v1/SendTool/notify";
    eventually(|| h.tools.contains(key)).await;
    let tool = h.tools.get(key).unwrap();
    assert_eq!(tool.description(), "tell the user");

    tool.call(json!({"msg": "done"})).await.unwrap();
    assert_eq!(inbox.recv().await.unwrap(), json!({"text": "done"}));
}

#[tokio::test]
async fn edit_config_tool_round_trips_through_bus() {
    let h = harness().await;
    h.bus
        .apply_resource(
            CLUSTER,
            ResourceDocument::new(&assistants_kind("Config"), "settings", json!({"mode": "a"})),
            false,
        )
        .await
        .unwrap();
    h.bus
        .apply_resource(
            CLUSTER,
            ResourceDocument::new(
                &tools_kind("EditConfigTool"),
                "edit",
                json!({"description": "change settings", "config": "settings"}),
            ),
            false,
        )
        .await
        .unwrap();

    let tool_key = "tools.thatone.ai/v1/EditConfigTool/edit";
    let config_key = "assistants.thatone.ai/v1/Config/settings";
    eventually(|| h.tools.contains(tool_key) && h.configs.contains(config_key)).await;

    let updated = h
        .tools
        .get(tool_key)
        .unwrap()
        .call(json!({"key": "limits.max", "value": 3}))
        .await
        .unwrap();
    assert_eq!(updated, json!({"mode": "a", "limits": {"max": 3}}));

    eventually(|| h.configs.get(config_key).is_some_and(|c| c["limits"]["max"] == json!(3))).await;
    let stored = h
        .bus
        .read_resource(CLUSTER, &assistants_kind("Config"), "settings")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.spec["limits"]["max"], json!(3));
}

#[tokio::test]
async fn invalid_tool_is_rejected_and_absent() {
    let h = harness().await;
    h.bus
        .apply_resource(
            CLUSTER,
            ResourceDocument::new(&tools_kind("SendTool"), "broken", json!({"description": "no target"})),
            false,
        )
        .await
        .unwrap();
    h.bus
        .apply_resource(
            CLUSTER,
            ResourceDocument::new(
                &tools_kind("RestApiTool"),
                "ok",
                json!({"description": "d", "method": "GET", "url": "http://localhost"}),
            ),
            false,
        )
        .await
        .unwrap();

    eventually(|| h.tools.contains("tools.thatone.ai/v1/RestApiTool/ok")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!h.tools.contains("tools.thatone.ai/v1/SendTool/broken"));
}

#[tokio::test]
async fn edit_of_missing_config_fails() {
    let h = harness().await;
    h.bus
        .apply_resource(
            CLUSTER,
            ResourceDocument::new(
                &tools_kind("EditConfigTool"),
                "edit",
                json!({"description": "d", "config": "nope"}),
            ),
            false,
        )
        .await
        .unwrap();
    let key = "tools.thatone.ai/v1/EditConfigTool/edit";
    eventually(|| h.tools.contains(key)).await;
    let err = h.tools.get(key).unwrap().call(json!({"key": "a"})).await.unwrap_err();
    assert!(err.to_string().contains("Must create the config"));
}
