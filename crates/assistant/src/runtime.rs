//! Runtime wiring: every resource set and controller, owned in one place.
//!
//! Controllers start in dependency order (Prompt, Config, Stream, TaskLog,
//! the tool kinds, then Assistant) so that an assistant loaded at startup
//! finds its streams, tools and examples already reconciled.

use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use assistants_controller::{ControllerKind, ResourceController, ResourceSet, SchemaBacked};
use assistants_core::bus::{ResourceBus, StreamBus};
use assistants_core::error::TransportError;
use assistants_core::kinds::{ASSISTANT, CONFIG, PROMPT, STREAM, TASK_LOG};
use assistants_core::resource::{API_VERSION, ASSISTANTS_GROUP, TOOLS_GROUP};
use assistants_core::{AgentFactory, KindRef, Prompt, Provider, StreamSpec, TaskLog, Tool};
use assistants_tools::{ConfigStore, SendTarget, ToolEnvironment, tool_controllers};

use crate::assistant::{Assistant, AssistantHandlers};
use crate::context::{AssistantContext, Conventions, TaskLogNames};

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub cluster: String,
    pub assistants_group: String,
    pub tools_group: String,
    pub version: String,
    pub conventions: Conventions,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            cluster: "default".into(),
            assistants_group: ASSISTANTS_GROUP.into(),
            tools_group: TOOLS_GROUP.into(),
            version: API_VERSION.into(),
            conventions: Conventions::default(),
        }
    }
}

/// External collaborators the runtime is built on.
pub struct Collaborators {
    pub resources: Arc<dyn ResourceBus>,
    pub streams: Arc<dyn StreamBus>,
    pub provider: Option<Arc<dyn Provider>>,
    pub agents: Arc<dyn AgentFactory>,
    pub http: reqwest::Client,
}

/// Reconciled names of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindStatus {
    pub kind: KindRef,
    pub names: Vec<String>,
}

pub struct Runtime {
    context: Arc<AssistantContext>,
    prompts: Arc<ResourceController<Prompt>>,
    configs: Arc<ResourceController<Value>>,
    streams: Arc<ResourceController<StreamSpec>>,
    tools: Vec<Arc<ResourceController<dyn Tool>>>,
    assistants: Arc<ResourceController<Assistant>>,
    assistant_set: ResourceSet<Assistant>,
}

impl Runtime {
    pub fn new(options: RuntimeOptions, collaborators: Collaborators) -> Self {
        let RuntimeOptions {
            cluster,
            assistants_group,
            tools_group,
            version,
            conventions,
        } = options;
        let assistants_kind = |kind: &str| KindRef::new(&assistants_group, &version, kind);

        let prompt_set: ResourceSet<Prompt> = ResourceSet::new();
        let prompts = Arc::new(ResourceController::new(
            cluster.clone(),
            assistants_kind(PROMPT),
            ControllerKind::SchemaBacked(SchemaBacked::typed(|prompt: Prompt| Ok(Arc::new(prompt)))),
        ));
        prompt_set.register(&prompts);

        let config_set: ResourceSet<Value> = ResourceSet::new();
        let configs = Arc::new(ResourceController::new(
            cluster.clone(),
            assistants_kind(CONFIG),
            ControllerKind::SchemaBacked(SchemaBacked::untyped(|spec| Ok(Arc::new(Value::Object(spec.clone()))))),
        ));
        config_set.register(&configs);

        let stream_set: ResourceSet<StreamSpec> = ResourceSet::new();
        let streams = Arc::new(ResourceController::new(
            cluster.clone(),
            assistants_kind(STREAM),
            ControllerKind::SchemaBacked(SchemaBacked::typed(|stream: StreamSpec| Ok(Arc::new(stream)))),
        ));
        stream_set.register(&streams);

        let task_log_set: ResourceSet<TaskLog> = ResourceSet::new();
        let task_logs = Arc::new(ResourceController::new(
            cluster.clone(),
            assistants_kind(TASK_LOG),
            ControllerKind::SchemaBacked(SchemaBacked::typed(|log: TaskLog| Ok(Arc::new(log)))),
        ));
        task_log_set.register(&task_logs);

        let environment = ToolEnvironment {
            cluster: cluster.clone(),
            group: tools_group.clone(),
            version: version.clone(),
            http: collaborators.http,
            provider: collaborators.provider,
            send: SendTarget {
                bus: Arc::clone(&collaborators.streams),
                streams: stream_set.clone(),
                stream_kind: assistants_kind(STREAM),
            },
            configs: ConfigStore {
                bus: Arc::clone(&collaborators.resources),
                cluster: cluster.clone(),
                configs: config_set.clone(),
                config_kind: assistants_kind(CONFIG),
            },
        };
        let tool_set: ResourceSet<dyn Tool> = ResourceSet::new();
        let tools = tool_controllers(&environment);
        for controller in &tools {
            tool_set.register(controller);
        }

        let context = Arc::new(AssistantContext {
            cluster: cluster.clone(),
            assistants_group: assistants_group.clone(),
            tools_group,
            version: version.clone(),
            resources: collaborators.resources,
            streams_bus: collaborators.streams,
            prompts: prompt_set,
            configs: config_set,
            streams: stream_set,
            task_logs: task_log_set,
            tools: tool_set,
            task_log_controller: task_logs,
            agents: collaborators.agents,
            conventions,
            task_log_names: TaskLogNames::new(),
        });

        let assistant_set: ResourceSet<Assistant> = ResourceSet::new();
        let assistants = Arc::new(ResourceController::new(
            cluster,
            assistants_kind(ASSISTANT),
            ControllerKind::Custom(Arc::new(AssistantHandlers::new(Arc::clone(&context)))),
        ));
        assistant_set.register(&assistants);

        Self {
            context,
            prompts,
            configs,
            streams,
            tools,
            assistants,
            assistant_set,
        }
    }

    /// Add a tool kind beyond the built-in ones. Call before [`Runtime::start`].
    pub fn register_tool_kind(&mut self, kind: &str, handling: ControllerKind<dyn Tool>) {
        let controller = Arc::new(ResourceController::new(
            self.context.cluster.clone(),
            self.context.tool_kind_named(kind),
            handling,
        ));
        self.context.tools.register(&controller);
        self.tools.push(controller);
    }

    /// Start every controller in dependency order. Each returned handle
    /// serves one kind's watch.
    pub async fn start(&self) -> Result<Vec<JoinHandle<()>>, TransportError> {
        let bus = Arc::clone(&self.context.resources);
        let mut handles = Vec::with_capacity(self.tools.len() + 5);
        handles.push(Arc::clone(&self.prompts).start(Arc::clone(&bus)).await?);
        handles.push(Arc::clone(&self.configs).start(Arc::clone(&bus)).await?);
        handles.push(Arc::clone(&self.streams).start(Arc::clone(&bus)).await?);
        handles.push(
            Arc::clone(&self.context.task_log_controller)
                .start(Arc::clone(&bus))
                .await?,
        );
        for controller in &self.tools {
            handles.push(Arc::clone(controller).start(Arc::clone(&bus)).await?);
        }
        handles.push(Arc::clone(&self.assistants).start(bus).await?);
        info!(cluster = %self.context.cluster, controllers = handles.len(), "Runtime started");
        Ok(handles)
    }

    pub fn context(&self) -> &Arc<AssistantContext> {
        &self.context
    }

    pub fn assistants(&self) -> &ResourceSet<Assistant> {
        &self.assistant_set
    }

    /// Look up an assistant by its short name.
    pub fn assistant(&self, name: &str) -> Option<Arc<Assistant>> {
        self.assistants.get(name)
    }

    /// What each controller currently holds, in start order.
    pub fn status(&self) -> Vec<KindStatus> {
        let mut status = vec![
            KindStatus {
                kind: self.prompts.kind().clone(),
                names: self.prompts.names(),
            },
            KindStatus {
                kind: self.configs.kind().clone(),
                names: self.configs.names(),
            },
            KindStatus {
                kind: self.streams.kind().clone(),
                names: self.streams.names(),
            },
            KindStatus {
                kind: self.context.task_log_controller.kind().clone(),
                names: self.context.task_log_controller.names(),
            },
        ];
        status.extend(self.tools.iter().map(|controller| KindStatus {
            kind: controller.kind().clone(),
            names: controller.names(),
        }));
        status.push(KindStatus {
            kind: self.assistants.kind().clone(),
            names: self.assistants.names(),
        });
        status
    }

    /// Stop every assistant's inbound tasks.
    pub fn shutdown(&self) {
        for name in self.assistants.names() {
            if let Some(assistant) = self.assistants.get(&name) {
                assistant.shutdown();
            }
        }
    }
}
