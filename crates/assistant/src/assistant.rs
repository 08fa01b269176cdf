//! The assistant resource: a code agent bound to one or more streams.
//!
//! Lifecycle: [`Assistant::create`] validates and builds the agent,
//! [`Assistant::connect`] subscribes to the bound streams, and from then on
//! every inbound message becomes one agent turn recorded as a TaskLog.
//! The stream binding is fixed at creation; everything else can be
//! reconfigured in place.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use assistants_controller::ResourceHandlers;
use assistants_core::error::{BindingError, ValidationError};
use assistants_core::{CodeAgent, Error, ResourceDocument, ResourceKey, SchemaResource, StreamSpec, TaskLog, Toolbox};
use assistants_template::{ResolverChain, Template, plain_text, substitute};

use crate::context::{AssistantContext, Conventions};
use crate::filter::MessageFilter;
use crate::history::HistoryAssembler;
use crate::spec::AssistantSpec;

/// The reconfigurable part of an assistant.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    code_model: String,
    tools: BTreeMap<String, String>,
    header: Option<String>,
    examples: Vec<String>,
}

impl Settings {
    fn from_spec(spec: AssistantSpec) -> Self {
        let header = spec.header_source().map(str::to_string);
        Self {
            code_model: spec.code_model,
            tools: spec.tools,
            header,
            examples: spec.examples,
        }
    }
}

/// Result of one agent turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub result: Value,
    pub explanation: String,
    pub code: String,
    pub task_log: TaskLog,
}

/// A stream definition compiled for inbound handling.
#[derive(Debug, Clone)]
pub struct BoundStream {
    pub stream_id: String,
    pub format: Template,
    pub filter: Option<MessageFilter>,
    pub echo_prefix: String,
}

impl BoundStream {
    pub fn new(spec: &StreamSpec, conventions: &Conventions) -> Result<Self, ValidationError> {
        let filter = spec.filter.as_ref().map(MessageFilter::compile).transpose()?;
        Ok(Self {
            stream_id: spec.stream.clone(),
            format: Template::parse(&spec.format),
            filter,
            echo_prefix: spec
                .echo_prefix
                .clone()
                .unwrap_or_else(|| conventions.echo_prefix.clone()),
        })
    }
}

pub struct Assistant {
    name: String,
    stream_refs: Vec<String>,
    settings: RwLock<Settings>,
    agent: tokio::sync::Mutex<Box<dyn CodeAgent>>,
    // Rebuilt by `configure`, swapped in when the next turn starts.
    pending_agent: Mutex<Option<Box<dyn CodeAgent>>>,
    history: HistoryAssembler,
    context: Arc<AssistantContext>,
    inbound: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("name", &self.name)
            .field("streams", &self.stream_refs)
            .field("settings", &*self.settings.read())
            .finish_non_exhaustive()
    }
}

impl Assistant {
    /// Build the agent and fix the stream binding. Does not subscribe.
    pub fn create(name: impl Into<String>, spec: AssistantSpec, context: Arc<AssistantContext>) -> Result<Self, Error> {
        let stream_refs = spec.stream.to_vec();
        if stream_refs.is_empty() {
            return Err(ValidationError::InvalidField {
                kind: "Assistant".into(),
                field: "stream".into(),
                reason: "at least one stream is required".into(),
            }
            .into());
        }
        let agent = context.agents.create(&spec.code_model)?;
        Ok(Self {
            name: name.into(),
            stream_refs,
            settings: RwLock::new(Settings::from_spec(spec)),
            agent: tokio::sync::Mutex::new(agent),
            pending_agent: Mutex::new(None),
            history: HistoryAssembler::new(&context.conventions.code_language),
            context,
            inbound: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn streams(&self) -> &[String] {
        &self.stream_refs
    }

    pub fn code_model(&self) -> String {
        self.settings.read().code_model.clone()
    }

    /// TaskLog references used as examples, oldest first.
    pub fn examples(&self) -> Vec<String> {
        self.settings.read().examples.clone()
    }

    pub fn tools(&self) -> BTreeMap<String, String> {
        self.settings.read().tools.clone()
    }

    /// Resolve every bound stream, then subscribe to each on its own task.
    /// A missing Stream definition fails before anything is subscribed.
    pub async fn connect(assistant: &Arc<Assistant>) -> Result<(), Error> {
        let context = &assistant.context;
        let stream_kind = context.stream_kind();

        let mut bindings = Vec::with_capacity(assistant.stream_refs.len());
        for reference in &assistant.stream_refs {
            let (_, spec) = context.streams.resolve(reference, &stream_kind)?;
            bindings.push(BoundStream::new(&spec, &context.conventions)?);
        }

        for binding in bindings {
            let receiver = context.streams_bus.subscribe(&binding.stream_id).await?;
            info!(assistant = %assistant.name, stream = %binding.stream_id, "Connected");
            let handle = tokio::spawn(serve(Arc::downgrade(assistant), binding, receiver));
            assistant.inbound.lock().push(handle);
        }
        Ok(())
    }

    /// Apply a new spec. Changing the stream binding is refused and leaves
    /// the assistant as it was.
    ///
    /// Never waits for a turn in progress: the rebuilt agent takes over at
    /// the start of the next turn.
    pub async fn configure(&self, spec: AssistantSpec) -> Result<(), Error> {
        let requested = spec.stream.to_vec();
        if requested != self.stream_refs {
            return Err(BindingError::Immutable {
                field: "stream".into(),
                current: self.stream_refs.join(","),
                requested: requested.join(","),
            }
            .into());
        }

        let agent = self.context.agents.create(&spec.code_model)?;
        let settings = Settings::from_spec(spec);
        *self.pending_agent.lock() = Some(agent);
        *self.settings.write() = settings;
        info!(assistant = %self.name, "Reconfigured");
        Ok(())
    }

    /// Start a fresh conversation with `message`.
    pub async fn run(&self, message: &str) -> Result<ChatOutcome, Error> {
        self.converse(message, true).await
    }

    /// Continue the running conversation with `message`.
    pub async fn chat(&self, message: &str) -> Result<ChatOutcome, Error> {
        self.converse(message, false).await
    }

    async fn converse(&self, message: &str, fresh: bool) -> Result<ChatOutcome, Error> {
        let settings = self.settings.read().clone();

        let toolbox = self.toolbox(&settings.tools);
        let descriptions = toolbox.descriptions();
        let header = settings.header.as_deref().and_then(|source| self.header(source));
        let examples = self.examples_for(&settings.examples);
        let history = self.history.assemble(header.as_deref(), &examples, &descriptions);

        let reply = {
            let mut agent = self.agent.lock().await;
            let replacement = self.pending_agent.lock().take();
            if let Some(replacement) = replacement {
                *agent = replacement;
            }
            if fresh {
                agent.reset();
            }
            agent.clear_cache();
            agent.set_toolbox(toolbox);
            agent.set_history(history);
            agent.chat(message).await?
        };
        debug!(assistant = %self.name, code = %reply.code, "Agent replied");

        Ok(ChatOutcome {
            task_log: TaskLog {
                prompt: message.to_string(),
                tools: descriptions,
                steps: reply.explanation.clone(),
                code: reply.code.clone(),
            },
            result: reply.result,
            explanation: reply.explanation,
            code: reply.code,
        })
    }

    fn toolbox(&self, aliases: &BTreeMap<String, String>) -> Toolbox {
        let defaults = self.context.tool_kind();
        let mut toolbox = Toolbox::new();
        for (alias, reference) in aliases {
            match self.context.tools.resolve(reference, &defaults) {
                Ok((_, tool)) => toolbox.insert(alias.clone(), tool),
                Err(e) => warn!(assistant = %self.name, alias = %alias, error = %e, "Skipping missing tool"),
            }
        }
        toolbox
    }

    fn examples_for(&self, references: &[String]) -> Vec<Arc<TaskLog>> {
        let defaults = self.context.task_log_kind();
        references
            .iter()
            .filter_map(|reference| match self.context.task_logs.resolve(reference, &defaults) {
                Ok((_, log)) => Some(log),
                Err(e) => {
                    warn!(assistant = %self.name, error = %e, "Missing example task");
                    None
                }
            })
            .collect()
    }

    /// A Prompt reference resolves to its text. Anything that reads like
    /// prose is rendered as a template. A bare reference that resolves to
    /// nothing yields no header.
    fn header(&self, source: &str) -> Option<String> {
        if let Ok((_, prompt)) = self.context.prompts.resolve(source, &self.context.prompt_kind()) {
            return Some(prompt.prompt.clone());
        }
        if !source.contains('$') && !source.contains(char::is_whitespace) {
            warn!(assistant = %self.name, header = %source, "Missing header prompt");
            return None;
        }
        let resolver = self.context.cluster_resolver();
        Some(substitute(source, &Map::new(), Some(&resolver)).into_string())
    }

    /// Handle one payload from a bound stream. Returns the key of the
    /// recorded TaskLog, or `None` if the payload was ignored or the turn
    /// failed.
    pub async fn handle_inbound(&self, stream: &BoundStream, payload: Value) -> Option<ResourceKey> {
        if let Value::String(text) = &payload {
            if text.starts_with(&stream.echo_prefix) {
                debug!(assistant = %self.name, "Ignoring echoed message");
                return None;
            }
        } else if !payload.is_object() {
            warn!(assistant = %self.name, payload = %payload, "Ignoring payload that is neither text nor a mapping");
            return None;
        }

        if let Some(filter) = &stream.filter {
            if !filter.matches(&payload) {
                debug!(assistant = %self.name, "Message filtered out");
                return None;
            }
        }

        let (bindings, fresh) = match payload {
            Value::String(text) => {
                let (body, fresh) = match text.strip_prefix(self.context.conventions.chat_prefix.as_str()) {
                    Some(rest) => (rest.trim().to_string(), false),
                    None => (text.trim().to_string(), true),
                };
                let mut bindings = Map::new();
                bindings.insert("message".into(), Value::String(body));
                (bindings, fresh)
            }
            Value::Object(map) => {
                let mut bindings = map.clone();
                bindings
                    .entry("message")
                    .or_insert_with(|| Value::String(plain_text(Value::Object(map))));
                (bindings, true)
            }
            _ => return None,
        };

        let message = {
            let resolver = self.context.cluster_resolver();
            let chain = ResolverChain::new().with(&bindings).with(&resolver);
            stream.format.render_string(&chain).trim().to_string()
        };
        if message.is_empty() {
            warn!(assistant = %self.name, "Rejecting empty message");
            return None;
        }

        let outcome = match self.converse(&message, fresh).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(assistant = %self.name, error = %e, "Agent turn failed");
                return None;
            }
        };

        let key = self.record(outcome.task_log).await?;

        let echo = format!("{}{}", stream.echo_prefix, plain_text(outcome.result));
        if let Err(e) = self
            .context
            .streams_bus
            .publish(&stream.stream_id, Value::String(echo), false)
            .await
        {
            warn!(assistant = %self.name, stream = %stream.stream_id, error = %e, "Failed to send response");
        }
        info!(assistant = %self.name, task_log = %key, "Done processing message");
        Some(key)
    }

    /// Reconcile the log locally, append it to the examples, then publish
    /// it to the cluster.
    async fn record(&self, task_log: TaskLog) -> Option<ResourceKey> {
        let context = &self.context;
        let kind = context.task_log_kind();
        let name = context.task_log_names.next();

        let spec = match serde_json::to_value(&task_log) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(assistant = %self.name, error = %e, "Failed to encode task log");
                return None;
            }
        };
        let document = ResourceDocument::new(&kind, &name, spec);

        if let Err(e) = context.task_log_controller.apply(&name, &document).await {
            warn!(assistant = %self.name, task_log = %name, error = %e, "Task log rejected");
            return None;
        }
        let key = kind.key(&name);
        self.settings.write().examples.push(key.to_string());

        if let Err(e) = context.resources.create_resource(&context.cluster, document).await {
            warn!(assistant = %self.name, task_log = %name, error = %e, "Failed to publish task log");
        }
        Some(key)
    }

    /// Stop the inbound tasks.
    pub fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = self.inbound.lock().drain(..).collect();
        if !handles.is_empty() {
            info!(assistant = %self.name, "Disconnected");
        }
        for handle in handles {
            handle.abort();
        }
    }
}

impl Drop for Assistant {
    fn drop(&mut self) {
        for handle in self.inbound.get_mut().drain(..) {
            handle.abort();
        }
    }
}

async fn serve(assistant: Weak<Assistant>, stream: BoundStream, mut inbound: mpsc::Receiver<Value>) {
    while let Some(payload) = inbound.recv().await {
        let Some(assistant) = assistant.upgrade() else {
            break;
        };
        assistant.handle_inbound(&stream, payload).await;
    }
    debug!(stream = %stream.stream_id, "Inbound stream closed");
}

/// Controller hooks for the Assistant kind.
pub struct AssistantHandlers {
    context: Arc<AssistantContext>,
}

impl AssistantHandlers {
    pub fn new(context: Arc<AssistantContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ResourceHandlers<Assistant> for AssistantHandlers {
    async fn create(&self, name: &str, document: &ResourceDocument) -> Result<Option<Arc<Assistant>>, Error> {
        let spec = AssistantSpec::from_spec(&document.kind, &document.spec)?;
        let assistant = Arc::new(Assistant::create(name, spec, Arc::clone(&self.context))?);
        Assistant::connect(&assistant).await?;
        Ok(Some(assistant))
    }

    async fn update(&self, current: &Arc<Assistant>, document: &ResourceDocument) -> Result<(), Error> {
        let spec = AssistantSpec::from_spec(&document.kind, &document.spec)?;
        current.configure(spec).await
    }

    async fn delete(&self, resource: Arc<Assistant>) {
        resource.shutdown();
    }
}
