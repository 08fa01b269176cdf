//! Shared context handed to every assistant.

use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use assistants_controller::{ResourceController, ResourceSet};
use assistants_core::bus::{ResourceBus, StreamBus};
use assistants_core::kinds::{PROMPT, STREAM, TASK_LOG, TOOL};
use assistants_core::{AgentFactory, KindRef, Prompt, StreamSpec, TaskLog, Tool};
use assistants_template::ClusterResolver;

/// Runtime-wide message conventions.
#[derive(Debug, Clone, PartialEq)]
pub struct Conventions {
    /// Prefix of messages an assistant published itself.
    pub echo_prefix: String,
    /// Prefix that continues the running conversation.
    pub chat_prefix: String,
    /// Fence language of example code blocks.
    pub code_language: String,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            echo_prefix: ">".into(),
            chat_prefix: "+".into(),
            code_language: "python".into(),
        }
    }
}

/// Generates `tasklog-<node>-<sequence>` names, unique across processes.
#[derive(Debug)]
pub struct TaskLogNames {
    node: String,
    sequence: AtomicU64,
}

impl Default for TaskLogNames {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskLogNames {
    pub fn new() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            node: format!("{millis}-{}", &suffix[..8]),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn next(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("tasklog-{}-{sequence}", self.node)
    }
}

/// Everything an assistant reads from or writes to.
pub struct AssistantContext {
    pub cluster: String,
    pub assistants_group: String,
    pub tools_group: String,
    pub version: String,
    pub resources: Arc<dyn ResourceBus>,
    pub streams_bus: Arc<dyn StreamBus>,
    pub prompts: ResourceSet<Prompt>,
    pub configs: ResourceSet<Value>,
    pub streams: ResourceSet<StreamSpec>,
    pub task_logs: ResourceSet<TaskLog>,
    pub tools: ResourceSet<dyn Tool>,
    pub task_log_controller: Arc<ResourceController<TaskLog>>,
    pub agents: Arc<dyn AgentFactory>,
    pub conventions: Conventions,
    pub task_log_names: TaskLogNames,
}

impl AssistantContext {
    pub fn assistants_kind(&self, kind: &str) -> KindRef {
        KindRef::new(&self.assistants_group, &self.version, kind)
    }

    /// Defaults for abbreviated tool references.
    pub fn tool_kind(&self) -> KindRef {
        self.tool_kind_named(TOOL)
    }

    pub fn tool_kind_named(&self, kind: &str) -> KindRef {
        KindRef::new(&self.tools_group, &self.version, kind)
    }

    pub fn prompt_kind(&self) -> KindRef {
        self.assistants_kind(PROMPT)
    }

    pub fn stream_kind(&self) -> KindRef {
        self.assistants_kind(STREAM)
    }

    pub fn task_log_kind(&self) -> KindRef {
        self.assistants_kind(TASK_LOG)
    }

    /// Resolves `${group/version/Kind/name}` placeholders against the
    /// cluster's Prompts and Configs.
    pub fn cluster_resolver(&self) -> ClusterResolver {
        ClusterResolver::new(
            &self.assistants_group,
            &self.version,
            self.prompts.clone(),
            self.configs.clone(),
        )
    }
}

impl std::fmt::Debug for AssistantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantContext")
            .field("cluster", &self.cluster)
            .field("assistants_group", &self.assistants_group)
            .field("tools_group", &self.tools_group)
            .field("version", &self.version)
            .field("conventions", &self.conventions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_log_names_are_sequential_per_node() {
        let names = TaskLogNames::new();
        let first = names.next();
        let second = names.next();
        assert_eq!(first, format!("tasklog-{}-1", names.node()));
        assert_eq!(second, format!("tasklog-{}-2", names.node()));
    }

    #[test]
    fn nodes_differ_between_generators() {
        assert_ne!(TaskLogNames::new().node(), TaskLogNames::new().node());
    }
}
