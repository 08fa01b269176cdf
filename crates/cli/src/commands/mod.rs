//! Setup shared by every command.

pub mod check;
pub mod render;
pub mod run;

use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use assistants_assistant::{Collaborators, Conventions, LlmAgentFactory, Runtime, RuntimeOptions};
use assistants_bus::{InMemoryBus, load_manifests, seed};
use assistants_config::AppConfig;
use assistants_core::error::ProviderError;
use assistants_core::{Provider, ProviderRequest, ProviderResponse, ResourceBus, ResourceDocument, StreamBus};
use assistants_providers::OpenAiCompatProvider;

const OPENAI_URL: &str = "https://api.openai.com/v1";

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.context("Failed to load config")
}

pub fn runtime_options(config: &AppConfig) -> RuntimeOptions {
    RuntimeOptions {
        cluster: config.cluster.clone(),
        assistants_group: config.groups.assistants.clone(),
        tools_group: config.groups.tools.clone(),
        version: config.groups.version.clone(),
        conventions: Conventions {
            echo_prefix: config.runtime.echo_prefix.clone(),
            chat_prefix: config.runtime.chat_prefix.clone(),
            code_language: config.runtime.code_language.clone(),
        },
    }
}

/// The configured provider, if it has credentials or an explicit endpoint.
pub fn provider(config: &AppConfig) -> Option<Arc<dyn Provider>> {
    let settings = &config.provider;
    let provider = match (&settings.api_key, &settings.api_url) {
        (Some(key), url) => OpenAiCompatProvider::new(&settings.name, url.as_deref().unwrap_or(OPENAI_URL), key),
        // Local endpoints such as Ollama accept any key.
        (None, Some(url)) => OpenAiCompatProvider::new(&settings.name, url, "none"),
        (None, None) => return None,
    };
    Some(Arc::new(provider))
}

/// Manifests from `--resources`, else from the configured directory.
pub fn load_documents(config: &AppConfig, resources: Option<&Path>) -> anyhow::Result<Vec<ResourceDocument>> {
    match resources.or(config.resources_dir.as_deref()) {
        Some(path) => {
            load_manifests(path).with_context(|| format!("Failed to load manifests from {}", path.display()))
        }
        None => Ok(Vec::new()),
    }
}

/// A running runtime on its own in-process bus.
pub struct Session {
    pub bus: InMemoryBus,
    pub runtime: Runtime,
    handles: Vec<JoinHandle<()>>,
}

impl Session {
    /// Seed `documents` into a fresh bus and start every controller.
    pub async fn start(
        config: &AppConfig,
        documents: Vec<ResourceDocument>,
        provider: Option<Arc<dyn Provider>>,
    ) -> anyhow::Result<Self> {
        let bus = InMemoryBus::with_stream_buffer(config.runtime.stream_buffer);
        let seeded = seed(&bus, &config.cluster, documents).await?;

        let resources: Arc<dyn ResourceBus> = Arc::new(bus.clone());
        let streams: Arc<dyn StreamBus> = Arc::new(bus.clone());
        let agents = Arc::new(
            LlmAgentFactory::new(provider.clone(), &config.runtime.code_language)
                .with_default_model(config.provider.default_model.clone()),
        );
        let runtime = Runtime::new(
            runtime_options(config),
            Collaborators {
                resources,
                streams,
                provider,
                agents,
                http: reqwest::Client::new(),
            },
        );
        let handles = runtime.start().await.context("Failed to start controllers")?;
        info!(cluster = %config.cluster, seeded, "Session started");

        Ok(Self { bus, runtime, handles })
    }

    pub fn stop(self) {
        self.runtime.shutdown();
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// Stands in for a model provider when nothing should be called.
pub struct OfflineProvider;

#[async_trait]
impl Provider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("offline session".into()))
    }
}
