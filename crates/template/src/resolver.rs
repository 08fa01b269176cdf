//! Variable lookup for templates.

use serde_json::{Map, Value};
use tracing::warn;

use assistants_controller::ResourceSet;
use assistants_core::kinds::{CONFIG, PROMPT};
use assistants_core::{KindRef, Prompt, ResourceKey};

/// Looks up a placeholder name. `None` means unknown.
pub trait Resolver {
    fn resolve(&self, name: &str) -> Option<Value>;
}

impl Resolver for Map<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn resolve(&self, name: &str) -> Option<Value> {
        (**self).resolve(name)
    }
}

/// Tries each resolver in order; the first non-null answer wins.
#[derive(Default)]
pub struct ResolverChain<'a> {
    resolvers: Vec<&'a dyn Resolver>,
}

impl<'a> ResolverChain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: &'a dyn Resolver) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

impl Resolver for ResolverChain<'_> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(name).filter(|v| !v.is_null()))
    }
}

/// Resolves `group/version/Prompt/name` to the prompt text and
/// `group/version/Config/name` to the stored spec.
///
/// Any other path logs a warning and resolves to `""`, so a template
/// never fails on an unknown cluster path.
#[derive(Clone)]
pub struct ClusterResolver {
    api: KindRef,
    prompts: ResourceSet<Prompt>,
    configs: ResourceSet<Value>,
}

impl ClusterResolver {
    /// `group` and `version` are the only API accepted in paths.
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        prompts: ResourceSet<Prompt>,
        configs: ResourceSet<Value>,
    ) -> Self {
        Self {
            api: KindRef::new(group, version, PROMPT),
            prompts,
            configs,
        }
    }
}

impl Resolver for ClusterResolver {
    fn resolve(&self, name: &str) -> Option<Value> {
        let Ok(key) = ResourceKey::parse(name) else {
            warn!(path = %name, "Not a config path");
            return Some(Value::String(String::new()));
        };
        if key.group != self.api.group || key.version != self.api.version {
            warn!(path = %name, "Can't retrieve config from {}/{}", key.group, key.version);
            return Some(Value::String(String::new()));
        }

        let found = match key.kind.as_str() {
            PROMPT => self.prompts.get_key(&key).map(|p| Value::String(p.prompt.clone())),
            CONFIG => self.configs.get_key(&key).map(|c| (*c).clone()),
            other => {
                warn!(path = %name, kind = %other, "Unsupported config kind");
                return Some(Value::String(String::new()));
            }
        };
        if found.is_none() {
            warn!(path = %name, kind = %key.kind, "Missing config");
        }
        Some(found.unwrap_or_else(|| Value::String(String::new())))
    }
}

impl std::fmt::Debug for ClusterResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterResolver")
            .field("api", &self.api.api_version())
            .finish()
    }
}
