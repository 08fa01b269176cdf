//! `assistants render`: render a template against cluster resources.

use anyhow::Context;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

use assistants_config::AppConfig;
use assistants_template::{Resolver, substitute};

use super::{OfflineProvider, Session};

pub async fn run(
    config: AppConfig,
    template: String,
    bindings: Vec<String>,
    resources: Option<PathBuf>,
) -> anyhow::Result<()> {
    let bindings = parse_bindings(&bindings)?;
    let documents = super::load_documents(&config, resources.as_deref())?;
    let session = Session::start(&config, documents, Some(Arc::new(OfflineProvider))).await?;

    let resolver = session.runtime.context().cluster_resolver();
    let rendered = substitute(&template, &bindings, Some(&resolver as &dyn Resolver));
    session.stop();

    println!("{}", rendered.into_string());
    Ok(())
}

/// `key=value` pairs; values that parse as JSON keep their type.
fn parse_bindings(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Binding '{pair}' is not KEY=VALUE"))?;
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}
