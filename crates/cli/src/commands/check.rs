//! `assistants check`: reconcile manifests offline and report the result.

use std::path::PathBuf;
use std::sync::Arc;

use assistants_assistant::KindStatus;
use assistants_config::AppConfig;
use assistants_core::ResourceDocument;

use super::{OfflineProvider, Session};

pub async fn run(config: AppConfig, resources: Option<PathBuf>) -> anyhow::Result<()> {
    let documents = super::load_documents(&config, resources.as_deref())?;
    let session = Session::start(&config, documents.clone(), Some(Arc::new(OfflineProvider))).await?;
    let status = session.runtime.status();
    session.stop();

    println!("Cluster {}", config.cluster);
    for kind in &status {
        println!("  {} ({})", kind.kind, kind.names.len());
        for name in &kind.names {
            println!("    ✅ {name}");
        }
    }

    let rejected = rejected(&documents, &status);
    for document in &rejected {
        println!("  ❌ {}/{} {}", document.api_version, document.kind, document.metadata.name);
    }
    if !rejected.is_empty() {
        anyhow::bail!("{} of {} resources were rejected", rejected.len(), documents.len());
    }
    println!("\n  All {} resources reconciled", documents.len());
    Ok(())
}

/// Documents no controller holds after startup.
fn rejected<'a>(documents: &'a [ResourceDocument], status: &[KindStatus]) -> Vec<&'a ResourceDocument> {
    documents
        .iter()
        .filter(|document| {
            !status.iter().any(|kind| {
                kind.kind.api_version() == document.api_version
                    && kind.kind.kind == document.kind
                    && kind.names.contains(&document.metadata.name)
            })
        })
        .collect()
}
