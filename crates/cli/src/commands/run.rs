//! `assistants run`: serve assistants until Ctrl-C.

use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use assistants_bus::InMemoryBus;
use assistants_config::AppConfig;
use assistants_core::StreamBus;

use super::Session;

pub async fn run(config: AppConfig, resources: Option<PathBuf>, stdin: Option<String>) -> anyhow::Result<()> {
    let provider = super::provider(&config);
    if provider.is_none() {
        warn!("No provider configured, assistants will be rejected");
    }
    let documents = super::load_documents(&config, resources.as_deref())?;
    let session = Session::start(&config, documents, provider).await?;

    println!("Assistants runtime, cluster {}", config.cluster);
    for status in session.runtime.status() {
        println!("  {:<12} {}", status.kind.kind, status.names.len());
    }

    let bridge = match stdin {
        Some(stream) => Some(bridge(session.bus.clone(), stream, config.runtime.echo_prefix.clone()).await?),
        None => None,
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    if let Some(bridge) = bridge {
        bridge.abort();
    }
    session.stop();
    Ok(())
}

/// Publish stdin lines to `stream` and print the echoed replies.
async fn bridge(bus: InMemoryBus, stream: String, echo_prefix: String) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let mut replies = bus.subscribe(&stream).await?;
    let printer = tokio::spawn(async move {
        while let Some(payload) = replies.recv().await {
            match payload {
                Value::String(text) => {
                    if let Some(reply) = text.strip_prefix(echo_prefix.as_str()) {
                        println!("{reply}");
                    }
                }
                other => println!("{other}"),
            }
        }
    });

    Ok(tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    if let Err(e) = bus.publish(&stream, Value::String(line), true).await {
                        warn!(stream = %stream, error = %e, "Failed to publish stdin line");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
        // Replies keep printing after stdin closes.
        let _ = printer.await;
    }))
}
