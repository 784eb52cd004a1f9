//! Command-line entry point: validates document files before upload

use anyhow::Result;
use portal_core::{
    AppConfig, BatchProcessor, FileDescriptor, FileValidator, NotificationSink, Notifier, RetryPolicy,
    TracingSink,
};
use portal_core::files::FileValidationConfig;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Identity region: {}", config.identity.region);
    info!("GraphQL endpoint: {}", config.api.graphql_endpoint);

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        anyhow::bail!("Usage: portal <FILE>...");
    }

    let validator = FileValidator::new(FileValidationConfig::from(&config.upload));
    info!("Accepting {}", validator.supported_formats_description());
    info!("Maximum file size: {}", validator.max_size_formatted());

    let sink: Arc<dyn NotificationSink> = Arc::new(TracingSink);
    let notifier = Arc::new(Notifier::new(Some(sink)));
    let processor = BatchProcessor::new(notifier, RetryPolicy::from(&config.retry));

    let mut files = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for path in &paths {
        match FileDescriptor::from_path(path) {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!("Skipping {}: {}", path, e);
                unreadable.push(json!({ "file": path, "error": e.to_string() }));
            }
        }
    }

    let outcome = processor.validate_batch(&validator, files).await;

    let rejected: Vec<_> = outcome
        .errors
        .iter()
        .map(|failure| json!({ "file": failure.file.name, "error": failure.error.to_string() }))
        .chain(unreadable)
        .collect();

    let report = json!({
        "accepted": outcome.results,
        "rejected": rejected,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !rejected.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let default_level = if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            };

            format!(
                "{}={},portal_core={}",
                env!("CARGO_CRATE_NAME").replace('-', "_"),
                default_level,
                default_level
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
