mod handlers;

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sonara", about = "Audio inference service")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = sonara_core::AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("sonara starting");

    let backend = sonara_runtime::HttpTensorClient::new(
        &config.runtime.endpoint,
        Duration::from_secs(config.runtime.timeout_secs),
    )
    .context("failed to create inference client")?;
    let runtime = Arc::new(sonara_runtime::ModelRuntime::new(Arc::new(backend)));

    let specs = config.model_specs().context("invalid model configuration")?;
    if specs.is_empty() {
        tracing::warn!("no models configured");
    }
    for spec in &specs {
        match runtime.load_model(spec.clone()).await {
            Ok(model) => tracing::info!(
                model = %model.spec().model_name,
                task = %model.spec().task,
                "model ready"
            ),
            // Warmup can retry the load later.
            Err(e) => tracing::warn!(
                model = %spec.model_name,
                task = %spec.task,
                error = %e,
                "model not loaded at startup"
            ),
        }
    }

    let service_name = config.general.service_name.clone();
    let gateway = Arc::new(sonara_gateway::InferenceGateway::new(
        Arc::clone(&runtime),
        specs,
        service_name.clone(),
    ));

    let bridge = match &config.bridge {
        Some(bridge_config) => {
            let bridge = Arc::new(
                sonara_bridge::ComputeBridge::connect(&service_name, bridge_config)
                    .await
                    .context("failed to connect compute bridge")?,
            );

            bridge.register_handler(
                "inference",
                Arc::new(handlers::InferenceHandler::new(
                    Arc::clone(&gateway),
                    Arc::downgrade(&bridge),
                )),
            );
            bridge.register_handler(
                "health_check",
                Arc::new(handlers::HealthHandler::new(Arc::clone(&gateway))),
            );
            bridge.register_handler(
                "service_info",
                Arc::new(handlers::ServiceInfoHandler::new(Arc::clone(&gateway))),
            );
            bridge.register_handler(
                "setup",
                Arc::new(handlers::SetupHandler::new(Arc::clone(&gateway))),
            );

            let mut endpoints = HashMap::new();
            if let Some(url) = &bridge_config.reply_url {
                endpoints.insert("reply".to_string(), url.clone());
            }
            if let Some(url) = &bridge_config.publish_url {
                endpoints.insert("publish".to_string(), url.clone());
            }
            if bridge_config.request_url.is_some() {
                if let Err(e) = bridge.register_service(endpoints).await {
                    tracing::warn!(error = %e, "service registration failed");
                }
            }

            bridge
                .start_listening()
                .context("failed to start bridge listener")?;
            tracing::info!(service = %service_name, "compute bridge active");
            Some(bridge)
        }
        None => {
            tracing::info!("no bridge configured, running standalone");
            None
        }
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;
    tracing::info!("shutting down");

    if let Some(bridge) = bridge {
        if let Err(e) = bridge.close().await {
            tracing::warn!(error = %e, "bridge close reported errors");
        }
    }
    runtime.close().await;

    Ok(())
}
