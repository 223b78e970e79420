// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of EnvION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use envion_adapters::{MqttSink, PropertyLog, RestSink};
use envion_core::{
    ControlGate, ControlHandle, Envoy, ImpulseGenerator, Notification, NotificationLevel,
    Notifier, SinkHub,
};
use envion_main::config::AppConfig;

const TRIGGER_QUEUE: usize = 16;
const CONTROL_QUEUE: usize = 8;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(35);

#[derive(Debug, Parser)]
#[command(name = "envion", version, about = "Envoy solar gateway poller")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "envion.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("envion=info")),
        )
        .init();

    let cli = Cli::parse();
    info!(path = %cli.config.display(), "Loading configuration");
    let mut config = AppConfig::from_file(&cli.config)?;
    config.apply_env_overrides();

    let validation = config.validate();
    for issue in validation.warnings() {
        warn!("⚠️ [CONFIG] {}: {}", issue.field(), issue);
    }
    if !validation.is_valid() {
        bail!("Invalid configuration: {}", validation.error_summary());
    }
    if cli.check {
        info!("✅ [CONFIG] Configuration is valid");
        return Ok(());
    }

    let mut hub = SinkHub::new();
    hub.add_property_sink(Arc::new(PropertyLog::new()));
    if let Some(mqtt) = config.mqtt_enabled() {
        let sink = Arc::new(MqttSink::connect(mqtt));
        hub.add_sink(sink.clone());
        hub.add_property_sink(sink);
    }
    let rest_task = config.rest_enabled().cloned().map(|rest| {
        let sink = Arc::new(RestSink::new());
        hub.add_sink(sink.clone());
        tokio::spawn(async move {
            if let Err(e) = envion_adapters::serve(&rest, sink).await {
                error!("❌ [REST] Server stopped: {:#}", e);
            }
        })
    });
    let sinks = Arc::new(hub);

    let notifier = Notifier::new();
    let notification_log = spawn_notification_logger(notifier.subscribe());
    let gate = Arc::new(ControlGate::new(false));

    let mut envoy = Envoy::new(
        config.envoy.clone(),
        sinks.clone(),
        notifier.clone(),
        gate.clone(),
    )
    .context("Failed to set up gateway client")?;
    envoy
        .start()
        .await
        .with_context(|| format!("Could not reach gateway {}", config.envoy.host))?;

    let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE);
    let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);
    let controls = ControlHandle::new(control_tx, gate, sinks);
    controls.set_locked(false);

    let impulse = ImpulseGenerator::from_polling(&config.envoy.polling, trigger_tx);
    impulse.start();
    let update_loop = tokio::spawn(envoy.run(trigger_rx, control_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("🛑 Shutting down");

    // The loop ends once every trigger and control sender is gone
    impulse.stop();
    drop(impulse);
    drop(controls);
    if tokio::time::timeout(SHUTDOWN_GRACE, update_loop).await.is_err() {
        warn!("⚠️ Update loop did not finish in time");
    }
    if let Some(task) = rest_task {
        task.abort();
    }
    notification_log.abort();
    Ok(())
}

/// Re-emit operator notifications as log events
fn spawn_notification_logger(mut rx: broadcast::Receiver<Notification>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(Notification { level, message }) => match level {
                    NotificationLevel::Info => info!("ℹ️ [NOTIFY] {}", message),
                    NotificationLevel::Success => info!("✅ [NOTIFY] {}", message),
                    NotificationLevel::Warn => warn!("⚠️ [NOTIFY] {}", message),
                    NotificationLevel::Error => error!("❌ [NOTIFY] {}", message),
                },
                Err(RecvError::Lagged(missed)) => {
                    warn!("⚠️ [NOTIFY] {} notifications dropped", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
