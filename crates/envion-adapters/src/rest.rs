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

//! REST snapshot sink: the latest payload of every domain under `GET /api/{topic}`

use anyhow::Context;
use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use envion_core::{Domain, Sink};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "0.0.0.0".to_owned(),
            port: 3000,
        }
    }
}

/// Latest payload per domain
#[derive(Debug, Default)]
pub struct RestSink {
    store: RwLock<HashMap<Domain, Value>>,
}

impl RestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, domain: Domain) -> Option<Value> {
        self.store.read().get(&domain).cloned()
    }

    /// Topics that have received at least one payload, in `Domain::ALL` order
    pub fn topics(&self) -> Vec<&'static str> {
        let store = self.store.read();
        Domain::ALL
            .into_iter()
            .filter(|d| store.contains_key(d))
            .map(Domain::rest_topic)
            .collect()
    }
}

impl Sink for RestSink {
    fn name(&self) -> &str {
        "rest"
    }

    fn on_update(&self, domain: Domain, payload: &Value) -> anyhow::Result<()> {
        self.store.write().insert(domain, payload.clone());
        Ok(())
    }
}

pub fn router(sink: Arc<RestSink>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/api", get(index_handler))
        .route("/api/{topic}", get(topic_handler))
        .with_state(sink)
        .layer(cors)
}

/// Bind and serve until the listener fails
pub async fn serve(config: &RestConfig, sink: Arc<RestSink>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding REST server to {addr}"))?;
    info!("🌐 [REST] Listening on {}", addr);
    axum::serve(listener, router(sink)).await?;
    Ok(())
}

#[expect(clippy::unused_async, reason = "axum handler must be async")]
async fn index_handler(State(sink): State<Arc<RestSink>>) -> Json<Value> {
    Json(json!({ "topics": sink.topics() }))
}

#[expect(clippy::unused_async, reason = "axum handler must be async")]
async fn topic_handler(
    State(sink): State<Arc<RestSink>>,
    Path(topic): Path<String>,
) -> Response {
    let Some(domain) = Domain::from_rest_topic(&topic) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown topic {topic}") })),
        )
            .into_response();
    };
    match sink.latest(domain) {
        Some(payload) => Json(payload).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": format!("no data for {topic} yet") })),
        )
            .into_response(),
    }
}
