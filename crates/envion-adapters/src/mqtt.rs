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

//! MQTT publisher sink.
//!
//! Domain payloads go to `{prefix}/{label}`, property values to
//! `{prefix}/property/{entity}/{property}`. Publishing only queues into the
//! client's request channel; a background task drives the connection.

use anyhow::Context;
use envion_core::{Domain, PropertySink, Sink};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const REQUEST_CHANNEL_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub user: Option<String>,
    pub passwd: Option<String>,
    /// Topic prefix, e.g. `envion/envoy`
    pub prefix: String,
    /// 0, 1 or 2
    pub qos: u8,
    pub retain: bool,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_owned(),
            port: 1883,
            client_id: "envion".to_owned(),
            user: None,
            passwd: None,
            prefix: "envion".to_owned(),
            qos: 0,
            retain: true,
            keep_alive_secs: 30,
        }
    }
}

impl MqttConfig {
    pub fn qos(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }
}

#[derive(Debug)]
pub struct MqttSink {
    client: AsyncClient,
    prefix: String,
    qos: QoS,
    retain: bool,
    event_loop: JoinHandle<()>,
}

impl MqttSink {
    /// Create the client and spawn its event loop. Must be called inside a tokio runtime.
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        if let (Some(user), Some(passwd)) = (&config.user, &config.passwd) {
            options.set_credentials(user, passwd);
        }

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let broker = format!("{}:{}", config.host, config.port);
        let event_loop = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("📡 [MQTT] Connected to {}", broker);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("⚠️ [MQTT] Connection to {} lost: {}", broker, e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Self {
            client,
            prefix: config.prefix.trim_end_matches('/').to_owned(),
            qos: config.qos(),
            retain: config.retain,
            event_loop,
        }
    }

    pub fn topic(&self, domain: Domain) -> String {
        format!("{}/{}", self.prefix, domain.mqtt_label())
    }

    pub fn property_topic(&self, entity: &str, property: &str) -> String {
        format!("{}/property/{entity}/{property}", self.prefix)
    }

    fn enqueue(&self, topic: String, payload: Vec<u8>) -> anyhow::Result<()> {
        self.client
            .try_publish(topic.clone(), self.qos, self.retain, payload)
            .with_context(|| format!("queueing {topic}"))
    }
}

impl Drop for MqttSink {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

impl Sink for MqttSink {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn on_update(&self, domain: Domain, payload: &Value) -> anyhow::Result<()> {
        let body = serde_json::to_vec(payload)?;
        self.enqueue(self.topic(domain), body)
    }
}

impl PropertySink for MqttSink {
    fn publish(&self, entity: &str, property: &str, value: &Value) {
        let topic = self.property_topic(entity, property);
        debug!("📤 [MQTT] {} = {}", topic, value);
        if let Err(e) = self.enqueue(topic, value.to_string().into_bytes()) {
            warn!("⚠️ [MQTT] {:#}", e);
        }
    }
}
