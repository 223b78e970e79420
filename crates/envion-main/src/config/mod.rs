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

//! Application configuration: TOML file, environment overrides, validation

mod validation;

pub use validation::{ConfigIssue, Severity, ValidationReport};

use anyhow::{Context, Result};
use envion_adapters::{MqttConfig, RestConfig};
use envion_core::{CompareMode, EnvoyConfig, TokenMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub envoy: EnvoyConfig,
    pub mqtt: Option<MqttConfig>,
    pub rest: Option<RestConfig>,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Apply `ENVOY_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; blank values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let envoy = &mut self.envoy;

        if let Some(host) = get("ENVOY_HOST") {
            envoy.host = host;
        }
        if let Some(user) = get("ENVOY_USER") {
            envoy.enlighten_user = Some(user);
        }
        if let Some(passwd) = get("ENVOY_PASSWD") {
            envoy.enlighten_passwd = Some(passwd);
        }
        if let Some(serial) = get("ENVOY_SERIAL") {
            envoy.envoy_serial = Some(serial);
        }
        if let Some(token) = get("ENVOY_TOKEN") {
            envoy.envoy_token = Some(token);
        }
        if let Some(mode) = get("ENVOY_FIRMWARE7XX_TOKEN_GENERATION_MODE") {
            match mode.trim().parse::<u8>() {
                Ok(mode) => envoy.token_generation_mode = mode,
                Err(_) => warn!(
                    "⚠️ [CONFIG] Ignoring ENVOY_FIRMWARE7XX_TOKEN_GENERATION_MODE={}",
                    mode
                ),
            }
        }
    }

    pub fn mqtt_enabled(&self) -> Option<&MqttConfig> {
        self.mqtt.as_ref().filter(|m| m.enabled)
    }

    pub fn rest_enabled(&self) -> Option<&RestConfig> {
        self.rest.as_ref().filter(|r| r.enabled)
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        validate_envoy(&self.envoy, &mut report);
        if let Some(mqtt) = self.mqtt_enabled() {
            validate_mqtt(mqtt, &mut report);
        }
        if let Some(rest) = self.rest_enabled() {
            validate_rest(rest, &mut report);
        }
        report
    }
}

fn validate_envoy(envoy: &EnvoyConfig, report: &mut ValidationReport) {
    if envoy.host.trim().is_empty() && envoy.base_url.is_none() {
        report.push(ConfigIssue::MissingHost);
    }

    let polling = &envoy.polling;
    for (field, secs) in [
        ("home_inventory_secs", polling.home_inventory_secs),
        ("production_secs", polling.production_secs),
        ("ensemble_secs", polling.ensemble_secs),
        ("live_data_secs", polling.live_data_secs),
        ("grid_plc_secs", polling.grid_plc_secs),
    ] {
        if secs < 1 {
            report.push(ConfigIssue::IntervalTooShort { field });
        }
    }
    if envoy.request_timeout_secs < 1 {
        report.push(ConfigIssue::TimeoutTooShort);
    }

    match envoy.token_mode() {
        Some(TokenMode::Cloud) => {
            for (field, value) in [
                ("enlighten_user", &envoy.enlighten_user),
                ("enlighten_passwd", &envoy.enlighten_passwd),
            ] {
                if is_blank(value.as_deref()) {
                    report.push(ConfigIssue::MissingCredential {
                        mode: "cloud",
                        field,
                    });
                }
            }
            if is_blank(envoy.envoy_serial.as_deref()) {
                report.push(ConfigIssue::SerialFromGateway);
            }
        }
        Some(TokenMode::InstallerToken) => {
            if is_blank(envoy.envoy_token.as_deref()) {
                report.push(ConfigIssue::MissingCredential {
                    mode: "installer",
                    field: "envoy_token",
                });
            }
        }
        None => report.push(ConfigIssue::UnknownTokenMode(envoy.token_generation_mode)),
    }

    for (index, sensor) in envoy.sensors.iter().enumerate() {
        if let Some(code) = sensor.kind.compare_mode()
            && CompareMode::from_code(code).is_none()
        {
            report.push(ConfigIssue::SensorCompareMode {
                index,
                sensor: sensor.name.clone(),
                code,
            });
        }
    }

    if envoy.features.plc_level && !envoy.features.pcu_status {
        report.push(ConfigIssue::PlcWithoutPcuStatus);
    }
}

fn validate_mqtt(mqtt: &MqttConfig, report: &mut ValidationReport) {
    if mqtt.host.trim().is_empty() {
        report.push(ConfigIssue::MissingBrokerHost);
    }
    if mqtt.port == 0 {
        report.push(ConfigIssue::ZeroPort { sink: "mqtt" });
    }
    if mqtt.qos > 2 {
        report.push(ConfigIssue::MqttQos(mqtt.qos));
    }
    if mqtt.user.is_some() != mqtt.passwd.is_some() {
        report.push(ConfigIssue::PartialMqttLogin);
    }
}

fn validate_rest(rest: &RestConfig, report: &mut ValidationReport) {
    if rest.port == 0 {
        report.push(ConfigIssue::ZeroPort { sink: "rest" });
    }
    if rest.bind_address.trim().is_empty() {
        report.push(ConfigIssue::MissingBindAddress);
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}
