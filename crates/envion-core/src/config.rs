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

use envion_types::SensorDescriptor;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{ENLIGHTEN_URL, ENTREZ_URL};

/// How a firmware 7.x gateway gets its JWT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    /// Fetched from the cloud identity service with Enlighten credentials
    Cloud,
    /// Long-lived installer token supplied by the user
    InstallerToken,
}

impl TokenMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Cloud),
            1 => Some(Self::InstallerToken),
            _ => None,
        }
    }
}

/// Connection and behaviour settings for one gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvoyConfig {
    /// Friendly name used in logs and sink labels
    pub name: String,
    /// Gateway host name or IP address
    pub host: String,
    /// Full base URL, overrides `host` and the scheme chosen from the firmware generation
    pub base_url: Option<String>,
    /// Serial number used for the cloud token request before `/info.xml` is read
    pub envoy_serial: Option<String>,
    /// Explicit envoy password, otherwise derived from the serial number
    pub envoy_passwd: Option<String>,
    /// 0 = cloud token, 1 = user supplied installer token
    pub token_generation_mode: u8,
    pub enlighten_user: Option<String>,
    pub enlighten_passwd: Option<String>,
    /// Installer token for mode 1
    pub envoy_token: Option<String>,
    pub enlighten_url: String,
    pub entrez_url: String,
    /// JSON token cache
    pub token_file: PathBuf,
    /// Plain text cache of the 9-digit device id
    pub envoy_id_file: PathBuf,
    pub request_timeout_secs: u64,
    pub token_missing_backoff_secs: u64,
    pub polling: PollingConfig,
    pub features: FeatureToggles,
    pub sensors: Vec<SensorDescriptor>,
}

impl Default for EnvoyConfig {
    fn default() -> Self {
        Self {
            name: "Envoy".to_owned(),
            host: "envoy.local".to_owned(),
            base_url: None,
            envoy_serial: None,
            envoy_passwd: None,
            token_generation_mode: 0,
            enlighten_user: None,
            enlighten_passwd: None,
            envoy_token: None,
            enlighten_url: ENLIGHTEN_URL.to_owned(),
            entrez_url: ENTREZ_URL.to_owned(),
            token_file: PathBuf::from("envoyToken.json"),
            envoy_id_file: PathBuf::from("envoyId.txt"),
            request_timeout_secs: 30,
            token_missing_backoff_secs: 30,
            polling: PollingConfig::default(),
            features: FeatureToggles::default(),
            sensors: Vec::new(),
        }
    }
}

impl EnvoyConfig {
    pub fn token_mode(&self) -> Option<TokenMode> {
        TokenMode::from_code(self.token_generation_mode)
    }

    /// Firmware 7.x gateways only answer on HTTPS
    pub fn base_url(&self, firmware7xx: bool) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_owned();
        }
        let scheme = if firmware7xx { "https" } else { "http" };
        format!("{scheme}://{}", self.host)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_missing_backoff(&self) -> Duration {
        Duration::from_secs(self.token_missing_backoff_secs)
    }
}

/// Trigger cadences in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub home_inventory_secs: u64,
    pub production_secs: u64,
    pub ensemble_secs: u64,
    pub live_data_secs: u64,
    pub grid_plc_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            home_inventory_secs: 60,
            production_secs: 10,
            ensemble_secs: 15,
            live_data_secs: 5,
            grid_plc_secs: 300,
        }
    }
}

/// Optional endpoints the user can switch off
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub pcu_status: bool,
    pub detailed_devices: bool,
    pub ensemble: bool,
    pub live_data: bool,
    pub grid_profile: bool,
    pub plc_level: bool,
    pub production_state: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            pcu_status: true,
            detailed_devices: true,
            ensemble: true,
            live_data: true,
            grid_profile: true,
            plc_level: false,
            production_state: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_follows_firmware_generation() {
        let config = EnvoyConfig {
            host: "192.168.1.50".to_owned(),
            ..Default::default()
        };
        assert_eq!(config.base_url(false), "http://192.168.1.50");
        assert_eq!(config.base_url(true), "https://192.168.1.50");
    }

    #[test]
    fn test_base_url_override_wins() {
        let config = EnvoyConfig {
            base_url: Some("http://127.0.0.1:1234/".to_owned()),
            ..Default::default()
        };
        assert_eq!(config.base_url(true), "http://127.0.0.1:1234");
    }

    #[test]
    fn test_token_mode_codes() {
        assert_eq!(TokenMode::from_code(0), Some(TokenMode::Cloud));
        assert_eq!(TokenMode::from_code(1), Some(TokenMode::InstallerToken));
        assert_eq!(TokenMode::from_code(2), None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EnvoyConfig = from_json(r#"{"host":"envoy","polling":{"production_secs":3}}"#);
        assert_eq!(config.host, "envoy");
        assert_eq!(config.polling.production_secs, 3);
        assert_eq!(config.polling.ensemble_secs, 15);
        assert!(config.features.live_data);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    fn from_json(json: &str) -> EnvoyConfig {
        serde_json::from_str(json).unwrap()
    }
}
