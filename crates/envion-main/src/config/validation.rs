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


//! Startup checks for an EnvION configuration.
//!
//! Every rule has its own [`ConfigIssue`] variant; the variant decides the
//! field it points at and whether it blocks startup.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Startup is refused
    Error,
    /// Logged, startup continues
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("gateway host must not be empty")]
    MissingHost,
    #[error("interval must be at least 1 second")]
    IntervalTooShort { field: &'static str },
    #[error("timeout must be at least 1 second")]
    TimeoutTooShort,
    #[error("unknown mode {0}, expected 0 (cloud) or 1 (installer token)")]
    UnknownTokenMode(u8),
    #[error("{mode} token mode needs `{field}`")]
    MissingCredential {
        mode: &'static str,
        field: &'static str,
    },
    #[error("serial not set, it will be read from the gateway")]
    SerialFromGateway,
    #[error("compare mode {code} of sensor '{sensor}' must be 0-5")]
    SensorCompareMode {
        index: usize,
        sensor: String,
        code: u8,
    },
    #[error("PLC level is polled but microinverter status is off")]
    PlcWithoutPcuStatus,
    #[error("broker host must not be empty")]
    MissingBrokerHost,
    #[error("QoS {0} is not 0, 1 or 2")]
    MqttQos(u8),
    #[error("user and password must both be set, ignoring both")]
    PartialMqttLogin,
    #[error("port must not be 0")]
    ZeroPort { sink: &'static str },
    #[error("bind address must not be empty")]
    MissingBindAddress,
}

impl ConfigIssue {
    pub fn severity(&self) -> Severity {
        match self {
            Self::SerialFromGateway | Self::PlcWithoutPcuStatus | Self::PartialMqttLogin => {
                Severity::Warning
            }
            Self::MissingHost
            | Self::IntervalTooShort { .. }
            | Self::TimeoutTooShort
            | Self::UnknownTokenMode(_)
            | Self::MissingCredential { .. }
            | Self::SensorCompareMode { .. }
            | Self::MissingBrokerHost
            | Self::MqttQos(_)
            | Self::ZeroPort { .. }
            | Self::MissingBindAddress => Severity::Error,
        }
    }

    /// Config path the issue points at, e.g. `envoy.polling.production_secs`
    pub fn field(&self) -> String {
        match self {
            Self::MissingHost => "envoy.host".to_owned(),
            Self::IntervalTooShort { field } => format!("envoy.polling.{field}"),
            Self::TimeoutTooShort => "envoy.request_timeout_secs".to_owned(),
            Self::UnknownTokenMode(_) => "envoy.token_generation_mode".to_owned(),
            Self::MissingCredential { field, .. } => format!("envoy.{field}"),
            Self::SerialFromGateway => "envoy.envoy_serial".to_owned(),
            Self::SensorCompareMode { index, .. } => format!("envoy.sensors[{index}].compare_mode"),
            Self::PlcWithoutPcuStatus => "envoy.features.plc_level".to_owned(),
            Self::MissingBrokerHost => "mqtt.host".to_owned(),
            Self::MqttQos(_) => "mqtt.qos".to_owned(),
            Self::PartialMqttLogin => "mqtt.user".to_owned(),
            Self::ZeroPort { sink } => format!("{sink}.port"),
            Self::MissingBindAddress => "rest.bind_address".to_owned(),
        }
    }
}

/// Issues collected over all config sections
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    issues: Vec<ConfigIssue>,
}

impl ValidationReport {
    pub fn push(&mut self, issue: ConfigIssue) {
        self.issues.push(issue);
    }

    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.with_severity(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.with_severity(Severity::Warning)
    }

    fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &ConfigIssue> {
        self.issues
            .iter()
            .filter(move |issue| issue.severity() == severity)
    }

    /// `field: message` per error, for the startup failure message
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(|issue| format!("{}: {issue}", issue.field()))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_invalidate() {
        let mut report = ValidationReport::default();
        report.push(ConfigIssue::SerialFromGateway);
        report.push(ConfigIssue::PartialMqttLogin);
        assert!(report.is_valid());
        assert_eq!(report.warnings().count(), 2);
        assert!(report.error_summary().is_empty());
    }

    #[test]
    fn test_error_summary_names_fields() {
        let mut report = ValidationReport::default();
        report.push(ConfigIssue::IntervalTooShort {
            field: "live_data_secs",
        });
        report.push(ConfigIssue::MissingCredential {
            mode: "installer",
            field: "envoy_token",
        });
        report.push(ConfigIssue::PlcWithoutPcuStatus);

        assert!(!report.is_valid());
        assert_eq!(
            report.error_summary(),
            "envoy.polling.live_data_secs: interval must be at least 1 second; \
             envoy.envoy_token: installer token mode needs `envoy_token`"
        );
    }

    #[test]
    fn test_sink_port_field() {
        assert_eq!(ConfigIssue::ZeroPort { sink: "mqtt" }.field(), "mqtt.port");
        assert_eq!(ConfigIssue::ZeroPort { sink: "rest" }.field(), "rest.port");
        assert_eq!(
            ConfigIssue::SensorCompareMode {
                index: 2,
                sensor: "Grid export".to_owned(),
                code: 7,
            }
            .field(),
            "envoy.sensors[2].compare_mode"
        );
    }
}
