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

use serde::{Deserialize, Serialize};

/// Which endpoint a power/energy sample came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    /// `/api/v1/production`
    #[default]
    Microinverters,
    /// `/ivp/pdm/energy` microinverter channel
    PdmPcu,
    /// `/ivp/pdm/energy` revenue-grade meter
    PdmRgm,
    /// `/ivp/pdm/energy` integrated meter
    PdmEim,
    /// `/production.json` inverter aggregate
    CtInverters,
    /// `/production.json` integrated meter
    CtEim,
    /// `/production.json` AC battery aggregate
    CtAcb,
    /// `/ivp/meters/readings` or `/ivp/meters/reports`
    Meter,
}

/// One raw sample kept per source for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSample {
    pub source: SourceKind,
    /// `production`, `consumptionNet`, `consumptionTotal` or `storage`
    pub channel: String,
    pub active_count: u32,
    pub reading_time: i64,
    pub power: f64,
    pub energy_today: f64,
    pub energy_last_seven_days: f64,
    pub energy_lifetime: f64,
    pub rms_voltage: f64,
    pub rms_current: f64,
    pub power_factor: f64,
    pub apparent_power: f64,
    pub reactive_power: f64,
}

/// Reconciled view of one channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerSummary {
    pub source: SourceKind,
    pub reading_time: i64,
    pub power: f64,
    /// High-water mark of `power`; only an explicit reset lowers it
    pub power_peak: f64,
    pub power_peak_detected: bool,
    pub energy_today: f64,
    pub energy_last_seven_days: f64,
    pub energy_lifetime: f64,
    pub voltage: f64,
    pub current: f64,
    pub power_factor: f64,
    pub frequency: f64,
}

impl PowerSummary {
    /// Store a new power reading and advance the peak.
    ///
    /// Returns true when the reading set a new peak.
    pub fn record_power(&mut self, power: f64) -> bool {
        self.power = power;
        let detected = power > self.power_peak;
        self.power_peak = self.power_peak.max(power);
        self.power_peak_detected = detected;
        detected
    }

    pub fn reset_power_peak(&mut self) {
        self.power_peak = 0.0;
        self.power_peak_detected = false;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerAndEnergy {
    pub production: PowerSummary,
    pub consumption_net: Option<PowerSummary>,
    pub consumption_total: Option<PowerSummary>,
    pub sources: Vec<SourceSample>,
}

impl PowerAndEnergy {
    /// Replace all samples from `source`, keeping the others
    pub fn replace_samples(&mut self, source: SourceKind, samples: Vec<SourceSample>) {
        self.sources.retain(|s| s.source != source);
        self.sources.extend(samples);
    }

    pub fn sample(&self, source: SourceKind, channel: &str) -> Option<&SourceSample> {
        self.sources
            .iter()
            .find(|s| s.source == source && s.channel == channel)
    }
}
