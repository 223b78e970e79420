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

/// Meter channel kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementType {
    #[default]
    #[serde(rename = "Production")]
    Production,
    #[serde(rename = "Consumption Net")]
    ConsumptionNet,
    #[serde(rename = "Consumption Total")]
    ConsumptionTotal,
    #[serde(rename = "Storage")]
    Storage,
}

impl MeasurementType {
    /// Parse the gateway's `measurementType`/`reportType` literal
    pub fn from_vendor(value: &str) -> Option<Self> {
        match value {
            "production" => Some(Self::Production),
            "net-consumption" => Some(Self::ConsumptionNet),
            "total-consumption" => Some(Self::ConsumptionTotal),
            "storage" => Some(Self::Storage),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Production => "Production",
            Self::ConsumptionNet => "Consumption Net",
            Self::ConsumptionTotal => "Consumption Total",
            Self::Storage => "Storage",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::ConsumptionNet => "consumptionNet",
            Self::ConsumptionTotal => "consumptionTotal",
            Self::Storage => "storage",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseMode {
    #[default]
    Single,
    Split,
    Three,
}

impl PhaseMode {
    pub fn from_vendor(value: &str) -> Self {
        match value {
            "three" => Self::Three,
            "split" => Self::Split,
            _ => Self::Single,
        }
    }

    /// Divisor applied to the summed voltage before exposing per-phase voltage
    pub fn voltage_divide(self) -> u32 {
        match self {
            Self::Three => 3,
            Self::Split => 2,
            Self::Single => 1,
        }
    }
}

/// Where a meter descriptor came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MeterOrigin {
    /// Reported by `/ivp/meters`
    #[default]
    Device,
    /// Synthesised from a sibling meter identified by `eid`
    DerivedFrom { eid: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterDescriptor {
    pub eid: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub measurement_type: MeasurementType,
    pub enabled: bool,
    pub phase_mode: PhaseMode,
    pub phase_count: u32,
    pub voltage_divide: u32,
    pub metering_status: String,
    pub status_flags: Vec<String>,
    pub origin: MeterOrigin,
    pub reading_time: i64,
    pub power: f64,
    pub apparent_power: f64,
    pub reactive_power: f64,
    pub power_factor: f64,
    /// Per-phase voltage, already divided by `voltage_divide`
    pub voltage: f64,
    pub current: f64,
    pub frequency: f64,
    pub energy_lifetime: f64,
    pub energy_lifetime_upload: f64,
    pub apparent_energy: f64,
    pub reactive_energy_lagging: f64,
    pub reactive_energy_leading: f64,
    pub channels: Vec<MeterPhaseReading>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterPhaseReading {
    pub eid: u64,
    pub power: f64,
    pub apparent_power: f64,
    pub reactive_power: f64,
    pub power_factor: f64,
    pub voltage: f64,
    pub current: f64,
    pub frequency: f64,
    pub energy_lifetime: f64,
    pub energy_lifetime_upload: f64,
}

impl MeterDescriptor {
    pub fn new(eid: u64, measurement_type: MeasurementType, phase_mode: PhaseMode) -> Self {
        Self {
            eid,
            kind: "eim".to_owned(),
            measurement_type,
            phase_mode,
            voltage_divide: phase_mode.voltage_divide(),
            ..Self::default()
        }
    }

    /// Convert a summed voltage reading into per-phase voltage
    pub fn phase_voltage(&self, reported: f64) -> f64 {
        reported / f64::from(self.voltage_divide.max(1))
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.origin, MeterOrigin::DerivedFrom { .. })
    }

    /// Build the "Consumption Total" descriptor from the "Consumption Net" one.
    ///
    /// Identity fields (eid, type, phase layout, state) are carried forward from
    /// `net`; readings start empty and are overlaid by the caller.
    pub fn derive_consumption_total(net: &MeterDescriptor) -> Self {
        Self {
            eid: net.eid,
            kind: net.kind.clone(),
            measurement_type: MeasurementType::ConsumptionTotal,
            enabled: net.enabled,
            phase_mode: net.phase_mode,
            phase_count: net.phase_count,
            voltage_divide: net.voltage_divide,
            metering_status: net.metering_status.clone(),
            status_flags: net.status_flags.clone(),
            origin: MeterOrigin::DerivedFrom { eid: net.eid },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voltage_divide_from_phase_mode() {
        assert_eq!(PhaseMode::from_vendor("three").voltage_divide(), 3);
        assert_eq!(PhaseMode::from_vendor("split").voltage_divide(), 2);
        assert_eq!(PhaseMode::from_vendor("single").voltage_divide(), 1);
        assert_eq!(PhaseMode::from_vendor("anything").voltage_divide(), 1);
    }

    #[test]
    fn test_phase_voltage_applies_divisor() {
        let meter = MeterDescriptor::new(1, MeasurementType::Production, PhaseMode::Three);
        assert!((meter.phase_voltage(690.0) - 230.0).abs() < f64::EPSILON);

        let split = MeterDescriptor::new(2, MeasurementType::Production, PhaseMode::Split);
        assert!((split.phase_voltage(240.0) - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_derive_consumption_total_keeps_identity() {
        let mut net = MeterDescriptor::new(704643584, MeasurementType::ConsumptionNet, PhaseMode::Three);
        net.enabled = true;
        net.phase_count = 3;
        net.power = -1200.0;

        let total = MeterDescriptor::derive_consumption_total(&net);
        assert_eq!(total.eid, net.eid);
        assert_eq!(total.kind, net.kind);
        assert_eq!(total.phase_mode, PhaseMode::Three);
        assert_eq!(total.voltage_divide, 3);
        assert_eq!(total.measurement_type, MeasurementType::ConsumptionTotal);
        assert!(total.is_derived());
        assert!(total.power.abs() < f64::EPSILON);
    }

    #[test]
    fn test_measurement_type_from_vendor() {
        assert_eq!(
            MeasurementType::from_vendor("net-consumption"),
            Some(MeasurementType::ConsumptionNet)
        );
        assert_eq!(MeasurementType::from_vendor("bogus"), None);
        assert_eq!(MeasurementType::Storage.display_name(), "Storage");
    }
}
