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

//! Feature registry: what the connected gateway supports and has installed.
//!
//! Created with all-false defaults, written only by normalizers, never persisted.
//! Counts are recomputed from scratch on every update; nothing is incremented.

use serde::{Deserialize, Serialize};

/// Support/installed/count triple for one capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub supported: bool,
    pub installed: bool,
    pub count: u32,
}

impl Capability {
    /// Record the outcome of one evaluation.
    ///
    /// `installed` can only become true when `supported` is true, and the count
    /// is dropped to zero for unsupported capabilities.
    pub fn mark(&mut self, supported: bool, count: u32) {
        self.supported = supported;
        self.count = if supported { count } else { 0 };
        self.installed = supported && count > 0;
    }

    /// Installed only counts when the endpoint is supported
    pub fn set_installed(&mut self, installed: bool) {
        self.installed = self.supported && installed;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One meter channel (production, net consumption...)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterChannelFeature {
    pub supported: bool,
    pub enabled: bool,
}

impl MeterChannelFeature {
    pub fn mark(&mut self, supported: bool, enabled: bool) {
        self.supported = supported;
        self.enabled = supported && enabled;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetersFeature {
    pub supported: bool,
    pub installed: bool,
    pub count: u32,
    pub production: MeterChannelFeature,
    pub consumption_net: MeterChannelFeature,
    pub consumption_total: MeterChannelFeature,
    pub storage: MeterChannelFeature,
    pub readings: Capability,
    pub reports: Capability,
}

impl MetersFeature {
    pub fn reset_channels(&mut self) {
        self.production = MeterChannelFeature::default();
        self.consumption_net = MeterChannelFeature::default();
        self.consumption_total = MeterChannelFeature::default();
        self.storage = MeterChannelFeature::default();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoFeature {
    pub supported: bool,
    /// Firmware 7.x or later: JWT tokens instead of digest passwords
    pub firmware7xx: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeFeature {
    pub supported: bool,
    pub network_interfaces: u32,
    pub wireless_connections: u32,
    /// Device families announced in the `comm` map
    pub pcus: bool,
    pub acbs: bool,
    pub nsrbs: bool,
    pub esubs: bool,
    pub encharges: bool,
    pub enpower: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFeature {
    pub supported: bool,
    pub pcus: Capability,
    pub acbs: Capability,
    pub nsrbs: Capability,
    pub esubs: Capability,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtFeature {
    pub supported: bool,
    pub production: Capability,
    pub consumption_net: Capability,
    pub consumption_total: Capability,
    pub storage: Capability,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionFeature {
    /// `/api/v1/production`
    pub microinverters: Capability,
    /// `/ivp/pdm/energy`
    pub pdm: Capability,
    /// `/production.json`
    pub ct: CtFeature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleFeature {
    pub inventory: Capability,
    pub status: Capability,
    pub encharges: Capability,
    pub enpowers: Capability,
    pub collars: Capability,
    pub c6_combiners: Capability,
    pub encharge_settings: Capability,
    pub tariff: Capability,
    pub dry_contacts: Capability,
    pub dry_contacts_settings: Capability,
    pub generator: Capability,
    pub generator_settings: Capability,
}

impl EnsembleFeature {
    /// Any storage or backup hardware present
    pub fn installed(&self) -> bool {
        self.encharges.installed || self.enpowers.installed || self.collars.installed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRegistry {
    pub info: InfoFeature,
    pub home: HomeFeature,
    pub backbone_app: Capability,
    pub inventory: InventoryFeature,
    pub pcu_status: Capability,
    pub detailed_devices: Capability,
    pub meters: MetersFeature,
    pub production: ProductionFeature,
    pub ensemble: EnsembleFeature,
    pub live_data: Capability,
    pub grid_profile: Capability,
    pub plc_level: Capability,
    pub production_state: Capability,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Production meter is the authoritative production source
    pub fn production_meter_enabled(&self) -> bool {
        self.meters.supported && self.meters.production.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_all_false() {
        let registry = FeatureRegistry::new();
        assert!(!registry.info.supported);
        assert!(!registry.meters.production.enabled);
        assert_eq!(registry.inventory.pcus.count, 0);
        assert!(!registry.ensemble.installed());
    }

    #[test]
    fn test_installed_requires_supported() {
        let mut cap = Capability::default();
        cap.set_installed(true);
        assert!(!cap.installed);

        cap.mark(false, 5);
        assert!(!cap.installed);
        assert_eq!(cap.count, 0);

        cap.mark(true, 5);
        assert!(cap.installed);
        assert_eq!(cap.count, 5);
    }

    #[test]
    fn test_mark_is_reset_then_recompute() {
        let mut cap = Capability::default();
        cap.mark(true, 12);
        cap.mark(true, 3);
        assert_eq!(cap.count, 3);
        cap.mark(true, 0);
        assert!(cap.supported);
        assert!(!cap.installed);
    }

    #[test]
    fn test_meter_channel_enabled_requires_supported() {
        let mut channel = MeterChannelFeature::default();
        channel.mark(false, true);
        assert!(!channel.enabled);
        channel.mark(true, true);
        assert!(channel.enabled);
    }
}
