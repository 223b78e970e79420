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

use crate::ensemble::Ensemble;
use crate::home::HomeData;
use crate::info::EnvoyInfo;
use crate::inventory::Inventory;
use crate::live_data::LiveData;
use crate::meters::{MeasurementType, MeterDescriptor};
use crate::power::PowerAndEnergy;

/// Canonical state store ("pv")
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvState {
    pub info: EnvoyInfo,
    pub home: HomeData,
    pub inventory: Inventory,
    pub meters: Vec<MeterDescriptor>,
    pub power_and_energy: PowerAndEnergy,
    pub ensemble: Ensemble,
    pub live_data: LiveData,
    pub grid_profile: GridProfile,
    /// True while power production is allowed
    pub production_state: Option<bool>,
}

impl PvState {
    pub fn new() -> Self {
        Self::default()
    }

    /// First enabled meter of the given kind
    pub fn meter(&self, kind: MeasurementType) -> Option<&MeterDescriptor> {
        self.meters
            .iter()
            .find(|m| m.measurement_type == kind && m.enabled)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProfile {
    pub name: String,
    pub id: String,
    pub version: String,
    pub item_count: u32,
}
