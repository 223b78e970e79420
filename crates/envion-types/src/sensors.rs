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

use crate::ensemble::Profile;

/// What a configured sensor watches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SensorKind {
    /// Production power (W) against `threshold`
    PowerLevel { compare_mode: u8 },
    /// Production energy today (Wh) against `threshold`
    EnergyLevel { compare_mode: u8 },
    /// One grid-quality quantity of the net consumption meter
    GridQuality { quantity: GridQuantity, compare_mode: u8 },
    /// Relay grid mode equals the configured literal
    GridMode { source: GridModeSource, grid_mode: String },
    /// Tariff storage profile equals the configured profile
    Profile { profile: Profile },
    /// Battery state of charge (%) against `threshold`
    BackupLevel { compare_mode: u8 },
}

impl SensorKind {
    /// Compare-mode code of the numeric kinds
    pub fn compare_mode(&self) -> Option<u8> {
        match self {
            Self::PowerLevel { compare_mode }
            | Self::EnergyLevel { compare_mode }
            | Self::GridQuality { compare_mode, .. }
            | Self::BackupLevel { compare_mode } => Some(*compare_mode),
            Self::GridMode { .. } | Self::Profile { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GridQuantity {
    Voltage,
    Current,
    Frequency,
    PowerFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GridModeSource {
    Enpower,
    Encharge,
    Solar,
}

/// One configured sensor and its last evaluation.
///
/// `state` is recomputed every cycle from live readings and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDescriptor {
    pub name: String,
    pub display_type: u8,
    #[serde(flatten)]
    pub kind: SensorKind,
    #[serde(default)]
    pub threshold: f64,
    #[serde(skip_deserializing, default)]
    pub state: bool,
}
