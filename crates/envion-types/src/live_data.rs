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

/// `/ivp/livedata/status`, converted to watts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveData {
    pub connection: LiveDataConnection,
    pub meters: LiveDataMeters,
    pub pv: Option<LivePower>,
    pub storage: Option<LivePower>,
    pub grid: Option<LivePower>,
    pub load: Option<LivePower>,
    pub generator: Option<LivePower>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDataConnection {
    pub mqtt_state: String,
    pub prov_state: String,
    pub auth_state: String,
    pub sc_stream: bool,
    pub sc_debug: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDataMeters {
    pub last_update: i64,
    pub soc: f64,
    pub main_relay_state: i64,
    pub gen_relay_state: i64,
    pub backup_bat_mode: i64,
    pub backup_soc: f64,
    pub is_split_phase: bool,
    pub phase_count: u32,
    pub enc_agg_soc: f64,
    pub enc_agg_energy: f64,
    pub acb_agg_soc: f64,
    pub acb_agg_energy: f64,
}

/// Aggregate and per-phase power of one live-data channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePower {
    pub power: f64,
    pub power_l1: f64,
    pub power_l2: f64,
    pub power_l3: f64,
    pub apparent_power: f64,
    pub apparent_power_l1: f64,
    pub apparent_power_l2: f64,
    pub apparent_power_l3: f64,
}
