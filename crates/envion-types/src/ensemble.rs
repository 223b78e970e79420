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

//! Storage and backup hardware ("ensemble"): batteries, the grid-forming
//! switch, dry contacts, generator and the tariff that drives them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ensemble {
    pub encharges: Vec<Encharge>,
    pub enpowers: Vec<Enpower>,
    pub collars: Vec<EnsembleDevice>,
    pub c6_combiners: Vec<EnsembleDevice>,
    pub counters: BTreeMap<String, f64>,
    pub secctrl: Option<SecCtrl>,
    pub relay: Option<Relay>,
    pub encharge_settings: Option<EnchargeSettings>,
    pub tariff: Option<TariffSummary>,
    pub dry_contacts: Vec<DryContact>,
    pub generator: Option<Generator>,
}

impl Ensemble {
    pub fn encharge_mut(&mut self, serial: &str) -> Option<&mut Encharge> {
        self.encharges
            .iter_mut()
            .find(|d| d.device.serial_number == serial)
    }

    pub fn enpower_mut(&mut self, serial: &str) -> Option<&mut Enpower> {
        self.enpowers
            .iter_mut()
            .find(|d| d.device.serial_number == serial)
    }

    pub fn dry_contact_mut(&mut self, id: &str) -> Option<&mut DryContact> {
        self.dry_contacts.iter_mut().find(|d| d.id == id)
    }

    /// Storage profile from the tariff, if known
    pub fn profile(&self) -> Option<Profile> {
        self.tariff.as_ref().map(|t| t.storage_mode)
    }
}

/// Fields every ensemble device reports, plus the status-endpoint overlay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleDevice {
    pub serial_number: String,
    pub part_number: String,
    pub installed: i64,
    pub last_rpt_date: i64,
    pub admin_state: i64,
    pub admin_state_str: String,
    pub firmware: String,
    pub device_status: Vec<String>,
    pub communicating: bool,
    pub temperature: f64,
    /// From `/ivp/ensemble/status`
    pub operating: Option<bool>,
    pub msg_retries: Option<u32>,
    pub device_type: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encharge {
    #[serde(flatten)]
    pub device: EnsembleDevice,
    pub bmu_firmware: String,
    pub sleep_enabled: bool,
    pub percent_full: u32,
    pub max_cell_temp: f64,
    /// Percent
    pub comm_level_sub_ghz: u32,
    pub comm_level_2_4_ghz: u32,
    pub led_status: u32,
    pub dc_switch_off: bool,
    pub revision: u32,
    /// Wh
    pub capacity: u32,
    pub phase: String,
    pub der_index: u32,
    pub comm_level: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enpower {
    #[serde(flatten)]
    pub device: EnsembleDevice,
    pub comm_level_sub_ghz: u32,
    pub comm_level_2_4_ghz: u32,
    pub mains_admin_state: String,
    pub mains_oper_state: String,
    pub grid_mode: String,
    pub encharge_grid_mode: String,
    pub relay_state_bm: u32,
    pub curr_state_id: i64,
}

impl Enpower {
    pub fn grid_connected(&self) -> bool {
        self.mains_oper_state == "closed"
    }
}

/// Aggregated battery controller state (`secctrl`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecCtrl {
    pub shutdown: bool,
    pub freq_bias_hz: f64,
    pub voltage_bias_v: f64,
    pub configured_backup_soc: f64,
    pub adjusted_backup_soc: f64,
    pub agg_soc: f64,
    pub max_energy: f64,
    pub enc_agg_soc: f64,
    pub enc_agg_soh: f64,
    pub enc_agg_backup_energy: f64,
    pub enc_agg_avail_energy: f64,
    pub enc_commissioned_capacity: f64,
    pub enc_max_available_capacity: f64,
    pub acb_agg_soc: f64,
    pub acb_agg_energy: f64,
    pub vls_limit: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relay {
    pub mains_admin_state: String,
    pub mains_oper_state: String,
    pub der1_state: i64,
    pub der2_state: i64,
    pub der3_state: i64,
    pub encharge_grid_mode: String,
    pub solar_grid_mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnchargeSettings {
    pub enable: bool,
    pub country: String,
    pub current_limit: f64,
    pub per_phase: bool,
}

/// Storage operating profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    SelfConsumption,
    Backup,
    SavingsMode,
    Economy,
    #[default]
    Unknown,
}

impl Profile {
    pub fn from_vendor(mode: &str) -> Self {
        match mode {
            "self-consumption" => Self::SelfConsumption,
            "backup" => Self::Backup,
            "savings-mode" => Self::SavingsMode,
            "economy" => Self::Economy,
            _ => Self::Unknown,
        }
    }

    pub fn as_vendor(self) -> &'static str {
        match self {
            Self::SelfConsumption => "self-consumption",
            Self::Backup => "backup",
            Self::SavingsMode => "savings-mode",
            Self::Economy => "economy",
            Self::Unknown => "unknown",
        }
    }
}

/// Flattened `/admin/lib/tariff`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffSummary {
    pub currency: String,
    pub logger: String,
    pub date: String,
    pub storage_mode: Profile,
    pub operation_mode_sub_type: String,
    pub reserved_soc: f64,
    pub very_low_soc: f64,
    pub charge_from_grid: bool,
    pub single_rate: f64,
    pub single_rate_sell: f64,
    pub seasons: Vec<String>,
    pub periods: Vec<String>,
    pub schedule_source: String,
    pub schedule_version: String,
    pub schedule_battery_mode: Profile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryContact {
    pub id: String,
    /// True when the contact reports `closed`
    pub state: bool,
    pub status: String,
    pub kind: String,
    pub grid_action: String,
    pub micro_grid_action: String,
    pub gen_action: String,
    pub manual_override: bool,
    pub load_name: String,
    pub mode: String,
    pub soc_low: f64,
    pub soc_high: f64,
    pub priority: f64,
    pub black_start: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generator {
    pub admin_mode: String,
    pub admin_state: String,
    pub oper_state: String,
    pub present: bool,
    pub kind: String,
    pub start_soc: f64,
    pub stop_soc: f64,
    pub exercise_on: bool,
    pub schedule: bool,
    pub settings: Option<GeneratorSettings>,
}

impl Generator {
    /// `on`, `off` or `auto`
    pub fn mode_on(&self) -> bool {
        self.admin_mode == "on" || self.admin_mode == "auto"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorSettings {
    pub max_continuous_current: f64,
    pub min_continuous_current: f64,
    pub rated_power: f64,
    pub phase_count: u32,
    pub auto_start: bool,
    pub start_soc: f64,
    pub stop_soc: f64,
}
