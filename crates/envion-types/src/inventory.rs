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

//! Inventory device families.
//!
//! Entries are ordered as the inventory endpoint lists them, but every
//! cross-endpoint join goes through `serial_number`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub pcus: Vec<Microinverter>,
    pub acbs: Vec<AcBattery>,
    pub nsrbs: Vec<QRelay>,
    pub esubs: Vec<Esub>,
}

impl Inventory {
    pub fn pcu_mut(&mut self, serial: &str) -> Option<&mut Microinverter> {
        self.pcus.iter_mut().find(|d| d.serial_number == serial)
    }

    pub fn nsrb_mut(&mut self, serial: &str) -> Option<&mut QRelay> {
        self.nsrbs.iter_mut().find(|d| d.serial_number == serial)
    }

    pub fn acb_mut(&mut self, serial: &str) -> Option<&mut AcBattery> {
        self.acbs.iter_mut().find(|d| d.serial_number == serial)
    }
}

/// Per-channel readings from `/ivp/pdm/device_data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceChannelData {
    pub active: bool,
    pub power: f64,
    pub power_used: f64,
    pub power_max: f64,
    pub energy_today: f64,
    pub energy_yesterday: f64,
    pub energy_last_seven_days: f64,
    pub energy_lifetime: f64,
    pub ac_voltage: f64,
    pub ac_frequency: f64,
    pub dc_voltage: f64,
    pub dc_current: f64,
    pub temperature: f64,
    pub reading_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Microinverter {
    pub serial_number: String,
    pub part_number: String,
    pub installed: i64,
    pub last_rpt_date: i64,
    pub admin_state: i64,
    pub dev_type: i64,
    pub firmware: String,
    pub ptpn: String,
    pub chaneid: i64,
    pub device_status: Vec<String>,
    pub gfi_clear: bool,
    pub producing: bool,
    pub communicating: bool,
    pub provisioned: bool,
    pub operating: bool,
    pub phase: String,
    pub last_report_watts: f64,
    pub max_report_watts: f64,
    pub last_report_date: i64,
    pub detailed: Option<DeviceChannelData>,
    /// PLC communication level, percent
    pub comm_level: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcBattery {
    pub serial_number: String,
    pub part_number: String,
    pub installed: i64,
    pub last_rpt_date: i64,
    pub admin_state: i64,
    pub firmware: String,
    pub device_status: Vec<String>,
    pub producing: bool,
    pub communicating: bool,
    pub provisioned: bool,
    pub operating: bool,
    pub sleep_enabled: bool,
    pub percent_full: u32,
    pub max_cell_temp: f64,
    pub sleep_min_soc: u32,
    pub sleep_max_soc: u32,
    pub charge_status: String,
    pub comm_level: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QRelay {
    pub serial_number: String,
    pub part_number: String,
    pub installed: i64,
    pub last_rpt_date: i64,
    pub admin_state: i64,
    pub firmware: String,
    pub device_status: Vec<String>,
    pub communicating: bool,
    pub provisioned: bool,
    pub operating: bool,
    /// `closed` or `open`
    pub relay: String,
    pub reason_code: i64,
    pub reason: String,
    pub line_count: u32,
    pub line1_connected: bool,
    pub line2_connected: bool,
    pub line3_connected: bool,
    pub detailed: Option<DeviceChannelData>,
    pub comm_level: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Esub {
    pub serial_number: String,
    pub part_number: String,
    pub installed: i64,
    pub last_rpt_date: i64,
    pub admin_state: i64,
    pub firmware: String,
    pub device_status: Vec<String>,
    pub communicating: bool,
    pub operating: bool,
}
