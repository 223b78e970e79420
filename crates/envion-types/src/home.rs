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

/// Gateway status from `/home.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeData {
    pub software_build_epoch: i64,
    pub is_nonvoy: bool,
    pub db_size: u64,
    pub db_percent_full: u32,
    pub timezone: String,
    pub current_date: String,
    pub current_time: String,
    pub tariff: String,
    pub web_comm: bool,
    pub ever_reported_to_enlighten: bool,
    pub last_enlighten_report_time: i64,
    pub primary_interface: String,
    pub interfaces: Vec<NetworkInterface>,
    pub wireless_connections: Vec<WirelessConnection>,
    pub comm: CommSummary,
    pub alerts: Vec<String>,
    pub update_status: String,
    pub enpower_connected: Option<bool>,
    pub enpower_grid_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub kind: String,
    pub interface: String,
    pub mac: String,
    pub dhcp: bool,
    pub ip: String,
    pub carrier: bool,
    /// Percent (device reports a 0-5 scale)
    pub signal_strength: u32,
    pub signal_strength_max: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirelessConnection {
    pub kind: String,
    pub connected: bool,
    pub signal_strength: u32,
    pub signal_strength_max: u32,
}

/// Communication level per device family, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommLevel {
    pub num: u32,
    pub level: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommSummary {
    pub num: u32,
    pub level: u32,
    pub pcu: Option<CommLevel>,
    pub acb: Option<CommLevel>,
    pub nsrb: Option<CommLevel>,
    pub esub: Option<CommLevel>,
    pub encharges: Vec<CommLevel>,
}
