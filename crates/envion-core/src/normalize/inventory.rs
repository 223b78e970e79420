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

//! `/inventory.json`: microinverters, AC batteries, Q-relays and meter subsystems.
//!
//! Groups are found by their declared `type`, never by array position. Existing
//! entries are updated in place by serial number so fields owned by other
//! endpoints (PCU status, detailed data, PLC level) survive the refresh.

use envion_types::features::InventoryFeature;
use envion_types::{AcBattery, Esub, Inventory, Microinverter, QRelay};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{group_devices, lenient};
use crate::constants::MAX_MICROINVERTERS;
use crate::error::EnvoyResult;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDevice {
    #[serde(deserialize_with = "lenient::string")]
    serial_num: String,
    #[serde(deserialize_with = "lenient::string")]
    part_num: String,
    #[serde(deserialize_with = "lenient::i64")]
    installed: i64,
    #[serde(deserialize_with = "lenient::i64")]
    last_rpt_date: i64,
    #[serde(deserialize_with = "lenient::i64")]
    admin_state: i64,
    #[serde(deserialize_with = "lenient::i64")]
    dev_type: i64,
    #[serde(deserialize_with = "lenient::string")]
    img_pnum_running: String,
    #[serde(deserialize_with = "lenient::string")]
    ptpn: String,
    #[serde(deserialize_with = "lenient::i64")]
    chaneid: i64,
    device_status: Vec<String>,
    device_control: Vec<WireDeviceControl>,
    #[serde(deserialize_with = "lenient::bool")]
    producing: bool,
    #[serde(deserialize_with = "lenient::bool")]
    communicating: bool,
    #[serde(deserialize_with = "lenient::bool")]
    provisioned: bool,
    #[serde(deserialize_with = "lenient::bool")]
    operating: bool,
    #[serde(deserialize_with = "lenient::string")]
    phase: String,
    // AC battery
    #[serde(deserialize_with = "lenient::bool")]
    sleep_enabled: bool,
    #[serde(rename = "percentFull", deserialize_with = "lenient::u32")]
    percent_full: u32,
    #[serde(rename = "maxCellTemp", deserialize_with = "lenient::f64")]
    max_cell_temp: f64,
    #[serde(deserialize_with = "lenient::u32")]
    sleep_min_soc: u32,
    #[serde(deserialize_with = "lenient::u32")]
    sleep_max_soc: u32,
    #[serde(deserialize_with = "lenient::string")]
    charge_status: String,
    // Q-relay
    #[serde(deserialize_with = "lenient::string")]
    relay: String,
    #[serde(deserialize_with = "lenient::i64")]
    reason_code: i64,
    #[serde(deserialize_with = "lenient::string")]
    reason: String,
    #[serde(rename = "line-count", deserialize_with = "lenient::u32")]
    line_count: u32,
    #[serde(rename = "line1-connected", deserialize_with = "lenient::bool")]
    line1_connected: bool,
    #[serde(rename = "line2-connected", deserialize_with = "lenient::bool")]
    line2_connected: bool,
    #[serde(rename = "line3-connected", deserialize_with = "lenient::bool")]
    line3_connected: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDeviceControl {
    #[serde(deserialize_with = "lenient::bool")]
    gficlearset: bool,
}

/// Reuse the previous entry for `serial` so foreign fields are kept
fn previous<T: Clone + Default>(old: &[T], serial: &str, key: impl Fn(&T) -> &str) -> T {
    old.iter()
        .find(|d| key(d) == serial)
        .cloned()
        .unwrap_or_default()
}

fn merge_pcu(old: &[Microinverter], d: WireDevice) -> Microinverter {
    let mut pcu = previous(old, &d.serial_num, |p| &p.serial_number);
    pcu.gfi_clear = d.device_control.iter().any(|c| c.gficlearset);
    pcu.serial_number = d.serial_num;
    pcu.part_number = d.part_num;
    pcu.installed = d.installed;
    pcu.last_rpt_date = d.last_rpt_date;
    pcu.admin_state = d.admin_state;
    pcu.dev_type = d.dev_type;
    pcu.firmware = d.img_pnum_running;
    pcu.ptpn = d.ptpn;
    pcu.chaneid = d.chaneid;
    pcu.device_status = d.device_status;
    pcu.producing = d.producing;
    pcu.communicating = d.communicating;
    pcu.provisioned = d.provisioned;
    pcu.operating = d.operating;
    pcu.phase = d.phase;
    pcu
}

fn merge_acb(old: &[AcBattery], d: WireDevice) -> AcBattery {
    let mut acb = previous(old, &d.serial_num, |a| &a.serial_number);
    acb.serial_number = d.serial_num;
    acb.part_number = d.part_num;
    acb.installed = d.installed;
    acb.last_rpt_date = d.last_rpt_date;
    acb.admin_state = d.admin_state;
    acb.firmware = d.img_pnum_running;
    acb.device_status = d.device_status;
    acb.producing = d.producing;
    acb.communicating = d.communicating;
    acb.provisioned = d.provisioned;
    acb.operating = d.operating;
    acb.sleep_enabled = d.sleep_enabled;
    acb.percent_full = d.percent_full;
    acb.max_cell_temp = d.max_cell_temp;
    acb.sleep_min_soc = d.sleep_min_soc;
    acb.sleep_max_soc = d.sleep_max_soc;
    acb.charge_status = d.charge_status;
    acb
}

fn merge_nsrb(old: &[QRelay], d: WireDevice) -> QRelay {
    let mut nsrb = previous(old, &d.serial_num, |q| &q.serial_number);
    nsrb.serial_number = d.serial_num;
    nsrb.part_number = d.part_num;
    nsrb.installed = d.installed;
    nsrb.last_rpt_date = d.last_rpt_date;
    nsrb.admin_state = d.admin_state;
    nsrb.firmware = d.img_pnum_running;
    nsrb.device_status = d.device_status;
    nsrb.communicating = d.communicating;
    nsrb.provisioned = d.provisioned;
    nsrb.operating = d.operating;
    nsrb.relay = d.relay;
    nsrb.reason_code = d.reason_code;
    nsrb.reason = d.reason;
    nsrb.line_count = d.line_count;
    nsrb.line1_connected = d.line1_connected;
    nsrb.line2_connected = d.line2_connected;
    nsrb.line3_connected = d.line3_connected;
    nsrb
}

fn merge_esub(d: WireDevice) -> Esub {
    Esub {
        serial_number: d.serial_num,
        part_number: d.part_num,
        installed: d.installed,
        last_rpt_date: d.last_rpt_date,
        admin_state: d.admin_state,
        firmware: d.img_pnum_running,
        device_status: d.device_status,
        communicating: d.communicating,
        operating: d.operating,
    }
}

/// `/inventory.json`
pub fn apply_inventory(
    payload: &Value,
    inventory: &mut Inventory,
    feature: &mut InventoryFeature,
) -> EnvoyResult<()> {
    let pcus = group_devices::<WireDevice>(payload, "PCU")?;
    let acbs = group_devices::<WireDevice>(payload, "ACB")?;
    let nsrbs = group_devices::<WireDevice>(payload, "NSRB")?;
    let esubs = group_devices::<WireDevice>(payload, "ESUB")?;

    feature.supported = true;
    feature.pcus.mark(pcus.is_some(), pcus.as_ref().map_or(0, Vec::len) as u32);
    feature.acbs.mark(acbs.is_some(), acbs.as_ref().map_or(0, Vec::len) as u32);
    feature.nsrbs.mark(nsrbs.is_some(), nsrbs.as_ref().map_or(0, Vec::len) as u32);
    feature.esubs.mark(esubs.is_some(), esubs.as_ref().map_or(0, Vec::len) as u32);

    let mut pcus = pcus.unwrap_or_default();
    if pcus.len() > MAX_MICROINVERTERS {
        debug!(
            "📋 [INVENTORY] {} microinverters reported, keeping first {}",
            pcus.len(),
            MAX_MICROINVERTERS
        );
        pcus.truncate(MAX_MICROINVERTERS);
    }

    inventory.pcus = pcus
        .into_iter()
        .map(|d| merge_pcu(&inventory.pcus, d))
        .collect();
    inventory.acbs = acbs
        .unwrap_or_default()
        .into_iter()
        .map(|d| merge_acb(&inventory.acbs, d))
        .collect();
    inventory.nsrbs = nsrbs
        .unwrap_or_default()
        .into_iter()
        .map(|d| merge_nsrb(&inventory.nsrbs, d))
        .collect();
    inventory.esubs = esubs
        .unwrap_or_default()
        .into_iter()
        .map(merge_esub)
        .collect();
    Ok(())
}
