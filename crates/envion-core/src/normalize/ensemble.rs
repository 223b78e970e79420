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

//! Ensemble (storage and backup) endpoints.
//!
//! `/ivp/ensemble/inventory` lists the devices, `/ivp/ensemble/status` then
//! enriches them through its `serial_nums` map. Dry contacts and generator
//! come with a separate settings endpoint each.

use envion_types::features::EnsembleFeature;
use envion_types::{
    DryContact, Encharge, EnchargeSettings, Enpower, Ensemble, EnsembleDevice, Generator,
    GeneratorSettings, Relay, SecCtrl,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{group_devices, lenient, level_percent, parse};
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
    #[serde(deserialize_with = "lenient::string")]
    admin_state_str: String,
    #[serde(deserialize_with = "lenient::string")]
    img_pnum_running: String,
    device_status: Vec<String>,
    #[serde(deserialize_with = "lenient::bool")]
    communicating: bool,
    #[serde(deserialize_with = "lenient::f64")]
    temperature: f64,
    // encharge
    #[serde(deserialize_with = "lenient::string")]
    bmu_fw_version: String,
    #[serde(deserialize_with = "lenient::bool")]
    sleep_enabled: bool,
    #[serde(rename = "percentFull", deserialize_with = "lenient::u32")]
    percent_full: u32,
    #[serde(rename = "maxCellTemp", deserialize_with = "lenient::f64")]
    max_cell_temp: f64,
    #[serde(deserialize_with = "lenient::u32")]
    comm_level_sub_ghz: u32,
    #[serde(deserialize_with = "lenient::u32")]
    comm_level_2_4_ghz: u32,
    #[serde(deserialize_with = "lenient::u32")]
    led_status: u32,
    #[serde(deserialize_with = "lenient::bool")]
    dc_switch_off: bool,
    #[serde(deserialize_with = "lenient::u32")]
    encharge_rev: u32,
    #[serde(deserialize_with = "lenient::u32")]
    encharge_capacity: u32,
    #[serde(deserialize_with = "lenient::string")]
    phase: String,
    #[serde(deserialize_with = "lenient::u32")]
    der_index: u32,
    // enpower
    #[serde(deserialize_with = "lenient::string")]
    mains_admin_state: String,
    #[serde(deserialize_with = "lenient::string")]
    mains_oper_state: String,
    #[serde(rename = "Enpwr_grid_mode", deserialize_with = "lenient::string")]
    enpower_grid_mode: String,
    #[serde(rename = "Enchg_grid_mode", deserialize_with = "lenient::string")]
    encharge_grid_mode: String,
    #[serde(rename = "Enpwr_relay_state_bm", deserialize_with = "lenient::u32")]
    relay_state_bm: u32,
    #[serde(rename = "Enpwr_curr_state_id", deserialize_with = "lenient::i64")]
    curr_state_id: i64,
}

impl WireDevice {
    /// Common part, keeping the status overlay from `previous`
    fn device(&self, previous: Option<&EnsembleDevice>) -> EnsembleDevice {
        EnsembleDevice {
            serial_number: self.serial_num.clone(),
            part_number: self.part_num.clone(),
            installed: self.installed,
            last_rpt_date: self.last_rpt_date,
            admin_state: self.admin_state,
            admin_state_str: self.admin_state_str.clone(),
            firmware: self.img_pnum_running.clone(),
            device_status: self.device_status.clone(),
            communicating: self.communicating,
            temperature: self.temperature,
            operating: previous.and_then(|p| p.operating),
            msg_retries: previous.and_then(|p| p.msg_retries),
            device_type: previous.and_then(|p| p.device_type),
        }
    }
}

/// `/ivp/ensemble/inventory`
pub fn apply_ensemble_inventory(
    payload: &Value,
    ensemble: &mut Ensemble,
    feature: &mut EnsembleFeature,
) -> EnvoyResult<()> {
    let encharges = group_devices::<WireDevice>(payload, "ENCHARGE")?;
    let enpowers = group_devices::<WireDevice>(payload, "ENPOWER")?;
    let collars = group_devices::<WireDevice>(payload, "COLLAR")?;
    let combiners = group_devices::<WireDevice>(payload, "C6 COMBINER CONTROLLER")?;

    feature.inventory.mark(true, 1);
    feature
        .encharges
        .mark(encharges.is_some(), encharges.as_ref().map_or(0, Vec::len) as u32);
    feature
        .enpowers
        .mark(enpowers.is_some(), enpowers.as_ref().map_or(0, Vec::len) as u32);
    feature
        .collars
        .mark(collars.is_some(), collars.as_ref().map_or(0, Vec::len) as u32);
    feature
        .c6_combiners
        .mark(combiners.is_some(), combiners.as_ref().map_or(0, Vec::len) as u32);

    ensemble.encharges = encharges
        .unwrap_or_default()
        .iter()
        .map(|d| {
            let previous = ensemble
                .encharges
                .iter()
                .find(|e| e.device.serial_number == d.serial_num);
            Encharge {
                device: d.device(previous.map(|p| &p.device)),
                bmu_firmware: d.bmu_fw_version.clone(),
                sleep_enabled: d.sleep_enabled,
                percent_full: d.percent_full,
                max_cell_temp: d.max_cell_temp,
                comm_level_sub_ghz: level_percent(d.comm_level_sub_ghz),
                comm_level_2_4_ghz: level_percent(d.comm_level_2_4_ghz),
                led_status: d.led_status,
                dc_switch_off: d.dc_switch_off,
                revision: d.encharge_rev,
                capacity: d.encharge_capacity,
                phase: d.phase.clone(),
                der_index: d.der_index,
                comm_level: previous.and_then(|p| p.comm_level),
            }
        })
        .collect();

    ensemble.enpowers = enpowers
        .unwrap_or_default()
        .iter()
        .map(|d| {
            let previous = ensemble
                .enpowers
                .iter()
                .find(|e| e.device.serial_number == d.serial_num);
            Enpower {
                device: d.device(previous.map(|p| &p.device)),
                comm_level_sub_ghz: level_percent(d.comm_level_sub_ghz),
                comm_level_2_4_ghz: level_percent(d.comm_level_2_4_ghz),
                mains_admin_state: d.mains_admin_state.clone(),
                mains_oper_state: d.mains_oper_state.clone(),
                grid_mode: d.enpower_grid_mode.clone(),
                encharge_grid_mode: d.encharge_grid_mode.clone(),
                relay_state_bm: d.relay_state_bm,
                curr_state_id: d.curr_state_id,
            }
        })
        .collect();

    let plain = |devices: Option<Vec<WireDevice>>, old: &[EnsembleDevice]| -> Vec<EnsembleDevice> {
        devices
            .unwrap_or_default()
            .iter()
            .map(|d| d.device(old.iter().find(|o| o.serial_number == d.serial_num)))
            .collect()
    };
    ensemble.collars = plain(collars, &ensemble.collars);
    ensemble.c6_combiners = plain(combiners, &ensemble.c6_combiners);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireStatus {
    inventory: WireStatusInventory,
    counters: BTreeMap<String, Value>,
    secctrl: Option<WireSecCtrl>,
    relay: Option<WireRelay>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireStatusInventory {
    serial_nums: BTreeMap<String, WireSerialStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireSerialStatus {
    #[serde(deserialize_with = "lenient::u32")]
    device_type: u32,
    #[serde(deserialize_with = "lenient::u32")]
    comm_level_sub_ghz: u32,
    #[serde(deserialize_with = "lenient::u32")]
    comm_level_2_4_ghz: u32,
    #[serde(deserialize_with = "lenient::u32")]
    msg_retries: u32,
    #[serde(deserialize_with = "lenient::bool")]
    operating: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireSecCtrl {
    #[serde(deserialize_with = "lenient::bool")]
    shutdown: bool,
    #[serde(rename = "freq_bias_hz", deserialize_with = "lenient::f64")]
    freq_bias_hz: f64,
    #[serde(rename = "voltage_bias_v", deserialize_with = "lenient::f64")]
    voltage_bias_v: f64,
    #[serde(rename = "configured_backup_soc", deserialize_with = "lenient::f64")]
    configured_backup_soc: f64,
    #[serde(rename = "adjusted_backup_soc", deserialize_with = "lenient::f64")]
    adjusted_backup_soc: f64,
    #[serde(rename = "agg_soc", deserialize_with = "lenient::f64")]
    agg_soc: f64,
    #[serde(rename = "Max_energy", deserialize_with = "lenient::f64")]
    max_energy: f64,
    #[serde(rename = "ENC_agg_soc", deserialize_with = "lenient::f64")]
    enc_agg_soc: f64,
    #[serde(rename = "ENC_agg_soh", deserialize_with = "lenient::f64")]
    enc_agg_soh: f64,
    #[serde(rename = "ENC_agg_backup_energy", deserialize_with = "lenient::f64")]
    enc_agg_backup_energy: f64,
    #[serde(rename = "ENC_agg_avail_energy", deserialize_with = "lenient::f64")]
    enc_agg_avail_energy: f64,
    #[serde(rename = "Enc_commissioned_capacity", deserialize_with = "lenient::f64")]
    enc_commissioned_capacity: f64,
    #[serde(rename = "Enc_max_available_capacity", deserialize_with = "lenient::f64")]
    enc_max_available_capacity: f64,
    #[serde(rename = "ACB_agg_soc", deserialize_with = "lenient::f64")]
    acb_agg_soc: f64,
    #[serde(rename = "ACB_agg_energy", deserialize_with = "lenient::f64")]
    acb_agg_energy: f64,
    #[serde(rename = "VLS_Limit", deserialize_with = "lenient::f64")]
    vls_limit: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireRelay {
    #[serde(deserialize_with = "lenient::string")]
    mains_admin_state: String,
    #[serde(deserialize_with = "lenient::string")]
    mains_oper_state: String,
    #[serde(rename = "der1_state", deserialize_with = "lenient::i64")]
    der1_state: i64,
    #[serde(rename = "der2_state", deserialize_with = "lenient::i64")]
    der2_state: i64,
    #[serde(rename = "der3_state", deserialize_with = "lenient::i64")]
    der3_state: i64,
    #[serde(rename = "Enchg_grid_mode", deserialize_with = "lenient::string")]
    encharge_grid_mode: String,
    #[serde(rename = "Solar_grid_mode", deserialize_with = "lenient::string")]
    solar_grid_mode: String,
}

/// `/ivp/ensemble/status`: overlay onto devices by serial number
pub fn apply_ensemble_status(
    payload: &Value,
    ensemble: &mut Ensemble,
    feature: &mut EnsembleFeature,
) -> EnvoyResult<()> {
    let wire: WireStatus = parse(payload)?;

    for (serial, status) in &wire.inventory.serial_nums {
        let overlay = |device: &mut EnsembleDevice| {
            device.operating = Some(status.operating);
            device.msg_retries = Some(status.msg_retries);
            device.device_type = Some(status.device_type);
        };
        if let Some(encharge) = ensemble.encharge_mut(serial) {
            overlay(&mut encharge.device);
            encharge.comm_level_sub_ghz = level_percent(status.comm_level_sub_ghz);
            encharge.comm_level_2_4_ghz = level_percent(status.comm_level_2_4_ghz);
        } else if let Some(enpower) = ensemble.enpower_mut(serial) {
            overlay(&mut enpower.device);
            enpower.comm_level_sub_ghz = level_percent(status.comm_level_sub_ghz);
            enpower.comm_level_2_4_ghz = level_percent(status.comm_level_2_4_ghz);
        }
    }

    ensemble.counters = wire
        .counters
        .iter()
        .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
        .collect();

    ensemble.secctrl = wire.secctrl.map(|s| SecCtrl {
        shutdown: s.shutdown,
        freq_bias_hz: s.freq_bias_hz,
        voltage_bias_v: s.voltage_bias_v,
        configured_backup_soc: s.configured_backup_soc,
        adjusted_backup_soc: s.adjusted_backup_soc,
        agg_soc: s.agg_soc,
        max_energy: s.max_energy,
        enc_agg_soc: s.enc_agg_soc,
        enc_agg_soh: s.enc_agg_soh,
        enc_agg_backup_energy: s.enc_agg_backup_energy,
        enc_agg_avail_energy: s.enc_agg_avail_energy,
        enc_commissioned_capacity: s.enc_commissioned_capacity,
        enc_max_available_capacity: s.enc_max_available_capacity,
        acb_agg_soc: s.acb_agg_soc,
        acb_agg_energy: s.acb_agg_energy,
        vls_limit: s.vls_limit,
    });

    ensemble.relay = wire.relay.map(|r| Relay {
        mains_admin_state: r.mains_admin_state,
        mains_oper_state: r.mains_oper_state,
        der1_state: r.der1_state,
        der2_state: r.der2_state,
        der3_state: r.der3_state,
        encharge_grid_mode: r.encharge_grid_mode,
        solar_grid_mode: r.solar_grid_mode,
    });

    feature
        .status
        .mark(true, wire.inventory.serial_nums.len() as u32);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireEncSettingsEnvelope {
    enc_settings: Option<WireEncSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireEncSettings {
    #[serde(deserialize_with = "lenient::bool")]
    enable: bool,
    #[serde(deserialize_with = "lenient::string")]
    country: String,
    #[serde(deserialize_with = "lenient::f64")]
    current_limit: f64,
    #[serde(deserialize_with = "lenient::bool")]
    per_phase: bool,
}

/// `/ivp/ss/enc_settings`
pub fn apply_encharge_settings(
    payload: &Value,
    ensemble: &mut Ensemble,
    feature: &mut EnsembleFeature,
) -> EnvoyResult<()> {
    let wire: WireEncSettingsEnvelope = parse(payload)?;
    let present = wire.enc_settings.is_some();
    ensemble.encharge_settings = wire.enc_settings.map(|s| EnchargeSettings {
        enable: s.enable,
        country: s.country,
        current_limit: s.current_limit,
        per_phase: s.per_phase,
    });
    feature.encharge_settings.mark(true, u32::from(present));
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDryContacts {
    dry_contacts: Vec<WireDryContact>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDryContact {
    #[serde(deserialize_with = "lenient::string")]
    id: String,
    #[serde(deserialize_with = "lenient::string")]
    status: String,
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    kind: String,
    #[serde(deserialize_with = "lenient::string")]
    grid_action: String,
    #[serde(deserialize_with = "lenient::string")]
    micro_grid_action: String,
    #[serde(deserialize_with = "lenient::string")]
    gen_action: String,
    #[serde(rename = "override", deserialize_with = "lenient::bool")]
    manual_override: bool,
    #[serde(deserialize_with = "lenient::string")]
    load_name: String,
    #[serde(deserialize_with = "lenient::string")]
    mode: String,
    #[serde(deserialize_with = "lenient::f64")]
    soc_low: f64,
    #[serde(deserialize_with = "lenient::f64")]
    soc_high: f64,
    #[serde(deserialize_with = "lenient::f64")]
    priority: f64,
    #[serde(rename = "black_s_start", deserialize_with = "lenient::f64")]
    black_start: f64,
}

/// `/ivp/ensemble/dry_contacts`: contact list and live state
pub fn apply_dry_contacts(
    payload: &Value,
    ensemble: &mut Ensemble,
    feature: &mut EnsembleFeature,
) -> EnvoyResult<()> {
    let wire: WireDryContacts = parse(payload)?;
    let contacts: Vec<DryContact> = wire
        .dry_contacts
        .into_iter()
        .map(|c| {
            let mut contact = ensemble
                .dry_contacts
                .iter()
                .find(|d| d.id == c.id)
                .cloned()
                .unwrap_or_default();
            contact.state = c.status == "closed";
            contact.status = c.status;
            contact.kind = c.kind;
            contact.id = c.id;
            contact
        })
        .collect();
    feature.dry_contacts.mark(true, contacts.len() as u32);
    ensemble.dry_contacts = contacts;
    Ok(())
}

/// `/ivp/ss/dry_contact_settings`: configuration joined by contact id
pub fn apply_dry_contacts_settings(
    payload: &Value,
    ensemble: &mut Ensemble,
    feature: &mut EnsembleFeature,
) -> EnvoyResult<()> {
    let wire: WireDryContacts = parse(payload)?;
    let mut joined = 0;
    for s in wire.dry_contacts {
        if let Some(contact) = ensemble.dry_contact_mut(&s.id) {
            contact.grid_action = s.grid_action;
            contact.micro_grid_action = s.micro_grid_action;
            contact.gen_action = s.gen_action;
            contact.manual_override = s.manual_override;
            contact.load_name = s.load_name;
            contact.mode = s.mode;
            contact.soc_low = s.soc_low;
            contact.soc_high = s.soc_high;
            contact.priority = s.priority;
            contact.black_start = s.black_start;
            joined += 1;
        }
    }
    feature.dry_contacts_settings.mark(true, joined);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireGenerator {
    #[serde(deserialize_with = "lenient::string")]
    admin_mode: String,
    #[serde(deserialize_with = "lenient::string")]
    admin_state: String,
    #[serde(deserialize_with = "lenient::string")]
    oper_state: String,
    #[serde(deserialize_with = "lenient::bool")]
    present: bool,
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    kind: String,
    #[serde(deserialize_with = "lenient::f64")]
    start_soc: f64,
    #[serde(deserialize_with = "lenient::f64")]
    stop_soc: f64,
    #[serde(deserialize_with = "lenient::bool")]
    exercise_on: bool,
    #[serde(deserialize_with = "lenient::bool")]
    schedule: bool,
}

/// `/ivp/ss/generator`
pub fn apply_generator(
    payload: &Value,
    ensemble: &mut Ensemble,
    feature: &mut EnsembleFeature,
) -> EnvoyResult<()> {
    let wire: WireGenerator = parse(payload)?;
    let settings = ensemble.generator.take().and_then(|g| g.settings);
    feature.generator.mark(true, u32::from(wire.present));
    ensemble.generator = Some(Generator {
        admin_mode: wire.admin_mode,
        admin_state: wire.admin_state,
        oper_state: wire.oper_state,
        present: wire.present,
        kind: wire.kind,
        start_soc: wire.start_soc,
        stop_soc: wire.stop_soc,
        exercise_on: wire.exercise_on,
        schedule: wire.schedule,
        settings,
    });
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireGeneratorConfig {
    generator_settings: Option<WireGeneratorSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireGeneratorSettings {
    #[serde(rename = "max_cont_current", deserialize_with = "lenient::f64")]
    max_continuous_current: f64,
    #[serde(rename = "min_cont_current", deserialize_with = "lenient::f64")]
    min_continuous_current: f64,
    #[serde(deserialize_with = "lenient::f64")]
    rated_power: f64,
    #[serde(deserialize_with = "lenient::u32")]
    phase_count: u32,
    #[serde(deserialize_with = "lenient::bool")]
    auto_start: bool,
    #[serde(deserialize_with = "lenient::f64")]
    start_soc: f64,
    #[serde(deserialize_with = "lenient::f64")]
    stop_soc: f64,
}

/// `/ivp/ss/gen_config`; needs the generator itself to be known first
pub fn apply_generator_settings(
    payload: &Value,
    ensemble: &mut Ensemble,
    feature: &mut EnsembleFeature,
) -> EnvoyResult<()> {
    let wire: WireGeneratorConfig = parse(payload)?;
    let present = wire.generator_settings.is_some();
    if let Some(generator) = ensemble.generator.as_mut() {
        generator.settings = wire.generator_settings.map(|s| GeneratorSettings {
            max_continuous_current: s.max_continuous_current,
            min_continuous_current: s.min_continuous_current,
            rated_power: s.rated_power,
            phase_count: s.phase_count,
            auto_start: s.auto_start,
            start_soc: s.start_soc,
            stop_soc: s.stop_soc,
        });
    }
    feature.generator_settings.mark(true, u32::from(present));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inventory_payload() -> Value {
        json!([
            {"type": "ENPOWER", "devices": [{
                "part_num": "860-00276-r28", "serial_num": "EP1", "installed": 1690000000, "device_status": ["envoy.global.ok"],
                "last_rpt_date": 1700000000, "admin_state": 24, "admin_state_str": "ENS_DEV_STATE_OPERATIONAL",
                "img_pnum_running": "1.2.2064_release/20.34", "communicating": true, "temperature": 79,
                "comm_level_sub_ghz": 5, "comm_level_2_4_ghz": 5, "mains_admin_state": "closed", "mains_oper_state": "closed",
                "Enpwr_grid_mode": "multimode-ongrid", "Enchg_grid_mode": "multimode-ongrid", "Enpwr_relay_state_bm": 482, "Enpwr_curr_state_id": 16
            }]},
            {"type": "ENCHARGE", "devices": [{
                "part_num": "830-01760-r37", "serial_num": "EC1", "installed": 1690000000, "device_status": ["envoy.global.ok"],
                "last_rpt_date": 1700000000, "admin_state": 6, "communicating": true, "sleep_enabled": false,
                "percentFull": 91, "temperature": 29, "maxCellTemp": 30, "comm_level_sub_ghz": 4, "comm_level_2_4_ghz": 5,
                "led_status": 17, "dc_switch_off": false, "encharge_rev": 2, "encharge_capacity": 3500, "phase": "ph-a", "der_index": 1
            }]}
        ])
    }

    #[test]
    fn test_inventory_then_status_join_by_serial() {
        let mut ensemble = Ensemble::default();
        let mut feature = EnsembleFeature::default();
        apply_ensemble_inventory(&inventory_payload(), &mut ensemble, &mut feature).unwrap();

        assert_eq!(ensemble.encharges.len(), 1);
        assert_eq!(ensemble.encharges[0].percent_full, 91);
        assert_eq!(ensemble.encharges[0].comm_level_sub_ghz, 80);
        assert!(ensemble.enpowers[0].grid_connected());
        assert!(feature.encharges.installed);
        assert!(feature.enpowers.installed);
        assert!(!feature.collars.supported);
        assert!(feature.installed());

        let status = json!({
            "inventory": {"serial_nums": {
                "EC1": {"device_type": 13, "comm_level_sub_ghz": 3, "comm_level_2_4_ghz": 2, "msg_retries": 1, "operating": true},
                "UNKNOWN": {"device_type": 13, "operating": false}
            }},
            "counters": {"api_ecmdStatus": 12, "name": "not a number"},
            "secctrl": {"shutdown": false, "agg_soc": 88, "Max_energy": 7000, "ENC_agg_soc": 90, "VLS_Limit": 5},
            "relay": {"mains_admin_state": "closed", "mains_oper_state": "closed", "der1_state": 1, "Enchg_grid_mode": "multimode-ongrid", "Solar_grid_mode": "multimode-ongrid"}
        });
        apply_ensemble_status(&status, &mut ensemble, &mut feature).unwrap();

        let encharge = &ensemble.encharges[0];
        assert_eq!(encharge.device.operating, Some(true));
        assert_eq!(encharge.device.msg_retries, Some(1));
        assert_eq!(encharge.comm_level_sub_ghz, 60);
        assert!(ensemble.enpowers[0].device.operating.is_none());
        assert_eq!(ensemble.counters.len(), 1);
        assert!((ensemble.secctrl.as_ref().unwrap().max_energy - 7000.0).abs() < f64::EPSILON);
        assert_eq!(ensemble.relay.as_ref().unwrap().solar_grid_mode, "multimode-ongrid");

        // a fresh inventory poll keeps the status overlay
        apply_ensemble_inventory(&inventory_payload(), &mut ensemble, &mut feature).unwrap();
        assert_eq!(ensemble.encharges[0].device.operating, Some(true));
    }

    #[test]
    fn test_dry_contacts_and_settings() {
        let mut ensemble = Ensemble::default();
        let mut feature = EnsembleFeature::default();
        let contacts = json!({"dry_contacts": [{"id": "NC1", "status": "closed", "type": "NONE"}, {"id": "NO1", "status": "open", "type": "LOAD"}]});
        apply_dry_contacts(&contacts, &mut ensemble, &mut feature).unwrap();
        let settings = json!({"dry_contacts": [{"id": "NO1", "type": "LOAD", "grid_action": "shed", "override": "true", "load_name": "Pool", "mode": "manual", "soc_low": 25, "soc_high": 30}]});
        apply_dry_contacts_settings(&settings, &mut ensemble, &mut feature).unwrap();

        assert!(ensemble.dry_contacts[0].state);
        assert!(!ensemble.dry_contacts[1].state);
        assert_eq!(ensemble.dry_contacts[1].load_name, "Pool");
        assert!(ensemble.dry_contacts[1].manual_override);
        assert_eq!(feature.dry_contacts.count, 2);
        assert_eq!(feature.dry_contacts_settings.count, 1);

        // state refresh keeps settings
        let contacts = json!({"dry_contacts": [{"id": "NO1", "status": "closed", "type": "LOAD"}]});
        apply_dry_contacts(&contacts, &mut ensemble, &mut feature).unwrap();
        assert!(ensemble.dry_contacts[0].state);
        assert_eq!(ensemble.dry_contacts[0].load_name, "Pool");
    }

    #[test]
    fn test_generator_and_settings() {
        let mut ensemble = Ensemble::default();
        let mut feature = EnsembleFeature::default();
        apply_generator(
            &json!({"admin_mode": "auto", "admin_state": "on", "oper_state": "off", "present": true, "type": "two-wire", "start_soc": 20, "stop_soc": 80}),
            &mut ensemble,
            &mut feature,
        )
        .unwrap();
        apply_generator_settings(
            &json!({"generator_settings": {"max_cont_current": 40, "rated_power": 9000, "phase_count": 1, "auto_start": true}}),
            &mut ensemble,
            &mut feature,
        )
        .unwrap();

        let generator = ensemble.generator.as_ref().unwrap();
        assert!(generator.mode_on());
        assert!((generator.settings.as_ref().unwrap().rated_power - 9000.0).abs() < f64::EPSILON);
        assert!(feature.generator.installed);
        assert!(feature.generator_settings.installed);
    }

    #[test]
    fn test_encharge_settings() {
        let mut ensemble = Ensemble::default();
        let mut feature = EnsembleFeature::default();
        apply_encharge_settings(
            &json!({"enc_settings": {"enable": true, "country": "CZ", "current_limit": 32.0, "per_phase": false}}),
            &mut ensemble,
            &mut feature,
        )
        .unwrap();
        assert_eq!(ensemble.encharge_settings.as_ref().unwrap().country, "CZ");
        assert!(feature.encharge_settings.installed);
    }
}
