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

//! `/ivp/pdm/device_data`: per-device channel readings.
//!
//! PCUs and Q-relays join onto inventory by serial number. Meter entries carry
//! no serial, so the n-th meter entry maps onto the n-th device meter, and only
//! while the meter endpoints themselves report nothing.

use envion_types::{Capability, DeviceChannelData, Inventory, MeterDescriptor, MetersFeature};
use serde::Deserialize;
use serde_json::Value;

use super::{lenient, parse};
use crate::error::{EnvoyError, EnvoyResult};

const JOULES_PER_WH: f64 = 3600.0;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireDevice {
    #[serde(deserialize_with = "lenient::string")]
    dev_name: String,
    #[serde(deserialize_with = "lenient::string")]
    sn: String,
    #[serde(deserialize_with = "lenient::bool")]
    active: bool,
    channels: Vec<WireChannel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireChannel {
    chan_eid: u64,
    lifetime: WireLifetime,
    last_reading: WireLastReading,
    watts: WireWatts,
    watt_hours: WireWattHours,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireLifetime {
    #[serde(deserialize_with = "lenient::f64")]
    joules_produced: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireLastReading {
    #[serde(rename = "endDate", deserialize_with = "lenient::i64")]
    end_date: i64,
    #[serde(rename = "acVoltageINmV", deserialize_with = "lenient::f64")]
    ac_voltage_mv: f64,
    #[serde(rename = "acFrequencyINmHz", deserialize_with = "lenient::f64")]
    ac_frequency_mhz: f64,
    #[serde(rename = "dcVoltageINmV", deserialize_with = "lenient::f64")]
    dc_voltage_mv: f64,
    #[serde(rename = "dcCurrentINmA", deserialize_with = "lenient::f64")]
    dc_current_ma: f64,
    #[serde(rename = "channelTemp", deserialize_with = "lenient::f64")]
    channel_temp: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireWatts {
    #[serde(deserialize_with = "lenient::f64")]
    now: f64,
    #[serde(deserialize_with = "lenient::f64")]
    now_used: f64,
    #[serde(deserialize_with = "lenient::f64")]
    max: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireWattHours {
    #[serde(deserialize_with = "lenient::f64")]
    today: f64,
    #[serde(deserialize_with = "lenient::f64")]
    yesterday: f64,
    #[serde(deserialize_with = "lenient::f64")]
    week: f64,
}

fn channel_data(active: bool, c: &WireChannel) -> DeviceChannelData {
    let r = &c.last_reading;
    DeviceChannelData {
        active,
        power: c.watts.now,
        power_used: c.watts.now_used,
        power_max: c.watts.max,
        energy_today: c.watt_hours.today,
        energy_yesterday: c.watt_hours.yesterday,
        energy_last_seven_days: c.watt_hours.week,
        energy_lifetime: c.lifetime.joules_produced / JOULES_PER_WH,
        ac_voltage: r.ac_voltage_mv / 1000.0,
        ac_frequency: r.ac_frequency_mhz / 1000.0,
        dc_voltage: r.dc_voltage_mv / 1000.0,
        dc_current: r.dc_current_ma / 1000.0,
        temperature: r.channel_temp,
        reading_time: r.end_date,
    }
}

/// Apply `/ivp/pdm/device_data`.
///
/// `meters_feature` decides whether the meter entries are used at all.
pub fn apply_detailed_devices(
    payload: &Value,
    inventory: &mut Inventory,
    meters: &mut [MeterDescriptor],
    meters_feature: &MetersFeature,
    feature: &mut Capability,
) -> EnvoyResult<()> {
    let Some(object) = payload.as_object() else {
        return Err(EnvoyError::InvalidResponse(
            "device data is not an object".to_owned(),
        ));
    };

    // numeric keys are device ids; deviceCount and friends are metadata
    let mut ids: Vec<(u64, &Value)> = object
        .iter()
        .filter_map(|(k, v)| k.parse::<u64>().ok().map(|id| (id, v)))
        .collect();
    ids.sort_by_key(|(id, _)| *id);

    let meters_report = meters_feature.readings.supported || meters_feature.reports.supported;
    let mut joined = 0;
    let mut meter_index = 0;

    for (_, raw) in ids {
        let device: WireDevice = parse(raw)?;
        let Some(channel) = device.channels.first() else {
            continue;
        };
        let data = channel_data(device.active, channel);

        match device.dev_name.as_str() {
            "pcu" => {
                if let Some(pcu) = inventory.pcu_mut(&device.sn) {
                    pcu.detailed = Some(data);
                    joined += 1;
                }
            }
            "nsrb" => {
                if let Some(nsrb) = inventory.nsrb_mut(&device.sn) {
                    nsrb.detailed = Some(data);
                    joined += 1;
                }
            }
            "eim" => {
                let index = meter_index;
                meter_index += 1;
                if meters_report {
                    continue;
                }
                if let Some(meter) = meters.iter_mut().filter(|m| !m.is_derived()).nth(index) {
                    meter.reading_time = data.reading_time;
                    meter.power = data.power;
                    meter.energy_lifetime = data.energy_lifetime;
                    meter.voltage = meter.phase_voltage(data.ac_voltage);
                    meter.frequency = data.ac_frequency;
                    joined += 1;
                }
            }
            _ => {}
        }
    }

    feature.mark(true, joined);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use envion_types::{MeasurementType, Microinverter, PhaseMode, QRelay};
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "2": {"devName": "nsrb", "sn": "Q1", "active": true, "channels": [
                {"chanEid": 2, "watts": {"now": 0}, "lastReading": {"acVoltageINmV": 231000, "acFrequencyINmHz": 50010, "endDate": 1700000000}}
            ]},
            "1": {"devName": "pcu", "sn": "P1", "active": true, "channels": [
                {"chanEid": 1, "lifetime": {"joulesProduced": 36000000}, "watts": {"now": 212, "nowUsed": 212, "max": 295},
                 "wattHours": {"today": 1200, "yesterday": 1500, "week": 9000},
                 "lastReading": {"acVoltageINmV": 233400, "acFrequencyINmHz": 50000, "dcVoltageINmV": 36100, "dcCurrentINmA": 5900, "channelTemp": 41, "endDate": 1700000000}}
            ]},
            "3": {"devName": "eim", "sn": "", "active": true, "channels": [
                {"chanEid": 704643328, "watts": {"now": 1500}, "lifetime": {"joulesProduced": 7200}, "lastReading": {"acVoltageINmV": 690000}}
            ]},
            "deviceCount": 3,
            "deviceDataLimit": 50
        })
    }

    fn inventory() -> Inventory {
        Inventory {
            pcus: vec![Microinverter {
                serial_number: "P1".to_owned(),
                ..Default::default()
            }],
            nsrbs: vec![QRelay {
                serial_number: "Q1".to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_join_by_serial_and_units() {
        let mut inventory = inventory();
        let mut meters = Vec::new();
        let mut feature = Capability::default();
        apply_detailed_devices(
            &payload(),
            &mut inventory,
            &mut meters,
            &MetersFeature::default(),
            &mut feature,
        )
        .unwrap();

        let pcu = inventory.pcus[0].detailed.as_ref().unwrap();
        assert!((pcu.power - 212.0).abs() < f64::EPSILON);
        assert!((pcu.energy_lifetime - 10000.0).abs() < 1e-9);
        assert!((pcu.ac_voltage - 233.4).abs() < 1e-9);
        assert!((pcu.dc_current - 5.9).abs() < 1e-9);
        let nsrb = inventory.nsrbs[0].detailed.as_ref().unwrap();
        assert!((nsrb.ac_frequency - 50.01).abs() < 1e-9);
        assert_eq!(feature.count, 2);
    }

    #[test]
    fn test_meter_entries_positional_fallback() {
        let mut inventory = inventory();
        let mut meters = vec![MeterDescriptor::new(
            704643328,
            MeasurementType::Production,
            PhaseMode::Three,
        )];
        let mut feature = Capability::default();
        apply_detailed_devices(
            &payload(),
            &mut inventory,
            &mut meters,
            &MetersFeature::default(),
            &mut feature,
        )
        .unwrap();
        assert!((meters[0].power - 1500.0).abs() < f64::EPSILON);
        assert!((meters[0].voltage - 230.0).abs() < 1e-9);
        assert!((meters[0].energy_lifetime - 2.0).abs() < 1e-9);

        // meter endpoints present: device data leaves meters alone
        let mut meters_feature = MetersFeature::default();
        meters_feature.readings.mark(true, 1);
        meters[0].power = 1.0;
        apply_detailed_devices(
            &payload(),
            &mut inventory,
            &mut meters,
            &meters_feature,
            &mut feature,
        )
        .unwrap();
        assert!((meters[0].power - 1.0).abs() < f64::EPSILON);
    }
}
