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

//! `/ivp/livedata/status`. Power values arrive in milliwatts.

use envion_types::{Capability, LiveData, LiveDataConnection, LiveDataMeters, LivePower};
use serde::Deserialize;
use serde_json::Value;

use super::{lenient, parse};
use crate::error::EnvoyResult;

const MILLI: f64 = 1000.0;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireLiveData {
    connection: WireConnection,
    meters: WireMeters,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireConnection {
    #[serde(deserialize_with = "lenient::string")]
    mqtt_state: String,
    #[serde(deserialize_with = "lenient::string")]
    prov_state: String,
    #[serde(deserialize_with = "lenient::string")]
    auth_state: String,
    #[serde(deserialize_with = "lenient::string")]
    sc_stream: String,
    #[serde(deserialize_with = "lenient::string")]
    sc_debug: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireMeters {
    #[serde(deserialize_with = "lenient::i64")]
    last_update: i64,
    #[serde(deserialize_with = "lenient::f64")]
    soc: f64,
    #[serde(deserialize_with = "lenient::i64")]
    main_relay_state: i64,
    #[serde(deserialize_with = "lenient::i64")]
    gen_relay_state: i64,
    #[serde(deserialize_with = "lenient::i64")]
    backup_bat_mode: i64,
    #[serde(deserialize_with = "lenient::f64")]
    backup_soc: f64,
    #[serde(deserialize_with = "lenient::bool")]
    is_split_phase: bool,
    #[serde(deserialize_with = "lenient::u32")]
    phase_count: u32,
    #[serde(deserialize_with = "lenient::f64")]
    enc_agg_soc: f64,
    #[serde(deserialize_with = "lenient::f64")]
    enc_agg_energy: f64,
    #[serde(deserialize_with = "lenient::f64")]
    acb_agg_soc: f64,
    #[serde(deserialize_with = "lenient::f64")]
    acb_agg_energy: f64,
    pv: Option<WirePower>,
    storage: Option<WirePower>,
    grid: Option<WirePower>,
    load: Option<WirePower>,
    generator: Option<WirePower>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePower {
    #[serde(deserialize_with = "lenient::f64")]
    agg_p_mw: f64,
    #[serde(deserialize_with = "lenient::f64")]
    agg_s_mva: f64,
    #[serde(deserialize_with = "lenient::f64")]
    agg_p_ph_a_mw: f64,
    #[serde(deserialize_with = "lenient::f64")]
    agg_p_ph_b_mw: f64,
    #[serde(deserialize_with = "lenient::f64")]
    agg_p_ph_c_mw: f64,
    #[serde(deserialize_with = "lenient::f64")]
    agg_s_ph_a_mva: f64,
    #[serde(deserialize_with = "lenient::f64")]
    agg_s_ph_b_mva: f64,
    #[serde(deserialize_with = "lenient::f64")]
    agg_s_ph_c_mva: f64,
}

impl From<WirePower> for LivePower {
    fn from(w: WirePower) -> Self {
        Self {
            power: w.agg_p_mw / MILLI,
            power_l1: w.agg_p_ph_a_mw / MILLI,
            power_l2: w.agg_p_ph_b_mw / MILLI,
            power_l3: w.agg_p_ph_c_mw / MILLI,
            apparent_power: w.agg_s_mva / MILLI,
            apparent_power_l1: w.agg_s_ph_a_mva / MILLI,
            apparent_power_l2: w.agg_s_ph_b_mva / MILLI,
            apparent_power_l3: w.agg_s_ph_c_mva / MILLI,
        }
    }
}

/// Normalize live data into `live`.
///
/// Returns true when the gateway reports the stream as disabled and the
/// caller should ask for it to be enabled.
pub fn apply_live_data(
    payload: &Value,
    live: &mut LiveData,
    feature: &mut Capability,
) -> EnvoyResult<bool> {
    let wire: WireLiveData = parse(payload)?;
    let stream_disabled = wire.connection.sc_stream == "disabled";
    let m = wire.meters;

    *live = LiveData {
        connection: LiveDataConnection {
            mqtt_state: wire.connection.mqtt_state,
            prov_state: wire.connection.prov_state,
            auth_state: wire.connection.auth_state,
            sc_stream: wire.connection.sc_stream == "enabled",
            sc_debug: wire.connection.sc_debug == "enabled",
        },
        meters: LiveDataMeters {
            last_update: m.last_update,
            soc: m.soc,
            main_relay_state: m.main_relay_state,
            gen_relay_state: m.gen_relay_state,
            backup_bat_mode: m.backup_bat_mode,
            backup_soc: m.backup_soc,
            is_split_phase: m.is_split_phase,
            phase_count: m.phase_count,
            enc_agg_soc: m.enc_agg_soc,
            enc_agg_energy: m.enc_agg_energy,
            acb_agg_soc: m.acb_agg_soc,
            acb_agg_energy: m.acb_agg_energy,
        },
        pv: m.pv.map(LivePower::from),
        storage: m.storage.map(LivePower::from),
        grid: m.grid.map(LivePower::from),
        load: m.load.map(LivePower::from),
        generator: m.generator.map(LivePower::from),
    };

    let channels = [&live.pv, &live.storage, &live.grid, &live.load, &live.generator]
        .iter()
        .filter(|c| c.is_some())
        .count() as u32;
    feature.mark(true, channels);
    Ok(stream_disabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_milliwatts_to_watts_and_stream_flag() {
        let payload = json!({
            "connection": {"mqtt_state": "connected", "prov_state": "configured", "auth_state": "ok", "sc_stream": "disabled", "sc_debug": "disabled"},
            "meters": {
                "last_update": 1700000000, "soc": 48, "main_relay_state": 1, "phase_count": 3, "is_split_phase": 0,
                "pv": {"agg_p_mw": 3614000, "agg_s_mva": 3700000, "agg_p_ph_a_mw": 1204000},
                "grid": {"agg_p_mw": -1500, "agg_s_mva": 0}
            }
        });
        let mut live = LiveData::default();
        let mut feature = Capability::default();
        let enable = apply_live_data(&payload, &mut live, &mut feature).unwrap();

        assert!(enable);
        assert!(!live.connection.sc_stream);
        let pv = live.pv.as_ref().unwrap();
        assert!((pv.power - 3614.0).abs() < 1e-9);
        assert!((pv.power_l1 - 1204.0).abs() < 1e-9);
        assert!((live.grid.as_ref().unwrap().power + 1.5).abs() < 1e-9);
        assert!(live.storage.is_none());
        assert_eq!(live.meters.phase_count, 3);
        assert_eq!(feature.count, 2);
        assert!(feature.installed);
    }

    #[test]
    fn test_enabled_stream_needs_nothing() {
        let payload = json!({"connection": {"sc_stream": "enabled"}, "meters": {}});
        let mut live = LiveData::default();
        let mut feature = Capability::default();
        assert!(!apply_live_data(&payload, &mut live, &mut feature).unwrap());
        assert!(live.connection.sc_stream);
        assert!(feature.supported);
        assert!(!feature.installed);
    }
}
