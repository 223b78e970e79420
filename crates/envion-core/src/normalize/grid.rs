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

//! Installer endpoints: grid profile, PLC comm check and production state.
//! All three are optional and fail soft in the orchestrator.

use envion_types::{Capability, GridProfile, Inventory};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{lenient, level_percent, parse};
use crate::error::{EnvoyError, EnvoyResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireGridProfile {
    #[serde(deserialize_with = "lenient::string")]
    selected_profile: String,
    profiles: Vec<WireProfileEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireProfileEntry {
    #[serde(deserialize_with = "lenient::string")]
    id: String,
    #[serde(deserialize_with = "lenient::string")]
    name: String,
    #[serde(deserialize_with = "lenient::string")]
    version: String,
}

/// `/installer/agf/index.json`.
///
/// The selected profile is `name:version`. When the profile list carries an
/// entry for it, that entry's fields win.
pub fn apply_grid_profile(
    payload: &Value,
    profile: &mut GridProfile,
    feature: &mut Capability,
) -> EnvoyResult<()> {
    let wire: WireGridProfile = parse(payload)?;
    if wire.selected_profile.is_empty() {
        feature.mark(true, 0);
        *profile = GridProfile::default();
        return Ok(());
    }

    let (name, version) = match wire.selected_profile.rsplit_once(':') {
        Some((name, version)) => (name.to_owned(), version.to_owned()),
        None => (wire.selected_profile.clone(), String::new()),
    };
    let listed = wire
        .profiles
        .iter()
        .find(|p| p.id == wire.selected_profile || p.name == name);

    *profile = GridProfile {
        name: listed
            .map(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or(name),
        id: listed.map(|p| p.id.clone()).unwrap_or_default(),
        version: listed
            .map(|p| p.version.clone())
            .filter(|v| !v.is_empty())
            .unwrap_or(version),
        item_count: wire.profiles.len() as u32,
    };
    feature.mark(true, 1);
    Ok(())
}

/// `/installer/pcu_comm_check`: `{serial: level}` onto microinverters,
/// q-relays and AC batteries. Returns how many devices were matched.
pub fn apply_plc_level(
    payload: &Value,
    inventory: &mut Inventory,
    feature: &mut Capability,
) -> EnvoyResult<u32> {
    let levels: BTreeMap<String, Value> = parse(payload)?;
    let mut matched = 0;
    for (serial, raw) in &levels {
        let Some(level) = raw.as_f64() else {
            continue;
        };
        let level = Some(level_percent(level.max(0.0) as u32));
        if let Some(pcu) = inventory.pcu_mut(serial) {
            pcu.comm_level = level;
        } else if let Some(nsrb) = inventory.nsrb_mut(serial) {
            nsrb.comm_level = level;
        } else if let Some(acb) = inventory.acb_mut(serial) {
            acb.comm_level = level;
        } else {
            continue;
        }
        matched += 1;
    }
    feature.mark(true, matched);
    Ok(matched)
}

#[derive(Debug, Deserialize)]
struct WireProductionState {
    #[serde(rename = "powerForcedOff")]
    power_forced_off: Option<Value>,
}

/// `/ivp/mod/{devId}/mode/power`: true while production is allowed
pub fn apply_production_state(
    payload: &Value,
    state: &mut Option<bool>,
    feature: &mut Capability,
) -> EnvoyResult<()> {
    let wire: WireProductionState = parse(payload)?;
    let forced_off = match wire.power_forced_off {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => return Err(EnvoyError::MissingField("powerForcedOff")),
    };
    *state = Some(!forced_off);
    feature.mark(true, 1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use envion_types::{AcBattery, Microinverter};
    use serde_json::json;

    #[test]
    fn test_grid_profile_from_list() {
        let payload = json!({
            "selected_profile": "EN 50549-1:2019 CZ:1.2.3",
            "profiles": [
                {"id": "EN 50549-1:2019 CZ:1.2.3", "name": "EN 50549-1:2019 CZ", "version": "1.2.3"},
                {"id": "IEEE 1547:2018:1.0.0", "name": "IEEE 1547:2018", "version": "1.0.0"}
            ]
        });
        let mut profile = GridProfile::default();
        let mut feature = Capability::default();
        apply_grid_profile(&payload, &mut profile, &mut feature).unwrap();
        assert_eq!(profile.name, "EN 50549-1:2019 CZ");
        assert_eq!(profile.version, "1.2.3");
        assert_eq!(profile.item_count, 2);
        assert!(feature.installed);
    }

    #[test]
    fn test_grid_profile_split_when_unlisted() {
        let mut profile = GridProfile::default();
        let mut feature = Capability::default();
        apply_grid_profile(
            &json!({"selected_profile": "Custom:2.0"}),
            &mut profile,
            &mut feature,
        )
        .unwrap();
        assert_eq!(profile.name, "Custom");
        assert_eq!(profile.version, "2.0");
        assert!(profile.id.is_empty());
    }

    #[test]
    fn test_plc_level_by_serial() {
        let mut inventory = Inventory {
            pcus: vec![Microinverter {
                serial_number: "121".to_owned(),
                ..Default::default()
            }],
            acbs: vec![AcBattery {
                serial_number: "A1".to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut feature = Capability::default();
        let matched = apply_plc_level(
            &json!({"121": 4, "A1": 2, "999": 5, "bad": "x"}),
            &mut inventory,
            &mut feature,
        )
        .unwrap();
        assert_eq!(matched, 2);
        assert_eq!(inventory.pcus[0].comm_level, Some(80));
        assert_eq!(inventory.acbs[0].comm_level, Some(40));
        assert_eq!(feature.count, 2);
    }

    #[test]
    fn test_production_state() {
        let mut state = None;
        let mut feature = Capability::default();
        apply_production_state(&json!({"powerForcedOff": false}), &mut state, &mut feature).unwrap();
        assert_eq!(state, Some(true));
        apply_production_state(&json!({"powerForcedOff": 1}), &mut state, &mut feature).unwrap();
        assert_eq!(state, Some(false));
        assert!(apply_production_state(&json!({}), &mut state, &mut feature).is_err());
    }
}
