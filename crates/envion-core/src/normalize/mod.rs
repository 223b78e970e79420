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

//! One normalizer per gateway endpoint.
//!
//! Every `apply_*` function is pure: it takes the already fetched payload and a
//! mutable borrow of just the state subtree and feature flags it owns. Fetching,
//! sink fan-out and error routing live in the orchestrator.

pub mod detailed_devices;
pub mod ensemble;
pub mod grid;
pub mod home;
pub mod info;
pub mod inventory;
pub mod live_data;
pub mod meters;
pub mod pcu_status;
pub mod production;
pub mod tariff;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{EnvoyError, EnvoyResult};

/// Deserialize a borrowed payload into a wire struct
pub(crate) fn parse<T: DeserializeOwned>(payload: &Value) -> EnvoyResult<T> {
    T::deserialize(payload).map_err(EnvoyError::Json)
}

/// Gateway firmware mixes numbers and numeric strings for the same fields.
/// These accept both, plus `null`, falling back to zero.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    pub fn f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(number(&Value::deserialize(d)?).unwrap_or(0.0))
    }

    pub fn i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Ok(number(&Value::deserialize(d)?).unwrap_or(0.0) as i64)
    }

    pub fn u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(number(&Value::deserialize(d)?).unwrap_or(0.0).max(0.0) as u32)
    }

    /// `true`, `"true"`, `1` or `"enabled"`
    pub fn bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            Value::String(s) => matches!(s.as_str(), "true" | "1" | "enabled" | "yes"),
            _ => false,
        })
    }

    /// String or number rendered as a string
    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }
}

/// Device-reported 0-5 level as percent
pub(crate) fn level_percent(level: u32) -> u32 {
    level.min(5) * crate::constants::LEVEL_TO_PERCENT
}

/// Vendor device-family groups (`[{ "type": "PCU", "devices": [...] }]`)
#[derive(Debug, Deserialize)]
pub(crate) struct DeviceGroup<T> {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default = "Vec::new")]
    pub devices: Vec<T>,
}

/// Devices of the group whose declared type is `kind`; `None` when absent
pub(crate) fn group_devices<T: DeserializeOwned>(
    payload: &Value,
    kind: &str,
) -> EnvoyResult<Option<Vec<T>>> {
    let Some(groups) = payload.as_array() else {
        return Err(EnvoyError::InvalidResponse(
            "expected an array of device groups".to_owned(),
        ));
    };
    for group in groups {
        let declared = group.get("type").and_then(Value::as_str).unwrap_or_default();
        if declared.eq_ignore_ascii_case(kind) {
            let group: DeviceGroup<T> = parse(group)?;
            return Ok(Some(group.devices));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Loose {
        #[serde(deserialize_with = "lenient::i64", default)]
        a: i64,
        #[serde(deserialize_with = "lenient::f64", default)]
        b: f64,
        #[serde(deserialize_with = "lenient::bool", default)]
        c: bool,
        #[serde(deserialize_with = "lenient::string", default)]
        d: String,
    }

    #[test]
    fn test_lenient_numbers_and_strings() {
        let loose: Loose = parse(&json!({"a": "1588176794", "b": null, "c": "enabled", "d": 12})).unwrap();
        assert_eq!(loose.a, 1_588_176_794);
        assert!(loose.b.abs() < f64::EPSILON);
        assert!(loose.c);
        assert_eq!(loose.d, "12");

        let missing: Loose = parse(&json!({})).unwrap();
        assert_eq!(missing.a, 0);
        assert!(!missing.c);
    }

    #[test]
    fn test_group_lookup_by_type_not_position() {
        let payload = json!([
            {"type": "NSRB", "devices": [{"a": 3}]},
            {"type": "PCU", "devices": [{"a": 1}, {"a": 2}]}
        ]);
        let pcus: Vec<Loose> = group_devices(&payload, "PCU").unwrap().unwrap();
        assert_eq!(pcus.len(), 2);
        let esubs: Option<Vec<Loose>> = group_devices(&payload, "ESUB").unwrap();
        assert!(esubs.is_none());
        assert!(group_devices::<Loose>(&json!({}), "PCU").is_err());
    }

    #[test]
    fn test_level_percent() {
        assert_eq!(level_percent(0), 0);
        assert_eq!(level_percent(3), 60);
        assert_eq!(level_percent(9), 100);
    }
}
