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

//! `/api/v1/production/inverters`: last reported watts per microinverter

use envion_types::{Capability, Inventory};
use serde::Deserialize;
use serde_json::Value;

use super::{lenient, parse};
use crate::error::EnvoyResult;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WirePcuStatus {
    #[serde(deserialize_with = "lenient::string")]
    serial_number: String,
    #[serde(deserialize_with = "lenient::i64")]
    last_report_date: i64,
    #[serde(deserialize_with = "lenient::f64")]
    last_report_watts: f64,
    #[serde(deserialize_with = "lenient::f64")]
    max_report_watts: f64,
}

/// Join status entries onto inventory PCUs by serial number.
///
/// Entries for unknown serials are ignored; the count is the number joined.
pub fn apply_pcu_status(
    payload: &Value,
    inventory: &mut Inventory,
    feature: &mut Capability,
) -> EnvoyResult<()> {
    let statuses: Vec<WirePcuStatus> = parse(payload)?;

    let mut joined = 0;
    for status in statuses {
        if let Some(pcu) = inventory.pcu_mut(&status.serial_number) {
            pcu.last_report_date = status.last_report_date;
            pcu.last_report_watts = status.last_report_watts;
            pcu.max_report_watts = status.max_report_watts;
            joined += 1;
        }
    }
    feature.mark(true, joined);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use envion_types::Microinverter;
    use serde_json::json;

    #[test]
    fn test_join_by_serial() {
        let mut inventory = Inventory {
            pcus: vec![
                Microinverter {
                    serial_number: "A".to_owned(),
                    ..Default::default()
                },
                Microinverter {
                    serial_number: "B".to_owned(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let payload = json!([
            {"serialNumber": "B", "lastReportDate": 1700000000, "devType": 1, "lastReportWatts": 210, "maxReportWatts": 295},
            {"serialNumber": "Z", "lastReportDate": 1700000000, "devType": 1, "lastReportWatts": 1, "maxReportWatts": 1}
        ]);
        let mut feature = Capability::default();
        apply_pcu_status(&payload, &mut inventory, &mut feature).unwrap();

        assert!(inventory.pcus[0].last_report_watts.abs() < f64::EPSILON);
        assert!((inventory.pcus[1].last_report_watts - 210.0).abs() < f64::EPSILON);
        assert!((inventory.pcus[1].max_report_watts - 295.0).abs() < f64::EPSILON);
        assert_eq!(feature.count, 1);
        assert!(feature.installed);
    }
}
