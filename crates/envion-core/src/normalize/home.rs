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

use envion_types::features::HomeFeature;
use envion_types::{CommLevel, CommSummary, HomeData, NetworkInterface, WirelessConnection};
use serde::Deserialize;
use serde_json::Value;

use super::{lenient, level_percent, parse};
use crate::error::EnvoyResult;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireHome {
    #[serde(deserialize_with = "lenient::i64")]
    software_build_epoch: i64,
    #[serde(deserialize_with = "lenient::bool")]
    is_nonvoy: bool,
    db_size: Value,
    #[serde(deserialize_with = "lenient::u32")]
    db_percent_full: u32,
    #[serde(deserialize_with = "lenient::string")]
    timezone: String,
    #[serde(deserialize_with = "lenient::string")]
    current_date: String,
    #[serde(deserialize_with = "lenient::string")]
    current_time: String,
    #[serde(deserialize_with = "lenient::string")]
    tariff: String,
    network: WireNetwork,
    comm: Option<WireComm>,
    wireless_connection: Vec<WireWireless>,
    alerts: Vec<WireAlert>,
    #[serde(deserialize_with = "lenient::string")]
    update_status: String,
    enpower: Option<WireEnpower>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireNetwork {
    #[serde(deserialize_with = "lenient::bool")]
    web_comm: bool,
    #[serde(deserialize_with = "lenient::bool")]
    ever_reported_to_enlighten: bool,
    #[serde(deserialize_with = "lenient::i64")]
    last_enlighten_report_time: i64,
    #[serde(deserialize_with = "lenient::string")]
    primary_interface: String,
    interfaces: Vec<WireInterface>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireInterface {
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    kind: String,
    #[serde(deserialize_with = "lenient::string")]
    interface: String,
    #[serde(deserialize_with = "lenient::string")]
    mac: String,
    #[serde(deserialize_with = "lenient::bool")]
    dhcp: bool,
    #[serde(deserialize_with = "lenient::string")]
    ip: String,
    #[serde(deserialize_with = "lenient::bool")]
    carrier: bool,
    #[serde(deserialize_with = "lenient::u32")]
    signal_strength: u32,
    #[serde(deserialize_with = "lenient::u32")]
    signal_strength_max: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireWireless {
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    kind: String,
    #[serde(deserialize_with = "lenient::bool")]
    connected: bool,
    #[serde(deserialize_with = "lenient::u32")]
    signal_strength: u32,
    #[serde(deserialize_with = "lenient::u32")]
    signal_strength_max: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireLevel {
    #[serde(deserialize_with = "lenient::u32")]
    num: u32,
    #[serde(deserialize_with = "lenient::u32")]
    level: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireComm {
    #[serde(deserialize_with = "lenient::u32")]
    num: u32,
    #[serde(deserialize_with = "lenient::u32")]
    level: u32,
    pcu: Option<WireLevel>,
    acb: Option<WireLevel>,
    nsrb: Option<WireLevel>,
    esub: Option<WireLevel>,
    encharge: Option<Vec<WireLevel>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAlert {
    #[serde(deserialize_with = "lenient::string")]
    msg_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireEnpower {
    #[serde(deserialize_with = "lenient::bool")]
    connected: bool,
    #[serde(deserialize_with = "lenient::string")]
    grid_status: String,
}

fn comm_level(level: &WireLevel) -> CommLevel {
    CommLevel {
        num: level.num,
        level: level_percent(level.level),
    }
}

/// `db_size` is a number on some firmware and `"123 MB"` on others
fn db_size(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s
            .chars()
            .take_while(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .unwrap_or(0),
        _ => 0,
    }
}

/// `/home.json`: network interfaces, comm levels and which device families exist
pub fn apply_home(payload: &Value, home: &mut HomeData, feature: &mut HomeFeature) -> EnvoyResult<()> {
    let wire: WireHome = parse(payload)?;

    let interfaces: Vec<NetworkInterface> = wire
        .network
        .interfaces
        .iter()
        .map(|i| NetworkInterface {
            kind: i.kind.clone(),
            interface: i.interface.clone(),
            mac: i.mac.clone(),
            dhcp: i.dhcp,
            ip: i.ip.clone(),
            carrier: i.carrier,
            signal_strength: level_percent(i.signal_strength),
            signal_strength_max: level_percent(i.signal_strength_max),
        })
        .collect();

    let wireless: Vec<WirelessConnection> = wire
        .wireless_connection
        .iter()
        .map(|w| WirelessConnection {
            kind: w.kind.clone(),
            connected: w.connected,
            signal_strength: level_percent(w.signal_strength),
            signal_strength_max: level_percent(w.signal_strength_max),
        })
        .collect();

    let comm = wire.comm.unwrap_or_default();
    *feature = HomeFeature {
        supported: true,
        network_interfaces: interfaces.len() as u32,
        wireless_connections: wireless.len() as u32,
        pcus: comm.pcu.is_some(),
        acbs: comm.acb.is_some(),
        nsrbs: comm.nsrb.is_some(),
        esubs: comm.esub.is_some(),
        encharges: comm.encharge.is_some(),
        enpower: wire.enpower.is_some(),
    };

    home.software_build_epoch = wire.software_build_epoch;
    home.is_nonvoy = wire.is_nonvoy;
    home.db_size = db_size(&wire.db_size);
    home.db_percent_full = wire.db_percent_full;
    home.timezone = wire.timezone;
    home.current_date = wire.current_date;
    home.current_time = wire.current_time;
    home.tariff = wire.tariff;
    home.web_comm = wire.network.web_comm;
    home.ever_reported_to_enlighten = wire.network.ever_reported_to_enlighten;
    home.last_enlighten_report_time = wire.network.last_enlighten_report_time;
    home.primary_interface = wire.network.primary_interface;
    home.interfaces = interfaces;
    home.wireless_connections = wireless;
    home.comm = CommSummary {
        num: comm.num,
        level: level_percent(comm.level),
        pcu: comm.pcu.as_ref().map(comm_level),
        acb: comm.acb.as_ref().map(comm_level),
        nsrb: comm.nsrb.as_ref().map(comm_level),
        esub: comm.esub.as_ref().map(comm_level),
        encharges: comm
            .encharge
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(comm_level)
            .collect(),
    };
    home.alerts = wire.alerts.into_iter().map(|a| a.msg_key).collect();
    home.update_status = wire.update_status;
    home.enpower_connected = wire.enpower.as_ref().map(|e| e.connected);
    home.enpower_grid_status = wire.enpower.map(|e| e.grid_status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "software_build_epoch": 1695000000,
            "is_nonvoy": false,
            "db_size": "58 MB",
            "db_percent_full": "2",
            "timezone": "Europe/Prague",
            "current_date": "10/16/2025",
            "current_time": "12:00",
            "tariff": "single_rate",
            "network": {
                "web_comm": true,
                "ever_reported_to_enlighten": true,
                "last_enlighten_report_time": 1700000000,
                "primary_interface": "wlan0",
                "interfaces": [
                    {"type": "ethernet", "interface": "eth0", "mac": "00:1D:C0:00:00:01", "dhcp": true, "ip": "0.0.0.0", "signal_strength": 0, "signal_strength_max": 1, "carrier": false},
                    {"type": "wifi", "interface": "wlan0", "mac": "60:E8:5B:00:00:01", "dhcp": true, "ip": "192.168.1.50", "signal_strength": 4, "signal_strength_max": 5, "carrier": true}
                ]
            },
            "comm": {
                "num": 12, "level": 5,
                "pcu": {"num": 12, "level": 4},
                "nsrb": {"num": 1, "level": 5},
                "encharge": [{"num": 1, "level": 3}]
            },
            "wireless_connection": [{"signal_strength": 3, "signal_strength_max": 5, "type": "BLE", "connected": true}],
            "enpower": {"connected": true, "grid_status": "closed"},
            "alerts": [{"msg_key": "envoy.alerts.db_full"}],
            "update_status": "satisfied"
        })
    }

    #[test]
    fn test_signal_strength_scaled_to_percent() {
        let mut home = HomeData::default();
        let mut feature = HomeFeature::default();
        apply_home(&sample(), &mut home, &mut feature).unwrap();

        assert_eq!(home.interfaces[1].signal_strength, 80);
        assert_eq!(home.interfaces[1].signal_strength_max, 100);
        assert_eq!(home.wireless_connections[0].signal_strength, 60);
        assert_eq!(home.db_size, 58);
        assert_eq!(home.db_percent_full, 2);
        assert_eq!(home.comm.pcu, Some(CommLevel { num: 12, level: 80 }));
        assert_eq!(home.alerts, vec!["envoy.alerts.db_full".to_owned()]);
        assert_eq!(home.enpower_grid_status.as_deref(), Some("closed"));
    }

    #[test]
    fn test_device_families_from_comm_keys() {
        let mut home = HomeData::default();
        let mut feature = HomeFeature::default();
        apply_home(&sample(), &mut home, &mut feature).unwrap();

        assert!(feature.supported);
        assert!(feature.pcus);
        assert!(feature.nsrbs);
        assert!(feature.encharges);
        assert!(feature.enpower);
        assert!(!feature.acbs);
        assert!(!feature.esubs);
        assert_eq!(feature.network_interfaces, 2);
        assert_eq!(feature.wireless_connections, 1);
    }

    #[test]
    fn test_families_recomputed_each_update() {
        let mut home = HomeData::default();
        let mut feature = HomeFeature::default();
        apply_home(&sample(), &mut home, &mut feature).unwrap();

        let mut trimmed = sample();
        trimmed["comm"] = json!({"num": 0, "level": 0});
        trimmed.as_object_mut().unwrap().remove("enpower");
        apply_home(&trimmed, &mut home, &mut feature).unwrap();
        assert!(!feature.pcus);
        assert!(!feature.enpower);
        assert!(home.enpower_connected.is_none());
    }
}
