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

//! Meter cascade: `/ivp/meters` lists the channels, `/ivp/meters/readings`
//! and `/ivp/meters/reports` fill in values. Reports take precedence; readings
//! are only applied while reports are unsupported.

use envion_types::{
    MeasurementType, MeterDescriptor, MeterPhaseReading, MetersFeature, PhaseMode,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{lenient, parse};
use crate::error::EnvoyResult;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireMeter {
    eid: u64,
    #[serde(deserialize_with = "lenient::string")]
    state: String,
    #[serde(deserialize_with = "lenient::string")]
    measurement_type: String,
    #[serde(deserialize_with = "lenient::string")]
    phase_mode: String,
    #[serde(deserialize_with = "lenient::u32")]
    phase_count: u32,
    #[serde(deserialize_with = "lenient::string")]
    metering_status: String,
    status_flags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireReading {
    eid: u64,
    #[serde(deserialize_with = "lenient::i64")]
    timestamp: i64,
    #[serde(deserialize_with = "lenient::f64")]
    act_energy_dlvd: f64,
    #[serde(deserialize_with = "lenient::f64")]
    act_energy_rcvd: f64,
    #[serde(deserialize_with = "lenient::f64")]
    apparent_energy: f64,
    #[serde(deserialize_with = "lenient::f64")]
    react_energy_lagg: f64,
    #[serde(deserialize_with = "lenient::f64")]
    react_energy_lead: f64,
    #[serde(deserialize_with = "lenient::f64")]
    active_power: f64,
    #[serde(deserialize_with = "lenient::f64")]
    apparent_power: f64,
    #[serde(deserialize_with = "lenient::f64")]
    reactive_power: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pwr_factor: f64,
    #[serde(deserialize_with = "lenient::f64")]
    voltage: f64,
    #[serde(deserialize_with = "lenient::f64")]
    current: f64,
    #[serde(deserialize_with = "lenient::f64")]
    freq: f64,
    channels: Vec<WireReading>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireReport {
    #[serde(deserialize_with = "lenient::i64")]
    created_at: i64,
    #[serde(deserialize_with = "lenient::string")]
    report_type: String,
    cumulative: WireReportValues,
    lines: Vec<WireReportValues>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireReportValues {
    #[serde(deserialize_with = "lenient::f64")]
    act_power: f64,
    #[serde(deserialize_with = "lenient::f64")]
    apprnt_pwr: f64,
    #[serde(deserialize_with = "lenient::f64")]
    react_pwr: f64,
    #[serde(deserialize_with = "lenient::f64")]
    wh_dlvd_cum: f64,
    #[serde(deserialize_with = "lenient::f64")]
    wh_rcvd_cum: f64,
    #[serde(deserialize_with = "lenient::f64")]
    varh_lag_cum: f64,
    #[serde(deserialize_with = "lenient::f64")]
    varh_lead_cum: f64,
    #[serde(deserialize_with = "lenient::f64")]
    vah_cum: f64,
    #[serde(deserialize_with = "lenient::f64")]
    rms_voltage: f64,
    #[serde(deserialize_with = "lenient::f64")]
    rms_current: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pwr_factor: f64,
    #[serde(deserialize_with = "lenient::f64")]
    freq_hz: f64,
}

fn set_channel(feature: &mut MetersFeature, kind: MeasurementType, enabled: bool) {
    let channel = match kind {
        MeasurementType::Production => &mut feature.production,
        MeasurementType::ConsumptionNet => &mut feature.consumption_net,
        MeasurementType::ConsumptionTotal => &mut feature.consumption_total,
        MeasurementType::Storage => &mut feature.storage,
    };
    // several meters of one kind: any enabled one enables the channel
    channel.mark(true, channel.enabled || enabled);
}

/// `/ivp/meters`: rebuild the descriptor list, keeping readings by eid.
///
/// Derived entries are dropped here and re-synthesised from reports.
pub fn apply_meters(
    payload: &Value,
    meters: &mut Vec<MeterDescriptor>,
    feature: &mut MetersFeature,
) -> EnvoyResult<()> {
    let wire: Vec<WireMeter> = parse(payload)?;

    feature.reset_channels();
    let mut rebuilt = Vec::with_capacity(wire.len());
    for meter in wire {
        let Some(kind) = MeasurementType::from_vendor(&meter.measurement_type) else {
            debug!(
                "📈 [METERS] Skipping meter {} with unknown type '{}'",
                meter.eid, meter.measurement_type
            );
            continue;
        };
        let phase_mode = PhaseMode::from_vendor(&meter.phase_mode);
        let enabled = meter.state == "enabled";

        let mut descriptor = meters
            .iter()
            .find(|m| m.eid == meter.eid && !m.is_derived())
            .cloned()
            .unwrap_or_else(|| MeterDescriptor::new(meter.eid, kind, phase_mode));
        descriptor.measurement_type = kind;
        descriptor.enabled = enabled;
        descriptor.phase_mode = phase_mode;
        descriptor.phase_count = meter.phase_count;
        descriptor.voltage_divide = phase_mode.voltage_divide();
        descriptor.metering_status = meter.metering_status;
        descriptor.status_flags = meter.status_flags;

        set_channel(feature, kind, enabled);
        rebuilt.push(descriptor);
    }

    feature.supported = true;
    feature.count = rebuilt.len() as u32;
    feature.installed = feature.count > 0;
    *meters = rebuilt;
    Ok(())
}

/// `/ivp/meters/readings`: values joined by eid
pub fn apply_meters_readings(
    payload: &Value,
    meters: &mut [MeterDescriptor],
    feature: &mut MetersFeature,
) -> EnvoyResult<()> {
    let readings: Vec<WireReading> = parse(payload)?;
    feature.readings.mark(true, readings.len() as u32);

    if feature.reports.supported {
        return Ok(());
    }

    for reading in &readings {
        let Some(meter) = meters
            .iter_mut()
            .find(|m| m.eid == reading.eid && !m.is_derived())
        else {
            continue;
        };
        meter.reading_time = reading.timestamp;
        meter.power = reading.active_power;
        meter.apparent_power = reading.apparent_power;
        meter.reactive_power = reading.reactive_power;
        meter.power_factor = reading.pwr_factor;
        meter.voltage = meter.phase_voltage(reading.voltage);
        meter.current = reading.current;
        meter.frequency = reading.freq;
        meter.energy_lifetime = reading.act_energy_dlvd;
        meter.energy_lifetime_upload = reading.act_energy_rcvd;
        meter.apparent_energy = reading.apparent_energy;
        meter.reactive_energy_lagging = reading.react_energy_lagg;
        meter.reactive_energy_leading = reading.react_energy_lead;
        meter.channels = reading
            .channels
            .iter()
            .take(meter.phase_count.max(1) as usize)
            .map(|c| MeterPhaseReading {
                eid: c.eid,
                power: c.active_power,
                apparent_power: c.apparent_power,
                reactive_power: c.reactive_power,
                power_factor: c.pwr_factor,
                voltage: c.voltage,
                current: c.current,
                frequency: c.freq,
                energy_lifetime: c.act_energy_dlvd,
                energy_lifetime_upload: c.act_energy_rcvd,
            })
            .collect();
    }
    Ok(())
}

fn overlay_report(meter: &mut MeterDescriptor, report: &WireReport) {
    let c = &report.cumulative;
    let eid = meter.eid;
    let phases = meter.phase_count.max(1) as usize;
    meter.reading_time = report.created_at;
    meter.power = c.act_power;
    meter.apparent_power = c.apprnt_pwr;
    meter.reactive_power = c.react_pwr;
    meter.power_factor = c.pwr_factor;
    meter.voltage = meter.phase_voltage(c.rms_voltage);
    meter.current = c.rms_current;
    meter.frequency = c.freq_hz;
    meter.energy_lifetime = c.wh_dlvd_cum;
    meter.energy_lifetime_upload = c.wh_rcvd_cum;
    meter.apparent_energy = c.vah_cum;
    meter.reactive_energy_lagging = c.varh_lag_cum;
    meter.reactive_energy_leading = c.varh_lead_cum;
    meter.channels = report
        .lines
        .iter()
        .take(phases)
        .map(|l| MeterPhaseReading {
            eid,
            power: l.act_power,
            apparent_power: l.apprnt_pwr,
            reactive_power: l.react_pwr,
            power_factor: l.pwr_factor,
            voltage: l.rms_voltage,
            current: l.rms_current,
            frequency: l.freq_hz,
            energy_lifetime: l.wh_dlvd_cum,
            energy_lifetime_upload: l.wh_rcvd_cum,
        })
        .collect();
}

/// `/ivp/meters/reports`: values joined by report type.
///
/// A `total-consumption` report with no device meter of that type becomes a
/// derived "Consumption Total" meter, but only while net consumption is enabled.
pub fn apply_meters_reports(
    payload: &Value,
    meters: &mut Vec<MeterDescriptor>,
    feature: &mut MetersFeature,
) -> EnvoyResult<()> {
    let reports: Vec<WireReport> = parse(payload)?;
    feature.reports.mark(true, reports.len() as u32);

    meters.retain(|m| !m.is_derived());
    let has_device_total = meters
        .iter()
        .any(|m| m.measurement_type == MeasurementType::ConsumptionTotal);

    for report in &reports {
        let Some(kind) = MeasurementType::from_vendor(&report.report_type) else {
            continue;
        };

        if let Some(meter) = meters
            .iter_mut()
            .find(|m| m.measurement_type == kind && !m.is_derived())
        {
            overlay_report(meter, report);
            continue;
        }

        if kind == MeasurementType::ConsumptionTotal
            && !has_device_total
            && feature.consumption_net.enabled
            && let Some(net) = meters
                .iter()
                .find(|m| m.measurement_type == MeasurementType::ConsumptionNet)
        {
            let mut total = MeterDescriptor::derive_consumption_total(net);
            overlay_report(&mut total, report);
            meters.push(total);
            feature.consumption_total.mark(true, true);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meter_info() -> Value {
        json!([
            {"eid": 704643328, "state": "enabled", "measurementType": "production", "phaseMode": "three", "phaseCount": 3, "meteringStatus": "normal", "statusFlags": []},
            {"eid": 704643584, "state": "enabled", "measurementType": "net-consumption", "phaseMode": "three", "phaseCount": 3, "meteringStatus": "normal", "statusFlags": []}
        ])
    }

    fn reports() -> Value {
        json!([
            {"createdAt": 1700000000, "reportType": "production",
             "cumulative": {"currW": 1500.0, "actPower": 1500.0, "apprntPwr": 1600.0, "reactPwr": 10.0, "whDlvdCum": 9000000.0, "whRcvdCum": 10.0, "varhLagCum": 1.0, "varhLeadCum": 2.0, "vahCum": 3.0, "rmsVoltage": 690.0, "rmsCurrent": 6.5, "pwrFactor": 0.98, "freqHz": 50.0},
             "lines": [{"actPower": 500.0, "rmsVoltage": 230.0}, {"actPower": 500.0, "rmsVoltage": 230.0}, {"actPower": 500.0, "rmsVoltage": 230.0}]},
            {"createdAt": 1700000000, "reportType": "net-consumption",
             "cumulative": {"actPower": -900.0, "rmsVoltage": 690.0, "whDlvdCum": 100.0}, "lines": []},
            {"createdAt": 1700000000, "reportType": "total-consumption",
             "cumulative": {"actPower": 600.0, "rmsVoltage": 690.0, "whDlvdCum": 4000.0}, "lines": []}
        ])
    }

    #[test]
    fn test_meter_info_sets_channels() {
        let mut meters = Vec::new();
        let mut feature = MetersFeature::default();
        apply_meters(&meter_info(), &mut meters, &mut feature).unwrap();

        assert_eq!(meters.len(), 2);
        assert_eq!(meters[0].voltage_divide, 3);
        assert!(feature.production.enabled);
        assert!(feature.consumption_net.enabled);
        assert!(!feature.consumption_total.enabled);
        assert_eq!(feature.count, 2);
    }

    #[test]
    fn test_reading_applies_active_power() {
        let mut meters = Vec::new();
        let mut feature = MetersFeature::default();
        apply_meters(&meter_info(), &mut meters, &mut feature).unwrap();

        let readings = json!([
            {"eid": 704643328, "timestamp": 1700000000, "actEnergyDlvd": 123.0, "activePower": 1234.5, "voltage": 705.0, "freq": 50.0,
             "channels": [{"eid": 1, "activePower": 411.5}, {"eid": 2, "activePower": 411.5}, {"eid": 3, "activePower": 411.5}]}
        ]);
        apply_meters_readings(&readings, &mut meters, &mut feature).unwrap();

        assert!((meters[0].power - 1234.5).abs() < f64::EPSILON);
        assert!((meters[0].voltage - 235.0).abs() < 1e-9);
        assert_eq!(meters[0].channels.len(), 3);
        assert!(feature.readings.supported);
    }

    #[test]
    fn test_reports_take_precedence_over_readings() {
        let mut meters = Vec::new();
        let mut feature = MetersFeature::default();
        apply_meters(&meter_info(), &mut meters, &mut feature).unwrap();
        apply_meters_reports(&reports(), &mut meters, &mut feature).unwrap();

        let readings = json!([{"eid": 704643328, "activePower": 1.0}]);
        apply_meters_readings(&readings, &mut meters, &mut feature).unwrap();
        assert!((meters[0].power - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_consumption_total_derived_from_net() {
        let mut meters = Vec::new();
        let mut feature = MetersFeature::default();
        apply_meters(&meter_info(), &mut meters, &mut feature).unwrap();
        apply_meters_reports(&reports(), &mut meters, &mut feature).unwrap();

        let total = meters
            .iter()
            .find(|m| m.measurement_type == MeasurementType::ConsumptionTotal)
            .unwrap();
        assert!(total.is_derived());
        assert_eq!(total.eid, 704643584);
        assert_eq!(total.kind, "eim");
        assert_eq!(total.phase_mode, PhaseMode::Three);
        assert!((total.power - 600.0).abs() < f64::EPSILON);
        assert!((total.voltage - 230.0).abs() < 1e-9);
        assert!(feature.consumption_total.enabled);

        // recomputed, not accumulated
        apply_meters_reports(&reports(), &mut meters, &mut feature).unwrap();
        assert_eq!(meters.iter().filter(|m| m.is_derived()).count(), 1);
    }

    #[test]
    fn test_no_total_without_net_enabled() {
        let info = json!([
            {"eid": 1, "state": "enabled", "measurementType": "production", "phaseMode": "single", "phaseCount": 1},
            {"eid": 2, "state": "disabled", "measurementType": "net-consumption", "phaseMode": "single", "phaseCount": 1}
        ]);
        let mut meters = Vec::new();
        let mut feature = MetersFeature::default();
        apply_meters(&info, &mut meters, &mut feature).unwrap();
        apply_meters_reports(&reports(), &mut meters, &mut feature).unwrap();
        assert!(meters.iter().all(|m| !m.is_derived()));
        assert!(!feature.consumption_total.enabled);
    }

    #[test]
    fn test_no_total_without_total_report() {
        let mut meters = Vec::new();
        let mut feature = MetersFeature::default();
        apply_meters(&meter_info(), &mut meters, &mut feature).unwrap();
        let only_net = json!([{"reportType": "net-consumption", "cumulative": {"actPower": 5.0}}]);
        apply_meters_reports(&only_net, &mut meters, &mut feature).unwrap();
        assert!(meters.iter().all(|m| !m.is_derived()));
    }

    #[test]
    fn test_meter_refresh_drops_derived() {
        let mut meters = Vec::new();
        let mut feature = MetersFeature::default();
        apply_meters(&meter_info(), &mut meters, &mut feature).unwrap();
        apply_meters_reports(&reports(), &mut meters, &mut feature).unwrap();
        apply_meters(&meter_info(), &mut meters, &mut feature).unwrap();
        assert_eq!(meters.len(), 2);
        // readings kept across the refresh
        assert!((meters[0].power - 1500.0).abs() < f64::EPSILON);
    }
}
