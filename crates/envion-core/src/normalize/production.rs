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

//! Production and consumption from up to three independent sources.
//!
//! Each endpoint only stores its raw samples; `reconcile_power_and_energy`
//! then picks one value per channel. An enabled meter always wins, the device
//! aggregates are the fallback.

use envion_types::features::{CtFeature, FeatureRegistry};
use envion_types::{
    Capability, MeasurementType, MeterDescriptor, PowerAndEnergy, PowerSummary, SourceKind,
    SourceSample,
};
use serde::Deserialize;
use serde_json::Value;

use super::{lenient, parse};
use crate::error::EnvoyResult;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireEnergy {
    #[serde(deserialize_with = "lenient::f64")]
    watt_hours_today: f64,
    #[serde(deserialize_with = "lenient::f64")]
    watt_hours_seven_days: f64,
    #[serde(deserialize_with = "lenient::f64")]
    watt_hours_lifetime: f64,
    #[serde(deserialize_with = "lenient::f64")]
    watts_now: f64,
}

impl WireEnergy {
    fn sample(&self, source: SourceKind, channel: &str) -> SourceSample {
        SourceSample {
            source,
            channel: channel.to_owned(),
            power: self.watts_now,
            energy_today: self.watt_hours_today,
            energy_last_seven_days: self.watt_hours_seven_days,
            energy_lifetime: self.watt_hours_lifetime,
            ..SourceSample::default()
        }
    }
}

/// `/api/v1/production`
pub fn apply_production_microinverters(
    payload: &Value,
    power_and_energy: &mut PowerAndEnergy,
    feature: &mut Capability,
) -> EnvoyResult<()> {
    let wire: WireEnergy = parse(payload)?;
    power_and_energy.replace_samples(
        SourceKind::Microinverters,
        vec![wire.sample(SourceKind::Microinverters, "production")],
    );
    feature.mark(true, 1);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePdm {
    production: WirePdmChannels,
    consumption: WirePdmChannels,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePdmChannels {
    pcu: Option<WireEnergy>,
    rgm: Option<WireEnergy>,
    eim: Option<WireEnergy>,
}

/// `/ivp/pdm/energy`; null blocks mean the device family is absent
pub fn apply_production_pdm(
    payload: &Value,
    power_and_energy: &mut PowerAndEnergy,
    feature: &mut Capability,
) -> EnvoyResult<()> {
    let wire: WirePdm = parse(payload)?;

    let mut pcu = Vec::new();
    let mut rgm = Vec::new();
    let mut eim = Vec::new();
    if let Some(e) = &wire.production.pcu {
        pcu.push(e.sample(SourceKind::PdmPcu, "production"));
    }
    if let Some(e) = &wire.production.rgm {
        rgm.push(e.sample(SourceKind::PdmRgm, "production"));
    }
    if let Some(e) = &wire.production.eim {
        eim.push(e.sample(SourceKind::PdmEim, "production"));
    }
    if let Some(e) = &wire.consumption.eim {
        eim.push(e.sample(SourceKind::PdmEim, "consumptionNet"));
    }

    let count = (pcu.len() + rgm.len() + eim.len()) as u32;
    power_and_energy.replace_samples(SourceKind::PdmPcu, pcu);
    power_and_energy.replace_samples(SourceKind::PdmRgm, rgm);
    power_and_energy.replace_samples(SourceKind::PdmEim, eim);
    feature.mark(true, count);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireCt {
    production: Vec<WireCtEntry>,
    consumption: Vec<WireCtEntry>,
    storage: Vec<WireCtEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireCtEntry {
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    kind: String,
    #[serde(deserialize_with = "lenient::string")]
    measurement_type: String,
    #[serde(deserialize_with = "lenient::u32")]
    active_count: u32,
    #[serde(deserialize_with = "lenient::i64")]
    reading_time: i64,
    #[serde(deserialize_with = "lenient::f64")]
    w_now: f64,
    #[serde(deserialize_with = "lenient::f64")]
    wh_lifetime: f64,
    #[serde(deserialize_with = "lenient::f64")]
    wh_today: f64,
    #[serde(deserialize_with = "lenient::f64")]
    wh_last_seven_days: f64,
    #[serde(deserialize_with = "lenient::f64")]
    rms_current: f64,
    #[serde(deserialize_with = "lenient::f64")]
    rms_voltage: f64,
    #[serde(deserialize_with = "lenient::f64")]
    react_pwr: f64,
    #[serde(deserialize_with = "lenient::f64")]
    apprnt_pwr: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pwr_factor: f64,
}

impl WireCtEntry {
    fn sample(&self, source: SourceKind, channel: &str) -> SourceSample {
        SourceSample {
            source,
            channel: channel.to_owned(),
            active_count: self.active_count,
            reading_time: self.reading_time,
            power: self.w_now,
            energy_today: self.wh_today,
            energy_last_seven_days: self.wh_last_seven_days,
            energy_lifetime: self.wh_lifetime,
            rms_voltage: self.rms_voltage,
            rms_current: self.rms_current,
            power_factor: self.pwr_factor,
            apparent_power: self.apprnt_pwr,
            reactive_power: self.react_pwr,
        }
    }
}

/// `/production.json?details=1`
pub fn apply_production_ct(
    payload: &Value,
    power_and_energy: &mut PowerAndEnergy,
    feature: &mut CtFeature,
) -> EnvoyResult<()> {
    let wire: WireCt = parse(payload)?;

    let mut inverters = Vec::new();
    let mut eim = Vec::new();
    let mut acb = Vec::new();
    let mut production_eim = 0;
    let mut net = 0;
    let mut total = 0;

    for entry in &wire.production {
        match entry.kind.as_str() {
            "inverters" => inverters.push(entry.sample(SourceKind::CtInverters, "production")),
            "eim" => {
                production_eim += entry.active_count;
                eim.push(entry.sample(SourceKind::CtEim, "production"));
            }
            _ => {}
        }
    }
    for entry in wire.consumption.iter().filter(|e| e.kind == "eim") {
        match MeasurementType::from_vendor(&entry.measurement_type) {
            Some(MeasurementType::ConsumptionNet) => {
                net += entry.active_count;
                eim.push(entry.sample(SourceKind::CtEim, MeasurementType::ConsumptionNet.key()));
            }
            Some(MeasurementType::ConsumptionTotal) => {
                total += entry.active_count;
                eim.push(entry.sample(SourceKind::CtEim, MeasurementType::ConsumptionTotal.key()));
            }
            _ => {}
        }
    }
    for entry in wire.storage.iter().filter(|e| e.kind == "acb") {
        acb.push(entry.sample(SourceKind::CtAcb, "storage"));
    }

    feature.supported = true;
    feature.production.mark(true, production_eim);
    feature.consumption_net.mark(true, net);
    feature.consumption_total.mark(true, total);
    feature
        .storage
        .mark(true, acb.iter().map(|s| s.active_count).sum());

    power_and_energy.replace_samples(SourceKind::CtInverters, inverters);
    power_and_energy.replace_samples(SourceKind::CtEim, eim);
    power_and_energy.replace_samples(SourceKind::CtAcb, acb);
    Ok(())
}

fn from_meter(summary: &mut PowerSummary, meter: &MeterDescriptor) {
    summary.source = SourceKind::Meter;
    summary.reading_time = meter.reading_time;
    summary.record_power(meter.power);
    summary.energy_lifetime = meter.energy_lifetime;
    summary.voltage = meter.voltage;
    summary.current = meter.current;
    summary.power_factor = meter.power_factor;
    summary.frequency = meter.frequency;
}

fn from_sample(summary: &mut PowerSummary, sample: &SourceSample) {
    summary.source = sample.source;
    summary.reading_time = sample.reading_time;
    summary.record_power(sample.power);
    summary.energy_today = sample.energy_today;
    summary.energy_last_seven_days = sample.energy_last_seven_days;
    summary.energy_lifetime = sample.energy_lifetime;
    summary.voltage = sample.rms_voltage;
    summary.current = sample.rms_current;
    summary.power_factor = sample.power_factor;
}

/// Daily and weekly energy come only from device aggregates, even when the
/// meter supplies power
fn daily_energy(summary: &mut PowerSummary, pe: &PowerAndEnergy, channel: &str) {
    let sample = [SourceKind::CtEim, SourceKind::PdmEim]
        .into_iter()
        .find_map(|s| pe.sample(s, channel));
    if let Some(sample) = sample {
        summary.energy_today = sample.energy_today;
        summary.energy_last_seven_days = sample.energy_last_seven_days;
    }
}

fn first_sample<'a>(
    pe: &'a PowerAndEnergy,
    order: &[SourceKind],
    channel: &str,
) -> Option<&'a SourceSample> {
    order.iter().find_map(|s| pe.sample(*s, channel))
}

/// Fold the raw samples and meters into the per-channel summaries.
///
/// Power peaks are carried over from the previous summaries and only move up.
pub fn reconcile_power_and_energy(
    pe: &mut PowerAndEnergy,
    registry: &FeatureRegistry,
    meters: &[MeterDescriptor],
) {
    let meter = move |kind: MeasurementType| {
        meters
            .iter()
            .find(|m| m.measurement_type == kind && m.enabled)
    };

    let view: &PowerAndEnergy = pe;
    let mut production = view.production.clone();
    if registry.production_meter_enabled()
        && let Some(m) = meter(MeasurementType::Production)
    {
        from_meter(&mut production, m);
        daily_energy(&mut production, view, "production");
    } else if let Some(sample) = first_sample(
        view,
        &[
            SourceKind::CtInverters,
            SourceKind::PdmPcu,
            SourceKind::Microinverters,
            SourceKind::PdmRgm,
        ],
        "production",
    ) {
        from_sample(&mut production, sample);
    }

    let consumption = |kind: MeasurementType, previous: Option<PowerSummary>| {
        let mut summary = previous.unwrap_or_default();
        if let Some(m) = meter(kind) {
            from_meter(&mut summary, m);
            daily_energy(&mut summary, view, kind.key());
            Some(summary)
        } else if let Some(sample) = first_sample(
            view,
            &[SourceKind::CtEim, SourceKind::PdmEim],
            kind.key(),
        ) {
            from_sample(&mut summary, sample);
            Some(summary)
        } else {
            None
        }
    };
    let net = consumption(MeasurementType::ConsumptionNet, view.consumption_net.clone());
    let total = consumption(
        MeasurementType::ConsumptionTotal,
        view.consumption_total.clone(),
    );

    pe.production = production;
    pe.consumption_net = net;
    pe.consumption_total = total;
}
