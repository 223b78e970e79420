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

use envion_types::features::EnsembleFeature;
use envion_types::{Ensemble, Profile, TariffSummary};
use serde::Deserialize;
use serde_json::Value;

use super::{lenient, parse};
use crate::error::EnvoyResult;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireTariffEnvelope {
    tariff: Option<WireTariff>,
    schedule: WireSchedule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireTariff {
    currency: WireCurrency,
    #[serde(deserialize_with = "lenient::string")]
    logger: String,
    #[serde(deserialize_with = "lenient::string")]
    date: String,
    storage_settings: WireStorageSettings,
    single_rate: WireSingleRate,
    seasons: Vec<WireSeason>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireCurrency {
    #[serde(deserialize_with = "lenient::string")]
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireStorageSettings {
    #[serde(deserialize_with = "lenient::string")]
    mode: String,
    #[serde(deserialize_with = "lenient::string")]
    operation_mode_sub_type: String,
    #[serde(deserialize_with = "lenient::f64")]
    reserved_soc: f64,
    #[serde(deserialize_with = "lenient::f64")]
    very_low_soc: f64,
    #[serde(deserialize_with = "lenient::bool")]
    charge_from_grid: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireSingleRate {
    #[serde(deserialize_with = "lenient::f64")]
    rate: f64,
    #[serde(deserialize_with = "lenient::f64")]
    sell: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireSeason {
    #[serde(deserialize_with = "lenient::string")]
    id: String,
    days: Vec<WireDay>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDay {
    periods: Vec<WirePeriod>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePeriod {
    #[serde(deserialize_with = "lenient::string")]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireSchedule {
    #[serde(deserialize_with = "lenient::string")]
    source: String,
    #[serde(deserialize_with = "lenient::string")]
    version: String,
    #[serde(deserialize_with = "lenient::string")]
    battery_mode: String,
}

/// `/admin/lib/tariff`: flatten the storage settings and schedule
pub fn apply_tariff(
    payload: &Value,
    ensemble: &mut Ensemble,
    feature: &mut EnsembleFeature,
) -> EnvoyResult<()> {
    let wire: WireTariffEnvelope = parse(payload)?;
    let Some(tariff) = wire.tariff else {
        feature.tariff.mark(true, 0);
        ensemble.tariff = None;
        return Ok(());
    };

    let mut periods: Vec<String> = tariff
        .seasons
        .iter()
        .flat_map(|s| s.days.iter())
        .flat_map(|d| d.periods.iter())
        .map(|p| p.id.clone())
        .filter(|id| !id.is_empty())
        .collect();
    periods.sort();
    periods.dedup();

    ensemble.tariff = Some(TariffSummary {
        currency: tariff.currency.code,
        logger: tariff.logger,
        date: tariff.date,
        storage_mode: Profile::from_vendor(&tariff.storage_settings.mode),
        operation_mode_sub_type: tariff.storage_settings.operation_mode_sub_type,
        reserved_soc: tariff.storage_settings.reserved_soc,
        very_low_soc: tariff.storage_settings.very_low_soc,
        charge_from_grid: tariff.storage_settings.charge_from_grid,
        single_rate: tariff.single_rate.rate,
        single_rate_sell: tariff.single_rate.sell,
        seasons: tariff.seasons.into_iter().map(|s| s.id).collect(),
        periods,
        schedule_source: wire.schedule.source,
        schedule_version: wire.schedule.version,
        schedule_battery_mode: Profile::from_vendor(&wire.schedule.battery_mode),
    });
    feature.tariff.mark(true, 1);
    Ok(())
}
