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

//! Threshold sensors derived from the state store

use envion_types::{
    GridModeSource, GridQuantity, MeasurementType, PvState, SensorDescriptor, SensorKind,
};

/// Comparison operator addressed by its configuration code 0-5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    Greater,
    GreaterOrEqual,
    Equal,
    Less,
    LessOrEqual,
    NotEqual,
}

impl CompareMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Greater),
            1 => Some(Self::GreaterOrEqual),
            2 => Some(Self::Equal),
            3 => Some(Self::Less),
            4 => Some(Self::LessOrEqual),
            5 => Some(Self::NotEqual),
            _ => None,
        }
    }

    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Greater => value > threshold,
            Self::GreaterOrEqual => value >= threshold,
            Self::Equal => (value - threshold).abs() < f64::EPSILON,
            Self::Less => value < threshold,
            Self::LessOrEqual => value <= threshold,
            Self::NotEqual => (value - threshold).abs() >= f64::EPSILON,
        }
    }
}

/// Compare `value` against `threshold`; unknown modes are never satisfied
pub fn evaluate_compare_mode(value: f64, threshold: f64, mode: u8) -> bool {
    CompareMode::from_code(mode).is_some_and(|m| m.compare(value, threshold))
}

/// Clamp `value` into `[in_min, in_max]` and rescale it linearly to
/// `[out_min, out_max]`, rounded to the nearest integer.
///
/// An empty input range maps everything to `out_min`.
pub fn scale_value(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> i64 {
    if (in_max - in_min).abs() < f64::EPSILON {
        return out_min.round() as i64;
    }
    let clamped = value.clamp(in_min.min(in_max), in_min.max(in_max));
    let scaled = (clamped - in_min) * (out_max - out_min) / (in_max - in_min) + out_min;
    scaled.round() as i64
}

/// Result of one sensor evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct SensorOutcome {
    pub name: String,
    pub state: bool,
    /// 0-100 position of the value against the threshold, numeric sensors only
    pub level: Option<i64>,
    pub changed: bool,
}

/// The configured sensors and their last states
#[derive(Debug, Clone, Default)]
pub struct SensorSet {
    sensors: Vec<SensorDescriptor>,
}

impl SensorSet {
    pub fn new(sensors: Vec<SensorDescriptor>) -> Self {
        Self { sensors }
    }

    pub fn sensors(&self) -> &[SensorDescriptor] {
        &self.sensors
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Recompute every sensor from `pv`.
    ///
    /// Sensors whose input is not available evaluate to false.
    pub fn evaluate(&mut self, pv: &PvState) -> Vec<SensorOutcome> {
        self.sensors
            .iter_mut()
            .map(|sensor| {
                let (state, level) = evaluate_sensor(sensor, pv);
                let changed = sensor.state != state;
                sensor.state = state;
                SensorOutcome {
                    name: sensor.name.clone(),
                    state,
                    level,
                    changed,
                }
            })
            .collect()
    }
}

fn evaluate_sensor(sensor: &SensorDescriptor, pv: &PvState) -> (bool, Option<i64>) {
    let numeric = |value: Option<f64>, mode: u8| match value {
        Some(v) => (
            evaluate_compare_mode(v, sensor.threshold, mode),
            (sensor.threshold > 0.0).then(|| scale_value(v, 0.0, sensor.threshold, 0.0, 100.0)),
        ),
        None => (false, None),
    };

    match &sensor.kind {
        SensorKind::PowerLevel { compare_mode } => numeric(
            Some(pv.power_and_energy.production.power),
            *compare_mode,
        ),
        SensorKind::EnergyLevel { compare_mode } => numeric(
            Some(pv.power_and_energy.production.energy_today),
            *compare_mode,
        ),
        SensorKind::GridQuality {
            quantity,
            compare_mode,
        } => numeric(grid_quantity(pv, *quantity), *compare_mode),
        SensorKind::BackupLevel { compare_mode } => numeric(backup_level(pv), *compare_mode),
        SensorKind::GridMode { source, grid_mode } => {
            (grid_mode_of(pv, *source).is_some_and(|m| m == grid_mode), None)
        }
        SensorKind::Profile { profile } => (pv.ensemble.profile() == Some(*profile), None),
    }
}

fn grid_quantity(pv: &PvState, quantity: GridQuantity) -> Option<f64> {
    let meter = pv.meter(MeasurementType::ConsumptionNet)?;
    Some(match quantity {
        GridQuantity::Voltage => meter.voltage,
        GridQuantity::Current => meter.current,
        GridQuantity::Frequency => meter.frequency,
        GridQuantity::PowerFactor => meter.power_factor,
    })
}

/// Aggregated state of charge, secctrl first then live data
fn backup_level(pv: &PvState) -> Option<f64> {
    if let Some(secctrl) = &pv.ensemble.secctrl {
        return Some(secctrl.agg_soc);
    }
    (pv.live_data.meters.last_update > 0).then_some(pv.live_data.meters.soc)
}

fn grid_mode_of(pv: &PvState, source: GridModeSource) -> Option<&str> {
    match source {
        GridModeSource::Enpower => pv.ensemble.enpowers.first().map(|e| e.grid_mode.as_str()),
        GridModeSource::Encharge => pv
            .ensemble
            .relay
            .as_ref()
            .map(|r| r.encharge_grid_mode.as_str()),
        GridModeSource::Solar => pv
            .ensemble
            .relay
            .as_ref()
            .map(|r| r.solar_grid_mode.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envion_types::{Enpower, MeterDescriptor, PhaseMode, Profile, SecCtrl, TariffSummary};

    #[test]
    fn test_compare_modes() {
        let expected = [
            (0, [false, false, true]),
            (1, [false, true, true]),
            (2, [false, true, false]),
            (3, [true, false, false]),
            (4, [true, true, false]),
            (5, [true, false, true]),
        ];
        for (mode, outcomes) in expected {
            for (value, outcome) in [5.0, 10.0, 15.0].into_iter().zip(outcomes) {
                assert_eq!(
                    evaluate_compare_mode(value, 10.0, mode),
                    outcome,
                    "mode {mode} value {value}"
                );
            }
        }
        assert!(!evaluate_compare_mode(15.0, 10.0, 6));
        assert!(!evaluate_compare_mode(10.0, 10.0, 255));
    }

    #[test]
    fn test_scale_value() {
        for v in [0.0, 17.0, 50.0, 100.0] {
            assert_eq!(scale_value(v, 0.0, 100.0, 0.0, 100.0), v as i64);
        }
        assert_eq!(scale_value(150.0, 0.0, 100.0, 0.0, 100.0), 100);
        assert_eq!(scale_value(-10.0, 0.0, 100.0, 0.0, 100.0), 0);
        assert_eq!(scale_value(2500.0, 0.0, 5000.0, 0.0, 100.0), 50);
        assert_eq!(scale_value(1.0, 0.0, 3.0, 0.0, 100.0), 33);
    }

    #[test]
    fn test_scale_value_empty_range() {
        assert_eq!(scale_value(42.0, 10.0, 10.0, 5.0, 100.0), 5);
    }

    fn sensor(kind: SensorKind, threshold: f64) -> SensorDescriptor {
        SensorDescriptor {
            name: "Export level".to_owned(),
            display_type: 0,
            kind,
            threshold,
            state: false,
        }
    }

    #[test]
    fn test_power_level_sensor_changes() {
        let mut set = SensorSet::new(vec![sensor(
            SensorKind::PowerLevel { compare_mode: 0 },
            1000.0,
        )]);
        let mut pv = PvState::new();
        pv.power_and_energy.production.power = 1500.0;

        let first = set.evaluate(&pv);
        assert!(first[0].state);
        assert!(first[0].changed);
        assert_eq!(first[0].level, Some(100));

        let second = set.evaluate(&pv);
        assert!(!second[0].changed);

        pv.power_and_energy.production.power = 250.0;
        let third = set.evaluate(&pv);
        assert!(!third[0].state);
        assert_eq!(third[0].level, Some(25));
    }

    #[test]
    fn test_grid_quality_from_net_meter() {
        let mut meter = MeterDescriptor::new(
            704643584,
            MeasurementType::ConsumptionNet,
            PhaseMode::Three,
        );
        meter.enabled = true;
        meter.voltage = 230.0;
        let mut pv = PvState::new();
        pv.meters.push(meter);

        let mut set = SensorSet::new(vec![sensor(
            SensorKind::GridQuality {
                quantity: GridQuantity::Voltage,
                compare_mode: 3,
            },
            240.0,
        )]);
        assert!(set.evaluate(&pv)[0].state);
    }

    #[test]
    fn test_missing_inputs_evaluate_false() {
        let pv = PvState::new();
        let mut set = SensorSet::new(vec![
            sensor(
                SensorKind::GridQuality {
                    quantity: GridQuantity::Frequency,
                    compare_mode: 3,
                },
                50.0,
            ),
            sensor(SensorKind::BackupLevel { compare_mode: 3 }, 20.0),
            sensor(
                SensorKind::GridMode {
                    source: GridModeSource::Enpower,
                    grid_mode: "multimode-ongrid".to_owned(),
                },
                0.0,
            ),
            sensor(SensorKind::Profile { profile: Profile::Backup }, 0.0),
        ]);
        assert!(set.evaluate(&pv).iter().all(|o| !o.state));
    }

    #[test]
    fn test_ensemble_sensors() {
        let mut pv = PvState::new();
        pv.ensemble.enpowers.push(Enpower {
            grid_mode: "multimode-ongrid".to_owned(),
            ..Default::default()
        });
        pv.ensemble.secctrl = Some(SecCtrl {
            agg_soc: 15.0,
            ..Default::default()
        });
        pv.ensemble.tariff = Some(TariffSummary {
            storage_mode: Profile::SelfConsumption,
            ..Default::default()
        });

        let mut set = SensorSet::new(vec![
            sensor(
                SensorKind::GridMode {
                    source: GridModeSource::Enpower,
                    grid_mode: "multimode-ongrid".to_owned(),
                },
                0.0,
            ),
            sensor(SensorKind::BackupLevel { compare_mode: 3 }, 20.0),
            sensor(
                SensorKind::Profile {
                    profile: Profile::SelfConsumption,
                },
                0.0,
            ),
        ]);
        assert!(set.evaluate(&pv).iter().all(|o| o.state));
    }
}
