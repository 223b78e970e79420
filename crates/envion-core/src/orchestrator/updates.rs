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

//! Trigger handlers and the fetch, apply, fan-out wrappers they chain

use envion_types::MetersFeature;
use envion_types::features::{CtFeature, EnsembleFeature};
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{DigestUser, Envoy};
use crate::constants::paths;
use crate::controls::GATEWAY_ENTITY;
use crate::error::EnvoyResult;
use crate::normalize::detailed_devices::apply_detailed_devices;
use crate::normalize::ensemble::{
    apply_dry_contacts, apply_dry_contacts_settings, apply_encharge_settings,
    apply_ensemble_inventory, apply_ensemble_status, apply_generator, apply_generator_settings,
};
use crate::normalize::grid::{apply_grid_profile, apply_plc_level, apply_production_state};
use crate::normalize::home::apply_home;
use crate::normalize::info::apply_info;
use crate::normalize::inventory::apply_inventory;
use crate::normalize::live_data::apply_live_data;
use crate::normalize::meters::{apply_meters, apply_meters_readings, apply_meters_reports};
use crate::normalize::pcu_status::apply_pcu_status;
use crate::normalize::production::{
    apply_production_ct, apply_production_microinverters, apply_production_pdm,
    reconcile_power_and_energy,
};
use crate::normalize::tariff::apply_tariff;
use crate::sink::Domain;

impl Envoy {
    // ============= Handlers =============

    pub(super) async fn handle_home_inventory(&mut self, start: bool) {
        if !self.token_gate(start).await {
            return;
        }

        if start || self.feature.home.supported {
            let result = self.update_home().await;
            if !self.settle("Home", start, result, |f| f.home.supported = false) {
                return;
            }
        }
        let result = self.update_inventory().await;
        if !self.settle("Inventory", start, result, |f| {
            f.inventory.supported = false;
        }) {
            return;
        }

        if self.config.features.pcu_status
            && self.feature.inventory.pcus.installed
            && (start || self.feature.pcu_status.supported)
        {
            let result = self.update_pcu_status().await;
            self.settle("PCU status", start, result, |f| f.pcu_status.mark(false, 0));
        }
        self.fan_out_state(Domain::Features, &self.feature);
    }

    pub(super) async fn handle_production(&mut self, start: bool) {
        if !self.token_gate(start).await {
            return;
        }

        if start || self.feature.meters.supported {
            let result = self.update_meters().await;
            let meters_ok = self.settle("Meters", start, result, |f| {
                f.meters = MetersFeature::default();
            });
            if meters_ok && self.feature.meters.installed {
                if start || self.feature.meters.readings.supported {
                    let result = self.update_meters_readings().await;
                    self.settle("Meters readings", start, result, |f| {
                        f.meters.readings.reset();
                    });
                }
                if start || self.feature.meters.reports.supported {
                    let result = self.update_meters_reports().await;
                    self.settle("Meters reports", start, result, |f| {
                        f.meters.reports.reset();
                    });
                }
            }
        }

        if self.config.features.detailed_devices
            && (start || self.feature.detailed_devices.supported)
        {
            let result = self.update_detailed_devices().await;
            self.settle("Detailed devices", start, result, |f| {
                f.detailed_devices.reset();
            });
        }

        if start || self.feature.production.microinverters.supported {
            let result = self.update_production().await;
            self.settle("Production", start, result, |f| {
                f.production.microinverters.reset();
            });
        }
        if start || self.feature.production.pdm.supported {
            let result = self.update_production_pdm().await;
            self.settle("Production PDM", start, result, |f| {
                f.production.pdm.reset();
            });
        }
        if start || self.feature.production.ct.supported {
            let result = self.update_production_ct().await;
            self.settle("Production CT", start, result, |f| {
                f.production.ct = CtFeature::default();
            });
        }

        self.update_power_and_energy();
        self.evaluate_sensors();
        self.publish_snapshot();
    }

    pub(super) async fn handle_ensemble(&mut self, start: bool) {
        if !self.config.features.ensemble || !self.token_gate(start).await {
            return;
        }

        if start || self.feature.ensemble.inventory.supported {
            let result = self.update_ensemble_inventory().await;
            if !self.settle("Ensemble inventory", start, result, |f| {
                f.ensemble = EnsembleFeature::default();
            }) {
                return;
            }
        }
        if !self.feature.ensemble.installed() {
            return;
        }

        if start || self.feature.ensemble.status.supported {
            let result = self.update_ensemble_status().await;
            self.settle("Ensemble status", start, result, |f| {
                f.ensemble.status.reset();
            });
        }
        if self.feature.ensemble.encharges.installed
            && (start || self.feature.ensemble.encharge_settings.supported)
        {
            let result = self.update_encharge_settings().await;
            self.settle("Encharge settings", start, result, |f| {
                f.ensemble.encharge_settings.reset();
            });
        }
        if start || self.feature.ensemble.tariff.supported {
            let result = self.update_tariff().await;
            self.settle("Tariff", start, result, |f| f.ensemble.tariff.reset());
        }

        if self.feature.ensemble.enpowers.installed {
            if start || self.feature.ensemble.dry_contacts.supported {
                let result = self.update_dry_contacts().await;
                if self.settle("Dry contacts", start, result, |f| {
                    f.ensemble.dry_contacts.reset();
                }) && (start || self.feature.ensemble.dry_contacts_settings.supported)
                {
                    let result = self.update_dry_contacts_settings().await;
                    self.settle("Dry contacts settings", start, result, |f| {
                        f.ensemble.dry_contacts_settings.reset();
                    });
                }
            }
            if start || self.feature.ensemble.generator.supported {
                let result = self.update_generator().await;
                if self.settle("Generator", start, result, |f| {
                    f.ensemble.generator.reset();
                }) && self.feature.ensemble.generator.installed
                    && (start || self.feature.ensemble.generator_settings.supported)
                {
                    let result = self.update_generator_settings().await;
                    self.settle("Generator settings", start, result, |f| {
                        f.ensemble.generator_settings.reset();
                    });
                }
            }
        }

        self.publish_ensemble_properties();
        self.evaluate_sensors();
        self.publish_snapshot();
    }

    pub(super) async fn handle_live_data(&mut self, start: bool) {
        if !self.config.features.live_data
            || !(start || self.feature.live_data.supported)
            || !self.token_gate(start).await
        {
            return;
        }
        let result = self.update_live_data().await;
        self.settle("Live data", start, result, |f| f.live_data.reset());
    }

    pub(super) async fn handle_grid_plc_production_state(&mut self, start: bool) {
        if !self.token_gate(start).await {
            return;
        }

        if self.config.features.grid_profile && (start || self.feature.grid_profile.supported) {
            let result = self.update_grid_profile().await;
            self.settle("Grid profile", start, result, |f| f.grid_profile.reset());
        }
        if self.config.features.plc_level
            && self.feature.inventory.pcus.installed
            && (start || self.feature.plc_level.supported)
        {
            let result = self.update_plc_level().await;
            self.settle("PLC level", start, result, |f| f.plc_level.reset());
        }
        if self.config.features.production_state
            && self.device_id.is_some()
            && (start || self.feature.production_state.supported)
        {
            let result = self.update_production_state().await;
            self.settle("Production state", start, result, |f| {
                f.production_state.reset();
            });
        }
    }

    /// During discovery the startup check already ran; don't wait for it twice
    async fn token_gate(&self, start: bool) -> bool {
        if start {
            return self.credentials.token_valid();
        }
        self.ensure_token().await
    }

    // ============= Updates =============

    pub(crate) async fn update_info(&mut self) -> EnvoyResult<()> {
        let xml = self.session.get_text(paths::INFO).await?;
        apply_info(&xml, &mut self.pv.info, &mut self.feature.info)?;
        self.fan_out_state(Domain::Info, &self.pv.info);
        Ok(())
    }

    async fn update_home(&mut self) -> EnvoyResult<()> {
        let payload = self.fetch_json(paths::HOME, DigestUser::Open).await?;
        apply_home(&payload, &mut self.pv.home, &mut self.feature.home)?;
        self.fan_out(Domain::Home, &payload);
        Ok(())
    }

    async fn update_inventory(&mut self) -> EnvoyResult<()> {
        let payload = self.fetch_json(paths::INVENTORY, DigestUser::Open).await?;
        apply_inventory(&payload, &mut self.pv.inventory, &mut self.feature.inventory)?;
        self.fan_out(Domain::Inventory, &payload);
        Ok(())
    }

    async fn update_pcu_status(&mut self) -> EnvoyResult<()> {
        let payload = self.fetch_json(paths::PCU_STATUS, DigestUser::Envoy).await?;
        apply_pcu_status(&payload, &mut self.pv.inventory, &mut self.feature.pcu_status)?;
        self.fan_out(Domain::PcuStatus, &payload);
        Ok(())
    }

    async fn update_meters(&mut self) -> EnvoyResult<()> {
        let payload = self.fetch_json(paths::METERS, DigestUser::Open).await?;
        apply_meters(&payload, &mut self.pv.meters, &mut self.feature.meters)?;
        self.fan_out(Domain::Meters, &payload);
        Ok(())
    }

    async fn update_meters_readings(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::METERS_READINGS, DigestUser::Open)
            .await?;
        apply_meters_readings(&payload, &mut self.pv.meters, &mut self.feature.meters)?;
        self.fan_out(Domain::MetersReadings, &payload);
        Ok(())
    }

    async fn update_meters_reports(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::METERS_REPORTS, DigestUser::Open)
            .await?;
        apply_meters_reports(&payload, &mut self.pv.meters, &mut self.feature.meters)?;
        self.fan_out(Domain::MetersReports, &payload);
        Ok(())
    }

    async fn update_detailed_devices(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::DETAILED_DEVICES, DigestUser::Envoy)
            .await?;
        apply_detailed_devices(
            &payload,
            &mut self.pv.inventory,
            &mut self.pv.meters,
            &self.feature.meters,
            &mut self.feature.detailed_devices,
        )?;
        self.fan_out(Domain::DetailedDevices, &payload);
        Ok(())
    }

    async fn update_production(&mut self) -> EnvoyResult<()> {
        let payload = self.fetch_json(paths::PRODUCTION, DigestUser::Envoy).await?;
        apply_production_microinverters(
            &payload,
            &mut self.pv.power_and_energy,
            &mut self.feature.production.microinverters,
        )?;
        self.fan_out(Domain::Production, &payload);
        Ok(())
    }

    async fn update_production_pdm(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::PRODUCTION_PDM, DigestUser::Envoy)
            .await?;
        apply_production_pdm(
            &payload,
            &mut self.pv.power_and_energy,
            &mut self.feature.production.pdm,
        )?;
        self.fan_out(Domain::ProductionPdm, &payload);
        Ok(())
    }

    async fn update_production_ct(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::PRODUCTION_CT, DigestUser::Open)
            .await?;
        apply_production_ct(
            &payload,
            &mut self.pv.power_and_energy,
            &mut self.feature.production.ct,
        )?;
        self.fan_out(Domain::ProductionCt, &payload);
        Ok(())
    }

    /// Reconcile the production sources and publish the summaries
    fn update_power_and_energy(&mut self) {
        reconcile_power_and_energy(
            &mut self.pv.power_and_energy,
            &self.feature,
            &self.pv.meters,
        );
        let pe = &self.pv.power_and_energy;
        if pe.production.power_peak_detected {
            debug!("📈 [ENVOY] New production peak {:.0} W", pe.production.power_peak);
        }
        self.fan_out_state(Domain::PowerAndEnergy, pe);

        let summaries = [
            ("production", Some(&pe.production)),
            ("consumptionNet", pe.consumption_net.as_ref()),
            ("consumptionTotal", pe.consumption_total.as_ref()),
        ];
        for (entity, summary) in summaries {
            let Some(summary) = summary else {
                continue;
            };
            self.sinks.publish_property(entity, "power", json!(summary.power));
            self.sinks
                .publish_property(entity, "powerPeak", json!(summary.power_peak));
            self.sinks
                .publish_property(entity, "energyToday", json!(summary.energy_today));
            self.sinks
                .publish_property(entity, "energyLifetime", json!(summary.energy_lifetime));
        }
    }

    async fn update_ensemble_inventory(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::ENSEMBLE_INVENTORY, DigestUser::Envoy)
            .await?;
        apply_ensemble_inventory(&payload, &mut self.pv.ensemble, &mut self.feature.ensemble)?;
        self.fan_out(Domain::EnsembleInventory, &payload);
        Ok(())
    }

    async fn update_ensemble_status(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::ENSEMBLE_STATUS, DigestUser::Envoy)
            .await?;
        apply_ensemble_status(&payload, &mut self.pv.ensemble, &mut self.feature.ensemble)?;
        self.fan_out(Domain::EnsembleStatus, &payload);
        Ok(())
    }

    async fn update_encharge_settings(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::ENCHARGE_SETTINGS, DigestUser::Envoy)
            .await?;
        apply_encharge_settings(&payload, &mut self.pv.ensemble, &mut self.feature.ensemble)?;
        self.fan_out(Domain::EnchargeSettings, &payload);
        Ok(())
    }

    async fn update_tariff(&mut self) -> EnvoyResult<()> {
        let payload = self.fetch_json(paths::TARIFF, DigestUser::Envoy).await?;
        apply_tariff(&payload, &mut self.pv.ensemble, &mut self.feature.ensemble)?;
        self.fan_out(Domain::Tariff, &payload);
        Ok(())
    }

    async fn update_dry_contacts(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::DRY_CONTACTS, DigestUser::Envoy)
            .await?;
        apply_dry_contacts(&payload, &mut self.pv.ensemble, &mut self.feature.ensemble)?;
        self.fan_out(Domain::DryContacts, &payload);
        Ok(())
    }

    async fn update_dry_contacts_settings(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::DRY_CONTACTS_SETTINGS, DigestUser::Envoy)
            .await?;
        apply_dry_contacts_settings(&payload, &mut self.pv.ensemble, &mut self.feature.ensemble)?;
        self.fan_out(Domain::DryContactsSettings, &payload);
        Ok(())
    }

    async fn update_generator(&mut self) -> EnvoyResult<()> {
        let payload = self.fetch_json(paths::GENERATOR, DigestUser::Envoy).await?;
        apply_generator(&payload, &mut self.pv.ensemble, &mut self.feature.ensemble)?;
        self.fan_out(Domain::Generator, &payload);
        Ok(())
    }

    async fn update_generator_settings(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::GENERATOR_SETTINGS, DigestUser::Envoy)
            .await?;
        apply_generator_settings(&payload, &mut self.pv.ensemble, &mut self.feature.ensemble)?;
        self.fan_out(Domain::GeneratorSettings, &payload);
        Ok(())
    }

    async fn update_live_data(&mut self) -> EnvoyResult<()> {
        let payload = self.fetch_json(paths::LIVE_DATA, DigestUser::Envoy).await?;
        let enable_stream =
            apply_live_data(&payload, &mut self.pv.live_data, &mut self.feature.live_data)?;
        self.fan_out(Domain::LiveData, &payload);

        if enable_stream {
            info!("📡 [ENVOY] Live data stream disabled, enabling");
            if let Err(e) = self
                .send_json(
                    Method::POST,
                    paths::LIVE_DATA_STREAM,
                    &json!({"enable": 1}),
                    DigestUser::Envoy,
                )
                .await
            {
                warn!("⚠️ [ENVOY] Could not enable live data stream: {}", e);
            }
        }
        Ok(())
    }

    async fn update_grid_profile(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::GRID_PROFILE, DigestUser::Installer)
            .await?;
        apply_grid_profile(
            &payload,
            &mut self.pv.grid_profile,
            &mut self.feature.grid_profile,
        )?;
        self.fan_out(Domain::GridProfile, &payload);
        Ok(())
    }

    pub(super) async fn update_plc_level(&mut self) -> EnvoyResult<()> {
        let payload = self
            .fetch_json(paths::PLC_LEVEL, DigestUser::Installer)
            .await?;
        let matched =
            apply_plc_level(&payload, &mut self.pv.inventory, &mut self.feature.plc_level)?;
        debug!("📶 [ENVOY] PLC level for {} devices", matched);
        self.fan_out(Domain::PlcLevel, &payload);
        Ok(())
    }

    async fn update_production_state(&mut self) -> EnvoyResult<()> {
        let Some(device_id) = self.device_id.clone() else {
            return Ok(());
        };
        let payload = self
            .fetch_json(&paths::production_state(&device_id), DigestUser::Installer)
            .await?;
        apply_production_state(
            &payload,
            &mut self.pv.production_state,
            &mut self.feature.production_state,
        )?;
        self.fan_out(Domain::ProductionState, &payload);
        if let Some(allowed) = self.pv.production_state {
            self.sinks
                .publish_property(GATEWAY_ENTITY, "productionState", json!(allowed));
        }
        Ok(())
    }

    // ============= Properties =============

    fn evaluate_sensors(&mut self) {
        if self.sensors.is_empty() {
            return;
        }
        for outcome in self.sensors.evaluate(&self.pv) {
            let entity = format!("sensor/{}", outcome.name);
            if outcome.changed {
                debug!("🎚️ [SENSOR] {} is now {}", outcome.name, outcome.state);
            }
            self.sinks
                .publish_property(&entity, "state", json!(outcome.state));
            if let Some(level) = outcome.level {
                self.sinks.publish_property(&entity, "level", json!(level));
            }
        }
    }

    fn publish_ensemble_properties(&self) {
        let ensemble = &self.pv.ensemble;
        if let Some(enpower) = ensemble.enpowers.first() {
            self.sinks.publish_property(
                GATEWAY_ENTITY,
                "enpowerGridState",
                json!(enpower.grid_connected()),
            );
        }
        if let Some(generator) = &ensemble.generator {
            self.sinks.publish_property(
                GATEWAY_ENTITY,
                "generatorMode",
                Value::String(generator.admin_mode.clone()),
            );
        }
        for contact in &ensemble.dry_contacts {
            self.sinks.publish_property(
                &format!("dryContact/{}", contact.id),
                "state",
                json!(contact.state),
            );
        }
        if let Some(profile) = ensemble.profile() {
            self.sinks.publish_property(
                GATEWAY_ENTITY,
                "profile",
                Value::String(profile.as_vendor().to_owned()),
            );
        }
    }
}
