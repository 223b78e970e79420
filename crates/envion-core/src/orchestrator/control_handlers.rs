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

//! Setters behind the property layer.
//!
//! Requests travel through the same task as the polling handlers, so a write
//! never interleaves with a normalizer. The gate is checked both when the
//! request is submitted and again when it is executed.

use reqwest::Method;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::{DigestUser, Envoy};
use crate::constants::paths;
use crate::controls::{ControlGate, ControlRequest, GATEWAY_ENTITY};
use crate::error::{EnvoyError, EnvoyResult};
use crate::sink::SinkHub;

/// A control request plus the channel its result goes back on
#[derive(Debug)]
pub struct ControlCommand {
    pub request: ControlRequest,
    pub reply: oneshot::Sender<EnvoyResult<()>>,
}

/// Cloneable entry point for setters
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlCommand>,
    gate: Arc<ControlGate>,
    sinks: Arc<SinkHub>,
}

impl ControlHandle {
    pub fn new(
        tx: mpsc::Sender<ControlCommand>,
        gate: Arc<ControlGate>,
        sinks: Arc<SinkHub>,
    ) -> Self {
        Self { tx, gate, sinks }
    }

    pub fn gate(&self) -> &ControlGate {
        &self.gate
    }

    /// Lock or unlock all setters and publish the new lock state
    pub fn set_locked(&self, locked: bool) {
        if locked {
            self.gate.lock();
        } else {
            self.gate.unlock();
        }
        self.sinks
            .publish_property(GATEWAY_ENTITY, "controlLocked", json!(locked));
    }

    /// Submit `request` and wait for the orchestrator to execute it
    pub async fn send(&self, request: ControlRequest) -> EnvoyResult<()> {
        reject_if_locked(&self.gate, &self.sinks, &request)?;

        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlCommand { request, reply })
            .await
            .map_err(|_| EnvoyError::Config("update loop is not running".to_owned()))?;
        rx.await
            .map_err(|_| EnvoyError::Config("update loop dropped the request".to_owned()))?
    }
}

/// Refuse while locked, restoring the property the UI already flipped
fn reject_if_locked(
    gate: &ControlGate,
    sinks: &SinkHub,
    request: &ControlRequest,
) -> EnvoyResult<()> {
    if let Err(e) = gate.check() {
        let (entity, property) = request.property();
        warn!("🔒 [CONTROL] {:?} rejected, controls are locked", request);
        sinks.republish(&entity, property);
        return Err(e);
    }
    Ok(())
}

impl Envoy {
    /// Execute one setter
    pub async fn control(&mut self, request: ControlRequest) -> EnvoyResult<()> {
        reject_if_locked(&self.gate, &self.sinks, &request)?;

        let result = self.apply_control(&request).await;
        if let Err(e) = &result {
            self.handle_error(&format!("Control {request:?}"), e);
            let (entity, property) = request.property();
            self.sinks.republish(&entity, property);
        }
        result
    }

    async fn apply_control(&mut self, request: &ControlRequest) -> EnvoyResult<()> {
        match request {
            ControlRequest::SetProduction(allowed) => {
                let device_id = self
                    .device_id
                    .clone()
                    .ok_or(EnvoyError::NotSupported("production state"))?;
                self.write(
                    Method::PUT,
                    &paths::production_state(&device_id),
                    request,
                    DigestUser::Installer,
                )
                .await?;
                self.pv.production_state = Some(*allowed);
                self.sinks
                    .publish_property(GATEWAY_ENTITY, "productionState", json!(allowed));
                info!(
                    "⚡ [CONTROL] Production {}",
                    if *allowed { "enabled" } else { "forced off" }
                );
            }
            ControlRequest::SetEnpowerRelay(closed) => {
                if !self.feature.ensemble.enpowers.installed {
                    return Err(EnvoyError::NotSupported("enpower"));
                }
                self.write(Method::POST, paths::ENSEMBLE_RELAY, request, DigestUser::Envoy)
                    .await?;
                let state = if *closed { "closed" } else { "open" };
                for enpower in &mut self.pv.ensemble.enpowers {
                    state.clone_into(&mut enpower.mains_admin_state);
                }
                self.sinks
                    .publish_property(GATEWAY_ENTITY, "enpowerGridState", json!(closed));
                info!("🔌 [CONTROL] Enpower relay set {}", state);
            }
            ControlRequest::SetDryContact { id, closed } => {
                if self.pv.ensemble.dry_contact_mut(id).is_none() {
                    return Err(EnvoyError::InvalidResponse(format!(
                        "unknown dry contact {id}"
                    )));
                }
                self.write(Method::POST, paths::DRY_CONTACTS, request, DigestUser::Envoy)
                    .await?;
                if let Some(contact) = self.pv.ensemble.dry_contact_mut(id) {
                    contact.state = *closed;
                    contact.status = if *closed { "closed" } else { "open" }.to_owned();
                }
                self.sinks
                    .publish_property(&format!("dryContact/{id}"), "state", json!(closed));
                info!("🔌 [CONTROL] Dry contact {} set {}", id, closed);
            }
            ControlRequest::SetGeneratorMode(mode) => {
                if !self.feature.ensemble.generator.installed {
                    return Err(EnvoyError::NotSupported("generator"));
                }
                self.write(Method::POST, paths::GENERATOR_MODE, request, DigestUser::Envoy)
                    .await?;
                if let Some(generator) = self.pv.ensemble.generator.as_mut() {
                    mode.as_vendor().clone_into(&mut generator.admin_mode);
                }
                self.sinks.publish_property(
                    GATEWAY_ENTITY,
                    "generatorMode",
                    Value::String(mode.as_vendor().to_owned()),
                );
                info!("🔌 [CONTROL] Generator mode {}", mode.as_vendor());
            }
            ControlRequest::RefreshPlcLevel => {
                self.update_plc_level().await?;
                self.sinks
                    .publish_property(GATEWAY_ENTITY, "plcLevelCheck", json!(false));
            }
            ControlRequest::ResetPowerPeak => {
                let pe = &mut self.pv.power_and_energy;
                let summaries = [
                    ("production", Some(&mut pe.production)),
                    ("consumptionNet", pe.consumption_net.as_mut()),
                    ("consumptionTotal", pe.consumption_total.as_mut()),
                ];
                for (entity, summary) in summaries {
                    let Some(summary) = summary else {
                        continue;
                    };
                    summary.reset_power_peak();
                    self.sinks.publish_property(entity, "powerPeak", json!(0.0));
                }
                self.sinks
                    .publish_property(GATEWAY_ENTITY, "powerPeakReset", json!(false));
                info!("📉 [CONTROL] Power peaks reset");
            }
        }
        Ok(())
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        request: &ControlRequest,
        user: DigestUser,
    ) -> EnvoyResult<()> {
        let Some(body) = request.body() else {
            return Ok(());
        };
        self.send_json(method, path, &body, user).await?;
        Ok(())
    }
}
