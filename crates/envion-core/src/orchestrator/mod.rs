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

//! Update orchestrator.
//!
//! A single task owns [`Envoy`] and therefore the state store and feature
//! registry. Trigger events and control requests arrive through channels and
//! are handled one at a time, so handlers never overlap.

mod control_handlers;
mod updates;

pub use control_handlers::{ControlCommand, ControlHandle};

use envion_types::{FeatureRegistry, PvState};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::EnvoyConfig;
use crate::constants::{ENVOY_USER, INSTALLER_USER};
use crate::controls::ControlGate;
use crate::credentials::{CredentialManager, TokenCheck};
use crate::device_id::DeviceIdCache;
use crate::error::{EnvoyError, EnvoyResult};
use crate::impulse::TriggerEvent;
use crate::notify::Notifier;
use crate::sensors::SensorSet;
use crate::session::{Auth, HttpSession};
use crate::sink::{Domain, SinkHub};

/// Digest account an endpoint needs on pre-7.x firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DigestUser {
    /// Open endpoint, or bearer session only
    Open,
    Envoy,
    Installer,
}

pub struct Envoy {
    config: EnvoyConfig,
    session: Arc<HttpSession>,
    credentials: Arc<CredentialManager>,
    device_ids: DeviceIdCache,
    device_id: Option<String>,
    pv: PvState,
    feature: FeatureRegistry,
    sensors: SensorSet,
    sinks: Arc<SinkHub>,
    notifier: Notifier,
    gate: Arc<ControlGate>,
}

impl std::fmt::Debug for Envoy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envoy")
            .field("name", &self.config.name)
            .field("serial", &self.pv.info.serial_number)
            .field("firmware", &self.pv.info.firmware)
            .finish_non_exhaustive()
    }
}

impl Envoy {
    pub fn new(
        config: EnvoyConfig,
        sinks: Arc<SinkHub>,
        notifier: Notifier,
        gate: Arc<ControlGate>,
    ) -> EnvoyResult<Self> {
        let session = Arc::new(HttpSession::new(
            config.base_url(false),
            config.request_timeout(),
        )?);
        let credentials = Arc::new(CredentialManager::new(&config, session.clone())?);
        let device_ids = DeviceIdCache::new(config.envoy_id_file.clone());
        let sensors = SensorSet::new(config.sensors.clone());

        Ok(Self {
            config,
            session,
            credentials,
            device_ids,
            device_id: None,
            pv: PvState::new(),
            feature: FeatureRegistry::new(),
            sensors,
            sinks,
            notifier,
            gate,
        })
    }

    pub fn pv(&self) -> &PvState {
        &self.pv
    }

    pub fn feature(&self) -> &FeatureRegistry {
        &self.feature
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Connect to the gateway and run every update once in discovery mode.
    ///
    /// Only a failure to read the gateway identity is fatal.
    pub async fn start(&mut self) -> EnvoyResult<()> {
        info!("🚀 [ENVOY] Connecting to {}", self.session.base_url());
        self.update_info().await?;

        let firmware7xx = self.feature.info.firmware7xx;
        self.credentials
            .set_device(&self.pv.info.serial_number, firmware7xx);
        self.session.set_base_url(self.config.base_url(firmware7xx));
        self.credentials.derive_passwords();
        info!(
            serial = %self.pv.info.serial_number,
            "✅ [ENVOY] Gateway found, firmware {} ({})",
            self.pv.info.software,
            if firmware7xx { "token" } else { "digest" }
        );

        if self.credentials.check_token(true).await != TokenCheck::Ready {
            warn!("⚠️ [ENVOY] No valid token yet, gated updates wait for the next cycle");
            self.notifier
                .warn("Gateway token could not be validated, retrying on the next cycle");
        }

        if self.config.features.production_state {
            match self.device_ids.resolve(&self.session).await {
                Ok(id) => {
                    self.feature.backbone_app.mark(true, 1);
                    self.device_id = Some(id);
                }
                Err(e) => {
                    warn!("⚠️ [ENVOY] Device id not available: {}", e);
                    self.feature.backbone_app.mark(false, 0);
                }
            }
        }

        for event in [
            TriggerEvent::HomeInventoryAndPcuStatus,
            TriggerEvent::Production,
            TriggerEvent::Ensemble,
            TriggerEvent::LiveData,
            TriggerEvent::GridPlcAndProductionState,
        ] {
            self.dispatch(event, true).await;
        }
        self.publish_snapshot();
        self.notifier.success(format!(
            "{} connected, serial {}",
            self.config.name, self.pv.info.serial_number
        ));
        Ok(())
    }

    /// Handle one steady-state trigger
    pub async fn handle(&mut self, event: TriggerEvent) {
        debug!("⏱️ [ENVOY] {}", event);
        self.dispatch(event, false).await;
    }

    async fn dispatch(&mut self, event: TriggerEvent, start: bool) {
        match event {
            TriggerEvent::HomeInventoryAndPcuStatus => self.handle_home_inventory(start).await,
            TriggerEvent::Production => self.handle_production(start).await,
            TriggerEvent::Ensemble => self.handle_ensemble(start).await,
            TriggerEvent::LiveData => self.handle_live_data(start).await,
            TriggerEvent::GridPlcAndProductionState => {
                self.handle_grid_plc_production_state(start).await;
            }
        }
    }

    /// Process triggers and control requests until both channels close
    pub async fn run(
        mut self,
        mut triggers: mpsc::Receiver<TriggerEvent>,
        mut controls: mpsc::Receiver<ControlCommand>,
    ) {
        info!("🔄 [ENVOY] Update loop running");
        loop {
            tokio::select! {
                Some(event) = triggers.recv() => self.handle(event).await,
                Some(command) = controls.recv() => {
                    let result = self.control(command.request).await;
                    // Caller may have given up waiting
                    let _ = command.reply.send(result);
                }
                else => break,
            }
        }
        info!("🛑 [ENVOY] Update loop stopped");
    }

    /// Route a failed step: 401 quietly invalidates the token, anything else
    /// is reported and the scheduler carries on.
    pub fn handle_error(&self, step: &str, err: &EnvoyError) {
        if err.is_auth_expired() {
            debug!("🔒 [ENVOY] {} got 401, token invalidated", step);
            self.credentials.invalidate();
            return;
        }
        warn!("⚠️ [ENVOY] {} failed: {}", step, err);
        self.notifier.warn(format!("{step} failed: {err}"));
    }

    /// Failure policy of one step. On the discovery run a failure only marks
    /// the feature unsupported; afterwards it goes to `handle_error`.
    fn settle(
        &mut self,
        step: &str,
        start: bool,
        result: EnvoyResult<()>,
        unsupported: impl FnOnce(&mut FeatureRegistry),
    ) -> bool {
        match result {
            Ok(()) => true,
            Err(e) if start => {
                if e.is_auth_expired() {
                    self.credentials.invalidate();
                }
                info!("ℹ️ [ENVOY] {} not available: {}", step, e);
                unsupported(&mut self.feature);
                false
            }
            Err(e) => {
                self.handle_error(step, &e);
                false
            }
        }
    }

    /// Token gate for every handler
    async fn ensure_token(&self) -> bool {
        if self.credentials.token_valid() {
            return true;
        }
        match self.credentials.check_token(false).await {
            TokenCheck::Ready => true,
            TokenCheck::InProgress => false,
            TokenCheck::Failed => {
                error!("❌ [ENVOY] Token check failed, skipping this cycle");
                self.notifier.error("Gateway token check failed");
                false
            }
        }
    }

    fn digest_passwd(&self, user: DigestUser) -> EnvoyResult<Option<(&'static str, String)>> {
        if self.feature.info.firmware7xx {
            return Ok(None);
        }
        match user {
            DigestUser::Open => Ok(None),
            DigestUser::Envoy => self
                .credentials
                .envoy_passwd()
                .map(|p| Some((ENVOY_USER, p)))
                .ok_or(EnvoyError::NotSupported("envoy password")),
            DigestUser::Installer => self
                .credentials
                .installer_passwd()
                .map(|p| Some((INSTALLER_USER, p)))
                .ok_or(EnvoyError::NotSupported("installer password")),
        }
    }

    pub(crate) async fn fetch_json(&self, path: &str, user: DigestUser) -> EnvoyResult<Value> {
        match self.digest_passwd(user)? {
            Some((name, passwd)) => {
                self.session
                    .get_auth_json(path, Auth::Digest { user: name, passwd: &passwd })
                    .await
            }
            None => self.session.get_auth_json(path, Auth::Session).await,
        }
    }

    pub(crate) async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: &Value,
        user: DigestUser,
    ) -> EnvoyResult<String> {
        let credentials = self.digest_passwd(user)?;
        let auth = match &credentials {
            Some((name, passwd)) => Auth::Digest { user: name, passwd },
            None => Auth::Session,
        };
        if method == Method::PUT {
            self.session.put_json(path, body, auth).await
        } else {
            self.session.post_json(path, body, auth).await
        }
    }

    /// Push a raw payload to the domain sinks
    fn fan_out(&self, domain: Domain, payload: &Value) {
        if self.sinks.has_sinks() {
            self.sinks.update(domain, payload);
        }
    }

    /// Push a normalized structure to the domain sinks
    fn fan_out_state<T: Serialize>(&self, domain: Domain, state: &T) {
        if !self.sinks.has_sinks() {
            return;
        }
        match serde_json::to_value(state) {
            Ok(value) => self.sinks.update(domain, &value),
            Err(e) => warn!("⚠️ [SINK] Could not serialize {}: {}", domain, e),
        }
    }

    /// Registry and full state snapshot for the REST/MQTT consumers
    fn publish_snapshot(&self) {
        self.fan_out_state(Domain::Features, &self.feature);
        self.fan_out_state(Domain::State, &self.pv);
    }
}
