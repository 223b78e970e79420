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

//! Credential state and the token check state machine

use envion_types::JwtToken;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::password::{derive_envoy_password, derive_installer_password};
use super::token::{CloudIdentity, TokenCache, bundle_token};
use crate::config::{EnvoyConfig, TokenMode};
use crate::constants::{VALID_TOKEN_MARKER, paths};
use crate::error::{EnvoyError, EnvoyResult, TokenError};
use crate::session::HttpSession;

/// Outcome of one `check_token` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    /// Token accepted by the gateway (or not needed on this firmware)
    Ready,
    /// Another check is running, nothing was done
    InProgress,
    /// No usable token; gated steps must not run
    Failed,
}

#[derive(Debug, Default)]
struct CredentialState {
    serial: String,
    firmware7xx: bool,
    envoy_passwd: Option<String>,
    installer_passwd: Option<String>,
    jwt: JwtToken,
    token_valid: bool,
}

/// Releases the check guard on every exit path
struct CheckGuard<'a>(&'a AtomicBool);

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CredentialManager {
    mode: TokenMode,
    enlighten_user: String,
    enlighten_passwd: String,
    installer_token: Option<String>,
    configured_envoy_passwd: Option<String>,
    cache: TokenCache,
    identity: CloudIdentity,
    session: Arc<HttpSession>,
    missing_backoff: Duration,
    state: Mutex<CredentialState>,
    checking: AtomicBool,
}

impl CredentialManager {
    pub fn new(config: &EnvoyConfig, session: Arc<HttpSession>) -> EnvoyResult<Self> {
        let mode = config.token_mode().ok_or_else(|| {
            EnvoyError::Config(format!(
                "Unknown token generation mode {}",
                config.token_generation_mode
            ))
        })?;
        let identity = CloudIdentity::new(
            config.enlighten_url.clone(),
            config.entrez_url.clone(),
            config.request_timeout(),
        )?;

        Ok(Self {
            mode,
            enlighten_user: config.enlighten_user.clone().unwrap_or_default(),
            enlighten_passwd: config.enlighten_passwd.clone().unwrap_or_default(),
            installer_token: config.envoy_token.clone().filter(|t| !t.is_empty()),
            configured_envoy_passwd: config.envoy_passwd.clone(),
            cache: TokenCache::new(config.token_file.clone()),
            identity,
            session,
            missing_backoff: config.token_missing_backoff(),
            state: Mutex::new(CredentialState {
                serial: config.envoy_serial.clone().unwrap_or_default(),
                ..Default::default()
            }),
            checking: AtomicBool::new(false),
        })
    }

    /// Record what `/info.xml` told us about the gateway
    pub fn set_device(&self, serial: &str, firmware7xx: bool) {
        let mut state = self.state.lock();
        if !state.serial.is_empty() && state.serial != serial {
            warn!(
                "⚠️ [CREDENTIALS] Configured serial {} differs from gateway serial {}, using the gateway's",
                state.serial, serial
            );
        }
        state.serial = serial.to_owned();
        state.firmware7xx = firmware7xx;
    }

    /// Derive both digest passwords; failures only disable dependent endpoints
    pub fn derive_passwords(&self) {
        let serial = self.state.lock().serial.clone();
        let envoy = derive_envoy_password(self.configured_envoy_passwd.as_deref(), &serial);
        let installer = derive_installer_password(&serial);
        debug!(
            "🔑 [CREDENTIALS] Passwords derived (envoy: {}, installer: {})",
            envoy.is_some(),
            installer.is_some()
        );

        let mut state = self.state.lock();
        state.envoy_passwd = envoy;
        state.installer_passwd = installer;
    }

    pub fn envoy_passwd(&self) -> Option<String> {
        self.state.lock().envoy_passwd.clone()
    }

    pub fn installer_passwd(&self) -> Option<String> {
        self.state.lock().installer_passwd.clone()
    }

    /// Gateway accepted the token and it is not inside the expiry guard window
    pub fn token_valid(&self) -> bool {
        let state = self.state.lock();
        if !state.firmware7xx {
            return state.token_valid;
        }
        state.token_valid && state.jwt.token_exist(chrono::Utc::now().timestamp())
    }

    pub fn jwt(&self) -> JwtToken {
        self.state.lock().jwt.clone()
    }

    /// Forget validity after a 401; the next check re-authenticates
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        if state.firmware7xx {
            state.token_valid = false;
            info!("🔒 [CREDENTIALS] Token invalidated, will re-authenticate on next cycle");
        }
    }

    /// Make sure a gateway-accepted token is installed in the session.
    ///
    /// Concurrent callers get `InProgress` immediately while one check runs.
    pub async fn check_token(&self, is_startup: bool) -> TokenCheck {
        {
            let mut state = self.state.lock();
            if !state.firmware7xx {
                state.token_valid = true;
                return TokenCheck::Ready;
            }
        }

        if self
            .checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("⏳ [CREDENTIALS] Token check already running");
            return TokenCheck::InProgress;
        }
        let _guard = CheckGuard(&self.checking);

        if is_startup {
            self.load_startup_token().await;
        }

        let now = chrono::Utc::now().timestamp();
        let current = self.jwt();
        if !current.token_exist(now) {
            if current.token.is_empty() {
                info!(
                    "⏳ [CREDENTIALS] No token yet, retrying in {}s",
                    self.missing_backoff.as_secs()
                );
                tokio::time::sleep(self.missing_backoff).await;
            } else {
                info!("🔄 [CREDENTIALS] Token expired or about to expire, refreshing");
            }

            match self.refresh_token().await {
                Some(token) => self.state.lock().jwt = token,
                None => {
                    self.state.lock().token_valid = false;
                    return TokenCheck::Failed;
                }
            }
        }

        self.validate_with_gateway().await
    }

    async fn load_startup_token(&self) {
        let token = match self.mode {
            TokenMode::InstallerToken => self.installer_token.as_deref().map(installer_bundle),
            TokenMode::Cloud => self.cache.read().await,
        };
        if let Some(token) = token {
            debug!("📂 [CREDENTIALS] Startup token loaded");
            self.state.lock().jwt = token;
        }
    }

    /// New token from the configured source, persisted on success
    async fn refresh_token(&self) -> Option<JwtToken> {
        match self.mode {
            TokenMode::InstallerToken => {
                let token = self.installer_token.as_deref().map(installer_bundle);
                if token.is_none() {
                    warn!("⚠️ [CREDENTIALS] Installer token mode without a token configured");
                }
                token
            }
            TokenMode::Cloud => {
                let serial = self.state.lock().serial.clone();
                self.fetch_cloud_token(&serial).await
            }
        }
    }

    /// Cloud token for `serial`, `None` on any failure
    pub async fn fetch_cloud_token(&self, serial: &str) -> Option<JwtToken> {
        if self.enlighten_user.is_empty() || self.enlighten_passwd.is_empty() {
            warn!("⚠️ [CREDENTIALS] Enlighten credentials missing, cannot fetch token");
            return None;
        }

        let token = match self
            .identity
            .fetch_cloud_token(&self.enlighten_user, &self.enlighten_passwd, serial)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                warn!("⚠️ [CREDENTIALS] {}", e);
                return None;
            }
        };

        if let Err(e) = self.cache.write(&token).await {
            warn!(
                "⚠️ [CREDENTIALS] Could not write token cache {}: {}",
                self.cache.path().display(),
                e
            );
        }
        Some(token)
    }

    async fn validate_with_gateway(&self) -> TokenCheck {
        let token = self.jwt().token;
        let result = self.session.check_jwt(paths::CHECK_JWT, &token).await;

        let accepted = match result {
            Ok((body, cookie)) if body.contains(VALID_TOKEN_MARKER) => {
                match self.session.swap_bearer(&token, cookie.as_deref()) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("⚠️ [CREDENTIALS] {}", e);
                        false
                    }
                }
            }
            Ok(_) => {
                warn!("⚠️ [CREDENTIALS] {}", TokenError::Rejected);
                false
            }
            Err(e) => {
                warn!("⚠️ [CREDENTIALS] Token check request failed: {}", e);
                false
            }
        };

        self.state.lock().token_valid = accepted;
        if accepted {
            info!("✅ [CREDENTIALS] Token accepted by gateway");
            TokenCheck::Ready
        } else {
            TokenCheck::Failed
        }
    }
}

/// Installer tokens may not carry a readable expiry; they are never expired locally
fn installer_bundle(raw: &str) -> JwtToken {
    bundle_token(raw, true).unwrap_or_else(|_| JwtToken {
        token: raw.trim().to_owned(),
        generation_time: chrono::Utc::now().timestamp(),
        expires_at: 0,
        installer: true,
    })
}
