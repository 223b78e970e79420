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

//! User-initiated writes and the lock that guards them

use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::error::{EnvoyError, EnvoyResult};

/// Entity name used for gateway-level properties
pub const GATEWAY_ENTITY: &str = "envoy";

/// Manual lock over every setter; polling is never affected
#[derive(Debug, Default)]
pub struct ControlGate {
    locked: AtomicBool,
}

impl ControlGate {
    pub fn new(locked: bool) -> Self {
        Self {
            locked: AtomicBool::new(locked),
        }
    }

    pub fn lock(&self) {
        if !self.locked.swap(true, Ordering::AcqRel) {
            info!("🔒 [CONTROL] Controls locked");
        }
    }

    pub fn unlock(&self) {
        if self.locked.swap(false, Ordering::AcqRel) {
            info!("🔓 [CONTROL] Controls unlocked");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn check(&self) -> EnvoyResult<()> {
        if self.is_locked() {
            Err(EnvoyError::ControlLocked)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    On,
    Off,
    Auto,
}

impl GeneratorMode {
    pub fn as_vendor(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Auto => "auto",
        }
    }
}

/// One setter call from the property layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    /// Allow (`true`) or force off power production
    SetProduction(bool),
    /// Close (`true`) or open the enpower grid relay
    SetEnpowerRelay(bool),
    SetDryContact { id: String, closed: bool },
    SetGeneratorMode(GeneratorMode),
    RefreshPlcLevel,
    ResetPowerPeak,
}

impl ControlRequest {
    /// Property whose optimistic value must be restored on rejection
    pub fn property(&self) -> (String, &'static str) {
        match self {
            Self::SetProduction(_) => (GATEWAY_ENTITY.to_owned(), "productionState"),
            Self::SetEnpowerRelay(_) => (GATEWAY_ENTITY.to_owned(), "enpowerGridState"),
            Self::SetDryContact { id, .. } => (format!("dryContact/{id}"), "state"),
            Self::SetGeneratorMode(_) => (GATEWAY_ENTITY.to_owned(), "generatorMode"),
            Self::RefreshPlcLevel => (GATEWAY_ENTITY.to_owned(), "plcLevelCheck"),
            Self::ResetPowerPeak => (GATEWAY_ENTITY.to_owned(), "powerPeakReset"),
        }
    }

    /// Request body for the setters that write to the gateway
    pub fn body(&self) -> Option<Value> {
        match self {
            Self::SetProduction(allowed) => {
                Some(json!({"length": 1, "arr": [u8::from(!allowed)]}))
            }
            Self::SetEnpowerRelay(closed) => Some(json!({
                "mains_admin_state": if *closed { "closed" } else { "open" }
            })),
            Self::SetDryContact { id, closed } => Some(json!({
                "dry_contacts": {"id": id, "status": if *closed { "closed" } else { "open" }}
            })),
            Self::SetGeneratorMode(mode) => Some(json!({"gen_mode": mode.as_vendor()})),
            Self::RefreshPlcLevel | Self::ResetPowerPeak => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_lock_unlock() {
        let gate = ControlGate::default();
        assert!(gate.check().is_ok());
        gate.lock();
        gate.lock();
        assert!(gate.is_locked());
        assert!(matches!(gate.check(), Err(EnvoyError::ControlLocked)));
        gate.unlock();
        assert!(!gate.is_locked());
    }

    #[test]
    fn test_request_bodies() {
        assert_eq!(
            ControlRequest::SetProduction(false).body(),
            Some(json!({"length": 1, "arr": [1]}))
        );
        assert_eq!(
            ControlRequest::SetProduction(true).body(),
            Some(json!({"length": 1, "arr": [0]}))
        );
        assert_eq!(
            ControlRequest::SetDryContact {
                id: "NC1".to_owned(),
                closed: true
            }
            .body(),
            Some(json!({"dry_contacts": {"id": "NC1", "status": "closed"}}))
        );
        assert_eq!(
            ControlRequest::SetGeneratorMode(GeneratorMode::Auto).body(),
            Some(json!({"gen_mode": "auto"}))
        );
        assert!(ControlRequest::ResetPowerPeak.body().is_none());
    }

    #[test]
    fn test_dry_contact_property() {
        let request = ControlRequest::SetDryContact {
            id: "NO1".to_owned(),
            closed: false,
        };
        assert_eq!(request.property(), ("dryContact/NO1".to_owned(), "state"));
    }
}
