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

use envion_core::PropertySink;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// Writes every property change to the log.
///
/// Stands in for an accessory layer when none is attached; repeated values
/// are logged at debug level only.
#[derive(Debug, Default)]
pub struct PropertyLog {
    last: Mutex<HashMap<String, Value>>,
}

impl PropertyLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertySink for PropertyLog {
    fn publish(&self, entity: &str, property: &str, value: &Value) {
        let key = format!("{entity}.{property}");
        let changed = self.last.lock().insert(key, value.clone()).as_ref() != Some(value);
        if changed {
            info!(entity, property, "🏷️ [PROPERTY] {}", value);
        } else {
            debug!(entity, property, "🏷️ [PROPERTY] {} (unchanged)", value);
        }
    }
}
