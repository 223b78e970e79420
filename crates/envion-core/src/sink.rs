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

//! Best-effort fan-out of normalized payloads to external consumers.
//!
//! Sinks are called synchronously after each normalizer. They must not block:
//! network-backed sinks queue the payload and return. Errors are logged here
//! and never reach the orchestrator.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which part of the state a payload describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Info,
    Home,
    Inventory,
    PcuStatus,
    DetailedDevices,
    Meters,
    MetersReadings,
    MetersReports,
    Production,
    ProductionPdm,
    ProductionCt,
    PowerAndEnergy,
    EnsembleInventory,
    EnsembleStatus,
    EnchargeSettings,
    Tariff,
    DryContacts,
    DryContactsSettings,
    Generator,
    GeneratorSettings,
    LiveData,
    GridProfile,
    PlcLevel,
    ProductionState,
    Features,
    State,
}

impl Domain {
    pub const ALL: [Self; 26] = [
        Self::Info,
        Self::Home,
        Self::Inventory,
        Self::PcuStatus,
        Self::DetailedDevices,
        Self::Meters,
        Self::MetersReadings,
        Self::MetersReports,
        Self::Production,
        Self::ProductionPdm,
        Self::ProductionCt,
        Self::PowerAndEnergy,
        Self::EnsembleInventory,
        Self::EnsembleStatus,
        Self::EnchargeSettings,
        Self::Tariff,
        Self::DryContacts,
        Self::DryContactsSettings,
        Self::Generator,
        Self::GeneratorSettings,
        Self::LiveData,
        Self::GridProfile,
        Self::PlcLevel,
        Self::ProductionState,
        Self::Features,
        Self::State,
    ];

    /// Path segment under the REST sink's `/api/`
    pub fn rest_topic(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Home => "home",
            Self::Inventory => "inventory",
            Self::PcuStatus => "pcustatus",
            Self::DetailedDevices => "detaileddevices",
            Self::Meters => "meters",
            Self::MetersReadings => "metersreading",
            Self::MetersReports => "metersreports",
            Self::Production => "production",
            Self::ProductionPdm => "productionpdm",
            Self::ProductionCt => "productionct",
            Self::PowerAndEnergy => "powerandenergydata",
            Self::EnsembleInventory => "ensembleinventory",
            Self::EnsembleStatus => "ensemblestatus",
            Self::EnchargeSettings => "enchargesettings",
            Self::Tariff => "tariff",
            Self::DryContacts => "drycontacts",
            Self::DryContactsSettings => "drycontactssettings",
            Self::Generator => "generator",
            Self::GeneratorSettings => "generatorsettings",
            Self::LiveData => "livedata",
            Self::GridProfile => "gridprofile",
            Self::PlcLevel => "plclevel",
            Self::ProductionState => "productionstate",
            Self::Features => "features",
            Self::State => "state",
        }
    }

    /// Topic suffix for the MQTT sink
    pub fn mqtt_label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Home => "home",
            Self::Inventory => "inventory",
            Self::PcuStatus => "pcu_status",
            Self::DetailedDevices => "detailed_devices",
            Self::Meters => "meters",
            Self::MetersReadings => "meters_readings",
            Self::MetersReports => "meters_reports",
            Self::Production => "production",
            Self::ProductionPdm => "production_pdm",
            Self::ProductionCt => "production_ct",
            Self::PowerAndEnergy => "power_and_energy",
            Self::EnsembleInventory => "ensemble_inventory",
            Self::EnsembleStatus => "ensemble_status",
            Self::EnchargeSettings => "encharge_settings",
            Self::Tariff => "tariff",
            Self::DryContacts => "dry_contacts",
            Self::DryContactsSettings => "dry_contacts_settings",
            Self::Generator => "generator",
            Self::GeneratorSettings => "generator_settings",
            Self::LiveData => "live_data",
            Self::GridProfile => "grid_profile",
            Self::PlcLevel => "plc_level",
            Self::ProductionState => "production_state",
            Self::Features => "features",
            Self::State => "state",
        }
    }

    pub fn from_rest_topic(topic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.rest_topic() == topic)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mqtt_label())
    }
}

/// Receiver of whole-domain payloads (REST snapshot, MQTT)
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    fn on_update(&self, domain: Domain, payload: &Value) -> anyhow::Result<()>;
}

/// Receiver of per-entity property values (the accessory layer)
pub trait PropertySink: Send + Sync {
    fn publish(&self, entity: &str, property: &str, value: &Value);
}

/// All attached sinks plus the last value published for every property
#[derive(Default)]
pub struct SinkHub {
    sinks: Vec<Arc<dyn Sink>>,
    properties: Vec<Arc<dyn PropertySink>>,
    last: Mutex<HashMap<(String, String), Value>>,
}

impl fmt::Debug for SinkHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkHub")
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("property_sinks", &self.properties.len())
            .finish_non_exhaustive()
    }
}

impl SinkHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Arc<dyn Sink>) {
        debug!("🔌 [SINK] Attached {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn add_property_sink(&mut self, sink: Arc<dyn PropertySink>) {
        self.properties.push(sink);
    }

    pub fn has_sinks(&self) -> bool {
        !self.sinks.is_empty()
    }

    /// Push one domain payload to every sink; failures are only logged
    pub fn update(&self, domain: Domain, payload: &Value) {
        for sink in &self.sinks {
            if let Err(e) = sink.on_update(domain, payload) {
                warn!("⚠️ [SINK] {} failed for {}: {}", sink.name(), domain, e);
            }
        }
    }

    /// Publish a property value and remember it for `republish`
    pub fn publish_property(&self, entity: &str, property: &str, value: Value) {
        for sink in &self.properties {
            sink.publish(entity, property, &value);
        }
        self.last
            .lock()
            .insert((entity.to_owned(), property.to_owned()), value);
    }

    pub fn last_property(&self, entity: &str, property: &str) -> Option<Value> {
        self.last
            .lock()
            .get(&(entity.to_owned(), property.to_owned()))
            .cloned()
    }

    /// Send the last known value again, e.g. to undo an optimistic UI change.
    ///
    /// Returns false when the property was never published.
    pub fn republish(&self, entity: &str, property: &str) -> bool {
        let Some(value) = self.last_property(entity, property) else {
            return false;
        };
        for sink in &self.properties {
            sink.publish(entity, property, &value);
        }
        true
    }
}
