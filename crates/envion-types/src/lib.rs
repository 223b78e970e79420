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

//! Canonical data model for an Envoy gateway.
//!
//! Everything in here is plain data. Normalizers in `envion-core` write these
//! structures and sinks read them; nothing here talks to the network.

pub mod ensemble;
pub mod features;
pub mod home;
pub mod info;
pub mod inventory;
pub mod live_data;
pub mod meters;
pub mod power;
pub mod sensors;
pub mod state;
pub mod token;

pub use ensemble::{
    DryContact, Encharge, EnchargeSettings, Enpower, Ensemble, EnsembleDevice, Generator,
    GeneratorSettings, Profile, Relay, SecCtrl, TariffSummary,
};
pub use features::{Capability, FeatureRegistry, MeterChannelFeature, MetersFeature};
pub use home::{CommLevel, CommSummary, HomeData, NetworkInterface, WirelessConnection};
pub use info::{EnvoyInfo, FIRMWARE_TOKEN_GENERATION, Package, firmware_number};
pub use inventory::{AcBattery, DeviceChannelData, Esub, Inventory, Microinverter, QRelay};
pub use live_data::{LiveData, LiveDataConnection, LiveDataMeters, LivePower};
pub use meters::{MeasurementType, MeterDescriptor, MeterOrigin, MeterPhaseReading, PhaseMode};
pub use power::{PowerAndEnergy, PowerSummary, SourceKind, SourceSample};
pub use sensors::{GridModeSource, GridQuantity, SensorDescriptor, SensorKind};
pub use state::{GridProfile, PvState};
pub use token::{JwtToken, TOKEN_EXPIRY_GUARD_SECS};
