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

//! Gateway endpoint paths and fixed protocol values

/// Microinverter list is capped at this many entries
pub const MAX_MICROINVERTERS: usize = 70;

/// Device signal and comm levels come on a 0-5 scale
pub const LEVEL_TO_PERCENT: u32 = 20;

pub const VALID_TOKEN_MARKER: &str = "Valid token";

pub const ENVOY_USER: &str = "envoy";
pub const INSTALLER_USER: &str = "installer";
pub const INSTALLER_REALM: &str = "enphaseenergy.com";

pub const ENLIGHTEN_URL: &str = "https://enlighten.enphaseenergy.com";
pub const ENTREZ_URL: &str = "https://entrez.enphaseenergy.com";
pub const ENLIGHTEN_LOGIN_PATH: &str = "/login/login.json";
pub const ENTREZ_TOKENS_PATH: &str = "/tokens";

pub mod paths {
    pub const INFO: &str = "/info.xml";
    pub const HOME: &str = "/home.json";
    pub const INVENTORY: &str = "/inventory.json";
    pub const BACKBONE_APP: &str = "/backbone/application.js";
    pub const CHECK_JWT: &str = "/auth/check_jwt";

    pub const PRODUCTION: &str = "/api/v1/production";
    pub const PCU_STATUS: &str = "/api/v1/production/inverters";
    pub const PRODUCTION_PDM: &str = "/ivp/pdm/energy";
    pub const PRODUCTION_CT: &str = "/production.json?details=1";
    pub const DETAILED_DEVICES: &str = "/ivp/pdm/device_data";

    pub const METERS: &str = "/ivp/meters";
    pub const METERS_READINGS: &str = "/ivp/meters/readings";
    pub const METERS_REPORTS: &str = "/ivp/meters/reports";

    pub const ENSEMBLE_INVENTORY: &str = "/ivp/ensemble/inventory";
    pub const ENSEMBLE_STATUS: &str = "/ivp/ensemble/status";
    pub const ENSEMBLE_RELAY: &str = "/ivp/ensemble/relay";
    pub const ENCHARGE_SETTINGS: &str = "/ivp/ss/enc_settings";
    pub const TARIFF: &str = "/admin/lib/tariff";
    pub const DRY_CONTACTS: &str = "/ivp/ensemble/dry_contacts";
    pub const DRY_CONTACTS_SETTINGS: &str = "/ivp/ss/dry_contact_settings";
    pub const GENERATOR: &str = "/ivp/ss/generator";
    pub const GENERATOR_SETTINGS: &str = "/ivp/ss/gen_config";
    pub const GENERATOR_MODE: &str = "/ivp/ss/gen_mode";

    pub const LIVE_DATA: &str = "/ivp/livedata/status";
    pub const LIVE_DATA_STREAM: &str = "/ivp/livedata/stream";

    pub const GRID_PROFILE: &str = "/installer/agf/index.json?simplified=true";
    pub const PLC_LEVEL: &str = "/installer/pcu_comm_check";

    /// Production on/off for the gateway identified by its 9-digit device id
    pub fn production_state(device_id: &str) -> String {
        format!("/ivp/mod/{device_id}/mode/power")
    }
}
