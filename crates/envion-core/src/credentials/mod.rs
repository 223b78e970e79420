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

//! Device-local passwords and the JWT lifecycle.
//!
//! Firmware before 7.0 uses HTTP digest with passwords derived from the serial
//! number. Newer firmware wants a JWT, either fetched from the cloud identity
//! service or supplied as a long-lived installer token, and validated against
//! the gateway before use.

mod installer;
mod manager;
mod password;
mod token;

pub use installer::installer_password;
pub use manager::{CredentialManager, TokenCheck};
pub use password::{derive_envoy_password, derive_installer_password};
pub use token::{CloudIdentity, JwtClaims, TokenCache, bundle_token, decode_claims};
