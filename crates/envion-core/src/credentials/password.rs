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

use tracing::warn;

use super::installer::installer_password;
use crate::constants::{INSTALLER_REALM, INSTALLER_USER};

const ENVOY_PASSWD_LEN: usize = 6;

/// Password for the `envoy` digest user.
///
/// An explicitly configured password is used as is. Otherwise it is the last
/// six characters of the serial number; a serial too short for that yields
/// `None` and the dependent endpoints stay disabled.
pub fn derive_envoy_password(configured: Option<&str>, serial: &str) -> Option<String> {
    if let Some(passwd) = configured.filter(|p| !p.is_empty()) {
        return Some(passwd.to_owned());
    }

    let chars: Vec<char> = serial.chars().collect();
    let start = chars.len().saturating_sub(ENVOY_PASSWD_LEN);
    let passwd: String = chars[start..].iter().collect();

    if passwd.chars().count() != ENVOY_PASSWD_LEN {
        warn!(
            "⚠️ [CREDENTIALS] Envoy password derived from serial '{}' has wrong length {}",
            serial,
            passwd.chars().count()
        );
        return None;
    }
    Some(passwd)
}

/// Password for the `installer` digest user
pub fn derive_installer_password(serial: &str) -> Option<String> {
    let passwd = installer_password(serial, INSTALLER_USER, INSTALLER_REALM);
    if passwd.chars().count() <= 1 {
        warn!(
            "⚠️ [CREDENTIALS] Installer password for serial '{}' could not be calculated",
            serial
        );
        return None;
    }
    Some(passwd)
}
