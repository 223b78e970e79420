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

use serde::{Deserialize, Serialize};

/// Firmware number from which local access needs a JWT
pub const FIRMWARE_TOKEN_GENERATION: u32 = 700;

/// Gateway identity from `/info.xml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvoyInfo {
    pub time: i64,
    pub serial_number: String,
    pub part_number: String,
    /// Raw software string, e.g. `D7.6.175`
    pub software: String,
    pub firmware: u32,
    pub firmware7xx: bool,
    pub euaid: String,
    pub seqnum: u32,
    pub apiver: u32,
    pub imeter: bool,
    pub web_tokens: bool,
    pub packages: Vec<Package>,
    pub build_id: String,
    pub build_time_gmt: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub name: String,
    pub part_number: String,
    pub version: String,
    pub build: String,
}

/// Numeric firmware version: `major * 100 + minor`.
///
/// Leading non-digits are dropped (`D7.6.175` -> 706, `R4.10.35` -> 410).
/// Returns `None` when no major version can be read.
pub fn firmware_number(software: &str) -> Option<u32> {
    let trimmed = software.trim_start_matches(|c: char| !c.is_ascii_digit());
    let mut parts = trimmed.split('.');
    let major = leading_digits(parts.next()?)?;
    let minor = parts.next().and_then(leading_digits).unwrap_or(0).min(99);
    Some(major * 100 + minor)
}

fn leading_digits(part: &str) -> Option<u32> {
    let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_number_seven() {
        assert_eq!(firmware_number("D7.6.175"), Some(706));
    }

    #[test]
    fn test_firmware_number_old_generation() {
        assert_eq!(firmware_number("R4.10.35"), Some(410));
        assert_eq!(firmware_number("D5.0.62"), Some(500));
    }

    #[test]
    fn test_firmware_number_eight() {
        assert_eq!(firmware_number("D8.2.4382"), Some(802));
    }

    #[test]
    fn test_firmware_number_garbage() {
        assert_eq!(firmware_number("unknown"), None);
        assert_eq!(firmware_number(""), None);
    }
}
