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

//! `/info.xml`: gateway identity and firmware generation

use envion_types::features::InfoFeature;
use envion_types::{EnvoyInfo, FIRMWARE_TOKEN_GENERATION, Package, firmware_number};
use serde::Deserialize;

use crate::error::{EnvoyError, EnvoyResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlInfo {
    time: Option<String>,
    device: XmlDevice,
    #[serde(rename = "web-tokens")]
    web_tokens: Option<String>,
    #[serde(rename = "package")]
    packages: Vec<XmlPackage>,
    build_info: XmlBuildInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlDevice {
    sn: Option<String>,
    pn: Option<String>,
    software: Option<String>,
    euaid: Option<String>,
    seqnum: Option<String>,
    apiver: Option<String>,
    imeter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlPackage {
    #[serde(rename = "@pkg")]
    name: Option<String>,
    pn: Option<String>,
    version: Option<String>,
    build: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlBuildInfo {
    build_id: Option<String>,
    build_time_gmt: Option<String>,
}

fn text(value: Option<String>) -> String {
    value.map(|v| v.trim().to_owned()).unwrap_or_default()
}

fn number<T: std::str::FromStr + Default>(value: Option<&String>) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or_default()
}

/// Parse `/info.xml` into `info`.
///
/// A missing serial number is a hard failure: it keys everything downstream.
pub fn apply_info(xml: &str, info: &mut EnvoyInfo, feature: &mut InfoFeature) -> EnvoyResult<()> {
    let parsed: XmlInfo =
        serde_xml_rs::from_str(xml).map_err(|e| EnvoyError::Xml(e.to_string()))?;

    let serial = text(parsed.device.sn);
    if serial.is_empty() {
        feature.supported = false;
        return Err(EnvoyError::MissingField("sn"));
    }

    let software = text(parsed.device.software);
    let firmware = firmware_number(&software).unwrap_or(0);
    let firmware7xx = firmware >= FIRMWARE_TOKEN_GENERATION;

    *info = EnvoyInfo {
        time: number(parsed.time.as_ref()),
        serial_number: serial,
        part_number: text(parsed.device.pn),
        software,
        firmware,
        firmware7xx,
        euaid: text(parsed.device.euaid),
        seqnum: number(parsed.device.seqnum.as_ref()),
        apiver: number(parsed.device.apiver.as_ref()),
        imeter: text(parsed.device.imeter) == "true",
        web_tokens: text(parsed.web_tokens) == "true",
        packages: parsed
            .packages
            .into_iter()
            .map(|p| Package {
                name: text(p.name),
                part_number: text(p.pn),
                version: text(p.version),
                build: text(p.build),
            })
            .collect(),
        build_id: text(parsed.build_info.build_id),
        build_time_gmt: number(parsed.build_info.build_time_gmt.as_ref()),
    };

    feature.supported = true;
    feature.firmware7xx = firmware7xx;
    Ok(())
}
