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

//! Installer password calculator.
//!
//! Pre-7.x gateways accept a digest password for the `installer` user that is
//! derived from the gateway serial number alone.

use md5::{Digest, Md5};

const PASSWORD_LEN: usize = 8;

/// Installer password for `serial` in the given user/realm
pub fn installer_password(serial: &str, user: &str, realm: &str) -> String {
    let hash = md5_hex(&format!("[e]{user}@{realm}#{serial} EnPhAsE eNeRgY "));

    let mut count_zero = hash.chars().filter(|c| *c == '0').count() as i32;
    let mut count_one = hash.chars().filter(|c| *c == '1').count() as i32;

    let mut password = String::with_capacity(PASSWORD_LEN);
    for ch in hash.chars().rev().take(PASSWORD_LEN) {
        if matches!(count_zero, 3 | 6 | 9) {
            count_zero -= 1;
        }
        count_zero = count_zero.clamp(0, 20);
        if matches!(count_one, 9 | 15) {
            count_one -= 1;
        }
        count_one = count_one.clamp(0, 26);

        match ch {
            '0' => {
                password.push(offset_char('f', count_zero));
                count_zero -= 1;
            }
            '1' => {
                password.push(offset_char('@', count_one));
                count_one -= 1;
            }
            other => password.push(other),
        }
    }
    password
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

fn offset_char(base: char, offset: i32) -> char {
    // offset is clamped to 0..=26, so the result stays within ASCII
    char::from_u32(base as u32 + offset as u32).unwrap_or(base)
}
