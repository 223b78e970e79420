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

/// Tokens expiring within this many seconds are treated as expired
pub const TOKEN_EXPIRY_GUARD_SECS: i64 = 60;

/// JWT bundle, also the on-disk token cache format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtToken {
    pub token: String,
    /// Unix seconds
    pub generation_time: i64,
    /// Unix seconds
    pub expires_at: i64,
    /// Installer tokens are long-lived and skip the expiry check
    #[serde(default)]
    pub installer: bool,
}

impl JwtToken {
    /// Usable at `now` (unix seconds)
    pub fn token_exist(&self, now: i64) -> bool {
        if self.token.is_empty() {
            return false;
        }
        self.installer || self.expires_at - now >= TOKEN_EXPIRY_GUARD_SECS
    }
}
