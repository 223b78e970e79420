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

use thiserror::Error;

/// Gateway access error types
#[derive(Error, Debug)]
pub enum EnvoyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned status {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Gateway rejected credentials (401) for {path}")]
    Unauthorized { path: String },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    Xml(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Not supported by this gateway: {0}")]
    NotSupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Control is locked")]
    ControlLocked,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EnvoyError {
    /// HTTP 401: the cached token is stale and must be fetched again
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Status { status, .. } => *status == 401,
            Self::Http(e) => e.status().is_some_and(|s| s.as_u16() == 401),
            other => other.to_string().contains("401"),
        }
    }
}

/// Credential and token lifecycle errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Cloud login failed: {0}")]
    Login(String),

    #[error("Token request failed: {0}")]
    Request(String),

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token rejected by gateway")]
    Rejected,

    #[error("No token available")]
    Missing,
}

pub type EnvoyResult<T> = Result<T, EnvoyError>;
