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

//! The 9-digit gateway device id, needed for the production on/off endpoint.
//!
//! It only appears inside `/backbone/application.js`, so it is scraped once and
//! cached as plain text next to the token cache.

use std::path::PathBuf;
use tracing::{debug, warn};

use crate::constants::paths;
use crate::error::{EnvoyError, EnvoyResult};
use crate::session::HttpSession;

const DEVICE_ID_LEN: usize = 9;
const DEVICE_ID_KEY: &str = "envoyDevId";

/// Pull `envoyDevId:'123456789'` out of the backbone script
pub fn parse_device_id(script: &str) -> Option<String> {
    let start = script.find(DEVICE_ID_KEY)? + DEVICE_ID_KEY.len();
    let rest = &script[start..];
    let digits: String = rest
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    (digits.len() == DEVICE_ID_LEN).then_some(digits)
}

#[derive(Debug, Clone)]
pub struct DeviceIdCache {
    path: PathBuf,
}

impl DeviceIdCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn read(&self) -> Option<String> {
        let body = tokio::fs::read_to_string(&self.path).await.ok()?;
        let id = body.trim();
        if id.len() == DEVICE_ID_LEN && id.chars().all(|c| c.is_ascii_digit()) {
            Some(id.to_owned())
        } else {
            warn!(
                "⚠️ [DEVICE ID] Ignoring malformed cache {}",
                self.path.display()
            );
            None
        }
    }

    pub async fn write(&self, id: &str) -> EnvoyResult<()> {
        tokio::fs::write(&self.path, id).await?;
        Ok(())
    }

    /// Cached id, otherwise scraped from the gateway and written back
    pub async fn resolve(&self, session: &HttpSession) -> EnvoyResult<String> {
        if let Some(id) = self.read().await {
            debug!("📂 [DEVICE ID] Using cached id {}", id);
            return Ok(id);
        }

        let script = session.get_text(paths::BACKBONE_APP).await?;
        let id = parse_device_id(&script)
            .ok_or(EnvoyError::MissingField(DEVICE_ID_KEY))?;
        if let Err(e) = self.write(&id).await {
            warn!(
                "⚠️ [DEVICE ID] Could not write cache {}: {}",
                self.path.display(),
                e
            );
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_device_id() {
        let script = "var x = {serial:'1220',envoyDevId:'123456789',foo:1};";
        assert_eq!(parse_device_id(script).as_deref(), Some("123456789"));
        assert!(parse_device_id("envoyDevId:'1234'").is_none());
        assert!(parse_device_id("nothing here").is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefers_cache_then_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DeviceIdCache::new(dir.path().join("envoyId.txt"));

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/backbone/application.js")
            .with_body("BackboneConfig={envoyDevId:'987654321'}")
            .expect(1)
            .create_async()
            .await;
        let session = HttpSession::new(server.url(), Duration::from_secs(5)).unwrap();

        assert_eq!(cache.resolve(&session).await.unwrap(), "987654321");
        // second call is served from the file
        assert_eq!(cache.resolve(&session).await.unwrap(), "987654321");
        mock.assert_async().await;
    }
}
