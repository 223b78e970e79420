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

//! JWT acquisition, decoding and the on-disk token cache

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use envion_types::JwtToken;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::{ENLIGHTEN_LOGIN_PATH, ENTREZ_TOKENS_PATH};
use crate::error::{EnvoyResult, TokenError};

/// Claims we care about from the token payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct JwtClaims {
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Decode the (unverified) payload segment of a JWT
pub fn decode_claims(token: &str) -> Result<JwtClaims, TokenError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| TokenError::Malformed("expected three dot-separated segments".to_owned()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Malformed(format!("payload is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("payload is not a claims object: {e}")))
}

/// Wrap a raw JWT string into a bundle, reading times from its payload
pub fn bundle_token(raw: &str, installer: bool) -> Result<JwtToken, TokenError> {
    let token = raw.trim().trim_matches('"').to_owned();
    let claims = decode_claims(&token)?;
    Ok(JwtToken {
        generation_time: claims
            .iat
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        expires_at: claims.exp,
        token,
        installer,
    })
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session_id: Option<String>,
    message: Option<String>,
}

/// Enlighten login plus Entrez token request
pub struct CloudIdentity {
    client: Client,
    enlighten_url: String,
    entrez_url: String,
}

impl CloudIdentity {
    pub fn new(
        enlighten_url: impl Into<String>,
        entrez_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TokenError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TokenError::Request(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            enlighten_url: enlighten_url.into(),
            entrez_url: entrez_url.into(),
        })
    }

    /// Fetch a fresh JWT for the gateway `serial`
    pub async fn fetch_cloud_token(
        &self,
        user: &str,
        passwd: &str,
        serial: &str,
    ) -> Result<JwtToken, TokenError> {
        info!("☁️ [TOKEN] Requesting token from cloud for gateway {}", serial);

        let login: LoginResponse = self
            .client
            .post(format!("{}{}", self.enlighten_url, ENLIGHTEN_LOGIN_PATH))
            .form(&[("user[email]", user), ("user[password]", passwd)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TokenError::Login(e.to_string()))?
            .json()
            .await
            .map_err(|e| TokenError::Login(e.to_string()))?;

        let session_id = login.session_id.ok_or_else(|| {
            TokenError::Login(
                login
                    .message
                    .unwrap_or_else(|| "no session id in login response".to_owned()),
            )
        })?;
        debug!("☁️ [TOKEN] Enlighten login ok");

        let raw = self
            .client
            .post(format!("{}{}", self.entrez_url, ENTREZ_TOKENS_PATH))
            .json(&json!({
                "session_id": session_id,
                "serial_num": serial,
                "username": user,
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TokenError::Request(e.to_string()))?
            .text()
            .await
            .map_err(|e| TokenError::Request(e.to_string()))?;

        let token = bundle_token(&raw, false)?;
        info!(
            "✅ [TOKEN] Cloud token issued, expires at {}",
            token.expires_at
        );
        Ok(token)
    }
}

/// JSON token cache file
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached bundle, `None` when missing or unreadable
    pub async fn read(&self) -> Option<JwtToken> {
        let body = match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => body,
            Err(e) => {
                debug!("📂 [TOKEN] No token cache at {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&body) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(
                    "⚠️ [TOKEN] Ignoring corrupt token cache {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    pub async fn write(&self, token: &JwtToken) -> EnvoyResult<()> {
        let body = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.path, body).await?;
        debug!("💾 [TOKEN] Token cached to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_jwt(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_claims() {
        let jwt = make_jwt(r#"{"exp":1800000000,"iat":1700000000,"username":"a@b.c"}"#);
        let claims = decode_claims(&jwt).unwrap();
        assert_eq!(claims.exp, 1_800_000_000);
        assert_eq!(claims.iat, Some(1_700_000_000));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_claims("not-a-jwt"),
            Err(TokenError::Malformed(_))
        ));
        assert!(decode_claims("a.!!!.c").is_err());
    }

    #[test]
    fn test_bundle_strips_quotes() {
        let jwt = make_jwt(r#"{"exp":1800000000}"#);
        let bundle = bundle_token(&format!("\"{jwt}\"\n"), true).unwrap();
        assert_eq!(bundle.token, jwt);
        assert!(bundle.installer);
        assert_eq!(bundle.expires_at, 1_800_000_000);
    }

    #[tokio::test]
    async fn test_cache_round_trip_and_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        assert!(cache.read().await.is_none());

        let token = JwtToken {
            token: "abc".to_owned(),
            generation_time: 1,
            expires_at: 2,
            installer: false,
        };
        cache.write(&token).await.unwrap();
        assert_eq!(cache.read().await, Some(token));

        std::fs::write(cache.path(), "{broken").unwrap();
        assert!(cache.read().await.is_none());
    }

    #[tokio::test]
    async fn test_cloud_flow() {
        let mut enlighten = mockito::Server::new_async().await;
        let mut entrez = mockito::Server::new_async().await;
        let jwt = make_jwt(r#"{"exp":1900000000,"iat":1800000000}"#);

        let _login = enlighten
            .mock("POST", "/login/login.json")
            .match_body(mockito::Matcher::UrlEncoded(
                "user[email]".to_owned(),
                "me@example.com".to_owned(),
            ))
            .with_body(r#"{"session_id":"sess-1","manager_token":"m"}"#)
            .create_async()
            .await;
        let _tokens = entrez
            .mock("POST", "/tokens")
            .match_body(mockito::Matcher::PartialJson(json!({
                "session_id": "sess-1",
                "serial_num": "122012345678",
            })))
            .with_body(jwt.clone())
            .create_async()
            .await;

        let identity =
            CloudIdentity::new(enlighten.url(), entrez.url(), Duration::from_secs(5)).unwrap();
        let token = identity
            .fetch_cloud_token("me@example.com", "pw", "122012345678")
            .await
            .unwrap();
        assert_eq!(token.token, jwt);
        assert_eq!(token.expires_at, 1_900_000_000);
        assert_eq!(token.generation_time, 1_800_000_000);
        assert!(!token.installer);
    }

    #[tokio::test]
    async fn test_cloud_login_failure() {
        let mut enlighten = mockito::Server::new_async().await;
        let _login = enlighten
            .mock("POST", "/login/login.json")
            .with_body(r#"{"message":"Invalid credentials"}"#)
            .create_async()
            .await;

        let identity =
            CloudIdentity::new(enlighten.url(), "http://127.0.0.1:9", Duration::from_secs(5))
                .unwrap();
        let err = identity
            .fetch_cloud_token("me@example.com", "bad", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Login(m) if m.contains("Invalid credentials")));
    }
}
