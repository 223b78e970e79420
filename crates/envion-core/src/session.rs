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

use http_auth::{PasswordClient, PasswordParams};
use parking_lot::RwLock;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderValue, SET_COOKIE, WWW_AUTHENTICATE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::error::{EnvoyError, EnvoyResult};

/// How a single request authenticates
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    /// Whatever the current client carries (bearer header after token validation)
    Session,
    /// HTTP Digest with the given user, pre-7.x gateways only
    Digest { user: &'a str, passwd: &'a str },
}

/// Gateway HTTP client bound to one base URL.
///
/// The inner client is replaced wholesale when a token is validated. Requests
/// clone the current client before sending, so in-flight calls keep the old one.
pub struct HttpSession {
    base_url: RwLock<String>,
    client: RwLock<Client>,
    timeout: Duration,
}

impl HttpSession {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> EnvoyResult<Self> {
        let client = build_client(timeout, HeaderMap::new())?;
        Ok(Self {
            base_url: RwLock::new(base_url.into()),
            client: RwLock::new(client),
            timeout,
        })
    }

    pub fn base_url(&self) -> String {
        self.base_url.read().clone()
    }

    pub fn set_base_url(&self, base_url: impl Into<String>) {
        *self.base_url.write() = base_url.into();
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.read(), path)
    }

    fn client(&self) -> Client {
        self.client.read().clone()
    }

    /// Swap in a client that sends the bearer token (and session cookie) on every request
    pub fn swap_bearer(&self, token: &str, session_cookie: Option<&str>) -> EnvoyResult<()> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| EnvoyError::InvalidResponse(format!("Token is not a valid header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        if let Some(cookie) = session_cookie {
            let value = HeaderValue::from_str(&format!("sessionId={cookie}")).map_err(|e| {
                EnvoyError::InvalidResponse(format!("Session cookie is not a valid header: {e}"))
            })?;
            headers.insert(COOKIE, value);
        }

        let client = build_client(self.timeout, headers)?;
        *self.client.write() = client;
        debug!("🔑 [ENVOY HTTP] Bearer client installed");
        Ok(())
    }

    /// GET with status mapping (401 becomes `Unauthorized`)
    pub async fn get(&self, path: &str) -> EnvoyResult<Response> {
        trace!("🔍 [ENVOY HTTP] GET {}", path);
        let response = self.client().get(self.url(path)).send().await?;
        check_status(response, path)
    }

    pub async fn get_text(&self, path: &str) -> EnvoyResult<String> {
        Ok(self.get(path).await?.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> EnvoyResult<T> {
        let body = self.get_text(path).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET `path` with the given auth, answering a digest challenge once
    pub async fn get_auth_json(&self, path: &str, auth: Auth<'_>) -> EnvoyResult<Value> {
        match auth {
            Auth::Session => self.get_json(path).await,
            Auth::Digest { user, passwd } => self.get_digest_json(path, user, passwd).await,
        }
    }

    pub async fn get_digest_json(&self, path: &str, user: &str, passwd: &str) -> EnvoyResult<Value> {
        let body = self
            .send_digest(Method::GET, path, None, user, passwd)
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn put_json(&self, path: &str, body: &Value, auth: Auth<'_>) -> EnvoyResult<String> {
        self.send_json(Method::PUT, path, body, auth).await
    }

    pub async fn post_json(&self, path: &str, body: &Value, auth: Auth<'_>) -> EnvoyResult<String> {
        self.send_json(Method::POST, path, body, auth).await
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: &Value,
        auth: Auth<'_>,
    ) -> EnvoyResult<String> {
        debug!("📤 [ENVOY HTTP] {} {}", method, path);
        match auth {
            Auth::Session => {
                let response = self
                    .client()
                    .request(method, self.url(path))
                    .json(body)
                    .send()
                    .await?;
                Ok(check_status(response, path)?.text().await?)
            }
            Auth::Digest { user, passwd } => {
                self.send_digest(method, path, Some(body), user, passwd)
                    .await
            }
        }
    }

    async fn send_digest(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        user: &str,
        passwd: &str,
    ) -> EnvoyResult<String> {
        let client = self.client();
        let url = self.url(path);

        let mut request = client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let first = request.send().await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return Ok(check_status(first, path)?.text().await?);
        }

        let challenge = first
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| EnvoyError::Unauthorized {
                path: path.to_owned(),
            })?;
        let mut responder = PasswordClient::try_from(challenge).map_err(|e| {
            warn!("🔒 [ENVOY HTTP] Unusable challenge for {}: {}", path, e);
            EnvoyError::Unauthorized {
                path: path.to_owned(),
            }
        })?;

        // Digest covers the request-uri, query string included. Without a body
        // the responder settles on qop=auth.
        let authorization = responder
            .respond(&PasswordParams {
                username: user,
                password: passwd,
                uri: path,
                method: method.as_str(),
                body: None,
            })
            .map_err(|e| EnvoyError::InvalidResponse(format!("Digest response failed: {e}")))?;
        let mut request = client
            .request(method, &url)
            .header(AUTHORIZATION, authorization);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Ok(check_status(response, path)?.text().await?)
    }

    /// Present `token` to the gateway's JWT check endpoint.
    ///
    /// Returns the response body and the `sessionId` cookie if one was set.
    pub async fn check_jwt(&self, path: &str, token: &str) -> EnvoyResult<(String, Option<String>)> {
        let response = self
            .client()
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?;
        let response = check_status(response, path)?;
        let cookie = session_cookie(response.headers());
        let body = response.text().await?;
        Ok((body, cookie))
    }
}

fn build_client(timeout: Duration, headers: HeaderMap) -> EnvoyResult<Client> {
    // Gateways serve self-signed certificates
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(true)
        .default_headers(headers)
        .build()
        .map_err(|e| EnvoyError::Config(format!("Failed to build HTTP client: {e}")))
}

fn check_status(response: Response, path: &str) -> EnvoyResult<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED => {
            warn!("🔒 [ENVOY HTTP] 401 for {}", path);
            Err(EnvoyError::Unauthorized {
                path: path.to_owned(),
            })
        }
        status => Err(EnvoyError::Status {
            status: status.as_u16(),
            path: path.to_owned(),
        }),
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|part| part.trim().strip_prefix("sessionId="))
        .map(str::to_owned)
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_extraction() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("other=1; Path=/"));
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("sessionId=abc123; Path=/; HttpOnly"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_no_session_cookie() {
        let headers = HeaderMap::new();
        assert!(session_cookie(&headers).is_none());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/home.json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;
        let _denied = server
            .mock("GET", "/ivp/meters")
            .with_status(401)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/ivp/pdm/energy")
            .with_status(404)
            .create_async()
            .await;

        let session = HttpSession::new(server.url(), Duration::from_secs(5)).unwrap();
        let value: Value = session.get_json("/home.json").await.unwrap();
        assert_eq!(value["ok"], true);

        let err = session.get("/ivp/meters").await.unwrap_err();
        assert!(err.is_auth_expired());

        let err = session.get("/ivp/pdm/energy").await.unwrap_err();
        assert!(matches!(err, EnvoyError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_digest_retry_after_challenge() {
        let mut server = mockito::Server::new_async().await;
        let _challenge = server
            .mock("GET", "/installer/pcu_comm_check")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(401)
            .with_header(
                "www-authenticate",
                r#"Digest realm="enphaseenergy.com", qop="auth", nonce="abc""#,
            )
            .create_async()
            .await;
        let _authorized = server
            .mock("GET", "/installer/pcu_comm_check")
            .match_header(
                "authorization",
                mockito::Matcher::Regex(r#"^Digest .*username="installer".*qop=auth"#.to_owned()),
            )
            .with_body(r#"{"121":3}"#)
            .create_async()
            .await;

        let session = HttpSession::new(server.url(), Duration::from_secs(5)).unwrap();
        let value = session
            .get_digest_json("/installer/pcu_comm_check", "installer", "secret")
            .await
            .unwrap();
        assert_eq!(value["121"], 3);
    }

    #[tokio::test]
    async fn test_digest_without_challenge_is_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _denied = server
            .mock("GET", "/ivp/ensemble/inventory")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let session = HttpSession::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = session
            .get_digest_json("/ivp/ensemble/inventory", "envoy", "567890")
            .await
            .unwrap_err();
        assert!(err.is_auth_expired());
    }

    #[tokio::test]
    async fn test_swap_bearer_sends_header() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ivp/meters")
            .match_header("authorization", "Bearer tok")
            .match_header("cookie", "sessionId=s1")
            .with_body("[]")
            .create_async()
            .await;

        let session = HttpSession::new(server.url(), Duration::from_secs(5)).unwrap();
        session.swap_bearer("tok", Some("s1")).unwrap();
        let value: Value = session.get_json("/ivp/meters").await.unwrap();
        assert!(value.as_array().unwrap().is_empty());
    }
}
