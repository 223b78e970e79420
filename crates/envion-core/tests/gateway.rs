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

//! End-to-end checks against a mocked gateway

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use envion_core::{
    ControlGate, ControlHandle, ControlRequest, CredentialManager, Envoy, EnvoyConfig,
    EnvoyError, HttpSession, Notifier, PropertySink, SinkHub, TokenCheck, TriggerEvent,
};
use envion_types::{JwtToken, MeasurementType};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const SERIAL: &str = "123456789";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn info_xml(software: &str) -> String {
    format!(
        r"<?xml version='1.0' encoding='UTF-8'?>
<envoy_info>
  <time>1700000000</time>
  <device>
    <sn>{SERIAL}</sn>
    <pn>800-00654-r08</pn>
    <software>{software}</software>
    <imeter>true</imeter>
  </device>
  <web-tokens>true</web-tokens>
</envoy_info>"
    )
}

/// Unsigned JWT that expires a day from now
fn make_jwt() -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({"exp": now + 86_400, "iat": now, "username": "installer"});
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

fn config(url: &str, dir: &Path) -> EnvoyConfig {
    EnvoyConfig {
        base_url: Some(url.to_owned()),
        token_file: dir.join("envoyToken.json"),
        envoy_id_file: dir.join("envoyId.txt"),
        request_timeout_secs: 5,
        token_missing_backoff_secs: 0,
        ..Default::default()
    }
}

fn installer_config(url: &str, dir: &Path) -> EnvoyConfig {
    EnvoyConfig {
        token_generation_mode: 1,
        envoy_token: Some(make_jwt()),
        ..config(url, dir)
    }
}

fn envoy(config: EnvoyConfig, sinks: Arc<SinkHub>) -> Envoy {
    Envoy::new(
        config,
        sinks,
        Notifier::new(),
        Arc::new(ControlGate::new(false)),
    )
    .unwrap()
}

async fn mock_info(server: &mut mockito::Server, software: &str) -> mockito::Mock {
    server
        .mock("GET", "/info.xml")
        .with_header("content-type", "application/xml")
        .with_body(info_xml(software))
        .create_async()
        .await
}

async fn mock_valid_token(server: &mut mockito::Server) -> mockito::Mock {
    server
        .mock("GET", "/auth/check_jwt")
        .with_header("set-cookie", "sessionId=s1; Path=/; HttpOnly")
        .with_body("<!DOCTYPE html><h2>Valid token.</h2>")
        .create_async()
        .await
}

#[derive(Debug, Default)]
struct PropertyRecorder {
    published: Mutex<Vec<(String, String, Value)>>,
}

impl PropertySink for PropertyRecorder {
    fn publish(&self, entity: &str, property: &str, value: &Value) {
        self.published
            .lock()
            .push((entity.to_owned(), property.to_owned(), value.clone()));
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_start_firmware7_with_installer_token() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _info = mock_info(&mut server, "D7.6.175").await;
    let check = server
        .mock("GET", "/auth/check_jwt")
        .match_header("authorization", mockito::Matcher::Regex("^Bearer ".to_owned()))
        .with_body("<!DOCTYPE html><h2>Valid token.</h2>")
        .expect(1)
        .create_async()
        .await;
    let _backbone = server
        .mock("GET", "/backbone/application.js")
        .with_body("var x = {envoyDevId:'987654321', other:1};")
        .create_async()
        .await;

    let mut envoy = envoy(
        installer_config(&server.url(), dir.path()),
        Arc::new(SinkHub::new()),
    );
    envoy.start().await.unwrap();

    assert_eq!(envoy.pv().info.serial_number, SERIAL);
    assert_eq!(envoy.pv().info.firmware, 706);
    assert!(envoy.feature().info.firmware7xx);
    assert!(envoy.credentials().token_valid());
    assert_eq!(envoy.device_id(), Some("987654321"));
    assert!(envoy.feature().backbone_app.installed);

    // id is cached for the next start
    let cached = std::fs::read_to_string(dir.path().join("envoyId.txt")).unwrap();
    assert_eq!(cached.trim(), "987654321");
    check.assert_async().await;
}

#[tokio::test]
async fn test_start_old_firmware_reads_meters() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _info = mock_info(&mut server, "R4.10.35").await;
    let _meters = server
        .mock("GET", "/ivp/meters")
        .with_body(
            json!([
                {"eid": 704643328, "state": "enabled", "measurementType": "production", "phaseMode": "three", "phaseCount": 3},
                {"eid": 704643584, "state": "disabled", "measurementType": "net-consumption", "phaseMode": "three", "phaseCount": 3}
            ])
            .to_string(),
        )
        .create_async()
        .await;
    let _readings = server
        .mock("GET", "/ivp/meters/readings")
        .with_body(
            json!([
                {"eid": 704643328, "timestamp": 1700000000, "activePower": 1234.5, "voltage": 705.0,
                 "channels": [{"eid": 1, "activePower": 411.5}, {"eid": 2, "activePower": 411.5}, {"eid": 3, "activePower": 411.5}]}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let mut envoy = envoy(config(&server.url(), dir.path()), Arc::new(SinkHub::new()));
    envoy.start().await.unwrap();

    assert_eq!(envoy.pv().info.firmware, 410);
    assert!(!envoy.feature().info.firmware7xx);
    // digest firmware needs no token
    assert!(envoy.credentials().token_valid());

    assert!(envoy.feature().meters.production.enabled);
    assert!(!envoy.feature().meters.consumption_net.enabled);
    let production = envoy.pv().meter(MeasurementType::Production).unwrap();
    assert!((production.power - 1234.5).abs() < f64::EPSILON);

    // no backbone script, production state stays off
    assert!(envoy.device_id().is_none());
    assert!(!envoy.feature().backbone_app.installed);
}

#[tokio::test]
async fn test_start_fails_without_info() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _info = server
        .mock("GET", "/info.xml")
        .with_status(500)
        .create_async()
        .await;

    let mut envoy = envoy(config(&server.url(), dir.path()), Arc::new(SinkHub::new()));
    let err = envoy.start().await.unwrap_err();
    assert!(matches!(err, EnvoyError::Status { status: 500, .. }));
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_token_checks_run_once() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let check = server
        .mock("GET", "/auth/check_jwt")
        .with_body("<!DOCTYPE html><h2>Valid token.</h2>")
        .expect(1)
        .create_async()
        .await;

    let config = EnvoyConfig {
        token_missing_backoff_secs: 1,
        ..installer_config(&server.url(), dir.path())
    };
    let session = Arc::new(HttpSession::new(server.url(), Duration::from_secs(5)).unwrap());
    let manager = CredentialManager::new(&config, session).unwrap();
    manager.set_device(SERIAL, true);

    // the first call parks in the missing-token backoff while the second arrives
    let (first, second) = tokio::join!(manager.check_token(false), manager.check_token(false));
    assert_eq!(first, TokenCheck::Ready);
    assert_eq!(second, TokenCheck::InProgress);
    assert!(manager.token_valid());
    check.assert_async().await;
}

#[tokio::test]
async fn test_cloud_token_is_cached_between_runs() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let jwt = make_jwt();
    let login = server
        .mock("POST", "/login/login.json")
        .with_body(r#"{"session_id":"abc","message":"success"}"#)
        .expect(1)
        .create_async()
        .await;
    let _tokens = server
        .mock("POST", "/tokens")
        .match_body(mockito::Matcher::PartialJson(
            json!({"session_id": "abc", "serial_num": SERIAL}),
        ))
        .with_body(jwt.clone())
        .create_async()
        .await;
    let _check = mock_valid_token(&mut server).await;

    let config = EnvoyConfig {
        enlighten_user: Some("owner@example.com".to_owned()),
        enlighten_passwd: Some("secret".to_owned()),
        enlighten_url: server.url(),
        entrez_url: server.url(),
        ..config(&server.url(), dir.path())
    };
    let session = Arc::new(HttpSession::new(server.url(), Duration::from_secs(5)).unwrap());

    let first = CredentialManager::new(&config, session.clone()).unwrap();
    first.set_device(SERIAL, true);
    assert_eq!(first.check_token(true).await, TokenCheck::Ready);
    assert_eq!(first.jwt().token, jwt);
    assert!(dir.path().join("envoyToken.json").exists());

    // a restart picks the token up from disk
    let second = CredentialManager::new(&config, session).unwrap();
    second.set_device(SERIAL, true);
    assert_eq!(second.check_token(true).await, TokenCheck::Ready);
    assert_eq!(second.jwt().token, jwt);
    login.assert_async().await;
}

#[tokio::test]
async fn test_rejected_token_fails_check() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _check = server
        .mock("GET", "/auth/check_jwt")
        .with_body("<!DOCTYPE html><h2>Invalid token.</h2>")
        .create_async()
        .await;

    let config = installer_config(&server.url(), dir.path());
    let session = Arc::new(HttpSession::new(server.url(), Duration::from_secs(5)).unwrap());
    let manager = CredentialManager::new(&config, session).unwrap();
    manager.set_device(SERIAL, true);

    assert_eq!(manager.check_token(true).await, TokenCheck::Failed);
    assert!(!manager.token_valid());
}

#[tokio::test]
async fn test_token_inside_expiry_guard_is_refreshed() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let fresh = make_jwt();
    let _info = mock_info(&mut server, "D7.6.175").await;
    let _check = mock_valid_token(&mut server).await;
    let login = server
        .mock("POST", "/login/login.json")
        .with_body(r#"{"session_id":"abc","message":"success"}"#)
        .expect(1)
        .create_async()
        .await;
    let _tokens = server
        .mock("POST", "/tokens")
        .with_body(fresh.clone())
        .create_async()
        .await;
    let _home = server
        .mock("GET", "/home.json")
        .with_body("{}")
        .create_async()
        .await;

    // cached token clears the 60s guard by only two seconds
    let now = chrono::Utc::now().timestamp();
    let cached = JwtToken {
        token: "cached-token".to_owned(),
        generation_time: now - 3600,
        expires_at: now + 62,
        installer: false,
    };
    std::fs::write(
        dir.path().join("envoyToken.json"),
        serde_json::to_string(&cached).unwrap(),
    )
    .unwrap();

    let config = EnvoyConfig {
        enlighten_user: Some("owner@example.com".to_owned()),
        enlighten_passwd: Some("secret".to_owned()),
        enlighten_url: server.url(),
        entrez_url: server.url(),
        ..config(&server.url(), dir.path())
    };
    let mut envoy = envoy(config, Arc::new(SinkHub::new()));
    envoy.start().await.unwrap();
    assert_eq!(envoy.credentials().jwt().token, "cached-token");
    assert!(envoy.credentials().token_valid());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!envoy.credentials().token_valid());

    envoy.handle(TriggerEvent::HomeInventoryAndPcuStatus).await;
    assert_eq!(envoy.credentials().jwt().token, fresh);
    assert!(envoy.credentials().token_valid());
    login.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_update_invalidates_token() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _info = mock_info(&mut server, "D7.6.175").await;
    let _check = mock_valid_token(&mut server).await;
    let home = server
        .mock("GET", "/home.json")
        .with_body("{}")
        .create_async()
        .await;

    let mut envoy = envoy(
        installer_config(&server.url(), dir.path()),
        Arc::new(SinkHub::new()),
    );
    envoy.start().await.unwrap();
    assert!(envoy.credentials().token_valid());
    assert!(envoy.feature().home.supported);

    home.remove_async().await;
    let _denied = server
        .mock("GET", "/home.json")
        .with_status(401)
        .create_async()
        .await;

    envoy.handle(TriggerEvent::HomeInventoryAndPcuStatus).await;
    assert!(!envoy.credentials().token_valid());
    // a 401 is not a capability loss
    assert!(envoy.feature().home.supported);
}

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_locked_control_is_rejected_and_restored() {
    let recorder = Arc::new(PropertyRecorder::default());
    let mut hub = SinkHub::new();
    hub.add_property_sink(recorder.clone());
    let sinks = Arc::new(hub);
    sinks.publish_property("envoy", "productionState", json!(true));

    let (tx, mut rx) = mpsc::channel(4);
    let handle = ControlHandle::new(tx, Arc::new(ControlGate::new(false)), sinks.clone());
    handle.set_locked(true);

    let err = handle
        .send(ControlRequest::SetProduction(false))
        .await
        .unwrap_err();
    assert!(matches!(err, EnvoyError::ControlLocked));
    // nothing reached the update loop
    assert!(rx.try_recv().is_err());

    let published = recorder.published.lock();
    let last = published.last().unwrap();
    assert_eq!(
        (last.0.as_str(), last.1.as_str(), &last.2),
        ("envoy", "productionState", &json!(true))
    );
    assert_eq!(sinks.last_property("envoy", "controlLocked"), Some(json!(true)));
}

#[tokio::test]
async fn test_unauthorized_control_invalidates_token() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _info = mock_info(&mut server, "D7.6.175").await;
    let _check = mock_valid_token(&mut server).await;
    let _inventory = server
        .mock("GET", "/ivp/ensemble/inventory")
        .with_body(
            json!([{"type": "ENPOWER", "devices": [{
                "serial_num": "EP1", "mains_admin_state": "closed", "mains_oper_state": "closed"
            }]}])
            .to_string(),
        )
        .create_async()
        .await;
    let relay = server
        .mock("POST", "/ivp/ensemble/relay")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let mut envoy = envoy(
        installer_config(&server.url(), dir.path()),
        Arc::new(SinkHub::new()),
    );
    envoy.start().await.unwrap();
    assert!(envoy.feature().ensemble.enpowers.installed);
    assert!(envoy.credentials().token_valid());

    let err = envoy
        .control(ControlRequest::SetEnpowerRelay(false))
        .await
        .unwrap_err();
    assert!(err.is_auth_expired());
    assert!(!envoy.credentials().token_valid());
    relay.assert_async().await;
}

#[tokio::test]
async fn test_control_round_trip_through_update_loop() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _info = mock_info(&mut server, "D7.6.175").await;
    let _check = mock_valid_token(&mut server).await;
    let _backbone = server
        .mock("GET", "/backbone/application.js")
        .with_body("envoyDevId:'987654321'")
        .create_async()
        .await;
    let _state = server
        .mock("GET", "/ivp/mod/987654321/mode/power")
        .with_body(r#"{"powerForcedOff":false}"#)
        .create_async()
        .await;
    let write = server
        .mock("PUT", "/ivp/mod/987654321/mode/power")
        .match_body(mockito::Matcher::Json(json!({"length": 1, "arr": [1]})))
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let sinks = Arc::new(SinkHub::new());
    let gate = Arc::new(ControlGate::new(false));
    let mut envoy = Envoy::new(
        installer_config(&server.url(), dir.path()),
        sinks.clone(),
        Notifier::new(),
        gate.clone(),
    )
    .unwrap();
    envoy.start().await.unwrap();
    assert_eq!(envoy.pv().production_state, Some(true));

    let (trigger_tx, trigger_rx) = mpsc::channel(4);
    let (control_tx, control_rx) = mpsc::channel(4);
    let task = tokio::spawn(envoy.run(trigger_rx, control_rx));

    let handle = ControlHandle::new(control_tx, gate, sinks.clone());
    handle.send(ControlRequest::SetProduction(false)).await.unwrap();
    assert_eq!(
        sinks.last_property("envoy", "productionState"),
        Some(json!(false))
    );

    drop(handle);
    drop(trigger_tx);
    task.await.unwrap();
    write.assert_async().await;
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unsupported_home_is_not_polled_again() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _info = mock_info(&mut server, "R4.10.35").await;
    let home = server
        .mock("GET", "/home.json")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;
    let inventory = server
        .mock("GET", "/inventory.json")
        .with_body(json!([{"type": "PCU", "devices": []}]).to_string())
        .expect(1)
        .create_async()
        .await;

    let mut envoy = envoy(config(&server.url(), dir.path()), Arc::new(SinkHub::new()));
    envoy.start().await.unwrap();
    assert!(!envoy.feature().home.supported);

    envoy.handle(TriggerEvent::HomeInventoryAndPcuStatus).await;
    assert!(envoy.feature().inventory.supported);
    home.assert_async().await;
    inventory.assert_async().await;
}
