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

//! Envoy gateway client: credentials, HTTP session, per-endpoint normalizers
//! and the update orchestrator that ties them to periodic triggers.

pub mod config;
pub mod constants;
pub mod controls;
pub mod credentials;
pub mod device_id;
pub mod error;
pub mod impulse;
pub mod normalize;
pub mod notify;
pub mod orchestrator;
pub mod sensors;
pub mod session;
pub mod sink;

pub use config::{EnvoyConfig, FeatureToggles, PollingConfig, TokenMode};
pub use controls::{ControlGate, ControlRequest, GeneratorMode};
pub use credentials::{CredentialManager, TokenCheck};
pub use error::{EnvoyError, EnvoyResult, TokenError};
pub use impulse::{ImpulseGenerator, TriggerEvent};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use orchestrator::{ControlCommand, ControlHandle, Envoy};
pub use sensors::{CompareMode, SensorSet, evaluate_compare_mode, scale_value};
pub use session::HttpSession;
pub use sink::{Domain, PropertySink, Sink, SinkHub};
