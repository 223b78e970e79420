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

//! Periodic trigger events.
//!
//! One tokio task per timer pushes its event into a bounded queue. A full
//! queue drops the tick; the next one catches up.

use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, trace};

use crate::config::PollingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    HomeInventoryAndPcuStatus,
    Production,
    Ensemble,
    LiveData,
    GridPlcAndProductionState,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HomeInventoryAndPcuStatus => "updateHomeInventoryAndPcuStatus",
            Self::Production => "updateProduction",
            Self::Ensemble => "updateEnsemble",
            Self::LiveData => "updateLiveData",
            Self::GridPlcAndProductionState => "updateGridPlcAndProductionState",
        })
    }
}

pub struct ImpulseGenerator {
    timers: Vec<(TriggerEvent, Duration)>,
    tx: mpsc::Sender<TriggerEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for ImpulseGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpulseGenerator")
            .field("timers", &self.timers)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ImpulseGenerator {
    pub fn new(timers: Vec<(TriggerEvent, Duration)>, tx: mpsc::Sender<TriggerEvent>) -> Self {
        Self {
            timers,
            tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The five standard triggers at the configured cadences
    pub fn from_polling(polling: &PollingConfig, tx: mpsc::Sender<TriggerEvent>) -> Self {
        let secs = Duration::from_secs;
        Self::new(
            vec![
                (
                    TriggerEvent::HomeInventoryAndPcuStatus,
                    secs(polling.home_inventory_secs),
                ),
                (TriggerEvent::Production, secs(polling.production_secs)),
                (TriggerEvent::Ensemble, secs(polling.ensemble_secs)),
                (TriggerEvent::LiveData, secs(polling.live_data_secs)),
                (
                    TriggerEvent::GridPlcAndProductionState,
                    secs(polling.grid_plc_secs),
                ),
            ],
            tx,
        )
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    /// Spawn the timers. Calling it again while running does nothing.
    ///
    /// The first tick of every timer comes one period after start.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        for &(event, period) in &self.timers {
            let period = period.max(Duration::from_millis(1));
            let tx = self.tx.clone();
            tasks.push(tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    match tx.try_send(event) {
                        Ok(()) => trace!("⏱️ [IMPULSE] {}", event),
                        Err(TrySendError::Full(_)) => {
                            debug!("⏱️ [IMPULSE] Queue full, skipping {}", event);
                        }
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
            }));
        }
        info!("⏱️ [IMPULSE] Started {} timers", tasks.len());
    }

    /// Abort all timers. Idempotent.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock();
        if tasks.is_empty() {
            return;
        }
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("⏱️ [IMPULSE] Stopped");
    }
}

impl Drop for ImpulseGenerator {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
