//! # Calibration Persistence
//!
//! Stores accelerometer calibration results across restarts.
//!
//! The control loop never blocks on storage: a completed calibration is
//! handed to a [`SaveNotifier`], which for the binary queues it on a bounded
//! channel drained by [`run_save_task`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::sensors::acceleration::AccelerometerConfig;

/// Pending save requests the queue holds before new ones are dropped
pub const SAVE_QUEUE_DEPTH: usize = 4;

/// Sink for "configuration changed, persist it" events.
pub trait SaveNotifier {
    /// Persist `config` and signal the user that it was saved.
    fn save_config_and_notify(&mut self, config: &AccelerometerConfig);
}

/// On-disk calibration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub saved_at: DateTime<Utc>,
    pub accelerometer: AccelerometerConfig,
}

/// JSON file holding the last [`PersistedState`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored state.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let state = serde_json::from_str(&contents)?;
        Ok(Some(state))
    }

    /// Write `config` stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn save(&self, config: &AccelerometerConfig) -> Result<()> {
        let state = PersistedState {
            saved_at: Utc::now(),
            accelerometer: config.clone(),
        };
        let json = serde_json::to_string_pretty(&state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveRequest {
    Accelerometer(AccelerometerConfig),
}

/// [`SaveNotifier`] that queues requests for [`run_save_task`].
#[derive(Debug, Clone)]
pub struct ChannelSaveNotifier {
    tx: mpsc::Sender<SaveRequest>,
}

/// Create a notifier and the receiving end for [`run_save_task`].
#[must_use]
pub fn save_channel() -> (ChannelSaveNotifier, mpsc::Receiver<SaveRequest>) {
    let (tx, rx) = mpsc::channel(SAVE_QUEUE_DEPTH);
    (ChannelSaveNotifier { tx }, rx)
}

impl SaveNotifier for ChannelSaveNotifier {
    fn save_config_and_notify(&mut self, config: &AccelerometerConfig) {
        match self.tx.try_send(SaveRequest::Accelerometer(config.clone())) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Save queue full, dropping calibration save");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Save task stopped, calibration not persisted");
            }
        }
    }
}

/// Drain save requests into `store` until every sender is dropped.
pub async fn run_save_task(mut rx: mpsc::Receiver<SaveRequest>, store: ConfigStore) {
    while let Some(request) = rx.recv().await {
        match request {
            SaveRequest::Accelerometer(config) => match store.save(&config).await {
                Ok(()) => info!(
                    "Calibration saved to {} (trims {:?})",
                    store.path().display(),
                    config.acc_zero.raw
                ),
                Err(e) => error!("Failed to save calibration: {}", e),
            },
        }
    }
}
