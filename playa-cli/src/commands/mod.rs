//! CLI command implementations.

pub mod access;
pub mod distance;
pub mod status;
pub mod sync;
pub mod unlock;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use playa_core::{Clock, EventWindow, FixedClock, SystemClock};
use playa_store::SqliteStateStore;
use playa_types::{DeviceId, EventId, LocationSample};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::{resolve_device_id, Config};

/// Everything a command needs, resolved once from flags and config.
pub struct Context {
    /// Loaded configuration.
    pub config: Config,
    /// Data directory.
    pub data_dir: PathBuf,
    /// Validated event window.
    pub window: EventWindow,
    /// This device.
    pub device_id: DeviceId,
    /// Time source for every rule.
    pub clock: Arc<dyn Clock>,
}

impl Context {
    /// Validate the event config, resolve the device id and pick the clock.
    pub async fn new(config: Config, data_dir: PathBuf, now: Option<DateTime<Utc>>) -> Result<Self> {
        let window = EventWindow::new(config.event.clone()).context("Invalid [event] configuration")?;
        let device_id = resolve_device_id(&config.device, &data_dir).await?;
        let clock: Arc<dyn Clock> = match now {
            Some(now) => Arc::new(FixedClock::new(now)),
            None => Arc::new(SystemClock),
        };
        debug!(
            device = %device_id,
            event = %window.config().event_id,
            fixed_clock = now.is_some(),
            "Context ready"
        );

        Ok(Self {
            config,
            data_dir,
            window,
            device_id,
            clock,
        })
    }

    /// Event id from the config.
    pub fn event_id(&self) -> EventId {
        EventId::new(self.window.config().event_id.clone())
    }

    /// Resolve a configured path against the data dir.
    pub fn data_path(&self, path: &Path) -> PathBuf {
        self.data_dir.join(path)
    }

    /// Open the state database.
    pub async fn open_state(&self) -> Result<SqliteStateStore> {
        let path = self.data_path(&self.config.storage.database);
        SqliteStateStore::new(&path)
            .await
            .with_context(|| format!("Failed to open state database {}", path.display()))
    }
}

/// Location sample from an optional coordinate pair.
pub fn sample(coords: Option<(f64, f64)>) -> Option<LocationSample> {
    coords.map(|(lat, lon)| LocationSample::at(lat, lon))
}
