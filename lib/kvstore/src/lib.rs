//! In-memory key value store with per-key ownership and least
//! recently used eviction.
//!
//! All mutation funnels through a single guardian task, so the key
//! table itself needs no locking discipline: requests are applied
//! strictly one at a time, in the order they were queued. A
//! steward task watches the guardian's heartbeat and replaces it
//! if it crashes or goes silent, without losing the table.
//!
//! Bring a store up with [`Store::startup`] and take it down with
//! [`Store::shutdown`], which drains the guardian before the
//! request queue closes.

mod bus;
mod error;
mod guardian;
mod request;
mod steward;
mod table;

pub use error::StoreError;
pub use table::{ADMIN_USER, KeyMeta};

use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::{
  bus::RequestBus,
  request::StoreCommand,
  steward::Steward,
  table::KeyTable,
};

/// Startup knobs for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreParams {
  /// Request queue capacity.
  pub buffer_size: usize,
  /// Key table capacity. The least recently accessed keys are
  /// evicted beyond it. Must be at least 1.
  pub max_depth: usize,
  /// Supervisor liveness deadline. The guardian heartbeats at a
  /// fifth of this.
  pub steward_timeout: Duration,
}

impl Default for StoreParams {
  fn default() -> StoreParams {
    StoreParams {
      buffer_size: 100,
      max_depth: 1000,
      steward_timeout: Duration::from_secs(10),
    }
  }
}

/// Cloneable handle to a running store.
#[derive(Clone)]
pub struct Store {
  bus: Arc<RequestBus>,
}

impl Store {
  /// Bring up an empty store: allocate the key table and request
  /// queue, then start the steward, which spawns the first
  /// guardian.
  pub fn startup(params: StoreParams) -> Store {
    let bus = Arc::new(RequestBus::new(params.buffer_size));
    let table =
      Arc::new(Mutex::new(KeyTable::new(params.max_depth)));
    Steward::spawn(bus.clone(), table, params.steward_timeout);
    Store { bus }
  }

  /// Read a key's value. Only the owner and `admin` may read.
  pub async fn lookup(
    &self,
    key: &str,
    user: &str,
  ) -> Result<Vec<u8>, StoreError> {
    self
      .bus
      .submit(StoreCommand::Lookup {
        key: key.to_string(),
        user: user.to_string(),
      })
      .await?
      .into_value()
  }

  /// Write a key. A new key is owned by the writer; an existing
  /// key may only be overwritten by its owner. The value is
  /// opaque bytes.
  pub async fn put(
    &self,
    key: &str,
    user: &str,
    value: Vec<u8>,
  ) -> Result<(), StoreError> {
    self
      .bus
      .submit(StoreCommand::Put {
        key: key.to_string(),
        user: user.to_string(),
        value,
      })
      .await?;
    Ok(())
  }

  /// Remove a key. Only the owner and `admin` may delete.
  pub async fn delete(
    &self,
    key: &str,
    user: &str,
  ) -> Result<(), StoreError> {
    self
      .bus
      .submit(StoreCommand::Delete {
        key: key.to_string(),
        user: user.to_string(),
      })
      .await?;
    Ok(())
  }

  /// Serialized JSON array of every key's metadata.
  pub async fn list_all(&self) -> Result<Vec<u8>, StoreError> {
    self
      .bus
      .submit(StoreCommand::List { key: None })
      .await?
      .into_json()
  }

  /// Serialized JSON object of one key's metadata.
  pub async fn list_key(
    &self,
    key: &str,
  ) -> Result<Vec<u8>, StoreError> {
    self
      .bus
      .submit(StoreCommand::List {
        key: Some(key.to_string()),
      })
      .await?
      .into_json()
  }

  /// Single shot orderly shutdown: gate new submissions, let the
  /// guardian drain and exit, then close the queue. Fails with
  /// [`StoreError::Shutdown`] if a shutdown was already requested.
  pub async fn shutdown(&self) -> Result<(), StoreError> {
    self.bus.close().await
  }
}
