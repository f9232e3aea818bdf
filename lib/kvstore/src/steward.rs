use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, mpsc::error::TryRecvError};
use tracing::{debug, error, info, warn};

use crate::{
  bus::RequestBus, guardian::Guardian, table::KeyTable,
};

/// Supervises exactly one guardian instance at a time, replacing
/// it when it goes silent or exits outside of shutdown.
pub(crate) struct Steward {
  bus: Arc<RequestBus>,
  table: Arc<Mutex<KeyTable>>,
  timeout: Duration,
}

impl Steward {
  pub fn spawn(
    bus: Arc<RequestBus>,
    table: Arc<Mutex<KeyTable>>,
    timeout: Duration,
  ) {
    tokio::spawn(
      Steward {
        bus,
        table,
        timeout,
      }
      .run(),
    );
  }

  async fn run(self) {
    // Unblocks close() callers even if this task dies some
    // unexpected way.
    let _done = self.bus.guardian_done().clone().drop_guard();
    let mut guardian = self.spawn_guardian();
    loop {
      tokio::select! {
        Some(()) = guardian.heartbeat.recv() => {
          // Still alive. The deadline re-arms on the next pass.
        }
        result = tokio::time::timeout(
          self.timeout,
          &mut guardian.handle,
        ) => {
          // Either the guardian exited (cleanly or by panic) or a
          // full deadline passed without a heartbeat. Make sure
          // the old instance is dead before doing anything else.
          guardian.kill();
          if self.bus.is_shutdown() {
            debug!("store guardian exited for shutdown");
            break;
          }
          match result {
            Ok(Ok(())) => info!(
              "store guardian exited outside shutdown, restarting"
            ),
            Ok(Err(e)) => {
              error!("store guardian crashed | {e}")
            }
            Err(_) => warn!(
              "store guardian missed its heartbeat deadline, restarting"
            ),
          }
          self.probe_queue().await;
          guardian = self.spawn_guardian();
        }
      }
    }
  }

  fn spawn_guardian(&self) -> Guardian {
    // Heart rate at a fifth of the deadline, so clock jitter alone
    // cannot trigger a restart.
    Guardian::spawn(
      self.bus.receiver(),
      self.table.clone(),
      self.timeout / 5,
    )
  }

  /// Check what state the failure left the queue in. Taking the
  /// receiver lock also waits out the old guardian, which holds it
  /// until it has fully exited.
  async fn probe_queue(&self) {
    let queue = self.bus.receiver();
    let mut queue = queue.lock().await;
    match queue.try_recv() {
      Ok(request) => {
        if !self.bus.try_requeue(request) {
          warn!(
            "store queue filled during guardian restart, dropping one drained request"
          );
        }
      }
      Err(TryRecvError::Empty) => {}
      Err(TryRecvError::Disconnected) => {
        error!(
          "store queue closed during a guardian failure, recreating it; buffered requests are lost"
        );
        self.bus.recreate_queue(&mut queue);
      }
    }
  }
}
