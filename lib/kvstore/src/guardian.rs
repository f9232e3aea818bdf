use std::{sync::Arc, time::Duration};

use tokio::{
  sync::{Mutex, mpsc},
  task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
  error::StoreError,
  request::{
    StoreCommand, StoreOutput, StoreRequest, StoreResponse,
  },
  table::KeyTable,
};

/// Handle to one running guardian instance, held by the steward.
///
/// Every instance gets its own freshly allocated kill token, so a
/// steward replacing a silent guardian can never terminate the
/// replacement by mistake.
pub(crate) struct Guardian {
  pub heartbeat: mpsc::Receiver<()>,
  pub handle: JoinHandle<()>,
  kill: CancellationToken,
}

impl Guardian {
  pub fn spawn(
    queue: Arc<Mutex<mpsc::Receiver<StoreRequest>>>,
    table: Arc<Mutex<KeyTable>>,
    heart_rate: Duration,
  ) -> Guardian {
    let (beat_tx, beat_rx) = mpsc::channel(1);
    let kill = CancellationToken::new();
    let handle =
      tokio::spawn(run(queue, table, heart_rate, beat_tx, kill.clone()));
    Guardian {
      heartbeat: beat_rx,
      handle,
      kill,
    }
  }

  /// Force this instance to exit, even if whatever kept it silent
  /// lets go of it later.
  pub fn kill(&self) {
    self.kill.cancel();
  }
}

/// The serializer loop: drains the queue one request at a time and
/// applies each to the table.
///
/// Holds the table and queue-receiver locks for its entire life. A
/// replacement guardian blocks on those locks until this instance
/// has fully exited, which is what makes "at most one mutator" a
/// structural property rather than a protocol.
async fn run(
  queue: Arc<Mutex<mpsc::Receiver<StoreRequest>>>,
  table: Arc<Mutex<KeyTable>>,
  heart_rate: Duration,
  heartbeat: mpsc::Sender<()>,
  kill: CancellationToken,
) {
  let mut table = table.lock().await;
  let mut queue = queue.lock().await;
  let mut pulse = tokio::time::interval(heart_rate);
  loop {
    tokio::select! {
      _ = pulse.tick() => {
        // The steward stops reading beats while it is mid-restart;
        // racing the kill token keeps the handover from wedging on
        // a stuck send.
        tokio::select! {
          _ = heartbeat.send(()) => {}
          _ = kill.cancelled() => break,
        }
      }
      _ = kill.cancelled() => break,
      request = queue.recv() => {
        let Some(request) = request else {
          // Queue closed out from under us. The steward decides
          // whether to recreate it.
          break;
        };
        if request.cancelled.is_cancelled() {
          // The submitter stopped waiting before we got here.
          continue;
        }
        if matches!(request.command, StoreCommand::Shutdown) {
          debug!("store guardian received shutdown command");
          break;
        }
        let StoreRequest { command, reply, .. } = request;
        let response = execute(&mut table, command);
        if let Some(reply) = reply {
          // oneshot delivery never blocks; a vanished caller just
          // drops the response.
          let _ = reply.send(response);
        }
      }
    }
  }
}

fn execute(
  table: &mut KeyTable,
  command: StoreCommand,
) -> StoreResponse {
  match command {
    StoreCommand::Lookup { key, user } => {
      if key.is_empty() {
        return Err(StoreError::BadRequest);
      }
      table.lookup(&key, &user).map(StoreOutput::Value)
    }
    StoreCommand::Put { key, user, value } => {
      if key.is_empty() {
        return Err(StoreError::BadRequest);
      }
      table.put(&key, &user, value).map(|_| StoreOutput::Empty)
    }
    StoreCommand::Delete { key, user } => {
      if key.is_empty() {
        return Err(StoreError::BadRequest);
      }
      table.delete(&key, &user).map(|_| StoreOutput::Empty)
    }
    StoreCommand::List { key: Some(key) } => table
      .list_one(&key)
      .and_then(|meta| {
        serde_json::to_vec(&meta).map_err(StoreError::from)
      })
      .map(StoreOutput::Json),
    StoreCommand::List { key: None } => {
      serde_json::to_vec(&table.list_all())
        .map_err(StoreError::from)
        .map(StoreOutput::Json)
    }
    // Handled by the loop before dispatch.
    StoreCommand::Shutdown => Err(StoreError::BadRequest),
  }
}
