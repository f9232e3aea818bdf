use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
  error::StoreError,
  request::{StoreCommand, StoreOutput, StoreRequest},
};

/// The bounded request queue plus the lifecycle signals shared by
/// producers, the guardian and the steward.
///
/// The sender sits behind an `ArcSwap` so the steward can swap in
/// a recreated queue after a crash. The receiver sits behind a
/// `Mutex` that the running guardian holds for its whole life,
/// which is what hands the queue (and with it the table) from a
/// dead guardian to its replacement.
pub(crate) struct RequestBus {
  sender: ArcSwap<mpsc::Sender<StoreRequest>>,
  receiver: Arc<Mutex<mpsc::Receiver<StoreRequest>>>,
  buffer_size: usize,
  /// Gates new submissions. Once asserted it stays asserted.
  shutdown: CancellationToken,
  /// Asserted by the steward after the final guardian exit.
  guardian_done: CancellationToken,
  closing: AtomicBool,
}

impl RequestBus {
  pub fn new(buffer_size: usize) -> RequestBus {
    let (tx, rx) = channel(buffer_size);
    RequestBus {
      sender: ArcSwap::from_pointee(tx),
      receiver: Arc::new(Mutex::new(rx)),
      buffer_size,
      shutdown: CancellationToken::new(),
      guardian_done: CancellationToken::new(),
      closing: AtomicBool::new(false),
    }
  }

  pub fn receiver(
    &self,
  ) -> Arc<Mutex<mpsc::Receiver<StoreRequest>>> {
    self.receiver.clone()
  }

  pub fn is_shutdown(&self) -> bool {
    self.shutdown.is_cancelled()
  }

  pub fn guardian_done(&self) -> &CancellationToken {
    &self.guardian_done
  }

  /// Submit a command and wait for the guardian's reply.
  ///
  /// Races shutdown against the (possibly full) queue, so a
  /// shutdown asserted before the enqueue lands fails fast instead
  /// of feeding a draining guardian. Dropping the returned future
  /// marks the request cancelled; the guardian discards it on
  /// dequeue.
  pub async fn submit(
    &self,
    command: StoreCommand,
  ) -> Result<StoreOutput, StoreError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    let cancelled = CancellationToken::new();
    let _abandoned = cancelled.clone().drop_guard();
    let request = StoreRequest {
      command,
      reply: Some(reply_tx),
      cancelled,
    };
    let sender = self.sender.load_full();
    tokio::select! {
      _ = self.shutdown.cancelled() => {
        return Err(StoreError::Shutdown);
      }
      enqueued = sender.send(request) => {
        if enqueued.is_err() {
          // The queue closed under us: either the final close
          // finished, or a crash took the channel down before the
          // steward recreated it.
          return Err(if self.is_shutdown() {
            StoreError::Shutdown
          } else {
            StoreError::Interrupted
          });
        }
      }
    }
    match reply_rx.await {
      Ok(response) => response,
      // The guardian died holding this request.
      Err(_) => Err(StoreError::Interrupted),
    }
  }

  /// Put a request drained during crash recovery back in line.
  /// Bounded to a single attempt; a queue that refilled in the
  /// meantime wins and the request is dropped by the caller.
  pub fn try_requeue(&self, request: StoreRequest) -> bool {
    self.sender.load().try_send(request).is_ok()
  }

  /// Replace the queue after its channel was found closed during
  /// crash recovery. Requests buffered in the old channel are
  /// lost.
  pub fn recreate_queue(
    &self,
    receiver: &mut mpsc::Receiver<StoreRequest>,
  ) {
    let (tx, rx) = channel(self.buffer_size);
    self.sender.store(Arc::new(tx));
    *receiver = rx;
  }

  /// Single shot orderly shutdown.
  ///
  /// Asserts the broadcast, hands the guardian one final
  /// `Shutdown` command so it drains cooperatively, waits for the
  /// steward to confirm the final guardian exit, and only then
  /// closes the queue. Closing before the drain would fail
  /// concurrent producers mid-send or strand buffered requests.
  pub async fn close(&self) -> Result<(), StoreError> {
    if self.closing.swap(true, Ordering::SeqCst) {
      return Err(StoreError::Shutdown);
    }
    self.shutdown.cancel();
    let request = StoreRequest {
      command: StoreCommand::Shutdown,
      reply: None,
      cancelled: CancellationToken::new(),
    };
    // Sent directly rather than through submit: the broadcast is
    // already asserted and this one still has to go through. A
    // send error means the guardian is already gone with the
    // queue, in which case there is nothing left to drain.
    let sender = self.sender.load_full();
    let _ = sender.send(request).await;
    self.guardian_done.cancelled().await;
    let mut receiver = self.receiver.lock().await;
    receiver.close();
    // Anything still buffered was enqueued in the shutdown race
    // window. Dropping it resolves those submitters now instead of
    // leaving them waiting on a reply that can never come.
    while receiver.try_recv().is_ok() {}
    Ok(())
  }

  /// Test hook: drop the live sender so the guardian observes the
  /// queue closing without any shutdown being asserted.
  #[cfg(test)]
  pub fn sever_queue(&self) {
    let (tx, _rx) = channel(self.buffer_size);
    self.sender.store(Arc::new(tx));
  }

  /// Test hook: enqueue a hand-built request.
  #[cfg(test)]
  pub async fn inject(&self, request: StoreRequest) {
    self.sender.load_full().send(request).await.unwrap();
  }
}

/// A zero capacity means rendezvous delivery, which the closest
/// bounded tokio channel models with room for a single request.
fn channel(
  buffer_size: usize,
) -> (mpsc::Sender<StoreRequest>, mpsc::Receiver<StoreRequest>) {
  mpsc::channel(buffer_size.max(1))
}
