use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// Operations the guardian applies to the key table.
#[derive(Debug)]
pub(crate) enum StoreCommand {
  Lookup {
    key: String,
    user: String,
  },
  Put {
    key: String,
    user: String,
    value: Vec<u8>,
  },
  Delete {
    key: String,
    user: String,
  },
  /// `key: None` lists the whole table.
  List {
    key: Option<String>,
  },
  Shutdown,
}

/// Successful payload of a store reply.
#[derive(Debug)]
pub(crate) enum StoreOutput {
  Empty,
  Value(Vec<u8>),
  Json(Vec<u8>),
}

impl StoreOutput {
  // A shape mismatch would be a guardian bug. It is unreachable
  // through the public operations but kept total anyway.
  pub fn into_value(self) -> Result<Vec<u8>, StoreError> {
    match self {
      StoreOutput::Value(value) => Ok(value),
      _ => Err(StoreError::BadRequest),
    }
  }

  pub fn into_json(self) -> Result<Vec<u8>, StoreError> {
    match self {
      StoreOutput::Json(json) => Ok(json),
      _ => Err(StoreError::BadRequest),
    }
  }
}

pub(crate) type StoreResponse = Result<StoreOutput, StoreError>;

/// A queued unit of work for the guardian.
///
/// The reply slot is single use and delivery never blocks, so a
/// caller that stopped waiting cannot stall the guardian. The
/// cancellation token is asserted by the submitter when it gives
/// up; the guardian discards such requests on dequeue without
/// replying.
#[derive(Debug)]
pub(crate) struct StoreRequest {
  pub command: StoreCommand,
  pub reply: Option<oneshot::Sender<StoreResponse>>,
  pub cancelled: CancellationToken,
}
