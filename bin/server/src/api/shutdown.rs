use anyhow::anyhow;
use axum::{
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use serror::AddStatusCodeError;

use crate::{
  auth::authenticate,
  state::{server_shutdown, store},
};

pub async fn handler(
  headers: HeaderMap,
) -> serror::Result<Response> {
  let user = authenticate(&headers)?;
  if user != kvstore::ADMIN_USER {
    warn!("user {user} attempted shutdown without admin privileges");
    return Err(
      anyhow!("only admin may shut the server down")
        .status_code(StatusCode::FORBIDDEN),
    );
  }
  info!("admin requested shutdown");
  tokio::spawn(shutdown_routine());
  Ok("OK".into_response())
}

/// Drain the store first so nothing is stranded in its queue,
/// then stop accepting HTTP traffic.
async fn shutdown_routine() {
  match store().shutdown().await {
    Ok(()) => info!("store closed cleanly"),
    Err(e) => warn!("store was already shutting down | {e:#}"),
  }
  server_shutdown().cancel();
}
