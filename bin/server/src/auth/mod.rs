use anyhow::{Context, anyhow};
use axum::http::{HeaderMap, StatusCode};
use serror::AddStatusCodeError;

use crate::state::jwt_client;

pub mod jwt;

/// Pull the bearer token out of the headers and resolve it to the
/// authenticated username.
///
/// A malformed header is 403 while a token that fails validation
/// is 401, which is the split the endpoints advertise.
pub fn authenticate(
  headers: &HeaderMap,
) -> serror::Result<String> {
  let token = headers
    .get("authorization")
    .context("missing AUTHORIZATION header")
    .and_then(|header| {
      header
        .to_str()
        .context("AUTHORIZATION header is not valid UTF-8")
    })
    .and_then(|header| {
      header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .context(
          "AUTHORIZATION header is not in 'Bearer <token>' format",
        )
    })
    .map_err(|e| e.status_code(StatusCode::FORBIDDEN))?;
  let claims = jwt_client().decode(token).map_err(|_| {
    anyhow!("invalid login token")
      .status_code(StatusCode::UNAUTHORIZED)
  })?;
  Ok(claims.username)
}
