use anyhow::anyhow;
use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use axum_extra::{
  TypedHeader,
  headers::{Authorization, authorization::Basic},
};
use serror::{AddStatusCode, AddStatusCodeError};

use crate::state::{jwt_client, user_db};

/// Exchange HTTP Basic credentials for a bearer token.
pub async fn handler(
  TypedHeader(Authorization(auth)): TypedHeader<
    Authorization<Basic>,
  >,
) -> serror::Result<Response> {
  let username = auth.username();
  if !user_db().check_password(username, auth.password()) {
    warn!("failed login attempt for user {username}");
    return Err(
      anyhow!("invalid username or password")
        .status_code(StatusCode::UNAUTHORIZED),
    );
  }
  let token = jwt_client()
    .encode(username)
    .status_code(StatusCode::INTERNAL_SERVER_ERROR)?;
  info!("user {username} logged in");
  Ok(format!("Bearer {token}").into_response())
}
