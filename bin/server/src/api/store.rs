use axum::{
  body::Bytes,
  extract::Path,
  http::HeaderMap,
  response::{IntoResponse, Response},
};

use crate::{api::StoreStatusCode, auth::authenticate, state::store};

pub async fn lookup(
  Path(key): Path<String>,
  headers: HeaderMap,
) -> serror::Result<Response> {
  let user = authenticate(&headers)?;
  let value =
    store().lookup(&key, &user).await.status_coded()?;
  Ok(value.into_response())
}

/// The body is stored untouched; it does not have to be UTF-8.
pub async fn put(
  Path(key): Path<String>,
  headers: HeaderMap,
  body: Bytes,
) -> serror::Result<Response> {
  let user = authenticate(&headers)?;
  store()
    .put(&key, &user, body.to_vec())
    .await
    .status_coded()?;
  Ok("OK".into_response())
}

pub async fn delete(
  Path(key): Path<String>,
  headers: HeaderMap,
) -> serror::Result<Response> {
  let user = authenticate(&headers)?;
  store().delete(&key, &user).await.status_coded()?;
  Ok("OK".into_response())
}
