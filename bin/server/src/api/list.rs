use axum::{
  extract::Path,
  http::{HeaderMap, header},
  response::{IntoResponse, Response},
};

use crate::{api::StoreStatusCode, auth::authenticate, state::store};

/// Listing exposes metadata only (never values), so any
/// authenticated user may call it.
pub async fn all(headers: HeaderMap) -> serror::Result<Response> {
  authenticate(&headers)?;
  let json = store().list_all().await.status_coded()?;
  Ok(json_response(json))
}

pub async fn one(
  Path(key): Path<String>,
  headers: HeaderMap,
) -> serror::Result<Response> {
  authenticate(&headers)?;
  let json = store().list_key(&key).await.status_coded()?;
  Ok(json_response(json))
}

fn json_response(json: Vec<u8>) -> Response {
  ([(header::CONTENT_TYPE, "application/json")], json)
    .into_response()
}
