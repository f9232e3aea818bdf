use std::net::SocketAddr;

use axum::{
  Router,
  extract::{ConnectInfo, Request},
  http::{HeaderName, HeaderValue, StatusCode},
  middleware::{self, Next},
  response::Response,
  routing::get,
};
use kvstore::StoreError;
use serror::AddStatusCodeError;
use tower_http::set_header::SetResponseHeaderLayer;
use uuid::Uuid;

mod list;
mod login;
mod shutdown;
mod store;

pub fn router() -> Router {
  Router::new()
    .route("/version", get(|| async { env!("CARGO_PKG_VERSION") }))
    .route("/ping", get(ping))
    .route("/login", get(login::handler))
    .route(
      "/store/{key}",
      get(store::lookup)
        .put(store::put)
        .delete(store::delete),
    )
    .route("/list", get(list::all))
    .route("/list/{key}", get(list::one))
    .route("/shutdown", get(shutdown::handler))
    .layer(middleware::from_fn(log_access))
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("x-content-type-options"),
      HeaderValue::from_static("nosniff"),
    ))
}

async fn ping() -> &'static str {
  "pong"
}

async fn log_access(req: Request, next: Next) -> Response {
  let req_id = Uuid::new_v4();
  let peer = req
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|info| info.0.to_string())
    .unwrap_or_default();
  debug!(
    "{req_id} | {} {} from {peer}",
    req.method(),
    req.uri().path(),
  );
  next.run(req).await
}

/// Store errors carry their own kinds; this pins the status code
/// each kind maps to on the way out.
pub trait StoreStatusCode<T> {
  fn status_coded(self) -> serror::Result<T>;
}

impl<T> StoreStatusCode<T> for Result<T, StoreError> {
  fn status_coded(self) -> serror::Result<T> {
    self.map_err(|e| {
      let status = match &e {
        StoreError::KeyNotPresent => StatusCode::NOT_FOUND,
        StoreError::Unauthorized => StatusCode::FORBIDDEN,
        StoreError::BadRequest => StatusCode::BAD_REQUEST,
        StoreError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Serialize(_) | StoreError::Interrupted => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      };
      anyhow::Error::from(e).status_code(status)
    })
  }
}
