use anyhow::Context;
use async_timing_util::unix_timestamp_ms;
use jsonwebtoken::{
  DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::{config::ServerConfig, helpers::random_string};

#[derive(Serialize, Deserialize, Clone)]
pub struct JwtClaims {
  pub username: String,
  pub iat: u64,
  pub exp: u64,
}

pub struct JwtClient {
  header: Header,
  validation: Validation,
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
  ttl_secs: u64,
}

impl JwtClient {
  pub fn new(config: &ServerConfig) -> anyhow::Result<JwtClient> {
    let secret = if config.jwt_secret.is_empty() {
      random_string(40)
    } else {
      config.jwt_secret.clone()
    };
    Ok(JwtClient {
      header: Header::default(),
      validation: Validation::new(Default::default()),
      encoding_key: EncodingKey::from_secret(secret.as_bytes()),
      decoding_key: DecodingKey::from_secret(secret.as_bytes()),
      ttl_secs: config.jwt_ttl_secs,
    })
  }

  pub fn encode(&self, username: &str) -> anyhow::Result<String> {
    let iat = (unix_timestamp_ms() / 1000) as u64;
    let exp = iat + self.ttl_secs;
    let claims = JwtClaims {
      username: username.to_string(),
      iat,
      exp,
    };
    encode(&self.header, &claims, &self.encoding_key)
      .context("Failed at signing claim")
  }

  pub fn decode(&self, jwt: &str) -> anyhow::Result<JwtClaims> {
    decode::<JwtClaims>(jwt, &self.decoding_key, &self.validation)
      .map(|res| res.claims)
      .context("Failed to decode token claims")
  }
}
