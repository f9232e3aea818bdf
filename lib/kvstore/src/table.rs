use std::{collections::HashMap, time::Instant};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The distinguished principal. Bypasses the owner check on lookup
/// and delete, but cannot overwrite another owner's key.
pub const ADMIN_USER: &str = "admin";

/// Value plus metadata held for a single key. The value is opaque
/// bytes; nothing in here cares what they decode to.
#[derive(Debug)]
struct KeyRecord {
  owner: String,
  value: Vec<u8>,
  reads: u64,
  writes: u64,
  last_accessed: Instant,
}

impl KeyRecord {
  /// A record only exists because something was written to it, so
  /// `writes` starts at 1.
  fn new(owner: String, value: Vec<u8>) -> KeyRecord {
    KeyRecord {
      owner,
      value,
      reads: 0,
      writes: 1,
      last_accessed: Instant::now(),
    }
  }

  fn can_access(&self, user: &str) -> bool {
    user == self.owner || user == ADMIN_USER
  }

  fn read_value(&mut self) -> Vec<u8> {
    self.reads += 1;
    self.last_accessed = Instant::now();
    self.value.clone()
  }

  fn write_value(&mut self, value: Vec<u8>) {
    self.writes += 1;
    self.last_accessed = Instant::now();
    self.value = value;
  }
}

/// Wire shape of a single key in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMeta {
  pub key: String,
  pub owner: String,
  pub writes: u64,
  pub reads: u64,
  /// Milliseconds since the key was last read or written.
  pub age: i64,
}

/// Key -> record map bounded by `max_depth`.
///
/// Only ever touched by the guardian, so the operations carry no
/// synchronization of their own.
#[derive(Debug)]
pub(crate) struct KeyTable {
  entries: HashMap<String, KeyRecord>,
  max_depth: usize,
}

impl KeyTable {
  pub fn new(max_depth: usize) -> KeyTable {
    KeyTable {
      entries: HashMap::new(),
      max_depth,
    }
  }

  pub fn lookup(
    &mut self,
    key: &str,
    user: &str,
  ) -> Result<Vec<u8>, StoreError> {
    let record = self
      .entries
      .get_mut(key)
      .ok_or(StoreError::KeyNotPresent)?;
    if !record.can_access(user) {
      return Err(StoreError::Unauthorized);
    }
    Ok(record.read_value())
  }

  pub fn put(
    &mut self,
    key: &str,
    user: &str,
    value: Vec<u8>,
  ) -> Result<(), StoreError> {
    if let Some(record) = self.entries.get_mut(key) {
      // Overwrites require the original owner. Admin can read and
      // delete any key but cannot take one over.
      if record.owner != user {
        return Err(StoreError::Unauthorized);
      }
      record.write_value(value);
      return Ok(());
    }
    self
      .entries
      .insert(key.to_string(), KeyRecord::new(user.to_string(), value));
    self.evict_oldest();
    Ok(())
  }

  pub fn delete(
    &mut self,
    key: &str,
    user: &str,
  ) -> Result<(), StoreError> {
    let record =
      self.entries.get(key).ok_or(StoreError::KeyNotPresent)?;
    if !record.can_access(user) {
      return Err(StoreError::Unauthorized);
    }
    self.entries.remove(key);
    Ok(())
  }

  /// Metadata snapshot for one key. Reporting never counts as an
  /// access, so neither the counters nor the timestamp move.
  fn meta(key: &str, record: &KeyRecord) -> KeyMeta {
    KeyMeta {
      key: key.to_string(),
      owner: record.owner.clone(),
      writes: record.writes,
      reads: record.reads,
      age: record.last_accessed.elapsed().as_millis() as i64,
    }
  }

  pub fn list_all(&self) -> Vec<KeyMeta> {
    self
      .entries
      .iter()
      .map(|(key, record)| Self::meta(key, record))
      .collect()
  }

  pub fn list_one(&self, key: &str) -> Result<KeyMeta, StoreError> {
    let record =
      self.entries.get(key).ok_or(StoreError::KeyNotPresent)?;
    Ok(Self::meta(key, record))
  }

  /// Drop least recently accessed entries until the table fits its
  /// bound again. Runs after every insert, so the loop body fires
  /// at most once in practice.
  fn evict_oldest(&mut self) {
    while self.entries.len() > self.max_depth {
      let Some(oldest) = self
        .entries
        .iter()
        .min_by_key(|(_, record)| record.last_accessed)
        .map(|(key, _)| key.clone())
      else {
        return;
      };
      self.entries.remove(&oldest);
    }
  }
}
