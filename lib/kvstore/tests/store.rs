use std::time::Duration;

use kvstore::{ADMIN_USER, KeyMeta, Store, StoreError, StoreParams};

fn startup(buffer_size: usize, max_depth: usize) -> Store {
  Store::startup(StoreParams {
    buffer_size,
    max_depth,
    ..Default::default()
  })
}

/// Instant resolution is fine-grained on every target we care
/// about, but a couple of milliseconds between accesses keeps the
/// eviction order assertions honest.
async fn spread() {
  tokio::time::sleep(Duration::from_millis(3)).await;
}

#[tokio::test]
async fn startup_shutdown() {
  let store = startup(100, 100);
  store.shutdown().await.expect("unable to shutdown properly");
}

#[tokio::test]
async fn put_get() {
  let store = startup(100, 100);
  store
    .put("key", "test", b"value".to_vec())
    .await
    .expect("unable to put a value in the store");
  let value = store
    .lookup("key", "test")
    .await
    .expect("unable to retrieve value from the store");
  assert_eq!(value, b"value".to_vec());
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn put_get_binary_value() {
  let store = startup(100, 100);
  // Not valid UTF-8; the store must not care.
  let value = vec![0xff, 0x00, 0xfe, 0x80, 0xc3];
  store.put("key", "test", value.clone()).await.unwrap();
  assert_eq!(store.lookup("key", "test").await.unwrap(), value);
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn put_change() {
  let store = startup(100, 100);
  store.put("key", "test", b"value".to_vec()).await.unwrap();
  assert_eq!(
    store.lookup("key", "test").await.unwrap(),
    b"value".to_vec()
  );
  store
    .put("key", "test", b"new data".to_vec())
    .await
    .expect("unable to overwrite a key with the same user");
  assert_eq!(
    store.lookup("key", "test").await.unwrap(),
    b"new data".to_vec()
  );
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn put_change_unauthorized() {
  let store = startup(100, 100);
  store.put("key", "test", b"value".to_vec()).await.unwrap();
  let err = store
    .put("key", "wrong", b"new data".to_vec())
    .await
    .expect_err("able to change a value for a different user");
  assert!(matches!(err, StoreError::Unauthorized));
  // The stored value must be untouched.
  assert_eq!(
    store.lookup("key", "test").await.unwrap(),
    b"value".to_vec()
  );
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn get_not_there() {
  let store = startup(100, 100);
  let err = store
    .lookup("key", "test")
    .await
    .expect_err("able to retrieve a value for an absent key");
  assert!(matches!(err, StoreError::KeyNotPresent));
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn get_not_authorized() {
  let store = startup(100, 100);
  store.put("key", "test", b"value".to_vec()).await.unwrap();
  let err = store
    .lookup("key", "wrong")
    .await
    .expect_err("able to retrieve a value with the wrong user");
  assert!(matches!(err, StoreError::Unauthorized));
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn delete() {
  let store = startup(100, 100);
  store.put("key", "test", b"value".to_vec()).await.unwrap();
  store
    .delete("key", "test")
    .await
    .expect("unable to delete a key");
  let err = store.lookup("key", "test").await.expect_err(
    "able to retrieve a value after deleting its key",
  );
  assert!(matches!(err, StoreError::KeyNotPresent));
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn delete_unauthorized() {
  let store = startup(100, 100);
  store.put("key", "test", b"value".to_vec()).await.unwrap();
  let err = store
    .delete("key", "wrong")
    .await
    .expect_err("able to delete another user's key");
  assert!(matches!(err, StoreError::Unauthorized));
  // A rejected delete must leave the record intact.
  assert_eq!(
    store.lookup("key", "test").await.unwrap(),
    b"value".to_vec()
  );
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn delete_not_there() {
  let store = startup(100, 100);
  let err = store
    .delete("key", "test")
    .await
    .expect_err("able to delete a non-existent key");
  assert!(matches!(err, StoreError::KeyNotPresent));
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn admin_reads_and_deletes_any_key() {
  let store = startup(100, 100);
  store.put("key", "test", b"value".to_vec()).await.unwrap();
  assert_eq!(
    store.lookup("key", ADMIN_USER).await.unwrap(),
    b"value".to_vec()
  );
  store
    .delete("key", ADMIN_USER)
    .await
    .expect("admin unable to delete another user's key");
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn admin_cannot_overwrite_another_owner() {
  let store = startup(100, 100);
  store.put("key", "test", b"value".to_vec()).await.unwrap();
  let err = store
    .put("key", ADMIN_USER, b"taken over".to_vec())
    .await
    .expect_err("admin able to overwrite another user's key");
  assert!(matches!(err, StoreError::Unauthorized));
  assert_eq!(
    store.lookup("key", "test").await.unwrap(),
    b"value".to_vec()
  );
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn listing() {
  let store = startup(100, 100);
  let keys = ["key1", "key2", "key3"];
  let users = ["user1", "user2", "user3"];
  let values = ["value1", "value2", "value3"];
  for i in 0..keys.len() {
    store
      .put(keys[i], users[i], values[i].as_bytes().to_vec())
      .await
      .unwrap();
  }

  // List all: one object per key, owners matching the inputs,
  // in no particular order.
  let json = store.list_all().await.unwrap();
  let listed: Vec<KeyMeta> = serde_json::from_slice(&json)
    .expect("store listing is not a json array");
  assert_eq!(listed.len(), keys.len());
  for meta in &listed {
    let i = keys
      .iter()
      .position(|key| *key == meta.key)
      .expect("listed key was never put");
    assert_eq!(meta.owner, users[i]);
    assert_eq!(meta.writes, 1);
    assert_eq!(meta.reads, 0);
    assert!(meta.age >= 0);
  }

  // List one.
  let json = store.list_key("key1").await.unwrap();
  let meta: KeyMeta = serde_json::from_slice(&json)
    .expect("key listing is not a json object");
  assert_eq!(meta.key, "key1");
  assert_eq!(meta.owner, "user1");

  // List a missing key.
  let err = store
    .list_key("wrong")
    .await
    .expect_err("able to list a non-existent key");
  assert!(matches!(err, StoreError::KeyNotPresent));

  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn listing_field_names_are_stable() {
  let store = startup(100, 100);
  store.put("key", "test", b"value".to_vec()).await.unwrap();
  let json = store.list_key("key").await.unwrap();
  let object: serde_json::Value =
    serde_json::from_slice(&json).unwrap();
  for field in ["key", "owner", "writes", "reads", "age"] {
    assert!(
      object.get(field).is_some(),
      "listing is missing the '{field}' field"
    );
  }
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn depth_limit_evicts_least_recently_used() {
  let keys = ["key1", "key2", "key3", "key4"];
  let users = ["user1", "user2", "user3", "user4"];
  let values = ["value1", "value2", "value3", "value4"];
  let store = startup(100, keys.len() - 1);
  for i in 0..keys.len() {
    store
      .put(keys[i], users[i], values[i].as_bytes().to_vec())
      .await
      .unwrap();
    spread().await;
  }

  // key1 was the least recently accessed, so it must be gone.
  let err = store.lookup("key1", "user1").await.expect_err(
    "able to retrieve a key that should have been evicted",
  );
  assert!(matches!(err, StoreError::KeyNotPresent));
  for i in 1..keys.len() {
    assert_eq!(
      store.lookup(keys[i], users[i]).await.unwrap(),
      values[i].as_bytes().to_vec()
    );
  }
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn recent_lookup_protects_a_key_from_eviction() {
  let store = startup(100, 3);
  store.put("key1", "test", b"a".to_vec()).await.unwrap();
  spread().await;
  store.put("key2", "test", b"b".to_vec()).await.unwrap();
  spread().await;
  store.put("key3", "test", b"c".to_vec()).await.unwrap();
  spread().await;
  // Touch key1 so key2 becomes the eviction candidate.
  store.lookup("key1", "test").await.unwrap();
  spread().await;
  store.put("key4", "test", b"d".to_vec()).await.unwrap();

  assert!(store.lookup("key1", "test").await.is_ok());
  let err = store.lookup("key2", "test").await.unwrap_err();
  assert!(matches!(err, StoreError::KeyNotPresent));
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_authorization_does_not_refresh_lru() {
  let store = startup(100, 3);
  store.put("key1", "test", b"a".to_vec()).await.unwrap();
  spread().await;
  store.put("key2", "test", b"b".to_vec()).await.unwrap();
  spread().await;
  store.put("key3", "test", b"c".to_vec()).await.unwrap();
  spread().await;
  // A rejected read must not count as an access, so key1 stays
  // the eviction candidate.
  let err = store.lookup("key1", "wrong").await.unwrap_err();
  assert!(matches!(err, StoreError::Unauthorized));
  spread().await;
  store.put("key4", "test", b"d".to_vec()).await.unwrap();

  let err = store.lookup("key1", "test").await.unwrap_err();
  assert!(matches!(err, StoreError::KeyNotPresent));
  store.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_is_single_shot() {
  let store = startup(100, 100);
  store.shutdown().await.expect("unable to shutdown properly");
  let err = store
    .shutdown()
    .await
    .expect_err("second shutdown did not fail");
  assert!(matches!(err, StoreError::Shutdown));
}

#[tokio::test]
async fn submissions_after_shutdown_fail() {
  let store = startup(100, 100);
  store.put("key", "test", b"value".to_vec()).await.unwrap();
  store.shutdown().await.unwrap();

  let err = store
    .put("key2", "test", b"value".to_vec())
    .await
    .unwrap_err();
  assert!(matches!(err, StoreError::Shutdown));
  let err = store.lookup("key", "test").await.unwrap_err();
  assert!(matches!(err, StoreError::Shutdown));
  let err = store.list_all().await.unwrap_err();
  assert!(matches!(err, StoreError::Shutdown));
}

#[tokio::test(flavor = "multi_thread")]
async fn parallel_producers_all_get_replies() {
  let store = startup(4, 100);
  let mut handles = Vec::new();
  for i in 0..32 {
    let store = store.clone();
    handles.push(tokio::spawn(async move {
      let key = format!("key{i}");
      let user = format!("user{i}");
      store
        .put(&key, &user, format!("value{i}").into_bytes())
        .await?;
      store.lookup(&key, &user).await
    }));
  }
  for (i, handle) in handles.into_iter().enumerate() {
    let value = handle.await.unwrap().unwrap();
    assert_eq!(value, format!("value{i}").into_bytes());
  }
  store.shutdown().await.unwrap();
}
