use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::api::{Ec2Api, KeyPairInfo};
use crate::error::Ec2Error;

/// Encapsulates EC2 key pair actions.
///
/// The private key material returned by `create` exists only in that one
/// response; it is written to the caller-supplied directory before the
/// response is dropped. The directory should be a secure location and is
/// the caller's to clean up.
pub struct KeyPairWrapper {
  api: Arc<dyn Ec2Api>,
  key_file_dir: PathBuf,
  key_name: Option<String>,
  key_file_path: Option<PathBuf>,
}

impl KeyPairWrapper {
  pub fn new(api: Arc<dyn Ec2Api>, key_file_dir: impl Into<PathBuf>) -> Self {
    KeyPairWrapper {
      api,
      key_file_dir: key_file_dir.into(),
      key_name: None,
      key_file_path: None,
    }
  }

  pub fn key_name(&self) -> Option<&str> {
    self.key_name.as_deref()
  }

  pub fn key_file_path(&self) -> Option<&Path> {
    self.key_file_path.as_deref()
  }

  /// Creates a key pair and writes its one-time private key material to
  /// `<dir>/<name>.pem`. Returns the key material.
  ///
  /// If the local write fails after the remote create succeeded, the remote
  /// key pair is left behind and no identifier is retained; there is no
  /// rollback.
  pub async fn create(&mut self, name: &str) -> Result<String, Ec2Error> {
    let created = self.api.create_key_pair(name).await.map_err(|err| {
      error!(
        key_name = %name,
        code = ?err.code(),
        error = %err,
        "Couldn't create key pair"
      );
      err
    })?;

    let key_file_path = self.key_file_dir.join(format!("{}.pem", created.name));
    tokio::fs::write(&key_file_path, &created.key_material)
      .await
      .map_err(|err| {
        error!(
          key_name = %created.name,
          path = %key_file_path.display(),
          error = %err,
          "Couldn't write private key material"
        );
        Ec2Error::from(err)
      })?;

    info!(key_name = %created.name, path = %key_file_path.display(), "Created key pair");
    self.key_name = Some(created.name);
    self.key_file_path = Some(key_file_path);
    Ok(created.key_material)
  }

  /// Returns up to `limit` key pairs for the account.
  pub async fn list(&self, limit: usize) -> Result<Vec<KeyPairInfo>, Ec2Error> {
    let mut key_pairs = self.api.describe_key_pairs().await.map_err(|err| {
      error!(code = ?err.code(), error = %err, "Couldn't list key pairs");
      err
    })?;
    key_pairs.truncate(limit);
    Ok(key_pairs)
  }

  /// Deletes the held key pair. The remote delete is idempotent; no
  /// existence pre-check is made.
  pub async fn delete(&mut self) -> Result<(), Ec2Error> {
    let Some(name) = self.key_name.clone() else {
      info!("No key pair to delete.");
      return Ok(());
    };

    self.api.delete_key_pair(&name).await.map_err(|err| {
      error!(key_name = %name, code = ?err.code(), error = %err, "Couldn't delete key pair");
      err
    })?;

    info!(key_name = %name, "Deleted key pair");
    self.key_name = None;
    self.key_file_path = None;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::resource::mock::MockApi;

  fn wrapper(dir: &Path) -> (Arc<MockApi>, KeyPairWrapper) {
    let api = Arc::new(MockApi::new());
    let wrapper = KeyPairWrapper::new(api.clone(), dir);
    (api, wrapper)
  }

  #[tokio::test]
  async fn create_writes_exactly_one_pem_file_with_the_material() {
    let dir = tempfile::tempdir().unwrap();
    let (_api, mut keys) = wrapper(dir.path());

    let material = keys.create("k1").await.unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let expected = dir.path().join("k1.pem");
    assert_eq!(keys.key_file_path(), Some(expected.as_path()));
    assert_eq!(std::fs::read_to_string(expected).unwrap(), material);
    assert_eq!(keys.key_name(), Some("k1"));
  }

  #[tokio::test]
  async fn failed_create_leaves_no_held_state() {
    let dir = tempfile::tempdir().unwrap();
    let (api, mut keys) = wrapper(dir.path());
    api.fail_next(
      "create_key_pair",
      Ec2Error::from_code(Some("InvalidKeyPair.Duplicate"), "already exists"),
    );

    let err = keys.create("k1").await.unwrap_err();
    assert!(matches!(err, Ec2Error::Api { .. }));
    assert!(keys.key_name().is_none());
    assert!(keys.key_file_path().is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
  }

  #[tokio::test]
  async fn failed_key_file_write_propagates_io_and_leaves_the_remote_key() {
    let dir = tempfile::tempdir().unwrap();
    // Point the wrapper at a directory that does not exist so the write fails
    // after the remote create has already succeeded.
    let missing = dir.path().join("missing-subdir");
    let (api, mut keys) = wrapper(&missing);

    let err = keys.create("k1").await.unwrap_err();
    assert!(matches!(err, Ec2Error::Io(_)));

    // The remote create went out and nothing deletes the orphaned key pair.
    assert_eq!(api.calls_named("create_key_pair"), vec!["create_key_pair k1"]);
    assert!(api.calls_named("delete_key_pair").is_empty());

    // The wrapper retains nothing it could not persist.
    assert!(keys.key_name().is_none());
    assert!(keys.key_file_path().is_none());
  }

  #[tokio::test]
  async fn list_truncates_to_limit() {
    let dir = tempfile::tempdir().unwrap();
    let (_api, mut keys) = wrapper(dir.path());
    keys.create("a").await.unwrap();
    keys.create("b").await.unwrap();
    keys.create("c").await.unwrap();

    let listed = keys.list(2).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "a");
  }

  #[tokio::test]
  async fn delete_without_a_key_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let (api, mut keys) = wrapper(dir.path());

    keys.delete().await.unwrap();
    assert!(api.calls_named("delete_key_pair").is_empty());
  }

  #[tokio::test]
  async fn delete_uses_the_held_name_and_clears_state() {
    let dir = tempfile::tempdir().unwrap();
    let (api, mut keys) = wrapper(dir.path());
    keys.create("k1").await.unwrap();

    keys.delete().await.unwrap();
    assert_eq!(api.calls_named("delete_key_pair"), vec!["delete_key_pair k1"]);
    assert!(keys.key_name().is_none());
  }
}
