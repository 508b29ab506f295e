//! Secret lookup for custom boot data.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Key of the secret entry holding custom boot data.
pub const USER_DATA_SECRET_KEY: &str = "userData";

/// Secret contents by key.
pub type SecretData = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// The namespace or name cannot be used as a path component.
    #[error("invalid secret reference {namespace:?}/{name:?}")]
    InvalidReference { namespace: String, name: String },

    #[error("failed to read secret {namespace}/{name}: {source}")]
    Io {
        namespace: String,
        name: String,
        #[source]
        source: io::Error,
    },
}

impl SecretError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Key/value secret lookup.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<SecretData, SecretError>;
}

/// Secrets held in memory.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<BTreeMap<(String, String), SecretData>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or extend) a secret with one key.
    pub fn with_entry(self, namespace: &str, name: &str, key: &str, value: &[u8]) -> Self {
        self.insert(namespace, name, key, value);
        self
    }

    pub fn insert(&self, namespace: &str, name: &str, key: &str, value: &[u8]) {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.to_vec());
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<SecretData, SecretError> {
        self.secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

/// Secrets laid out as mounted volumes: `{root}/{namespace}/{name}/{key}`.
///
/// Hidden entries (`..data` links and the like) are skipped. References that
/// would resolve outside the root are rejected.
#[derive(Debug, Clone)]
pub struct DirectorySecretStore {
    root: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// A single, non-special path component.
fn is_plain_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\', '\0'])
}

#[async_trait]
impl SecretStore for DirectorySecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<SecretData, SecretError> {
        let namespace_ok = namespace.is_empty() || is_plain_component(namespace);
        if !namespace_ok || !is_plain_component(name) {
            return Err(SecretError::InvalidReference {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }

        let dir = self.root.join(namespace).join(name);
        let io_err = |source: io::Error| SecretError::Io {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        };

        debug!(path = %dir.display(), "Reading secret");
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SecretError::NotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(io_err(e)),
        };

        let mut data = SecretData::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let key = entry.file_name().to_string_lossy().into_owned();
            if key.starts_with('.') {
                continue;
            }
            let path = entry.path();
            if !tokio::fs::metadata(&path).await.map_err(io_err)?.is_file() {
                continue;
            }
            let value = tokio::fs::read(&path).await.map_err(io_err)?;
            data.insert(key, value);
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let store = InMemorySecretStore::new().with_entry(
            "machines",
            "worker-user-data",
            USER_DATA_SECRET_KEY,
            b"#cloud-config",
        );

        let data = store
            .get_secret("machines", "worker-user-data")
            .await
            .unwrap();
        assert_eq!(data[USER_DATA_SECRET_KEY], b"#cloud-config".to_vec());

        let err = store.get_secret("other", "worker-user-data").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_directory_store_reads_mounted_layout() {
        let root = tempfile::tempdir().unwrap();
        let secret_dir = root.path().join("machines").join("worker-user-data");
        std::fs::create_dir_all(&secret_dir).unwrap();
        std::fs::write(secret_dir.join(USER_DATA_SECRET_KEY), b"ignition").unwrap();
        std::fs::write(secret_dir.join(".hidden"), b"skip").unwrap();

        let store = DirectorySecretStore::new(root.path());
        let data = store
            .get_secret("machines", "worker-user-data")
            .await
            .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[USER_DATA_SECRET_KEY], b"ignition".to_vec());

        let err = store.get_secret("machines", "absent").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_directory_store_stays_inside_root() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path().join("secrets");
        std::fs::create_dir_all(root.join("machines")).unwrap();
        let outside = base.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join(USER_DATA_SECRET_KEY), b"private").unwrap();

        let store = DirectorySecretStore::new(&root);
        let absolute = outside.to_string_lossy().into_owned();
        for (namespace, name) in [
            ("machines", "../../outside"),
            ("machines", absolute.as_str()),
            ("machines", ".."),
            ("..", "outside"),
            ("machines", ""),
        ] {
            let err = store.get_secret(namespace, name).await.unwrap_err();
            assert!(
                matches!(err, SecretError::InvalidReference { .. }),
                "{namespace}/{name} resolved to {err:?}"
            );
        }
    }
}
