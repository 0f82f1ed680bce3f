use crate::prelude::*;

use tokio::io::AsyncWriteExt as _;

pub const RECORDS_KEY: &str = "authCodes";
pub const PASSWORD_TEST_KEY: &str = "passwordTest";

/// The persistence seam. Keys and values are opaque strings; values are
/// ciphertext envelopes, except for plaintext records left behind by a
/// pre-password install.
pub trait Store: Send + Sync {
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>>> + Send;
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// All keys in one json object file. Writes go through a tmp file and a
/// rename so a crash mid-write can't truncate the vault.
#[derive(Debug, Clone)]
pub struct FsStore {
    file: std::path::PathBuf,
}

impl FsStore {
    #[must_use]
    pub fn new(file: std::path::PathBuf) -> Self {
        Self { file }
    }

    async fn load(
        &self,
    ) -> Result<std::collections::HashMap<String, String>> {
        let json = match tokio::fs::read_to_string(&self.file).await {
            Ok(json) => json,
            Err(source)
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                return Ok(std::collections::HashMap::new());
            }
            Err(source) => {
                return Err(Error::LoadStore {
                    source,
                    file: self.file.clone(),
                });
            }
        };
        let jd = &mut serde_json::Deserializer::from_str(&json);
        let values = serde_path_to_error::deserialize(jd).map_err(
            |source| Error::LoadStoreJson {
                source,
                file: self.file.clone(),
            },
        )?;
        Ok(values)
    }

    async fn save(
        &self,
        values: &std::collections::HashMap<String, String>,
    ) -> Result<()> {
        let json = serde_json::to_string(values).map_err(|source| {
            Error::SaveStoreJson {
                source,
                file: self.file.clone(),
            }
        })?;
        if let Some(parent) = self.file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| {
                Error::SaveStore {
                    source,
                    file: self.file.clone(),
                }
            })?;
        }
        let tmp = self.file.with_extension("tmp");
        let mut fh = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .mode(0o600)
            .open(&tmp)
            .await
            .map_err(|source| Error::SaveStore {
                source,
                file: tmp.clone(),
            })?;
        fh.write_all(json.as_bytes()).await.map_err(|source| {
            Error::SaveStore {
                source,
                file: tmp.clone(),
            }
        })?;
        fh.sync_all().await.map_err(|source| Error::SaveStore {
            source,
            file: tmp.clone(),
        })?;
        drop(fh);
        tokio::fs::rename(&tmp, &self.file).await.map_err(|source| {
            Error::SaveStore {
                source,
                file: self.file.clone(),
            }
        })?;
        Ok(())
    }
}

impl Store for FsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut values = self.load().await?;
        Ok(values.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.save(&values).await?;
        }
        Ok(())
    }
}

/// In-memory store for tests. Clones share the same backing map, which
/// stands in for "reopen against the same storage", and writes are
/// counted so persist-per-mutation is assertable.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: std::sync::Arc<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    values: tokio::sync::Mutex<std::collections::HashMap<String, String>>,
    writes: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        self.inner
            .writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.values.lock().await.remove(key);
        self.inner
            .writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.write_count(), 1);
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn memory_store_clones_share_backing() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        let reopened = store.clone();
        assert_eq!(
            reopened.get("k").await.unwrap(),
            Some("v".to_string())
        );
    }

    #[tokio::test]
    async fn fs_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("store.json");
        let store = FsStore::new(file.clone());
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        store.set("k2", "v2").await.unwrap();

        let reopened = FsStore::new(file);
        assert_eq!(
            reopened.get("k").await.unwrap(),
            Some("v".to_string())
        );
        reopened.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.get("k2").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn fs_store_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("store.json");
        tokio::fs::write(&file, "not json").await.unwrap();
        let store = FsStore::new(file);
        assert!(matches!(
            store.get("k").await,
            Err(Error::LoadStoreJson { .. })
        ));
    }
}
