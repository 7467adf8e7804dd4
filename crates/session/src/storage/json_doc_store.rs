use std::{path::PathBuf, sync::Arc};
use tokio::{fs, sync::RwLock};

use crate::errors::StoreError;

/// Generic JSON file-backed single-document store.
///
/// Persists an `Option<T>` to a JSON file and provides get/set/clear helpers.
/// Intended for small per-install state where a database is overkill.
#[derive(Clone)]
pub struct JsonDocStore<T> {
    inner: Arc<RwLock<Option<T>>>,
    file_path: PathBuf,
}

impl<T> JsonDocStore<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Clone,
{
    /// Initialize the store from a path. Creates the file with a `null`
    /// document if missing.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, StoreError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }

        let doc: Option<T> = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => {
                let empty: Option<T> = None;
                fs::write(
                    &file_path,
                    serde_json::to_vec(&empty).map_err(|e| StoreError::Serialization(e.to_string()))?,
                )
                .await
                .map_err(|e| StoreError::Io(e.to_string()))?;
                empty
            }
        };

        Ok(Arc::new(Self { inner: Arc::new(RwLock::new(doc)), file_path }))
    }

    async fn save(&self) -> Result<(), StoreError> {
        let doc = self.inner.read().await;
        let data = serde_json::to_vec(&*doc).map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(&self.file_path, data)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    /// Current document, if any.
    pub async fn get(&self) -> Option<T> {
        let doc = self.inner.read().await;
        doc.clone()
    }

    /// Replace the document and persist.
    pub async fn set(&self, value: T) -> Result<(), StoreError> {
        let mut doc = self.inner.write().await;
        *doc = Some(value);
        drop(doc);
        self.save().await
    }

    /// Remove the document and persist; returns whether one existed.
    pub async fn clear(&self) -> Result<bool, StoreError> {
        let mut doc = self.inner.write().await;
        let existed = doc.take().is_some();
        drop(doc);
        self.save().await?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        value: String,
    }

    fn temp_path(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{prefix}_{}.json", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn set_get_clear_roundtrip() -> Result<(), anyhow::Error> {
        let path = temp_path("json_doc");
        let store = JsonDocStore::<Doc>::open(&path).await?;

        assert_eq!(store.get().await, None);

        store.set(Doc { value: "alpha".into() }).await?;
        assert_eq!(store.get().await.unwrap().value, "alpha");

        assert!(store.clear().await?);
        assert!(!store.clear().await?);
        assert_eq!(store.get().await, None);

        let _ = fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test]
    async fn reopen_reads_persisted_document() -> Result<(), anyhow::Error> {
        let path = temp_path("json_doc_reopen");
        {
            let store = JsonDocStore::<Doc>::open(&path).await?;
            store.set(Doc { value: "persisted".into() }).await?;
        }
        let reopened = JsonDocStore::<Doc>::open(&path).await?;
        assert_eq!(reopened.get().await.unwrap().value, "persisted");

        let _ = fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_empty() -> Result<(), anyhow::Error> {
        let path = temp_path("json_doc_corrupt");
        fs::write(&path, b"{not json").await?;
        let store = JsonDocStore::<Doc>::open(&path).await?;
        assert_eq!(store.get().await, None);

        let _ = fs::remove_file(&path).await;
        Ok(())
    }
}
