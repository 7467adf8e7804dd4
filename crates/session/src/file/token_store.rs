use std::sync::Arc;

use crate::auth::domain::StoredToken;
use crate::auth::store::CredentialStore;
use crate::errors::StoreError;
use crate::storage::json_doc_store::JsonDocStore;

/// File-backed credential store.
///
/// Keeps the refresh token persisted as a JSON document on disk. Stands in
/// for platform keychain storage, which is outside this crate's scope.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<JsonDocStore<StoredToken>>,
}

impl TokenStore {
    /// Initialize the store from the given file path. Creates the file if missing.
    pub async fn open<P: Into<std::path::PathBuf>>(path: P) -> Result<Arc<Self>, StoreError> {
        let store = JsonDocStore::<StoredToken>::open(path).await?;
        Ok(Arc::new(Self { store }))
    }
}

#[async_trait::async_trait]
impl CredentialStore for TokenStore {
    async fn load(&self) -> Result<Option<StoredToken>, StoreError> {
        Ok(self.store.get().await)
    }

    async fn save(&self, token: &StoredToken) -> Result<(), StoreError> {
        self.store.set(token.clone()).await
    }

    async fn clear(&self) -> Result<bool, StoreError> {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn token_survives_reopen_and_clear_is_final() -> Result<(), anyhow::Error> {
        let path = std::env::temp_dir().join(format!("token_store_{}.json", Uuid::new_v4()));

        let token = StoredToken::new("tok-abc", Uuid::new_v4());
        {
            let store = TokenStore::open(&path).await?;
            assert_eq!(store.load().await?, None);
            store.save(&token).await?;
        }

        let reopened = TokenStore::open(&path).await?;
        assert_eq!(reopened.load().await?, Some(token));

        assert!(reopened.clear().await?);
        assert!(!reopened.clear().await?);
        assert_eq!(reopened.load().await?, None);

        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }
}
