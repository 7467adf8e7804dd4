use async_trait::async_trait;

use super::domain::StoredToken;
use crate::errors::StoreError;

/// Secure persisted-credential boundary.
///
/// Holds at most one token across app restarts. The storage format
/// (keychain, encrypted file, plain file) is the implementation's concern.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredToken>, StoreError>;
    async fn save(&self, token: &StoredToken) -> Result<(), StoreError>;
    /// Remove any stored token; returns whether one existed.
    async fn clear(&self) -> Result<bool, StoreError>;
}

/// In-memory store for tests and doc examples.
pub mod mock {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryCredentialStore {
        token: Mutex<Option<StoredToken>>,
        save_calls: AtomicUsize,
        clear_calls: AtomicUsize,
    }

    impl MemoryCredentialStore {
        pub fn with_token(token: StoredToken) -> Self {
            let store = Self::default();
            *store.token.lock().unwrap() = Some(token);
            store
        }

        pub fn save_calls(&self) -> usize {
            self.save_calls.load(Ordering::SeqCst)
        }

        pub fn clear_calls(&self) -> usize {
            self.clear_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn load(&self) -> Result<Option<StoredToken>, StoreError> {
            Ok(self.token.lock().unwrap().clone())
        }

        async fn save(&self, token: &StoredToken) -> Result<(), StoreError> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            *self.token.lock().unwrap() = Some(token.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<bool, StoreError> {
            self.clear_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.token.lock().unwrap().take().is_some())
        }
    }
}
