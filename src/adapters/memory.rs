use crate::domain::model::{Provider, StoredToken};
use crate::domain::ports::TokenStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-local token store for development and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenStore {
    tokens: Arc<Mutex<HashMap<(Provider, String), StoredToken>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tokens.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.lock().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn upsert(&self, provider: Provider, token: &StoredToken) -> Result<()> {
        let mut tokens = self.tokens.lock().await;
        tokens.insert((provider, token.user_id.clone()), token.clone());
        Ok(())
    }

    async fn get(&self, provider: Provider, user_id: &str) -> Result<Option<StoredToken>> {
        let tokens = self.tokens.lock().await;
        Ok(tokens.get(&(provider, user_id.to_string())).cloned())
    }

    async fn delete(&self, provider: Provider, user_id: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().await;
        tokens.remove(&(provider, user_id.to_string()));
        Ok(())
    }
}
