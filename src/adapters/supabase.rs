use crate::config::SupabaseSettings;
use crate::domain::model::{Provider, StoredToken};
use crate::domain::ports::{IdentityProvider, TokenStore};
use crate::utils::error::{CrmError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

/// Shared connection details for the Supabase REST and Auth APIs.
#[derive(Debug, Clone)]
struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    fn new(client: Client, settings: &SupabaseSettings) -> Self {
        Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            service_key: settings.service_key.clone(),
        }
    }

    fn with_api_key(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.service_key)
    }
}

/// Token store backed by the `hubspot_tokens` / `salesforce_tokens` tables (PostgREST).
#[derive(Debug, Clone)]
pub struct SupabaseTokenStore {
    inner: SupabaseClient,
}

impl SupabaseTokenStore {
    pub fn new(client: Client, settings: &SupabaseSettings) -> Self {
        Self {
            inner: SupabaseClient::new(client, settings),
        }
    }

    fn table_url(&self, provider: Provider) -> String {
        format!("{}/rest/v1/{}", self.inner.base_url, provider.token_table())
    }

    fn request(&self, request: RequestBuilder) -> RequestBuilder {
        self.inner
            .with_api_key(request)
            .bearer_auth(&self.inner.service_key)
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| CrmError::store(format!("{} failed: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("DB error during {} ({}): {}", action, status, body);
            return Err(CrmError::store(format!("{} failed ({})", action, status)));
        }
        Ok(response)
    }
}

#[async_trait]
impl TokenStore for SupabaseTokenStore {
    async fn upsert(&self, provider: Provider, token: &StoredToken) -> Result<()> {
        let request = self
            .request(self.inner.client.post(self.table_url(provider)))
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(token);

        self.send(request, "token upsert").await?;
        Ok(())
    }

    async fn get(&self, provider: Provider, user_id: &str) -> Result<Option<StoredToken>> {
        let filter = format!("eq.{}", user_id);
        let request = self
            .request(self.inner.client.get(self.table_url(provider)))
            .query(&[("user_id", filter.as_str()), ("select", "*"), ("limit", "1")]);

        let response = self.send(request, "token lookup").await?;
        let rows: Vec<StoredToken> = response
            .json()
            .await
            .map_err(|e| CrmError::store(format!("token lookup returned unexpected rows: {}", e)))?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, provider: Provider, user_id: &str) -> Result<()> {
        let filter = format!("eq.{}", user_id);
        let request = self
            .request(self.inner.client.delete(self.table_url(provider)))
            .query(&[("user_id", filter.as_str())]);

        self.send(request, "token delete").await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

/// Resolves app bearer tokens through Supabase Auth (`/auth/v1/user`).
#[derive(Debug, Clone)]
pub struct SupabaseAuth {
    inner: SupabaseClient,
}

impl SupabaseAuth {
    pub fn new(client: Client, settings: &SupabaseSettings) -> Self {
        Self {
            inner: SupabaseClient::new(client, settings),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn user_id(&self, bearer: &str) -> Result<String> {
        let url = format!("{}/auth/v1/user", self.inner.base_url);
        let response = self
            .inner
            .with_api_key(self.inner.client.get(url))
            .bearer_auth(bearer)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!("Supabase rejected bearer token ({})", response.status());
            return Err(CrmError::InvalidBearer);
        }

        let user: AuthUser = response.json().await.map_err(|_| CrmError::InvalidBearer)?;
        Ok(user.id)
    }
}
