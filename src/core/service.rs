use crate::config::AppConfig;
use crate::core::hubspot::HubSpotConnector;
use crate::core::normalizer::normalize_batch;
use crate::core::salesforce::SalesforceConnector;
use crate::domain::model::{
    ConnectionStatus, DateRange, DealPage, Provider, RefreshPolicy, StoredToken, TokenGrant,
};
use crate::domain::ports::{CrmConnector, TokenStore};
use crate::utils::error::{CrmError, Result};
use chrono::Utc;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Connectors for the providers that have credentials configured.
#[derive(Default, Clone)]
pub struct Connectors {
    inner: HashMap<Provider, Arc<dyn CrmConnector>>,
}

impl Connectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig, client: Client) -> Self {
        let mut connectors = Self::new();
        if let Some(creds) = &config.hubspot {
            connectors.register(Arc::new(HubSpotConnector::new(client.clone(), creds.clone())));
        }
        if let Some(creds) = &config.salesforce {
            connectors.register(Arc::new(SalesforceConnector::new(client, creds.clone())));
        }
        connectors
    }

    pub fn register(&mut self, connector: Arc<dyn CrmConnector>) {
        self.inner.insert(connector.provider(), connector);
    }

    pub fn get(&self, provider: Provider) -> Result<&Arc<dyn CrmConnector>> {
        self.inner
            .get(&provider)
            .ok_or(CrmError::ProviderNotConfigured { provider })
    }
}

/// Connect, fetch, status and disconnect for every configured CRM.
#[derive(Clone)]
pub struct DealService {
    store: Arc<dyn TokenStore>,
    connectors: Connectors,
}

impl DealService {
    pub fn new(store: Arc<dyn TokenStore>, connectors: Connectors) -> Self {
        Self { store, connectors }
    }

    pub fn authorize_url(&self, provider: Provider, user_id: &str, sandbox: bool) -> Result<Url> {
        self.connectors.get(provider)?.authorize_url(user_id, sandbox)
    }

    /// Exchanges an authorization code and stores the resulting token.
    pub async fn connect(&self, provider: Provider, user_id: &str, code: &str) -> Result<StoredToken> {
        let connector = self.connectors.get(provider)?;
        let grant = connector.exchange_code(code).await?;
        let token = grant.into_stored(user_id, Utc::now());

        self.store.upsert(provider, &token).await?;
        tracing::info!("✅ {} connected for user {}", provider.display_name(), user_id);
        Ok(token)
    }

    pub async fn fetch_deals(
        &self,
        provider: Provider,
        user_id: &str,
        range: &DateRange,
    ) -> Result<DealPage> {
        let connector = self.connectors.get(provider)?;
        let token = self
            .store
            .get(provider, user_id)
            .await?
            .ok_or(CrmError::NotConnected { provider })?;

        let token = self.ensure_fresh(connector.as_ref(), token).await?;

        let page = match connector.fetch_won(&token, range).await {
            Ok(page) => page,
            Err(e) if e.needs_auth() => {
                self.forget(provider, user_id).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let deals = normalize_batch(provider, &page.records);
        tracing::info!(
            "📊 {} deals for user {}: {} fetched, {} kept",
            provider.display_name(),
            user_id,
            page.records.len(),
            deals.len()
        );
        Ok(DealPage::new(deals, page.has_more))
    }

    pub async fn status(&self, provider: Provider, user_id: &str) -> Result<ConnectionStatus> {
        let status = match self.store.get(provider, user_id).await? {
            Some(token) => ConnectionStatus::from_token(&token, Utc::now()),
            None => ConnectionStatus::disconnected(),
        };
        Ok(status)
    }

    pub async fn disconnect(&self, provider: Provider, user_id: &str) -> Result<()> {
        self.store.delete(provider, user_id).await?;
        tracing::info!("🔌 {} disconnected for user {}", provider.display_name(), user_id);
        Ok(())
    }

    async fn ensure_fresh(&self, connector: &dyn CrmConnector, token: StoredToken) -> Result<StoredToken> {
        let provider = connector.provider();

        match provider.refresh_policy() {
            RefreshPolicy::WhenExpired => {
                if !token.is_expired(Utc::now()) {
                    return Ok(token);
                }

                tracing::debug!("{} token expired, refreshing", provider.display_name());
                match connector.refresh(&token).await {
                    Ok(grant) => Ok(self.save_refreshed(provider, &token, grant).await),
                    Err(CrmError::UpstreamError { message, .. }) => {
                        tracing::warn!("{} refresh rejected: {}", provider.display_name(), message);
                        self.forget(provider, &token.user_id).await;
                        Err(CrmError::reauth(
                            provider,
                            format!("{} token expired", provider.display_name()),
                        ))
                    }
                    Err(e) => Err(e),
                }
            }
            RefreshPolicy::BeforeEveryFetch => match connector.refresh(&token).await {
                Ok(grant) => Ok(self.save_refreshed(provider, &token, grant).await),
                Err(e) => {
                    tracing::debug!(
                        "{} refresh failed, using stored access token: {}",
                        provider.display_name(),
                        e
                    );
                    Ok(token)
                }
            },
        }
    }

    async fn save_refreshed(
        &self,
        provider: Provider,
        token: &StoredToken,
        grant: TokenGrant,
    ) -> StoredToken {
        let updated = grant.apply_to(token, Utc::now());
        if let Err(e) = self.store.upsert(provider, &updated).await {
            tracing::warn!("Could not persist refreshed {} token: {}", provider.display_name(), e);
        }
        updated
    }

    /// Drops a token that no longer works; the caller reports needs-auth either way.
    async fn forget(&self, provider: Provider, user_id: &str) {
        if let Err(e) = self.store.delete(provider, user_id).await {
            tracing::warn!("Could not delete {} token for {}: {}", provider.display_name(), user_id, e);
        }
    }
}
