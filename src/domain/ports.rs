use crate::domain::model::{DateRange, Provider, RawPage, StoredToken, TokenGrant};
use crate::utils::error::Result;
use async_trait::async_trait;
use url::Url;

/// Persistence for OAuth tokens, one record per `(provider, user_id)`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert or replace the record for `token.user_id`.
    async fn upsert(&self, provider: Provider, token: &StoredToken) -> Result<()>;
    async fn get(&self, provider: Provider, user_id: &str) -> Result<Option<StoredToken>>;
    async fn delete(&self, provider: Provider, user_id: &str) -> Result<()>;
}

/// Resolves the bearer token presented to our own API into a user id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_id(&self, bearer: &str) -> Result<String>;
}

/// OAuth and deal-query capabilities of one CRM.
#[async_trait]
pub trait CrmConnector: Send + Sync {
    fn provider(&self) -> Provider;

    fn authorize_url(&self, state: &str, sandbox: bool) -> Result<Url>;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    async fn refresh(&self, token: &StoredToken) -> Result<TokenGrant>;

    /// Fetches one page of won deals, newest close date first.
    ///
    /// A rejected access token surfaces as `CrmError::ReauthRequired`.
    async fn fetch_won(&self, token: &StoredToken, range: &DateRange) -> Result<RawPage>;
}
