use crate::config::ProviderCredentials;
use crate::core::oauth::{authorize_url, request_token};
use crate::domain::model::{DateRange, Provider, RawPage, RawRecord, StoredToken, TokenGrant};
use crate::domain::ports::CrmConnector;
use crate::utils::error::{CrmError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

const SCOPES: &[&str] = &["crm.objects.deals.read", "oauth"];

const SEARCH_PROPERTIES: &[&str] = &[
    "dealname",
    "amount",
    "closedate",
    "dealstage",
    "hs_deal_stage_probability",
    "contract_length",
    "term_months",
    "contract_term",
];

#[derive(Debug, Clone)]
pub struct HubSpotEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl Default for HubSpotEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: "https://app.hubspot.com/oauth/authorize".to_string(),
            token_url: "https://api.hubapi.com/oauth/v1/token".to_string(),
            api_base: "https://api.hubapi.com".to_string(),
        }
    }
}

impl HubSpotEndpoints {
    /// All endpoints under one base URL, e.g. a local mock server.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{}/oauth/authorize", base),
            token_url: format!("{}/oauth/v1/token", base),
            api_base: base.to_string(),
        }
    }
}

pub struct HubSpotConnector {
    client: Client,
    credentials: ProviderCredentials,
    endpoints: HubSpotEndpoints,
}

impl HubSpotConnector {
    pub fn new(client: Client, credentials: ProviderCredentials) -> Self {
        Self::with_endpoints(client, credentials, HubSpotEndpoints::default())
    }

    pub fn with_endpoints(
        client: Client,
        credentials: ProviderCredentials,
        endpoints: HubSpotEndpoints,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoints,
        }
    }
}

#[async_trait]
impl CrmConnector for HubSpotConnector {
    fn provider(&self) -> Provider {
        Provider::HubSpot
    }

    fn authorize_url(&self, state: &str, _sandbox: bool) -> Result<Url> {
        let scope = SCOPES.join(" ");
        authorize_url(
            &self.endpoints.authorize_url,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        request_token(
            &self.client,
            Provider::HubSpot,
            &self.endpoints.token_url,
            &[
                ("grant_type", "authorization_code"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("code", code),
            ],
        )
        .await
    }

    async fn refresh(&self, token: &StoredToken) -> Result<TokenGrant> {
        request_token(
            &self.client,
            Provider::HubSpot,
            &self.endpoints.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", token.refresh_token.as_str()),
            ],
        )
        .await
    }

    async fn fetch_won(&self, token: &StoredToken, range: &DateRange) -> Result<RawPage> {
        let url = format!("{}/crm/v3/objects/deals/search", self.endpoints.api_base);
        let body = search_body(range);

        tracing::debug!("Searching HubSpot deals: {}", body);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CrmError::reauth(Provider::HubSpot, "HubSpot session expired"));
        }
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            tracing::error!("HubSpot deals error ({}): {}", status, error);
            return Err(CrmError::upstream(
                Provider::HubSpot,
                Some(status.as_u16()),
                "Failed to fetch deals from HubSpot",
            ));
        }

        let payload: Value = response.json().await?;
        parse_search_response(payload)
    }
}

/// Search request for won deals (stage probability 1), newest first.
pub fn search_body(range: &DateRange) -> Value {
    let mut filters = vec![json!({
        "propertyName": "hs_deal_stage_probability",
        "operator": "EQ",
        "value": "1"
    })];

    if let Some(after) = range.after {
        filters.push(json!({
            "propertyName": "closedate",
            "operator": "GTE",
            "value": start_of_day_millis(after).to_string()
        }));
    }
    if let Some(before) = range.before {
        filters.push(json!({
            "propertyName": "closedate",
            "operator": "LTE",
            "value": end_of_day_millis(before).to_string()
        }));
    }

    json!({
        "filterGroups": [{ "filters": filters }],
        "properties": SEARCH_PROPERTIES,
        "limit": Provider::HubSpot.page_size(),
        "sorts": [{ "propertyName": "closedate", "direction": "DESCENDING" }]
    })
}

fn start_of_day_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

fn end_of_day_millis(date: NaiveDate) -> i64 {
    start_of_day_millis(date) + 24 * 60 * 60 * 1000 - 1
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: String,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<Value>,
}

/// Converts a `crm/v3/objects/deals/search` response into raw records.
pub fn parse_search_response(payload: Value) -> Result<RawPage> {
    let response: SearchResponse = serde_json::from_value(payload)?;
    let has_more = response.paging.and_then(|p| p.next).is_some();
    let records = response
        .results
        .into_iter()
        .map(|deal| RawRecord::new(deal.id, deal.properties))
        .collect();

    Ok(RawPage { records, has_more })
}
