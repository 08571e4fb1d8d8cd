use crate::config::ProviderCredentials;
use crate::core::oauth::{authorize_url, request_token};
use crate::domain::model::{DateRange, Provider, RawPage, RawRecord, StoredToken, TokenGrant};
use crate::domain::ports::CrmConnector;
use crate::utils::error::{CrmError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

const SCOPES: &[&str] = &["api", "refresh_token", "offline_access"];

const BASE_FIELDS: &[&str] = &["Id", "Name", "Amount", "CloseDate", "StageName"];

/// Custom contract-term fields; orgs without them reject the query.
const TERM_FIELDS: &[&str] = &["Contract_Term__c", "Contract_Length__c", "Term_Months__c"];

#[derive(Debug, Clone)]
pub struct SalesforceEndpoints {
    pub login_url: String,
    pub sandbox_login_url: String,
    pub api_version: String,
}

impl Default for SalesforceEndpoints {
    fn default() -> Self {
        Self {
            login_url: "https://login.salesforce.com".to_string(),
            sandbox_login_url: "https://test.salesforce.com".to_string(),
            api_version: "v59.0".to_string(),
        }
    }
}

pub struct SalesforceConnector {
    client: Client,
    credentials: ProviderCredentials,
    endpoints: SalesforceEndpoints,
}

impl SalesforceConnector {
    pub fn new(client: Client, credentials: ProviderCredentials) -> Self {
        Self::with_endpoints(client, credentials, SalesforceEndpoints::default())
    }

    pub fn with_endpoints(
        client: Client,
        credentials: ProviderCredentials,
        endpoints: SalesforceEndpoints,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoints,
        }
    }

    async fn query(&self, instance_url: &str, access_token: &str, soql: &str) -> Result<RawPage> {
        let url = format!(
            "{}/services/data/{}/query",
            instance_url.trim_end_matches('/'),
            self.endpoints.api_version
        );

        tracing::debug!("Running SOQL: {}", soql);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("q", soql)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CrmError::reauth(Provider::Salesforce, "Salesforce session expired"));
        }
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            tracing::error!("Salesforce query error ({}): {}", status, error);
            return Err(CrmError::upstream(
                Provider::Salesforce,
                Some(status.as_u16()),
                format!("Salesforce query failed ({})", status),
            ));
        }

        let payload: Value = response.json().await?;
        parse_query_response(payload)
    }
}

#[async_trait]
impl CrmConnector for SalesforceConnector {
    fn provider(&self) -> Provider {
        Provider::Salesforce
    }

    fn authorize_url(&self, state: &str, sandbox: bool) -> Result<Url> {
        let login_url = if sandbox {
            &self.endpoints.sandbox_login_url
        } else {
            &self.endpoints.login_url
        };
        let scope = SCOPES.join(" ");

        authorize_url(
            &format!("{}/services/oauth2/authorize", login_url),
            &[
                ("response_type", "code"),
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
    }

    /// Tries production login first, then sandbox.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let mut last_error = None;

        for login_url in [&self.endpoints.login_url, &self.endpoints.sandbox_login_url] {
            let token_url = format!("{}/services/oauth2/token", login_url);
            let result = request_token(
                &self.client,
                Provider::Salesforce,
                &token_url,
                &[
                    ("grant_type", "authorization_code"),
                    ("client_id", self.credentials.client_id.as_str()),
                    ("client_secret", self.credentials.client_secret.as_str()),
                    ("redirect_uri", self.credentials.redirect_uri.as_str()),
                    ("code", code),
                ],
            )
            .await;

            match result {
                Ok(grant) => return Ok(grant),
                Err(e) => {
                    tracing::debug!("Salesforce code exchange via {} failed: {}", login_url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CrmError::upstream(Provider::Salesforce, None, "Salesforce token exchange failed")
        }))
    }

    async fn refresh(&self, token: &StoredToken) -> Result<TokenGrant> {
        let base = token
            .instance_url
            .as_deref()
            .unwrap_or(&self.endpoints.login_url);
        let token_url = format!("{}/services/oauth2/token", base.trim_end_matches('/'));

        request_token(
            &self.client,
            Provider::Salesforce,
            &token_url,
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
        let instance_url = token.instance_url.as_deref().ok_or_else(|| {
            CrmError::reauth(Provider::Salesforce, "Salesforce instance URL missing")
        })?;

        let mut fields = BASE_FIELDS.to_vec();
        fields.extend_from_slice(TERM_FIELDS);
        let soql = build_soql(&fields, range);

        match self.query(instance_url, &token.access_token, &soql).await {
            Err(CrmError::UpstreamError { status, .. }) => {
                tracing::warn!(
                    "⚠️ Salesforce rejected the contract-term query ({:?}), retrying without custom fields",
                    status
                );
                let simple = build_soql(BASE_FIELDS, range);
                self.query(instance_url, &token.access_token, &simple)
                    .await
                    .map_err(|e| match e {
                        CrmError::UpstreamError { status, .. } => CrmError::upstream(
                            Provider::Salesforce,
                            status,
                            "Failed to fetch opportunities from Salesforce",
                        ),
                        other => other,
                    })
            }
            other => other,
        }
    }
}

/// Closed Won opportunities with a positive amount, newest close date first.
pub fn build_soql(fields: &[&str], range: &DateRange) -> String {
    let mut soql = format!(
        "SELECT {} FROM Opportunity WHERE StageName = 'Closed Won' AND Amount > 0",
        fields.join(", ")
    );

    if let Some(after) = range.after {
        soql.push_str(&format!(" AND CloseDate >= {}", after.format("%Y-%m-%d")));
    }
    if let Some(before) = range.before {
        soql.push_str(&format!(" AND CloseDate <= {}", before.format("%Y-%m-%d")));
    }

    soql.push_str(&format!(
        " ORDER BY CloseDate DESC LIMIT {}",
        Provider::Salesforce.page_size()
    ));
    soql
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    records: Vec<serde_json::Map<String, Value>>,
    #[serde(rename = "nextRecordsUrl")]
    next_records_url: Option<String>,
}

/// Converts a `/query` response into raw records; `attributes` is dropped.
pub fn parse_query_response(payload: Value) -> Result<RawPage> {
    let response: QueryResponse = serde_json::from_value(payload)?;
    let has_more = response.next_records_url.is_some();
    let records = response
        .records
        .into_iter()
        .map(|mut fields| {
            fields.remove("attributes");
            let id = match fields.get("Id") {
                Some(Value::String(id)) => id.clone(),
                _ => String::new(),
            };
            RawRecord::new(id, fields)
        })
        .collect();

    Ok(RawPage { records, has_more })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn connector() -> SalesforceConnector {
        SalesforceConnector::new(
            Client::new(),
            ProviderCredentials {
                client_id: "sf-client".to_string(),
                client_secret: "sf-secret".to_string(),
                redirect_uri: "https://comish.online/api/salesforce/callback".to_string(),
            },
        )
    }

    #[test]
    fn test_build_soql_with_range() {
        let range = DateRange {
            after: NaiveDate::from_ymd_opt(2024, 1, 1),
            before: NaiveDate::from_ymd_opt(2024, 6, 30),
        };
        assert_eq!(
            build_soql(BASE_FIELDS, &range),
            "SELECT Id, Name, Amount, CloseDate, StageName FROM Opportunity \
             WHERE StageName = 'Closed Won' AND Amount > 0 \
             AND CloseDate >= 2024-01-01 AND CloseDate <= 2024-06-30 \
             ORDER BY CloseDate DESC LIMIT 200"
        );
    }

    #[test]
    fn test_build_soql_without_range() {
        let soql = build_soql(BASE_FIELDS, &DateRange::default());
        assert!(!soql.contains("CloseDate >="));
        assert!(soql.ends_with("ORDER BY CloseDate DESC LIMIT 200"));
    }

    #[test]
    fn test_parse_query_response_strips_attributes() {
        let page = parse_query_response(json!({
            "totalSize": 1,
            "done": false,
            "nextRecordsUrl": "/services/data/v59.0/query/01gD0000002HU6KIAW-2000",
            "records": [{
                "attributes": {"type": "Opportunity", "url": "/services/data/v59.0/sobjects/Opportunity/006A"},
                "Id": "006A",
                "Name": "Globex Deal",
                "Amount": 1200.5,
                "CloseDate": "2024-01-02"
            }]
        }))
        .unwrap();

        assert!(page.has_more);
        assert_eq!(page.records[0].id, "006A");
        assert!(!page.records[0].fields.contains_key("attributes"));
    }

    #[test]
    fn test_authorize_url_switches_to_sandbox() {
        let production = connector().authorize_url("u1", false).unwrap();
        assert!(production
            .as_str()
            .starts_with("https://login.salesforce.com/services/oauth2/authorize?"));

        let sandbox = connector().authorize_url("u1", true).unwrap();
        assert_eq!(sandbox.host_str(), Some("test.salesforce.com"));

        let pairs: std::collections::HashMap<String, String> =
            sandbox.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], "api refresh_token offline_access");
        assert_eq!(pairs["state"], "u1");
    }
}
