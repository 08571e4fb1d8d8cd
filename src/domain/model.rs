use crate::utils::error::CrmError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    HubSpot,
    Salesforce,
}

/// How a provider formats its close-date field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDateFormat {
    /// ISO-8601 timestamp; the date is everything before the first `T`.
    IsoTimestamp,
    /// Already `YYYY-MM-DD`.
    DateOnly,
}

/// Provider field names the normalizer reads from a raw record.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    pub name: &'static str,
    pub default_name: &'static str,
    pub amount: &'static str,
    pub close_date: &'static str,
    pub close_date_format: CloseDateFormat,
    /// Probed in order; the first present value wins.
    pub term_months: &'static [&'static str],
}

const HUBSPOT_FIELDS: FieldMap = FieldMap {
    name: "dealname",
    default_name: "Unnamed Deal",
    amount: "amount",
    close_date: "closedate",
    close_date_format: CloseDateFormat::IsoTimestamp,
    term_months: &["term_months", "contract_length", "contract_term"],
};

const SALESFORCE_FIELDS: FieldMap = FieldMap {
    name: "Name",
    default_name: "Unnamed Opportunity",
    amount: "Amount",
    close_date: "CloseDate",
    close_date_format: CloseDateFormat::DateOnly,
    term_months: &["Contract_Term__c", "Contract_Length__c", "Term_Months__c"],
};

/// When a stored access token gets refreshed before a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Refresh only past `expires_at`; a failed refresh forces re-authentication.
    WhenExpired,
    /// Refresh before every fetch; a failed refresh keeps the current token.
    BeforeEveryFetch,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::HubSpot, Provider::Salesforce];

    pub fn slug(&self) -> &'static str {
        match self {
            Provider::HubSpot => "hubspot",
            Provider::Salesforce => "salesforce",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::HubSpot => "HubSpot",
            Provider::Salesforce => "Salesforce",
        }
    }

    pub fn fields(&self) -> &'static FieldMap {
        match self {
            Provider::HubSpot => &HUBSPOT_FIELDS,
            Provider::Salesforce => &SALESFORCE_FIELDS,
        }
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        match self {
            Provider::HubSpot => RefreshPolicy::WhenExpired,
            Provider::Salesforce => RefreshPolicy::BeforeEveryFetch,
        }
    }

    pub fn page_size(&self) -> usize {
        match self {
            Provider::HubSpot => 100,
            Provider::Salesforce => 200,
        }
    }

    /// Token store table holding this provider's tokens.
    pub fn token_table(&self) -> &'static str {
        match self {
            Provider::HubSpot => "hubspot_tokens",
            Provider::Salesforce => "salesforce_tokens",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Provider {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hubspot" => Ok(Provider::HubSpot),
            "salesforce" => Ok(Provider::Salesforce),
            _ => Err(CrmError::UnknownProvider {
                name: s.to_string(),
            }),
        }
    }
}

/// One deal/opportunity as returned by the provider, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// A single page of raw records from a provider.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub records: Vec<RawRecord>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermYears {
    One,
    Two,
}

impl TermYears {
    pub fn from_months(months: i64) -> Self {
        if months >= 24 {
            TermYears::Two
        } else {
            TermYears::One
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            TermYears::One => 1,
            TermYears::Two => 2,
        }
    }
}

impl Serialize for TermYears {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedDeal {
    pub external_id: String,
    pub name: String,
    pub amount: f64,
    pub close_date: String,
    pub term_years: TermYears,
    pub paid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealPage {
    pub deals: Vec<NormalizedDeal>,
    pub total: usize,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

impl DealPage {
    pub fn new(deals: Vec<NormalizedDeal>, has_more: bool) -> Self {
        Self {
            total: deals.len(),
            deals,
            has_more,
        }
    }
}

/// Inclusive close-date bounds for a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

/// Persisted OAuth credentials for one user and provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at < now).unwrap_or(false)
    }
}

/// Token endpoint response, shared by both providers.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub instance_url: Option<String>,
    /// Salesforce sends milliseconds since the epoch as a string.
    #[serde(default)]
    pub issued_at: Option<String>,
}

impl TokenGrant {
    /// Builds the record to persist after a code exchange.
    pub fn into_stored(self, user_id: &str, now: DateTime<Utc>) -> StoredToken {
        let expires_at = self.expires_at(now);
        let issued_at = self.issued_at();
        StoredToken {
            user_id: user_id.to_string(),
            access_token: self.access_token,
            refresh_token: self.refresh_token.unwrap_or_default(),
            expires_at,
            instance_url: self.instance_url,
            issued_at,
            updated_at: now,
        }
    }

    /// Applies a refresh response on top of an existing record.
    pub fn apply_to(self, token: &StoredToken, now: DateTime<Utc>) -> StoredToken {
        let expires_at = self.expires_at(now).or(token.expires_at);
        let issued_at = self.issued_at().or(token.issued_at);
        StoredToken {
            user_id: token.user_id.clone(),
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .unwrap_or_else(|| token.refresh_token.clone()),
            expires_at,
            instance_url: self.instance_url.or_else(|| token.instance_url.clone()),
            issued_at,
            updated_at: now,
        }
    }

    fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
    }

    fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConnectionStatus {
    Disconnected {
        connected: bool,
    },
    Connected {
        connected: bool,
        expires_at: Option<DateTime<Utc>>,
        needs_refresh: bool,
        connected_at: DateTime<Utc>,
    },
}

impl ConnectionStatus {
    pub fn disconnected() -> Self {
        ConnectionStatus::Disconnected { connected: false }
    }

    pub fn from_token(token: &StoredToken, now: DateTime<Utc>) -> Self {
        ConnectionStatus::Connected {
            connected: true,
            expires_at: token.expires_at,
            needs_refresh: token.is_expired(now),
            connected_at: token.updated_at,
        }
    }
}
