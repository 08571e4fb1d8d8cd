#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use comish_crm::config::{HttpSettings, ProviderCredentials};
use comish_crm::core::oauth::build_http_client;
use comish_crm::domain::model::StoredToken;
use comish_crm::domain::ports::IdentityProvider;
use comish_crm::{CrmError, Result};
use reqwest::Client;
use std::collections::HashMap;

pub const USER_ID: &str = "6f1c2a7e-user";
pub const APP_BEARER: &str = "app-session-jwt";

pub fn http_client() -> Client {
    build_http_client(&HttpSettings::default()).unwrap()
}

pub fn hubspot_credentials() -> ProviderCredentials {
    ProviderCredentials {
        client_id: "hs-client".to_string(),
        client_secret: "hs-secret".to_string(),
        redirect_uri: "https://comish.online/api/hubspot/callback".to_string(),
    }
}

pub fn salesforce_credentials() -> ProviderCredentials {
    ProviderCredentials {
        client_id: "sf-client".to_string(),
        client_secret: "sf-secret".to_string(),
        redirect_uri: "https://comish.online/api/salesforce/callback".to_string(),
    }
}

/// Token that expires an hour from now.
pub fn live_token(access: &str, refresh: &str) -> StoredToken {
    StoredToken {
        user_id: USER_ID.to_string(),
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        instance_url: None,
        issued_at: None,
        updated_at: Utc::now(),
    }
}

pub fn expired_token(access: &str, refresh: &str) -> StoredToken {
    StoredToken {
        expires_at: Some(Utc::now() - Duration::minutes(5)),
        ..live_token(access, refresh)
    }
}

pub fn salesforce_token(access: &str, instance_url: &str) -> StoredToken {
    StoredToken {
        expires_at: None,
        instance_url: Some(instance_url.to_string()),
        ..live_token(access, "sf-refresh")
    }
}

/// Identity provider that knows a fixed set of bearer tokens.
pub struct StaticIdentity {
    users: HashMap<String, String>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        let mut users = HashMap::new();
        users.insert(APP_BEARER.to_string(), USER_ID.to_string());
        Self { users }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn user_id(&self, bearer: &str) -> Result<String> {
        self.users
            .get(bearer)
            .cloned()
            .ok_or(CrmError::InvalidBearer)
    }
}
