#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::domain::model::Provider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_socket_addr, validate_url,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide configuration, built once at startup and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub supabase: SupabaseSettings,
    pub hubspot: Option<ProviderCredentials>,
    pub salesforce: Option<ProviderCredentials>,
    #[serde(default)]
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base the OAuth callbacks redirect back to, e.g. `/` or `https://comish.online/`.
    #[serde(default = "default_app_url")]
    pub app_url: String,
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseSettings {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_app_url() -> String {
    "/".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

pub fn default_redirect_uri(provider: Provider) -> String {
    format!("https://comish.online/api/{}/callback", provider.slug())
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            app_url: default_app_url(),
            static_dir: None,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl AppConfig {
    pub fn credentials(&self, provider: Provider) -> Option<&ProviderCredentials> {
        match provider {
            Provider::HubSpot => self.hubspot.as_ref(),
            Provider::Salesforce => self.salesforce.as_ref(),
        }
    }

    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.credentials(*p).is_some())
            .collect()
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_socket_addr("server.bind", &self.server.bind)?;
        validate_non_empty_string("server.app_url", &self.server.app_url)?;
        if let Some(dir) = &self.server.static_dir {
            validate_path("server.static_dir", dir)?;
        }

        validate_url("supabase.url", &self.supabase.url)?;
        validate_non_empty_string("supabase.service_key", &self.supabase.service_key)?;

        for provider in Provider::ALL {
            if let Some(creds) = self.credentials(provider) {
                let slug = provider.slug();
                validate_non_empty_string(&format!("{}.client_id", slug), &creds.client_id)?;
                validate_non_empty_string(&format!("{}.client_secret", slug), &creds.client_secret)?;
                validate_url(&format!("{}.redirect_uri", slug), &creds.redirect_uri)?;
            }
        }

        validate_range("http.timeout_seconds", self.http.timeout_seconds, 1, 300)?;

        if self.configured_providers().is_empty() {
            tracing::warn!("⚠️ No CRM provider credentials configured; auth endpoints will report 'not configured'");
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        server: ServerSettings::default(),
        supabase: SupabaseSettings {
            url: "https://project.supabase.co".to_string(),
            service_key: "service-key".to_string(),
        },
        hubspot: Some(ProviderCredentials {
            client_id: "hs-client".to_string(),
            client_secret: "hs-secret".to_string(),
            redirect_uri: default_redirect_uri(Provider::HubSpot),
        }),
        salesforce: None,
        http: HttpSettings::default(),
    }
}
