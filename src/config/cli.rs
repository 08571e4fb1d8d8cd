use crate::config::{
    default_redirect_uri, AppConfig, HttpSettings, ProviderCredentials, ServerSettings,
    SupabaseSettings,
};
use crate::domain::model::Provider;
use crate::utils::error::{CrmError, Result};
use crate::utils::validation::validate_required_field;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "comish-crm")]
#[command(about = "HubSpot and Salesforce deal sync API for Comish")]
pub struct CliConfig {
    /// TOML configuration file; when given, the other settings flags are ignored
    #[arg(short, long, env = "COMISH_CONFIG")]
    pub config: Option<String>,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: String,

    #[arg(long, env = "APP_URL", default_value = "/")]
    pub app_url: String,

    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<String>,

    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    pub supabase_service_key: Option<String>,

    #[arg(long, env = "HUBSPOT_CLIENT_ID")]
    pub hubspot_client_id: Option<String>,

    #[arg(long, env = "HUBSPOT_CLIENT_SECRET", hide_env_values = true)]
    pub hubspot_client_secret: Option<String>,

    #[arg(long, env = "HUBSPOT_REDIRECT_URI")]
    pub hubspot_redirect_uri: Option<String>,

    #[arg(long, env = "SALESFORCE_CLIENT_ID")]
    pub salesforce_client_id: Option<String>,

    #[arg(long, env = "SALESFORCE_CLIENT_SECRET", hide_env_values = true)]
    pub salesforce_client_secret: Option<String>,

    #[arg(long, env = "SALESFORCE_REDIRECT_URI")]
    pub salesforce_redirect_uri: Option<String>,

    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value = "30")]
    pub timeout_seconds: u64,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliConfig {
    pub fn into_app_config(self) -> Result<AppConfig> {
        if let Some(path) = &self.config {
            tracing::info!("📁 Loading configuration from: {}", path);
            return AppConfig::from_file(path);
        }

        // NEXT_PUBLIC_SUPABASE_URL 是前端共用的變數名稱
        let supabase_url = self
            .supabase_url
            .or_else(|| std::env::var("NEXT_PUBLIC_SUPABASE_URL").ok())
            .ok_or_else(|| CrmError::MissingConfigError {
                field: "SUPABASE_URL".to_string(),
            })?;
        let service_key =
            validate_required_field("SUPABASE_SERVICE_ROLE_KEY", &self.supabase_service_key)?
                .clone();

        let hubspot = provider_credentials(
            Provider::HubSpot,
            self.hubspot_client_id,
            self.hubspot_client_secret,
            self.hubspot_redirect_uri,
        )?;
        let salesforce = provider_credentials(
            Provider::Salesforce,
            self.salesforce_client_id,
            self.salesforce_client_secret,
            self.salesforce_redirect_uri,
        )?;

        Ok(AppConfig {
            server: ServerSettings {
                bind: self.bind,
                app_url: self.app_url,
                static_dir: self.static_dir,
            },
            supabase: SupabaseSettings {
                url: supabase_url,
                service_key,
            },
            hubspot,
            salesforce,
            http: HttpSettings {
                timeout_seconds: self.timeout_seconds,
            },
        })
    }
}

/// A provider counts as configured once its client id is set.
fn provider_credentials(
    provider: Provider,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
) -> Result<Option<ProviderCredentials>> {
    let Some(client_id) = client_id else {
        return Ok(None);
    };

    let client_secret = client_secret.ok_or_else(|| CrmError::MissingConfigError {
        field: format!("{}_CLIENT_SECRET", provider.slug().to_uppercase()),
    })?;

    Ok(Some(ProviderCredentials {
        client_id,
        client_secret,
        redirect_uri: redirect_uri.unwrap_or_else(|| default_redirect_uri(provider)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["comish-crm"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_build_app_config() {
        let cli = parse(&[
            "--supabase-url",
            "https://project.supabase.co",
            "--supabase-service-key",
            "key",
            "--hubspot-client-id",
            "hs",
            "--hubspot-client-secret",
            "secret",
        ]);

        let config = cli.into_app_config().unwrap();
        let hubspot = config.hubspot.unwrap();
        assert_eq!(hubspot.client_id, "hs");
        assert_eq!(
            hubspot.redirect_uri,
            "https://comish.online/api/hubspot/callback"
        );
    }

    #[test]
    fn test_client_id_without_secret_is_rejected() {
        let cli = parse(&[
            "--supabase-url",
            "https://project.supabase.co",
            "--supabase-service-key",
            "key",
            "--salesforce-client-id",
            "sf",
        ]);

        let err = cli.into_app_config().unwrap_err();
        assert!(matches!(err, CrmError::MissingConfigError { ref field } if field == "SALESFORCE_CLIENT_SECRET"));
    }
}
