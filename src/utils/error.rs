use crate::domain::model::Provider;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("{} not configured", .provider.display_name())]
    ProviderNotConfigured { provider: Provider },

    #[error("Unknown provider: {name}")]
    UnknownProvider { name: String },

    #[error("No authorization header")]
    MissingBearer,

    #[error("Invalid token")]
    InvalidBearer,

    #[error("{} not connected", .provider.display_name())]
    NotConnected { provider: Provider },

    #[error("{message}")]
    ReauthRequired { provider: Provider, message: String },

    #[error("{message}")]
    UpstreamError {
        provider: Provider,
        status: Option<u16>,
        message: String,
    },

    #[error("Token store error: {message}")]
    StoreError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authentication,
    Upstream,
    Storage,
    Input,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CrmError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CrmError::ConfigError { .. }
            | CrmError::ConfigValidationError { .. }
            | CrmError::InvalidConfigValueError { .. }
            | CrmError::MissingConfigError { .. }
            | CrmError::ProviderNotConfigured { .. } => ErrorCategory::Configuration,
            CrmError::MissingBearer
            | CrmError::InvalidBearer
            | CrmError::NotConnected { .. }
            | CrmError::ReauthRequired { .. } => ErrorCategory::Authentication,
            CrmError::ApiError(_) | CrmError::UpstreamError { .. } => ErrorCategory::Upstream,
            CrmError::StoreError { .. } => ErrorCategory::Storage,
            CrmError::UnknownProvider { .. } | CrmError::ValidationError { .. } => {
                ErrorCategory::Input
            }
            CrmError::IoError(_) | CrmError::SerializationError(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Authentication => ErrorSeverity::Low,
            ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Storage | ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 需要使用者重新走 OAuth 流程
    pub fn needs_auth(&self) -> bool {
        matches!(
            self,
            CrmError::NotConnected { .. } | CrmError::ReauthRequired { .. }
        )
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CrmError::MissingBearer | CrmError::InvalidBearer => 401,
            CrmError::UnknownProvider { .. } => 404,
            CrmError::NotConnected { .. }
            | CrmError::ReauthRequired { .. }
            | CrmError::ValidationError { .. } => 400,
            _ => 500,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CrmError::ApiError(e) if e.is_timeout() => {
                "The CRM did not respond in time".to_string()
            }
            CrmError::ApiError(_) => "Could not reach the CRM".to_string(),
            CrmError::ConfigValidationError { field, .. }
            | CrmError::InvalidConfigValueError { field, .. }
            | CrmError::MissingConfigError { field } => {
                format!("Configuration problem with '{}'", field)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the configuration file and environment variables, then restart"
            }
            ErrorCategory::Authentication if self.needs_auth() => {
                "Reconnect the CRM account from the app"
            }
            ErrorCategory::Authentication => "Sign in again and retry",
            ErrorCategory::Upstream => "Retry later; the CRM API may be unavailable",
            ErrorCategory::Storage => "Check the token store connection settings",
            ErrorCategory::Input => "Check the request parameters",
            ErrorCategory::Internal => "Check the server logs for details",
        }
    }

    pub(crate) fn upstream(provider: Provider, status: Option<u16>, message: impl Into<String>) -> Self {
        CrmError::UpstreamError {
            provider,
            status,
            message: message.into(),
        }
    }

    pub(crate) fn reauth(provider: Provider, message: impl Into<String>) -> Self {
        CrmError::ReauthRequired {
            provider,
            message: message.into(),
        }
    }

    pub(crate) fn store(message: impl Into<String>) -> Self {
        CrmError::StoreError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_auth_errors_map_to_bad_request() {
        let err = CrmError::NotConnected {
            provider: Provider::HubSpot,
        };
        assert!(err.needs_auth());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "HubSpot not connected");

        let err = CrmError::reauth(Provider::Salesforce, "Salesforce session expired");
        assert!(err.needs_auth());
        assert_eq!(err.to_string(), "Salesforce session expired");
    }

    #[test]
    fn test_bearer_errors_are_unauthorized() {
        assert_eq!(CrmError::MissingBearer.status_code(), 401);
        assert_eq!(CrmError::InvalidBearer.status_code(), 401);
        assert!(!CrmError::InvalidBearer.needs_auth());
    }

    #[test]
    fn test_upstream_error_is_generic_failure() {
        let err = CrmError::upstream(Provider::HubSpot, Some(502), "Failed to fetch deals from HubSpot");
        assert!(!err.needs_auth());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_not_configured_message() {
        let err = CrmError::ProviderNotConfigured {
            provider: Provider::Salesforce,
        };
        assert_eq!(err.to_string(), "Salesforce not configured");
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.status_code(), 500);
    }
}
