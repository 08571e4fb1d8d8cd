use crate::config::HttpSettings;
use crate::domain::model::{Provider, TokenGrant};
use crate::utils::error::{CrmError, Result};
use reqwest::Client;
use url::Url;

pub fn build_http_client(settings: &HttpSettings) -> Result<Client> {
    let client = Client::builder()
        .timeout(settings.timeout())
        .user_agent(concat!("comish-crm/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

pub(crate) fn authorize_url(base: &str, params: &[(&str, &str)]) -> Result<Url> {
    Url::parse_with_params(base, params).map_err(|e| CrmError::InvalidConfigValueError {
        field: "authorize_url".to_string(),
        value: base.to_string(),
        reason: e.to_string(),
    })
}

/// POSTs a form-encoded grant to a token endpoint.
pub(crate) async fn request_token(
    client: &Client,
    provider: Provider,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenGrant> {
    tracing::debug!("Requesting {} token from: {}", provider.display_name(), token_url);
    let response = client.post(token_url).form(form).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            "❌ {} token endpoint returned {}: {}",
            provider.display_name(),
            status,
            body
        );
        return Err(CrmError::upstream(
            provider,
            Some(status.as_u16()),
            format!("{} token request failed ({})", provider.display_name(), status),
        ));
    }

    Ok(response.json::<TokenGrant>().await?)
}
