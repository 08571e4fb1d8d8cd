use crate::domain::model::{DateRange, Provider};
use crate::server::response::{app_redirect, found, ApiError};
use crate::server::AppState;
use crate::utils::error::{CrmError, ErrorCategory};
use crate::utils::validation::validate_date_bound;
use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

/// The user behind the request's `Authorization: Bearer` header.
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .ok_or(CrmError::MissingBearer)?;

        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        let user_id = state.identity.user_id(token).await?;
        Ok(AuthUser(user_id))
    }
}

/// The `:provider` path segment; unknown names are rejected with 404.
///
/// Handlers list it before [`AuthUser`] so the provider is checked first.
pub struct ProviderPath(pub Provider);

#[async_trait]
impl<S> FromRequestParts<S> for ProviderPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(name) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| CrmError::ValidationError {
                message: e.body_text(),
            })?;
        Ok(ProviderPath(name.parse()?))
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    user_id: Option<String>,
    sandbox: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DealsParams {
    after: Option<String>,
    before: Option<String>,
}

impl DealsParams {
    fn range(&self) -> Result<DateRange, CrmError> {
        let parse = |field: &str, value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| validate_date_bound(field, v))
                .transpose()
        };
        Ok(DateRange {
            after: parse("after", &self.after)?,
            before: parse("before", &self.before)?,
        })
    }
}

/// GET /api/health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /api/:provider/auth - redirect to the provider's consent screen
pub async fn authorize(
    State(state): State<AppState>,
    ProviderPath(provider): ProviderPath,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, ApiError> {
    let user_id = params.user_id.unwrap_or_default();
    let sandbox = params.sandbox.as_deref() == Some("true");

    let url = state.service.authorize_url(provider, &user_id, sandbox)?;
    tracing::info!("🔗 Redirecting user {} to {} OAuth", user_id, provider.display_name());
    Ok(found(url.as_str()))
}

/// GET /api/:provider/callback - exchange the code and return to the app
pub async fn callback(
    State(state): State<AppState>,
    ProviderPath(provider): ProviderPath,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let slug = provider.slug();

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No code provided" })),
        )
            .into_response());
    };

    let user_id = params.state.unwrap_or_default();
    if user_id.is_empty() {
        tracing::warn!("{} callback without user state", provider.display_name());
        return Ok(found(&app_redirect(&state.app_url, slug, "error", Some("missing_state"))));
    }

    let location = match state.service.connect(provider, &user_id, &code).await {
        Ok(_) => app_redirect(&state.app_url, slug, "connected", None),
        Err(e) => {
            tracing::error!("{} callback error: {}", provider.display_name(), e);
            let msg = match e.category() {
                ErrorCategory::Storage => "db_error",
                _ => "token_exchange_failed",
            };
            app_redirect(&state.app_url, slug, "error", Some(msg))
        }
    };
    Ok(found(&location))
}

/// GET|POST /api/:provider/deals?after=YYYY-MM-DD&before=YYYY-MM-DD
pub async fn deals(
    State(state): State<AppState>,
    ProviderPath(provider): ProviderPath,
    AuthUser(user_id): AuthUser,
    Query(params): Query<DealsParams>,
) -> Result<Response, ApiError> {
    let range = params.range()?;

    let page = state.service.fetch_deals(provider, &user_id, &range).await?;
    Ok(Json(page).into_response())
}

/// GET /api/:provider/status
pub async fn status(
    State(state): State<AppState>,
    ProviderPath(provider): ProviderPath,
    AuthUser(user_id): AuthUser,
) -> Result<Response, ApiError> {
    let status = state.service.status(provider, &user_id).await?;
    Ok(Json(status).into_response())
}

/// POST /api/:provider/disconnect
pub async fn disconnect(
    State(state): State<AppState>,
    ProviderPath(provider): ProviderPath,
    AuthUser(user_id): AuthUser,
) -> Result<Response, ApiError> {
    state.service.disconnect(provider, &user_id).await.map_err(|e| {
        tracing::error!("Disconnect error: {}", e);
        CrmError::store("Failed to disconnect")
    })?;
    Ok(Json(json!({ "success": true })).into_response())
}
