use crate::utils::error::CrmError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(rename = "needsAuth", skip_serializing_if = "Option::is_none")]
    pub needs_auth: Option<bool>,
}

/// Wraps [`CrmError`] so handlers can return it with `?`.
#[derive(Debug)]
pub struct ApiError(pub CrmError);

impl<E> From<E> for ApiError
where
    E: Into<CrmError>,
{
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                err,
                err.category(),
                err.severity()
            );
        } else {
            tracing::debug!("Request rejected ({}): {}", status, err);
        }

        let body = ErrorBody {
            error: err.to_string(),
            needs_auth: err.needs_auth().then_some(true),
        };
        (status, Json(body)).into_response()
    }
}

/// HTTP 302 to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Front-end URL reporting the outcome of an OAuth callback, e.g. `/?hubspot=connected`.
pub fn app_redirect(app_url: &str, provider_slug: &str, outcome: &str, msg: Option<&str>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair(provider_slug, outcome);
    if let Some(msg) = msg {
        query.append_pair("msg", msg);
    }

    let separator = if app_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", app_url, separator, query.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_redirect() {
        assert_eq!(app_redirect("/", "hubspot", "connected", None), "/?hubspot=connected");
        assert_eq!(
            app_redirect("https://comish.online/?tab=crm", "salesforce", "error", Some("db_error")),
            "https://comish.online/?tab=crm&salesforce=error&msg=db_error"
        );
    }

    #[test]
    fn test_error_body_omits_needs_auth_when_false() {
        let body = ErrorBody {
            error: "Invalid token".to_string(),
            needs_auth: None,
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"error": "Invalid token"})
        );
    }
}
