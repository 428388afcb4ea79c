//! HTTP route handlers
//!
//! Range refreshes and metadata lookups do blocking I/O, so the lens runs on
//! tokio's blocking pool.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::pages;
use super::ServerState;
use crate::lens::relay::RelayLens;
use crate::ranges::{parse_address, CacheStatus, RangeError, RangeResult};

const MISSING_IP: &str = "Please provide an IP address.";
const INVALID_API_IP: &str = "Please provide a valid IP address.";
const INVALID_FORM_IP: &str = "Please enter a valid IP address.";
const UNAVAILABLE: &str = "Egress range data is currently unavailable. Please try again later.";

/// Query parameters shared by `/` and `/api`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IpQuery {
    #[serde(default)]
    pub ip: Option<String>,
}

impl IpQuery {
    /// The trimmed `ip` parameter, or `None` if missing or blank
    fn ip(&self) -> Option<String> {
        self.ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    }
}

/// Run a lens operation on the blocking pool
async fn run_lens<T, F>(lens: RelayLens, op: F) -> Result<RangeResult<T>, StatusCode>
where
    T: Send + 'static,
    F: FnOnce(&RelayLens) -> RangeResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&lens))
        .await
        .map_err(|e| {
            tracing::error!("Lens task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Health check handler
pub async fn health_handler() -> &'static str {
    "OK"
}

/// `GET /` - search form and result page
pub async fn index_handler(
    State(state): State<ServerState>,
    Query(query): Query<IpQuery>,
) -> Response {
    let Some(ip) = query.ip() else {
        return Html(pages::index(None)).into_response();
    };
    if parse_address(&ip).is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Html(pages::index(Some(INVALID_FORM_IP))),
        )
            .into_response();
    }

    match run_lens(state.lens.clone(), move |lens| lens.check(&ip)).await {
        Ok(Ok(result)) => Html(pages::result(&result)).into_response(),
        Ok(Err(e)) => {
            tracing::warn!("Relay check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(pages::index(Some(UNAVAILABLE))),
            )
                .into_response()
        }
        Err(status) => status.into_response(),
    }
}

/// `GET /api` - JSON membership check
pub async fn api_handler(
    State(state): State<ServerState>,
    Query(query): Query<IpQuery>,
) -> Response {
    let Some(ip) = query.ip() else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": MISSING_IP }))).into_response();
    };

    match run_lens(state.lens.clone(), move |lens| lens.check_membership(&ip)).await {
        Ok(Ok(result)) => Json(result).into_response(),
        Ok(Err(RangeError::InvalidAddress { .. })) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": INVALID_API_IP }))).into_response()
        }
        Ok(Err(e)) => {
            tracing::warn!("Membership check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": UNAVAILABLE })),
            )
                .into_response()
        }
        Err(status) => status.into_response(),
    }
}

/// `GET /api/status` - cache summary
pub async fn status_handler(State(state): State<ServerState>) -> Json<CacheStatus> {
    Json(state.lens.cache().status())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_query_trims() {
        let query = IpQuery {
            ip: Some("  203.0.113.5 ".to_string()),
        };
        assert_eq!(query.ip().as_deref(), Some("203.0.113.5"));

        let query = IpQuery {
            ip: Some("   ".to_string()),
        };
        assert!(query.ip().is_none());
        assert!(IpQuery::default().ip().is_none());
    }

    #[test]
    fn test_ip_query_deserialization() {
        let query: IpQuery = serde_json::from_str(r#"{"ip": "1.1.1.1"}"#).unwrap();
        assert_eq!(query.ip.as_deref(), Some("1.1.1.1"));

        let query: IpQuery = serde_json::from_str("{}").unwrap();
        assert!(query.ip.is_none());
    }
}
