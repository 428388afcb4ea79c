//! HTTP server module for relaycheck
//!
//! Routes:
//!
//! - `GET /?ip=<ip>` - HTML search form and result page
//! - `GET /api?ip=<ip>` - JSON membership check
//! - `GET /api/status` - range cache summary
//! - `GET /health` - liveness probe
//!
//! # Usage
//!
//! ```rust,ignore
//! use relaycheck::server::{start_server, ServerConfig};
//!
//! let lens = RelayLens::new(cache, Arc::new(IpLens::default()));
//! start_server(lens, ServerConfig::default()).await?;
//! ```

pub mod handlers;
pub mod pages;

use axum::{routing::get, Router as AxumRouter};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::RelaycheckConfig;
use crate::lens::relay::RelayLens;

// =============================================================================
// Server Configuration
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub address: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Take address and port from the application configuration
    pub fn from_config(config: &RelaycheckConfig) -> Self {
        Self {
            address: config.server_address.clone(),
            port: config.server_port,
        }
    }

    /// Set the address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Get the full bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

// =============================================================================
// Server State
// =============================================================================

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    /// Lens answering relay checks
    pub lens: RelayLens,
}

// =============================================================================
// Axum Router Creation
// =============================================================================

/// Create the Axum router for the HTTP server
pub fn create_axum_router(state: ServerState) -> AxumRouter {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    AxumRouter::new()
        .route("/", get(handlers::index_handler))
        .route("/api", get(handlers::api_handler))
        .route("/api/status", get(handlers::status_handler))
        .route("/health", get(handlers::health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Server Startup
// =============================================================================

/// Start the HTTP server
///
/// The range cache is warmed once before the listener is bound. A failed warm
/// up is logged; requests will retry the refresh.
pub async fn start_server(lens: RelayLens, config: ServerConfig) -> anyhow::Result<()> {
    let cache = lens.cache().clone();
    match tokio::task::spawn_blocking(move || cache.ensure_fresh(Utc::now())).await? {
        Ok(outcome) => tracing::info!("Range cache ready: {}", outcome),
        Err(e) => tracing::warn!("Range cache warm up failed: {}", e),
    }

    let app = create_axum_router(ServerState { lens });

    let bind_address = config.bind_address();
    tracing::info!("Starting HTTP server on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::ip::{IpDetails, LookupGateway};
    use crate::ranges::{RangeCache, RangeError, RangeFileCache, RangeResult, RangeSource};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct StaticSource(Option<&'static str>);

    impl RangeSource for StaticSource {
        fn url(&self) -> &str {
            "https://ranges.test/list.csv"
        }

        fn fetch(&self) -> RangeResult<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| RangeError::fetch(self.url(), "connection refused"))
        }
    }

    struct CityGateway;

    impl LookupGateway for CityGateway {
        fn lookup(&self, _ip: IpAddr) -> anyhow::Result<IpDetails> {
            Ok(IpDetails {
                city: Some("San Jose".to_string()),
                ..Default::default()
            })
        }
    }

    fn test_app(body: Option<&'static str>) -> (TempDir, AxumRouter) {
        let dir = tempfile::tempdir().unwrap();
        let file_cache = RangeFileCache::new(dir.path().to_str().unwrap()).unwrap();
        let cache = Arc::new(RangeCache::new(
            file_cache,
            StaticSource(body),
            Duration::from_secs(24 * 60 * 60),
        ));
        let state = ServerState {
            lens: RelayLens::new(cache, Arc::new(CityGateway)),
        };
        (dir, create_axum_router(state))
    }

    async fn get_body(app: AxumRouter, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new().with_address("0.0.0.0").with_port(9000);

        assert_eq!(config.address, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_server_config_from_config() {
        let app_config = RelaycheckConfig {
            server_address: "0.0.0.0".to_string(),
            server_port: 8443,
            ..RelaycheckConfig::default()
        };
        let config = ServerConfig::from_config(&app_config);
        assert_eq!(config.bind_address(), "0.0.0.0:8443");
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = test_app(Some("203.0.113.0/24\n"));
        let (status, body) = get_body(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_api_member() {
        let (_dir, app) = test_app(Some("203.0.113.0/24\n"));
        let (status, body) = get_body(app, "/api?ip=203.0.113.5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"ip":"203.0.113.5","result":true}"#);
    }

    #[tokio::test]
    async fn test_api_non_member() {
        let (_dir, app) = test_app(Some("203.0.113.0/24\n"));
        let (status, body) = get_body(app, "/api?ip=198.51.100.7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"ip":"198.51.100.7","result":false}"#);
    }

    #[tokio::test]
    async fn test_api_missing_ip() {
        let (_dir, app) = test_app(Some("203.0.113.0/24\n"));
        let (status, body) = get_body(app, "/api").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"Please provide an IP address."}"#);
    }

    #[tokio::test]
    async fn test_api_invalid_ip() {
        let (_dir, app) = test_app(Some("203.0.113.0/24\n"));
        let (status, body) = get_body(app, "/api?ip=not-an-ip").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"Please provide a valid IP address."}"#);
    }

    #[tokio::test]
    async fn test_api_unavailable() {
        let (_dir, app) = test_app(None);
        let (status, body) = get_body(app, "/api?ip=203.0.113.5").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("currently unavailable"));
    }

    #[tokio::test]
    async fn test_index_form() {
        let (_dir, app) = test_app(Some("203.0.113.0/24\n"));
        let (status, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<form"));
    }

    #[tokio::test]
    async fn test_index_invalid_ip() {
        let (_dir, app) = test_app(Some("203.0.113.0/24\n"));
        let (status, body) = get_body(app, "/?ip=999.1.1.1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Please enter a valid IP address."));
    }

    #[tokio::test]
    async fn test_index_result() {
        let (_dir, app) = test_app(Some("2001:db8::/32\n"));
        let (status, body) = get_body(app, "/?ip=2001:db8::1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<td>2001:db8::1</td>"));
        assert!(body.contains("Yes, this address"));
        assert!(body.contains("<td>San Jose</td>"));
        assert!(body.contains("<td>Unknown</td>"));
    }

    #[tokio::test]
    async fn test_status() {
        let (_dir, app) = test_app(Some("203.0.113.0/24\n2001:db8::/32\n"));
        let (_, _) = get_body(app.clone(), "/api?ip=203.0.113.5").await;
        let (status, body) = get_body(app, "/api/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["prefix_count"], 2);
        assert_eq!(json["ipv4_count"], 1);
        assert_eq!(json["ipv6_count"], 1);
        assert_eq!(json["max_age_secs"], 86400);
    }
}
