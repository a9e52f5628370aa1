//! HTTP routes.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{ConnectInfo, FromRequestParts, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::get,
};
use greeter_core::{ClientIpError, Greeter, GreetingRequest, GreetingResponse, ip::client_ip};
use thiserror::Error;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug)]
pub struct AppState {
    pub greeter: Greeter,
}

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/hello", get(hello))
}

async fn index() -> &'static str {
    "Hello!"
}

async fn health() -> &'static str {
    "OK"
}

const VISITOR_NAME: &str = "visitor_name";

/// First `visitor_name` in the query; later repeats are ignored.
fn visitor_name(params: Vec<(String, String)>) -> Option<String> {
    params
        .into_iter()
        .find_map(|(key, value)| (key == VISITOR_NAME).then_some(value))
}

/// Caller address from `X-Forwarded-For` or the connection peer.
///
/// `None` when the server runs without connect info and no header is set.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded_for = parts
            .headers
            .get(X_FORWARDED_FOR)
            .map(|value| {
                value.to_str().map_err(|_| {
                    ClientIpError::InvalidForwardedFor(
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
            })
            .transpose()?;
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(client_ip(forwarded_for, peer)?))
    }
}

async fn hello(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<GreetingResponse>, ApiError> {
    let request = GreetingRequest {
        visitor_name: visitor_name(params),
        client_ip: ip,
    };

    let response = state.greeter.greet(&request).await?;
    Ok(Json(response))
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    BadRequest(#[from] ClientIpError),

    #[error("Unable to fetch weather information: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!(%status, error = %self, "Request failed");
        (status, self.to_string()).into_response()
    }
}
