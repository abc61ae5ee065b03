//! Login handshake and authenticated requests against the teamserver API.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ApiError, LoginError};
use crate::profile::{Credentials, SessionProfile};
use crate::transport::{LOGIN_PATH, TOKEN_HEADER, TransportOptions};

/// Body of `POST /api/login`. The teamserver expects the port as a string.
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    name: &'a str,
    host: &'a str,
    port: String,
    username: &'a str,
    password: &'a str,
}

impl<'a> From<&'a Credentials> for LoginRequest<'a> {
    fn from(c: &'a Credentials) -> Self {
        Self {
            name: &c.name,
            host: &c.host,
            port: c.port.to_string(),
            username: &c.username,
            password: &c.password,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthClient {
    http: reqwest::Client,
    options: TransportOptions,
}

impl AuthClient {
    pub fn new(options: TransportOptions) -> Result<Self, LoginError> {
        if options.accept_invalid_certs {
            debug!("server certificate verification disabled");
        }
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(LoginError::from_reqwest)?;
        Ok(Self { http, options })
    }

    /// Log in and return the authenticated session profile.
    ///
    /// Transport failures are reported before the response is looked at;
    /// nothing is retried.
    pub async fn login(&self, credentials: Credentials) -> Result<SessionProfile, LoginError> {
        let url = format!(
            "{}{}",
            self.options.base_url(&credentials.host, credentials.port),
            LOGIN_PATH
        );
        info!(url = %url, user = %credentials.username, "sending login request");

        let resp = self
            .http
            .post(&url)
            .json(&LoginRequest::from(&credentials))
            .send()
            .await
            .map_err(LoginError::from_reqwest)?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                let body = resp.text().await.unwrap_or_default();
                let message = if body.trim().is_empty() {
                    "Unauthorized".to_string()
                } else {
                    body
                };
                return Err(LoginError::Unauthorized(message));
            }
            other => return Err(LoginError::UnexpectedStatus(other.as_u16())),
        }

        let body = resp.bytes().await.map_err(LoginError::from_reqwest)?;
        debug!(body = %String::from_utf8_lossy(&body), "login response");

        let token = parse_token(&body)?;
        info!(server = %credentials.host, "logged in");
        Ok(SessionProfile::new(credentials, token))
    }

    /// POST a JSON body to `/api/<endpoint>` with the session token attached.
    /// An empty response body yields `Value::Null`.
    pub async fn api_send(
        &self,
        profile: &SessionProfile,
        endpoint: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let url = format!(
            "{}/api/{}",
            self.options.base_url(&profile.host, profile.port),
            endpoint.trim_start_matches('/')
        );

        let resp = self
            .http
            .post(&url)
            .header(TOKEN_HEADER, profile.token())
            .json(body)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(ApiError::from_reqwest)?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

fn parse_token(body: &[u8]) -> Result<String, LoginError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "login response is not valid JSON");
        LoginError::MalformedResponse
    })?;

    match value.get("token") {
        Some(Value::String(token)) => Ok(token.clone()),
        Some(_) => {
            warn!("login response \"token\" is not a string");
            Err(LoginError::MalformedResponse)
        }
        None => {
            warn!("login response has no \"token\"");
            Err(LoginError::MalformedResponse)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use crate::test_helpers::{credentials, serve};

    /// Login server answering every request with a fixed status and body.
    async fn spawn_login_server(
        status: StatusCode,
        body: &'static str,
    ) -> (u16, tokio::sync::oneshot::Sender<()>) {
        let app = Router::new().route(
            "/api/login",
            post(move || async move { (status, body).into_response() }),
        );
        serve(app).await
    }

    fn client() -> AuthClient {
        AuthClient::new(TransportOptions {
            secure: false,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn login_body_sends_port_as_string() {
        let c = credentials(40056);
        let body = serde_json::to_value(LoginRequest::from(&c)).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "lab",
                "host": "127.0.0.1",
                "port": "40056",
                "username": "operator",
                "password": "hunter2"
            })
        );
    }

    #[tokio::test]
    async fn successful_login_returns_profile() {
        let seen = Arc::new(Mutex::new(None::<Value>));
        let seen_by_server = seen.clone();
        let app = Router::new().route(
            "/api/login",
            post(move |Json(body): Json<Value>| {
                let seen = seen_by_server.clone();
                async move {
                    *seen.lock().unwrap() = Some(body);
                    Json(json!({ "token": "abc123" }))
                }
            }),
        );
        let (port, _shutdown) = serve(app).await;

        let profile = client().login(credentials(port)).await.unwrap();
        assert_eq!(profile.token(), "abc123");
        assert_eq!(profile.name, "lab");
        assert_eq!(profile.host, "127.0.0.1");
        assert_eq!(profile.port, port);
        assert_eq!(profile.username, "operator");
        assert_eq!(profile.password, "hunter2");

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["username"], "operator");
        assert_eq!(body["port"], port.to_string());
    }

    #[tokio::test]
    async fn unauthorized_carries_server_message() {
        let (port, _shutdown) = spawn_login_server(StatusCode::UNAUTHORIZED, "wrong password").await;
        match client().login(credentials(port)).await {
            Err(LoginError::Unauthorized(msg)) => assert_eq!(msg, "wrong password"),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_without_body_uses_default_message() {
        let (port, _shutdown) = spawn_login_server(StatusCode::UNAUTHORIZED, "").await;
        match client().login(credentials(port)).await {
            Err(LoginError::Unauthorized(msg)) => assert_eq!(msg, "Unauthorized"),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_status_is_unexpected() {
        let (port, _shutdown) =
            spawn_login_server(StatusCode::INTERNAL_SERVER_ERROR, r#"{"token":"x"}"#).await;
        assert!(matches!(
            client().login(credentials(port)).await,
            Err(LoginError::UnexpectedStatus(500))
        ));
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected() {
        for body in ["not json", r#"{"user":"x"}"#, r#"{"token":42}"#, r#"{"token":null}"#] {
            let (port, _shutdown) = spawn_login_server(StatusCode::OK, body).await;
            assert!(
                matches!(
                    client().login(credentials(port)).await,
                    Err(LoginError::MalformedResponse)
                ),
                "body {body} should be malformed"
            );
        }
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        // Port 1 is reserved and nothing listens on it
        assert!(matches!(
            client().login(credentials(1)).await,
            Err(LoginError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn api_send_attaches_token() {
        let app = Router::new().route(
            "/api/listener/start",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let token = headers
                    .get(TOKEN_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "token": token, "echo": body }))
            }),
        );
        let (port, _shutdown) = serve(app).await;
        let profile = SessionProfile::new(credentials(port), "tok-9".to_string());

        let reply = client()
            .api_send(&profile, "listener/start", &json!({ "name": "L1" }))
            .await
            .unwrap();
        assert_eq!(reply, json!({ "token": "tok-9", "echo": { "name": "L1" } }));
    }

    #[tokio::test]
    async fn api_send_reports_rejection() {
        let app = Router::new().route(
            "/api/agent/task",
            post(|| async { (StatusCode::FORBIDDEN, "no").into_response() }),
        );
        let (port, _shutdown) = serve(app).await;
        let profile = SessionProfile::new(credentials(port), "t".to_string());

        match client().api_send(&profile, "/agent/task", &json!({})).await {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "no");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }
}
