use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, Instrument};
use url::Url;

use super::{ApiRequest, ApiResponse};
use crate::errors::GatewayError;
use crate::session::SessionCoordinator;

/// Parses a base url and makes sure it ends with `/`, so relative endpoint
/// paths are appended to it instead of replacing its last segment.
pub fn normalize_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Sends API requests on behalf of one session.
///
/// Every request gets the current access token (renewed up front when it is
/// already expired). A 401 triggers one de-duplicated renewal and a single
/// replay; a second 401 is returned to the caller as is.
pub struct Gateway {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionCoordinator>,
}

impl Gateway {
    pub fn new(http: reqwest::Client, base_url: Url, session: Arc<SessionCoordinator>) -> Self {
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn session(&self) -> &Arc<SessionCoordinator> {
        &self.session
    }

    /// Resolves `path` against the base url. Absolute urls are refused so the
    /// bearer token never leaves the configured API.
    pub fn url_for(&self, path: &str) -> Result<Url, GatewayError> {
        if Url::parse(path).is_ok() {
            return Err(GatewayError::AbsoluteUrl(path.to_string()));
        }
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Send a request; non-2xx responses come back as `GatewayError::Status`.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let span = tracing::debug_span!(
            "api_request",
            request_id = %request.id(),
            method = %request.method(),
            path = request.path()
        );
        self.send_with_recovery(request).instrument(span).await
    }

    /// Send a request and decode its JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, GatewayError> {
        self.send(request).await?.json()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.send_json(ApiRequest::get(path)).await
    }

    async fn send_with_recovery(&self, mut request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        if !request.uses_session() {
            return self.dispatch(&request, None).await?.error_for_status();
        }

        let token = self.session.preflight_token().await?;
        let response = self.dispatch(&request, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED || request.is_retried() {
            return response.error_for_status();
        }

        request.mark_retried();
        debug!("Unauthorized; recovering the session before one replay");
        let token = self.session.recover(token.as_deref()).await?;
        self.dispatch(&request, Some(&token))
            .await?
            .error_for_status()
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<ApiResponse, GatewayError> {
        let url = self.url_for(request.path())?;
        let mut headers = request.headers().clone();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| GatewayError::Encode(format!("access token is not a valid header: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(headers);
        if let Some(body) = request.body_bytes() {
            builder = builder.body(body.clone());
        }

        let response = ApiResponse::read(builder.send().await?).await?;
        debug!(
            status = response.status().as_u16(),
            authenticated = token.is_some(),
            retried = request.is_retried(),
            "response received"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_support;
    use crate::session::test_support::token_expiring_at;
    use crate::store::{CredentialPair, CredentialStore, MemoryStore};
    use mockito::{Matcher, Server};

    fn gateway_for(server: &Server, store: MemoryStore) -> Gateway {
        test_support::gateway_for(&server.url(), store)
    }

    fn valid_token() -> String {
        token_expiring_at(chrono::Utc::now().timestamp() + 3600)
    }

    #[test]
    fn test_normalize_base_url_keeps_prefix() {
        let url = normalize_base_url("http://localhost:8000/cards").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/cards/");
        assert_eq!(
            url.join("api/decks?show_all=1").unwrap().as_str(),
            "http://localhost:8000/cards/api/decks?show_all=1"
        );
    }

    #[tokio::test]
    async fn test_absolute_url_is_refused() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;
        let gateway = gateway_for(
            &server,
            MemoryStore::with_pair(&CredentialPair::new(valid_token(), "refresh")),
        );

        let err = gateway
            .send(ApiRequest::get("http://other.example/steal"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::AbsoluteUrl(_)));
        refresh.assert_async().await;
        // Scheme-relative paths stay on the configured host.
        let url = gateway.url_for("//other.example/x").unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let access = valid_token();
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/api/decks")
            .match_header("authorization", format!("Bearer {}", access).as_str())
            .with_status(200)
            .with_body(r#"[{"id": 1, "name": "Verbs"}]"#)
            .create_async()
            .await;

        let gateway = gateway_for(
            &server,
            MemoryStore::with_pair(&CredentialPair::new(access, "refresh")),
        );
        let decks: serde_json::Value = gateway.get_json("/api/decks").await.unwrap();

        m.assert_async().await;
        assert_eq!(decks[0]["name"], "Verbs");
    }

    #[tokio::test]
    async fn test_anonymous_request_has_no_authorization() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/api/decks")
            .match_query(Matcher::UrlEncoded("show_all".into(), "1".into()))
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let gateway = gateway_for(&server, MemoryStore::new());
        let response = gateway
            .send(ApiRequest::get("/api/decks").query("show_all", "1"))
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_non_auth_failures_pass_through_without_renewal() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/api/decks/7")
            .with_status(404)
            .with_body(r#"{"localization_key": "error.deck_not_found"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let gateway = gateway_for(
            &server,
            MemoryStore::with_pair(&CredentialPair::new(valid_token(), "refresh")),
        );
        let err = gateway
            .send(ApiRequest::delete("/api/decks/7"))
            .await
            .unwrap_err();

        refresh.assert_async().await;
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_returned_unchanged() {
        let old = valid_token();
        let new = token_expiring_at(chrono::Utc::now().timestamp() + 7200);
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/api/auth/me")
            .match_header("authorization", format!("Bearer {}", old).as_str())
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let replay = server
            .mock("GET", "/api/auth/me")
            .match_header("authorization", format!("Bearer {}", new).as_str())
            .with_status(401)
            .with_body(r#"{"localization_key": "error.user_not_found"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(format!(r#"{{"access": "{}"}}"#, new))
            .expect(1)
            .create_async()
            .await;

        let gateway = gateway_for(
            &server,
            MemoryStore::with_pair(&CredentialPair::new(old, "refresh")),
        );
        let err = gateway
            .send(ApiRequest::get("/api/auth/me"))
            .await
            .unwrap_err();

        first.assert_async().await;
        replay.assert_async().await;
        refresh.assert_async().await;
        assert!(err.is_unauthorized());
        match err {
            GatewayError::Status { body, .. } => assert!(body.contains("user_not_found")),
            other => panic!("expected status error, got {:?}", other),
        }
        // The renewal itself succeeded, so the session is kept.
        assert_eq!(gateway.session().store().access(), Some(new));
    }

    #[tokio::test]
    async fn test_sessionless_request_skips_token_and_recovery() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/login")
            .match_header("authorization", Matcher::Missing)
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        // Even an expired stored token is left alone.
        let expired = token_expiring_at(chrono::Utc::now().timestamp() - 60);
        let gateway = gateway_for(
            &server,
            MemoryStore::with_pair(&CredentialPair::new(expired, "refresh")),
        );
        let err = gateway
            .send(ApiRequest::post("/auth/login").without_session())
            .await
            .unwrap_err();

        m.assert_async().await;
        refresh.assert_async().await;
        assert!(err.is_unauthorized());
        assert!(gateway.session().has_session());
    }

    #[tokio::test]
    async fn test_already_retried_request_is_not_replayed() {
        let access = valid_token();
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/api/decks")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let gateway = gateway_for(
            &server,
            MemoryStore::with_pair(&CredentialPair::new(access, "refresh")),
        );
        let mut request = ApiRequest::get("/api/decks");
        request.mark_retried();
        let err = gateway.send(request).await.unwrap_err();

        m.assert_async().await;
        refresh.assert_async().await;
        assert!(err.is_unauthorized());
    }
}
