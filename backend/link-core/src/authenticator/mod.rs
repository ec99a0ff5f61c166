//! Request authenticator.
//!
//! Wraps request/response calls to the backend:
//! - Attaches `Authorization: Bearer <access_token>` from the credential store
//! - Uses the refresh token instead when calling the exchange endpoint itself
//! - Captures any credential pair a successful response carries
//! - Recovers from one 401 with exactly one exchange followed by one retry
//!
//! Anything it cannot recover from ends the session: the call fails and
//! [`LifecycleEvent::SessionInvalid`] is published.

pub mod request;

pub use request::{ApiRequest, ApiResponse};

use crate::config::ServerConfig;
use crate::connection::token_factory::TokenFactory;
use crate::credentials::{CredentialPair, CredentialStore};
use crate::error::auth::AuthError;
use crate::events::{LifecycleBus, LifecycleEvent};

use common::{HttpStatusCode, RedactedToken};

use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::{debug, info, warn};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Where a call is in the single-retry protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    FirstAttempt,
    RetryAfterExchange,
}

/// Authenticated HTTP client shared by everything that talks to the backend.
#[derive(Clone)]
pub struct RequestAuthenticator {
    base_url: Url,
    client: Client,
    exchange_path: String,
    store: Arc<dyn CredentialStore>,
    bus: LifecycleBus,
}

impl RequestAuthenticator {
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn CredentialStore>,
        bus: LifecycleBus,
    ) -> Result<Self, AuthError> {
        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            base_url,
            client,
            exchange_path: config.exchange_path.trim_matches('/').to_string(),
            store,
            bus,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn exchange_path(&self) -> &str {
        &self.exchange_path
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Send `request`, recovering from a single expired access token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Http`] for non-401 error statuses (no retry, session kept)
    /// - [`AuthError::Network`] if the call never got a response
    /// - [`AuthError::Unauthorized`] / [`AuthError::ExchangeFailed`] when
    ///   authentication could not be recovered; `SessionInvalid` is published
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        let is_exchange = self.is_exchange_endpoint(&request);
        let mut credentials = self.store.get();
        let mut attempt = Attempt::FirstAttempt;

        loop {
            let bearer = credentials.as_ref().map(|pair| {
                if is_exchange {
                    pair.refresh_token()
                } else {
                    pair.access_token()
                }
            });

            let (status, body) = self.dispatch(&request, bearer).await?;

            if status.is_success() {
                if attempt == Attempt::FirstAttempt {
                    self.capture_credentials(&body);
                }
                return Ok(ApiResponse::new(status, body));
            }

            if !status.is_unauthorized() {
                return Err(AuthError::from_http_response(
                    status,
                    String::from_utf8_lossy(&body),
                ));
            }

            match attempt {
                Attempt::RetryAfterExchange => {
                    return Err(self.invalidate_session(AuthError::unauthorized(format!(
                        "{} {} rejected after credential exchange",
                        request.method, request.path
                    ))));
                }
                Attempt::FirstAttempt if is_exchange => {
                    return Err(self.invalidate_session(AuthError::exchange_failed(
                        "exchange endpoint rejected the refresh token",
                        Some(status),
                    )));
                }
                Attempt::FirstAttempt => {
                    let Some(current) = credentials.as_ref() else {
                        return Err(self.invalidate_session(AuthError::unauthorized(format!(
                            "{} {} requires credentials",
                            request.method, request.path
                        ))));
                    };

                    debug!(
                        "{} {} returned 401, exchanging refresh token {}",
                        request.method,
                        request.path,
                        current.refresh_token().fingerprint()
                    );

                    let refreshed = match self.exchange(current).await {
                        Ok(refreshed) => refreshed,
                        Err(e) if e.invalidates_session() => {
                            return Err(self.invalidate_session(e));
                        }
                        Err(e) => {
                            warn!("Credential exchange failed ({}): {e}", e.error_category());
                            return Err(e);
                        }
                    };

                    self.store.set(Some(refreshed.clone()));
                    credentials = Some(refreshed);
                    attempt = Attempt::RetryAfterExchange;
                }
            }
        }
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Goes through [`send`](Self::send), so the new pair lands in the store.
    pub async fn refresh_credentials(&self) -> Result<CredentialPair, AuthError> {
        if self.store.get().is_none() {
            return Err(self.invalidate_session(AuthError::no_credentials()));
        }

        let response = self.send(ApiRequest::get(self.exchange_path.clone())).await?;

        match CredentialPair::from_json_slice(response.body()) {
            Some(pair) => {
                info!(
                    "Credentials refreshed (access token {})",
                    pair.access_token().fingerprint()
                );
                Ok(pair)
            }
            None => Err(self.invalidate_session(AuthError::malformed_exchange(
                "exchange response is not a credential pair",
            ))),
        }
    }

    /// One call to the exchange endpoint, outside the retry protocol.
    ///
    /// Only a rejected refresh token (401) or an unusable body ends the session;
    /// network failures and other statuses come back as they would from `send`.
    async fn exchange(&self, current: &CredentialPair) -> Result<CredentialPair, AuthError> {
        let request = ApiRequest::get(self.exchange_path.clone());

        let (status, body) = self
            .dispatch(&request, Some(current.refresh_token()))
            .await?;

        if status.is_unauthorized() {
            return Err(AuthError::exchange_failed(
                "exchange endpoint rejected the refresh token",
                Some(status),
            ));
        }
        if !status.is_success() {
            return Err(AuthError::from_http_response(
                status,
                String::from_utf8_lossy(&body),
            ));
        }

        CredentialPair::from_json_slice(&body).ok_or_else(|| {
            AuthError::malformed_exchange("exchange response is not a credential pair")
        })
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        bearer: Option<&RedactedToken>,
    ) -> Result<(HttpStatusCode, Vec<u8>), AuthError> {
        let url = self.base_url.join(request.normalized_path())?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token.expose());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = HttpStatusCode(response.status().as_u16());
        let body = response.bytes().await?.to_vec();

        Ok((status, body))
    }

    fn capture_credentials(&self, body: &[u8]) {
        if let Some(pair) = CredentialPair::from_json_slice(body) {
            debug!(
                "Response carried credentials (access token {})",
                pair.access_token().fingerprint()
            );
            self.store.set(Some(pair));
        }
    }

    fn is_exchange_endpoint(&self, request: &ApiRequest) -> bool {
        request.normalized_path() == self.exchange_path
    }

    fn invalidate_session(&self, error: AuthError) -> AuthError {
        warn!("Session invalid ({}): {error}", error.error_category());
        self.bus.publish(LifecycleEvent::SessionInvalid);
        error
    }
}

impl TokenFactory for RequestAuthenticator {
    fn fetch(&self) -> BoxFuture<'static, Result<CredentialPair, AuthError>> {
        let authenticator = self.clone();
        Box::pin(async move { authenticator.refresh_credentials().await })
    }
}
