//! Auth Provider client: register, login, session acquisition.
//!
//! The provider issues bearer tokens through `/login` and sets a CSRF token
//! cookie alongside; `/register` tolerates already-existing users so pool
//! identities can be re-used across runs.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, SET_COOKIE};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::credentials::Credentials;
use crate::error::{Error, Result};

const REGISTER_PATH: &str = "register";
const LOGIN_PATH: &str = "login";
const CSRF_COOKIE: &str = "csrf_token";

/// Header carrying the CSRF token on non-GET REST calls.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// An authenticated identity context.
///
/// Immutable once created and discarded at the end of the iteration; never
/// persisted. Usable for WebSocket auth only while [`Session::is_usable`]
/// holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer token.
    pub token: String,
    /// CSRF token from the login response cookie, when present.
    pub csrf_token: Option<String>,
    /// Email the session was issued for.
    pub email: String,
    /// Username the session was issued for.
    pub username: String,
}

impl Session {
    /// A session authenticates a WebSocket only with a non-empty token.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.token.is_empty()
    }

    /// `Bearer <token>` value for the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Headers derived from this session for authenticated REST calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingToken`] for unusable sessions, or
    /// [`Error::Http`] if a token contains bytes invalid in a header.
    pub fn headers(&self) -> Result<HeaderMap> {
        if !self.is_usable() {
            return Err(Error::MissingToken);
        }
        let mut headers = HeaderMap::new();
        let bearer =
            HeaderValue::from_str(&self.bearer()).map_err(|e| Error::Http(e.to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        if let Some(csrf) = &self.csrf_token {
            let value = HeaderValue::from_str(csrf).map_err(|e| Error::Http(e.to_string()))?;
            headers.insert(CSRF_HEADER, value);
        }
        Ok(headers)
    }
}

/// Outcome of a registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Account created.
    Created,
    /// Username or email already taken; non-fatal for pool users.
    AlreadyExists,
}

/// Standard `{status, data|message, code}` response envelope.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

impl ApiEnvelope {
    fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// HTTP client for the Auth Provider.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AuthClient {
    /// Create a client against the given Auth Provider base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the underlying client cannot be built.
    pub fn new(base_url: Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("chatload/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}/{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }

    /// Register a new user.
    ///
    /// `USERNAME_EXISTS`/`EMAIL_EXISTS` rejections map to
    /// [`RegisterOutcome::AlreadyExists`] instead of an error.
    ///
    /// # Errors
    ///
    /// Any other failure mode (transport, malformed body, unexpected
    /// status) is fatal for this call.
    pub async fn register(&self, credentials: &Credentials) -> Result<RegisterOutcome> {
        let url = self.endpoint(REGISTER_PATH);
        debug!(email = %credentials.email, "registering user");
        let response = self.http.post(url).json(credentials).send().await?;
        let status = response.status().as_u16();
        let envelope: ApiEnvelope =
            response
                .json()
                .await
                .map_err(|e| Error::MalformedResponse {
                    endpoint: format!("/{REGISTER_PATH}"),
                    detail: e.to_string(),
                })?;

        if status == 200 && envelope.is_success() {
            return Ok(RegisterOutcome::Created);
        }
        if status == 400 {
            if let Some(code) = &envelope.code {
                if code == "USERNAME_EXISTS" || code == "EMAIL_EXISTS" {
                    debug!(email = %credentials.email, code, "user already exists");
                    return Ok(RegisterOutcome::AlreadyExists);
                }
            }
            return Err(Error::RegistrationRejected(
                envelope.message.unwrap_or_else(|| "unknown reason".to_string()),
            ));
        }
        Err(Error::UnexpectedStatus {
            endpoint: format!("/{REGISTER_PATH}"),
            status,
        })
    }

    /// Attempt a login.
    ///
    /// Returns `Ok(None)` for the invalid-credentials class (400/401 with
    /// an error envelope); only that class is a candidate for the
    /// register-then-retry fallback.
    ///
    /// # Errors
    ///
    /// Transport failures, malformed bodies and unexpected status codes.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let url = self.endpoint(LOGIN_PATH);
        debug!(%email, "logging in");
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status().as_u16();
        let csrf_token = extract_csrf_token(response.headers());
        let envelope: ApiEnvelope =
            response
                .json()
                .await
                .map_err(|e| Error::MalformedResponse {
                    endpoint: format!("/{LOGIN_PATH}"),
                    detail: e.to_string(),
                })?;

        if status == 200 && envelope.is_success() {
            let token = envelope
                .data
                .get("access_token")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if token.is_empty() {
                return Err(Error::MalformedResponse {
                    endpoint: format!("/{LOGIN_PATH}"),
                    detail: "success body without access_token".to_string(),
                });
            }
            if csrf_token.is_none() {
                warn!(%email, "login response carried no csrf_token cookie");
            }
            return Ok(Some(Session {
                token,
                csrf_token,
                email: email.to_string(),
                username: String::new(),
            }));
        }
        if (status == 400 || status == 401) && !envelope.is_success() {
            debug!(%email, status, "invalid credentials");
            return Ok(None);
        }
        Err(Error::UnexpectedStatus {
            endpoint: format!("/{LOGIN_PATH}"),
            status,
        })
    }

    /// Acquire a usable session for the given credentials.
    ///
    /// Login first; on the invalid-credentials class, register (tolerating
    /// already-existing users) and retry login exactly once. Costs two or
    /// three HTTP round trips. No further retries happen here; retry
    /// policy, if any, belongs to the calling scenario.
    ///
    /// # Errors
    ///
    /// [`Error::AuthFailed`] when credentials are still rejected after the
    /// register fallback; transport/status errors pass through untouched.
    pub async fn acquire_session(&self, credentials: &Credentials) -> Result<Session> {
        if let Some(session) = self
            .login(&credentials.email, &credentials.password)
            .await?
        {
            return Ok(with_username(session, credentials));
        }

        self.register(credentials).await?;

        match self
            .login(&credentials.email, &credentials.password)
            .await?
        {
            Some(session) => Ok(with_username(session, credentials)),
            None => Err(Error::AuthFailed {
                email: credentials.email.clone(),
                reason: "credentials rejected after registration".to_string(),
            }),
        }
    }
}

fn with_username(mut session: Session, credentials: &Credentials) -> Session {
    session.username = credentials.username.clone();
    session
}

/// Pull the CSRF token out of `Set-Cookie` headers.
fn extract_csrf_token(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(SET_COOKIE) {
        let Ok(cookie) = value.to_str() else { continue };
        let Some(pair) = cookie.split(';').next() else { continue };
        if let Some((name, token)) = pair.split_once('=') {
            if name.trim() == CSRF_COOKIE && !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}
