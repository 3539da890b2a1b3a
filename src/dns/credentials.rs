// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Google credentials and OAuth2 access tokens for Cloud DNS.
//!
//! # Credential sources
//!
//! - `service_account` key file: an RS256 JWT assertion signed with the key is
//!   exchanged at the token endpoint (JWT bearer grant)
//! - `authorized_user` file: the refresh token is exchanged at the token endpoint
//! - no file: the GCE/GKE metadata server issues tokens for the node or workload
//!   identity service account
//!
//! Tokens are cached and refreshed shortly before they expire. The credentials
//! file is polled for changes by [`watch_credentials_file`]; a changed file
//! replaces the credentials and drops the cached token.

use crate::constants::{
    CLOUD_DNS_SCOPE, GOOGLE_TOKEN_URI, JWT_LIFETIME_SECS, METADATA_TOKEN_URL,
    MIN_LOOP_INTERVAL_SECS, TOKEN_REFRESH_MARGIN_SECS,
};
use crate::errors::CredentialsError;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::CONTENT_TYPE;
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const GRANT_TYPE_JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Fields of a `service_account` key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Fields of an `authorized_user` file (as written by `gcloud auth application-default login`).
#[derive(Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Where access tokens come from.
#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
    Metadata,
}

// Private keys and secrets stay out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceAccount(key) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &key.client_email)
                .finish_non_exhaustive(),
            Self::AuthorizedUser(user) => f
                .debug_struct("AuthorizedUser")
                .field("client_id", &user.client_id)
                .finish_non_exhaustive(),
            Self::Metadata => f.write_str("Metadata"),
        }
    }
}

#[derive(Deserialize)]
struct CredentialsType {
    #[serde(rename = "type")]
    credential_type: String,
}

impl Credentials {
    /// Parse the contents of a credentials file.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::InvalidFile`] for malformed JSON or missing
    /// fields and [`CredentialsError::UnsupportedType`] for other credential types.
    pub fn from_json(path: &str, contents: &str) -> Result<Self, CredentialsError> {
        let invalid = |e: serde_json::Error| CredentialsError::InvalidFile {
            path: path.to_string(),
            reason: e.to_string(),
        };

        let kind: CredentialsType = serde_json::from_str(contents).map_err(invalid)?;

        match kind.credential_type.as_str() {
            "service_account" => Ok(Self::ServiceAccount(
                serde_json::from_str(contents).map_err(invalid)?,
            )),
            "authorized_user" => Ok(Self::AuthorizedUser(
                serde_json::from_str(contents).map_err(invalid)?,
            )),
            other => Err(CredentialsError::UnsupportedType {
                path: path.to_string(),
                credential_type: other.to_string(),
            }),
        }
    }

    /// Read and parse a credentials file.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::ReadFailed`] when the file cannot be read, or
    /// any error of [`Credentials::from_json`].
    pub async fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let display = path.display().to_string();
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| CredentialsError::ReadFailed {
                    path: display.clone(),
                    reason: e.to_string(),
                })?;

        Self::from_json(&display, &contents)
    }

    /// Load credentials from a file, or use the metadata server when no file is configured.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Credentials::from_file`].
    pub async fn load(path: Option<&Path>) -> Result<Self, CredentialsError> {
        match path {
            Some(path) => Self::from_file(path).await,
            None => Ok(Self::Metadata),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => "service_account",
            Self::AuthorizedUser(_) => "authorized_user",
            Self::Metadata => "metadata",
        }
    }
}

#[derive(Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - TimeDelta::seconds(TOKEN_REFRESH_MARGIN_SECS) > now
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Issues cached access tokens for the configured credentials.
pub struct TokenSource {
    http: reqwest::Client,
    credentials: RwLock<Credentials>,
    cached: Mutex<Option<AccessToken>>,
    metadata_url: String,
}

impl TokenSource {
    #[must_use]
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials: RwLock::new(credentials),
            cached: Mutex::new(None),
            metadata_url: METADATA_TOKEN_URL.to_string(),
        }
    }

    /// Use a different metadata server token endpoint.
    #[must_use]
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    /// Return a valid access token, fetching a new one when the cached token is
    /// missing or about to expire.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialsError`] when signing or the token request fails.
    pub async fn access_token(&self) -> Result<String, CredentialsError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let credentials = self.current_credentials();
        let token = self.fetch_token(&credentials).await?;
        debug!(
            credentials = credentials.kind(),
            expires_at = %token.expires_at,
            "Obtained Cloud DNS access token"
        );

        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Replace the credentials and drop the cached token.
    pub async fn reload(&self, credentials: Credentials) {
        let mut cached = self.cached.lock().await;
        match self.credentials.write() {
            Ok(mut current) => *current = credentials,
            Err(poisoned) => *poisoned.into_inner() = credentials,
        }
        *cached = None;
    }

    fn current_credentials(&self) -> Credentials {
        match self.credentials.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn fetch_token(&self, credentials: &Credentials) -> Result<AccessToken, CredentialsError> {
        match credentials {
            Credentials::ServiceAccount(key) => {
                let token_uri = key.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URI);
                let assertion = sign_jwt_assertion(key, token_uri, Utc::now().timestamp())?;
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("grant_type", GRANT_TYPE_JWT_BEARER)
                    .append_pair("assertion", &assertion)
                    .finish();
                self.post_token_request(token_uri, body).await
            }
            Credentials::AuthorizedUser(user) => {
                let token_uri = user.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URI);
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("grant_type", GRANT_TYPE_REFRESH_TOKEN)
                    .append_pair("client_id", &user.client_id)
                    .append_pair("client_secret", &user.client_secret)
                    .append_pair("refresh_token", &user.refresh_token)
                    .finish();
                self.post_token_request(token_uri, body).await
            }
            Credentials::Metadata => {
                let request = self
                    .http
                    .get(&self.metadata_url)
                    .header("Metadata-Flavor", "Google");
                send_token_request(&self.metadata_url, request).await
            }
        }
    }

    async fn post_token_request(
        &self,
        token_uri: &str,
        body: String,
    ) -> Result<AccessToken, CredentialsError> {
        let request = self
            .http
            .post(token_uri)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body);
        send_token_request(token_uri, request).await
    }
}

async fn send_token_request(
    url: &str,
    request: reqwest::RequestBuilder,
) -> Result<AccessToken, CredentialsError> {
    let request_failed = |e: reqwest::Error| CredentialsError::TokenRequestFailed {
        url: url.to_string(),
        reason: e.to_string(),
    };

    let response = request.send().await.map_err(request_failed)?;
    let status = response.status();
    let body = response.text().await.map_err(request_failed)?;

    if !status.is_success() {
        return Err(CredentialsError::TokenRejected {
            url: url.to_string(),
            status_code: status.as_u16(),
            message: body,
        });
    }

    let parsed: TokenResponse =
        serde_json::from_str(&body).map_err(|e| CredentialsError::TokenRequestFailed {
            url: url.to_string(),
            reason: format!("invalid token response: {e}"),
        })?;

    Ok(AccessToken {
        token: parsed.access_token,
        expires_at: Utc::now() + TimeDelta::seconds(parsed.expires_in.unwrap_or(JWT_LIFETIME_SECS)),
    })
}

/// Build and sign the RS256 JWT assertion for the JWT bearer grant.
///
/// # Errors
///
/// Returns [`CredentialsError::InvalidPrivateKey`] when the PEM key is not a
/// PKCS#8 RSA key, or [`CredentialsError::SigningFailed`].
pub fn sign_jwt_assertion(
    key: &ServiceAccountKey,
    audience: &str,
    issued_at: i64,
) -> Result<String, CredentialsError> {
    let header = match &key.private_key_id {
        Some(kid) => json!({ "alg": "RS256", "typ": "JWT", "kid": kid }),
        None => json!({ "alg": "RS256", "typ": "JWT" }),
    };
    let claims = json!({
        "iss": key.client_email,
        "scope": CLOUD_DNS_SCOPE,
        "aud": audience,
        "iat": issued_at,
        "exp": issued_at + JWT_LIFETIME_SECS,
    });

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );

    let der = pem_to_der(&key.private_key)?;
    let key_pair =
        RsaKeyPair::from_pkcs8(&der).map_err(|e| CredentialsError::InvalidPrivateKey {
            reason: e.to_string(),
        })?;

    let mut signature = vec![0; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &RSA_PKCS1_SHA256,
            &SystemRandom::new(),
            signing_input.as_bytes(),
            &mut signature,
        )
        .map_err(|e| CredentialsError::SigningFailed {
            reason: e.to_string(),
        })?;

    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Decode the base64 body of a PEM block.
fn pem_to_der(pem: &str) -> Result<Vec<u8>, CredentialsError> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();

    if body.is_empty() {
        return Err(CredentialsError::InvalidPrivateKey {
            reason: "no PEM data found".to_string(),
        });
    }

    STANDARD
        .decode(body)
        .map_err(|e| CredentialsError::InvalidPrivateKey {
            reason: e.to_string(),
        })
}

async fn modified_time(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|metadata| metadata.modified())
        .ok()
}

/// Poll the credentials file and reload the token source when it changes.
///
/// A file that cannot be parsed is logged and the previous credentials stay in
/// use. A zero `poll_interval` is raised to one second. Returns when `shutdown`
/// completes.
pub async fn watch_credentials_file(
    path: PathBuf,
    token_source: Arc<TokenSource>,
    poll_interval: Duration,
    shutdown: impl Future<Output = ()> + Send,
) {
    tokio::pin!(shutdown);

    let mut last_modified = modified_time(&path).await;
    let poll_interval = if poll_interval.is_zero() {
        warn!(
            path = %path.display(),
            "Zero credentials poll interval, polling every {MIN_LOOP_INTERVAL_SECS}s instead"
        );
        Duration::from_secs(MIN_LOOP_INTERVAL_SECS)
    } else {
        poll_interval
    };
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    info!(path = %path.display(), "Watching credentials file for changes");

    loop {
        tokio::select! {
            () = &mut shutdown => {
                debug!(path = %path.display(), "Credentials watcher stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let modified = modified_time(&path).await;
        if modified == last_modified {
            continue;
        }
        last_modified = modified;

        match Credentials::from_file(&path).await {
            Ok(credentials) => {
                info!(
                    path = %path.display(),
                    credentials = credentials.kind(),
                    "Credentials file changed, reinitialized Cloud DNS credentials"
                );
                token_source.reload(credentials).await;
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Credentials file changed but could not be loaded, keeping previous credentials"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod credentials_tests;
