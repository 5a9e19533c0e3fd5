//! Spotify access token lifecycle.
//!
//! [`TokenManager`] keeps a bearer token valid across runs. A token that is
//! still within its expiry window is reused without touching the network; an
//! expired one is refreshed; on a fresh install the configured authorization
//! code is exchanged once. Every token obtained from the network is written
//! to the [`CredentialStore`] before it is handed out.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;
use crate::credentials::{CredentialRecord, CredentialStore, FileCredentialStore, SPOTIFY_SECTION};
use crate::error::{Result, StatsError};

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Successful response body from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// The OAuth token endpoint.
///
/// `exchange_code` reports rejections as [`StatsError::Auth`], `refresh` as
/// [`StatsError::Refresh`].
#[async_trait]
pub trait AuthEndpoint: Send + Sync {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;
}

/// [`AuthEndpoint`] backed by the Spotify accounts service.
#[derive(Clone)]
pub struct SpotifyAuthClient {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyAuthClient {
    pub fn new(client: Client, client_id: String, client_secret: String) -> Self {
        Self {
            client,
            token_url: TOKEN_URL.to_string(),
            client_id,
            client_secret,
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    fn basic_auth(&self) -> String {
        let auth = format!("{}:{}", self.client_id, self.client_secret);
        let encoded =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, auth.as_bytes());
        format!("Basic {}", encoded)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> std::result::Result<TokenResponse, String> {
        let response = self
            .client
            .post(&self.token_url)
            .header("Authorization", self.basic_auth())
            .form(form)
            .send()
            .await
            .map_err(|e| format!("token request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("token endpoint returned {}: {}", status, body));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| format!("unexpected token response: {}", e))
    }
}

#[async_trait]
impl AuthEndpoint for SpotifyAuthClient {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
        .map_err(StatsError::Auth)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
        .map_err(StatsError::Refresh)
    }
}

/// One-time authorization grant taken from configuration.
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub code: String,
    pub redirect_uri: String,
}

impl AuthorizationGrant {
    pub fn from_config(config: &Config) -> Option<Self> {
        let code = config.authorization_code.clone()?;
        let redirect_uri = config.redirect_uri.clone()?;
        Some(Self { code, redirect_uri })
    }
}

pub struct TokenManager<S, A> {
    store: S,
    endpoint: A,
    grant: Option<AuthorizationGrant>,
}

impl<S, A> TokenManager<S, A>
where
    S: CredentialStore,
    A: AuthEndpoint,
{
    pub fn new(store: S, endpoint: A, grant: Option<AuthorizationGrant>) -> Self {
        Self {
            store,
            endpoint,
            grant,
        }
    }

    pub async fn get_access_token(&mut self) -> Result<String> {
        self.get_access_token_at(Utc::now()).await
    }

    /// Same as [`Self::get_access_token`] with an explicit notion of "now".
    pub async fn get_access_token_at(&mut self, now: DateTime<Utc>) -> Result<String> {
        let record = self.store.load_section(SPOTIFY_SECTION)?;

        let expiration = match record.expiration() {
            Ok(expiration) => expiration,
            Err(e) => {
                tracing::warn!("{}, treating token as expired", e);
                Some(DateTime::<Utc>::MIN_UTC)
            }
        };

        match expiration {
            None => {
                tracing::info!("no stored spotify credentials, generating a new token");
                self.generate(now, record).await
            }
            Some(expiration) if expiration > now => match record.access_token() {
                Some(token) => {
                    tracing::debug!("reusing stored access token valid until {}", expiration);
                    Ok(token.to_string())
                }
                None => {
                    tracing::warn!("stored expiration has no access token, refreshing");
                    self.refresh(now, record).await
                }
            },
            Some(expiration) => {
                tracing::info!("access token expired at {}, refreshing", expiration);
                self.refresh(now, record).await
            }
        }
    }

    async fn generate(&mut self, now: DateTime<Utc>, mut record: CredentialRecord) -> Result<String> {
        let grant = self.grant.as_ref().ok_or_else(|| {
            StatsError::Config(
                "SPOTIFY_AUTHORIZATION_CODE and SPOTIFY_REDIRECT_URI are required to generate a token"
                    .to_string(),
            )
        })?;

        let response = self
            .endpoint
            .exchange_code(&grant.code, &grant.redirect_uri)
            .await?;
        let expiration = expires_at(now, response.expires_in);

        match response.refresh_token.as_deref() {
            Some(refresh_token) => {
                record.set_token_info(&response.access_token, refresh_token, expiration)
            }
            None => {
                tracing::warn!("authorization response carried no refresh token");
                record.set_access_token(&response.access_token, expiration);
            }
        }

        self.store.save_section(SPOTIFY_SECTION, &record)?;
        tracing::info!("generated access token valid until {}", expiration);
        Ok(response.access_token)
    }

    async fn refresh(&mut self, now: DateTime<Utc>, mut record: CredentialRecord) -> Result<String> {
        let Some(refresh_token) = record.refresh_token().map(String::from) else {
            return Err(StatsError::Refresh(
                "no refresh token stored; re-authorize and reset the credential file".to_string(),
            ));
        };

        let response = self.endpoint.refresh(&refresh_token).await?;
        let expiration = expires_at(now, response.expires_in);

        match response.refresh_token.as_deref() {
            Some(new_refresh_token) => {
                record.set_token_info(&response.access_token, new_refresh_token, expiration)
            }
            // The old refresh token stays valid when none is returned.
            None => record.set_access_token(&response.access_token, expiration),
        }

        self.store.save_section(SPOTIFY_SECTION, &record)?;
        tracing::info!("refreshed access token valid until {}", expiration);
        Ok(response.access_token)
    }
}

impl TokenManager<FileCredentialStore, SpotifyAuthClient> {
    /// Manager wired to the configured credential file and Spotify's token
    /// endpoint.
    pub fn from_config(config: &Config, client: Client) -> Self {
        Self::new(
            FileCredentialStore::new(&config.credentials_path),
            SpotifyAuthClient::new(
                client,
                config.client_id.clone(),
                config.client_secret.clone(),
            ),
            AuthorizationGrant::from_config(config),
        )
    }
}

fn expires_at(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    now + Duration::seconds(expires_in.clamp(0, i32::MAX as i64))
}
