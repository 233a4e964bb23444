use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ApiPaths;
use crate::errors::GatewayError;
use crate::gateway::{ApiRequest, Gateway};
use crate::session::EndReason;
use crate::store::CredentialPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Yellow,
    Green,
    Pink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ru,
    De,
    Zh,
    Es,
    Fr,
    Ja,
    Ko,
}

/// The signed-in user as reported by the `me` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub color: Color,
    pub language: Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub color: Color,
    pub language: Language,
}

#[derive(Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("color", &self.color)
            .field("language", &self.language)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Registered {
    pub user_id: i64,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct IssuedTokens {
    access: String,
    refresh: String,
}

/// Sign-in, sign-up and profile calls.
pub struct AccountApi {
    gateway: Arc<Gateway>,
    paths: ApiPaths,
}

impl AccountApi {
    pub fn new(gateway: Arc<Gateway>, paths: ApiPaths) -> Self {
        Self { gateway, paths }
    }

    /// Exchange a username and password for a fresh session and return the
    /// profile it belongs to. Any session already stored is replaced.
    pub async fn login(&self, username: &str, password: &str) -> Result<Profile, GatewayError> {
        let session = self.gateway.session();
        let request = ApiRequest::post(self.paths.login.as_str())
            .without_session()
            .json(&LoginRequest { username, password })?;
        let tokens: IssuedTokens = self.gateway.send_json(request).await?;
        session.begin(&CredentialPair::new(tokens.access, tokens.refresh))?;

        match self.me().await {
            Ok(profile) => {
                info!("Signed in as '{}'", profile.username);
                Ok(profile)
            }
            Err(e) => {
                warn!("Profile fetch after sign-in failed, dropping the session: {}", e);
                session.end_session(EndReason::LoggedOut);
                Err(e)
            }
        }
    }

    pub async fn register(&self, account: &NewAccount) -> Result<Registered, GatewayError> {
        let request = ApiRequest::post(self.paths.register.as_str())
            .without_session()
            .json(account)?;
        self.gateway.send_json(request).await
    }

    pub async fn me(&self) -> Result<Profile, GatewayError> {
        self.gateway.get_json(&self.paths.me).await
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<Profile, GatewayError> {
        let request = ApiRequest::patch(self.paths.me.as_str()).json(&settings)?;
        self.gateway.send_json(request).await
    }

    /// Resume a stored session. Returns `None` (and forgets the credentials)
    /// when there is nothing to resume or the stored session no longer works.
    pub async fn restore(&self) -> Option<Profile> {
        let session = self.gateway.session();
        if !session.has_session() {
            return None;
        }
        match self.me().await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Stored session could not be restored: {}", e);
                session.end_session(EndReason::LoggedOut);
                None
            }
        }
    }

    pub fn logout(&self) {
        self.gateway.session().end_session(EndReason::LoggedOut);
    }
}
