//! Auth service client: sign-up, login and profile lookup

use crate::api::session::Session;
use crate::api::{deserialize_id, MessageResponse, PlatformClient};
use crate::error::ApiError;
use crate::types::ServiceName;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Login credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<(), ApiError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(ApiError::InvalidInput {
                reason: "Email and password required".to_string(),
            });
        }
        Ok(())
    }
}

/// Account creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Identity behind a token, as reported by `/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Fail unless the profile belongs to an administrator
pub fn require_admin(profile: &UserProfile) -> Result<(), ApiError> {
    if profile.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Client for `auth-service`
#[derive(Clone)]
pub struct AuthClient {
    client: PlatformClient,
}

impl AuthClient {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    /// Create an account
    pub async fn signup(&self, request: &SignupRequest) -> Result<String, ApiError> {
        Credentials::new(&request.email, &request.password).validate()?;

        let response: MessageResponse = self
            .client
            .call(&ServiceName::Auth, Method::POST, "/register", false, |r| {
                r.json(request)
            })
            .await?;
        Ok(response.message)
    }

    /// Exchange credentials for a token
    pub async fn login(&self, credentials: &Credentials) -> Result<String, ApiError> {
        credentials.validate()?;

        let response: LoginResponse = self
            .client
            .call(&ServiceName::Auth, Method::POST, "/login", false, |r| {
                r.json(credentials)
            })
            .await?;
        Ok(response.token)
    }

    /// Profile for the client's current token
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        self.client
            .call(&ServiceName::Auth, Method::GET, "/me", true, |r| r)
            .await
    }

    /// Log in, then confirm the token by fetching the profile
    pub async fn login_and_fetch_profile(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, ApiError> {
        let token = self.login(credentials).await?;

        let profile = AuthClient::new(self.client.clone().with_token(token.clone()))
            .me()
            .await?;

        info!("Logged in as {}", profile.email);
        Ok(Session::new(token, Some(profile)))
    }
}
