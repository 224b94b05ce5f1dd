use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use axum_extra::extract::CookieJar;

use crate::auth::middleware::build_authenticated_user;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::config::AppConfig;
use crate::error::AppError;

/// Cookie carrying the admin panel session value.
pub const SESSION_COOKIE: &str = "pagesync_session";

/// Role guard consumed by the page handlers.
///
/// Returns the caller when they hold one of `allowed`, `Auth` when no valid
/// credential is present and `Forbidden` when the roles don't match.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(
        &self,
        headers: &HeaderMap,
        allowed: &[Role],
    ) -> Result<AuthenticatedUser, AppError>;
}

/// Authorizer backed by a static table of tokens.
///
/// A token is accepted either as `Authorization: Bearer <token>` or as the
/// value of the `pagesync_session` cookie.
#[derive(Debug, Default, Clone)]
pub struct TokenAuthorizer {
    users: HashMap<String, AuthenticatedUser>,
}

impl TokenAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.users.insert(token.into(), user);
        self
    }

    /// The service token gets the admin role; grants map their own roles.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut authorizer = Self::new().with_token(
            config.service_token.clone(),
            AuthenticatedUser {
                user_id: "service".to_string(),
                roles: vec![Role::Admin],
            },
        );
        for grant in &config.grants {
            authorizer = authorizer.with_token(
                grant.token.clone(),
                build_authenticated_user(grant.user.clone(), &grant.roles),
            );
        }
        authorizer
    }
}

/// Pull the credential out of the request, bearer header first.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned);

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

#[async_trait]
impl Authorizer for TokenAuthorizer {
    async fn authorize(
        &self,
        headers: &HeaderMap,
        allowed: &[Role],
    ) -> Result<AuthenticatedUser, AppError> {
        let token = extract_token(headers).ok_or_else(|| AppError::Auth("Not logged in".into()))?;

        let user = self
            .users
            .get(&token)
            .ok_or_else(|| AppError::Auth("Invalid session".into()))?;

        if !user.has_any_role(allowed) {
            tracing::debug!("User '{}' lacks any of {:?}", user.user_id, allowed);
            return Err(AppError::Forbidden("Insufficient role".into()));
        }

        Ok(user.clone())
    }
}
