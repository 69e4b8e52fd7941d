pub mod jwt;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::{AuthConfig, AuthMode};
use crate::models::LinkRecord;
use jwt::{AccessClaims, JwtValidator};

pub use jwt::issue_token;

/// An authenticated account
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<AccessClaims> for Account {
    fn from(claims: AccessClaims) -> Self {
        Self {
            username: claims.username.unwrap_or_else(|| claims.sub.clone()),
            id: claims.sub,
            is_staff: claims.is_staff,
            is_superuser: claims.is_superuser,
        }
    }
}

/// Who is making the request, resolved by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct Caller {
    pub account: Option<Account>,
    /// Staff, superuser, or anyone when auth is disabled
    pub privileged: bool,
}

impl Caller {
    /// Caller when authentication is disabled
    pub fn unrestricted() -> Self {
        Self {
            account: None,
            privileged: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            account: None,
            privileged: false,
        }
    }

    pub fn from_account(account: Account) -> Self {
        Self {
            privileged: account.is_staff || account.is_superuser,
            account: Some(account),
        }
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.account.as_ref().map(|a| a.id.as_str())
    }

    /// Owners may delete their own links; privileged callers may delete any
    pub fn can_delete(&self, record: &LinkRecord) -> bool {
        if self.privileged {
            return true;
        }
        match (self.owner_id(), record.owner.as_deref()) {
            (Some(caller), Some(owner)) => caller == owner,
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid authorization header")]
    MalformedHeader,
    #[error("Invalid or expired token")]
    InvalidToken,
}

pub struct AuthService {
    validator: Option<JwtValidator>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let validator = match config.mode {
            AuthMode::None => None,
            AuthMode::Jwt => {
                let jwt = config
                    .jwt
                    .as_ref()
                    .context("JWT settings are required when AUTH_MODE=jwt")?;
                Some(JwtValidator::from_config(jwt)?)
            }
        };

        Ok(Self { validator })
    }

    pub fn disabled() -> Self {
        Self { validator: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.validator.is_some()
    }

    /// Resolve the caller from request headers. A missing token yields an
    /// anonymous caller; a present but bad token is an error.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Caller, AuthError> {
        let Some(validator) = &self.validator else {
            return Ok(Caller::unrestricted());
        };

        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(Caller::anonymous());
        };

        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MalformedHeader)?;

        let claims = validator.validate(token).map_err(|e| {
            debug!("rejected bearer token: {e:#}");
            AuthError::InvalidToken
        })?;

        Ok(Caller::from_account(claims.into()))
    }
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
}

/// Attach a [`Caller`] to every request, rejecting bad credentials with 401
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.authenticate(request.headers()) {
        Ok(caller) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => (
            StatusCode::UNAUTHORIZED,
            Json(AuthErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
