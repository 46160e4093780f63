use anyhow::{bail, Context, Result};
use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::{AuthConfig, AuthMode};

/// Authenticated caller, inserted into request extensions by [`auth_middleware`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaims {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
}

enum Backend {
    /// Every request acts as the configured development user
    Disabled { user_id: String },
    Jwt {
        key: DecodingKey,
        validation: Validation,
    },
}

pub struct AuthService {
    backend: Backend,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let backend = match config.mode {
            AuthMode::None => Backend::Disabled {
                user_id: config.dev_user_id.clone(),
            },
            AuthMode::Jwt => {
                let jwt = config
                    .jwt
                    .as_ref()
                    .context("JWT auth mode requires a JWT configuration")?;
                if jwt.secret.is_empty() {
                    bail!("JWT secret must not be empty");
                }

                let mut validation = Validation::new(Algorithm::HS256);
                validation.validate_aud = false;
                if let Some(issuer) = &jwt.issuer {
                    validation.set_issuer(&[issuer]);
                }

                Backend::Jwt {
                    key: DecodingKey::from_secret(jwt.secret.as_bytes()),
                    validation,
                }
            }
        };

        Ok(Self { backend })
    }

    /// Resolve the caller from the request headers
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthClaims> {
        match &self.backend {
            Backend::Disabled { user_id } => Ok(AuthClaims {
                user_id: user_id.clone(),
            }),
            Backend::Jwt { key, validation } => {
                let token = bearer_token(headers).context("missing bearer token")?;
                let data = decode::<SessionClaims>(token, key, validation)
                    .context("token failed validation")?;
                if data.claims.sub.is_empty() {
                    bail!("token has an empty subject");
                }
                Ok(AuthClaims {
                    user_id: data.claims.sub,
                })
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.authenticate(request.headers()) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(err) => {
            debug!(error = %err, "rejected unauthenticated request");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Unauthorized" })),
            )
                .into_response()
        }
    }
}
