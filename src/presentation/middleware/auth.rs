//! Authentication Middleware
//!
//! Bearer tokens are issued by the platform's identity provider; this
//! service only verifies them (HS256, shared secret).

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtSettings;
use crate::domain::{Actor, Roles};
use crate::shared::error::AppError;
use crate::shared::snowflake::serde_id;
use crate::startup::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    #[serde(with = "serde_id")]
    pub tenant_id: i64,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Authenticated user extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub tenant_id: i64,
    pub roles: Roles,
    pub name: Option<String>,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.tenant_id, self.roles.clone())
    }
}

/// Verifies bearer tokens against the configured secret and issuer.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &settings.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AppError> {
        let token_data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".into()),
                _ => AppError::Unauthorized("Invalid token".into()),
            }
        })?;

        let claims = token_data.claims;
        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid token claims".into()))?;

        Ok(AuthUser {
            user_id,
            tenant_id: claims.tenant_id,
            roles: Roles::new(claims.roles),
            name: claims.name,
        })
    }
}

/// Extract the token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    if !headers.contains_key(AUTHORIZATION) {
        return Err(AppError::Unauthorized("Missing authorization header".into()));
    }

    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_owned())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = state.verifier.verify(&bearer_token(request.headers())?)?;

    tracing::Span::current().record("user_id", auth_user.user_id);

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "an-adequately-long-test-secret-0123456789";

    fn settings(issuer: Option<&str>) -> JwtSettings {
        JwtSettings {
            secret: SECRET.into(),
            issuer: issuer.map(str::to_string),
        }
    }

    fn token(exp_offset: i64, iss: Option<&str>) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "42".into(),
            exp: now + exp_offset,
            iat: now,
            tenant_id: 7,
            roles: vec!["Instructor".into()],
            name: Some("Ada".into()),
            iss: iss.map(str::to_string),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_actor() {
        let user = TokenVerifier::new(&settings(None)).verify(&token(3600, None)).unwrap();

        assert_eq!(user.user_id, 42);
        assert_eq!(user.tenant_id, 7);
        assert!(user.actor().is_staff());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let err = TokenVerifier::new(&settings(None))
            .verify(&token(-3600, None))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "Token expired"));
    }

    #[test]
    fn test_issuer_is_enforced_when_configured() {
        let verifier = TokenVerifier::new(&settings(Some("campus-idp")));

        assert!(verifier.verify(&token(3600, Some("campus-idp"))).is_ok());
        assert!(verifier.verify(&token(3600, Some("elsewhere"))).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }
}
