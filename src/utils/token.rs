use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorMessage, HttpError};
use crate::models::PrincipalKind;

/// JWT claims: `sub` is the principal id, `kind` says which table it lives in
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub kind: PrincipalKind,
    pub iat: usize,
    pub exp: usize,
}

impl TokenClaims {
    pub fn principal_id(&self) -> Result<Uuid, HttpError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))
    }
}

pub fn create_token(
    principal_id: &str,
    kind: PrincipalKind,
    secret: &[u8],
    expires_in_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    if principal_id.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }

    let now = Utc::now();
    let claims = TokenClaims {
        sub: principal_id.to_string(),
        kind,
        iat: now.timestamp() as usize,
        exp: (now + Duration::seconds(expires_in_seconds)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

/// Verifies signature and expiry
pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<TokenClaims, HttpError> {
    decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))
}
