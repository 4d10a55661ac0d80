use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};

use axum_client_ip::ClientIp;
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;

use crate::{
    AppState,
    db::IdentityExt,
    error::{ErrorMessage, HttpError},
    models::{Principal, PrincipalKind},
    utils::token,
};

/// Authenticated principal, inserted into request extensions by `auth`
///
/// ```text
/// async fn my_handler(Extension(auth): Extension<AuthPrincipal>) { ... }
/// ```
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub principal: Principal,
}

/// Token from the `access_token` cookie, or from `Authorization: Bearer <token>`
pub fn extract_token(cookie_jar: &CookieJar, req: &Request) -> Option<String> {
    cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(str::to_owned)
        })
}

/// Resolves the token's principal and rejects it if it is gone or deactivated
///
/// # Errors
/// 401 if the token is missing, invalid or names a principal that no longer
/// exists; 403 for a deactivated reporter.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, &req)
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let claims = token::decode_token(token, app_state.env.jwt_secret.as_bytes())?;
    let principal_id = claims.principal_id()?;

    let principal = app_state
        .db_client
        .get_principal(claims.kind, principal_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error while resolving principal: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    if !principal.is_active() {
        return Err(HttpError::forbidden(
            ErrorMessage::ReporterDeactivated.to_string(),
        ));
    }

    req.extensions_mut().insert(AuthPrincipal { principal });

    Ok(next.run(req).await)
}

/// Restrict a route to some principal kinds; must run after `auth`
///
/// # Errors
/// 401 if `auth` did not run, 403 if the principal's kind is not allowed.
pub async fn role_check(
    req: Request,
    next: Next,
    allowed: Vec<PrincipalKind>,
) -> Result<impl IntoResponse, HttpError> {
    let auth = req
        .extensions()
        .get::<AuthPrincipal>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !allowed.contains(&auth.principal.kind()) {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Best-effort client address for audit entries; empty when unknown
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin(pub String);

impl FromRequestParts<AppState> for RequestOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let origin = ClientIp::from_request_parts(parts, state)
            .await
            .map(|ClientIp(ip)| ip.to_string())
            .unwrap_or_default();

        Ok(RequestOrigin(origin))
    }
}
