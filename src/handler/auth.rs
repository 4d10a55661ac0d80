use crate::{
    AppState,
    db::IdentityExt,
    dtos::{
        AuthResponseDto, FilterPrincipalDto, LoginEmailDto, LoginReporterDto, PrincipalData,
        PrincipalResponseDto, RefreshResponseDto, RegisterReporterDto, RegisterUserDto, Response,
    },
    error::{ErrorMessage, HttpError},
    middleware::{AuthPrincipal, RequestOrigin, auth},
    models::{ActorSnapshot, AuditEntry, Principal, PrincipalKind},
    utils::{password, reporter_code, token},
};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use validator::Validate;

use tracing::instrument;

/// Router for registration, login and session endpoints
pub fn auth_handler(app_state: AppState) -> Router<AppState> {
    let require_auth = middleware::from_fn_with_state(app_state, auth);

    Router::new()
        .route("/register/user", post(register_user))
        .route("/register/reporter", post(register_reporter))
        .route("/login/user", post(login_user))
        .route("/login/reporter", post(login_reporter))
        .route("/login/admin", post(login_admin))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout).layer(require_auth.clone()))
        .route("/me", get(get_me).layer(require_auth))
}

fn cookie_headers(cookies: &[Cookie<'_>]) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        let value = HeaderValue::from_str(&cookie.to_string()).map_err(|e| {
            tracing::error!("Invalid cookie header: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
        headers.append(header::SET_COOKIE, value);
    }
    Ok(headers)
}

fn token_cookie(name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .http_only(true)
        .secure(true)
        .build()
}

/// Issue access + refresh tokens for `principal`
///
/// The refresh token is stored in Redis so logout can revoke it.
async fn start_session(
    app_state: &AppState,
    principal: &Principal,
    status: StatusCode,
    message: &str,
) -> Result<axum::response::Response, HttpError> {
    let principal_id = principal.id().to_string();
    let kind = principal.kind();
    let secret = app_state.env.jwt_secret.as_bytes();

    let access_token = token::create_token(&principal_id, kind, secret, app_state.env.jwt_maxage)
        .map_err(|e| {
            tracing::error!("Access token creation error: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let refresh_token = token::create_token(
        &principal_id,
        kind,
        secret,
        app_state.env.refresh_token_maxage,
    )
    .map_err(|e| {
        tracing::error!("Refresh token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    app_state
        .redis_client
        .save_refresh_token(
            kind,
            &principal_id,
            &refresh_token,
            app_state.env.refresh_token_maxage,
        )
        .await
        .map_err(|e| {
            tracing::error!(principal_id = %principal_id, "RedisDB error, saving refresh token: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let headers = cookie_headers(&[
        token_cookie("access_token", access_token.clone(), app_state.env.jwt_maxage),
        token_cookie(
            "refresh_token",
            refresh_token,
            app_state.env.refresh_token_maxage,
        ),
    ])?;

    let body = Json(AuthResponseDto {
        status: "success".to_string(),
        message: message.to_string(),
        access_token,
        data: PrincipalData {
            user: FilterPrincipalDto::filter_principal(principal),
        },
    });

    let mut response = (status, body).into_response();
    response.headers_mut().extend(headers);
    Ok(response)
}

fn map_registration_error(err: sqlx::Error, conflict_message: &str) -> HttpError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            tracing::error!("DB error, registration unique_violation: {}", db_err);
            HttpError::unique_constraint_violation(conflict_message)
        }
        e => {
            tracing::error!("DB error, registration: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        }
    }
}

#[instrument(skip(app_state, body, origin), fields(email = %body.email))]
pub async fn register_user(
    State(app_state): State<AppState>,
    origin: RequestOrigin,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid register input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let hash_password = password::hash(&body.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::server_error(e.to_string())
    })?;

    let user = app_state
        .db_client
        .save_user(body.name.trim(), body.email.trim(), &hash_password)
        .await
        .map_err(|e| map_registration_error(e, "User already exists with this email"))?;

    let principal = Principal::User(user);
    app_state.audit_log.record(AuditEntry::new(
        "User Registration",
        ActorSnapshot::of(&principal),
        None,
        format!("User {} registered", principal.display_name()),
        origin.0,
    ));

    tracing::info!(user_id = %principal.id(), "Register Successful");
    start_session(
        &app_state,
        &principal,
        StatusCode::CREATED,
        "User registered successfully",
    )
    .await
}

#[instrument(skip(app_state, body, origin), fields(reporter_code = %body.reporter_code))]
pub async fn register_reporter(
    State(app_state): State<AppState>,
    origin: RequestOrigin,
    Json(body): Json<RegisterReporterDto>,
) -> Result<impl IntoResponse, HttpError> {
    // Checked first so a bad code gets the format hint, not a generic error
    if !reporter_code::is_valid(&body.reporter_code) {
        return Err(HttpError::bad_request(
            ErrorMessage::InvalidReporterCode.to_string(),
        ));
    }
    body.validate().map_err(|e| {
        tracing::error!("Invalid reporter register input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let place_name = body
        .place_name
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .or_else(|| reporter_code::place_prefix(&body.reporter_code))
        .unwrap_or_default()
        .to_string();

    let hash_password = password::hash(&body.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::server_error(e.to_string())
    })?;

    let reporter = app_state
        .db_client
        .save_reporter(
            &body.reporter_code,
            body.name.trim(),
            body.email.trim(),
            &hash_password,
            &place_name,
        )
        .await
        .map_err(|e| map_registration_error(e, "Reporter ID or email already registered"))?;

    let details = format!(
        "Reporter {} ({}) registered",
        reporter.name, reporter.reporter_code
    );
    let principal = Principal::Reporter(reporter);
    app_state.audit_log.record(AuditEntry::new(
        "Reporter Registration",
        ActorSnapshot::of(&principal),
        None,
        details,
        origin.0,
    ));

    tracing::info!(reporter_id = %principal.id(), "Reporter Register Successful");
    start_session(
        &app_state,
        &principal,
        StatusCode::CREATED,
        "Reporter registered successfully",
    )
    .await
}

#[instrument(skip(app_state, body, origin), fields(email = %body.email))]
pub async fn login_user(
    State(app_state): State<AppState>,
    origin: RequestOrigin,
    Json(body): Json<LoginEmailDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| HttpError::bad_request(e.to_string()))?;
    login(&app_state, PrincipalKind::User, &body.email, &body.password, &origin.0).await
}

#[instrument(skip(app_state, body, origin), fields(reporter_code = %body.reporter_code))]
pub async fn login_reporter(
    State(app_state): State<AppState>,
    origin: RequestOrigin,
    Json(body): Json<LoginReporterDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| HttpError::bad_request(e.to_string()))?;
    if !reporter_code::is_valid(&body.reporter_code) {
        return Err(HttpError::bad_request(
            ErrorMessage::InvalidReporterCode.to_string(),
        ));
    }
    login(
        &app_state,
        PrincipalKind::Reporter,
        &body.reporter_code,
        &body.password,
        &origin.0,
    )
    .await
}

#[instrument(skip(app_state, body, origin), fields(email = %body.email))]
pub async fn login_admin(
    State(app_state): State<AppState>,
    origin: RequestOrigin,
    Json(body): Json<LoginEmailDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| HttpError::bad_request(e.to_string()))?;
    login(&app_state, PrincipalKind::Admin, &body.email, &body.password, &origin.0).await
}

/// Shared login flow with rate limiting (100 failures per IP per day,
/// 10 per identifier+IP per hour)
async fn login(
    app_state: &AppState,
    kind: PrincipalKind,
    identifier: &str,
    password_input: &str,
    ip: &str,
) -> Result<axum::response::Response, HttpError> {
    let redis_error = |e: redis::RedisError| {
        tracing::error!("RedisDB error, login attempts: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    };

    if app_state
        .redis_client
        .login_attempts_exceeded(kind, identifier, ip)
        .await
        .map_err(redis_error)?
    {
        tracing::warn!(ip = %ip, "Login attempt exceeded the limit");
        return Err(HttpError::too_many_requests(
            ErrorMessage::TooManyAttempts.to_string(),
        ));
    }

    let db = &app_state.db_client;
    let found = match kind {
        PrincipalKind::User => db.get_user_by_email(identifier).await.map(|u| u.map(Principal::User)),
        PrincipalKind::Reporter => db
            .get_reporter_by_code(identifier)
            .await
            .map(|r| r.map(Principal::Reporter)),
        PrincipalKind::Admin => db.get_admin_by_email(identifier).await.map(|a| a.map(Principal::Admin)),
    }
    .map_err(|e| {
        tracing::error!("DB error, getting principal: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let principal = match found {
        Some(principal) if verify_password(password_input, principal.password_hash()) => principal,
        _ => {
            if let Err(e) = app_state
                .redis_client
                .record_failed_login(kind, identifier, ip)
                .await
            {
                tracing::warn!("Failed to increment the rate {:?}", e);
            }
            tracing::warn!(kind = kind.to_str(), "Login failed");
            return Err(HttpError::unauthorized(
                ErrorMessage::InvalidCredentials.to_string(),
            ));
        }
    };

    if !principal.is_active() {
        return Err(HttpError::forbidden(
            ErrorMessage::ReporterDeactivated.to_string(),
        ));
    }

    if let Err(e) = app_state
        .redis_client
        .clear_failed_logins(kind, identifier, ip)
        .await
    {
        tracing::warn!("Failed to clear rate limit: {:?}", e);
    }

    app_state.audit_log.record(AuditEntry::new(
        format!("{} Login", kind.label()),
        ActorSnapshot::of(&principal),
        None,
        format!("{} {} logged in", kind.label(), principal.display_name()),
        ip,
    ));

    tracing::info!(principal_id = %principal.id(), kind = kind.to_str(), "Login Successful");
    start_session(app_state, &principal, StatusCode::OK, "Login successful").await
}

fn verify_password(input: &str, hash: &str) -> bool {
    password::compare(input, hash).unwrap_or_else(|e| {
        tracing::error!("Password error: {}", e);
        false
    })
}

/// Issue a new access token from the `refresh_token` cookie
#[instrument(skip(app_state, cookie_jar))]
pub async fn refresh(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("refresh_token")
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| {
            tracing::error!("Refresh token not provided");
            HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string())
        })?;

    let claims = token::decode_token(token.as_str(), app_state.env.jwt_secret.as_bytes())?;
    let principal_id = claims.principal_id()?;

    // Must still be the token issued at login (not revoked by logout)
    let stored = app_state
        .redis_client
        .get_refresh_token(claims.kind, &claims.sub)
        .await
        .map_err(|e| {
            tracing::error!("RedisDB error, getting refresh token: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    if stored.as_deref() != Some(token.as_str()) {
        tracing::error!("Refresh token mismatch or not found in Redis");
        return Err(HttpError::unauthorized(
            ErrorMessage::InvalidToken.to_string(),
        ));
    }

    let principal = app_state
        .db_client
        .get_principal(claims.kind, principal_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting principal: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    if !principal.is_active() {
        return Err(HttpError::forbidden(
            ErrorMessage::ReporterDeactivated.to_string(),
        ));
    }

    let access_token = token::create_token(
        &claims.sub,
        claims.kind,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Access token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let headers = cookie_headers(&[token_cookie(
        "access_token",
        access_token.clone(),
        app_state.env.jwt_maxage,
    )])?;

    let mut response = Json(RefreshResponseDto {
        status: "success".to_string(),
        access_token,
    })
    .into_response();
    response.headers_mut().extend(headers);
    tracing::info!("Access token refreshed successfully");
    Ok(response)
}

/// Revoke the refresh token and expire both cookies
#[instrument(skip(session, app_state), fields(principal_id = %session.principal.id()))]
pub async fn logout(
    Extension(session): Extension<AuthPrincipal>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let principal = session.principal;

    app_state
        .redis_client
        .delete_refresh_token(principal.kind(), &principal.id().to_string())
        .await
        .map_err(|e| {
            tracing::error!("RedisDB error, deleting refresh token: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let expired = |name: &'static str| {
        Cookie::build((name, ""))
            .path("/")
            .max_age(time::Duration::ZERO)
            .http_only(true)
            .build()
    };
    let headers = cookie_headers(&[expired("access_token"), expired("refresh_token")])?;

    let mut response = Json(Response {
        status: "success",
        message: "Logout successful".to_string(),
    })
    .into_response();
    response.headers_mut().extend(headers);
    tracing::info!("logout successful");
    Ok(response)
}

#[instrument(skip(session), fields(principal_id = %session.principal.id()))]
pub async fn get_me(
    Extension(session): Extension<AuthPrincipal>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(PrincipalResponseDto {
        status: "success".to_string(),
        data: PrincipalData {
            user: FilterPrincipalDto::filter_principal(&session.principal),
        },
    }))
}
