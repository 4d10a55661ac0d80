use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::{Extension, Router, middleware};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::db::{ContentExt, ContentFilter};
use crate::dtos::{
    ContentDto, ContentListResponseDto, ContentQueryParams, ContentResponseDto,
    ContentSummaryDto, PaginationDto, Response,
};
use crate::error::{ErrorMessage, HttpError};
use crate::middleware::{AuthPrincipal, RequestOrigin, auth, role_check};
use crate::models::{ApprovalState, Category, ContentKind, PrincipalKind};
use crate::moderation::{ContentDraft, ContentPatch};
use crate::policy::{self, Action, Actor, ResourceContext};

const DEFAULT_LIMIT: i64 = 10;

/// Router for one content kind; the kind reaches handlers as an extension
pub fn content_handler(app_state: AppState, kind: ContentKind) -> Router<AppState> {
    Router::new()
        .route("/", get(list_content))
        .route(
            "/",
            post(submit_content)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![PrincipalKind::Admin, PrincipalKind::Reporter])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/mine",
            get(list_my_content)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![PrincipalKind::Reporter])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{id}", get(get_content))
        .route(
            "/{id}",
            put(edit_content)
                .delete(delete_content)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![PrincipalKind::Admin, PrincipalKind::Reporter])
                }))
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
        .layer(Extension(kind))
}

fn parse_filter(kind: ContentKind, params: &ContentQueryParams) -> Result<ContentFilter, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let category = params
        .category
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(str::parse::<Category>)
        .transpose()
        .map_err(HttpError::bad_request)?;

    Ok(ContentFilter {
        kind: Some(kind),
        category,
        location: params.location.clone(),
        reporter_code: params.reporter.clone(),
        search: params.search.clone(),
        ..Default::default()
    })
}

async fn list_page(
    app_state: &AppState,
    filter: &ContentFilter,
    page: i64,
    limit: i64,
) -> Result<ContentListResponseDto, HttpError> {
    let items = app_state
        .db_client
        .list_content(filter, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, listing content: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .count_content(filter)
        .await
        .map_err(|e| {
            tracing::error!("DB error, counting content: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(ContentListResponseDto {
        status: "success".to_string(),
        data: ContentSummaryDto::summarize(&items),
        pagination: PaginationDto::new(page, limit, total),
    })
}

/// Public listing: approved items only
#[instrument(skip(app_state, params), fields(kind = kind.label()))]
pub async fn list_content(
    Extension(kind): Extension<ContentKind>,
    Query(params): Query<ContentQueryParams>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let mut filter = parse_filter(kind, &params)?;
    filter.approval_state = Some(ApprovalState::Approved);

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    Ok(Json(list_page(&app_state, &filter, page, limit).await?))
}

/// The calling reporter's own items, in every state
#[instrument(skip(session, app_state, params), fields(kind = kind.label(), principal_id = %session.principal.id()))]
pub async fn list_my_content(
    Extension(kind): Extension<ContentKind>,
    Extension(session): Extension<AuthPrincipal>,
    Query(params): Query<ContentQueryParams>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    policy::authorize(
        Some(&Actor::from(&session.principal)),
        Action::ViewOwn,
        &ResourceContext::default(),
    )?;

    let mut filter = parse_filter(kind, &params)?;
    filter.owner_id = Some(session.principal.id());

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    Ok(Json(list_page(&app_state, &filter, page, limit).await?))
}

#[instrument(skip(app_state), fields(kind = kind.label()))]
pub async fn get_content(
    Extension(kind): Extension<ContentKind>,
    Path(id): Path<Uuid>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let item = app_state.workflow.view(kind, id, None).await?;

    Ok(Json(ContentResponseDto {
        status: "success".to_string(),
        message: String::new(),
        data: ContentDto::from(&item),
    }))
}

#[instrument(skip(session, app_state, origin, body), fields(kind = kind.label(), principal_id = %session.principal.id()))]
pub async fn submit_content(
    Extension(kind): Extension<ContentKind>,
    Extension(session): Extension<AuthPrincipal>,
    State(app_state): State<AppState>,
    origin: RequestOrigin,
    Json(body): Json<ContentDraft>,
) -> Result<impl IntoResponse, HttpError> {
    let item = app_state
        .workflow
        .submit(kind, body, &session.principal, &origin.0)
        .await?;

    let message = if item.approval.state() == ApprovalState::Approved {
        format!("{} published successfully", kind.label())
    } else {
        format!("{} submitted for approval", kind.label())
    };

    Ok((
        StatusCode::CREATED,
        Json(ContentResponseDto {
            status: "success".to_string(),
            message,
            data: ContentDto::from(&item),
        }),
    ))
}

#[instrument(skip(session, app_state, origin, body), fields(kind = kind.label(), principal_id = %session.principal.id()))]
pub async fn edit_content(
    Extension(kind): Extension<ContentKind>,
    Extension(session): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
    State(app_state): State<AppState>,
    origin: RequestOrigin,
    Json(body): Json<ContentPatch>,
) -> Result<impl IntoResponse, HttpError> {
    let item = app_state
        .workflow
        .edit(kind, id, &session.principal, &body, &origin.0)
        .await?;

    Ok(Json(ContentResponseDto {
        status: "success".to_string(),
        message: format!("{} updated successfully", kind.label()),
        data: ContentDto::from(&item),
    }))
}

#[instrument(skip(session, app_state, origin), fields(kind = kind.label(), principal_id = %session.principal.id()))]
pub async fn delete_content(
    Extension(kind): Extension<ContentKind>,
    Extension(session): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
    State(app_state): State<AppState>,
    origin: RequestOrigin,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .workflow
        .delete(kind, id, &session.principal, &origin.0)
        .await?;

    Ok(Json(Response {
        status: "success",
        message: format!("{} deleted successfully", kind.label()),
    }))
}
