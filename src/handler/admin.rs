use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, put};
use axum::{Extension, Router, middleware};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::audit::{self, DEFAULT_PAGE_SIZE};
use crate::db::{ContentExt, ContentFilter, IdentityExt, StateCount};
use crate::dtos::{
    ActivityLogQueryDto, ContentDto, ContentResponseDto, ContentSummaryDto, KindStatsDto,
    PendingData, PendingResponseDto, RejectDto, ReporterDto, ReporterListResponseDto,
    ReporterResponseDto, ReporterStatsDto, StatsDto, StatsResponseDto,
};
use crate::error::{ErrorMessage, HttpError};
use crate::middleware::{AuthPrincipal, RequestOrigin, auth, role_check};
use crate::models::{
    ActorSnapshot, ApprovalState, AuditEntry, ContentKind, PrincipalKind, ResourceSnapshot,
};
use crate::policy::{self, Action, Actor, ResourceContext};

/// Pending items returned per kind by the review queue
const PENDING_PAGE: i64 = 100;

/// Admin-only router: moderation queue, reporters, activity log, stats
pub fn admin_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/pending", get(get_pending))
        .route("/approve/{kind}/{id}", put(approve_content))
        .route("/reject/{kind}/{id}", put(reject_content))
        .route("/reporters", get(get_reporters))
        .route("/reporters/{id}/toggle-status", put(toggle_reporter_status))
        .route("/activity-logs", get(get_activity_logs))
        .route("/stats", get(get_stats))
        .route_layer(middleware::from_fn(|req, next| {
            role_check(req, next, vec![PrincipalKind::Admin])
        }))
        .route_layer(middleware::from_fn_with_state(app_state, auth))
}

fn content_kind(segment: &str) -> Result<ContentKind, HttpError> {
    ContentKind::from_segment(segment)
        .ok_or_else(|| HttpError::bad_request(format!("Unknown content type: {}", segment)))
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> HttpError {
    move |e| {
        tracing::error!("DB error, {}: {}", context, e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    }
}

#[instrument(skip(app_state))]
pub async fn get_pending(State(app_state): State<AppState>) -> Result<impl IntoResponse, HttpError> {
    let mut lists = Vec::with_capacity(ContentKind::ALL.len());
    let mut total = 0;

    for kind in ContentKind::ALL {
        let filter = ContentFilter {
            kind: Some(kind),
            approval_state: Some(ApprovalState::Pending),
            ..Default::default()
        };
        let items = app_state
            .db_client
            .list_content(&filter, 1, PENDING_PAGE)
            .await
            .map_err(db_error("listing pending content"))?;
        total += app_state
            .db_client
            .count_content(&filter)
            .await
            .map_err(db_error("counting pending content"))? as usize;
        lists.push(ContentSummaryDto::summarize(&items));
    }

    let mut lists = lists.into_iter();
    let mut next = || lists.next().unwrap_or_default();

    Ok(Json(PendingResponseDto {
        status: "success".to_string(),
        data: PendingData {
            news: next(),
            trending: next(),
            videos: next(),
            total,
        },
    }))
}

#[instrument(skip(session, app_state, origin), fields(principal_id = %session.principal.id()))]
pub async fn approve_content(
    Extension(session): Extension<AuthPrincipal>,
    Path((kind, id)): Path<(String, Uuid)>,
    State(app_state): State<AppState>,
    origin: RequestOrigin,
) -> Result<impl IntoResponse, HttpError> {
    let kind = content_kind(&kind)?;
    let item = app_state
        .workflow
        .approve(kind, id, &session.principal, &origin.0)
        .await?;

    tracing::info!(content_id = %id, "Content approved");
    Ok(Json(ContentResponseDto {
        status: "success".to_string(),
        message: format!("{} approved successfully", kind.label()),
        data: ContentDto::from(&item),
    }))
}

#[instrument(skip(session, app_state, origin, body), fields(principal_id = %session.principal.id()))]
pub async fn reject_content(
    Extension(session): Extension<AuthPrincipal>,
    Path((kind, id)): Path<(String, Uuid)>,
    State(app_state): State<AppState>,
    origin: RequestOrigin,
    body: Option<Json<RejectDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let kind = content_kind(&kind)?;
    let reason = body.and_then(|Json(dto)| dto.reason).unwrap_or_default();

    let item = app_state
        .workflow
        .reject(kind, id, &session.principal, &reason, &origin.0)
        .await?;

    tracing::info!(content_id = %id, "Content rejected");
    Ok(Json(ContentResponseDto {
        status: "success".to_string(),
        message: format!("{} rejected", kind.label()),
        data: ContentDto::from(&item),
    }))
}

#[instrument(skip(session, app_state), fields(principal_id = %session.principal.id()))]
pub async fn get_reporters(
    Extension(session): Extension<AuthPrincipal>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    policy::authorize(
        Some(&Actor::from(&session.principal)),
        Action::ManageReporters,
        &ResourceContext::default(),
    )?;

    let reporters = app_state
        .db_client
        .get_reporters()
        .await
        .map_err(db_error("getting reporters"))?;

    let data: Vec<ReporterDto> = reporters.iter().map(ReporterDto::filter_reporter).collect();
    Ok(Json(ReporterListResponseDto {
        status: "success".to_string(),
        results: data.len(),
        data,
    }))
}

/// Flip a reporter between active and deactivated
#[instrument(skip(session, app_state, origin), fields(principal_id = %session.principal.id()))]
pub async fn toggle_reporter_status(
    Extension(session): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
    State(app_state): State<AppState>,
    origin: RequestOrigin,
) -> Result<impl IntoResponse, HttpError> {
    policy::authorize(
        Some(&Actor::from(&session.principal)),
        Action::ManageReporters,
        &ResourceContext::default(),
    )?;

    let reporter = app_state
        .db_client
        .toggle_reporter_active(id)
        .await
        .map_err(db_error("toggling reporter status"))?
        .ok_or_else(|| HttpError::not_found("Reporter not found"))?;

    let (action, verb) = if reporter.is_active {
        ("Reporter Activated", "activated")
    } else {
        ("Reporter Deactivated", "deactivated")
    };

    app_state.audit_log.record(AuditEntry::new(
        action,
        ActorSnapshot::of(&session.principal),
        Some(ResourceSnapshot::of_reporter(&reporter)),
        format!("Admin {} reporter: {}", verb, reporter.reporter_code),
        origin.0,
    ));

    // A deactivated reporter's refresh token must not outlive the flag
    if !reporter.is_active {
        if let Err(e) = app_state
            .redis_client
            .delete_refresh_token(PrincipalKind::Reporter, &reporter.id.to_string())
            .await
        {
            tracing::warn!(reporter_id = %reporter.id, "Failed to revoke refresh token: {:?}", e);
        }
    }

    tracing::info!(reporter_id = %reporter.id, active = reporter.is_active, "Reporter status toggled");
    Ok(Json(ReporterResponseDto {
        status: "success".to_string(),
        message: format!("Reporter {} successfully", verb),
        data: ReporterDto::filter_reporter(&reporter),
    }))
}

#[instrument(skip(session, app_state), fields(principal_id = %session.principal.id()))]
pub async fn get_activity_logs(
    Extension(session): Extension<AuthPrincipal>,
    Query(params): Query<ActivityLogQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    policy::authorize(
        Some(&Actor::from(&session.principal)),
        Action::ViewAuditLog,
        &ResourceContext::default(),
    )?;

    let page = audit::list(
        &app_state.db_client,
        params.page.unwrap_or(1),
        params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    )
    .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": page,
    })))
}

fn fold_counts(counts: &[StateCount], kind: ContentKind) -> KindStatsDto {
    counts
        .iter()
        .filter(|c| c.kind == kind)
        .fold(KindStatsDto::default(), |mut stats, c| {
            match c.approval_state {
                ApprovalState::Pending => stats.pending += c.count,
                ApprovalState::Approved => stats.approved += c.count,
                ApprovalState::Rejected => stats.rejected += c.count,
            }
            stats.total += c.count;
            stats
        })
}

#[instrument(skip(app_state))]
pub async fn get_stats(State(app_state): State<AppState>) -> Result<impl IntoResponse, HttpError> {
    let counts = app_state
        .db_client
        .content_state_counts()
        .await
        .map_err(db_error("counting content states"))?;
    let (reporters_total, reporters_active) = app_state
        .db_client
        .get_reporter_counts()
        .await
        .map_err(db_error("counting reporters"))?;

    let news = fold_counts(&counts, ContentKind::Article);
    let trending = fold_counts(&counts, ContentKind::Trending);
    let videos = fold_counts(&counts, ContentKind::Video);
    let pending_approvals = news.pending + trending.pending + videos.pending;

    Ok(Json(StatsResponseDto {
        status: "success".to_string(),
        data: StatsDto {
            news,
            trending,
            videos,
            reporters: ReporterStatsDto {
                total: reporters_total,
                active: reporters_active,
                inactive: reporters_total - reporters_active,
            },
            pending_approvals,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_fold_per_kind() {
        let counts = [
            StateCount { kind: ContentKind::Article, approval_state: ApprovalState::Pending, count: 2 },
            StateCount { kind: ContentKind::Article, approval_state: ApprovalState::Approved, count: 5 },
            StateCount { kind: ContentKind::Video, approval_state: ApprovalState::Rejected, count: 1 },
        ];

        assert_eq!(
            fold_counts(&counts, ContentKind::Article),
            KindStatsDto { total: 7, pending: 2, approved: 5, rejected: 0 }
        );
        assert_eq!(
            fold_counts(&counts, ContentKind::Video),
            KindStatsDto { total: 1, pending: 0, approved: 0, rejected: 1 }
        );
        assert_eq!(fold_counts(&counts, ContentKind::Trending), KindStatsDto::default());
    }

    #[test]
    fn kind_segment_must_be_known() {
        assert_eq!(content_kind("trending").unwrap(), ContentKind::Trending);
        assert_eq!(
            content_kind("podcast").unwrap_err().status,
            axum::http::StatusCode::BAD_REQUEST
        );
    }
}
