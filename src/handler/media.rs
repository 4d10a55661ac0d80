use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::{Extension, Router, middleware};
use tracing::instrument;

use crate::AppState;
use crate::dtos::UploadResponseDto;
use crate::error::{ErrorMessage, HttpError};
use crate::media::{MediaError, Upload};
use crate::middleware::{AuthPrincipal, auth, role_check};
use crate::models::PrincipalKind;

pub fn media_handler(app_state: AppState) -> Router<AppState> {
    Router::new().route(
        "/",
        post(upload_media)
            .route_layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![PrincipalKind::Admin, PrincipalKind::Reporter])
            }))
            .route_layer(middleware::from_fn_with_state(app_state, auth)),
    )
}

/// Pull the `file` part out of a multipart body
async fn read_upload(mut multipart: Multipart) -> Result<Upload, HttpError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| HttpError::bad_request(e.body_text()))?;

        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(HttpError::bad_request("No file uploaded"))
}

#[instrument(skip(session, app_state, multipart), fields(principal_id = %session.principal.id()))]
pub async fn upload_media(
    Extension(session): Extension<AuthPrincipal>,
    State(app_state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let upload = read_upload(multipart).await?;
    let size = upload.bytes.len();

    let url = app_state.media.resolve(upload).await.map_err(|e| match e {
        MediaError::UnsupportedType(_) => HttpError::bad_request(e.to_string()),
        other => {
            tracing::error!("Media upload failed: {}", other);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        }
    })?;

    tracing::info!(size, url = %url, "Media uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponseDto {
            status: "success".to_string(),
            url,
        }),
    ))
}
