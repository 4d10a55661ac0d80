use crate::models::{
    ApprovalState, Category, ContentBody, ContentItem, ContentKind, Principal, Reporter,
    Submitter,
};
use crate::utils::reporter_code::validate_reporter_code;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients
// They are separate from database models to control exactly what data is exposed

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Reader registration
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Valid email is required")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Reporter registration
///
/// `placeName` is informational; when omitted the code's place prefix is used.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReporterDto {
    #[validate(custom(function = "validate_reporter_code"))]
    #[serde(rename = "reporterId")]
    pub reporter_code: String,

    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Valid email is required")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    pub place_name: Option<String>,
}

/// Login for users and admins
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginEmailDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Valid email is required")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login for reporters; the code format is checked by the handler so a
/// malformed code gets its own message
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginReporterDto {
    #[validate(length(min = 1, message = "Reporter ID is required"))]
    #[serde(rename = "reporterId")]
    pub reporter_code: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Any principal as sent to clients (no password hash)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPrincipalDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "reporterId", skip_serializing_if = "Option::is_none")]
    pub reporter_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl FilterPrincipalDto {
    pub fn filter_principal(principal: &Principal) -> Self {
        let reporter = match principal {
            Principal::Reporter(r) => Some(r),
            _ => None,
        };

        FilterPrincipalDto {
            id: principal.id().to_string(),
            name: principal.display_name().to_owned(),
            email: principal.email().to_owned(),
            role: principal.kind().to_str().to_string(),
            reporter_code: reporter.map(|r| r.reporter_code.clone()),
            place_name: reporter.map(|r| r.place_name.clone()),
            is_active: reporter.map(|r| r.is_active),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrincipalData {
    pub user: FilterPrincipalDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrincipalResponseDto {
    pub status: String,
    pub data: PrincipalData,
}

/// Register / login success response; tokens are also set as cookies
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponseDto {
    pub status: String,
    pub message: String,
    pub access_token: String,
    pub data: PrincipalData,
}

/// Token refresh response
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponseDto {
    pub status: String,
    pub access_token: String,
}

/// Generic success response
#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

// ============================================================================
// Content DTOs
// ============================================================================

/// Public listing filters
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ContentQueryParams {
    pub category: Option<String>,

    #[validate(length(min = 1))]
    pub location: Option<String>,

    /// Reporter code of the submitter
    #[validate(length(min = 1))]
    pub reporter: Option<String>,

    #[validate(length(min = 1))]
    pub search: Option<String>,

    #[validate(range(min = 1))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i64>,
}

/// Plain-text preview of rich text for list views
pub fn excerpt(html: &str, max_chars: usize) -> String {
    let text = html2text::from_read(html.as_bytes(), 120).unwrap_or_default();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.chars().count() <= max_chars {
        return text;
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

pub const EXCERPT_CHARS: usize = 200;

/// Full content item
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDto {
    pub id: Uuid,
    pub kind: ContentKind,
    pub title: String,
    pub category: Category,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_score: Option<i32>,
    pub uploaded_by: Submitter,
    pub approval_status: ApprovalState,
    pub rejection_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ContentItem> for ContentDto {
    fn from(item: &ContentItem) -> Self {
        let (content, description, video_url, duration, trending_score) = match &item.body {
            ContentBody::Article { content } => (Some(content.clone()), None, None, None, None),
            ContentBody::Trending {
                content,
                trending_score,
            } => (Some(content.clone()), None, None, None, Some(*trending_score)),
            ContentBody::Video {
                description,
                video_url,
                duration,
            } => (
                None,
                Some(description.clone()),
                Some(video_url.clone()),
                duration.clone(),
                None,
            ),
        };

        ContentDto {
            id: item.id,
            kind: item.kind(),
            title: item.title.clone(),
            category: item.category,
            location: item.location.clone(),
            thumbnail_url: item.thumbnail_url.clone(),
            content,
            description,
            video_url,
            duration,
            trending_score,
            uploaded_by: item.submitter.clone(),
            approval_status: item.approval.state(),
            rejection_reason: item.approval.rejection_reason().to_string(),
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// List view of a content item: excerpt instead of the full body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummaryDto {
    pub id: Uuid,
    pub kind: ContentKind,
    pub title: String,
    pub category: Category,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_score: Option<i32>,
    pub excerpt: String,
    pub uploaded_by: Submitter,
    pub approval_status: ApprovalState,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rejection_reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ContentItem> for ContentSummaryDto {
    fn from(item: &ContentItem) -> Self {
        let (video_url, trending_score) = match &item.body {
            ContentBody::Video { video_url, .. } => (Some(video_url.clone()), None),
            ContentBody::Trending { trending_score, .. } => (None, Some(*trending_score)),
            ContentBody::Article { .. } => (None, None),
        };

        ContentSummaryDto {
            id: item.id,
            kind: item.kind(),
            title: item.title.clone(),
            category: item.category,
            location: item.location.clone(),
            thumbnail_url: item.thumbnail_url.clone(),
            video_url,
            trending_score,
            excerpt: excerpt(item.body.text(), EXCERPT_CHARS),
            uploaded_by: item.submitter.clone(),
            approval_status: item.approval.state(),
            rejection_reason: item.approval.rejection_reason().to_string(),
            created_at: item.created_at,
        }
    }
}

impl ContentSummaryDto {
    pub fn summarize(items: &[ContentItem]) -> Vec<ContentSummaryDto> {
        items.iter().map(ContentSummaryDto::from).collect()
    }
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationDto {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl PaginationDto {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        PaginationDto {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContentListResponseDto {
    pub status: String,
    pub data: Vec<ContentSummaryDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct ContentResponseDto {
    pub status: String,
    pub message: String,
    pub data: ContentDto,
}

// ============================================================================
// Admin DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RejectDto {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterDto {
    pub id: Uuid,
    #[serde(rename = "reporterId")]
    pub reporter_code: String,
    pub name: String,
    pub email: String,
    pub place_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ReporterDto {
    pub fn filter_reporter(reporter: &Reporter) -> Self {
        ReporterDto {
            id: reporter.id,
            reporter_code: reporter.reporter_code.clone(),
            name: reporter.name.clone(),
            email: reporter.email.clone(),
            place_name: reporter.place_name.clone(),
            is_active: reporter.is_active,
            created_at: reporter.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReporterListResponseDto {
    pub status: String,
    pub data: Vec<ReporterDto>,
    pub results: usize,
}

#[derive(Debug, Serialize)]
pub struct ReporterResponseDto {
    pub status: String,
    pub message: String,
    pub data: ReporterDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingData {
    pub news: Vec<ContentSummaryDto>,
    pub trending: Vec<ContentSummaryDto>,
    pub videos: Vec<ContentSummaryDto>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PendingResponseDto {
    pub status: String,
    pub data: PendingData,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ActivityLogQueryDto {
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

/// Per-state counts of one content kind
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct KindStatsDto {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ReporterStatsDto {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub news: KindStatsDto,
    pub trending: KindStatsDto,
    pub videos: KindStatsDto,
    pub reporters: ReporterStatsDto,
    pub pending_approvals: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponseDto {
    pub status: String,
    pub data: StatsDto,
}

// ============================================================================
// Media DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponseDto {
    pub status: String,
    pub url: String,
}
