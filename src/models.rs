use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// The three disjoint principal kinds
///
/// Stored as the PostgreSQL ENUM "principal_kind" (lowercase labels);
/// serialized to clients as "User" / "Reporter" / "Admin".
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "principal_kind", rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Reporter,
    Admin,
}

impl PrincipalKind {
    pub fn to_str(&self) -> &str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Reporter => "reporter",
            PrincipalKind::Admin => "admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PrincipalKind::User => "User",
            PrincipalKind::Reporter => "Reporter",
            PrincipalKind::Admin => "Admin",
        }
    }
}

/// Public reader account
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field reporter, identified by a place-coded reporter code (e.g. "HydPN101")
///
/// `place_name` is informational and need not match the code's prefix.
/// A deactivated reporter keeps its published content but can neither
/// authenticate nor submit.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Reporter {
    pub id: Uuid,
    pub reporter_code: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub place_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// An authenticated principal of any kind
#[derive(Debug, Clone)]
pub enum Principal {
    User(User),
    Reporter(Reporter),
    Admin(Admin),
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::User(_) => PrincipalKind::User,
            Principal::Reporter(_) => PrincipalKind::Reporter,
            Principal::Admin(_) => PrincipalKind::Admin,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Principal::User(u) => u.id,
            Principal::Reporter(r) => r.id,
            Principal::Admin(a) => a.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Principal::User(u) => &u.name,
            Principal::Reporter(r) => &r.name,
            Principal::Admin(a) => &a.name,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Principal::User(u) => &u.email,
            Principal::Reporter(r) => &r.email,
            Principal::Admin(a) => &a.email,
        }
    }

    pub fn reporter_code(&self) -> Option<&str> {
        match self {
            Principal::Reporter(r) => Some(&r.reporter_code),
            _ => None,
        }
    }

    /// Users and admins are always usable once created
    pub fn is_active(&self) -> bool {
        match self {
            Principal::Reporter(r) => r.is_active,
            _ => true,
        }
    }

    pub fn password_hash(&self) -> &str {
        match self {
            Principal::User(u) => &u.password,
            Principal::Reporter(r) => &r.password,
            Principal::Admin(a) => &a.password,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "news_category", rename_all = "lowercase")]
pub enum Category {
    Politics,
    Sports,
    Technology,
    Entertainment,
    Business,
    Health,
    Education,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Politics,
        Category::Sports,
        Category::Technology,
        Category::Entertainment,
        Category::Business,
        Category::Health,
        Category::Education,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "Politics",
            Category::Sports => "Sports",
            Category::Technology => "Technology",
            Category::Entertainment => "Entertainment",
            Category::Business => "Business",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Invalid category: {}", s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "approval_state", rename_all = "lowercase")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

/// Moderation status of a content item
///
/// The rejection reason only exists inside `Rejected`, so any transition
/// away from it drops the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
    Pending,
    Approved,
    Rejected { reason: String },
}

impl Approval {
    pub fn state(&self) -> ApprovalState {
        match self {
            Approval::Pending => ApprovalState::Pending,
            Approval::Approved => ApprovalState::Approved,
            Approval::Rejected { .. } => ApprovalState::Rejected,
        }
    }

    /// Empty unless rejected
    pub fn rejection_reason(&self) -> &str {
        match self {
            Approval::Rejected { reason } => reason,
            _ => "",
        }
    }

    pub fn from_parts(state: ApprovalState, reason: String) -> Self {
        match state {
            ApprovalState::Pending => Approval::Pending,
            ApprovalState::Approved => Approval::Approved,
            ApprovalState::Rejected => Approval::Rejected { reason },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "content_kind", rename_all = "lowercase")]
pub enum ContentKind {
    Article,
    Trending,
    Video,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Article, ContentKind::Trending, ContentKind::Video];

    /// Name used in audit action tags ("News Approved", "Trending News Created", ...)
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Article => "News",
            ContentKind::Trending => "Trending News",
            ContentKind::Video => "Video",
        }
    }

    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            ContentKind::Article => ResourceKind::News,
            ContentKind::Trending => ResourceKind::TrendingNews,
            ContentKind::Video => ResourceKind::Video,
        }
    }

    /// Path segment used by the admin moderation routes
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "news" => Some(ContentKind::Article),
            "trending" => Some(ContentKind::Trending),
            "video" | "videos" => Some(ContentKind::Video),
            _ => None,
        }
    }

    pub fn not_found_message(&self) -> String {
        format!("{} not found", self.label())
    }
}

/// Kind-specific part of a content item
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBody {
    Article {
        content: String,
    },
    Trending {
        content: String,
        trending_score: i32,
    },
    Video {
        description: String,
        video_url: String,
        duration: Option<String>,
    },
}

impl ContentBody {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentBody::Article { .. } => ContentKind::Article,
            ContentBody::Trending { .. } => ContentKind::Trending,
            ContentBody::Video { .. } => ContentKind::Video,
        }
    }

    /// Rich-text content for articles and trending items, description for videos
    pub fn text(&self) -> &str {
        match self {
            ContentBody::Article { content } | ContentBody::Trending { content, .. } => content,
            ContentBody::Video { description, .. } => description,
        }
    }
}

/// Who submitted a content item, captured at submission time
///
/// Only admins and reporters can submit; the reporter code is present
/// exactly when the submitter is a reporter, and it is kept even if the
/// reporter is later deactivated or renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "userType")]
pub enum Submitter {
    Admin {
        #[serde(rename = "userId")]
        id: Uuid,
        name: String,
    },
    Reporter {
        #[serde(rename = "userId")]
        id: Uuid,
        name: String,
        #[serde(rename = "reporterId")]
        reporter_code: String,
    },
}

impl Submitter {
    pub fn id(&self) -> Uuid {
        match self {
            Submitter::Admin { id, .. } | Submitter::Reporter { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> PrincipalKind {
        match self {
            Submitter::Admin { .. } => PrincipalKind::Admin,
            Submitter::Reporter { .. } => PrincipalKind::Reporter,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Submitter::Admin { name, .. } | Submitter::Reporter { name, .. } => name,
        }
    }

    pub fn reporter_code(&self) -> Option<&str> {
        match self {
            Submitter::Reporter { reporter_code, .. } => Some(reporter_code),
            Submitter::Admin { .. } => None,
        }
    }

    /// None for plain users, who cannot own content
    pub fn from_principal(principal: &Principal) -> Option<Self> {
        match principal {
            Principal::Admin(a) => Some(Submitter::Admin {
                id: a.id,
                name: a.name.clone(),
            }),
            Principal::Reporter(r) => Some(Submitter::Reporter {
                id: r.id,
                name: r.name.clone(),
                reporter_code: r.reporter_code.clone(),
            }),
            Principal::User(_) => None,
        }
    }
}

/// Article, trending item or video, with its moderation status
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: Uuid,
    pub title: String,
    pub category: Category,
    pub location: String,
    pub thumbnail_url: Option<String>,
    pub body: ContentBody,
    pub submitter: Submitter,
    pub approval: Approval,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn kind(&self) -> ContentKind {
        self.body.kind()
    }

    pub fn owner_id(&self) -> Uuid {
        self.submitter.id()
    }
}

/// Resource types an audit entry can point at
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    News,
    TrendingNews,
    Video,
    Reporter,
    User,
    Admin,
}

/// Copy of the acting principal at the time of the action
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActorSnapshot {
    pub user_type: PrincipalKind,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(rename = "reporterId", skip_serializing_if = "Option::is_none")]
    pub reporter_code: Option<String>,
}

impl ActorSnapshot {
    pub fn of(principal: &Principal) -> Self {
        ActorSnapshot {
            user_type: principal.kind(),
            user_id: principal.id(),
            name: principal.display_name().to_string(),
            email: principal.email().to_string(),
            reporter_code: principal.reporter_code().map(str::to_string),
        }
    }
}

/// Copy of the affected resource at the time of the action
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    pub resource_type: ResourceKind,
    pub resource_id: Uuid,
    pub resource_title: String,
}

impl ResourceSnapshot {
    pub fn of_content(item: &ContentItem) -> Self {
        ResourceSnapshot {
            resource_type: item.kind().resource_kind(),
            resource_id: item.id,
            resource_title: item.title.clone(),
        }
    }

    pub fn of_reporter(reporter: &Reporter) -> Self {
        ResourceSnapshot {
            resource_type: ResourceKind::Reporter,
            resource_id: reporter.id,
            resource_title: reporter.name.clone(),
        }
    }
}

/// One immutable record in the audit log
///
/// `created_at` is stamped when the causing operation is accepted and
/// defines log order; ties are broken by insertion order in the store.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: String,
    pub performed_by: ActorSnapshot,
    pub target_resource: Option<ResourceSnapshot>,
    pub details: String,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: impl Into<String>,
        performed_by: ActorSnapshot,
        target_resource: Option<ResourceSnapshot>,
        details: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        AuditEntry {
            id: Uuid::new_v4(),
            action: action.into(),
            performed_by,
            target_resource,
            details: details.into(),
            ip_address: ip_address.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_only_known_names() {
        assert_eq!("Sports".parse::<Category>(), Ok(Category::Sports));
        assert_eq!("Other".parse::<Category>(), Ok(Category::Other));
        assert!("Weather".parse::<Category>().is_err());
        assert!("".parse::<Category>().is_err());
    }

    #[test]
    fn rejection_reason_only_exists_while_rejected() {
        let rejected = Approval::from_parts(ApprovalState::Rejected, "too short".into());
        assert_eq!(rejected.rejection_reason(), "too short");

        let approved = Approval::from_parts(ApprovalState::Approved, "stale".into());
        assert_eq!(approved, Approval::Approved);
        assert_eq!(approved.rejection_reason(), "");
    }

    #[test]
    fn submitter_serializes_with_user_type_tag() {
        let id = Uuid::new_v4();
        let submitter = Submitter::Reporter {
            id,
            name: "Ravi".into(),
            reporter_code: "HydPN101".into(),
        };
        let json = serde_json::to_value(&submitter).unwrap();
        assert_eq!(json["userType"], "Reporter");
        assert_eq!(json["reporterId"], "HydPN101");
        assert_eq!(json["userId"], id.to_string());

        let admin = Submitter::Admin {
            id,
            name: "Administrator".into(),
        };
        let json = serde_json::to_value(&admin).unwrap();
        assert_eq!(json["userType"], "Admin");
        assert!(json.get("reporterId").is_none());
    }

    #[test]
    fn kind_segments_resolve() {
        assert_eq!(ContentKind::from_segment("news"), Some(ContentKind::Article));
        assert_eq!(ContentKind::from_segment("trending"), Some(ContentKind::Trending));
        assert_eq!(ContentKind::from_segment("video"), Some(ContentKind::Video));
        assert_eq!(ContentKind::from_segment("podcast"), None);
    }
}
