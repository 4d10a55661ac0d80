//! Submission and edit payloads, and the rules that turn them into content

use serde::Deserialize;

use crate::error::WorkflowError;
use crate::models::{Category, ContentBody, ContentItem, ContentKind};

/// Fields of a new content item, as received from the client
///
/// Which body fields matter depends on the kind being submitted: `content`
/// for articles and trending items, `description`/`videoUrl`/`duration`
/// for videos. The rest are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentDraft {
    pub title: String,
    pub category: String,
    pub location: String,
    pub thumbnail_url: Option<String>,
    pub content: String,
    pub description: String,
    pub video_url: Option<String>,
    pub duration: Option<String>,
    pub trending_score: Option<i32>,
}

/// Validated envelope fields plus body of a draft
pub(super) struct ValidDraft {
    pub title: String,
    pub category: Category,
    pub location: String,
    pub thumbnail_url: Option<String>,
    pub body: ContentBody,
}

/// Partial update; absent and empty fields leave the item untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub thumbnail_url: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration: Option<String>,
    pub trending_score: Option<i32>,
}

fn required(value: &str, field: &str) -> Result<String, WorkflowError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WorkflowError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn parse_category(value: &str) -> Result<Category, WorkflowError> {
    value.trim().parse().map_err(WorkflowError::Validation)
}

/// Strip everything but safe markup from rich text
fn sanitize(html: &str) -> String {
    ammonia::clean(html).trim().to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ContentDraft {
    /// `may_score` is whether the submitter is allowed to set a trending score
    pub(super) fn validate(
        self,
        kind: ContentKind,
        may_score: bool,
    ) -> Result<ValidDraft, WorkflowError> {
        let title = required(&self.title, "Title")?;
        required(&self.category, "Category")?;
        let category = parse_category(&self.category)?;
        let location = required(&self.location, "Location")?;

        let body = match kind {
            ContentKind::Article => ContentBody::Article {
                content: required(&sanitize(&self.content), "Content")?,
            },
            ContentKind::Trending => ContentBody::Trending {
                content: required(&sanitize(&self.content), "Content")?,
                trending_score: if may_score {
                    self.trending_score.unwrap_or(0)
                } else {
                    0
                },
            },
            ContentKind::Video => {
                let description = required(&self.description, "Description")?;
                let video_url = non_empty(&self.video_url)
                    .ok_or(WorkflowError::MediaRequired)?
                    .to_string();
                ContentBody::Video {
                    description,
                    video_url,
                    duration: non_empty(&self.duration).map(str::to_string),
                }
            }
        };

        Ok(ValidDraft {
            title,
            category,
            location,
            thumbnail_url: non_empty(&self.thumbnail_url).map(str::to_string),
            body,
        })
    }
}

impl ContentPatch {
    /// Apply to `item` in place, returning whether anything changed
    ///
    /// On error `item` may be partially modified; callers apply to a copy.
    pub(super) fn apply(&self, item: &mut ContentItem, may_score: bool) -> Result<bool, WorkflowError> {
        let before = item.clone();

        if let Some(title) = non_empty(&self.title) {
            item.title = title.to_string();
        }
        if let Some(category) = non_empty(&self.category) {
            item.category = parse_category(category)?;
        }
        if let Some(location) = non_empty(&self.location) {
            item.location = location.to_string();
        }
        if let Some(thumbnail) = non_empty(&self.thumbnail_url) {
            item.thumbnail_url = Some(thumbnail.to_string());
        }

        match &mut item.body {
            ContentBody::Article { content } => {
                if let Some(new) = non_empty(&self.content) {
                    *content = required(&sanitize(new), "Content")?;
                }
            }
            ContentBody::Trending {
                content,
                trending_score,
            } => {
                if let Some(new) = non_empty(&self.content) {
                    *content = required(&sanitize(new), "Content")?;
                }
                if let (true, Some(score)) = (may_score, self.trending_score) {
                    *trending_score = score;
                }
            }
            ContentBody::Video {
                description,
                video_url,
                duration,
            } => {
                if let Some(new) = non_empty(&self.description) {
                    *description = new.to_string();
                }
                if let Some(new) = non_empty(&self.video_url) {
                    *video_url = new.to_string();
                }
                if let Some(new) = non_empty(&self.duration) {
                    *duration = Some(new.to_string());
                }
            }
        }

        Ok(*item != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Approval, Submitter};
    use chrono::Utc;
    use uuid::Uuid;

    fn article_draft() -> ContentDraft {
        ContentDraft {
            title: "  Monsoon arrives  ".into(),
            category: "Health".into(),
            location: "Hyderabad".into(),
            content: "<p>Rain</p>".into(),
            ..Default::default()
        }
    }

    fn item(body: ContentBody) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            title: "Old".into(),
            category: Category::Other,
            location: "Vizag".into(),
            thumbnail_url: None,
            body,
            submitter: Submitter::Admin {
                id: Uuid::new_v4(),
                name: "Administrator".into(),
            },
            approval: Approval::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn draft_trims_and_parses() {
        let valid = article_draft().validate(ContentKind::Article, false).unwrap();
        assert_eq!(valid.title, "Monsoon arrives");
        assert_eq!(valid.category, Category::Health);
        assert_eq!(valid.body, ContentBody::Article { content: "<p>Rain</p>".into() });
        assert_eq!(valid.thumbnail_url, None);
    }

    #[test]
    fn draft_missing_envelope_fields_fail_validation() {
        for draft in [
            ContentDraft { title: " ".into(), ..article_draft() },
            ContentDraft { category: "".into(), ..article_draft() },
            ContentDraft { category: "Weather".into(), ..article_draft() },
            ContentDraft { location: "".into(), ..article_draft() },
            ContentDraft { content: "".into(), ..article_draft() },
        ] {
            assert!(matches!(
                draft.validate(ContentKind::Article, true),
                Err(WorkflowError::Validation(_))
            ));
        }
    }

    #[test]
    fn script_only_content_is_empty_after_sanitizing() {
        let draft = ContentDraft {
            content: "<script>alert(1)</script>".into(),
            ..article_draft()
        };
        assert!(matches!(
            draft.validate(ContentKind::Article, true),
            Err(WorkflowError::Validation(_))
        ));

        let draft = ContentDraft {
            content: "<p>Hello</p><script>alert(1)</script>".into(),
            ..article_draft()
        };
        let valid = draft.validate(ContentKind::Article, true).unwrap();
        assert_eq!(valid.body.text(), "<p>Hello</p>");
    }

    #[test]
    fn video_without_reference_needs_media() {
        let draft = ContentDraft {
            description: "Flood footage".into(),
            video_url: Some("  ".into()),
            ..article_draft()
        };
        assert!(matches!(
            draft.validate(ContentKind::Video, false),
            Err(WorkflowError::MediaRequired)
        ));

        // Missing text fields are reported before the missing media
        let draft = ContentDraft {
            description: "".into(),
            ..article_draft()
        };
        assert!(matches!(
            draft.validate(ContentKind::Video, false),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn trending_score_only_when_allowed() {
        let draft = ContentDraft {
            trending_score: Some(42),
            ..article_draft()
        };
        let scored = draft.clone().validate(ContentKind::Trending, true).unwrap();
        let unscored = draft.validate(ContentKind::Trending, false).unwrap();
        assert!(matches!(scored.body, ContentBody::Trending { trending_score: 42, .. }));
        assert!(matches!(unscored.body, ContentBody::Trending { trending_score: 0, .. }));
    }

    #[test]
    fn patch_ignores_empty_fields() {
        let mut target = item(ContentBody::Article { content: "<p>Old</p>".into() });
        let patch = ContentPatch {
            title: Some("".into()),
            location: Some("Warangal".into()),
            description: Some("not an article field".into()),
            ..Default::default()
        };

        assert!(patch.apply(&mut target, false).unwrap());
        assert_eq!(target.title, "Old");
        assert_eq!(target.location, "Warangal");
        assert_eq!(target.body.text(), "<p>Old</p>");
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut target = item(ContentBody::Trending {
            content: "<p>Old</p>".into(),
            trending_score: 3,
        });
        let patch = ContentPatch {
            trending_score: Some(99),
            ..Default::default()
        };
        assert!(!patch.apply(&mut target, false).unwrap());
        assert!(patch.apply(&mut target, true).unwrap());
        assert!(matches!(target.body, ContentBody::Trending { trending_score: 99, .. }));
    }

    #[test]
    fn patch_rejects_unknown_category() {
        let mut target = item(ContentBody::Article { content: "x".into() });
        let patch = ContentPatch {
            category: Some("Weather".into()),
            ..Default::default()
        };
        assert!(matches!(
            patch.apply(&mut target, true),
            Err(WorkflowError::Validation(_))
        ));
    }
}
