//! Moderation workflow
//!
//! The only place that changes a content item's approval state. Each
//! successful operation writes the item first and then queues exactly one
//! audit entry; the audit write is best-effort and cannot fail the
//! operation.
//!
//! ```text
//! submit (admin)    -> Approved
//! submit (reporter) -> Pending
//! approve: any -> Approved        reject: any -> Rejected{reason}
//! edit (owner reporter): Rejected -> Pending, Approved -> error
//! edit (admin): state unchanged
//! ```

mod draft;

pub use draft::{ContentDraft, ContentPatch};

use chrono::Utc;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::db::ContentExt;
use crate::error::WorkflowError;
use crate::models::{
    ActorSnapshot, Approval, ApprovalState, AuditEntry, ContentItem, ContentKind, Principal,
    PrincipalKind, ResourceSnapshot, Submitter,
};
use crate::policy::{self, Action, Actor, ResourceContext};

pub const DEFAULT_REJECTION_REASON: &str = "Content does not meet guidelines";

#[derive(Debug, Clone)]
pub struct ModerationWorkflow<S> {
    store: S,
    audit: AuditLog,
}

/// Store errors where a row vanished between read and write become 404s
fn vanished(kind: ContentKind) -> impl Fn(sqlx::Error) -> WorkflowError {
    move |e| match e {
        sqlx::Error::RowNotFound => WorkflowError::NotFound(kind.not_found_message()),
        other => WorkflowError::Store(other),
    }
}

impl<S: ContentExt> ModerationWorkflow<S> {
    pub fn new(store: S, audit: AuditLog) -> Self {
        ModerationWorkflow { store, audit }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    async fn load(&self, kind: ContentKind, id: Uuid) -> Result<ContentItem, WorkflowError> {
        self.store
            .get_content(kind, id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(kind.not_found_message()))
    }

    fn record(
        &self,
        action: String,
        actor: &Principal,
        item: &ContentItem,
        details: String,
        origin: &str,
    ) {
        self.audit.record(AuditEntry::new(
            action,
            ActorSnapshot::of(actor),
            Some(ResourceSnapshot::of_content(item)),
            details,
            origin,
        ));
    }

    /// Create a new item; admins publish directly, reporters go to review
    pub async fn submit(
        &self,
        kind: ContentKind,
        draft: ContentDraft,
        actor: &Principal,
        origin: &str,
    ) -> Result<ContentItem, WorkflowError> {
        policy::authorize(Some(&Actor::from(actor)), Action::Submit, &ResourceContext::default())?;
        let submitter = Submitter::from_principal(actor).ok_or_else(|| {
            WorkflowError::Authorization("Access denied. Insufficient permissions.".into())
        })?;

        let is_admin = actor.kind() == PrincipalKind::Admin;
        let valid = draft.validate(kind, is_admin)?;
        let now = Utc::now();

        let item = ContentItem {
            id: Uuid::new_v4(),
            title: valid.title,
            category: valid.category,
            location: valid.location,
            thumbnail_url: valid.thumbnail_url,
            body: valid.body,
            submitter,
            approval: if is_admin {
                Approval::Approved
            } else {
                Approval::Pending
            },
            created_at: now,
            updated_at: now,
        };

        self.store.insert_content(&item).await?;

        tracing::info!(
            content_id = %item.id,
            kind = kind.label(),
            state = ?item.approval.state(),
            "Content submitted"
        );
        self.record(
            format!("{} Created", kind.label()),
            actor,
            &item,
            format!(
                "{} created {}: {}",
                actor.kind().label(),
                kind.label().to_lowercase(),
                item.title
            ),
            origin,
        );

        Ok(item)
    }

    /// Publish an item. Idempotent, but every call is audited.
    pub async fn approve(
        &self,
        kind: ContentKind,
        id: Uuid,
        actor: &Principal,
        origin: &str,
    ) -> Result<ContentItem, WorkflowError> {
        policy::authorize(Some(&Actor::from(actor)), Action::Moderate, &ResourceContext::default())?;

        let mut item = self.load(kind, id).await?;
        item.approval = Approval::Approved;
        item.updated_at = Utc::now();
        self.store.update_content(&item).await.map_err(vanished(kind))?;

        self.record(
            format!("{} Approved", kind.label()),
            actor,
            &item,
            format!("Admin approved {}: {}", kind.label().to_lowercase(), item.title),
            origin,
        );

        Ok(item)
    }

    /// Turn an item down; a blank reason becomes the default one
    pub async fn reject(
        &self,
        kind: ContentKind,
        id: Uuid,
        actor: &Principal,
        reason: &str,
        origin: &str,
    ) -> Result<ContentItem, WorkflowError> {
        policy::authorize(Some(&Actor::from(actor)), Action::Moderate, &ResourceContext::default())?;

        let reason = match reason.trim() {
            "" => DEFAULT_REJECTION_REASON.to_string(),
            given => given.to_string(),
        };

        let mut item = self.load(kind, id).await?;
        item.approval = Approval::Rejected {
            reason: reason.clone(),
        };
        item.updated_at = Utc::now();
        self.store.update_content(&item).await.map_err(vanished(kind))?;

        self.record(
            format!("{} Rejected", kind.label()),
            actor,
            &item,
            format!(
                "Admin rejected {}: {}. Reason: {}",
                kind.label().to_lowercase(),
                item.title,
                reason
            ),
            origin,
        );

        Ok(item)
    }

    /// Apply a patch
    ///
    /// Owners may not touch approved items, and an owner's edit sends a
    /// rejected item back to review. Admin edits never change the state,
    /// not even the reason of a rejected item. A patch that changes
    /// nothing is not written and not audited.
    pub async fn edit(
        &self,
        kind: ContentKind,
        id: Uuid,
        actor: &Principal,
        patch: &ContentPatch,
        origin: &str,
    ) -> Result<ContentItem, WorkflowError> {
        let current = self.load(kind, id).await?;
        policy::authorize(
            Some(&Actor::from(actor)),
            Action::Edit,
            &ResourceContext::owned_by(current.owner_id(), current.approval.state()),
        )?;

        let is_admin = actor.kind() == PrincipalKind::Admin;
        if !is_admin && current.approval.state() == ApprovalState::Approved {
            return Err(WorkflowError::ImmutableState);
        }

        let mut item = current.clone();
        let mut changed = patch.apply(&mut item, is_admin)?;
        if !is_admin && item.approval.state() == ApprovalState::Rejected {
            item.approval = Approval::Pending;
            changed = true;
        }
        if !changed {
            return Ok(current);
        }

        item.updated_at = Utc::now();
        self.store.update_content(&item).await.map_err(vanished(kind))?;

        self.record(
            format!("{} Updated", kind.label()),
            actor,
            &item,
            format!("{} updated: {}", kind.label(), item.title),
            origin,
        );

        Ok(item)
    }

    /// Hard delete; the audit entry describes the item as it was
    pub async fn delete(
        &self,
        kind: ContentKind,
        id: Uuid,
        actor: &Principal,
        origin: &str,
    ) -> Result<(), WorkflowError> {
        let item = self.load(kind, id).await?;
        policy::authorize(
            Some(&Actor::from(actor)),
            Action::Delete,
            &ResourceContext::owned_by(item.owner_id(), item.approval.state()),
        )?;

        self.store.delete_content(kind, id).await.map_err(vanished(kind))?;

        tracing::info!(content_id = %id, kind = kind.label(), "Content deleted");
        self.record(
            format!("{} Deleted", kind.label()),
            actor,
            &item,
            format!("{} deleted: {}", kind.label(), item.title),
            origin,
        );

        Ok(())
    }

    /// An item as the public sees it; anything not viewable is "not found"
    pub async fn view(
        &self,
        kind: ContentKind,
        id: Uuid,
        actor: Option<&Principal>,
    ) -> Result<ContentItem, WorkflowError> {
        let item = self.load(kind, id).await?;
        let actor = actor.map(Actor::from);
        let context = ResourceContext::owned_by(item.owner_id(), item.approval.state());

        if !policy::can_perform(actor.as_ref(), Action::ViewPublic, &context) {
            return Err(WorkflowError::NotFound(kind.not_found_message()));
        }

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::{Admin, Reporter, User};
    use chrono::Utc;

    const ORIGIN: &str = "10.0.0.1";

    fn admin() -> Principal {
        Principal::Admin(Admin {
            id: Uuid::new_v4(),
            name: "Administrator".into(),
            email: "admin@example.com".into(),
            password: "hash".into(),
            created_at: Utc::now(),
        })
    }

    fn reporter(code: &str) -> Principal {
        Principal::Reporter(Reporter {
            id: Uuid::new_v4(),
            reporter_code: code.into(),
            name: format!("Reporter {}", code),
            email: format!("{}@example.com", code.to_lowercase()),
            password: "hash".into(),
            place_name: "Hyderabad".into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    fn user() -> Principal {
        Principal::User(User {
            id: Uuid::new_v4(),
            name: "Reader".into(),
            email: "reader@example.com".into(),
            password: "hash".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    fn draft(kind: ContentKind) -> ContentDraft {
        ContentDraft {
            title: "X".into(),
            category: "Sports".into(),
            location: "Hyd".into(),
            content: "<p>Match report</p>".into(),
            description: "Highlights".into(),
            video_url: (kind == ContentKind::Video).then(|| "/uploads/clip.mp4".to_string()),
            ..Default::default()
        }
    }

    fn workflow() -> (ModerationWorkflow<MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        let (audit, _writer) = AuditLog::spawn(store.clone());
        (ModerationWorkflow::new(store.clone(), audit), store)
    }

    async fn audited(workflow: &ModerationWorkflow<MemoryStore>, store: &MemoryStore) -> Vec<AuditEntry> {
        workflow.audit().flush().await;
        store.attempted_audit_entries()
    }

    #[tokio::test]
    async fn submit_state_depends_on_submitter_kind() {
        let (workflow, _) = workflow();
        let reporter = reporter("HydPN101");
        let admin = admin();

        for kind in ContentKind::ALL {
            let pending = workflow.submit(kind, draft(kind), &reporter, ORIGIN).await.unwrap();
            assert_eq!(pending.approval, Approval::Pending);
            assert_eq!(pending.kind(), kind);
            assert_eq!(pending.submitter.reporter_code(), Some("HydPN101"));

            let published = workflow.submit(kind, draft(kind), &admin, ORIGIN).await.unwrap();
            assert_eq!(published.approval, Approval::Approved);
            assert_eq!(published.submitter.reporter_code(), None);
        }
    }

    #[tokio::test]
    async fn submit_rejects_users_and_inactive_reporters() {
        let (workflow, store) = workflow();

        let err = workflow
            .submit(ContentKind::Article, draft(ContentKind::Article), &user(), ORIGIN)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Authorization(_)));

        let mut inactive = reporter("HydPN102");
        if let Principal::Reporter(r) = &mut inactive {
            r.is_active = false;
        }
        let err = workflow
            .submit(ContentKind::Article, draft(ContentKind::Article), &inactive, ORIGIN)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Authorization(_)));

        assert_eq!(store.content_len(), 0);
        assert!(audited(&workflow, &store).await.is_empty());
    }

    #[tokio::test]
    async fn submit_validation_failures_store_nothing() {
        let (workflow, store) = workflow();
        let reporter = reporter("HydPN101");

        let no_title = ContentDraft {
            title: "".into(),
            ..draft(ContentKind::Article)
        };
        assert!(matches!(
            workflow.submit(ContentKind::Article, no_title, &reporter, ORIGIN).await,
            Err(WorkflowError::Validation(_))
        ));

        let no_video = ContentDraft {
            video_url: None,
            ..draft(ContentKind::Video)
        };
        assert!(matches!(
            workflow.submit(ContentKind::Video, no_video, &reporter, ORIGIN).await,
            Err(WorkflowError::MediaRequired)
        ));

        assert_eq!(store.content_len(), 0);
        assert!(audited(&workflow, &store).await.is_empty());
    }

    #[tokio::test]
    async fn approve_is_idempotent_and_audited_each_time() {
        let (workflow, store) = workflow();
        let admin = admin();
        let item = workflow
            .submit(ContentKind::Trending, draft(ContentKind::Trending), &reporter("HydPN101"), ORIGIN)
            .await
            .unwrap();

        let first = workflow.approve(ContentKind::Trending, item.id, &admin, ORIGIN).await.unwrap();
        let second = workflow.approve(ContentKind::Trending, item.id, &admin, ORIGIN).await.unwrap();
        assert_eq!(first.approval, Approval::Approved);
        assert_eq!(second.approval, Approval::Approved);
        assert_eq!(second.approval.rejection_reason(), "");

        let actions: Vec<String> = audited(&workflow, &store).await.into_iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            ["Trending News Created", "Trending News Approved", "Trending News Approved"]
        );
    }

    #[tokio::test]
    async fn approve_clears_a_rejection() {
        let (workflow, _) = workflow();
        let admin = admin();
        let item = workflow
            .submit(ContentKind::Article, draft(ContentKind::Article), &reporter("HydPN101"), ORIGIN)
            .await
            .unwrap();

        workflow
            .reject(ContentKind::Article, item.id, &admin, "blurry photos", ORIGIN)
            .await
            .unwrap();
        let approved = workflow.approve(ContentKind::Article, item.id, &admin, ORIGIN).await.unwrap();
        assert_eq!(approved.approval, Approval::Approved);

        let stored = workflow.store().get_content(ContentKind::Article, item.id).await.unwrap().unwrap();
        assert_eq!(stored.approval.rejection_reason(), "");
    }

    #[tokio::test]
    async fn reject_uses_default_reason_when_blank() {
        let (workflow, store) = workflow();
        let admin = admin();
        let reporter = reporter("HydPN101");
        let a = workflow.submit(ContentKind::Article, draft(ContentKind::Article), &reporter, ORIGIN).await.unwrap();
        let b = workflow.submit(ContentKind::Article, draft(ContentKind::Article), &reporter, ORIGIN).await.unwrap();

        let a = workflow.reject(ContentKind::Article, a.id, &admin, "", ORIGIN).await.unwrap();
        let b = workflow.reject(ContentKind::Article, b.id, &admin, "too short", ORIGIN).await.unwrap();

        assert_eq!(a.approval.rejection_reason(), DEFAULT_REJECTION_REASON);
        assert_eq!(b.approval.rejection_reason(), "too short");

        let entries = audited(&workflow, &store).await;
        assert_eq!(entries.last().unwrap().details, "Admin rejected news: X. Reason: too short");
    }

    #[tokio::test]
    async fn moderation_requires_admin_and_existing_item() {
        let (workflow, _) = workflow();
        let reporter = reporter("HydPN101");
        let item = workflow.submit(ContentKind::Video, draft(ContentKind::Video), &reporter, ORIGIN).await.unwrap();

        assert!(matches!(
            workflow.approve(ContentKind::Video, item.id, &reporter, ORIGIN).await,
            Err(WorkflowError::Authorization(_))
        ));
        assert!(matches!(
            workflow.reject(ContentKind::Video, item.id, &user(), "", ORIGIN).await,
            Err(WorkflowError::Authorization(_))
        ));
        assert!(matches!(
            workflow.approve(ContentKind::Video, Uuid::new_v4(), &admin(), ORIGIN).await,
            Err(WorkflowError::NotFound(_))
        ));
        // Right id, wrong kind
        assert!(matches!(
            workflow.approve(ContentKind::Article, item.id, &admin(), ORIGIN).await,
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn owner_edit_of_rejected_item_goes_back_to_review() {
        let (workflow, _) = workflow();
        let reporter = reporter("HydPN101");
        let item = workflow.submit(ContentKind::Article, draft(ContentKind::Article), &reporter, ORIGIN).await.unwrap();
        workflow.reject(ContentKind::Article, item.id, &admin(), "needs sources", ORIGIN).await.unwrap();

        let patch = ContentPatch {
            content: Some("<p>Now with sources</p>".into()),
            ..Default::default()
        };
        let edited = workflow.edit(ContentKind::Article, item.id, &reporter, &patch, ORIGIN).await.unwrap();

        assert_eq!(edited.approval, Approval::Pending);
        assert_eq!(edited.approval.rejection_reason(), "");
        assert_eq!(edited.body.text(), "<p>Now with sources</p>");
    }

    #[tokio::test]
    async fn owner_cannot_edit_approved_item() {
        let (workflow, store) = workflow();
        let reporter = reporter("HydPN101");
        let item = workflow.submit(ContentKind::Article, draft(ContentKind::Article), &reporter, ORIGIN).await.unwrap();
        let approved = workflow.approve(ContentKind::Article, item.id, &admin(), ORIGIN).await.unwrap();

        let patch = ContentPatch {
            title: Some("Rewritten".into()),
            ..Default::default()
        };
        let err = workflow.edit(ContentKind::Article, item.id, &reporter, &patch, ORIGIN).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ImmutableState));

        let stored = store.get_content(ContentKind::Article, item.id).await.unwrap().unwrap();
        assert_eq!(stored, approved);
    }

    #[tokio::test]
    async fn reporters_cannot_touch_each_others_items() {
        let (workflow, store) = workflow();
        let owner = reporter("HydPN101");
        let other = reporter("VizagPN202");
        let admin = admin();
        let patch = ContentPatch {
            title: Some("Hijacked".into()),
            ..Default::default()
        };

        let pending = workflow.submit(ContentKind::Article, draft(ContentKind::Article), &owner, ORIGIN).await.unwrap();
        let approved = workflow.submit(ContentKind::Article, draft(ContentKind::Article), &owner, ORIGIN).await.unwrap();
        workflow.approve(ContentKind::Article, approved.id, &admin, ORIGIN).await.unwrap();
        let rejected = workflow.submit(ContentKind::Article, draft(ContentKind::Article), &owner, ORIGIN).await.unwrap();
        workflow.reject(ContentKind::Article, rejected.id, &admin, "", ORIGIN).await.unwrap();

        for id in [pending.id, approved.id, rejected.id] {
            assert!(matches!(
                workflow.edit(ContentKind::Article, id, &other, &patch, ORIGIN).await,
                Err(WorkflowError::Authorization(_))
            ));
            assert!(matches!(
                workflow.delete(ContentKind::Article, id, &other, ORIGIN).await,
                Err(WorkflowError::Authorization(_))
            ));
        }
        assert_eq!(store.content_len(), 3);
    }

    #[tokio::test]
    async fn admin_edit_keeps_state_and_reason() {
        let (workflow, _) = workflow();
        let admin = admin();
        let item = workflow
            .submit(ContentKind::Trending, draft(ContentKind::Trending), &reporter("HydPN101"), ORIGIN)
            .await
            .unwrap();
        workflow.reject(ContentKind::Trending, item.id, &admin, "off topic", ORIGIN).await.unwrap();

        let patch = ContentPatch {
            title: Some("Retitled".into()),
            trending_score: Some(7),
            ..Default::default()
        };
        let edited = workflow.edit(ContentKind::Trending, item.id, &admin, &patch, ORIGIN).await.unwrap();

        assert_eq!(edited.title, "Retitled");
        assert_eq!(edited.approval.rejection_reason(), "off topic");
        assert!(matches!(
            edited.body,
            crate::models::ContentBody::Trending { trending_score: 7, .. }
        ));
    }

    #[tokio::test]
    async fn noop_edit_is_not_audited() {
        let (workflow, store) = workflow();
        let reporter = reporter("HydPN101");
        let item = workflow.submit(ContentKind::Article, draft(ContentKind::Article), &reporter, ORIGIN).await.unwrap();

        let unchanged = workflow
            .edit(ContentKind::Article, item.id, &reporter, &ContentPatch::default(), ORIGIN)
            .await
            .unwrap();
        assert_eq!(unchanged, item);
        assert_eq!(audited(&workflow, &store).await.len(), 1);
    }

    #[tokio::test]
    async fn owner_may_delete_in_any_state() {
        let (workflow, store) = workflow();
        let owner = reporter("HydPN101");
        let item = workflow.submit(ContentKind::Video, draft(ContentKind::Video), &owner, ORIGIN).await.unwrap();
        workflow.approve(ContentKind::Video, item.id, &admin(), ORIGIN).await.unwrap();

        workflow.delete(ContentKind::Video, item.id, &owner, ORIGIN).await.unwrap();
        assert_eq!(store.content_len(), 0);

        let last = audited(&workflow, &store).await.pop().unwrap();
        assert_eq!(last.action, "Video Deleted");
        assert_eq!(last.target_resource.unwrap().resource_id, item.id);

        assert!(matches!(
            workflow.delete(ContentKind::Video, item.id, &owner, ORIGIN).await,
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn every_mutation_audits_once_even_when_audit_store_fails() {
        let (workflow, store) = workflow();
        store.fail_audit_writes(true);
        let admin = admin();
        let owner = reporter("HydPN101");

        let item = workflow.submit(ContentKind::Article, draft(ContentKind::Article), &owner, ORIGIN).await.unwrap();
        workflow.reject(ContentKind::Article, item.id, &admin, "", ORIGIN).await.unwrap();
        let patch = ContentPatch {
            title: Some("Fixed".into()),
            ..Default::default()
        };
        workflow.edit(ContentKind::Article, item.id, &owner, &patch, ORIGIN).await.unwrap();
        workflow.approve(ContentKind::Article, item.id, &admin, ORIGIN).await.unwrap();
        workflow.delete(ContentKind::Article, item.id, &admin, ORIGIN).await.unwrap();

        let entries = audited(&workflow, &store).await;
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(
            actions,
            ["News Created", "News Rejected", "News Updated", "News Approved", "News Deleted"]
        );
        for entry in &entries {
            let target = entry.target_resource.as_ref().unwrap();
            assert_eq!(target.resource_id, item.id);
            assert_eq!(target.resource_type, crate::models::ResourceKind::News);
            assert_eq!(entry.ip_address, ORIGIN);
        }
        assert!(store.stored_audit_entries().is_empty());
    }

    #[tokio::test]
    async fn public_view_hides_unapproved_items() {
        let (workflow, _) = workflow();
        let item = workflow
            .submit(ContentKind::Article, draft(ContentKind::Article), &reporter("HydPN101"), ORIGIN)
            .await
            .unwrap();

        assert!(matches!(
            workflow.view(ContentKind::Article, item.id, None).await,
            Err(WorkflowError::NotFound(_))
        ));
        assert!(workflow.view(ContentKind::Article, item.id, Some(&admin())).await.is_ok());

        workflow.approve(ContentKind::Article, item.id, &admin(), ORIGIN).await.unwrap();
        assert!(workflow.view(ContentKind::Article, item.id, None).await.is_ok());
    }
}
