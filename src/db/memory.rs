//! In-memory content and audit store for unit tests

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use uuid::Uuid;

use super::{AuditExt, ContentExt, ContentFilter, StateCount, page_offset};
use crate::models::{AuditEntry, ContentItem, ContentKind};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    content: Arc<Mutex<Vec<ContentItem>>>,
    audit: Arc<Mutex<Vec<AuditEntry>>>,
    /// Every entry handed to the store, including failed writes
    audit_attempts: Arc<Mutex<Vec<AuditEntry>>>,
    fail_audit_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent audit append fail
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    /// Entries that actually made it into the store, in insertion order
    pub fn stored_audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().unwrap().clone()
    }

    /// Every entry handed to the store, whether or not the write succeeded
    pub fn attempted_audit_entries(&self) -> Vec<AuditEntry> {
        self.audit_attempts.lock().unwrap().clone()
    }

    pub fn content_len(&self) -> usize {
        self.content.lock().unwrap().len()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches(filter: &ContentFilter, item: &ContentItem) -> bool {
    filter.kind.is_none_or(|k| item.kind() == k)
        && filter
            .approval_state
            .is_none_or(|s| item.approval.state() == s)
        && filter.owner_id.is_none_or(|id| item.owner_id() == id)
        && filter.category.is_none_or(|c| item.category == c)
        && filter
            .location
            .as_deref()
            .is_none_or(|loc| contains_ci(&item.location, loc))
        && filter
            .reporter_code
            .as_deref()
            .is_none_or(|code| item.submitter.reporter_code() == Some(code))
        && filter.search.as_deref().is_none_or(|q| {
            contains_ci(&item.title, q) || contains_ci(item.body.text(), q)
        })
}

fn trending_score(item: &ContentItem) -> i32 {
    match &item.body {
        crate::models::ContentBody::Trending { trending_score, .. } => *trending_score,
        _ => 0,
    }
}

impl ContentExt for MemoryStore {
    async fn insert_content(&self, item: &ContentItem) -> Result<(), sqlx::Error> {
        self.content.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn get_content(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<Option<ContentItem>, sqlx::Error> {
        Ok(self
            .content
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id && i.kind() == kind)
            .cloned())
    }

    async fn update_content(&self, item: &ContentItem) -> Result<(), sqlx::Error> {
        let mut content = self.content.lock().unwrap();
        let slot = content
            .iter_mut()
            .find(|i| i.id == item.id && i.kind() == item.kind())
            .ok_or(sqlx::Error::RowNotFound)?;
        *slot = item.clone();
        Ok(())
    }

    async fn delete_content(&self, kind: ContentKind, id: Uuid) -> Result<(), sqlx::Error> {
        let mut content = self.content.lock().unwrap();
        let before = content.len();
        content.retain(|i| !(i.id == id && i.kind() == kind));
        if content.len() == before {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    async fn list_content(
        &self,
        filter: &ContentFilter,
        page: i64,
        limit: i64,
    ) -> Result<Vec<ContentItem>, sqlx::Error> {
        let mut items: Vec<ContentItem> = self
            .content
            .lock()
            .unwrap()
            .iter()
            .filter(|i| matches(filter, i))
            .cloned()
            .collect();

        if filter.kind == Some(ContentKind::Trending) {
            items.sort_by(|a, b| {
                trending_score(b)
                    .cmp(&trending_score(a))
                    .then(b.created_at.cmp(&a.created_at))
            });
        } else {
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }

        let offset = usize::try_from(page_offset(page, limit)).unwrap_or(usize::MAX);
        Ok(items.into_iter().skip(offset).take(limit as usize).collect())
    }

    async fn count_content(&self, filter: &ContentFilter) -> Result<i64, sqlx::Error> {
        Ok(self
            .content
            .lock()
            .unwrap()
            .iter()
            .filter(|i| matches(filter, i))
            .count() as i64)
    }

    async fn content_state_counts(&self) -> Result<Vec<StateCount>, sqlx::Error> {
        let mut counts: Vec<StateCount> = Vec::new();
        for item in self.content.lock().unwrap().iter() {
            let (kind, state) = (item.kind(), item.approval.state());
            match counts
                .iter_mut()
                .find(|c| c.kind == kind && c.approval_state == state)
            {
                Some(c) => c.count += 1,
                None => counts.push(StateCount {
                    kind,
                    approval_state: state,
                    count: 1,
                }),
            }
        }
        Ok(counts)
    }
}

impl AuditExt for MemoryStore {
    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<(), sqlx::Error> {
        self.audit_attempts.lock().unwrap().push(entry.clone());
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.audit.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn get_audit_entries(&self, page: i64, limit: i64) -> Result<Vec<AuditEntry>, sqlx::Error> {
        // Reverse insertion order first, then a stable sort on time keeps
        // later insertions ahead of earlier ones with the same timestamp
        let mut entries: Vec<AuditEntry> =
            self.audit.lock().unwrap().iter().rev().cloned().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = usize::try_from(page_offset(page, limit)).unwrap_or(usize::MAX);
        Ok(entries.into_iter().skip(offset).take(limit as usize).collect())
    }

    async fn get_audit_entry_count(&self) -> Result<i64, sqlx::Error> {
        Ok(self.audit.lock().unwrap().len() as i64)
    }
}
