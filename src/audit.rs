//! Append-only activity log
//!
//! Recording is fire-and-forget: entries go over a channel to a single
//! writer task, and a failed store write is logged and dropped. The
//! operation that produced the entry has already succeeded by then and is
//! never rolled back or failed because of it.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::db::AuditExt;
use crate::error::WorkflowError;
use crate::models::AuditEntry;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

enum AuditCommand {
    Record(AuditEntry),
    /// Acknowledged once every earlier entry has been handled
    Flush(oneshot::Sender<()>),
}

/// Handle for recording audit entries; cheap to clone
#[derive(Debug, Clone)]
pub struct AuditLog {
    tx: mpsc::UnboundedSender<AuditCommand>,
}

impl AuditLog {
    /// Start the writer task over `store`
    ///
    /// The task ends once every `AuditLog` clone has been dropped and the
    /// queue is drained.
    pub fn spawn<S>(store: S) -> (Self, JoinHandle<()>)
    where
        S: AuditExt + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, rx));
        (AuditLog { tx }, handle)
    }

    /// Queue an entry. Never fails from the caller's point of view.
    pub fn record(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        if self.tx.send(AuditCommand::Record(entry)).is_err() {
            tracing::error!(action = %action, "Audit writer is gone, dropping entry");
        }
    }

    /// Wait until everything queued so far has been written (or has failed)
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(AuditCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn run_writer<S: AuditExt>(store: S, mut rx: mpsc::UnboundedReceiver<AuditCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            AuditCommand::Record(entry) => {
                if let Err(e) = store.append_audit_entry(&entry).await {
                    tracing::error!(
                        entry_id = %entry.id,
                        action = %entry.action,
                        "Failed to persist audit entry: {}",
                        e
                    );
                }
            }
            AuditCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("Audit writer stopped");
}

/// One page of the audit log, newest first
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPage {
    pub logs: Vec<AuditEntry>,
    pub current_page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub total: i64,
}

/// Read a page of the log; `page` starts at 1
pub async fn list<S: AuditExt>(
    store: &S,
    page: i64,
    page_size: i64,
) -> Result<AuditPage, WorkflowError> {
    if page < 1 {
        return Err(WorkflowError::Validation("Page must be at least 1".into()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(WorkflowError::Validation(format!(
            "Page size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let logs = store.get_audit_entries(page, page_size).await?;
    let total = store.get_audit_entry_count().await?;

    Ok(AuditPage {
        logs,
        current_page: page,
        page_size,
        total_pages: (total + page_size - 1) / page_size,
        total,
    })
}
