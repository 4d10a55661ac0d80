//! Access policy: who may do what to which resource
//!
//! A pure decision function with no I/O. Query scoping (e.g. "own items
//! only" for `ViewOwn`) is the store's job, not this module's.

use uuid::Uuid;

use crate::error::WorkflowError;
use crate::models::{ApprovalState, Principal, PrincipalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    Edit,
    Delete,
    ViewOwn,
    ViewPublic,
    /// Approve or reject content
    Moderate,
    ManageReporters,
    ViewAuditLog,
}

/// The parts of a principal the policy looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub kind: PrincipalKind,
    pub id: Uuid,
    pub active: bool,
}

impl From<&Principal> for Actor {
    fn from(principal: &Principal) -> Self {
        Actor {
            kind: principal.kind(),
            id: principal.id(),
            active: principal.is_active(),
        }
    }
}

/// What is known about the target resource, if anything
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceContext {
    pub owner_id: Option<Uuid>,
    pub approval_state: Option<ApprovalState>,
}

impl ResourceContext {
    pub fn owned_by(owner_id: Uuid, approval_state: ApprovalState) -> Self {
        ResourceContext {
            owner_id: Some(owner_id),
            approval_state: Some(approval_state),
        }
    }
}

/// Rules are evaluated in order and the first match wins; anything that
/// falls through is denied.
pub fn can_perform(actor: Option<&Actor>, action: Action, resource: &ResourceContext) -> bool {
    if let Some(actor) = actor {
        // Deactivated reporters keep only anonymous rights
        let usable = actor.kind != PrincipalKind::Reporter || actor.active;

        if actor.kind == PrincipalKind::Admin {
            return true;
        }
        if usable && action == Action::Submit && actor.kind == PrincipalKind::Reporter {
            return true;
        }
        if usable
            && matches!(action, Action::Edit | Action::Delete)
            && actor.kind == PrincipalKind::Reporter
            && resource.owner_id == Some(actor.id)
        {
            return true;
        }
        if usable && action == Action::ViewOwn && actor.kind == PrincipalKind::Reporter {
            return true;
        }
    }

    action == Action::ViewPublic && resource.approval_state == Some(ApprovalState::Approved)
}

/// `can_perform`, surfaced as the error the caller should see
///
/// No principal at all is an authentication failure; a principal without
/// the right is an authorization failure.
pub fn authorize(
    actor: Option<&Actor>,
    action: Action,
    resource: &ResourceContext,
) -> Result<(), WorkflowError> {
    if can_perform(actor, action, resource) {
        return Ok(());
    }

    match actor {
        None => Err(WorkflowError::Authentication),
        Some(_) => Err(WorkflowError::Authorization(denial_message(action).to_string())),
    }
}

fn denial_message(action: Action) -> &'static str {
    match action {
        Action::Edit => "You can only edit your own content",
        Action::Delete => "You can only delete your own content",
        Action::Moderate | Action::ManageReporters | Action::ViewAuditLog => {
            "Access denied. Admin privileges required."
        }
        Action::Submit | Action::ViewOwn | Action::ViewPublic => {
            "Access denied. Insufficient permissions."
        }
    }
}
