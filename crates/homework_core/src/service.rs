//! crates/homework_core/src/service.rs
//!
//! Mutations on assignments and their attachments.
//!
//! Every successful mutation invalidates the cached assignment lists; the next
//! read re-fetches. Nothing is retried and nothing is rolled back.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Assignment, AssignmentPatch, AssignmentStatus, Attachment, NewAttachment};
use crate::forms::{validate_patch, AssignmentDraft, ValidationError};
use crate::ports::{AssignmentRepository, AttachmentRepository, ObjectStorage, PortError};
use crate::query::AssignmentQuery;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Port(#[from] PortError),
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// The first of two remote steps succeeded and the second failed.
    #[error("Operation only partially completed: {0}")]
    Partial(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct AssignmentService {
    repo: Arc<dyn AssignmentRepository>,
    attachments: Arc<dyn AttachmentRepository>,
    storage: Arc<dyn ObjectStorage>,
    query: Arc<AssignmentQuery>,
}

impl AssignmentService {
    pub fn new(
        repo: Arc<dyn AssignmentRepository>,
        attachments: Arc<dyn AttachmentRepository>,
        storage: Arc<dyn ObjectStorage>,
        query: Arc<AssignmentQuery>,
    ) -> Self {
        Self {
            repo,
            attachments,
            storage,
            query,
        }
    }

    pub async fn get(&self, caller: Uuid, id: Uuid) -> ServiceResult<Assignment> {
        Ok(self.repo.get(caller, id).await?)
    }

    pub async fn create(&self, caller: Uuid, draft: &AssignmentDraft) -> ServiceResult<Assignment> {
        let fields = draft.validate()?;
        let created = self.repo.create(caller, &fields).await?;
        self.query.invalidate_all();
        info!(%caller, assignment_id = %created.id, "Assignment created");
        if draft.status == AssignmentStatus::NotStarted {
            return Ok(created);
        }

        // Creation always starts at NotStarted; a different draft status is a second call.
        let patch = AssignmentPatch::status(draft.status);
        let updated = self.repo.update(caller, created.id, &patch).await.map_err(|e| {
            warn!(assignment_id = %created.id, error = %e, "Assignment created but status not set");
            ServiceError::Partial(format!("assignment created but status not set: {}", e))
        })?;
        self.query.invalidate_all();
        Ok(updated)
    }

    /// Applies an edit form: loads the current row and sends only changed fields.
    pub async fn edit(
        &self,
        caller: Uuid,
        id: Uuid,
        draft: &AssignmentDraft,
    ) -> ServiceResult<Assignment> {
        let current = self.repo.get(caller, id).await?;
        let patch = draft.diff(&current)?;
        if patch.is_empty() {
            return Ok(current);
        }
        self.update(caller, id, &patch).await
    }

    pub async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        patch: &AssignmentPatch,
    ) -> ServiceResult<Assignment> {
        validate_patch(patch)?;
        let updated = self.repo.update(caller, id, patch).await?;
        self.query.invalidate_all();
        Ok(updated)
    }

    pub async fn set_status(
        &self,
        caller: Uuid,
        id: Uuid,
        status: AssignmentStatus,
    ) -> ServiceResult<Assignment> {
        self.update(caller, id, &AssignmentPatch::status(status)).await
    }

    pub async fn set_archived(
        &self,
        caller: Uuid,
        id: Uuid,
        archived: bool,
    ) -> ServiceResult<Assignment> {
        self.update(caller, id, &AssignmentPatch::archived(archived)).await
    }

    /// Owner only. Stored attachment files go first, then the row, which takes
    /// the attachment records with it. Nothing is restored if a later step fails.
    pub async fn delete(&self, caller: Uuid, id: Uuid) -> ServiceResult<()> {
        let assignment = self.repo.get(caller, id).await?;
        if assignment.user_id != caller {
            return Err(PortError::NotFound(format!("Assignment {} not found", id)).into());
        }

        let mut removed = 0;
        for attachment in self.attachments.list(caller, id).await? {
            match self.storage.delete(&attachment.storage_path).await {
                Ok(()) => removed += 1,
                Err(PortError::NotFound(_)) => {
                    warn!(path = %attachment.storage_path, "Attachment object missing from storage")
                }
                Err(e) if removed > 0 => {
                    warn!(assignment_id = %id, error = %e, "Attachment objects only partly removed");
                    return Err(ServiceError::Partial(format!(
                        "{} attachment files removed before failure: {}",
                        removed, e
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.repo.delete(caller, id).await.map_err(|e| {
            if removed > 0 {
                warn!(assignment_id = %id, error = %e, "Attachment files removed but assignment remains");
                ServiceError::Partial(format!("attachment files removed but assignment kept: {}", e))
            } else {
                e.into()
            }
        })?;
        self.query.invalidate_all();
        info!(%caller, assignment_id = %id, attachments = removed, "Assignment deleted");
        Ok(())
    }
}

/// An attachment together with the URL it can be downloaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentView {
    pub attachment: Attachment,
    pub url: String,
}

pub struct AttachmentService {
    repo: Arc<dyn AttachmentRepository>,
    storage: Arc<dyn ObjectStorage>,
    query: Arc<AssignmentQuery>,
}

impl AttachmentService {
    pub fn new(
        repo: Arc<dyn AttachmentRepository>,
        storage: Arc<dyn ObjectStorage>,
        query: Arc<AssignmentQuery>,
    ) -> Self {
        Self {
            repo,
            storage,
            query,
        }
    }

    fn view(&self, attachment: Attachment) -> AttachmentView {
        let url = self.storage.public_url(&attachment.storage_path);
        AttachmentView { attachment, url }
    }

    pub async fn list(&self, caller: Uuid, assignment_id: Uuid) -> ServiceResult<Vec<AttachmentView>> {
        let rows = self.repo.list(caller, assignment_id).await?;
        Ok(rows.into_iter().map(|a| self.view(a)).collect())
    }

    /// Stores the object, then inserts its record. If the insert fails the
    /// object stays behind.
    pub async fn upload(
        &self,
        caller: Uuid,
        assignment_id: Uuid,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> ServiceResult<AttachmentView> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(ValidationError::required("file_name").into());
        }
        // Visibility check before anything is written.
        self.repo.list(caller, assignment_id).await?;

        let storage_path = storage_path(assignment_id, Uuid::new_v4(), file_name);
        let size = data.len() as i64;
        self.storage.upload(&storage_path, data, content_type).await?;

        let fields = NewAttachment {
            assignment_id,
            file_name: file_name.to_string(),
            storage_path: storage_path.clone(),
            content_type: content_type.to_string(),
            size,
        };
        let attachment = self.repo.create(caller, &fields).await.map_err(|e| {
            warn!(%storage_path, error = %e, "Attachment stored but record insert failed");
            ServiceError::Partial(format!("file stored but not recorded: {}", e))
        })?;
        self.query.invalidate_all();
        Ok(self.view(attachment))
    }

    /// Removes the object, then the record. If the record delete fails the
    /// record points at nothing.
    pub async fn delete(&self, caller: Uuid, id: Uuid) -> ServiceResult<()> {
        let attachment = self.repo.get(caller, id).await?;
        match self.storage.delete(&attachment.storage_path).await {
            Ok(()) => {}
            // Already gone: still drop the record.
            Err(PortError::NotFound(_)) => {
                warn!(path = %attachment.storage_path, "Attachment object missing from storage")
            }
            Err(e) => return Err(e.into()),
        }
        self.repo.delete(caller, id).await.map_err(|e| {
            warn!(attachment_id = %id, error = %e, "Attachment object deleted but record remains");
            ServiceError::Partial(format!("file removed but record kept: {}", e))
        })?;
        self.query.invalidate_all();
        Ok(())
    }
}

/// `<assignment id>/<object id>-<sanitised file name>`.
pub fn storage_path(assignment_id: Uuid, object_id: Uuid, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}/{}-{}", assignment_id, object_id, safe)
}
