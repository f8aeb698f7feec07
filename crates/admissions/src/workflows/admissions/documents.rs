use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use super::domain::{
    ActorId, ApplicationDocument, DocumentId, DocumentReview, DocumentStatus, DocumentType,
    DocumentUpload,
};
use super::store::ApplicationRecord;

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> DocumentId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentId(format!("doc-{id:06}"))
}

/// Precondition on `Submitted -> Verified`: every required type must have a cleared document.
///
/// An empty requirement set disables the gate.
#[derive(Debug, Clone, Default)]
pub struct DocumentGate {
    required: BTreeSet<DocumentType>,
}

impl DocumentGate {
    pub fn new(required: impl IntoIterator<Item = DocumentType>) -> Self {
        Self {
            required: required.into_iter().collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.required.is_empty()
    }

    /// Required types without a verified, unflagged document, in stable order.
    pub fn missing(&self, record: &ApplicationRecord) -> Vec<DocumentType> {
        self.required
            .iter()
            .copied()
            .filter(|required| {
                !record
                    .documents
                    .iter()
                    .any(|document| document.document_type == *required && document.is_cleared())
            })
            .collect()
    }
}

pub(crate) fn uploaded(
    upload: DocumentUpload,
    actor: &ActorId,
    at: DateTime<Utc>,
) -> ApplicationDocument {
    ApplicationDocument {
        id: next_document_id(),
        document_type: upload.document_type,
        file_name: upload.file_name,
        storage_key: upload.storage_key,
        status: DocumentStatus::Uploaded,
        flagged: false,
        flag_reason: None,
        uploaded_by: actor.clone(),
        uploaded_at: at,
    }
}

pub(crate) fn apply_review(document: &mut ApplicationDocument, review: DocumentReview) {
    document.status = review.status;
    document.flagged = review.flagged;
    document.flag_reason = if review.flagged {
        review.flag_reason
    } else {
        None
    };
}
