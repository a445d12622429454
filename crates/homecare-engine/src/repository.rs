use std::collections::BTreeSet;

use crate::domain::{
    Invoice, InvoiceId, Shift, ShiftId, ShiftStatus, TaskAssignment, TaskId, VisitId,
};

/// Storage for shifts. Writes are conditional on the status the caller read, so a shift accepts
/// only one in-flight clock-in or clock-out.
pub trait ShiftRepository: Send + Sync {
    fn fetch(&self, id: &ShiftId) -> Result<Option<Shift>, RepositoryError>;

    /// Persist `shift` only if the stored copy still has status `expected`.
    fn compare_and_swap(&self, shift: Shift, expected: ShiftStatus)
        -> Result<Shift, RepositoryError>;
}

/// Storage for invoices, responsible for the one-invoice-per-visit constraint.
pub trait InvoiceRepository: Send + Sync {
    /// Subset of `visit_ids` already referenced by a stored invoice.
    fn billed_visit_ids(&self, visit_ids: &[VisitId]) -> Result<BTreeSet<VisitId>, RepositoryError>;

    /// Insert `invoice` and claim its visit ids in one atomic step. Fails with
    /// [`RepositoryError::DuplicateInvoice`] naming every visit already claimed elsewhere, in
    /// which case nothing is written.
    fn insert_claiming_visits(&self, invoice: Invoice) -> Result<Invoice, RepositoryError>;

    fn fetch(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError>;
}

pub trait AssignmentRepository: Send + Sync {
    fn insert(&self, assignment: TaskAssignment) -> Result<TaskAssignment, RepositoryError>;
    fn fetch(&self, task_id: &TaskId) -> Result<Option<TaskAssignment>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected status {expected}, found {found}")]
    StaleStatus {
        expected: ShiftStatus,
        found: ShiftStatus,
    },
    #[error("visits already invoiced: {}", join_ids(.visit_ids))]
    DuplicateInvoice { visit_ids: BTreeSet<VisitId> },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

fn join_ids(ids: &BTreeSet<VisitId>) -> String {
    ids.iter()
        .map(VisitId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
