use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::invoice::{BillingWarning, InvoiceAggregator, InvoiceBatch, InvoiceRequest};
use super::rates::RateIndex;
use crate::domain::{Invoice, Visit, VisitId};
use crate::repository::{InvoiceRepository, RepositoryError};

/// Billing run that selects unbilled visits, prices them, and commits one invoice per client.
///
/// The up-front "already billed" filter is only advisory; the repository's atomic claim is what
/// keeps a visit on a single invoice when runs overlap.
pub struct InvoicingService<R> {
    repository: Arc<R>,
    aggregator: InvoiceAggregator,
}

impl<R> InvoicingService<R>
where
    R: InvoiceRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            aggregator: InvoiceAggregator,
        }
    }

    pub fn generate(
        &self,
        request: &InvoiceRequest,
        visits: &[Visit],
        rates: &RateIndex,
    ) -> Result<InvoiceBatch, InvoicingError> {
        let billed = self.repository.billed_visit_ids(&request.visit_ids)?;
        let draft = self.aggregator.aggregate(request, visits, &billed, rates);

        let mut batch = InvoiceBatch {
            invoices: Vec::new(),
            warnings: draft.warnings,
        };
        for invoice in draft.invoices {
            if let Some(stored) = self.commit(request, visits, rates, invoice, &mut batch.warnings)? {
                batch.invoices.push(stored);
            }
        }

        info!(
            business_id = %request.business_id,
            invoices = batch.invoices.len(),
            warnings = batch.warnings.len(),
            total = %batch.total(),
            "billing run finished"
        );
        Ok(batch)
    }

    /// Insert `invoice`, shrinking it to its uncontested visits each time another run has
    /// already claimed some of them.
    fn commit(
        &self,
        request: &InvoiceRequest,
        visits: &[Visit],
        rates: &RateIndex,
        invoice: Invoice,
        warnings: &mut Vec<BillingWarning>,
    ) -> Result<Option<Invoice>, InvoicingError> {
        let mut pending = invoice;
        loop {
            let claimed = pending.visit_ids.clone();
            let client_id = pending.client_id.clone();
            match self.repository.insert_claiming_visits(pending) {
                Ok(stored) => {
                    info!(
                        invoice_number = %stored.invoice_number,
                        client_id = %stored.client_id,
                        visits = stored.visit_ids.len(),
                        total = %stored.total_amount,
                        "invoice committed"
                    );
                    return Ok(Some(stored));
                }
                Err(RepositoryError::DuplicateInvoice { visit_ids }) => {
                    warn!(
                        client_id = %client_id,
                        contested = visit_ids.len(),
                        "visits were invoiced by a concurrent run"
                    );
                    warnings.extend(visit_ids.iter().map(|visit_id| {
                        BillingWarning::DuplicateInvoiceAttempt {
                            visit_id: visit_id.clone(),
                        }
                    }));

                    let remaining: Vec<VisitId> = claimed.difference(&visit_ids).cloned().collect();
                    match self.reprice(request, remaining, visits, rates) {
                        Some(smaller) => pending = smaller,
                        None => return Ok(None),
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Rates and visits are unchanged since the first pass, so any warnings it would repeat are
    /// dropped.
    fn reprice(
        &self,
        request: &InvoiceRequest,
        remaining: Vec<VisitId>,
        visits: &[Visit],
        rates: &RateIndex,
    ) -> Option<Invoice> {
        if remaining.is_empty() {
            return None;
        }
        let narrowed = InvoiceRequest {
            business_id: request.business_id.clone(),
            visit_ids: remaining,
            issued_on: request.issued_on,
        };
        self.aggregator
            .aggregate(&narrowed, visits, &BTreeSet::new(), rates)
            .invoices
            .into_iter()
            .next()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvoicingError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
