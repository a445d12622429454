use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::rates::{billable_units, line_amount, RateIndex};
use crate::domain::{
    BusinessId, ClientId, Invoice, InvoiceId, InvoiceLineItem, InvoiceStatus, SignatureStatus,
    Visit, VisitId,
};

/// Caller-selected visits to bill for one business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub business_id: BusinessId,
    pub visit_ids: Vec<VisitId>,
    pub issued_on: NaiveDate,
}

/// Non-fatal finding reported beside the invoices of a billing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingWarning {
    MissingBillingRate { visit_id: VisitId, service: String },
    DuplicateInvoiceAttempt { visit_id: VisitId },
    UnsignedVisit { visit_id: VisitId },
    NoServicesProvided { visit_id: VisitId },
    UnknownVisit { visit_id: VisitId },
}

impl BillingWarning {
    pub fn visit_id(&self) -> &VisitId {
        match self {
            BillingWarning::MissingBillingRate { visit_id, .. }
            | BillingWarning::DuplicateInvoiceAttempt { visit_id }
            | BillingWarning::UnsignedVisit { visit_id }
            | BillingWarning::NoServicesProvided { visit_id }
            | BillingWarning::UnknownVisit { visit_id } => visit_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvoiceBatch {
    pub invoices: Vec<Invoice>,
    pub warnings: Vec<BillingWarning>,
}

impl InvoiceBatch {
    pub fn total(&self) -> Decimal {
        self.invoices.iter().map(|invoice| invoice.total_amount).sum()
    }
}

/// Groups billable visits by client and prices each provided service. Never invents a rate: a
/// service with no resolvable rate is reported and left off the invoice.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceAggregator;

impl InvoiceAggregator {
    pub fn aggregate(
        &self,
        request: &InvoiceRequest,
        visits: &[Visit],
        already_billed: &BTreeSet<VisitId>,
        rates: &RateIndex,
    ) -> InvoiceBatch {
        let mut batch = InvoiceBatch::default();
        let by_id: HashMap<&VisitId, &Visit> = visits.iter().map(|visit| (&visit.id, visit)).collect();

        let mut seen = BTreeSet::new();
        let mut groups: BTreeMap<&ClientId, Vec<&Visit>> = BTreeMap::new();
        for visit_id in &request.visit_ids {
            if !seen.insert(visit_id) {
                continue;
            }
            let Some(visit) = by_id.get(visit_id).copied() else {
                batch.warnings.push(BillingWarning::UnknownVisit {
                    visit_id: visit_id.clone(),
                });
                continue;
            };
            if let Some(warning) = selection_warning(visit, already_billed) {
                batch.warnings.push(warning);
                continue;
            }
            groups.entry(&visit.client_id).or_default().push(visit);
        }

        for (client_id, group) in groups {
            if let Some(invoice) = self.price_group(request, client_id, &group, rates, &mut batch.warnings) {
                batch.invoices.push(invoice);
            }
        }
        batch
    }

    fn price_group(
        &self,
        request: &InvoiceRequest,
        client_id: &ClientId,
        group: &[&Visit],
        rates: &RateIndex,
        warnings: &mut Vec<BillingWarning>,
    ) -> Option<Invoice> {
        let mut line_items = Vec::new();
        let mut visit_ids = BTreeSet::new();

        for visit in group {
            for service in &visit.services_provided {
                let Some(rate) =
                    rates.resolve(&request.business_id, service, client_id, visit.visit_date)
                else {
                    warn!(
                        visit_id = %visit.id,
                        client_id = %client_id,
                        service = %service,
                        "no billing rate resolves for service"
                    );
                    warnings.push(BillingWarning::MissingBillingRate {
                        visit_id: visit.id.clone(),
                        service: service.clone(),
                    });
                    continue;
                };

                let units = billable_units(rate.unit_type, visit.duration_minutes);
                line_items.push(InvoiceLineItem {
                    visit_id: visit.id.clone(),
                    service_type: service.clone(),
                    billing_code: rate.billing_code.clone(),
                    units,
                    rate: rate.rate_per_unit,
                    amount: line_amount(units, rate.rate_per_unit),
                });
                visit_ids.insert(visit.id.clone());
            }
        }

        if line_items.is_empty() {
            return None;
        }

        let subtotal: Decimal = line_items.iter().map(|item| item.amount).sum();
        let id = InvoiceId::generate();
        Some(Invoice {
            id,
            invoice_number: id.invoice_number(),
            business_id: request.business_id.clone(),
            client_id: client_id.clone(),
            issued_on: request.issued_on,
            visit_ids,
            line_items,
            subtotal,
            total_amount: subtotal,
            status: InvoiceStatus::Pending,
        })
    }
}

fn selection_warning(visit: &Visit, already_billed: &BTreeSet<VisitId>) -> Option<BillingWarning> {
    let visit_id = visit.id.clone();
    if already_billed.contains(&visit.id) {
        Some(BillingWarning::DuplicateInvoiceAttempt { visit_id })
    } else if visit.signature_status != SignatureStatus::FullySigned {
        Some(BillingWarning::UnsignedVisit { visit_id })
    } else if visit.services_provided.is_empty() {
        Some(BillingWarning::NoServicesProvided { visit_id })
    } else {
        None
    }
}
