//! Rate resolution, invoice aggregation, and the billing run that commits invoices.

mod import;
mod invoice;
mod rates;
mod service;

#[cfg(test)]
mod tests;

pub use import::{load_rate_sheet, parse_rate_sheet, RateSheetError};
pub use invoice::{BillingWarning, InvoiceAggregator, InvoiceBatch, InvoiceRequest};
pub use rates::{billable_units, line_amount, round_money, RateIndex};
pub use service::{InvoicingError, InvoicingService};
