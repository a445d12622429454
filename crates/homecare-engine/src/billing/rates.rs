use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::{BillingRate, BusinessId, ClientId, UnitType};

#[derive(Debug, Clone, Default)]
struct RateBuckets {
    client_scoped: BTreeMap<ClientId, Vec<BillingRate>>,
    defaults: Vec<BillingRate>,
}

/// Active billing rates indexed by business and service type.
///
/// Resolution prefers a rate scoped to the visit's client over the business default. Within a
/// bucket only rates effective on or before the as-of date apply; the most recent effective date
/// wins and equal dates fall back to the lowest rate id, so the outcome never depends on input
/// order.
#[derive(Debug, Clone, Default)]
pub struct RateIndex {
    entries: BTreeMap<BusinessId, BTreeMap<String, RateBuckets>>,
    len: usize,
}

impl RateIndex {
    pub fn new(rates: impl IntoIterator<Item = BillingRate>) -> Self {
        let mut index = Self::default();
        for rate in rates.into_iter().filter(|rate| rate.active) {
            let buckets = index
                .entries
                .entry(rate.business_id.clone())
                .or_default()
                .entry(rate.service_type.clone())
                .or_default();
            match rate.client_id.clone() {
                Some(client_id) => buckets.client_scoped.entry(client_id).or_default().push(rate),
                None => buckets.defaults.push(rate),
            }
            index.len += 1;
        }
        index
    }

    /// Number of active rates held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn resolve(
        &self,
        business_id: &BusinessId,
        service_type: &str,
        client_id: &ClientId,
        as_of: NaiveDate,
    ) -> Option<&BillingRate> {
        let buckets = self.entries.get(business_id)?.get(service_type)?;
        buckets
            .client_scoped
            .get(client_id)
            .and_then(|scoped| latest_effective(scoped, as_of))
            .or_else(|| latest_effective(&buckets.defaults, as_of))
    }
}

fn latest_effective(candidates: &[BillingRate], as_of: NaiveDate) -> Option<&BillingRate> {
    candidates
        .iter()
        .filter(|rate| rate.effective_date <= as_of)
        .max_by(|left, right| {
            left.effective_date
                .cmp(&right.effective_date)
                .then_with(|| right.id.cmp(&left.id))
        })
}

/// Rounds half away from zero to cents.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Billable quantity for a visit, rounded to two decimals.
pub fn billable_units(unit_type: UnitType, duration_minutes: u32) -> Decimal {
    let minutes = Decimal::from(duration_minutes);
    let units = match unit_type {
        UnitType::Hourly => minutes / Decimal::from(60),
        UnitType::FifteenMinute => minutes / Decimal::from(15),
        UnitType::PerVisit | UnitType::Daily => Decimal::ONE,
    };
    round_money(units)
}

pub fn line_amount(units: Decimal, rate_per_unit: Decimal) -> Decimal {
    round_money(units * rate_per_unit)
}
