use crate::billing::{billable_units, line_amount, round_money, RateIndex};
use crate::domain::{BusinessId, ClientId, UnitType};
use crate::fixtures::{date, money, rate};

fn agency() -> BusinessId {
    BusinessId::new("agency-1")
}

#[test]
fn hourly_visit_of_ninety_minutes_bills_one_and_a_half_units() {
    let units = billable_units(UnitType::Hourly, 90);

    assert_eq!(units, money(150, 2));
    assert_eq!(line_amount(units, money(2000, 2)), money(3000, 2));
}

#[test]
fn quarter_hour_visit_of_ninety_minutes_bills_six_units() {
    let units = billable_units(UnitType::FifteenMinute, 90);

    assert_eq!(units, money(600, 2));
    assert_eq!(line_amount(units, money(500, 2)), money(3000, 2));
}

#[test]
fn flat_unit_types_bill_a_single_unit() {
    assert_eq!(billable_units(UnitType::PerVisit, 240), money(1, 0));
    assert_eq!(billable_units(UnitType::Daily, 15), money(1, 0));
}

#[test]
fn amounts_use_rounded_units_and_round_half_away_from_zero() {
    let units = billable_units(UnitType::Hourly, 50);
    assert_eq!(units, money(83, 2));

    let amount = line_amount(units, money(1750, 2));
    assert_eq!(amount, money(1453, 2));
    assert_eq!(amount, round_money(units * money(1750, 2)));
    assert_eq!(round_money(money(-14525, 3)), money(-1453, 2));
}

#[test]
fn client_scoped_rate_beats_default_regardless_of_order() {
    let default = rate("r-1", "Personal Care", None, money(2000, 2), UnitType::Hourly);
    let scoped = rate("r-2", "Personal Care", Some("cl-1"), money(2500, 2), UnitType::Hourly);

    for rates in [
        vec![default.clone(), scoped.clone()],
        vec![scoped.clone(), default.clone()],
    ] {
        let index = RateIndex::new(rates);
        let for_scoped = index
            .resolve(&agency(), "Personal Care", &ClientId::new("cl-1"), date(2025, 3, 3))
            .expect("rate resolves");
        let for_other = index
            .resolve(&agency(), "Personal Care", &ClientId::new("cl-2"), date(2025, 3, 3))
            .expect("rate resolves");

        assert_eq!(for_scoped.id.as_str(), "r-2");
        assert_eq!(for_other.id.as_str(), "r-1");
    }
}

#[test]
fn latest_effective_rate_applies_as_of_visit_date() {
    let january = rate("r-jan", "Companionship", None, money(1800, 2), UnitType::Hourly);
    let mut june = rate("r-jun", "Companionship", None, money(1950, 2), UnitType::Hourly);
    june.effective_date = date(2025, 6, 1);
    let index = RateIndex::new([january, june]);
    let client = ClientId::new("cl-1");

    let spring = index.resolve(&agency(), "Companionship", &client, date(2025, 3, 3));
    let summer = index.resolve(&agency(), "Companionship", &client, date(2025, 7, 1));
    let before_any = index.resolve(&agency(), "Companionship", &client, date(2024, 12, 31));

    assert_eq!(spring.map(|rate| rate.id.as_str()), Some("r-jan"));
    assert_eq!(summer.map(|rate| rate.id.as_str()), Some("r-jun"));
    assert!(before_any.is_none());
}

#[test]
fn future_client_rate_falls_back_to_default() {
    let default = rate("r-1", "Respite", None, money(2200, 2), UnitType::Hourly);
    let mut scoped = rate("r-2", "Respite", Some("cl-1"), money(2600, 2), UnitType::Hourly);
    scoped.effective_date = date(2025, 9, 1);
    let index = RateIndex::new([default, scoped]);

    let resolved = index.resolve(&agency(), "Respite", &ClientId::new("cl-1"), date(2025, 3, 3));
    assert_eq!(resolved.map(|rate| rate.id.as_str()), Some("r-1"));
}

#[test]
fn equal_effective_dates_resolve_to_lowest_rate_id() {
    let index = RateIndex::new([
        rate("r-9", "Respite", None, money(2200, 2), UnitType::Hourly),
        rate("r-3", "Respite", None, money(2100, 2), UnitType::Hourly),
    ]);

    let resolved = index.resolve(&agency(), "Respite", &ClientId::new("cl-1"), date(2025, 3, 3));
    assert_eq!(resolved.map(|rate| rate.id.as_str()), Some("r-3"));
}

#[test]
fn inactive_and_foreign_rates_never_resolve() {
    let mut inactive = rate("r-1", "Personal Care", None, money(2000, 2), UnitType::Hourly);
    inactive.active = false;
    let mut foreign = rate("r-2", "Personal Care", None, money(2000, 2), UnitType::Hourly);
    foreign.business_id = BusinessId::new("agency-2");
    let index = RateIndex::new([inactive, foreign]);

    assert_eq!(index.len(), 1);
    assert!(index
        .resolve(&agency(), "Personal Care", &ClientId::new("cl-1"), date(2025, 3, 3))
        .is_none());
    assert!(index
        .resolve(&agency(), "Meal Prep", &ClientId::new("cl-1"), date(2025, 3, 3))
        .is_none());
}
