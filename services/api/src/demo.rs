use crate::infra::{ApiClock, EngineState};
use crate::sample::{sample_agency, sample_rates, week_start_for};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::Args;
use homecare_engine::billing::{load_rate_sheet, BillingWarning, InvoiceRequest, RateIndex};
use homecare_engine::config::EngineConfig;
use homecare_engine::domain::{Client, ClientId, GeoPoint, GpsReading, ShiftId, VisitId};
use homecare_engine::error::AppError;
use homecare_engine::evv::{Clock, EvvVerifier, VisitVerificationService};
use homecare_engine::repository::ShiftRepository;
use homecare_engine::scheduling::{ClientNeed, DateRange, ScheduleHorizon};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Any date in the week to schedule (YYYY-MM-DD). Defaults to this week.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) week_of: Option<NaiveDate>,
    /// Rate sheet CSV used for the billing run (defaults to the built-in sample rates)
    #[arg(long)]
    pub(crate) rate_sheet: Option<PathBuf>,
    /// Skip the billing portion of the demo.
    #[arg(long)]
    pub(crate) skip_billing: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RateCheckArgs {
    /// Rate sheet CSV to parse
    pub(crate) path: PathBuf,
    /// Show which rate applies to each service on this date (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
}

pub(crate) fn load_rates(rate_sheet: Option<&Path>) -> Result<RateIndex, AppError> {
    let rates = match rate_sheet {
        Some(path) => load_rate_sheet(path)?,
        None => sample_rates(),
    };
    Ok(RateIndex::new(rates))
}

pub(crate) fn run_rate_check(args: RateCheckArgs) -> Result<(), AppError> {
    let RateCheckArgs { path, as_of } = args;
    let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
    let rates = load_rate_sheet(&path)?;
    let index = RateIndex::new(rates.clone());

    println!(
        "Rate sheet {} ({} rows, {} active)",
        path.display(),
        rates.len(),
        index.len()
    );
    for rate in &rates {
        let scope = rate
            .client_id
            .as_ref()
            .map(|client| client.to_string())
            .unwrap_or_else(|| "default".to_string());
        // Defaults resolve against an id no client-scoped rate can carry.
        let lookup_client = rate.client_id.clone().unwrap_or_else(|| ClientId::new(""));
        let resolved = index
            .resolve(&rate.business_id, &rate.service_type, &lookup_client, as_of)
            .map(|winner| winner.id == rate.id)
            .unwrap_or(false);
        println!(
            "- {} | {} | {} | {} @ {} per {} from {}{}{}",
            rate.id,
            rate.business_id,
            rate.service_type,
            rate.billing_code,
            rate.rate_per_unit,
            rate.unit_type.label(),
            rate.effective_date,
            if scope == "default" {
                String::new()
            } else {
                format!(" for {scope}")
            },
            match (rate.active, resolved) {
                (false, _) => " [inactive]",
                (true, true) => " [applies]",
                (true, false) => "",
            }
        );
    }
    Ok(())
}

/// Hands out pre-arranged instants so the walkthrough shows realistic clock events.
struct ScriptedClock {
    ticks: Mutex<VecDeque<NaiveDateTime>>,
    fallback: NaiveDateTime,
}

impl ScriptedClock {
    fn new(ticks: impl IntoIterator<Item = NaiveDateTime>, fallback: NaiveDateTime) -> Self {
        Self {
            ticks: Mutex::new(ticks.into_iter().collect()),
            fallback,
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> NaiveDateTime {
        self.ticks
            .lock()
            .ok()
            .and_then(|mut ticks| ticks.pop_front())
            .unwrap_or(self.fallback)
    }
}

fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    day.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}

/// A device fix at the client's door; clients without coordinates get one from the Ankeny office.
fn home_fix(client: &Client) -> Option<GpsReading> {
    let point = client.address.location.unwrap_or(GeoPoint {
        latitude: 41.7318,
        longitude: -93.6001,
    });
    Some(GpsReading {
        latitude: point.latitude,
        longitude: point.longitude,
        accuracy: 12.0,
    })
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        week_of,
        rate_sheet,
        skip_billing,
    } = args;

    let monday = week_start_for(week_of.unwrap_or_else(|| Local::now().date_naive()));
    let config = EngineConfig::from_env()?;
    let rates = load_rates(rate_sheet.as_deref())?;
    let snapshot = sample_agency(monday);
    let tasks = snapshot.tasks.clone();
    let state = EngineState::new(&config, snapshot, rates, ApiClock::Fixed(at(monday, 7, 0)));

    println!("Home care engine demo: week of {monday}");

    println!("\nCaregiver suggestions for recurring client needs");
    let shifts = state.shifts.all()?;
    for requirement in &state.requirements {
        let Some(client) = state.clients.get(&requirement.client_id) else {
            continue;
        };
        let day = monday + Duration::days(i64::from(requirement.weekday.num_days_from_monday()));
        let (start, end) = requirement.window_on(day);
        let need = ClientNeed {
            client: client.clone(),
            start,
            end,
        };
        println!(
            "- {} on {} {}-{} ({})",
            client.name,
            day.weekday(),
            requirement.start_time.format("%H:%M"),
            requirement.end_time.format("%H:%M"),
            requirement.task_name
        );
        match state.scorer.suggest(&need, &state.caregivers, &shifts) {
            Ok(suggestions) => {
                for suggestion in suggestions {
                    println!(
                        "    {} score {} (distance {:.1}{})",
                        suggestion.caregiver_id,
                        suggestion.score,
                        suggestion.distance,
                        if suggestion.distance_estimated {
                            ", estimated"
                        } else {
                            ""
                        }
                    );
                }
            }
            Err(err) => println!("    no suggestion: {err}"),
        }
    }

    println!("\nSchedule conflicts");
    let range = DateRange::new(monday, monday + Duration::days(6)).unwrap_or(DateRange {
        start: monday,
        end: monday,
    });
    let horizon = ScheduleHorizon {
        range,
        shifts: &shifts,
        caregivers: &state.caregivers,
        requirements: &state.requirements,
    };
    let report = state.detector.detect(&horizon, state.clock.now());
    if report.is_clear() {
        println!("- none");
    }
    for overlap in &report.overlaps {
        println!(
            "- {} double-booked: {} overlaps {} by {} min",
            overlap.caregiver_id, overlap.first_shift, overlap.second_shift, overlap.overlap_minutes
        );
    }
    for gap in &report.coverage_gaps {
        let candidates: Vec<String> = gap
            .candidates
            .iter()
            .map(|candidate| format!("{} ({:.0})", candidate.caregiver_id, candidate.score))
            .collect();
        println!(
            "- uncovered {} for {} at {} [{}] candidates: {}",
            gap.task_name,
            gap.client_id,
            gap.start.format("%a %H:%M"),
            gap.severity.label(),
            if candidates.is_empty() {
                "none".to_string()
            } else {
                candidates.join(", ")
            }
        );
    }
    for finding in &report.workload {
        println!(
            "- {} {:?}: {:.1}h scheduled vs {:.1}h mean",
            finding.caregiver_id, finding.flag, finding.scheduled_hours, finding.mean_hours
        );
    }

    println!("\nCare task auto-assignment");
    for task in &tasks {
        match state.assignments.auto_assign(task, &state.caregivers, None) {
            Ok(outcome) => println!(
                "- {} ({}) -> {} (skill score {:.0})",
                task.task_name, task.client_id, outcome.assignment.caregiver_id, outcome.skill_match.score
            ),
            Err(err) => println!("- {} ({}): {err}", task.task_name, task.client_id),
        }
    }

    println!("\nElectronic visit verification");
    let tuesday = monday + Duration::days(1);
    let clock = Arc::new(ScriptedClock::new(
        [
            at(monday, 9, 4),
            at(monday, 12, 55),
            at(tuesday, 10, 20),
            at(tuesday, 12, 0),
        ],
        at(tuesday, 12, 0),
    ));
    let verification = VisitVerificationService::new(
        state.shifts.clone(),
        clock,
        EvvVerifier::new(config.evv.clone()),
    );
    for shift_id in ["sh-101", "sh-103"] {
        let shift_id = ShiftId::new(shift_id);
        let Some(shift) = state.shifts.fetch(&shift_id)? else {
            continue;
        };
        let Some(client) = state.clients.get(&shift.client_id) else {
            continue;
        };
        let completed = verification
            .clock_in(&shift_id, client, home_fix(client))
            .and_then(|_| verification.clock_out(&shift_id, client, home_fix(client)));
        match completed {
            Ok(shift) => {
                println!(
                    "- {} for {}: {} hours worked, EVV {}",
                    shift.id,
                    client.name,
                    shift.actual_hours.unwrap_or_default(),
                    shift.evv_status.label()
                );
                if let Some(check_in) = shift.check_in {
                    println!("    geofence at check-in: {}", check_in.geofence.label());
                }
                for exception in &shift.evv_exceptions {
                    println!("    exception: {exception}");
                }
            }
            Err(err) => println!("- {shift_id}: {err}"),
        }
    }

    if skip_billing {
        return Ok(());
    }

    println!("\nBilling run");
    let request = InvoiceRequest {
        business_id: state.business_id.clone(),
        visit_ids: state.visits.iter().map(|visit| visit.id.clone()).collect(),
        issued_on: monday,
    };
    let batch = match state.invoicing.generate(&request, &state.visits, &state.rates) {
        Ok(batch) => batch,
        Err(err) => {
            println!("  Billing unavailable: {err}");
            return Ok(());
        }
    };
    for invoice in &batch.invoices {
        println!(
            "- {} for {}: {} ({} visits)",
            invoice.invoice_number,
            invoice.client_id,
            invoice.total_amount,
            invoice.visit_ids.len()
        );
        for item in &invoice.line_items {
            println!(
                "    {} {} [{}] {} x {} = {}",
                item.visit_id, item.service_type, item.billing_code, item.units, item.rate, item.amount
            );
        }
    }
    print_warnings(&batch.warnings);
    println!("  Batch total: {}", batch.total());

    println!("\nRe-running the same billing request");
    match state.invoicing.generate(&request, &state.visits, &state.rates) {
        Ok(rerun) => {
            println!("- {} new invoices", rerun.invoices.len());
            print_warnings(&rerun.warnings);
        }
        Err(err) => println!("  Billing unavailable: {err}"),
    }

    Ok(())
}

fn print_warnings(warnings: &[BillingWarning]) {
    for warning in warnings {
        let visit: &VisitId = warning.visit_id();
        let detail = match warning {
            BillingWarning::MissingBillingRate { service, .. } => {
                format!("no billing rate for {service}")
            }
            BillingWarning::DuplicateInvoiceAttempt { .. } => "already invoiced".to_string(),
            BillingWarning::UnsignedVisit { .. } => "visit not fully signed".to_string(),
            BillingWarning::NoServicesProvided { .. } => "no services recorded".to_string(),
            BillingWarning::UnknownVisit { .. } => "visit not found".to_string(),
        };
        println!("  warning {visit}: {detail}");
    }
}
