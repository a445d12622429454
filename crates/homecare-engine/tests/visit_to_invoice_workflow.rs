//! End-to-end day at the agency: rank caregivers for a client need, auto-assign a care task,
//! verify the visit with clock-in/clock-out, then bill it from an imported rate sheet. Everything
//! runs through the public service facades over in-memory repositories.

mod common {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::{Arc, Mutex};

    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use homecare_engine::domain::{
        Address, Caregiver, CaregiverId, CaregiverStatus, Client, ClientId, GeoPoint, GpsReading,
        Invoice, InvoiceId, Shift, ShiftId, ShiftStatus, TaskAssignment, TaskId, VisitId,
    };
    use homecare_engine::evv::Clock;
    use homecare_engine::repository::{
        AssignmentRepository, InvoiceRepository, RepositoryError, ShiftRepository,
    };

    pub(super) fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .expect("valid date")
            .and_time(NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time"))
    }

    pub(super) fn client() -> Client {
        Client {
            id: ClientId::new("cl-ruth"),
            name: "Ruth Alvarez".to_string(),
            address: Address {
                line: "400 Locust Street".to_string(),
                city: "Des Moines".to_string(),
                postal_code: "50309".to_string(),
                location: Some(GeoPoint {
                    latitude: 41.5868,
                    longitude: -93.6250,
                }),
            },
            insurance_ids: vec!["MCD-1002".to_string()],
        }
    }

    pub(super) fn caregivers() -> Vec<Caregiver> {
        let caregiver = |id: &str, skills: &[&str], status: CaregiverStatus| Caregiver {
            id: CaregiverId::new(id),
            name: format!("Caregiver {id}"),
            skills: skills.iter().map(|skill| skill.to_string()).collect(),
            availability: Vec::new(),
            address: Address {
                line: "18 Grand Avenue".to_string(),
                city: "Des Moines".to_string(),
                postal_code: "50309".to_string(),
                location: Some(GeoPoint {
                    latitude: 41.5890,
                    longitude: -93.6300,
                }),
            },
            status,
        };
        vec![
            caregiver("cg-ana", &["Personal Care", "Bathing Assistance"], CaregiverStatus::Active),
            caregiver("cg-ben", &["Companionship"], CaregiverStatus::Active),
            caregiver("cg-cai", &["Personal Care"], CaregiverStatus::OnLeave),
        ]
    }

    pub(super) fn gps_at_home() -> GpsReading {
        GpsReading {
            latitude: 41.5869,
            longitude: -93.6251,
            accuracy: 8.0,
        }
    }

    pub(super) struct ManualClock(Mutex<NaiveDateTime>);

    impl ManualClock {
        pub(super) fn starting_at(time: NaiveDateTime) -> Arc<Self> {
            Arc::new(Self(Mutex::new(time)))
        }

        pub(super) fn advance_to(&self, time: NaiveDateTime) {
            *self.0.lock().expect("clock mutex poisoned") = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.0.lock().expect("clock mutex poisoned")
        }
    }

    #[derive(Default)]
    pub(super) struct InMemoryShifts {
        shifts: Mutex<HashMap<ShiftId, Shift>>,
    }

    impl InMemoryShifts {
        pub(super) fn seeded(shift: Shift) -> Self {
            let repository = Self::default();
            repository
                .shifts
                .lock()
                .expect("shift mutex poisoned")
                .insert(shift.id.clone(), shift);
            repository
        }
    }

    impl ShiftRepository for InMemoryShifts {
        fn fetch(&self, id: &ShiftId) -> Result<Option<Shift>, RepositoryError> {
            Ok(self.shifts.lock().expect("shift mutex poisoned").get(id).cloned())
        }

        fn compare_and_swap(
            &self,
            shift: Shift,
            expected: ShiftStatus,
        ) -> Result<Shift, RepositoryError> {
            let mut guard = self.shifts.lock().expect("shift mutex poisoned");
            let found = guard.get(&shift.id).ok_or(RepositoryError::NotFound)?.status;
            if found != expected {
                return Err(RepositoryError::StaleStatus { expected, found });
            }
            guard.insert(shift.id.clone(), shift.clone());
            Ok(shift)
        }
    }

    #[derive(Default)]
    pub(super) struct InMemoryInvoices {
        invoices: Mutex<Vec<Invoice>>,
    }

    impl InMemoryInvoices {
        pub(super) fn all(&self) -> Vec<Invoice> {
            self.invoices.lock().expect("invoice mutex poisoned").clone()
        }
    }

    impl InvoiceRepository for InMemoryInvoices {
        fn billed_visit_ids(
            &self,
            visit_ids: &[VisitId],
        ) -> Result<BTreeSet<VisitId>, RepositoryError> {
            let guard = self.invoices.lock().expect("invoice mutex poisoned");
            Ok(visit_ids
                .iter()
                .filter(|id| guard.iter().any(|invoice| invoice.visit_ids.contains(*id)))
                .cloned()
                .collect())
        }

        fn insert_claiming_visits(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
            let mut guard = self.invoices.lock().expect("invoice mutex poisoned");
            let contested: BTreeSet<VisitId> = invoice
                .visit_ids
                .iter()
                .filter(|id| guard.iter().any(|stored| stored.visit_ids.contains(*id)))
                .cloned()
                .collect();
            if !contested.is_empty() {
                return Err(RepositoryError::DuplicateInvoice {
                    visit_ids: contested,
                });
            }
            guard.push(invoice.clone());
            Ok(invoice)
        }

        fn fetch(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
            let guard = self.invoices.lock().expect("invoice mutex poisoned");
            Ok(guard.iter().find(|invoice| invoice.id == *id).cloned())
        }
    }

    #[derive(Default)]
    pub(super) struct InMemoryAssignments {
        assignments: Mutex<HashMap<TaskId, TaskAssignment>>,
    }

    impl AssignmentRepository for InMemoryAssignments {
        fn insert(&self, assignment: TaskAssignment) -> Result<TaskAssignment, RepositoryError> {
            let mut guard = self.assignments.lock().expect("assignment mutex poisoned");
            if guard.contains_key(&assignment.task_id) {
                return Err(RepositoryError::Conflict);
            }
            guard.insert(assignment.task_id.clone(), assignment.clone());
            Ok(assignment)
        }

        fn fetch(&self, task_id: &TaskId) -> Result<Option<TaskAssignment>, RepositoryError> {
            Ok(self
                .assignments
                .lock()
                .expect("assignment mutex poisoned")
                .get(task_id)
                .cloned())
        }
    }
}

use std::io::Cursor;
use std::sync::Arc;

use common::*;
use homecare_engine::billing::{
    parse_rate_sheet, BillingWarning, InvoiceRequest, InvoicingService, RateIndex,
};
use homecare_engine::config::{DistanceEstimatorKind, EngineConfig};
use homecare_engine::domain::{
    BusinessId, CareTask, CaregiverId, EvvStatus, Shift, ShiftId, ShiftStatus, SignatureStatus,
    TaskCategory, TaskId, TaskPriority, Visit, VisitId,
};
use homecare_engine::evv::{EvvVerifier, VisitVerificationService};
use homecare_engine::matching::{AssignmentService, AssignmentWindow, SkillMatcher};
use homecare_engine::scheduling::{ClientNeed, ScheduleScorer};
use rust_decimal::Decimal;

const RATE_SHEET: &str = "\
id,business_id,service_type,client_id,billing_code,rate_per_unit,unit_type,active,effective_date
r-pc,agency-1,Personal Care,,T1019,20.00,hourly,true,2025-01-01
r-pc-ruth,agency-1,Personal Care,cl-ruth,T1019-U3,22.00,hourly,true,2025-02-01
r-comp,agency-1,Companionship,,S5135,5.00,15min,true,2025-01-01
";

#[test]
fn suggested_caregiver_is_assigned_verified_and_billed() {
    let mut config = EngineConfig::default();
    config.distance.estimator = DistanceEstimatorKind::Haversine;
    let client = client();
    let caregivers = caregivers();

    let need = ClientNeed {
        client: client.clone(),
        start: monday_at(9, 0),
        end: monday_at(13, 0),
    };
    let suggestions = ScheduleScorer::from_config(&config)
        .suggest(&need, &caregivers, &[])
        .expect("suggestions available");
    assert_eq!(suggestions.len(), 2, "on-leave caregivers are never suggested");
    assert_eq!(suggestions[0].caregiver_id, CaregiverId::new("cg-ana"));
    assert!(!suggestions[0].distance_estimated);

    let task = CareTask {
        id: TaskId::new("task-bath"),
        client_id: client.id.clone(),
        task_name: "Bathing".to_string(),
        category: TaskCategory::Adl,
        frequency: "daily".to_string(),
        priority: TaskPriority::High,
        instructions: "Use the shower chair".to_string(),
    };
    let assignments = AssignmentService::new(Arc::new(InMemoryAssignments::default()), SkillMatcher::default());
    let outcome = assignments
        .auto_assign(
            &task,
            &caregivers,
            Some(AssignmentWindow {
                start: need.start,
                end: need.end,
            }),
        )
        .expect("task assigned");
    assert_eq!(outcome.assignment.caregiver_id, suggestions[0].caregiver_id);
    assert!(outcome.assignment.auto_assigned);

    let mut shift = Shift::scheduled(
        ShiftId::new("sh-1"),
        client.id.clone(),
        outcome.assignment.caregiver_id.clone(),
        need.start,
        need.end,
    );
    shift.authorized_hours = Some(4.0);
    let shifts = Arc::new(InMemoryShifts::seeded(shift));
    let clock = ManualClock::starting_at(monday_at(9, 4));
    let verification = VisitVerificationService::new(shifts, clock.clone(), EvvVerifier::new(config.evv.clone()));

    let started = verification
        .clock_in(&ShiftId::new("sh-1"), &client, Some(gps_at_home()))
        .expect("clock in");
    assert_eq!(started.status, ShiftStatus::InProgress);

    clock.advance_to(monday_at(12, 55));
    let completed = verification
        .clock_out(&ShiftId::new("sh-1"), &client, Some(gps_at_home()))
        .expect("clock out");
    assert_eq!(completed.status, ShiftStatus::Completed);
    assert_eq!(completed.evv_status, EvvStatus::Verified);
    assert_eq!(completed.actual_hours, Some(3.85));

    let visit = Visit {
        id: VisitId::new("visit-1"),
        client_id: client.id.clone(),
        caregiver_id: completed.caregiver_id.clone(),
        visit_date: completed.service_date(),
        duration_minutes: 231,
        services_provided: vec!["Personal Care".to_string(), "Companionship".to_string()],
        signature_status: SignatureStatus::FullySigned,
    };
    let rates = RateIndex::new(parse_rate_sheet(Cursor::new(RATE_SHEET)).expect("rate sheet"));
    let invoices = Arc::new(InMemoryInvoices::default());
    let billing = InvoicingService::new(invoices.clone());
    let request = InvoiceRequest {
        business_id: BusinessId::new("agency-1"),
        visit_ids: vec![visit.id.clone()],
        issued_on: monday_at(18, 0).date(),
    };

    let batch = billing
        .generate(&request, std::slice::from_ref(&visit), &rates)
        .expect("billing run");
    assert!(batch.warnings.is_empty());
    let invoice = &batch.invoices[0];
    // Personal Care at the client rate: 3.85h x 22.00 = 84.70
    // Companionship: 15.4 units x 5.00 = 77.00
    assert_eq!(invoice.line_items[0].billing_code, "T1019-U3");
    assert_eq!(invoice.line_items[0].amount, Decimal::new(8470, 2));
    assert_eq!(invoice.line_items[1].amount, Decimal::new(7700, 2));
    assert_eq!(invoice.total_amount, Decimal::new(16170, 2));

    let rerun = billing
        .generate(&request, std::slice::from_ref(&visit), &rates)
        .expect("second billing run");
    assert!(rerun.invoices.is_empty());
    assert_eq!(
        rerun.warnings,
        vec![BillingWarning::DuplicateInvoiceAttempt {
            visit_id: visit.id.clone()
        }]
    );
    assert_eq!(invoices.all().len(), 1);
}

#[test]
fn late_clock_in_surfaces_as_verification_exception() {
    let client = client();
    let shift = Shift::scheduled(
        ShiftId::new("sh-2"),
        client.id.clone(),
        CaregiverId::new("cg-ben"),
        monday_at(9, 0),
        monday_at(11, 0),
    );
    let clock = ManualClock::starting_at(monday_at(9, 20));
    let verification = VisitVerificationService::new(
        Arc::new(InMemoryShifts::seeded(shift)),
        clock.clone(),
        EvvVerifier::default(),
    );

    verification
        .clock_in(&ShiftId::new("sh-2"), &client, Some(gps_at_home()))
        .expect("clock in");
    clock.advance_to(monday_at(11, 0));
    let completed = verification
        .clock_out(&ShiftId::new("sh-2"), &client, Some(gps_at_home()))
        .expect("clock out");

    assert_eq!(completed.evv_status, EvvStatus::Exception);
    assert_eq!(completed.evv_exceptions, vec!["Late arrival (>15 min)".to_string()]);
}
