use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rust_decimal::Decimal;

use crate::domain::{
    Address, AvailabilityWindow, BillingRate, BillingRateId, BusinessId, Caregiver, CaregiverId,
    CaregiverStatus, CareTask, Client, ClientId, GeoPoint, GpsReading, Invoice, InvoiceId, Shift,
    ShiftId, ShiftStatus, SignatureStatus, TaskAssignment, TaskCategory, TaskId, TaskPriority,
    UnitType, Visit, VisitId,
};
use crate::repository::{
    AssignmentRepository, InvoiceRepository, RepositoryError, ShiftRepository,
};

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(crate) fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

/// 2025-03-03 is a Monday.
pub(crate) fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
    date(2025, 3, 3).and_time(time(hour, minute))
}

pub(crate) fn caregiver(id: &str, skills: &[&str]) -> Caregiver {
    Caregiver {
        id: CaregiverId::new(id),
        name: format!("Caregiver {id}"),
        skills: skills.iter().map(|skill| skill.to_string()).collect(),
        availability: Vec::new(),
        address: address("12 Elm Street", "Des Moines", "50309"),
        status: CaregiverStatus::Active,
    }
}

pub(crate) fn window(weekday: Weekday, start: u32, end: u32) -> AvailabilityWindow {
    AvailabilityWindow {
        weekday,
        start_time: time(start, 0),
        end_time: time(end, 0),
    }
}

pub(crate) fn address(line: &str, city: &str, postal_code: &str) -> Address {
    Address {
        line: line.to_string(),
        city: city.to_string(),
        postal_code: postal_code.to_string(),
        location: None,
    }
}

pub(crate) fn located(mut address: Address, latitude: f64, longitude: f64) -> Address {
    address.location = Some(GeoPoint {
        latitude,
        longitude,
    });
    address
}

pub(crate) fn client(id: &str) -> Client {
    Client {
        id: ClientId::new(id),
        name: format!("Client {id}"),
        address: located(
            address("400 Locust Street", "Des Moines", "50309"),
            41.5868,
            -93.6250,
        ),
        insurance_ids: vec!["MCD-1002".to_string()],
    }
}

pub(crate) fn task(id: &str, client_id: &str, name: &str) -> CareTask {
    CareTask {
        id: TaskId::new(id),
        client_id: ClientId::new(client_id),
        task_name: name.to_string(),
        category: TaskCategory::Adl,
        frequency: "daily".to_string(),
        priority: TaskPriority::Medium,
        instructions: String::new(),
    }
}

pub(crate) fn shift(
    id: &str,
    client_id: &str,
    caregiver_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Shift {
    Shift::scheduled(
        ShiftId::new(id),
        ClientId::new(client_id),
        CaregiverId::new(caregiver_id),
        start,
        end,
    )
}

/// Fix taken at the fixture client's front door.
pub(crate) fn gps_at_client() -> GpsReading {
    GpsReading {
        latitude: 41.5868,
        longitude: -93.6250,
        accuracy: 10.0,
    }
}

pub(crate) fn rate(
    id: &str,
    service_type: &str,
    client_id: Option<&str>,
    rate_per_unit: Decimal,
    unit_type: UnitType,
) -> BillingRate {
    BillingRate {
        id: BillingRateId::new(id),
        business_id: BusinessId::new("agency-1"),
        service_type: service_type.to_string(),
        client_id: client_id.map(ClientId::new),
        billing_code: format!("T{}", id.to_ascii_uppercase()),
        rate_per_unit,
        unit_type,
        active: true,
        effective_date: date(2025, 1, 1),
    }
}

pub(crate) fn visit(id: &str, client_id: &str, minutes: u32, services: &[&str]) -> Visit {
    Visit {
        id: VisitId::new(id),
        client_id: ClientId::new(client_id),
        caregiver_id: CaregiverId::new("cg-1"),
        visit_date: date(2025, 3, 3),
        duration_minutes: minutes,
        services_provided: services.iter().map(|service| service.to_string()).collect(),
        signature_status: SignatureStatus::FullySigned,
    }
}

pub(crate) fn money(units: i64, scale: u32) -> Decimal {
    Decimal::new(units, scale)
}

#[derive(Default, Clone)]
pub(crate) struct MemoryShiftRepository {
    pub(crate) shifts: Arc<Mutex<HashMap<ShiftId, Shift>>>,
}

impl MemoryShiftRepository {
    pub(crate) fn with(shifts: Vec<Shift>) -> Self {
        let repository = Self::default();
        {
            let mut guard = repository.shifts.lock().expect("shift mutex poisoned");
            for shift in shifts {
                guard.insert(shift.id.clone(), shift);
            }
        }
        repository
    }

    pub(crate) fn get(&self, id: &str) -> Shift {
        self.shifts
            .lock()
            .expect("shift mutex poisoned")
            .get(&ShiftId::new(id))
            .cloned()
            .expect("shift present")
    }
}

impl ShiftRepository for MemoryShiftRepository {
    fn fetch(&self, id: &ShiftId) -> Result<Option<Shift>, RepositoryError> {
        let guard = self.shifts.lock().expect("shift mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn compare_and_swap(
        &self,
        shift: Shift,
        expected: ShiftStatus,
    ) -> Result<Shift, RepositoryError> {
        let mut guard = self.shifts.lock().expect("shift mutex poisoned");
        let current = guard.get(&shift.id).ok_or(RepositoryError::NotFound)?;
        if current.status != expected {
            return Err(RepositoryError::StaleStatus {
                expected,
                found: current.status,
            });
        }
        guard.insert(shift.id.clone(), shift.clone());
        Ok(shift)
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryInvoiceRepository {
    invoices: Arc<Mutex<HashMap<InvoiceId, Invoice>>>,
}

impl MemoryInvoiceRepository {
    pub(crate) fn invoices(&self) -> Vec<Invoice> {
        self.invoices
            .lock()
            .expect("invoice mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl InvoiceRepository for MemoryInvoiceRepository {
    fn billed_visit_ids(&self, visit_ids: &[VisitId]) -> Result<BTreeSet<VisitId>, RepositoryError> {
        let guard = self.invoices.lock().expect("invoice mutex poisoned");
        Ok(visit_ids
            .iter()
            .filter(|id| guard.values().any(|invoice| invoice.visit_ids.contains(*id)))
            .cloned()
            .collect())
    }

    fn insert_claiming_visits(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        let mut guard = self.invoices.lock().expect("invoice mutex poisoned");
        let contested: BTreeSet<VisitId> = invoice
            .visit_ids
            .iter()
            .filter(|id| guard.values().any(|stored| stored.visit_ids.contains(*id)))
            .cloned()
            .collect();
        if !contested.is_empty() {
            return Err(RepositoryError::DuplicateInvoice {
                visit_ids: contested,
            });
        }
        guard.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    fn fetch(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        let guard = self.invoices.lock().expect("invoice mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryAssignmentRepository {
    assignments: Arc<Mutex<HashMap<TaskId, TaskAssignment>>>,
}

impl AssignmentRepository for MemoryAssignmentRepository {
    fn insert(&self, assignment: TaskAssignment) -> Result<TaskAssignment, RepositoryError> {
        let mut guard = self.assignments.lock().expect("assignment mutex poisoned");
        if guard.contains_key(&assignment.task_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(assignment.task_id.clone(), assignment.clone());
        Ok(assignment)
    }

    fn fetch(&self, task_id: &TaskId) -> Result<Option<TaskAssignment>, RepositoryError> {
        let guard = self.assignments.lock().expect("assignment mutex poisoned");
        Ok(guard.get(task_id).cloned())
    }
}
