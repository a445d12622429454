use crate::sample::AgencySnapshot;
use chrono::{Local, NaiveDate, NaiveDateTime};
use homecare_engine::billing::{InvoicingService, RateIndex};
use homecare_engine::config::EngineConfig;
use homecare_engine::domain::{
    BusinessId, Caregiver, Client, ClientId, Invoice, InvoiceId, Shift, ShiftId, ShiftStatus,
    TaskAssignment, TaskId, Visit, VisitId,
};
use homecare_engine::evv::{Clock, EvvVerifier, VisitVerificationService};
use homecare_engine::matching::{AssignmentService, SkillMatcher};
use homecare_engine::scheduling::{ConflictDetector, ScheduleScorer, ServiceRequirement};
use homecare_engine::repository::{
    AssignmentRepository, InvoiceRepository, RepositoryError, ShiftRepository,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wall clock for the HTTP adapter; `Fixed` pins time for demos and tests.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ApiClock {
    System,
    Fixed(NaiveDateTime),
}

impl Clock for ApiClock {
    fn now(&self) -> NaiveDateTime {
        match self {
            ApiClock::System => Local::now().naive_local(),
            ApiClock::Fixed(time) => *time,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryShiftRepository {
    shifts: Arc<Mutex<HashMap<ShiftId, Shift>>>,
}

impl InMemoryShiftRepository {
    pub(crate) fn seeded(shifts: impl IntoIterator<Item = Shift>) -> Self {
        let repository = Self::default();
        if let Ok(mut guard) = repository.shifts.lock() {
            guard.extend(shifts.into_iter().map(|shift| (shift.id.clone(), shift)));
        }
        repository
    }

    /// Current copy of every shift, ordered by scheduled start.
    pub(crate) fn all(&self) -> Result<Vec<Shift>, RepositoryError> {
        let mut shifts: Vec<Shift> = lock(&self.shifts)?.values().cloned().collect();
        shifts.sort_by(|left, right| {
            left.scheduled_start
                .cmp(&right.scheduled_start)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(shifts)
    }
}

impl ShiftRepository for InMemoryShiftRepository {
    fn fetch(&self, id: &ShiftId) -> Result<Option<Shift>, RepositoryError> {
        Ok(lock(&self.shifts)?.get(id).cloned())
    }

    fn compare_and_swap(
        &self,
        shift: Shift,
        expected: ShiftStatus,
    ) -> Result<Shift, RepositoryError> {
        let mut guard = lock(&self.shifts)?;
        let found = guard
            .get(&shift.id)
            .map(|current| current.status)
            .ok_or(RepositoryError::NotFound)?;
        if found != expected {
            return Err(RepositoryError::StaleStatus { expected, found });
        }
        guard.insert(shift.id.clone(), shift.clone());
        Ok(shift)
    }
}

/// Visit claims live beside the invoices under one lock, so checking and claiming is atomic.
#[derive(Default, Clone)]
pub(crate) struct InMemoryInvoiceRepository {
    ledger: Arc<Mutex<InvoiceLedger>>,
}

#[derive(Default)]
struct InvoiceLedger {
    invoices: HashMap<InvoiceId, Invoice>,
    claimed: HashMap<VisitId, InvoiceId>,
}

impl InvoiceRepository for InMemoryInvoiceRepository {
    fn billed_visit_ids(&self, visit_ids: &[VisitId]) -> Result<BTreeSet<VisitId>, RepositoryError> {
        let guard = lock(&self.ledger)?;
        Ok(visit_ids
            .iter()
            .filter(|id| guard.claimed.contains_key(*id))
            .cloned()
            .collect())
    }

    fn insert_claiming_visits(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        let mut guard = lock(&self.ledger)?;
        let contested: BTreeSet<VisitId> = invoice
            .visit_ids
            .iter()
            .filter(|id| guard.claimed.contains_key(*id))
            .cloned()
            .collect();
        if !contested.is_empty() {
            return Err(RepositoryError::DuplicateInvoice {
                visit_ids: contested,
            });
        }
        for visit_id in &invoice.visit_ids {
            guard.claimed.insert(visit_id.clone(), invoice.id);
        }
        guard.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    fn fetch(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        Ok(lock(&self.ledger)?.invoices.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAssignmentRepository {
    assignments: Arc<Mutex<HashMap<TaskId, TaskAssignment>>>,
}

impl AssignmentRepository for InMemoryAssignmentRepository {
    fn insert(&self, assignment: TaskAssignment) -> Result<TaskAssignment, RepositoryError> {
        let mut guard = lock(&self.assignments)?;
        if guard.contains_key(&assignment.task_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(assignment.task_id.clone(), assignment.clone());
        Ok(assignment)
    }

    fn fetch(&self, task_id: &TaskId) -> Result<Option<TaskAssignment>, RepositoryError> {
        Ok(lock(&self.assignments)?.get(task_id).cloned())
    }
}

/// Client records the adapter needs to geofence clock events.
#[derive(Default, Clone)]
pub(crate) struct ClientDirectory {
    clients: Arc<HashMap<ClientId, Client>>,
}

impl ClientDirectory {
    pub(crate) fn new(clients: impl IntoIterator<Item = Client>) -> Self {
        Self {
            clients: Arc::new(
                clients
                    .into_iter()
                    .map(|client| (client.id.clone(), client))
                    .collect(),
            ),
        }
    }

    pub(crate) fn get(&self, id: &ClientId) -> Option<&Client> {
        self.clients.get(id)
    }
}

/// Everything the HTTP handlers share: seeded snapshots, the rate index, and the engine services
/// wired to in-memory stores.
pub(crate) struct EngineState {
    pub(crate) business_id: BusinessId,
    pub(crate) caregivers: Vec<Caregiver>,
    pub(crate) requirements: Vec<ServiceRequirement>,
    pub(crate) visits: Vec<Visit>,
    pub(crate) clients: ClientDirectory,
    pub(crate) rates: RateIndex,
    pub(crate) clock: ApiClock,
    pub(crate) shifts: Arc<InMemoryShiftRepository>,
    pub(crate) invoices: Arc<InMemoryInvoiceRepository>,
    pub(crate) scorer: ScheduleScorer,
    pub(crate) detector: ConflictDetector,
    pub(crate) assignments: AssignmentService<InMemoryAssignmentRepository>,
    pub(crate) verification: VisitVerificationService<InMemoryShiftRepository, ApiClock>,
    pub(crate) invoicing: InvoicingService<InMemoryInvoiceRepository>,
}

impl EngineState {
    pub(crate) fn new(
        config: &EngineConfig,
        snapshot: AgencySnapshot,
        rates: RateIndex,
        clock: ApiClock,
    ) -> Self {
        let matcher = SkillMatcher::default();
        let shifts = Arc::new(InMemoryShiftRepository::seeded(snapshot.shifts));
        let invoices = Arc::new(InMemoryInvoiceRepository::default());

        Self {
            business_id: snapshot.business_id,
            caregivers: snapshot.caregivers,
            requirements: snapshot.requirements,
            visits: snapshot.visits,
            clients: ClientDirectory::new(snapshot.clients),
            rates,
            clock,
            scorer: ScheduleScorer::from_config(config),
            detector: ConflictDetector::from_config(matcher.clone(), config),
            assignments: AssignmentService::new(
                Arc::new(InMemoryAssignmentRepository::default()),
                matcher,
            ),
            verification: VisitVerificationService::new(
                shifts.clone(),
                Arc::new(clock),
                EvvVerifier::new(config.evv.clone()),
            ),
            invoicing: InvoicingService::new(invoices.clone()),
            shifts,
            invoices,
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
