use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for caregivers.
    CaregiverId
);
string_id!(
    /// Identifier wrapper for clients receiving care.
    ClientId
);
string_id!(ShiftId);
string_id!(VisitId);
string_id!(TaskId);
string_id!(
    /// Agency (tenant) owning rates and invoices.
    BusinessId
);
string_id!(BillingRateId);

/// Invoices are minted by the engine, so the id is a UUID rather than a store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub Uuid);

impl InvoiceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn invoice_number(&self) -> String {
        format!("INV-{}", self.0.simple().to_string().to_ascii_uppercase())
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Postal address; `location` is filled in by the entity store when the address has been geocoded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub line: String,
    pub city: String,
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl Address {
    /// Lower-cased, whitespace-collapsed single line used for textual comparisons.
    pub fn normalized(&self) -> String {
        let joined = format!("{} {} {}", self.line, self.city, self.postal_code);
        joined
            .split_whitespace()
            .map(|part| {
                part.trim_matches(|c: char| c == ',' || c == '.')
                    .to_ascii_lowercase()
            })
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaregiverStatus {
    Active,
    Inactive,
    OnLeave,
}

impl CaregiverStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CaregiverStatus::Active => "active",
            CaregiverStatus::Inactive => "inactive",
            CaregiverStatus::OnLeave => "on_leave",
        }
    }
}

/// Weekly availability declared by a caregiver for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caregiver {
    pub id: CaregiverId,
    pub name: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
    #[serde(default)]
    pub address: Address,
    pub status: CaregiverStatus,
}

impl Caregiver {
    pub fn is_active(&self) -> bool {
        self.status == CaregiverStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub insurance_ids: Vec<String>,
}

/// Standard care-task categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskCategory {
    #[serde(rename = "ADL")]
    Adl,
    #[serde(rename = "IADL")]
    Iadl,
}

impl TaskCategory {
    pub const fn label(self) -> &'static str {
        match self {
            TaskCategory::Adl => "ADL",
            TaskCategory::Iadl => "IADL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub const fn label(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareTask {
    pub id: TaskId,
    pub client_id: ClientId,
    pub task_name: String,
    pub category: TaskCategory,
    pub frequency: String,
    pub priority: TaskPriority,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    Accepted,
    Declined,
    Completed,
}

impl AssignmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Accepted => "accepted",
            AssignmentStatus::Declined => "declined",
            AssignmentStatus::Completed => "completed",
        }
    }
}

/// Caregiver ownership of a care task, created by manual scheduling or auto-assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: TaskId,
    pub client_id: ClientId,
    pub caregiver_id: CaregiverId,
    pub task_name: String,
    pub auto_assigned: bool,
    pub status: AssignmentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Scheduled,
    InProgress,
    Completed,
    Missed,
    Cancelled,
}

impl ShiftStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ShiftStatus::Scheduled => "scheduled",
            ShiftStatus::InProgress => "in_progress",
            ShiftStatus::Completed => "completed",
            ShiftStatus::Missed => "missed",
            ShiftStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ShiftStatus::Completed | ShiftStatus::Missed | ShiftStatus::Cancelled
        )
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvvStatus {
    Pending,
    Verified,
    Exception,
}

impl EvvStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EvvStatus::Pending => "pending",
            EvvStatus::Verified => "verified",
            EvvStatus::Exception => "exception",
        }
    }
}

/// Device location fix captured at clock-in or clock-out. `accuracy` is in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsReading {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

impl GpsReading {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Outcome of comparing a GPS fix against the client's registered location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GeofenceStatus {
    InRange { distance_m: f64 },
    OutOfRange { distance_m: f64 },
    /// The client has no coordinates on file, so the fix could not be checked.
    Unverified,
}

impl GeofenceStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            GeofenceStatus::InRange { .. } => "in_range",
            GeofenceStatus::OutOfRange { .. } => "out_of_range",
            GeofenceStatus::Unverified => "unverified",
        }
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(self, GeofenceStatus::OutOfRange { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockEvent {
    pub time: NaiveDateTime,
    pub gps: GpsReading,
    pub geofence: GeofenceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub client_id: ClientId,
    pub caregiver_id: CaregiverId,
    pub scheduled_start: NaiveDateTime,
    pub scheduled_end: NaiveDateTime,
    pub status: ShiftStatus,
    #[serde(default)]
    pub check_in: Option<ClockEvent>,
    #[serde(default)]
    pub check_out: Option<ClockEvent>,
    #[serde(default)]
    pub authorized_hours: Option<f64>,
    #[serde(default)]
    pub actual_hours: Option<f64>,
    pub evv_status: EvvStatus,
    #[serde(default)]
    pub evv_exceptions: Vec<String>,
}

impl Shift {
    /// New shift in the `scheduled` state with no clock events.
    pub fn scheduled(
        id: ShiftId,
        client_id: ClientId,
        caregiver_id: CaregiverId,
        scheduled_start: NaiveDateTime,
        scheduled_end: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            client_id,
            caregiver_id,
            scheduled_start,
            scheduled_end,
            status: ShiftStatus::Scheduled,
            check_in: None,
            check_out: None,
            authorized_hours: None,
            actual_hours: None,
            evv_status: EvvStatus::Pending,
            evv_exceptions: Vec::new(),
        }
    }

    pub fn scheduled_hours(&self) -> f64 {
        let minutes = (self.scheduled_end - self.scheduled_start).num_minutes().max(0);
        minutes as f64 / 60.0
    }

    pub fn service_date(&self) -> NaiveDate {
        self.scheduled_start.date()
    }

    /// Half-open `[start, end)` intersection test.
    pub fn overlaps(&self, other: &Shift) -> bool {
        self.scheduled_start < other.scheduled_end && other.scheduled_start < self.scheduled_end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    Unsigned,
    CaregiverSigned,
    FullySigned,
}

impl SignatureStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SignatureStatus::Unsigned => "unsigned",
            SignatureStatus::CaregiverSigned => "caregiver_signed",
            SignatureStatus::FullySigned => "fully_signed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub client_id: ClientId,
    pub caregiver_id: CaregiverId,
    pub visit_date: NaiveDate,
    pub duration_minutes: u32,
    #[serde(default)]
    pub services_provided: Vec<String>,
    pub signature_status: SignatureStatus,
}

/// Billing quantity basis used to convert visit duration into units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitType {
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "15min")]
    FifteenMinute,
    #[serde(rename = "per_visit")]
    PerVisit,
    #[serde(rename = "daily")]
    Daily,
}

impl UnitType {
    pub const fn label(self) -> &'static str {
        match self {
            UnitType::Hourly => "hourly",
            UnitType::FifteenMinute => "15min",
            UnitType::PerVisit => "per_visit",
            UnitType::Daily => "daily",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hourly" | "hour" => Some(UnitType::Hourly),
            "15min" | "15_min" | "quarter_hour" => Some(UnitType::FifteenMinute),
            "per_visit" | "visit" => Some(UnitType::PerVisit),
            "daily" | "day" => Some(UnitType::Daily),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRate {
    pub id: BillingRateId,
    pub business_id: BusinessId,
    pub service_type: String,
    /// `None` marks the business-wide default rate for the service.
    #[serde(default)]
    pub client_id: Option<ClientId>,
    pub billing_code: String,
    pub rate_per_unit: Decimal,
    pub unit_type: UnitType,
    pub active: bool,
    pub effective_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Submitted,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Submitted => "submitted",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub visit_id: VisitId,
    pub service_type: String,
    pub billing_code: String,
    pub units: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub business_id: BusinessId,
    pub client_id: ClientId,
    pub issued_on: NaiveDate,
    pub visit_ids: BTreeSet<VisitId>,
    pub line_items: Vec<InvoiceLineItem>,
    pub subtotal: Decimal,
    pub total_amount: Decimal,
    pub status: InvoiceStatus,
}
