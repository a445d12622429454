use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use homecare_engine::domain::{
    Address, AvailabilityWindow, BillingRate, BillingRateId, BusinessId, CareTask, Caregiver,
    CaregiverId, CaregiverStatus, Client, ClientId, GeoPoint, Shift, ShiftId, ShiftStatus,
    SignatureStatus, TaskCategory, TaskId, TaskPriority, UnitType, Visit, VisitId,
};
use homecare_engine::scheduling::ServiceRequirement;
use rust_decimal::Decimal;

pub(crate) const SAMPLE_BUSINESS: &str = "heartland-home-care";

/// One agency week of records, as the entity store would hand them to the engine.
#[derive(Debug, Clone)]
pub(crate) struct AgencySnapshot {
    pub(crate) business_id: BusinessId,
    pub(crate) clients: Vec<Client>,
    pub(crate) caregivers: Vec<Caregiver>,
    pub(crate) tasks: Vec<CareTask>,
    pub(crate) shifts: Vec<Shift>,
    pub(crate) visits: Vec<Visit>,
    pub(crate) requirements: Vec<ServiceRequirement>,
}

/// Monday on or before `date`.
pub(crate) fn week_start_for(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn at(day: NaiveDate, hour: u32) -> NaiveDateTime {
    day.and_time(clock(hour))
}

fn clock(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn address(line: &str, city: &str, postal_code: &str, location: Option<(f64, f64)>) -> Address {
    Address {
        line: line.to_string(),
        city: city.to_string(),
        postal_code: postal_code.to_string(),
        location: location.map(|(latitude, longitude)| GeoPoint {
            latitude,
            longitude,
        }),
    }
}

fn weekdays(days: &[Weekday], start: u32, end: u32) -> Vec<AvailabilityWindow> {
    days.iter()
        .map(|weekday| AvailabilityWindow {
            weekday: *weekday,
            start_time: clock(start),
            end_time: clock(end),
        })
        .collect()
}

fn caregiver(
    id: &str,
    name: &str,
    skills: &[&str],
    availability: Vec<AvailabilityWindow>,
    home: Address,
    status: CaregiverStatus,
) -> Caregiver {
    Caregiver {
        id: CaregiverId::new(id),
        name: name.to_string(),
        skills: skills.iter().map(|skill| skill.to_string()).collect(),
        availability,
        address: home,
        status,
    }
}

fn shift(
    id: &str,
    client: &str,
    caregiver: &str,
    start: NaiveDateTime,
    hours: i64,
) -> Shift {
    let mut shift = Shift::scheduled(
        ShiftId::new(id),
        ClientId::new(client),
        CaregiverId::new(caregiver),
        start,
        start + Duration::hours(hours),
    );
    shift.authorized_hours = Some(hours as f64);
    shift
}

fn visit(
    id: &str,
    client: &str,
    caregiver: &str,
    visit_date: NaiveDate,
    duration_minutes: u32,
    services: &[&str],
    signature_status: SignatureStatus,
) -> Visit {
    Visit {
        id: VisitId::new(id),
        client_id: ClientId::new(client),
        caregiver_id: CaregiverId::new(caregiver),
        visit_date,
        duration_minutes,
        services_provided: services.iter().map(|service| service.to_string()).collect(),
        signature_status,
    }
}

fn requirement(client: &str, weekday: Weekday, start: u32, end: u32, task: &str) -> ServiceRequirement {
    ServiceRequirement {
        client_id: ClientId::new(client),
        weekday,
        start_time: clock(start),
        end_time: clock(end),
        task_name: task.to_string(),
    }
}

pub(crate) fn sample_agency(week_start: NaiveDate) -> AgencySnapshot {
    let monday = week_start_for(week_start);
    let day = |offset: i64| monday + Duration::days(offset);
    let working_week = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    let clients = vec![
        Client {
            id: ClientId::new("cl-ruth"),
            name: "Ruth Alvarez".to_string(),
            address: address("400 Locust Street", "Des Moines", "50309", Some((41.5868, -93.6250))),
            insurance_ids: vec!["IA-MCD-1002".to_string()],
        },
        Client {
            id: ClientId::new("cl-omar"),
            name: "Omar Haddad".to_string(),
            address: address("1500 Grand Avenue", "West Des Moines", "50265", Some((41.5772, -93.7113))),
            insurance_ids: vec!["IA-WAIVER-77".to_string()],
        },
        Client {
            id: ClientId::new("cl-june"),
            name: "June Park".to_string(),
            address: address("210 SE Delaware Avenue", "Ankeny", "50021", None),
            insurance_ids: Vec::new(),
        },
    ];

    let caregivers = vec![
        caregiver(
            "cg-ana",
            "Ana Ruiz",
            &["Personal Care", "Bathing Assistance", "Medication Management"],
            weekdays(&working_week, 7, 19),
            address("18 Grand Avenue", "Des Moines", "50309", Some((41.5890, -93.6300))),
            CaregiverStatus::Active,
        ),
        caregiver(
            "cg-ben",
            "Ben Okafor",
            &["Companionship", "Meal Preparation", "Housekeeping"],
            weekdays(&[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Fri], 8, 16),
            address("3100 Ingersoll Avenue", "Des Moines", "50312", Some((41.5853, -93.6650))),
            CaregiverStatus::Active,
        ),
        caregiver(
            "cg-cai",
            "Cai Nguyen",
            &["Personal Care", "Mobility Assistance"],
            Vec::new(),
            address("905 N Ankeny Boulevard", "Ankeny", "50023", Some((41.7400, -93.6010))),
            CaregiverStatus::Active,
        ),
        caregiver(
            "cg-dee",
            "Dee Larson",
            &["Personal Care", "Companionship"],
            Vec::new(),
            address("77 Walnut Street", "Des Moines", "50309", None),
            CaregiverStatus::OnLeave,
        ),
    ];

    let tasks = vec![
        CareTask {
            id: TaskId::new("task-bath-ruth"),
            client_id: ClientId::new("cl-ruth"),
            task_name: "Bathing".to_string(),
            category: TaskCategory::Adl,
            frequency: "daily".to_string(),
            priority: TaskPriority::High,
            instructions: "Shower chair in hall closet".to_string(),
        },
        CareTask {
            id: TaskId::new("task-meals-omar"),
            client_id: ClientId::new("cl-omar"),
            task_name: "Meal Preparation".to_string(),
            category: TaskCategory::Iadl,
            frequency: "3x weekly".to_string(),
            priority: TaskPriority::Medium,
            instructions: "Low sodium".to_string(),
        },
    ];

    let mut cancelled = shift("sh-105", "cl-june", "cg-cai", at(day(3), 10), 2);
    cancelled.status = ShiftStatus::Cancelled;
    let shifts = vec![
        shift("sh-101", "cl-ruth", "cg-ana", at(day(0), 9), 4),
        shift("sh-102", "cl-omar", "cg-ana", at(day(0), 12), 3),
        shift("sh-103", "cl-june", "cg-ben", at(day(1), 10), 2),
        shift("sh-104", "cl-ruth", "cg-ana", at(day(2), 9), 4),
        cancelled,
    ];

    let last_week = |offset: i64| monday - Duration::days(7) + Duration::days(offset);
    let visits = vec![
        visit(
            "visit-901",
            "cl-ruth",
            "cg-ana",
            last_week(0),
            240,
            &["Personal Care", "Medication Reminder"],
            SignatureStatus::FullySigned,
        ),
        visit(
            "visit-902",
            "cl-omar",
            "cg-ben",
            last_week(2),
            180,
            &["Companionship", "Meal Preparation", "Housekeeping"],
            SignatureStatus::FullySigned,
        ),
        visit(
            "visit-903",
            "cl-june",
            "cg-ben",
            last_week(4),
            120,
            &["Companionship"],
            SignatureStatus::CaregiverSigned,
        ),
        visit(
            "visit-904",
            "cl-ruth",
            "cg-cai",
            last_week(3),
            90,
            &["Personal Care"],
            SignatureStatus::FullySigned,
        ),
    ];

    let requirements = vec![
        requirement("cl-ruth", Weekday::Mon, 9, 13, "Bathing"),
        requirement("cl-omar", Weekday::Thu, 14, 16, "Meal Preparation"),
        requirement("cl-june", Weekday::Fri, 10, 12, "Companionship"),
    ];

    AgencySnapshot {
        business_id: BusinessId::new(SAMPLE_BUSINESS),
        clients,
        caregivers,
        tasks,
        shifts,
        visits,
        requirements,
    }
}

pub(crate) fn sample_rates() -> Vec<BillingRate> {
    let effective_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN);
    let rate = |id: &str, service: &str, client: Option<&str>, code: &str, cents: i64, unit_type: UnitType| {
        BillingRate {
            id: BillingRateId::new(id),
            business_id: BusinessId::new(SAMPLE_BUSINESS),
            service_type: service.to_string(),
            client_id: client.map(ClientId::new),
            billing_code: code.to_string(),
            rate_per_unit: Decimal::new(cents, 2),
            unit_type,
            active: true,
            effective_date,
        }
    };

    vec![
        rate("rate-pc", "Personal Care", None, "T1019", 2400, UnitType::Hourly),
        rate("rate-pc-ruth", "Personal Care", Some("cl-ruth"), "T1019-U3", 2650, UnitType::Hourly),
        rate("rate-comp", "Companionship", None, "S5135", 625, UnitType::FifteenMinute),
        rate("rate-meal", "Meal Preparation", None, "S5130", 550, UnitType::FifteenMinute),
        rate("rate-med", "Medication Reminder", None, "T1502", 1200, UnitType::PerVisit),
    ]
}
