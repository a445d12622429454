use std::io::Cursor;

use crate::billing::{parse_rate_sheet, RateIndex, RateSheetError};
use crate::domain::{BusinessId, ClientId, UnitType};
use crate::fixtures::{date, money};

const HEADER: &str =
    "id,business_id,service_type,client_id,billing_code,rate_per_unit,unit_type,active,effective_date\n";

fn sheet(rows: &str) -> Cursor<String> {
    Cursor::new(format!("{HEADER}{rows}"))
}

#[test]
fn parses_default_and_client_scoped_rows() {
    let rates = parse_rate_sheet(sheet(
        "r-1, agency-1, Personal Care, , T1019, 20.00, hourly, true, 2025-01-01\n\
         r-2,agency-1,Personal Care,cl-7,T1019-U1,24.50,15min,,2025-02-01\n\
         r-3,agency-1,Respite,,S5150,180,daily,no,2024-07-01\n",
    ))
    .expect("sheet parses");

    assert_eq!(rates.len(), 3);
    assert_eq!(rates[0].client_id, None);
    assert_eq!(rates[0].service_type, "Personal Care");
    assert_eq!(rates[0].rate_per_unit, money(2000, 2));
    assert_eq!(rates[1].client_id, Some(ClientId::new("cl-7")));
    assert_eq!(rates[1].unit_type, UnitType::FifteenMinute);
    assert!(rates[1].active);
    assert_eq!(rates[1].effective_date, date(2025, 2, 1));
    assert!(!rates[2].active);

    let index = RateIndex::new(rates);
    assert_eq!(index.len(), 2);
    let resolved = index.resolve(
        &BusinessId::new("agency-1"),
        "Personal Care",
        &ClientId::new("cl-7"),
        date(2025, 3, 3),
    );
    assert_eq!(resolved.map(|rate| rate.billing_code.as_str()), Some("T1019-U1"));
}

#[test]
fn reports_row_and_field_for_bad_values() {
    let unknown_unit = parse_rate_sheet(sheet(
        "r-1,agency-1,Personal Care,,T1019,20.00,hourly,true,2025-01-01\n\
         r-2,agency-1,Personal Care,,T1019,20.00,fortnightly,true,2025-01-01\n",
    ));
    match unknown_unit {
        Err(RateSheetError::InvalidRow { row, field, value }) => {
            assert_eq!(row, 2);
            assert_eq!(field, "unit_type");
            assert_eq!(value, "fortnightly");
        }
        other => panic!("expected invalid unit type, got {other:?}"),
    }

    let negative = parse_rate_sheet(sheet("r-1,agency-1,Personal Care,,T1019,-3,hourly,true,2025-01-01\n"));
    assert!(matches!(
        negative,
        Err(RateSheetError::InvalidRow { field: "rate_per_unit", .. })
    ));

    let bad_date = parse_rate_sheet(sheet("r-1,agency-1,Personal Care,,T1019,20,hourly,true,03/01/2025\n"));
    assert!(matches!(
        bad_date,
        Err(RateSheetError::InvalidRow { field: "effective_date", .. })
    ));
}

#[test]
fn structural_problems_surface_as_csv_errors() {
    let result = parse_rate_sheet(Cursor::new("id,business_id\nr-1,agency-1\n"));

    match result {
        Err(error @ RateSheetError::Csv(_)) => {
            assert!(error.to_string().starts_with("invalid rate sheet CSV data"));
        }
        other => panic!("expected csv error, got {other:?}"),
    }
}
