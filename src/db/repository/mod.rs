//! Repository layer: entity-scoped database operations.
//!
//! Each sub-module owns the SQL for one table. Functions take a borrowed
//! `Connection` so callers can run several of them inside one transaction.

mod catalog;
mod known_material;
mod lab_exam;
mod patient;
mod procedure;

use chrono::NaiveDateTime;

pub use catalog::*;
pub use known_material::*;
pub use lab_exam::*;
pub use patient::*;
pub use procedure::*;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Lenient: rows written by other tools may carry RFC 3339 timestamps.
pub(crate) fn parse_timestamp(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.naive_utc())
        })
        .unwrap_or_default()
}

pub(crate) fn now_timestamp() -> NaiveDateTime {
    // Second precision, matching what the columns store.
    let now = chrono::Local::now().naive_local();
    NaiveDateTime::parse_from_str(&format_timestamp(&now), TIMESTAMP_FORMAT).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::*;
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn make_item(conn: &Connection, name: &str, active: bool) -> CatalogItem {
        let now = now_timestamp();
        let item = CatalogItem {
            id: Uuid::new_v4(),
            name: name.into(),
            base_price: d("150"),
            labor_cost: d("50"),
            mobility_cost: d("20"),
            total_cost: d("80.5"),
            utility: d("69.5"),
            is_active: active,
            created_at: now,
            updated_at: now,
            materials: Vec::new(),
        };
        insert_catalog_item(conn, &item).unwrap();
        item
    }

    fn make_patient(conn: &Connection, name: &str) -> Patient {
        let patient = Patient {
            id: Uuid::new_v4(),
            full_name: name.into(),
            document_number: Some("45879632".into()),
            phone: None,
            address: None,
            is_active: true,
            created_at: now_timestamp(),
        };
        insert_patient(conn, &patient).unwrap();
        patient
    }

    fn make_record(date: &str, patient_id: Option<Uuid>) -> ProcedureRecord {
        let now = now_timestamp();
        ProcedureRecord {
            id: Uuid::new_v4(),
            date: date.into(),
            patient_id,
            catalog_item_id: None,
            quantity: 1,
            payments: PaymentAmounts::default(),
            expenses: ProcedureExpenses::default(),
            utility: None,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn timestamp_round_trip() {
        let now = now_timestamp();
        assert_eq!(parse_timestamp(&format_timestamp(&now)), now);
    }

    #[test]
    fn timestamp_accepts_rfc3339() {
        let ts = parse_timestamp("2025-01-05T10:00:00Z");
        assert_eq!(format_timestamp(&ts), "2025-01-05 10:00:00");
    }

    #[test]
    fn catalog_item_insert_and_retrieve() {
        let conn = test_db();
        let item = make_item(&conn, "Curación simple", true);
        let loaded = get_catalog_item(&conn, &item.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Curación simple");
        assert_eq!(loaded.total_cost, d("80.5"));
        assert_eq!(loaded.utility, d("69.5"));
        assert!(loaded.is_active);
        assert!(loaded.materials.is_empty());
    }

    #[test]
    fn inactive_catalog_item_still_resolves_by_id() {
        let conn = test_db();
        let item = make_item(&conn, "Retired", true);
        set_catalog_item_active(&conn, &item.id, false, &now_timestamp()).unwrap();

        let loaded = get_catalog_item(&conn, &item.id).unwrap().unwrap();
        assert!(!loaded.is_active);
        assert_eq!(get_catalog_total_cost(&conn, &item.id).unwrap(), Some(d("80.5")));
    }

    #[test]
    fn active_filter_hides_deactivated_items() {
        let conn = test_db();
        make_item(&conn, "Inyectable", true);
        make_item(&conn, "Sonda", false);

        let active = list_catalog_items(&conn, &CatalogFilter { active_only: true, ..Default::default() }).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Inyectable");

        let all = list_catalog_items(&conn, &CatalogFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        // Report labels need retired items too.
        let mut names: Vec<String> = catalog_item_names(&conn).unwrap().into_iter().map(|(_, n)| n).collect();
        names.sort();
        assert_eq!(names, vec!["Inyectable", "Sonda"]);
    }

    #[test]
    fn catalog_name_search() {
        let conn = test_db();
        make_item(&conn, "Toma de muestra", true);
        make_item(&conn, "Curación", true);
        let filter = CatalogFilter { active_only: true, name_contains: Some("muestra".into()) };
        let found = list_catalog_items(&conn, &filter).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn find_by_name_is_case_insensitive_and_active_only() {
        let conn = test_db();
        make_item(&conn, "Toma de Muestra", true);
        assert!(find_active_catalog_item_by_name(&conn, "toma de muestra").unwrap().is_some());

        let conn = test_db();
        make_item(&conn, "Toma de muestra", false);
        assert!(find_active_catalog_item_by_name(&conn, "toma de muestra").unwrap().is_none());
    }

    #[test]
    fn deactivate_unknown_item_is_not_found() {
        let conn = test_db();
        let err = set_catalog_item_active(&conn, &Uuid::new_v4(), false, &now_timestamp()).unwrap_err();
        assert!(matches!(err, crate::db::DatabaseError::NotFound { .. }));
    }

    #[test]
    fn materials_replace_wholesale() {
        let conn = test_db();
        let item = make_item(&conn, "Curación", true);
        let first = vec![CatalogMaterial {
            id: Uuid::new_v4(),
            catalog_item_id: item.id,
            name: "gasa".into(),
            quantity: d("2"),
            unit_cost: d("3.5"),
            sort_order: 0,
        }];
        replace_catalog_materials(&conn, &item.id, &first).unwrap();

        let second = vec![
            CatalogMaterial {
                id: Uuid::new_v4(),
                catalog_item_id: item.id,
                name: "guantes".into(),
                quantity: d("1"),
                unit_cost: d("0.8"),
                sort_order: 0,
            },
            CatalogMaterial {
                id: Uuid::new_v4(),
                catalog_item_id: item.id,
                name: "alcohol".into(),
                quantity: d("1"),
                unit_cost: d("2"),
                sort_order: 1,
            },
        ];
        replace_catalog_materials(&conn, &item.id, &second).unwrap();

        let loaded = get_catalog_materials(&conn, &item.id).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "guantes");
        assert_eq!(loaded[1].name, "alcohol");
        assert!(loaded.iter().all(|m| m.id != first[0].id));
    }

    #[test]
    fn known_materials_are_unique() {
        let conn = test_db();
        let now = now_timestamp();
        assert!(insert_known_material_if_missing(&conn, "gasa", &now).unwrap());
        assert!(!insert_known_material_if_missing(&conn, "gasa", &now).unwrap());
        insert_known_material_if_missing(&conn, "guantes", &now).unwrap();

        let found = search_known_materials(&conn, "GA", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "gasa");
    }

    #[test]
    fn known_material_search_escapes_wildcards() {
        let conn = test_db();
        insert_known_material_if_missing(&conn, "gasa", &now_timestamp()).unwrap();
        assert!(search_known_materials(&conn, "%", 10).unwrap().is_empty());
    }

    #[test]
    fn procedure_record_round_trip_keeps_null_utility() {
        let conn = test_db();
        let mut record = make_record("2025-01-05T10:00:00Z", None);
        record.payments.yape = Some(d("100"));
        record.expenses.material_expense = Some(d("5"));
        insert_procedure_record(&conn, &record).unwrap();

        let loaded = get_procedure_record(&conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded.date, "2025-01-05T10:00:00Z");
        assert_eq!(loaded.payments.yape, Some(d("100")));
        assert_eq!(loaded.payments.cash, None);
        assert_eq!(loaded.utility, None);
    }

    #[test]
    fn set_utility_only_fills_null() {
        let conn = test_db();
        let record = make_record("2025-01-05", None);
        insert_procedure_record(&conn, &record).unwrap();

        set_procedure_utility(&conn, &record.id, &d("55")).unwrap();
        set_procedure_utility(&conn, &record.id, &d("99")).unwrap();
        let loaded = get_procedure_record(&conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded.utility, Some(d("55")));
    }

    #[test]
    fn procedure_filters_by_day_key_and_patient() {
        let conn = test_db();
        let ana = make_patient(&conn, "Ana Torres");
        let luis = make_patient(&conn, "Luis Rojas");
        insert_procedure_record(&conn, &make_record("2025-01-05T23:00:00Z", Some(ana.id))).unwrap();
        insert_procedure_record(&conn, &make_record("2025-01-06", Some(ana.id))).unwrap();
        insert_procedure_record(&conn, &make_record("2025-01-07", Some(luis.id))).unwrap();

        let filter = ProcedureFilter {
            date_from: Some("2025-01-05".into()),
            date_to: Some("2025-01-06".into()),
            ..Default::default()
        };
        assert_eq!(list_procedure_records(&conn, &filter).unwrap().len(), 2);
        assert_eq!(count_procedure_records(&conn, &filter).unwrap(), 2);

        let filter = ProcedureFilter { patient_id: Some(luis.id), ..Default::default() };
        let luis_records = list_procedure_records(&conn, &filter).unwrap();
        assert_eq!(luis_records.len(), 1);
        assert_eq!(luis_records[0].date, "2025-01-07");
    }

    #[test]
    fn procedure_pagination() {
        let conn = test_db();
        for day in 1..=5 {
            insert_procedure_record(&conn, &make_record(&format!("2025-02-0{day}"), None)).unwrap();
        }
        let filter = ProcedureFilter { page: Some(Page::new(2, 2)), ..Default::default() };
        let page = list_procedure_records(&conn, &filter).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].date, "2025-02-03");
        assert_eq!(count_procedure_records(&conn, &filter).unwrap(), 5);
    }

    #[test]
    fn delete_missing_procedure_is_not_found() {
        let conn = test_db();
        assert!(delete_procedure_record(&conn, &Uuid::new_v4()).is_err());
    }

    #[test]
    fn lab_exams_by_ids_preserve_order() {
        let conn = test_db();
        let a = LabExam { id: Uuid::new_v4(), code: "HEM01".into(), name: "Hemograma".into(), price: "S/ 45.00".into(), is_active: true };
        let b = LabExam { id: Uuid::new_v4(), code: "GLU01".into(), name: "Glucosa".into(), price: "S/ 35.00".into(), is_active: true };
        insert_lab_exam(&conn, &a).unwrap();
        insert_lab_exam(&conn, &b).unwrap();

        let picked = get_lab_exams_by_ids(&conn, &[b.id, Uuid::new_v4(), a.id]).unwrap();
        let codes: Vec<_> = picked.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["GLU01", "HEM01"]);

        let searched = list_lab_exams(&conn, Some("hemo")).unwrap();
        assert_eq!(searched.len(), 1);
    }

    #[test]
    fn patient_search_matches_name_or_document() {
        let conn = test_db();
        make_patient(&conn, "Ana Torres");
        make_patient(&conn, "Luis Rojas");

        let filter = PatientFilter { name_contains: Some("tor".into()), ..Default::default() };
        assert_eq!(list_patients(&conn, &filter).unwrap().len(), 1);

        let filter = PatientFilter { name_contains: Some("4587".into()), ..Default::default() };
        assert_eq!(list_patients(&conn, &filter).unwrap().len(), 2);

        assert_eq!(patient_names(&conn).unwrap().len(), 2);
    }
}
