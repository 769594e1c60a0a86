//! PostgreSQL back-end tests. Run with `TEST_DATABASE_URL` set and `--ignored`.

use chrono::NaiveDate;
use reservation_service::models::{ReservationDraft, ReservationStatus, TimeWindow, UserRole};
use reservation_service::services::{
    AvailabilityStore, Database, ReservationStore, UserDirectory,
};
use std::sync::Arc;

async fn database() -> Database {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let db = Database::new(&url, 8).await.expect("Failed to connect");
    db.run_migrations().await.expect("Failed to migrate");
    db
}

fn unique_id() -> i64 {
    (uuid::Uuid::new_v4().as_u128() & 0x7fff_ffff) as i64
}

fn draft(user_id: i64, section_id: i64, start: &str, end: &str) -> ReservationDraft {
    ReservationDraft {
        user_id,
        section_id,
        project_id: None,
        date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        window: TimeWindow::parse(start, end).unwrap(),
        status: ReservationStatus::Pending,
        notes: None,
    }
}

#[tokio::test]
#[ignore]
async fn advisory_lock_admits_one_of_many_writers() {
    let db = Arc::new(database().await);
    let user = unique_id();
    let section = unique_id();
    db.find_or_create_user(user, "Ada", "Lovelace").await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                db.insert_unless_overlapping(draft(user, section, "09:00", "11:00"))
                    .await
                    .unwrap()
                    .is_some()
            })
        })
        .collect();

    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);

    let adjacent = db
        .insert_unless_overlapping(draft(user, section, "11:00", "12:00"))
        .await
        .unwrap();
    assert!(adjacent.is_some());
}

#[tokio::test]
#[ignore]
async fn covering_approvers_requires_role_and_full_cover() {
    let db = database().await;
    let approver = unique_id();
    db.find_or_create_user(approver, "Grace", "Hopper").await.unwrap();
    let date = NaiveDate::from_ymd_opt(2031, 1, 15).unwrap();
    let declared = TimeWindow::parse("09:00", "12:00").unwrap();
    db.add_availability(approver, date, &declared).await.unwrap();
    db.add_availability(approver, date, &declared).await.unwrap();

    let inside = TimeWindow::parse("09:30", "11:00").unwrap();
    assert!(!db.covering_approvers(date, &inside).await.unwrap().contains(&approver));

    db.set_role(approver, UserRole::Approver).await.unwrap();
    assert!(db.covering_approvers(date, &inside).await.unwrap().contains(&approver));

    let outside = TimeWindow::parse("08:00", "09:00").unwrap();
    assert!(!db.covering_approvers(date, &outside).await.unwrap().contains(&approver));

    let mine = db
        .list_availability(date)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.approver_id == approver)
        .count();
    assert_eq!(mine, 1);
}

#[tokio::test]
#[ignore]
async fn cancelled_row_is_not_confirmed() {
    let db = database().await;
    let user = unique_id();
    let approver = unique_id();
    let section = unique_id();
    db.find_or_create_user(user, "Ada", "Lovelace").await.unwrap();
    db.find_or_create_user(approver, "Grace", "Hopper").await.unwrap();

    let first = db
        .insert_unless_overlapping(draft(user, section, "09:00", "11:00"))
        .await
        .unwrap()
        .unwrap();
    db.cancel_reservation(first.id).await.unwrap();
    let rebooked = db
        .insert_unless_overlapping(draft(user, section, "09:00", "11:00"))
        .await
        .unwrap();
    assert!(rebooked.is_some());

    assert!(db.confirm_reservation(first.id, approver).await.unwrap().is_none());
    let stored = db.get_reservation(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReservationStatus::Cancelled);
    assert_eq!(stored.approver_id, None);
}
