//! Process-local storage used when no database is configured and in tests.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::error::ServiceError;
use super::store::{AvailabilityStore, ReservationStore, UserDirectory};
use crate::models::{
    ApproverAvailability, Reservation, ReservationDraft, ReservationStatus, TimeWindow,
    UserRecord, UserRole,
};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<i64, UserRecord>,
    reservations: DashMap<i64, Reservation>,
    availability: DashMap<SlotKey, ApproverAvailability>,
    next_reservation_id: AtomicI64,
    next_availability_id: AtomicI64,
    /// One lock per `(section_id, date)` serialising check-and-insert.
    day_locks: DashMap<(i64, NaiveDate), Arc<Mutex<()>>>,
}

/// `(approver_id, date, start, end)`; at most one declaration per slot.
type SlotKey = (i64, NaiveDate, NaiveTime, NaiveTime);

fn slot_key(approver_id: i64, date: NaiveDate, window: &TimeWindow) -> SlotKey {
    (approver_id, date, window.start, window.end)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn day_lock(&self, section_id: i64, date: NaiveDate) -> Arc<Mutex<()>> {
        self.day_locks
            .entry((section_id, date))
            .or_default()
            .clone()
    }

    /// Drop the lock for `key` once no writer holds or awaits it.
    fn release_day_lock(&self, key: (i64, NaiveDate), lock: Arc<Mutex<()>>) {
        drop(lock);
        self.day_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn overlaps_existing(&self, section_id: i64, date: NaiveDate, window: &TimeWindow) -> bool {
        self.reservations.iter().any(|r| {
            r.section_id == section_id
                && r.date == date
                && r.status.blocks_window()
                && r.window().overlaps(window)
        })
    }

    fn insert_locked(&self, draft: ReservationDraft) -> Option<Reservation> {
        if self.overlaps_existing(draft.section_id, draft.date, &draft.window) {
            return None;
        }

        let now = Utc::now();
        let reservation = Reservation {
            id: self.next_reservation_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: draft.user_id,
            section_id: draft.section_id,
            project_id: draft.project_id,
            date: draft.date,
            start_time: draft.window.start,
            end_time: draft.window.end,
            status: draft.status,
            approver_id: None,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        self.reservations.insert(reservation.id, reservation.clone());
        Some(reservation)
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn has_overlap(
        &self,
        section_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<bool, ServiceError> {
        Ok(self.overlaps_existing(section_id, date, window))
    }

    async fn insert_unless_overlapping(
        &self,
        draft: ReservationDraft,
    ) -> Result<Option<Reservation>, ServiceError> {
        let key = (draft.section_id, draft.date);
        let lock = self.day_lock(key.0, key.1);
        let inserted = {
            let _guard = lock.lock().await;
            self.insert_locked(draft)
        };
        self.release_day_lock(key, lock);
        Ok(inserted)
    }

    async fn get_reservation(&self, id: i64) -> Result<Option<Reservation>, ServiceError> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, ServiceError> {
        let mut day: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.date == date && r.status.blocks_window())
            .map(|r| r.clone())
            .collect();
        day.sort_by_key(|r| (r.start_time, r.section_id, r.id));
        Ok(day)
    }

    async fn list_pending(&self) -> Result<Vec<Reservation>, ServiceError> {
        let mut pending: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Pending)
            .map(|r| r.clone())
            .collect();
        pending.sort_by_key(|r| (r.date, r.start_time, r.id));
        Ok(pending)
    }

    async fn confirm_reservation(
        &self,
        id: i64,
        approver_id: i64,
    ) -> Result<Option<Reservation>, ServiceError> {
        let Some(mut entry) = self.reservations.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status == ReservationStatus::Cancelled {
            return Ok(None);
        }
        entry.status = ReservationStatus::Confirmed;
        entry.approver_id = Some(approver_id);
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }

    async fn cancel_reservation(&self, id: i64) -> Result<Option<Reservation>, ServiceError> {
        let Some(mut entry) = self.reservations.get_mut(&id) else {
            return Ok(None);
        };
        entry.status = ReservationStatus::Cancelled;
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }
}

#[async_trait]
impl AvailabilityStore for MemoryStore {
    async fn add_availability(
        &self,
        approver_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<ApproverAvailability, ServiceError> {
        let entry = self
            .availability
            .entry(slot_key(approver_id, date, window))
            .or_insert_with(|| ApproverAvailability {
                id: self.next_availability_id.fetch_add(1, Ordering::SeqCst) + 1,
                approver_id,
                date,
                start_time: window.start,
                end_time: window.end,
            })
            .clone();
        Ok(entry)
    }

    async fn remove_availability(
        &self,
        approver_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .availability
            .remove(&slot_key(approver_id, date, window))
            .is_some())
    }

    async fn list_availability(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ApproverAvailability>, ServiceError> {
        let mut day: Vec<ApproverAvailability> = self
            .availability
            .iter()
            .filter(|a| a.date == date)
            .map(|a| a.clone())
            .collect();
        day.sort_by_key(|a| (a.start_time, a.approver_id));
        Ok(day)
    }

    async fn covering_approvers(
        &self,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<Vec<i64>, ServiceError> {
        let mut approvers: Vec<i64> = self
            .availability
            .iter()
            .filter(|a| a.date == date && a.window().covers(window))
            .map(|a| a.approver_id)
            .filter(|id| self.users.get(id).is_some_and(|u| u.is_approver()))
            .collect();
        approvers.sort_unstable();
        approvers.dedup();
        Ok(approvers)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_or_create_user(
        &self,
        provider_id: i64,
        first_name: &str,
        last_name: &str,
    ) -> Result<UserRecord, ServiceError> {
        let user = self
            .users
            .entry(provider_id)
            .or_insert_with(|| {
                UserRecord::new(provider_id, first_name.to_string(), last_name.to_string())
            })
            .clone();
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn accept_terms(&self, id: i64) -> Result<(), ServiceError> {
        let mut user = self.users.get_mut(&id).ok_or(ServiceError::NotFound("User"))?;
        user.accepted_terms = true;
        Ok(())
    }

    async fn set_role(&self, id: i64, role: UserRole) -> Result<(), ServiceError> {
        let mut user = self.users.get_mut(&id).ok_or(ServiceError::NotFound("User"))?;
        user.role = role;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
