//! Storage seams consumed by the scheduling core.
//!
//! Two back-ends implement them: [`super::Database`] (PostgreSQL) and
//! [`super::MemoryStore`].

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::ServiceError;
use crate::models::{
    ApproverAvailability, Reservation, ReservationDraft, TimeWindow, UserRecord, UserRole,
};

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Whether a non-cancelled reservation for `(section_id, date)` overlaps `window`.
    async fn has_overlap(
        &self,
        section_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<bool, ServiceError>;

    /// Overlap check and insert as one atomic unit per `(section_id, date)`.
    /// Returns `None` when the window is taken.
    async fn insert_unless_overlapping(
        &self,
        draft: ReservationDraft,
    ) -> Result<Option<Reservation>, ServiceError>;

    async fn get_reservation(&self, id: i64) -> Result<Option<Reservation>, ServiceError>;

    /// Non-cancelled reservations on `date`, by start time.
    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, ServiceError>;

    /// Pending reservations, by date then start time.
    async fn list_pending(&self) -> Result<Vec<Reservation>, ServiceError>;

    /// Confirm and bind `approver_id`, unless the reservation is cancelled.
    /// Returns `None` when it is missing or cancelled.
    async fn confirm_reservation(
        &self,
        id: i64,
        approver_id: i64,
    ) -> Result<Option<Reservation>, ServiceError>;

    async fn cancel_reservation(&self, id: i64) -> Result<Option<Reservation>, ServiceError>;
}

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Declare a window; an identical `(approver, date, window)` replaces the old row.
    async fn add_availability(
        &self,
        approver_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<ApproverAvailability, ServiceError>;

    async fn remove_availability(
        &self,
        approver_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<bool, ServiceError>;

    async fn list_availability(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ApproverAvailability>, ServiceError>;

    /// Ids of users holding the approver role whose declared window on `date`
    /// fully covers `window`.
    async fn covering_approvers(
        &self,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<Vec<i64>, ServiceError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_or_create_user(
        &self,
        provider_id: i64,
        first_name: &str,
        last_name: &str,
    ) -> Result<UserRecord, ServiceError>;

    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, ServiceError>;

    async fn accept_terms(&self, id: i64) -> Result<(), ServiceError>;

    async fn set_role(&self, id: i64, role: UserRole) -> Result<(), ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}
