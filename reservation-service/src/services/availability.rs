//! Read-only queries over reservations and approver availability.

use chrono::NaiveDate;
use std::sync::Arc;

use super::error::ServiceError;
use super::store::{AvailabilityStore, ReservationStore};
use crate::models::TimeWindow;

#[derive(Clone)]
pub struct AvailabilityResolver {
    reservations: Arc<dyn ReservationStore>,
    availability: Arc<dyn AvailabilityStore>,
}

impl AvailabilityResolver {
    pub fn new(
        reservations: Arc<dyn ReservationStore>,
        availability: Arc<dyn AvailabilityStore>,
    ) -> Self {
        Self {
            reservations,
            availability,
        }
    }

    /// No non-cancelled reservation for the section overlaps `window` on `date`.
    pub async fn is_window_free(
        &self,
        section_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<bool, ServiceError> {
        let taken = self
            .reservations
            .has_overlap(section_id, date, window)
            .await?;
        Ok(!taken)
    }

    /// Some approver declared a window on `date` that fully covers `window`.
    pub async fn has_approver(
        &self,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<bool, ServiceError> {
        let approvers = self.availability.covering_approvers(date, window).await?;
        Ok(!approvers.is_empty())
    }
}
