//! Reservation creation and the approver actions around it.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument};

use super::availability::AvailabilityResolver;
use super::error::ServiceError;
use super::metrics;
use super::store::{AvailabilityStore, ReservationStore, UserDirectory};
use crate::models::{
    ApproverAvailability, CreateReservation, OperatingHours, Reservation, ReservationDraft,
    ReservationResult, ReservationStatus, TimeWindow, UserRecord,
};

#[derive(Clone)]
pub struct ReservationService {
    reservations: Arc<dyn ReservationStore>,
    availability: Arc<dyn AvailabilityStore>,
    users: Arc<dyn UserDirectory>,
    resolver: AvailabilityResolver,
    hours: OperatingHours,
}

impl ReservationService {
    pub fn new(
        reservations: Arc<dyn ReservationStore>,
        availability: Arc<dyn AvailabilityStore>,
        users: Arc<dyn UserDirectory>,
        hours: OperatingHours,
    ) -> Self {
        Self {
            resolver: AvailabilityResolver::new(reservations.clone(), availability.clone()),
            reservations,
            availability,
            users,
            hours,
        }
    }

    pub fn resolver(&self) -> &AvailabilityResolver {
        &self.resolver
    }

    /// Validate, derive the status and insert.
    ///
    /// Checks run in order and the first failure wins: operating hours,
    /// window order, overlap.
    #[instrument(skip(self, input), fields(section_id = input.section_id, date = %input.date))]
    pub async fn create(&self, input: CreateReservation) -> Result<ReservationResult, ServiceError> {
        let window = input.window;

        if !self.hours.contains(window.start) || !self.hours.contains(window.end) {
            metrics::record_reservation_rejected("outside_hours");
            return Err(ServiceError::Validation(format!(
                "Reservations must start and end between {:02}:00 and {:02}:00",
                self.hours.start_hour, self.hours.end_hour
            )));
        }
        if !window.is_ordered() {
            metrics::record_reservation_rejected("inverted_window");
            return Err(ServiceError::Validation(
                "Start time must be before end time".to_string(),
            ));
        }
        if !self
            .resolver
            .is_window_free(input.section_id, input.date, &window)
            .await?
        {
            metrics::record_reservation_rejected("conflict");
            return Err(conflict());
        }

        let has_approver = self.resolver.has_approver(input.date, &window).await?;
        let status = if has_approver {
            ReservationStatus::Confirmed
        } else {
            ReservationStatus::Pending
        };

        let draft = ReservationDraft {
            user_id: input.user_id,
            section_id: input.section_id,
            project_id: input.project_id,
            date: input.date,
            window,
            status,
            notes: input.notes,
        };

        // the earlier check is advisory; this one is atomic
        let Some(reservation) = self.reservations.insert_unless_overlapping(draft).await? else {
            metrics::record_reservation_rejected("conflict");
            return Err(conflict());
        };

        metrics::record_reservation_created(status.as_str());
        info!(
            reservation_id = reservation.id,
            status = %status,
            "Reservation created"
        );

        Ok(ReservationResult {
            id: reservation.id,
            status: reservation.status,
            needs_approver: !has_approver,
        })
    }

    /// Approver sign-off; binds the acting approver to the reservation.
    #[instrument(skip(self))]
    pub async fn confirm(&self, id: i64, approver_id: i64) -> Result<Reservation, ServiceError> {
        self.require_approver(approver_id).await?;

        let existing = self
            .reservations
            .get_reservation(id)
            .await?
            .ok_or(ServiceError::NotFound("Reservation"))?;
        if existing.status == ReservationStatus::Cancelled {
            return Err(ServiceError::Validation(
                "Cancelled reservations cannot be confirmed".to_string(),
            ));
        }

        // the status check is repeated by the store; a cancel may land in between
        match self
            .reservations
            .confirm_reservation(id, approver_id)
            .await?
        {
            Some(confirmed) => {
                info!(reservation_id = id, approver_id, "Reservation confirmed");
                Ok(confirmed)
            }
            None => match self.reservations.get_reservation(id).await? {
                Some(_) => Err(ServiceError::Validation(
                    "Cancelled reservations cannot be confirmed".to_string(),
                )),
                None => Err(ServiceError::NotFound("Reservation")),
            },
        }
    }

    /// Cancel as the owner or as an approver.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i64, actor_id: i64) -> Result<Reservation, ServiceError> {
        let existing = self
            .reservations
            .get_reservation(id)
            .await?
            .ok_or(ServiceError::NotFound("Reservation"))?;

        if existing.user_id != actor_id {
            self.require_approver(actor_id).await?;
        }
        if existing.status == ReservationStatus::Cancelled {
            return Ok(existing);
        }

        let cancelled = self
            .reservations
            .cancel_reservation(id)
            .await?
            .ok_or(ServiceError::NotFound("Reservation"))?;
        info!(reservation_id = id, actor_id, "Reservation cancelled");
        Ok(cancelled)
    }

    pub async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, ServiceError> {
        self.reservations.list_by_date(date).await
    }

    pub async fn pending(&self, actor_id: i64) -> Result<Vec<Reservation>, ServiceError> {
        self.require_approver(actor_id).await?;
        self.reservations.list_pending().await
    }

    pub async fn add_availability(
        &self,
        approver_id: i64,
        date: NaiveDate,
        window: TimeWindow,
    ) -> Result<ApproverAvailability, ServiceError> {
        self.require_approver(approver_id).await?;
        if !window.is_ordered() {
            return Err(ServiceError::Validation(
                "Start time must be before end time".to_string(),
            ));
        }

        let entry = self
            .availability
            .add_availability(approver_id, date, &window)
            .await?;
        info!(approver_id, date = %date, "Availability declared");
        Ok(entry)
    }

    pub async fn remove_availability(
        &self,
        approver_id: i64,
        date: NaiveDate,
        window: TimeWindow,
    ) -> Result<(), ServiceError> {
        self.require_approver(approver_id).await?;
        if !self
            .availability
            .remove_availability(approver_id, date, &window)
            .await?
        {
            return Err(ServiceError::NotFound("Availability"));
        }
        Ok(())
    }

    pub async fn list_availability(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ApproverAvailability>, ServiceError> {
        self.availability.list_availability(date).await
    }

    async fn require_approver(&self, user_id: i64) -> Result<UserRecord, ServiceError> {
        match self.users.get_user(user_id).await? {
            Some(user) if user.is_approver() => Ok(user),
            _ => Err(ServiceError::Forbidden("Approver role required")),
        }
    }
}

fn conflict() -> ServiceError {
    ServiceError::Conflict("Requested window overlaps an existing reservation".to_string())
}
