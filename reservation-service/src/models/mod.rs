//! Data models for reservation-service.

mod availability;
mod reservation;
mod session;
mod user;

pub use availability::ApproverAvailability;
pub use reservation::{
    clock_time, CreateReservation, OperatingHours, Reservation, ReservationDraft,
    ReservationResult, ReservationStatus, TimeWindow,
};
pub use session::{LoggedIn, LoggingIn, Session, SessionId, Stage};
pub use user::{UserRecord, UserRole};
