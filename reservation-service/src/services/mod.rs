pub mod authenticator;
pub mod availability;
pub mod database;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod oauth;
pub mod reservations;
pub mod session_store;
pub mod store;

pub use authenticator::{Authenticator, CallbackQuery, Challenge, Completion, Gate};
pub use availability::AvailabilityResolver;
pub use database::Database;
pub use error::ServiceError;
pub use memory::MemoryStore;
pub use oauth::{HandshakeError, OAuthClient, ProviderUser, TokenPair};
pub use reservations::ReservationService;
pub use session_store::SessionStore;
pub use store::{AvailabilityStore, ReservationStore, UserDirectory};
