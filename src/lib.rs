//! Appointment lifecycle and role-scoped visibility for a healthcare booking
//! front-end.
//!
//! Presentation code talks to [`AppointmentStore`] and [`summarize`]; it never
//! touches the backing [`AppointmentRepository`] directly.

pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod policy;
pub mod repository;
pub mod stats;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BookingConfig, ConfigError, FacilityListing};
pub use error::{BookingError, ValidationError};
pub use lifecycle::{validate_transition, StatusAction};
pub use models::{
    booking_request, Actor, Appointment, AppointmentId, AppointmentStatus, BookingRequest,
    Facility, Role, ScheduledFor, TimeSlot, UserId,
};
pub use repository::{AppointmentRepository, InMemoryRepository, RepositoryError};
pub use stats::{summarize, Stats};
pub use store::AppointmentStore;
