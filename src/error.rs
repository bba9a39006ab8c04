/// Error types returned by the booking core.
///
/// Every failure reaches the caller as a typed value. The presentation
/// layer decides how to word it; the core never retries on its own.
use chrono::{DateTime, Local};

use crate::models::{AppointmentId, AppointmentStatus, Role};
use crate::repository::RepositoryError;

/// A booking request or identity value that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Patient ID cannot be empty")]
    EmptyPatientId,
    #[error("Facility name cannot be empty")]
    EmptyFacility,
    #[error("Invalid role: '{0}'. Must be one of: patient, doctor, admin")]
    UnknownRole(String),
    #[error("Invalid status: '{0}'. Must be one of: pending, completed, cancelled")]
    UnknownStatus(String),
    #[error("Invalid time slot: '{0}'. Expected a label like '09:30 AM'")]
    MalformedTimeSlot(String),
    #[error("Time slot {0} is not offered")]
    SlotNotOffered(String),
    #[error("{0} does not map to a single local time")]
    AmbiguousLocalTime(String),
    #[error("Appointment time {scheduled} is not in the future")]
    InPast { scheduled: DateTime<Local> },
    #[error("Appointment time {scheduled} is beyond the {horizon_days}-day booking horizon")]
    BeyondHorizon {
        scheduled: DateTime<Local>,
        horizon_days: i64,
    },
    #[error("Symptoms note is {len} characters, limit is {max}")]
    SymptomsTooLong { len: usize, max: usize },
}

/// Failure of a store operation.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Appointment {0} not found")]
    NotFound(AppointmentId),
    #[error("Access denied for role {role}")]
    Forbidden {
        role: Role,
        appointment: Option<AppointmentId>,
    },
    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error("Appointment {0} was changed concurrently")]
    Conflict(AppointmentId),
    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl BookingError {
    /// Whether refreshing and trying again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Conflict(_))
    }
}
