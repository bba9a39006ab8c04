/// Data models for the appointment booking core.
///
/// This module defines the records the rest of the crate passes around:
/// - Role / Actor: who is making a request
/// - AppointmentStatus: the lifecycle state of a booking
/// - Facility / TimeSlot / ScheduledFor: where and when
/// - Appointment: the stored booking record
/// - BookingRequest: a patient's request to book

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// Role attached to an identity by the session service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }

    /// Doctors and admins run the staff dashboards.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Doctor | Role::Admin)
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().trim() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            _ => Err(ValidationError::UnknownRole(value.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identity issued by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        UserId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity and role pair making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Actor {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn patient(user_id: impl Into<UserId>) -> Self {
        Actor::new(user_id, Role::Patient)
    }

    pub fn doctor(user_id: impl Into<UserId>) -> Self {
        Actor::new(user_id, Role::Doctor)
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Actor::new(user_id, Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(Uuid);

impl AppointmentId {
    pub fn new() -> Self {
        AppointmentId(Uuid::new_v4())
    }
}

impl Default for AppointmentId {
    fn default() -> Self {
        AppointmentId::new()
    }
}

impl FromStr for AppointmentId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(AppointmentId(Uuid::parse_str(value.trim())?))
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an appointment.
///
/// `Pending` is the only state with outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().trim() {
            "pending" => Ok(AppointmentStatus::Pending),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            _ => Err(ValidationError::UnknownStatus(value.to_string())),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hospital or clinic, as free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub name: String,
    pub location: String,
}

impl Facility {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Facility {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// Start time of a coarse booking slot, written like `09:30 AM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSlot(NaiveTime);

impl TimeSlot {
    const LABEL_FORMAT: &'static str = "%I:%M %p";

    pub fn new(start: NaiveTime) -> Self {
        TimeSlot(start)
    }

    pub fn parse(label: &str) -> Result<Self, ValidationError> {
        NaiveTime::parse_from_str(label.trim(), Self::LABEL_FORMAT)
            .map(TimeSlot)
            .map_err(|_| ValidationError::MalformedTimeSlot(label.to_string()))
    }

    pub fn start(&self) -> NaiveTime {
        self.0
    }

    pub fn label(&self) -> String {
        self.0.format(Self::LABEL_FORMAT).to_string()
    }
}

impl TryFrom<String> for TimeSlot {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TimeSlot::parse(&value)
    }
}

impl From<TimeSlot> for String {
    fn from(slot: TimeSlot) -> Self {
        slot.label()
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Calendar date plus time slot of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduledFor {
    pub date: NaiveDate,
    pub slot: TimeSlot,
}

impl ScheduledFor {
    pub fn new(date: NaiveDate, slot: TimeSlot) -> Self {
        ScheduledFor { date, slot }
    }

    /// Resolve to a local instant. Fails inside a DST gap or fold.
    pub fn to_local(&self) -> Result<DateTime<Local>, ValidationError> {
        self.date
            .and_time(self.slot.start())
            .and_local_timezone(Local)
            .single()
            .ok_or_else(|| ValidationError::AmbiguousLocalTime(self.to_string()))
    }
}

impl fmt::Display for ScheduledFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.slot)
    }
}

/// A patient's request to book a visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub patient_id: UserId,
    pub facility: Facility,
    pub scheduled_for: ScheduledFor,
    pub symptoms: Option<String>,
    /// Provider named at booking time, if any.
    pub doctor_id: Option<UserId>,
}

impl BookingRequest {
    pub fn new(patient_id: impl Into<UserId>, facility: Facility, scheduled_for: ScheduledFor) -> Self {
        BookingRequest {
            patient_id: patient_id.into(),
            facility,
            scheduled_for,
            symptoms: None,
            doctor_id: None,
        }
    }

    pub fn with_symptoms(mut self, symptoms: impl Into<String>) -> Self {
        self.symptoms = Some(symptoms.into());
        self
    }

    pub fn with_doctor(mut self, doctor_id: impl Into<UserId>) -> Self {
        self.doctor_id = Some(doctor_id.into());
        self
    }
}

/// A stored appointment record.
///
/// Identity, owner, facility, schedule and creation time never change once
/// the record exists. Only the status moves, through the store. Records are
/// exported as JSON but never rebuilt from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appointment {
    id: AppointmentId,
    patient_id: UserId,
    doctor_id: Option<UserId>,
    facility: Facility,
    scheduled_for: ScheduledFor,
    symptoms: Option<String>,
    status: AppointmentStatus,
    created_at: DateTime<Local>,
}

impl Appointment {
    /// Build a fresh pending record from an already validated request.
    pub(crate) fn pending(request: BookingRequest, created_at: DateTime<Local>) -> Self {
        let symptoms = request
            .symptoms
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Appointment {
            id: AppointmentId::new(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            facility: request.facility,
            scheduled_for: request.scheduled_for,
            symptoms,
            status: AppointmentStatus::Pending,
            created_at,
        }
    }

    pub(crate) fn with_status(mut self, status: AppointmentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn id(&self) -> AppointmentId {
        self.id
    }

    pub fn patient_id(&self) -> &UserId {
        &self.patient_id
    }

    pub fn doctor_id(&self) -> Option<&UserId> {
        self.doctor_id.as_ref()
    }

    pub fn facility(&self) -> &Facility {
        &self.facility
    }

    pub fn scheduled_for(&self) -> ScheduledFor {
        self.scheduled_for
    }

    pub fn symptoms(&self) -> Option<&str> {
        self.symptoms.as_deref()
    }

    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

/// Factory function to build a booking request from form input.
pub fn booking_request(
    patient_id: &str,
    facility: Facility,
    date: NaiveDate,
    slot_label: &str,
    symptoms: &str,
) -> Result<BookingRequest, ValidationError> {
    let slot = TimeSlot::parse(slot_label)?;
    let request = BookingRequest::new(patient_id, facility, ScheduledFor::new(date, slot));

    if symptoms.trim().is_empty() {
        Ok(request)
    } else {
        Ok(request.with_symptoms(symptoms))
    }
}
