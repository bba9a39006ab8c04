/// The appointment store: the only way records are created or changed.
///
/// Presentation code goes through `create`, `list_for`, `transition` and
/// `analytics`. Visibility and lifecycle rules are checked here before the
/// repository is touched, and status changes are conditional updates so two
/// staff members acting at once cannot both win.

use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::BookingConfig;
use crate::error::{BookingError, ValidationError};
use crate::lifecycle::{validate_transition, StatusAction};
use crate::models::{Actor, Appointment, AppointmentId, AppointmentStatus, BookingRequest};
use crate::policy;
use crate::repository::AppointmentRepository;
use crate::stats::{summarize, Stats};

pub struct AppointmentStore<R> {
    repository: R,
    config: BookingConfig,
    clock: Arc<dyn Clock>,
}

impl<R: AppointmentRepository> AppointmentStore<R> {
    pub fn new(repository: R, config: BookingConfig) -> Self {
        Self::with_clock(repository, config, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: R, config: BookingConfig, clock: Arc<dyn Clock>) -> Self {
        AppointmentStore {
            repository,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Book a new appointment in the `pending` state.
    pub fn create(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        let now = self.clock.now();
        self.validate_request(&request, now)?;

        let appointment = Appointment::pending(request, now);
        self.repository.insert(appointment.clone())?;

        info!(
            appointment = %appointment.id(),
            patient = %appointment.patient_id(),
            scheduled_for = %appointment.scheduled_for(),
            "Appointment booked"
        );
        Ok(appointment)
    }

    fn validate_request(
        &self,
        request: &BookingRequest,
        now: chrono::DateTime<chrono::Local>,
    ) -> Result<(), ValidationError> {
        if request.patient_id.is_blank() {
            return Err(ValidationError::EmptyPatientId);
        }
        if request.facility.name.trim().is_empty() {
            return Err(ValidationError::EmptyFacility);
        }
        if !self.config.offers_slot(request.scheduled_for.slot) {
            return Err(ValidationError::SlotNotOffered(request.scheduled_for.slot.label()));
        }
        if let Some(symptoms) = &request.symptoms {
            let len = symptoms.trim().chars().count();
            if len > self.config.max_symptoms_chars {
                return Err(ValidationError::SymptomsTooLong {
                    len,
                    max: self.config.max_symptoms_chars,
                });
            }
        }

        let scheduled = request.scheduled_for.to_local()?;
        if scheduled <= now {
            return Err(ValidationError::InPast { scheduled });
        }
        // Last bookable day is judged by calendar date, not time of day.
        if request.scheduled_for.date > (now + self.config.horizon()).date_naive() {
            return Err(ValidationError::BeyondHorizon {
                scheduled,
                horizon_days: self.config.horizon_days,
            });
        }
        Ok(())
    }

    /// Appointments the actor may read, earliest visit first.
    pub fn list_for(&self, actor: &Actor) -> Result<Vec<Appointment>, BookingError> {
        let mut appointments = self
            .repository
            .select_where(&|a| policy::can_read(actor, a))?;

        appointments.sort_by(|a, b| {
            a.scheduled_for()
                .cmp(&b.scheduled_for())
                .then_with(|| a.created_at().cmp(&b.created_at()))
                .then_with(|| a.id().cmp(&b.id()))
        });

        debug!(user = %actor.user_id, role = %actor.role, count = appointments.len(), "Listed appointments");
        Ok(appointments)
    }

    pub fn get(&self, id: AppointmentId, actor: &Actor) -> Result<Appointment, BookingError> {
        let appointment = self.find(id)?;
        if !policy::can_read(actor, &appointment) {
            return Err(BookingError::Forbidden {
                role: actor.role,
                appointment: Some(id),
            });
        }
        Ok(appointment)
    }

    /// Move a pending appointment to `new_status`.
    pub fn transition(
        &self,
        id: AppointmentId,
        actor: &Actor,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        if !policy::can_transition_any(actor.role) {
            return Err(BookingError::Forbidden {
                role: actor.role,
                appointment: Some(id),
            });
        }

        let current = self.find(id)?;
        if !policy::can_write(actor, &current) {
            return Err(BookingError::Forbidden {
                role: actor.role,
                appointment: Some(id),
            });
        }
        validate_transition(current.status(), new_status)?;

        if !self
            .repository
            .update_status(id, current.status(), new_status)?
        {
            return Err(BookingError::Conflict(id));
        }

        info!(
            appointment = %id,
            user = %actor.user_id,
            from = %current.status(),
            to = %new_status,
            "Appointment status changed"
        );
        Ok(current.with_status(new_status))
    }

    pub fn apply(
        &self,
        id: AppointmentId,
        actor: &Actor,
        action: StatusAction,
    ) -> Result<Appointment, BookingError> {
        self.transition(id, actor, action.target())
    }

    /// Clinic-wide counters for the staff analytics view.
    pub fn analytics(&self, actor: &Actor) -> Result<Stats, BookingError> {
        if !actor.role.is_staff() {
            return Err(BookingError::Forbidden {
                role: actor.role,
                appointment: None,
            });
        }
        let all = self.repository.select_where(&|_| true)?;
        Ok(summarize(&all))
    }

    fn find(&self, id: AppointmentId) -> Result<Appointment, BookingError> {
        self.repository
            .select_where(&|a| a.id() == id)?
            .into_iter()
            .next()
            .ok_or(BookingError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Facility, ScheduledFor, TimeSlot};
    use crate::repository::{InMemoryRepository, RepositoryError};
    use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};
    use std::sync::Barrier;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
    }

    fn store() -> AppointmentStore<InMemoryRepository> {
        AppointmentStore::with_clock(
            InMemoryRepository::new(),
            BookingConfig::default(),
            Arc::new(FixedClock(now())),
        )
    }

    fn at(days_ahead: i64, slot: &str) -> ScheduledFor {
        let date: NaiveDate = (now() + Duration::days(days_ahead)).date_naive();
        ScheduledFor::new(date, TimeSlot::parse(slot).unwrap())
    }

    fn facility() -> Facility {
        Facility::new("Government Hospital", "Pathapatnam, Andhra Pradesh")
    }

    fn book(store: &AppointmentStore<InMemoryRepository>, patient: &str, doctor: Option<&str>, when: ScheduledFor) -> Appointment {
        let mut request = BookingRequest::new(patient, facility(), when);
        if let Some(doctor) = doctor {
            request = request.with_doctor(doctor);
        }
        store.create(request).unwrap()
    }

    #[test]
    fn create_yields_pending_record() {
        let store = store();
        let appointment = store
            .create(BookingRequest::new("P1", facility(), at(1, "10:00 AM")).with_symptoms("Fever"))
            .unwrap();

        assert_eq!(appointment.status(), AppointmentStatus::Pending);
        assert!(appointment.created_at() <= now());
        assert_eq!(appointment.symptoms(), Some("Fever"));
        assert_eq!(store.repository().len(), 1);
    }

    #[test]
    fn later_the_same_day_is_bookable() {
        let store = store();
        assert!(store
            .create(BookingRequest::new("P1", facility(), at(0, "09:00 AM")))
            .is_ok());
    }

    #[test]
    fn create_rejects_past_and_now() {
        let store = store();
        let yesterday = BookingRequest::new("P1", facility(), at(-1, "10:00 AM"));
        assert!(matches!(
            store.create(yesterday),
            Err(BookingError::Validation(ValidationError::InPast { .. }))
        ));

        let config = BookingConfig::from_json_str(r#"{ "time_slots": ["08:00 AM"] }"#).unwrap();
        let exact = AppointmentStore::with_clock(InMemoryRepository::new(), config, Arc::new(FixedClock(now())));
        assert!(matches!(
            exact.create(BookingRequest::new("P1", facility(), at(0, "08:00 AM"))),
            Err(BookingError::Validation(ValidationError::InPast { .. }))
        ));
    }

    #[test]
    fn create_enforces_horizon() {
        let store = store();
        assert!(store
            .create(BookingRequest::new("P1", facility(), at(30, "04:30 PM")))
            .is_ok());
        assert!(matches!(
            store.create(BookingRequest::new("P1", facility(), at(31, "09:00 AM"))),
            Err(BookingError::Validation(ValidationError::BeyondHorizon { horizon_days: 30, .. }))
        ));
        assert!(matches!(
            store.create(BookingRequest::new("P1", facility(), at(45, "10:00 AM"))),
            Err(BookingError::Validation(ValidationError::BeyondHorizon { .. }))
        ));
    }

    #[test]
    fn create_rejects_blank_fields() {
        let store = store();
        assert!(matches!(
            store.create(BookingRequest::new("  ", facility(), at(1, "10:00 AM"))),
            Err(BookingError::Validation(ValidationError::EmptyPatientId))
        ));
        assert!(matches!(
            store.create(BookingRequest::new("P1", Facility::new("", "Somewhere"), at(1, "10:00 AM"))),
            Err(BookingError::Validation(ValidationError::EmptyFacility))
        ));
        assert!(store.repository().is_empty());
    }

    #[test]
    fn create_rejects_unoffered_slot_and_long_notes() {
        let store = store();
        assert!(matches!(
            store.create(BookingRequest::new("P1", facility(), at(1, "12:30 PM"))),
            Err(BookingError::Validation(ValidationError::SlotNotOffered(_)))
        ));

        let long = "a".repeat(2001);
        assert!(matches!(
            store.create(BookingRequest::new("P1", facility(), at(1, "10:00 AM")).with_symptoms(long)),
            Err(BookingError::Validation(ValidationError::SymptomsTooLong { len: 2001, max: 2000 }))
        ));
    }

    #[test]
    fn patient_lists_own_records_in_visit_order() {
        let store = store();
        let late = book(&store, "P1", None, at(5, "02:00 PM"));
        let early = book(&store, "P1", None, at(2, "09:30 AM"));
        let same_day_later = book(&store, "P1", None, at(2, "11:00 AM"));
        book(&store, "P2", None, at(1, "09:00 AM"));

        let ids: Vec<_> = store
            .list_for(&Actor::patient("P1"))
            .unwrap()
            .iter()
            .map(Appointment::id)
            .collect();
        assert_eq!(ids, vec![early.id(), same_day_later.id(), late.id()]);
    }

    #[test]
    fn doctor_lists_only_assigned_records() {
        let store = store();
        book(&store, "P1", Some("D1"), at(1, "09:00 AM"));
        book(&store, "P2", Some("D2"), at(1, "09:30 AM"));
        book(&store, "P3", None, at(1, "10:00 AM"));
        book(&store, "P4", Some("D1"), at(2, "10:00 AM"));

        let visible = store.list_for(&Actor::doctor("D1")).unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible
            .iter()
            .all(|a| a.doctor_id().map(|d| d.as_str()) == Some("D1")));
    }

    #[test]
    fn admin_lists_everything() {
        let store = store();
        book(&store, "P1", Some("D1"), at(1, "09:00 AM"));
        book(&store, "P2", None, at(1, "09:30 AM"));
        assert_eq!(store.list_for(&Actor::admin("A1")).unwrap().len(), 2);
    }

    #[test]
    fn complete_succeeds_exactly_once() {
        let store = store();
        let appointment = book(&store, "P1", Some("D1"), at(1, "09:00 AM"));
        let doctor = Actor::doctor("D1");

        let done = store
            .transition(appointment.id(), &doctor, AppointmentStatus::Completed)
            .unwrap();
        assert_eq!(done.status(), AppointmentStatus::Completed);

        assert!(matches!(
            store.transition(appointment.id(), &doctor, AppointmentStatus::Completed),
            Err(BookingError::InvalidTransition {
                from: AppointmentStatus::Completed,
                to: AppointmentStatus::Completed
            })
        ));
        assert!(matches!(
            store.apply(appointment.id(), &doctor, StatusAction::Cancel),
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn patient_can_never_transition() {
        let store = store();
        let own = book(&store, "P1", Some("D1"), at(1, "09:00 AM"));
        let patient = Actor::patient("P1");

        for status in [AppointmentStatus::Completed, AppointmentStatus::Cancelled] {
            assert!(matches!(
                store.transition(own.id(), &patient, status),
                Err(BookingError::Forbidden { role: crate::models::Role::Patient, .. })
            ));
        }
        assert!(matches!(
            store.transition(AppointmentId::new(), &patient, AppointmentStatus::Cancelled),
            Err(BookingError::Forbidden { .. })
        ));
        assert_eq!(
            store.get(own.id(), &patient).unwrap().status(),
            AppointmentStatus::Pending
        );
    }

    #[test]
    fn doctor_cannot_touch_unassigned_or_foreign_records() {
        let store = store();
        let foreign = book(&store, "P1", Some("D2"), at(1, "09:00 AM"));
        let unassigned = book(&store, "P1", None, at(1, "09:30 AM"));
        let doctor = Actor::doctor("D1");

        for id in [foreign.id(), unassigned.id()] {
            assert!(matches!(
                store.transition(id, &doctor, AppointmentStatus::Cancelled),
                Err(BookingError::Forbidden { .. })
            ));
        }

        let admin = Actor::admin("A1");
        assert!(store
            .transition(unassigned.id(), &admin, AppointmentStatus::Cancelled)
            .is_ok());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = store();
        let id = AppointmentId::new();
        assert!(matches!(
            store.transition(id, &Actor::admin("A1"), AppointmentStatus::Completed),
            Err(BookingError::NotFound(missing)) if missing == id
        ));
        assert!(matches!(
            store.get(id, &Actor::admin("A1")),
            Err(BookingError::NotFound(_))
        ));
    }

    #[test]
    fn get_respects_visibility() {
        let store = store();
        let appointment = book(&store, "P1", None, at(1, "09:00 AM"));
        assert!(store.get(appointment.id(), &Actor::patient("P1")).is_ok());
        assert!(matches!(
            store.get(appointment.id(), &Actor::patient("P2")),
            Err(BookingError::Forbidden { .. })
        ));
    }

    #[test]
    fn analytics_is_staff_only_and_unscoped() {
        let store = store();
        let a = book(&store, "P1", Some("D1"), at(1, "09:00 AM"));
        let b = book(&store, "P1", Some("D2"), at(1, "09:30 AM"));
        book(&store, "P2", None, at(1, "10:00 AM"));

        let admin = Actor::admin("A1");
        store.transition(a.id(), &admin, AppointmentStatus::Completed).unwrap();
        store.transition(b.id(), &admin, AppointmentStatus::Cancelled).unwrap();

        let stats = store.analytics(&Actor::doctor("D1")).unwrap();
        assert_eq!(
            stats,
            Stats {
                total: 3,
                pending: 1,
                completed: 1,
                patients: 2
            }
        );
        assert!(matches!(
            store.analytics(&Actor::patient("P1")),
            Err(BookingError::Forbidden { appointment: None, .. })
        ));
    }

    #[test]
    fn dashboard_counters_follow_visible_set() {
        let store = store();
        book(&store, "P1", Some("D1"), at(1, "09:00 AM"));
        book(&store, "P2", Some("D1"), at(1, "09:30 AM"));
        book(&store, "P3", Some("D2"), at(1, "10:00 AM"));

        let visible = store.list_for(&Actor::doctor("D1")).unwrap();
        let stats = summarize(&visible);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.patients, 2);
    }

    /// Holds every reader at a barrier so two transitions both see `pending`.
    struct GatedRepository {
        inner: InMemoryRepository,
        gate: Barrier,
    }

    impl AppointmentRepository for GatedRepository {
        fn insert(&self, appointment: Appointment) -> Result<(), RepositoryError> {
            self.inner.insert(appointment)
        }

        fn select_where(
            &self,
            predicate: &dyn Fn(&Appointment) -> bool,
        ) -> Result<Vec<Appointment>, RepositoryError> {
            let rows = self.inner.select_where(predicate)?;
            self.gate.wait();
            Ok(rows)
        }

        fn update_status(
            &self,
            id: AppointmentId,
            expected: AppointmentStatus,
            new: AppointmentStatus,
        ) -> Result<bool, RepositoryError> {
            self.inner.update_status(id, expected, new)
        }
    }

    #[test]
    fn racing_transitions_yield_one_conflict() {
        let store = AppointmentStore::with_clock(
            GatedRepository {
                inner: InMemoryRepository::new(),
                gate: Barrier::new(2),
            },
            BookingConfig::default(),
            Arc::new(FixedClock(now())),
        );
        let appointment = store
            .create(BookingRequest::new("P1", facility(), at(1, "09:00 AM")).with_doctor("D1"))
            .unwrap();
        let id = appointment.id();

        let (first, second) = std::thread::scope(|s| {
            let complete = s.spawn(|| store.transition(id, &Actor::doctor("D1"), AppointmentStatus::Completed));
            let cancel = s.spawn(|| store.transition(id, &Actor::admin("A1"), AppointmentStatus::Cancelled));
            (complete.join().unwrap(), cancel.join().unwrap())
        });

        let outcomes = [first, second];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(BookingError::Conflict(c)) if *c == id))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 1);
    }

    #[test]
    fn many_concurrent_transitions_have_one_winner() {
        let store = store();
        let appointment = book(&store, "P1", Some("D1"), at(1, "09:00 AM"));
        let id = appointment.id();

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = &store;
                    s.spawn(move || {
                        let status = if i % 2 == 0 {
                            AppointmentStatus::Completed
                        } else {
                            AppointmentStatus::Cancelled
                        };
                        store.transition(id, &Actor::admin("A1"), status)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
            r,
            Err(BookingError::Conflict(_)) | Err(BookingError::InvalidTransition { .. })
        )));
    }

    /// Backend that accepts nothing and serves nothing.
    struct OfflineRepository {
        inner: InMemoryRepository,
    }

    impl AppointmentRepository for OfflineRepository {
        fn insert(&self, _appointment: Appointment) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        fn select_where(
            &self,
            _predicate: &dyn Fn(&Appointment) -> bool,
        ) -> Result<Vec<Appointment>, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        fn update_status(
            &self,
            _id: AppointmentId,
            _expected: AppointmentStatus,
            _new: AppointmentStatus,
        ) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn backend_outage_surfaces_as_storage_error() {
        let store = AppointmentStore::with_clock(
            OfflineRepository {
                inner: InMemoryRepository::new(),
            },
            BookingConfig::default(),
            Arc::new(FixedClock(now())),
        );
        let admin = Actor::admin("A1");

        let booked = store.create(BookingRequest::new("P1", facility(), at(1, "09:00 AM")));
        assert!(matches!(
            booked,
            Err(BookingError::Storage(RepositoryError::Unavailable(_)))
        ));
        assert!(store.repository().inner.is_empty());

        assert!(matches!(
            store.list_for(&admin),
            Err(BookingError::Storage(_))
        ));
        assert!(matches!(
            store.transition(AppointmentId::new(), &admin, AppointmentStatus::Completed),
            Err(BookingError::Storage(_))
        ));
        assert!(matches!(
            store.analytics(&admin),
            Err(BookingError::Storage(_))
        ));
        assert!(!store.analytics(&admin).unwrap_err().is_retryable());
    }

    #[test]
    fn poisoned_table_lock_is_a_storage_error() {
        let store = store();
        book(&store, "P1", Some("D1"), at(1, "09:00 AM"));

        let repo = store.repository();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            repo.poison_for_tests();
        }));

        let admin = Actor::admin("A1");
        assert!(matches!(
            store.list_for(&admin),
            Err(BookingError::Storage(RepositoryError::Poisoned))
        ));
        assert!(matches!(
            store.create(BookingRequest::new("P2", facility(), at(2, "09:00 AM"))),
            Err(BookingError::Storage(RepositoryError::Poisoned))
        ));
    }
}
