/// Persistence boundary for appointment records.
///
/// The hosted table service is reached through `AppointmentRepository`.
/// `InMemoryRepository` keeps rows in a lock-guarded map and is what the
/// binary and the tests run against.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{Appointment, AppointmentId, AppointmentStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Appointment {0} already exists")]
    Duplicate(AppointmentId),
    #[error("Appointment table lock poisoned")]
    Poisoned,
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

pub trait AppointmentRepository: Send + Sync {
    fn insert(&self, appointment: Appointment) -> Result<(), RepositoryError>;

    fn select_where(
        &self,
        predicate: &dyn Fn(&Appointment) -> bool,
    ) -> Result<Vec<Appointment>, RepositoryError>;

    /// Set `new` only if the stored status still equals `expected`.
    ///
    /// Returns `false` when the row is missing or its status moved on.
    fn update_status(
        &self,
        id: AppointmentId,
        expected: AppointmentStatus,
        new: AppointmentStatus,
    ) -> Result<bool, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    rows: RwLock<HashMap<AppointmentId, Appointment>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
impl InMemoryRepository {
    /// Panic while holding the write lock, leaving it poisoned.
    pub(crate) fn poison_for_tests(&self) {
        let _guard = self.rows.write();
        panic!("appointment table writer crashed");
    }
}

impl AppointmentRepository for InMemoryRepository {
    fn insert(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().map_err(|_| RepositoryError::Poisoned)?;
        if rows.contains_key(&appointment.id()) {
            return Err(RepositoryError::Duplicate(appointment.id()));
        }
        rows.insert(appointment.id(), appointment);
        Ok(())
    }

    fn select_where(
        &self,
        predicate: &dyn Fn(&Appointment) -> bool,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let rows = self.rows.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(rows.values().filter(|a| predicate(a)).cloned().collect())
    }

    fn update_status(
        &self,
        id: AppointmentId,
        expected: AppointmentStatus,
        new: AppointmentStatus,
    ) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.write().map_err(|_| RepositoryError::Poisoned)?;
        match rows.remove(&id) {
            Some(stored) if stored.status() == expected => {
                rows.insert(id, stored.with_status(new));
                Ok(true)
            }
            Some(stored) => {
                rows.insert(id, stored);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
