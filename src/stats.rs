/// Dashboard counters derived from an already fetched record set.

use serde::Serialize;
use std::collections::HashSet;

use crate::models::{Appointment, AppointmentStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    /// Distinct patients across the set.
    pub patients: usize,
}

impl Stats {
    /// Cancelled records only show up in `total`.
    ///
    /// Saturates at zero for hand-built values whose buckets exceed `total`.
    pub fn cancelled(&self) -> usize {
        self.total
            .saturating_sub(self.pending)
            .saturating_sub(self.completed)
    }

    /// Calculate the completion rate as a percentage.
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }
}

pub fn summarize(appointments: &[Appointment]) -> Stats {
    let mut stats = Stats {
        total: appointments.len(),
        ..Stats::default()
    };
    let mut patients = HashSet::new();

    for appointment in appointments {
        match appointment.status() {
            AppointmentStatus::Pending => stats.pending += 1,
            AppointmentStatus::Completed => stats.completed += 1,
            AppointmentStatus::Cancelled => {}
        }
        patients.insert(appointment.patient_id());
    }

    stats.patients = patients.len();
    stats
}
