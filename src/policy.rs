/// Role-scoped visibility rules.
///
/// Access rules, checked by role:
/// 1. Patient: reads own appointments, never writes
/// 2. Doctor: reads and writes only appointments assigned to them
/// 3. Admin: reads and writes everything
///
/// Unassigned appointments are invisible to doctors.

use crate::models::{Actor, Appointment, Role};

pub fn can_read(actor: &Actor, appointment: &Appointment) -> bool {
    match actor.role {
        Role::Patient => appointment.patient_id() == &actor.user_id,
        Role::Doctor => is_assigned_to(actor, appointment),
        Role::Admin => true,
    }
}

pub fn can_write(actor: &Actor, appointment: &Appointment) -> bool {
    match actor.role {
        Role::Patient => false,
        Role::Doctor => is_assigned_to(actor, appointment),
        Role::Admin => true,
    }
}

/// Whether a role may ever move an appointment's status.
pub fn can_transition_any(role: Role) -> bool {
    role.is_staff()
}

fn is_assigned_to(actor: &Actor, appointment: &Appointment) -> bool {
    appointment.doctor_id() == Some(&actor.user_id)
}
