/// Command-line front-end for the appointment booking core.
///
/// This binary provides an interactive menu for switching the signed-in
/// actor, booking visits, working the staff dashboard and viewing
/// clinic-wide analytics.

use chrono::{Duration, Local, NaiveDate};
use medibook::config::{self, BookingConfig, FacilityListing};
use medibook::{
    summarize, Actor, AppointmentId, AppointmentStatus, AppointmentStore, BookingError,
    BookingRequest, InMemoryRepository, Role, ScheduledFor, StatusAction,
};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

struct BookingCLI {
    store: AppointmentStore<InMemoryRepository>,
    actor: Actor,
    running: bool,
}

impl BookingCLI {
    fn new(config: BookingConfig) -> Self {
        BookingCLI {
            store: AppointmentStore::new(InMemoryRepository::new(), config),
            actor: Actor::patient("P001"),
            running: true,
        }
    }

    fn print_header(&self) {
        println!("\n{}", "=".repeat(60));
        println!("       HEALTHCARE APPOINTMENT BOOKING");
        println!("{}", "=".repeat(60));
    }

    fn print_menu(&self) {
        println!(
            "\n--- Main Menu (signed in as {} [{}]) ---",
            self.actor.user_id, self.actor.role
        );
        println!("1. Switch user");
        println!("2. Book appointment");
        println!("3. View appointments");
        println!("4. Mark appointment completed");
        println!("5. Cancel appointment");
        println!("6. Dashboard counters");
        println!("7. Clinic analytics");
        println!("8. Export appointments as JSON");
        println!("9. Run demo");
        println!("0. Exit");
        println!("{}", "-".repeat(20));
    }

    /// Returns `None` once stdin is closed.
    fn get_input(&self, prompt: &str, default: Option<&str>) -> Option<String> {
        if let Some(def) = default {
            print!("{} [{}]: ", prompt, def);
        } else {
            print!("{}: ", prompt);
        }
        let _ = io::stdout().flush();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    Some(default.unwrap_or("").to_string())
                } else {
                    Some(input.to_string())
                }
            }
        }
    }

    fn get_int_input(&self, prompt: &str, default: Option<i64>) -> Option<i64> {
        loop {
            let default_str = default.map(|d| d.to_string());
            let input = self.get_input(prompt, default_str.as_deref())?;

            if let Ok(value) = input.parse::<i64>() {
                return Some(value);
            }
            println!("Please enter a valid number");
        }
    }

    fn switch_user(&mut self) {
        println!("\n--- Switch User ---");
        let Some(user_id) = self.get_input("User ID", Some(self.actor.user_id.as_str())) else {
            return;
        };
        let Some(role) = self.get_input("Role (patient/doctor/admin)", Some(self.actor.role.as_str())) else {
            return;
        };

        match role.parse::<Role>() {
            Ok(role) => {
                self.actor = Actor::new(user_id.as_str(), role);
                println!("\nSigned in as {} [{}]", self.actor.user_id, self.actor.role);
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    fn book_appointment(&mut self) {
        println!("\n--- Book Appointment for {} ---", self.actor.user_id);

        let facilities = &self.store.config().facilities;
        println!("\nFacilities:");
        for (i, listing) in facilities.iter().enumerate() {
            println!(
                "  {}. {} ({}, {:.1} km)",
                i + 1,
                listing.name,
                listing.location,
                listing.distance_km
            );
        }
        let Some(choice) = self.get_input("Select facility (number or name)", Some("1")) else {
            return;
        };
        let Some(listing) = pick_facility(self.store.config(), &choice) else {
            println!("Invalid facility");
            return;
        };
        let facility = listing.facility();

        let tomorrow = (Local::now() + Duration::days(1)).date_naive();
        let default_date = tomorrow.format("%Y-%m-%d").to_string();
        let Some(date) = self.get_input("Date (YYYY-MM-DD)", Some(&default_date)) else {
            return;
        };
        let date = match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                println!("Invalid date");
                return;
            }
        };

        let slots = self.store.config().time_slots.clone();
        println!("\nTime slots:");
        for (i, slot) in slots.iter().enumerate() {
            println!("  {:2}. {}", i + 1, slot);
        }
        let Some(choice) = self.get_int_input("Select time slot", Some(1)) else {
            return;
        };
        let Some(slot) = menu_index(choice).and_then(|i| slots.get(i)).copied() else {
            println!("Invalid time slot");
            return;
        };

        let Some(symptoms) = self.get_input("Symptoms (optional)", None) else {
            return;
        };
        let Some(doctor) = self.get_input("Doctor ID (optional)", None) else {
            return;
        };

        let mut request = BookingRequest::new(
            self.actor.user_id.clone(),
            facility,
            ScheduledFor::new(date, slot),
        );
        if !symptoms.is_empty() {
            request = request.with_symptoms(symptoms);
        }
        if !doctor.is_empty() {
            request = request.with_doctor(doctor.as_str());
        }

        match self.store.create(request) {
            Ok(appointment) => {
                println!("\nAppointment booked successfully!");
                println!("  Scheduled for: {}", appointment.scheduled_for());
                println!("  Facility: {}", appointment.facility().name);
                println!("  ID: {}", appointment.id());
            }
            Err(e) => println!("\nCould not book appointment: {}", e),
        }
    }

    fn view_appointments(&self) {
        let appointments = match self.store.list_for(&self.actor) {
            Ok(list) => list,
            Err(e) => {
                println!("\nError: {}", e);
                return;
            }
        };

        if appointments.is_empty() {
            println!("\nNo appointments scheduled yet");
            return;
        }

        println!("\n--- Appointments ({}) ---", appointments.len());

        let mut current_date = None;
        for apt in &appointments {
            let apt_date = apt.scheduled_for().date;
            if Some(apt_date) != current_date {
                current_date = Some(apt_date);
                println!("\n{}:", apt_date.format("%A, %Y-%m-%d"));
            }

            println!(
                "  {} - {} ({}) - {} [{}]",
                apt.scheduled_for().slot,
                apt.facility().name,
                apt.facility().location,
                apt.patient_id(),
                apt.status()
            );
            println!("    Symptoms: {}", apt.symptoms().unwrap_or("N/A"));
            println!("    ID: {}", apt.id());
        }
    }

    fn change_status(&mut self, action: StatusAction) {
        let pending: Vec<_> = match self.store.list_for(&self.actor) {
            Ok(list) => list
                .into_iter()
                .filter(|a| a.status() == AppointmentStatus::Pending)
                .collect(),
            Err(e) => {
                println!("\nError: {}", e);
                return;
            }
        };

        if pending.is_empty() {
            println!("\nNo pending appointments");
            return;
        }

        println!("\nPending appointments:");
        for (i, apt) in pending.iter().enumerate() {
            println!(
                "  {}. {} - {} at {}",
                i + 1,
                apt.patient_id(),
                apt.scheduled_for(),
                apt.facility().name
            );
        }

        let Some(choice) = self.get_int_input("Select appointment (0 to go back)", Some(0)) else {
            return;
        };
        if choice == 0 {
            return;
        }
        let Some(apt) = menu_index(choice).and_then(|i| pending.get(i)) else {
            println!("Invalid choice");
            return;
        };

        self.report_transition(apt.id(), action);
    }

    fn report_transition(&self, id: AppointmentId, action: StatusAction) {
        match self.store.apply(id, &self.actor, action) {
            Ok(updated) => println!("\nAppointment {} is now {}", updated.id(), updated.status()),
            Err(e) if e.is_retryable() => {
                println!("\n{}. Refresh the list and try again.", e)
            }
            Err(e) => println!("\nCould not update appointment: {}", e),
        }
    }

    fn show_dashboard(&self) {
        match self.store.list_for(&self.actor) {
            Ok(list) => {
                let stats = summarize(&list);
                println!("\n--- Dashboard ---");
                println!("  Total appointments: {}", stats.total);
                println!("  Pending: {}", stats.pending);
                println!("  Completed: {}", stats.completed);
                if self.actor.role.is_staff() {
                    println!("  Unique patients: {}", stats.patients);
                }
            }
            Err(e) => println!("\nError: {}", e),
        }
    }

    fn show_analytics(&self) {
        match self.store.analytics(&self.actor) {
            Ok(stats) => {
                println!("\n--- Clinic Analytics ---");
                println!("  Total appointments: {}", stats.total);
                println!("  Pending: {}", stats.pending);
                println!("  Completed: {}", stats.completed);
                println!("  Cancelled: {}", stats.cancelled());
                println!("  Total patients: {}", stats.patients);
                println!("  Completion rate: {:.1}%", stats.completion_rate());
            }
            Err(BookingError::Forbidden { .. }) => {
                println!("\nAnalytics are available to doctors and admins only")
            }
            Err(e) => println!("\nError: {}", e),
        }
    }

    fn export_json(&self) {
        let exported = self
            .store
            .list_for(&self.actor)
            .map_err(|e| e.to_string())
            .and_then(|list| serde_json::to_string_pretty(&list).map_err(|e| e.to_string()));

        match exported {
            Ok(json) => println!("{}", json),
            Err(e) => println!("\nError: {}", e),
        }
    }

    fn run_demo(&mut self) -> Result<(), BookingError> {
        println!("\n--- Running Demo ---");

        let tomorrow = (Local::now() + Duration::days(1)).date_naive();
        let next_week = (Local::now() + Duration::days(7)).date_naive();
        let slots = self.store.config().time_slots.clone();
        let facilities = self.store.config().facilities.clone();
        let (Some(first_slot), Some(last_slot)) = (slots.first().copied(), slots.last().copied()) else {
            return Ok(());
        };
        let Some(listing) = facilities.first() else {
            return Ok(());
        };

        let bookings = vec![
            BookingRequest::new("P001", listing.facility(), ScheduledFor::new(tomorrow, first_slot))
                .with_symptoms("Fever and headache")
                .with_doctor("D001"),
            BookingRequest::new("P002", listing.facility(), ScheduledFor::new(tomorrow, last_slot))
                .with_doctor("D001"),
            BookingRequest::new("P001", listing.facility(), ScheduledFor::new(next_week, first_slot))
                .with_symptoms("Follow-up"),
        ];

        let mut ids = Vec::new();
        for request in bookings {
            let patient = request.patient_id.clone();
            let apt = self.store.create(request)?;
            println!("  Booked {} for {} at {}", apt.id(), patient, apt.scheduled_for());
            ids.push(apt.id());
        }

        let doctor = Actor::doctor("D001");
        println!(
            "\nDr. D001 sees {} of {} appointments (the unassigned one is hidden)",
            self.store.list_for(&doctor)?.len(),
            ids.len()
        );

        self.store.apply(ids[0], &doctor, StatusAction::Complete)?;
        println!("Dr. D001 completed {}", ids[0]);

        match self.store.apply(ids[0], &doctor, StatusAction::Cancel) {
            Err(e) => println!("Cancelling it afterwards fails: {}", e),
            Ok(_) => println!("Unexpectedly cancelled a completed appointment"),
        }
        match self.store.apply(ids[1], &Actor::patient("P002"), StatusAction::Cancel) {
            Err(e) => println!("Patient P002 cannot cancel their own booking: {}", e),
            Ok(_) => println!("Unexpectedly allowed a patient transition"),
        }

        let stats = self.store.analytics(&Actor::admin("A001"))?;
        println!(
            "\nClinic totals: {} appointments, {} pending, {} completed, {} patients",
            stats.total, stats.pending, stats.completed, stats.patients
        );
        Ok(())
    }

    fn run(&mut self) {
        self.print_header();

        while self.running {
            self.print_menu();

            let Some(choice) = self.get_int_input("Enter choice", Some(9)) else {
                break;
            };

            match choice {
                1 => self.switch_user(),
                2 => self.book_appointment(),
                3 => self.view_appointments(),
                4 => self.change_status(StatusAction::Complete),
                5 => self.change_status(StatusAction::Cancel),
                6 => self.show_dashboard(),
                7 => self.show_analytics(),
                8 => self.export_json(),
                9 => {
                    if let Err(e) = self.run_demo() {
                        println!("\nDemo failed: {}", e);
                    }
                }
                0 => {
                    self.running = false;
                    println!("\nGoodbye!");
                }
                _ => println!("Invalid choice"),
            }
        }
    }
}

/// Convert a 1-based menu choice into a list index.
fn menu_index(choice: i64) -> Option<usize> {
    choice
        .checked_sub(1)
        .and_then(|i| usize::try_from(i).ok())
}

/// Resolve a facility prompt answer given as a menu number or a name.
fn pick_facility<'a>(config: &'a BookingConfig, choice: &str) -> Option<&'a FacilityListing> {
    match choice.trim().parse::<i64>() {
        Ok(n) => menu_index(n).and_then(|i| config.facilities.get(i)),
        Err(_) => config.find_facility(choice),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = match BookingConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut cli = BookingCLI::new(config);
    cli.run();
}
