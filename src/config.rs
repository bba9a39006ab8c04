use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{Facility, TimeSlot};

/// Application-level constants
pub const APP_NAME: &str = "medibook";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming a JSON booking config file.
pub const CONFIG_ENV: &str = "MEDIBOOK_CONFIG";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medibook=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A bookable facility as shown in the booking form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityListing {
    pub name: String,
    pub location: String,
    pub distance_km: f32,
    #[serde(default)]
    pub phone: Option<String>,
}

impl FacilityListing {
    fn new(name: &str, location: &str, distance_km: f32, phone: Option<&str>) -> Self {
        FacilityListing {
            name: name.to_string(),
            location: location.to_string(),
            distance_km,
            phone: phone.map(str::to_string),
        }
    }

    pub fn facility(&self) -> Facility {
        Facility::new(self.name.clone(), self.location.clone())
    }
}

/// Booking rules. Any field missing from a config file keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Furthest a visit may be booked ahead, in days.
    pub horizon_days: i64,
    /// Slots the booking form offers on every day.
    pub time_slots: Vec<TimeSlot>,
    pub facilities: Vec<FacilityListing>,
    pub max_symptoms_chars: usize,
}

impl Default for BookingConfig {
    fn default() -> Self {
        BookingConfig {
            horizon_days: 30,
            time_slots: default_time_slots(),
            facilities: default_facilities(),
            max_symptoms_chars: 2000,
        }
    }
}

impl BookingConfig {
    /// Load from the file named by `MEDIBOOK_CONFIG`, or use defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&raw)?;
        tracing::info!(path = %path.display(), "Loaded booking config");
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: BookingConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon_days <= 0 {
            return Err(ConfigError::Invalid(format!(
                "horizon_days must be positive, got {}",
                self.horizon_days
            )));
        }
        if self.time_slots.is_empty() {
            return Err(ConfigError::Invalid("time_slots cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn horizon(&self) -> Duration {
        Duration::days(self.horizon_days)
    }

    pub fn offers_slot(&self, slot: TimeSlot) -> bool {
        self.time_slots.contains(&slot)
    }

    pub fn find_facility(&self, name: &str) -> Option<&FacilityListing> {
        self.facilities
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// Half-hour slots, 09:00-11:30 and 14:00-16:30.
fn default_time_slots() -> Vec<TimeSlot> {
    [(9, 0), (9, 30), (10, 0), (10, 30), (11, 0), (11, 30), (14, 0), (14, 30), (15, 0), (15, 30), (16, 0), (16, 30)]
        .into_iter()
        .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
        .map(TimeSlot::new)
        .collect()
}

fn default_facilities() -> Vec<FacilityListing> {
    vec![
        FacilityListing::new("Government Hospital", "Pathapatnam, Andhra Pradesh", 3.2, Some("086722 22302")),
        FacilityListing::new("Doctor Veerendranath Hospital", "Buttaiahpeta, Machilipatnam", 1.8, Some("086722 22278")),
        FacilityListing::new("Vaishnavi Hospital", "Chinna Gandhi Bommi", 2.1, Some("0883 796 4513")),
        FacilityListing::new("Andhra Pradesh Government Hospital", "Tallapalem Road, Machilipatnam", 2.7, None),
        FacilityListing::new("Dr V Radha Krishna Murthy Hospital", "Shaik Imam Street, Machilipatnam", 3.5, Some("099498 46008")),
    ]
}
