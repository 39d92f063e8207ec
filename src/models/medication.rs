use chrono::{NaiveTime, Timelike};

use crate::models::UserId;

pub type MedicationId = i64;

/// Configured time-of-day for a dose, normalized to whole minutes so window
/// comparisons never depend on stray seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoseTime(NaiveTime);

impl DoseTime {
    pub fn new(inner: NaiveTime) -> Self {
        let normalized = inner
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .expect("Will never fail.");
        Self(normalized)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct MedicationSchedule {
    pub id: MedicationId,
    pub user_id: UserId,
    pub name: String,
    pub dosage: String,
    pub times: Vec<DoseTime>,
    pub interval_hours: u32,
    pub active: bool,
}

pub struct NewMedicationSchedule {
    pub user_id: UserId,
    pub name: String,
    pub dosage: String,
    pub times: Vec<DoseTime>,
    pub interval_hours: u32,
}
