use chrono::{DateTime, Duration, Utc};

use crate::models::UserId;

pub type AppointmentId = i64;

#[derive(Debug, Clone)]
pub struct Appointment {
    pub id: AppointmentId,
    pub user_id: UserId,
    pub doctor: String,
    pub specialty: String,
    pub starts_at: DateTime<Utc>,
    /// Offset before `starts_at` at which the reminder should fire.
    pub lead_time: Duration,
    pub notified: bool,
    /// Set once the reminder window closed without a send, so the miss is
    /// reported a single time and the record drops out of future scans.
    pub missed: bool,
}

impl Appointment {
    pub fn reminder_time(&self) -> DateTime<Utc> {
        self.starts_at - self.lead_time
    }
}

pub struct NewAppointment {
    pub user_id: UserId,
    pub doctor: String,
    pub specialty: String,
    pub starts_at: DateTime<Utc>,
    pub lead_time: Duration,
}
