mod alarm;
mod appointment;
mod medication;
mod user;

pub use alarm::{Alarm, AlarmId, AlarmStatus, NewAlarm};
pub use appointment::{Appointment, AppointmentId, NewAppointment};
pub use medication::{DoseTime, MedicationId, MedicationSchedule, NewMedicationSchedule};
pub use user::{DeviceToken, User, UserId};

const DEFAULT_TITLE: &str = "Reminder";
const DEFAULT_BODY: &str = "You have a pending reminder.";

/// Payload handed to the delivery channel. Title and body fall back to
/// generic text when the record carries none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
}

impl PushMessage {
    pub fn new(title: Option<&str>, body: Option<&str>) -> Self {
        Self {
            title: non_empty(title).unwrap_or(DEFAULT_TITLE).to_owned(),
            body: non_empty(body).unwrap_or(DEFAULT_BODY).to_owned(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
