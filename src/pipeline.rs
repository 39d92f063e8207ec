mod alarms;
mod appointments;
mod due;
mod medications;


pub use alarms::AlarmPipeline;
pub use appointments::AppointmentPipeline;
pub use due::{alarm_is_due, appointment_is_due, appointment_is_missed, first_due_dose};
pub use medications::MedicationPipeline;

use std::fmt;

/// Final disposition of one due item within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Sent,
    Invalid,
    Errored,
    /// Claimed by a concurrent run before this one got to it.
    Skipped,
    /// Reminder window already closed; the item can never fire.
    Missed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: usize,
    pub invalid: usize,
    pub errored: usize,
    pub skipped: usize,
    pub missed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Sent => self.sent += 1,
            ItemOutcome::Invalid => self.invalid += 1,
            ItemOutcome::Errored => self.errored += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Missed => self.missed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.sent + self.invalid + self.errored + self.skipped + self.missed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent={} invalid={} errored={} skipped={} missed={}",
            self.sent, self.invalid, self.errored, self.skipped, self.missed
        )
    }
}
