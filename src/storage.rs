mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Alarm, AlarmId, AlarmStatus, Appointment, AppointmentId, DeviceToken, MedicationId,
    MedicationSchedule, NewAlarm, NewAppointment, NewMedicationSchedule, User, UserId,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("no such record: {0}")]
    NotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// All alarms with `status == Scheduled` and `fire_at <= now`.
    async fn due_scheduled(&self, now: DateTime<Utc>) -> StorageResult<Vec<Alarm>>;

    /// Conditional transition `Scheduled -> InFlight`. Returns false when the
    /// alarm was already claimed or finalized by another run.
    async fn claim(&self, id: AlarmId) -> StorageResult<bool>;

    /// Writes the terminal status for a previously claimed alarm.
    async fn finalize(&self, id: AlarmId, status: AlarmStatus) -> StorageResult<()>;

    async fn insert_alarm(&self, alarm: NewAlarm) -> StorageResult<Alarm>;
    async fn alarm(&self, id: AlarmId) -> StorageResult<Option<Alarm>>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// All appointments still awaiting a reminder: `notified == false` and
    /// not yet recorded as missed.
    async fn unnotified(&self) -> StorageResult<Vec<Appointment>>;

    async fn mark_notified(&self, id: AppointmentId) -> StorageResult<()>;

    /// Records that the reminder window closed without a send; the record
    /// stops appearing in `unnotified` scans.
    async fn mark_missed(&self, id: AppointmentId) -> StorageResult<()>;

    async fn insert_appointment(&self, appointment: NewAppointment) -> StorageResult<Appointment>;
    async fn appointment(&self, id: AppointmentId) -> StorageResult<Option<Appointment>>;
}

#[async_trait]
pub trait MedicationStore: Send + Sync {
    async fn active_schedules(&self) -> StorageResult<Vec<MedicationSchedule>>;

    async fn insert_schedule(&self, schedule: NewMedicationSchedule) -> StorageResult<MedicationSchedule>;
    async fn set_schedule_active(&self, id: MedicationId, active: bool) -> StorageResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn device_token(&self, id: UserId) -> StorageResult<Option<DeviceToken>>;

    /// Client-side registration path; overwrites any previous token.
    async fn set_device_token(&self, id: UserId, token: Option<DeviceToken>) -> StorageResult<()>;

    async fn upsert_user(&self, user: User) -> StorageResult<()>;
}
