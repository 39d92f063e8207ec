use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{
    Alarm, AlarmId, AlarmStatus, Appointment, AppointmentId, DeviceToken, MedicationId,
    MedicationSchedule, NewAlarm, NewAppointment, NewMedicationSchedule, User, UserId,
};
use crate::storage::{
    AlarmStore, AppointmentStore, MedicationStore, StorageError, StorageResult, UserStore,
};

#[derive(Default)]
struct Collections {
    next_id: i64,
    alarms: HashMap<AlarmId, Alarm>,
    appointments: HashMap<AppointmentId, Appointment>,
    medications: HashMap<MedicationId, MedicationSchedule>,
    users: HashMap<UserId, User>,
}

impl Collections {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Document-store stand-in backed by in-process maps. Backs the test suite
/// and the default wiring; a cloud document database slots in behind the
/// same traits.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Collections>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlarmStore for InMemoryStore {
    async fn due_scheduled(&self, now: DateTime<Utc>) -> StorageResult<Vec<Alarm>> {
        let store = self.inner.read().await;
        Ok(store
            .alarms
            .values()
            .filter(|a| a.status == AlarmStatus::Scheduled && a.fire_at <= now)
            .cloned()
            .collect())
    }

    async fn claim(&self, id: AlarmId) -> StorageResult<bool> {
        let mut store = self.inner.write().await;
        let alarm = store
            .alarms
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("alarm {id}")))?;

        if alarm.status == AlarmStatus::Scheduled {
            alarm.status = AlarmStatus::InFlight;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn finalize(&self, id: AlarmId, status: AlarmStatus) -> StorageResult<()> {
        let mut store = self.inner.write().await;
        let alarm = store
            .alarms
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("alarm {id}")))?;
        alarm.status = status;
        Ok(())
    }

    async fn insert_alarm(&self, alarm: NewAlarm) -> StorageResult<Alarm> {
        let mut store = self.inner.write().await;
        let id = store.assign_id();
        let alarm = Alarm {
            id,
            user_id: alarm.user_id,
            title: alarm.title,
            body: alarm.body,
            fire_at: alarm.fire_at,
            status: AlarmStatus::Scheduled,
            created_at: Utc::now(),
        };
        store.alarms.insert(id, alarm.clone());
        Ok(alarm)
    }

    async fn alarm(&self, id: AlarmId) -> StorageResult<Option<Alarm>> {
        let store = self.inner.read().await;
        Ok(store.alarms.get(&id).cloned())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn unnotified(&self) -> StorageResult<Vec<Appointment>> {
        let store = self.inner.read().await;
        Ok(store
            .appointments
            .values()
            .filter(|a| !a.notified && !a.missed)
            .cloned()
            .collect())
    }

    async fn mark_notified(&self, id: AppointmentId) -> StorageResult<()> {
        let mut store = self.inner.write().await;
        let appointment = store
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("appointment {id}")))?;
        appointment.notified = true;
        Ok(())
    }

    async fn mark_missed(&self, id: AppointmentId) -> StorageResult<()> {
        let mut store = self.inner.write().await;
        let appointment = store
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("appointment {id}")))?;
        appointment.missed = true;
        Ok(())
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> StorageResult<Appointment> {
        let mut store = self.inner.write().await;
        let id = store.assign_id();
        let appointment = Appointment {
            id,
            user_id: appointment.user_id,
            doctor: appointment.doctor,
            specialty: appointment.specialty,
            starts_at: appointment.starts_at,
            lead_time: appointment.lead_time,
            notified: false,
            missed: false,
        };
        store.appointments.insert(id, appointment.clone());
        Ok(appointment)
    }

    async fn appointment(&self, id: AppointmentId) -> StorageResult<Option<Appointment>> {
        let store = self.inner.read().await;
        Ok(store.appointments.get(&id).cloned())
    }
}

#[async_trait]
impl MedicationStore for InMemoryStore {
    async fn active_schedules(&self) -> StorageResult<Vec<MedicationSchedule>> {
        let store = self.inner.read().await;
        Ok(store
            .medications
            .values()
            .filter(|m| m.active)
            .cloned()
            .collect())
    }

    async fn insert_schedule(&self, schedule: NewMedicationSchedule) -> StorageResult<MedicationSchedule> {
        let mut store = self.inner.write().await;
        let id = store.assign_id();
        let schedule = MedicationSchedule {
            id,
            user_id: schedule.user_id,
            name: schedule.name,
            dosage: schedule.dosage,
            times: schedule.times,
            interval_hours: schedule.interval_hours,
            active: true,
        };
        store.medications.insert(id, schedule.clone());
        Ok(schedule)
    }

    async fn set_schedule_active(&self, id: MedicationId, active: bool) -> StorageResult<()> {
        let mut store = self.inner.write().await;
        let schedule = store
            .medications
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("medication {id}")))?;
        schedule.active = active;
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn device_token(&self, id: UserId) -> StorageResult<Option<DeviceToken>> {
        let store = self.inner.read().await;
        Ok(store.users.get(&id).and_then(|u| u.device_token.clone()))
    }

    async fn set_device_token(&self, id: UserId, token: Option<DeviceToken>) -> StorageResult<()> {
        let mut store = self.inner.write().await;
        let user = store
            .users
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("user {id}")))?;
        user.device_token = token;
        Ok(())
    }

    async fn upsert_user(&self, user: User) -> StorageResult<()> {
        let mut store = self.inner.write().await;
        store.users.insert(user.id, user);
        Ok(())
    }
}
