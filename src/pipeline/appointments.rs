use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::delivery::{DeliveryOutcome, PushDeliveryChannel};
use crate::models::{Appointment, PushMessage};
use crate::pipeline::due::{appointment_is_due, appointment_is_missed};
use crate::pipeline::{ItemOutcome, RunSummary};
use crate::storage::{AppointmentStore, UserStore};

/// Appointment reminder pipeline. The `notified` flag is only flipped after
/// a confirmed delivery, so a failed send is retried on later ticks until
/// the lookahead window closes (at-least-once within the window).
pub struct AppointmentPipeline {
    appointments: Arc<dyn AppointmentStore>,
    users: Arc<dyn UserStore>,
    delivery: Arc<dyn PushDeliveryChannel>,
    lookahead: Duration,
    dispatch_limit: usize,
}

impl AppointmentPipeline {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        users: Arc<dyn UserStore>,
        delivery: Arc<dyn PushDeliveryChannel>,
        lookahead: Duration,
        dispatch_limit: usize,
    ) -> Self {
        Self {
            appointments,
            users,
            delivery,
            lookahead,
            dispatch_limit,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> anyhow::Result<RunSummary> {
        let pending = self
            .appointments
            .unnotified()
            .await
            .context("querying unnotified appointments")?;

        if pending.is_empty() {
            log::debug!("[APPOINTMENTS] no unnotified appointments");
            return Ok(RunSummary::default());
        }

        let mut summary = RunSummary::default();
        let mut due = Vec::new();
        for appointment in pending {
            if appointment_is_due(&appointment, now, self.lookahead) {
                due.push(appointment);
            } else if appointment_is_missed(&appointment, now, self.lookahead) {
                log::warn!(
                    "[APPOINTMENTS] reminder window for appointment {} (dr. {}, {}) closed at {} without a send",
                    appointment.id,
                    appointment.doctor,
                    appointment.specialty,
                    appointment.reminder_time() + self.lookahead
                );
                // Recorded so the miss is reported once, not on every scan.
                if let Err(e) = self.appointments.mark_missed(appointment.id).await {
                    log::warn!(
                        "[APPOINTMENTS] failed to record missed appointment {}: {e}",
                        appointment.id
                    );
                }
                summary.record(ItemOutcome::Missed);
            }
        }

        if due.is_empty() {
            return Ok(summary);
        }

        log::info!("[APPOINTMENTS] processing {} due appointments", due.len());

        let semaphore = Arc::new(Semaphore::new(self.dispatch_limit));
        let mut tasks = JoinSet::new();
        for appointment in due {
            let semaphore = Arc::clone(&semaphore);
            let appointments = Arc::clone(&self.appointments);
            let users = Arc::clone(&self.users);
            let delivery = Arc::clone(&self.delivery);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                process_appointment(appointment, &*appointments, &*users, &*delivery).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    log::error!("[APPOINTMENTS] dispatch task failed to complete: {e}");
                    summary.record(ItemOutcome::Errored);
                }
            }
        }

        Ok(summary)
    }
}

async fn process_appointment(
    appointment: Appointment,
    appointments: &dyn AppointmentStore,
    users: &dyn UserStore,
    delivery: &dyn PushDeliveryChannel,
) -> ItemOutcome {
    let id = appointment.id;

    let token = match users.device_token(appointment.user_id).await {
        Ok(Some(token)) => token,
        // No endpoint right now; the client may re-register before the
        // window closes, so the flag stays false and later ticks retry.
        Ok(None) => {
            log::warn!(
                "[APPOINTMENTS] user {} has no device endpoint for appointment {id}",
                appointment.user_id
            );
            return ItemOutcome::Invalid;
        }
        Err(e) => {
            log::error!("[APPOINTMENTS] failed to load device endpoint for appointment {id}: {e}");
            return ItemOutcome::Errored;
        }
    };

    let title = format!("Appointment with dr. {}", appointment.doctor);
    let body = format!(
        "{} ({}) at {}",
        appointment.doctor,
        appointment.specialty,
        appointment.starts_at.format("%Y-%m-%d %H:%M UTC")
    );
    let message = PushMessage::new(Some(&title), Some(&body));

    match delivery.send_push(&token, &message).await {
        DeliveryOutcome::Delivered { message_id } => {
            log::info!("[APPOINTMENTS] appointment {id} reminder delivered, provider message {message_id}");
            if let Err(e) = appointments.mark_notified(id).await {
                // Flag stays false, so a later tick inside the window will
                // send again.
                log::warn!("[APPOINTMENTS] write-back failed for appointment {id}: {e}");
            }
            ItemOutcome::Sent
        }
        DeliveryOutcome::EndpointInvalid => {
            log::warn!("[APPOINTMENTS] endpoint no longer registered for appointment {id}");
            ItemOutcome::Invalid
        }
        DeliveryOutcome::Transient(detail) | DeliveryOutcome::Permanent(detail) => {
            log::error!("[APPOINTMENTS] send failed for appointment {id}, will retry while window is open: {detail}");
            ItemOutcome::Errored
        }
    }
}
