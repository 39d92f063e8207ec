use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::delivery::{DeliveryOutcome, PushDeliveryChannel};
use crate::models::{DoseTime, MedicationSchedule, PushMessage};
use crate::pipeline::due::first_due_dose;
use crate::pipeline::{ItemOutcome, RunSummary};
use crate::storage::{MedicationStore, UserStore};

/// Medication dose pipeline. Entirely stateless: no per-dose record is
/// written, the narrow tick window alone prevents duplicates. A failed send
/// is not retried because the window will not reopen for that dose.
pub struct MedicationPipeline {
    medications: Arc<dyn MedicationStore>,
    users: Arc<dyn UserStore>,
    delivery: Arc<dyn PushDeliveryChannel>,
    timezone: Tz,
    tick_width_mins: u32,
    dispatch_limit: usize,
}

impl MedicationPipeline {
    pub fn new(
        medications: Arc<dyn MedicationStore>,
        users: Arc<dyn UserStore>,
        delivery: Arc<dyn PushDeliveryChannel>,
        timezone: Tz,
        tick_width_mins: u32,
        dispatch_limit: usize,
    ) -> Self {
        Self {
            medications,
            users,
            delivery,
            timezone,
            tick_width_mins,
            dispatch_limit,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> anyhow::Result<RunSummary> {
        let schedules = self
            .medications
            .active_schedules()
            .await
            .context("querying active medication schedules")?;

        if schedules.is_empty() {
            log::debug!("[MEDICATIONS] no active schedules");
            return Ok(RunSummary::default());
        }

        let local_now = now.with_timezone(&self.timezone).time();

        let due: Vec<(MedicationSchedule, DoseTime)> = schedules
            .into_iter()
            .filter_map(|s| first_due_dose(&s, local_now, self.tick_width_mins).map(|d| (s, d)))
            .collect();

        if due.is_empty() {
            log::debug!("[MEDICATIONS] no doses due at {local_now}");
            return Ok(RunSummary::default());
        }

        log::info!("[MEDICATIONS] processing {} due doses", due.len());

        let semaphore = Arc::new(Semaphore::new(self.dispatch_limit));
        let mut tasks = JoinSet::new();
        for (schedule, dose) in due {
            let semaphore = Arc::clone(&semaphore);
            let users = Arc::clone(&self.users);
            let delivery = Arc::clone(&self.delivery);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                process_dose(schedule, dose, &*users, &*delivery).await
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    log::error!("[MEDICATIONS] dispatch task failed to complete: {e}");
                    summary.record(ItemOutcome::Errored);
                }
            }
        }

        Ok(summary)
    }
}

async fn process_dose(
    schedule: MedicationSchedule,
    dose: DoseTime,
    users: &dyn UserStore,
    delivery: &dyn PushDeliveryChannel,
) -> ItemOutcome {
    let id = schedule.id;

    let token = match users.device_token(schedule.user_id).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            log::warn!(
                "[MEDICATIONS] user {} has no device endpoint for schedule {id}",
                schedule.user_id
            );
            return ItemOutcome::Invalid;
        }
        Err(e) => {
            log::error!("[MEDICATIONS] failed to load device endpoint for schedule {id}: {e}");
            return ItemOutcome::Errored;
        }
    };

    let title = format!("Time for {}", schedule.name);
    let body = format!("Take {} of {} ({})", schedule.dosage, schedule.name, dose.time());
    let message = PushMessage::new(Some(&title), Some(&body));

    match delivery.send_push(&token, &message).await {
        DeliveryOutcome::Delivered { message_id } => {
            log::info!(
                "[MEDICATIONS] dose reminder for schedule {id} delivered, provider message {message_id}"
            );
            ItemOutcome::Sent
        }
        DeliveryOutcome::EndpointInvalid => {
            log::warn!(
                "[MEDICATIONS] endpoint no longer registered for schedule {id}; client must re-register"
            );
            ItemOutcome::Invalid
        }
        DeliveryOutcome::Transient(detail) | DeliveryOutcome::Permanent(detail) => {
            // Not retried; this dose's window will not reopen today.
            log::error!("[MEDICATIONS] send failed for schedule {id}: {detail}");
            ItemOutcome::Errored
        }
    }
}
