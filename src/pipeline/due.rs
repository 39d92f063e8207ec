use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};

use crate::models::{Alarm, AlarmStatus, Appointment, DoseTime, MedicationSchedule};

pub fn alarm_is_due(alarm: &Alarm, now: DateTime<Utc>) -> bool {
    alarm.status == AlarmStatus::Scheduled && alarm.fire_at <= now
}

/// An appointment is due once its reminder instant has arrived and stays
/// due while `now` is inside `[reminder_time, reminder_time + lookahead)`.
/// The lookahead must be at least the scan period for this kind, otherwise
/// an instant can fall between two ticks.
pub fn appointment_is_due(appointment: &Appointment, now: DateTime<Utc>, lookahead: Duration) -> bool {
    if appointment.notified {
        return false;
    }
    let reminder_time = appointment.reminder_time();
    reminder_time <= now && now < reminder_time + lookahead
}

/// The lookahead window closed without a send; the appointment can never
/// fire and is reported as permanently missed.
pub fn appointment_is_missed(appointment: &Appointment, now: DateTime<Utc>, lookahead: Duration) -> bool {
    !appointment.notified && now >= appointment.reminder_time() + lookahead
}

/// First configured dose time matching the current tick window, or None.
///
/// A dose at `t` owns the half-open window `[t, t + tick_width)` within the
/// same hour; a scan landing exactly on `t` matches, one landing on
/// `t + tick_width` does not. Only the first match counts, so two dose times
/// close together inside one window produce a single send.
pub fn first_due_dose(
    schedule: &MedicationSchedule,
    local_now: NaiveTime,
    tick_width_mins: u32,
) -> Option<DoseTime> {
    if !schedule.active {
        return None;
    }

    schedule
        .times
        .iter()
        .copied()
        .find(|dose| dose_matches(dose.time(), local_now, tick_width_mins))
}

fn dose_matches(dose: NaiveTime, now: NaiveTime, tick_width_mins: u32) -> bool {
    now.hour() == dose.hour()
        && dose.minute() <= now.minute()
        && now.minute() < dose.minute() + tick_width_mins
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use crate::models::{AppointmentId, UserId};

    fn alarm(status: AlarmStatus, fire_at: DateTime<Utc>) -> Alarm {
        Alarm {
            id: 1,
            user_id: 1,
            title: None,
            body: None,
            fire_at,
            status,
            created_at: Utc::now(),
        }
    }

    fn appointment(starts_at: DateTime<Utc>, lead_time: Duration, notified: bool) -> Appointment {
        Appointment {
            id: 1 as AppointmentId,
            user_id: 1 as UserId,
            doctor: "Dr. Harris".to_owned(),
            specialty: "Cardiology".to_owned(),
            starts_at,
            lead_time,
            notified,
            missed: false,
        }
    }

    fn schedule(times: &[(u32, u32)]) -> MedicationSchedule {
        MedicationSchedule {
            id: 1,
            user_id: 1,
            name: "Aspirin".to_owned(),
            dosage: "100mg".to_owned(),
            times: times
                .iter()
                .map(|&(h, m)| DoseTime::new(NaiveTime::from_hms_opt(h, m, 0).unwrap()))
                .collect(),
            interval_hours: 24,
            active: true,
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn past_scheduled_alarm_is_due() {
        let now = Utc::now();
        assert!(alarm_is_due(&alarm(AlarmStatus::Scheduled, now - Duration::minutes(1)), now));
        assert!(alarm_is_due(&alarm(AlarmStatus::Scheduled, now), now));
    }

    #[test]
    fn future_or_terminal_alarm_is_not_due() {
        let now = Utc::now();
        assert!(!alarm_is_due(&alarm(AlarmStatus::Scheduled, now + Duration::seconds(1)), now));
        assert!(!alarm_is_due(&alarm(AlarmStatus::Sent, now - Duration::minutes(1)), now));
        assert!(!alarm_is_due(&alarm(AlarmStatus::Error, now - Duration::minutes(1)), now));
        assert!(!alarm_is_due(&alarm(AlarmStatus::InFlight, now - Duration::minutes(1)), now));
    }

    #[test]
    fn appointment_outside_lookahead_is_not_due() {
        // Scanned one minute before the reminder instant arrives.
        let starts_at = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        let appt = appointment(starts_at, Duration::hours(2), false);
        let now = starts_at - Duration::hours(2) - Duration::minutes(1);
        assert!(!appointment_is_due(&appt, now, Duration::minutes(60)));
        assert!(!appointment_is_missed(&appt, now, Duration::minutes(60)));
    }

    #[test]
    fn appointment_inside_lookahead_is_due() {
        let starts_at = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        let appt = appointment(starts_at, Duration::hours(2), false);
        let now = starts_at - Duration::hours(2) + Duration::minutes(10);
        assert!(appointment_is_due(&appt, now, Duration::minutes(60)));
        assert!(!appointment_is_missed(&appt, now, Duration::minutes(60)));
    }

    #[test]
    fn notified_appointment_is_never_due() {
        let starts_at = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        let appt = appointment(starts_at, Duration::hours(2), true);
        let now = starts_at - Duration::hours(2) + Duration::minutes(10);
        assert!(!appointment_is_due(&appt, now, Duration::minutes(60)));
        assert!(!appointment_is_missed(&appt, now, Duration::minutes(60)));
    }

    #[test]
    fn appointment_window_is_half_open() {
        let starts_at = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        let appt = appointment(starts_at, Duration::hours(2), false);
        let lookahead = Duration::minutes(60);
        let reminder_time = starts_at - Duration::hours(2);

        assert!(appointment_is_due(&appt, reminder_time, lookahead));
        assert!(appointment_is_due(&appt, reminder_time + Duration::minutes(59), lookahead));
        // The closing boundary belongs to the missed side.
        assert!(!appointment_is_due(&appt, reminder_time + lookahead, lookahead));
        assert!(appointment_is_missed(&appt, reminder_time + lookahead, lookahead));
    }

    #[test]
    fn appointment_past_window_is_missed() {
        let starts_at = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        let appt = appointment(starts_at, Duration::hours(2), false);
        let now = starts_at - Duration::hours(2) + Duration::minutes(61);
        assert!(appointment_is_missed(&appt, now, Duration::minutes(60)));
        assert!(!appointment_is_due(&appt, now, Duration::minutes(60)));
    }

    #[test]
    fn first_matching_dose_wins_within_one_tick() {
        // 09:00 and 09:02 both fall inside the 5-minute window at 09:01;
        // only 09:00 fires.
        let s = schedule(&[(9, 0), (9, 2)]);
        let dose = first_due_dose(&s, at(9, 1), 5);
        assert_eq!(dose, Some(DoseTime::new(at(9, 0))));
    }

    #[test]
    fn dose_window_is_half_open() {
        let s = schedule(&[(9, 0)]);
        assert_eq!(first_due_dose(&s, at(9, 0), 5), Some(DoseTime::new(at(9, 0))));
        assert_eq!(first_due_dose(&s, at(9, 4), 5), Some(DoseTime::new(at(9, 0))));
        // The boundary minute belongs to the next window.
        assert_eq!(first_due_dose(&s, at(9, 5), 5), None);
    }

    #[test]
    fn dose_does_not_match_across_hours() {
        let s = schedule(&[(8, 58)]);
        assert_eq!(first_due_dose(&s, at(9, 1), 5), None);
    }

    #[test]
    fn inactive_schedule_never_matches() {
        let mut s = schedule(&[(9, 0)]);
        s.active = false;
        assert_eq!(first_due_dose(&s, at(9, 0), 5), None);
    }

    fn time_strategy() -> impl Strategy<Value = NaiveTime> {
        (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[proptest]
    fn at_most_one_dose_reported_per_tick(
        #[strategy(proptest::collection::vec((0u32..24, 0u32..60), 0..8))] times: Vec<(u32, u32)>,
        #[strategy(time_strategy())] local_now: NaiveTime,
    ) {
        let s = schedule(&times);
        // find() can only ever yield one value; the property worth pinning is
        // that the reported dose is itself inside the window.
        if let Some(dose) = first_due_dose(&s, local_now, 5) {
            prop_assert_eq!(dose.time().hour(), local_now.hour());
            prop_assert!(dose.time().minute() <= local_now.minute());
            prop_assert!(local_now.minute() < dose.time().minute() + 5);
        }
    }

    #[proptest]
    fn alarm_due_iff_scheduled_and_past(
        #[strategy(-10_000i64..10_000)] offset_secs: i64,
    ) {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let a = alarm(AlarmStatus::Scheduled, now + Duration::seconds(offset_secs));
        prop_assert_eq!(alarm_is_due(&a, now), offset_secs <= 0);
    }
}
