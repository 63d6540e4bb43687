use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_database::{AppointmentRepository, ScheduleRepository};
use shared_models::error::AppError;
use shared_models::schedule::{day_index, Schedule, TimeSlot};

/// Tiles `[start, end)` into back-to-back slots of a fixed length. A trailing
/// remainder shorter than one slot is dropped. Cloning restarts the walk from
/// wherever the clone was taken.
#[derive(Debug, Clone)]
pub struct SlotTiler {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl SlotTiler {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, slot_minutes: i32) -> Self {
        Self {
            cursor: start,
            end,
            step: Duration::minutes(i64::from(slot_minutes.max(1))),
        }
    }

    /// The slots of `schedule` on `date`, with schedule times read as UTC.
    pub fn for_schedule(schedule: &Schedule, date: NaiveDate) -> Self {
        Self::new(
            utc_on(date, schedule.start_time),
            utc_on(date, schedule.end_time),
            schedule.slot_duration_minutes,
        )
    }
}

impl Iterator for SlotTiler {
    type Item = (DateTime<Utc>, DateTime<Utc>);

    fn next(&mut self) -> Option<Self::Item> {
        let slot_end = self.cursor + self.step;
        if slot_end > self.end {
            return None;
        }
        let slot = (self.cursor, slot_end);
        self.cursor = slot_end;
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.cursor).num_minutes().max(0);
        let n = (remaining / self.step.num_minutes().max(1)) as usize;
        (n, Some(n))
    }
}

fn utc_on(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Turns weekly schedules into concrete bookable slots and validates requested
/// appointment times against them.
pub struct AvailabilityService {
    schedules: Arc<dyn ScheduleRepository>,
    appointments: Arc<dyn AppointmentRepository>,
}

impl AvailabilityService {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        appointments: Arc<dyn AppointmentRepository>,
    ) -> Self {
        Self {
            schedules,
            appointments,
        }
    }

    async fn active_schedule(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Option<Schedule>, AppError> {
        let schedule = self
            .schedules
            .get_for_day(doctor_id, day_index(date))
            .await?;
        Ok(schedule.filter(|s| s.is_active))
    }

    pub async fn compute_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, AppError> {
        self.compute_available_slots_at(doctor_id, date, Utc::now()).await
    }

    /// Same as `compute_available_slots` with an explicit clock.
    pub async fn compute_available_slots_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, AppError> {
        let Some(schedule) = self.active_schedule(doctor_id, date).await? else {
            debug!("No active schedule for doctor {} on {}", doctor_id, date);
            return Ok(Vec::new());
        };

        let day_start = utc_on(date, schedule.start_time);
        let day_end = utc_on(date, schedule.end_time);
        let booked = self
            .appointments
            .find_overlapping(doctor_id, day_start, day_end, None)
            .await?;

        let slots: Vec<TimeSlot> = SlotTiler::for_schedule(&schedule, date)
            .map(|(start, end)| TimeSlot {
                start_time: start,
                end_time: end,
                is_available: start > now && !booked.iter().any(|a| a.overlaps(start, end)),
            })
            .collect();

        debug!(
            "Doctor {} has {} slots on {} ({} booked)",
            doctor_id,
            slots.len(),
            date,
            booked.len()
        );
        Ok(slots)
    }

    /// The active schedule covering `date_time`, provided a full slot starting
    /// then fits inside that weekday's `[start, end)` window.
    pub async fn resolve_booking_window(
        &self,
        doctor_id: Uuid,
        date_time: DateTime<Utc>,
    ) -> Result<Schedule, AppError> {
        let schedule = self
            .active_schedule(doctor_id, date_time.date_naive())
            .await?
            .ok_or_else(|| {
                AppError::ValidationError("Doctor is not available on this day".to_string())
            })?;

        let slot = Duration::minutes(i64::from(schedule.slot_duration_minutes.max(1)));
        let window_end = utc_on(date_time.date_naive(), schedule.end_time);
        if date_time.time() < schedule.start_time || date_time + slot > window_end {
            return Err(AppError::ValidationError(format!(
                "Appointment time must be between {} and {}",
                schedule.start_time.format("%H:%M"),
                schedule.end_time.format("%H:%M")
            )));
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 8, h, m, 0).unwrap()
    }

    #[test]
    fn tiles_whole_slots_only() {
        let slots: Vec<_> = SlotTiler::new(at(9, 0), at(10, 45), 30).collect();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0], (at(9, 0), at(9, 30)));
        assert_eq!(slots[2], (at(10, 0), at(10, 30)));
    }

    #[test]
    fn size_hint_matches_count() {
        let tiler = SlotTiler::new(at(9, 0), at(17, 0), 45);
        assert_eq!(tiler.size_hint(), (10, Some(10)));
        assert_eq!(tiler.count(), 10);
    }

    #[test]
    fn clone_restarts_from_the_same_point() {
        let mut tiler = SlotTiler::new(at(9, 0), at(11, 0), 30);
        tiler.next();
        let replay = tiler.clone();
        assert_eq!(tiler.collect::<Vec<_>>(), replay.collect::<Vec<_>>());
    }

    #[test]
    fn window_shorter_than_a_slot_is_empty() {
        assert_eq!(SlotTiler::new(at(9, 0), at(9, 20), 30).count(), 0);
    }
}
