// libs/appointment-cell/src/services/time_grid.rs
//! Slot arithmetic. Pure functions only; every instant is resolved against a
//! single fixed-offset civil clock so that generation and comparison agree.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use doctor_cell::WorkingHours;
use shared_config::SchedulingConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeGridError {
    #[error("Invalid working hours window: start {start} is not before end {end}")]
    InvalidWindow { start: NaiveTime, end: NaiveTime },

    #[error("Invalid slot granularity: {0} minutes")]
    InvalidGranularity(i64),

    #[error("Local time {0} cannot be resolved in the schedule clock")]
    UnresolvableLocalTime(NaiveDateTime),
}

/// Candidate slot starts for `day`: `start, start+g, ...` strictly before `end`.
pub fn generate_slots(
    start: NaiveTime,
    end: NaiveTime,
    day: NaiveDate,
    granularity_minutes: i64,
    anchor: FixedOffset,
) -> Result<Vec<DateTime<Utc>>, TimeGridError> {
    if granularity_minutes <= 0 {
        return Err(TimeGridError::InvalidGranularity(granularity_minutes));
    }
    if start >= end {
        return Err(TimeGridError::InvalidWindow { start, end });
    }

    let step = Duration::minutes(granularity_minutes);
    let window_end = day.and_time(end);
    let mut cursor = day.and_time(start);
    let mut slots = Vec::new();

    while cursor < window_end {
        slots.push(resolve(cursor, anchor)?);
        cursor += step;
    }

    Ok(slots)
}

fn resolve(local: NaiveDateTime, anchor: FixedOffset) -> Result<DateTime<Utc>, TimeGridError> {
    anchor
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(TimeGridError::UnresolvableLocalTime(local))
}

/// Slot grid for one scheduling configuration.
#[derive(Debug, Clone, Copy)]
pub struct TimeGrid {
    anchor: FixedOffset,
    granularity_minutes: i64,
}

impl TimeGrid {
    pub fn new(anchor: FixedOffset, granularity_minutes: i64) -> Result<Self, TimeGridError> {
        if granularity_minutes <= 0 {
            return Err(TimeGridError::InvalidGranularity(granularity_minutes));
        }
        Ok(Self {
            anchor,
            granularity_minutes,
        })
    }

    pub fn from_config(config: &SchedulingConfig) -> Result<Self, TimeGridError> {
        Self::new(config.time_anchor(), config.slot_granularity_minutes)
    }

    pub fn granularity_minutes(&self) -> i64 {
        self.granularity_minutes
    }

    pub fn slots_for(&self, hours: &WorkingHours, day: NaiveDate) -> Result<Vec<DateTime<Utc>>, TimeGridError> {
        generate_slots(hours.start(), hours.end(), day, self.granularity_minutes, self.anchor)
    }

    /// Calendar day an instant falls on in the schedule clock.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.anchor).date_naive()
    }

    pub fn is_today(&self, day: NaiveDate, now: DateTime<Utc>) -> bool {
        self.day_of(now) == day
    }

    /// Half-open `[midnight, next midnight)` of `day`, as UTC instants.
    pub fn day_bounds(&self, day: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), TimeGridError> {
        let start = day.and_time(NaiveTime::MIN);
        let end = start + Duration::days(1);
        Ok((resolve(start, self.anchor)?, resolve(end, self.anchor)?))
    }

    pub fn is_on_grid(&self, hours: &WorkingHours, instant: DateTime<Utc>) -> Result<bool, TimeGridError> {
        let day = self.day_of(instant);
        Ok(self.slots_for(hours, day)?.contains(&instant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, 14).unwrap()
    }

    #[test]
    fn full_working_day_yields_sixteen_half_hour_slots() {
        let slots = generate_slots(t(9, 0), t(17, 0), day(), 30, utc()).unwrap();

        assert_eq!(slots.len(), 16);
        assert_eq!(slots[0], Utc.with_ymd_and_hms(2030, 5, 14, 9, 0, 0).unwrap());
        assert_eq!(slots[15], Utc.with_ymd_and_hms(2030, 5, 14, 16, 30, 0).unwrap());
    }

    #[test]
    fn slots_are_strictly_ascending_and_stay_inside_window() {
        let windows = [(t(9, 0), t(17, 0)), (t(8, 15), t(9, 0)), (t(0, 0), t(23, 59)), (t(13, 0), t(13, 1))];
        for (start, end) in windows {
            for granularity in [1, 7, 15, 30, 45, 60, 90] {
                let slots = generate_slots(start, end, day(), granularity, utc()).unwrap();
                let window_start = Utc.from_utc_datetime(&day().and_time(start));
                let window_end = Utc.from_utc_datetime(&day().and_time(end));

                assert_eq!(slots.first().copied(), Some(window_start));
                assert!(slots.windows(2).all(|w| w[1] - w[0] == Duration::minutes(granularity)));
                assert!(slots.iter().all(|s| *s >= window_start && *s < window_end));
                let next = *slots.last().unwrap() + Duration::minutes(granularity);
                assert!(next >= window_end);
            }
        }
    }

    #[test]
    fn window_shorter_than_granularity_still_offers_start() {
        let slots = generate_slots(t(9, 0), t(9, 10), day(), 30, utc()).unwrap();
        assert_eq!(slots, vec![Utc.with_ymd_and_hms(2030, 5, 14, 9, 0, 0).unwrap()]);
    }

    #[test]
    fn rejects_empty_or_inverted_window() {
        assert_eq!(
            generate_slots(t(10, 0), t(10, 0), day(), 30, utc()),
            Err(TimeGridError::InvalidWindow { start: t(10, 0), end: t(10, 0) })
        );
        assert!(matches!(
            generate_slots(t(17, 0), t(9, 0), day(), 30, utc()),
            Err(TimeGridError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_granularity() {
        assert_eq!(
            generate_slots(t(9, 0), t(17, 0), day(), 0, utc()),
            Err(TimeGridError::InvalidGranularity(0))
        );
        assert_eq!(TimeGrid::new(utc(), -30).unwrap_err(), TimeGridError::InvalidGranularity(-30));
    }

    #[test]
    fn anchor_offset_shifts_instants() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let slots = generate_slots(t(9, 0), t(10, 0), day(), 30, plus_two).unwrap();
        assert_eq!(slots[0], Utc.with_ymd_and_hms(2030, 5, 14, 7, 0, 0).unwrap());
    }

    #[test]
    fn day_helpers_use_the_anchor() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let grid = TimeGrid::new(plus_two, 30).unwrap();

        // 23:30 UTC on the 13th is already the 14th at +02:00.
        let late = Utc.with_ymd_and_hms(2030, 5, 13, 23, 30, 0).unwrap();
        assert_eq!(grid.day_of(late), day());
        assert!(grid.is_today(day(), late));

        let (from, to) = grid.day_bounds(day()).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2030, 5, 13, 22, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2030, 5, 14, 22, 0, 0).unwrap());
    }

    #[test]
    fn grid_membership() {
        let grid = TimeGrid::new(utc(), 30).unwrap();
        let hours = WorkingHours::parse("09:00", "10:00").unwrap();

        assert!(grid.is_on_grid(&hours, Utc.with_ymd_and_hms(2030, 5, 14, 9, 30, 0).unwrap()).unwrap());
        assert!(!grid.is_on_grid(&hours, Utc.with_ymd_and_hms(2030, 5, 14, 9, 15, 0).unwrap()).unwrap());
        assert!(!grid.is_on_grid(&hours, Utc.with_ymd_and_hms(2030, 5, 14, 10, 0, 0).unwrap()).unwrap());
    }
}
