//! Pace check against the weekly target.
//!
//! The weekly target is spread evenly over the four working days Monday
//! through Thursday. From the current weekday and hour this derives what
//! should already be banked, today's quota (including any catch-up deficit),
//! and whether the user is on pace. Surplus from earlier days is tracked but
//! never reduces today's own quota.
//!
//! Pure function of its inputs; the optional [`StatusOverride`] substitutes
//! a simulated weekday, hour or point total for testing and debugging.

use chrono::Weekday;

/// Simulated inputs for [`compute_status`]. Used by tests and the status
/// command's debug flags, never by production callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusOverride {
    pub day: Option<Weekday>,
    pub hour: Option<u32>,
    pub points: Option<f64>,
}

/// Ephemeral pace snapshot, recomputed from the current week's totals and
/// the wall clock. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// weekly_target / 4.
    pub points_per_day: f64,
    /// Points expected banked from days strictly before today.
    pub target_previously: f64,
    pub points_done_today: f64,
    pub points_done_previously: f64,
    /// Shortfall from prior days; zero when on or ahead of schedule.
    pub deficit: f64,
    /// Surplus banked from prior days. Does not reduce today's quota.
    pub banked_advance: f64,
    /// Base quota for today: points_per_day Monday-Thursday, 0 otherwise.
    pub target_today: f64,
    /// target_today plus the deficit to catch up.
    pub total_target_today: f64,
    pub points_to_do_today: f64,
    pub expected_by_end_of_today: f64,
    /// Surplus over the end-of-today expectation.
    pub total_advance: f64,
    /// The lunch-checkpoint expectation the pace check compares against.
    pub expected_points: f64,
    pub is_up_to_date: bool,
    pub weekly_points: f64,
    pub weekday: Weekday,
    pub hour: u32,
}

/// Compute the pace snapshot for the current week.
///
/// `daily_breakdown` is Monday = index 0 through Sunday = index 6. An hour
/// outside 0..=23 is a precondition violation.
pub fn compute_status(
    weekly_points: f64,
    daily_breakdown: &[f64; 7],
    weekly_target: f64,
    weekday: Weekday,
    hour: u32,
) -> StatusSnapshot {
    assert!(hour < 24, "hour out of range: {hour}");

    let iso_day = weekday.number_from_monday(); // 1 = Monday .. 7 = Sunday
    let working_day = iso_day <= 4;
    let points_per_day = weekly_target / 4.0;

    let work_days_passed = (iso_day - 1).min(4);
    let target_previously = points_per_day * work_days_passed as f64;

    let points_done_today = daily_breakdown[(iso_day - 1) as usize];
    let points_done_previously = (weekly_points - points_done_today).max(0.0);

    let raw_deficit = target_previously - points_done_previously;
    let deficit = raw_deficit.max(0.0);
    let banked_advance = (-raw_deficit).max(0.0);

    let target_today = if working_day { points_per_day } else { 0.0 };
    let total_target_today = target_today + deficit;
    let points_to_do_today = (total_target_today - points_done_today).max(0.0);

    let expected_by_end_of_today = points_per_day * iso_day.min(4) as f64;
    let total_advance = (weekly_points - expected_by_end_of_today).max(0.0);

    // Lunch checkpoint: by early afternoon half of today's quota should be
    // done.
    let mut expected_points = target_previously;
    if working_day && hour >= 13 {
        expected_points += total_target_today / 2.0;
    }
    let is_up_to_date = weekly_points >= expected_points;

    StatusSnapshot {
        points_per_day,
        target_previously,
        points_done_today,
        points_done_previously,
        deficit,
        banked_advance,
        target_today,
        total_target_today,
        points_to_do_today,
        expected_by_end_of_today,
        total_advance,
        expected_points,
        is_up_to_date,
        weekly_points,
        weekday,
        hour,
    }
}

/// [`compute_status`] with simulated inputs substituted for the live ones.
pub fn compute_status_with(
    weekly_points: f64,
    daily_breakdown: &[f64; 7],
    weekly_target: f64,
    weekday: Weekday,
    hour: u32,
    overrides: StatusOverride,
) -> StatusSnapshot {
    compute_status(
        overrides.points.unwrap_or(weekly_points),
        daily_breakdown,
        weekly_target,
        overrides.day.unwrap_or(weekday),
        overrides.hour.unwrap_or(hour),
    )
}
