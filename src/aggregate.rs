//! Batch aggregation of normalized tasks.
//!
//! One pass over the full task snapshot produces the current-sprint summary,
//! the full-year weekly history (with holiday inference), the annual metrics,
//! and the current week's detail. The whole output is recomputed from scratch
//! on every call; there is no incremental state, so running it twice on the
//! same inputs yields identical output.
//!
//! The weekly detail is also exposed standalone as [`week_detail`]: the week
//! view can be navigated to an arbitrary date, and that second pass is the
//! authoritative weekly value wherever both are computed.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Weekday};

use crate::calendar::{iso_week_number, iso_week_start_date, week_range};
use crate::normalize::NormalizedTask;
use crate::settings::Settings;

const DAY_MS: i64 = 86_400_000;

/// The current sprint, reduced to what aggregation needs.
#[derive(Debug, Clone)]
pub struct SprintRef {
    pub id: String,
    pub name: String,
    /// Due date, epoch milliseconds.
    pub due_date: Option<i64>,
}

/// Point totals for one ISO week of the current year.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyBucket {
    pub week: u32,
    /// Monday of the week.
    pub start_date: NaiveDate,
    pub points: f64,
    /// Distinct calendar days with at least one completion.
    pub work_days: usize,
    pub target: f64,
    pub remaining: f64,
    /// Inferred: a past week with zero points is assumed to be vacation.
    /// There is no way to tell vacation apart from sickness or unlogged time;
    /// accepted approximation, preserved as-is.
    pub is_holiday: bool,
}

/// Year-to-date totals derived from the weekly history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnualMetrics {
    pub annual_target: f64,
    pub total_points_done: f64,
    pub total_work_days: usize,
    /// Mean points per worked week, one decimal. Excludes the in-progress
    /// current week Monday through Thursday.
    pub average_points_per_week: f64,
    pub annual_remaining: f64,
    pub vacation_weeks_used: u32,
    pub vacation_weeks_remaining: i64,
}

/// Current-sprint rollup.
#[derive(Debug, Clone, Default)]
pub struct SprintSummary {
    pub name: String,
    pub completed_points: f64,
    pub total_points: f64,
    /// Open tasks worth counting: points > 0 or a name longer than 3 bytes.
    /// Fragile placeholder filter, preserved literally.
    pub tasks_remaining: usize,
    /// Days until the Thursday deadline of the due-date week.
    pub days_left: i64,
    /// Days until the Sunday cutoff of the due-date week.
    pub buffer_days: i64,
    pub tasks: Vec<NormalizedTask>,
}

/// Points and per-weekday totals for one viewed week.
#[derive(Debug, Clone, Default)]
pub struct WeekDetail {
    pub points: f64,
    /// Monday = index 0 through Sunday = index 6.
    pub daily_breakdown: [f64; 7],
    pub tasks: Vec<NormalizedTask>,
}

#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub sprint: SprintSummary,
    pub week: WeekDetail,
    /// Week 1 through the current week, ascending.
    pub weeks: Vec<WeeklyBucket>,
    pub metrics: AnnualMetrics,
}

/// Round to the nearest quarter point. Display-precision contract for every
/// point sum shown as a total.
pub fn quarter_round(x: f64) -> f64 {
    (x * 4.0).round() / 4.0
}

fn round_one_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Ceiling of a millisecond difference in calendar days.
fn ceil_days(diff_ms: i64) -> i64 {
    (diff_ms as f64 / DAY_MS as f64).ceil() as i64
}

fn local_datetime(epoch_ms: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(epoch_ms).single()
}

/// Membership check: home list or secondary location.
fn in_sprint(task: &NormalizedTask, sprint_id: &str) -> bool {
    task.list_id == sprint_id || task.location_ids.iter().any(|id| id == sprint_id)
}

fn sprint_summary(
    tasks: &[NormalizedTask],
    sprint: &SprintRef,
    now: DateTime<Local>,
) -> SprintSummary {
    let sprint_tasks: Vec<NormalizedTask> = tasks
        .iter()
        .filter(|t| in_sprint(t, &sprint.id))
        .cloned()
        .collect();

    let mut completed = 0.0;
    let mut total = 0.0;
    let mut remaining = 0;
    for task in &sprint_tasks {
        total += task.points;
        if task.is_closed {
            completed += task.points;
        } else if task.points > 0.0 || task.name.len() > 3 {
            remaining += 1;
        }
    }

    let (days_left, buffer_days) = match sprint.due_date {
        Some(due_ms) => match local_datetime(due_ms) {
            Some(due) => {
                // Sunday of the due-date week is the hard cutoff, Thursday
                // the official deadline.
                let days_to_sunday = (7 - due.weekday().num_days_from_sunday() as i64) % 7;
                let sunday_ms = due_ms + days_to_sunday * DAY_MS;
                let thursday_ms = sunday_ms - 3 * DAY_MS;
                let now_ms = now.timestamp_millis();
                (
                    ceil_days(thursday_ms - now_ms),
                    ceil_days(sunday_ms - now_ms),
                )
            }
            None => (0, 0),
        },
        None => (0, 0),
    };

    SprintSummary {
        name: sprint.name.clone(),
        completed_points: quarter_round(completed),
        total_points: quarter_round(total),
        tasks_remaining: remaining,
        days_left,
        buffer_days,
        tasks: sprint_tasks,
    }
}

/// Points, per-weekday totals and the completed tasks of the week containing
/// `viewed`. Only completions inside the week's Monday-to-Sunday bounds
/// count, so the viewed date may be any week, past or future.
pub fn week_detail(tasks: &[NormalizedTask], viewed: NaiveDate) -> WeekDetail {
    let (start, end) = week_range(viewed);
    let mut detail = WeekDetail::default();
    for task in tasks {
        if !task.is_closed {
            continue;
        }
        let Some(done_ms) = task.date_done else {
            continue;
        };
        let Some(done) = local_datetime(done_ms) else {
            continue;
        };
        let done = done.naive_local();
        if done < start || done > end {
            continue;
        }
        detail.points += task.points;
        let day_index = done.weekday().num_days_from_monday() as usize;
        detail.daily_breakdown[day_index] += task.points;
        detail.tasks.push(task.clone());
    }
    detail.points = quarter_round(detail.points);
    detail
}

struct WeekAccumulator {
    points: f64,
    days: BTreeSet<NaiveDate>,
}

fn weekly_history(
    tasks: &[NormalizedTask],
    settings: &Settings,
    now: DateTime<Local>,
) -> (Vec<WeeklyBucket>, AnnualMetrics) {
    let today = now.date_naive();
    let current_week = iso_week_number(today);
    let current_year = today.year();

    let mut by_week: HashMap<u32, WeekAccumulator> = HashMap::new();
    for task in tasks {
        if !task.is_closed {
            continue;
        }
        let Some(done_ms) = task.date_done else {
            continue;
        };
        let Some(done) = local_datetime(done_ms) else {
            continue;
        };
        let done = done.date_naive();
        if done.year() != current_year {
            continue;
        }
        let week = iso_week_number(done);
        let acc = by_week.entry(week).or_insert_with(|| WeekAccumulator {
            points: 0.0,
            days: BTreeSet::new(),
        });
        acc.points += task.points;
        acc.days.insert(done);
    }

    let mut weeks = Vec::with_capacity(current_week as usize);
    let mut annual_points = 0.0;
    let mut total_work_days = 0;
    let mut holidays = 0;
    for week in 1..=current_week {
        let (points, work_days) = by_week
            .get(&week)
            .map(|acc| (quarter_round(acc.points), acc.days.len()))
            .unwrap_or((0.0, 0));

        let mut target = settings.weekly_target;
        let mut is_holiday = false;
        if week < current_week && points == 0.0 {
            target = 0.0;
            is_holiday = true;
            holidays += 1;
        }

        weeks.push(WeeklyBucket {
            week,
            start_date: iso_week_start_date(week, current_year),
            points,
            work_days,
            target,
            remaining: target - points,
            is_holiday,
        });
        annual_points += points;
        total_work_days += work_days;
    }

    let annual_target = (52.0 - settings.vacation_weeks as f64) * settings.weekly_target;

    // The current week would skew the average low while it is still being
    // worked; exclude it Monday through Thursday.
    let weekday = today.weekday();
    let partial_week = matches!(
        weekday,
        Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu
    );
    let average_window = if partial_week && !weeks.is_empty() {
        &weeks[..weeks.len() - 1]
    } else {
        &weeks[..]
    };
    let worked: Vec<&WeeklyBucket> = average_window.iter().filter(|w| w.points > 0.0).collect();
    let average_points_per_week = if worked.is_empty() {
        0.0
    } else {
        round_one_decimal(worked.iter().map(|w| w.points).sum::<f64>() / worked.len() as f64)
    };

    let metrics = AnnualMetrics {
        annual_target,
        total_points_done: annual_points,
        total_work_days,
        average_points_per_week,
        annual_remaining: annual_target - annual_points,
        vacation_weeks_used: holidays,
        vacation_weeks_remaining: settings.vacation_weeks as i64 - holidays as i64,
    };

    (weeks, metrics)
}

/// Aggregate the full task snapshot for `now`.
///
/// Pure function of its inputs: the same tasks, sprint, settings and
/// reference time always produce the same result. An absent sprint or an
/// empty snapshot short-circuits to zeroed defaults.
pub fn aggregate(
    tasks: &[NormalizedTask],
    sprint: Option<&SprintRef>,
    settings: &Settings,
    now: DateTime<Local>,
) -> AggregateResult {
    if tasks.is_empty() {
        return AggregateResult::default();
    }

    let sprint_part = match sprint {
        Some(sprint) => sprint_summary(tasks, sprint, now),
        None => SprintSummary::default(),
    };
    let (weeks, metrics) = weekly_history(tasks, settings, now);
    let week = week_detail(tasks, now.date_naive());

    AggregateResult {
        sprint: sprint_part,
        week,
        weeks,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap()
    }

    fn task(id: &str, points: f64, closed: bool, done_ms: Option<i64>) -> NormalizedTask {
        NormalizedTask {
            id: id.to_string(),
            name: format!("Task {id}"),
            custom_id: None,
            project: "Backend".to_string(),
            points,
            sprint_points: points,
            total_points: points,
            status: if closed { "livré" } else { "en cours" }.to_string(),
            status_color: String::new(),
            is_closed: closed,
            date_done: done_ms,
            url: String::new(),
            app_url: String::new(),
            list_id: "900".to_string(),
            location_ids: Vec::new(),
        }
    }

    fn sprint() -> SprintRef {
        SprintRef {
            id: "900".to_string(),
            name: "Sprint 24".to_string(),
            due_date: None,
        }
    }

    fn settings() -> Settings {
        Settings {
            weekly_target: 28.0,
            ..Settings::default()
        }
    }

    // 2026-06-10 is a Wednesday in ISO week 24.
    const YEAR: i32 = 2026;

    #[test]
    fn test_sprint_summary_totals_and_remaining() {
        let tasks = vec![
            task("a", 5.0, true, Some(ms(YEAR, 6, 9, 10))),
            task("b", 3.0, false, None),
            task("c", 0.0, false, None), // long name, still counted
            task("d", 2.1, true, Some(ms(YEAR, 6, 9, 15))),
        ];
        let out = aggregate(
            &tasks,
            Some(&sprint()),
            &settings(),
            at(YEAR, 6, 10, 9),
        );
        assert_eq!(out.sprint.completed_points, 7.0); // 7.1 → 7.0 at quarter precision
        assert_eq!(out.sprint.total_points, 10.0);
        assert_eq!(out.sprint.tasks_remaining, 2);
        assert_eq!(out.sprint.name, "Sprint 24");
    }

    #[test]
    fn test_short_zero_point_task_not_counted_as_remaining() {
        let mut stub = task("e", 0.0, false, None);
        stub.name = "---".to_string(); // 3 bytes, 0 points: placeholder
        let tasks = vec![stub, task("f", 1.0, false, None)];
        let out = aggregate(&tasks, Some(&sprint()), &settings(), at(YEAR, 6, 10, 9));
        assert_eq!(out.sprint.tasks_remaining, 1);
    }

    #[test]
    fn test_secondary_location_membership() {
        let mut guest = task("g", 4.0, true, Some(ms(YEAR, 6, 9, 10)));
        guest.list_id = "other".to_string();
        guest.location_ids = vec!["900".to_string()];
        let tasks = vec![guest];
        let out = aggregate(&tasks, Some(&sprint()), &settings(), at(YEAR, 6, 10, 9));
        assert_eq!(out.sprint.completed_points, 4.0);
    }

    #[test]
    fn test_sprint_deadlines() {
        // Due Wednesday 2026-06-10; Sunday cutoff is the 14th, Thursday
        // deadline the 11th. From Monday the 8th at noon that is 3 days to
        // the deadline and 6 to the cutoff (ceiling of partial days).
        let mut s = sprint();
        s.due_date = Some(ms(YEAR, 6, 10, 12));
        let tasks = vec![task("a", 1.0, false, None)];
        let out = aggregate(&tasks, Some(&s), &settings(), at(YEAR, 6, 8, 12));
        assert_eq!(out.sprint.days_left, 3);
        assert_eq!(out.sprint.buffer_days, 6);
    }

    #[test]
    fn test_no_due_date_means_zero_deadlines() {
        let tasks = vec![task("a", 1.0, false, None)];
        let out = aggregate(&tasks, Some(&sprint()), &settings(), at(YEAR, 6, 10, 9));
        assert_eq!(out.sprint.days_left, 0);
        assert_eq!(out.sprint.buffer_days, 0);
    }

    #[test]
    fn test_week_detail_bounds_and_daily_breakdown() {
        let tasks = vec![
            task("mon", 2.0, true, Some(ms(YEAR, 6, 8, 9))),
            task("sun", 3.0, true, Some(ms(YEAR, 6, 14, 22))),
            task("before", 9.0, true, Some(ms(YEAR, 6, 7, 23))), // previous week
            task("open", 5.0, false, None),
        ];
        let detail = week_detail(&tasks, NaiveDate::from_ymd_opt(YEAR, 6, 10).unwrap());
        assert_eq!(detail.points, 5.0);
        assert_eq!(detail.daily_breakdown[0], 2.0);
        assert_eq!(detail.daily_breakdown[6], 3.0);
        assert_eq!(detail.tasks.len(), 2);
    }

    #[test]
    fn test_viewed_week_second_pass_wins() {
        // Navigating to the previous week recomputes the detail for that
        // week, independent of the batch result for "now".
        let tasks = vec![
            task("this", 4.0, true, Some(ms(YEAR, 6, 9, 10))),
            task("last", 7.0, true, Some(ms(YEAR, 6, 2, 10))),
        ];
        let out = aggregate(&tasks, Some(&sprint()), &settings(), at(YEAR, 6, 10, 9));
        assert_eq!(out.week.points, 4.0);
        let last_week = week_detail(&tasks, NaiveDate::from_ymd_opt(YEAR, 6, 3).unwrap());
        assert_eq!(last_week.points, 7.0);
    }

    #[test]
    fn test_holiday_inference() {
        // Weeks 22, 23, 24 with points [20, 0, 15]; week 24 is current.
        let tasks = vec![
            task("w22", 20.0, true, Some(ms(YEAR, 5, 27, 10))), // Wed of week 22
            task("w24", 15.0, true, Some(ms(YEAR, 6, 9, 10))),  // Tue of week 24
        ];
        let out = aggregate(&tasks, Some(&sprint()), &settings(), at(YEAR, 6, 10, 9));
        assert_eq!(out.weeks.len(), 24);
        let w22 = &out.weeks[21];
        let w23 = &out.weeks[22];
        let w24 = &out.weeks[23];
        assert!(!w22.is_holiday);
        assert_eq!(w22.target, 28.0);
        assert_eq!(w22.points, 20.0);
        assert!(w23.is_holiday);
        assert_eq!(w23.target, 0.0);
        assert!(!w24.is_holiday); // current week is never a holiday
        assert_eq!(w24.target, 28.0);
        assert_eq!(out.metrics.vacation_weeks_used, 22); // weeks 1..=21 plus 23 were empty
    }

    #[test]
    fn test_work_days_counts_distinct_days() {
        let tasks = vec![
            task("a", 1.0, true, Some(ms(YEAR, 6, 8, 9))),
            task("b", 1.0, true, Some(ms(YEAR, 6, 8, 17))),
            task("c", 1.0, true, Some(ms(YEAR, 6, 9, 9))),
        ];
        let out = aggregate(&tasks, Some(&sprint()), &settings(), at(YEAR, 6, 10, 9));
        let current = out.weeks.last().unwrap();
        assert_eq!(current.work_days, 2);
    }

    #[test]
    fn test_annual_metrics() {
        let tasks = vec![
            task("w23", 21.0, true, Some(ms(YEAR, 6, 2, 10))),
            task("w24", 14.0, true, Some(ms(YEAR, 6, 9, 10))),
        ];
        // Friday: the current week counts toward the average.
        let out = aggregate(&tasks, Some(&sprint()), &settings(), at(YEAR, 6, 12, 9));
        assert_eq!(out.metrics.annual_target, (52.0 - 4.0) * 28.0);
        assert_eq!(out.metrics.total_points_done, 35.0);
        assert_eq!(out.metrics.annual_remaining, out.metrics.annual_target - 35.0);
        assert_eq!(out.metrics.average_points_per_week, 17.5);

        // Wednesday: the in-progress week 24 is excluded.
        let out = aggregate(&tasks, Some(&sprint()), &settings(), at(YEAR, 6, 10, 9));
        assert_eq!(out.metrics.average_points_per_week, 21.0);
    }

    #[test]
    fn test_quarter_rounding() {
        assert_eq!(quarter_round(7.1), 7.0);
        assert_eq!(quarter_round(7.125), 7.25);
        assert_eq!(quarter_round(7.3), 7.25);
        assert_eq!(quarter_round(0.0), 0.0);
        // Never off by more than an eighth.
        for i in 0..200 {
            let x = i as f64 * 0.07;
            assert!((quarter_round(x) - x).abs() <= 0.125 + 1e-9);
        }
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let tasks = vec![
            task("a", 5.0, true, Some(ms(YEAR, 6, 9, 10))),
            task("b", 3.0, false, None),
        ];
        let now = at(YEAR, 6, 10, 9);
        let first = aggregate(&tasks, Some(&sprint()), &settings(), now);
        let second = aggregate(&tasks, Some(&sprint()), &settings(), now);
        assert_eq!(first.weeks, second.weeks);
        assert_eq!(first.metrics, second.metrics);
        assert_eq!(first.week.points, second.week.points);
        assert_eq!(first.sprint.completed_points, second.sprint.completed_points);
    }

    #[test]
    fn test_empty_snapshot_short_circuits() {
        let out = aggregate(&[], Some(&sprint()), &settings(), at(YEAR, 6, 10, 9));
        assert!(out.weeks.is_empty());
        assert_eq!(out.sprint.total_points, 0.0);
        assert_eq!(out.metrics.total_points_done, 0.0);
    }

    #[test]
    fn test_missing_sprint_zeroes_summary() {
        let tasks = vec![task("a", 5.0, true, Some(ms(YEAR, 6, 9, 10)))];
        let out = aggregate(&tasks, None, &settings(), at(YEAR, 6, 10, 9));
        assert_eq!(out.sprint.total_points, 0.0);
        assert!(out.sprint.tasks.is_empty());
        // The year history is still built.
        assert_eq!(out.weeks.len(), 24);
    }
}
