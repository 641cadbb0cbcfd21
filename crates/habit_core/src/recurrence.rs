use chrono::{NaiveDate, Weekday};

use crate::calendar::{day_of_week, days_between, week_bounds};
use crate::completion::{CompletionLog, CompletionState};
use crate::habit::{Habit, MissedCyclePolicy, Recurrence};

/// Whether `habit` is due on `date`. For reset-on-miss cycles the caller
/// supplies the most recent successful completion; without it the cycle
/// start date anchors the schedule.
pub fn is_scheduled(habit: &Habit, date: NaiveDate, last_success: Option<NaiveDate>) -> bool {
    match habit.recurrence() {
        Recurrence::Daily | Recurrence::WeeklyAggregate => true,
        Recurrence::SpecificWeekdays(targets) => targets.get(day_of_week(date)).is_some(),
        Recurrence::EveryNDays {
            interval_days,
            cycle_start,
            policy,
        } => {
            if *interval_days == 0 {
                return false;
            }
            let anchor = match (policy, last_success) {
                (MissedCyclePolicy::ResetOnMiss, Some(last)) => last,
                _ => *cycle_start,
            };
            let delta = days_between(date, anchor);
            delta >= 0 && delta % i64::from(*interval_days) == 0
        }
    }
}

/// Count that makes `date` done; 0 when nothing is due. Weekly-aggregate
/// habits report their whole-week total here.
pub fn target_for_date(habit: &Habit, date: NaiveDate) -> u32 {
    match habit.recurrence() {
        Recurrence::Daily | Recurrence::WeeklyAggregate => habit.daily_target(),
        Recurrence::SpecificWeekdays(targets) => targets.get(day_of_week(date)).unwrap_or(0),
        Recurrence::EveryNDays { interval_days, .. } => {
            if *interval_days == 0 {
                0
            } else {
                habit.daily_target()
            }
        }
    }
}

/// Total due across the week containing `week_start_date`. Non-weekly habits
/// sum their scheduled days, anchoring cycles on the cycle start date.
pub fn weekly_target(habit: &Habit, week_start_date: NaiveDate, week_start: Weekday) -> u32 {
    if habit.is_weekly() {
        return habit.daily_target();
    }
    week_bounds(week_start_date, week_start)
        .days()
        .filter(|day| is_scheduled(habit, *day, None))
        .fold(0u32, |total, day| {
            total.saturating_add(target_for_date(habit, day))
        })
}

/// `is_scheduled` with the reset-on-miss anchor resolved from history.
pub fn is_due(habit: &Habit, log: &CompletionLog, date: NaiveDate) -> bool {
    let last_success = match habit.recurrence() {
        Recurrence::EveryNDays {
            policy: MissedCyclePolicy::ResetOnMiss,
            ..
        } => log.last_success_on_or_before(habit, date),
        _ => None,
    };
    is_scheduled(habit, date, last_success)
}

pub fn completion_state(habit: &Habit, log: &CompletionLog, date: NaiveDate) -> CompletionState {
    CompletionState::classify(log.get(date), target_for_date(habit, date))
}
