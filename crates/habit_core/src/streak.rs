use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{add_days, week_bounds};
use crate::completion::{CompletionLog, CompletionState};
use crate::habit::Habit;
use crate::recurrence::{completion_state, is_due, weekly_target};

/// Days visited by one streak walk (two years). Also the longest streak that
/// can be reported.
pub const MAX_DAY_ITERATIONS: u32 = 730;

pub const MAX_WEEK_ITERATIONS: u32 = 104;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StreakUnit {
    Days,
    Weeks,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StreakResult {
    pub current_streak: u32,
    pub best_streak: u32,
    pub unit: StreakUnit,
}

impl StreakResult {
    pub fn empty(unit: StreakUnit) -> Self {
        Self {
            current_streak: 0,
            best_streak: 0,
            unit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Met,
    Skipped,
    Missed,
}

#[derive(Debug)]
struct StreakWalk {
    running: u32,
    current: u32,
    best: u32,
    broken: bool,
    pending_used: bool,
}

impl StreakWalk {
    fn new() -> Self {
        Self {
            running: 0,
            current: 0,
            best: 0,
            broken: false,
            pending_used: false,
        }
    }

    fn visit(&mut self, period: Period) {
        match period {
            Period::Met => {
                self.pending_used = true;
                self.running += 1;
                self.best = self.best.max(self.running);
                if !self.broken {
                    self.current = self.running;
                }
            }
            Period::Skipped => {}
            // The most recent scheduled period may still be in progress.
            Period::Missed if !self.pending_used => self.pending_used = true,
            Period::Missed => {
                self.running = 0;
                self.broken = true;
            }
        }
    }

    fn finish(self, unit: StreakUnit) -> StreakResult {
        StreakResult {
            current_streak: self.current,
            best_streak: self.best,
            unit,
        }
    }
}

/// Weekly-aggregate habits are measured in weeks, everything else in days.
pub fn compute_streak(
    habit: &Habit,
    log: &CompletionLog,
    today: NaiveDate,
    week_start: Weekday,
) -> StreakResult {
    if habit.is_weekly() {
        weekly_streak(habit, log, today, week_start)
    } else {
        daily_streak(habit, log, today)
    }
}

fn daily_streak(habit: &Habit, log: &CompletionLog, today: NaiveDate) -> StreakResult {
    if log.is_empty() {
        return StreakResult::empty(StreakUnit::Days);
    }
    let mut walk = StreakWalk::new();
    for offset in 0..MAX_DAY_ITERATIONS {
        let day = add_days(today, -i64::from(offset));
        if !is_due(habit, log, day) {
            continue;
        }
        let period = match completion_state(habit, log, day) {
            CompletionState::Completed => Period::Met,
            CompletionState::Skipped => Period::Skipped,
            CompletionState::NotStarted | CompletionState::InProgress => Period::Missed,
        };
        walk.visit(period);
    }
    walk.finish(StreakUnit::Days)
}

fn weekly_streak(
    habit: &Habit,
    log: &CompletionLog,
    today: NaiveDate,
    week_start: Weekday,
) -> StreakResult {
    if log.is_empty() {
        return StreakResult::empty(StreakUnit::Weeks);
    }
    let mut walk = StreakWalk::new();
    let mut week = week_bounds(today, week_start);
    for _ in 0..MAX_WEEK_ITERATIONS {
        let target = weekly_target(habit, week.start, week_start);
        if target > 0 {
            let total = log.total_in(week);
            let period = if total >= target {
                Period::Met
            } else if total == 0 && log.any_skipped_in(week) {
                Period::Skipped
            } else {
                Period::Missed
            };
            walk.visit(period);
        }
        week = week.previous();
    }
    walk.finish(StreakUnit::Weeks)
}
