use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Weekday};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    calendar::week_bounds,
    completion::{CompletionLog, CompletionRecord, CompletionState},
    error::{ServiceError, ServiceResult},
    grid::{self, ContributionGrid, GridWindow},
    habit::{Habit, HabitRecord},
    recurrence,
    streak::{self, StreakResult},
};

/// On-disk exchange format: every habit with its completion history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitSnapshot {
    pub habits: Vec<HabitEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitEntry {
    pub habit: Habit,
    #[serde(default)]
    pub completions: Vec<CompletionRecord>,
}

/// One row of the "what is due" view for a single day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DueHabit {
    pub habit_id: String,
    pub name: String,
    pub weekly: bool,
    pub due: bool,
    pub target: u32,
    pub logged: u32,
    pub state: CompletionState,
    pub weekly_target: u32,
    pub note: Option<String>,
}

#[derive(Debug)]
struct TrackedHabit {
    habit: Habit,
    log: CompletionLog,
    streak: Option<(NaiveDate, StreakResult)>,
}

impl TrackedHabit {
    fn new(habit: Habit, completions: impl IntoIterator<Item = CompletionRecord>) -> Self {
        Self {
            habit,
            log: completions.into_iter().collect(),
            streak: None,
        }
    }

    fn touch(&mut self) {
        if self.streak.take().is_some() {
            tracing::debug!(habit = %self.habit.id(), "streak cache invalidated");
        }
    }
}

/// In-memory holder for habit snapshots. Edits are applied in place and the
/// per-habit streak is memoized until that habit changes.
pub struct HabitService {
    habits: RwLock<BTreeMap<String, TrackedHabit>>,
    week_start: Weekday,
    allow_exceeding_target: bool,
}

pub struct HabitServiceBuilder {
    snapshots: Vec<PathBuf>,
    entries: Vec<HabitEntry>,
    week_start: Weekday,
    allow_exceeding_target: bool,
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
            entries: Vec::new(),
            week_start: Weekday::Sun,
            allow_exceeding_target: true,
        }
    }

    pub fn add_snapshot(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if !self.snapshots.contains(&path) {
            self.snapshots.push(path);
        }
        self
    }

    pub fn add_habit(mut self, habit: Habit, completions: Vec<CompletionRecord>) -> Self {
        self.entries.push(HabitEntry { habit, completions });
        self
    }

    pub fn week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }

    pub fn allow_exceeding_target(mut self, allow: bool) -> Self {
        self.allow_exceeding_target = allow;
        self
    }

    pub fn build(self) -> ServiceResult<HabitService> {
        let service = HabitService {
            habits: RwLock::new(BTreeMap::new()),
            week_start: self.week_start,
            allow_exceeding_target: self.allow_exceeding_target,
        };
        for entry in self.entries {
            service.register_habit(entry.habit, entry.completions)?;
        }
        for path in &self.snapshots {
            service.load_snapshot(path)?;
        }
        Ok(service)
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    pub fn habit_ids(&self) -> Vec<String> {
        self.habits.read().keys().cloned().collect()
    }

    pub fn habit(&self, id: &str) -> ServiceResult<Habit> {
        self.with_habit(id, |tracked| tracked.habit.clone())
    }

    pub fn completions(&self, id: &str) -> ServiceResult<CompletionLog> {
        self.with_habit(id, |tracked| tracked.log.clone())
    }

    pub fn register_habit(
        &self,
        habit: Habit,
        completions: Vec<CompletionRecord>,
    ) -> ServiceResult<()> {
        let mut habits = self.habits.write();
        if habits.contains_key(habit.id()) {
            return Err(ServiceError::DuplicateHabit(habit.id().to_string()));
        }
        habits.insert(
            habit.id().to_string(),
            TrackedHabit::new(habit, completions),
        );
        Ok(())
    }

    pub fn register_record(
        &self,
        record: HabitRecord,
        completions: Vec<CompletionRecord>,
    ) -> ServiceResult<()> {
        let habit = Habit::try_from(record)?;
        self.register_habit(habit, completions)
    }

    /// Reads a JSON snapshot and registers every habit in it.
    #[instrument(skip(self))]
    pub fn load_snapshot(&self, path: &Path) -> ServiceResult<usize> {
        let raw = fs::read_to_string(path)?;
        let snapshot: HabitSnapshot = serde_json::from_str(&raw)?;
        let loaded = snapshot.habits.len();
        for entry in snapshot.habits {
            self.register_habit(entry.habit, entry.completions)?;
        }
        tracing::debug!(loaded, "snapshot loaded");
        Ok(loaded)
    }

    pub fn snapshot(&self) -> HabitSnapshot {
        let habits = self.habits.read();
        HabitSnapshot {
            habits: habits
                .values()
                .map(|tracked| HabitEntry {
                    habit: tracked.habit.clone(),
                    completions: tracked.log.records().cloned().collect(),
                })
                .collect(),
        }
    }

    /// Sets the logged count for `date`, clearing any skip. Counts above the
    /// due target are rejected unless the service allows exceeding it.
    pub fn log_count(
        &self,
        id: &str,
        date: NaiveDate,
        count: u32,
    ) -> ServiceResult<CompletionRecord> {
        let week_start = self.week_start;
        let allow_exceeding = self.allow_exceeding_target;
        self.with_habit_mut(id, |tracked| -> ServiceResult<CompletionRecord> {
            if !allow_exceeding {
                check_within_target(tracked, date, count, week_start)?;
            }
            let note = tracked.log.get(date).and_then(|record| record.note.clone());
            let record = CompletionRecord {
                date,
                count,
                skipped: false,
                note,
            };
            tracked.log.upsert(record.clone());
            tracked.touch();
            Ok(record)
        })?
    }

    pub fn skip(&self, id: &str, date: NaiveDate) -> ServiceResult<CompletionRecord> {
        self.with_habit_mut(id, |tracked| -> ServiceResult<CompletionRecord> {
            let existing = tracked.log.get(date);
            if existing.is_some_and(|record| record.count > 0) {
                return Err(ServiceError::SkipWithProgress(date));
            }
            let mut record = CompletionRecord::skipped(date);
            record.note = existing.and_then(|record| record.note.clone());
            tracked.log.upsert(record.clone());
            tracked.touch();
            Ok(record)
        })?
    }

    pub fn set_note(
        &self,
        id: &str,
        date: NaiveDate,
        note: Option<String>,
    ) -> ServiceResult<CompletionRecord> {
        self.with_habit_mut(id, |tracked| {
            let mut record = tracked
                .log
                .get(date)
                .cloned()
                .unwrap_or_else(|| CompletionRecord::logged(date, 0));
            record.note = note.filter(|text| !text.trim().is_empty());
            if record.count == 0 && !record.skipped && record.note.is_none() {
                tracked.log.remove(date);
            } else {
                tracked.log.upsert(record.clone());
            }
            record
        })
    }

    /// Drops the record for `date`; the day then reads as never logged.
    pub fn clear(&self, id: &str, date: NaiveDate) -> ServiceResult<bool> {
        self.with_habit_mut(id, |tracked| {
            let removed = tracked.log.remove(date).is_some();
            if removed {
                tracked.touch();
            }
            removed
        })
    }

    pub fn due_on(&self, day: NaiveDate) -> Vec<DueHabit> {
        let habits = self.habits.read();
        habits
            .values()
            .map(|tracked| {
                let habit = &tracked.habit;
                let record = tracked.log.get(day);
                let week = week_bounds(day, self.week_start);
                let weekly_target = recurrence::weekly_target(habit, week.start, self.week_start);
                let target = recurrence::target_for_date(habit, day);
                // Weekly habits are judged on the running week's total.
                let (logged, state) = if habit.is_weekly() {
                    let total = tracked.log.total_in(week);
                    let skipped = record.is_some_and(|record| record.skipped);
                    (total, CompletionState::from_progress(total, target, skipped && total == 0))
                } else {
                    (
                        tracked.log.count_on(day),
                        CompletionState::classify(record, target),
                    )
                };
                DueHabit {
                    habit_id: habit.id().to_string(),
                    name: habit.name().to_string(),
                    weekly: habit.is_weekly(),
                    due: recurrence::is_due(habit, &tracked.log, day),
                    target,
                    logged,
                    state,
                    weekly_target,
                    note: record.and_then(|record| record.note.clone()),
                }
            })
            .collect()
    }

    pub fn streak(&self, id: &str, today: NaiveDate) -> ServiceResult<StreakResult> {
        let week_start = self.week_start;
        self.with_habit_mut(id, |tracked| {
            if let Some((computed_for, result)) = tracked.streak {
                if computed_for == today {
                    return result;
                }
            }
            let result = streak::compute_streak(&tracked.habit, &tracked.log, today, week_start);
            tracked.streak = Some((today, result));
            result
        })
    }

    pub fn grid(&self, id: &str, window: GridWindow) -> ServiceResult<ContributionGrid> {
        let week_start = self.week_start;
        self.with_habit(id, |tracked| {
            grid::build_grid(&tracked.habit, &tracked.log, window, week_start)
        })
    }
}

impl HabitService {
    fn with_habit<T>(&self, id: &str, f: impl FnOnce(&TrackedHabit) -> T) -> ServiceResult<T> {
        let habits = self.habits.read();
        let tracked = habits
            .get(id)
            .ok_or_else(|| ServiceError::UnknownHabit(id.to_string()))?;
        Ok(f(tracked))
    }

    fn with_habit_mut<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut TrackedHabit) -> T,
    ) -> ServiceResult<T> {
        let mut habits = self.habits.write();
        let tracked = habits
            .get_mut(id)
            .ok_or_else(|| ServiceError::UnknownHabit(id.to_string()))?;
        Ok(f(tracked))
    }
}

fn check_within_target(
    tracked: &TrackedHabit,
    date: NaiveDate,
    count: u32,
    week_start: Weekday,
) -> ServiceResult<()> {
    let habit = &tracked.habit;
    if !recurrence::is_due(habit, &tracked.log, date) {
        return Ok(());
    }
    let target = recurrence::target_for_date(habit, date);
    let total = if habit.is_weekly() {
        let week = week_bounds(date, week_start);
        tracked
            .log
            .total_in(week)
            .saturating_sub(tracked.log.count_on(date))
            .saturating_add(count)
    } else {
        count
    };
    if target > 0 && total > target {
        return Err(ServiceError::ExceedsTarget {
            date,
            count: total,
            target,
        });
    }
    Ok(())
}
