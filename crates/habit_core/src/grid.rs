use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{add_days, days_between, week_bounds};
use crate::completion::{CompletionLog, CompletionRecord};
use crate::habit::{DisplayMode, Habit};
use crate::recurrence::{is_due, target_for_date};

pub const OFF_SCHEDULE_INTENSITY: f64 = 0.5;

pub const MAX_GRID_WEEKS: u32 = 520;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GridWindow {
    /// `weeks` whole weeks ending with the week that contains `end`. Requests
    /// above [`MAX_GRID_WEEKS`] (ten years) get `MAX_GRID_WEEKS` columns.
    Rolling { end: NaiveDate, weeks: u32 },
    CalendarYear { year: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContributionCell {
    pub date: NaiveDate,
    pub intensity: f64,
    pub record: Option<CompletionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekColumn {
    pub start: NaiveDate,
    pub cells: Vec<ContributionCell>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthLabel {
    pub column: usize,
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContributionGrid {
    pub columns: Vec<WeekColumn>,
    pub month_labels: Vec<MonthLabel>,
}

impl ContributionGrid {
    pub fn cells(&self) -> impl Iterator<Item = &ContributionCell> {
        self.columns.iter().flat_map(|column| column.cells.iter())
    }
}

pub fn cell_intensity(
    display_mode: DisplayMode,
    record: Option<&CompletionRecord>,
    scheduled: bool,
    target: u32,
) -> f64 {
    let count = match record {
        Some(record) if record.count > 0 => record.count,
        _ => return 0.0,
    };
    if !scheduled {
        return OFF_SCHEDULE_INTENSITY;
    }
    if count >= target {
        return 1.0;
    }
    match display_mode {
        DisplayMode::Binary => 0.0,
        DisplayMode::Partial => f64::from(count) / f64::from(target),
    }
}

pub fn build_grid(
    habit: &Habit,
    log: &CompletionLog,
    window: GridWindow,
    week_start: Weekday,
) -> ContributionGrid {
    let (first_week_start, weeks, label_year) = match window {
        GridWindow::Rolling { end, weeks } => {
            let weeks = weeks.min(MAX_GRID_WEEKS);
            let last_end = week_bounds(end, week_start).end;
            let first = add_days(last_end, 1 - 7 * i64::from(weeks));
            (first, weeks, None)
        }
        GridWindow::CalendarYear { year } => match year_bounds(year, week_start) {
            Some((start, weeks)) => (start, weeks, Some(year)),
            None => {
                return ContributionGrid {
                    columns: Vec::new(),
                    month_labels: Vec::new(),
                }
            }
        },
    };

    let columns: Vec<WeekColumn> = (0..weeks)
        .map(|index| {
            let start = add_days(first_week_start, 7 * i64::from(index));
            let cells = (0..7)
                .map(|offset| build_cell(habit, log, add_days(start, offset)))
                .collect();
            WeekColumn { start, cells }
        })
        .collect();
    let month_labels = month_labels(&columns, label_year);

    ContributionGrid {
        columns,
        month_labels,
    }
}

fn year_bounds(year: i32, week_start: Weekday) -> Option<(NaiveDate, u32)> {
    let jan_first = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let dec_last = NaiveDate::from_ymd_opt(year, 12, 31)?;
    let start = week_bounds(jan_first, week_start).start;
    let end = week_bounds(dec_last, week_start).end;
    let weeks = (days_between(end, start) + 1) / 7;
    Some((start, u32::try_from(weeks).ok()?))
}

fn build_cell(habit: &Habit, log: &CompletionLog, date: NaiveDate) -> ContributionCell {
    let record = log.get(date);
    let intensity = cell_intensity(
        habit.display_mode(),
        record,
        is_due(habit, log, date),
        target_for_date(habit, date),
    );
    ContributionCell {
        date,
        intensity,
        record: record.cloned(),
    }
}

fn month_labels(columns: &[WeekColumn], year: Option<i32>) -> Vec<MonthLabel> {
    let mut labels = Vec::new();
    let mut previous: Option<(i32, u32)> = None;
    for (column, week) in columns.iter().enumerate() {
        let key = (week.start.year(), week.start.month());
        if previous == Some(key) {
            continue;
        }
        previous = Some(key);
        if year.is_some_and(|year| year != key.0) {
            continue;
        }
        labels.push(MonthLabel {
            column,
            year: key.0,
            month: key.1,
        });
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::{Recurrence, WeekdayTargets};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily(target: u32, mode: DisplayMode) -> Habit {
        Habit::new("read", "Read", Recurrence::Daily, target)
            .unwrap()
            .with_display_mode(mode)
    }

    #[test]
    fn rolling_window_has_whole_weeks_ending_on_week_end() {
        let habit = daily(1, DisplayMode::Partial);
        let log = CompletionLog::new();
        // 2026-03-12 is a Thursday; its Sunday-start week ends 2026-03-14.
        for weeks in [1, 4, 53] {
            let grid = build_grid(
                &habit,
                &log,
                GridWindow::Rolling {
                    end: date(2026, 3, 12),
                    weeks,
                },
                Weekday::Sun,
            );
            assert_eq!(grid.columns.len(), weeks as usize);
            assert!(grid.columns.iter().all(|column| column.cells.len() == 7));
            let last = grid.cells().last().expect("cells present");
            assert_eq!(last.date, date(2026, 3, 14));
            assert_eq!(grid.columns[0].start.weekday(), Weekday::Sun);
        }
    }

    #[test]
    fn rolling_window_is_capped() {
        let grid = build_grid(
            &daily(1, DisplayMode::Partial),
            &CompletionLog::new(),
            GridWindow::Rolling {
                end: date(2026, 3, 12),
                weeks: 10_000,
            },
            Weekday::Mon,
        );
        assert_eq!(grid.columns.len(), MAX_GRID_WEEKS as usize);
        // Still whole weeks ending with the week of `end` (Monday-start, so 03-15).
        assert!(grid.columns.iter().all(|column| column.cells.len() == 7));
        assert_eq!(grid.cells().last().unwrap().date, date(2026, 3, 15));
        assert_eq!(grid.columns[0].start.weekday(), Weekday::Mon);
        assert_eq!(
            days_between(date(2026, 3, 15), grid.columns[0].start) + 1,
            7 * i64::from(MAX_GRID_WEEKS)
        );
    }

    #[test]
    fn calendar_year_covers_adjacent_days() {
        let grid = build_grid(
            &daily(1, DisplayMode::Partial),
            &CompletionLog::new(),
            GridWindow::CalendarYear { year: 2026 },
            Weekday::Sun,
        );
        // 2026-01-01 is a Thursday and 2026-12-31 is a Thursday.
        assert_eq!(grid.columns[0].start, date(2025, 12, 28));
        assert_eq!(grid.cells().last().unwrap().date, date(2027, 1, 2));
        assert_eq!(grid.columns.len(), 53);

        let labels: Vec<(usize, u32)> = grid
            .month_labels
            .iter()
            .map(|label| (label.column, label.month))
            .collect();
        assert_eq!(labels.len(), 12);
        assert!(grid.month_labels.iter().all(|label| label.year == 2026));
        // First Sunday in January 2026 is the 4th, the second column.
        assert_eq!(labels[0], (1, 1));
        // 2026-02-01 is a Sunday.
        assert_eq!(labels[1], (5, 2));
    }

    #[test]
    fn rolling_labels_start_at_first_column() {
        let grid = build_grid(
            &daily(1, DisplayMode::Partial),
            &CompletionLog::new(),
            GridWindow::Rolling {
                end: date(2026, 3, 12),
                weeks: 8,
            },
            Weekday::Sun,
        );
        // Columns start 2026-01-18, 01-25, 02-01, ... 03-08.
        let months: Vec<u32> = grid.month_labels.iter().map(|label| label.month).collect();
        assert_eq!(months, vec![1, 2, 3]);
        assert_eq!(grid.month_labels[0].column, 0);
        assert_eq!(grid.month_labels[1].column, 2);
        assert_eq!(grid.month_labels[2].column, 6);
    }

    #[test]
    fn partial_mode_scales_and_caps() {
        let day = date(2026, 3, 10);
        let log: CompletionLog = [
            CompletionRecord::logged(day, 1),
            CompletionRecord::logged(date(2026, 3, 11), 9),
            CompletionRecord::skipped(date(2026, 3, 12)),
        ]
        .into_iter()
        .collect();
        let grid = build_grid(
            &daily(4, DisplayMode::Partial),
            &log,
            GridWindow::Rolling { end: day, weeks: 1 },
            Weekday::Sun,
        );
        let by_date = |d: NaiveDate| grid.cells().find(|cell| cell.date == d).unwrap();
        assert_eq!(by_date(day).intensity, 0.25);
        assert_eq!(by_date(date(2026, 3, 11)).intensity, 1.0);
        let skipped = by_date(date(2026, 3, 12));
        assert_eq!(skipped.intensity, 0.0);
        assert!(skipped.record.as_ref().is_some_and(|record| record.skipped));
        assert!(by_date(date(2026, 3, 9)).record.is_none());
    }

    #[test]
    fn binary_mode_never_shades_partially() {
        let log: CompletionLog = (1..=14)
            .map(|d| CompletionRecord::logged(date(2026, 3, d), d % 4))
            .collect();
        let grid = build_grid(
            &daily(3, DisplayMode::Binary),
            &log,
            GridWindow::Rolling {
                end: date(2026, 3, 14),
                weeks: 2,
            },
            Weekday::Sun,
        );
        assert!(grid
            .cells()
            .all(|cell| cell.intensity == 0.0 || cell.intensity == 1.0));
        assert!(grid.cells().any(|cell| cell.intensity == 1.0));
    }

    #[test]
    fn off_schedule_completion_gets_fixed_shade() {
        let targets = WeekdayTargets::new([(1, 2)]).unwrap();
        let habit = Habit::new("gym", "Gym", Recurrence::SpecificWeekdays(targets), 1)
            .unwrap()
            .with_display_mode(DisplayMode::Binary);
        let log: CompletionLog = [
            CompletionRecord::logged(date(2026, 3, 9), 1),  // Monday, partial
            CompletionRecord::logged(date(2026, 3, 11), 1), // Wednesday, off schedule
        ]
        .into_iter()
        .collect();
        let grid = build_grid(
            &habit,
            &log,
            GridWindow::Rolling {
                end: date(2026, 3, 11),
                weeks: 1,
            },
            Weekday::Sun,
        );
        let by_date = |d: NaiveDate| grid.cells().find(|cell| cell.date == d).unwrap();
        assert_eq!(by_date(date(2026, 3, 9)).intensity, 0.0);
        assert_eq!(by_date(date(2026, 3, 11)).intensity, OFF_SCHEDULE_INTENSITY);
    }
}
