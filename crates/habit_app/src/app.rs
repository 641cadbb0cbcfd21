use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Weekday};
use habit_core::{
    calendar::{self, add_days, parse_weekday},
    completion::CompletionState,
    recurrence,
    service::DueHabit,
    HabitService, StreakUnit,
};
use tracing::{info, warn};

const MAX_HISTORY_DAYS: usize = 366;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) snapshot: Option<PathBuf>,
    pub(crate) week_start: Weekday,
    pub(crate) history_days: usize,
    pub(crate) report_date: Option<NaiveDate>,
    pub(crate) allow_exceeding_target: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("HABIT_SNAPSHOT") {
            if !path.trim().is_empty() {
                config.snapshot = Some(PathBuf::from(path.trim()));
            }
        }
        if let Some(raw) = lookup("HABIT_WEEK_START") {
            match parse_weekday(&raw) {
                Some(day) => config.week_start = day,
                None => warn!(value = %raw, "ignoring unrecognised HABIT_WEEK_START"),
            }
        }
        if let Some(raw) = lookup("HABIT_HISTORY_DAYS") {
            match raw.trim().parse::<usize>() {
                Ok(value) if value <= MAX_HISTORY_DAYS => config.history_days = value,
                Ok(value) => warn!(value, max = MAX_HISTORY_DAYS, "ignoring HABIT_HISTORY_DAYS"),
                Err(err) => warn!(value = %raw, %err, "ignoring HABIT_HISTORY_DAYS"),
            }
        }
        if let Some(raw) = lookup("HABIT_REPORT_DATE") {
            match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => config.report_date = Some(date),
                Err(err) => warn!(value = %raw, %err, "ignoring HABIT_REPORT_DATE"),
            }
        }
        if let Some(raw) = lookup("HABIT_ALLOW_EXCEEDING") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.allow_exceeding_target = true,
                "0" | "false" | "no" => config.allow_exceeding_target = false,
                _ => warn!(value = %raw, "ignoring HABIT_ALLOW_EXCEEDING"),
            }
        }
        config
    }

    pub fn report_date(&self) -> NaiveDate {
        self.report_date.unwrap_or_else(calendar::today)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot: None,
            week_start: Weekday::Sun,
            history_days: 21,
            report_date: None,
            allow_exceeding_target: true,
        }
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    let service = build_service(&config)?;
    let report = render_report(&service, config.report_date(), config.history_days)?;
    print!("{report}");
    Ok(())
}

pub(crate) fn build_service(config: &AppConfig) -> Result<HabitService> {
    let mut builder = HabitService::builder()
        .week_start(config.week_start)
        .allow_exceeding_target(config.allow_exceeding_target);
    match &config.snapshot {
        Some(path) => {
            info!(path = %path.display(), "loading habit snapshot");
            builder = builder.add_snapshot(path);
        }
        None => warn!("HABIT_SNAPSHOT is not set; reporting on an empty habit list"),
    }
    builder.build().context("failed to initialize habit service")
}

pub(crate) fn render_report(
    service: &HabitService,
    today: NaiveDate,
    history_days: usize,
) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{}", today.format("%A, %B %d, %Y"))?;

    let rows = service.due_on(today);
    if rows.is_empty() {
        writeln!(out, "No habits tracked.")?;
        return Ok(out);
    }

    for row in rows {
        let streak = service
            .streak(&row.habit_id, today)
            .with_context(|| format!("streak for `{}`", row.habit_id))?;
        writeln!(out, "{} {}", status_marker(&row), row.name)?;
        writeln!(out, "    {}", progress_line(&row))?;
        let unit = match streak.unit {
            StreakUnit::Days => "day",
            StreakUnit::Weeks => "week",
        };
        writeln!(
            out,
            "    Streak {} {}{} (best {})",
            streak.current_streak,
            unit,
            if streak.current_streak == 1 { "" } else { "s" },
            streak.best_streak
        )?;
        if let Some(graph) = history_strip(service, &row.habit_id, today, history_days)? {
            writeln!(out, "    History {graph}")?;
        }
        if let Some(note) = &row.note {
            writeln!(out, "    Note: {note}")?;
        }
    }
    Ok(out)
}

fn status_marker(row: &DueHabit) -> &'static str {
    match (row.due, row.state) {
        (_, CompletionState::Skipped) => "[~]",
        (_, CompletionState::Completed) => "[x]",
        (true, CompletionState::InProgress) => "[-]",
        (true, CompletionState::NotStarted) => "[ ]",
        (false, _) => "   ",
    }
}

fn progress_line(row: &DueHabit) -> String {
    if row.weekly {
        format!("{}/{} this week", row.logged, row.weekly_target)
    } else if row.due {
        format!(
            "{}/{} today, {} due this week",
            row.logged, row.target, row.weekly_target
        )
    } else {
        format!("not due today, {} due this week", row.weekly_target)
    }
}

/// One character per day, oldest first: `X` done on schedule, `o` done off
/// schedule, `.` due but not done, `_` not due.
fn history_strip(
    service: &HabitService,
    id: &str,
    today: NaiveDate,
    days: usize,
) -> Result<Option<String>> {
    if days == 0 {
        return Ok(None);
    }
    let habit = service.habit(id)?;
    let log = service.completions(id)?;
    let mut graph = String::with_capacity(days);
    for offset in (0..days).rev() {
        let day = add_days(today, -(offset as i64));
        let expected = recurrence::is_due(&habit, &log, day);
        let done = match recurrence::completion_state(&habit, &log, day) {
            CompletionState::Completed => true,
            CompletionState::InProgress => habit.is_weekly(),
            CompletionState::NotStarted | CompletionState::Skipped => false,
        };
        let cell = if done && expected {
            'X'
        } else if done {
            'o'
        } else if expected {
            '.'
        } else {
            '_'
        };
        graph.push(cell);
    }
    Ok(Some(graph))
}
