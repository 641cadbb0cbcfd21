use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::WeekBounds;
use crate::habit::Habit;
use crate::recurrence::target_for_date;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CompletionRecord {
    pub fn logged(date: NaiveDate, count: u32) -> Self {
        Self {
            date,
            count,
            skipped: false,
            note: None,
        }
    }

    pub fn skipped(date: NaiveDate) -> Self {
        Self {
            date,
            count: 0,
            skipped: true,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    // Logged progress wins over a stale skip flag.
    pub fn normalized(mut self) -> Self {
        if self.skipped && self.count > 0 {
            self.skipped = false;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CompletionState {
    NotStarted,
    InProgress,
    Completed,
    Skipped,
}

impl CompletionState {
    pub fn classify(record: Option<&CompletionRecord>, target: u32) -> Self {
        match record {
            Some(record) => Self::from_progress(record.count, target, record.skipped),
            None => CompletionState::NotStarted,
        }
    }

    pub fn from_progress(count: u32, target: u32, skipped: bool) -> Self {
        if skipped {
            CompletionState::Skipped
        } else if count == 0 {
            CompletionState::NotStarted
        } else if count >= target {
            CompletionState::Completed
        } else {
            CompletionState::InProgress
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionLog {
    records: BTreeMap<NaiveDate, CompletionRecord>,
}

impl CompletionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&CompletionRecord> {
        self.records.get(&date)
    }

    pub fn count_on(&self, date: NaiveDate) -> u32 {
        self.get(date).map(|record| record.count).unwrap_or(0)
    }

    pub fn total_in(&self, week: WeekBounds) -> u32 {
        self.records
            .range(week.start..=week.end)
            .fold(0u32, |total, (_, record)| total.saturating_add(record.count))
    }

    pub fn any_skipped_in(&self, week: WeekBounds) -> bool {
        self.records
            .range(week.start..=week.end)
            .any(|(_, record)| record.skipped)
    }

    /// Most recent date on or before `date` whose count met that date's target.
    pub fn last_success_on_or_before(&self, habit: &Habit, date: NaiveDate) -> Option<NaiveDate> {
        self.records
            .range(..=date)
            .rev()
            .find(|(day, record)| {
                let target = target_for_date(habit, **day);
                target > 0 && record.count >= target
            })
            .map(|(day, _)| *day)
    }

    pub fn records(&self) -> impl Iterator<Item = &CompletionRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn upsert(&mut self, record: CompletionRecord) {
        let record = record.normalized();
        self.records.insert(record.date, record);
    }

    pub fn remove(&mut self, date: NaiveDate) -> Option<CompletionRecord> {
        self.records.remove(&date)
    }
}

impl FromIterator<CompletionRecord> for CompletionLog {
    fn from_iter<I: IntoIterator<Item = CompletionRecord>>(iter: I) -> Self {
        let mut log = CompletionLog::new();
        for record in iter {
            log.upsert(record);
        }
        log
    }
}
