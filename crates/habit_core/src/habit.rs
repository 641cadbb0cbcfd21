use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::HabitConfigError;

const KIND_DAILY: &str = "daily";
const KIND_SPECIFIC_WEEKDAYS: &str = "specific_weekdays";
const KIND_EVERY_N_DAYS: &str = "every_n_days";
const KIND_WEEKLY_AGGREGATE: &str = "weekly_aggregate";

pub const MIN_INTERVAL_DAYS: u32 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissedCyclePolicy {
    /// Cycle boundaries stay anchored to the cycle start date.
    #[default]
    Continue,
    /// The next boundary is counted from the most recent successful completion.
    ResetOnMiss,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Partial,
    Binary,
}

/// Per-weekday targets keyed 0 (Sunday) through 6 (Saturday). A missing key
/// means the habit is not scheduled on that weekday.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekdayTargets(BTreeMap<u32, u32>);

impl WeekdayTargets {
    pub fn new(entries: impl IntoIterator<Item = (u32, u32)>) -> Result<Self, HabitConfigError> {
        let mut targets = BTreeMap::new();
        for (weekday, target) in entries {
            if weekday > 6 {
                return Err(HabitConfigError::WeekdayOutOfRange(weekday));
            }
            if target == 0 {
                return Err(HabitConfigError::ZeroWeekdayTarget(weekday));
            }
            targets.insert(weekday, target);
        }
        Ok(Self(targets))
    }

    /// Decodes the serialized mapping a storage column holds. Data that does
    /// not decode into a valid mapping is treated as "no targets configured".
    pub fn from_json_lossy(raw: &str) -> Self {
        match Self::from_json(raw) {
            Ok(targets) => targets,
            Err(reason) => {
                tracing::warn!(%reason, "discarding malformed weekday targets");
                Self::default()
            }
        }
    }

    fn from_json(raw: &str) -> Result<Self, String> {
        let decoded: BTreeMap<u32, u32> =
            serde_json::from_str(raw).map_err(|err| err.to_string())?;
        Self::new(decoded).map_err(|err| err.to_string())
    }

    pub fn to_json(&self) -> String {
        let entries: BTreeMap<String, u32> = self
            .0
            .iter()
            .map(|(weekday, target)| (weekday.to_string(), *target))
            .collect();
        serde_json::to_string(&entries).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn get(&self, weekday: u32) -> Option<u32> {
        self.0.get(&weekday).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    Daily,
    SpecificWeekdays(WeekdayTargets),
    EveryNDays {
        interval_days: u32,
        cycle_start: NaiveDate,
        policy: MissedCyclePolicy,
    },
    WeeklyAggregate,
}

impl Recurrence {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Recurrence::Daily => KIND_DAILY,
            Recurrence::SpecificWeekdays(_) => KIND_SPECIFIC_WEEKDAYS,
            Recurrence::EveryNDays { .. } => KIND_EVERY_N_DAYS,
            Recurrence::WeeklyAggregate => KIND_WEEKLY_AGGREGATE,
        }
    }
}

/// A validated recurrence configuration. Constructing one is the only place
/// configuration errors surface; evaluation over a `Habit` is total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HabitRecord", into = "HabitRecord")]
pub struct Habit {
    id: String,
    name: String,
    recurrence: Recurrence,
    daily_target: u32,
    display_mode: DisplayMode,
}

impl Habit {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        recurrence: Recurrence,
        daily_target: u32,
    ) -> Result<Self, HabitConfigError> {
        if let Recurrence::SpecificWeekdays(targets) = &recurrence {
            if targets.is_empty() {
                return Err(HabitConfigError::NoScheduledWeekdays);
            }
        }
        Self::assemble(id.into(), name.into(), recurrence, daily_target)
    }

    fn assemble(
        id: String,
        name: String,
        recurrence: Recurrence,
        daily_target: u32,
    ) -> Result<Self, HabitConfigError> {
        if daily_target == 0 {
            return Err(HabitConfigError::ZeroTarget);
        }
        if let Recurrence::EveryNDays { interval_days, .. } = &recurrence {
            if *interval_days < MIN_INTERVAL_DAYS {
                return Err(HabitConfigError::IntervalTooShort(*interval_days));
            }
        }
        Ok(Self {
            id,
            name,
            recurrence,
            daily_target,
            display_mode: DisplayMode::default(),
        })
    }

    pub fn with_display_mode(mut self, display_mode: DisplayMode) -> Self {
        self.display_mode = display_mode;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    pub fn daily_target(&self) -> u32 {
        self.daily_target
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// Weekly-aggregate habits are tracked per week rather than per day.
    pub fn is_weekly(&self) -> bool {
        matches!(self.recurrence, Recurrence::WeeklyAggregate)
    }
}

/// Flat storage shape of a habit: a kind tag plus the optional per-kind
/// columns. Weekday targets travel as a serialized JSON mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitRecord {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub daily_target: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday_targets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missed_cycle_policy: Option<MissedCyclePolicy>,
    #[serde(default)]
    pub display_mode: DisplayMode,
}

impl HabitRecord {
    fn require<T: Copy>(
        value: Option<T>,
        kind: &'static str,
        field: &'static str,
    ) -> Result<T, HabitConfigError> {
        value.ok_or(HabitConfigError::MissingField { kind, field })
    }

    fn reject_present<T>(
        value: &Option<T>,
        kind: &'static str,
        field: &'static str,
    ) -> Result<(), HabitConfigError> {
        match value {
            Some(_) => Err(HabitConfigError::UnexpectedField { kind, field }),
            None => Ok(()),
        }
    }

    fn reject_cycle_fields(&self, kind: &'static str) -> Result<(), HabitConfigError> {
        Self::reject_present(&self.interval_days, kind, "interval_days")?;
        Self::reject_present(&self.cycle_start_date, kind, "cycle_start_date")?;
        Self::reject_present(&self.missed_cycle_policy, kind, "missed_cycle_policy")
    }

    fn recurrence(&self) -> Result<Recurrence, HabitConfigError> {
        match self.kind.trim().to_ascii_lowercase().as_str() {
            KIND_DAILY => {
                Self::reject_present(&self.weekday_targets, KIND_DAILY, "weekday_targets")?;
                self.reject_cycle_fields(KIND_DAILY)?;
                Ok(Recurrence::Daily)
            }
            KIND_SPECIFIC_WEEKDAYS => {
                self.reject_cycle_fields(KIND_SPECIFIC_WEEKDAYS)?;
                let raw = self.weekday_targets.as_deref().ok_or(
                    HabitConfigError::MissingField {
                        kind: KIND_SPECIFIC_WEEKDAYS,
                        field: "weekday_targets",
                    },
                )?;
                Ok(Recurrence::SpecificWeekdays(WeekdayTargets::from_json_lossy(
                    raw,
                )))
            }
            KIND_EVERY_N_DAYS => {
                Self::reject_present(&self.weekday_targets, KIND_EVERY_N_DAYS, "weekday_targets")?;
                Ok(Recurrence::EveryNDays {
                    interval_days: Self::require(
                        self.interval_days,
                        KIND_EVERY_N_DAYS,
                        "interval_days",
                    )?,
                    cycle_start: Self::require(
                        self.cycle_start_date,
                        KIND_EVERY_N_DAYS,
                        "cycle_start_date",
                    )?,
                    policy: Self::require(
                        self.missed_cycle_policy,
                        KIND_EVERY_N_DAYS,
                        "missed_cycle_policy",
                    )?,
                })
            }
            KIND_WEEKLY_AGGREGATE => {
                Self::reject_present(
                    &self.weekday_targets,
                    KIND_WEEKLY_AGGREGATE,
                    "weekday_targets",
                )?;
                self.reject_cycle_fields(KIND_WEEKLY_AGGREGATE)?;
                Ok(Recurrence::WeeklyAggregate)
            }
            _ => Err(HabitConfigError::UnknownKind(self.kind.clone())),
        }
    }
}

impl TryFrom<HabitRecord> for Habit {
    type Error = HabitConfigError;

    // Stored weekday targets that fail to decode come through as an empty
    // mapping, so the habit loads but is never scheduled.
    fn try_from(record: HabitRecord) -> Result<Self, Self::Error> {
        let recurrence = record.recurrence()?;
        let habit = Habit::assemble(record.id, record.name, recurrence, record.daily_target)?;
        Ok(habit.with_display_mode(record.display_mode))
    }
}

impl From<Habit> for HabitRecord {
    fn from(habit: Habit) -> Self {
        let mut record = HabitRecord {
            id: habit.id,
            name: habit.name,
            kind: habit.recurrence.kind_name().to_string(),
            daily_target: habit.daily_target,
            weekday_targets: None,
            interval_days: None,
            cycle_start_date: None,
            missed_cycle_policy: None,
            display_mode: habit.display_mode,
        };
        match habit.recurrence {
            Recurrence::SpecificWeekdays(targets) => {
                record.weekday_targets = Some(targets.to_json());
            }
            Recurrence::EveryNDays {
                interval_days,
                cycle_start,
                policy,
            } => {
                record.interval_days = Some(interval_days);
                record.cycle_start_date = Some(cycle_start);
                record.missed_cycle_policy = Some(policy);
            }
            Recurrence::Daily | Recurrence::WeeklyAggregate => {}
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: &str) -> HabitRecord {
        HabitRecord {
            id: "h1".into(),
            name: "Stretch".into(),
            kind: kind.into(),
            daily_target: 1,
            weekday_targets: None,
            interval_days: None,
            cycle_start_date: None,
            missed_cycle_policy: None,
            display_mode: DisplayMode::Partial,
        }
    }

    #[test]
    fn rejects_zero_target_and_short_interval() {
        assert_eq!(
            Habit::new("h", "Read", Recurrence::Daily, 0).unwrap_err(),
            HabitConfigError::ZeroTarget
        );
        let recurrence = Recurrence::EveryNDays {
            interval_days: 1,
            cycle_start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            policy: MissedCyclePolicy::Continue,
        };
        assert_eq!(
            Habit::new("h", "Read", recurrence, 1).unwrap_err(),
            HabitConfigError::IntervalTooShort(1)
        );
    }

    #[test]
    fn weekday_targets_validate_entries() {
        assert_eq!(
            WeekdayTargets::new([(7, 1)]).unwrap_err(),
            HabitConfigError::WeekdayOutOfRange(7)
        );
        assert_eq!(
            WeekdayTargets::new([(2, 0)]).unwrap_err(),
            HabitConfigError::ZeroWeekdayTarget(2)
        );
        let empty = WeekdayTargets::new([]).unwrap();
        assert_eq!(
            Habit::new("h", "Gym", Recurrence::SpecificWeekdays(empty), 1).unwrap_err(),
            HabitConfigError::NoScheduledWeekdays
        );
    }

    #[test]
    fn weekday_targets_json_round_trip_and_lossy_decode() {
        let targets = WeekdayTargets::new([(1, 3), (3, 2)]).unwrap();
        let encoded = targets.to_json();
        assert_eq!(encoded, r#"{"1":3,"3":2}"#);
        assert_eq!(WeekdayTargets::from_json_lossy(&encoded), targets);

        assert!(WeekdayTargets::from_json_lossy("{not json").is_empty());
        assert!(WeekdayTargets::from_json_lossy(r#"{"9":1}"#).is_empty());
        assert!(WeekdayTargets::from_json_lossy(r#"{"1":0}"#).is_empty());
    }

    #[test]
    fn record_requires_kind_specific_fields() {
        let err = Habit::try_from(record("every_n_days")).unwrap_err();
        assert_eq!(
            err,
            HabitConfigError::MissingField {
                kind: "every_n_days",
                field: "interval_days"
            }
        );

        let err = Habit::try_from(record("specific_weekdays")).unwrap_err();
        assert!(matches!(err, HabitConfigError::MissingField { field: "weekday_targets", .. }));

        let err = Habit::try_from(record("hourly")).unwrap_err();
        assert_eq!(err, HabitConfigError::UnknownKind("hourly".into()));
    }

    #[test]
    fn record_rejects_fields_of_other_kinds() {
        let mut daily = record("daily");
        daily.interval_days = Some(3);
        assert_eq!(
            Habit::try_from(daily).unwrap_err(),
            HabitConfigError::UnexpectedField {
                kind: "daily",
                field: "interval_days"
            }
        );
    }

    #[test]
    fn corrupt_weekday_targets_load_as_unscheduled() {
        let mut weekdays = record("specific_weekdays");
        weekdays.weekday_targets = Some("[[garbage".into());
        let habit = Habit::try_from(weekdays).expect("corrupt targets are recovered");
        match habit.recurrence() {
            Recurrence::SpecificWeekdays(targets) => assert!(targets.is_empty()),
            other => panic!("unexpected recurrence {other:?}"),
        }
    }

    #[test]
    fn habit_deserializes_through_record() {
        let raw = r#"{
            "id": "water",
            "name": "Water plants",
            "kind": "every_n_days",
            "daily_target": 1,
            "interval_days": 3,
            "cycle_start_date": "2026-01-01",
            "missed_cycle_policy": "reset_on_miss",
            "display_mode": "binary"
        }"#;
        let habit: Habit = serde_json::from_str(raw).expect("valid habit");
        assert_eq!(habit.id(), "water");
        assert_eq!(habit.display_mode(), DisplayMode::Binary);
        assert_eq!(
            habit.recurrence(),
            &Recurrence::EveryNDays {
                interval_days: 3,
                cycle_start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                policy: MissedCyclePolicy::ResetOnMiss,
            }
        );

        let encoded = serde_json::to_value(&habit).unwrap();
        assert_eq!(encoded["kind"], "every_n_days");
        assert!(encoded.get("weekday_targets").is_none());

        let bad = raw.replace("\"interval_days\": 3", "\"interval_days\": 1");
        assert!(serde_json::from_str::<Habit>(&bad).is_err());
    }
}
