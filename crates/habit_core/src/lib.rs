pub mod calendar;
pub mod completion;
pub mod error;
pub mod grid;
pub mod habit;
pub mod recurrence;
pub mod service;
pub mod streak;

pub use crate::completion::{CompletionLog, CompletionRecord, CompletionState};
pub use crate::error::{HabitConfigError, ServiceError};
pub use crate::habit::{DisplayMode, Habit, MissedCyclePolicy, Recurrence, WeekdayTargets};
pub use crate::service::{HabitService, HabitServiceBuilder};
pub use crate::streak::{compute_streak, StreakResult, StreakUnit};
