//! Scheduler configuration

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::config::{Config, ScheduleSpec, ValidationError};

/// How often the calendar trigger looks at the clock
pub const CALENDAR_POLL: Duration = Duration::from_secs(30);

/// A parsed calendar trigger: a local time on a set of weekdays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub time: NaiveTime,
    /// Empty means every day
    pub days: BTreeSet<u8>,
}

impl CalendarEntry {
    /// Parse entry number `index` from its config form
    pub fn parse(index: usize, spec: &ScheduleSpec) -> Result<Self, ValidationError> {
        let time = NaiveTime::parse_from_str(spec.time.trim(), "%H:%M").map_err(|_| ValidationError::ScheduleTime {
            index,
            value: spec.time.clone(),
        })?;

        let days = spec
            .days
            .iter()
            .map(|day| {
                day.trim()
                    .parse::<Weekday>()
                    .map(|d| d.num_days_from_monday() as u8)
                    .map_err(|_| ValidationError::Weekday {
                        index,
                        value: day.clone(),
                    })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self { time, days })
    }

    /// Whether `now` falls in this entry's minute on one of its days
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        let day_ok = self.days.is_empty() || self.days.contains(&(now.weekday().num_days_from_monday() as u8));
        day_ok && now.hour() == self.time.hour() && now.minute() == self.time.minute()
    }
}

/// Everything the scheduler needs from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval between passes; `None` disables the interval trigger
    pub interval: Option<Duration>,

    /// Start one pass immediately
    pub auto_start: bool,

    pub calendar: Vec<CalendarEntry>,

    pub calendar_poll: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Some(Duration::from_secs(30 * 60)),
            auto_start: true,
            calendar: Vec::new(),
            calendar_poll: CALENDAR_POLL,
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Result<Self, ValidationError> {
        Ok(Self {
            interval: (config.interval_minutes > 0).then(|| Duration::from_secs(config.interval_minutes.saturating_mul(60))),
            auto_start: config.auto_start,
            calendar: config.calendar()?,
            calendar_poll: CALENDAR_POLL,
        })
    }
}
