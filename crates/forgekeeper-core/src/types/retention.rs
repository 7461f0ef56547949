use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Calendar period used for keep-N retention counting.
///
/// Buckets are wall-clock-aligned in UTC (hour, day, ISO week, month),
/// not rolling windows: a prune at 00:00 keeps the newest snapshot of
/// each calendar bucket, so the surviving set is deterministic for a
/// given clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// One calendar hour
    Hourly,
    /// One calendar day
    Daily,
    /// One ISO week
    Weekly,
    /// One calendar month
    Monthly,
}

impl Period {
    /// All periods, coarsest last
    pub const ALL: [Self; 4] = [Self::Hourly, Self::Daily, Self::Weekly, Self::Monthly];

    /// Bucket key for a timestamp; two timestamps share a bucket iff
    /// their keys are equal.
    #[must_use]
    pub fn bucket_key(self, at: DateTime<Utc>) -> String {
        match self {
            Self::Hourly => format!("{:04}-{:03}-{:02}", at.year(), at.ordinal(), at.hour()),
            Self::Daily => format!("{:04}-{:03}", at.year(), at.ordinal()),
            Self::Weekly => {
                let week = at.iso_week();
                format!("{:04}-W{:02}", week.year(), week.week())
            }
            Self::Monthly => format!("{:04}-{:02}", at.year(), at.month()),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// Keep-counts per period for one tier, plus the WORM lock floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Keep the newest snapshot of each of the last N hourly buckets
    #[serde(default)]
    pub keep_hourly: u32,

    /// Keep the newest snapshot of each of the last N daily buckets
    #[serde(default)]
    pub keep_daily: u32,

    /// Keep the newest snapshot of each of the last N weekly buckets
    #[serde(default)]
    pub keep_weekly: u32,

    /// Keep the newest snapshot of each of the last N monthly buckets
    #[serde(default)]
    pub keep_monthly: u32,

    /// Minimum retention-lock duration for WORM objects, in days.
    /// Lock durations can only ever be extended, never shortened.
    #[serde(default)]
    pub min_lock_days: Option<u32>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_hourly: 24,
            keep_daily: 7,
            keep_weekly: 4,
            keep_monthly: 6,
            min_lock_days: None,
        }
    }
}

impl RetentionPolicy {
    /// Keep-count for a period
    #[must_use]
    pub const fn keep_for(&self, period: Period) -> u32 {
        match period {
            Period::Hourly => self.keep_hourly,
            Period::Daily => self.keep_daily,
            Period::Weekly => self.keep_weekly,
            Period::Monthly => self.keep_monthly,
        }
    }

    /// True when the policy keeps nothing at all; pruning under such a
    /// policy would delete every snapshot, so callers must refuse it.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.keep_hourly == 0
            && self.keep_daily == 0
            && self.keep_weekly == 0
            && self.keep_monthly == 0
    }
}
