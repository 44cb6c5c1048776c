//! Represents a bucket: a named collection of jobs with its own
//! access-control grants and routing settings.

use crate::models::action::BucketAction;
use crate::models::permissions::Permissions;
use crate::models::principal::Principal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Maximum description length accepted on write.
pub const MAX_DESCRIPTION_LEN: usize = 45;

/// Identifier of a job owned by the external job system.
pub type JobId = i64;

/// Interval unit of a due-date timeout.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutUnit {
    Hours,
    Days,
    Months,
    Years,
}

impl TimeoutUnit {
    pub const ALL: [TimeoutUnit; 4] = [
        TimeoutUnit::Hours,
        TimeoutUnit::Days,
        TimeoutUnit::Months,
        TimeoutUnit::Years,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutUnit::Hours => "hours",
            TimeoutUnit::Days => "days",
            TimeoutUnit::Months => "months",
            TimeoutUnit::Years => "years",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(value.trim()))
    }

    fn singular(&self) -> &'static str {
        match self {
            TimeoutUnit::Hours => "hour",
            TimeoutUnit::Days => "day",
            TimeoutUnit::Months => "month",
            TimeoutUnit::Years => "year",
        }
    }
}

impl fmt::Display for TimeoutUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Due-date policy for jobs in a bucket.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DueTimeout {
    /// The `-1` sentinel: jobs never expire.
    Never,
    After { amount: u32, unit: TimeoutUnit },
}

impl DueTimeout {
    /// Human-readable summary, e.g. `3 days`, `1 hour`, `never`.
    pub fn summary(&self) -> String {
        match self {
            DueTimeout::Never => "never".to_string(),
            DueTimeout::After { amount: 1, unit } => format!("1 {}", unit.singular()),
            DueTimeout::After { amount, unit } => format!("{} {}", amount, unit),
        }
    }
}

/// Routing and timeout configuration. `None` disables the feature.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketSettings {
    pub completion_board: Option<u32>,
    pub approval_board: Option<u32>,
    pub denial_board: Option<u32>,
    pub due_timeout: Option<DueTimeout>,
}

/// A job's membership in a bucket.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct JobRecord {
    pub tagged_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A bucket in the job tracking system.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Bucket {
    /// Stable identity; survives rename.
    pub id: Uuid,

    /// Unique display name. Compared case-insensitively.
    pub name: String,

    pub description: String,

    /// Jobs currently tagged to this bucket.
    pub jobs: BTreeMap<JobId, JobRecord>,

    pub settings: BucketSettings,

    pub permissions: Permissions,

    /// Principals watching this bucket for new activity.
    pub monitors: BTreeSet<Principal>,

    pub created_by: Principal,

    pub created_at: DateTime<Utc>,
}

impl Bucket {
    pub fn new(name: impl Into<String>, description: impl Into<String>, creator: Principal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            jobs: BTreeMap::new(),
            settings: BucketSettings::default(),
            permissions: Permissions::new(),
            monitors: BTreeSet::new(),
            created_by: creator,
            created_at: Utc::now(),
        }
    }

    pub fn has_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    /// Toggle monitoring; returns whether the principal now monitors.
    pub fn toggle_monitor(&mut self, principal: &Principal) -> bool {
        if self.monitors.remove(principal) {
            false
        } else {
            self.monitors.insert(principal.clone());
            true
        }
    }

    /// Share of tagged jobs that have been resolved, 0–100.
    pub fn completion_pct(&self) -> u8 {
        if self.jobs.is_empty() {
            return 0;
        }
        let resolved = self
            .jobs
            .values()
            .filter(|job| job.resolved_at.is_some())
            .count();
        ((resolved * 100) / self.jobs.len()) as u8
    }

    /// Mean time from tagging to resolution over resolved jobs.
    pub fn average_resolution(&self) -> Option<Duration> {
        let spans: Vec<Duration> = self
            .jobs
            .values()
            .filter_map(|job| job.resolved_at.map(|done| done - job.tagged_at))
            .collect();
        if spans.is_empty() {
            return None;
        }
        let total: i64 = spans.iter().map(Duration::num_seconds).sum();
        Some(Duration::seconds(total / spans.len() as i64))
    }

    pub fn summary(&self) -> BucketSummary {
        BucketSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            job_count: self.jobs.len(),
            completion_pct: self.completion_pct(),
            completion_board: self.settings.completion_board,
            approval_board: self.settings.approval_board,
            denial_board: self.settings.denial_board,
            timeout: self.settings.due_timeout.as_ref().map(DueTimeout::summary),
            average_resolution_secs: self.average_resolution().map(|d| d.num_seconds()),
            monitors: self.monitors.iter().cloned().collect(),
            created_by: self.created_by.clone(),
        }
    }
}

/// Display snapshot of a bucket handed to the rendering layer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BucketSummary {
    pub name: String,
    pub description: String,
    pub job_count: usize,
    pub completion_pct: u8,
    pub completion_board: Option<u32>,
    pub approval_board: Option<u32>,
    pub denial_board: Option<u32>,
    pub timeout: Option<String>,
    pub average_resolution_secs: Option<i64>,
    pub monitors: Vec<Principal>,
    pub created_by: Principal,
}

/// One row of a principal's access report.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BucketAccess {
    pub bucket: String,
    pub actions: Vec<BucketAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_summaries() {
        assert_eq!(DueTimeout::Never.summary(), "never");
        let three_days = DueTimeout::After {
            amount: 3,
            unit: TimeoutUnit::Days,
        };
        assert_eq!(three_days.summary(), "3 days");
        let one_hour = DueTimeout::After {
            amount: 1,
            unit: TimeoutUnit::Hours,
        };
        assert_eq!(one_hour.summary(), "1 hour");
    }

    #[test]
    fn completion_and_resolution_stats() {
        let mut bucket = Bucket::new("Plots", "Plot development", Principal::new("Wiz"));
        assert_eq!(bucket.completion_pct(), 0);
        assert_eq!(bucket.average_resolution(), None);

        let start = Utc::now();
        bucket.jobs.insert(
            1,
            JobRecord {
                tagged_at: start,
                resolved_at: Some(start + Duration::hours(2)),
            },
        );
        bucket.jobs.insert(
            2,
            JobRecord {
                tagged_at: start,
                resolved_at: Some(start + Duration::hours(4)),
            },
        );
        bucket.jobs.insert(
            3,
            JobRecord {
                tagged_at: start,
                resolved_at: None,
            },
        );
        bucket.jobs.insert(
            4,
            JobRecord {
                tagged_at: start,
                resolved_at: None,
            },
        );

        assert_eq!(bucket.completion_pct(), 50);
        assert_eq!(bucket.average_resolution(), Some(Duration::hours(3)));
        let summary = bucket.summary();
        assert_eq!(summary.job_count, 4);
        assert_eq!(summary.average_resolution_secs, Some(3 * 3600));
    }

    #[test]
    fn monitor_toggles() {
        let mut bucket = Bucket::new("Plots", "Plot development", Principal::new("Wiz"));
        let alice = Principal::new("Alice");
        assert!(bucket.toggle_monitor(&alice));
        assert!(bucket.monitors.contains(&alice));
        assert!(!bucket.toggle_monitor(&alice));
        assert!(bucket.monitors.is_empty());
    }
}
