use std::fmt;

use chrono::{DateTime, Local, TimeZone, Timelike, Utc};

use crate::error::ParseError;
use crate::schedule::{parse, ScheduleSpec, ScheduleZone};
use crate::workload::WorkloadSnapshot;

/// Outcome of evaluating one schedule at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DueDecision {
    pub(crate) due: bool,
    pub(crate) evaluated_at: DateTime<Utc>,
    /// minute of day of `evaluated_at`, in the schedule's zone
    pub(crate) zone_minute: u32,
}

impl fmt::Display for DueDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.zone_minute / 60, self.zone_minute % 60)
    }
}

/// Whether `now` falls inside the scheduled minute.
///
/// Only minute equality counts. A "now is at or past the schedule" test would
/// stay true until midnight and fire on every poll.
pub(crate) fn is_due(schedule: &ScheduleSpec, now: DateTime<Utc>) -> bool {
    minute_of_day_in(&schedule.zone, now) == schedule.minute_of_day()
}

pub(crate) fn evaluate(schedule: &ScheduleSpec, now: DateTime<Utc>) -> DueDecision {
    DueDecision {
        due: is_due(schedule, now),
        evaluated_at: now,
        zone_minute: minute_of_day_in(&schedule.zone, now),
    }
}

// The civil time is derived on every call; an offset captured earlier could be
// stale after a daylight-saving change.
fn minute_of_day_in(zone: &ScheduleZone, now: DateTime<Utc>) -> u32 {
    match zone {
        ScheduleZone::Local => minute_of_day(now, &Local),
        ScheduleZone::Fixed(offset) => minute_of_day(now, offset),
        ScheduleZone::Named(tz) => minute_of_day(now, tz),
    }
}

fn minute_of_day<Z: TimeZone>(now: DateTime<Utc>, zone: &Z) -> u32 {
    let civil = now.with_timezone(zone);
    civil.hour() * 60 + civil.minute()
}

/// What the reconciler should do with one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Unannotated,
    Invalid(ParseError),
    /// replicas already at or below the target
    AlreadyScaled,
    NotDue(ScheduleSpec, DueDecision),
    Due(ScheduleSpec, DueDecision),
}

/// Look up the schedule annotation, parse it and apply the replica gate.
///
/// A workload at `target` replicas is never due, whatever the clock says, so
/// repeated polls inside the scheduled minute do not scale it again.
pub(crate) fn should_scale(
    workload: &WorkloadSnapshot,
    annotation_key: &str,
    target: i32,
    now: DateTime<Utc>,
) -> Verdict {
    let Some(value) = workload.annotation(annotation_key) else {
        return Verdict::Unannotated;
    };
    let schedule = match parse(value) {
        Ok(schedule) => schedule,
        Err(err) => return Verdict::Invalid(err),
    };
    if workload.replicas <= target {
        return Verdict::AlreadyScaled;
    }

    let decision = evaluate(&schedule, now);
    if decision.due {
        Verdict::Due(schedule, decision)
    } else {
        Verdict::NotDue(schedule, decision)
    }
}
