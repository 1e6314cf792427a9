use std::fmt;
use std::str::FromStr;

use chrono::FixedOffset;
use chrono_tz::Tz;

use crate::error::ParseError;

const HOUR_SECS: i32 = 3600;
const MAX_OFFSET_HOURS: i32 = 14;

/// Fixed-offset zone abbreviations accepted after the time of day.
const ABBREVIATIONS: &[(&str, i32)] = &[
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
    ("CET", 1),
    ("CEST", 2),
    ("BST", 1),
    ("JST", 9),
];

/// The zone a schedule is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScheduleZone {
    /// whatever zone the controller process runs in
    Local,
    Fixed(FixedOffset),
    /// an IANA zone, follows daylight-saving transitions
    Named(Tz),
}

impl fmt::Display for ScheduleZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleZone::Local => f.write_str("local"),
            ScheduleZone::Fixed(offset) => write!(f, "{offset}"),
            ScheduleZone::Named(tz) => f.write_str(tz.name()),
        }
    }
}

/// A daily shutdown time, e.g. `18:30`, `09:00 -05` or `07:15 Europe/Berlin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScheduleSpec {
    pub(crate) hour: u32,
    pub(crate) minute: u32,
    pub(crate) zone: ScheduleZone,
}

impl ScheduleSpec {
    pub(crate) fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)?;
        match self.zone {
            ScheduleZone::Local => Ok(()),
            zone => write!(f, " {zone}"),
        }
    }
}

impl FromStr for ScheduleSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse an annotation value of the form `H:MM` or `HH:MM`, optionally
/// followed by a zone: a numeric offset (`-07`, `+0530`, `+05:30`), `Z`,
/// `UTC`, `GMT`, one of a few fixed abbreviations, or an IANA name.
pub(crate) fn parse(value: &str) -> Result<ScheduleSpec, ParseError> {
    let err = |reason| ParseError::new(value, reason);

    let (hour, rest) = value
        .trim()
        .split_once(':')
        .ok_or_else(|| err("expected HH:MM"))?;
    if hour.is_empty() || hour.len() > 2 || !all_digits(hour) {
        return Err(err("hour must be one or two digits"));
    }
    let minute = rest
        .get(..2)
        .filter(|m| all_digits(m))
        .ok_or_else(|| err("minute must be two digits"))?;

    let hour: u32 = hour.parse().map_err(|_| err("hour must be one or two digits"))?;
    let minute: u32 = minute.parse().map_err(|_| err("minute must be two digits"))?;
    if hour > 23 {
        return Err(err("hour out of range"));
    }
    if minute > 59 {
        return Err(err("minute out of range"));
    }

    let zone = match rest[2..].trim_start() {
        "" => ScheduleZone::Local,
        designator => parse_zone(designator).ok_or_else(|| err("unknown time zone"))?,
    };

    Ok(ScheduleSpec { hour, minute, zone })
}

fn parse_zone(designator: &str) -> Option<ScheduleZone> {
    if ["Z", "UTC", "GMT"]
        .iter()
        .any(|utc| designator.eq_ignore_ascii_case(utc))
    {
        return FixedOffset::east_opt(0).map(ScheduleZone::Fixed);
    }

    if let Some(digits) = designator.strip_prefix('+') {
        return parse_offset(1, digits).map(ScheduleZone::Fixed);
    }
    if let Some(digits) = designator.strip_prefix('-') {
        return parse_offset(-1, digits).map(ScheduleZone::Fixed);
    }

    if let Some((_, hours)) = ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| abbr.eq_ignore_ascii_case(designator))
    {
        return FixedOffset::east_opt(hours * HOUR_SECS).map(ScheduleZone::Fixed);
    }

    designator.parse::<Tz>().ok().map(ScheduleZone::Named)
}

/// `HH`, `HHMM` or `HH:MM` following the sign.
fn parse_offset(sign: i32, digits: &str) -> Option<FixedOffset> {
    if !digits.is_ascii() {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits, "00"),
        4 => (&digits[..2], &digits[2..]),
        5 if digits.as_bytes()[2] == b':' => (&digits[..2], &digits[3..]),
        _ => return None,
    };
    if !all_digits(hours) || !all_digits(minutes) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > MAX_OFFSET_HOURS || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * HOUR_SECS + minutes * 60))
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
