use crate::error::SchedulingError;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Minute of the day, `00:00` up to and including `23:59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const START_OF_DAY: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY - 1);

    pub fn new(hour: u16, minute: u16) -> Option<Self> {
        if hour >= 24 || minute >= 60 {
            return None;
        }
        Some(Self(hour * 60 + minute))
    }

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    /// Adds `minutes`, stopping at the last minute of the day.
    pub fn saturating_add_minutes(self, minutes: u32) -> Self {
        let end = u32::from(self.0).saturating_add(minutes);
        Self(end.min(u32::from(Self::END_OF_DAY.0)) as u16)
    }

    /// Parses `HH:MM`, or `HH:MM:SS` as stored by SQL `time` columns.
    /// Seconds are dropped.
    pub fn parse(value: &str) -> Result<Self, SchedulingError> {
        let trimmed = value.trim();
        let time = NaiveTime::parse_from_str(trimmed, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map_err(|_| SchedulingError::malformed("time", value))?;
        Ok(Self((time.hour() * 60 + time.minute()) as u16))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

/// A start/end pair on one calendar date.
///
/// Construction does not enforce `start < end`; use [`TimeWindow::is_valid_range`]
/// or [`crate::conflict_checker::validate`] to reject inverted windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    pub fn new(date: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { date, start, end }
    }

    /// Both times are required here. Missing values are only ever defaulted
    /// for stored bookings, see [`crate::conflict_checker::Booking::from_stored`].
    pub fn parse(date: NaiveDate, start: &str, end: &str) -> Result<Self, SchedulingError> {
        let start = TimeOfDay::parse(start)
            .map_err(|_| SchedulingError::malformed("start_time", start))?;
        let end =
            TimeOfDay::parse(end).map_err(|_| SchedulingError::malformed("end_time", end))?;
        Ok(Self::new(date, start, end))
    }

    pub fn is_valid_range(&self) -> bool {
        self.start < self.end
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }

    /// Open interval intersection. Windows that only touch at an endpoint
    /// do not overlap. Dates are not compared.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-{}", self.date, self.start, self.end)
    }
}
