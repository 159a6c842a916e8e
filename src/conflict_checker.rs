//! Time conflict checks and slot suggestions for appointments on one date.
//!
//! Everything here is a pure function of its inputs. Callers fetch the
//! bookings for the date in question and pass them in; nothing is cached or
//! persisted between calls.

use crate::{
    error::{ErrorKind, SchedulingError},
    time_window::{TimeOfDay, TimeWindow},
    types::{Appointment, AppointmentStatus},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 120;
pub const DEFAULT_ANCHORS: [&str; 6] = ["08:00", "10:00", "12:00", "14:00", "16:00", "18:00"];

/// An existing reservation. Only ever read by the checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub label: String,
    pub window: TimeWindow,
}

impl Booking {
    pub fn new(label: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            label: label.into(),
            window,
        }
    }

    /// Builds a booking from stored values. A missing or blank start counts
    /// as `00:00` and a missing or blank end as `23:59`, so a record without
    /// times blocks the whole day. Values that are present but unparseable
    /// are rejected.
    pub fn from_stored(
        label: impl Into<String>,
        date: NaiveDate,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self, SchedulingError> {
        let start = stored_time(start, TimeOfDay::START_OF_DAY, "start_time")?;
        let end = stored_time(end, TimeOfDay::END_OF_DAY, "end_time")?;
        Ok(Self::new(label, TimeWindow::new(date, start, end)))
    }

    pub fn from_appointment(appointment: &Appointment) -> Result<Self, SchedulingError> {
        Self::from_stored(
            appointment.label(),
            appointment.scheduled_at,
            appointment.start_time.as_deref(),
            appointment.end_time.as_deref(),
        )
    }
}

fn stored_time(
    value: Option<&str>,
    default: TimeOfDay,
    field: &'static str,
) -> Result<TimeOfDay, SchedulingError> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => TimeOfDay::parse(raw).map_err(|_| SchedulingError::malformed(field, raw)),
    }
}

/// Date-scoped booking set for `date`, built from stored appointments.
/// `exclude` skips the appointment being rescheduled; cancelled
/// appointments never block a slot.
pub fn bookings_for(
    appointments: &[Appointment],
    date: NaiveDate,
    exclude: Option<Uuid>,
) -> Result<Vec<Booking>, SchedulingError> {
    appointments
        .iter()
        .filter(|appointment| appointment.scheduled_at == date)
        .filter(|appointment| Some(appointment.id) != exclude)
        .filter(|appointment| appointment.status != AppointmentStatus::Cancelled)
        .map(Booking::from_appointment)
        .collect()
}

/// Checks `appointment` as it is about to be stored against the stored
/// `appointments`. Its own stored version is skipped by id. A cancelled
/// appointment only needs a valid range since it never blocks anyone.
pub fn check_appointment(
    appointment: &Appointment,
    appointments: &[Appointment],
) -> Result<ConflictResult, SchedulingError> {
    let candidate = Booking::from_appointment(appointment)?.window;
    let existing = match appointment.status {
        AppointmentStatus::Cancelled => vec![],
        _ => bookings_for(appointments, candidate.date, Some(appointment.id))?,
    };
    Ok(validate(&candidate, &existing))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResult {
    pub valid: bool,
    pub reason: Option<ErrorKind>,
    pub conflicting_booking: Option<Booking>,
}

impl ConflictResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
            conflicting_booking: None,
        }
    }

    pub fn invalid_range() -> Self {
        Self {
            valid: false,
            reason: Some(ErrorKind::InvalidRange),
            conflicting_booking: None,
        }
    }

    pub fn overlap(booking: Booking) -> Self {
        Self {
            valid: false,
            reason: Some(ErrorKind::Overlap),
            conflicting_booking: Some(booking),
        }
    }
}

/// Checks `candidate` against `existing`, which must already be scoped to
/// `candidate.date`.
///
/// An inverted or empty window is reported as [`ErrorKind::InvalidRange`]
/// before any booking is looked at. Otherwise the first overlapping booking
/// in input order is reported.
pub fn validate(candidate: &TimeWindow, existing: &[Booking]) -> ConflictResult {
    if !candidate.is_valid_range() {
        return ConflictResult::invalid_range();
    }

    match existing
        .iter()
        .find(|booking| candidate.overlaps(&booking.window))
    {
        Some(booking) => ConflictResult::overlap(booking.clone()),
        None => ConflictResult::ok(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// Return every anchor and flag the busy ones.
    #[default]
    Flag,
    /// Drop busy anchors.
    Filter,
}

impl FromStr for SlotPolicy {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "flag" => Ok(SlotPolicy::Flag),
            "filter" => Ok(SlotPolicy::Filter),
            other => Err(SchedulingError::malformed("policy", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSuggestion {
    pub window: TimeWindow,
    pub has_conflict: bool,
}

/// One suggestion per anchor, in anchor order, each flagged against
/// `existing`.
pub fn suggest_slots(
    date: NaiveDate,
    existing: &[Booking],
    anchors: &[TimeOfDay],
    duration_minutes: u32,
) -> Result<Vec<SlotSuggestion>, SchedulingError> {
    suggest_slots_with_policy(date, existing, anchors, duration_minutes, SlotPolicy::Flag)
}

pub fn suggest_slots_with_policy(
    date: NaiveDate,
    existing: &[Booking],
    anchors: &[TimeOfDay],
    duration_minutes: u32,
    policy: SlotPolicy,
) -> Result<Vec<SlotSuggestion>, SchedulingError> {
    check_duration(duration_minutes)?;
    Ok(slots(date, existing, anchors, duration_minutes, policy))
}

fn check_duration(duration_minutes: u32) -> Result<(), SchedulingError> {
    if duration_minutes == 0 {
        return Err(SchedulingError::malformed("duration", "0"));
    }
    Ok(())
}

fn slots(
    date: NaiveDate,
    existing: &[Booking],
    anchors: &[TimeOfDay],
    duration_minutes: u32,
    policy: SlotPolicy,
) -> Vec<SlotSuggestion> {
    anchors
        .iter()
        .map(|&anchor| {
            let end = anchor.saturating_add_minutes(duration_minutes);
            let window = TimeWindow::new(date, anchor, end);
            // An anchor at 23:59 collapses to an empty window and cannot be booked.
            let has_conflict = !window.is_valid_range()
                || existing
                    .iter()
                    .any(|booking| window.overlaps(&booking.window));
            SlotSuggestion {
                window,
                has_conflict,
            }
        })
        .filter(|slot| policy == SlotPolicy::Flag || !slot.has_conflict)
        .collect()
}

/// Anchor set, slot length and policy used for suggestions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotOptions {
    anchors: Vec<TimeOfDay>,
    duration_minutes: u32,
    policy: SlotPolicy,
}

impl Default for SlotOptions {
    fn default() -> Self {
        Self {
            anchors: DEFAULT_ANCHORS
                .iter()
                .filter_map(|anchor| TimeOfDay::parse(anchor).ok())
                .collect(),
            duration_minutes: DEFAULT_SLOT_DURATION_MINUTES,
            policy: SlotPolicy::Flag,
        }
    }
}

impl SlotOptions {
    pub fn new(
        anchors: Vec<TimeOfDay>,
        duration_minutes: u32,
        policy: SlotPolicy,
    ) -> Result<Self, SchedulingError> {
        check_duration(duration_minutes)?;
        Ok(Self {
            anchors,
            duration_minutes,
            policy,
        })
    }

    /// Parses a comma separated anchor list such as `08:00,10:00,12:00`.
    pub fn parse_anchors(raw: &str) -> Result<Vec<TimeOfDay>, SchedulingError> {
        raw.split(',')
            .map(str::trim)
            .filter(|anchor| !anchor.is_empty())
            .map(|anchor| {
                TimeOfDay::parse(anchor).map_err(|_| SchedulingError::malformed("anchor", anchor))
            })
            .collect()
    }

    pub fn anchors(&self) -> &[TimeOfDay] {
        &self.anchors
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn policy(&self) -> SlotPolicy {
        self.policy
    }

    pub fn with_duration(mut self, duration_minutes: u32) -> Result<Self, SchedulingError> {
        check_duration(duration_minutes)?;
        self.duration_minutes = duration_minutes;
        Ok(self)
    }

    pub fn with_policy(mut self, policy: SlotPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn suggest(&self, date: NaiveDate, existing: &[Booking]) -> Vec<SlotSuggestion> {
        slots(
            date,
            existing,
            &self.anchors,
            self.duration_minutes,
            self.policy,
        )
    }
}
