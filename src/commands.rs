use crate::{
    time_window::TimeWindow,
    types::{Appointment, AppointmentStatus, ApptStage},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single edit to a stored appointment.
///
/// Edits are submitted one by one to a [`crate::backend::CrmBackend`] and each
/// gets its own result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AppointmentCommand {
    MoveStage { id: Uuid, stage: ApptStage },
    UpdateNotes { id: Uuid, notes: String },
    Reschedule { id: Uuid, window: TimeWindow },
    MarkTechSent { id: Uuid },
    SetStatus { id: Uuid, status: AppointmentStatus },
    Delete { id: Uuid },
}

impl AppointmentCommand {
    pub fn id(&self) -> Uuid {
        match self {
            AppointmentCommand::MoveStage { id, .. }
            | AppointmentCommand::UpdateNotes { id, .. }
            | AppointmentCommand::Reschedule { id, .. }
            | AppointmentCommand::MarkTechSent { id }
            | AppointmentCommand::SetStatus { id, .. }
            | AppointmentCommand::Delete { id } => *id,
        }
    }

    /// Whether applying the edit to `current` can make it occupy a window it
    /// does not occupy now: a reschedule, or a status change that brings a
    /// cancelled appointment back.
    pub fn claims_window(&self, current: &Appointment) -> bool {
        match self {
            AppointmentCommand::Reschedule { .. } => true,
            AppointmentCommand::SetStatus { status, .. } => {
                current.status == AppointmentStatus::Cancelled
                    && *status != AppointmentStatus::Cancelled
            }
            _ => false,
        }
    }

    /// Applies the edit in place. `Delete` leaves the record untouched; the
    /// backend removes it.
    pub fn apply(&self, appointment: &mut Appointment, now: DateTime<Utc>) {
        match self {
            AppointmentCommand::MoveStage { stage, .. } => appointment.stage = *stage,
            AppointmentCommand::UpdateNotes { notes, .. } => {
                appointment.notes = Some(notes.clone())
            }
            AppointmentCommand::Reschedule { window, .. } => {
                appointment.scheduled_at = window.date;
                appointment.start_time = Some(window.start.to_string());
                appointment.end_time = Some(window.end.to_string());
            }
            AppointmentCommand::MarkTechSent { .. } => appointment.tech_sent_at = Some(now),
            AppointmentCommand::SetStatus { status, .. } => appointment.status = *status,
            AppointmentCommand::Delete { .. } => {}
        }
    }
}
