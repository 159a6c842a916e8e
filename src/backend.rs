use crate::{
    commands::AppointmentCommand,
    conflict_checker::check_appointment,
    error::BackendError,
    types::{Appointment, NewAppointment, SavedResponse},
};
use chrono::NaiveDate;
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info};
use uuid::Uuid;

/// Persistence for appointments and the canned-response library.
pub trait CrmBackend: Clone + Send + Sync + 'static {
    /// All appointments ordered by date, then start time.
    fn appointments(&self) -> Result<Vec<Appointment>, String>;

    fn appointment(&self, id: Uuid) -> Result<Option<Appointment>, String>;

    fn appointments_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, String> {
        Ok(self
            .appointments()?
            .into_iter()
            .filter(|appointment| appointment.scheduled_at == date)
            .collect())
    }

    /// Current appointment list, then a fresh snapshot after every change.
    fn appointment_stream(&self) -> WatchStream<Vec<Appointment>>;

    /// Stores the appointment unless its window is inverted or overlaps an
    /// active appointment on the same date. Check and insert see the same
    /// data, concurrent creates for one slot admit at most one.
    fn create_appointment(&self, appointment: NewAppointment) -> Result<Uuid, BackendError>;

    /// Applies the command. Commands that claim a window (see
    /// [`AppointmentCommand::claims_window`]) are checked like a create,
    /// within the same critical section as the update.
    fn execute(&self, command: AppointmentCommand) -> Result<(), BackendError>;

    /// Library entries, most recently updated first.
    fn responses(&self) -> Result<Vec<SavedResponse>, String>;

    /// Inserts the response, or replaces the one with the same id.
    fn save_response(&self, response: SavedResponse) -> Result<(), String>;

    fn remove_response(&self, id: Uuid) -> Result<(), BackendError>;
}

/// Conflict check shared by the backends. `stored` must be read under the
/// same lock or transaction the following write runs in.
pub fn admit(appointment: &Appointment, stored: &[Appointment]) -> Result<(), BackendError> {
    let result = check_appointment(appointment, stored).map_err(|err| {
        error!(%err, id = %appointment.id, "Stored appointment has malformed times");
        BackendError::Storage(format!("Stored appointment is invalid: {err}"))
    })?;
    if result.valid {
        return Ok(());
    }
    info!(id = %appointment.id, reason = ?result.reason, "Rejected appointment window");
    Err(BackendError::Rejected(result))
}
