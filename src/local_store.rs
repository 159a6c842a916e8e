use crate::{
    backend::{admit, CrmBackend},
    commands::AppointmentCommand,
    error::BackendError,
    types::{Appointment, NewAppointment, SavedResponse},
};
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::watch::{self, Sender};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info};
use uuid::Uuid;

/// In-memory backend. Data is lost on restart.
#[derive(Debug, Clone)]
pub struct LocalStore {
    appointments: Arc<Mutex<HashMap<Uuid, Appointment>>>,
    responses: Arc<Mutex<HashMap<Uuid, SavedResponse>>>,
    sender: Sender<Vec<Appointment>>,
}

impl Default for LocalStore {
    fn default() -> Self {
        let (sender, _) = watch::channel(vec![]);
        Self {
            appointments: Arc::default(),
            responses: Arc::default(),
            sender,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, String> {
    mutex.lock().map_err(|err| {
        error!(%err, "Local store lock poisoned");
        "Local store unavailable".to_string()
    })
}

fn same_day(
    appointments: &HashMap<Uuid, Appointment>,
    appointment: &Appointment,
) -> Vec<Appointment> {
    appointments
        .values()
        .filter(|stored| stored.scheduled_at == appointment.scheduled_at)
        .cloned()
        .collect()
}

impl LocalStore {
    fn sorted_appointments(&self) -> Result<Vec<Appointment>, String> {
        let mut appointments: Vec<Appointment> =
            lock(&self.appointments)?.values().cloned().collect();
        appointments.sort_by_key(Appointment::schedule_key);
        Ok(appointments)
    }

    fn send_appointments(&self) {
        match self.sorted_appointments() {
            Ok(appointments) => {
                self.sender.send_replace(appointments);
            }
            Err(err) => error!(%err, "Failed to publish current appointments"),
        }
    }
}

impl CrmBackend for LocalStore {
    fn appointments(&self) -> Result<Vec<Appointment>, String> {
        self.sorted_appointments()
    }

    fn appointment(&self, id: Uuid) -> Result<Option<Appointment>, String> {
        Ok(lock(&self.appointments)?.get(&id).cloned())
    }

    fn appointment_stream(&self) -> WatchStream<Vec<Appointment>> {
        self.send_appointments();
        WatchStream::new(self.sender.subscribe())
    }

    fn create_appointment(&self, appointment: NewAppointment) -> Result<Uuid, BackendError> {
        let appointment = Appointment::from_new(appointment);
        let id = appointment.id;
        {
            let mut appointments = lock(&self.appointments)?;
            admit(&appointment, &same_day(&appointments, &appointment))?;
            appointments.insert(id, appointment);
        }
        info!(%id, "Appointment created");
        self.send_appointments();
        Ok(id)
    }

    fn execute(&self, command: AppointmentCommand) -> Result<(), BackendError> {
        let id = command.id();
        {
            let mut appointments = lock(&self.appointments)?;
            let Some(current) = appointments.get(&id) else {
                let err = "Appointment does not exist and can't therefore not be changed";
                error!(%id, "{err}");
                return Err(BackendError::NotFound(err.into()));
            };

            if matches!(command, AppointmentCommand::Delete { .. }) {
                appointments.remove(&id);
            } else {
                let mut updated = current.clone();
                command.apply(&mut updated, Utc::now());
                if command.claims_window(current) {
                    admit(&updated, &same_day(&appointments, &updated))?;
                }
                appointments.insert(id, updated);
            }
        }
        self.send_appointments();
        Ok(())
    }

    fn responses(&self) -> Result<Vec<SavedResponse>, String> {
        let mut responses: Vec<SavedResponse> =
            lock(&self.responses)?.values().cloned().collect();
        responses.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(responses)
    }

    fn save_response(&self, response: SavedResponse) -> Result<(), String> {
        lock(&self.responses)?.insert(response.id, response);
        Ok(())
    }

    fn remove_response(&self, id: Uuid) -> Result<(), BackendError> {
        if lock(&self.responses)?.remove(&id).is_none() {
            return Err(BackendError::NotFound(
                "Response does not exist and can't therefore not be removed".into(),
            ));
        }
        Ok(())
    }
}
