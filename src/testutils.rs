use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use chrono::Utc;
use tokio::sync::watch::{self, Sender};
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::{
    backend::{admit, CrmBackend},
    commands::AppointmentCommand,
    configuration::Configuration,
    conflict_checker::SlotOptions,
    error::BackendError,
    text_generation::{DEFAULT_ENDPOINT, DEFAULT_MODEL},
    types::{Appointment, NewAppointment, SavedResponse},
};

pub const TEST_PASSWORD: &str = "123";

pub struct MockCrmBackendInner {
    pub success: AtomicBool,
    pub calls_to_appointments: AtomicU64,
    pub calls_to_appointment: AtomicU64,
    pub calls_to_create_appointment: AtomicU64,
    pub calls_to_execute: AtomicU64,
    pub calls_to_responses: AtomicU64,
    pub calls_to_save_response: AtomicU64,
    pub calls_to_remove_response: AtomicU64,
    pub appointments: Mutex<Vec<Appointment>>,
    pub responses: Mutex<Vec<SavedResponse>>,
    pub created: Mutex<Vec<NewAppointment>>,
    pub executed: Mutex<Vec<AppointmentCommand>>,
    sender: Sender<Vec<Appointment>>,
}

#[derive(Clone)]
pub struct MockCrmBackend(pub Arc<MockCrmBackendInner>);

impl MockCrmBackendInner {
    fn new() -> Self {
        let (sender, _) = watch::channel(vec![]);
        Self {
            success: AtomicBool::new(true),
            calls_to_appointments: AtomicU64::default(),
            calls_to_appointment: AtomicU64::default(),
            calls_to_create_appointment: AtomicU64::default(),
            calls_to_execute: AtomicU64::default(),
            calls_to_responses: AtomicU64::default(),
            calls_to_save_response: AtomicU64::default(),
            calls_to_remove_response: AtomicU64::default(),
            appointments: Mutex::default(),
            responses: Mutex::default(),
            created: Mutex::default(),
            executed: Mutex::default(),
            sender,
        }
    }
}

impl MockCrmBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockCrmBackendInner::new()))
    }

    pub fn with_appointments(appointments: Vec<Appointment>) -> Self {
        let backend = Self::new();
        *backend.0.appointments.lock().unwrap() = appointments;
        backend
    }

    fn result(&self) -> Result<(), String> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err("Supposed to fail".into()),
        }
    }
}

impl CrmBackend for MockCrmBackend {
    fn appointments(&self) -> Result<Vec<Appointment>, String> {
        self.0.calls_to_appointments.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.appointments.lock().unwrap().clone())
    }

    fn appointment(&self, id: Uuid) -> Result<Option<Appointment>, String> {
        self.0.calls_to_appointment.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self
            .0
            .appointments
            .lock()
            .unwrap()
            .iter()
            .find(|appointment| appointment.id == id)
            .cloned())
    }

    fn appointment_stream(&self) -> WatchStream<Vec<Appointment>> {
        WatchStream::new(self.0.sender.subscribe())
    }

    fn create_appointment(&self, appointment: NewAppointment) -> Result<Uuid, BackendError> {
        self.0
            .calls_to_create_appointment
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let candidate = Appointment::from_new(appointment.clone());
        admit(&candidate, &self.0.appointments.lock().unwrap())?;
        self.0.created.lock().unwrap().push(appointment);
        Ok(candidate.id)
    }

    fn execute(&self, command: AppointmentCommand) -> Result<(), BackendError> {
        self.0.calls_to_execute.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let appointments = self.0.appointments.lock().unwrap();
        let current = appointments
            .iter()
            .find(|appointment| appointment.id == command.id())
            .ok_or_else(|| BackendError::NotFound("Appointment does not exist".into()))?;
        if command.claims_window(current) {
            let mut updated = current.clone();
            command.apply(&mut updated, Utc::now());
            admit(&updated, &appointments)?;
        }
        self.0.executed.lock().unwrap().push(command);
        Ok(())
    }

    fn responses(&self) -> Result<Vec<SavedResponse>, String> {
        self.0.calls_to_responses.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.responses.lock().unwrap().clone())
    }

    fn save_response(&self, response: SavedResponse) -> Result<(), String> {
        self.0.calls_to_save_response.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.responses.lock().unwrap().push(response);
        Ok(())
    }

    fn remove_response(&self, id: Uuid) -> Result<(), BackendError> {
        self.0
            .calls_to_remove_response
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let mut responses = self.0.responses.lock().unwrap();
        let before = responses.len();
        responses.retain(|response| response.id != id);
        if responses.len() == before {
            return Err(BackendError::NotFound("Response does not exist".into()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct TestConfiguration {
    pub frontend_path: PathBuf,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            frontend_path: PathBuf::from("frontend/index.html"),
        }
    }
}

impl Configuration for TestConfiguration {
    fn website_title(&self) -> String {
        "Hidro Clean".into()
    }

    fn password(&self) -> String {
        TEST_PASSWORD.into()
    }

    fn frontend_path(&self) -> PathBuf {
        self.frontend_path.clone()
    }

    fn database_url(&self) -> Option<String> {
        None
    }

    fn port(&self) -> String {
        "0".into()
    }

    fn ai_api_key(&self) -> Option<String> {
        None
    }

    fn ai_model(&self) -> String {
        DEFAULT_MODEL.into()
    }

    fn ai_endpoint(&self) -> String {
        DEFAULT_ENDPOINT.into()
    }

    fn slot_options(&self) -> SlotOptions {
        SlotOptions::default()
    }
}
