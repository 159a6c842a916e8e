use crate::{
    backend::{admit, CrmBackend},
    commands::AppointmentCommand,
    error::BackendError,
    schema::{appointments, responses},
    types::{Appointment, NewAppointment, SavedResponse},
};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::{Connection, ConnectionError, PgConnection};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch::{self, Sender};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct AppointmentRow {
    id: Uuid,
    customer_name: Option<String>,
    company_name: Option<String>,
    service_type: String,
    description: String,
    notes: Option<String>,
    scheduled_at: NaiveDate,
    start_time: Option<String>,
    end_time: Option<String>,
    status: String,
    price: f64,
    stage: String,
    expected_revenue: f64,
    probability: i32,
    phone: Option<String>,
    email: Option<String>,
    nif: Option<String>,
    tech_sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = String;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: row.id,
            customer_name: row.customer_name,
            company_name: row.company_name,
            service_type: row.service_type,
            description: row.description,
            notes: row.notes,
            scheduled_at: row.scheduled_at,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status.parse()?,
            price: row.price,
            stage: row.stage.parse()?,
            expected_revenue: row.expected_revenue,
            probability: row.probability,
            phone: row.phone,
            email: row.email,
            nif: row.nif,
            tech_sent_at: row.tech_sent_at,
        })
    }
}

impl From<Appointment> for AppointmentRow {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            customer_name: appointment.customer_name,
            company_name: appointment.company_name,
            service_type: appointment.service_type,
            description: appointment.description,
            notes: appointment.notes,
            scheduled_at: appointment.scheduled_at,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            status: appointment.status.as_str().into(),
            price: appointment.price,
            stage: appointment.stage.as_str().into(),
            expected_revenue: appointment.expected_revenue,
            probability: appointment.probability,
            phone: appointment.phone,
            email: appointment.email,
            nif: appointment.nif,
            tech_sent_at: appointment.tech_sent_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = responses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ResponseRow {
    id: Uuid,
    title: String,
    content: String,
    category: String,
    last_updated: i64,
}

impl TryFrom<ResponseRow> for SavedResponse {
    type Error = String;

    fn try_from(row: ResponseRow) -> Result<Self, Self::Error> {
        Ok(SavedResponse {
            id: row.id,
            title: row.title,
            content: row.content,
            category: row.category.parse()?,
            last_updated: row.last_updated,
        })
    }
}

impl From<SavedResponse> for ResponseRow {
    fn from(response: SavedResponse) -> Self {
        Self {
            id: response.id,
            title: response.title,
            content: response.content,
            category: response.category.as_str().into(),
            last_updated: response.last_updated,
        }
    }
}

impl From<diesel::result::Error> for BackendError {
    fn from(err: diesel::result::Error) -> Self {
        error!(%err, "Database query failed");
        BackendError::Storage("Database Error. Query failed".into())
    }
}

#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
    sender: Sender<Vec<Appointment>>,
}

/// Serializes writers that check for conflicts, also across processes
/// sharing the database. Readers are not blocked.
fn lock_appointments(connection: &mut PgConnection) -> QueryResult<usize> {
    diesel::sql_query("LOCK TABLE appointments IN SHARE ROW EXCLUSIVE MODE").execute(connection)
}

fn read_appointments(
    connection: &mut PgConnection,
    date: Option<NaiveDate>,
) -> Result<Vec<Appointment>, String> {
    let mut query = appointments::table
        .order(appointments::scheduled_at.asc())
        .select(AppointmentRow::as_select())
        .into_boxed();
    if let Some(date) = date {
        query = query.filter(appointments::scheduled_at.eq(date));
    }

    let rows = query.load::<AppointmentRow>(connection).map_err(|err| {
        error!(%err, "Failed to read appointments from Database");
        "Database Error. Appointments can't be read".to_string()
    })?;
    let mut appointments = rows
        .into_iter()
        .map(Appointment::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    appointments.sort_by_key(Appointment::schedule_key);
    Ok(appointments)
}

fn read_appointment(
    connection: &mut PgConnection,
    appointment_id: Uuid,
) -> Result<Option<Appointment>, String> {
    let row = appointments::table
        .find(appointment_id)
        .select(AppointmentRow::as_select())
        .first::<AppointmentRow>(connection)
        .optional()
        .map_err(|err| {
            error!(%err, "Failed to read appointment from Database");
            "Database Error. Appointment can't be read".to_string()
        })?;
    row.map(Appointment::try_from).transpose()
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> Result<Self, ConnectionError> {
        let connection = Self::establish_connection(database_url)?;
        let (sender, _) = watch::channel(vec![]);
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            sender,
        })
    }

    fn establish_connection(database_url: &str) -> Result<PgConnection, ConnectionError> {
        PgConnection::establish(database_url)
    }

    fn connection(&self) -> Result<MutexGuard<'_, PgConnection>, String> {
        self.connection.lock().map_err(|err| {
            error!(%err, "Database connection lock poisoned");
            "Database Error. Connection unavailable".to_string()
        })
    }

    fn send_appointments(&self) {
        let appointments = self
            .connection()
            .and_then(|mut connection| read_appointments(&mut connection, None));
        match appointments {
            Ok(appointments) => {
                self.sender.send_replace(appointments);
            }
            Err(err) => error!(%err, "Failed to publish current appointments"),
        }
    }
}

impl CrmBackend for DatabaseInterface {
    fn appointments(&self) -> Result<Vec<Appointment>, String> {
        read_appointments(&mut *self.connection()?, None)
    }

    fn appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, String> {
        read_appointment(&mut *self.connection()?, appointment_id)
    }

    fn appointments_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, String> {
        read_appointments(&mut *self.connection()?, Some(date))
    }

    fn appointment_stream(&self) -> WatchStream<Vec<Appointment>> {
        self.send_appointments();
        WatchStream::new(self.sender.subscribe())
    }

    fn create_appointment(&self, appointment: NewAppointment) -> Result<Uuid, BackendError> {
        let appointment = Appointment::from_new(appointment);
        let id = appointment.id;
        {
            let mut connection = self.connection()?;
            connection.transaction::<_, BackendError, _>(|connection| {
                lock_appointments(connection)?;
                let same_day = read_appointments(connection, Some(appointment.scheduled_at))?;
                admit(&appointment, &same_day)?;
                diesel::insert_into(appointments::table)
                    .values(&AppointmentRow::from(appointment.clone()))
                    .execute(connection)?;
                Ok(())
            })?;
        }
        info!(%id, "Appointment created");
        self.send_appointments();
        Ok(id)
    }

    fn execute(&self, command: AppointmentCommand) -> Result<(), BackendError> {
        let id = command.id();
        {
            let mut connection = self.connection()?;
            connection.transaction::<_, BackendError, _>(|connection| {
                lock_appointments(connection)?;
                let Some(current) = read_appointment(connection, id)? else {
                    error!(%id, "Command failed. Appointment does not exist");
                    return Err(BackendError::NotFound(
                        "Database Error. Appointment does not exist".into(),
                    ));
                };
                if command.claims_window(&current) {
                    let mut updated = current;
                    command.apply(&mut updated, Utc::now());
                    let same_day = read_appointments(connection, Some(updated.scheduled_at))?;
                    admit(&updated, &same_day)?;
                }

                let target = appointments::table.find(id);
                match command {
                    AppointmentCommand::MoveStage { stage, .. } => diesel::update(target)
                        .set(appointments::stage.eq(stage.as_str()))
                        .execute(connection),
                    AppointmentCommand::UpdateNotes { notes, .. } => diesel::update(target)
                        .set(appointments::notes.eq(Some(notes)))
                        .execute(connection),
                    AppointmentCommand::Reschedule { window, .. } => diesel::update(target)
                        .set((
                            appointments::scheduled_at.eq(window.date),
                            appointments::start_time.eq(Some(window.start.to_string())),
                            appointments::end_time.eq(Some(window.end.to_string())),
                        ))
                        .execute(connection),
                    AppointmentCommand::MarkTechSent { .. } => diesel::update(target)
                        .set(appointments::tech_sent_at.eq(Some(Utc::now())))
                        .execute(connection),
                    AppointmentCommand::SetStatus { status, .. } => diesel::update(target)
                        .set(appointments::status.eq(status.as_str()))
                        .execute(connection),
                    AppointmentCommand::Delete { .. } => diesel::delete(target).execute(connection),
                }?;
                Ok(())
            })?;
        }
        self.send_appointments();
        Ok(())
    }

    fn responses(&self) -> Result<Vec<SavedResponse>, String> {
        let mut connection = self.connection()?;
        let rows = responses::table
            .order(responses::last_updated.desc())
            .select(ResponseRow::as_select())
            .load::<ResponseRow>(&mut *connection)
            .map_err(|err| {
                error!(%err, "Failed to read responses from Database");
                "Database Error. Responses can't be read".to_string()
            })?;
        rows.into_iter().map(SavedResponse::try_from).collect()
    }

    fn save_response(&self, response: SavedResponse) -> Result<(), String> {
        let mut connection = self.connection()?;
        let row = ResponseRow::from(response);
        diesel::insert_into(responses::table)
            .values(&row)
            .on_conflict(responses::id)
            .do_update()
            .set(&row)
            .execute(&mut *connection)
            .map_err(|err| {
                error!(%err, "Response can't be saved");
                "Database Error. Response can't be saved".to_string()
            })?;
        Ok(())
    }

    fn remove_response(&self, response_id: Uuid) -> Result<(), BackendError> {
        let mut connection = self.connection()?;
        let result = diesel::delete(responses::table.find(response_id)).execute(&mut *connection);

        match result {
            Ok(0) => {
                error!(%response_id, "Deletion failed. 0 database lines were changed");
                Err(BackendError::NotFound(
                    "Database Error. Response does not exist".into(),
                ))
            }
            Ok(_) => Ok(()),
            Err(err) => {
                error!(%err, "Deletion of response failed");
                Err(BackendError::Storage(
                    "Database Error. Deletion of response failed".into(),
                ))
            }
        }
    }
}
