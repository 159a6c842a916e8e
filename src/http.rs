use crate::backend::CrmBackend;
use crate::commands::AppointmentCommand;
use crate::configuration::Configuration;
use crate::conflict_checker::{self, bookings_for, Booking, ConflictResult, SlotOptions};
use crate::conflict_checker::{SlotPolicy, SlotSuggestion};
use crate::contact::ContactLinks;
use crate::error::{BackendError, ErrorKind, SchedulingError};
use crate::pipeline::{filter_responses, group_by_stage, StageGroup};
use crate::text_generation::{GeneratedText, GenerationError, TextGenerator};
use crate::time_window::TimeWindow;
use crate::types::{Appointment, ApptStage, Category, NewAppointment, SavedResponse};
use axum::extract::{Path, Query, Request};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, Response};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct AppState<T: CrmBackend> {
    backend: T,
    generator: TextGenerator,
    slot_options: SlotOptions,
    password: String,
    frontend_path: PathBuf,
    website_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct CreateAppointmentRequest {
    #[validate(length(min = 1, max = 120))]
    customer_name: String,
    company_name: Option<String>,
    service_type: Option<String>,
    #[serde(default)]
    description: String,
    notes: Option<String>,
    scheduled_at: NaiveDate,
    start_time: String,
    end_time: String,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    price: f64,
    stage: Option<ApptStage>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    expected_revenue: f64,
    #[serde(default)]
    #[validate(range(min = 0, max = 100))]
    probability: i32,
    phone: Option<String>,
    #[validate(email)]
    email: Option<String>,
    #[validate(length(max = 20))]
    nif: Option<String>,
}

impl CreateAppointmentRequest {
    fn into_new_appointment(self, window: &TimeWindow) -> NewAppointment {
        let defaults = NewAppointment::default();
        NewAppointment {
            customer_name: Some(self.customer_name.trim().to_string()),
            company_name: self.company_name,
            service_type: self.service_type.unwrap_or(defaults.service_type),
            description: self.description,
            notes: self.notes,
            scheduled_at: window.date,
            start_time: Some(window.start.to_string()),
            end_time: Some(window.end.to_string()),
            price: self.price,
            stage: self.stage.unwrap_or(defaults.stage),
            expected_revenue: self.expected_revenue,
            probability: self.probability,
            phone: self.phone,
            email: self.email,
            nif: self.nif,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CreatedResponse {
    id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckRequest {
    date: NaiveDate,
    start_time: String,
    end_time: String,
    exclude_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct SaveResponseRequest {
    id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[validate(length(min = 1))]
    content: String,
    #[serde(default)]
    category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoveResponseRequest {
    id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GenerateRequest {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: String,
}

#[derive(Debug, Deserialize)]
struct SlotQuery {
    date: NaiveDate,
    duration: Option<u32>,
    policy: Option<SlotPolicy>,
    limit: Option<usize>,
}

pub fn create_app<T: CrmBackend, C: Configuration>(backend: T, configuration: C) -> Router {
    let generator = match configuration.ai_api_key() {
        Some(api_key) => TextGenerator::remote(
            configuration.ai_endpoint(),
            configuration.ai_model(),
            api_key,
        ),
        None => {
            warn!("No AI API key configured, replies are drafted from the local template");
            TextGenerator::fallback_only()
        }
    };
    let state = AppState {
        backend,
        generator,
        slot_options: configuration.slot_options(),
        password: configuration.password(),
        frontend_path: configuration.frontend_path(),
        website_title: configuration.website_title(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/frontend", get(get_frontend::<T>))
        .route("/appointments", get(get_appointments::<T>))
        .route("/appointments/stream", get(stream_appointments::<T>))
        .route("/contact/:id", get(get_contact::<T>))
        .route("/pipeline", get(get_pipeline::<T>))
        .route("/slots", get(get_slots::<T>))
        .route("/check", post(check_window::<T>))
        .route("/responses", get(get_responses::<T>));

    let admin = Router::new()
        .route("/admin_page", get(get_admin_page))
        .route("/appointments/add", post(create_appointment::<T>))
        .route("/appointments/command", post(execute_command::<T>))
        .route("/responses/save", post(save_response::<T>))
        .route("/responses/remove", post(remove_response::<T>))
        .route("/generate", post(generate_reply::<T>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::<T>,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .with_state(state)
        .layer(cors)
}

async fn admin_auth<T: CrmBackend>(
    State(state): State<AppState<T>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let authorized = match request.headers().get("x-admin-password") {
        Some(auth_header) => auth_header.to_str().unwrap_or("") == state.password,
        None => return Err((StatusCode::UNAUTHORIZED, "Missing credentials".to_string())),
    };
    if !authorized {
        warn!(path = %request.uri().path(), "Rejected admin request");
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    }
    Ok(next.run(request).await)
}

fn internal_error(err: String) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err)
}

fn bad_request(err: SchedulingError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn conflict_response(result: ConflictResult) -> Response {
    let status = match result.reason {
        Some(ErrorKind::Overlap) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(result)).into_response()
}

fn backend_error(err: BackendError) -> Response {
    match err {
        BackendError::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
        BackendError::Rejected(result) => conflict_response(result),
        BackendError::Storage(message) => internal_error(message).into_response(),
    }
}

/// Bookings on `date` as the checker sees them. A stored appointment whose
/// times cannot be parsed is a server-side problem, not the caller's.
fn bookings_on<T: CrmBackend>(
    backend: &T,
    date: NaiveDate,
    exclude: Option<Uuid>,
) -> Result<Vec<Booking>, (StatusCode, String)> {
    let appointments = backend.appointments_for_date(date).map_err(internal_error)?;
    bookings_for(&appointments, date, exclude).map_err(|err| {
        error!(%err, %date, "Stored appointment has malformed times");
        internal_error(format!("Stored appointment is invalid: {err}"))
    })
}

async fn get_appointments<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<Appointment>>, (StatusCode, String)> {
    let appointments = match query.date {
        Some(date) => state.backend.appointments_for_date(date),
        None => state.backend.appointments(),
    };
    appointments.map(Json).map_err(internal_error)
}

async fn stream_appointments<T: CrmBackend>(
    State(state): State<AppState<T>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = state
        .backend
        .appointment_stream()
        .map(|appointments| Event::default().json_data(appointments));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn get_contact<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactLinks>, (StatusCode, String)> {
    match state.backend.appointment(id).map_err(internal_error)? {
        Some(appointment) => Ok(Json(ContactLinks::new(
            appointment.phone.as_deref(),
            appointment.email.as_deref(),
        ))),
        None => Err((
            StatusCode::NOT_FOUND,
            "Appointment does not exist".to_string(),
        )),
    }
}

async fn get_pipeline<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<StageGroup>>, (StatusCode, String)> {
    let appointments = state.backend.appointments().map_err(internal_error)?;
    Ok(Json(group_by_stage(&appointments, &query.search)))
}

async fn get_slots<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<SlotSuggestion>>, (StatusCode, String)> {
    let mut options = state.slot_options.clone();
    if let Some(duration) = query.duration {
        options = options.with_duration(duration).map_err(bad_request)?;
    }
    if let Some(policy) = query.policy {
        options = options.with_policy(policy);
    }

    let existing = bookings_on(&state.backend, query.date, None)?;
    let mut slots = options.suggest(query.date, &existing);
    if let Some(limit) = query.limit {
        slots.truncate(limit);
    }
    Ok(Json(slots))
}

async fn check_window<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<ConflictResult>, (StatusCode, String)> {
    let candidate = TimeWindow::parse(request.date, &request.start_time, &request.end_time)
        .map_err(bad_request)?;
    let existing = bookings_on(&state.backend, candidate.date, request.exclude_id)?;
    Ok(Json(conflict_checker::validate(&candidate, &existing)))
}

async fn create_appointment<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Response {
    if let Err(errors) = request.validate() {
        return (StatusCode::BAD_REQUEST, errors.to_string()).into_response();
    }
    let candidate =
        match TimeWindow::parse(request.scheduled_at, &request.start_time, &request.end_time) {
            Ok(candidate) => candidate,
            Err(err) => return bad_request(err).into_response(),
        };
    match state
        .backend
        .create_appointment(request.into_new_appointment(&candidate))
    {
        Ok(id) => {
            info!(%id, %candidate, "Appointment created");
            (StatusCode::OK, Json(CreatedResponse { id })).into_response()
        }
        Err(err) => backend_error(err),
    }
}

async fn execute_command<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Json(command): Json<AppointmentCommand>,
) -> Response {
    let id = command.id();
    match state.backend.execute(command) {
        Ok(()) => (StatusCode::OK, "Command executed successfully".to_string()).into_response(),
        Err(err) => {
            warn!(%id, %err, "Command not executed");
            backend_error(err)
        }
    }
}

async fn get_responses<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SavedResponse>>, (StatusCode, String)> {
    let responses = state.backend.responses().map_err(internal_error)?;
    Ok(Json(filter_responses(responses, &query.search)))
}

async fn save_response<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Json(request): Json<SaveResponseRequest>,
) -> Result<Json<SavedResponse>, (StatusCode, String)> {
    request
        .validate()
        .map_err(|errors| (StatusCode::BAD_REQUEST, errors.to_string()))?;

    let response = SavedResponse {
        id: request.id.unwrap_or_else(Uuid::new_v4),
        title: request.title,
        content: request.content,
        category: request.category,
        last_updated: Utc::now().timestamp_millis(),
    };
    state
        .backend
        .save_response(response.clone())
        .map_err(internal_error)?;
    Ok(Json(response))
}

async fn remove_response<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Json(request): Json<RemoveResponseRequest>,
) -> Response {
    match state.backend.remove_response(request.id) {
        Ok(()) => (StatusCode::OK, "Response removed successfully".to_string()).into_response(),
        Err(err) => backend_error(err),
    }
}

async fn generate_reply<T: CrmBackend>(
    State(state): State<AppState<T>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GeneratedText>, (StatusCode, String)> {
    match state.generator.generate(&request.prompt).await {
        Ok(generated) => Ok(Json(generated)),
        Err(err @ GenerationError::EmptyPrompt) => Err((StatusCode::BAD_REQUEST, err.to_string())),
        Err(err) => Err(internal_error(err.to_string())),
    }
}

async fn get_frontend<T: CrmBackend>(
    State(state): State<AppState<T>>,
) -> Result<Html<String>, (StatusCode, String)> {
    info!("get frontend called");

    match fs::read_to_string(&state.frontend_path).await {
        Ok(contents) => Ok(Html(
            contents.replace("{{website_title}}", &state.website_title),
        )),
        Err(e) => {
            let error_message = format!("Failed to read frontend file: {}", e);
            error!(path = %state.frontend_path.display(), "{error_message}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, error_message))
        }
    }
}

async fn get_admin_page() -> impl IntoResponse {
    info!("get admin_page called");
    StatusCode::OK
}
