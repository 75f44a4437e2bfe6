use crate::backend::SchedulingBackend;
use crate::configuration::Configuration;
use crate::coordinator::AvailabilityCoordinator;
use crate::error::{ErrorKind, SchedulingError};
use crate::query_filter::FilterCriteria;
use crate::types::{Booking, BookingRequest, SlotTime, Template, TimeSlot};
use axum::extract::{Path, Query, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState<T: SchedulingBackend, C: Configuration> {
    pub coordinator: AvailabilityCoordinator<T>,
    pub configuration: C,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SaveSlotsRequest {
    times: Vec<SlotTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoveSlotsRequest {
    times: Vec<SlotTime>,
    #[serde(default)]
    cascade: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TemplateRequest {
    name: String,
    slots: Vec<SlotTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApplyTemplateRequest {
    date: NaiveDate,
}

impl IntoResponse for SchedulingError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let trace_id = Uuid::new_v4();
        debug!(%trace_id, code = self.code(), status = status.as_u16(), "Request error");

        // storage details stay in the log
        let message = match self.kind() {
            ErrorKind::Persistence => "An internal server error occurred".to_string(),
            _ => self.to_string(),
        };
        let body = json!({
            "error": {
                "code": self.code(),
                "message": message,
                "trace_id": trace_id.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

pub fn create_app<T: SchedulingBackend, C: Configuration>(backend: T, configuration: C) -> Router {
    let coordinator = AvailabilityCoordinator::new(backend, configuration.week_start());
    let state = AppState {
        coordinator,
        configuration,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/slots/:date", get(get_slots::<T, C>))
        .route("/book", post(book::<T, C>));

    let admin = Router::new()
        .route("/slots/:date/save", post(save_slots::<T, C>))
        .route("/slots/:date/remove", post(remove_slots::<T, C>))
        .route("/bookings", get(get_bookings::<T, C>))
        .route("/bookings/:id", delete(remove_booking::<T, C>))
        .route(
            "/templates",
            get(get_templates::<T, C>).post(add_template::<T, C>),
        )
        .route(
            "/templates/:name",
            get(get_template::<T, C>).delete(remove_template::<T, C>),
        )
        .route("/templates/:name/apply", post(apply_template::<T, C>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::<T, C>,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .with_state(state)
        .layer(cors)
}

async fn admin_auth<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let Some(auth_header) = request.headers().get("x-admin-password") else {
        return Err((StatusCode::UNAUTHORIZED, "Missing credentials".to_string()));
    };
    if auth_header.to_str().unwrap_or("") != state.configuration.password() {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    }
    Ok(next.run(request).await)
}

async fn get_slots<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<Vec<TimeSlot>>, SchedulingError> {
    Ok(Json(state.coordinator.slots(date)?))
}

async fn save_slots<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(date): Path<NaiveDate>,
    Json(request): Json<SaveSlotsRequest>,
) -> Result<(StatusCode, String), SchedulingError> {
    state.coordinator.save_slots(date, request.times)?;
    Ok((StatusCode::OK, "Slots saved successfully".to_string()))
}

async fn remove_slots<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(date): Path<NaiveDate>,
    Json(request): Json<RemoveSlotsRequest>,
) -> Result<(StatusCode, String), SchedulingError> {
    state
        .coordinator
        .delete_slots(date, request.times, request.cascade)?;
    Ok((StatusCode::OK, "Slots removed successfully".to_string()))
}

async fn book<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>), SchedulingError> {
    let booking = state.coordinator.create_booking(request)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn get_bookings<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Query(criteria): Query<FilterCriteria>,
) -> Result<Json<Vec<Booking>>, SchedulingError> {
    Ok(Json(state.coordinator.bookings(&criteria)?))
}

async fn remove_booking<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, String), SchedulingError> {
    state.coordinator.delete_booking(id)?;
    Ok((StatusCode::OK, "Booking removed successfully".to_string()))
}

async fn get_templates<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<Json<Vec<Template>>, SchedulingError> {
    Ok(Json(state.coordinator.templates()?))
}

async fn get_template<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(name): Path<String>,
) -> Result<Json<Template>, SchedulingError> {
    Ok(Json(state.coordinator.template(&name)?))
}

async fn add_template<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Json(request): Json<TemplateRequest>,
) -> Result<(StatusCode, Json<Template>), SchedulingError> {
    let template = state
        .coordinator
        .create_template(&request.name, request.slots)?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn apply_template<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(name): Path<String>,
    Json(request): Json<ApplyTemplateRequest>,
) -> Result<Json<Vec<TimeSlot>>, SchedulingError> {
    Ok(Json(state.coordinator.apply_template(&name, request.date)?))
}

async fn remove_template<T: SchedulingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Path(name): Path<String>,
) -> Result<(StatusCode, String), SchedulingError> {
    state.coordinator.delete_template(&name)?;
    Ok((StatusCode::OK, "Template removed successfully".to_string()))
}
