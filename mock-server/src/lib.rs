//! In-memory stand-in for the clinic's webhook backend.
//!
//! Serves the same logical endpoints the dashboard calls. Patients are kept
//! and returned in the nested Airtable shape (`{id, fields: {...}}`) while
//! appointments are flat, so clients exercise both payload shapes. Writes
//! answer `200 {success, message}` even when rejected, as the real
//! automation workflows do.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Datelike, Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Patient fields as the backend stores them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientFields {
    #[serde(rename = "Nombre", skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(rename = "DNI", skip_serializing_if = "Option::is_none")]
    pub dni: Option<String>,
    #[serde(rename = "Telefono", skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(rename = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "Obra Social", skip_serializing_if = "Option::is_none")]
    pub obra_social: Option<String>,
    #[serde(rename = "Numero Afiliado", skip_serializing_if = "Option::is_none")]
    pub numero_afiliado: Option<String>,
    #[serde(rename = "Fecha Nacimiento", skip_serializing_if = "Option::is_none")]
    pub fecha_nacimiento: Option<String>,
    #[serde(rename = "Historia Clinica", skip_serializing_if = "Option::is_none")]
    pub historia_clinica: Option<String>,
    #[serde(rename = "Alergias", skip_serializing_if = "Option::is_none")]
    pub alergias: Option<String>,
    #[serde(rename = "Antecedentes", skip_serializing_if = "Option::is_none")]
    pub antecedentes: Option<String>,
    #[serde(rename = "Fecha Registro", skip_serializing_if = "Option::is_none")]
    pub fecha_registro: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    pub id: String,
    pub fields: PatientFields,
}

/// Flat patient payload sent by the dashboard on create and update.
#[derive(Debug, Default, Deserialize)]
pub struct PatientInput {
    pub nombre: Option<String>,
    pub dni: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub obra_social: Option<String>,
    pub numero_afiliado: Option<String>,
    pub fecha_nacimiento: Option<String>,
    pub historia_clinica: Option<String>,
    pub alergias: Option<String>,
    pub antecedentes: Option<String>,
    pub fecha_registro: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub fecha: String,
    pub hora: String,
    pub paciente: String,
    #[serde(default)]
    pub motivo: String,
    #[serde(default)]
    pub estado: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentInput {
    pub fecha: Option<String>,
    pub hora: Option<String>,
    pub paciente: Option<String>,
    pub motivo: Option<String>,
    pub estado: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientSearch {
    pub buscar: Option<String>,
    pub obra_social: Option<String>,
}

#[derive(Debug, Default)]
pub struct Store {
    pub patients: Vec<PatientRecord>,
    pub appointments: Vec<Appointment>,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub api_key: Option<String>,
}

pub fn app() -> Router {
    app_with_key(None)
}

/// Router that requires `X-API-KEY` to equal `api_key` when one is given.
pub fn app_with_key(api_key: Option<String>) -> Router {
    app_with_state(AppState {
        db: Arc::new(RwLock::new(Store::default())),
        api_key,
    })
}

/// Routes are served both at the root and under `/webhook`, the prefix the
/// dashboard's default base URL carries.
pub fn app_with_state(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        .route("/pacientes", get(list_patients).post(create_patient))
        .route(
            "/pacientes/{id}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/estadisticas", get(statistics))
        .route("/agenda", get(list_appointments))
        .route("/calendario", get(list_appointments).post(create_appointment))
        .route("/turnos", get(list_appointments))
        .route("/crear-turno", axum::routing::post(create_appointment))
        .route("/turnos-por-semana", get(weekly_appointments));
    Router::new()
        .merge(routes.clone())
        .nest("/webhook", routes)
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

/// Serve a fresh store on `listener`, requiring `api_key` when one is given.
pub async fn run(listener: TcpListener, api_key: Option<String>) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_key(api_key)).await
}

fn ack(success: bool, message: &str) -> Json<Value> {
    Json(json!({ "success": success, "message": message }))
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, ack(false, message)).into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.api_key {
        let given = request
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            tracing::warn!(path = %request.uri().path(), "rejected request without valid API key");
            return (StatusCode::UNAUTHORIZED, ack(false, "API key inválida")).into_response();
        }
    }
    next.run(request).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_patients(
    State(state): State<AppState>,
    Query(search): Query<PatientSearch>,
) -> Json<Vec<PatientRecord>> {
    let store = state.db.read().await;
    let term = search.buscar.unwrap_or_default().to_lowercase();
    let obra = non_empty(search.obra_social);
    Json(
        store
            .patients
            .iter()
            .filter(|p| {
                term.is_empty()
                    || p.fields
                        .nombre
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&term))
            })
            .filter(|p| obra.is_none() || p.fields.obra_social == obra)
            .cloned()
            .collect(),
    )
}

async fn create_patient(State(state): State<AppState>, Json(input): Json<PatientInput>) -> Json<Value> {
    let Some(nombre) = non_empty(input.nombre) else {
        return ack(false, "El nombre es obligatorio");
    };
    let dni = non_empty(input.dni);

    let mut store = state.db.write().await;
    if dni.is_some() && store.patients.iter().any(|p| p.fields.dni == dni) {
        return ack(false, "DNI duplicado");
    }

    let record = PatientRecord {
        id: format!("rec{}", Uuid::new_v4().simple()),
        fields: PatientFields {
            nombre: Some(nombre),
            dni,
            telefono: non_empty(input.telefono),
            email: non_empty(input.email),
            obra_social: non_empty(input.obra_social),
            numero_afiliado: non_empty(input.numero_afiliado),
            fecha_nacimiento: non_empty(input.fecha_nacimiento),
            historia_clinica: non_empty(input.historia_clinica),
            alergias: non_empty(input.alergias),
            antecedentes: non_empty(input.antecedentes),
            fecha_registro: non_empty(input.fecha_registro)
                .or_else(|| Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))),
        },
    };
    tracing::debug!(id = %record.id, "patient created");
    let id = record.id.clone();
    store.patients.push(record);
    Json(json!({ "success": true, "message": "Paciente creado", "id": id }))
}

async fn get_patient(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let store = state.db.read().await;
    match store.patients.iter().find(|p| p.id == id) {
        Some(p) => Json(p.clone()).into_response(),
        None => not_found("Paciente no encontrado"),
    }
}

async fn update_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<PatientInput>,
) -> Response {
    let mut store = state.db.write().await;
    let Some(record) = store.patients.iter_mut().find(|p| p.id == id) else {
        return not_found("Paciente no encontrado");
    };
    let f = &mut record.fields;
    let updates = [
        (&mut f.nombre, input.nombre),
        (&mut f.dni, input.dni),
        (&mut f.telefono, input.telefono),
        (&mut f.email, input.email),
        (&mut f.obra_social, input.obra_social),
        (&mut f.historia_clinica, input.historia_clinica),
        (&mut f.alergias, input.alergias),
    ];
    for (field, value) in updates {
        if let Some(value) = non_empty(value) {
            *field = Some(value);
        }
    }
    ack(true, "Paciente actualizado").into_response()
}

async fn delete_patient(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let mut store = state.db.write().await;
    let before = store.patients.len();
    store.patients.retain(|p| p.id != id);
    if store.patients.len() == before {
        return not_found("Paciente no encontrado");
    }
    ack(true, "Paciente eliminado").into_response()
}

async fn list_appointments(State(state): State<AppState>) -> Json<Vec<Appointment>> {
    Json(state.db.read().await.appointments.clone())
}

async fn create_appointment(
    State(state): State<AppState>,
    Json(input): Json<AppointmentInput>,
) -> Json<Value> {
    let (Some(fecha), Some(hora), Some(paciente)) = (
        non_empty(input.fecha),
        non_empty(input.hora),
        non_empty(input.paciente),
    ) else {
        return ack(false, "Faltan datos del turno");
    };
    if NaiveDate::parse_from_str(&fecha, "%Y-%m-%d").is_err() {
        return ack(false, "Fecha inválida");
    }

    let appointment = Appointment {
        id: Uuid::new_v4().to_string(),
        fecha,
        hora,
        paciente,
        motivo: non_empty(input.motivo).unwrap_or_default(),
        estado: non_empty(input.estado).unwrap_or_else(|| "pendiente".to_string()),
    };
    let id = appointment.id.clone();
    state.db.write().await.appointments.push(appointment);
    Json(json!({ "success": true, "message": "Turno creado", "id": id }))
}

async fn statistics(State(state): State<AppState>) -> Json<Value> {
    let store = state.db.read().await;
    let today = Local::now().date_naive();
    let dates: Vec<NaiveDate> = store
        .appointments
        .iter()
        .filter_map(|a| NaiveDate::parse_from_str(&a.fecha, "%Y-%m-%d").ok())
        .collect();
    let turnos_hoy = dates.iter().filter(|d| **d == today).count();
    let turnos_semana = dates
        .iter()
        .filter(|d| **d >= today && (**d - today).num_days() < 7)
        .count();
    let ultimo_registro = store
        .patients
        .last()
        .and_then(|p| p.fields.fecha_registro.clone())
        .map(Value::String)
        .unwrap_or_else(|| json!(0));

    Json(json!({
        "datos": {
            "totalPacientes": store.patients.len(),
            "turnosHoy": turnos_hoy,
            "turnosSemana": turnos_semana,
            "ultimoRegistro": ultimo_registro,
        }
    }))
}

async fn weekly_appointments(State(state): State<AppState>) -> Json<Vec<Value>> {
    let store = state.db.read().await;
    let mut weeks: std::collections::BTreeMap<String, u64> = std::collections::BTreeMap::new();
    for date in store
        .appointments
        .iter()
        .filter_map(|a| NaiveDate::parse_from_str(&a.fecha, "%Y-%m-%d").ok())
    {
        let week = date.iso_week();
        *weeks
            .entry(format!("{}-{:02}", week.year(), week.week()))
            .or_default() += 1;
    }
    Json(
        weeks
            .into_iter()
            .map(|(semana, total)| json!({ "semana": semana, "total": total }))
            .collect(),
    )
}
