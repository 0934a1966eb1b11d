//! Canonical records for backend payloads.
//!
//! # Design
//! The backend has changed representation over time: a patient may arrive
//! flat (`{"nombre": ..}`) or Airtable-style (`{"fields": {"Nombre": ..}}`),
//! and lists may be bare arrays or wrapped. Every payload is normalized here,
//! right after decode, into one record type per entity so the views and the
//! filter only ever see a single shape. Normalization never fails: absent or
//! oddly-typed fields become `None` (or a zero default).

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Look up the first non-empty value among `flat` keys on the record itself,
/// then among `nested` keys inside its `fields` record.
fn pick(record: &Value, flat: &[&str], nested: &[&str]) -> Option<String> {
    let direct = flat.iter().find_map(|key| text(record.get(*key)));
    direct.or_else(|| {
        let fields = record.get("fields")?;
        nested.iter().find_map(|key| text(fields.get(*key)))
    })
}

/// Scalar JSON to display text. Empty strings, null, arrays and objects are
/// treated as absent.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn pick_list(record: &Value, flat: &str, nested: &str) -> Vec<String> {
    let value = record
        .get(flat)
        .or_else(|| record.get("fields").and_then(|f| f.get(nested)));
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// The items of a list payload: a bare array, or an array under `records`,
/// `datos` or `data`. Anything else is an empty list.
pub fn list_items(payload: &Value) -> &[Value] {
    if let Value::Array(items) = payload {
        return items;
    }
    ["records", "datos", "data"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub id: Option<String>,
    pub nombre: Option<String>,
    pub dni: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub obra_social: Option<String>,
    pub numero_afiliado: Option<String>,
    pub fecha_nacimiento: Option<String>,
    pub fecha_registro: Option<String>,
    pub historia_clinica: Option<String>,
    pub alergias: Option<String>,
    pub antecedentes: Vec<String>,
}

impl Patient {
    pub fn from_value(record: &Value) -> Self {
        Self {
            id: pick(record, &["id", "recordId"], &[]),
            nombre: pick(record, &["nombre"], &["Nombre"]),
            dni: pick(record, &["dni"], &["DNI"]),
            telefono: pick(record, &["telefono"], &["Tel", "Telefono"]),
            email: pick(record, &["email"], &["Email"]),
            obra_social: pick(record, &["obra_social"], &["Obra Social"]),
            numero_afiliado: pick(record, &["numero_afiliado"], &["Numero Afiliado"]),
            fecha_nacimiento: pick(record, &["fecha_nacimiento"], &["Fecha Nacimiento"]),
            fecha_registro: pick(record, &["fecha_registro"], &["Fecha Registro"]),
            historia_clinica: pick(record, &["historia_clinica"], &["Historia Clinica"]),
            alergias: pick(record, &["alergias"], &["Alergias"]),
            antecedentes: pick_list(record, "antecedentes", "Antecedentes"),
        }
    }

    pub fn list_from_value(payload: &Value) -> Vec<Self> {
        list_items(payload).iter().map(Self::from_value).collect()
    }

    pub fn edad(&self, today: NaiveDate) -> Option<u32> {
        self.fecha_nacimiento.as_deref().and_then(|f| edad(f, today))
    }

    /// Accepts a bare record or one wrapped in `datos`.
    pub fn single_from_value(payload: &Value) -> Option<Self> {
        let record = payload.get("datos").unwrap_or(payload);
        record.is_object().then(|| Self::from_value(record))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum AppointmentStatus {
    Confirmed,
    #[default]
    Pending,
    Completed,
    Other(String),
}

impl AppointmentStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("pendiente") => AppointmentStatus::Pending,
            Some("confirmado") => AppointmentStatus::Confirmed,
            Some("completado") => AppointmentStatus::Completed,
            Some(other) => AppointmentStatus::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AppointmentStatus::Confirmed => "confirmado",
            AppointmentStatus::Pending => "pendiente",
            AppointmentStatus::Completed => "completado",
            AppointmentStatus::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Appointment {
    /// ISO date, `YYYY-MM-DD`.
    pub fecha: Option<String>,
    /// `HH:MM`.
    pub hora: Option<String>,
    pub paciente: Option<String>,
    pub motivo: Option<String>,
    pub estado: AppointmentStatus,
}

impl Appointment {
    pub fn from_value(record: &Value) -> Self {
        Self {
            fecha: pick(record, &["fecha", "date"], &["Fecha"]),
            hora: pick(record, &["hora"], &["Hora"]),
            paciente: pick(
                record,
                &["paciente", "paciente_nombre", "titulo", "summary"],
                &["Paciente"],
            ),
            motivo: pick(record, &["motivo", "descripcion", "description"], &["Motivo"]),
            estado: AppointmentStatus::parse(pick(record, &["estado"], &["Estado"]).as_deref()),
        }
    }

    pub fn list_from_value(payload: &Value) -> Vec<Self> {
        list_items(payload).iter().map(Self::from_value).collect()
    }
}

/// A statistics cell. `ultimoRegistro` may be a count or a date string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StatValue {
    Count(i64),
    Text(String),
}

impl Default for StatValue {
    fn default() -> Self {
        StatValue::Count(0)
    }
}

impl StatValue {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(StatValue::Count)
                .unwrap_or_default(),
            Some(Value::String(s)) if !s.trim().is_empty() => match s.trim().parse::<i64>() {
                Ok(n) => StatValue::Count(n),
                Err(_) => StatValue::Text(s.trim().to_string()),
            },
            _ => StatValue::default(),
        }
    }

    fn as_count(&self) -> i64 {
        match self {
            StatValue::Count(n) => *n,
            StatValue::Text(_) => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_pacientes: i64,
    pub turnos_hoy: i64,
    pub turnos_semana: i64,
    pub ultimo_registro: StatValue,
}

impl Statistics {
    /// Accepts `{datos: {...}}` or the flat record; absent fields are zero.
    pub fn from_value(payload: &Value) -> Self {
        let d = payload.get("datos").unwrap_or(payload);
        Self {
            total_pacientes: StatValue::from_value(d.get("totalPacientes")).as_count(),
            turnos_hoy: StatValue::from_value(d.get("turnosHoy")).as_count(),
            turnos_semana: StatValue::from_value(d.get("turnosSemana")).as_count(),
            ultimo_registro: StatValue::from_value(d.get("ultimoRegistro")),
        }
    }
}

/// Appointments per week, for the dashboard chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklySeries {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

impl WeeklySeries {
    /// Accepts `{labels: [...], data: [...]}` or `[{semana|label, total|value}]`.
    pub fn from_value(payload: &Value) -> Self {
        if let (Some(labels), Some(data)) = (
            payload.get("labels").and_then(Value::as_array),
            payload.get("data").and_then(Value::as_array),
        ) {
            return Self {
                labels: labels.iter().map(|v| text(Some(v)).unwrap_or_default()).collect(),
                data: data.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect(),
            };
        }
        let rows = list_items(payload);
        Self {
            labels: rows
                .iter()
                .map(|r| pick(r, &["semana", "label"], &[]).unwrap_or_default())
                .collect(),
            data: rows
                .iter()
                .map(|r| {
                    r.get("total")
                        .or_else(|| r.get("value"))
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0)
                })
                .collect(),
        }
    }
}

/// Generic `{success, message}` acknowledgment of a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: Option<String>,
    /// Id of the created record, when the backend reports one.
    pub id: Option<String>,
}

impl Ack {
    /// A missing `success` flag counts as success; `error` is accepted as an
    /// alias of `message`.
    pub fn from_value(payload: &Value) -> Self {
        Self {
            success: payload
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            message: pick(payload, &["message", "error"], &[]),
            id: pick(payload, &["id"], &[]).or_else(|| {
                payload
                    .get("datos")
                    .and_then(|d| pick(d, &["id", "recordId"], &[]))
            }),
        }
    }
}

/// Form data for a new patient, as entered by staff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub nombre: String,
    #[serde(default)]
    pub dni: String,
    #[serde(default)]
    pub telefono: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub obra_social: String,
    /// Free text used when `obra_social` is "Otra".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otra_obra_social: Option<String>,
    #[serde(default)]
    pub numero_afiliado: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_nacimiento: Option<String>,
    #[serde(default)]
    pub historia_clinica: String,
    #[serde(default)]
    pub alergias: String,
    #[serde(default)]
    pub antecedentes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_registro: Option<String>,
}

impl NewPatient {
    /// The obra social to store: the free text when "Otra" was picked and
    /// filled in, the selection otherwise.
    pub fn resolved_obra_social(&self) -> &str {
        match self.otra_obra_social.as_deref().map(str::trim) {
            Some(otra) if self.obra_social.trim() == "Otra" && !otra.is_empty() => otra,
            _ => self.obra_social.trim(),
        }
    }

    /// Required fields are nombre, obra social and historia clínica. DNI and
    /// email are optional but must be well formed when given.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let missing: Vec<&'static str> = [
            ("nombre", self.nombre.trim()),
            ("obra_social", self.resolved_obra_social()),
            ("historia_clinica", self.historia_clinica.trim()),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let dni = self.dni.trim();
        if !dni.is_empty() && !matches_pattern(r"^[0-9]{7,8}$", dni) {
            return Err(ValidationError::InvalidDni);
        }
        let email = self.email.trim();
        if !email.is_empty() && !matches_pattern(r"^[^\s@]+@[^\s@]+\.[^\s@]+$", email) {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }
}

fn matches_pattern(pattern: &str, value: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

/// Age in whole years on `today` for a birth date starting `YYYY-MM-DD`.
/// `None` when the date is unparseable or in the future.
pub fn edad(fecha_nacimiento: &str, today: NaiveDate) -> Option<u32> {
    let born = NaiveDate::parse_from_str(fecha_nacimiento.trim().get(..10)?, "%Y-%m-%d").ok()?;
    let mut years = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Partial patient update; only present fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dni: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obra_social: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historia_clinica: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alergias: Option<String>,
}

/// Form data for a new appointment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub fecha: String,
    pub hora: String,
    pub paciente: String,
    #[serde(default)]
    pub motivo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado: Option<String>,
}

/// Shallow string map used when a payload needs extra derived keys.
pub(crate) fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_and_nested_patients_normalize_identically() {
        let nested = Patient::from_value(&json!({"fields": {"Nombre": "Ana", "DNI": "12345678"}}));
        let flat = Patient::from_value(&json!({"nombre": "Ana", "dni": "12345678"}));
        assert_eq!(nested, flat);
        assert_eq!(flat.nombre.as_deref(), Some("Ana"));
    }

    #[test]
    fn flat_field_wins_over_nested() {
        let p = Patient::from_value(&json!({
            "nombre": "Flat",
            "fields": {"Nombre": "Nested", "Obra Social": "OSDE"}
        }));
        assert_eq!(p.nombre.as_deref(), Some("Flat"));
        assert_eq!(p.obra_social.as_deref(), Some("OSDE"));
    }

    #[test]
    fn empty_strings_and_numbers() {
        let p = Patient::from_value(&json!({"nombre": "", "fields": {"Nombre": "Beto"}, "dni": 30111222}));
        assert_eq!(p.nombre.as_deref(), Some("Beto"));
        assert_eq!(p.dni.as_deref(), Some("30111222"));
    }

    #[test]
    fn telefono_accepts_short_airtable_key() {
        let p = Patient::from_value(&json!({"fields": {"Tel": "11-5555-0000"}}));
        assert_eq!(p.telefono.as_deref(), Some("11-5555-0000"));
    }

    #[test]
    fn antecedentes_from_array_or_delimited_string() {
        let a = Patient::from_value(&json!({"fields": {"Antecedentes": ["Diabetes", "Hipertensión"]}}));
        let b = Patient::from_value(&json!({"antecedentes": "Diabetes, Hipertensión"}));
        assert_eq!(a.antecedentes, b.antecedentes);
    }

    #[test]
    fn list_accepts_wrappers_and_rejects_non_sequences() {
        assert_eq!(Patient::list_from_value(&json!([{"nombre": "A"}])).len(), 1);
        assert_eq!(Patient::list_from_value(&json!({"records": [{}, {}]})).len(), 2);
        assert!(Patient::list_from_value(&json!({"nombre": "A"})).is_empty());
        assert!(Patient::list_from_value(&Value::Null).is_empty());
        assert!(Patient::list_from_value(&json!("pacientes")).is_empty());
    }

    #[test]
    fn appointment_aliases_and_status() {
        let a = Appointment::from_value(&json!({
            "date": "2025-08-22",
            "hora": "10:00",
            "paciente_nombre": "Ana",
            "estado": "Confirmado"
        }));
        assert_eq!(a.fecha.as_deref(), Some("2025-08-22"));
        assert_eq!(a.paciente.as_deref(), Some("Ana"));
        assert_eq!(a.estado, AppointmentStatus::Confirmed);

        let b = Appointment::from_value(&json!({"fecha": "2025-08-22"}));
        assert_eq!(b.estado, AppointmentStatus::Pending);

        let c = Appointment::from_value(&json!({"estado": "cancelado"}));
        assert_eq!(c.estado, AppointmentStatus::Other("cancelado".to_string()));
    }

    #[test]
    fn statistics_unwraps_datos_and_defaults_to_zero() {
        let s = Statistics::from_value(&json!({"datos": {"totalPacientes": 42}}));
        assert_eq!(s.total_pacientes, 42);
        assert_eq!(s.turnos_hoy, 0);
        assert_eq!(s.turnos_semana, 0);
        assert_eq!(s.ultimo_registro, StatValue::Count(0));

        let s = Statistics::from_value(&json!({"turnosHoy": "7", "ultimoRegistro": "2025-08-20"}));
        assert_eq!(s.turnos_hoy, 7);
        assert_eq!(s.ultimo_registro, StatValue::Text("2025-08-20".to_string()));

        assert_eq!(Statistics::from_value(&Value::Null), Statistics::default());
    }

    #[test]
    fn weekly_series_both_shapes() {
        let a = WeeklySeries::from_value(&json!({"labels": ["2025-33", "2025-34"], "data": [4, 12]}));
        let b = WeeklySeries::from_value(&json!([
            {"semana": "2025-33", "total": 4},
            {"label": "2025-34", "value": 12}
        ]));
        assert_eq!(a, b);
        assert_eq!(a.labels.len(), 2);
    }

    #[test]
    fn ack_defaults_to_success() {
        assert!(Ack::from_value(&json!({})).success);
        assert!(Ack::from_value(&Value::Null).success);

        let ack = Ack::from_value(&json!({"success": false, "message": "DNI duplicado"}));
        assert!(!ack.success);
        assert_eq!(ack.message.as_deref(), Some("DNI duplicado"));

        let ack = Ack::from_value(&json!({"success": false, "error": "sin permisos"}));
        assert_eq!(ack.message.as_deref(), Some("sin permisos"));
    }

    #[test]
    fn patient_update_serializes_only_present_fields() {
        let update = PatientUpdate {
            telefono: Some("11-4444-0000".to_string()),
            ..PatientUpdate::default()
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, json!({"telefono": "11-4444-0000"}));
    }

    fn valid_form() -> NewPatient {
        NewPatient {
            nombre: "Ana Pérez".to_string(),
            obra_social: "OSDE".to_string(),
            historia_clinica: "Control anual".to_string(),
            ..NewPatient::default()
        }
    }

    #[test]
    fn complete_form_is_valid() {
        assert_eq!(valid_form().validate(), Ok(()));
    }

    #[test]
    fn missing_required_fields_are_listed() {
        let form = NewPatient {
            nombre: "   ".to_string(),
            historia_clinica: String::new(),
            ..valid_form()
        };
        let err = form.validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["nombre", "historia_clinica"])
        );
        assert_eq!(err.to_string(), "Todos los campos obligatorios deben completarse");
    }

    #[test]
    fn otra_without_free_text_is_still_otra() {
        let form = NewPatient {
            obra_social: "Otra".to_string(),
            otra_obra_social: Some("  ".to_string()),
            ..valid_form()
        };
        assert_eq!(form.resolved_obra_social(), "Otra");
        assert!(form.validate().is_ok());

        let blank = NewPatient {
            obra_social: String::new(),
            ..valid_form()
        };
        assert_eq!(
            blank.validate(),
            Err(ValidationError::MissingFields(vec!["obra_social"]))
        );
    }

    #[test]
    fn dni_must_have_seven_or_eight_digits() {
        let with_dni = |dni: &str| NewPatient {
            dni: dni.to_string(),
            ..valid_form()
        };
        assert!(with_dni("1234567").validate().is_ok());
        assert!(with_dni("12345678").validate().is_ok());
        assert!(with_dni("").validate().is_ok());
        assert_eq!(with_dni("123456789").validate(), Err(ValidationError::InvalidDni));
        assert_eq!(with_dni("123456").validate(), Err(ValidationError::InvalidDni));
        assert_eq!(with_dni("12ab").validate(), Err(ValidationError::InvalidDni));
    }

    #[test]
    fn email_must_look_like_an_address() {
        let with_email = |email: &str| NewPatient {
            email: email.to_string(),
            ..valid_form()
        };
        assert!(with_email("ana@clinica.com.ar").validate().is_ok());
        assert_eq!(with_email("ana@clinica").validate(), Err(ValidationError::InvalidEmail));
        assert_eq!(with_email("ana clinica@x.com").validate(), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn edad_counts_completed_years() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(edad("1990-08-22", day(2025, 8, 21)), Some(34));
        assert_eq!(edad("1990-08-22", day(2025, 8, 22)), Some(35));
        assert_eq!(edad("1990-08-22", day(2025, 8, 23)), Some(35));
        assert_eq!(edad("1990-08-22T00:00:00.000Z", day(2025, 8, 23)), Some(35));
        assert_eq!(edad("2030-01-01", day(2025, 8, 23)), None);
        assert_eq!(edad("ayer", day(2025, 8, 23)), None);

        let patient = Patient::from_value(&json!({"fields": {"Fecha Nacimiento": "2000-01-01"}}));
        assert_eq!(patient.edad(day(2025, 1, 1)), Some(25));
        assert_eq!(Patient::default().edad(day(2025, 1, 1)), None);
    }
}
