//! Per-endpoint wrappers over `ApiClient`.
//!
//! # Design
//! Reads degrade: when a read fails the error has already been reported by
//! `ApiClient::call`, so the wrapper logs it and returns a safe default (an
//! empty list, `None`, zeroed statistics) that renders as the view's empty
//! state. Writes re-raise: the caller must not assume the write happened.
//! A write whose acknowledgment says `success: false` becomes
//! `ApiError::Rejected` and is reported once with the backend's own message.
//!
//! Writes carry no idempotency key; a retried submit may create a duplicate
//! unless the backend rejects it (e.g. by DNI).

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::client::{ApiClient, RequestDescriptor};
use crate::config::endpoints;
use crate::error::ApiError;
use crate::model::{
    to_object, Ack, Appointment, NewAppointment, NewPatient, Patient, PatientUpdate, Statistics,
    WeeklySeries,
};
use crate::notify::NotificationKind;

/// Typed operations against the dental webhook backend.
#[derive(Clone)]
pub struct DentalApi {
    client: ApiClient,
}

impl DentalApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn with_notification_duration(self, duration: Duration) -> Self {
        Self {
            client: self.client.with_notification_duration(duration),
        }
    }

    // ---------------------------------------------------------------------
    // Patients
    // ---------------------------------------------------------------------

    /// Patient list, failing on error so the caller can show an error state.
    pub async fn fetch_patients(
        &self,
        filters: &BTreeMap<String, String>,
    ) -> Result<Vec<Patient>, ApiError> {
        let mut descriptor = RequestDescriptor::get();
        descriptor.query = filters.clone();
        let payload = self.client.call(endpoints::PATIENTS, descriptor).await?;
        Ok(Patient::list_from_value(&payload))
    }

    pub async fn list_patients(&self, filters: &BTreeMap<String, String>) -> Vec<Patient> {
        degrade("list_patients", self.fetch_patients(filters).await)
    }

    pub async fn get_patient(&self, id: &str) -> Option<Patient> {
        let result = self
            .client
            .call(endpoints::PATIENTS, RequestDescriptor::get().with_id(id))
            .await
            .map(|payload| Patient::single_from_value(&payload));
        degrade("get_patient", result)
    }

    pub async fn create_patient(&self, patient: &NewPatient) -> Result<Ack, ApiError> {
        let body = patient_payload(patient, Utc::now())?;
        self.write(endpoints::PATIENTS, RequestDescriptor::post(body), "Error al crear paciente")
            .await
    }

    pub async fn update_patient(&self, id: &str, update: &PatientUpdate) -> Result<Ack, ApiError> {
        let body = json_body(update)?;
        self.write(
            endpoints::PATIENTS,
            RequestDescriptor::put(body).with_id(id),
            "Error al actualizar paciente",
        )
        .await
    }

    pub async fn delete_patient(&self, id: &str) -> Result<Ack, ApiError> {
        self.write(
            endpoints::PATIENTS,
            RequestDescriptor::delete().with_id(id),
            "Error al eliminar paciente",
        )
        .await
    }

    // ---------------------------------------------------------------------
    // Calendar and appointments
    // ---------------------------------------------------------------------

    pub async fn list_events(&self, filters: &BTreeMap<String, String>) -> Vec<Appointment> {
        let mut descriptor = RequestDescriptor::get();
        descriptor.query = filters.clone();
        self.read_appointments(endpoints::CALENDAR, descriptor).await
    }

    pub async fn create_event(&self, appointment: &NewAppointment) -> Result<Ack, ApiError> {
        let body = appointment_payload(appointment)?;
        self.write(endpoints::CALENDAR, RequestDescriptor::post(body), "Error al crear evento")
            .await
    }

    pub async fn fetch_agenda(&self) -> Result<Vec<Appointment>, ApiError> {
        let payload = self.client.call(endpoints::AGENDA, RequestDescriptor::get()).await?;
        Ok(Appointment::list_from_value(&payload))
    }

    pub async fn list_agenda(&self) -> Vec<Appointment> {
        degrade("list_agenda", self.fetch_agenda().await)
    }

    pub async fn fetch_appointments(&self) -> Result<Vec<Appointment>, ApiError> {
        let payload = self
            .client
            .call(endpoints::APPOINTMENTS, RequestDescriptor::get())
            .await?;
        Ok(Appointment::list_from_value(&payload))
    }

    pub async fn list_appointments(&self) -> Vec<Appointment> {
        degrade("list_appointments", self.fetch_appointments().await)
    }

    pub async fn create_appointment(&self, appointment: &NewAppointment) -> Result<Ack, ApiError> {
        let body = appointment_payload(appointment)?;
        self.write(
            endpoints::CREATE_APPOINTMENT,
            RequestDescriptor::post(body),
            "Error al crear turno",
        )
        .await
    }

    // ---------------------------------------------------------------------
    // Dashboard
    // ---------------------------------------------------------------------

    pub async fn get_statistics(&self) -> Statistics {
        let result = self
            .client
            .call(endpoints::STATISTICS, RequestDescriptor::get())
            .await
            .map(|payload| Statistics::from_value(&payload));
        degrade("get_statistics", result)
    }

    pub async fn weekly_appointments(&self) -> WeeklySeries {
        let result = self
            .client
            .call(endpoints::WEEKLY_APPOINTMENTS, RequestDescriptor::get())
            .await
            .map(|payload| WeeklySeries::from_value(&payload));
        degrade("weekly_appointments", result)
    }

    /// Liveness check. Any failure is `false`; the sink is not notified, so
    /// the caller decides how to report an unreachable backend.
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .call_unreported(endpoints::HEALTH, RequestDescriptor::get())
            .await
        {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "health check failed");
                false
            }
        }
    }

    async fn read_appointments(
        &self,
        endpoint: &str,
        descriptor: RequestDescriptor,
    ) -> Vec<Appointment> {
        let result = self
            .client
            .call(endpoint, descriptor)
            .await
            .map(|payload| Appointment::list_from_value(&payload));
        degrade(endpoint, result)
    }

    async fn write(
        &self,
        endpoint: &str,
        descriptor: RequestDescriptor,
        fallback_message: &str,
    ) -> Result<Ack, ApiError> {
        let payload = self.client.call(endpoint, descriptor).await?;
        let ack = Ack::from_value(&payload);
        if ack.success {
            return Ok(ack);
        }

        let err = ApiError::Rejected(
            ack.message
                .clone()
                .unwrap_or_else(|| fallback_message.to_string()),
        );
        tracing::warn!(endpoint, error = %err, "write rejected by backend");
        self.client.notifier().notify(
            &err.user_message(),
            NotificationKind::Error,
            self.client.notification_duration(),
        );
        Err(err)
    }
}

fn degrade<T: Default>(operation: &str, result: Result<T, ApiError>) -> T {
    result.unwrap_or_else(|err| {
        tracing::debug!(operation, error = %err, "read degraded to default");
        T::default()
    })
}

fn json_body<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn trimmed(s: &str) -> Value {
    Value::String(s.trim().to_string())
}

/// Body for a new patient: trimmed fields, "Otra" obra social resolved to its
/// free text, antecedentes joined, registration timestamp stamped if absent.
pub fn patient_payload(patient: &NewPatient, now: chrono::DateTime<Utc>) -> Result<Value, ApiError> {
    let mut body = to_object(patient).map_err(|e| ApiError::Serialization(e.to_string()))?;

    for value in body.values_mut() {
        if let Value::String(s) = value {
            *s = s.trim().to_string();
        }
    }

    body.insert(
        "obra_social".to_string(),
        trimmed(patient.resolved_obra_social()),
    );
    body.remove("otra_obra_social");

    let antecedentes: Vec<&str> = patient
        .antecedentes
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    body.insert("antecedentes".to_string(), Value::String(antecedentes.join(", ")));

    let fecha_registro = patient
        .fecha_registro
        .clone()
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));
    body.insert("fecha_registro".to_string(), Value::String(fecha_registro));

    Ok(Value::Object(body))
}

/// Body for a new appointment; `estado` defaults to "pendiente".
pub fn appointment_payload(appointment: &NewAppointment) -> Result<Value, ApiError> {
    let mut body = to_object(appointment).map_err(|e| ApiError::Serialization(e.to_string()))?;
    for value in body.values_mut() {
        if let Value::String(s) = value {
            *s = s.trim().to_string();
        }
    }
    let estado = appointment
        .estado
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or("pendiente");
    body.insert("estado".to_string(), trimmed(estado));
    Ok(Value::Object(body))
}
