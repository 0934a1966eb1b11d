//! Error types for the dental backend client.
//!
//! # Design
//! Every failure of a backend call is classified into one variant before it
//! reaches a caller, so views and controllers never see a raw transport error.
//! `Timeout`, `Network`, `HttpStatus` and `Decode` cover the round-trip itself;
//! `Rejected` covers a well-formed acknowledgment whose `success` flag is
//! false. `user_message` gives the text shown to clinic staff.

use thiserror::Error;

/// Errors returned by `ApiClient` and the `DentalApi` wrappers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The configured timeout elapsed before the backend answered.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure: DNS, refused connection, reset, aborted body.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a status outside 200-299.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 2xx response whose body is not valid JSON.
    #[error("invalid JSON response: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The logical endpoint name has no configured path.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// The backend acknowledged the write with `success: false`.
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// The form failed client-side validation; nothing was sent.
    #[error("invalid form: {0}")]
    Invalid(#[from] ValidationError),
}

/// Client-side form checks, run before a write leaves the dashboard.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Todos los campos obligatorios deben completarse")]
    MissingFields(Vec<&'static str>),

    #[error("El DNI debe tener 7 u 8 dígitos")]
    InvalidDni,

    #[error("El email no es válido")]
    InvalidEmail,
}

impl ApiError {
    /// Spanish, user-facing text for the notification sink.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Timeout => {
                "El servidor tardó demasiado en responder. Intente nuevamente.".to_string()
            }
            ApiError::Network(_) => "Error de conexión con el servidor".to_string(),
            ApiError::HttpStatus { status, .. } => {
                format!("Error del servidor (código {status})")
            }
            ApiError::Decode(_) => "Respuesta inválida del servidor".to_string(),
            ApiError::Serialization(_) => "No se pudieron preparar los datos a enviar".to_string(),
            ApiError::UnknownEndpoint(name) => format!("Servicio no configurado: {name}"),
            ApiError::Rejected(message) => message.clone(),
            ApiError::Invalid(invalid) => invalid.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_shows_backend_message_verbatim() {
        let err = ApiError::Rejected("DNI duplicado".to_string());
        assert_eq!(err.user_message(), "DNI duplicado");
    }

    #[test]
    fn http_status_message_carries_code() {
        let err = ApiError::HttpStatus {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert!(err.user_message().contains("502"));
        assert_eq!(err.to_string(), "HTTP 502: <html>bad gateway</html>");
    }

    #[test]
    fn each_round_trip_failure_has_distinct_text() {
        let messages = [
            ApiError::Timeout.user_message(),
            ApiError::Network("refused".into()).user_message(),
            ApiError::Decode("eof".into()).user_message(),
        ];
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert_ne!(messages[0], messages[2]);
    }
}
