//! Client core for the dental clinic dashboard.
//!
//! # Overview
//! Talks to a webhook backend that owns all patient and appointment data,
//! and turns its loosely-typed JSON into rendered dashboard fragments.
//! Nothing is persisted locally; the backend is the single source of truth.
//!
//! # Design
//! - `ApiClient` builds `HttpRequest`s and parses `HttpResponse`s as plain
//!   data; a `Transport` does the I/O, bounded by a tokio timeout.
//! - Every failure is classified (`ApiError`) and reported once through a
//!   `NotificationSink`.
//! - `DentalApi` wraps the endpoints: reads degrade to defaults, writes
//!   re-raise.
//! - `model` normalizes every payload shape into one canonical record per
//!   entity; `views` renders only canonical records.
//! - `Dashboard` binds views to triggers and renders into a `Page`.

pub mod api;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod http;
pub mod model;
pub mod notify;
pub mod page;
pub mod transport;
pub mod views;

pub use api::DentalApi;
pub use client::{ApiClient, RequestDescriptor};
pub use config::{ApiConfig, Config, ConfigError, DashboardConfig};
pub use dashboard::{Dashboard, PeriodicRefresh, Trigger};
pub use error::{ApiError, ValidationError};
pub use filter::{filter_patients, PatientCache, PatientQuery};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use model::{
    Ack, Appointment, AppointmentStatus, NewAppointment, NewPatient, Patient, PatientUpdate,
    StatValue, Statistics, WeeklySeries,
};
pub use notify::{NotificationKind, NotificationSink, ToastTray, TracingSink};
pub use page::Page;
pub use transport::{ReqwestTransport, Transport};
pub use views::View;
