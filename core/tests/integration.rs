//! End-to-end tests against the live mock backend.
//!
//! # Design
//! Starts the mock server on a random port in its own thread and runtime,
//! then drives `DentalApi` and `Dashboard` over real HTTP through
//! `ReqwestTransport`. Validates that request building, response
//! normalization and error reporting agree with an actual server.

use std::collections::BTreeMap;
use std::sync::Arc;

use dental_core::page::ids;
use dental_core::{
    ApiClient, ApiConfig, ApiError, AppointmentStatus, Dashboard, DashboardConfig, DentalApi,
    NewAppointment, NewPatient, NotificationKind, Page, PatientQuery, PatientUpdate,
    ReqwestTransport, ToastTray,
};

/// Start the mock backend and return the base URL the client should use.
fn start_mock(api_key: Option<&str>) -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let api_key = api_key.map(str::to_string);

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, api_key).await
        })
    });

    format!("http://{addr}/webhook")
}

fn api_for(config: ApiConfig, tray: &Arc<ToastTray>) -> DentalApi {
    DentalApi::new(ApiClient::new(
        config,
        Arc::new(ReqwestTransport::new()),
        tray.clone(),
    ))
}

fn dashboard_for(api: DentalApi) -> Dashboard {
    Dashboard::new(api, Arc::new(Page::new()), DashboardConfig::default()).with_default_bindings()
}

fn ana() -> NewPatient {
    NewPatient {
        nombre: " Ana Pérez ".to_string(),
        dni: "30111222".to_string(),
        telefono: "1155550000".to_string(),
        obra_social: "Otra".to_string(),
        otra_obra_social: Some("IOMA".to_string()),
        historia_clinica: "Primera consulta".to_string(),
        antecedentes: vec!["Diabetes".to_string(), "Asma".to_string()],
        ..NewPatient::default()
    }
}

#[tokio::test]
async fn patient_and_appointment_lifecycle() {
    let tray = Arc::new(ToastTray::new());
    let api = api_for(ApiConfig::new(&start_mock(None)), &tray);

    // Step 1: backend is up and empty.
    assert!(api.health_check().await);
    assert!(api.list_patients(&BTreeMap::new()).await.is_empty());

    // Step 2: create a patient.
    let ack = api.create_patient(&ana()).await.unwrap();
    assert!(ack.success);
    let id = ack.id.expect("created patient id");

    // Step 3: the same DNI is rejected with the backend's own message.
    let err = api.create_patient(&ana()).await.unwrap_err();
    assert_eq!(err, ApiError::Rejected("DNI duplicado".to_string()));
    let errors: Vec<_> = tray
        .history()
        .into_iter()
        .filter(|t| t.kind == NotificationKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "DNI duplicado");

    // Step 4: the nested backend shape normalizes into the canonical record.
    let patients = api.list_patients(&BTreeMap::new()).await;
    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0].nombre.as_deref(), Some("Ana Pérez"));
    assert_eq!(patients[0].obra_social.as_deref(), Some("IOMA"));
    assert_eq!(patients[0].antecedentes, vec!["Diabetes", "Asma"]);
    assert!(patients[0].fecha_registro.is_some());

    // Step 5: search goes through the query string.
    let mut filters = BTreeMap::new();
    filters.insert("buscar".to_string(), "pérez".to_string());
    assert_eq!(api.list_patients(&filters).await.len(), 1);
    filters.insert("buscar".to_string(), "nadie".to_string());
    assert!(api.list_patients(&filters).await.is_empty());

    // Step 6: update one field.
    let update = PatientUpdate {
        telefono: Some("1166660000".to_string()),
        ..PatientUpdate::default()
    };
    assert!(api.update_patient(&id, &update).await.unwrap().success);
    let fetched = api.get_patient(&id).await.unwrap();
    assert_eq!(fetched.telefono.as_deref(), Some("1166660000"));
    assert_eq!(fetched.dni.as_deref(), Some("30111222"));

    // Step 7: appointments.
    let turno = NewAppointment {
        fecha: "2025-08-22".to_string(),
        hora: "09:30".to_string(),
        paciente: "Ana Pérez".to_string(),
        motivo: "Control".to_string(),
        estado: None,
    };
    assert!(api.create_appointment(&turno).await.unwrap().success);
    let appointments = api.list_appointments().await;
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].estado, AppointmentStatus::Pending);
    assert_eq!(api.list_agenda().await, appointments);

    // Step 8: statistics and the weekly series.
    let stats = api.get_statistics().await;
    assert_eq!(stats.total_pacientes, 1);
    let series = api.weekly_appointments().await;
    assert_eq!(series.labels, vec!["2025-34"]);
    assert_eq!(series.data, vec![1.0]);

    // Step 9: delete, after which a read degrades to None and is reported.
    assert!(api.delete_patient(&id).await.unwrap().success);
    let before = tray.history().len();
    assert!(api.get_patient(&id).await.is_none());
    let history = tray.history();
    assert_eq!(history.len(), before + 1);
    assert_eq!(history[before].message, "Error del servidor (código 404)");
}

#[tokio::test]
async fn dashboard_renders_from_live_backend() {
    let tray = Arc::new(ToastTray::new());
    let dashboard = dashboard_for(api_for(ApiConfig::new(&start_mock(None)), &tray));
    let page = dashboard.page().clone();

    assert!(dashboard.startup().await);
    assert!(tray.history().is_empty());
    assert_eq!(page.get(ids::STAT_TOTAL).await.as_deref(), Some("0"));

    dashboard.submit_patient(&ana()).await.unwrap();
    assert!(page.is_enabled(ids::PATIENT_SUBMIT).await);
    assert_eq!(
        page.get(ids::PATIENT_COUNT).await.as_deref(),
        Some("1 paciente encontrado")
    );
    assert_eq!(page.get(ids::STAT_TOTAL).await.as_deref(), Some("1"));
    assert!(page.get(ids::RECENT_PATIENTS).await.unwrap().contains("Ana Pérez"));

    let turno = NewAppointment {
        fecha: "2025-08-22".to_string(),
        hora: "14:00".to_string(),
        paciente: "Ana Pérez".to_string(),
        ..NewAppointment::default()
    };
    dashboard.submit_appointment(&turno).await.unwrap();
    assert_eq!(page.get(ids::APPOINTMENT_COUNT).await.as_deref(), Some("1 turno"));
    assert!(page.get(ids::AGENDA).await.unwrap().contains("22/08/2025"));

    assert_eq!(dashboard.search_patients(&PatientQuery::term("nadie")).await, 0);
    assert_eq!(dashboard.clear_filters().await, 1);

    let kinds: Vec<_> = tray.history().into_iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![NotificationKind::Success, NotificationKind::Success]);
}

#[tokio::test]
async fn wrong_api_key_is_an_unreachable_backend() {
    let base = start_mock(Some("secret"));

    let tray = Arc::new(ToastTray::new());
    let dashboard = dashboard_for(api_for(ApiConfig::new(&base).with_api_key("wrong"), &tray));
    assert!(!dashboard.startup().await);
    let history = tray.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, NotificationKind::Warning);

    let tray = Arc::new(ToastTray::new());
    let api = api_for(ApiConfig::new(&base).with_api_key("secret"), &tray);
    assert!(api.health_check().await);
}

#[tokio::test]
async fn unreachable_backend_warns_once_and_renders_empty_states() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let tray = Arc::new(ToastTray::new());
    let dashboard = dashboard_for(api_for(
        ApiConfig::new(&format!("http://127.0.0.1:{port}/webhook")),
        &tray,
    ));

    assert!(!dashboard.startup().await);
    let history = tray.history();
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].message,
        "No se pudo conectar con el servidor. Se muestran datos vacíos."
    );
    assert_eq!(dashboard.page().get(ids::STAT_TOTAL).await.as_deref(), Some("0"));
    assert_eq!(
        dashboard.page().get(ids::PATIENT_COUNT).await.as_deref(),
        Some("0 pacientes encontrados")
    );
}
