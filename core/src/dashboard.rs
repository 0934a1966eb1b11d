//! Dashboard controller: which views refresh on which trigger, and how
//! submits and searches update the page.
//!
//! # Design
//! Views are bound to triggers explicitly at composition time. Firing a
//! trigger refreshes every bound view concurrently on the current task; each
//! refresh is independent, so two overlapping refreshes of the same view
//! race and the one that completes last owns the element.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join, join_all};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::DentalApi;
use crate::config::DashboardConfig;
use crate::error::ApiError;
use crate::filter::{result_count_label, PatientCache, PatientQuery};
use crate::model::{Ack, NewAppointment, NewPatient};
use crate::notify::NotificationKind;
use crate::page::{ids, Page};
use crate::views::{self, View};

/// Something that causes views to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    PageLoad,
    Sync,
    Timer,
    PatientCreated,
    AppointmentCreated,
}

pub struct Dashboard {
    api: DentalApi,
    page: Arc<Page>,
    cache: PatientCache,
    bindings: HashMap<Trigger, Vec<View>>,
    settings: DashboardConfig,
}

impl Dashboard {
    /// A dashboard with no bindings.
    /// Error notifications raised by `api` take the dashboard's configured
    /// duration too.
    pub fn new(api: DentalApi, page: Arc<Page>, settings: DashboardConfig) -> Self {
        Self {
            api: api.with_notification_duration(Duration::from_millis(settings.notification_ms)),
            page,
            cache: PatientCache::new(),
            bindings: HashMap::new(),
            settings,
        }
    }

    /// The bindings the clinic dashboard ships with.
    pub fn with_default_bindings(mut self) -> Self {
        for view in View::ALL {
            self.bind(Trigger::PageLoad, view);
        }
        self.bind(Trigger::Sync, View::Stats);
        self.bind(Trigger::Sync, View::RecentPatients);
        self.bind(Trigger::Sync, View::PatientTable);
        self.bind(Trigger::Sync, View::Agenda);
        self.bind(Trigger::Timer, View::Stats);
        self.bind(Trigger::Timer, View::Agenda);
        self.bind(Trigger::PatientCreated, View::PatientTable);
        self.bind(Trigger::PatientCreated, View::RecentPatients);
        self.bind(Trigger::PatientCreated, View::Stats);
        self.bind(Trigger::AppointmentCreated, View::Appointments);
        self.bind(Trigger::AppointmentCreated, View::Agenda);
        self
    }

    /// Refresh `view` whenever `trigger` fires. Binding twice is a no-op.
    pub fn bind(&mut self, trigger: Trigger, view: View) {
        let views = self.bindings.entry(trigger).or_default();
        if !views.contains(&view) {
            views.push(view);
        }
    }

    pub fn bound_views(&self, trigger: Trigger) -> &[View] {
        self.bindings.get(&trigger).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    pub fn api(&self) -> &DentalApi {
        &self.api
    }

    pub fn cache(&self) -> &PatientCache {
        &self.cache
    }

    fn notify(&self, message: &str, kind: NotificationKind) {
        let client = self.api.client();
        client
            .notifier()
            .notify(message, kind, client.notification_duration());
    }

    /// Refresh every view bound to `trigger`, concurrently. The patient
    /// table and the recent list share one fetch.
    pub async fn fire(&self, trigger: Trigger) {
        let views = self.bound_views(trigger);
        tracing::debug!(?trigger, views = views.len(), "firing trigger");
        let table = views.contains(&View::PatientTable);
        let recent = views.contains(&View::RecentPatients);
        let others = views
            .iter()
            .filter(|view| !matches!(view, View::PatientTable | View::RecentPatients))
            .map(|view| self.refresh(*view));
        join(self.refresh_patients(table, recent), join_all(others)).await;
    }

    /// Fetch and render one view.
    pub async fn refresh(&self, view: View) {
        match view {
            View::Stats => {
                let stats = views::stats_view(&self.api.get_statistics().await);
                self.page.set(ids::STAT_TOTAL, stats.total_pacientes).await;
                self.page.set(ids::STAT_TODAY, stats.turnos_hoy).await;
                self.page.set(ids::STAT_WEEK, stats.turnos_semana).await;
                self.page.set(ids::STAT_LAST, stats.ultimo_registro).await;
            }
            View::RecentPatients => self.refresh_patients(false, true).await,
            View::PatientTable => self.refresh_patients(true, false).await,
            View::Agenda => {
                let html = match self.api.fetch_agenda().await {
                    Ok(appointments) => views::agenda(&appointments),
                    Err(_) => views::error_placeholder(View::Agenda),
                };
                self.page.set(ids::AGENDA, html).await;
            }
            View::Appointments => match self.api.fetch_appointments().await {
                Ok(appointments) => {
                    let list = views::appointment_list(&appointments);
                    self.page.set(ids::APPOINTMENT_BODY, list.items).await;
                    self.page.set(ids::APPOINTMENT_COUNT, list.count).await;
                }
                Err(_) => {
                    let html = views::error_placeholder(View::Appointments);
                    self.page.set(ids::APPOINTMENT_BODY, html).await;
                    self.page.set(ids::APPOINTMENT_COUNT, "Error al cargar").await;
                }
            },
            View::WeeklyChart => {
                let series = self.api.weekly_appointments().await;
                self.page.set(ids::CHART_META, views::weekly_chart(&series)).await;
            }
        }
    }

    async fn refresh_patients(&self, table: bool, recent: bool) {
        if !table && !recent {
            return;
        }
        match self.api.fetch_patients(&BTreeMap::new()).await {
            Ok(patients) => {
                if recent {
                    let html = views::recent_patients(&patients, self.settings.recent_limit);
                    self.page.set(ids::RECENT_PATIENTS, html).await;
                }
                if table {
                    let rendered = views::patient_table(&patients);
                    let count = result_count_label(patients.len());
                    self.cache.replace(patients).await;
                    self.page.set(ids::PATIENT_BODY, rendered.rows).await;
                    self.page.set(ids::PATIENT_COUNT, count).await;
                }
            }
            Err(_) => {
                if recent {
                    let html = views::error_placeholder(View::RecentPatients);
                    self.page.set(ids::RECENT_PATIENTS, html).await;
                }
                if table {
                    let html = views::error_placeholder(View::PatientTable);
                    self.page.set(ids::PATIENT_BODY, html).await;
                    self.page.set(ids::PATIENT_COUNT, "Error al cargar").await;
                }
            }
        }
    }

    /// Empty-state rendering of every view, used when the backend is down.
    pub async fn render_defaults(&self) {
        let stats = views::stats_view(&Default::default());
        self.page.set(ids::STAT_TOTAL, stats.total_pacientes).await;
        self.page.set(ids::STAT_TODAY, stats.turnos_hoy).await;
        self.page.set(ids::STAT_WEEK, stats.turnos_semana).await;
        self.page.set(ids::STAT_LAST, stats.ultimo_registro).await;

        let table = views::patient_table(&[]);
        self.page.set(ids::RECENT_PATIENTS, views::recent_patients(&[], 0)).await;
        self.page.set(ids::PATIENT_BODY, table.rows).await;
        self.page.set(ids::PATIENT_COUNT, result_count_label(0)).await;
        self.page.set(ids::AGENDA, views::agenda(&[])).await;

        let list = views::appointment_list(&[]);
        self.page.set(ids::APPOINTMENT_BODY, list.items).await;
        self.page.set(ids::APPOINTMENT_COUNT, list.count).await;
        self.page
            .set(ids::CHART_META, views::weekly_chart(&Default::default()))
            .await;
    }

    /// Page load: check the backend and, if it answers, load every view.
    /// An unreachable backend is a single warning, never a hard failure.
    pub async fn startup(&self) -> bool {
        self.render_defaults().await;
        if !self.api.health_check().await {
            self.notify(
                "No se pudo conectar con el servidor. Se muestran datos vacíos.",
                NotificationKind::Warning,
            );
            return false;
        }
        tracing::info!("backend reachable, loading dashboard");
        self.fire(Trigger::PageLoad).await;
        true
    }

    /// User-initiated resynchronization; the only retry path there is.
    pub async fn sync(&self) -> bool {
        self.notify("Sincronización iniciada", NotificationKind::Info);
        if !self.api.health_check().await {
            self.notify(
                "No se pudo conectar con el servidor",
                NotificationKind::Warning,
            );
            return false;
        }
        self.fire(Trigger::Sync).await;
        true
    }

    /// Filter the cached patient list without touching the backend.
    pub async fn search_patients(&self, query: &PatientQuery) -> usize {
        let found = self.cache.filter(query).await;
        let table = views::patient_table(&found);
        self.page.set(ids::PATIENT_BODY, table.rows).await;
        self.page
            .set(ids::PATIENT_COUNT, result_count_label(found.len()))
            .await;
        found.len()
    }

    pub async fn clear_filters(&self) -> usize {
        self.search_patients(&PatientQuery::default()).await
    }

    /// Submit the new-patient form. An invalid form is a single warning and
    /// never reaches the backend. Otherwise the submit control is disabled
    /// for the duration of the write and re-enabled whatever the outcome.
    pub async fn submit_patient(&self, form: &NewPatient) -> Result<Ack, ApiError> {
        if let Err(invalid) = form.validate() {
            tracing::debug!(error = %invalid, "patient form rejected before submit");
            self.notify(&invalid.to_string(), NotificationKind::Warning);
            return Err(invalid.into());
        }

        self.page.set_enabled(ids::PATIENT_SUBMIT, false).await;
        let result = self.api.create_patient(form).await;
        self.page.set_enabled(ids::PATIENT_SUBMIT, true).await;

        if result.is_ok() {
            self.notify("Paciente creado exitosamente", NotificationKind::Success);
            self.fire(Trigger::PatientCreated).await;
        }
        result
    }

    pub async fn submit_appointment(&self, form: &NewAppointment) -> Result<Ack, ApiError> {
        self.page.set_enabled(ids::APPOINTMENT_SUBMIT, false).await;
        let result = self.api.create_appointment(form).await;
        self.page.set_enabled(ids::APPOINTMENT_SUBMIT, true).await;

        if result.is_ok() {
            self.notify("Turno creado", NotificationKind::Success);
            self.fire(Trigger::AppointmentCreated).await;
        }
        result
    }

    /// Fire `Trigger::Timer` every `refresh_interval_secs`. `None` when the
    /// interval is zero.
    pub fn spawn_periodic_refresh(self: &Arc<Self>) -> Option<PeriodicRefresh> {
        let secs = self.settings.refresh_interval_secs;
        if secs == 0 {
            return None;
        }
        let dashboard = Arc::clone(self);
        let (done, ticks) = watch::channel(0);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            // First tick completes immediately; startup already loaded everything.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                dashboard.fire(Trigger::Timer).await;
                done.send_modify(|n| *n += 1);
            }
        });
        Some(PeriodicRefresh { handle, ticks })
    }
}

/// The background timer loop. `ticks` counts completed timer refreshes, so a
/// caller can re-render after each one.
pub struct PeriodicRefresh {
    pub handle: JoinHandle<()>,
    pub ticks: watch::Receiver<u64>,
}
