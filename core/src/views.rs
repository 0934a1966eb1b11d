//! View binders: payload in, HTML fragment out.
//!
//! Each `render_*` function accepts the raw decoded payload for its view,
//! normalizes it through `model`, and renders the canonical records. A
//! payload that is absent, empty or not a list renders the view's own
//! empty-state text; nothing here can fail. All interpolated text is
//! HTML-escaped.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate};
use serde_json::Value;

use crate::model::{Appointment, AppointmentStatus, Patient, StatValue, Statistics, WeeklySeries};

/// The views the dashboard knows how to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum View {
    Stats,
    RecentPatients,
    PatientTable,
    Agenda,
    Appointments,
    WeeklyChart,
}

impl View {
    pub const ALL: [View; 6] = [
        View::Stats,
        View::RecentPatients,
        View::PatientTable,
        View::Agenda,
        View::Appointments,
        View::WeeklyChart,
    ];

    pub fn empty_text(&self) -> &'static str {
        match self {
            View::Stats => "Sin datos",
            View::RecentPatients => "No hay pacientes registrados.",
            View::PatientTable => "Sin resultados",
            View::Agenda => "No hay turnos en el período.",
            View::Appointments => "No hay turnos.",
            View::WeeklyChart => "Sin datos para el gráfico",
        }
    }

    pub fn error_text(&self) -> &'static str {
        match self {
            View::Stats => "Error al leer métricas",
            View::RecentPatients | View::PatientTable => "Error cargando pacientes",
            View::Agenda | View::Appointments => "Error cargando turnos",
            View::WeeklyChart => "Error al leer datos del gráfico",
        }
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn or_dash(value: &Option<String>) -> String {
    escape(value.as_deref().unwrap_or("—"))
}

pub fn empty_placeholder(view: View) -> String {
    format!(r#"<div class="empty-state">{}</div>"#, escape(view.empty_text()))
}

pub fn error_placeholder(view: View) -> String {
    format!(r#"<div class="alert alert-error">{}</div>"#, escape(view.error_text()))
}

/// Integer with es-AR thousands separators: `1234567` -> `"1.234.567"`.
pub fn format_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// `dd/mm/yyyy` for an ISO date or RFC 3339 timestamp.
pub fn format_date(value: Option<&str>) -> String {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return "No disponible".to_string();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%d/%m/%Y").to_string();
    }
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "Fecha inválida".to_string())
}

pub fn status_badge_class(status: &AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::Confirmed => "badge-confirmado",
        AppointmentStatus::Pending => "badge-pendiente",
        AppointmentStatus::Completed => "badge-completado",
        AppointmentStatus::Other(_) => "badge-otro",
    }
}

fn initial(nombre: &Option<String>) -> String {
    nombre
        .as_deref()
        .and_then(|n| n.chars().next())
        .unwrap_or('P')
        .to_uppercase()
        .collect()
}

fn plural(count: usize, singular: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {singular}s")
    }
}

/// Display text for each dashboard counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsView {
    pub total_pacientes: String,
    pub turnos_hoy: String,
    pub turnos_semana: String,
    pub ultimo_registro: String,
}

pub fn render_stats(payload: &Value) -> StatsView {
    stats_view(&Statistics::from_value(payload))
}

pub fn stats_view(stats: &Statistics) -> StatsView {
    StatsView {
        total_pacientes: format_count(stats.total_pacientes),
        turnos_hoy: format_count(stats.turnos_hoy),
        turnos_semana: format_count(stats.turnos_semana),
        ultimo_registro: match &stats.ultimo_registro {
            StatValue::Count(n) => format_count(*n),
            StatValue::Text(s) => escape(s),
        },
    }
}

/// The newest `limit` patients, newest first. The backend lists oldest first.
pub fn render_recent_patients(payload: &Value, limit: usize) -> String {
    recent_patients(&Patient::list_from_value(payload), limit)
}

pub fn recent_patients(patients: &[Patient], limit: usize) -> String {
    if patients.is_empty() {
        return empty_placeholder(View::RecentPatients);
    }
    patients
        .iter()
        .rev()
        .take(limit)
        .map(|p| {
            let fecha = p
                .fecha_registro
                .as_deref()
                .map(|f| format_date(Some(f)))
                .unwrap_or_default();
            format!(
                r#"<div class="recent-patient"><div class="avatar">{}</div><div><div class="name">{}</div><div class="obra-social">{}</div></div><div class="meta"><div class="dni">{}</div><div class="fecha">{}</div></div></div>"#,
                escape(&initial(&p.nombre)),
                escape(p.nombre.as_deref().unwrap_or("Sin nombre")),
                or_dash(&p.obra_social),
                or_dash(&p.dni),
                escape(&fecha),
            )
        })
        .collect()
}

/// Table rows for the patient list plus its count label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientTableView {
    pub rows: String,
    pub count: String,
}

pub fn render_patient_table(payload: &Value) -> PatientTableView {
    patient_table(&Patient::list_from_value(payload))
}

pub fn patient_table(patients: &[Patient]) -> PatientTableView {
    patient_table_on(patients, Local::now().date_naive())
}

/// "34 años", or a dash without a usable birth date.
pub fn format_age(edad: Option<u32>) -> String {
    match edad {
        Some(1) => "1 año".to_string(),
        Some(n) => format!("{n} años"),
        None => "—".to_string(),
    }
}

/// `patient_table` with ages computed as of `today`.
pub fn patient_table_on(patients: &[Patient], today: NaiveDate) -> PatientTableView {
    if patients.is_empty() {
        return PatientTableView {
            rows: format!(
                r#"<tr><td colspan="6" class="empty-state">{}</td></tr>"#,
                escape(View::PatientTable.empty_text())
            ),
            count: "0 pacientes".to_string(),
        };
    }
    let rows = patients
        .iter()
        .map(|p| {
            format!(
                r#"<tr data-id="{}"><td class="name">{}</td><td class="edad">{}</td><td>{}</td><td>{} · {}</td><td><span class="badge">{}</span></td><td>{}</td></tr>"#,
                escape(p.id.as_deref().unwrap_or("")),
                or_dash(&p.nombre),
                escape(&format_age(p.edad(today))),
                or_dash(&p.dni),
                or_dash(&p.telefono),
                or_dash(&p.email),
                or_dash(&p.obra_social),
                escape(&format_date(p.fecha_registro.as_deref())),
            )
        })
        .collect();
    PatientTableView {
        rows,
        count: plural(patients.len(), "paciente"),
    }
}

/// Appointments grouped by date (ascending), each group ordered by time.
///
/// Dates and times compare as strings; ISO dates and `HH:MM` times sort
/// correctly that way. Appointments without a date are grouped last.
pub fn group_by_date(appointments: &[Appointment]) -> Vec<(String, Vec<Appointment>)> {
    let mut groups: BTreeMap<(bool, String), Vec<Appointment>> = BTreeMap::new();
    for a in appointments {
        let key = match &a.fecha {
            Some(f) => (false, f.clone()),
            None => (true, String::new()),
        };
        groups.entry(key).or_default().push(a.clone());
    }
    groups
        .into_iter()
        .map(|((_, fecha), mut items)| {
            items.sort_by(|a, b| {
                a.hora
                    .as_deref()
                    .unwrap_or("")
                    .cmp(b.hora.as_deref().unwrap_or(""))
            });
            (fecha, items)
        })
        .collect()
}

pub fn render_agenda(payload: &Value) -> String {
    agenda(&Appointment::list_from_value(payload))
}

pub fn agenda(appointments: &[Appointment]) -> String {
    if appointments.is_empty() {
        return empty_placeholder(View::Agenda);
    }
    group_by_date(appointments)
        .into_iter()
        .map(|(fecha, items)| {
            let heading = if fecha.is_empty() {
                "Sin fecha".to_string()
            } else {
                format_date(Some(&fecha))
            };
            let rows: String = items
                .iter()
                .map(|t| {
                    format!(
                        r#"<tr><td class="hora">{}</td><td>{}</td><td>{}</td><td><span class="badge {}">{}</span></td></tr>"#,
                        or_dash(&t.hora),
                        or_dash(&t.paciente),
                        escape(t.motivo.as_deref().unwrap_or("")),
                        status_badge_class(&t.estado),
                        escape(t.estado.label()),
                    )
                })
                .collect();
            format!(
                r#"<div class="agenda-day" data-fecha="{}"><div class="agenda-date">{}</div><table><thead><tr><th>Hora</th><th>Paciente</th><th>Motivo</th><th>Estado</th></tr></thead><tbody>{}</tbody></table></div>"#,
                escape(&fecha),
                escape(&heading),
                rows
            )
        })
        .collect()
}

/// Appointment cards plus their count label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentListView {
    pub items: String,
    pub count: String,
}

pub fn render_appointment_list(payload: &Value) -> AppointmentListView {
    appointment_list(&Appointment::list_from_value(payload))
}

pub fn appointment_list(appointments: &[Appointment]) -> AppointmentListView {
    if appointments.is_empty() {
        return AppointmentListView {
            items: empty_placeholder(View::Appointments),
            count: "0 turnos".to_string(),
        };
    }
    let items = appointments
        .iter()
        .map(|t| {
            let fecha = t
                .fecha
                .as_deref()
                .map(|f| format_date(Some(f)))
                .unwrap_or_else(|| "—".to_string());
            format!(
                r#"<div class="turno"><div><div class="name">{}</div><div class="motivo">{}</div></div><div class="when">{} · {}</div><span class="badge {}">{}</span></div>"#,
                escape(t.paciente.as_deref().unwrap_or("Paciente")),
                escape(t.motivo.as_deref().unwrap_or("")),
                escape(&fecha),
                or_dash(&t.hora),
                status_badge_class(&t.estado),
                escape(t.estado.label()),
            )
        })
        .collect();
    AppointmentListView {
        items,
        count: plural(appointments.len(), "turno"),
    }
}

pub fn render_weekly_chart(payload: &Value) -> String {
    weekly_chart(&WeeklySeries::from_value(payload))
}

pub fn weekly_chart(series: &WeeklySeries) -> String {
    if series.labels.is_empty() {
        return empty_placeholder(View::WeeklyChart);
    }
    format!("Muestras: {}", series.labels.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stats_with_partial_datos() {
        let view = render_stats(&json!({"datos": {"totalPacientes": 42}}));
        assert_eq!(view.total_pacientes, "42");
        assert_eq!(view.turnos_hoy, "0");
        assert_eq!(view.turnos_semana, "0");
        assert_eq!(view.ultimo_registro, "0");
    }

    #[test]
    fn stats_use_thousands_separator() {
        let view = render_stats(&json!({"totalPacientes": 1234567, "ultimoRegistro": "<b>"}));
        assert_eq!(view.total_pacientes, "1.234.567");
        assert_eq!(view.ultimo_registro, "&lt;b&gt;");
        assert_eq!(format_count(-1000), "-1.000");
        assert_eq!(format_count(999), "999");
    }

    #[test]
    fn empty_payloads_render_placeholders() {
        for payload in [Value::Null, json!([]), json!({"unexpected": true}), json!("text")] {
            assert!(render_recent_patients(&payload, 5).contains("No hay pacientes registrados."));
            assert!(render_patient_table(&payload).rows.contains("Sin resultados"));
            assert!(render_agenda(&payload).contains("No hay turnos en el período."));
            assert!(render_appointment_list(&payload).items.contains("No hay turnos."));
        }
        assert_eq!(render_patient_table(&Value::Null).count, "0 pacientes");
    }

    #[test]
    fn both_patient_shapes_render_identically() {
        let nested = render_patient_table(&json!([{"fields": {"Nombre": "Ana", "DNI": "12345678"}}]));
        let flat = render_patient_table(&json!([{"nombre": "Ana", "dni": "12345678"}]));
        assert_eq!(nested, flat);
        assert!(flat.rows.contains("Ana"));
        assert_eq!(flat.count, "1 paciente");
    }

    #[test]
    fn recent_patients_shows_newest_first_and_limits() {
        let payload = json!([
            {"nombre": "Primero"}, {"nombre": "Segundo"}, {"nombre": "Tercero"}
        ]);
        let html = render_recent_patients(&payload, 2);
        let tercero = html.find("Tercero").unwrap();
        let segundo = html.find("Segundo").unwrap();
        assert!(tercero < segundo);
        assert!(!html.contains("Primero"));
    }

    #[test]
    fn agenda_sorts_times_within_a_date() {
        let html = render_agenda(&json!([
            {"fecha": "2025-08-22", "hora": "14:00", "paciente": "Tarde"},
            {"fecha": "2025-08-22", "hora": "09:30", "paciente": "Mañana"}
        ]));
        assert!(html.find("09:30").unwrap() < html.find("14:00").unwrap());
    }

    #[test]
    fn agenda_sorts_dates_ascending() {
        let html = render_agenda(&json!([
            {"fecha": "2025-09-01", "hora": "08:00"},
            {"fecha": "2025-08-30", "hora": "18:00"},
            {"hora": "07:00"}
        ]));
        let aug = html.find("30/08/2025").unwrap();
        let sep = html.find("01/09/2025").unwrap();
        let undated = html.find("Sin fecha").unwrap();
        assert!(aug < sep);
        assert!(sep < undated);
    }

    #[test]
    fn default_status_is_pendiente() {
        let list = render_appointment_list(&json!([{"paciente": "Ana", "fecha": "2025-08-22"}]));
        assert!(list.items.contains("badge-pendiente"));
        assert!(list.items.contains("22/08/2025"));
        assert_eq!(list.count, "1 turno");
    }

    #[test]
    fn text_is_escaped() {
        let table = render_patient_table(&json!([{"nombre": "<script>alert(1)</script>"}]));
        assert!(!table.rows.contains("<script>"));
        assert!(table.rows.contains("&lt;script&gt;"));
    }

    #[test]
    fn dates_format_or_fall_back() {
        assert_eq!(format_date(Some("2025-08-22")), "22/08/2025");
        assert_eq!(format_date(Some("2025-08-22T13:45:00.000Z")), "22/08/2025");
        assert_eq!(format_date(None), "No disponible");
        assert_eq!(format_date(Some("")), "No disponible");
        assert_eq!(format_date(Some("ayer")), "Fecha inválida");
    }

    #[test]
    fn weekly_chart_counts_samples() {
        assert_eq!(
            render_weekly_chart(&json!({"labels": ["a", "b", "c"], "data": [1, 2, 3]})),
            "Muestras: 3"
        );
        assert!(render_weekly_chart(&json!([])).contains("Sin datos"));
    }

    #[test]
    fn patient_table_shows_age_on_given_day() {
        let patients = Patient::list_from_value(&json!([
            {"nombre": "Ana", "fecha_nacimiento": "1990-08-22"},
            {"nombre": "Beto"}
        ]));
        let today = NaiveDate::from_ymd_opt(2025, 8, 21).unwrap();
        let table = patient_table_on(&patients, today);
        assert!(table.rows.contains(r#"<td class="edad">34 años</td>"#));
        assert!(table.rows.contains(r#"<td class="edad">—</td>"#));
        assert_eq!(format_age(Some(1)), "1 año");
    }

    #[test]
    fn error_placeholders_differ_from_empty_states() {
        for view in View::ALL {
            assert_ne!(error_placeholder(view), empty_placeholder(view));
        }
    }
}
