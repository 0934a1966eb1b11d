//! Client-side search over the last fetched patient list.

use tokio::sync::RwLock;

use crate::model::Patient;

/// Search box state: a name fragment and an optional obra social filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientQuery {
    pub term: String,
    pub obra_social: Option<String>,
}

impl PatientQuery {
    pub fn term(term: &str) -> Self {
        Self {
            term: term.to_string(),
            obra_social: None,
        }
    }

    pub fn with_obra_social(mut self, obra_social: &str) -> Self {
        self.obra_social = Some(obra_social.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.term.trim().is_empty() && self.obra_social.as_deref().map_or(true, str::is_empty)
    }
}

/// Patients matching `query`, in their original order.
///
/// The term matches case-insensitively anywhere in the name; the obra social
/// must match exactly. An empty query returns the whole list.
pub fn filter_patients(patients: &[Patient], query: &PatientQuery) -> Vec<Patient> {
    let term = query.term.trim().to_lowercase();
    let obra = query.obra_social.as_deref().filter(|o| !o.is_empty());

    patients
        .iter()
        .filter(|p| {
            term.is_empty()
                || p.nombre
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&term))
        })
        .filter(|p| obra.map_or(true, |o| p.obra_social.as_deref() == Some(o)))
        .cloned()
        .collect()
}

/// "3 pacientes encontrados" / "1 paciente encontrado".
pub fn result_count_label(count: usize) -> String {
    if count == 1 {
        "1 paciente encontrado".to_string()
    } else {
        format!("{count} pacientes encontrados")
    }
}

/// The last successfully fetched patient list. Replaced wholesale on every
/// successful fetch; filters only read it.
#[derive(Debug, Default)]
pub struct PatientCache {
    patients: RwLock<Vec<Patient>>,
}

impl PatientCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, patients: Vec<Patient>) {
        *self.patients.write().await = patients;
    }

    pub async fn filter(&self, query: &PatientQuery) -> Vec<Patient> {
        filter_patients(&self.patients.read().await, query)
    }

    pub async fn len(&self) -> usize {
        self.patients.read().await.len()
    }
}
