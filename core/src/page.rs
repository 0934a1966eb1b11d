//! In-memory document model the dashboard renders into.
//!
//! Each element id holds the last fragment written to it. Concurrent
//! refreshes of the same element are not coordinated: whichever write
//! completes last is what the page shows.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

/// Element ids the dashboard writes to.
pub mod ids {
    pub const STAT_TOTAL: &str = "stat-total";
    pub const STAT_TODAY: &str = "stat-hoy";
    pub const STAT_WEEK: &str = "stat-semana";
    pub const STAT_LAST: &str = "stat-ultimo";
    pub const RECENT_PATIENTS: &str = "recent-list";
    pub const PATIENT_BODY: &str = "pac-body";
    pub const PATIENT_COUNT: &str = "pac-count";
    pub const PATIENT_SUBMIT: &str = "pac-submit";
    pub const AGENDA: &str = "agenda-grid";
    pub const APPOINTMENT_BODY: &str = "turnos-body";
    pub const APPOINTMENT_COUNT: &str = "turnos-count";
    pub const APPOINTMENT_SUBMIT: &str = "turno-submit";
    pub const CHART_META: &str = "chart-meta";
}

#[derive(Debug, Default)]
struct PageState {
    elements: HashMap<String, String>,
    disabled: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct Page {
    state: RwLock<PageState>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, id: &str, fragment: impl Into<String>) {
        self.state
            .write()
            .await
            .elements
            .insert(id.to_string(), fragment.into());
    }

    pub async fn get(&self, id: &str) -> Option<String> {
        self.state.read().await.elements.get(id).cloned()
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) {
        let mut state = self.state.write().await;
        if enabled {
            state.disabled.remove(id);
        } else {
            state.disabled.insert(id.to_string());
        }
    }

    pub async fn is_enabled(&self, id: &str) -> bool {
        !self.state.read().await.disabled.contains(id)
    }

    /// All rendered elements, sorted by id.
    pub async fn snapshot(&self) -> Vec<(String, String)> {
        let state = self.state.read().await;
        let mut elements: Vec<_> = state
            .elements
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        elements.sort();
        elements
    }
}
