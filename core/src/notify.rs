//! Notification sink: short-lived, classified messages for clinic staff.
//!
//! Every notification stacks independently. There is no deduplication and
//! no throttling, so an operation that keeps failing keeps producing toasts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Display time used when the caller does not pick one.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);

/// Most recent toasts kept by `ToastTray::history`.
pub const HISTORY_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

/// Anything that can present a notification to the user.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, kind: NotificationKind, duration: Duration);
}

/// A notification currently (or previously) on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    pub expires_at: Instant,
}

#[derive(Default)]
struct TrayState {
    active: Vec<Toast>,
    history: Vec<Toast>,
}

/// In-memory toast stack. Toasts expire after their own duration or when
/// dismissed, whichever comes first.
#[derive(Default)]
pub struct ToastTray {
    next_id: AtomicU64,
    state: Mutex<TrayState>,
}

impl ToastTray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a toast before it expires. Returns false if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.active.len();
        state.active.retain(|t| t.id != id);
        state.active.len() != before
    }

    /// Toasts still visible at `now`; expired ones are pruned.
    pub fn active_at(&self, now: Instant) -> Vec<Toast> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.active.retain(|t| t.expires_at > now);
        state.active.clone()
    }

    pub fn active(&self) -> Vec<Toast> {
        self.active_at(Instant::now())
    }

    /// The last `HISTORY_LIMIT` toasts raised, oldest first, including
    /// dismissed and expired ones.
    pub fn history(&self) -> Vec<Toast> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }
}

impl NotificationSink for ToastTray {
    fn notify(&self, message: &str, kind: NotificationKind, duration: Duration) {
        let toast = Toast {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            message: message.to_string(),
            kind,
            expires_at: Instant::now() + duration,
        };
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.active.retain(|t| t.expires_at > now);
        if state.history.len() == HISTORY_LIMIT {
            state.history.remove(0);
        }
        state.history.push(toast.clone());
        state.active.push(toast);
    }
}

/// Sink that reports notifications as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, message: &str, kind: NotificationKind, duration: Duration) {
        let ms = duration.as_millis() as u64;
        match kind {
            NotificationKind::Error => tracing::error!(duration_ms = ms, "{message}"),
            NotificationKind::Warning => tracing::warn!(duration_ms = ms, "{message}"),
            NotificationKind::Info | NotificationKind::Success => {
                tracing::info!(kind = kind.as_str(), duration_ms = ms, "{message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_messages_stack_without_dedup() {
        let tray = ToastTray::new();
        tray.notify("Error de conexión", NotificationKind::Error, DEFAULT_DURATION);
        tray.notify("Error de conexión", NotificationKind::Error, DEFAULT_DURATION);

        let active = tray.active();
        assert_eq!(active.len(), 2);
        assert_ne!(active[0].id, active[1].id);
    }

    #[test]
    fn toasts_expire_independently() {
        let tray = ToastTray::new();
        tray.notify("short", NotificationKind::Info, Duration::from_millis(100));
        tray.notify("long", NotificationKind::Info, Duration::from_secs(60));

        let later = Instant::now() + Duration::from_secs(1);
        let active = tray.active_at(later);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "long");
        assert_eq!(tray.history().len(), 2);
    }

    #[test]
    fn dismiss_removes_only_that_toast() {
        let tray = ToastTray::new();
        tray.notify("a", NotificationKind::Success, DEFAULT_DURATION);
        tray.notify("b", NotificationKind::Warning, DEFAULT_DURATION);
        let first = tray.active()[0].id;

        assert!(tray.dismiss(first));
        assert!(!tray.dismiss(first));
        let active = tray.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "b");
    }

    #[test]
    fn history_keeps_only_the_latest_toasts() {
        let tray = ToastTray::new();
        for i in 0..HISTORY_LIMIT + 5 {
            tray.notify(&format!("toast {i}"), NotificationKind::Info, DEFAULT_DURATION);
        }
        let history = tray.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].message, "toast 5");
        assert_eq!(history[HISTORY_LIMIT - 1].message, format!("toast {}", HISTORY_LIMIT + 4));
    }

    #[test]
    fn expired_toasts_are_dropped_when_new_ones_arrive() {
        let tray = ToastTray::new();
        tray.notify("gone", NotificationKind::Info, Duration::ZERO);
        tray.notify("kept", NotificationKind::Info, DEFAULT_DURATION);
        let state = tray.state.lock().unwrap();
        assert_eq!(state.active.len(), 1);
        assert_eq!(state.active[0].message, "kept");
    }
}
