//! User-visible notification service
//!
//! The cutout pipeline reports recognized conditions (no visible layers,
//! operation complete, ...) as toasts through a [`Notifier`], so frontends
//! can render them however they like.

use super::i18n::Localizer;
use crate::types::{Notification, NotificationStatus};
use std::sync::{Arc, Mutex};

/// Sink for user-visible notifications; fire-and-forget
pub trait Notifier: Send + Sync {
    /// Show a notification
    fn notify(&self, notification: Notification);
}

/// Notifier that discards everything
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn notify(&self, _notification: Notification) {
        // Intentionally empty
    }
}

/// Notifier that turns notifications into log events
///
/// Success is logged at info, warnings at warn and errors at error.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let description = notification.description.as_deref().unwrap_or_default();
        match notification.status {
            NotificationStatus::Success => {
                tracing::info!(description, "✅ {}", notification.title);
            },
            NotificationStatus::Warning => {
                tracing::warn!(description, "⚠️ {}", notification.title);
            },
            NotificationStatus::Error => {
                tracing::error!(description, "❌ {}", notification.title);
            },
        }
    }
}

/// Notifier that keeps every notification for later inspection
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications received so far, oldest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, status: NotificationStatus) -> usize {
        self.notifications()
            .iter()
            .filter(|n| n.status == status)
            .count()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications()
            .into_iter()
            .map(|n| n.title)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut notifications) = self.notifications.lock() {
            notifications.push(notification);
        }
    }
}

/// Localized notification helper shared by the pipeline stages
#[derive(Clone)]
pub struct Notices {
    notifier: Arc<dyn Notifier>,
    localizer: Arc<dyn Localizer>,
}

impl Notices {
    pub fn new(notifier: Arc<dyn Notifier>, localizer: Arc<dyn Localizer>) -> Self {
        Self {
            notifier,
            localizer,
        }
    }

    fn text(&self, key: &str, fallback: &str) -> String {
        self.localizer.translate(key, fallback)
    }

    pub fn success(&self, key: &str, fallback: &str) {
        self.notifier
            .notify(Notification::success(self.text(key, fallback)));
    }

    pub fn warning(&self, key: &str, fallback: &str) {
        self.notifier
            .notify(Notification::warning(self.text(key, fallback)));
    }

    pub fn error(&self, key: &str, fallback: &str) {
        self.notifier
            .notify(Notification::error(self.text(key, fallback)));
    }

    /// Error with a localized description line
    pub fn error_detail(
        &self,
        key: &str,
        fallback: &str,
        description_key: &str,
        description_fallback: &str,
    ) {
        self.notifier.notify(
            Notification::error(self.text(key, fallback))
                .with_description(self.text(description_key, description_fallback)),
        );
    }
}

impl std::fmt::Debug for Notices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notices").finish_non_exhaustive()
    }
}
