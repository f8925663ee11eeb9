use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::notifications::NotificationSender;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    notifier: Arc<dyn NotificationSender>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, notifier }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn notifier(&self) -> &dyn NotificationSender {
        self.inner.notifier.as_ref()
    }
}
