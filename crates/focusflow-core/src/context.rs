//! Collaborators shared by the engines.
//!
//! Everything here is cheap to clone; each engine keeps its own copy.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::events::EventBus;
use crate::notify::{LogNotifier, NotificationCenter, Notifier};
use crate::remote::{CatalogService, OfflineBackend, SessionService};
use crate::storage::{Config, PreferenceStore};

#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    /// Durable settings.
    pub preferences: Arc<dyn PreferenceStore>,
    /// Short-lived timer snapshot store.
    pub snapshots: Arc<dyn PreferenceStore>,
    pub sessions: Arc<dyn SessionService>,
    pub catalog: Arc<dyn CatalogService>,
    pub notifier: Arc<dyn Notifier>,
    pub notifications: Arc<NotificationCenter>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
}

impl Context {
    /// Local-only context: offline backend, log notifier, system clock.
    pub fn new(
        config: Config,
        preferences: Arc<dyn PreferenceStore>,
        snapshots: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            preferences,
            snapshots,
            sessions: Arc::new(OfflineBackend),
            catalog: Arc::new(OfflineBackend),
            notifier: Arc::new(LogNotifier),
            notifications: Arc::new(NotificationCenter::disabled()),
            clock: Arc::new(SystemClock),
            events: EventBus::new(),
        }
    }

    /// Use one backend for both the session and catalog services.
    pub fn with_backend<B>(mut self, backend: Arc<B>) -> Self
    where
        B: SessionService + CatalogService + 'static,
    {
        self.sessions = backend.clone();
        self.catalog = backend;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionService>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogService>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_notifications(mut self, center: NotificationCenter) -> Self {
        self.notifications = Arc::new(center);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
