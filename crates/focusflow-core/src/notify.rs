//! User-facing notifications.
//!
//! Two channels: fire-and-forget toasts ([`Notifier`]) and platform-level
//! notifications gated by a tri-state permission ([`NotificationCenter`]).

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient in-app message display.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NoticeLevel);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        match level {
            NoticeLevel::Error => tracing::warn!(target: "focusflow::notice", "{message}"),
            _ => tracing::info!(target: "focusflow::notice", "{message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    Default,
}

/// Platform notification surface (desktop notifications, browser API, ...).
pub trait PlatformNotifications: Send + Sync {
    fn permission(&self) -> Permission;
    /// Prompt the user. Called at most once per [`NotificationCenter`].
    fn request_permission(&self) -> Permission;
    fn show(&self, title: &str, body: &str);
}

/// Platform with no notification support; permission is always denied.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlatform;

impl PlatformNotifications for NoPlatform {
    fn permission(&self) -> Permission {
        Permission::Denied
    }

    fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    fn show(&self, _title: &str, _body: &str) {}
}

#[derive(Debug, Default)]
struct PermissionState {
    requested: bool,
    denied: bool,
}

/// Wraps a platform and enforces the "ask once, denial sticks" rule.
pub struct NotificationCenter {
    platform: Box<dyn PlatformNotifications>,
    state: Mutex<PermissionState>,
}

impl NotificationCenter {
    pub fn new(platform: Box<dyn PlatformNotifications>) -> Self {
        Self {
            platform,
            state: Mutex::new(PermissionState::default()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(NoPlatform))
    }

    /// Resolve the permission, prompting only if it was never asked.
    pub fn ensure_permission(&self) -> Permission {
        let Ok(mut state) = self.state.lock() else {
            return Permission::Denied;
        };
        if state.denied {
            return Permission::Denied;
        }
        match self.platform.permission() {
            Permission::Granted => Permission::Granted,
            Permission::Denied => {
                state.denied = true;
                Permission::Denied
            }
            Permission::Default if state.requested => Permission::Default,
            Permission::Default => {
                state.requested = true;
                let answer = self.platform.request_permission();
                if answer == Permission::Denied {
                    state.denied = true;
                }
                tracing::debug!(?answer, "notification permission requested");
                answer
            }
        }
    }

    /// Show a platform notification if permitted. Returns whether it was shown.
    pub fn show(&self, title: &str, body: &str) -> bool {
        if self.ensure_permission() == Permission::Granted {
            self.platform.show(title, body);
            true
        } else {
            false
        }
    }
}
