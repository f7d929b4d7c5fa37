//! Focus-mode backgrounds and the environment tag sent with each session.

use serde::{Deserialize, Serialize};

use crate::remote::CatalogService;
use crate::storage::{keys, set_logged, PreferenceStore};

pub const BACKGROUND_PREFIX: &str = "focus-bg-";

/// Environment tag used when no background has been chosen.
pub const DEFAULT_ENVIRONMENT: &str = "default";

const GRADIENTS: [(&str, &str); 5] = [
    ("Ocean Gradient", "gradient-1"),
    ("Sunset Gradient", "gradient-2"),
    ("Sky Gradient", "gradient-3"),
    ("Forest Gradient", "gradient-4"),
    ("Twilight Gradient", "gradient-5"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background {
    /// Value persisted when selected, e.g. `focus-bg-gradient-1`.
    pub value: String,
    pub name: String,
}

/// Built-in gradients followed by the catalog's images.
///
/// A catalog failure leaves just the gradients.
pub fn load_backgrounds(catalog: &dyn CatalogService) -> Vec<Background> {
    let mut out: Vec<Background> = GRADIENTS
        .iter()
        .map(|(name, value)| Background {
            value: format!("{BACKGROUND_PREFIX}{value}"),
            name: (*name).to_string(),
        })
        .collect();

    match catalog.backgrounds() {
        Ok(images) => out.extend(images.into_iter().map(|img| Background {
            value: format!(
                "{BACKGROUND_PREFIX}{}",
                img.file.split('.').next().unwrap_or_default()
            ),
            name: img.name,
        })),
        Err(e) => tracing::warn!(error = %e, "failed to load backgrounds"),
    }
    out
}

/// Persist the chosen background. Empty values are ignored.
pub fn select_background(prefs: &dyn PreferenceStore, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    set_logged(prefs, keys::BACKGROUND, value);
    true
}

pub fn current_background(prefs: &dyn PreferenceStore) -> Option<String> {
    prefs
        .get(keys::BACKGROUND)
        .ok()
        .flatten()
        .filter(|v| !v.is_empty())
}

/// Tag reported to the session service.
pub fn environment_tag(prefs: &dyn PreferenceStore) -> String {
    current_background(prefs).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}
