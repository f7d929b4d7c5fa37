//! Named bundles of track volumes.

use serde::Serialize;

const PRESETS: &[(&str, &[(&str, u8)])] = &[
    ("rain", &[("rain", 60)]),
    ("forest", &[("forest", 50), ("birds", 30)]),
    ("ocean", &[("ocean", 70)]),
    ("cafe", &[("coffee-shop", 50)]),
    ("study", &[("lofi", 40), ("rain", 20)]),
    ("deep-focus", &[("white-noise", 35)]),
    ("nature", &[("forest", 40), ("birds", 30), ("stream", 20)]),
    ("stormy", &[("rain", 60), ("thunder", 20)]),
];

/// A preset waiting for the stop-all to settle before it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingPreset {
    pub name: String,
    pub volumes: Vec<(String, u8)>,
}

pub fn lookup(name: &str) -> Option<PendingPreset> {
    PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(preset, volumes)| PendingPreset {
            name: (*preset).to_string(),
            volumes: volumes.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
        })
}

pub fn names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(name, _)| *name)
}

/// "deep-focus" -> "Deep-focus"
pub(crate) fn display_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nature_has_three_layers() {
        let preset = lookup("nature").unwrap();
        assert_eq!(
            preset.volumes,
            vec![("forest".into(), 40), ("birds".into(), 30), ("stream".into(), 20)]
        );
    }

    #[test]
    fn unknown_preset_is_none() {
        assert!(lookup("jungle").is_none());
        assert_eq!(names().count(), 8);
    }

    #[test]
    fn display_name_capitalizes_first_letter() {
        assert_eq!(display_name("rain"), "Rain");
        assert_eq!(display_name("deep-focus"), "Deep-focus");
    }
}
