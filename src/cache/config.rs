//! Registry and cache sizing.

use std::str::FromStr;

/// Sizing knobs for an [`ArchiveRegistry`](crate::cache::ArchiveRegistry)
/// and the bundles it opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of resident archive bundles.
    pub file_cache_size: usize,
    /// Entry budget of each bundle's path cache.
    pub object_cache_entries: usize,
    /// Entry budget of the animated world-transform cache.
    pub transform_cache_entries: usize,
    /// Entry budget of each animated visibility table.
    pub visibility_cache_entries: usize,
    /// Entry budget of the animated bounds cache.
    pub bounds_cache_entries: usize,
    /// Build the static transform table when a bundle opens instead of on
    /// the first transform query.
    pub build_static_on_open: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            file_cache_size: 50,
            object_cache_entries: 8192,
            transform_cache_entries: 65536,
            visibility_cache_entries: 65536,
            bounds_cache_entries: 65536,
            build_static_on_open: false,
        }
    }
}

impl RegistryConfig {
    /// Defaults overridden by `ABC_CACHE_*` environment variables.
    ///
    /// Unparsable values are reported and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        override_from(&lookup, "ABC_CACHE_FILE_CACHE_SIZE", &mut config.file_cache_size);
        override_from(&lookup, "ABC_CACHE_OBJECT_ENTRIES", &mut config.object_cache_entries);
        override_from(&lookup, "ABC_CACHE_XFORM_ENTRIES", &mut config.transform_cache_entries);
        override_from(
            &lookup,
            "ABC_CACHE_VISIBILITY_ENTRIES",
            &mut config.visibility_cache_entries,
        );
        override_from(&lookup, "ABC_CACHE_BOUNDS_ENTRIES", &mut config.bounds_cache_entries);
        if let Some(raw) = lookup("ABC_CACHE_EAGER_XFORMS") {
            match parse_flag(&raw) {
                Some(v) => config.build_static_on_open = v,
                None => tracing::warn!(
                    "ignoring ABC_CACHE_EAGER_XFORMS={:?}: expected a boolean",
                    raw
                ),
            }
        }
        config.file_cache_size = config.file_cache_size.max(1);
        config
    }

    /// Set the file cache size, clamped to at least one.
    pub fn with_file_cache_size(mut self, size: usize) -> Self {
        self.file_cache_size = size.max(1);
        self
    }
}

fn override_from<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut T) {
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!("ignoring {}={:?}: expected a number", name, raw),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> RegistryConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RegistryConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = RegistryConfig::default();
        assert_eq!(c.file_cache_size, 50);
        assert!(!c.build_static_on_open);
        assert_eq!(config_from(&[]), c);
    }

    #[test]
    fn test_env_overrides() {
        let c = config_from(&[
            ("ABC_CACHE_FILE_CACHE_SIZE", "3"),
            ("ABC_CACHE_XFORM_ENTRIES", " 128 "),
            ("ABC_CACHE_EAGER_XFORMS", "yes"),
        ]);
        assert_eq!(c.file_cache_size, 3);
        assert_eq!(c.transform_cache_entries, 128);
        assert!(c.build_static_on_open);
    }

    #[test]
    fn test_bad_values_ignored() {
        let c = config_from(&[
            ("ABC_CACHE_OBJECT_ENTRIES", "lots"),
            ("ABC_CACHE_EAGER_XFORMS", "maybe"),
        ]);
        assert_eq!(c.object_cache_entries, 8192);
        assert!(!c.build_static_on_open);
    }

    #[test]
    fn test_file_cache_size_clamped() {
        assert_eq!(config_from(&[("ABC_CACHE_FILE_CACHE_SIZE", "0")]).file_cache_size, 1);
        assert_eq!(RegistryConfig::default().with_file_cache_size(0).file_cache_size, 1);
    }
}
