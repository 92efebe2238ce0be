//! Repository configuration, read from the process environment.

use tracing::warn;

pub const DEFAULT_LABEL: &str = "Unnamed entity";
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;
pub const DEFAULT_RELATION_NAMESPACE: &str = "archivum:";

/// Tunables shared by the entity and credentials services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Label given to entities created or updated without one.
    pub default_label: String,
    /// Minimum accepted password length for new users.
    pub min_password_length: usize,
    /// Prefix marking a relation object as an internal entity reference
    /// (`<{namespace}{id}>`).
    pub relation_namespace: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_label: DEFAULT_LABEL.to_string(),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            relation_namespace: DEFAULT_RELATION_NAMESPACE.to_string(),
        }
    }
}

impl RepositoryConfig {
    /// Load from `ARCHIVUM_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(label) = lookup("ARCHIVUM_DEFAULT_LABEL").filter(|s| !s.trim().is_empty()) {
            config.default_label = label;
        }

        if let Some(raw) = lookup("ARCHIVUM_MIN_PASSWORD_LENGTH") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.min_password_length = n,
                _ => warn!(value = %raw, "ignoring invalid ARCHIVUM_MIN_PASSWORD_LENGTH"),
            }
        }

        if let Some(ns) = lookup("ARCHIVUM_RELATION_NAMESPACE").filter(|s| !s.trim().is_empty()) {
            config.relation_namespace = ns;
        }

        config
    }
}
