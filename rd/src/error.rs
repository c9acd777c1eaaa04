//! Engine error types

use thiserror::Error;

/// Errors that can occur while loading engine resources.
///
/// Only the strict entry points surface these; the drafting path itself
/// degrades to fallbacks instead of failing.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to read registry document {path}: {source}")]
    RegistryRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry document {path} is not valid YAML: {source}")]
    RegistryParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl EngineError {
    /// Path of the document involved in the failure
    pub fn path(&self) -> &str {
        match self {
            EngineError::RegistryRead { path, .. } => path,
            EngineError::RegistryParse { path, .. } => path,
        }
    }

    /// Check if the failure means the document simply is not there
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            EngineError::RegistryRead { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_missing() {
        let err = EngineError::RegistryRead {
            path: "config/registry.yml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.is_missing());
        assert_eq!(err.path(), "config/registry.yml");

        let err = EngineError::RegistryRead {
            path: "config/registry.yml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!err.is_missing());
    }

    #[test]
    fn test_parse_error_display() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("foo: [unclosed")
            .expect_err("invalid yaml must fail");
        let err = EngineError::RegistryParse {
            path: "registry.yml".to_string(),
            source: yaml_err,
        };
        assert!(err.to_string().contains("registry.yml"));
    }
}
