//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::SiteConfig;
use std::path::Path;

/// File name of the configuration within a project directory.
pub const CONFIG_FILE: &str = "strata.toml";

/// Loads and validates a `strata.toml` configuration from a project directory.
///
/// Reads `<project_dir>/strata.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<SiteConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `strata.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<SiteConfig, ConfigError> {
    let config: SiteConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and values are usable.
fn validate_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if config.site.entrypoints.is_empty() {
        return Err(ConfigError::MissingField("site.entrypoints".to_string()));
    }
    if config.site.entrypoints.iter().any(|e| e.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "site.entrypoints must not contain empty specifiers".to_string(),
        ));
    }
    if config.cache.dir.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "cache.dir must not be empty".to_string(),
        ));
    }
    if let Some(schemes) = &config.graph.external_schemes {
        if let Some(bad) = schemes.iter().find(|s| !s.ends_with(':')) {
            return Err(ConfigError::ValidationError(format!(
                "graph.external_schemes entry '{bad}' must end with ':'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[site]
entrypoints = ["./pages/index.tsx"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.site.entrypoints, vec!["./pages/index.tsx"]);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[site]
root = "src"
entrypoints = ["./pages/index.tsx", "./pages/blog.tsx"]

[cache]
dir = "target/strata"

[graph]
share_across_entrypoints = true
external_schemes = ["npm:", "https:"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.site.root, "src");
        assert_eq!(config.site.entrypoints.len(), 2);
        assert_eq!(config.cache.dir, "target/strata");
        assert!(config.graph.share_across_entrypoints);
        assert_eq!(
            config.graph.external_schemes.as_deref(),
            Some(&["npm:".to_string(), "https:".to_string()][..])
        );
    }

    #[test]
    fn missing_site_table_errors() {
        let err = load_config_from_str("[cache]\ndir = \".strata\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn empty_entrypoints_errors() {
        let err = load_config_from_str("[site]\nentrypoints = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn blank_entrypoint_errors() {
        let err = load_config_from_str("[site]\nentrypoints = [\"  \"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn empty_cache_dir_errors() {
        let toml = r#"
[site]
entrypoints = ["./index.tsx"]

[cache]
dir = ""
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn scheme_without_colon_errors() {
        let toml = r#"
[site]
entrypoints = ["./index.tsx"]

[graph]
external_schemes = ["npm"]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(err.to_string().contains("'npm'"));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("[site\nentrypoints = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[site]\nentrypoints = \"./index.tsx\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.site.entrypoints, vec!["./index.tsx"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
